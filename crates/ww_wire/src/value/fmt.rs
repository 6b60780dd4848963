//! Deterministic numeric formatting for the textual wire.
//!
//! The thresholds in this module are a compatibility contract: round-trip
//! byte-identical output depends on them, so they are replicated literally
//! rather than derived. See the pinned cases in the tests.

use alloc::string::String;

// -----------------------------------------------------------------------------
// f32

/// Appends an `f32` in plain decimal when `1e-3 <= |v| < 1e6`, otherwise in
/// exponent form.
pub fn append_f32(out: &mut String, v: f32) {
    use core::fmt::Write;

    if v == 0.0 || !v.is_finite() {
        let _ = write!(out, "{v}");
        return;
    }
    let magnitude = v.abs();
    if (1e-3..1e6).contains(&magnitude) {
        let _ = write!(out, "{v}");
    } else {
        let _ = write!(out, "{v:E}");
    }
}

// -----------------------------------------------------------------------------
// f64

/// Appends an `f64` using the compacting rule:
///
/// - `|v| >= 1e15`: exponent form.
/// - `|v| >= 1e6` and an exact multiple of `1e6` (resp. `1e3`): rendered
///   with an `E6` (resp. `E3`) suffix, e.g. `1000000.0` as `1E6`.
/// - `1e-3 <= |v| < 1e15`: plain decimal.
/// - `|v| < 1e-3`: rounded to 7 significant digits, exponent form; `1e-7` is
///   the smallest magnitude the rounding leaves untouched.
pub fn append_f64(out: &mut String, v: f64) {
    use core::fmt::Write;

    if v == 0.0 || !v.is_finite() {
        let _ = write!(out, "{v}");
        return;
    }
    let magnitude = v.abs();
    if magnitude >= 1e15 {
        let _ = write!(out, "{v:E}");
    } else if magnitude >= 1e6 && (v / 1e6).fract() == 0.0 {
        let _ = write!(out, "{}E6", v / 1e6);
    } else if magnitude >= 1e6 && (v / 1e3).fract() == 0.0 {
        let _ = write!(out, "{}E3", v / 1e3);
    } else if magnitude >= 1e-3 {
        let _ = write!(out, "{v}");
    } else {
        let rounded = alloc::format!("{v:.6E}");
        out.push_str(&trim_mantissa(&rounded));
    }
}

/// `5.000000E-7` -> `5E-7`, `1.234560E-4` -> `1.23456E-4`.
fn trim_mantissa(formatted: &str) -> String {
    let Some((mantissa, exponent)) = formatted.split_once('E') else {
        return formatted.into();
    };
    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
    let mut out = String::with_capacity(formatted.len());
    out.push_str(mantissa);
    out.push('E');
    out.push_str(exponent);
    out
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::{append_f32, append_f64};

    fn f64_str(v: f64) -> String {
        let mut s = String::new();
        append_f64(&mut s, v);
        s
    }

    fn f32_str(v: f32) -> String {
        let mut s = String::new();
        append_f32(&mut s, v);
        s
    }

    #[test]
    fn f64_compaction_is_pinned() {
        assert_eq!(f64_str(1_000_000.0), "1E6");
        assert_eq!(f64_str(2_000_000.0), "2E6");
        assert_eq!(f64_str(1_234_000.0), "1234E3");
        assert_eq!(f64_str(1_234_567.5), "1234567.5");
        assert_eq!(f64_str(0.0000005), "5E-7");
        assert_eq!(f64_str(0.0000001), "1E-7");
        assert_eq!(f64_str(0.00012), "1.2E-4");
        assert_eq!(f64_str(12.5), "12.5");
        assert_eq!(f64_str(0.0), "0");
        assert_eq!(f64_str(-1_000_000.0), "-1E6");
        assert_eq!(f64_str(1e15), "1E15");
    }

    #[test]
    fn f32_range_rule() {
        assert_eq!(f32_str(12.5), "12.5");
        assert_eq!(f32_str(0.001), "0.001");
        assert_eq!(f32_str(1e6), "1E6");
        assert_eq!(f32_str(1e-4), "1E-4");
        assert_eq!(f32_str(0.0), "0");
    }

    #[test]
    fn formatted_values_parse_back_exactly() {
        for v in [1_000_000.0, 1_234_000.0, 0.0000005, 0.00012, 12.5, -0.25] {
            let parsed: f64 = f64_str(v).parse().unwrap();
            assert_eq!(parsed.to_bits(), v.to_bits());
        }
    }
}
