use alloc::string::String;
use alloc::vec::Vec;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::WireResult;
use crate::value::{OutFn, ValueOut, append_f32, append_f64};

// -----------------------------------------------------------------------------
// YamlOut

/// The textual [`ValueOut`] implementation.
///
/// The document root is written in block style, one `key: value` pair per
/// line. Nested structures always use bracketed form: multi-line with
/// two-space indentation by default, single-line once a
/// [`leaf`](ValueOut::leaf) hint marks the subtree as flat:
///
/// ```text
/// order: {
///   qty: 3,
///   at: { x: 1, y: 2 }
/// }
/// ```
///
/// The output buffer can be supplied by the caller and recovered with
/// [`into_string`](Self::into_string), so a hot loop can reuse one
/// allocation across many documents.
pub struct YamlOut {
    buf: String,
    frames: Vec<Frame>,
    pending_leaf: bool,
    /// The next value is glued to a just-written key or type prefix.
    glued: bool,
}

#[derive(Clone, Copy)]
struct Frame {
    map: bool,
    leaf: bool,
    first: bool,
}

impl Default for YamlOut {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl YamlOut {
    /// Creates a writer with a fresh output buffer.
    pub fn new() -> Self {
        Self::with_buffer(String::new())
    }

    /// Creates a writer over a caller-owned buffer. The buffer is cleared
    /// first; recover it with [`into_string`](Self::into_string).
    pub fn with_buffer(mut buf: String) -> Self {
        buf.clear();
        Self {
            buf,
            frames: Vec::new(),
            pending_leaf: false,
            glued: false,
        }
    }

    /// The output produced so far.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Finishes the document and returns the buffer. A non-empty document
    /// always ends with a newline.
    pub fn into_string(mut self) -> String {
        if !self.buf.is_empty() && !self.buf.ends_with('\n') {
            self.buf.push('\n');
        }
        self.buf
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.buf.push_str("  ");
        }
    }

    /// Emits the separator owed before the next value in the enclosing
    /// context, unless the value is glued to its key.
    fn before_value(&mut self) {
        if self.glued {
            self.glued = false;
            return;
        }
        let depth = self.frames.len();
        let frame = match self.frames.last_mut() {
            None => {
                if !self.buf.is_empty() && !self.buf.ends_with('\n') {
                    self.buf.push('\n');
                }
                return;
            }
            Some(frame) => {
                let state = (frame.first, frame.leaf);
                frame.first = false;
                state
            }
        };
        match frame {
            (true, true) => self.buf.push(' '),
            (true, false) => {
                self.buf.push('\n');
                self.indent(depth);
            }
            (false, true) => self.buf.push_str(", "),
            (false, false) => {
                self.buf.push_str(",\n");
                self.indent(depth);
            }
        }
    }

    fn open(&mut self, bracket: char, map: bool) {
        let leaf = self.pending_leaf || self.frames.last().is_some_and(|f| f.leaf);
        self.pending_leaf = false;
        self.before_value();
        self.buf.push(bracket);
        self.frames.push(Frame {
            map,
            leaf,
            first: true,
        });
    }

    fn close(&mut self, bracket: char) {
        let frame = self.frames.pop().expect("close without open frame");
        debug_assert_eq!(frame.map, bracket == '}');
        if frame.first {
            // Nothing was written: keep the empty form compact.
        } else if frame.leaf {
            self.buf.push(' ');
        } else {
            self.buf.push('\n');
            self.indent(self.frames.len());
        }
        self.buf.push(bracket);
    }

    fn raw(&mut self, s: &str) -> WireResult<()> {
        self.before_value();
        self.buf.push_str(s);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Text quoting

/// Whether a text scalar must be double-quoted to survive tokenization
/// unchanged. Conservative: anything that could read back as a number, a
/// keyword or a structural character gets quoted.
fn needs_quote(s: &str) -> bool {
    if s.is_empty() || s.starts_with(' ') || s.ends_with(' ') || s.starts_with('-') {
        return true;
    }
    if matches!(s, "true" | "false" | "null" | "yes" | "no") {
        return true;
    }
    if s.parse::<f64>().is_ok() {
        return true;
    }
    s.chars().any(|c| {
        matches!(
            c,
            ':' | '#' | ',' | '[' | ']' | '{' | '}' | '&' | '*' | '!' | '"' | '\'' | '%'
        ) || c.is_control()
    })
}

fn push_quoted(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\t' => buf.push_str("\\t"),
            '\r' => buf.push_str("\\r"),
            '\0' => buf.push_str("\\0"),
            _ => buf.push(c),
        }
    }
    buf.push('"');
}

// -----------------------------------------------------------------------------
// ValueOut impl

impl ValueOut for YamlOut {
    fn write_key(&mut self, name: &str) -> WireResult<()> {
        self.before_value();
        if needs_quote(name) {
            push_quoted(&mut self.buf, name);
        } else {
            self.buf.push_str(name);
        }
        self.buf.push_str(": ");
        self.glued = true;
        Ok(())
    }

    fn bool(&mut self, v: bool) -> WireResult<()> {
        self.raw(if v { "true" } else { "false" })
    }

    fn int8(&mut self, v: i8) -> WireResult<()> {
        self.int64(v.into())
    }

    fn int16(&mut self, v: i16) -> WireResult<()> {
        self.int64(v.into())
    }

    fn int32(&mut self, v: i32) -> WireResult<()> {
        self.int64(v.into())
    }

    fn int64(&mut self, v: i64) -> WireResult<()> {
        use core::fmt::Write;
        self.before_value();
        let _ = write!(self.buf, "{v}");
        Ok(())
    }

    fn uint8(&mut self, v: u8) -> WireResult<()> {
        self.uint64(v.into())
    }

    fn uint16(&mut self, v: u16) -> WireResult<()> {
        self.uint64(v.into())
    }

    fn uint32(&mut self, v: u32) -> WireResult<()> {
        self.uint64(v.into())
    }

    fn uint64(&mut self, v: u64) -> WireResult<()> {
        use core::fmt::Write;
        self.before_value();
        let _ = write!(self.buf, "{v}");
        Ok(())
    }

    fn float32(&mut self, v: f32) -> WireResult<()> {
        self.before_value();
        append_f32(&mut self.buf, v);
        Ok(())
    }

    fn float64(&mut self, v: f64) -> WireResult<()> {
        self.before_value();
        append_f64(&mut self.buf, v);
        Ok(())
    }

    fn text(&mut self, v: &str) -> WireResult<()> {
        self.before_value();
        if needs_quote(v) {
            push_quoted(&mut self.buf, v);
        } else {
            self.buf.push_str(v);
        }
        Ok(())
    }

    fn bytes(&mut self, v: &[u8]) -> WireResult<()> {
        self.before_value();
        self.buf.push_str("!binary \"");
        self.buf.push_str(&BASE64.encode(v));
        self.buf.push('"');
        Ok(())
    }

    fn uuid(&mut self, v: Uuid) -> WireResult<()> {
        use core::fmt::Write;
        self.before_value();
        let _ = write!(self.buf, "{v}");
        Ok(())
    }

    fn date(&mut self, v: NaiveDate) -> WireResult<()> {
        use core::fmt::Write;
        self.before_value();
        let _ = write!(self.buf, "{}", v.format("%Y-%m-%d"));
        Ok(())
    }

    fn time(&mut self, v: NaiveTime) -> WireResult<()> {
        use core::fmt::Write;
        self.before_value();
        let _ = write!(self.buf, "{}", v.format("%H:%M:%S%.f"));
        Ok(())
    }

    fn date_time(&mut self, v: NaiveDateTime) -> WireResult<()> {
        use core::fmt::Write;
        self.before_value();
        let _ = write!(self.buf, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f"));
        Ok(())
    }

    fn zoned_date_time(&mut self, v: DateTime<FixedOffset>) -> WireResult<()> {
        self.before_value();
        self.buf.push_str(&v.to_rfc3339());
        Ok(())
    }

    fn null(&mut self) -> WireResult<()> {
        self.raw("!null \"\"")
    }

    fn type_prefix(&mut self, name: &str) -> WireResult<()> {
        self.before_value();
        self.buf.push('!');
        self.buf.push_str(name);
        self.buf.push(' ');
        self.glued = true;
        Ok(())
    }

    fn comment(&mut self, text: &str) -> WireResult<()> {
        self.buf.push_str("\t\t# ");
        self.buf.push_str(text);
        self.buf.push('\n');
        Ok(())
    }

    fn leaf(&mut self, leaf: bool) {
        self.pending_leaf = leaf;
    }

    fn sequence(&mut self, f: OutFn<'_>) -> WireResult<()> {
        self.open('[', false);
        f(self)?;
        self.close(']');
        Ok(())
    }

    fn marshallable(&mut self, f: OutFn<'_>) -> WireResult<()> {
        self.open('{', true);
        f(self)?;
        self.close('}');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::YamlOut;
    use crate::value::ValueOut;

    #[test]
    fn root_block_pairs() {
        let mut out = YamlOut::new();
        out.write_key("a").unwrap();
        out.int64(1).unwrap();
        out.write_key("b").unwrap();
        out.int64(2).unwrap();
        assert_eq!(out.into_string(), "a: 1\nb: 2\n");
    }

    #[test]
    fn nested_block_mapping() {
        let mut out = YamlOut::new();
        out.write_key("order").unwrap();
        out.marshallable(&mut |o| {
            o.write_key("qty")?;
            o.int64(3)?;
            o.write_key("open")?;
            o.bool(true)
        })
        .unwrap();
        assert_eq!(out.into_string(), "order: {\n  qty: 3,\n  open: true\n}\n");
    }

    #[test]
    fn leaf_renders_single_line() {
        let mut out = YamlOut::new();
        out.write_key("at").unwrap();
        out.leaf(true);
        out.marshallable(&mut |o| {
            o.write_key("x")?;
            o.int64(1)?;
            o.write_key("y")?;
            o.int64(2)
        })
        .unwrap();
        assert_eq!(out.into_string(), "at: { x: 1, y: 2 }\n");
    }

    #[test]
    fn leaf_sequence_inline() {
        let mut out = YamlOut::new();
        out.write_key("xs").unwrap();
        out.leaf(true);
        out.sequence(&mut |o| {
            o.int64(1)?;
            o.int64(2)?;
            o.int64(3)
        })
        .unwrap();
        assert_eq!(out.into_string(), "xs: [ 1, 2, 3 ]\n");
    }

    #[test]
    fn block_sequence_multiline() {
        let mut out = YamlOut::new();
        out.write_key("xs").unwrap();
        out.sequence(&mut |o| {
            o.text("one")?;
            o.text("two")
        })
        .unwrap();
        assert_eq!(out.into_string(), "xs: [\n  one,\n  two\n]\n");
    }

    #[test]
    fn null_and_typed_values() {
        let mut out = YamlOut::new();
        out.write_key("gone").unwrap();
        out.null().unwrap();
        out.write_key("shape").unwrap();
        out.type_prefix("Point").unwrap();
        out.leaf(true);
        out.marshallable(&mut |o| {
            o.write_key("x")?;
            o.int64(7)
        })
        .unwrap();
        assert_eq!(
            out.into_string(),
            "gone: !null \"\"\nshape: !Point { x: 7 }\n"
        );
    }

    #[test]
    fn binary_blob() {
        let mut out = YamlOut::new();
        out.write_key("data").unwrap();
        out.bytes(&[1, 2, 3]).unwrap();
        assert_eq!(out.into_string(), "data: !binary \"AQID\"\n");
    }

    #[test]
    fn texts_that_need_quoting() {
        let mut out = YamlOut::new();
        out.write_key("a").unwrap();
        out.text("true").unwrap();
        out.write_key("b").unwrap();
        out.text("12.5").unwrap();
        out.write_key("c").unwrap();
        out.text("say \"hi\"").unwrap();
        assert_eq!(
            out.into_string(),
            "a: \"true\"\nb: \"12.5\"\nc: \"say \\\"hi\\\"\"\n"
        );
    }

    #[test]
    fn empty_structures_stay_compact() {
        let mut out = YamlOut::new();
        out.write_key("none").unwrap();
        out.sequence(&mut |_| Ok(())).unwrap();
        assert_eq!(out.into_string(), "none: []\n");
    }

    #[test]
    fn buffer_reuse() {
        let mut out = YamlOut::with_buffer(String::from("stale"));
        out.write_key("k").unwrap();
        out.int64(9).unwrap();
        assert_eq!(out.into_string(), "k: 9\n");
    }
}
