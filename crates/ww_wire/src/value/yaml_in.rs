use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Display;
use core::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;
use ww_utils::hash::HashMap;

use crate::error::{WireError, WireResult};
use crate::token::{TokenKind, Tokeniser, TokeniserState};
use crate::value::{InFn, ValueIn};

// -----------------------------------------------------------------------------
// YamlIn

/// The textual [`ValueIn`] implementation, backed by the tokenizer.
///
/// Comments, directives and document markers are skipped transparently.
/// Anchors record a checkpoint at the anchored value; aliases replay from
/// that checkpoint, so an aliased value decodes identically to its
/// definition regardless of its kind.
///
/// Out-of-order field access goes through [`read_field`](Self::read_field):
/// keys skipped while scanning for a requested name are remembered (name to
/// checkpoint) per open mapping and revisited without a second full pass.
/// The lookahead table is dropped when its mapping closes.
pub struct YamlIn<'a> {
    tok: Tokeniser<'a>,
    primed: bool,
    aliases: HashMap<String, TokeniserState>,
    /// One lookahead table per open mapping; the root scope is index 0.
    skipped: Vec<HashMap<String, TokeniserState>>,
}

impl<'a> YamlIn<'a> {
    /// Creates a reader over `input`.
    pub fn new(input: &'a [u8]) -> Self {
        let mut skipped = Vec::new();
        skipped.push(HashMap::default());
        Self {
            tok: Tokeniser::new(input),
            primed: false,
            aliases: HashMap::default(),
            skipped,
        }
    }

    /// Reads the value of the field `name` from the open mapping, in order
    /// if possible, otherwise by scanning forward and remembering every
    /// skipped key for later calls.
    ///
    /// Returns `false` if the field is absent from the mapping.
    pub fn read_field(&mut self, name: &str, f: InFn<'_>) -> WireResult<bool> {
        if let Some(checkpoint) = self
            .skipped
            .last_mut()
            .and_then(|table| table.remove(name))
        {
            let resume = self.tok.state();
            self.tok.restore(&checkpoint);
            f(self)?;
            self.tok.restore(&resume);
            return Ok(true);
        }
        loop {
            match self.kind()? {
                TokenKind::MappingKey => {
                    self.advance()?;
                    let (key, _) = self.scalar_token()?;
                    if key == name {
                        f(self)?;
                        return Ok(true);
                    }
                    self.kind()?;
                    let checkpoint = self.tok.state();
                    self.skip_value()?;
                    if let Some(table) = self.skipped.last_mut() {
                        table.insert(key, checkpoint);
                    }
                }
                TokenKind::MappingEnd | TokenKind::None | TokenKind::DocumentEnd => {
                    return Ok(false);
                }
                found => return Err(self.unexpected(found, "mapping key")),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Cursor plumbing

    fn unexpected(&self, found: TokenKind, expected: &'static str) -> WireError {
        WireError::UnexpectedToken {
            found,
            at: self.tok.pos(),
            expected,
        }
    }

    /// The current meaningful token kind; comments, directives and the
    /// `---` marker never reach callers.
    fn kind(&mut self) -> WireResult<TokenKind> {
        if !self.primed {
            self.primed = true;
            if self.tok.current().kind == TokenKind::StreamStart {
                self.tok.next()?;
            }
        }
        loop {
            match self.tok.current().kind {
                TokenKind::Comment | TokenKind::Directive | TokenKind::DirectivesEnd => {
                    self.tok.next()?;
                }
                kind => return Ok(kind),
            }
        }
    }

    fn advance(&mut self) -> WireResult<()> {
        self.tok.next()?;
        Ok(())
    }

    /// Settles on the start of the next value: consumes sequence-entry
    /// markers and records anchor definitions.
    fn pre_value(&mut self) -> WireResult<()> {
        loop {
            match self.kind()? {
                TokenKind::SequenceEntry => self.advance()?,
                TokenKind::Anchor => {
                    let name = self.tok.text().into_owned();
                    self.advance()?;
                    self.kind()?;
                    if self.aliases.insert(name.clone(), self.tok.state()).is_some() {
                        log::warn!("anchor `&{name}` redefined; last definition wins");
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Runs `f` at the start of the next value, replaying through an alias
    /// reference when one is present.
    fn with_value<R>(&mut self, f: impl FnOnce(&mut Self) -> WireResult<R>) -> WireResult<R> {
        self.pre_value()?;
        if self.kind()? != TokenKind::Alias {
            return f(self);
        }
        let name = self.tok.text().into_owned();
        let Some(target) = self.aliases.get(&name).cloned() else {
            return Err(WireError::UnknownAlias { name });
        };
        self.advance()?;
        let resume = self.tok.state();
        self.tok.restore(&target);
        let result = f(self);
        self.tok.restore(&resume);
        result
    }

    fn scalar_token(&mut self) -> WireResult<(String, TokenKind)> {
        match self.kind()? {
            kind @ (TokenKind::Text | TokenKind::Literal) => {
                let text = self.tok.text().into_owned();
                self.advance()?;
                Ok((text, kind))
            }
            TokenKind::None => Err(WireError::UnexpectedEnd { at: self.tok.pos() }),
            found => Err(self.unexpected(found, "scalar")),
        }
    }

    fn parse_scalar<T>(&mut self, what: &'static str) -> WireResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            text.parse()
                .map_err(|e| WireError::invalid(what, &text, e))
        })
    }

    /// Consumes the null production (`!null ""`) if the cursor is on it.
    fn null_production(&mut self) -> WireResult<bool> {
        if self.kind()? != TokenKind::Tag || self.tok.text() != "null" {
            return Ok(false);
        }
        self.advance()?;
        self.scalar_token()?;
        Ok(true)
    }

    /// Consumes one whole value production without interpreting it.
    fn skip_value(&mut self) -> WireResult<()> {
        self.pre_value()?;
        match self.kind()? {
            TokenKind::Alias => self.advance(),
            TokenKind::Tag => {
                self.advance()?;
                self.skip_value()
            }
            TokenKind::Text | TokenKind::Literal => self.advance(),
            TokenKind::MappingStart | TokenKind::SequenceStart => {
                let mut depth = 0_usize;
                loop {
                    match self.kind()? {
                        TokenKind::MappingStart | TokenKind::SequenceStart => {
                            depth += 1;
                            self.advance()?;
                        }
                        TokenKind::MappingEnd | TokenKind::SequenceEnd => {
                            depth -= 1;
                            self.advance()?;
                            if depth == 0 {
                                return Ok(());
                            }
                        }
                        TokenKind::None => {
                            return Err(WireError::UnexpectedEnd { at: self.tok.pos() });
                        }
                        _ => self.advance()?,
                    }
                }
            }
            TokenKind::None => Err(WireError::UnexpectedEnd { at: self.tok.pos() }),
            found => Err(self.unexpected(found, "value")),
        }
    }

    /// Skips any unread entries, then consumes the closing token.
    fn drain_mapping(&mut self) -> WireResult<()> {
        loop {
            match self.kind()? {
                TokenKind::MappingKey => {
                    self.advance()?;
                    self.scalar_token()?;
                    self.skip_value()?;
                }
                TokenKind::MappingEnd => return self.advance(),
                TokenKind::None => return Err(WireError::UnexpectedEnd { at: self.tok.pos() }),
                found => return Err(self.unexpected(found, "mapping entry or end")),
            }
        }
    }

    fn drain_sequence(&mut self) -> WireResult<()> {
        loop {
            match self.kind()? {
                TokenKind::SequenceEnd => return self.advance(),
                TokenKind::None => return Err(WireError::UnexpectedEnd { at: self.tok.pos() }),
                _ => self.skip_value()?,
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ValueIn impl

impl ValueIn for YamlIn<'_> {
    fn read_key(&mut self, name: &'static str) -> WireResult<bool> {
        match self.kind()? {
            TokenKind::MappingKey => {
                self.advance()?;
                let (found, _) = self.scalar_token()?;
                if found == name {
                    Ok(true)
                } else {
                    Err(WireError::FieldMismatch {
                        expected: name,
                        found,
                    })
                }
            }
            TokenKind::MappingEnd | TokenKind::None | TokenKind::DocumentEnd => Ok(false),
            found => Err(self.unexpected(found, "mapping key")),
        }
    }

    fn next_key(&mut self) -> WireResult<Option<String>> {
        match self.kind()? {
            TokenKind::MappingKey => {
                self.advance()?;
                let (key, _) = self.scalar_token()?;
                Ok(Some(key))
            }
            TokenKind::MappingEnd | TokenKind::None | TokenKind::DocumentEnd => Ok(None),
            found => Err(self.unexpected(found, "mapping key")),
        }
    }

    fn bool(&mut self) -> WireResult<bool> {
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            match text.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(WireError::invalid("bool", &text, "expected true or false")),
            }
        })
    }

    fn int8(&mut self) -> WireResult<i8> {
        self.parse_scalar("int8")
    }

    fn int16(&mut self) -> WireResult<i16> {
        self.parse_scalar("int16")
    }

    fn int32(&mut self) -> WireResult<i32> {
        self.parse_scalar("int32")
    }

    fn int64(&mut self) -> WireResult<i64> {
        self.parse_scalar("int64")
    }

    fn uint8(&mut self) -> WireResult<u8> {
        self.parse_scalar("uint8")
    }

    fn uint16(&mut self) -> WireResult<u16> {
        self.parse_scalar("uint16")
    }

    fn uint32(&mut self) -> WireResult<u32> {
        self.parse_scalar("uint32")
    }

    fn uint64(&mut self) -> WireResult<u64> {
        self.parse_scalar("uint64")
    }

    fn float32(&mut self) -> WireResult<f32> {
        self.parse_scalar("float32")
    }

    fn float64(&mut self) -> WireResult<f64> {
        self.parse_scalar("float64")
    }

    fn text(&mut self) -> WireResult<Option<String>> {
        if self.is_null()? {
            return Ok(None);
        }
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            Ok(Some(text))
        })
    }

    fn text_to(&mut self, buf: &mut String) -> WireResult<bool> {
        buf.clear();
        match self.text()? {
            Some(text) => {
                buf.push_str(&text);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn bytes(&mut self) -> WireResult<Vec<u8>> {
        self.with_value(|r| {
            if r.kind()? != TokenKind::Tag || r.tok.text() != "binary" {
                let found = r.kind()?;
                return Err(r.unexpected(found, "!binary tag"));
            }
            r.advance()?;
            let (text, _) = r.scalar_token()?;
            BASE64
                .decode(text.as_bytes())
                .map_err(|e| WireError::invalid("binary", &text, e))
        })
    }

    fn uuid(&mut self) -> WireResult<Uuid> {
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            Uuid::parse_str(&text).map_err(|e| WireError::invalid("uuid", &text, e))
        })
    }

    fn date(&mut self) -> WireResult<NaiveDate> {
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map_err(|e| WireError::invalid("date", &text, e))
        })
    }

    fn time(&mut self) -> WireResult<NaiveTime> {
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
                .map_err(|e| WireError::invalid("time", &text, e))
        })
    }

    fn date_time(&mut self) -> WireResult<NaiveDateTime> {
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|e| WireError::invalid("dateTime", &text, e))
        })
    }

    fn zoned_date_time(&mut self) -> WireResult<DateTime<FixedOffset>> {
        self.with_value(|r| {
            let (text, _) = r.scalar_token()?;
            DateTime::parse_from_rfc3339(&text)
                .map_err(|e| WireError::invalid("zonedDateTime", &text, e))
        })
    }

    fn is_null(&mut self) -> WireResult<bool> {
        self.pre_value()?;
        if self.kind()? != TokenKind::Alias {
            return self.null_production();
        }
        // Peek through the alias without committing the cursor: a non-null
        // target must stay readable by the next call.
        let name = self.tok.text().into_owned();
        let Some(target) = self.aliases.get(&name).cloned() else {
            return Err(WireError::UnknownAlias { name });
        };
        let save = self.tok.state();
        self.tok.restore(&target);
        let null = self.null_production()?;
        self.tok.restore(&save);
        if null {
            self.advance()?;
        }
        Ok(null)
    }

    fn type_prefix(&mut self) -> WireResult<Option<String>> {
        self.pre_value()?;
        if self.kind()? != TokenKind::Tag {
            return Ok(None);
        }
        let name = self.tok.text().into_owned();
        if name == "null" || name == "binary" {
            return Ok(None);
        }
        self.advance()?;
        Ok(Some(name))
    }

    fn has_next_item(&mut self) -> WireResult<bool> {
        loop {
            match self.kind()? {
                TokenKind::SequenceEntry => self.advance()?,
                TokenKind::SequenceEnd
                | TokenKind::None
                | TokenKind::DocumentEnd
                | TokenKind::StreamEnd => return Ok(false),
                _ => return Ok(true),
            }
        }
    }

    fn sequence(&mut self, f: InFn<'_>) -> WireResult<()> {
        self.with_value(|r| {
            match r.kind()? {
                TokenKind::SequenceStart => r.advance()?,
                found => return Err(r.unexpected(found, "sequence start")),
            }
            f(r)?;
            r.drain_sequence()
        })
    }

    fn marshallable(&mut self, f: InFn<'_>) -> WireResult<()> {
        self.with_value(|r| {
            match r.kind()? {
                TokenKind::MappingStart => r.advance()?,
                found => return Err(r.unexpected(found, "mapping start")),
            }
            r.skipped.push(HashMap::default());
            let result = f(r).and_then(|()| r.drain_mapping());
            r.skipped.pop();
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::YamlIn;
    use crate::value::{ValueIn, ValueOut, YamlOut};

    #[test]
    fn reads_block_mapping_in_order() {
        let mut r = YamlIn::new(b"a: 1\nb: 2\n");
        r.marshallable(&mut |i| {
            assert!(i.read_key("a")?);
            assert_eq!(i.int64()?, 1);
            assert!(i.read_key("b")?);
            assert_eq!(i.int64()?, 2);
            assert!(!i.read_key("c")?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn scalar_round_trips() {
        let mut out = YamlOut::new();
        out.write_key("b").unwrap();
        out.bool(true).unwrap();
        out.write_key("i").unwrap();
        out.int64(-42).unwrap();
        out.write_key("u").unwrap();
        out.uint64(u64::MAX).unwrap();
        out.write_key("f").unwrap();
        out.float64(1_000_000.0).unwrap();
        out.write_key("s").unwrap();
        out.text("plain words").unwrap();
        let doc = out.into_string();

        let mut r = YamlIn::new(doc.as_bytes());
        r.marshallable(&mut |i| {
            assert!(i.read_key("b")?);
            assert!(i.bool()?);
            assert!(i.read_key("i")?);
            assert_eq!(i.int64()?, -42);
            assert!(i.read_key("u")?);
            assert_eq!(i.uint64()?, u64::MAX);
            assert!(i.read_key("f")?);
            assert_eq!(i.float64()?.to_bits(), 1_000_000.0_f64.to_bits());
            assert!(i.read_key("s")?);
            assert_eq!(i.text()?.as_deref(), Some("plain words"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn null_consumes_tag_and_empty_text() {
        let mut r = YamlIn::new(b"gone: !null \"\"\nafter: 9\n");
        r.marshallable(&mut |i| {
            assert!(i.read_key("gone")?);
            assert_eq!(i.text()?, None);
            // The cursor advanced past both the tag and the empty literal.
            assert!(i.read_key("after")?);
            assert_eq!(i.int64()?, 9);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn out_of_order_field_lookup() {
        let mut r = YamlIn::new(b"a: 1\nb: 2\nc: 3\n");
        let mut got_c = 0_i64;
        let mut got_a = 0_i64;
        assert!(
            r.read_field("c", &mut |i| {
                got_c = i.int64()?;
                Ok(())
            })
            .unwrap()
        );
        // `a` and `b` were skipped and remembered; replay finds them.
        assert!(
            r.read_field("a", &mut |i| {
                got_a = i.int64()?;
                Ok(())
            })
            .unwrap()
        );
        assert_eq!((got_a, got_c), (1, 3));
        assert!(!r.read_field("missing", &mut |_| Ok(())).unwrap());
    }

    #[test]
    fn anchors_and_aliases_replay() {
        let mut r = YamlIn::new(b"first: &x 17\nsecond: *x\n");
        r.marshallable(&mut |i| {
            assert!(i.read_key("first")?);
            assert_eq!(i.int64()?, 17);
            assert!(i.read_key("second")?);
            assert_eq!(i.int64()?, 17);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn unknown_alias_is_fatal() {
        let mut r = YamlIn::new(b"second: *ghost\n");
        let err = r
            .marshallable(&mut |i| {
                i.read_key("second")?;
                i.int64().map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(err, crate::error::WireError::UnknownAlias { .. }));
    }

    #[test]
    fn sequence_reading_with_has_next() {
        let mut r = YamlIn::new(b"xs:\n- 1\n- 2\n- 3\n");
        let mut sum = 0_i64;
        r.marshallable(&mut |i| {
            assert!(i.read_key("xs")?);
            i.sequence(&mut |s| {
                while s.has_next_item()? {
                    sum += s.int64()?;
                }
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(sum, 6);
    }

    #[test]
    fn flow_input_reads_identically() {
        let mut r = YamlIn::new(b"p: { x: 1, y: 2 }\n");
        r.marshallable(&mut |i| {
            assert!(i.read_key("p")?);
            i.marshallable(&mut |m| {
                assert!(m.read_key("x")?);
                assert_eq!(m.int64()?, 1);
                assert!(m.read_key("y")?);
                assert_eq!(m.int64()?, 2);
                Ok(())
            })
        })
        .unwrap();
    }

    #[test]
    fn bytes_round_trip() {
        let mut out = YamlOut::new();
        out.write_key("blob").unwrap();
        out.bytes(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        let doc = out.into_string();

        let mut r = YamlIn::new(doc.as_bytes());
        r.marshallable(&mut |i| {
            assert!(i.read_key("blob")?);
            assert_eq!(i.bytes()?, [0xde, 0xad, 0xbe, 0xef]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn unread_fields_are_drained() {
        let mut r = YamlIn::new(b"a: 1\nnested: { x: 1 }\nz: 9\n");
        r.marshallable(&mut |i| {
            assert!(i.read_key("a")?);
            assert_eq!(i.int64()?, 1);
            // `nested` and `z` are left unread; marshallable drains them.
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn out_of_range_int_is_invalid() {
        let mut r = YamlIn::new(b"n: 300\n");
        let err = r
            .marshallable(&mut |i| {
                i.read_key("n")?;
                i.int8().map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::WireError::InvalidScalar { what: "int8", .. }
        ));
    }

    #[test]
    fn temporal_and_uuid_round_trips() {
        use chrono::{NaiveDate, TimeZone, Utc};
        use uuid::Uuid;

        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let time = date.and_hms_nano_opt(13, 30, 5, 250_000_000).unwrap();
        let zoned = Utc
            .with_ymd_and_hms(2026, 8, 7, 13, 30, 5)
            .unwrap()
            .fixed_offset();
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();

        let mut out = YamlOut::new();
        out.write_key("d").unwrap();
        out.date(date).unwrap();
        out.write_key("t").unwrap();
        out.time(time.time()).unwrap();
        out.write_key("dt").unwrap();
        out.date_time(time).unwrap();
        out.write_key("z").unwrap();
        out.zoned_date_time(zoned).unwrap();
        out.write_key("u").unwrap();
        out.uuid(id).unwrap();
        let doc = out.into_string();

        let mut r = YamlIn::new(doc.as_bytes());
        r.marshallable(&mut |i| {
            assert!(i.read_key("d")?);
            assert_eq!(i.date()?, date);
            assert!(i.read_key("t")?);
            assert_eq!(i.time()?, time.time());
            assert!(i.read_key("dt")?);
            assert_eq!(i.date_time()?, time);
            assert!(i.read_key("z")?);
            assert_eq!(i.zoned_date_time()?, zoned);
            assert!(i.read_key("u")?);
            assert_eq!(i.uuid()?, id);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn comments_are_invisible_to_reads() {
        let mut r = YamlIn::new(b"# header\na: 1\t\t# trailing note\nb: 2\n");
        r.marshallable(&mut |i| {
            assert!(i.read_key("a")?);
            assert_eq!(i.int64()?, 1);
            assert!(i.read_key("b")?);
            assert_eq!(i.int64()?, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn text_to_reuses_buffer() {
        let mut r = YamlIn::new(b"s: hello\n");
        let mut buf = String::from("stale");
        r.marshallable(&mut |i| {
            assert!(i.read_key("s")?);
            assert!(i.text_to(&mut buf)?);
            Ok(())
        })
        .unwrap();
        assert_eq!(buf, "hello");
    }
}
