use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{WireError, WireResult};
use crate::token::{Context, ContextKind, Token, TokenKind};

// -----------------------------------------------------------------------------
// Tokeniser

/// A streaming tokenizer over a caller-owned byte buffer.
///
/// The tokenizer is strictly forward-moving: [`next`](Self::next) consumes
/// and returns the next token, [`current`](Self::current) peeks the active
/// one without consuming. A dedent or a closing bracket can synthesize
/// several END tokens for a single input byte; these are queued in a LIFO
/// push-back buffer and drained before any further input is scanned.
///
/// Replay (alias resolution, out-of-order field lookup) is supported through
/// [`state`](Self::state) / [`restore`](Self::restore) checkpoints rather
/// than by retaining tokens.
///
/// # Examples
///
/// ```
/// use ww_wire::token::{Tokeniser, TokenKind};
///
/// let mut t = Tokeniser::new(b"a: 1\n");
/// assert_eq!(t.next().unwrap(), TokenKind::MappingStart);
/// assert_eq!(t.next().unwrap(), TokenKind::MappingKey);
/// assert_eq!(t.next().unwrap(), TokenKind::Text);
/// assert_eq!(t.text(), "a");
/// ```
pub struct Tokeniser<'a> {
    input: &'a [u8],
    pos: usize,
    line_start: usize,
    current: Token,
    /// LIFO buffer of synthesized tokens, drained before scanning new bytes.
    pushed: Vec<Token>,
    contexts: Vec<Context>,
    /// Index of the shallowest context frame opened by flow syntax.
    flow_depth: Option<usize>,
}

/// A resumable snapshot of a [`Tokeniser`]'s cursor and nesting state.
#[derive(Clone, Debug)]
pub struct TokeniserState {
    pos: usize,
    line_start: usize,
    current: Token,
    pushed: Vec<Token>,
    contexts: Vec<Context>,
    flow_depth: Option<usize>,
}

impl<'a> Tokeniser<'a> {
    /// Creates a tokenizer over `input`. The initial current token is
    /// [`TokenKind::StreamStart`].
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line_start: 0,
            current: Token::structural(TokenKind::StreamStart, 0),
            pushed: Vec::new(),
            contexts: Vec::new(),
            flow_depth: None,
        }
    }

    /// The active token, without consuming it.
    #[inline]
    pub fn current(&self) -> Token {
        self.current
    }

    /// The byte position of the read cursor.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Consumes and returns the next token's kind.
    ///
    /// The push-back buffer is drained first; new input is only scanned when
    /// it is empty.
    pub fn next(&mut self) -> WireResult<TokenKind> {
        if let Some(tok) = self.pushed.pop() {
            self.current = tok;
            return Ok(tok.kind);
        }
        self.current = self.scan()?;
        Ok(self.current.kind)
    }

    /// Like [`next`](Self::next), but first force-closes every block frame
    /// nested deeper than `min_indent`.
    ///
    /// Used when the caller already knows the enclosing indent, e.g. when
    /// resuming after skipping a value.
    pub fn next_min(&mut self, min_indent: usize) -> WireResult<TokenKind> {
        if self.pushed.is_empty() {
            let mut ends = Vec::new();
            while let Some(top) = self.contexts.last() {
                if top.flow || top.indent <= min_indent {
                    break;
                }
                ends.push(Token::structural(top.end_kind(), self.pos));
                self.pop_context();
            }
            for tok in ends.into_iter().rev() {
                self.pushed.push(tok);
            }
        }
        self.next()
    }

    /// The text of the current token.
    ///
    /// Empty for structural tokens. Double-quoted literals have their
    /// backslash escapes decoded; single-quoted literals have `''` folded.
    pub fn text(&self) -> Cow<'a, str> {
        let tok = self.current;
        if !tok.kind.has_text() || tok.is_empty() {
            return Cow::Borrowed("");
        }
        let raw = String::from_utf8_lossy(&self.input[tok.start..tok.end]);
        if tok.kind == TokenKind::Literal && tok.start > 0 {
            match self.input[tok.start - 1] {
                b'"' if raw.contains('\\') => return Cow::Owned(decode_backslash(&raw)),
                b'\'' if raw.contains("''") => return Cow::Owned(raw.replace("''", "'")),
                _ => {}
            }
        }
        raw
    }

    /// Snapshots the cursor and nesting state for later [`restore`](Self::restore).
    pub fn state(&self) -> TokeniserState {
        TokeniserState {
            pos: self.pos,
            line_start: self.line_start,
            current: self.current,
            pushed: self.pushed.clone(),
            contexts: self.contexts.clone(),
            flow_depth: self.flow_depth,
        }
    }

    /// Rewinds (or fast-forwards) to a previously captured state.
    pub fn restore(&mut self, state: &TokeniserState) {
        self.pos = state.pos;
        self.line_start = state.line_start;
        self.current = state.current;
        self.pushed.clone_from(&state.pushed);
        self.contexts.clone_from(&state.contexts);
        self.flow_depth = state.flow_depth;
    }

    // -------------------------------------------------------------------------
    // Scanning

    fn scan(&mut self) -> WireResult<Token> {
        loop {
            self.skip_blank();
            let Some(&c) = self.input.get(self.pos) else {
                return Ok(self.unwind_all());
            };
            let indent = self.pos - self.line_start;
            match c {
                b'#' => return Ok(self.scan_line_rest(TokenKind::Comment)),
                b'%' if indent == 0 => return Ok(self.scan_line_rest(TokenKind::Directive)),
                b',' if self.in_flow() => {
                    self.pos += 1;
                }
                b'{' => return Ok(self.open_flow(ContextKind::Mapping, indent)),
                b'[' => return Ok(self.open_flow(ContextKind::Sequence, indent)),
                b'}' => return self.close_flow(ContextKind::Mapping, '}'),
                b']' => return self.close_flow(ContextKind::Sequence, ']'),
                b'&' => return Ok(self.scan_name(TokenKind::Anchor)),
                b'*' => return Ok(self.scan_name(TokenKind::Alias)),
                b'!' => return Ok(self.scan_name(TokenKind::Tag)),
                b'"' | b'\'' => return self.scan_quoted(c, indent),
                b'-' => {
                    if self.starts_marker(b"---") {
                        return Ok(self.marker(TokenKind::DirectivesEnd, 3));
                    }
                    if self.dash_is_entry() {
                        return Ok(self.sequence_entry(indent));
                    }
                    return Ok(self.scan_plain(indent));
                }
                b'.' if self.starts_marker(b"...") => {
                    return Ok(self.marker(TokenKind::DocumentEnd, 3));
                }
                _ => return Ok(self.scan_plain(indent)),
            }
        }
    }

    /// Skips spaces, tabs and line breaks, tracking the line-start offset
    /// that indent columns are computed from.
    fn skip_blank(&mut self) {
        while let Some(&c) = self.input.get(self.pos) {
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    self.pos += 1;
                    self.line_start = self.pos;
                }
                _ => break,
            }
        }
    }

    fn in_flow(&self) -> bool {
        self.flow_depth.is_some()
    }

    fn pop_context(&mut self) {
        self.contexts.pop();
        if self.flow_depth == Some(self.contexts.len()) {
            self.flow_depth = None;
        }
    }

    /// Makes `queue[0]` current and stacks the rest for draining in order.
    fn emit_queue(&mut self, queue: Vec<Token>) -> Token {
        let mut iter = queue.into_iter();
        let first = iter.next().expect("emit_queue requires at least one token");
        for tok in iter.rev() {
            self.pushed.push(tok);
        }
        first
    }

    /// Pops every remaining frame, emitting END tokens innermost-first, then
    /// reports [`TokenKind::None`] forever.
    fn unwind_all(&mut self) -> Token {
        let queue = self.unwind_contexts();
        if queue.is_empty() {
            Token::structural(TokenKind::None, self.pos)
        } else {
            self.emit_queue(queue)
        }
    }

    fn unwind_contexts(&mut self) -> Vec<Token> {
        let mut queue = Vec::new();
        while let Some(top) = self.contexts.last() {
            queue.push(Token::structural(top.end_kind(), self.pos));
            self.pop_context();
        }
        queue
    }

    fn scan_line_rest(&mut self, kind: TokenKind) -> Token {
        self.pos += 1;
        if self.input.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
        let start = self.pos;
        while let Some(&c) = self.input.get(self.pos) {
            if c == b'\n' || c == b'\r' {
                break;
            }
            self.pos += 1;
        }
        Token::scalar(kind, start, self.pos)
    }

    fn open_flow(&mut self, kind: ContextKind, indent: usize) -> Token {
        let at = self.pos;
        self.pos += 1;
        self.contexts.push(Context {
            kind,
            indent,
            flow: true,
        });
        if self.flow_depth.is_none() {
            self.flow_depth = Some(self.contexts.len() - 1);
        }
        let start = match kind {
            ContextKind::Mapping => TokenKind::MappingStart,
            ContextKind::Sequence => TokenKind::SequenceStart,
        };
        Token::structural(start, at)
    }

    fn close_flow(&mut self, kind: ContextKind, found: char) -> WireResult<Token> {
        let at = self.pos;
        self.pos += 1;
        let mut queue = Vec::new();
        loop {
            match self.contexts.last() {
                Some(top) if top.flow => {
                    let matched = top.kind == kind;
                    queue.push(Token::structural(top.end_kind(), at));
                    self.pop_context();
                    if matched {
                        return Ok(self.emit_queue(queue));
                    }
                }
                _ => return Err(WireError::UnmatchedBracket { found, at }),
            }
        }
    }

    fn scan_name(&mut self, kind: TokenKind) -> Token {
        self.pos += 1;
        let start = self.pos;
        while let Some(&c) = self.input.get(self.pos) {
            if c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b'$') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Token::scalar(kind, start, self.pos)
    }

    fn scan_quoted(&mut self, quote: u8, indent: usize) -> WireResult<Token> {
        let opened_at = self.pos;
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.input.get(self.pos) {
                None => return Err(WireError::UnterminatedQuote { start: opened_at }),
                Some(b'\\') if quote == b'"' => self.pos += 2,
                Some(&c) if c == quote => {
                    // Single quotes escape themselves by doubling.
                    if quote == b'\'' && self.input.get(self.pos + 1) == Some(&b'\'') {
                        self.pos += 2;
                        continue;
                    }
                    let tok = Token::scalar(TokenKind::Literal, start, self.pos);
                    self.pos += 1;
                    if self.take_key_colon() {
                        return Ok(self.key_tokens(indent, tok));
                    }
                    return Ok(tok);
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn starts_marker(&self, marker: &[u8]) -> bool {
        self.pos == self.line_start
            && self.input[self.pos..].starts_with(marker)
            && matches!(
                self.input.get(self.pos + marker.len()),
                None | Some(b' ' | b'\t' | b'\n' | b'\r')
            )
    }

    fn marker(&mut self, kind: TokenKind, len: usize) -> Token {
        let at = self.pos;
        self.pos += len;
        let mut queue = self.unwind_contexts();
        queue.push(Token::structural(kind, at));
        self.emit_queue(queue)
    }

    fn dash_is_entry(&self) -> bool {
        matches!(
            self.input.get(self.pos + 1),
            None | Some(b' ' | b'\t' | b'\n' | b'\r')
        )
    }

    fn sequence_entry(&mut self, indent: usize) -> Token {
        let at = self.pos;
        self.pos += 1;
        let mut queue = Vec::new();
        while let Some(top) = self.contexts.last() {
            if top.flow || top.indent <= indent {
                break;
            }
            queue.push(Token::structural(top.end_kind(), at));
            self.pop_context();
        }
        let sibling = matches!(
            self.contexts.last(),
            Some(top) if !top.flow && top.kind == ContextKind::Sequence && top.indent == indent
        );
        if !sibling {
            self.contexts.push(Context {
                kind: ContextKind::Sequence,
                indent,
                flow: false,
            });
            queue.push(Token::structural(TokenKind::SequenceStart, at));
        }
        queue.push(Token::structural(TokenKind::SequenceEntry, at));
        self.emit_queue(queue)
    }

    /// Whether `pos + 1` (or end of input) can follow a `:` key separator.
    fn colon_is_separator(&self, after: usize) -> bool {
        match self.input.get(after) {
            None | Some(b' ' | b'\t' | b'\n' | b'\r') => true,
            Some(b',' | b'}' | b']') => self.in_flow(),
            _ => false,
        }
    }

    /// Consumes a trailing `: ` separator if the scalar just scanned turns
    /// out to be a mapping key.
    fn take_key_colon(&mut self) -> bool {
        let mut probe = self.pos;
        while matches!(self.input.get(probe), Some(b' ' | b'\t')) {
            probe += 1;
        }
        if self.input.get(probe) == Some(&b':') && self.colon_is_separator(probe + 1) {
            self.pos = probe + 1;
            return true;
        }
        false
    }

    /// Emits the token run for a mapping key found at `indent`: any END
    /// tokens for frames the key closes, a `MappingStart` when the key opens
    /// a new mapping, then `MappingKey` followed by the key scalar itself.
    fn key_tokens(&mut self, indent: usize, key: Token) -> Token {
        let mut queue = Vec::new();
        if !self.in_flow() {
            while let Some(top) = self.contexts.last() {
                let closes = top.indent > indent
                    || (top.kind == ContextKind::Sequence && top.indent == indent);
                if top.flow || !closes {
                    break;
                }
                queue.push(Token::structural(top.end_kind(), key.start));
                self.pop_context();
            }
            let sibling = matches!(
                self.contexts.last(),
                Some(top) if top.kind == ContextKind::Mapping && top.indent == indent
            );
            if !sibling {
                self.contexts.push(Context {
                    kind: ContextKind::Mapping,
                    indent,
                    flow: false,
                });
                queue.push(Token::structural(TokenKind::MappingStart, key.start));
            }
        }
        queue.push(Token::structural(TokenKind::MappingKey, key.start));
        queue.push(key);
        self.emit_queue(queue)
    }

    fn scan_plain(&mut self, indent: usize) -> Token {
        let start = self.pos;
        while let Some(&c) = self.input.get(self.pos) {
            match c {
                b'\n' | b'\r' => break,
                b'#' if self.pos > start
                    && matches!(self.input.get(self.pos - 1), Some(b' ' | b'\t')) =>
                {
                    break;
                }
                b':' if self.colon_is_separator(self.pos + 1) => {
                    if self.pos == start {
                        // A lone leading colon stays part of the scalar.
                        self.pos += 1;
                        continue;
                    }
                    break;
                }
                b',' | b'[' | b']' | b'{' | b'}' if self.in_flow() => break,
                _ => self.pos += 1,
            }
        }
        let mut end = self.pos;
        while end > start && matches!(self.input[end - 1], b' ' | b'\t') {
            end -= 1;
        }
        let tok = Token::scalar(TokenKind::Text, start, end);
        if self.take_key_colon() {
            return self.key_tokens(indent, tok);
        }
        tok
    }
}

// -----------------------------------------------------------------------------
// Escape decoding

fn decode_backslash(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::Tokeniser;
    use crate::token::TokenKind::*;
    use crate::token::{Token, TokenKind};

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut t = Tokeniser::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            let k = t.next().unwrap();
            out.push(k);
            if k == None {
                return out;
            }
        }
    }

    #[test]
    fn block_mapping() {
        assert_eq!(
            kinds("a: 1\nb: 2\n"),
            [
                MappingStart,
                MappingKey,
                Text,
                Text,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                None
            ]
        );
    }

    #[test]
    fn flow_sequence() {
        assert_eq!(
            kinds("[1, 2, 3]"),
            [SequenceStart, Text, Text, Text, SequenceEnd, None]
        );
    }

    #[test]
    fn nested_mapping_dedent() {
        assert_eq!(
            kinds("a:\n  b: 1\nc: 2\n"),
            [
                MappingStart,
                MappingKey,
                Text,
                MappingStart,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                None
            ]
        );
    }

    #[test]
    fn block_sequence_of_mappings() {
        assert_eq!(
            kinds("- a: 1\n- b: 2\n"),
            [
                SequenceStart,
                SequenceEntry,
                MappingStart,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                SequenceEntry,
                MappingStart,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                SequenceEnd,
                None
            ]
        );
    }

    #[test]
    fn sequence_as_mapping_value() {
        assert_eq!(
            kinds("a:\n- 1\n- 2\nb: 3\n"),
            [
                MappingStart,
                MappingKey,
                Text,
                SequenceStart,
                SequenceEntry,
                Text,
                SequenceEntry,
                Text,
                SequenceEnd,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                None
            ]
        );
    }

    #[test]
    fn flow_with_newlines() {
        assert_eq!(
            kinds("k: {\n  a: 1,\n  b: 2\n}\n"),
            [
                MappingStart,
                MappingKey,
                Text,
                MappingStart,
                MappingKey,
                Text,
                Text,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                MappingEnd,
                None
            ]
        );
    }

    #[test]
    fn tags_anchors_aliases() {
        let mut t = Tokeniser::new(b"a: &x !Foo 1\nb: *x\n");
        assert_eq!(t.next().unwrap(), MappingStart);
        assert_eq!(t.next().unwrap(), MappingKey);
        assert_eq!(t.next().unwrap(), Text);
        assert_eq!(t.next().unwrap(), Anchor);
        assert_eq!(t.text(), "x");
        assert_eq!(t.next().unwrap(), Tag);
        assert_eq!(t.text(), "Foo");
        assert_eq!(t.next().unwrap(), Text);
        assert_eq!(t.text(), "1");
        assert_eq!(t.next().unwrap(), MappingKey);
        assert_eq!(t.next().unwrap(), Text);
        assert_eq!(t.next().unwrap(), Alias);
        assert_eq!(t.text(), "x");
    }

    #[test]
    fn comments_and_documents() {
        assert_eq!(
            kinds("# hello\n---\na: 1\n...\n"),
            [
                Comment,
                DirectivesEnd,
                MappingStart,
                MappingKey,
                Text,
                Text,
                MappingEnd,
                DocumentEnd,
                None
            ]
        );
    }

    #[test]
    fn quoted_scalars() {
        let mut t = Tokeniser::new(br#""say \"hi\"": 'it''s'"#);
        assert_eq!(t.next().unwrap(), MappingStart);
        assert_eq!(t.next().unwrap(), MappingKey);
        assert_eq!(t.next().unwrap(), Literal);
        assert_eq!(t.text(), "say \"hi\"");
        assert_eq!(t.next().unwrap(), Literal);
        assert_eq!(t.text(), "it's");
    }

    #[test]
    fn unterminated_quote_is_fatal() {
        let mut t = Tokeniser::new(b"\"oops");
        assert!(t.next().is_err());
    }

    #[test]
    fn unmatched_bracket_is_fatal() {
        let mut t = Tokeniser::new(b"]");
        assert!(t.next().is_err());
    }

    #[test]
    fn structural_tokens_have_empty_spans() {
        let mut t = Tokeniser::new(b"[1]");
        assert_eq!(t.next().unwrap(), SequenceStart);
        assert!(t.current().is_empty());
        assert_eq!(t.text(), "");
    }

    #[test]
    fn next_min_closes_deeper_frames() {
        let mut t = Tokeniser::new(b"a:\n  b:\n    c: 1\n");
        // Consume up to the innermost value.
        while t.current().kind != Text || t.text() != "1" {
            t.next().unwrap();
        }
        // Resuming at the root indent closes both nested mappings first.
        assert_eq!(t.next_min(0).unwrap(), MappingEnd);
        assert_eq!(t.next_min(0).unwrap(), MappingEnd);
        assert_eq!(t.next_min(0).unwrap(), MappingEnd);
        assert_eq!(t.next_min(0).unwrap(), None);
    }

    /// Every START has exactly one matching END at the same nesting depth.
    #[test]
    fn balanced_bracketing() {
        let input = b"a:\n  b:\n  - 1\n  - x: 2\n    y: [3, {z: 4}]\nc: 5\n";
        let mut t = Tokeniser::new(input);
        let mut depth = 0_i64;
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            let k = t.next().unwrap();
            match k {
                MappingStart | SequenceStart => depth += 1,
                MappingEnd | SequenceEnd => {
                    depth -= 1;
                    assert!(depth >= 0, "END with no matching START");
                }
                None => break,
                _ => {}
            }
            tokens.push(t.current());
        }
        assert_eq!(depth, 0, "unbalanced structure: {tokens:?}");
    }

    #[test]
    fn state_restore_replays() {
        let mut t = Tokeniser::new(b"a: 1\nb: 2\n");
        t.next().unwrap();
        t.next().unwrap();
        t.next().unwrap();
        let mark = t.state();
        assert_eq!(t.next().unwrap(), Text);
        assert_eq!(t.text(), "1");
        t.restore(&mark);
        assert_eq!(t.next().unwrap(), Text);
        assert_eq!(t.text(), "1");
    }
}
