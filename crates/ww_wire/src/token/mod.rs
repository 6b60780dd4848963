//! Streaming tokenizer for the textual wire syntax.
//!
//! The tokenizer turns a byte buffer into a flat stream of structural and
//! scalar [`Token`]s. It owns exactly one *current* token plus a small LIFO
//! push-back buffer: a single input byte can force several structural tokens
//! out (a dedent closes every deeper frame at once), and those are buffered
//! and drained before any new byte is scanned.
//!
//! Nesting is tracked on an explicit [`Context`] stack. Inside `{...}` /
//! `[...]` flow syntax the indentation rules are suspended; in block syntax
//! the indent column of each frame governs when it closes.

mod tokeniser;

pub use tokeniser::{Tokeniser, TokeniserState};

// -----------------------------------------------------------------------------
// TokenKind

/// The closed set of token kinds the tokenizer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Nothing left: the input is exhausted and every frame is closed.
    None,
    /// The initial state of a fresh tokenizer, before the first scan.
    StreamStart,
    /// Reserved for explicit stream framing; block documents end with
    /// [`TokenKind::None`].
    StreamEnd,
    /// The `---` marker.
    DirectivesEnd,
    /// The `...` marker.
    DocumentEnd,
    /// A `%...` line.
    Directive,
    /// A `# ...` line remainder.
    Comment,
    /// A block or flow mapping opened.
    MappingStart,
    /// The next scalar is a mapping key.
    MappingKey,
    /// A mapping closed.
    MappingEnd,
    /// A block or flow sequence opened.
    SequenceStart,
    /// A block `- ` entry marker.
    SequenceEntry,
    /// A sequence closed.
    SequenceEnd,
    /// A plain (unquoted) scalar.
    Text,
    /// A quoted scalar; never re-interpreted as a number or keyword.
    Literal,
    /// A `!name` type tag.
    Tag,
    /// A `&name` anchor definition.
    Anchor,
    /// A `*name` alias reference.
    Alias,
}

impl TokenKind {
    /// Whether tokens of this kind carry a text span.
    #[inline]
    pub const fn has_text(self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Literal
                | Self::Tag
                | Self::Anchor
                | Self::Alias
                | Self::Comment
                | Self::Directive
        )
    }
}

// -----------------------------------------------------------------------------
// Token

/// One tokenizer output: a kind plus a half-open byte range into the source.
///
/// Structural tokens report an empty span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// A structural token with an empty span at `at`.
    #[inline]
    pub const fn structural(kind: TokenKind, at: usize) -> Self {
        Self {
            kind,
            start: at,
            end: at,
        }
    }

    /// A scalar token covering `[start, end)`.
    #[inline]
    pub const fn scalar(kind: TokenKind, start: usize, end: usize) -> Self {
        Self { kind, start, end }
    }

    /// Whether the span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// -----------------------------------------------------------------------------
// Context

/// The structural kind a [`Context`] frame was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContextKind {
    Mapping,
    Sequence,
}

/// One frame of nesting state: the enclosing structural kind, the indent
/// column it began at, and whether it was opened by flow syntax.
///
/// Indentation strictly decreases as frames pop; a frame opened inside flow
/// never consults indentation at all.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Context {
    pub kind: ContextKind,
    pub indent: usize,
    pub flow: bool,
}

impl Context {
    /// The END token kind that closes this frame.
    #[inline]
    pub const fn end_kind(&self) -> TokenKind {
        match self.kind {
            ContextKind::Mapping => TokenKind::MappingEnd,
            ContextKind::Sequence => TokenKind::SequenceEnd,
        }
    }
}
