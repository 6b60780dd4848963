use thiserror::Error;

use crate::token::TokenKind;

// -----------------------------------------------------------------------------
// WireError

/// An enumeration of all error outcomes the wire layer can surface.
///
/// Structural parse errors and codec mismatches are fatal for the document
/// being processed: the tokenizer does not resynchronize and the codec never
/// produces partial results. Capacity overflows in the message history and
/// registry misuse are programming errors and panic instead (see
/// [`MessageHistory`](crate::history::MessageHistory)).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WireError {
    /// A quoted scalar reached end of input before its closing quote.
    #[error("unterminated quoted scalar starting at byte {start}")]
    UnterminatedQuote { start: usize },

    /// A flow `}` or `]` was seen with no matching open frame.
    #[error("closing `{found}` at byte {at} with no matching open bracket")]
    UnmatchedBracket { found: char, at: usize },

    /// The codec expected one token kind and found another.
    #[error("unexpected {found:?} at byte {at}, expected {expected}")]
    UnexpectedToken {
        found: TokenKind,
        at: usize,
        expected: &'static str,
    },

    /// The document ended in the middle of a production.
    #[error("unexpected end of input at byte {at}")]
    UnexpectedEnd { at: usize },

    /// An `*alias` was referenced before its `&anchor` was defined.
    #[error("unknown alias `*{name}`")]
    UnknownAlias { name: String },

    /// A `!TypeName` tag did not resolve through the registry.
    #[error("unknown type tag `!{name}`")]
    UnknownType { name: String },

    /// A scalar's text could not be converted to the requested kind.
    #[error("invalid {what} `{text}`: {reason}")]
    InvalidScalar {
        what: &'static str,
        text: String,
        reason: String,
    },

    /// The declared field order did not match the document.
    #[error("expected field `{expected}`, found `{found}`")]
    FieldMismatch { expected: &'static str, found: String },

    /// The operation has no meaning on this wire implementation.
    #[error("`{op}` is not supported by {wire}")]
    Unsupported { op: &'static str, wire: &'static str },
}

/// Alias for `Result<T, WireError>`.
pub type WireResult<T> = Result<T, WireError>;

impl WireError {
    /// Shorthand for [`WireError::InvalidScalar`] from a parse failure.
    pub fn invalid(what: &'static str, text: &str, reason: impl core::fmt::Display) -> Self {
        Self::InvalidScalar {
            what,
            text: text.into(),
            reason: reason.to_string(),
        }
    }
}
