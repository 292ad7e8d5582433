//! Error types for the wire protocol layer.

use thiserror::Error;

/// Convenience alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid UTF-8 bytes in an incoming line.
    #[error("invalid UTF-8 in line at byte {byte_pos}")]
    InvalidUtf8 {
        /// Byte position where UTF-8 validation failed.
        byte_pos: usize,
    },

    /// Line exceeded the maximum allowed length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual line length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Illegal control character in an outgoing line.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// Failed to parse an incoming line.
    #[error("invalid line: {line}")]
    InvalidLine {
        /// The offending line.
        line: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing a single wire line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty after stripping the terminator.
    #[error("empty line")]
    EmptyLine,

    /// Sender prefix was malformed.
    #[error("invalid sender prefix: {0}")]
    InvalidPrefix(String),

    /// Command token was neither a textual command nor a three-digit numeric.
    #[error("invalid command token: {0}")]
    InvalidCommand(String),
}

/// Errors encountered when classifying mode strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModeParseError {
    /// Missing mode modifier (+ or -).
    #[error("missing mode modifier")]
    MissingModeModifier,

    /// Invalid mode modifier character (not + or -).
    #[error("invalid mode modifier: {modifier}")]
    InvalidModeModifier {
        /// The invalid modifier character.
        modifier: char,
    },

    /// No mode letters after the modifier.
    #[error("no mode letters after modifier")]
    EmptyModeLetters,

    /// A mode letter was not a word character.
    #[error("invalid mode letter: {letter:?}")]
    InvalidModeLetter {
        /// The invalid letter.
        letter: char,
    },
}

/// Errors raised when rendering an outbound command.
///
/// These are synchronous caller errors: the parameter list supplied to
/// [`render`](crate::command::render) did not match the verb's declared shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommandError {
    /// A required parameter was not supplied.
    #[error("{verb}: missing required parameter <{param}>")]
    MissingParameter {
        /// The wire verb.
        verb: &'static str,
        /// Name of the missing parameter.
        param: &'static str,
    },

    /// More parameters were supplied than the verb accepts.
    #[error("{verb}: too many parameters (at most {expected}, got {got})")]
    TooManyParameters {
        /// The wire verb.
        verb: &'static str,
        /// Maximum accepted.
        expected: usize,
        /// Supplied.
        got: usize,
    },

    /// A list value was supplied for a single-valued parameter.
    #[error("{verb}: parameter <{param}> does not accept a list")]
    UnexpectedList {
        /// The wire verb.
        verb: &'static str,
        /// Name of the parameter.
        param: &'static str,
    },
}
