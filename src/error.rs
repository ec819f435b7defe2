use std::io;

use thiserror::Error;

use crate::cursor::Cursor;

/// A specialized result type for scanner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error from building or driving a scanner stack, including IO errors.
///
/// Every fallible operation in the crate reports one of these codes. A few of
/// them are non-fatal and internal to the pipeline: [`Error::InputStreamEof`]
/// drives the pop of the input stack, and [`Error::UnhandledMessage`] reports
/// that a control message reached the bottom of the message chain without a
/// consumer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An allocation was refused by the host.
    #[error("out of memory")]
    OutOfMemory,

    /// A file could not be opened for scanning.
    #[error("cannot open input file")]
    FileOpen(#[source] io::Error),

    /// A file could not be closed cleanly.
    #[error("cannot close input file")]
    FileClose(#[source] io::Error),

    /// A seek on an input descriptor failed. Reserved: streams are read
    /// strictly forward.
    #[error("cannot seek input file")]
    FileSeek,

    /// A tell on an input descriptor failed. Reserved: streams are read
    /// strictly forward.
    #[error("cannot tell input file position")]
    FileTell,

    /// An input stream is exhausted. Internal: the raw stack scanner consumes
    /// this to pop the active source; it never escapes `run`.
    #[error("end of input stream")]
    InputStreamEof,

    /// An input stream failed to produce a byte.
    #[error("cannot read from input stream")]
    InputStreamRead(#[source] io::Error),

    /// The OS handle backing a descriptor stream failed to close.
    #[error("cannot close input stream descriptor")]
    InputStreamDescriptorClose,

    /// A control message reached the bottom of the message chain without any
    /// layer consuming it.
    #[error("unhandled message")]
    UnhandledMessage,

    /// Cursor arithmetic left the valid line/column range, e.g. a `#line`
    /// override that would move a position before line 1.
    #[error("cursor position out of bounds")]
    OutOfBounds,

    /// A numeric conversion did not fit the requested type.
    #[error("bad integer conversion")]
    BadIntegerConversion,

    /// A file/position cache was read while empty.
    #[error("file position cache not set")]
    FilePositionCacheNotSet,

    /// A file/position cache was set while already holding a position.
    #[error("file position cache already set")]
    FilePositionCacheAlreadySet,

    /// The scanner met a byte that no lexical rule accepts.
    #[error("unexpected character 0x{byte:02x} at {at}")]
    UnexpectedCharacter {
        /// The offending byte.
        byte: u8,
        /// Where it was met.
        at: Cursor,
    },

    /// A numeric prefix or exponent introducer was not followed by a digit.
    #[error("expecting digit at {at}")]
    ExpectingDigit {
        /// Where the digit was expected.
        at: Cursor,
    },

    /// End of input inside an unterminated construct (block comment, string,
    /// character literal, or system string).
    #[error("unexpected end of input at {at}")]
    UnexpectedEof {
        /// Where input ended.
        at: Cursor,
    },

    /// An event could not be copied for retention. Reserved: all event
    /// categories produced by this crate are clonable.
    #[error("unsupported event category for copy")]
    EventCopyUnsupported,

    /// An element was not found in an ordered map.
    #[error("element not found")]
    ElementNotFound,
}
