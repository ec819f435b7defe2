// Copyright (C) the cpp-scan authors. All rights reserved.
//
// This file is part of cpp-scan, distributed under the MIT license. For the
// full terms, see the included LICENSE file.

//! Streaming lexical analyzer for C: named byte sources in, a totally
//! ordered stream of lexical events out.
//!
//! The library is a stack of layers. The raw stack scanner at the bottom
//! reads bytes and tracks line/column cursors; filters above it splice line
//! continuations, apply `#line` overrides, and strip comments and
//! whitespace; the preprocessor scanner at the top emits the C preprocessor
//! token vocabulary. A consumer subscribes to any layer through the
//! [`AbstractParser`] capability set and receives exactly that layer's event
//! vocabulary, in production order, on a single thread.

pub mod avl;
pub mod cache;
pub mod cursor;
pub mod error;
pub mod event;
pub mod input;
pub mod message;
pub mod parse;
pub mod reactor;
pub mod scan;
pub mod strbuf;

pub use cursor::Cursor;
pub use error::{Error, Result};
pub use event::{Event, EventCategory, EventKind, Token};
pub use input::InputStream;
pub use message::{Layer, Message};
pub use parse::AbstractParser;
pub use scan::{
    CommentFilter, CommentScanner, LineWrapFilter, NewlinePreservingWhitespaceFilter,
    PreprocessorScanner, RawFileLineOverrideFilter, RawStackScanner,
};
