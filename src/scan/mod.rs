// Copyright (C) the cpp-scan authors. All rights reserved.
//
// This file is part of cpp-scan, distributed under the MIT license. For the
// full terms, see the included LICENSE file.

//! The layered scanner pipeline, from raw bytes to preprocessor tokens.
//!
//! Each layer owns its parent (the layer closer to the raw bytes),
//! subscribes to the parent's event stream, refines it through its own state
//! machine, and broadcasts the result to its own subscribers. Constructing a
//! layer constructs its whole parent chain, so any layer can top a stack:
//!
//! ```
//! use cpp_scan::{AbstractParser, InputStream, PreprocessorScanner};
//!
//! let mut scanner = PreprocessorScanner::new()?;
//! scanner.subscribe_preprocessor_scanner(|event| {
//!     println!("{:?} at {}", event.kind(), event.cursor());
//!     Ok(())
//! })?;
//! scanner.push_input_stream("main.c", InputStream::from_string("int x;\n"))?;
//! scanner.run()?;
//! # Ok::<(), cpp_scan::Error>(())
//! ```

mod comment;
mod fileline;
mod raw;
mod space;
mod strip;
mod token;
mod wrap;

pub use comment::CommentScanner;
pub use fileline::RawFileLineOverrideFilter;
pub use raw::RawStackScanner;
pub use space::NewlinePreservingWhitespaceFilter;
pub use strip::CommentFilter;
pub use token::PreprocessorScanner;
pub use wrap::LineWrapFilter;
