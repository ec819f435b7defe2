// Copyright (C) the cpp-scan authors. All rights reserved.
//
// This file is part of cpp-scan, distributed under the MIT license. For the
// full terms, see the included LICENSE file.

use std::{
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

/// A source range: a file name plus 1-based begin and end line/column pairs.
///
/// The file name is reference-counted so that cursors can be copied by value
/// into events and retained by subscribers without tying their lifetime to
/// the input source that produced them. The begin position never exceeds the
/// end position in `(line, col)` lexicographic order.
#[derive(Clone, PartialEq, Eq)]
pub struct Cursor {
    file: Arc<str>,
    /// First line covered by this range (1-based).
    pub begin_line: u32,
    /// First column covered by this range (1-based).
    pub begin_col: u32,
    /// Line one past the covered range, or the covered line itself.
    pub end_line: u32,
    /// Column one past the last covered column.
    pub end_col: u32,
}

impl Cursor {
    /// Creates a cursor at the start of the named source.
    #[inline]
    pub fn new(file: Arc<str>) -> Self {
        Cursor {
            file,
            begin_line: 1,
            begin_col: 1,
            end_line: 1,
            end_col: 1,
        }
    }

    /// The name of the source this cursor points into.
    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Replaces the source name, leaving positions untouched.
    #[inline]
    pub(crate) fn set_file(&mut self, file: Arc<str>) {
        self.file = file;
    }

    /// Advances past one byte: the begin position moves to the previous end,
    /// and the end position moves past `byte`. A newline advances the end
    /// line; every other byte (tabs included) advances the end column by one.
    pub(crate) fn advance(&mut self, byte: u8) {
        self.begin_line = self.end_line;
        self.begin_col = self.end_col;
        if byte == b'\n' {
            self.end_line += 1;
            self.end_col = 1;
        } else {
            self.end_col += 1;
        }
    }

    /// Extends this range to cover `other`'s end position.
    #[inline]
    pub(crate) fn extend(&mut self, other: &Cursor) {
        self.end_line = other.end_line;
        self.end_col = other.end_col;
    }

    /// A zero-width cursor at this range's begin position.
    #[inline]
    pub(crate) fn collapse_to_begin(&self) -> Cursor {
        let mut cursor = self.clone();
        cursor.end_line = cursor.begin_line;
        cursor.end_col = cursor.begin_col;
        cursor
    }

    /// A zero-width cursor at this range's end position.
    #[inline]
    pub(crate) fn collapse_to_end(&self) -> Cursor {
        let mut cursor = self.clone();
        cursor.begin_line = cursor.end_line;
        cursor.begin_col = cursor.end_col;
        cursor
    }

    /// Whether the begin position precedes or equals the end position.
    #[inline]
    pub fn is_ordered(&self) -> bool {
        (self.begin_line, self.begin_col) <= (self.end_line, self.end_col)
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.begin_line, self.begin_col)
    }
}

impl Debug for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{}-{}.{}",
            self.file, self.begin_line, self.begin_col, self.end_line, self.end_col
        )
    }
}
