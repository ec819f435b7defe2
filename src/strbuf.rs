// Copyright (C) the cpp-scan authors. All rights reserved.
//
// This file is part of cpp-scan, distributed under the MIT license. For the
// full terms, see the included LICENSE file.

use bstr::BString;

/// Chunk size for the builder. Token text is short; chunks stay small so a
/// cleared builder holds little memory.
const CHUNK_SIZE: usize = 128;

/// An append-only byte accumulator for token text.
///
/// Bytes land in fixed-size chunks, so appending never moves what was already
/// written. [`StringBuilder::build`] assembles the contiguous text;
/// [`StringBuilder::clear`] resets the length while retaining the chunk
/// allocations for the next token.
#[derive(Default)]
pub struct StringBuilder {
    chunks: Vec<Box<[u8; CHUNK_SIZE]>>,
    len: usize,
}

impl StringBuilder {
    /// Creates an empty builder.
    #[inline]
    pub fn new() -> Self {
        StringBuilder::default()
    }

    /// Appends one byte. Amortized O(1).
    pub fn push(&mut self, byte: u8) {
        let (chunk, offset) = (self.len / CHUNK_SIZE, self.len % CHUNK_SIZE);
        if chunk == self.chunks.len() {
            self.chunks.push(Box::new([0; CHUNK_SIZE]));
        }
        self.chunks[chunk][offset] = byte;
        self.len += 1;
    }

    /// Appends every byte of `bytes`.
    pub fn push_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// The number of bytes accumulated so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been accumulated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Assembles the accumulated bytes into one contiguous string.
    pub fn build(&self) -> BString {
        let mut out = Vec::with_capacity(self.len);
        let mut remaining = self.len;
        for chunk in &self.chunks {
            let take = remaining.min(CHUNK_SIZE);
            out.extend_from_slice(&chunk[..take]);
            remaining -= take;
        }
        BString::new(out)
    }

    /// Assembles the accumulated bytes and resets the builder in one step.
    pub fn take(&mut self) -> BString {
        let out = self.build();
        self.clear();
        out
    }

    /// Forgets the accumulated bytes, keeping chunk allocations for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }
}
