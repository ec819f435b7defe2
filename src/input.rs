// Copyright (C) the cpp-scan authors. All rights reserved.
//
// This file is part of cpp-scan, distributed under the MIT license. For the
// full terms, see the included LICENSE file.

use std::{
    fmt::{self, Debug, Formatter},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// A named byte source for the scanner.
///
/// Streams are read strictly forward, one byte at a time; seeking is not
/// supported. The descriptor variant owns an OS file handle and closes it on
/// drop; the in-memory variant owns a copy of its bytes and zeroizes them
/// before freeing.
pub enum InputStream {
    /// Backed by an open file descriptor.
    Descriptor(DescriptorStream),
    /// Backed by an in-memory byte buffer.
    Memory(MemoryStream),
}

/// The descriptor-backed variant of [`InputStream`].
pub struct DescriptorStream {
    reader: BufReader<File>,
}

/// The in-memory variant of [`InputStream`].
pub struct MemoryStream {
    bytes: Vec<u8>,
    pos: usize,
}

impl InputStream {
    /// Takes ownership of an open file and reads it to the end.
    #[inline]
    pub fn from_file(file: File) -> Self {
        InputStream::Descriptor(DescriptorStream {
            reader: BufReader::new(file),
        })
    }

    /// Opens the file at `path` as a descriptor stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(Error::FileOpen)?;
        Ok(InputStream::from_file(file))
    }

    /// Copies `text` into an in-memory stream.
    #[inline]
    pub fn from_string(text: &str) -> Self {
        InputStream::from_bytes(text.as_bytes())
    }

    /// Copies `bytes` into an in-memory stream. The scanner is 8-bit clean;
    /// the bytes need not be valid UTF-8.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        InputStream::Memory(MemoryStream {
            bytes: bytes.to_vec(),
            pos: 0,
        })
    }

    /// Reads the next byte.
    ///
    /// Returns [`Error::InputStreamEof`] once the source is exhausted and
    /// [`Error::InputStreamRead`] when the underlying descriptor fails.
    pub fn read_byte(&mut self) -> Result<u8> {
        match self {
            InputStream::Descriptor(stream) => {
                let byte = stream
                    .reader
                    .fill_buf()
                    .map_err(Error::InputStreamRead)?
                    .first()
                    .copied();
                match byte {
                    Some(byte) => {
                        stream.reader.consume(1);
                        Ok(byte)
                    }
                    None => Err(Error::InputStreamEof),
                }
            }
            InputStream::Memory(stream) => match stream.bytes.get(stream.pos) {
                Some(&byte) => {
                    stream.pos += 1;
                    Ok(byte)
                }
                None => Err(Error::InputStreamEof),
            },
        }
    }
}

impl Debug for InputStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InputStream::Descriptor(_) => f.write_str("InputStream::Descriptor"),
            InputStream::Memory(stream) => f
                .debug_struct("InputStream::Memory")
                .field("len", &stream.bytes.len())
                .field("pos", &stream.pos)
                .finish(),
        }
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        // Zeroize, then free.
        self.bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn memory_stream_reads_bytes_in_order() {
        let mut stream = InputStream::from_string("ab");
        assert_eq!(stream.read_byte().unwrap(), b'a');
        assert_eq!(stream.read_byte().unwrap(), b'b');
        assert!(matches!(stream.read_byte(), Err(Error::InputStreamEof)));
        // EOF is sticky.
        assert!(matches!(stream.read_byte(), Err(Error::InputStreamEof)));
    }

    #[test]
    fn memory_stream_is_eight_bit_clean() {
        let mut stream = InputStream::from_bytes(&[0x00, 0xFF]);
        assert_eq!(stream.read_byte().unwrap(), 0x00);
        assert_eq!(stream.read_byte().unwrap(), 0xFF);
        assert!(matches!(stream.read_byte(), Err(Error::InputStreamEof)));
    }

    #[test]
    fn descriptor_stream_reads_file_contents() {
        let mut path = std::env::temp_dir();
        path.push(format!("cpp-scan-input-{}", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(b"xy").unwrap();
        }
        let mut stream = InputStream::open(&path).unwrap();
        assert_eq!(stream.read_byte().unwrap(), b'x');
        assert_eq!(stream.read_byte().unwrap(), b'y');
        assert!(matches!(stream.read_byte(), Err(Error::InputStreamEof)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn open_missing_file_reports_error() {
        assert!(matches!(
            InputStream::open("/nonexistent/cpp-scan-test"),
            Err(Error::FileOpen(_)),
        ));
    }
}
