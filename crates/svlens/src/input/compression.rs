//! Transparent gzip/BGZF input handling.

use std::io::{BufRead, BufReader, Read};

use flate2::read::MultiGzDecoder;

/// Gzip magic bytes (ID1=31, ID2=139). BGZF blocks carry the same header.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Check whether a byte stream starts with a gzip-family header.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC
}

/// Input stream after compression sniffing.
pub enum InputStream<R: Read> {
    Plain(BufReader<R>),
    /// Single-member gzip or concatenated members (BGZF).
    Gzip(BufReader<MultiGzDecoder<BufReader<R>>>),
}

impl<R: Read> InputStream<R> {
    /// Sniff the first bytes of `reader` and wrap it in a decoder if needed.
    pub fn open(reader: R) -> std::io::Result<Self> {
        let mut buffered = BufReader::new(reader);
        let compressed = is_gzip(buffered.fill_buf()?);
        Ok(if compressed {
            InputStream::Gzip(BufReader::new(MultiGzDecoder::new(buffered)))
        } else {
            InputStream::Plain(buffered)
        })
    }

    /// Whether the stream is being decompressed.
    pub fn is_compressed(&self) -> bool {
        matches!(self, InputStream::Gzip(_))
    }

    /// Read one raw line (terminator included) into `buf`, returning the
    /// number of bytes read. UTF-8 validation is left to the caller so that
    /// a bad line can be skipped without aborting the stream.
    pub fn read_raw_line(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        match self {
            InputStream::Plain(r) => r.read_until(b'\n', buf),
            InputStream::Gzip(r) => r.read_until(b'\n', buf),
        }
    }
}
