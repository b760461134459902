use std::io::{self, Read};

/// Drops NUL bytes from the wrapped stream.
///
/// Some AlbumData.xml files contain stray NULs, which an XML tokenizer
/// rightly refuses as invalid characters.
#[derive(Debug)]
pub struct NulStripper<R> {
    inner: R,
    stripped: u64,
}

impl<R: Read> NulStripper<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, stripped: 0 }
    }

    /// Number of NUL bytes removed so far.
    pub fn stripped(&self) -> u64 {
        self.stripped
    }
}

impl<R: Read> Read for NulStripper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let read = self.inner.read(buf)?;
            if read == 0 {
                return Ok(0);
            }

            let mut kept = 0;
            for i in 0..read {
                if buf[i] != 0 {
                    buf[kept] = buf[i];
                    kept += 1;
                }
            }
            self.stripped += (read - kept) as u64;

            // A chunk made only of NULs must not look like end of stream.
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}
