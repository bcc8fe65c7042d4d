use std::io::{self, Read};

// ---------------------------------------------------------------------------
// ProgressReader – reports every read to a callback
// ---------------------------------------------------------------------------

/// Wraps a reader and calls `callback` with the number of bytes returned by
/// each successful `read`. The callback runs on the hot read path, so it
/// should do no more than bump a counter.
pub struct ProgressReader<R, F> {
    inner: R,
    callback: F,
}

impl<R, F> ProgressReader<R, F>
where
    R: Read,
    F: FnMut(usize),
{
    pub fn new(inner: R, callback: F) -> Self {
        Self { inner, callback }
    }
}

impl<R, F> Read for ProgressReader<R, F>
where
    R: Read,
    F: FnMut(usize),
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        (self.callback)(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reports_every_byte_read() {
        let data = vec![7u8; 10_000];
        let mut total = 0usize;
        let mut calls = 0usize;
        let mut out = Vec::new();
        {
            let mut reader = ProgressReader::new(Cursor::new(&data), |n| {
                total += n;
                calls += 1;
            });
            reader.read_to_end(&mut out).unwrap();
        }
        assert_eq!(out, data);
        assert_eq!(total, data.len());
        // read_to_end issues a final zero-length read at EOF
        assert!(calls >= 2);
    }
}
