//! Line splitting for encoder output.
//!
//! ffmpeg redraws its status line with `\r`, so a reader that only splits on
//! `\n` would see a whole encode as one line. [`LineReader`] treats both
//! `\r` and `\n` as terminators and skips empty segments.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub struct LineReader<R> {
    reader: R,
    pending: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
        }
    }

    /// Returns the next non-empty, trimmed line, or `None` at end of stream.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let (consumed, terminated) = {
                let buf = self.reader.fill_buf().await?;
                if buf.is_empty() {
                    (0, None)
                } else {
                    match buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
                        Some(pos) => {
                            self.pending.extend_from_slice(&buf[..pos]);
                            (pos + 1, Some(true))
                        }
                        None => {
                            self.pending.extend_from_slice(buf);
                            (buf.len(), Some(false))
                        }
                    }
                }
            };

            match terminated {
                // End of stream: flush whatever is left.
                None => return Ok(self.take_pending()),
                Some(true) => {
                    self.reader.consume(consumed);
                    if let Some(line) = self.take_pending() {
                        return Ok(Some(line));
                    }
                }
                Some(false) => self.reader.consume(consumed),
            }
        }
    }

    fn take_pending(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &'static [u8]) -> Vec<String> {
        let mut reader = LineReader::new(input);
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_splits_on_newline_and_carriage_return() {
        let lines = collect(b"header\nframe=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\ndone").await;
        assert_eq!(
            lines,
            vec![
                "header",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
                "done",
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_blank_segments() {
        let lines = collect(b"\r\n\n  \r  a  \n\n").await;
        assert_eq!(lines, vec!["a"]);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        assert!(collect(b"").await.is_empty());
    }
}
