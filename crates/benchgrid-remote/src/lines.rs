//! Splits a byte stream into text lines.

/// Accumulates partial chunks and yields complete lines.
///
/// Invalid UTF-8 is replaced, and a trailing `\r` is stripped so CRLF
/// output logs cleanly.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode(&line[..line.len() - 1]));
        }
        lines
    }

    /// Flush an unterminated last line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode(&rest))
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_lines() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"one\ntwo\n"), vec!["one", "two"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn joins_lines_across_chunks() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"fra").is_empty());
        assert_eq!(buf.push(b"me 1\nfra"), vec!["frame 1"]);
        assert_eq!(buf.push(b"me 2\r\n"), vec!["frame 2"]);
    }

    #[test]
    fn flushes_trailing_partial_line() {
        let mut buf = LineBuffer::new();
        buf.push(b"done\nexit");
        assert_eq!(buf.finish().as_deref(), Some("exit"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn keeps_empty_lines() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"\n\nx\n"), vec!["", "", "x"]);
    }
}
