//! Incremental line splitting over a chunked byte stream.

/// Splits chunks into lines on `\n`, `\r\n` or a bare `\r` (the downloader
/// redraws its progress line with carriage returns). An unterminated tail is
/// kept and prefixed to the next chunk.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line it completed (without terminators).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in chunk {
            if b == b'\n' || b == b'\r' {
                // "\r\n" yields an empty line for the '\n'; callers skip blanks.
                lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                self.pending.clear();
            } else {
                self.pending.push(b);
            }
        }
        lines
    }

    /// Flush the unterminated tail once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}
