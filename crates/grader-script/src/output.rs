//! Where `print` goes

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Captured `print` lines, shared between clones
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Number of captured lines equal to `line`
    #[must_use]
    pub fn count(&self, line: &str) -> usize {
        self.lines.lock().iter().filter(|l| *l == line).count()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Output {
    #[default]
    Stdout,
    Capture(Transcript),
}

impl Output {
    pub(crate) fn write_line(&self, line: &str) {
        match self {
            Output::Stdout => {
                let mut out = std::io::stdout().lock();
                // a closed stdout must not turn into a script fault
                let _ = writeln!(out, "{line}");
            }
            Output::Capture(transcript) => transcript.push(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_lines_in_order() {
        let transcript = Transcript::new();
        let out = Output::Capture(transcript.clone());
        out.write_line("one");
        out.write_line("two");
        out.write_line("one");
        assert_eq!(transcript.lines(), vec!["one", "two", "one"]);
        assert_eq!(transcript.count("one"), 2);
    }
}
