//! Error types for script execution
//!
//! Every fault raised while lexing, parsing or evaluating a snippet is a
//! [`ScriptError`]. The [`FaultKind`] name is what students see ("NameError",
//! "ZeroDivisionError", ...), so the names follow the conventional spelling
//! test authors expect.

use std::fmt;

/// Classification of a script fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    SyntaxError,
    NameError,
    TypeError,
    ValueError,
    IndexError,
    ZeroDivisionError,
    OverflowError,
    RecursionError,
    AssertionError,
    ImportError,
    MemoryError,
    /// The computation was abandoned through its interrupt flag
    Interrupted,
}

impl FaultKind {
    /// User-facing class name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FaultKind::SyntaxError => "SyntaxError",
            FaultKind::NameError => "NameError",
            FaultKind::TypeError => "TypeError",
            FaultKind::ValueError => "ValueError",
            FaultKind::IndexError => "IndexError",
            FaultKind::ZeroDivisionError => "ZeroDivisionError",
            FaultKind::OverflowError => "OverflowError",
            FaultKind::RecursionError => "RecursionError",
            FaultKind::AssertionError => "AssertionError",
            FaultKind::ImportError => "ImportError",
            FaultKind::MemoryError => "MemoryError",
            FaultKind::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fault raised by script code
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: FaultKind,
    pub message: String,
    /// Function frames the fault unwound through, innermost first
    pub trace: Vec<String>,
}

impl ScriptError {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Syntax error at a 1-based source line
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::new(
            FaultKind::SyntaxError,
            format!("line {line}: {}", message.into()),
        )
    }

    pub fn name_error(name: &str) -> Self {
        Self::new(FaultKind::NameError, format!("name '{name}' is not defined"))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::ValueError, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::IndexError, message)
    }

    pub fn zero_division() -> Self {
        Self::new(FaultKind::ZeroDivisionError, "division by zero")
    }

    pub fn overflow() -> Self {
        Self::new(FaultKind::OverflowError, "integer result too large")
    }

    pub fn interrupted() -> Self {
        Self::new(FaultKind::Interrupted, "evaluation was interrupted")
    }

    /// Record that the fault unwound through function `frame`
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.trace.push(frame.into());
        self
    }

    /// Keep only the `limit` innermost frames of the trace
    #[must_use]
    pub fn abbreviated(mut self, limit: usize) -> Self {
        self.trace.truncate(limit);
        self
    }

    /// User-facing class name of the fault
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Result alias for script operations
pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = ScriptError::name_error("foo");
        assert_eq!(err.to_string(), "NameError: name 'foo' is not defined");
    }

    #[test]
    fn syntax_error_mentions_line() {
        let err = ScriptError::syntax(3, "unexpected token");
        assert_eq!(err.class_name(), "SyntaxError");
        assert!(err.message.starts_with("line 3:"));
    }

    #[test]
    fn abbreviated_keeps_innermost_frames() {
        let err = ScriptError::zero_division()
            .with_frame("inner")
            .with_frame("middle")
            .with_frame("outer")
            .abbreviated(2);
        assert_eq!(err.trace, vec!["inner".to_string(), "middle".to_string()]);
    }
}
