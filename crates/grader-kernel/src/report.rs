//! Text rendering shared by the runner, console and unlocker

use crate::case_runner::{CaseFailure, FailureKind, Phase};
use crate::orchestrator::SuiteFailure;
use crate::timed::format_deadline;
use grader_script::Value;
use std::io::{self, Write};

/// Primary interpreter prompt
pub const PS1: &str = ">>> ";
/// Continuation prompt for indented lines
pub const PS2: &str = "... ";

/// `line` followed by a rule of `under` as wide as the line
#[must_use]
pub fn underline(line: &str, under: char) -> String {
    let rule: String = std::iter::repeat(under).take(line.chars().count()).collect();
    format!("{line}\n{rule}")
}

/// Prefix a source line with `>>> `, or `... ` when it continues a block
#[must_use]
pub fn display_prompt(line: &str) -> String {
    let prompt = if line.starts_with([' ', '\t']) { PS2 } else { PS1 };
    format!("{prompt}{line}")
}

/// Write source lines with interpreter prompts, skipping blank ones
///
/// # Errors
/// Propagates write errors
pub fn write_source(out: &mut dyn Write, source: &str) -> io::Result<()> {
    for line in source.lines().filter(|l| !l.trim().is_empty()) {
        writeln!(out, "{}", display_prompt(line))?;
    }
    Ok(())
}

/// One-line description of a failure for the `# Error:` line
#[must_use]
pub fn describe_kind(kind: &FailureKind, expected: Option<&Value>) -> String {
    match kind {
        FailureKind::Mismatch { expected, actual } => {
            format!("expected {} got {}", expected.repr(), actual.repr())
        }
        FailureKind::Timeout { deadline } => {
            format!("evaluation exceeded {} seconds", format_deadline(*deadline))
        }
        FailureKind::Fault {
            phase: Phase::Expression,
            class,
            ..
        } if expected.is_some() => {
            let expected = expected.map(Value::repr).unwrap_or_default();
            format!("expected {expected} got {class}")
        }
        FailureKind::Fault {
            phase,
            class,
            message,
            ..
        } => format!("{} raised {class}: {message}", phase.as_str()),
    }
}

/// Render a case failure the way students read it
///
/// # Errors
/// Propagates write errors
pub fn render_case_failure(out: &mut dyn Write, failure: &CaseFailure) -> io::Result<()> {
    writeln!(out, "{}", underline("Test case failed:", '-'))?;
    write_source(out, &failure.setup)?;
    for record in &failure.transcript {
        for line in &record.statements {
            if !line.trim().is_empty() {
                writeln!(out, "{}", display_prompt(line))?;
            }
        }
        writeln!(out, "{PS1}{}", record.prompt)?;
        if let Some(actual) = &record.actual {
            writeln!(out, "{actual}")?;
        }
    }
    writeln!(
        out,
        "# Error: {}",
        describe_kind(&failure.kind, failure.expected.as_ref())
    )?;
    if let Some(explanation) = &failure.explanation {
        writeln!(out, "# Explanation: {explanation}")?;
    }
    writeln!(out)
}

/// Render any suite failure
///
/// # Errors
/// Propagates write errors
pub fn render_failure(out: &mut dyn Write, failure: &SuiteFailure) -> io::Result<()> {
    match failure {
        SuiteFailure::Case(case) => render_case_failure(out, case),
        SuiteFailure::Setup { setup, kind } => {
            writeln!(out, "{}", underline("Test case failed:", '-'))?;
            write_source(out, setup)?;
            writeln!(out, "# Error: {}", describe_kind(kind, None))?;
            writeln!(out)
        }
    }
}
