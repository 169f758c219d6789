//! Reading student input, and the post-failure console

use crate::error::GraderResult;
use crate::timed::{EvalFault, TimedEvaluator};
use grader_script::{parse_program, Environment, Value};
use std::io::{self, BufRead, Write};

/// Source of typed lines
pub trait Interaction {
    /// Show `prompt` and read one line without its terminator; `None` at end of input
    ///
    /// # Errors
    /// Propagates IO errors from the underlying input
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Prompts on stdout, reads stdin
#[derive(Debug, Default)]
pub struct StdioInteraction;

impl StdioInteraction {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Interaction for StdioInteraction {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

/// Whether a typed line asks to leave
#[must_use]
pub fn is_exit(line: &str) -> bool {
    matches!(line.trim(), "exit()" | "quit()")
}

/// Read-eval-print loop over a failure-point environment
#[derive(Debug)]
pub struct InteractiveConsole<'a> {
    evaluator: &'a TimedEvaluator,
    env: Environment,
}

impl<'a> InteractiveConsole<'a> {
    #[must_use]
    pub fn new(evaluator: &'a TimedEvaluator, env: Environment) -> Self {
        Self { evaluator, env }
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Run until `exit()`, `quit()` or end of input
    ///
    /// # Errors
    /// Propagates IO errors
    pub fn run(&mut self, input: &mut dyn Interaction, out: &mut dyn Write) -> GraderResult<()> {
        writeln!(out, "# Interactive console")?;
        writeln!(out, "# Type exit() to quit")?;
        loop {
            let Some(line) = input.read_line(crate::report::PS1)? else {
                writeln!(out)?;
                break;
            };
            if is_exit(&line) {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let mut source = line;
            if source.trim_end().ends_with(':') {
                while let Some(more) = input.read_line(crate::report::PS2)? {
                    if more.trim().is_empty() {
                        break;
                    }
                    source.push('\n');
                    source.push_str(&more);
                }
            }
            self.eval_source(&source, out)?;
        }
        Ok(())
    }

    fn eval_source(&mut self, source: &str, out: &mut dyn Write) -> GraderResult<()> {
        let program = match parse_program(source) {
            Ok(program) => program,
            Err(e) => {
                writeln!(out, "{e}")?;
                return Ok(());
            }
        };
        match self.evaluator.exec_interactive(program, self.env.clone()) {
            Ok((env, value)) => {
                self.env = env;
                if let Some(value) = value.filter(|v| !matches!(v, Value::None)) {
                    writeln!(out, "{}", value.repr())?;
                }
            }
            Err(EvalFault::Timeout { deadline }) => writeln!(
                out,
                "# Error: evaluation exceeded {} seconds",
                crate::timed::format_deadline(deadline)
            )?,
            Err(fault) => writeln!(out, "{fault}")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grader_script::Interpreter;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Lines(VecDeque<&'static str>);

    impl Interaction for Lines {
        fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
            Ok(self.0.pop_front().map(str::to_string))
        }
    }

    fn session(env: Environment, lines: &[&'static str]) -> (String, Environment) {
        let ev = TimedEvaluator::new(Interpreter::new(), Duration::from_secs(5))
            .with_stack_bytes(16 * 1024 * 1024);
        let mut console = InteractiveConsole::new(&ev, env);
        let mut out = Vec::new();
        console
            .run(&mut Lines(lines.iter().copied().collect()), &mut out)
            .unwrap();
        (String::from_utf8(out).unwrap(), console.environment().clone())
    }

    #[test]
    fn evaluates_against_failure_environment() {
        let mut env = Environment::new();
        env.insert("x", Value::Int(4));
        let (out, env) = session(env, &["x * 2", "y = x", "None", "exit()", "x"]);
        assert_eq!(out, "# Interactive console\n# Type exit() to quit\n8\n");
        assert_eq!(env.get("y"), Some(&Value::Int(4)));
    }

    #[test]
    fn blocks_continue_until_blank_line() {
        let (out, _) = session(
            Environment::new(),
            &["def f(n):", "    return n + 1", "", "f(1)"],
        );
        assert!(out.ends_with("2\n\n"), "{out}");
    }

    #[test]
    fn faults_are_printed_not_raised() {
        let (out, _) = session(Environment::new(), &["1 / 0", "quit()"]);
        assert!(out.contains("ZeroDivisionError: division by zero"), "{out}");
    }
}
