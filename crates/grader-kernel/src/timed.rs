//! Deadline-bounded evaluation on a worker thread
//!
//! Each evaluation runs on its own thread. The controlling thread waits at
//! most the deadline for a result; on expiry it trips the worker's
//! [`Interrupt`] and returns [`EvalFault::Timeout`] without joining. A
//! worker stuck inside a single builtin keeps running until that builtin
//! returns, after which it notices the interrupt and exits. Its result is
//! dropped.

use grader_script::ast::{Expr, Program};
use grader_script::{Environment, Interpreter, Interrupt, ScriptError, ScriptResult, Value};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::config::DEFAULT_WORKER_STACK_BYTES;

/// Frames kept on a fault raised by timed code
pub const TRACE_FRAMES: usize = 2;

/// Why a timed evaluation produced no value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalFault {
    #[error("evaluation exceeded {} seconds", format_deadline(*deadline))]
    Timeout { deadline: Duration },

    #[error(transparent)]
    Raised(ScriptError),

    #[error("evaluation worker panicked")]
    WorkerPanicked,

    #[error("could not start evaluation worker: {0}")]
    Spawn(String),
}

impl EvalFault {
    /// Class name shown to students
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            EvalFault::Timeout { .. } => "Timeout",
            EvalFault::Raised(e) => e.class_name(),
            EvalFault::WorkerPanicked => "WorkerPanicked",
            EvalFault::Spawn(_) => "SpawnError",
        }
    }
}

/// Seconds as students read them: `10`, `0.5`
#[must_use]
pub fn format_deadline(deadline: Duration) -> String {
    if deadline.subsec_nanos() == 0 {
        deadline.as_secs().to_string()
    } else {
        deadline.as_secs_f64().to_string()
    }
}

/// Run `work` on a worker thread, waiting at most `deadline`
///
/// # Errors
/// [`EvalFault::Timeout`] when the deadline passes (and `interrupt` is
/// tripped), [`EvalFault::Raised`] with the trace cut to
/// [`TRACE_FRAMES`] frames, [`EvalFault::WorkerPanicked`] when the worker
/// dies without answering.
pub fn run_timed<T, F>(
    deadline: Duration,
    stack_bytes: usize,
    interrupt: &Interrupt,
    work: F,
) -> Result<T, EvalFault>
where
    T: Send + 'static,
    F: FnOnce() -> ScriptResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("grader-eval".into())
        .stack_size(stack_bytes)
        .spawn(move || {
            // the receiver is gone once the deadline has passed
            let _ = tx.send(work());
        })
        .map_err(|e| EvalFault::Spawn(e.to_string()))?;

    match rx.recv_timeout(deadline) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(EvalFault::Raised(e.abbreviated(TRACE_FRAMES))),
        Err(RecvTimeoutError::Timeout) => {
            interrupt.trip();
            tracing::warn!(deadline_ms = deadline.as_millis(), "evaluation timed out");
            Err(EvalFault::Timeout { deadline })
        }
        Err(RecvTimeoutError::Disconnected) => Err(EvalFault::WorkerPanicked),
    }
}

/// Runs interpreter work under a deadline, one fresh interrupt per call
#[derive(Debug, Clone)]
pub struct TimedEvaluator {
    interpreter: Interpreter,
    deadline: Duration,
    stack_bytes: usize,
}

impl TimedEvaluator {
    #[must_use]
    pub fn new(interpreter: Interpreter, deadline: Duration) -> Self {
        Self {
            interpreter,
            deadline,
            stack_bytes: DEFAULT_WORKER_STACK_BYTES,
        }
    }

    #[must_use]
    pub fn with_stack_bytes(mut self, bytes: usize) -> Self {
        self.stack_bytes = bytes;
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    #[must_use]
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Run arbitrary interpreter work under the deadline
    ///
    /// # Errors
    /// See [`run_timed`]
    pub fn run<T, F>(&self, work: F) -> Result<T, EvalFault>
    where
        T: Send + 'static,
        F: FnOnce(&Interpreter) -> ScriptResult<T> + Send + 'static,
    {
        let interrupt = Interrupt::new();
        let interpreter = self.interpreter.clone().with_interrupt(interrupt.clone());
        run_timed(self.deadline, self.stack_bytes, &interrupt, move || {
            work(&interpreter)
        })
    }

    /// Evaluate `expr` against a copy of `env`
    ///
    /// # Errors
    /// See [`run_timed`]
    pub fn eval(&self, expr: Expr, env: Environment) -> Result<Value, EvalFault> {
        self.run(move |interp| interp.eval(&expr, &env))
    }

    /// Execute `program` in `env`, returning the updated environment
    ///
    /// # Errors
    /// See [`run_timed`]
    pub fn exec(&self, program: Program, env: Environment) -> Result<Environment, EvalFault> {
        self.run(move |interp| {
            let mut env = env;
            interp.exec(&program, &mut env)?;
            Ok(env)
        })
    }

    /// Like [`TimedEvaluator::exec`], also returning a trailing expression's value
    ///
    /// # Errors
    /// See [`run_timed`]
    pub fn exec_interactive(
        &self,
        program: Program,
        env: Environment,
    ) -> Result<(Environment, Option<Value>), EvalFault> {
        self.run(move |interp| {
            let mut env = env;
            let value = interp.exec_interactive(&program, &mut env)?;
            Ok((env, value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grader_script::{parse_expression, parse_program, FaultKind};
    use std::time::Instant;

    fn evaluator(deadline: Duration) -> TimedEvaluator {
        TimedEvaluator::new(Interpreter::new(), deadline).with_stack_bytes(16 * 1024 * 1024)
    }

    #[test]
    fn completes_within_deadline() {
        let value = evaluator(Duration::from_secs(5))
            .eval(parse_expression("2 ** 10").unwrap(), Environment::new())
            .unwrap();
        assert_eq!(value, Value::Int(1024));
    }

    #[test]
    fn runaway_loop_times_out_promptly() {
        let deadline = Duration::from_millis(100);
        let started = Instant::now();
        let fault = evaluator(deadline)
            .exec(parse_program("while True:\n    pass").unwrap(), Environment::new())
            .unwrap_err();
        assert_eq!(fault, EvalFault::Timeout { deadline });
        assert!(started.elapsed() < deadline + Duration::from_secs(2));
    }

    #[test]
    fn timeout_trips_the_interrupt() {
        let interrupt = Interrupt::new();
        let seen = interrupt.clone();
        let fault = run_timed(Duration::from_millis(20), 1 << 20, &interrupt, move || {
            while !seen.is_tripped() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        });
        assert!(matches!(fault, Err(EvalFault::Timeout { .. })));
        assert!(interrupt.is_tripped());
    }

    #[test]
    fn raised_fault_keeps_two_innermost_frames() {
        let mut env = Environment::new();
        Interpreter::new()
            .run(
                "def a():\n    return 1 // 0\ndef b():\n    return a()\ndef c():\n    return b()",
                &mut env,
            )
            .unwrap();
        let fault = evaluator(Duration::from_secs(5))
            .eval(parse_expression("c()").unwrap(), env)
            .unwrap_err();
        let EvalFault::Raised(e) = fault else {
            panic!("expected a raised fault, got {fault:?}");
        };
        assert_eq!(e.kind, FaultKind::ZeroDivisionError);
        assert_eq!(e.trace, vec!["a", "b"]);
    }

    #[test]
    fn panicking_worker_is_its_own_fault() {
        let fault = run_timed::<(), _>(Duration::from_secs(5), 1 << 20, &Interrupt::new(), || {
            panic!("worker bug")
        });
        assert_eq!(fault, Err(EvalFault::WorkerPanicked));
    }

    #[test]
    fn exec_returns_updated_environment() {
        let env = evaluator(Duration::from_secs(5))
            .exec(parse_program("x = 3\ny = x + 1").unwrap(), Environment::new())
            .unwrap();
        assert_eq!(env.get("y"), Some(&Value::Int(4)));
    }

    #[test]
    fn deadline_formatting() {
        assert_eq!(format_deadline(Duration::from_secs(10)), "10");
        assert_eq!(format_deadline(Duration::from_millis(500)), "0.5");
    }
}
