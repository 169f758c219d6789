//! Running one unlocked case
//!
//! A case is split into steps ([`CaseScript`]). Each step executes its
//! statements, resolves the expected value, evaluates the prompt and
//! compares the two with `==`. The first step that does not match ends the
//! case. After a matching step `_` is bound to its value.

use crate::error::{GraderError, GraderResult};
use crate::script::{CaseScript, Step};
use crate::store::Case;
use crate::timed::{EvalFault, TimedEvaluator};
use grader_script::{parse_expression, parse_program, Environment, ScriptError, Value};
use std::time::Duration;

/// Name bound to the previous step's value
pub const LAST_VALUE: &str = "_";

/// Where in a suite a fault was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Setup,
    Statement,
    Expression,
    Expected,
    Teardown,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Statement => "statement",
            Phase::Expression => "expression",
            Phase::Expected => "expected output",
            Phase::Teardown => "teardown",
        }
    }
}

/// Why a case or suite step failed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    Fault {
        phase: Phase,
        class: String,
        message: String,
        trace: Vec<String>,
    },
    Timeout {
        deadline: Duration,
    },
    Mismatch {
        expected: Value,
        actual: Value,
    },
}

impl FailureKind {
    #[must_use]
    pub fn from_fault(phase: Phase, fault: EvalFault) -> Self {
        match fault {
            EvalFault::Timeout { deadline } => FailureKind::Timeout { deadline },
            EvalFault::Raised(e) => FailureKind::from_error(phase, e),
            other => FailureKind::Fault {
                phase,
                class: other.class_name().to_string(),
                message: other.to_string(),
                trace: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn from_error(phase: Phase, error: ScriptError) -> Self {
        FailureKind::Fault {
            phase,
            class: error.class_name().to_string(),
            message: error.message,
            trace: error.trace,
        }
    }
}

/// What was attempted for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub statements: Vec<String>,
    pub prompt: String,
    /// Repr of the prompt's value, when it was computed
    pub actual: Option<String>,
}

impl StepRecord {
    fn new(step: &Step) -> Self {
        Self {
            statements: step.statements.clone(),
            prompt: step.prompt.clone(),
            actual: None,
        }
    }
}

/// Everything needed to show and explore a failed case
#[derive(Debug, Clone)]
pub struct CaseFailure {
    pub input: String,
    pub outputs: Vec<String>,
    pub explanation: Option<String>,
    /// Setup source in effect for the suite
    pub setup: String,
    /// Zero-based index of the failing step
    pub step: usize,
    pub kind: FailureKind,
    /// Expected value of the failing step, when it was resolved
    pub expected: Option<Value>,
    /// One record per attempted step, the failing one last
    pub transcript: Vec<StepRecord>,
    /// Bindings at the failure point
    pub environment: Environment,
}

#[derive(Debug, Clone)]
pub enum CaseOutcome {
    Passed {
        steps: usize,
        environment: Environment,
    },
    Failed(Box<CaseFailure>),
}

impl CaseOutcome {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, CaseOutcome::Passed { .. })
    }
}

/// Runs unlocked cases through a [`TimedEvaluator`]
#[derive(Debug, Clone, Copy)]
pub struct CaseRunner<'a> {
    evaluator: &'a TimedEvaluator,
}

impl<'a> CaseRunner<'a> {
    #[must_use]
    pub fn new(evaluator: &'a TimedEvaluator) -> Self {
        Self { evaluator }
    }

    /// Run `case` starting from `env`
    ///
    /// # Errors
    /// Returns [`GraderError::Orchestration`] when the case's output count
    /// does not match its step count
    pub fn run_case(
        &self,
        case: &Case<String>,
        setup: &str,
        env: Environment,
    ) -> GraderResult<CaseOutcome> {
        let script = CaseScript::parse(&case.input);
        if script.len() != case.outputs.len() {
            return Err(GraderError::orchestration(format!(
                "case has {} steps but {} outputs",
                script.len(),
                case.outputs.len()
            )));
        }

        let mut env = env;
        let mut transcript = Vec::with_capacity(script.len());
        for (index, (step, expected_src)) in script.steps.iter().zip(&case.outputs).enumerate() {
            tracing::debug!(step = index, prompt = %step.prompt, "running step");
            let mut record = StepRecord::new(step);
            let fail = |record: StepRecord,
                        kind: FailureKind,
                        expected: Option<Value>,
                        env: Environment,
                        mut transcript: Vec<StepRecord>|
             -> GraderResult<CaseOutcome> {
                transcript.push(record);
                Ok(CaseOutcome::Failed(Box::new(CaseFailure {
                    input: case.input.clone(),
                    outputs: case.outputs.clone(),
                    explanation: case.explanation.clone(),
                    setup: setup.to_string(),
                    step: index,
                    kind,
                    expected,
                    transcript,
                    environment: env,
                })))
            };

            if !step.statements.is_empty() {
                let statements = match parse_program(&step.statement_source()) {
                    Ok(program) => program,
                    Err(e) => {
                        let kind = FailureKind::from_error(Phase::Statement, e);
                        return fail(record, kind, None, env, transcript);
                    }
                };
                match self.evaluator.exec(statements, env.clone()) {
                    Ok(next) => env = next,
                    Err(fault) => {
                        let kind = FailureKind::from_fault(Phase::Statement, fault);
                        return fail(record, kind, None, env, transcript);
                    }
                }
            }

            let expected = match self.resolve_expected(expected_src, &env) {
                Ok(value) => value,
                Err(e) => {
                    let kind = FailureKind::from_error(Phase::Expected, e);
                    return fail(record, kind, None, env, transcript);
                }
            };

            let prompt = match parse_expression(&step.prompt) {
                Ok(expr) => expr,
                Err(e) => {
                    let kind = FailureKind::from_error(Phase::Expression, e);
                    return fail(record, kind, Some(expected), env, transcript);
                }
            };
            let actual = match self.evaluator.eval(prompt, env.clone()) {
                Ok(value) => value,
                Err(fault) => {
                    let kind = FailureKind::from_fault(Phase::Expression, fault);
                    return fail(record, kind, Some(expected), env, transcript);
                }
            };

            record.actual = Some(actual.repr());
            if actual != expected {
                tracing::debug!(step = index, expected = %expected.repr(), actual = %actual.repr(), "step mismatch");
                let kind = FailureKind::Mismatch {
                    expected: expected.clone(),
                    actual,
                };
                return fail(record, kind, Some(expected), env, transcript);
            }
            transcript.push(record);
            env.insert(LAST_VALUE, actual);
        }

        Ok(CaseOutcome::Passed {
            steps: script.len(),
            environment: env,
        })
    }

    /// Evaluate an expected-output source; only literal-like expressions may appear
    fn resolve_expected(&self, source: &str, env: &Environment) -> Result<Value, ScriptError> {
        let expr = parse_expression(source)?;
        if !expr.is_restricted() {
            return Err(ScriptError::new(
                grader_script::FaultKind::SyntaxError,
                format!("expected output {source:?} is not a literal expression"),
            ));
        }
        self.evaluator.interpreter().eval(&expr, env)
    }
}
