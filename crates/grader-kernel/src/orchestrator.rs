//! Suite and test orchestration
//!
//! The orchestrator owns the run order: shared environment from the
//! project imports, then per test each suite in order with its setup,
//! its cases and exactly one teardown. A failed suite stops its test; a
//! failed test stops the batch unless continue-on-failure is set. No state
//! survives between runs.

use crate::case_runner::{CaseFailure, CaseOutcome, CaseRunner, FailureKind, Phase};
use crate::config::GraderConfig;
use crate::console::{Interaction, InteractiveConsole};
use crate::error::{GraderError, GraderResult};
use crate::report::{render_failure, underline};
use crate::store::{ProjectInfo, Test, UnlockedStore};
use crate::timed::TimedEvaluator;
use grader_script::{dedent, parse_program, Environment, FsLoader, Interpreter};
use std::io::Write;
use std::sync::Arc;

/// Closing reminder printed after a batch that ran to the end
pub const CLOSING_REMINDER: &str = "Remember that the tests in this autograder are not \
exhaustive, so try your own tests in the interpreter!";

/// Why a suite failed
#[derive(Debug, Clone)]
pub enum SuiteFailure {
    Setup { setup: String, kind: FailureKind },
    Case(Box<CaseFailure>),
}

impl SuiteFailure {
    #[must_use]
    pub fn kind(&self) -> &FailureKind {
        match self {
            SuiteFailure::Setup { kind, .. } => kind,
            SuiteFailure::Case(case) => &case.kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub index: usize,
    pub cases_total: usize,
    pub cases_passed: usize,
    pub failure: Option<SuiteFailure>,
    /// Fault raised by the teardown; never changes the result
    pub teardown_fault: Option<FailureKind>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct TestReport {
    pub name: String,
    pub suites_passed: usize,
    pub suites_total: usize,
    /// First failure, which stopped the test
    pub failure: Option<SuiteFailure>,
    pub locked_remaining: usize,
    pub suites: Vec<SuiteReport>,
}

impl TestReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.suites_passed == self.suites_total
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub tests: Vec<TestReport>,
    pub stopped_early: bool,
}

impl BatchReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.tests.iter().all(TestReport::passed)
    }

    /// Multi-line summary of every test
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut text = String::new();
        for test in &self.tests {
            text.push_str(&format!(
                "{}: {}/{} suites passed\n",
                test.name, test.suites_passed, test.suites_total
            ));
        }
        if self.stopped_early {
            text.push_str("(stopped at first failed test)\n");
        }
        text
    }
}

/// Interpreter rooted at the configured module directory
#[must_use]
pub fn interpreter_for(config: &GraderConfig) -> Interpreter {
    Interpreter::new()
        .with_loader(Arc::new(FsLoader::new(&config.module_root)))
        .with_max_depth(config.max_depth)
}

/// Runs tests from an unlocked store
pub struct Orchestrator<'a> {
    config: GraderConfig,
    evaluator: TimedEvaluator,
    console: Option<&'a mut dyn Interaction>,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(config: GraderConfig) -> Self {
        let evaluator = TimedEvaluator::new(interpreter_for(&config), config.timeout)
            .with_stack_bytes(config.worker_stack_bytes);
        Self::with_evaluator(config, evaluator)
    }

    #[must_use]
    pub fn with_evaluator(config: GraderConfig, evaluator: TimedEvaluator) -> Self {
        Self {
            config,
            evaluator,
            console: None,
        }
    }

    /// Input used by the post-failure console when `interactive` is set
    #[must_use]
    pub fn with_console(mut self, input: &'a mut dyn Interaction) -> Self {
        self.console = Some(input);
        self
    }

    #[must_use]
    pub fn evaluator(&self) -> &TimedEvaluator {
        &self.evaluator
    }

    /// Shared environment seeded by the project imports
    ///
    /// # Errors
    /// Returns [`GraderError::Orchestration`] when an import fails
    pub fn build_environment(&self, info: &ProjectInfo) -> GraderResult<Environment> {
        let mut env = Environment::new();
        for line in &info.imports {
            let program = parse_program(line).map_err(|e| {
                GraderError::orchestration(format!("import {line:?} failed: {e}"))
            })?;
            env = self.evaluator.exec(program, env).map_err(|fault| {
                GraderError::orchestration(format!("import {line:?} failed: {fault}"))
            })?;
        }
        tracing::debug!(bindings = env.len(), "shared environment ready");
        Ok(env)
    }

    /// Run one suite against a copy of `shared`
    ///
    /// # Errors
    /// Returns [`GraderError::Orchestration`] for cases whose slots do not
    /// match their steps
    pub fn run_suite(
        &self,
        test: &Test<String>,
        index: usize,
        shared: &Environment,
    ) -> GraderResult<SuiteReport> {
        let suite = test.suites.get(index).map_or(&[][..], Vec::as_slice);
        let setup = test.setup_for(index);
        let mut report = SuiteReport {
            index,
            cases_total: suite.len(),
            cases_passed: 0,
            failure: None,
            teardown_fault: None,
        };

        let result = self.run_cases(suite, &setup, shared, &mut report);
        report.teardown_fault = self.run_teardown(&test.teardown_for(index), shared);
        if let Some(fault) = &report.teardown_fault {
            tracing::warn!(test = test.display_name(), suite = index, ?fault, "teardown failed");
        }
        result?;

        tracing::info!(
            test = test.display_name(),
            suite = index,
            passed = report.passed(),
            cases = report.cases_passed,
            "suite finished"
        );
        Ok(report)
    }

    fn run_cases(
        &self,
        suite: &[crate::store::Case<String>],
        setup: &str,
        shared: &Environment,
        report: &mut SuiteReport,
    ) -> GraderResult<()> {
        let mut suite_env = shared.clone();
        if !setup.trim().is_empty() {
            let outcome = parse_program(setup)
                .map_err(|e| FailureKind::from_error(Phase::Setup, e))
                .and_then(|program| {
                    self.evaluator
                        .exec(program, suite_env.clone())
                        .map_err(|fault| FailureKind::from_fault(Phase::Setup, fault))
                });
            match outcome {
                Ok(env) => suite_env = env,
                Err(kind) => {
                    report.failure = Some(SuiteFailure::Setup {
                        setup: setup.to_string(),
                        kind,
                    });
                    return Ok(());
                }
            }
        }

        let runner = CaseRunner::new(&self.evaluator);
        for (index, case) in suite.iter().enumerate() {
            tracing::debug!(case = index, "running case");
            match runner.run_case(case, setup, suite_env.clone())? {
                CaseOutcome::Passed { environment, .. } => {
                    report.cases_passed += 1;
                    if self.config.share_case_bindings {
                        suite_env = environment;
                    }
                }
                CaseOutcome::Failed(failure) => {
                    report.failure = Some(SuiteFailure::Case(failure));
                    break;
                }
            }
        }
        Ok(())
    }

    fn run_teardown(&self, teardown: &str, shared: &Environment) -> Option<FailureKind> {
        if teardown.trim().is_empty() {
            return None;
        }
        let program = match parse_program(teardown) {
            Ok(program) => program,
            Err(e) => return Some(FailureKind::from_error(Phase::Teardown, e)),
        };
        self.evaluator
            .exec(program, shared.clone())
            .err()
            .map(|fault| FailureKind::from_fault(Phase::Teardown, fault))
    }

    /// Run every suite of `test` in order, stopping at the first failure
    ///
    /// # Errors
    /// Propagates write errors and orchestration errors
    pub fn run_test(
        &mut self,
        test: &Test<String>,
        shared: &Environment,
        out: &mut dyn Write,
    ) -> GraderResult<TestReport> {
        let name = test.display_name().to_string();
        writeln!(out, "{}", underline(&format!("Test {name}"), '='))?;
        if let Some(note) = &test.note {
            for line in dedent(note) {
                writeln!(out, "{line}")?;
            }
        }

        let mut suites = Vec::with_capacity(test.suites.len());
        let mut failure = None;
        for index in 0..test.suites.len() {
            let report = self.run_suite(test, index, shared)?;
            let failed = report.failure.clone();
            suites.push(report);
            if let Some(failed) = failed {
                render_failure(out, &failed)?;
                self.open_console(&failed, out)?;
                failure = Some(failed);
                break;
            }
        }

        let report = TestReport {
            suites_passed: suites.iter().filter(|s| s.passed()).count(),
            suites_total: test.suites.len(),
            failure,
            locked_remaining: test.locked_remaining(),
            suites,
            name,
        };
        writeln!(
            out,
            "{}/{} suites passed",
            report.suites_passed, report.suites_total
        )?;
        if report.passed() {
            writeln!(out, "All unlocked tests passed!")?;
        }
        if report.locked_remaining > 0 {
            writeln!(
                out,
                "Note: {} still has {} locked cases.",
                report.name, report.locked_remaining
            )?;
        }
        writeln!(out)?;
        tracing::info!(test = %report.name, passed = report.passed(), "test finished");
        Ok(report)
    }

    fn open_console(&mut self, failure: &SuiteFailure, out: &mut dyn Write) -> GraderResult<()> {
        if !self.config.interactive {
            return Ok(());
        }
        let Some(input) = self.console.as_deref_mut() else {
            return Ok(());
        };
        let env = match failure {
            SuiteFailure::Case(case) => case.environment.clone(),
            SuiteFailure::Setup { .. } => Environment::new(),
        };
        InteractiveConsole::new(&self.evaluator, env).run(input, out)
    }

    /// Run one named test, or every test in store order
    ///
    /// # Errors
    /// [`GraderError::UnknownTest`] when `question` names no test, plus
    /// orchestration and write errors
    pub fn run_tests(
        &mut self,
        store: &UnlockedStore,
        question: Option<&str>,
        out: &mut dyn Write,
    ) -> GraderResult<BatchReport> {
        let tests: Vec<&Test<String>> = match question {
            Some(name) => vec![store
                .find(name)
                .ok_or_else(|| GraderError::UnknownTest(name.to_string()))?],
            None => store.tests.iter().collect(),
        };
        let shared = self.build_environment(&store.project_info)?;

        let mut batch = BatchReport::default();
        for test in tests {
            let report = self.run_test(test, &shared, out)?;
            let passed = report.passed();
            batch.tests.push(report);
            if !passed && !self.config.continue_on_failure {
                batch.stopped_early = true;
                break;
            }
        }

        if !batch.stopped_early {
            writeln!(out, "{}", underline("Note:", '-'))?;
            writeln!(out, "{CLOSING_REMINDER}")?;
        }
        Ok(batch)
    }
}
