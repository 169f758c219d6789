//! Testing utilities for the grader workspace
//!
//! Store and case builders, an evaluator whose `print` output is captured,
//! and a scripted [`Interaction`] that replays queued answer lines.

#![allow(missing_docs)]

use grader_kernel::{
    lock_store, AmbleKey, Case, GraderConfig, HashKey, Interaction, LockedStore, Test, TestName,
    TimedEvaluator, UnlockedStore,
};
use grader_script::{Interpreter, Output, Transcript};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Key used by locked fixtures
pub const FIXTURE_KEY: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f0";

/// Worker stack for test evaluators; far below the production default
pub const TEST_STACK_BYTES: usize = 16 * 1024 * 1024;

pub fn case(input: &str, outputs: &[&str]) -> Case<String> {
    Case {
        input: input.to_string(),
        outputs: outputs.iter().map(ToString::to_string).collect(),
        explanation: None,
    }
}

pub fn explained(mut case: Case<String>, explanation: &str) -> Case<String> {
    case.explanation = Some(explanation.to_string());
    case
}

/// A test with the given suites and no preamble
pub fn test(name: &str, suites: Vec<Vec<Case<String>>>) -> Test<String> {
    let mut test = Test::new(TestName::One(name.to_string()));
    test.suites = suites;
    test
}

pub fn with_preamble(mut test: Test<String>, key: AmbleKey, source: &str) -> Test<String> {
    test.preamble.insert(key, source.to_string());
    test
}

pub fn with_postamble(mut test: Test<String>, key: AmbleKey, source: &str) -> Test<String> {
    test.postamble.insert(key, source.to_string());
    test
}

pub fn store(tests: Vec<Test<String>>) -> UnlockedStore {
    UnlockedStore {
        tests,
        ..UnlockedStore::default()
    }
}

/// Lock `authored` under [`FIXTURE_KEY`]
pub fn locked_pair(authored: &UnlockedStore) -> (LockedStore, UnlockedStore) {
    lock_store(authored, &HashKey::new(FIXTURE_KEY)).unwrap()
}

/// Config with a short timeout and a small worker stack
pub fn test_config(timeout: Duration) -> GraderConfig {
    GraderConfig::new()
        .with_timeout(timeout)
        .with_worker_stack_bytes(TEST_STACK_BYTES)
}

/// Evaluator whose `print` lines land in the returned transcript
pub fn capturing_evaluator(config: &GraderConfig) -> (TimedEvaluator, Transcript) {
    let transcript = Transcript::new();
    let interpreter = Interpreter::new()
        .with_output(Output::Capture(transcript.clone()))
        .with_max_depth(config.max_depth);
    let evaluator =
        TimedEvaluator::new(interpreter, config.timeout).with_stack_bytes(config.worker_stack_bytes);
    (evaluator, transcript)
}

/// Replays queued lines; records every prompt it was shown
#[derive(Debug, Default)]
pub struct ScriptedInteraction {
    lines: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedInteraction {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl Interaction for ScriptedInteraction {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front())
    }
}

/// Install a test-writer subscriber once per process
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
