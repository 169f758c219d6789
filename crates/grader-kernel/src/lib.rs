//! Grader Kernel
//!
//! Student-side test running and answer-gated unlocking. Tests live in two
//! persisted stores: unlocked cases are run against the student's code, and
//! locked cases are revealed one at a time once the student predicts their
//! outputs.
//!
//! # Core Concepts
//!
//! - [`TimedEvaluator`]: every evaluation runs on a worker thread under a deadline
//! - [`CaseRunner`]: splits a case into steps and compares each step's value
//! - [`Orchestrator`]: suites with setup and teardown, tests, batches
//! - [`UnlockGate`]: strict-order unlocking against keyed-hash digests
//!
//! # Example
//!
//! ```rust
//! use grader_kernel::{GraderConfig, Orchestrator, UnlockedStore};
//!
//! let store: UnlockedStore = serde_json::from_str(
//!     r#"{ "tests": [{ "name": "q1", "suites": [[{ "input": "1 + 1", "outputs": "2" }]] }] }"#,
//! ).unwrap();
//! let mut out = Vec::new();
//! let report = Orchestrator::new(GraderConfig::new())
//!     .run_tests(&store, None, &mut out)
//!     .unwrap();
//! assert!(report.passed());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod case_runner;
pub mod config;
pub mod console;
pub mod error;
pub mod hash;
pub mod lock;
pub mod orchestrator;
pub mod report;
pub mod script;
pub mod store;
pub mod timed;
pub mod unlock;

pub use case_runner::{CaseFailure, CaseOutcome, CaseRunner, FailureKind, Phase, StepRecord};
pub use config::GraderConfig;
pub use console::{Interaction, InteractiveConsole, StdioInteraction};
pub use error::{GraderError, GraderResult, StoreError};
pub use hash::{AnswerDigest, HashKey};
pub use lock::lock_store;
pub use orchestrator::{BatchReport, Orchestrator, SuiteFailure, SuiteReport, TestReport};
pub use script::{CaseScript, Step};
pub use store::{
    AmbleKey, Case, LockedStore, ProjectInfo, Test, TestName, TestStore, UnlockedStore,
};
pub use timed::{run_timed, EvalFault, TimedEvaluator};
pub use unlock::{run_unlock, UnlockEvent, UnlockGate, UnlockState, EXIT_MESSAGE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
