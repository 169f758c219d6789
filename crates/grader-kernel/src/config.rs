//! Grader configuration

use grader_script::DEFAULT_MAX_DEPTH;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-evaluation deadline in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default stack reserved for each evaluation worker (virtual, committed lazily)
pub const DEFAULT_WORKER_STACK_BYTES: usize = 256 * 1024 * 1024;

/// Grader configuration
///
/// Filled from CLI flags by the `grader` binary; tests build it with the
/// `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraderConfig {
    /// Wall-clock deadline for every timed evaluation
    pub timeout: Duration,
    /// Keep running later tests after a failed one
    pub continue_on_failure: bool,
    /// Open the console after a failure display
    pub interactive: bool,
    /// Let later cases of a suite see earlier cases' bindings
    pub share_case_bindings: bool,
    /// Directory student modules are imported from
    pub module_root: PathBuf,
    pub locked_path: PathBuf,
    pub unlocked_path: PathBuf,
    pub worker_stack_bytes: usize,
    /// Call depth at which scripts raise `RecursionError`
    pub max_depth: usize,
}

impl GraderConfig {
    /// Create config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_continue_on_failure(mut self, enabled: bool) -> Self {
        self.continue_on_failure = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_interactive(mut self, enabled: bool) -> Self {
        self.interactive = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_share_case_bindings(mut self, enabled: bool) -> Self {
        self.share_case_bindings = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_module_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.module_root = root.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_locked_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.locked_path = path.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_unlocked_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.unlocked_path = path.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_worker_stack_bytes(mut self, bytes: usize) -> Self {
        self.worker_stack_bytes = bytes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            continue_on_failure: false,
            interactive: false,
            share_case_bindings: false,
            module_root: PathBuf::from("."),
            locked_path: PathBuf::from("locked_tests.json"),
            unlocked_path: PathBuf::from("unlocked_tests.json"),
            worker_stack_bytes: DEFAULT_WORKER_STACK_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
