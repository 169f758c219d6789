//! Cooperative interruption
//!
//! The interpreter polls the flag at every loop iteration and function call.
//! Tripping it from another thread makes the running computation fail with
//! [`FaultKind::Interrupted`](crate::FaultKind::Interrupted) at its next check.

use crate::error::{ScriptError, ScriptResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the computation stop
    pub fn trip(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn check(&self) -> ScriptResult<()> {
        if self.is_tripped() {
            Err(ScriptError::interrupted())
        } else {
            Ok(())
        }
    }
}
