//! Trusted-call bypass for internal code paths.
//!
//! The scope lives inside the request-scoped authorization context, never
//! in process-wide state, so one request's trusted flag cannot bleed into
//! another request even across reused worker threads.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A re-entrant trusted flag for one logical call scope.
#[derive(Debug, Default)]
pub struct TrustedScope {
    trusted: AtomicBool,
}

impl TrustedScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted.load(Ordering::Acquire)
    }

    /// Sets the flag. Returns true iff this call flipped it from unset to
    /// set, i.e. the caller is the root scope.
    fn enter(&self) -> bool {
        !self.trusted.swap(true, Ordering::AcqRel)
    }

    fn exit(&self) {
        self.trusted.store(false, Ordering::Release);
    }
}

/// Scoped acquisition of the trusted flag.
///
/// Enter on construction, exit on drop. Only the root guard clears the
/// flag, so nested guards cannot prematurely end an outer trusted scope.
/// Drop runs on all exit paths, including early returns and `?`.
#[must_use = "the trusted scope ends when this guard is dropped"]
#[derive(Debug)]
pub struct TrustedCall {
    scope: Arc<TrustedScope>,
    root: bool,
}

impl TrustedCall {
    pub fn enter(scope: Arc<TrustedScope>) -> Self {
        let root = scope.enter();
        Self { scope, root }
    }
}

impl Drop for TrustedCall {
    fn drop(&mut self) {
        if self.root {
            self.scope.exit();
        }
    }
}
