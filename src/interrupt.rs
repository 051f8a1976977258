//! Deferred Ctrl-C handling.
//!
//! The handler only records the request. The apply engine polls
//! [`Interrupt::requested`] between phases, so a hook or dispatch step that is
//! already running is never cut off halfway.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared interrupt flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// A flag that nothing sets except [`Interrupt::trigger`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process-wide Ctrl-C handler and return its flag.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler is already installed.
    pub fn install() -> anyhow::Result<Self> {
        let interrupt = Self::new();
        let flag = Arc::clone(&interrupt.flag);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })?;
        Ok(interrupt)
    }

    /// Mark the interrupt as requested.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once Ctrl-C was pressed.
    #[must_use]
    pub fn requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();
        assert!(!clone.requested());
        interrupt.trigger();
        assert!(clone.requested(), "clones observe the same flag");
    }
}
