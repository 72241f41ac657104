//! Operator interrupt handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::io::clock::Clock;

/// Longest uninterrupted sleep; bounds how late an interrupt is noticed.
const SLICE: Duration = Duration::from_secs(1);

/// Shared stop flag raised by Ctrl-C.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a Ctrl-C handler that raises this signal.
    pub fn install_ctrlc(&self) -> Result<()> {
        let raised = Arc::clone(&self.raised);
        ctrlc::set_handler(move || {
            warn!("interrupt received, stopping after cleanup");
            raised.store(true, Ordering::SeqCst);
        })
        .context("install Ctrl-C handler")
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Sleep for `total`, waking every second to check the flag.
    ///
    /// Returns `true` if the signal was raised before or during the wait.
    pub fn sleep(&self, clock: &dyn Clock, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.is_raised() {
                return true;
            }
            let slice = remaining.min(SLICE);
            clock.sleep(slice);
            remaining -= slice;
        }
        self.is_raised()
    }
}
