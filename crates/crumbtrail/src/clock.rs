//! Time Sources for Breadcrumb Timestamps
//!
//! Network descriptors record start/end times and the reference sink stamps
//! every breadcrumb. Both read through [`Clock`] so tests can pin time.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in milliseconds since the Unix epoch
pub trait Clock: fmt::Debug {
    /// Current time in milliseconds
    fn now_ms(&self) -> u64;
}

/// Shared clock handle
pub type SharedClock = Rc<dyn Clock>;

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually driven clock for deterministic tests
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the instrumenter.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    current_ms: Rc<Cell<u64>>,
}

impl FakeClock {
    /// Create a clock fixed at `time_ms`
    #[must_use]
    pub fn fixed(time_ms: u64) -> Self {
        Self {
            current_ms: Rc::new(Cell::new(time_ms)),
        }
    }

    /// Set clock to a fixed time
    pub fn set_fixed_time(&self, time_ms: u64) {
        self.current_ms.set(time_ms);
    }

    /// Fast-forward time by milliseconds
    pub fn fast_forward_ms(&self, ms: u64) {
        self.current_ms.set(self.current_ms.get().saturating_add(ms));
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.get()
    }
}

/// Create a shared wall clock
#[must_use]
pub fn system_clock() -> SharedClock {
    Rc::new(SystemClock)
}
