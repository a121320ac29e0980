//! Cached knowledge of whether a remote procedure exists.
//!
//! Each procedure gets a [`CapabilityCell`], an atomic tri-state that starts
//! `Unknown`. A 404 moves it to `Absent` for good; after that the
//! coordinator never calls the procedure again until the cell is reset.
//! Racing callers may send a few redundant probes before the cell settles.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use serde::Serialize;

const UNKNOWN: u8 = 0;
const AVAILABLE: u8 = 1;
const ABSENT: u8 = 2;

/// What we know about a remote procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Never called yet
    Unknown,
    /// Answered at least once
    Available,
    /// Returned 404; local-only from now on
    Absent,
}

impl Capability {
    fn from_u8(raw: u8) -> Self {
        match raw {
            AVAILABLE => Capability::Available,
            ABSENT => Capability::Absent,
            _ => Capability::Unknown,
        }
    }
}

/// Shared atomic cell holding a [`Capability`].
#[derive(Debug, Default)]
pub struct CapabilityCell {
    raw: AtomicU8,
}

impl CapabilityCell {
    pub const fn new() -> Self {
        Self {
            raw: AtomicU8::new(UNKNOWN),
        }
    }

    pub fn get(&self) -> Capability {
        Capability::from_u8(self.raw.load(Ordering::Acquire))
    }

    /// Whether the remote procedure should still be attempted.
    pub fn should_attempt(&self) -> bool {
        self.get() != Capability::Absent
    }

    /// Record a usable answer. An `Absent` cell stays absent.
    pub fn mark_available(&self) {
        let _ = self
            .raw
            .compare_exchange(UNKNOWN, AVAILABLE, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Record a 404. Returns `true` only for the call that made the change.
    pub fn mark_absent(&self) -> bool {
        self.raw.swap(ABSENT, Ordering::AcqRel) != ABSENT
    }

    /// Forget everything learned so far.
    pub fn reset(&self) {
        self.raw.store(UNKNOWN, Ordering::Release);
    }
}

/// Process-wide capability cells, one per remote procedure.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub rate_limit: Arc<CapabilityCell>,
    pub circuit_breaker: Arc<CapabilityCell>,
}

impl Capabilities {
    /// Fresh cells not shared with the rest of the process.
    pub fn isolated() -> Self {
        Self {
            rate_limit: Arc::new(CapabilityCell::new()),
            circuit_breaker: Arc::new(CapabilityCell::new()),
        }
    }

    /// The cells shared by every coordinator in this process.
    pub fn process_wide() -> Self {
        static GLOBAL: OnceLock<Capabilities> = OnceLock::new();
        GLOBAL.get_or_init(Capabilities::isolated).clone()
    }

    /// Reset both cells to `Unknown`.
    pub fn reset(&self) {
        self.rate_limit.reset();
        self.circuit_breaker.reset();
    }
}
