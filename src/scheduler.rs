//! Periodic task clock.
//!
//! The steady-state loop runs every tick, but most of its work is periodic:
//! the connectivity recheck, telemetry and heartbeat each run on their own
//! interval.  [`ScheduleClock`] keeps one "last fired" timestamp per task
//! and answers "is it due?" against the current uptime.
//!
//! ```text
//!   tick ──▶ fire_if_due(ConnectivityRecheck) ──▶ maybe recheck link
//!        ──▶ fire_if_due(Telemetry)           ──▶ maybe sample + publish
//!        ──▶ fire_if_due(Heartbeat)           ──▶ maybe publish status
//! ```
//!
//! Tasks are independent.  A late tick fires every task whose interval has
//! elapsed, once; missed periods are never replayed.

use log::debug;

use crate::config::SystemConfig;

// ═══════════════════════════════════════════════════════════════
//  Task identifiers
// ═══════════════════════════════════════════════════════════════

/// The periodic actions driven by the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicTask {
    ConnectivityRecheck,
    Telemetry,
    Heartbeat,
}

impl PeriodicTask {
    const fn index(self) -> usize {
        match self {
            Self::ConnectivityRecheck => 0,
            Self::Telemetry => 1,
            Self::Heartbeat => 2,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Clock
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Slot {
    interval_ms: u64,
    last_fired_ms: u64,
}

/// Per-task "time since last fired" counters.
///
/// Last-fired timestamps start at zero (boot), so the first firing of each
/// task happens one full interval after boot.
#[derive(Debug, Clone)]
pub struct ScheduleClock {
    slots: [Slot; 3],
}

impl ScheduleClock {
    pub fn new(recheck_ms: u32, telemetry_ms: u32, heartbeat_ms: u32) -> Self {
        let slot = |interval: u32| Slot {
            interval_ms: u64::from(interval),
            last_fired_ms: 0,
        };
        Self {
            slots: [slot(recheck_ms), slot(telemetry_ms), slot(heartbeat_ms)],
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.connectivity_recheck_ms,
            config.telemetry_interval_ms,
            config.heartbeat_interval_ms,
        )
    }

    /// If `task`'s interval has elapsed at `now_ms`, record the firing and
    /// return `true`.  The timestamp moves to `now_ms`, not to the nominal
    /// deadline, so a late tick does not cause a burst of catch-up firings.
    pub fn fire_if_due(&mut self, task: PeriodicTask, now_ms: u64) -> bool {
        let slot = &mut self.slots[task.index()];
        if now_ms.saturating_sub(slot.last_fired_ms) < slot.interval_ms {
            return false;
        }
        debug!(
            "Sched: {:?} fired at {}ms ({}ms since last)",
            task,
            now_ms,
            now_ms - slot.last_fired_ms
        );
        slot.last_fired_ms = now_ms;
        true
    }

    /// Timestamp of the last firing of `task` (0 = never since boot).
    pub fn last_fired(&self, task: PeriodicTask) -> u64 {
        self.slots[task.index()].last_fired_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
