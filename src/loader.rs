//! Single-flight guards for data loaders.
//!
//! A loader owns one [`LoadGuard`]. A call that finds the guard taken is dropped,
//! not queued. Results that arrive after the owner was torn down are discarded via
//! [`Liveness`].

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What happened to a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// Fetched and applied
    Loaded,
    /// Another load was in flight; nothing was fetched
    Skipped,
    /// Fetched, but the owner was torn down before the result could be applied
    Discarded,
}

#[derive(Debug, Default)]
pub struct LoadGuard {
    in_flight: AtomicBool,
}

impl LoadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard. `None` while another load holds it.
    pub fn try_begin(&self) -> Option<LoadTicket<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadTicket { guard: self })
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the guard on drop, so an early `?` return also re-enables loading
#[must_use]
pub struct LoadTicket<'a> {
    guard: &'a LoadGuard,
}

impl Drop for LoadTicket<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

/// Shared alive flag checked before applying fetched state
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn shut_down(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
