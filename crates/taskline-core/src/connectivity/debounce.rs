//! Debouncing of raw connectivity readings.

use std::time::Duration;

use tokio::time::Instant;

/// A settled connectivity change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Online,
    Offline,
}

/// Turns a noisy stream of online/offline readings into settled transitions.
///
/// A reading settles once no different reading arrives for `window`. A
/// settled value equal to the previous settled value produces no transition.
/// The first settled value always produces one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    settled: Option<bool>,
    candidate: Option<(bool, Instant)>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            settled: None,
            candidate: None,
        }
    }

    /// Last settled value, if any
    pub const fn settled(&self) -> Option<bool> {
        self.settled
    }

    /// Feed a raw reading taken at `now`.
    pub fn observe(&mut self, online: bool, now: Instant) {
        match self.candidate {
            // Repeats do not restart the window
            Some((value, _)) if value == online => {}
            _ => self.candidate = Some((online, now)),
        }
    }

    /// When the current candidate settles, if there is one
    pub fn deadline(&self) -> Option<Instant> {
        self.candidate.map(|(_, since)| since + self.window)
    }

    /// Settle the candidate if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Transition> {
        let (value, since) = self.candidate?;
        if now < since + self.window {
            return None;
        }

        self.candidate = None;
        if self.settled == Some(value) {
            return None;
        }

        self.settled = Some(value);
        Some(if value {
            Transition::Online
        } else {
            Transition::Offline
        })
    }
}
