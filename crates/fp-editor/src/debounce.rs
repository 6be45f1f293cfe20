//! Cancel-and-reschedule deadlines on a host-supplied millisecond clock.
//!
//! The editor runs in the browser as well as natively, and wasm has no
//! `Instant`, so callers pass `now` explicitly and drive firing through
//! [`Debouncer::fire_if_due`].

/// Milliseconds on whatever monotonic clock the host uses.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    delay_ms: Millis,
    deadline: Option<Millis>,
}

impl Debouncer {
    pub const fn new(delay_ms: Millis) -> Self {
        Self {
            delay_ms,
            deadline: None,
        }
    }

    pub fn delay_ms(&self) -> Millis {
        self.delay_ms
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }

    /// Replace any pending deadline with `now + delay`.
    pub fn schedule(&mut self, now: Millis) {
        self.deadline = Some(now.saturating_add(self.delay_ms));
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the deadline if it has passed.
    pub fn fire_if_due(&mut self, now: Millis) -> bool {
        match self.deadline {
            Some(at) if now >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Consume the deadline regardless of time. Used on teardown to run a
    /// pending action immediately.
    pub fn take_pending(&mut self) -> bool {
        self.cancel()
    }
}
