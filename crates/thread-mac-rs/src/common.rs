/// A one-shot deadline in microseconds of the caller-supplied clock.
///
/// Timers are polled: the owner calls `fire` from its `tick` and acts when it
/// returns true. A fired deadline disarms itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    deadline_us: Option<u64>,
}

impl Deadline {
    pub const fn new() -> Self {
        Self { deadline_us: None }
    }

    /// Arms the deadline `duration_us` after `now_us`.
    pub fn start(&mut self, now_us: u64, duration_us: u64) {
        self.deadline_us = Some(now_us.saturating_add(duration_us));
    }

    /// Arms the deadline at an absolute time.
    pub fn start_at(&mut self, at_us: u64) {
        self.deadline_us = Some(at_us);
    }

    pub fn stop(&mut self) {
        self.deadline_us = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline_us.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline_us
    }

    /// Returns true and disarms if the deadline has passed.
    pub fn fire(&mut self, now_us: u64) -> bool {
        match self.deadline_us {
            Some(deadline) if now_us >= deadline => {
                self.deadline_us = None;
                true
            }
            _ => false,
        }
    }
}

/// Returns the earliest of a set of optional deadlines.
pub fn earliest(deadlines: &[Option<u64>]) -> Option<u64> {
    deadlines.iter().flatten().copied().min()
}
