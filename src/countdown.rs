/// Decorative countdown shown while an answer is being generated.
///
/// It bounds the perceived wait only: expiry ends the loading indicator but
/// has no effect on the request in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    /// Value restored by `restart`
    pub start: u32,
    /// Seconds left on the display
    pub remaining: u32,
    running: bool,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still counting; seconds left.
    Running(u32),
    /// This tick reached zero.
    Expired,
    /// Countdown was not running, nothing changed.
    Idle,
}

impl Countdown {
    pub fn new(start: u32) -> Self {
        Self {
            start,
            remaining: start,
            running: false,
        }
    }

    /// Reset to the start value and begin counting.
    pub fn restart(&mut self) {
        self.remaining = self.start;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&mut self) -> Tick {
        if !self.running {
            return Tick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            tracing::debug!("Countdown expired");
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }
}
