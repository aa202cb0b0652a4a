use std::time::Duration;

/// Deterministic frame metadata.
///
/// UI timers (such as a panel closing itself after a success message) advance
/// by frames instead of reading the wall clock, so they can be replayed in
/// tests without sleeping.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Time elapsed since the previous frame.
    pub dt: Duration,
}

impl Frame {
    pub fn new(index: u64, dt: Duration) -> Self {
        Self { index, dt }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt)
    }

    /// Time since frame 0, assuming a fixed `dt`.
    pub fn elapsed(&self) -> Duration {
        self.dt.saturating_mul(self.index.min(u32::MAX as u64) as u32)
    }
}

/// A one-shot countdown driven by [`Frame`]s.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: Duration,
}

impl Countdown {
    pub fn new(delay: Duration) -> Self {
        Self { remaining: delay }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Advances by one frame. Returns `true` once the countdown has elapsed.
    pub fn tick(&mut self, frame: Frame) -> bool {
        self.remaining = self.remaining.saturating_sub(frame.dt);
        self.remaining.is_zero()
    }
}
