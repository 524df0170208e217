//! Last-scheduled-wins debounce bookkeeping.
//!
//! `Debounce` does not own a timer. It hands out generations: the caller arms
//! a real timer tagged with the returned generation and, when that timer fires,
//! asks `fire` whether the generation is still current. Re-arming or cancelling
//! makes every older generation stale.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    generation: u64,
    armed: bool,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            armed: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms (or re-arms) the debounce and returns the new generation.
    pub fn arm(&mut self) -> u64 {
        self.generation += 1;
        self.armed = true;
        self.generation
    }

    pub fn cancel(&mut self) {
        if self.armed {
            self.generation += 1;
            self.armed = false;
        }
    }

    /// Returns true if `generation` is the live one; disarms on success.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.armed && generation == self.generation {
            self.armed = false;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
