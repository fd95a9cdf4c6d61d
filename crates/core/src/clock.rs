//! Host wall-clock sources.
//!
//! Every chip derives its notion of "now" from a [`TimeSource`]. The real
//! emulator uses [`SystemClock`]; tests and tools that need to move time by
//! hand use [`ManualClock`], which can be cloned and shared with any number
//! of chips.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of host wall-clock time.
pub trait TimeSource {
    /// Whole seconds since the Unix epoch.
    fn now(&self) -> i64;
    /// Hundredths of the current second (0..=99).
    fn centisecond(&self) -> u8;
}

/// Host system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    fn since_epoch() -> (i64, u32) {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_micros()),
            // Host clock before 1970: report the epoch itself
            Err(_) => (0, 0),
        }
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> i64 {
        Self::since_epoch().0
    }

    fn centisecond(&self) -> u8 {
        (Self::since_epoch().1 / 10_000) as u8
    }
}

/// A settable clock. Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Rc<Cell<i64>>,
    centis: Rc<Cell<u8>>,
}

impl ManualClock {
    pub fn new(secs: i64) -> Self {
        ManualClock {
            secs: Rc::new(Cell::new(secs)),
            centis: Rc::new(Cell::new(0)),
        }
    }

    pub fn set(&self, secs: i64) {
        self.secs.set(secs);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.set(self.secs.get() + secs);
    }

    pub fn set_centisecond(&self, cs: u8) {
        self.centis.set(cs.min(99));
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> i64 {
        self.secs.get()
    }

    fn centisecond(&self) -> u8 {
        self.centis.get()
    }
}
