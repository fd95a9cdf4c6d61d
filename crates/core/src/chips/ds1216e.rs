//! DS1216E SmartWatch: a phantom clock that sits underneath a ROM.
//!
//! The chip watches ROM accesses. Address bit 2 low marks a write cycle
//! whose data bit is address bit 0. Once the 64-bit recognition pattern has
//! been written, the next 64 accesses move the clock registers one bit at a
//! time, LSB first: read cycles (A2 high) put the bit on D0 of the ROM byte,
//! write cycles shift a bit in. Everything else passes the ROM byte through.
//!
//! | Reg | Contents                                        |
//! |-----|-------------------------------------------------|
//! | 0   | hundredths of a second                          |
//! | 1   | seconds                                         |
//! | 2   | minutes                                         |
//! | 3   | hours, bit 7 12-hour mode, bit 5 PM             |
//! | 4   | bit 5 oscillator off, bit 4 reset, 2-0 weekday  |
//! | 5   | day of month                                    |
//! | 6   | month                                           |
//! | 7   | year                                            |

use crate::calendar::{self, Field};
use crate::chips::{ChipBase, Host};
use crate::snapshot::{Snapshot, SnapshotError};

pub const REG_SIZE: usize = 8;

pub const REG_100TH_SECONDS: usize = 0;
pub const REG_SECONDS: usize = 1;
pub const REG_MINUTES: usize = 2;
pub const REG_HOURS: usize = 3;
pub const REG_DAYS: usize = 4;
pub const REG_DATE: usize = 5;
pub const REG_MONTHS: usize = 6;
pub const REG_YEARS: usize = 7;

const DAY_OSC: u8 = 0x20;
const DAY_RST: u8 = 0x10;
const HOURS_12H: u8 = 0x80;

const PATTERN: [u8; 8] = [0xc5, 0x3a, 0xa3, 0x5c, 0xc5, 0x3a, 0xa3, 0x5c];
const TRANSFER_BITS: u8 = 64;

const SNAP_MODULE_NAME: &str = "RTC_DS1216E";
const SNAP_MAJOR: u8 = 0;
const SNAP_MINOR: u8 = 0;

fn pattern_bit(pos: u8) -> bool {
    PATTERN[(pos / 8) as usize] & (1 << (pos % 8)) != 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Bits of the recognition pattern matched so far.
    Recognize(u8),
    /// Bits moved since recognition.
    Transfer(u8),
}

pub struct Ds1216e {
    base: ChipBase,
    phase: Phase,
    clock_regs: [u8; REG_SIZE],
    changed: [bool; REG_SIZE],
}

impl Ds1216e {
    /// The register blob keeps the 12-hour and reset bits across sessions.
    pub fn new(device: &str, host: &Host) -> Self {
        Ds1216e {
            base: ChipBase::open(device, host, 0, REG_SIZE),
            phase: Phase::Recognize(0),
            clock_regs: [0; REG_SIZE],
            changed: [false; REG_SIZE],
        }
    }

    pub fn destroy(self, save: bool) {
        self.base.destroy(save);
    }

    pub fn offset(&self) -> i64 {
        self.base.offset
    }

    pub fn is_halted(&self) -> bool {
        self.base.halted
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn time(&self) -> i64 {
        self.base.current()
    }

    fn twelve_hour(&self) -> bool {
        self.base.regs[REG_HOURS] & HOURS_12H != 0
    }

    fn latch_clock_regs(&mut self) {
        let t = self.base.current();
        let hours = if self.twelve_hour() {
            HOURS_12H | calendar::get_hour_am_pm(t, true)
        } else {
            calendar::get_hour(t, true)
        };
        let osc = if self.base.halted { DAY_OSC } else { 0 };
        self.clock_regs = [
            calendar::get_centisecond(self.base.clock(), true),
            calendar::get_second(t, true),
            calendar::get_minute(t, true),
            hours,
            osc | (self.base.regs[REG_DAYS] & DAY_RST) | (calendar::get_weekday(t, false) + 1),
            calendar::get_day_of_month(t, true),
            calendar::get_month(t, true),
            calendar::get_year(t, true),
        ];
        self.changed = [false; REG_SIZE];
    }

    fn update_clock(&mut self) {
        let regs = self.clock_regs;
        if self.changed[REG_YEARS] {
            self.base.set_field(Field::Year, regs[REG_YEARS] as i32, true);
        }
        if self.changed[REG_MONTHS] {
            self.base.set_field(Field::Month, (regs[REG_MONTHS] & 0x1f) as i32, true);
        }
        if self.changed[REG_DATE] {
            self.base.set_field(Field::DayOfMonth, (regs[REG_DATE] & 0x3f) as i32, true);
        }
        if self.changed[REG_DAYS] {
            self.base.set_field(Field::Weekday, (regs[REG_DAYS] & 7) as i32 - 1, false);
        }
        if self.changed[REG_HOURS] {
            let val = regs[REG_HOURS];
            let field = if val & HOURS_12H != 0 { Field::HourAmPm } else { Field::Hour };
            self.base.set_field(field, (val & 0x3f) as i32, true);
            self.base.regs[REG_HOURS] = val & HOURS_12H;
        }
        if self.changed[REG_MINUTES] {
            self.base.set_field(Field::Minute, (regs[REG_MINUTES] & 0x7f) as i32, true);
        }
        if self.changed[REG_SECONDS] {
            self.base.set_field(Field::Second, (regs[REG_SECONDS] & 0x7f) as i32, true);
        }
        if self.changed[REG_DAYS] {
            let val = regs[REG_DAYS];
            self.base.regs[REG_DAYS] = val & DAY_RST;
            if val & DAY_OSC != 0 {
                self.base.halt();
            } else {
                self.base.resume();
            }
        }
    }

    fn recognize(&mut self, pos: u8, bit: bool) {
        self.phase = if bit == pattern_bit(pos) {
            if pos + 1 == TRANSFER_BITS {
                log::trace!("{}: pattern recognized", self.base.device);
                self.latch_clock_regs();
                Phase::Transfer(0)
            } else {
                Phase::Recognize(pos + 1)
            }
        } else if bit == pattern_bit(0) {
            Phase::Recognize(1)
        } else {
            Phase::Recognize(0)
        };
    }

    /// A ROM access at `address`. Returns the byte the host sees.
    pub fn read(&mut self, address: u16, rom_byte: u8) -> u8 {
        let write_cycle = address & 4 == 0;
        let bit = address & 1 != 0;
        match self.phase {
            Phase::Recognize(pos) => {
                if write_cycle {
                    self.recognize(pos, bit);
                }
                rom_byte
            }
            Phase::Transfer(n) => {
                let reg = (n / 8) as usize;
                let mask = 1 << (n % 8);
                let out = if write_cycle {
                    if bit {
                        self.clock_regs[reg] |= mask;
                    } else {
                        self.clock_regs[reg] &= !mask;
                    }
                    self.changed[reg] = true;
                    rom_byte
                } else {
                    (rom_byte & 0xfe) | (self.clock_regs[reg] & mask != 0) as u8
                };
                self.phase = if n + 1 == TRANSFER_BITS {
                    self.update_clock();
                    Phase::Recognize(0)
                } else {
                    Phase::Transfer(n + 1)
                };
                out
            }
        }
    }

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_bool(self.base.halted);
        m.write_time(self.base.halt_latch);
        m.write_time(self.base.offset);
        m.write_time(self.base.old_offset);
        m.write_bytes(&self.base.regs);
        m.write_bytes(&self.base.old_regs);
        m.write_bytes(&self.clock_regs);
        for &c in &self.changed {
            m.write_bool(c);
        }
        let (tag, pos) = match self.phase {
            Phase::Recognize(p) => (0, p),
            Phase::Transfer(p) => (1, p),
        };
        m.write_u8(tag);
        m.write_u8(pos);
        self.base.write_device(&mut m);
        m.close();
        Ok(())
    }

    pub fn read_snapshot(&mut self, s: &Snapshot) -> Result<(), SnapshotError> {
        let mut r = s.open_versioned(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        let halted = r.read_bool()?;
        let halt_latch = r.read_time()?;
        let offset = r.read_time()?;
        let old_offset = r.read_time()?;
        let mut regs = vec![0u8; REG_SIZE];
        let mut old_regs = vec![0u8; REG_SIZE];
        let mut clock_regs = [0u8; REG_SIZE];
        r.read_into(&mut regs)?;
        r.read_into(&mut old_regs)?;
        r.read_into(&mut clock_regs)?;
        let mut changed = [false; REG_SIZE];
        for c in changed.iter_mut() {
            *c = r.read_bool()?;
        }
        let tag = r.read_u8()?;
        let pos = r.read_u8()?;
        let phase = match tag {
            0 if pos < TRANSFER_BITS => Phase::Recognize(pos),
            1 if pos < TRANSFER_BITS => Phase::Transfer(pos),
            _ => return Err(r.malformed(format!("bad phase {}/{}", tag, pos))),
        };
        let device = r.read_str()?;

        self.base.halted = halted;
        self.base.halt_latch = halt_latch;
        self.base.offset = offset;
        self.base.old_offset = old_offset;
        self.base.regs = regs;
        self.base.old_regs = old_regs;
        self.clock_regs = clock_regs;
        self.changed = changed;
        self.phase = phase;
        self.base.device = device;
        Ok(())
    }
}
