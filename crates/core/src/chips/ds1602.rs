//! DS1602 elapsed time counter.
//!
//! Two 32-bit seconds counters behind a three-wire interface (RST, CLK, DQ).
//! The continuous counter always runs and is kept as an offset from the host
//! clock. The Vcc-active counter only runs while the chip object exists; its
//! value is stored in the register blob on save.
//!
//! A transfer starts with RST high and a command byte clocked in LSB first.
//! DQ is sampled on rising CLK edges and the chip drives read data after
//! each falling edge.
//!
//! | Command bits      | Meaning                                        |
//! |-------------------|------------------------------------------------|
//! | `1c.. ...d`       | 32-bit transfer, c = 1 Vcc counter, d = 1 read |
//! | `0ab t tt..`      | clear: a continuous, b Vcc; t oscillator trim  |

use crate::chips::{ChipBase, Host};
use crate::snapshot::{Snapshot, SnapshotError};

/// Vcc counter (LE u32) then the trim byte.
pub const REG_SIZE: usize = 5;
const REG_TRIM: usize = 4;

const CMD_TRANSFER: u8 = 0x80;
const CMD_VCC_COUNTER: u8 = 0x40;
const CMD_READ: u8 = 0x01;
const CMD_CLEAR_CONTINUOUS: u8 = 0x40;
const CMD_CLEAR_VCC: u8 = 0x20;
const CMD_TRIM_MASK: u8 = 0x1c;

const SNAP_MODULE_NAME: &str = "RTC_DS1602";
const SNAP_MAJOR: u8 = 0;
const SNAP_MINOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Continuous,
    Vcc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// RST low, or the command finished.
    Idle,
    Command { byte: u8, bit: u8 },
    /// Read command accepted, first bit goes out on the next falling edge.
    ReadSetup { value: u32 },
    Read { value: u32, bit: u8 },
    Write { counter: Counter, value: u32, bit: u8 },
}

pub struct Ds1602 {
    base: ChipBase,
    vcc_base: u32,
    vcc_start: i64,
    phase: Phase,
    rst_line: bool,
    clk_line: bool,
    dq_line: bool,
}

impl Ds1602 {
    pub fn new(device: &str, host: &Host) -> Self {
        let base = ChipBase::open(device, host, 0, REG_SIZE);
        let vcc_base = u32::from_le_bytes([base.regs[0], base.regs[1], base.regs[2], base.regs[3]]);
        let vcc_start = base.now();
        Ds1602 {
            base,
            vcc_base,
            vcc_start,
            phase: Phase::Idle,
            rst_line: false,
            clk_line: false,
            dq_line: false,
        }
    }

    pub fn destroy(mut self, save: bool) {
        self.store_vcc_counter();
        self.base.destroy(save);
    }

    pub fn offset(&self) -> i64 {
        self.base.offset
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trim(&self) -> u8 {
        self.base.regs[REG_TRIM]
    }

    pub fn continuous_counter(&self) -> u32 {
        self.base.running() as u32
    }

    pub fn vcc_counter(&self) -> u32 {
        self.vcc_base.wrapping_add((self.base.now() - self.vcc_start) as u32)
    }

    fn store_vcc_counter(&mut self) {
        let value = self.vcc_counter();
        self.base.regs[..4].copy_from_slice(&value.to_le_bytes());
    }

    fn set_counter(&mut self, counter: Counter, value: u32) {
        log::trace!("{}: {:?} counter = {}", self.base.device, counter, value);
        match counter {
            Counter::Continuous => self.base.offset = value as i64 - self.base.now(),
            Counter::Vcc => {
                self.vcc_base = value;
                self.vcc_start = self.base.now();
                self.store_vcc_counter();
            }
        }
    }

    fn run_command(&mut self, cmd: u8) -> Phase {
        log::trace!("{}: command {:02x}", self.base.device, cmd);
        if cmd & CMD_TRANSFER == 0 {
            if cmd & CMD_CLEAR_CONTINUOUS != 0 {
                self.set_counter(Counter::Continuous, 0);
            }
            if cmd & CMD_CLEAR_VCC != 0 {
                self.set_counter(Counter::Vcc, 0);
            }
            self.base.regs[REG_TRIM] = cmd & CMD_TRIM_MASK;
            return Phase::Idle;
        }
        let counter = if cmd & CMD_VCC_COUNTER != 0 { Counter::Vcc } else { Counter::Continuous };
        if cmd & CMD_READ != 0 {
            let value = match counter {
                Counter::Continuous => self.continuous_counter(),
                Counter::Vcc => self.vcc_counter(),
            };
            Phase::ReadSetup { value }
        } else {
            Phase::Write { counter, value: 0, bit: 0 }
        }
    }

    pub fn set_reset_line(&mut self, high: bool) {
        if self.rst_line == high {
            return;
        }
        self.rst_line = high;
        self.phase = if high { Phase::Command { byte: 0, bit: 0 } } else { Phase::Idle };
    }

    pub fn set_clock_line(&mut self, high: bool) {
        if self.clk_line == high {
            return;
        }
        self.clk_line = high;
        if !self.rst_line {
            return;
        }
        let dq = self.dq_line as u32;
        self.phase = match (self.phase, high) {
            (Phase::Command { byte, bit }, true) => {
                let byte = byte | ((dq as u8) << bit);
                if bit == 7 {
                    self.run_command(byte)
                } else {
                    Phase::Command { byte, bit: bit + 1 }
                }
            }
            (Phase::Write { counter, value, bit }, true) => {
                let value = value | (dq << bit);
                if bit == 31 {
                    self.set_counter(counter, value);
                    Phase::Idle
                } else {
                    Phase::Write { counter, value, bit: bit + 1 }
                }
            }
            (Phase::ReadSetup { value }, false) => Phase::Read { value, bit: 0 },
            (Phase::Read { value, bit }, false) => {
                if bit == 31 {
                    Phase::Idle
                } else {
                    Phase::Read { value, bit: bit + 1 }
                }
            }
            (phase, _) => phase,
        };
    }

    pub fn set_data_line(&mut self, high: bool) {
        self.dq_line = high;
    }

    pub fn read_data_line(&self) -> bool {
        match self.phase {
            Phase::Read { value, bit } => value & (1 << bit) != 0,
            _ => true,
        }
    }

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_time(self.base.offset);
        m.write_time(self.base.old_offset);
        m.write_bytes(&self.base.regs);
        m.write_bytes(&self.base.old_regs);
        m.write_u32(self.vcc_base);
        m.write_time(self.vcc_start);
        let (tag, a, b, c) = match self.phase {
            Phase::Idle => (0, 0, 0, 0),
            Phase::Command { byte, bit } => (1, byte as u32, bit, 0),
            Phase::ReadSetup { value } => (2, value, 0, 0),
            Phase::Read { value, bit } => (3, value, bit, 0),
            Phase::Write { counter, value, bit } => (4, value, bit, (counter == Counter::Vcc) as u8),
        };
        m.write_u8(tag);
        m.write_u32(a);
        m.write_u8(b);
        m.write_u8(c);
        m.write_bool(self.rst_line);
        m.write_bool(self.clk_line);
        m.write_bool(self.dq_line);
        self.base.write_device(&mut m);
        m.close();
        Ok(())
    }

    pub fn read_snapshot(&mut self, s: &Snapshot) -> Result<(), SnapshotError> {
        let mut r = s.open_versioned(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        let offset = r.read_time()?;
        let old_offset = r.read_time()?;
        let mut regs = vec![0u8; REG_SIZE];
        let mut old_regs = vec![0u8; REG_SIZE];
        r.read_into(&mut regs)?;
        r.read_into(&mut old_regs)?;
        let vcc_base = r.read_u32()?;
        let vcc_start = r.read_time()?;
        let tag = r.read_u8()?;
        let a = r.read_u32()?;
        let b = r.read_u8()?;
        let c = r.read_u8()?;
        let phase = match tag {
            0 => Phase::Idle,
            1 if b < 8 => Phase::Command { byte: a as u8, bit: b },
            2 => Phase::ReadSetup { value: a },
            3 if b < 32 => Phase::Read { value: a, bit: b },
            4 if b < 32 => Phase::Write {
                counter: if c != 0 { Counter::Vcc } else { Counter::Continuous },
                value: a,
                bit: b,
            },
            _ => return Err(r.malformed(format!("bad phase {}", tag))),
        };
        let rst_line = r.read_bool()?;
        let clk_line = r.read_bool()?;
        let dq_line = r.read_bool()?;
        let device = r.read_str()?;

        self.base.offset = offset;
        self.base.old_offset = old_offset;
        self.base.regs = regs;
        self.base.old_regs = old_regs;
        self.vcc_base = vcc_base;
        self.vcc_start = vcc_start;
        self.phase = phase;
        self.rst_line = rst_line;
        self.clk_line = clk_line;
        self.dq_line = dq_line;
        self.base.device = device;
        Ok(())
    }
}
