//! DS1307: I2C clock with 56 bytes of battery-backed RAM.
//!
//! The host bit-bangs SCL and SDA through [`Ds1307::set_clock_line`] and
//! [`Ds1307::set_data_line`] and samples SDA with [`Ds1307::read_data_line`].
//! The chip acts on falling clock edges. A falling data line while the clock
//! is high is START, a rising one is STOP.
//!
//! | Reg  | Contents                                   |
//! |------|--------------------------------------------|
//! | 0x00 | seconds, bit 7 clock halt                  |
//! | 0x01 | minutes                                    |
//! | 0x02 | hours, bit 6 12-hour mode, bit 5 PM        |
//! | 0x03 | day of week 1..7                           |
//! | 0x04 | day of month                               |
//! | 0x05 | month                                      |
//! | 0x06 | year                                       |
//! | 0x07 | control (only bits 7, 4, 1, 0 stored)      |
//! | 0x08-0x3F | RAM                                   |
//!
//! Bus address 0xD0 writes, 0xD1 reads. Clock values are captured at START
//! so a multi-byte read is consistent.

use crate::calendar::{self, Field};
use crate::chips::{ChipBase, Host};
use crate::snapshot::{Snapshot, SnapshotError};

pub const RAM_SIZE: usize = 56;
pub const REG_SIZE: usize = 8;

pub const REG_SECONDS_CH: u8 = 0;
pub const REG_MINUTES: u8 = 1;
pub const REG_HOURS: u8 = 2;
pub const REG_DAYS_OF_WEEK: u8 = 3;
pub const REG_DAYS_OF_MONTH: u8 = 4;
pub const REG_MONTHS: u8 = 5;
pub const REG_YEARS: u8 = 6;
pub const REG_CONTROL: u8 = 7;

pub const WRITE_ADDRESS: u8 = 0xd0;
pub const READ_ADDRESS: u8 = 0xd1;

const REG_PTR_MASK: u8 = 0x3f;

const SNAP_MODULE_NAME: &str = "RTC_DS1307";
const SNAP_MAJOR: u8 = 0;
const SNAP_MINOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cState {
    Idle,
    StartWait,
    GetAddress,
    GetRegNr,
    ReadRegs,
    WriteRegs,
    AddressReadAck,
    AddressWriteAck,
    RegNrAck,
    WriteAck,
    ReadAck,
}

impl I2cState {
    fn to_byte(self) -> u8 {
        match self {
            I2cState::Idle => 0,
            I2cState::StartWait => 1,
            I2cState::GetAddress => 2,
            I2cState::GetRegNr => 3,
            I2cState::ReadRegs => 4,
            I2cState::WriteRegs => 5,
            I2cState::AddressReadAck => 6,
            I2cState::AddressWriteAck => 7,
            I2cState::RegNrAck => 8,
            I2cState::WriteAck => 9,
            I2cState::ReadAck => 10,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => I2cState::Idle,
            1 => I2cState::StartWait,
            2 => I2cState::GetAddress,
            3 => I2cState::GetRegNr,
            4 => I2cState::ReadRegs,
            5 => I2cState::WriteRegs,
            6 => I2cState::AddressReadAck,
            7 => I2cState::AddressWriteAck,
            8 => I2cState::RegNrAck,
            9 => I2cState::WriteAck,
            10 => I2cState::ReadAck,
            _ => return None,
        })
    }
}

pub struct Ds1307 {
    base: ChipBase,
    twelve_hour: bool,
    regs_for_read: [u8; REG_SIZE],
    state: I2cState,
    reg: u8,
    reg_ptr: u8,
    bit: u8,
    sclk_line: bool,
    data_line: bool,
}

impl Ds1307 {
    pub fn new(device: &str, host: &Host) -> Self {
        let base = ChipBase::open(device, host, RAM_SIZE, REG_SIZE);
        let twelve_hour = base.regs[REG_HOURS as usize] & 0x40 != 0;
        Ds1307 {
            base,
            twelve_hour,
            regs_for_read: [0; REG_SIZE],
            state: I2cState::Idle,
            reg: 0,
            reg_ptr: 0,
            bit: 0,
            sclk_line: true,
            data_line: true,
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

    pub fn state(&self) -> I2cState {
        self.state
    }

    /// Last byte written to each clock register.
    pub fn registers(&self) -> &[u8] {
        &self.base.regs
    }

    /// Chip time, frozen while halted.
    pub fn time(&self) -> i64 {
        self.base.current()
    }

    // ─── Register file ──────────────────────────────────────────────────

    fn i2c_start(&mut self) {
        let t = self.base.current();
        let hours = if self.twelve_hour {
            0x40 | calendar::get_hour_am_pm(t, true)
        } else {
            calendar::get_hour(t, true)
        };
        self.regs_for_read = [
            ((self.base.halted as u8) << 7) | calendar::get_second(t, true),
            calendar::get_minute(t, true),
            hours,
            calendar::get_weekday(t, false) + 1,
            calendar::get_day_of_month(t, true),
            calendar::get_month(t, true),
            calendar::get_year(t, true),
            self.base.regs[REG_CONTROL as usize],
        ];
        self.state = I2cState::StartWait;
        self.reg = 0;
        self.bit = 0;
    }

    fn read_register(&self, addr: u8) -> u8 {
        match addr as usize {
            a if a < REG_SIZE => self.regs_for_read[a],
            a => self.base.ram[a - REG_SIZE],
        }
    }

    fn write_register(&mut self, addr: u8, val: u8) {
        log::trace!("{}: write reg {:02x} = {:02x}", self.base.device, addr, val);
        if (addr as usize) < REG_SIZE {
            self.base.regs[addr as usize] = if addr == REG_CONTROL { val & 0x93 } else { val };
        }
        match addr {
            REG_SECONDS_CH => {
                self.base.set_field(Field::Second, (val & 0x7f) as i32, true);
                if val & 0x80 != 0 {
                    self.base.halt();
                } else {
                    self.base.resume();
                }
            }
            REG_MINUTES => self.base.set_field(Field::Minute, val as i32, true),
            REG_HOURS => {
                self.twelve_hour = val & 0x40 != 0;
                if self.twelve_hour {
                    self.base.set_field(Field::HourAmPm, (val & 0x3f) as i32, true);
                } else {
                    self.base.set_field(Field::Hour, (val & 0x3f) as i32, true);
                }
            }
            REG_DAYS_OF_WEEK => self.base.set_field(Field::Weekday, val as i32 - 1, false),
            REG_DAYS_OF_MONTH => self.base.set_field(Field::DayOfMonth, val as i32, true),
            REG_MONTHS => self.base.set_field(Field::Month, val as i32, true),
            REG_YEARS => self.base.set_field(Field::Year, val as i32, true),
            REG_CONTROL => {}
            _ => self.base.ram[addr as usize - REG_SIZE] = val,
        }
    }

    // ─── Bit shifting ───────────────────────────────────────────────────

    /// Shift the data line into `reg`, MSB first. True once a byte is complete.
    fn shift_in(&mut self) -> bool {
        self.reg |= (self.data_line as u8) << (7 - self.bit);
        self.bit += 1;
        self.bit == 8
    }

    fn falling_edge(&mut self) {
        match self.state {
            I2cState::StartWait => self.state = I2cState::GetAddress,
            I2cState::GetAddress => {
                if self.shift_in() {
                    self.state = match self.reg {
                        WRITE_ADDRESS => I2cState::AddressWriteAck,
                        READ_ADDRESS => I2cState::AddressReadAck,
                        _ => I2cState::Idle,
                    };
                }
            }
            I2cState::GetRegNr => {
                if self.shift_in() {
                    self.state = I2cState::RegNrAck;
                    self.reg_ptr = self.reg & REG_PTR_MASK;
                }
            }
            I2cState::ReadRegs => {
                self.bit += 1;
                if self.bit == 8 {
                    self.state = I2cState::ReadAck;
                }
            }
            I2cState::WriteRegs => {
                if self.shift_in() {
                    self.write_register(self.reg_ptr, self.reg);
                    self.state = I2cState::WriteAck;
                    self.reg_ptr = (self.reg_ptr + 1) & REG_PTR_MASK;
                }
            }
            I2cState::ReadAck => {
                // Master NACK ends the read
                if self.data_line {
                    self.state = I2cState::Idle;
                } else {
                    self.state = I2cState::ReadRegs;
                    self.bit = 0;
                    self.reg_ptr = (self.reg_ptr + 1) & REG_PTR_MASK;
                    self.reg = self.read_register(self.reg_ptr);
                }
            }
            I2cState::AddressReadAck => {
                self.state = I2cState::ReadRegs;
                self.reg = self.read_register(self.reg_ptr);
                self.bit = 0;
            }
            I2cState::RegNrAck | I2cState::WriteAck => {
                self.state = I2cState::WriteRegs;
                self.reg = 0;
                self.bit = 0;
            }
            I2cState::AddressWriteAck => {
                self.state = I2cState::GetRegNr;
                self.reg = 0;
                self.bit = 0;
            }
            I2cState::Idle => {}
        }
    }

    pub fn set_clock_line(&mut self, high: bool) {
        if self.sclk_line == high {
            return;
        }
        if !high {
            self.falling_edge();
        }
        self.sclk_line = high;
    }

    pub fn set_data_line(&mut self, high: bool) {
        if self.data_line == high {
            return;
        }
        if self.sclk_line {
            if high {
                // STOP
                self.state = I2cState::Idle;
            } else {
                self.i2c_start();
            }
        }
        self.data_line = high;
    }

    pub fn read_data_line(&self) -> bool {
        match self.state {
            I2cState::ReadRegs => self.reg & (0x80 >> self.bit) != 0,
            I2cState::AddressReadAck
            | I2cState::AddressWriteAck
            | I2cState::RegNrAck
            | I2cState::ReadAck
            | I2cState::WriteAck => false,
            _ => true,
        }
    }

    // ─── Snapshot ───────────────────────────────────────────────────────

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_bool(self.base.halted);
        m.write_time(self.base.halt_latch);
        m.write_bool(self.twelve_hour);
        m.write_time(self.base.offset);
        m.write_time(self.base.old_offset);
        m.write_bytes(&self.base.regs);
        m.write_bytes(&self.base.old_regs);
        m.write_bytes(&self.regs_for_read);
        m.write_bytes(&self.base.ram);
        m.write_bytes(&self.base.old_ram);
        m.write_u8(self.state.to_byte());
        m.write_u8(self.reg);
        m.write_u8(self.reg_ptr);
        m.write_u8(self.bit);
        m.write_bool(self.sclk_line);
        m.write_bool(self.data_line);
        self.base.write_device(&mut m);
        m.close();
        Ok(())
    }

    pub fn read_snapshot(&mut self, s: &Snapshot) -> Result<(), SnapshotError> {
        let mut r = s.open_versioned(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        let halted = r.read_bool()?;
        let halt_latch = r.read_time()?;
        let twelve_hour = r.read_bool()?;
        let offset = r.read_time()?;
        let old_offset = r.read_time()?;
        let mut regs = vec![0u8; REG_SIZE];
        let mut old_regs = vec![0u8; REG_SIZE];
        let mut regs_for_read = [0u8; REG_SIZE];
        let mut ram = vec![0u8; RAM_SIZE];
        let mut old_ram = vec![0u8; RAM_SIZE];
        r.read_into(&mut regs)?;
        r.read_into(&mut old_regs)?;
        r.read_into(&mut regs_for_read)?;
        r.read_into(&mut ram)?;
        r.read_into(&mut old_ram)?;
        let state_byte = r.read_u8()?;
        let state = I2cState::from_byte(state_byte)
            .ok_or_else(|| r.malformed(format!("unknown bus state {}", state_byte)))?;
        let reg = r.read_u8()?;
        let reg_ptr = r.read_u8()?;
        let bit = r.read_u8()?;
        let sclk_line = r.read_bool()?;
        let data_line = r.read_bool()?;
        let device = r.read_str()?;
        if bit > 8 || reg_ptr > REG_PTR_MASK {
            return Err(r.malformed("bus cursor out of range"));
        }

        self.base.halted = halted;
        self.base.halt_latch = halt_latch;
        self.twelve_hour = twelve_hour;
        self.base.offset = offset;
        self.base.old_offset = old_offset;
        self.base.regs = regs;
        self.base.old_regs = old_regs;
        self.regs_for_read = regs_for_read;
        self.base.ram = ram;
        self.base.old_ram = old_ram;
        self.state = state;
        self.reg = reg;
        self.reg_ptr = reg_ptr;
        self.bit = bit;
        self.sclk_line = sclk_line;
        self.data_line = data_line;
        self.base.device = device;
        Ok(())
    }
}
