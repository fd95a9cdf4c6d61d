//! PCF8583: I2C clock/calendar with 240 bytes of RAM.
//!
//! Unlike the DS1307 the state machine samples on rising clock edges. Bus
//! address 0xA0 writes, 0xA1 reads.
//!
//! | Reg  | Contents                                        |
//! |------|-------------------------------------------------|
//! | 0x00 | control, bit 7 stops the clock                  |
//! | 0x01 | hundredths of a second                          |
//! | 0x02 | seconds                                         |
//! | 0x03 | minutes                                         |
//! | 0x04 | hours, bit 7 12-hour mode, bit 6 PM             |
//! | 0x05 | bits 7-6 year mod 4, bits 5-0 day of month      |
//! | 0x06 | bits 7-5 weekday, bits 4-0 month                |
//! | 0x07 | timer (reads 0)                                 |
//! | 0x08-0x0F | alarm registers, stored but not evaluated  |
//! | 0x10-0xFF | RAM                                        |
//!
//! Some cartridges wire the chip so the host sees the read stream shifted by
//! a few clocks. A non-zero `read_bit_shift` switches reads to a continuous
//! train of nine bits per register (eight data bits and an ack slot).

use crate::calendar::{self, Field};
use crate::chips::{ChipBase, Host};
use crate::snapshot::{Snapshot, SnapshotError};

pub const RAM_SIZE: usize = 240;
pub const REG_SIZE: usize = 16;

pub const REG_CONTROL: u8 = 0;
pub const REG_100TH_SECONDS: u8 = 1;
pub const REG_SECONDS: u8 = 2;
pub const REG_MINUTES: u8 = 3;
pub const REG_HOURS: u8 = 4;
pub const REG_YEARS_MONTH_DAYS: u8 = 5;
pub const REG_WEEK_DAYS_MONTHS: u8 = 6;
pub const REG_TIMER_DAYS: u8 = 7;
pub const REG_ALARM_CONTROL: u8 = 8;
pub const REG_TIMER_ALARM: u8 = 15;

pub const WRITE_ADDRESS: u8 = 0xa0;
pub const READ_ADDRESS: u8 = 0xa1;

const TRAIN_SLOTS: i32 = 9;
const TRAIN_REG_MASK: u8 = 0x1f;

const SNAP_MODULE_NAME: &str = "RTC_PCF8583";
const SNAP_MAJOR: u8 = 0;
const SNAP_MINOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cState {
    Idle,
    GetAddress,
    GetRegNr,
    ReadRegs,
    ReadRegsTrain,
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
            I2cState::GetAddress => 1,
            I2cState::GetRegNr => 2,
            I2cState::ReadRegs => 3,
            I2cState::ReadRegsTrain => 4,
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
            1 => I2cState::GetAddress,
            2 => I2cState::GetRegNr,
            3 => I2cState::ReadRegs,
            4 => I2cState::ReadRegsTrain,
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

pub struct Pcf8583 {
    base: ChipBase,
    twelve_hour: bool,
    read_bit_shift: i32,
    regs_for_read: [u8; REG_SIZE],
    state: I2cState,
    reg: u8,
    reg_ptr: u8,
    bit: u8,
    sclk_line: bool,
    data_line: bool,
}

impl Pcf8583 {
    pub fn new(device: &str, host: &Host, read_bit_shift: i32) -> Self {
        let base = ChipBase::open(device, host, RAM_SIZE, REG_SIZE);
        let twelve_hour = base.regs[REG_HOURS as usize] & 0x80 != 0;
        Pcf8583 {
            base,
            twelve_hour,
            read_bit_shift,
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

    pub fn time(&self) -> i64 {
        self.base.current()
    }

    fn i2c_start(&mut self) {
        let t = self.base.current();
        let hours = if self.twelve_hour {
            let h = calendar::get_hour_am_pm(t, true);
            // PM moves from bit 5 to bit 6
            0x80 | (h & 0x1f) | ((h & 0x20) << 1)
        } else {
            calendar::get_hour(t, true)
        };
        let year = calendar::get_year(t, false);
        self.regs_for_read[REG_CONTROL as usize] = self.base.regs[REG_CONTROL as usize];
        self.regs_for_read[REG_100TH_SECONDS as usize] = calendar::get_centisecond(self.base.clock(), true);
        self.regs_for_read[REG_SECONDS as usize] = calendar::get_second(t, true);
        self.regs_for_read[REG_MINUTES as usize] = calendar::get_minute(t, true);
        self.regs_for_read[REG_HOURS as usize] = hours;
        self.regs_for_read[REG_YEARS_MONTH_DAYS as usize] = ((year & 3) << 6) | calendar::get_day_of_month(t, true);
        self.regs_for_read[REG_WEEK_DAYS_MONTHS as usize] =
            (((calendar::get_weekday(t, false) + 1) & 7) << 5) | calendar::get_month(t, true);
        self.regs_for_read[REG_TIMER_DAYS as usize] = 0;
        let alarms = REG_ALARM_CONTROL as usize..=REG_TIMER_ALARM as usize;
        self.regs_for_read[alarms.clone()].copy_from_slice(&self.base.regs[alarms]);
    }

    /// Bit at `pos` of the shifted read train. Positions outside the train read 0.
    fn train_bit(&self, pos: i32) -> bool {
        let p = pos - self.read_bit_shift;
        if p < 0 || p >= REG_SIZE as i32 * TRAIN_SLOTS {
            return false;
        }
        let slot = p % TRAIN_SLOTS;
        // Slot 8 is the ack
        slot != 8 && self.regs_for_read[(p / TRAIN_SLOTS) as usize] & (0x80 >> slot) != 0
    }

    fn read_register(&self, addr: u8) -> u8 {
        match addr as usize {
            a if a < REG_SIZE => self.regs_for_read[a],
            a => self.base.ram[a - REG_SIZE],
        }
    }

    fn write_register(&mut self, addr: u8, val: u8) {
        log::trace!("{}: write reg {:02x} = {:02x}", self.base.device, addr, val);
        match addr {
            REG_CONTROL => {
                if val & 0x80 != 0 {
                    self.base.halt();
                } else {
                    self.base.resume();
                }
                self.base.regs[REG_CONTROL as usize] = val;
            }
            REG_100TH_SECONDS | REG_TIMER_DAYS => {}
            REG_SECONDS => self.base.set_field(Field::Second, val as i32, true),
            REG_MINUTES => self.base.set_field(Field::Minute, val as i32, true),
            REG_HOURS => {
                self.base.regs[REG_HOURS as usize] = val;
                self.twelve_hour = val & 0x80 != 0;
                if self.twelve_hour {
                    let h = (val & 0x1f) | ((val & 0x40) >> 1);
                    self.base.set_field(Field::HourAmPm, h as i32, true);
                } else {
                    self.base.set_field(Field::Hour, (val & 0x3f) as i32, true);
                }
            }
            REG_YEARS_MONTH_DAYS => {
                // Only the position in the leap cycle is stored; keep the rest of the year
                let year = calendar::get_year(self.base.current(), false) as i32;
                let target = year - year % 4 + (val >> 6) as i32;
                self.base.set_field(Field::Year, target, false);
                self.base.set_field(Field::DayOfMonth, (val & 0x3f) as i32, true);
            }
            REG_WEEK_DAYS_MONTHS => {
                self.base.set_field(Field::Weekday, (val >> 5) as i32 - 1, false);
                self.base.set_field(Field::Month, (val & 0x1f) as i32, true);
            }
            REG_ALARM_CONTROL..=REG_TIMER_ALARM => self.base.regs[addr as usize] = val,
            _ => self.base.ram[addr as usize - REG_SIZE] = val,
        }
    }

    fn shift_in(&mut self) -> bool {
        self.reg |= (self.data_line as u8) << (7 - self.bit);
        self.bit += 1;
        self.bit == 8
    }

    fn rising_edge(&mut self) {
        match self.state {
            I2cState::ReadRegsTrain => {
                self.bit += 1;
                if self.bit == TRAIN_SLOTS as u8 {
                    self.reg_ptr = self.reg_ptr.wrapping_add(1) & TRAIN_REG_MASK;
                    self.bit = 0;
                }
            }
            I2cState::GetAddress => {
                if self.shift_in() {
                    self.state = match self.reg {
                        WRITE_ADDRESS => I2cState::AddressWriteAck,
                        READ_ADDRESS if self.read_bit_shift != 0 => {
                            self.bit = 0;
                            I2cState::ReadRegsTrain
                        }
                        READ_ADDRESS => I2cState::AddressReadAck,
                        _ => I2cState::Idle,
                    };
                }
            }
            I2cState::GetRegNr => {
                if self.shift_in() {
                    self.state = I2cState::RegNrAck;
                    self.reg_ptr = self.reg;
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
                    self.reg_ptr = self.reg_ptr.wrapping_add(1);
                }
            }
            I2cState::ReadAck => {
                if self.data_line {
                    self.state = I2cState::Idle;
                } else {
                    self.state = I2cState::ReadRegs;
                    self.bit = 0;
                    self.reg_ptr = self.reg_ptr.wrapping_add(1);
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
        if high {
            self.rising_edge();
        }
        self.sclk_line = high;
    }

    pub fn set_data_line(&mut self, high: bool) {
        if self.data_line == high {
            return;
        }
        if self.sclk_line {
            if high {
                self.state = I2cState::Idle;
            } else {
                self.i2c_start();
                self.state = I2cState::GetAddress;
                self.reg = 0;
                self.bit = 0;
            }
        }
        self.data_line = high;
    }

    pub fn read_data_line(&self) -> bool {
        match self.state {
            I2cState::ReadRegs => self.reg & (0x80 >> self.bit) != 0,
            I2cState::ReadRegsTrain => self.train_bit(self.reg_ptr as i32 * TRAIN_SLOTS + self.bit as i32),
            I2cState::AddressReadAck
            | I2cState::AddressWriteAck
            | I2cState::RegNrAck
            | I2cState::ReadAck
            | I2cState::WriteAck => false,
            _ => true,
        }
    }

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_bool(self.base.halted);
        m.write_time(self.base.halt_latch);
        m.write_bool(self.twelve_hour);
        m.write_u32(self.read_bit_shift as u32);
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
        let read_bit_shift = r.read_u32()? as i32;
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
        if bit > 8 {
            return Err(r.malformed("bit cursor out of range"));
        }

        self.base.halted = halted;
        self.base.halt_latch = halt_latch;
        self.twelve_hour = twelve_hour;
        self.read_bit_shift = read_bit_shift;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::test_support::host;

    fn start(rtc: &mut Pcf8583) {
        rtc.set_data_line(true);
        rtc.set_clock_line(true);
        rtc.set_data_line(false);
        rtc.set_clock_line(false);
    }

    fn stop(rtc: &mut Pcf8583) {
        rtc.set_data_line(false);
        rtc.set_clock_line(true);
        rtc.set_data_line(true);
    }

    fn clock_pulse(rtc: &mut Pcf8583) {
        rtc.set_clock_line(true);
        rtc.set_clock_line(false);
    }

    fn send_byte(rtc: &mut Pcf8583, byte: u8) -> bool {
        for i in 0..8 {
            rtc.set_data_line(byte & (0x80 >> i) != 0);
            clock_pulse(rtc);
        }
        rtc.set_data_line(true);
        let ack = !rtc.read_data_line();
        clock_pulse(rtc);
        ack
    }

    fn read_byte(rtc: &mut Pcf8583, ack: bool) -> u8 {
        rtc.set_data_line(true);
        let mut value = 0;
        for _ in 0..8 {
            value = (value << 1) | rtc.read_data_line() as u8;
            clock_pulse(rtc);
        }
        rtc.set_data_line(!ack);
        clock_pulse(rtc);
        value
    }

    fn write_regs(rtc: &mut Pcf8583, reg: u8, data: &[u8]) {
        start(rtc);
        assert!(send_byte(rtc, WRITE_ADDRESS));
        assert!(send_byte(rtc, reg));
        for &b in data {
            assert!(send_byte(rtc, b));
        }
        stop(rtc);
    }

    fn read_regs(rtc: &mut Pcf8583, reg: u8, count: usize) -> Vec<u8> {
        start(rtc);
        send_byte(rtc, WRITE_ADDRESS);
        send_byte(rtc, reg);
        start(rtc);
        assert!(send_byte(rtc, READ_ADDRESS));
        let out = (0..count).map(|i| read_byte(rtc, i + 1 < count)).collect();
        stop(rtc);
        out
    }

    #[test]
    fn test_read_clock_registers() {
        // 2021-06-15 12:34:56, a Tuesday
        let (host, clock) = host("pcf8583_read");
        clock.set_centisecond(42);
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        let regs = read_regs(&mut rtc, REG_CONTROL, 8);
        assert_eq!(regs, [0x00, 0x42, 0x56, 0x34, 0x12, 0x40 | 0x15, (3 << 5) | 0x06, 0x00]);
    }

    #[test]
    fn test_write_seconds_and_minutes() {
        let (host, _clock) = host("pcf8583_write");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        write_regs(&mut rtc, REG_SECONDS, &[0x30, 0x05]);
        assert_eq!(calendar::get_second(rtc.time(), true), 0x30);
        assert_eq!(calendar::get_minute(rtc.time(), true), 0x05);
        assert_eq!(rtc.state(), I2cState::Idle);
    }

    #[test]
    fn test_twelve_hour_pm_in_bit_6() {
        let (host, _clock) = host("pcf8583_12h");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        write_regs(&mut rtc, REG_HOURS, &[0x80 | 0x40 | 0x03]);
        assert_eq!(calendar::get_hour(rtc.time(), false), 15);
        assert_eq!(read_regs(&mut rtc, REG_HOURS, 1), [0xc3]);
        write_regs(&mut rtc, REG_HOURS, &[0x09]);
        assert_eq!(read_regs(&mut rtc, REG_HOURS, 1), [0x09]);
    }

    #[test]
    fn test_twelve_hour_mode_survives_reload() {
        let (host, _clock) = host("pcf8583_12h_ctx");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        write_regs(&mut rtc, REG_HOURS, &[0x80 | 0x40 | 0x03]);
        rtc.destroy(true);
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        assert!(rtc.twelve_hour);
        assert_eq!(read_regs(&mut rtc, REG_HOURS, 1), [0xc3]);
    }

    #[test]
    fn test_year_bits_keep_leap_cycle() {
        let (host, _clock) = host("pcf8583_year");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        // Year 0 of the cycle, day 29
        write_regs(&mut rtc, REG_YEARS_MONTH_DAYS, &[0x29]);
        assert_eq!(calendar::get_year(rtc.time(), false), 20);
        assert_eq!(calendar::get_day_of_month(rtc.time(), false), 29);
        // Weekday 1 (Sunday) moves Monday the 29th back a day, then December
        write_regs(&mut rtc, REG_WEEK_DAYS_MONTHS, &[(1 << 5) | 0x12]);
        assert_eq!(calendar::get_month(rtc.time(), false), 12);
        assert_eq!(calendar::get_day_of_month(rtc.time(), false), 28);
    }

    #[test]
    fn test_stop_bit_halts_clock() {
        let (host, clock) = host("pcf8583_stop");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        write_regs(&mut rtc, REG_CONTROL, &[0x80]);
        assert!(rtc.is_halted());
        clock.advance(100);
        assert_eq!(read_regs(&mut rtc, REG_CONTROL, 3)[0], 0x80);
        assert_eq!(read_regs(&mut rtc, REG_SECONDS, 1), [0x56]);
        write_regs(&mut rtc, REG_CONTROL, &[0x00]);
        assert!(!rtc.is_halted());
        assert_eq!(rtc.offset(), -100);
    }

    #[test]
    fn test_alarm_registers_and_ram() {
        let (host, _clock) = host("pcf8583_ram");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        write_regs(&mut rtc, REG_ALARM_CONTROL, &[0x11, 0x22]);
        assert_eq!(read_regs(&mut rtc, REG_ALARM_CONTROL, 2), [0x11, 0x22]);
        write_regs(&mut rtc, 0xff, &[0xee]);
        assert_eq!(read_regs(&mut rtc, 0xfe, 2), [0x00, 0xee]);
        // The pointer wraps from 0xff to the control register
        assert_eq!(read_regs(&mut rtc, 0xff, 2), [0xee, 0x00]);
    }

    #[test]
    fn test_timer_and_hundredths_ignore_writes() {
        let (host, _clock) = host("pcf8583_timer");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        write_regs(&mut rtc, REG_100TH_SECONDS, &[0x99]);
        write_regs(&mut rtc, REG_TIMER_DAYS, &[0x99]);
        assert_eq!(rtc.offset(), 0);
        assert_eq!(read_regs(&mut rtc, REG_TIMER_DAYS, 1), [0x00]);
    }

    #[test]
    fn test_bit_train_read() {
        let (host, _clock) = host("pcf8583_train");
        let mut rtc = Pcf8583::new("PCF8583", &host, 1);
        start(&mut rtc);
        send_byte(&mut rtc, WRITE_ADDRESS);
        send_byte(&mut rtc, REG_SECONDS);
        start(&mut rtc);
        for i in 0..8 {
            rtc.set_data_line(READ_ADDRESS & (0x80 >> i) != 0);
            clock_pulse(&mut rtc);
        }
        assert_eq!(rtc.state(), I2cState::ReadRegsTrain);
        rtc.set_data_line(true);

        // Shifted by one: the ack slot of the previous register comes first
        let mut bits = Vec::new();
        for _ in 0..18 {
            bits.push(rtc.read_data_line() as u8);
            clock_pulse(&mut rtc);
        }
        let byte = |b: &[u8]| b.iter().fold(0u8, |acc, &x| (acc << 1) | x);
        assert_eq!(bits[0], 0);
        assert_eq!(byte(&bits[1..9]), 0x56);
        assert_eq!(bits[9], 0);
        assert_eq!(byte(&bits[10..18]), 0x34);
    }

    #[test]
    fn test_bit_train_past_end_reads_zero() {
        let (host, _clock) = host("pcf8583_train_end");
        let rtc = Pcf8583::new("PCF8583", &host, 2);
        assert!(!rtc.train_bit(0));
        assert!(!rtc.train_bit(2 + 16 * 9));
        assert!(!rtc.train_bit(31 * 9 + 8));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (host, _clock) = host("pcf8583_snap");
        let mut rtc = Pcf8583::new("PCF8583", &host, -3);
        write_regs(&mut rtc, 0x20, &[9, 8, 7]);
        write_regs(&mut rtc, REG_HOURS, &[0x80 | 0x11]);
        start(&mut rtc);
        send_byte(&mut rtc, WRITE_ADDRESS);
        rtc.base.offset = -(1 << 33);

        let mut snap = Snapshot::new();
        rtc.write_snapshot(&mut snap).unwrap();
        let mut copy = Pcf8583::new("X", &host, 0);
        copy.read_snapshot(&snap).unwrap();
        assert_eq!(copy.read_bit_shift, -3);
        assert_eq!(copy.offset(), -(1 << 33));
        assert_eq!(copy.state(), I2cState::GetRegNr);
        assert!(copy.twelve_hour);
        let mut again = Snapshot::new();
        copy.write_snapshot(&mut again).unwrap();
        assert_eq!(again, snap);
    }

    #[test]
    fn test_context_persists_alarms_and_ram() {
        let (host, _clock) = host("pcf8583_ctx");
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        write_regs(&mut rtc, REG_ALARM_CONTROL, &[0x5a]);
        write_regs(&mut rtc, 0x10, &[0xa5]);
        rtc.destroy(true);
        let mut rtc = Pcf8583::new("PCF8583", &host, 0);
        assert_eq!(read_regs(&mut rtc, REG_ALARM_CONTROL, 1), [0x5a]);
        assert_eq!(read_regs(&mut rtc, 0x10, 1), [0xa5]);
    }
}
