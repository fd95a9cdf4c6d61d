//! DS12C887: MC146818-compatible clock with alarm, 113 bytes of free RAM.
//!
//! The host writes a register index to the address port and then reads or
//! writes the data port.
//!
//! | Index | Register       | Index | Register   |
//! |-------|----------------|-------|------------|
//! | 0     | seconds        | 7     | date       |
//! | 1     | seconds alarm  | 8     | month      |
//! | 2     | minutes        | 9     | year       |
//! | 3     | minutes alarm  | 10    | control A  |
//! | 4     | hours          | 11    | control B  |
//! | 5     | hours alarm    | 12    | control C  |
//! | 6     | day of week    | 13    | control D  |
//!
//! Index 50 holds the century (BCD mode only). Every other index addresses RAM.
//!
//! Control A bits 6-4 must be `010` for the oscillator to run; any other
//! pattern halts the clock. Control B bit 7 (SET) freezes reads and buffers
//! clock writes until it is cleared, bit 5 enables alarm interrupts, bit 4
//! update-ended interrupts, bit 2 selects binary data and bit 1 24-hour mode.
//! Reading control C reports and clears the alarm and update-ended flags.
//!
//! [`Ds12c887::update_flags`] must be polled at least ten times a second.

use crate::calendar::{self, Field};
use crate::chips::{ChipBase, Host};
use crate::snapshot::{Snapshot, SnapshotError};

pub const RAM_SIZE: usize = 128;
/// Registers 0..=9 plus the century byte.
pub const REG_SIZE: usize = 11;

pub const REG_SECONDS: u8 = 0;
pub const REG_SECONDS_ALARM: u8 = 1;
pub const REG_MINUTES: u8 = 2;
pub const REG_MINUTES_ALARM: u8 = 3;
pub const REG_HOURS: u8 = 4;
pub const REG_HOURS_ALARM: u8 = 5;
pub const REG_DAY_OF_WEEK: u8 = 6;
pub const REG_DAY_OF_MONTH: u8 = 7;
pub const REG_MONTHS: u8 = 8;
pub const REG_YEARS: u8 = 9;
pub const REG_CTRL_A: u8 = 10;
pub const REG_CTRL_B: u8 = 11;
pub const REG_CTRL_C: u8 = 12;
pub const REG_CTRL_D: u8 = 13;
pub const REG_CENTURIES: u8 = 50;

/// Slot of the century byte in the register blob.
const CENTURY_SLOT: usize = 10;

const CTRL_B_SET: u8 = 0x80;
const CTRL_B_AIE: u8 = 0x20;
const CTRL_B_UIE: u8 = 0x10;
const CTRL_B_DM: u8 = 0x04;
const CTRL_B_24H: u8 = 0x02;

const SNAP_MODULE_NAME: &str = "RTC_DS12C887";
const SNAP_MAJOR: u8 = 0;
const SNAP_MINOR: u8 = 0;

/// Hour register value for a 24-hour `hour`.
fn encode_hour(hour: u8, bcd: bool, twelve_hour: bool) -> u8 {
    let digits = |h: u8| if bcd { calendar::int_to_bcd(h) } else { h };
    if !twelve_hour {
        return digits(hour);
    }
    let (h12, pm) = match hour {
        0 => (12, false),
        1..=11 => (hour, false),
        12 => (12, true),
        _ => (hour - 12, true),
    };
    digits(h12) | if pm { 0x80 } else { 0 }
}

/// 24-hour value of an hour register byte, or -1 for a 12-hour value outside 1..=12.
fn decode_hour(data: u8, bcd: bool, twelve_hour: bool) -> i32 {
    if !twelve_hour {
        return if bcd { calendar::bcd_to_int(data & 0x3f) as i32 } else { (data & 0x1f) as i32 };
    }
    let pm = data & 0x80 != 0;
    let h = (if bcd { calendar::bcd_to_int(data & 0x1f) } else { data & 0x0f }) as i32;
    match (h, pm) {
        (h, _) if !(1..=12).contains(&h) => -1,
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    }
}

/// Alarm bytes of the form `11xx_xxxx` match any value.
fn alarm_dont_care(alarm: u8) -> bool {
    alarm & 0xc0 == 0xc0
}

pub struct Ds12c887 {
    base: ChipBase,
    bcd: bool,
    twelve_hour: bool,
    set: bool,
    set_latch: i64,
    ctrl_a: u8,
    ctrl_b: u8,
    prev_second: u8,
    alarm_flag: bool,
    end_of_update_flag: bool,
    reg: u8,
    changed: [bool; REG_SIZE],
}

impl Ds12c887 {
    pub fn new(device: &str, host: &Host) -> Self {
        Ds12c887 {
            base: ChipBase::open(device, host, RAM_SIZE, REG_SIZE),
            bcd: true,
            twelve_hour: false,
            set: false,
            set_latch: 0,
            ctrl_a: 0x20,
            ctrl_b: 0,
            prev_second: 0,
            alarm_flag: false,
            end_of_update_flag: false,
            reg: 0,
            changed: [false; REG_SIZE],
        }
    }

    pub fn destroy(self, save: bool) {
        self.base.destroy(save);
    }

    /// RESET pin: clears the periodic and update interrupt enables and both flags.
    pub fn reset(&mut self) {
        self.ctrl_b &= 0xaf;
        self.alarm_flag = false;
        self.end_of_update_flag = false;
    }

    pub fn offset(&self) -> i64 {
        self.base.offset
    }

    pub fn is_halted(&self) -> bool {
        self.base.halted
    }

    fn read_time(&self) -> i64 {
        match (self.base.halted, self.set) {
            (true, _) => self.base.halt_latch,
            (false, true) => self.set_latch,
            (false, false) => self.base.running(),
        }
    }

    fn slot(reg: u8) -> usize {
        if reg == REG_CENTURIES {
            CENTURY_SLOT
        } else {
            reg as usize
        }
    }

    /// Clock register value at `t`, merged with its RAM bits.
    fn get_clock(&self, reg: u8, t: i64) -> u8 {
        let bcd = self.bcd;
        let stored = self.base.regs[Self::slot(reg)];
        match reg {
            REG_SECONDS => (stored & if bcd { 0x80 } else { 0xc0 }) | calendar::get_second(t, bcd),
            REG_MINUTES => (stored & if bcd { 0x80 } else { 0xc0 }) | calendar::get_minute(t, bcd),
            REG_HOURS => {
                let ram_bits = match (bcd, self.twelve_hour) {
                    (true, true) => 0x60,
                    (true, false) => 0xc0,
                    (false, true) => 0x70,
                    (false, false) => 0xe0,
                };
                (stored & ram_bits) | encode_hour(calendar::get_hour(t, false), bcd, self.twelve_hour)
            }
            REG_SECONDS_ALARM | REG_MINUTES_ALARM | REG_HOURS_ALARM => stored,
            REG_DAY_OF_WEEK => (stored & 0xf8) | (calendar::get_weekday(t, false) + 1),
            REG_DAY_OF_MONTH => (stored & if bcd { 0xc0 } else { 0xe0 }) | calendar::get_day_of_month(t, bcd),
            REG_MONTHS => (stored & if bcd { 0xe0 } else { 0xf0 }) | calendar::get_month(t, bcd),
            REG_YEARS if bcd => calendar::get_year(t, true),
            REG_YEARS => (stored & 0x80) | calendar::get_year(t, false),
            REG_CENTURIES if bcd => (stored & 0xc0) | calendar::get_century(t, true),
            _ => 0,
        }
    }

    /// Store a clock register and apply it to the running or halted time.
    fn write_clock_byte(&mut self, reg: u8, data: u8) {
        let bcd = self.bcd;
        self.base.regs[Self::slot(reg)] = data;
        let seconds_mask = if bcd { 0x7f } else { 0x3f };
        match reg {
            REG_SECONDS => self.base.set_field(Field::Second, (data & seconds_mask) as i32, bcd),
            REG_MINUTES => self.base.set_field(Field::Minute, (data & seconds_mask) as i32, bcd),
            REG_HOURS => {
                let hour = decode_hour(data, bcd, self.twelve_hour);
                self.base.set_field(Field::Hour, hour, false);
            }
            REG_DAY_OF_WEEK => self.base.set_field(Field::Weekday, (data & 7) as i32 - 1, false),
            REG_DAY_OF_MONTH => {
                let mask = if bcd { 0x3f } else { 0x1f };
                self.base.set_field(Field::DayOfMonth, (data & mask) as i32, bcd);
            }
            REG_MONTHS => {
                let mask = if bcd { 0x1f } else { 0x0f };
                self.base.set_field(Field::Month, (data & mask) as i32, bcd);
            }
            REG_YEARS => self.base.set_field(Field::Year, data as i32, bcd),
            REG_CENTURIES if bcd => self.base.set_field(Field::Century, (data & 0x3f) as i32, true),
            _ => {}
        }
    }

    /// Commit the registers written while SET was held.
    fn write_latched_clock_regs(&mut self) {
        for reg in REG_SECONDS..=REG_YEARS {
            if self.changed[reg as usize] {
                let data = self.base.regs[reg as usize];
                self.write_clock_byte(reg, data);
            }
        }
        if self.changed[CENTURY_SLOT] {
            let data = self.base.regs[CENTURY_SLOT];
            self.write_clock_byte(REG_CENTURIES, data);
        }
    }

    /// Poll the update-ended and alarm conditions. Returns true when an
    /// enabled interrupt fired on this call.
    pub fn update_flags(&mut self) -> bool {
        let t = self.base.current();
        let seconds_mask = if self.bcd { 0x7f } else { 0x3f };
        let raw = self.get_clock(REG_SECONDS, t) & seconds_mask;
        let current = if self.bcd { calendar::bcd_to_int(raw) } else { raw };

        if self.prev_second == current {
            return false;
        }
        self.prev_second = current;
        self.end_of_update_flag = true;
        let mut irq = self.ctrl_b & CTRL_B_UIE != 0;

        let hour_mask = match (self.bcd, self.twelve_hour) {
            (true, true) => 0x9f,
            (true, false) => 0x3f,
            (false, true) => 0x8f,
            (false, false) => 0x1f,
        };
        let fields = [
            (REG_SECONDS, REG_SECONDS_ALARM, seconds_mask),
            (REG_MINUTES, REG_MINUTES_ALARM, seconds_mask),
            (REG_HOURS, REG_HOURS_ALARM, hour_mask),
        ];
        let matched = fields.iter().all(|&(reg, alarm_reg, mask)| {
            let alarm = self.base.regs[alarm_reg as usize];
            alarm_dont_care(alarm) || (self.get_clock(reg, t) & mask) == (alarm & mask)
        });

        if matched {
            self.alarm_flag = true;
            if self.ctrl_b & CTRL_B_AIE != 0 {
                irq = true;
            }
        }
        if irq {
            log::trace!("{}: interrupt (AF={} UF={})", self.base.device, self.alarm_flag, self.end_of_update_flag);
        }
        irq
    }

    // ─── Bus access ─────────────────────────────────────────────────────

    pub fn store_address(&mut self, address: u8) {
        self.reg = address & 0x7f;
    }

    pub fn store_data(&mut self, data: u8) {
        let reg = self.reg;
        log::trace!("{}: write reg {} = {:02x}", self.base.device, reg, data);
        match reg {
            REG_SECONDS | REG_MINUTES | REG_HOURS | REG_DAY_OF_WEEK | REG_DAY_OF_MONTH | REG_MONTHS | REG_YEARS
            | REG_CENTURIES => {
                if self.set {
                    let slot = Self::slot(reg);
                    self.base.regs[slot] = data;
                    self.changed[slot] = true;
                } else {
                    self.write_clock_byte(reg, data);
                }
            }
            REG_SECONDS_ALARM | REG_MINUTES_ALARM | REG_HOURS_ALARM => self.base.regs[reg as usize] = data,
            REG_CTRL_A => {
                let data = data & 0x7f;
                if data & 0x70 != 0x20 {
                    self.base.halt();
                } else {
                    self.base.resume();
                }
                self.ctrl_a = data;
            }
            REG_CTRL_B => {
                self.ctrl_b = data;
                if data & CTRL_B_SET != 0 {
                    if !self.set {
                        self.set = true;
                        self.ctrl_b &= !CTRL_B_UIE;
                        self.set_latch = self.base.current();
                        self.changed = [false; REG_SIZE];
                    }
                } else if self.set {
                    self.set = false;
                    self.write_latched_clock_regs();
                }
                self.bcd = data & CTRL_B_DM == 0;
                self.twelve_hour = data & CTRL_B_24H == 0;
            }
            REG_CTRL_C | REG_CTRL_D => {}
            _ => self.base.ram[reg as usize] = data,
        }
    }

    pub fn read(&mut self) -> u8 {
        let reg = self.reg;
        match reg {
            REG_SECONDS..=REG_YEARS | REG_CENTURIES => self.get_clock(reg, self.read_time()),
            REG_CTRL_A => self.ctrl_a,
            REG_CTRL_B => self.ctrl_b,
            REG_CTRL_C => {
                self.update_flags();
                let alarm_irq = self.alarm_flag && self.ctrl_b & CTRL_B_AIE != 0;
                let update_irq = self.end_of_update_flag && self.ctrl_b & CTRL_B_UIE != 0;
                let value = (if alarm_irq || update_irq { 0x80 } else { 0 })
                    | (if self.alarm_flag { 0x20 } else { 0 })
                    | (if self.end_of_update_flag { 0x10 } else { 0 });
                self.alarm_flag = false;
                self.end_of_update_flag = false;
                value
            }
            // Battery always good
            REG_CTRL_D => 0x80,
            _ => self.base.ram[reg as usize],
        }
    }

    // ─── Snapshot ───────────────────────────────────────────────────────

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_bool(self.base.halted);
        m.write_time(self.base.halt_latch);
        m.write_bool(self.set);
        m.write_time(self.set_latch);
        m.write_time(self.base.offset);
        m.write_time(self.base.old_offset);
        m.write_bool(self.bcd);
        m.write_bool(self.twelve_hour);
        m.write_u8(self.prev_second);
        m.write_bool(self.alarm_flag);
        m.write_bool(self.end_of_update_flag);
        m.write_u8(self.reg);
        m.write_u8(self.ctrl_a);
        m.write_u8(self.ctrl_b);
        m.write_bytes(&self.base.regs);
        m.write_bytes(&self.base.old_regs);
        for &c in &self.changed {
            m.write_bool(c);
        }
        m.write_bytes(&self.base.ram);
        m.write_bytes(&self.base.old_ram);
        self.base.write_device(&mut m);
        m.close();
        Ok(())
    }

    pub fn read_snapshot(&mut self, s: &Snapshot) -> Result<(), SnapshotError> {
        let mut r = s.open_versioned(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        let halted = r.read_bool()?;
        let halt_latch = r.read_time()?;
        let set = r.read_bool()?;
        let set_latch = r.read_time()?;
        let offset = r.read_time()?;
        let old_offset = r.read_time()?;
        let bcd = r.read_bool()?;
        let twelve_hour = r.read_bool()?;
        let prev_second = r.read_u8()?;
        let alarm_flag = r.read_bool()?;
        let end_of_update_flag = r.read_bool()?;
        let reg = r.read_u8()?;
        let ctrl_a = r.read_u8()?;
        let ctrl_b = r.read_u8()?;
        let mut regs = vec![0u8; REG_SIZE];
        let mut old_regs = vec![0u8; REG_SIZE];
        r.read_into(&mut regs)?;
        r.read_into(&mut old_regs)?;
        let mut changed = [false; REG_SIZE];
        for c in changed.iter_mut() {
            *c = r.read_bool()?;
        }
        let mut ram = vec![0u8; RAM_SIZE];
        let mut old_ram = vec![0u8; RAM_SIZE];
        r.read_into(&mut ram)?;
        r.read_into(&mut old_ram)?;
        let device = r.read_str()?;
        if reg > 0x7f {
            return Err(r.malformed(format!("register index {} out of range", reg)));
        }

        self.base.halted = halted;
        self.base.halt_latch = halt_latch;
        self.set = set;
        self.set_latch = set_latch;
        self.base.offset = offset;
        self.base.old_offset = old_offset;
        self.bcd = bcd;
        self.twelve_hour = twelve_hour;
        self.prev_second = prev_second;
        self.alarm_flag = alarm_flag;
        self.end_of_update_flag = end_of_update_flag;
        self.reg = reg;
        self.ctrl_a = ctrl_a;
        self.ctrl_b = ctrl_b;
        self.base.regs = regs;
        self.base.old_regs = old_regs;
        self.changed = changed;
        self.base.ram = ram;
        self.base.old_ram = old_ram;
        self.base.device = device;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::test_support::host;

    fn write(rtc: &mut Ds12c887, reg: u8, data: u8) {
        rtc.store_address(reg);
        rtc.store_data(data);
    }

    fn read(rtc: &mut Ds12c887, reg: u8) -> u8 {
        rtc.store_address(reg);
        rtc.read()
    }

    #[test]
    fn test_defaults_bcd_24_hour() {
        // 2021-06-15 12:34:56, a Tuesday
        let (host, _clock) = host("ds12_defaults");
        let mut rtc = Ds12c887::new("DS12", &host);
        assert_eq!(read(&mut rtc, REG_CTRL_A), 0x20);
        assert_eq!(read(&mut rtc, REG_SECONDS), 0x56);
        assert_eq!(read(&mut rtc, REG_MINUTES), 0x34);
        assert_eq!(read(&mut rtc, REG_HOURS), 0x12);
        assert_eq!(read(&mut rtc, REG_DAY_OF_WEEK), 3);
        assert_eq!(read(&mut rtc, REG_DAY_OF_MONTH), 0x15);
        assert_eq!(read(&mut rtc, REG_MONTHS), 0x06);
        assert_eq!(read(&mut rtc, REG_YEARS), 0x21);
        assert_eq!(read(&mut rtc, REG_CENTURIES), 0x20);
        assert_eq!(read(&mut rtc, REG_CTRL_D), 0x80);
    }

    #[test]
    fn test_binary_and_twelve_hour_modes() {
        let (host, _clock) = host("ds12_modes");
        let mut rtc = Ds12c887::new("DS12", &host);
        // Binary, 24h
        write(&mut rtc, REG_CTRL_B, CTRL_B_DM | CTRL_B_24H);
        assert_eq!(read(&mut rtc, REG_SECONDS), 56);
        assert_eq!(read(&mut rtc, REG_HOURS), 12);
        assert_eq!(read(&mut rtc, REG_CENTURIES), 0);
        // Binary, 12h: noon is 12 with PM
        write(&mut rtc, REG_CTRL_B, CTRL_B_DM);
        assert_eq!(read(&mut rtc, REG_HOURS), 0x80 | 12);
        // BCD, 12h: write 7 PM
        write(&mut rtc, REG_CTRL_B, 0);
        write(&mut rtc, REG_HOURS, 0x87);
        assert_eq!(read(&mut rtc, REG_HOURS), 0x87);
        // Bit 7 of the written byte is a RAM bit in 24-hour mode
        write(&mut rtc, REG_CTRL_B, CTRL_B_24H);
        assert_eq!(read(&mut rtc, REG_HOURS), 0x80 | 0x19);
    }

    #[test]
    fn test_hour_encoding_tables() {
        assert_eq!(encode_hour(0, true, true), 0x12);
        assert_eq!(encode_hour(10, true, true), 0x10);
        assert_eq!(encode_hour(22, true, true), 0x90);
        assert_eq!(encode_hour(0, false, true), 12);
        assert_eq!(encode_hour(23, false, false), 23);
        for hour in 0..24u8 {
            for (bcd, twelve) in [(true, true), (true, false), (false, true), (false, false)] {
                assert_eq!(decode_hour(encode_hour(hour, bcd, twelve), bcd, twelve), hour as i32);
            }
        }
    }

    #[test]
    fn test_twelve_hour_rejects_out_of_range() {
        let (host, _clock) = host("ds12_12h_range");
        let mut rtc = Ds12c887::new("DS12", &host);
        // BCD, 12-hour
        write(&mut rtc, REG_CTRL_B, 0);
        for data in [0x00, 0x13, 0x93, 0x80] {
            write(&mut rtc, REG_HOURS, data);
            assert_eq!(rtc.offset(), 0, "BCD hour {:02x}", data);
        }
        // Binary, 12-hour
        write(&mut rtc, REG_CTRL_B, CTRL_B_DM);
        for data in [0, 13, 0x80 | 13] {
            write(&mut rtc, REG_HOURS, data);
            assert_eq!(rtc.offset(), 0, "binary hour {:02x}", data);
        }
        assert_eq!(calendar::get_hour(rtc.base.current(), false), 12);
        // 12 AM is still accepted
        write(&mut rtc, REG_HOURS, 12);
        assert_eq!(calendar::get_hour(rtc.base.current(), false), 0);
    }

    #[test]
    fn test_set_bit_buffers_writes() {
        let (host, clock) = host("ds12_set");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, REG_CTRL_B, CTRL_B_SET | CTRL_B_UIE | CTRL_B_24H);
        // SET clears UIE
        assert_eq!(read(&mut rtc, REG_CTRL_B), CTRL_B_SET | CTRL_B_24H);
        write(&mut rtc, REG_MINUTES, 0x05);
        write(&mut rtc, REG_CENTURIES, 0x19);
        clock.advance(2);
        // Reads stay frozen and the clock is not yet changed
        assert_eq!(read(&mut rtc, REG_SECONDS), 0x56);
        assert_eq!(read(&mut rtc, REG_MINUTES), 0x34);
        write(&mut rtc, REG_CTRL_B, CTRL_B_24H);
        assert_eq!(read(&mut rtc, REG_MINUTES), 0x05);
        assert_eq!(read(&mut rtc, REG_SECONDS), 0x58);
        assert_eq!(read(&mut rtc, REG_CENTURIES), 0x19);
        assert_eq!(read(&mut rtc, REG_YEARS), 0x21);
    }

    #[test]
    fn test_century_write_leaves_control_a_alone() {
        let (host, _clock) = host("ds12_century");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, REG_CENTURIES, 0x19);
        assert_eq!(read(&mut rtc, REG_CTRL_A), 0x20);
        assert!(!rtc.is_halted());
        assert_eq!(read(&mut rtc, REG_CENTURIES), 0x19);
    }

    #[test]
    fn test_oscillator_control_halts() {
        let (host, clock) = host("ds12_halt");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, REG_CTRL_A, 0x70);
        assert!(rtc.is_halted());
        clock.advance(50);
        assert_eq!(read(&mut rtc, REG_SECONDS), 0x56);
        write(&mut rtc, REG_CTRL_A, 0xa6);
        assert!(!rtc.is_halted());
        assert_eq!(read(&mut rtc, REG_CTRL_A), 0x26);
        assert_eq!(read(&mut rtc, REG_SECONDS), 0x56);
        assert_eq!(rtc.offset(), -50);
    }

    #[test]
    fn test_alarm_dont_care_fires_once_per_second() {
        let (host, clock) = host("ds12_alarm");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, REG_SECONDS_ALARM, 0xc0);
        write(&mut rtc, REG_MINUTES_ALARM, 0xff);
        write(&mut rtc, REG_HOURS_ALARM, 0xc3);
        write(&mut rtc, REG_CTRL_B, CTRL_B_AIE | CTRL_B_24H);

        assert!(rtc.update_flags());
        assert!(!rtc.update_flags());
        assert_eq!(read(&mut rtc, REG_CTRL_C), 0x80 | 0x20 | 0x10);
        assert_eq!(read(&mut rtc, REG_CTRL_C), 0x00);

        clock.advance(1);
        assert!(rtc.update_flags());
        assert!(!rtc.update_flags());
    }

    #[test]
    fn test_alarm_compares_fields() {
        let (host, clock) = host("ds12_alarm_cmp");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, REG_SECONDS_ALARM, 0x58);
        write(&mut rtc, REG_MINUTES_ALARM, 0x34);
        write(&mut rtc, REG_HOURS_ALARM, 0xc0);
        write(&mut rtc, REG_CTRL_B, CTRL_B_AIE | CTRL_B_24H);

        // 12:34:56: update only, alarm disabled for UF
        assert!(!rtc.update_flags());
        assert_eq!(read(&mut rtc, REG_CTRL_C), 0x10);
        clock.advance(2);
        assert!(rtc.update_flags());
        assert_eq!(read(&mut rtc, REG_CTRL_C), 0x80 | 0x20 | 0x10);
    }

    #[test]
    fn test_update_interrupt_and_reset() {
        let (host, clock) = host("ds12_uie");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, REG_SECONDS_ALARM, 0x00);
        write(&mut rtc, REG_CTRL_B, CTRL_B_UIE | CTRL_B_24H);
        assert!(rtc.update_flags());
        clock.advance(1);
        rtc.reset();
        assert_eq!(read(&mut rtc, REG_CTRL_B), CTRL_B_24H);
        // The pending second change sets UF but no longer raises IRQF
        assert_eq!(read(&mut rtc, REG_CTRL_C), 0x10);
    }

    #[test]
    fn test_ram_and_ram_bits() {
        let (host, _clock) = host("ds12_ram");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, 14, 0xab);
        write(&mut rtc, 0x7f, 0xcd);
        // Address port ignores bit 7
        assert_eq!(read(&mut rtc, 0x80 | 14), 0xab);
        assert_eq!(read(&mut rtc, 0x7f), 0xcd);
        write(&mut rtc, REG_CTRL_B, CTRL_B_SET | CTRL_B_24H);
        write(&mut rtc, REG_MONTHS, 0xe6);
        write(&mut rtc, REG_CTRL_B, CTRL_B_24H);
        assert_eq!(read(&mut rtc, REG_MONTHS), 0xe6);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (host, _clock) = host("ds12_snap");
        let mut rtc = Ds12c887::new("DS12", &host);
        write(&mut rtc, 20, 0x42);
        write(&mut rtc, REG_HOURS_ALARM, 0x11);
        write(&mut rtc, REG_CTRL_B, CTRL_B_DM | CTRL_B_AIE);
        rtc.base.offset = -0x2_0000_0001;
        rtc.update_flags();

        let mut snap = Snapshot::new();
        rtc.write_snapshot(&mut snap).unwrap();
        let mut copy = Ds12c887::new("X", &host);
        copy.read_snapshot(&snap).unwrap();
        let mut again = Snapshot::new();
        copy.write_snapshot(&mut again).unwrap();
        assert_eq!(again, snap);

        assert_eq!(copy.offset(), -0x2_0000_0001);
        assert!(!copy.bcd);
        assert!(copy.twelve_hour);
        assert_eq!(read(&mut copy, 20), 0x42);
    }
}
