//! BQ4830Y: 32 KiB battery-backed SRAM with a BCD clock in the top eight bytes.
//!
//! | Address | Register     | RAM bits | Notes                          |
//! |---------|--------------|----------|--------------------------------|
//! | 0x7FF8  | control      | 5-0      | bit 7 write latch, 6 read latch |
//! | 0x7FF9  | seconds      | -        | bit 7 stops the oscillator     |
//! | 0x7FFA  | minutes      | 7        |                                |
//! | 0x7FFB  | hours        | 7-6      | 24-hour                        |
//! | 0x7FFC  | day of week  | 7-3      | 1..7                           |
//! | 0x7FFD  | day of month | 7-6      |                                |
//! | 0x7FFE  | month        | 7-5      |                                |
//! | 0x7FFF  | year         | -        | 00..99                         |
//!
//! Setting the read latch freezes the values the registers return. Setting
//! the write latch copies the clock into the registers; writes then land in
//! the registers and are committed to the clock when the latch is released.

use crate::calendar::{self, Field};
use crate::chips::{ChipBase, Host};
use crate::snapshot::{Snapshot, SnapshotError};

pub const RAM_SIZE: usize = 0x8000;
pub const REG_SIZE: usize = 8;

const ADDRESS_MASK: u16 = 0x7fff;

pub const REG_CONTROL: u16 = 0x7ff8;
pub const REG_SECONDS: u16 = 0x7ff9;
pub const REG_MINUTES: u16 = 0x7ffa;
pub const REG_HOURS: u16 = 0x7ffb;
pub const REG_DAYS_OF_WEEK: u16 = 0x7ffc;
pub const REG_DAYS_OF_MONTH: u16 = 0x7ffd;
pub const REG_MONTHS: u16 = 0x7ffe;
pub const REG_YEARS: u16 = 0x7fff;

const SNAP_MODULE_NAME: &str = "RTC_BQ4830Y";
const SNAP_MAJOR: u8 = 0;
const SNAP_MINOR: u8 = 0;

/// Control register latch bits (bit 6 read, bit 7 write).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    None,
    Read,
    Write,
    ReadWrite,
}

impl LatchState {
    fn from_bits(read: bool, write: bool) -> Self {
        match (read, write) {
            (false, false) => LatchState::None,
            (true, false) => LatchState::Read,
            (false, true) => LatchState::Write,
            (true, true) => LatchState::ReadWrite,
        }
    }

    fn read_latched(self) -> bool {
        matches!(self, LatchState::Read | LatchState::ReadWrite)
    }

    fn write_latched(self) -> bool {
        matches!(self, LatchState::Write | LatchState::ReadWrite)
    }
}

fn reg_index(address: u16) -> usize {
    (address & 7) as usize
}

pub struct Bq4830y {
    base: ChipBase,
    latch_state: LatchState,
    latch: i64,
    changed: [bool; REG_SIZE],
}

impl Bq4830y {
    pub fn new(device: &str, host: &Host) -> Self {
        Bq4830y {
            base: ChipBase::open(device, host, RAM_SIZE, REG_SIZE),
            latch_state: LatchState::None,
            latch: 0,
            changed: [false; REG_SIZE],
        }
    }

    /// Release the chip, saving its context when `save` is set and it changed.
    pub fn destroy(self, save: bool) {
        self.base.destroy(save);
    }

    pub fn offset(&self) -> i64 {
        self.base.offset
    }

    pub fn is_halted(&self) -> bool {
        self.base.halted
    }

    pub fn latch_state(&self) -> LatchState {
        self.latch_state
    }

    // ─── Latch handling ─────────────────────────────────────────────────

    fn capture_latch(&mut self) {
        self.latch = self.base.current();
    }

    /// Copy the latched time into the registers, keeping their RAM bits.
    fn latch_write_regs(&mut self) {
        let t = self.latch;
        let regs = &mut self.base.regs;
        regs[reg_index(REG_SECONDS)] = (regs[reg_index(REG_SECONDS)] & 0x80) | calendar::get_second(t, true);
        regs[reg_index(REG_MINUTES)] = (regs[reg_index(REG_MINUTES)] & 0x80) | calendar::get_minute(t, true);
        regs[reg_index(REG_HOURS)] = (regs[reg_index(REG_HOURS)] & 0xc0) | calendar::get_hour(t, true);
        regs[reg_index(REG_DAYS_OF_WEEK)] =
            (regs[reg_index(REG_DAYS_OF_WEEK)] & 0xf8) | (calendar::get_weekday(t, false) + 1);
        regs[reg_index(REG_DAYS_OF_MONTH)] =
            (regs[reg_index(REG_DAYS_OF_MONTH)] & 0xc0) | calendar::get_day_of_month(t, true);
        regs[reg_index(REG_MONTHS)] = (regs[reg_index(REG_MONTHS)] & 0xe0) | calendar::get_month(t, true);
        regs[reg_index(REG_YEARS)] = calendar::get_year(t, true);
        self.changed = [false; REG_SIZE];
    }

    /// Commit registers written under the write latch, largest field first.
    fn write_clock_data(&mut self) {
        let commits: [(u16, Field, u8); 7] = [
            (REG_YEARS, Field::Year, 0xff),
            (REG_MONTHS, Field::Month, 0x1f),
            (REG_DAYS_OF_MONTH, Field::DayOfMonth, 0x3f),
            (REG_DAYS_OF_WEEK, Field::Weekday, 0x07),
            (REG_HOURS, Field::Hour, 0x3f),
            (REG_MINUTES, Field::Minute, 0x7f),
            (REG_SECONDS, Field::Second, 0x7f),
        ];
        for (reg, field, mask) in commits {
            let i = reg_index(reg);
            if !self.changed[i] {
                continue;
            }
            let val = (self.base.regs[i] & mask) as i32;
            match field {
                Field::Weekday => self.base.set_field(field, val - 1, false),
                _ => self.base.set_field(field, val, true),
            }
        }
    }

    fn set_latch_state(&mut self, target: LatchState) {
        use LatchState::*;
        match (self.latch_state, target) {
            (Write, None) | (ReadWrite, None) | (ReadWrite, Read) => self.write_clock_data(),
            (Write, Read) => {
                self.write_clock_data();
                self.capture_latch();
            }
            (None, Read) => self.capture_latch(),
            (None, Write) | (Read, Write) | (None, ReadWrite) => {
                self.capture_latch();
                self.latch_write_regs();
            }
            (Read, ReadWrite) => self.latch_write_regs(),
            // Dropping only the read latch, or adding it to a write latch
            _ => {}
        }
        log::trace!("{}: latch {:?} -> {:?}", self.base.device, self.latch_state, target);
        self.latch_state = target;
    }

    // ─── Bus access ─────────────────────────────────────────────────────

    /// Store a register byte, keeping only its RAM bits unless write-latched.
    fn store_clock_reg(&mut self, address: u16, value: u8, ram_mask: u8) {
        let i = reg_index(address);
        if self.latch_state.write_latched() {
            self.base.regs[i] = value;
            self.changed[i] = true;
        } else {
            self.base.regs[i] = (self.base.regs[i] & !ram_mask) | (value & ram_mask);
        }
    }

    pub fn store(&mut self, address: u16, value: u8) {
        let address = address & ADDRESS_MASK;
        match address {
            REG_MINUTES => self.store_clock_reg(address, value, 0x80),
            REG_HOURS | REG_DAYS_OF_MONTH => self.store_clock_reg(address, value, 0xc0),
            REG_DAYS_OF_WEEK => self.store_clock_reg(address, value, 0xf8),
            REG_MONTHS => self.store_clock_reg(address, value, 0xe0),
            REG_YEARS => self.store_clock_reg(address, value, 0x00),
            REG_SECONDS => {
                self.store_clock_reg(address, value, 0x80);
                match (value & 0x80 != 0, self.base.halted) {
                    (true, false) => self.base.halt(),
                    (false, true) => self.base.resume(),
                    _ => {}
                }
            }
            REG_CONTROL => {
                let i = reg_index(address);
                self.base.regs[i] = (self.base.regs[i] & 0xc0) | (value & 0x3f);
                self.set_latch_state(LatchState::from_bits(value & 0x40 != 0, value & 0x80 != 0));
            }
            _ => self.base.ram[address as usize] = value,
        }
    }

    pub fn read(&self, address: u16) -> u8 {
        let address = address & ADDRESS_MASK;
        let t = if self.base.halted {
            self.base.halt_latch
        } else if self.latch_state != LatchState::None {
            self.latch
        } else {
            self.base.running()
        };
        let reg = |a: u16| self.base.regs[reg_index(a)];

        match address {
            REG_MINUTES => (reg(address) & 0x80) | calendar::get_minute(t, true),
            REG_HOURS => (reg(address) & 0xc0) | calendar::get_hour(t, true),
            REG_DAYS_OF_WEEK => (reg(address) & 0xf8) | (calendar::get_weekday(t, false) + 1),
            REG_DAYS_OF_MONTH => (reg(address) & 0xc0) | calendar::get_day_of_month(t, true),
            REG_MONTHS => (reg(address) & 0xe0) | calendar::get_month(t, true),
            REG_YEARS => calendar::get_year(t, true),
            REG_CONTROL => {
                (reg(address) & 0x3f)
                    | ((self.latch_state.write_latched() as u8) << 7)
                    | ((self.latch_state.read_latched() as u8) << 6)
            }
            REG_SECONDS => ((self.base.halted as u8) << 7) | calendar::get_second(t, true),
            _ => self.base.ram[address as usize],
        }
    }

    // ─── Snapshot ───────────────────────────────────────────────────────

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_bool(self.base.halted);
        m.write_time(self.base.halt_latch);
        m.write_bool(self.latch_state.read_latched());
        m.write_bool(self.latch_state.write_latched());
        m.write_time(self.latch);
        m.write_time(self.base.offset);
        m.write_time(self.base.old_offset);
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
        let read_latch = r.read_bool()?;
        let write_latch = r.read_bool()?;
        let latch = r.read_time()?;
        let offset = r.read_time()?;
        let old_offset = r.read_time()?;
        let mut regs = [0u8; REG_SIZE];
        let mut old_regs = [0u8; REG_SIZE];
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

        self.base.halted = halted;
        self.base.halt_latch = halt_latch;
        self.latch_state = LatchState::from_bits(read_latch, write_latch);
        self.latch = latch;
        self.base.offset = offset;
        self.base.old_offset = old_offset;
        self.base.regs = regs.to_vec();
        self.base.old_regs = old_regs.to_vec();
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

    #[test]
    fn test_ram_store_and_read() {
        let (host, _clock) = host("bq_ram");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(0x0000, 0x12);
        rtc.store(0x7ff7, 0x34);
        // Address lines above A14 are ignored
        rtc.store(0x8001, 0x56);
        assert_eq!(rtc.read(0x0000), 0x12);
        assert_eq!(rtc.read(0x7ff7), 0x34);
        assert_eq!(rtc.read(0x0001), 0x56);
    }

    #[test]
    fn test_clock_registers_read_bcd() {
        // 2021-06-15 12:34:56, a Tuesday
        let (host, _clock) = host("bq_regs");
        let rtc = Bq4830y::new("BQ", &host);
        assert_eq!(rtc.read(REG_SECONDS), 0x56);
        assert_eq!(rtc.read(REG_MINUTES), 0x34);
        assert_eq!(rtc.read(REG_HOURS), 0x12);
        assert_eq!(rtc.read(REG_DAYS_OF_WEEK), 3);
        assert_eq!(rtc.read(REG_DAYS_OF_MONTH), 0x15);
        assert_eq!(rtc.read(REG_MONTHS), 0x06);
        assert_eq!(rtc.read(REG_YEARS), 0x21);
    }

    #[test]
    fn test_ram_bits_in_clock_registers() {
        let (host, _clock) = host("bq_rambits");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(REG_MINUTES, 0x80 | 0x01);
        rtc.store(REG_MONTHS, 0xff);
        assert_eq!(rtc.read(REG_MINUTES), 0x80 | 0x34);
        assert_eq!(rtc.read(REG_MONTHS), 0xe0 | 0x06);
        // Time itself is untouched without the write latch
        assert_eq!(rtc.offset(), 0);
        rtc.store(REG_CONTROL, 0x15);
        assert_eq!(rtc.read(REG_CONTROL), 0x15);
    }

    #[test]
    fn test_read_latch_freezes_registers() {
        let (host, clock) = host("bq_readlatch");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(REG_CONTROL, 0x40);
        assert_eq!(rtc.read(REG_CONTROL), 0x40);
        let first = rtc.read(REG_SECONDS);
        clock.advance(3);
        assert_eq!(rtc.read(REG_SECONDS), first);
        assert_eq!(rtc.read(REG_SECONDS), first);
        rtc.store(REG_CONTROL, 0x00);
        assert_eq!(rtc.read(REG_SECONDS), 0x59);
    }

    #[test]
    fn test_write_latch_commits_changed_registers() {
        let (host, clock) = host("bq_writelatch");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(REG_CONTROL, 0x80);
        assert_eq!(rtc.latch_state(), LatchState::Write);
        rtc.store(REG_HOURS, 0x07);
        rtc.store(REG_MINUTES, 0x45);
        rtc.store(REG_YEARS, 0x99);
        rtc.store(REG_CONTROL, 0x00);
        assert_eq!(rtc.read(REG_HOURS), 0x07);
        assert_eq!(rtc.read(REG_MINUTES), 0x45);
        assert_eq!(rtc.read(REG_YEARS), 0x99);
        // Unwritten fields keep running
        assert_eq!(rtc.read(REG_SECONDS), 0x56);
        assert_eq!(rtc.read(REG_DAYS_OF_MONTH), 0x15);
        clock.advance(2);
        assert_eq!(rtc.read(REG_SECONDS), 0x58);
    }

    #[test]
    fn test_invalid_write_is_ignored() {
        let (host, _clock) = host("bq_invalid");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(REG_CONTROL, 0x80);
        rtc.store(REG_MONTHS, 0x13);
        rtc.store(REG_CONTROL, 0x00);
        assert_eq!(rtc.offset(), 0);
        assert_eq!(rtc.read(REG_MONTHS), 0x06);
    }

    #[test]
    fn test_halt_and_resume() {
        let (host, clock) = host("bq_halt");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(REG_SECONDS, 0x80);
        assert!(rtc.is_halted());
        clock.advance(100);
        assert_eq!(rtc.read(REG_SECONDS), 0x80 | 0x56);
        rtc.store(REG_SECONDS, 0x00);
        assert!(!rtc.is_halted());
        assert_eq!(rtc.read(REG_SECONDS), 0x56);
        assert_eq!(rtc.offset(), -100);
    }

    #[test]
    fn test_write_while_halted_goes_to_latch() {
        let (host, clock) = host("bq_haltwrite");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(REG_SECONDS, 0x80);
        rtc.store(REG_CONTROL, 0x80);
        rtc.store(REG_MINUTES, 0x00);
        rtc.store(REG_SECONDS, 0x80);
        rtc.store(REG_CONTROL, 0x00);
        clock.advance(30);
        assert_eq!(rtc.read(REG_MINUTES), 0x00);
        assert_eq!(rtc.read(REG_SECONDS), 0x80);
        rtc.store(REG_SECONDS, 0x00);
        clock.advance(5);
        assert_eq!(rtc.read(REG_SECONDS), 0x05);
        assert_eq!(rtc.read(REG_MINUTES), 0x00);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (host, _clock) = host("bq_snap");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(0x1234, 0xaa);
        rtc.store(REG_CONTROL, 0xc0);
        rtc.store(REG_MINUTES, 0x11);
        rtc.base.offset = 0x1_2345_6789;

        let mut snap = Snapshot::new();
        rtc.write_snapshot(&mut snap).unwrap();

        let mut copy = Bq4830y::new("OTHER", &host);
        copy.read_snapshot(&snap).unwrap();
        assert_eq!(copy.offset(), 0x1_2345_6789);
        assert_eq!(copy.latch_state(), LatchState::ReadWrite);
        assert_eq!(copy.read(0x1234), 0xaa);
        assert_eq!(copy.base.device, "BQ");

        let mut again = Snapshot::new();
        copy.write_snapshot(&mut again).unwrap();
        assert_eq!(again, snap);
    }

    #[test]
    fn test_snapshot_rejects_newer_module() {
        let (host, _clock) = host("bq_snapver");
        let mut snap = Snapshot::new();
        snap.create_module(SNAP_MODULE_NAME, 0, 1).unwrap().close();
        let mut rtc = Bq4830y::new("BQ", &host);
        assert!(matches!(rtc.read_snapshot(&snap), Err(SnapshotError::VersionTooNew { .. })));
    }

    #[test]
    fn test_truncated_snapshot_leaves_chip_untouched() {
        let (host, _clock) = host("bq_snaptrunc");
        let mut snap = Snapshot::new();
        let mut m = snap.create_module(SNAP_MODULE_NAME, 0, 0).unwrap();
        m.write_bool(true);
        m.close();
        let mut rtc = Bq4830y::new("BQ", &host);
        assert!(matches!(rtc.read_snapshot(&snap), Err(SnapshotError::Truncated { .. })));
        assert!(!rtc.is_halted());
    }

    #[test]
    fn test_context_persists_ram_and_offset() {
        let (host, _clock) = host("bq_persist");
        let mut rtc = Bq4830y::new("BQ", &host);
        rtc.store(0x0010, 0x5a);
        rtc.store(REG_CONTROL, 0x80);
        rtc.store(REG_YEARS, 0x30);
        rtc.store(REG_CONTROL, 0x00);
        let offset = rtc.offset();
        rtc.destroy(true);

        let rtc = Bq4830y::new("BQ", &host);
        assert_eq!(rtc.read(0x0010), 0x5a);
        assert_eq!(rtc.offset(), offset);
        assert_eq!(rtc.read(REG_YEARS), 0x30);
    }
}
