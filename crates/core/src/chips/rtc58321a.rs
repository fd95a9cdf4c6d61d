//! RTC-58321A: 4-bit clock with a multiplexed address/data bus.
//!
//! The host latches a register number with [`Rtc58321a::write_address`],
//! then moves one nibble with [`Rtc58321a::write_data`] or
//! [`Rtc58321a::read`]. The STOP pin freezes the clock.
//!
//! | Reg | Digit                                       |
//! |-----|---------------------------------------------|
//! | 0   | seconds                                     |
//! | 1   | 10 seconds                                  |
//! | 2   | minutes                                     |
//! | 3   | 10 minutes                                  |
//! | 4   | hours                                       |
//! | 5   | 10 hours, bit 3 24-hour mode, bit 2 PM      |
//! | 6   | weekday, 0 = Sunday                         |
//! | 7   | day                                         |
//! | 8   | 10 day, bits 3-2 year mod 4                 |
//! | 9   | month                                       |
//! | 10  | 10 month                                    |
//! | 11  | year                                        |
//! | 12  | 10 year                                     |

use crate::calendar::{self, Field};
use crate::chips::digits::{self, Digit};
use crate::chips::{ChipBase, Host};
use crate::snapshot::{Snapshot, SnapshotError};

pub const REGISTER_SECONDS: u8 = 0;
pub const REGISTER_10SECONDS: u8 = 1;
pub const REGISTER_MINUTES: u8 = 2;
pub const REGISTER_10MINUTES: u8 = 3;
pub const REGISTER_HOURS: u8 = 4;
pub const REGISTER_10HOURS: u8 = 5;
pub const REGISTER_WEEKDAYS: u8 = 6;
pub const REGISTER_MONTHDAYS: u8 = 7;
pub const REGISTER_10MONTHDAYS: u8 = 8;
pub const REGISTER_MONTHS: u8 = 9;
pub const REGISTER_10MONTHS: u8 = 10;
pub const REGISTER_YEARS: u8 = 11;
pub const REGISTER_10YEARS: u8 = 12;

const SNAP_MODULE_NAME: &str = "RTC_58321A";
const SNAP_MAJOR: u8 = 0;
const SNAP_MINOR: u8 = 0;

fn digit(reg: u8) -> Option<Digit> {
    Some(match reg {
        REGISTER_SECONDS => Digit::Seconds,
        REGISTER_10SECONDS => Digit::TenSeconds,
        REGISTER_MINUTES => Digit::Minutes,
        REGISTER_10MINUTES => Digit::TenMinutes,
        REGISTER_HOURS => Digit::Hours,
        REGISTER_10HOURS => Digit::TenHours,
        REGISTER_MONTHDAYS => Digit::Day,
        REGISTER_10MONTHDAYS => Digit::TenDay,
        REGISTER_MONTHS => Digit::Month,
        REGISTER_10MONTHS => Digit::TenMonth,
        REGISTER_YEARS => Digit::Year,
        REGISTER_10YEARS => Digit::TenYear,
        _ => return None,
    })
}

pub struct Rtc58321a {
    base: ChipBase,
    hour24: bool,
    address: u8,
}

impl Rtc58321a {
    pub fn new(device: &str, host: &Host) -> Self {
        Rtc58321a {
            base: ChipBase::open(device, host, 0, 0),
            hour24: false,
            address: 0,
        }
    }

    pub fn destroy(self, save: bool) {
        self.base.destroy(save);
    }

    pub fn offset(&self) -> i64 {
        self.base.offset
    }

    pub fn is_stopped(&self) -> bool {
        self.base.halted
    }

    pub fn time(&self) -> i64 {
        self.base.current()
    }

    pub fn read(&self) -> u8 {
        let t = self.base.current();
        match self.address {
            REGISTER_WEEKDAYS => calendar::get_weekday(t, false),
            REGISTER_10MONTHDAYS => {
                let leap = calendar::get_year(t, false) % 4;
                (leap << 2) | digits::read(Digit::TenDay, t, self.hour24)
            }
            reg => digit(reg).map_or(0, |d| digits::read(d, t, self.hour24)),
        }
    }

    pub fn write_address(&mut self, address: u8) {
        self.address = address & 0xf;
    }

    pub fn write_data(&mut self, data: u8) {
        let data = data & 0xf;
        log::trace!("{}: write reg {} = {:x}", self.base.device, self.address, data);
        match self.address {
            REGISTER_WEEKDAYS => self.base.set_field(Field::Weekday, (data & 7) as i32, false),
            reg => {
                if let Some(d) = digit(reg) {
                    digits::write(&mut self.base, d, data, &mut self.hour24);
                }
            }
        }
    }

    pub fn stop_clock(&mut self) {
        self.base.halt();
    }

    pub fn start_clock(&mut self) {
        self.base.resume();
    }

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_bool(self.base.halted);
        m.write_time(self.base.halt_latch);
        m.write_bool(self.hour24);
        m.write_u8(self.address);
        m.write_time(self.base.offset);
        m.write_time(self.base.old_offset);
        self.base.write_device(&mut m);
        m.close();
        Ok(())
    }

    pub fn read_snapshot(&mut self, s: &Snapshot) -> Result<(), SnapshotError> {
        let mut r = s.open_versioned(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        let halted = r.read_bool()?;
        let halt_latch = r.read_time()?;
        let hour24 = r.read_bool()?;
        let address = r.read_u8()?;
        let offset = r.read_time()?;
        let old_offset = r.read_time()?;
        let device = r.read_str()?;

        self.base.halted = halted;
        self.base.halt_latch = halt_latch;
        self.hour24 = hour24;
        self.address = address & 0xf;
        self.base.offset = offset;
        self.base.old_offset = old_offset;
        self.base.device = device;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::test_support::host;

    fn read_reg(rtc: &mut Rtc58321a, reg: u8) -> u8 {
        rtc.write_address(reg);
        rtc.read()
    }

    fn write_reg(rtc: &mut Rtc58321a, reg: u8, data: u8) {
        rtc.write_address(reg);
        rtc.write_data(data);
    }

    #[test]
    fn test_read_registers() {
        // 2021-06-15 12:34:56, a Tuesday
        let (host, _clock) = host("rtc58321a_read");
        let mut rtc = Rtc58321a::new("RTC58321A", &host);
        let regs: Vec<u8> = (0..16).map(|r| read_reg(&mut rtc, r)).collect();
        // 12 PM in 12-hour mode, 2021 is one past a leap year
        assert_eq!(regs, [6, 5, 4, 3, 2, 4 | 1, 2, 5, (1 << 2) | 1, 6, 0, 1, 2, 0, 0, 0]);
    }

    #[test]
    fn test_ten_seconds_write_keeps_ones() {
        let (host, clock) = host("rtc58321a_10s");
        clock.advance(-20);
        let mut rtc = Rtc58321a::new("RTC58321A", &host);
        assert_eq!(read_reg(&mut rtc, REGISTER_10SECONDS), 3);
        write_reg(&mut rtc, REGISTER_10SECONDS, 5);
        assert_eq!(read_reg(&mut rtc, REGISTER_10SECONDS), 5);
        assert_eq!(read_reg(&mut rtc, REGISTER_SECONDS), 6);
        assert_eq!(rtc.offset(), 20);
    }

    #[test]
    fn test_24_hour_mode() {
        let (host, _clock) = host("rtc58321a_24h");
        let mut rtc = Rtc58321a::new("RTC58321A", &host);
        write_reg(&mut rtc, REGISTER_10HOURS, 8 | 1);
        assert_eq!(read_reg(&mut rtc, REGISTER_10HOURS), 8 | 1);
        write_reg(&mut rtc, REGISTER_HOURS, 7);
        assert_eq!(calendar::get_hour(rtc.time(), false), 17);
        assert_eq!(read_reg(&mut rtc, REGISTER_10HOURS), 8 | 1);
    }

    #[test]
    fn test_weekday_and_date() {
        let (host, _clock) = host("rtc58321a_date");
        let mut rtc = Rtc58321a::new("RTC58321A", &host);
        write_reg(&mut rtc, REGISTER_WEEKDAYS, 5);
        // Tuesday the 15th to Friday the 18th
        assert_eq!(read_reg(&mut rtc, REGISTER_MONTHDAYS), 8);
        write_reg(&mut rtc, REGISTER_10YEARS, 2);
        write_reg(&mut rtc, REGISTER_YEARS, 4);
        assert_eq!(read_reg(&mut rtc, REGISTER_10MONTHDAYS), 1);
        // 16 is not a month
        write_reg(&mut rtc, REGISTER_10MONTHS, 1);
        assert_eq!(calendar::get_month(rtc.time(), false), 6);
        write_reg(&mut rtc, REGISTER_MONTHS, 2);
        write_reg(&mut rtc, REGISTER_10MONTHS, 1);
        assert_eq!(calendar::get_month(rtc.time(), false), 12);
    }

    #[test]
    fn test_stop_and_start() {
        let (host, clock) = host("rtc58321a_stop");
        let mut rtc = Rtc58321a::new("RTC58321A", &host);
        rtc.stop_clock();
        assert!(rtc.is_stopped());
        clock.advance(7);
        assert_eq!(read_reg(&mut rtc, REGISTER_SECONDS), 6);
        write_reg(&mut rtc, REGISTER_SECONDS, 0);
        rtc.start_clock();
        assert_eq!(read_reg(&mut rtc, REGISTER_SECONDS), 0);
        assert_eq!(rtc.offset(), -13);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (host, _clock) = host("rtc58321a_snap");
        let mut rtc = Rtc58321a::new("RTC58321A", &host);
        write_reg(&mut rtc, REGISTER_10HOURS, 8 | 2);
        rtc.write_address(REGISTER_10YEARS);
        rtc.stop_clock();

        let mut snap = Snapshot::new();
        rtc.write_snapshot(&mut snap).unwrap();
        let mut copy = Rtc58321a::new("X", &host);
        copy.read_snapshot(&snap).unwrap();
        assert!(copy.is_stopped());
        assert_eq!(copy.read(), 2);
        assert_eq!(copy.time(), rtc.time());
        let mut again = Snapshot::new();
        copy.write_snapshot(&mut again).unwrap();
        assert_eq!(again, snap);
    }
}
