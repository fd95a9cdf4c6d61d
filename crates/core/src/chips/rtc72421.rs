//! RTC-72421: 4-bit clock with separate address and data lines.
//!
//! | Reg | Digit                           |
//! |-----|---------------------------------|
//! | 0   | seconds                         |
//! | 1   | 10 seconds                      |
//! | 2   | minutes                         |
//! | 3   | 10 minutes                      |
//! | 4   | hours                           |
//! | 5   | 10 hours, bit 2 PM              |
//! | 6   | day                             |
//! | 7   | 10 day                          |
//! | 8   | month                           |
//! | 9   | 10 month                        |
//! | 10  | year                            |
//! | 11  | 10 year                         |
//! | 12  | weekday, 0 = Monday             |
//! | 15  | control, bit 2 24h, bit 1 stop  |

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
pub const REGISTER_MONTHDAYS: u8 = 6;
pub const REGISTER_10MONTHDAYS: u8 = 7;
pub const REGISTER_MONTHS: u8 = 8;
pub const REGISTER_10MONTHS: u8 = 9;
pub const REGISTER_YEARS: u8 = 10;
pub const REGISTER_10YEARS: u8 = 11;
pub const REGISTER_WEEKDAYS: u8 = 12;
pub const REGISTER_CTRL2: u8 = 15;

const CTRL_24H: u8 = 4;
const CTRL_STOP: u8 = 2;

const SNAP_MODULE_NAME: &str = "RTC_72421";
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

pub struct Rtc72421 {
    base: ChipBase,
    hour24: bool,
}

impl Rtc72421 {
    pub fn new(device: &str, host: &Host) -> Self {
        Rtc72421 {
            base: ChipBase::open(device, host, 0, 0),
            hour24: false,
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

    pub fn read(&self, address: u8) -> u8 {
        let t = self.base.current();
        match address & 0xf {
            REGISTER_WEEKDAYS => (calendar::get_weekday(t, false) + 6) % 7,
            REGISTER_CTRL2 => {
                (if self.hour24 { CTRL_24H } else { 0 }) | (if self.base.halted { CTRL_STOP } else { 0 })
            }
            reg => digit(reg).map_or(0, |d| digits::read(d, t, self.hour24)),
        }
    }

    pub fn write(&mut self, address: u8, data: u8) {
        let data = data & 0xf;
        log::trace!("{}: write reg {} = {:x}", self.base.device, address & 0xf, data);
        match address & 0xf {
            REGISTER_WEEKDAYS => {
                if data < 7 {
                    self.base.set_field(Field::Weekday, ((data + 1) % 7) as i32, false);
                }
            }
            REGISTER_CTRL2 => {
                self.hour24 = data & CTRL_24H != 0;
                if data & CTRL_STOP != 0 {
                    self.base.halt();
                } else {
                    self.base.resume();
                }
            }
            reg => {
                if let Some(d) = digit(reg) {
                    digits::write(&mut self.base, d, data, &mut self.hour24);
                }
            }
        }
    }

    pub fn write_snapshot(&self, s: &mut Snapshot) -> Result<(), SnapshotError> {
        let mut m = s.create_module(SNAP_MODULE_NAME, SNAP_MAJOR, SNAP_MINOR)?;
        m.write_bool(self.base.halted);
        m.write_time(self.base.halt_latch);
        m.write_bool(self.hour24);
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
        let offset = r.read_time()?;
        let old_offset = r.read_time()?;
        let device = r.read_str()?;

        self.base.halted = halted;
        self.base.halt_latch = halt_latch;
        self.hour24 = hour24;
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

    #[test]
    fn test_read_registers() {
        // 2021-06-15 12:34:56, a Tuesday
        let (host, _clock) = host("rtc72421_read");
        let rtc = Rtc72421::new("RTC72421", &host);
        let regs: Vec<u8> = (0..16).map(|r| rtc.read(r)).collect();
        assert_eq!(regs, [6, 5, 4, 3, 2, 4 | 1, 5, 1, 6, 0, 1, 2, 1, 0, 0, 0]);
    }

    #[test]
    fn test_weekday_starts_monday() {
        let (host, _clock) = host("rtc72421_weekday");
        let mut rtc = Rtc72421::new("RTC72421", &host);
        // Sunday
        rtc.write(REGISTER_WEEKDAYS, 6);
        assert_eq!(calendar::get_weekday(rtc.time(), false), 0);
        assert_eq!(rtc.read(REGISTER_WEEKDAYS), 6);
        assert_eq!(rtc.read(REGISTER_MONTHDAYS), 3);
        rtc.write(REGISTER_WEEKDAYS, 0);
        assert_eq!(rtc.read(REGISTER_MONTHDAYS), 4);
        // 7 has no day
        rtc.write(REGISTER_WEEKDAYS, 7);
        assert_eq!(rtc.read(REGISTER_WEEKDAYS), 0);
    }

    #[test]
    fn test_control_register() {
        let (host, clock) = host("rtc72421_ctrl");
        let mut rtc = Rtc72421::new("RTC72421", &host);
        rtc.write(REGISTER_CTRL2, CTRL_24H | CTRL_STOP);
        assert_eq!(rtc.read(REGISTER_CTRL2), CTRL_24H | CTRL_STOP);
        assert_eq!(rtc.read(REGISTER_10HOURS), 8 | 1);
        clock.advance(5);
        // Rewriting stop while stopped keeps the original latch
        rtc.write(REGISTER_CTRL2, CTRL_24H | CTRL_STOP);
        assert_eq!(rtc.read(REGISTER_SECONDS), 6);
        rtc.write(REGISTER_CTRL2, CTRL_24H);
        assert_eq!(rtc.read(REGISTER_CTRL2), CTRL_24H);
        assert_eq!(rtc.offset(), -5);
        // Clearing stop while running leaves the offset alone
        rtc.write(REGISTER_CTRL2, 0);
        assert_eq!(rtc.offset(), -5);
        assert_eq!(rtc.read(REGISTER_10HOURS), 4 | 1);
    }

    #[test]
    fn test_digit_writes() {
        let (host, _clock) = host("rtc72421_digits");
        let mut rtc = Rtc72421::new("RTC72421", &host);
        rtc.write(REGISTER_10MINUTES, 0);
        rtc.write(REGISTER_MINUTES, 9);
        assert_eq!(calendar::get_minute(rtc.time(), false), 9);
        rtc.write(REGISTER_10MONTHDAYS, 3);
        assert_eq!(calendar::get_day_of_month(rtc.time(), false), 15);
        rtc.write(REGISTER_MONTHDAYS, 0);
        rtc.write(REGISTER_10MONTHDAYS, 3);
        assert_eq!(calendar::get_day_of_month(rtc.time(), false), 30);
        // 12-hour mode, AM, 0 tens: 12:xx PM becomes 2 AM
        rtc.write(REGISTER_10HOURS, 0);
        assert_eq!(calendar::get_hour(rtc.time(), false), 2);
    }

    #[test]
    fn test_context_round_trip() {
        let (host, _clock) = host("rtc72421_ctx");
        let mut rtc = Rtc72421::new("RTC72421", &host);
        rtc.write(REGISTER_10YEARS, 3);
        let offset = rtc.offset();
        rtc.destroy(true);
        let rtc = Rtc72421::new("RTC72421", &host);
        assert_eq!(rtc.offset(), offset);
        assert_eq!(rtc.read(REGISTER_10YEARS), 3);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (host, clock) = host("rtc72421_snap");
        let mut rtc = Rtc72421::new("RTC72421", &host);
        rtc.write(REGISTER_CTRL2, CTRL_24H | CTRL_STOP);
        clock.advance(3);

        let mut snap = Snapshot::new();
        rtc.write_snapshot(&mut snap).unwrap();
        let mut copy = Rtc72421::new("X", &host);
        copy.read_snapshot(&snap).unwrap();
        assert_eq!(copy.read(REGISTER_CTRL2), CTRL_24H | CTRL_STOP);
        copy.write(REGISTER_CTRL2, CTRL_24H);
        assert_eq!(copy.offset(), -3);
        let mut again = Snapshot::new();
        rtc.write_snapshot(&mut again).unwrap();
        assert_eq!(again, snap);
    }
}
