//! Decimal digit registers shared by the 4-bit parallel clocks.
//!
//! Each calendar field is split over a ones register and a tens register.
//! Writing one digit keeps the other digit of the same field. In 12-hour mode
//! the tens-of-hours register carries PM in bit 2; reading it in 24-hour mode
//! sets bit 3.

use crate::calendar::{self, Field};
use crate::chips::ChipBase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Digit {
    Seconds,
    TenSeconds,
    Minutes,
    TenMinutes,
    Hours,
    TenHours,
    Day,
    TenDay,
    Month,
    TenMonth,
    Year,
    TenYear,
}

const HOURS_24: u8 = 8;
const HOURS_PM: u8 = 4;
const AM_PM_FLAG: u8 = 0x20;

/// Binary hour for the current mode: 0..=23, or 1..=12 with PM in bit 5.
fn hour_value(t: i64, hour24: bool) -> u8 {
    if hour24 {
        calendar::get_hour(t, false)
    } else {
        calendar::get_hour_am_pm(t, false)
    }
}

pub(crate) fn read(digit: Digit, t: i64, hour24: bool) -> u8 {
    match digit {
        Digit::Seconds => calendar::get_second(t, false) % 10,
        Digit::TenSeconds => calendar::get_second(t, false) / 10,
        Digit::Minutes => calendar::get_minute(t, false) % 10,
        Digit::TenMinutes => calendar::get_minute(t, false) / 10,
        Digit::Hours => (hour_value(t, hour24) & !AM_PM_FLAG) % 10,
        Digit::TenHours => {
            let h = hour_value(t, hour24);
            if hour24 {
                HOURS_24 | h / 10
            } else if h & AM_PM_FLAG != 0 {
                HOURS_PM | (h & !AM_PM_FLAG) / 10
            } else {
                h / 10
            }
        }
        Digit::Day => calendar::get_day_of_month(t, false) % 10,
        Digit::TenDay => calendar::get_day_of_month(t, false) / 10,
        Digit::Month => calendar::get_month(t, false) % 10,
        Digit::TenMonth => calendar::get_month(t, false) / 10,
        Digit::Year => calendar::get_year(t, false) % 10,
        Digit::TenYear => calendar::get_year(t, false) / 10,
    }
}

fn with_ones(value: u8, data: u8) -> i32 {
    (value / 10 * 10 + data.min(9)) as i32
}

fn with_tens(value: u8, tens: u8) -> i32 {
    (value % 10 + tens * 10) as i32
}

/// Write one nibble. A write to the tens of hours also picks the hour mode.
pub(crate) fn write(base: &mut ChipBase, digit: Digit, data: u8, hour24: &mut bool) {
    let data = data & 0xf;
    let t = base.current();
    match digit {
        Digit::Seconds => base.set_field(Field::Second, with_ones(calendar::get_second(t, false), data), false),
        Digit::TenSeconds => {
            base.set_field(Field::Second, with_tens(calendar::get_second(t, false), data & 7), false)
        }
        Digit::Minutes => base.set_field(Field::Minute, with_ones(calendar::get_minute(t, false), data), false),
        Digit::TenMinutes => {
            base.set_field(Field::Minute, with_tens(calendar::get_minute(t, false), data & 7), false)
        }
        Digit::Hours => {
            let h = hour_value(t, *hour24);
            if *hour24 {
                base.set_field(Field::Hour, with_ones(h, data), false);
            } else {
                let pm = h & AM_PM_FLAG;
                let value = with_ones(h & !AM_PM_FLAG, data) | pm as i32;
                base.set_field(Field::HourAmPm, value, false);
            }
        }
        Digit::TenHours => {
            *hour24 = data & HOURS_24 != 0;
            if *hour24 {
                let h = calendar::get_hour(t, false);
                base.set_field(Field::Hour, with_tens(h, data & 3), false);
            } else {
                let h = calendar::get_hour_am_pm(t, false) & !AM_PM_FLAG;
                let pm = if data & HOURS_PM != 0 { AM_PM_FLAG } else { 0 };
                base.set_field(Field::HourAmPm, with_tens(h, data & 1) | pm as i32, false);
            }
        }
        Digit::Day => {
            base.set_field(Field::DayOfMonth, with_ones(calendar::get_day_of_month(t, false), data), false)
        }
        Digit::TenDay => {
            base.set_field(Field::DayOfMonth, with_tens(calendar::get_day_of_month(t, false), data & 3), false)
        }
        Digit::Month => base.set_field(Field::Month, with_ones(calendar::get_month(t, false), data), false),
        Digit::TenMonth => base.set_field(Field::Month, with_tens(calendar::get_month(t, false), data & 1), false),
        Digit::Year => base.set_field(Field::Year, with_ones(calendar::get_year(t, false), data), false),
        Digit::TenYear => base.set_field(Field::Year, with_tens(calendar::get_year(t, false), data.min(9)), false),
    }
}
