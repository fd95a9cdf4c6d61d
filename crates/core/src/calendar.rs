//! Calendar arithmetic on offsets and latched timestamps.
//!
//! A chip's time is `host now + offset`. Getters decompose an absolute
//! timestamp into local calendar fields, encoded as BCD or binary. Setters
//! decompose, overwrite one field and recompose, returning either a new
//! offset (`set_*`) or a new absolute timestamp (`set_latched_*`).
//!
//! Out-of-range requests are rejected silently: the input offset or latch is
//! returned unchanged.
//!
//! Recomposition behaves like `mktime`: a day number past the end of the
//! month rolls into the following month, a local time inside a DST gap moves
//! forward one hour and an ambiguous local time resolves to the earlier
//! instant.

use chrono::{Datelike, Days, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use crate::clock::TimeSource;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Settable calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Second,
    Minute,
    /// 24-hour value, 0..=23.
    Hour,
    /// 12-hour value 1..=12 with the PM flag in bit 5.
    HourAmPm,
    DayOfMonth,
    Month,
    /// Year within the century, 0..=99.
    Year,
    /// 19 or 20.
    Century,
    /// 0 = Sunday.
    Weekday,
    /// 0-based.
    DayOfYear,
}

/// Local calendar breakdown of a timestamp.
#[derive(Debug, Clone, Copy)]
struct Fields {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    weekday: u32,
    yday: u32,
}

impl Fields {
    fn from_naive(dt: &NaiveDateTime) -> Self {
        Fields {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            weekday: dt.weekday().num_days_from_sunday(),
            yday: dt.ordinal0(),
        }
    }
}

// ─── BCD and leap years ─────────────────────────────────────────────────────

/// Pack 0..=99 into two BCD digits.
pub fn int_to_bcd(dec: u8) -> u8 {
    ((dec / 10) << 4) + (dec % 10)
}

pub fn bcd_to_int(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0f)
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1..=12) of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn encode(value: u32, bcd: bool) -> u8 {
    if bcd {
        int_to_bcd(value as u8)
    } else {
        value as u8
    }
}

fn decode(value: i32, bcd: bool) -> i32 {
    if bcd && (0..=0xff).contains(&value) {
        bcd_to_int(value as u8) as i32
    } else {
        value
    }
}

// ─── Local time conversion ──────────────────────────────────────────────────

fn decompose(time: i64) -> Fields {
    match Local.timestamp_opt(time, 0) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Fields::from_naive(&dt.naive_local()),
        // Outside chrono's range: fall back to the epoch in UTC terms
        LocalResult::None => Fields::from_naive(&NaiveDateTime::default()),
    }
}

fn resolve(naive: NaiveDateTime) -> Option<i64> {
    match naive.and_local_timezone(Local) {
        LocalResult::Single(dt) => Some(dt.timestamp()),
        LocalResult::Ambiguous(early, _) => Some(early.timestamp()),
        LocalResult::None => {
            // DST gap
            let later = naive.checked_add_signed(chrono::Duration::hours(1))?;
            later.and_local_timezone(Local).earliest().map(|dt| dt.timestamp())
        }
    }
}

fn compose(f: &Fields) -> Option<i64> {
    let first = NaiveDate::from_ymd_opt(f.year, f.month, 1)?;
    let date = first.checked_add_days(Days::new(u64::from(f.day.saturating_sub(1))))?;
    resolve(date.and_hms_opt(f.hour, f.minute, f.second)?)
}

/// Timestamp of a local date and time, or `None` when it does not exist.
pub fn local_timestamp(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    resolve(date.and_hms_opt(hour, minute, second)?)
}

// ─── Getters ────────────────────────────────────────────────────────────────

/// Absolute chip time for a running offset.
pub fn get_latch(clock: &dyn TimeSource, offset: i64) -> i64 {
    clock.now() + offset
}

pub fn get_centisecond(clock: &dyn TimeSource, bcd: bool) -> u8 {
    encode(u32::from(clock.centisecond()), bcd)
}

pub fn get_second(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).second, bcd)
}

pub fn get_minute(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).minute, bcd)
}

/// Hour in 24-hour form.
pub fn get_hour(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).hour, bcd)
}

/// Hour in 12-hour form (1..=12), PM flag in bit 5.
pub fn get_hour_am_pm(time: i64, bcd: bool) -> u8 {
    let hour = decompose(time).hour;
    let (h12, pm) = match hour {
        0 => (12, false),
        1..=11 => (hour, false),
        12 => (12, true),
        _ => (hour - 12, true),
    };
    encode(h12, bcd) | if pm { 0x20 } else { 0 }
}

pub fn get_day_of_month(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).day, bcd)
}

/// Month, 1..=12.
pub fn get_month(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).month, bcd)
}

/// Year within the century, 0..=99.
pub fn get_year(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).year.rem_euclid(100) as u32, bcd)
}

pub fn get_century(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).year.div_euclid(100) as u32, bcd)
}

/// Day of week, 0 = Sunday.
pub fn get_weekday(time: i64, bcd: bool) -> u8 {
    encode(decompose(time).weekday, bcd)
}

/// 0-based day of the year. BCD packs three digits.
pub fn get_day_of_year(time: i64, bcd: bool) -> u16 {
    let yday = decompose(time).yday as u16;
    if bcd {
        ((yday / 100) << 8) | ((yday / 10 % 10) << 4) | (yday % 10)
    } else {
        yday
    }
}

// ─── Setters ────────────────────────────────────────────────────────────────

fn decode_day_of_year(value: i32, bcd: bool) -> i32 {
    if bcd && (0..=0xfff).contains(&value) {
        (value >> 8) * 100 + ((value >> 4) & 0xf) * 10 + (value & 0xf)
    } else {
        value
    }
}

/// Timestamp with one field replaced, or `None` when the value is invalid.
fn replace_field(time: i64, field: Field, value: i32, bcd: bool) -> Option<i64> {
    let mut f = decompose(time);
    let v = decode(value, bcd);
    match field {
        Field::Second => {
            if !(0..=59).contains(&v) {
                return None;
            }
            f.second = v as u32;
        }
        Field::Minute => {
            if !(0..=59).contains(&v) {
                return None;
            }
            f.minute = v as u32;
        }
        Field::Hour => {
            if !(0..=23).contains(&v) {
                return None;
            }
            f.hour = v as u32;
        }
        Field::HourAmPm => {
            if value < 0 {
                return None;
            }
            let hour = decode(value & 0x1f, bcd);
            let pm = value & 0x20 != 0;
            if !(1..=12).contains(&hour) {
                return None;
            }
            f.hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h as u32 + 12,
                (h, false) => h as u32,
            };
        }
        Field::DayOfMonth => {
            if v < 1 || v as u32 > days_in_month(f.year, f.month) {
                return None;
            }
            f.day = v as u32;
        }
        Field::Month => {
            if !(1..=12).contains(&v) {
                return None;
            }
            f.month = v as u32;
        }
        Field::Year => {
            if !(0..=99).contains(&v) {
                return None;
            }
            f.year = f.year - f.year.rem_euclid(100) + v;
        }
        Field::Century => {
            if v != 19 && v != 20 {
                return None;
            }
            f.year = f.year.rem_euclid(100) + v * 100;
        }
        Field::Weekday => {
            if !(0..=6).contains(&v) {
                return None;
            }
            return Some(time + (v as i64 - f.weekday as i64) * SECONDS_PER_DAY);
        }
        Field::DayOfYear => {
            let day = decode_day_of_year(value, bcd);
            let last = if is_leap_year(f.year) { 365 } else { 364 };
            if !(0..=last).contains(&day) {
                return None;
            }
            return Some(time + (day as i64 - f.yday as i64) * SECONDS_PER_DAY);
        }
    }
    compose(&f)
}

/// New offset after setting `field` on the running clock.
///
/// Reads the host clock itself, so a caller holding an older latch value may
/// see the result drift by the seconds elapsed in between.
pub fn set_field(clock: &dyn TimeSource, field: Field, value: i32, offset: i64, bcd: bool) -> i64 {
    let now = clock.now() + offset;
    match replace_field(now, field, value, bcd) {
        Some(t) => offset + (t - now),
        None => offset,
    }
}

/// New absolute timestamp after setting `field` on a latched time.
pub fn set_latched_field(field: Field, value: i32, latch: i64, bcd: bool) -> i64 {
    replace_field(latch, field, value, bcd).unwrap_or(latch)
}

pub fn set_second(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::Second, value, offset, bcd)
}

pub fn set_minute(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::Minute, value, offset, bcd)
}

pub fn set_hour(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::Hour, value, offset, bcd)
}

pub fn set_hour_am_pm(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::HourAmPm, value, offset, bcd)
}

pub fn set_day_of_month(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::DayOfMonth, value, offset, bcd)
}

pub fn set_month(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::Month, value, offset, bcd)
}

pub fn set_year(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::Year, value, offset, bcd)
}

pub fn set_century(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::Century, value, offset, bcd)
}

pub fn set_weekday(clock: &dyn TimeSource, value: i32, offset: i64) -> i64 {
    set_field(clock, Field::Weekday, value, offset, false)
}

pub fn set_day_of_year(clock: &dyn TimeSource, value: i32, offset: i64, bcd: bool) -> i64 {
    set_field(clock, Field::DayOfYear, value, offset, bcd)
}

pub fn set_latched_second(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::Second, value, latch, bcd)
}

pub fn set_latched_minute(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::Minute, value, latch, bcd)
}

pub fn set_latched_hour(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::Hour, value, latch, bcd)
}

pub fn set_latched_hour_am_pm(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::HourAmPm, value, latch, bcd)
}

pub fn set_latched_day_of_month(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::DayOfMonth, value, latch, bcd)
}

pub fn set_latched_month(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::Month, value, latch, bcd)
}

pub fn set_latched_year(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::Year, value, latch, bcd)
}

pub fn set_latched_century(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::Century, value, latch, bcd)
}

pub fn set_latched_weekday(value: i32, latch: i64) -> i64 {
    set_latched_field(Field::Weekday, value, latch, false)
}

pub fn set_latched_day_of_year(value: i32, latch: i64, bcd: bool) -> i64 {
    set_latched_field(Field::DayOfYear, value, latch, bcd)
}
