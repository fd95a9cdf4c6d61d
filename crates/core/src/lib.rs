//! # rtc-core
//!
//! Real-time-clock chip emulation for retro computer peripherals.
//!
//! Each chip keeps its notion of "now" as an offset from the host clock, so
//! emulated time keeps running between sessions without storing a literal
//! timestamp. RAM, register bytes and the offset are persisted per device in
//! a shared context file, and every chip can be frozen into a save-state
//! snapshot.
//!
//! ## Architecture
//!
//! - [`clock`]: host time sources ([`SystemClock`], [`ManualClock`] for tests)
//! - [`calendar`]: field getters and offset-recomputing setters, BCD or binary
//! - [`context`]: the flat-file context store keyed by emulator and device
//! - [`snapshot`]: versioned snapshot modules and the snapshot file format
//! - [`chips`]: the eight chip emulations and the [`Host`] they are built from
//!
//! ## Chips
//!
//! | Chip        | Bus                           | RAM     |
//! |-------------|-------------------------------|---------|
//! | BQ4830Y     | parallel, memory mapped       | 32 KiB  |
//! | DS12C887    | index/data port pair          | 113 B   |
//! | DS1307      | I2C, falling edges            | 56 B    |
//! | PCF8583     | I2C, rising edges             | 240 B   |
//! | DS1216E     | phantom pattern on a ROM      | -       |
//! | DS1602      | three-wire serial             | -       |
//! | RTC-58321A  | 4-bit multiplexed             | -       |
//! | RTC-72421   | 4-bit with address lines      | -       |

pub mod calendar;
pub mod chips;
pub mod clock;
pub mod context;
pub mod snapshot;

pub use chips::bq4830y::Bq4830y;
pub use chips::ds1216e::Ds1216e;
pub use chips::ds12c887::Ds12c887;
pub use chips::ds1307::Ds1307;
pub use chips::ds1602::Ds1602;
pub use chips::pcf8583::Pcf8583;
pub use chips::rtc58321a::Rtc58321a;
pub use chips::rtc72421::Rtc72421;
pub use chips::{ChipKind, Host};
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use context::{ContextRecord, ContextStore, StoreConfig};
pub use snapshot::{Snapshot, SnapshotError};
