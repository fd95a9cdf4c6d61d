//! Real-time-clock chips.
//!
//! - [`bq4830y::Bq4830y`]: 32 KiB SRAM with latched BCD clock registers
//! - [`ds12c887::Ds12c887`]: MC146818-style clock with alarm and update flags
//! - [`ds1307::Ds1307`]: I2C clock with 56 bytes of RAM
//! - [`pcf8583::Pcf8583`]: I2C clock with 240 bytes of RAM and bit-train reads
//! - [`ds1216e::Ds1216e`]: phantom clock hidden behind a ROM socket
//! - [`ds1602::Ds1602`]: three-wire elapsed-seconds counter
//! - [`rtc58321a::Rtc58321a`]: 4-bit multiplexed address/data clock
//! - [`rtc72421::Rtc72421`]: 4-bit register-addressed clock
//!
//! Every chip is built from a device name and a [`Host`], loads its saved
//! context on construction and writes it back from `destroy` when something
//! changed.

pub mod bq4830y;
mod digits;
pub mod ds1216e;
pub mod ds12c887;
pub mod ds1307;
pub mod ds1602;
pub mod pcf8583;
pub mod rtc58321a;
pub mod rtc72421;

use std::rc::Rc;

use crate::calendar::{self, Field};
use crate::clock::{SystemClock, TimeSource};
use crate::context::{ContextStore, StoreConfig};
use crate::snapshot::ModuleWriter;

/// The chip families, with the names their snapshot modules use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipKind {
    Bq4830y,
    Ds1216e,
    Ds12c887,
    Ds1307,
    Ds1602,
    Pcf8583,
    Rtc58321a,
    Rtc72421,
}

impl ChipKind {
    pub const ALL: [ChipKind; 8] = [
        ChipKind::Bq4830y,
        ChipKind::Ds1216e,
        ChipKind::Ds12c887,
        ChipKind::Ds1307,
        ChipKind::Ds1602,
        ChipKind::Pcf8583,
        ChipKind::Rtc58321a,
        ChipKind::Rtc72421,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChipKind::Bq4830y => "BQ4830Y",
            ChipKind::Ds1216e => "DS1216E",
            ChipKind::Ds12c887 => "DS12C887",
            ChipKind::Ds1307 => "DS1307",
            ChipKind::Ds1602 => "DS1602",
            ChipKind::Pcf8583 => "PCF8583",
            ChipKind::Rtc58321a => "RTC-58321A",
            ChipKind::Rtc72421 => "RTC-72421",
        }
    }

    pub fn module_name(self) -> &'static str {
        match self {
            ChipKind::Bq4830y => "RTC_BQ4830Y",
            ChipKind::Ds1216e => "RTC_DS1216E",
            ChipKind::Ds12c887 => "RTC_DS12C887",
            ChipKind::Ds1307 => "RTC_DS1307",
            ChipKind::Ds1602 => "RTC_DS1602",
            ChipKind::Pcf8583 => "RTC_PCF8583",
            ChipKind::Rtc58321a => "RTC_58321A",
            ChipKind::Rtc72421 => "RTC_72421",
        }
    }

    pub fn from_module_name(name: &str) -> Option<ChipKind> {
        ChipKind::ALL.into_iter().find(|k| k.module_name() == name)
    }

    /// Sizes of the persisted RAM and register blobs.
    pub fn blob_sizes(self) -> (usize, usize) {
        match self {
            ChipKind::Bq4830y => (bq4830y::RAM_SIZE, bq4830y::REG_SIZE),
            ChipKind::Ds1216e => (0, ds1216e::REG_SIZE),
            ChipKind::Ds12c887 => (ds12c887::RAM_SIZE, ds12c887::REG_SIZE),
            ChipKind::Ds1307 => (ds1307::RAM_SIZE, ds1307::REG_SIZE),
            ChipKind::Ds1602 => (0, ds1602::REG_SIZE),
            ChipKind::Pcf8583 => (pcf8583::RAM_SIZE, pcf8583::REG_SIZE),
            ChipKind::Rtc58321a | ChipKind::Rtc72421 => (0, 0),
        }
    }
}

/// Services a chip needs from the emulator: the context store and a clock.
#[derive(Clone)]
pub struct Host {
    pub store: ContextStore,
    pub clock: Rc<dyn TimeSource>,
}

impl Host {
    pub fn new(store: ContextStore, clock: Rc<dyn TimeSource>) -> Self {
        Host { store, clock }
    }

    /// Host on the system clock.
    pub fn system(config: &StoreConfig) -> Self {
        Host::new(ContextStore::from_config(config), Rc::new(SystemClock))
    }
}

/// State every chip carries: persisted blobs, their load-time shadows, the
/// running offset and the halt latch.
pub(crate) struct ChipBase {
    pub device: String,
    pub ram: Vec<u8>,
    pub old_ram: Vec<u8>,
    pub regs: Vec<u8>,
    pub old_regs: Vec<u8>,
    pub offset: i64,
    pub old_offset: i64,
    pub halted: bool,
    pub halt_latch: i64,
    store: ContextStore,
    clock: Rc<dyn TimeSource>,
}

impl ChipBase {
    /// Load the saved context for `device`, zero-filled on a miss.
    pub fn open(device: &str, host: &Host, ram_size: usize, reg_size: usize) -> Self {
        let (ram, regs, offset) = match host.store.load_context(device, ram_size, reg_size) {
            Some(ctx) => (ctx.ram, ctx.regs, ctx.offset),
            None => (vec![0; ram_size], vec![0; reg_size], 0),
        };
        ChipBase {
            device: device.to_string(),
            old_ram: ram.clone(),
            ram,
            old_regs: regs.clone(),
            regs,
            old_offset: offset,
            offset,
            halted: false,
            halt_latch: 0,
            store: host.store.clone(),
            clock: Rc::clone(&host.clock),
        }
    }

    pub fn clock(&self) -> &dyn TimeSource {
        self.clock.as_ref()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Running chip time, ignoring any halt.
    pub fn running(&self) -> i64 {
        calendar::get_latch(self.clock(), self.offset)
    }

    /// Chip time: the halt latch while halted, the running time otherwise.
    pub fn current(&self) -> i64 {
        if self.halted {
            self.halt_latch
        } else {
            self.running()
        }
    }

    pub fn halt(&mut self) {
        if !self.halted {
            self.halt_latch = self.running();
            self.halted = true;
            log::debug!("{}: clock halted at {}", self.device, self.halt_latch);
        }
    }

    /// Restart the clock without counting the time spent halted.
    pub fn resume(&mut self) {
        if self.halted {
            self.offset -= self.now() - (self.halt_latch - self.offset);
            self.halted = false;
            log::debug!("{}: clock resumed, offset {}", self.device, self.offset);
        }
    }

    /// Set one field on the halt latch when halted, else on the offset.
    pub fn set_field(&mut self, field: Field, value: i32, bcd: bool) {
        if self.halted {
            self.halt_latch = calendar::set_latched_field(field, value, self.halt_latch, bcd);
        } else {
            self.offset = calendar::set_field(self.clock(), field, value, self.offset, bcd);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.offset != self.old_offset || self.ram != self.old_ram || self.regs != self.old_regs
    }

    /// Persist when asked to and something changed since load. Failures are logged.
    pub fn destroy(self, save: bool) {
        if !save || !self.is_dirty() {
            return;
        }
        if let Err(e) = self.store.save_context(&self.device, &self.ram, &self.regs, self.offset) {
            log::warn!("{}: could not save context to {}: {}", self.device, self.store.path().display(), e);
        }
    }

    pub fn write_device(&self, m: &mut ModuleWriter) {
        m.write_str(&self.device);
    }
}
