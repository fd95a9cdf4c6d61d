//! Save-state container shared by all chips.
//!
//! A [`Snapshot`] is an ordered list of named, versioned modules. Each chip
//! writes one module with a fixed field order. Inside a module:
//!
//! - bytes are written as-is
//! - words and double words are little-endian
//! - strings are a word length (counting a trailing NUL) followed by the
//!   bytes and the NUL
//! - 64-bit time values are two double words, high half first
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "RTCS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Magic bytes identifying a snapshot file.
const MAGIC: &[u8; 4] = b"RTCS";
/// Current snapshot file format version.
const FORMAT_VERSION: u32 = 1;
/// Module names are limited to this many bytes.
pub const MODULE_NAME_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    ModuleNotFound(String),
    VersionTooNew { module: String, major: u8, minor: u8 },
    Truncated { module: String },
    Malformed { module: String, detail: String },
    DuplicateModule(String),
    BadMagic,
    UnsupportedVersion(u32),
    Io(String),
    Codec(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SnapshotError::ModuleNotFound(name) => write!(f, "snapshot module {} not found", name),
            SnapshotError::VersionTooNew { module, major, minor } => {
                write!(f, "snapshot module {} has newer version {}.{}", module, major, minor)
            }
            SnapshotError::Truncated { module } => write!(f, "snapshot module {} is truncated", module),
            SnapshotError::Malformed { module, detail } => {
                write!(f, "snapshot module {} is malformed: {}", module, detail)
            }
            SnapshotError::DuplicateModule(name) => write!(f, "snapshot module {} written twice", name),
            SnapshotError::BadMagic => write!(f, "not a snapshot file (bad magic)"),
            SnapshotError::UnsupportedVersion(v) => {
                write!(f, "unsupported snapshot version {} (expected {})", v, FORMAT_VERSION)
            }
            SnapshotError::Io(e) => write!(f, "snapshot I/O error: {}", e),
            SnapshotError::Codec(e) => write!(f, "snapshot encoding error: {}", e),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        SnapshotError::Io(e.to_string())
    }
}

// ─── Container ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotModule {
    pub name: String,
    pub major: u8,
    pub minor: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    modules: Vec<SnapshotModule>,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    pub fn modules(&self) -> &[SnapshotModule] {
        &self.modules
    }

    /// Start a module. It becomes visible once the writer is closed.
    pub fn create_module(&mut self, name: &str, major: u8, minor: u8) -> Result<ModuleWriter<'_>, SnapshotError> {
        if self.modules.iter().any(|m| m.name == name) {
            return Err(SnapshotError::DuplicateModule(name.to_string()));
        }
        let mut name = name.to_string();
        name.truncate(MODULE_NAME_LEN);
        log::debug!("snapshot: create module {} {}.{}", name, major, minor);
        Ok(ModuleWriter {
            snapshot: self,
            module: SnapshotModule { name, major, minor, data: Vec::new() },
        })
    }

    pub fn open_module(&self, name: &str) -> Result<ModuleReader<'_>, SnapshotError> {
        let module = self
            .modules
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| SnapshotError::ModuleNotFound(name.to_string()))?;
        log::debug!("snapshot: open module {} {}.{}", name, module.major, module.minor);
        Ok(ModuleReader { module, pos: 0 })
    }

    /// Open a module and reject it when its version is newer than `major.minor`.
    pub fn open_versioned(&self, name: &str, major: u8, minor: u8) -> Result<ModuleReader<'_>, SnapshotError> {
        let reader = self.open_module(name)?;
        if (reader.major(), reader.minor()) > (major, minor) {
            return Err(SnapshotError::VersionTooNew {
                module: name.to_string(),
                major: reader.major(),
                minor: reader.minor(),
            });
        }
        Ok(reader)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = bincode::serialize(self).map_err(|e| SnapshotError::Codec(e.to_string()))?;
        let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

        let mut out = Vec::with_capacity(8 + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.len() < 8 || &data[0..4] != MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[8..])
            .map_err(|e| SnapshotError::Codec(format!("decompress error: {:?}", e)))?;
        bincode::deserialize(&decompressed).map_err(|e| SnapshotError::Codec(e.to_string()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SnapshotError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }
}

// ─── Module writer ──────────────────────────────────────────────────────────

pub struct ModuleWriter<'a> {
    snapshot: &'a mut Snapshot,
    module: SnapshotModule,
}

impl<'a> ModuleWriter<'a> {
    pub fn write_u8(&mut self, v: u8) {
        self.module.data.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.module.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.module.data.extend_from_slice(&v.to_le_bytes());
    }

    /// 64-bit time as high then low double word.
    pub fn write_time(&mut self, v: i64) {
        self.write_u32((v as u64 >> 32) as u32);
        self.write_u32(v as u32);
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.module.data.extend_from_slice(v);
    }

    pub fn write_str(&mut self, v: &str) {
        self.write_u16((v.len() + 1) as u16);
        self.write_bytes(v.as_bytes());
        self.write_u8(0);
    }

    pub fn close(self) {
        self.snapshot.modules.push(self.module);
    }
}

// ─── Module reader ──────────────────────────────────────────────────────────

pub struct ModuleReader<'a> {
    module: &'a SnapshotModule,
    pos: usize,
}

impl<'a> ModuleReader<'a> {
    pub fn major(&self) -> u8 {
        self.module.major
    }

    pub fn minor(&self) -> u8 {
        self.module.minor
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let module: &'a SnapshotModule = self.module;
        let data = &module.data;
        let end = self.pos + n;
        if end > data.len() {
            return Err(SnapshotError::Truncated { module: self.module.name.clone() });
        }
        let slice = &data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn malformed(&self, detail: impl Into<String>) -> SnapshotError {
        SnapshotError::Malformed { module: self.module.name.clone(), detail: detail.into() }
    }

    pub fn read_u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, SnapshotError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, SnapshotError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, SnapshotError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_time(&mut self) -> Result<i64, SnapshotError> {
        let hi = self.read_u32()? as u64;
        let lo = self.read_u32()? as u64;
        Ok(((hi << 32) | lo) as i64)
    }

    /// Fill `dest` completely.
    pub fn read_into(&mut self, dest: &mut [u8]) -> Result<(), SnapshotError> {
        let src = self.take(dest.len())?;
        dest.copy_from_slice(src);
        Ok(())
    }

    pub fn read_str(&mut self) -> Result<String, SnapshotError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        let text = match bytes.split_last() {
            Some((0, text)) => text,
            _ => bytes,
        };
        String::from_utf8(text.to_vec()).map_err(|_| self.malformed("string is not UTF-8"))
    }
}
