//! Persistent chip context store.
//!
//! All chips of a process share one flat text file. Each chip instance owns
//! one record keyed by emulator name and device name:
//!
//! ```text
//! [emulator](device){offset}<ram>"registers"
//!
//! ```
//!
//! Blobs are hex strings over the alphabet `a..p` (nibble value + `'a'`,
//! high nibble first). An all-zero blob is written as the single letter `x`.
//! Every save rewrites the whole file. Only the text of the saved record
//! changes; other records and any text the parser does not understand are
//! written back byte for byte.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default context file name.
pub const DEFAULT_CONTEXT_FILE: &str = "rtcdata.dat";
/// Default emulator key.
pub const DEFAULT_EMULATOR: &str = "rtc";

/// Where the context store lives and whose records it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub emulator: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: PathBuf::from(DEFAULT_CONTEXT_FILE),
            emulator: DEFAULT_EMULATOR.to_string(),
        }
    }
}

// ─── Blob encoding ──────────────────────────────────────────────────────────

/// A RAM or register block as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blob {
    /// The `x` sentinel: all bytes zero, length implied by the reader.
    Zero,
    Data(Vec<u8>),
}

impl Blob {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(|&b| b == 0) {
            Blob::Zero
        } else {
            Blob::Data(bytes.to_vec())
        }
    }

    /// Expand to exactly `size` bytes, or `None` when the stored length differs.
    pub fn to_vec(&self, size: usize) -> Option<Vec<u8>> {
        match self {
            Blob::Zero => Some(vec![0; size]),
            Blob::Data(data) if data.len() == size => Some(data.clone()),
            Blob::Data(_) => None,
        }
    }

    /// Stored length, unknown for the zero sentinel.
    pub fn stored_len(&self) -> Option<usize> {
        match self {
            Blob::Zero => None,
            Blob::Data(data) => Some(data.len()),
        }
    }

    fn encode(&self) -> String {
        match self {
            Blob::Zero => "x".to_string(),
            Blob::Data(data) => {
                let mut out = String::with_capacity(data.len() * 2);
                for &b in data {
                    out.push((b'a' + (b >> 4)) as char);
                    out.push((b'a' + (b & 0x0f)) as char);
                }
                out
            }
        }
    }

    fn decode(text: &str) -> Option<Self> {
        if text == "x" {
            return Some(Blob::Zero);
        }
        let chars = text.as_bytes();
        if chars.len() % 2 != 0 {
            return None;
        }
        let nibble = |c: u8| match c {
            b'a'..=b'p' => Some(c - b'a'),
            _ => None,
        };
        chars
            .chunks(2)
            .map(|pair| Some((nibble(pair[0])? << 4) | nibble(pair[1])?))
            .collect::<Option<Vec<u8>>>()
            .map(Blob::Data)
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

/// One persisted device record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRecord {
    pub emulator: String,
    pub device: String,
    pub offset: i64,
    pub ram: Blob,
    pub regs: Blob,
}

impl ContextRecord {
    /// Record text without the trailing blank line.
    fn to_text(&self) -> String {
        format!(
            "[{}]({}){{{}}}<{}>\"{}\"",
            self.emulator,
            self.device,
            self.offset,
            self.ram.encode(),
            self.regs.encode()
        )
    }

    fn has_key(&self, emulator: &str, device: &str) -> bool {
        self.emulator == emulator && self.device == device
    }
}

/// State restored for a chip from its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedContext {
    pub ram: Vec<u8>,
    pub regs: Vec<u8>,
    pub offset: i64,
}

/// Split `open ... close` off the front of `s`.
fn take_delimited(s: &str, open: char, close: char) -> Option<(&str, &str)> {
    let inner = s.strip_prefix(open)?;
    let end = inner.find(close)?;
    Some((&inner[..end], &inner[end + close.len_utf8()..]))
}

fn parse_record(s: &str) -> Option<(ContextRecord, &str)> {
    let (emulator, s) = take_delimited(s, '[', ']')?;
    let (device, s) = take_delimited(s, '(', ')')?;
    let (offset, s) = take_delimited(s, '{', '}')?;
    let (ram, s) = take_delimited(s, '<', '>')?;
    let (regs, s) = take_delimited(s, '"', '"')?;
    let record = ContextRecord {
        emulator: emulator.to_string(),
        device: device.to_string(),
        offset: offset.trim().parse().ok()?,
        ram: Blob::decode(ram)?,
        regs: Blob::decode(regs)?,
    };
    Some((record, s))
}

/// A stretch of the context file: one record's exact text, or the text
/// between records.
struct Segment {
    text: String,
    record: Option<ContextRecord>,
}

fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut raw_start = 0;
    let mut pos = 0;
    while let Some(found) = text[pos..].find('[') {
        let start = pos + found;
        match parse_record(&text[start..]) {
            Some((record, tail)) => {
                let end = text.len() - tail.len();
                if raw_start < start {
                    segments.push(Segment { text: text[raw_start..start].to_string(), record: None });
                }
                segments.push(Segment { text: text[start..end].to_string(), record: Some(record) });
                raw_start = end;
                pos = end;
            }
            None => {
                log::warn!("skipping malformed context record at byte {}", start);
                pos = start + 1;
            }
        }
    }
    if raw_start < text.len() {
        segments.push(Segment { text: text[raw_start..].to_string(), record: None });
    }
    segments
}

/// Parse every well-formed record in `text`; malformed ones are skipped.
pub fn parse_records(text: &str) -> Vec<ContextRecord> {
    split_segments(text).into_iter().filter_map(|s| s.record).collect()
}

pub fn render_records(records: &[ContextRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_text());
        out.push_str("\n\n");
    }
    out
}

// ─── Store ──────────────────────────────────────────────────────────────────

/// Handle on the shared context file.
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
    emulator: String,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>, emulator: &str) -> Self {
        ContextStore { path: path.into(), emulator: emulator.to_string() }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone(), &config.emulator)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn emulator(&self) -> &str {
        &self.emulator
    }

    /// File contents; a missing file reads as empty.
    fn read_text(&self) -> io::Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// All records in the file. A missing file holds no records.
    pub fn records(&self) -> io::Result<Vec<ContextRecord>> {
        Ok(parse_records(&self.read_text()?))
    }

    pub fn find(&self, device: &str) -> io::Result<Option<ContextRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .find(|r| r.has_key(&self.emulator, device)))
    }

    /// Load the record for `device`, sized to the chip's blobs.
    ///
    /// Returns `None` when the file or record is missing or the stored blob
    /// sizes do not match.
    pub fn load_context(&self, device: &str, ram_size: usize, reg_size: usize) -> Option<LoadedContext> {
        let record = match self.find(device) {
            Ok(Some(record)) => record,
            Ok(None) => {
                log::debug!("no saved context for {}/{}", self.emulator, device);
                return None;
            }
            Err(e) => {
                log::warn!("cannot read {}: {}", self.path.display(), e);
                return None;
            }
        };
        let (ram, regs) = match (record.ram.to_vec(ram_size), record.regs.to_vec(reg_size)) {
            (Some(ram), Some(regs)) => (ram, regs),
            _ => {
                log::warn!(
                    "context for {}/{} has blob sizes {:?}/{:?}, expected {}/{}",
                    self.emulator,
                    device,
                    record.ram.stored_len(),
                    record.regs.stored_len(),
                    ram_size,
                    reg_size
                );
                return None;
            }
        };
        log::debug!("loaded context for {}/{} (offset {})", self.emulator, device, record.offset);
        Some(LoadedContext { ram, regs, offset: record.offset })
    }

    /// Replace the text of the record with the same key, or append it.
    /// Everything else in the file is kept as it was.
    pub fn put_record(&self, record: ContextRecord) -> io::Result<()> {
        let text = self.read_text()?;
        let mut segments = split_segments(&text);
        let slot = segments
            .iter_mut()
            .find(|s| s.record.as_ref().is_some_and(|r| r.has_key(&record.emulator, &record.device)));
        match slot {
            Some(slot) => slot.text = record.to_text(),
            None => {
                if !text.is_empty() && !text.ends_with('\n') {
                    segments.push(Segment { text: "\n\n".to_string(), record: None });
                }
                segments.push(Segment { text: record.to_text() + "\n\n", record: None });
            }
        }
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let out: String = segments.iter().map(|s| s.text.as_str()).collect();
        fs::write(&self.path, out)
    }

    pub fn save_context(&self, device: &str, ram: &[u8], regs: &[u8], offset: i64) -> io::Result<()> {
        log::debug!("saving context for {}/{} (offset {})", self.emulator, device, offset);
        self.put_record(ContextRecord {
            emulator: self.emulator.clone(),
            device: device.to_string(),
            offset,
            ram: Blob::from_bytes(ram),
            regs: Blob::from_bytes(regs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> ContextStore {
        let path = std::env::temp_dir().join(format!("rtc-core-ctx-{}-{}.dat", std::process::id(), name));
        let _ = fs::remove_file(&path);
        ContextStore::new(path, "C64")
    }

    #[test]
    fn test_blob_alphabet() {
        assert_eq!(Blob::Data(vec![0x00, 0x1f, 0xa5]).encode(), "aabpkf");
        assert_eq!(Blob::decode("aabpkf"), Some(Blob::Data(vec![0x00, 0x1f, 0xa5])));
        assert_eq!(Blob::from_bytes(&[0, 0, 0]).encode(), "x");
        assert_eq!(Blob::decode("x"), Some(Blob::Zero));
        assert_eq!(Blob::decode("abc"), None);
        assert_eq!(Blob::decode("az"), None);
    }

    #[test]
    fn test_missing_file_is_a_miss() {
        let store = temp_store("missing");
        assert_eq!(store.load_context("dev", 4, 4), None);
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_zero_blobs() {
        let store = temp_store("zero");
        store.save_context("dev", &[0; 16], &[0; 8], -3600).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "[C64](dev){-3600}<x>\"x\"\n\n");
        let loaded = store.load_context("dev", 16, 8).unwrap();
        assert_eq!(loaded, LoadedContext { ram: vec![0; 16], regs: vec![0; 8], offset: -3600 });
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_round_trip_data_blobs() {
        let store = temp_store("data");
        let ram: Vec<u8> = (0..=255).collect();
        let regs = vec![0x59, 0x00, 0x23, 0x07];
        store.save_context("dev", &ram, &regs, 5_000_000_000).unwrap();
        let loaded = store.load_context("dev", ram.len(), regs.len()).unwrap();
        assert_eq!(loaded.ram, ram);
        assert_eq!(loaded.regs, regs);
        assert_eq!(loaded.offset, 5_000_000_000);
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_other_records_preserved() {
        let store = temp_store("shared");
        store.save_context("first", &[1, 2], &[], 10).unwrap();
        store.save_context("second", &[], &[3], 20).unwrap();
        store.save_context("first", &[9, 9], &[], 11).unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].device, "first");
        assert_eq!(records[0].offset, 11);
        assert_eq!(records[1].device, "second");
        assert_eq!(records[1].regs, Blob::Data(vec![3]));

        let other = ContextStore::new(store.path(), "VIC20");
        other.save_context("first", &[], &[], 99).unwrap();
        assert_eq!(store.load_context("first", 2, 0).unwrap().offset, 11);
        assert_eq!(other.load_context("first", 0, 0).unwrap().offset, 99);
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_unparsed_text_survives_save() {
        let store = temp_store("foreign");
        let seeded = "; written by another tool\n[x64](OTHER){12}<zz>\"x\"";
        fs::write(store.path(), seeded).unwrap();
        store.save_context("DS1307", &[1, 2], &[0], 5).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, format!("{}\n\n[C64](DS1307){{5}}<abac>\"x\"\n\n", seeded));
        assert_eq!(store.load_context("DS1307", 2, 1).unwrap().offset, 5);
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_other_record_text_untouched() {
        let store = temp_store("verbatim");
        fs::write(store.path(), "[x64](A){ +7 }<x>\"x\"\n[C64](dev){1}<x>\"x\"\n-- end\n").unwrap();
        store.save_context("dev", &[], &[], 2).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "[x64](A){ +7 }<x>\"x\"\n[C64](dev){2}<x>\"x\"\n-- end\n");

        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, 7);
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_size_mismatch_is_a_miss() {
        let store = temp_store("mismatch");
        store.save_context("dev", &[1, 2, 3], &[], 0).unwrap();
        assert_eq!(store.load_context("dev", 4, 0), None);
        // The zero sentinel fits any size
        store.save_context("dev", &[0, 0, 0], &[], 0).unwrap();
        assert_eq!(store.load_context("dev", 8, 2).unwrap().ram.len(), 8);
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_parse_skips_garbage() {
        let text = "junk [C64](a){1}<x>\"x\"\n\n[broken(b){2}\n[C64](c){x}<x>\"x\"\n[C64](d){-4}<bc>\"x\"\n";
        let records = parse_records(text);
        let devices: Vec<&str> = records.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(devices, ["a", "d"]);
        assert_eq!(records[1].ram, Blob::Data(vec![0x12]));
    }

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        let store = ContextStore::from_config(&config);
        assert_eq!(store.emulator(), "rtc");
        assert_eq!(store.path(), Path::new("rtcdata.dat"));
    }
}
