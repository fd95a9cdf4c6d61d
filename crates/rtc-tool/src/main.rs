//! Command-line inspector for RTC context files and snapshot files.
//!
//! - `list`: every record in a context file with the time its offset gives now
//! - `show`: hex dump of one record's RAM and register blobs
//! - `snapshot`: the modules stored in a snapshot file
//! - `set-offset`: rewrite the offset of one record, keeping its blobs

use chrono::{Local, TimeZone};
use rtc_core::context::{Blob, DEFAULT_CONTEXT_FILE};
use rtc_core::{ChipKind, ContextRecord, ContextStore, Snapshot, StoreConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::process;

/// Bytes per hex dump line
const DUMP_WIDTH: usize = 16;

fn usage(program: &str) -> ! {
    eprintln!("rtc-tool - RTC context and snapshot inspector");
    eprintln!("Usage: {} <command> [options]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list [--file F]                         List all records");
    eprintln!("  show --device D [--emulator E] [--file F]");
    eprintln!("                                          Dump one record");
    eprintln!("  snapshot <file>                         List snapshot modules");
    eprintln!("  set-offset --device D --offset N [--emulator E] [--file F]");
    eprintln!("                                          Change a record's offset");
    eprintln!();
    eprintln!("Default file: {}", DEFAULT_CONTEXT_FILE);
    process::exit(1);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn store_config(args: &[String]) -> StoreConfig {
    let mut config = StoreConfig::default();
    if let Some(path) = flag_value(args, "--file") {
        config.path = PathBuf::from(path);
    }
    if let Some(emulator) = flag_value(args, "--emulator") {
        config.emulator = emulator.to_string();
    }
    config
}

fn format_time(time: i64) -> String {
    match Local.timestamp_opt(time, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("<invalid {}>", time),
    }
}

fn blob_size(blob: &Blob) -> String {
    match blob.stored_len() {
        Some(len) => len.to_string(),
        None => "zero".to_string(),
    }
}

fn hex_dump(data: &[u8]) -> Vec<String> {
    data.chunks(DUMP_WIDTH)
        .enumerate()
        .map(|(i, row)| {
            let hex: Vec<String> = row.iter().map(|b| format!("{:02X}", b)).collect();
            format!("  {:04X}: {}", i * DUMP_WIDTH, hex.join(" "))
        })
        .collect()
}

fn load_records(store: &ContextStore) -> Vec<ContextRecord> {
    match store.records() {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {}: {}", store.path().display(), e);
            process::exit(1);
        }
    }
}

fn require_device<'a>(args: &'a [String], program: &str) -> &'a str {
    match flag_value(args, "--device") {
        Some(device) => device,
        None => {
            eprintln!("Error: --device is required");
            usage(program);
        }
    }
}

fn run_list(args: &[String]) {
    let store = ContextStore::from_config(&store_config(args));
    let records = load_records(&store);
    if records.is_empty() {
        println!("{}: no records", store.path().display());
        return;
    }
    let now = Local::now().timestamp();
    println!("{:<12} {:<16} {:>12}  {:<19}  {:>6} {:>6}", "EMULATOR", "DEVICE", "OFFSET", "TIME", "RAM", "REGS");
    for r in &records {
        println!(
            "{:<12} {:<16} {:>12}  {:<19}  {:>6} {:>6}",
            r.emulator,
            r.device,
            r.offset,
            format_time(now + r.offset),
            blob_size(&r.ram),
            blob_size(&r.regs)
        );
    }
}

fn run_show(args: &[String], program: &str) {
    let device = require_device(args, program);
    let store = ContextStore::from_config(&store_config(args));
    let record = match store.find(device) {
        Ok(Some(record)) => record,
        Ok(None) => {
            eprintln!("Error: no record for {}/{} in {}", store.emulator(), device, store.path().display());
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}: {}", store.path().display(), e);
            process::exit(1);
        }
    };
    println!("[{}]({})", record.emulator, record.device);
    println!("offset: {} ({})", record.offset, format_time(Local::now().timestamp() + record.offset));
    for (name, blob) in [("ram", &record.ram), ("regs", &record.regs)] {
        match blob {
            Blob::Zero => println!("{}: all zero", name),
            Blob::Data(data) => {
                println!("{}: {} bytes", name, data.len());
                for line in hex_dump(data) {
                    println!("{}", line);
                }
            }
        }
    }
}

fn run_snapshot(path: &Path) {
    let snapshot = match Snapshot::load_from_file(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    println!("{}: {} module(s)", path.display(), snapshot.modules().len());
    for m in snapshot.modules() {
        let chip = ChipKind::from_module_name(&m.name).map_or("?", |k| k.name());
        println!("  {:<16} {}.{}  {:>6} bytes  {}", m.name, m.major, m.minor, m.data.len(), chip);
    }
}

fn run_set_offset(args: &[String], program: &str) {
    let device = require_device(args, program);
    let offset: i64 = match flag_value(args, "--offset").map(str::parse) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            eprintln!("Error: --offset: {}", e);
            process::exit(1);
        }
        None => {
            eprintln!("Error: --offset is required");
            usage(program);
        }
    };
    let store = ContextStore::from_config(&store_config(args));
    let mut record = match store.find(device) {
        Ok(Some(record)) => record,
        Ok(None) => {
            eprintln!("Error: no record for {}/{} in {}", store.emulator(), device, store.path().display());
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}: {}", store.path().display(), e);
            process::exit(1);
        }
    };
    let old = record.offset;
    record.offset = offset;
    if let Err(e) = store.put_record(record) {
        eprintln!("Error: {}: {}", store.path().display(), e);
        process::exit(1);
    }
    println!("{}/{}: offset {} -> {}", store.emulator(), device, old, offset);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("rtc-tool", |s| s.as_str());
    let rest = args.get(2..).unwrap_or(&[]);
    match args.get(1).map(|s| s.as_str()) {
        Some("list") => run_list(rest),
        Some("show") => run_show(rest, program),
        Some("snapshot") => match rest.first() {
            Some(path) => run_snapshot(Path::new(path)),
            None => usage(program),
        },
        Some("set-offset") => run_set_offset(rest, program),
        _ => usage(program),
    }
}
