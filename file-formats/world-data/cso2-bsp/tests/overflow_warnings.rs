//! Narrowing overflows must reach the log
//!
//! Kept in its own test binary because it installs the global logger.

mod common;

use common::{MapBuilder, lump_bytes, u32s};
use cso2_bsp::header::lump;
use cso2_bsp::{BspHeader, BspTranscoder};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::{Mutex, const_mutex};
use pretty_assertions::assert_eq;

/// Keeps every record logged by this crate
struct Recorder {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for Recorder {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target().starts_with("cso2_bsp")
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static RECORDER: Recorder = Recorder {
    records: const_mutex(Vec::new()),
};

#[test]
fn leaf_faces_overflow_logs_one_warning() {
    log::set_logger(&RECORDER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let map = MapBuilder::new()
        .compressed(lump::LEAFFACES, &u32s(&[10, 70000]), 0)
        .build();
    let out = BspTranscoder::new().transcode(&map).unwrap();

    let header = BspHeader::from_bytes(&out).unwrap();
    assert_eq!(lump_bytes(&out, &header, lump::LEAFFACES), &[10, 0, 0x70, 0x11]);

    let records = RECORDER.records.lock();
    let overflows: Vec<&String> = records
        .iter()
        .filter(|(level, message)| *level == Level::Warn && message.contains("overflow"))
        .map(|(_, message)| message)
        .collect();
    assert_eq!(overflows.len(), 1, "{records:?}");
    assert!(overflows[0].contains("LUMP_LEAFFACES"), "{}", overflows[0]);
    assert!(overflows[0].contains("record 1"), "{}", overflows[0]);
    assert!(overflows[0].contains("70000"), "{}", overflows[0]);
}
