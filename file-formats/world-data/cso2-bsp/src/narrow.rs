//! Lossy integer narrowing with overflow reporting
//!
//! The vendor build widened many 16-bit fields to 32 bits. Converting back
//! truncates values that no longer fit; each truncation is logged and the
//! conversion carries on.

/// Where a narrowed value came from, for log messages
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldRef {
    pub(crate) lump: &'static str,
    pub(crate) field: &'static str,
    pub(crate) index: usize,
}

impl FieldRef {
    pub(crate) fn new(lump: &'static str, index: usize) -> Self {
        Self {
            lump,
            field: "",
            index,
        }
    }

    pub(crate) fn field(self, field: &'static str) -> Self {
        Self { field, ..self }
    }
}

fn report(at: FieldRef, value: i64) {
    log::warn!(
        "{} record {}: {} overflow, original {} (0x{:X}) truncated",
        at.lump,
        at.index,
        at.field,
        value,
        value
    );
}

pub(crate) fn to_u16(value: u32, at: FieldRef) -> u16 {
    if value > u32::from(u16::MAX) {
        report(at, i64::from(value));
    }
    value as u16
}

pub(crate) fn to_i16(value: i32, at: FieldRef) -> i16 {
    if i16::try_from(value).is_err() {
        report(at, i64::from(value));
    }
    value as i16
}

pub(crate) fn to_u8(value: u32, at: FieldRef) -> u8 {
    if value > u32::from(u8::MAX) {
        report(at, i64::from(value));
    }
    value as u8
}
