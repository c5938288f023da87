use std::time::SystemTime;

use crate::types::CellIndex;

pub(super) fn now_ms() -> u64 {
    SystemTime::UNIX_EPOCH
        .elapsed()
        .unwrap_or_default()
        .as_millis() as u64
}

pub(super) fn manhattan_cells(a: CellIndex, b: CellIndex) -> i32 {
    (a.col - b.col).abs() + (a.row - b.row).abs()
}
