//! History storage: the in-memory ring and the day-partitioned record log.
pub mod ring_buffer;
pub mod storage;

pub use ring_buffer::{HistoryRing, HistoryStore};
pub use storage::{PersistedRecord, RecordLog};
