// ==========================================
// 集成测试辅助模块
// ==========================================

#![allow(dead_code)]

pub mod snapshot_builder;

pub use snapshot_builder::{block_id, d, dates_from, SnapshotBuilder};
