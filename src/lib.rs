#![doc(test(attr(deny(warnings))))]

//! Recurring Ledger is the lifecycle engine behind recurring transactions:
//! it expands a declared transaction into a bounded series, keeps the series
//! consistent as members are edited or deleted, backfills missing trailing
//! instances, and reconciles running balances over the full history.

pub mod config;
pub mod core;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

pub use crate::config::{ConfigManager, EngineConfig};
pub use crate::core::{
    Clock, CorrectionReport, EditOutcome, FixedClock, SeriesManager, SessionContext, SystemClock,
};
pub use crate::errors::{LedgerError, Result};
pub use crate::storage::{JsonFileStore, MemoryStore, StoreError, TransactionStore};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    init_with(&EngineConfig::default());
}

/// Like [`init`], filtering logs with the config's `log_filter`.
pub fn init_with(config: &EngineConfig) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing_with(&config.log_filter);
        tracing::info!(filter = %config.log_filter, "Recurring Ledger tracing initialized.");
    });
}
