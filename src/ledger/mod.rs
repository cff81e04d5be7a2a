//! Transaction model and the pure recurrence algorithms that operate on an
//! in-memory transaction collection.

pub mod backfill;
pub mod balance;
pub mod business_day;
pub mod correction;
pub mod generator;
pub mod schedule;
pub mod series;
pub mod summary;
pub mod transaction;

pub use backfill::{plan_backfill, MAX_BACKFILL_INSTANCES};
pub use balance::{reconcile_balances, running_balances, BalanceIndex, BalancedTransaction};
pub use business_day::{
    business_day_anchor, detect_business_day_ordinal, is_business_day, nth_business_day,
    BUSINESS_DAY_ANCHOR_MAX_ORDINAL, BUSINESS_DAY_SEARCH_LIMIT,
};
pub use correction::{
    needs_correction, plan_correction, republish_shared_fields, shrink_series, sweep_invalid,
    sweep_series, CorrectionPlan,
};
pub use generator::generate_series;
pub use schedule::{Schedule, MAX_SERIES_INSTANCES};
pub use series::{
    find_series, find_series_indices, locate_instance, synchronize, MemberChange, SyncPlan,
};
pub use summary::{summarize_series, ScheduledStatus, SeriesSummary};
pub use transaction::{
    Frequency, RecurrenceMeta, RecurrenceRule, Transaction, TransactionKey, TransactionKind,
    TransactionPatch, TransactionStatus, UpdateScope,
};
