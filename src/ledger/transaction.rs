use std::{fmt, str::FromStr};

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LedgerError, Result};

/// Length of a series whose rule carries no explicit end date.
pub const DEFAULT_SERIES_SPAN_MONTHS: u32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Synthetic stable key. Nil for legacy records created without one.
    #[serde(default = "Transaction::legacy_id")]
    pub id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceMeta>,
}

impl Transaction {
    /// Creates a pending transaction whose amount sign follows `kind`.
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            description: description.into(),
            amount: kind.signed(amount),
            kind,
            category: None,
            status: TransactionStatus::Pending,
            recurrence: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn legacy_id() -> Uuid {
        Uuid::nil()
    }

    /// Whether the record carries a synthetic key usable for matching.
    pub fn has_key(&self) -> bool {
        !self.id.is_nil()
    }

    pub fn ensure_key(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
    }

    pub fn series_id(&self) -> Option<Uuid> {
        self.recurrence.as_ref().map(|meta| meta.series_id)
    }

    pub fn instance_number(&self) -> Option<u32> {
        self.recurrence.as_ref().map(|meta| meta.instance_number)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn key(&self) -> TransactionKey {
        if self.has_key() {
            TransactionKey::Id(self.id)
        } else {
            TransactionKey::Fields {
                date: self.date,
                description: self.description.clone(),
                amount: self.amount,
                kind: self.kind,
                status: self.status,
                series_id: self.series_id(),
                instance_number: self.instance_number(),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "transaction description must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    /// Applies the conventional sign for this kind to `amount`.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            TransactionKind::Income => amount.abs(),
            TransactionKind::Expense => -amount.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Weekly => "Weekly",
            Frequency::Biweekly => "Biweekly",
            Frequency::Monthly => "Monthly",
            Frequency::Quarterly => "Quarterly",
        }
    }

    /// Monthly and quarterly steps may follow a business-day anchor.
    pub fn is_month_based(&self) -> bool {
        matches!(self, Frequency::Monthly | Frequency::Quarterly)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Frequency {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" | "bi-weekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            other => Err(LedgerError::InvalidRule(format!(
                "unknown frequency `{other}`"
            ))),
        }
    }
}

/// User-declared recurrence intent for a base transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub active: bool,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            end_date: None,
            active: true,
        }
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The explicit end date, or one year after `base` when absent.
    pub fn effective_end_date(&self, base: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or_else(|| {
            base.checked_add_months(Months::new(DEFAULT_SERIES_SPAN_MONTHS))
                .unwrap_or(NaiveDate::MAX)
        })
    }
}

/// Series membership and a copy of the rule in effect, attached to every instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceMeta {
    pub series_id: Uuid,
    pub original_date: NaiveDate,
    pub instance_number: u32,
    pub frequency: Frequency,
    pub end_date: NaiveDate,
    pub active: bool,
    #[serde(default)]
    pub is_business_day_rule: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_day_number: Option<u32>,
}

impl RecurrenceMeta {
    /// Business-day ordinal to follow when stepping, if the rule uses one.
    pub fn business_day_anchor(&self) -> Option<u32> {
        if self.is_business_day_rule && self.frequency.is_month_based() {
            self.business_day_number
        } else {
            None
        }
    }
}

/// Identity used to key per-transaction results such as running balances.
///
/// `Fields` is a compatibility shim for records without a synthetic key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKey {
    Id(Uuid),
    Fields {
        date: NaiveDate,
        description: String,
        amount: Decimal,
        kind: TransactionKind,
        status: TransactionStatus,
        series_id: Option<Uuid>,
        instance_number: Option<u32>,
    },
}

/// How far a series-level edit reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    SingleInstance,
    WholeSeries,
    /// Members dated on or before the edited instance only.
    PastAndCurrent,
}

/// Field-level updates; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub kind: Option<TransactionKind>,
    pub category: Option<Option<String>>,
    pub status: Option<TransactionStatus>,
    pub end_date: Option<NaiveDate>,
    pub frequency: Option<Frequency>,
    pub active: Option<bool>,
}

impl TransactionPatch {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == TransactionPatch::default()
    }

    /// True when the patch only marks paid/pending.
    pub fn is_status_only(&self) -> bool {
        self.status.is_some()
            && TransactionPatch {
                status: None,
                ..self.clone()
            }
            .is_empty()
    }

    /// Computes the patch that turns `original` into `updated`.
    pub fn diff(original: &Transaction, updated: &Transaction) -> Self {
        let mut patch = TransactionPatch::default();
        if original.date != updated.date {
            patch.date = Some(updated.date);
        }
        if original.description != updated.description {
            patch.description = Some(updated.description.clone());
        }
        if original.amount != updated.amount {
            patch.amount = Some(updated.amount);
        }
        if original.kind != updated.kind {
            patch.kind = Some(updated.kind);
        }
        if original.category != updated.category {
            patch.category = Some(updated.category.clone());
        }
        if original.status != updated.status {
            patch.status = Some(updated.status);
        }
        if let (Some(before), Some(after)) = (&original.recurrence, &updated.recurrence) {
            if before.end_date != after.end_date {
                patch.end_date = Some(after.end_date);
            }
            if before.frequency != after.frequency {
                patch.frequency = Some(after.frequency);
            }
            if before.active != after.active {
                patch.active = Some(after.active);
            }
        }
        patch
    }

    /// Merges every field except `date` onto `txn`. Recurrence sub-fields absent
    /// from the patch are preserved.
    pub fn merge_into(&self, txn: &mut Transaction) {
        if let Some(description) = &self.description {
            txn.description = description.clone();
        }
        if let Some(kind) = self.kind {
            txn.kind = kind;
            txn.amount = kind.signed(txn.amount);
        }
        if let Some(amount) = self.amount {
            txn.amount = txn.kind.signed(amount);
        }
        if let Some(category) = &self.category {
            txn.category = category.clone();
        }
        if let Some(status) = self.status {
            txn.status = status;
        }
        if let Some(meta) = txn.recurrence.as_mut() {
            if let Some(end_date) = self.end_date {
                meta.end_date = end_date;
            }
            if let Some(frequency) = self.frequency {
                meta.frequency = frequency;
            }
            if let Some(active) = self.active {
                meta.active = active;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_applies_sign_convention() {
        let expense = Transaction::new(
            date(2024, 1, 1),
            "Rent",
            Decimal::from(900),
            TransactionKind::Expense,
        );
        assert_eq!(expense.amount, Decimal::from(-900));
        let income = Transaction::new(
            date(2024, 1, 1),
            "Salary",
            Decimal::from(-1000),
            TransactionKind::Income,
        );
        assert_eq!(income.amount, Decimal::from(1000));
    }

    #[test]
    fn unknown_frequency_is_invalid_rule() {
        assert_eq!("Monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!(" bi-weekly ".parse::<Frequency>().unwrap(), Frequency::Biweekly);
        let err = "fortnightly".parse::<Frequency>().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRule(ref msg) if msg.contains("fortnightly")));
    }

    #[test]
    fn effective_end_defaults_to_one_year() {
        let rule = RecurrenceRule::new(Frequency::Weekly);
        assert_eq!(rule.effective_end_date(date(2024, 2, 29)), date(2025, 2, 28));
        let bounded = rule.until(date(2024, 6, 1));
        assert_eq!(bounded.effective_end_date(date(2024, 2, 29)), date(2024, 6, 1));
    }

    #[test]
    fn status_only_patch_detection() {
        assert!(TransactionPatch::status(TransactionStatus::Completed).is_status_only());
        let mixed = TransactionPatch::status(TransactionStatus::Completed)
            .with_amount(Decimal::from(5));
        assert!(!mixed.is_status_only());
        assert!(!TransactionPatch::default().is_status_only());
    }

    #[test]
    fn merge_keeps_date_and_untouched_recurrence_fields() {
        let mut txn = Transaction::new(
            date(2024, 3, 1),
            "Gym",
            Decimal::from(40),
            TransactionKind::Expense,
        );
        txn.recurrence = Some(RecurrenceMeta {
            series_id: Uuid::new_v4(),
            original_date: date(2024, 1, 1),
            instance_number: 3,
            frequency: Frequency::Monthly,
            end_date: date(2024, 12, 1),
            active: true,
            is_business_day_rule: false,
            business_day_number: None,
        });
        let patch = TransactionPatch::default()
            .with_date(date(2030, 1, 1))
            .with_amount(Decimal::from(45))
            .with_end_date(date(2024, 6, 1));
        patch.merge_into(&mut txn);

        assert_eq!(txn.date, date(2024, 3, 1));
        assert_eq!(txn.amount, Decimal::from(-45));
        let meta = txn.recurrence.unwrap();
        assert_eq!(meta.end_date, date(2024, 6, 1));
        assert_eq!(meta.instance_number, 3);
        assert_eq!(meta.frequency, Frequency::Monthly);
    }

    #[test]
    fn legacy_records_key_by_fields() {
        let json = r#"{"date":"2024-01-01","description":"Coffee","amount":"-3.5","kind":"Expense"}"#;
        let txn: Transaction = serde_json::from_str(json).unwrap();
        assert!(!txn.has_key());
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert!(matches!(txn.key(), TransactionKey::Fields { .. }));
    }
}
