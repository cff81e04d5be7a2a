use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::session::SessionContext;
use crate::errors::{LedgerError, Result};
use crate::ledger::{
    find_series, find_series_indices, generate_series, locate_instance, needs_correction,
    plan_backfill, plan_correction, reconcile_balances, running_balances, summarize_series,
    sweep_invalid, sweep_series, synchronize, BalanceIndex, BalancedTransaction, MemberChange,
    RecurrenceRule, SeriesSummary, Transaction, TransactionPatch, TransactionStatus, UpdateScope,
};
use crate::storage::{FieldUpdate, MatchCriteria, StoreError, StoreResult, TransactionStore};

/// Outcome of [`SeriesManager::correct_after_edit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    pub removed: usize,
    pub updated: usize,
}

/// What a single edit did across its series, in the order the passes ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub synchronized: usize,
    pub removed: usize,
    pub corrected: usize,
    pub backfilled: usize,
}

/// Per-record writes attempted for one series operation.
#[derive(Default)]
struct WriteTally {
    succeeded: usize,
    failed: Vec<(MatchCriteria, StoreError)>,
}

impl WriteTally {
    fn record(&mut self, criteria: MatchCriteria, outcome: StoreResult<()>) {
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(err) => self.failed.push((criteria, err)),
        }
    }

    fn merge(&mut self, other: WriteTally) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }

    /// Turns the tally into the caller-facing result. A lone failed write is
    /// reported as-is; anything larger becomes a partial batch failure.
    fn settle(self, series_id: Option<Uuid>) -> Result<()> {
        let failed = self.failed.len();
        let total = self.succeeded + failed;
        match series_id {
            _ if failed == 0 => Ok(()),
            Some(series_id) if total > 1 => {
                for (criteria, err) in &self.failed {
                    error!(%series_id, %criteria, error = %err, "series member not persisted");
                }
                error!(
                    %series_id,
                    succeeded = self.succeeded,
                    failed,
                    "series partially persisted; store needs manual reconciliation"
                );
                Err(LedgerError::PartialBatchFailure {
                    series_id,
                    succeeded: self.succeeded,
                    failed,
                })
            }
            _ => match self.failed.into_iter().next() {
                Some((criteria, err)) => {
                    error!(%criteria, error = %err, "record not persisted");
                    Err(err.into())
                }
                None => Ok(()),
            },
        }
    }
}

/// Facade that owns a session's transaction collection and keeps it in step
/// with the backing store.
///
/// Every operation mutates the in-memory collection first and then persists
/// the difference. When persistence fails part way through, the in-memory
/// state is kept and the error tells the caller the store may disagree.
pub struct SeriesManager {
    transactions: Vec<Transaction>,
    store: Box<dyn TransactionStore>,
    context: SessionContext,
    config: EngineConfig,
}

impl SeriesManager {
    pub fn load(
        context: SessionContext,
        store: Box<dyn TransactionStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let transactions = store.fetch_all()?;
        info!(user = %context.user, records = transactions.len(), "transactions loaded");
        Ok(Self {
            transactions,
            store,
            context,
            config,
        })
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn TransactionStore {
        self.store.as_ref()
    }

    /// Members of `series_id`, oldest first.
    pub fn series(&self, series_id: Uuid) -> Vec<&Transaction> {
        find_series(&self.transactions, series_id, None)
    }

    /// Expands `base` under `rule` and persists the result as one batch.
    pub fn create(
        &mut self,
        base: Transaction,
        rule: &RecurrenceRule,
    ) -> Result<Vec<Transaction>> {
        let series = generate_series(&base, rule)?;
        let series_id = series.first().and_then(Transaction::series_id);
        if series_id.is_none() {
            let stored = self.store.insert_one(&base)?;
            self.transactions.push(stored.clone());
            info!(user = %self.context.user, id = %stored.id, "transaction created");
            return Ok(vec![stored]);
        }
        let start = self.transactions.len();
        self.insert_members(series_id, series)?;
        let created = self.transactions[start..].to_vec();
        info!(
            user = %self.context.user,
            series_id = ?series_id,
            members = created.len(),
            "series created"
        );
        Ok(created)
    }

    /// Applies `patch` to `instance` and the members `scope` selects, then
    /// persists the changes. Returns the number of members in scope; for the
    /// series scopes a count below two means nothing was changed.
    pub fn apply_to_series(
        &mut self,
        instance: &Transaction,
        patch: &TransactionPatch,
        scope: UpdateScope,
    ) -> Result<usize> {
        let plan = synchronize(&mut self.transactions, instance, patch, scope)?;
        if plan.changes.is_empty() {
            return Ok(plan.affected());
        }
        match (plan.scope, plan.series_id) {
            (UpdateScope::WholeSeries, Some(series_id)) => {
                self.rewrite_series(series_id, &plan.changes)?
            }
            (_, series_id) => self.update_members(&plan.changes, false).settle(series_id)?,
        }
        Ok(plan.affected())
    }

    /// Runs the shrink and consistency passes after `original` became
    /// `updated`. Status-only edits never reach the correction passes.
    pub fn correct_after_edit(
        &mut self,
        original: &Transaction,
        updated: &Transaction,
    ) -> Result<CorrectionReport> {
        if !needs_correction(original, updated) {
            return Ok(CorrectionReport::default());
        }
        let plan = plan_correction(&mut self.transactions, original, updated);
        if plan.is_empty() {
            return Ok(CorrectionReport::default());
        }
        let mut tally = self.delete_members(&plan.removed);
        tally.merge(self.update_members(&plan.corrected, false));
        let report = CorrectionReport {
            removed: plan.removed.len(),
            updated: plan.corrected.len(),
        };
        info!(
            series_id = ?updated.series_id(),
            removed = report.removed,
            updated = report.updated,
            "series corrected"
        );
        tally.settle(updated.series_id())?;
        Ok(report)
    }

    /// Generates and persists the trailing members missing from `series_id`.
    pub fn backfill_missing(&mut self, series_id: Uuid) -> Result<usize> {
        let planned = plan_backfill(&self.transactions, series_id)?;
        if planned.is_empty() {
            debug!(%series_id, "series complete, nothing to backfill");
            return Ok(0);
        }
        let created = self.insert_members(Some(series_id), planned)?;
        info!(%series_id, created, "series backfilled");
        Ok(created)
    }

    /// Removes every recurring instance dated after its own end date.
    pub fn sweep_invalid_recurrences(&mut self) -> Result<usize> {
        let removed = sweep_invalid(&mut self.transactions);
        if removed.is_empty() {
            return Ok(0);
        }
        info!(removed = removed.len(), "invalid recurrences swept");
        let series_id = removed.first().and_then(Transaction::series_id);
        self.delete_members(&removed).settle(series_id)?;
        Ok(removed.len())
    }

    /// Marks `instance` paid or pending, together with the earlier members of
    /// its series. Never triggers correction.
    pub fn toggle_status(
        &mut self,
        instance: &Transaction,
        status: TransactionStatus,
    ) -> Result<usize> {
        let patch = TransactionPatch::status(status);
        let scope = if instance.series_id().is_some() {
            UpdateScope::PastAndCurrent
        } else {
            UpdateScope::SingleInstance
        };
        self.apply_with_single_fallback(instance, &patch, scope)
    }

    /// Applies one user edit: synchronization, then correction, then backfill.
    pub fn edit(
        &mut self,
        original: &Transaction,
        patch: &TransactionPatch,
        scope: UpdateScope,
    ) -> Result<EditOutcome> {
        let mut outcome = EditOutcome::default();
        if patch.is_empty() {
            return Ok(outcome);
        }
        outcome.synchronized = self.apply_with_single_fallback(original, patch, scope)?;
        if outcome.synchronized == 0 || patch.is_status_only() {
            return Ok(outcome);
        }

        let updated = self.current_image(original, patch);
        let report = self.correct_after_edit(original, &updated)?;
        outcome.removed = report.removed;
        outcome.corrected = report.updated;

        let Some(series_id) = updated.series_id() else {
            return Ok(outcome);
        };
        if patch.date.is_some_and(|date| date != original.date) {
            let swept = sweep_series(&mut self.transactions, series_id);
            if !swept.is_empty() {
                info!(%series_id, removed = swept.len(), "shifted members past end date removed");
                outcome.removed += swept.len();
                self.delete_members(&swept).settle(Some(series_id))?;
            }
        }
        if !find_series_indices(&self.transactions, series_id, None).is_empty() {
            outcome.backfilled = self.backfill_missing(series_id)?;
        }
        debug!(%series_id, ?outcome, "edit applied");
        Ok(outcome)
    }

    /// Removes one record. Returns false when it is not part of this session.
    pub fn delete_instance(&mut self, instance: &Transaction) -> Result<bool> {
        let Some(idx) = locate_instance(&self.transactions, instance) else {
            return Ok(false);
        };
        let criteria = MatchCriteria::for_transaction(&self.transactions[idx]);
        self.store.delete_where(&criteria)?;
        let removed = self.transactions.remove(idx);
        info!(id = %removed.id, series_id = ?removed.series_id(), "transaction deleted");
        Ok(true)
    }

    /// Removes every member of `series_id`.
    pub fn delete_series(&mut self, series_id: Uuid) -> Result<usize> {
        let indices = find_series_indices(&self.transactions, series_id, None);
        if indices.is_empty() {
            return Err(LedgerError::SeriesNotFound(series_id));
        }
        match self.store.delete_batch_by_series_id(series_id) {
            Ok(_) => {
                self.transactions
                    .retain(|txn| txn.series_id() != Some(series_id));
                info!(%series_id, removed = indices.len(), "series deleted");
                Ok(indices.len())
            }
            Err(err) if self.may_fall_back(&err) => {
                warn!(%series_id, error = %err, "bulk series delete failed, deleting per record");
                let mut tally = WriteTally::default();
                let mut deleted = Vec::new();
                for idx in indices {
                    let member = &self.transactions[idx];
                    let criteria = MatchCriteria::for_transaction(member);
                    let outcome = self.store.delete_where(&criteria).map(|_| ());
                    if outcome.is_ok() {
                        deleted.push(member.key());
                    }
                    tally.record(criteria, outcome);
                }
                self.transactions.retain(|txn| !deleted.contains(&txn.key()));
                info!(%series_id, removed = deleted.len(), "series deleted per record");
                tally.settle(Some(series_id))?;
                Ok(deleted.len())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn balances(&self) -> BalanceIndex {
        running_balances(&self.transactions)
    }

    pub fn reconcile_balances(&self) -> Vec<BalancedTransaction> {
        reconcile_balances(&self.transactions)
    }

    /// Due/overdue snapshot of every series as of the session's today.
    pub fn summaries(&self) -> Vec<SeriesSummary> {
        summarize_series(
            &self.transactions,
            self.context.today(),
            self.config.upcoming_window_days,
        )
    }

    fn may_fall_back(&self, err: &StoreError) -> bool {
        self.config.bulk_fallback && err.is_retryable()
    }

    /// Series scopes that find a lone member still edit that member.
    fn apply_with_single_fallback(
        &mut self,
        instance: &Transaction,
        patch: &TransactionPatch,
        scope: UpdateScope,
    ) -> Result<usize> {
        let affected = self.apply_to_series(instance, patch, scope)?;
        if affected < 2 && scope != UpdateScope::SingleInstance {
            return self.apply_to_series(instance, patch, UpdateScope::SingleInstance);
        }
        Ok(affected)
    }

    /// The edited record as it now stands in memory.
    fn current_image(&self, original: &Transaction, patch: &TransactionPatch) -> Transaction {
        if let Some(idx) = locate_instance(&self.transactions, original) {
            return self.transactions[idx].clone();
        }
        let mut updated = original.clone();
        if let Some(date) = patch.date {
            updated.date = date;
        }
        patch.merge_into(&mut updated);
        updated
    }

    fn rewrite_series(&mut self, series_id: Uuid, changes: &[MemberChange]) -> Result<()> {
        let members: Vec<Transaction> =
            changes.iter().map(|change| change.after.clone()).collect();
        if let Err(err) = self.store.delete_batch_by_series_id(series_id) {
            if !self.may_fall_back(&err) {
                return Err(err.into());
            }
            warn!(%series_id, error = %err, "bulk series delete failed, updating per record");
            return self.update_members(changes, true).settle(Some(series_id));
        }
        match self.store.insert_batch(&members) {
            Ok(stored) => {
                self.adopt(&members, stored);
                debug!(%series_id, members = members.len(), "series rewritten in bulk");
                Ok(())
            }
            // The store no longer holds the series, so the members are put
            // back one by one whatever the error and the fallback setting.
            Err(err) => {
                warn!(
                    %series_id,
                    error = %err,
                    "batch insert after series delete failed, reinserting per record"
                );
                self.reinsert_members(&members).settle(Some(series_id))
            }
        }
    }

    /// Sends one field update per change. With `reinsert_missing`, members the
    /// store no longer holds are inserted again.
    fn update_members(
        &mut self,
        changes: &[MemberChange],
        reinsert_missing: bool,
    ) -> WriteTally {
        let mut tally = WriteTally::default();
        for change in changes {
            let criteria = MatchCriteria::for_transaction(&change.before);
            let fields = FieldUpdate::between(&change.before, &change.after);
            if fields.is_empty() {
                tally.succeeded += 1;
                continue;
            }
            let outcome = match self.store.update_one(&criteria, &fields) {
                Err(StoreError::NoMatch(_)) if reinsert_missing => self
                    .store
                    .insert_one(&change.after)
                    .map(|stored| self.adopt(std::slice::from_ref(&change.after), vec![stored])),
                other => other,
            };
            tally.record(criteria, outcome);
        }
        tally
    }

    fn reinsert_members(&mut self, members: &[Transaction]) -> WriteTally {
        let mut tally = WriteTally::default();
        for member in members {
            let outcome = self
                .store
                .insert_one(member)
                .map(|stored| self.adopt(std::slice::from_ref(member), vec![stored]));
            tally.record(MatchCriteria::for_transaction(member), outcome);
        }
        tally
    }

    fn delete_members(&self, removed: &[Transaction]) -> WriteTally {
        let mut tally = WriteTally::default();
        for txn in removed {
            let criteria = MatchCriteria::for_transaction(txn);
            let outcome = self.store.delete_where(&criteria).map(|_| ());
            tally.record(criteria, outcome);
        }
        tally
    }

    /// Inserts new members as one batch, falling back to one insert per record.
    fn insert_members(
        &mut self,
        series_id: Option<Uuid>,
        records: Vec<Transaction>,
    ) -> Result<usize> {
        match self.store.insert_batch(&records) {
            Ok(stored) => {
                let count = stored.len();
                self.transactions.extend(stored);
                Ok(count)
            }
            Err(err) if self.may_fall_back(&err) => {
                warn!(
                    series_id = ?series_id,
                    error = %err,
                    "batch insert failed, inserting per record"
                );
                let mut tally = WriteTally::default();
                for txn in &records {
                    let outcome = self.store.insert_one(txn).map(|stored| {
                        self.transactions.push(stored);
                    });
                    tally.record(MatchCriteria::for_transaction(txn), outcome);
                }
                let inserted = tally.succeeded;
                tally.settle(series_id)?;
                Ok(inserted)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Replaces in-memory records with the copies the store returned, which
    /// may carry keys assigned on write.
    fn adopt(&mut self, written: &[Transaction], stored: Vec<Transaction>) {
        for (local, stored) in written.iter().zip(stored) {
            if let Some(idx) = locate_instance(&self.transactions, local) {
                self.transactions[idx] = stored;
            }
        }
    }
}
