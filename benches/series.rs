use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use recurring_ledger::ledger::{
    generate_series, plan_backfill, reconcile_balances, running_balances, Frequency,
    RecurrenceRule, Transaction, TransactionKind, TransactionStatus,
};
use rust_decimal::Decimal;

fn build_history(series_count: usize) -> Vec<Transaction> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
    let mut all = Vec::new();
    for idx in 0..series_count {
        let kind = if idx % 4 == 0 {
            TransactionKind::Income
        } else {
            TransactionKind::Expense
        };
        let base = Transaction::new(
            start + Duration::days((idx % 28) as i64),
            format!("Series {idx}"),
            Decimal::new(1000 + (idx as i64 % 500), 2),
            kind,
        );
        let frequency = match idx % 3 {
            0 => Frequency::Weekly,
            1 => Frequency::Monthly,
            _ => Frequency::Biweekly,
        };
        let series = generate_series(&base, &RecurrenceRule::new(frequency).until(end))
            .expect("generate series");
        all.extend(series.into_iter().enumerate().map(|(n, txn)| {
            if n % 2 == 0 {
                txn.with_status(TransactionStatus::Completed)
            } else {
                txn
            }
        }));
    }
    all
}

fn bench_generation(c: &mut Criterion) {
    let base = Transaction::new(
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        "Invoice",
        Decimal::from(2500),
        TransactionKind::Income,
    );
    let rule = RecurrenceRule::new(Frequency::Monthly)
        .until(NaiveDate::from_ymd_opt(2027, 12, 31).unwrap());

    c.bench_function("generate_business_day_series", |b| {
        b.iter(|| {
            let series = generate_series(black_box(&base), black_box(&rule)).expect("generate");
            black_box(series);
        })
    });
}

fn bench_reconciliation(c: &mut Criterion) {
    let history = build_history(black_box(200));

    c.bench_function("running_balances_full_history", |b| {
        b.iter(|| black_box(running_balances(&history)))
    });

    c.bench_function("reconcile_balances_full_history", |b| {
        b.iter(|| black_box(reconcile_balances(&history)))
    });
}

fn bench_backfill(c: &mut Criterion) {
    let history = build_history(50);
    let series_id = history
        .iter()
        .find(|txn| txn.description == "Series 1")
        .and_then(Transaction::series_id)
        .expect("monthly series");

    c.bench_function("plan_backfill_after_truncation", |b| {
        b.iter_batched(
            || {
                let mut truncated = history.clone();
                let cutoff = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
                truncated.retain(|txn| txn.series_id() != Some(series_id) || txn.date <= cutoff);
                truncated
            },
            |truncated| black_box(plan_backfill(&truncated, series_id).expect("plan")),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_generation, bench_reconciliation, bench_backfill);
criterion_main!(benches);
