//! Criterion benchmarks for the per-tick hot path.
//!
//! 1. Snapshot computation over typical window sizes
//! 2. One engine decision

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use breakoutbot::indicators::{IndicatorCalculator, IndicatorParams};
use breakoutbot::ledger::AccountState;
use breakoutbot::risk::{PositionSizer, SizingParams};
use breakoutbot::strategy::StrategyEngine;
use breakoutbot::types::Candle;

fn make_candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 2000.0 + (i as f64 * 0.1).sin() * 25.0;
            Candle::new(i as i64 * 3_600_000, close - 0.3, close + 1.5, close - 1.5, close)
        })
        .collect()
}

fn bench_snapshot(c: &mut Criterion) {
    let calculator = IndicatorCalculator::new(IndicatorParams {
        entry_lookback: 20,
        exit_lookback: 10,
        trend_span: 200,
    });

    let mut group = c.benchmark_group("snapshot");
    for n in [200usize, 500, 1000] {
        let candles = make_candles(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &candles, |b, candles| {
            b.iter(|| calculator.compute(black_box(candles)))
        });
    }
    group.finish();
}

fn bench_decide(c: &mut Criterion) {
    let calculator = IndicatorCalculator::new(IndicatorParams {
        entry_lookback: 20,
        exit_lookback: 20,
        trend_span: 200,
    });
    let snapshot = calculator.compute(&make_candles(500)).unwrap();
    let engine = StrategyEngine::new(PositionSizer::new(SizingParams::default()), 0.01);
    let state = AccountState::new(10_000.0);

    c.bench_function("decide_flat", |b| {
        b.iter(|| engine.decide(black_box(&state), black_box(&snapshot)))
    });
}

criterion_group!(benches, bench_snapshot, bench_decide);
criterion_main!(benches);
