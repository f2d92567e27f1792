use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use pharmcast::config;
use pharmcast::curves::{decay_to_floor, logistic};
use pharmcast::engine::run;
use pharmcast::generic_entry::GenericEntryModel;
use pharmcast::rx_otc::RxOtcModel;
use pharmcast::scenario::{EngineParams, EnginePatch, GenericEntryPatch, Scenario, run_scenarios};

// ── Group 1: horizon — month count scaling per engine ────────────────────────

fn bench_horizon(c: &mut Criterion) {
    let mut group = c.benchmark_group("horizon");
    for &months in &[12u32, 60, 120, 600] {
        group.throughput(Throughput::Elements(months as u64));
        group.bench_with_input(
            BenchmarkId::new("generic_entry", months),
            &months,
            |b, &m| {
                let mut params = config::eliquis_loss_of_exclusivity();
                params.horizon_months = m;
                let model = GenericEntryModel::new(&params).unwrap();
                b.iter(|| run(&model).unwrap())
            },
        );
        group.bench_with_input(BenchmarkId::new("rx_otc", months), &months, |b, &m| {
            let mut params = config::sildenafil_omnichannel();
            params.horizon_months = m;
            let model = RxOtcModel::new(&params).unwrap();
            b.iter(|| run(&model).unwrap())
        });
    }
    group.finish();
}

// ── Group 2: scenario fan-out — parallel sweep scaling ───────────────────────

fn bench_scenario_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario_sweep");
    group.sample_size(20);
    for &count in &[3usize, 10, 50] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            let base = EngineParams::GenericEntry(config::eliquis_loss_of_exclusivity());
            b.iter_batched(
                || {
                    (0..n)
                        .map(|i| {
                            Scenario::new(
                                format!("seed-{i}"),
                                EnginePatch::GenericEntry(GenericEntryPatch {
                                    tender_seed: Some(i as u64),
                                    ..Default::default()
                                }),
                            )
                        })
                        .collect::<Vec<_>>()
                },
                |scenarios| run_scenarios(&base, &scenarios).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ── Group 3: curves — primitive cost in isolation ────────────────────────────

fn bench_curves(c: &mut Criterion) {
    let mut group = c.benchmark_group("curves");
    group.bench_function("decay_to_floor", |b| {
        b.iter(|| {
            decay_to_floor(
                std::hint::black_box(91.5),
                std::hint::black_box(0.166),
                std::hint::black_box(27.45),
                std::hint::black_box(17.0),
            )
            .unwrap()
        })
    });
    group.bench_function("logistic", |b| {
        b.iter(|| {
            logistic(
                std::hint::black_box(0.55),
                std::hint::black_box(6.0),
                std::hint::black_box(0.45),
                std::hint::black_box(9.0),
            )
        })
    });
    group.finish();
}

criterion_group!(benches, bench_horizon, bench_scenario_sweep, bench_curves);
criterion_main!(benches);
