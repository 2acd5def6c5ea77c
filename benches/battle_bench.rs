//! Battle throughput benchmarks: one fast-forwarded battle per iteration.
//!
//! Run with: `cargo bench --bench battle`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use idlecombat::combat::profession::{CharacterProfile, Profession};
use idlecombat::combat::{AdvanceBudget, BattleConfig, BattleDriver};
use idlecombat::data::{EncounterCatalog, EncounterRequest};
use idlecombat::parallel::{sweep_seeds, WorkerPool};

fn config(profession: Profession, request: &EncounterRequest, target: f64) -> BattleConfig {
    let spec = EncounterCatalog::builtin()
        .resolve(request)
        .expect("builtin encounter");
    BattleConfig::new(7, target, CharacterProfile::new("bench", profession), spec)
}

fn bench_fast_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("battle");
    group.sample_size(50);

    let cases = [
        ("single_dummy_600s", Profession::Warrior, EncounterRequest::single("training_dummy"), 600.0),
        (
            "continuous_wolves_600s",
            Profession::Ranger,
            EncounterRequest::Continuous {
                enemies: vec!["wolf".to_string(), "wolf".to_string()],
                respawn_delay: 2.0,
            },
            600.0,
        ),
        (
            "looping_den_3600s",
            Profession::Arcanist,
            EncounterRequest::Dungeon {
                dungeon_id: "wolf_den".to_string(),
                looping: true,
            },
            3600.0,
        ),
    ];

    for (name, profession, request, target) in cases {
        let template = config(profession, &request, target);
        group.throughput(Throughput::Elements(1));
        group.bench_function(name, |b| {
            b.iter_batched(
                || BattleDriver::new(template.clone()).expect("driver"),
                |mut driver| {
                    driver.fast_forward_to(target);
                    black_box(driver.status())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_throttled_slices(c: &mut Criterion) {
    let template = config(
        Profession::Ranger,
        &EncounterRequest::Continuous {
            enemies: vec!["goblin".to_string()],
            respawn_delay: 1.0,
        },
        600.0,
    );
    let mut group = c.benchmark_group("battle_throttled");
    group.sample_size(30);
    group.bench_function("quarter_second_slices_600s", |b| {
        b.iter_batched(
            || BattleDriver::new(template.clone()).expect("driver"),
            |mut driver| {
                let base = std::time::Instant::now();
                driver.anchor_wall_clock(base);
                let step = std::time::Duration::from_millis(250);
                let mut calls = 0u32;
                while !driver.is_completed() {
                    calls += 1;
                    driver.advance_at(base + step * calls, AdvanceBudget::default());
                }
                black_box(calls)
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_seed_sweep(c: &mut Criterion) {
    let template = config(
        Profession::Warrior,
        &EncounterRequest::Dungeon {
            dungeon_id: "goblin_warren".to_string(),
            looping: true,
        },
        600.0,
    );
    let seeds: Vec<u64> = (1..=64).collect();

    let mut group = c.benchmark_group("seed_sweep");
    group.sample_size(10);
    group.throughput(Throughput::Elements(seeds.len() as u64));
    group.bench_function("sequential", |b| {
        let pool = WorkerPool::with_workers(1);
        b.iter(|| black_box(sweep_seeds(&template, &seeds, &pool).expect("sweep")));
    });
    group.bench_function("parallel", |b| {
        let pool = WorkerPool::default_workers();
        b.iter(|| black_box(sweep_seeds(&template, &seeds, &pool).expect("sweep")));
    });
    group.finish();
}

criterion_group!(benches, bench_fast_forward, bench_throttled_slices, bench_seed_sweep);
criterion_main!(benches);
