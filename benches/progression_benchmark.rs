use criterion::{black_box, criterion_group, criterion_main, Criterion};
use runpass_tracker::models::progress::{cumulative_totals, unlocked_tiers};
use runpass_tracker::models::{Run, TierCatalog};
use runpass_tracker::rating::update_training_score;

fn make_history(len: usize) -> Vec<Run> {
    (0..len)
        .map(|i| Run {
            id: format!("run-{}", i),
            user_id: "bench-user".to_string(),
            total_distance_km: 5.0 + (i % 10) as f64,
            total_time_seconds: 1800 + (i % 600) as u64,
            lap_times: vec!["25:00".to_string()],
            num_laps: 1,
            run_date: "2024-01-01".to_string(),
            created_at: "2024-01-01T10:00:00.000Z".to_string(),
            is_ranked: i % 3 == 0,
        })
        .collect()
}

fn benchmark_progression(c: &mut Criterion) {
    let catalog = TierCatalog::builtin();
    let history = make_history(1000);

    let mut group = c.benchmark_group("progression");

    group.bench_function("unlocked_tiers_builtin_catalog", |b| {
        b.iter(|| unlocked_tiers(black_box(137.5), &catalog))
    });

    group.bench_function("cumulative_totals_1k_runs", |b| {
        b.iter(|| cumulative_totals(black_box(&history)))
    });

    group.bench_function("training_score_update", |b| {
        b.iter(|| update_training_score(black_box(1025), black_box(5.5), black_box(2000)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_progression);
criterion_main!(benches);
