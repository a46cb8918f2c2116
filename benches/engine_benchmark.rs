/*
 * Bubble Engine Benchmark
 *
 * Measures the hot paths of the engine: the overlap test used by every
 * consumption sweep, the position clamp, and a whole container running its
 * autoplay loop on virtual time for different population sizes.
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use bubbles::geometry::{self, Position, SpaceRect};
use bubbles::{Bubble, Glass, GlassConfig};

const FRAME: Duration = Duration::from_millis(16);

fn random_circles(n: usize, rect: &SpaceRect) -> Vec<(Position, f32)> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|_| {
            let size = rng.gen_range(20.0..160.0);
            let x = rng.gen_range(rect.left..rect.right() - size);
            let y = rng.gen_range(rect.top..rect.bottom() - size);
            (Position::new(x, y), size)
        })
        .collect()
}

// Every pair overlap test, as a full sweep over the population would do
fn bench_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap");
    let rect = SpaceRect::from_size(1920.0, 1080.0);

    for n in [10, 50, 200].iter() {
        let circles = random_circles(*n, &rect);
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| {
                let mut hits = 0;
                for (i, &(a, size_a)) in circles.iter().enumerate() {
                    for &(other, size_b) in &circles[i + 1..] {
                        if geometry::circles_overlap(a, size_a, other, size_b) {
                            hits += 1;
                        }
                    }
                }
                black_box(hits)
            });
        });
    }

    group.finish();
}

fn bench_clamp(c: &mut Criterion) {
    let rect = SpaceRect::from_size(1920.0, 1080.0);
    let circles = random_circles(200, &rect);

    c.bench_function("clamp_to_space", |b| {
        b.iter(|| {
            for &(position, size) in &circles {
                black_box(geometry::clamp_to_space(
                    Position::new(position.x * 1.5, position.y * 1.5),
                    size,
                    &rect,
                    10.0,
                ));
            }
        });
    });
}

// One simulated second of a container with autoplay on
fn bench_glass_second(c: &mut Criterion) {
    let mut group = c.benchmark_group("glass_second");

    for n in [10, 30, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter_with_setup(
                || {
                    let config = GlassConfig {
                        startup_delay_ms: 0,
                        nudge_interval_ms: 100,
                        ..GlassConfig::default()
                    };
                    let glass = Glass::new(SpaceRect::from_size(1920.0, 1080.0), config);
                    for _ in 0..n {
                        let _ = glass.spawn_bubble(Bubble::builder());
                    }
                    glass
                },
                |glass| {
                    for _ in 0..62 {
                        let _ = glass.step(FRAME);
                    }
                    black_box(glass.stage_counts())
                },
            );
        });
    }

    group.finish();
}

// Configure the benchmarks
criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));
    targets = bench_overlap, bench_clamp, bench_glass_second
}

criterion_main!(benches);
