use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use std::{hint::black_box, time::Duration};

use manyalign::{Algorithm, Database, Mode, ScoreMatrix, SearchConfig};

const AMINO_ACIDS: &[u8] = b"ARNDCQEGHILKMFPSTWYV";

/// Protein-like sequences with normally distributed lengths
fn generate_database(count: usize, mean_length: f64) -> Database {
    let mut rng = StdRng::seed_from_u64(0);
    let lengths = Normal::new(mean_length, mean_length / 3.0).unwrap();

    let sequences = (0..count).map(|_| {
        let len = lengths.sample(&mut rng).max(1.0) as usize;
        (0..len)
            .map(|_| AMINO_ACIDS[rng.random_range(0..AMINO_ACIDS.len())])
            .collect::<Vec<_>>()
    });
    Database::from_sequences(sequences.collect::<Vec<_>>(), ScoreMatrix::aa()).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let database = generate_database(2_000, 300.0);
    let query = database.get(0).unwrap();
    let cells = (query.len() * database.lengths().iter().sum::<usize>()) as u64;

    let mut group = c.benchmark_group("search");
    group.throughput(Throughput::Elements(cells));
    for mode in [Mode::Score, Mode::End, Mode::Full] {
        for algorithm in [Algorithm::Sw, Algorithm::Nw] {
            let config = SearchConfig {
                mode,
                algorithm,
                ..SearchConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{algorithm}"), mode),
                &config,
                |b, config| b.iter(|| database.search(black_box(&query), config).unwrap()),
            );
        }
    }
    group.finish();

    let config = SearchConfig::default();
    let mut group = c.benchmark_group("search_parallel");
    group.throughput(Throughput::Elements(cells));
    for threads in [2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                database
                    .search_parallel(black_box(&query), &config, threads)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(200))
        .measurement_time(Duration::from_secs(2));
    targets = criterion_benchmark
}
criterion_main!(benches);
