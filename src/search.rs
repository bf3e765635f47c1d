use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use itertools::Itertools;
use tracing::debug;

use crate::error::{Error, Result};
use crate::kernel::{self, Kernel, KernelArgs, RawResult, Status};
use crate::{Database, ScoreMatrix, SearchConfig, SearchResult};

/// Fails every search when no compiled kernel runs on this CPU
fn require_kernel(selected: Option<&'static dyn Kernel>) -> Result<&'static dyn Kernel> {
    selected.ok_or(Error::RuntimeUnavailable)
}

pub(crate) fn search_targets(
    database: &Database,
    query: &[u8],
    config: &SearchConfig,
) -> Result<Vec<SearchResult>> {
    let matrix = database.score_matrix();
    let query = matrix.encode(query)?;
    let kernel = require_kernel(kernel::selected_kernel())?;
    let targets = database
        .encoded()
        .iter()
        .map(|target| &**target)
        .collect::<Vec<_>>();

    debug!(
        kernel = kernel.name(),
        targets = targets.len(),
        query_length = query.len(),
        ?config,
        "searching database"
    );

    let args = kernel_args(&query, &targets, matrix, config);
    let raw = run_kernel(kernel, &args)?;
    let results = collect_results(raw, query.len(), database.lengths())?;

    debug!(results = results.len(), "search finished");
    Ok(results)
}

pub(crate) fn search_targets_parallel(
    database: &Database,
    query: &[u8],
    config: &SearchConfig,
    threads: usize,
) -> Result<Vec<SearchResult>> {
    let matrix = database.score_matrix();
    let query = matrix.encode(query)?;
    let kernel = require_kernel(kernel::selected_kernel())?;
    if database.is_empty() {
        return Ok(vec![]);
    }

    let targets = database
        .encoded()
        .iter()
        .map(|target| &**target)
        .collect::<Vec<_>>();

    // Smaller chunks balance the load better between threads but increase atomic contention
    let chunk_size = 256;
    let num_chunks = targets.len().div_ceil(chunk_size);
    // Threads beyond the number of chunks would never claim one
    let threads = threads.clamp(1, num_chunks);
    let next_chunk = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);

    debug!(
        kernel = kernel.name(),
        targets = targets.len(),
        query_length = query.len(),
        threads,
        ?config,
        "searching database in parallel"
    );

    let base_args = kernel_args(&query, &targets, matrix, config);
    let chunks = thread::scope(|s| {
        let handles = (0..threads)
            .map(|_| {
                s.spawn(|| -> Result<Vec<(usize, Vec<RawResult>)>> {
                    let mut local_results = Vec::new();

                    loop {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        // Claim next available chunk
                        let chunk_idx = next_chunk.fetch_add(1, Ordering::Relaxed);
                        if chunk_idx >= num_chunks {
                            break;
                        }

                        let start = chunk_idx * chunk_size;
                        let end = (start + chunk_size).min(targets.len());
                        let args = KernelArgs {
                            targets: &targets[start..end],
                            ..base_args
                        };

                        match run_kernel(kernel, &args) {
                            Ok(raw) => local_results.push((chunk_idx, raw)),
                            Err(err) => {
                                failed.store(true, Ordering::Relaxed);
                                return Err(err);
                            }
                        }
                    }

                    // Chunks are claimed in increasing order, so each thread's list is sorted
                    Ok(local_results)
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect::<Result<Vec<_>>>()
    })?;

    let raw = chunks
        .into_iter()
        .kmerge_by(|a, b| a.0 < b.0)
        .flat_map(|(_, raw)| raw)
        .collect::<Vec<_>>();
    let results = collect_results(raw, query.len(), database.lengths())?;

    debug!(results = results.len(), "parallel search finished");
    Ok(results)
}

/// Aligns a single pair of sequences
pub fn align(
    query: impl AsRef<[u8]>,
    target: impl AsRef<[u8]>,
    score_matrix: &ScoreMatrix,
    config: &SearchConfig,
) -> Result<SearchResult> {
    let query = score_matrix.encode(query)?;
    let target = score_matrix.encode(target)?;
    let kernel = require_kernel(kernel::selected_kernel())?;

    let targets = [&*target];
    let args = kernel_args(&query, &targets, score_matrix, config);
    let raw = run_kernel(kernel, &args)?;

    collect_results(raw, query.len(), &[target.len()])?
        .pop()
        .ok_or(Error::Computation {
            status: Status::INCOMPLETE,
        })
}

fn kernel_args<'a>(
    query: &'a [u8],
    targets: &'a [&'a [u8]],
    matrix: &'a ScoreMatrix,
    config: &SearchConfig,
) -> KernelArgs<'a> {
    KernelArgs {
        query,
        targets,
        gap_open: i32::from(config.gap_open),
        gap_extend: i32::from(config.gap_extend),
        score_matrix: matrix.as_flat(),
        alphabet_size: matrix.size(),
        mode: config.mode,
        algorithm: config.algorithm,
        overflow: config.overflow,
    }
}

fn run_kernel(kernel: &dyn Kernel, args: &KernelArgs<'_>) -> Result<Vec<RawResult>> {
    let mut results = vec![RawResult::default(); args.targets.len()];
    // SAFETY: the kernel was selected for being supported by the running CPU
    let status = unsafe { kernel.run(args, &mut results) };
    if !status.is_ok() {
        return Err(Error::Computation { status });
    }
    Ok(results)
}

fn collect_results(
    raw: Vec<RawResult>,
    query_length: usize,
    target_lengths: &[usize],
) -> Result<Vec<SearchResult>> {
    raw.into_iter()
        .zip(target_lengths)
        .enumerate()
        .map(|(i, (raw, &target_length))| {
            SearchResult::from_raw(i, raw, query_length, target_length)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, Normal};

    use crate::{Algorithm, ConfigError, Mode, Overflow, Reference};

    use super::*;

    fn dna() -> ScoreMatrix {
        ScoreMatrix::new(
            "ACGT",
            &[[2, -1, -1, -1], [-1, 2, -1, -1], [-1, -1, 2, -1], [-1, -1, -1, 2]],
        )
        .unwrap()
    }

    fn full(algorithm: Algorithm) -> SearchConfig {
        SearchConfig {
            mode: Mode::Full,
            algorithm,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_search_order() {
        let database =
            Database::from_sequences(["ACGT", "TTACGTTT", "", "GGGG"], dna()).unwrap();
        let results = database.search("ACGT", &SearchConfig::default()).unwrap();
        assert_eq!(results.len(), database.len());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.target_index(), i);
            assert_eq!(result.query_length(), 4);
            assert_eq!(result.target_length(), database.lengths()[i]);
        }
        assert_eq!(
            results.iter().map(|r| r.score()).collect::<Vec<_>>(),
            [8, 8, 0, 2]
        );
    }

    #[test]
    fn test_score_mode() {
        let database = Database::from_sequences(["TTACGTTT"], dna()).unwrap();
        let result = &database.search("ACGT", &SearchConfig::default()).unwrap()[0];
        assert_eq!(result.score(), 8);
        assert_eq!(result.query_end(), None);
        assert_eq!(result.target_start(), None);
        assert_eq!(result.alignment(), None);
    }

    #[test]
    fn test_local_full() {
        let database = Database::from_sequences(["TTACGTTT"], dna()).unwrap();
        let result = &database.search("ACGT", &full(Algorithm::Sw)).unwrap()[0];
        assert_eq!(result.score(), 8);
        assert_eq!((result.query_start(), result.query_end()), (Some(0), Some(3)));
        assert_eq!((result.target_start(), result.target_end()), (Some(2), Some(5)));
        assert_eq!(result.alignment().as_deref(), Some("MMMM"));
        assert_eq!(result.cigar().as_deref(), Some("4M"));
        assert_eq!(result.identity(), Some(1.0));
        assert_eq!(result.coverage(Reference::Query), Some(1.0));
        assert_eq!(result.coverage(Reference::Target), Some(0.5));
    }

    #[test]
    fn test_global_full() {
        let database = Database::from_sequences(["ACT"], dna()).unwrap();
        let result = &database.search("ACGT", &full(Algorithm::Nw)).unwrap()[0];
        assert_eq!(result.score(), 3);
        assert_eq!(result.alignment().as_deref(), Some("MMIM"));
        assert_eq!(result.cigar().as_deref(), Some("2M1I1M"));
        assert_eq!((result.query_end(), result.target_end()), (Some(3), Some(2)));
        assert_eq!((result.query_start(), result.target_start()), (Some(0), Some(0)));
    }

    #[test]
    fn test_local_without_hit() {
        let mut database = Database::default();
        database.extend(["AAAA", "GGGG"]).unwrap();
        let config = SearchConfig {
            mode: Mode::End,
            ..SearchConfig::default()
        };
        for result in database.search("WWWW", &config).unwrap() {
            assert_eq!(result.score(), 0);
            assert_eq!(result.query_end(), None);
            assert_eq!(result.target_end(), None);
        }
    }

    #[test]
    fn test_invalid_query() {
        let database = Database::from_sequences(["ACGT"], dna()).unwrap();
        assert_eq!(
            database.search("ACXT", &SearchConfig::default()),
            Err(Error::Encoding {
                symbol: 'X',
                position: 2
            })
        );
    }

    #[test]
    fn test_empty_database() {
        let database = Database::new(dna());
        assert_eq!(database.search("ACGT", &SearchConfig::default()), Ok(vec![]));
        assert_eq!(
            database.search_parallel("ACGT", &SearchConfig::default(), 4),
            Ok(vec![])
        );
    }

    #[test]
    fn test_overflow() {
        let huge = 1 << 30;
        let matrix = ScoreMatrix::new("AB", &[[huge, -1], [-1, huge]]).unwrap();
        let database = Database::from_sequences(["AAA"], matrix).unwrap();
        assert_eq!(
            database.search("AAA", &SearchConfig::default()),
            Err(Error::Computation {
                status: Status::OVERFLOW
            })
        );
    }

    #[test]
    fn test_reverse_reorders_results() {
        let mut database = Database::from_sequences(["ACGT", "GG", "TTTTTT"], dna()).unwrap();
        let config = full(Algorithm::Hw);
        let before = database.search("ACGT", &config).unwrap();

        database.reverse();
        let reversed = database.search("ACGT", &config).unwrap();
        for (a, b) in before.iter().zip(reversed.iter().rev()) {
            assert_eq!(a.score(), b.score());
            assert_eq!(a.alignment(), b.alignment());
        }
        assert_eq!(reversed[0].target_index(), 0);

        database.reverse();
        assert_eq!(database.search("ACGT", &config).unwrap(), before);
    }

    #[test]
    fn test_align() {
        let config = full(Algorithm::Hw);
        let result = align("ACG", "TTACGTT", &dna(), &config).unwrap();
        assert_eq!(result.score(), 6);
        assert_eq!(result.target_index(), 0);
        assert_eq!((result.target_start(), result.target_end()), (Some(2), Some(4)));
        assert_eq!(result.cigar().as_deref(), Some("3M"));

        assert!(matches!(
            align("ACG", "TTNTT", &dna(), &config),
            Err(Error::Encoding { position: 2, .. })
        ));
    }

    #[test]
    fn test_parse_error_before_search() {
        let algorithm = "smith-waterman".parse::<Algorithm>();
        assert_eq!(
            algorithm,
            Err(Error::Configuration(ConfigError::UnknownAlgorithm(
                "smith-waterman".to_string()
            )))
        );
    }

    #[test]
    fn test_thread_count_above_chunk_count() {
        let mut rng = StdRng::seed_from_u64(2);
        let database = random_database(&mut rng, 300);
        let query = database.get(0).unwrap();
        let config = SearchConfig::default();

        let expected = database.search(&query, &config).unwrap();
        for threads in [0, 2, usize::MAX] {
            assert_eq!(
                database.search_parallel(&query, &config, threads).unwrap(),
                expected,
                "{threads} threads"
            );
        }
    }

    #[test]
    fn test_require_kernel() {
        assert_eq!(require_kernel(None).err(), Some(Error::RuntimeUnavailable));
        if let Some(kernel) = kernel::selected_kernel() {
            assert_eq!(require_kernel(Some(kernel)).unwrap().name(), kernel.name());
        }
    }

    #[cfg(not(any(
        all(target_arch = "x86_64", any(feature = "avx2", feature = "sse4", feature = "sse2")),
        all(target_arch = "aarch64", feature = "neon")
    )))]
    #[test]
    fn test_no_kernel_compiled() {
        let database = Database::from_sequences(["ACGT"], dna()).unwrap();
        let config = SearchConfig::default();
        assert_eq!(
            database.search("ACGT", &config),
            Err(Error::RuntimeUnavailable)
        );
        assert_eq!(
            database.search_parallel("ACGT", &config, 2),
            Err(Error::RuntimeUnavailable)
        );
        assert_eq!(
            align("ACGT", "ACGT", &dna(), &config),
            Err(Error::RuntimeUnavailable)
        );
    }

    fn random_database(rng: &mut StdRng, count: usize) -> Database {
        let matrix = ScoreMatrix::aa();
        let alphabet = matrix.alphabet().as_bytes().to_vec();
        let lengths = Normal::<f64>::new(80.0, 40.0).unwrap();

        let sequences = (0..count)
            .map(|_| {
                let len = lengths.sample(&mut *rng).max(0.0) as usize;
                (0..len)
                    .map(|_| alphabet[rng.random_range(0..20)])
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        Database::from_sequences(sequences, matrix).unwrap()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(1);
        let database = random_database(&mut rng, 600);
        let query = database.get(17).unwrap();

        for algorithm in [Algorithm::Nw, Algorithm::Sw] {
            for overflow in [Overflow::Simple, Overflow::Buckets] {
                let config = SearchConfig {
                    mode: Mode::Full,
                    algorithm,
                    overflow,
                    ..SearchConfig::default()
                };
                let expected = database.search(&query, &config).unwrap();
                assert_eq!(expected[17].score(), {
                    let matrix = database.score_matrix();
                    query
                        .bytes()
                        .map(|c| matrix.score(c, c).unwrap())
                        .sum::<i32>()
                });

                for threads in [1, 3, 8, 5000] {
                    assert_eq!(
                        database.search_parallel(&query, &config, threads).unwrap(),
                        expected,
                        "{threads} threads"
                    );
                }
            }
        }
    }
}
