use std::collections::HashSet;

use rand::RngCore;
use rand::SeedableRng;
use torus_life::topology::{index_of, neighbors};
use torus_life::{EngineBackend, EngineConfig, GenerationDiff, LifeEngine, build_engine};

const BACKENDS: [EngineBackend; 2] = [EngineBackend::Reference, EngineBackend::Frontier];

fn build(backend: EngineBackend, size: u32, seed: &[u32]) -> Box<dyn LifeEngine> {
    let config = EngineConfig::default().backend(backend).thread_count(1);
    build_engine(&config, size, seed).unwrap()
}

fn random_soup(size: u32, density: f64, seed: u64) -> Vec<u32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let threshold = (u64::MAX as f64 * density) as u64;
    (0..size * size)
        .filter(|_| rng.next_u64() <= threshold)
        .collect()
}

/// Full-grid toroidal step, independent of any frontier bookkeeping.
fn step_naive(alive: &HashSet<u32>, size: u32) -> HashSet<u32> {
    (0..size * size)
        .filter(|&index| {
            let count = neighbors(index, size)
                .iter()
                .filter(|&&n| alive.contains(&n))
                .count();
            count == 3 || (count == 2 && alive.contains(&index))
        })
        .collect()
}

fn alive_set(engine: &dyn LifeEngine) -> HashSet<u32> {
    engine.alive_cells().into_iter().collect()
}

#[test]
fn single_cell_dies() {
    for backend in BACKENDS {
        let mut engine = build(backend, 10, &[55]);
        assert_eq!(
            engine.step(),
            GenerationDiff {
                born: vec![],
                died: vec![55],
            }
        );
        assert_eq!(engine.population(), 0);
        assert!(engine.step().is_empty());
        assert_eq!(engine.frontier_len(), 0);
    }
}

#[test]
fn block_is_a_still_life() {
    for backend in BACKENDS {
        let mut engine = build(backend, 10, &[44, 45, 54, 55]);
        assert!(engine.step().is_empty());
        assert_eq!(engine.last_evaluated(), 16);
        assert!(engine.step().is_empty());
        assert_eq!(engine.last_evaluated(), 0);
        assert_eq!(engine.alive_cells(), vec![44, 45, 54, 55]);
    }
}

#[test]
fn blinker_oscillates_with_period_two() {
    for backend in BACKENDS {
        let mut engine = build(backend, 10, &[44, 45, 46]);
        assert_eq!(
            engine.step(),
            GenerationDiff {
                born: vec![35, 55],
                died: vec![44, 46],
            }
        );
        assert_eq!(engine.alive_cells(), vec![35, 45, 55]);
        let back = engine.step();
        assert_eq!(back.born.len(), 2);
        assert_eq!(back.died.len(), 2);
        assert_eq!(engine.alive_cells(), vec![44, 45, 46]);
        assert_eq!(engine.generation(), 2);
    }
}

#[test]
fn corners_wrap_into_a_block() {
    // 99, 9 and 90 are the NW, W and N neighbours of cell 0.
    for backend in BACKENDS {
        let mut engine = build(backend, 10, &[99, 9, 90]);
        assert_eq!(
            engine.step(),
            GenerationDiff {
                born: vec![0],
                died: vec![],
            }
        );
        assert_eq!(engine.alive_cells(), vec![0, 9, 90, 99]);
        assert!(engine.step().is_empty());
    }
}

#[test]
fn blinker_straddling_the_seam_stays_on_the_torus() {
    // Horizontal blinker through (9, 9), (9, 0), (9, 1).
    for backend in BACKENDS {
        let mut engine = build(backend, 10, &[99, 90, 91]);
        engine.step();
        assert_eq!(engine.alive_cells(), vec![0, 80, 90]);
        engine.step();
        assert_eq!(engine.alive_cells(), vec![90, 91, 99]);
    }
}

#[test]
fn work_tracks_activity_not_grid_area() {
    let size = 1_024;
    let mid = size / 2;
    let block = [
        index_of(mid, mid, size),
        index_of(mid, mid + 1, size),
        index_of(mid + 1, mid, size),
        index_of(mid + 1, mid + 1, size),
    ];
    let blinker = [
        index_of(10, 10, size),
        index_of(10, 11, size),
        index_of(10, 12, size),
    ];
    let seed: Vec<u32> = block.iter().chain(&blinker).copied().collect();

    for backend in BACKENDS {
        let mut engine = build(backend, size, &seed);
        for generation in 0..20 {
            let queued = engine.frontier_len();
            engine.step();
            assert_eq!(engine.last_evaluated(), queued);
            assert!(
                engine.last_evaluated() <= 31,
                "{backend:?} evaluated {} cells at generation {generation}",
                engine.last_evaluated()
            );
        }
        assert_eq!(engine.population(), 7);
    }
}

#[test]
fn born_and_died_are_disjoint_and_consistent() {
    let size = 48;
    let seed = random_soup(size, 0.3, 0xD15);
    for backend in BACKENDS {
        let mut engine = build(backend, size, &seed);
        for _ in 0..60 {
            let before = alive_set(engine.as_ref());
            let diff = engine.step();
            let born: HashSet<u32> = diff.born.iter().copied().collect();
            let died: HashSet<u32> = diff.died.iter().copied().collect();
            assert_eq!(born.len(), diff.born.len(), "born has duplicates");
            assert_eq!(died.len(), diff.died.len(), "died has duplicates");
            assert!(born.is_disjoint(&died));
            assert!(born.is_disjoint(&before));
            assert!(died.is_subset(&before));

            let mut expected = before;
            expected.extend(&born);
            expected.retain(|i| !died.contains(i));
            assert_eq!(alive_set(engine.as_ref()), expected);
        }
    }
}

#[test]
fn matches_naive_full_grid_step() {
    for (size, density, seed) in [(16, 0.35, 0x11), (37, 0.2, 0x22), (64, 0.42, 0x33)] {
        let soup = random_soup(size, density, seed);
        for backend in BACKENDS {
            let mut engine = build(backend, size, &soup);
            let mut expected: HashSet<u32> = soup.iter().copied().collect();
            for generation in 1..=40 {
                engine.step();
                expected = step_naive(&expected, size);
                assert_eq!(
                    alive_set(engine.as_ref()),
                    expected,
                    "{backend:?} diverged at generation {generation} (size {size})"
                );
                assert_eq!(engine.population(), expected.len());
            }
        }
    }
}

#[test]
fn same_seed_gives_same_diffs() {
    let soup = random_soup(40, 0.25, 0xFEED);
    for backend in BACKENDS {
        let mut a = build(backend, 40, &soup);
        let mut b = build(backend, 40, &soup);
        for _ in 0..50 {
            assert_eq!(a.step(), b.step());
        }
    }
}

#[test]
fn duplicate_and_out_of_range_seed_cells_are_dropped() {
    for backend in BACKENDS {
        let engine = build(backend, 10, &[5, 5, 100, 250]);
        assert_eq!(engine.alive_cells(), vec![5]);
        assert_eq!(engine.frontier_len(), 9);
    }
}

#[test]
fn one_by_one_grid_counts_itself_eight_times() {
    // Every neighbour of the only cell is the cell itself.
    for backend in BACKENDS {
        let mut engine = build(backend, 1, &[0]);
        assert_eq!(
            engine.step(),
            GenerationDiff {
                born: vec![],
                died: vec![0],
            }
        );
    }
}
