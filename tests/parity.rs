use rand::RngCore;
use rand::SeedableRng;
use torus_life::engine::{FrontierEngine, ReferenceEngine};
use torus_life::{EngineBackend, EngineConfig, LifeEngine, build_engine};

fn random_soup(size: u32, density: f64, seed: u64) -> Vec<u32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let threshold = (u64::MAX as f64 * density) as u64;
    (0..size * size)
        .filter(|_| rng.next_u64() <= threshold)
        .collect()
}

fn assert_same_history(a: &mut dyn LifeEngine, b: &mut dyn LifeEngine, steps: u64, label: &str) {
    for generation in 1..=steps {
        assert_eq!(a.step(), b.step(), "{label}: diff mismatch at generation {generation}");
        assert_eq!(a.population(), b.population(), "{label}: population mismatch");
        assert_eq!(a.population(), a.alive_cells().len(), "{label}: stale population");
        assert_eq!(b.population(), b.alive_cells().len(), "{label}: stale population");
        assert_eq!(a.frontier_len(), b.frontier_len(), "{label}: frontier mismatch");
    }
    assert_eq!(a.alive_cells(), b.alive_cells(), "{label}: live-set mismatch");
}

fn run_parity_case(size: u32, density: f64, steps: u64, seed: u64) {
    let soup = random_soup(size, density, seed);
    let mut reference = ReferenceEngine::new(size, soup.iter().copied()).unwrap();
    let mut frontier = FrontierEngine::with_config(
        size,
        soup.iter().copied(),
        &EngineConfig::default().thread_count(1),
    )
    .unwrap();
    assert_same_history(
        &mut reference,
        &mut frontier,
        steps,
        &format!("size {size} density {density} seed {seed:#x}"),
    );
}

#[test]
fn parity_sparse_mid_dense() {
    run_parity_case(96, 0.10, 40, 0xA1);
    run_parity_case(96, 0.42, 40, 0xB2);
    run_parity_case(96, 0.75, 40, 0xC3);
}

#[test]
fn parity_odd_and_tiny_grids() {
    for size in [1, 2, 3, 5, 17, 31] {
        run_parity_case(size, 0.4, 30, 0xD4 + u64::from(size));
    }
}

#[test]
fn parallel_evaluation_matches_serial() {
    let size = 160;
    let soup = random_soup(size, 0.35, 0xE5);
    let serial = EngineConfig::default().thread_count(1);
    let parallel = EngineConfig::default().thread_count(4).parallel_threshold(1);
    let mut a = FrontierEngine::with_config(size, soup.iter().copied(), &serial).unwrap();
    let mut b = FrontierEngine::with_config(size, soup.iter().copied(), &parallel).unwrap();
    assert_eq!(b.thread_count(), 4);
    assert_same_history(&mut a, &mut b, 60, "serial vs parallel");
}

#[test]
fn fallback_engine_is_indistinguishable() {
    let size = 64;
    let soup = random_soup(size, 0.3, 0xF6);
    let preferred = EngineConfig::default()
        .backend(EngineBackend::Frontier)
        .thread_count(1);
    let constrained = preferred.clone().max_dense_cells(1_000);

    let mut accelerated = build_engine(&preferred, size, &soup).unwrap();
    let mut fallback = build_engine(&constrained, size, &soup).unwrap();
    assert_eq!(accelerated.backend(), EngineBackend::Frontier);
    assert_eq!(fallback.backend(), EngineBackend::Reference);
    assert_same_history(accelerated.as_mut(), fallback.as_mut(), 50, "fallback");
}
