use std::time::Instant;
use torus_life::{EngineBackend, EngineConfig, LifeEngine, Pattern, Preset, build_engine};

/// Gliders and an R-pentomino spread across the grid. The live region stays
/// the same size however large the grid is.
fn sparse_seed(size: u32) -> Vec<u32> {
    let glider = Pattern::preset(Preset::Glider);
    let r_pentomino = Pattern::preset(Preset::RPentomino);
    let mut cells = r_pentomino.cells_at(size / 2, size / 2, size);
    for k in 1..=4 {
        let at = size * k / 5;
        cells.extend(glider.cells_at(at, at, size));
    }
    cells
}

fn bench(backend: EngineBackend, size: u32, iterations: u64) -> (f64, usize, usize) {
    let config = EngineConfig::default().backend(backend);
    let mut engine: Box<dyn LifeEngine> = match build_engine(&config, size, &sparse_seed(size)) {
        Ok(engine) => engine,
        Err(err) => panic!("cannot build {backend:?} engine for {size}x{size}: {err}"),
    };

    let start = Instant::now();
    let mut evaluated = 0usize;
    for _ in 0..iterations {
        std::hint::black_box(engine.step());
        evaluated += engine.last_evaluated();
    }
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;
    (total_ms, evaluated / iterations as usize, engine.population())
}

fn main() {
    let scales: &[(u32, u64)] = &[
        (256, 500),
        (1024, 500),
        (4096, 500),
        (16384, 200), // 32 MiB of bitset
    ];

    println!(
        "{:<12} {:<10} {:>8} {:>10} {:>12} {:>10}",
        "Engine", "Grid", "Iters", "Evaluated", "Total(ms)", "Avg(ms)"
    );
    println!("{}", "-".repeat(67));

    for &(size, iters) in scales {
        for backend in [EngineBackend::Reference, EngineBackend::Frontier] {
            let (total_ms, evaluated, _pop) = bench(backend, size, iters);
            let avg_ms = total_ms / iters as f64;
            println!(
                "{:<12} {:<10} {:>8} {:>10} {:>12.1} {:>10.4}",
                format!("{backend:?}"),
                format!("{}x{}", size, size),
                iters,
                evaluated,
                total_ms,
                avg_ms
            );
        }
    }
}
