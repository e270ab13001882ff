#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use rand::RngCore;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use torus_life::{
    DisplaySurface, DisplayUpdate, EngineBackend, EngineConfig, Governor, GovernorConfig,
    GovernorStatus, Pattern, Preset, connect,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SIZE: u32 = 256;
const DEFAULT_FRAMES: u64 = 600;
const DEFAULT_DENSITY: f64 = 0.25;
const STATUS_INTERVAL: u64 = 60;

struct MainArgs {
    size: u32,
    frames: u64,
    density: f64,
    config: EngineConfig,
}

fn parse_args() -> MainArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = MainArgs {
        size: DEFAULT_SIZE,
        frames: DEFAULT_FRAMES,
        density: DEFAULT_DENSITY,
        config: EngineConfig::default(),
    };
    let next_arg = |i: usize, flag: &str| -> &str {
        args.get(i)
            .map(String::as_str)
            .unwrap_or_else(|| panic!("{flag} requires a value"))
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--size" => {
                i += 1;
                parsed.size = next_arg(i, "--size")
                    .parse()
                    .expect("--size requires a positive integer");
            }
            "--frames" => {
                i += 1;
                parsed.frames = next_arg(i, "--frames")
                    .parse()
                    .expect("--frames requires a positive integer");
            }
            "--density" => {
                i += 1;
                parsed.density = next_arg(i, "--density")
                    .parse()
                    .expect("--density requires a number between 0 and 1");
            }
            "--backend" => {
                i += 1;
                let name = next_arg(i, "--backend");
                let backend = EngineBackend::parse(name).unwrap_or_else(|| {
                    panic!("unknown backend: {name} (expected reference or frontier)")
                });
                parsed.config = parsed.config.backend(backend);
            }
            "--threads" => {
                i += 1;
                let n: usize = next_arg(i, "--threads")
                    .parse()
                    .expect("--threads requires a positive integer");
                parsed.config = parsed.config.thread_count(n);
            }
            other => panic!(
                "unknown argument: {other}\nusage: torus-life [--size N] [--frames F] [--density D] [--backend reference|frontier] [--threads N]"
            ),
        }
        i += 1;
    }
    parsed
}

/// Counts frames and logs a status line every second of playback.
#[derive(Default)]
struct LogDisplay {
    frames: u64,
    patched: u64,
    redrawn: u64,
}

impl DisplaySurface for LogDisplay {
    fn update_display(&mut self, update: DisplayUpdate<'_>) {
        self.frames += 1;
        match (update.born, update.died) {
            (Some(_), Some(_)) => self.patched += 1,
            _ if update.did_change => self.redrawn += 1,
            _ => {}
        }
    }

    fn report_status(&mut self, status: &GovernorStatus) {
        if self.frames % STATUS_INTERVAL == 0 {
            info!(
                frame = self.frames,
                generation = status.generation,
                population = status.population,
                buffered = status.buffered,
                cycles_per_render = status.cycles_per_render,
                "status"
            );
        }
    }
}

fn seed_random_soup<T, D>(governor: &mut Governor<T, D>, size: u32, density: f64)
where
    T: torus_life::BatchTransport,
    D: DisplaySurface,
{
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED_1234_ABCD_EF01);
    let threshold = (u64::MAX as f64 * density.clamp(0.0, 1.0)) as u64;
    let cells = u64::from(size) * u64::from(size);
    let seeded: Vec<u32> = (0..cells)
        .filter(|_| rng.next_u64() <= threshold)
        .map(|i| i as u32)
        .collect();
    governor.place_pattern(&seeded, false);
    // Something that moves, so a sparse soup is never static.
    governor.place_pattern_at(&Pattern::preset(Preset::Glider), size / 2, size / 2, false);
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args = parse_args();
    let config = GovernorConfig::default();
    let frame_budget = config.frame_budget();
    let mut governor = Governor::with_config(
        args.size,
        connect(args.config),
        LogDisplay::default(),
        config,
    );
    seed_random_soup(&mut governor, args.size, args.density);
    let initial_population = governor.alive().len();
    governor.play();

    let start = Instant::now();
    for frame in 0..args.frames {
        let deadline = start + frame_budget * (frame as u32 + 1);
        governor.tick();
        if governor.fault().is_some() {
            break;
        }
        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
    }
    let elapsed = start.elapsed();
    governor.terminate();

    let display = governor.display();
    let generations = governor.generation();
    let gps = generations as f64 / elapsed.max(Duration::from_millis(1)).as_secs_f64();
    println!("\n--- Summary ({} frames, {}x{} torus) ---", display.frames, args.size, args.size);
    if let Some(reason) = governor.fault() {
        println!("Simulation faulted: {reason}");
    }
    println!("Population: {initial_population} -> {}", governor.alive().len());
    println!("Generations: {generations} ({gps:.2} gen/s)");
    println!("Frames: {} patched, {} redrawn", display.patched, display.redrawn);
    println!(
        "Final speed: {} frames per generation ({:.2} gen/s target)",
        governor.cycles_per_render(),
        governor.generations_per_second()
    );
}
