//! Incremental B3/S23 engines for a toroidal grid and the contract they share.
//!
//! Both engines keep a frontier of cells whose neighbour count may have
//! moved since the last generation and evaluate only those. Frontier order is
//! insertion order, so two engines fed the same seed report the same diffs
//! element for element.

mod frontier;
mod frontier_set;
mod reference;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::topology;

pub use frontier::{AliveBits, FrontierEngine};
pub use reference::ReferenceEngine;

const BACKEND_ENV: &str = "TORUS_LIFE_BACKEND";
const DEFAULT_PARALLEL_THRESHOLD: usize = 4_096;
const DEFAULT_MAX_DENSE_CELLS: u64 = 1 << 28;

/// Cells that changed state in one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationDiff {
    pub born: Vec<u32>,
    pub died: Vec<u32>,
}

impl GenerationDiff {
    pub fn is_empty(&self) -> bool {
        self.born.is_empty() && self.died.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    Unchanged,
    Born,
    Died,
}

/// Apply the classic rule to one cell.
#[inline(always)]
pub(crate) fn transition(was_alive: bool, alive_neighbors: u8) -> Transition {
    match alive_neighbors {
        2 => Transition::Unchanged,
        3 if !was_alive => Transition::Born,
        3 => Transition::Unchanged,
        _ if was_alive => Transition::Died,
        _ => Transition::Unchanged,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineBackend {
    /// Hash-set universe, always serial.
    Reference,
    /// Packed-bitset universe with parallel evaluation of large frontiers.
    Frontier,
}

impl EngineBackend {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "reference" => Some(Self::Reference),
            "frontier" | "accelerated" => Some(Self::Frontier),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("grid size must be at least 1")]
    EmptyGrid,
    #[error("grid size {size} overflows the u32 cell index space")]
    SizeTooLarge { size: u32 },
    #[error("grid of {cells} cells exceeds the dense universe limit of {limit}")]
    DenseLimitExceeded { cells: u64, limit: u64 },
    #[error("failed to build evaluation thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl EngineError {
    /// Errors the reference engine does not suffer from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DenseLimitExceeded { .. } | Self::ThreadPool(_))
    }
}

/// Configuration for engine construction.
///
/// Use `EngineConfig::default()` for auto-detected defaults, or adjust
/// individual knobs via the builder methods.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Engine implementation.
    /// `None` reads `TORUS_LIFE_BACKEND` (`reference` or `frontier`) and
    /// falls back to `Frontier`.
    pub backend: Option<EngineBackend>,
    /// Threads in the frontier engine's evaluation pool.
    /// `None` means physical core count.
    pub thread_count: Option<usize>,
    /// Frontier length at which evaluation goes parallel.
    pub parallel_threshold: usize,
    /// Largest grid, in cells, the frontier engine will allocate a bitset for.
    pub max_dense_cells: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: None,
            thread_count: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            max_dense_cells: DEFAULT_MAX_DENSE_CELLS,
        }
    }
}

impl EngineConfig {
    /// Force a specific engine implementation.
    pub fn backend(mut self, backend: EngineBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set an explicit thread count for the evaluation pool.
    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = Some(n.max(1));
        self
    }

    pub fn parallel_threshold(mut self, cells: usize) -> Self {
        self.parallel_threshold = cells.max(1);
        self
    }

    pub fn max_dense_cells(mut self, cells: u64) -> Self {
        self.max_dense_cells = cells;
        self
    }

    /// Resolve the backend, consulting the environment when unset.
    pub fn resolved_backend(&self) -> EngineBackend {
        if let Some(backend) = self.backend {
            return backend;
        }
        std::env::var(BACKEND_ENV)
            .ok()
            .and_then(|v| EngineBackend::parse(&v))
            .unwrap_or(EngineBackend::Frontier)
    }

    pub(crate) fn resolved_thread_count(&self) -> usize {
        self.thread_count
            .unwrap_or_else(num_cpus::get_physical)
            .max(1)
    }
}

/// A generation-at-a-time Life engine.
pub trait LifeEngine: Send {
    fn backend(&self) -> EngineBackend;

    /// Grid side length.
    fn size(&self) -> u32;

    /// Advance one generation and report what changed.
    fn step(&mut self) -> GenerationDiff;

    fn generation(&self) -> u64;

    fn population(&self) -> usize;

    fn is_alive(&self, index: u32) -> bool;

    /// Alive cells in ascending index order.
    fn alive_cells(&self) -> Vec<u32>;

    /// Cells queued for evaluation on the next `step`.
    fn frontier_len(&self) -> usize;

    /// Cells evaluated by the most recent `step`.
    fn last_evaluated(&self) -> usize;
}

/// Validate a grid side length, returning its cell count.
pub(crate) fn grid_cells(size: u32) -> Result<u64, EngineError> {
    if size == 0 {
        return Err(EngineError::EmptyGrid);
    }
    topology::cell_count(size).ok_or(EngineError::SizeTooLarge { size })
}

/// Drop initial cells that fall outside the grid.
pub(crate) fn accept_initial(index: u32, cells: u64) -> bool {
    let in_range = u64::from(index) < cells;
    if !in_range {
        warn!(index, cells, "ignoring initial cell outside the grid");
    }
    in_range
}

/// Construct the configured engine, falling back to the reference engine when
/// the frontier engine cannot be built.
pub fn build_engine(
    config: &EngineConfig,
    size: u32,
    initial_alive: &[u32],
) -> Result<Box<dyn LifeEngine>, EngineError> {
    match config.resolved_backend() {
        EngineBackend::Reference => {
            let engine = ReferenceEngine::new(size, initial_alive.iter().copied())?;
            info!(size, population = engine.population(), "reference engine ready");
            Ok(Box::new(engine))
        }
        EngineBackend::Frontier => {
            match FrontierEngine::with_config(size, initial_alive.iter().copied(), config) {
                Ok(engine) => {
                    info!(size, population = engine.population(), "frontier engine ready");
                    Ok(Box::new(engine))
                }
                Err(err) if err.is_recoverable() => {
                    warn!(%err, "frontier engine unavailable; falling back to reference engine");
                    let engine = ReferenceEngine::new(size, initial_alive.iter().copied())?;
                    Ok(Box::new(engine))
                }
                Err(err) => Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EngineBackend, EngineConfig, EngineError, Transition, build_engine, grid_cells,
        transition,
    };

    #[test]
    fn rule_table_matches_b3_s23() {
        for count in 0..=8u8 {
            let from_dead = transition(false, count);
            let from_live = transition(true, count);
            if count == 3 {
                assert_eq!(from_dead, Transition::Born);
            } else {
                assert_eq!(from_dead, Transition::Unchanged, "dead with {count}");
            }
            if count == 2 || count == 3 {
                assert_eq!(from_live, Transition::Unchanged);
            } else {
                assert_eq!(from_live, Transition::Died, "live with {count}");
            }
        }
    }

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(EngineBackend::parse("Reference"), Some(EngineBackend::Reference));
        assert_eq!(EngineBackend::parse(" frontier "), Some(EngineBackend::Frontier));
        assert_eq!(EngineBackend::parse("accelerated"), Some(EngineBackend::Frontier));
        assert_eq!(EngineBackend::parse("gpu"), None);
    }

    #[test]
    fn grid_cells_rejects_degenerate_sizes() {
        assert!(matches!(grid_cells(0), Err(EngineError::EmptyGrid)));
        assert!(matches!(
            grid_cells(70_000),
            Err(EngineError::SizeTooLarge { size: 70_000 })
        ));
        assert_eq!(grid_cells(3).unwrap(), 9);
    }

    #[test]
    fn explicit_backend_is_honoured() {
        let config = EngineConfig::default().backend(EngineBackend::Reference);
        let engine = build_engine(&config, 10, &[1, 2, 3]).unwrap();
        assert_eq!(engine.backend(), EngineBackend::Reference);
        assert_eq!(engine.population(), 3);
    }

    #[test]
    fn dense_limit_falls_back_to_reference() {
        let config = EngineConfig::default()
            .backend(EngineBackend::Frontier)
            .max_dense_cells(50);
        let engine = build_engine(&config, 10, &[11, 12, 13]).unwrap();
        assert_eq!(engine.backend(), EngineBackend::Reference);
        assert_eq!(engine.population(), 3);
    }

    #[test]
    fn unbuildable_grid_is_reported() {
        let config = EngineConfig::default().backend(EngineBackend::Frontier);
        assert!(matches!(
            build_engine(&config, 0, &[]),
            Err(EngineError::EmptyGrid)
        ));
    }

    #[test]
    fn builder_clamps_thread_count() {
        let config = EngineConfig::default().thread_count(0);
        assert_eq!(config.thread_count, Some(1));
        assert_eq!(config.resolved_thread_count(), 1);
    }
}
