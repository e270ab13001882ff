//! Frontier engine: packed-bitset universe with adaptive parallel evaluation.
//!
//! Evaluation reads the bitset immutably, so a frozen frontier can be split
//! across the rayon pool. Results land in a per-cell transition buffer in
//! frontier order and are merged serially, which keeps the diff identical to
//! the serial path. Small frontiers never leave the calling thread.

use rayon::prelude::*;
use tracing::debug;

use super::frontier_set::FrontierSet;
use super::{
    EngineBackend, EngineConfig, EngineError, GenerationDiff, LifeEngine, Transition,
    accept_initial, grid_cells, transition,
};
use crate::topology::neighbors;

/// Minimum cells handed to one rayon task.
const PARALLEL_CHUNK_MIN: usize = 1_024;

/// Dense alive set, one bit per cell.
#[derive(Clone, Debug)]
pub struct AliveBits {
    words: Vec<u64>,
    population: usize,
}

impl AliveBits {
    pub fn with_cells(cells: usize) -> Self {
        Self {
            words: vec![0; cells.div_ceil(64)],
            population: 0,
        }
    }

    #[inline(always)]
    pub fn contains(&self, index: u32) -> bool {
        let i = index as usize;
        (self.words[i >> 6] >> (i & 63)) & 1 != 0
    }

    /// Returns `true` if the bit was newly set.
    #[inline(always)]
    pub fn insert(&mut self, index: u32) -> bool {
        let i = index as usize;
        let bit = 1u64 << (i & 63);
        let word = &mut self.words[i >> 6];
        let fresh = *word & bit == 0;
        *word |= bit;
        if fresh {
            self.population += 1;
        }
        fresh
    }

    /// Returns `true` if the bit was previously set.
    #[inline(always)]
    pub fn remove(&mut self, index: u32) -> bool {
        let i = index as usize;
        let bit = 1u64 << (i & 63);
        let word = &mut self.words[i >> 6];
        let was = *word & bit != 0;
        *word &= !bit;
        if was {
            self.population -= 1;
        }
        was
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.population
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.population == 0
    }

    pub fn for_each<F: FnMut(u32)>(&self, mut f: F) {
        for (word_idx, &word) in self.words.iter().enumerate() {
            let mut bits = word;
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                f(((word_idx << 6) + bit) as u32);
                bits &= bits - 1;
            }
        }
    }
}

#[inline(always)]
fn evaluate(alive: &AliveBits, size: u32, index: u32) -> Transition {
    let count = neighbors(index, size)
        .iter()
        .filter(|&&n| alive.contains(n))
        .count() as u8;
    transition(alive.contains(index), count)
}

pub struct FrontierEngine {
    size: u32,
    cells: u64,
    alive: AliveBits,
    /// Cells to evaluate on the next step.
    current: FrontierSet,
    /// Scratch frontier filled while `current` is evaluated; swapped in after.
    next: FrontierSet,
    transitions: Vec<Transition>,
    /// `None` when configured for a single thread.
    pool: Option<rayon::ThreadPool>,
    parallel_threshold: usize,
    generation: u64,
    last_evaluated: usize,
}

impl FrontierEngine {
    pub fn new<I>(size: u32, initial_alive: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = u32>,
    {
        Self::with_config(size, initial_alive, &EngineConfig::default())
    }

    /// Create a frontier engine with explicit configuration.
    pub fn with_config<I>(
        size: u32,
        initial_alive: I,
        config: &EngineConfig,
    ) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = u32>,
    {
        let cells = grid_cells(size)?;
        if cells > config.max_dense_cells {
            return Err(EngineError::DenseLimitExceeded {
                cells,
                limit: config.max_dense_cells,
            });
        }

        let threads = config.resolved_thread_count();
        let pool = if threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("torus-life-eval-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        debug!(size, threads, "frontier engine pool configured");

        let mut engine = Self {
            size,
            cells,
            alive: AliveBits::with_cells(cells as usize),
            current: FrontierSet::new(),
            next: FrontierSet::new(),
            transitions: Vec::new(),
            pool,
            parallel_threshold: config.parallel_threshold,
            generation: 0,
            last_evaluated: 0,
        };
        for index in initial_alive {
            if accept_initial(index, cells) && engine.alive.insert(index) {
                engine.current.insert(index);
                for n in neighbors(index, size) {
                    engine.current.insert(n);
                }
            }
        }
        Ok(engine)
    }

    pub fn alive(&self) -> &AliveBits {
        &self.alive
    }

    /// Threads available for parallel evaluation.
    pub fn thread_count(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, rayon::ThreadPool::current_num_threads)
    }

    fn evaluate_frontier(&mut self) {
        let size = self.size;
        let alive = &self.alive;
        let frozen = self.current.keys();
        let transitions = &mut self.transitions;
        let threshold = self.parallel_threshold;

        match self.pool.as_ref().filter(|_| frozen.len() >= threshold) {
            Some(pool) => pool.install(|| {
                frozen
                    .par_iter()
                    .with_min_len(PARALLEL_CHUNK_MIN)
                    .map(|&index| evaluate(alive, size, index))
                    .collect_into_vec(transitions);
            }),
            None => {
                transitions.clear();
                transitions.extend(frozen.iter().map(|&index| evaluate(alive, size, index)));
            }
        }
    }
}

impl LifeEngine for FrontierEngine {
    fn backend(&self) -> EngineBackend {
        EngineBackend::Frontier
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn step(&mut self) -> GenerationDiff {
        self.evaluate_frontier();

        let size = self.size;
        let next = &mut self.next;
        next.clear();
        next.reserve_for(self.current.len());

        let mut diff = GenerationDiff::default();
        for (&index, &change) in self.current.keys().iter().zip(&self.transitions) {
            match change {
                Transition::Unchanged => continue,
                Transition::Born => diff.born.push(index),
                Transition::Died => diff.died.push(index),
            }
            next.insert(index);
            for n in neighbors(index, size) {
                next.insert(n);
            }
        }

        for &index in &diff.born {
            self.alive.insert(index);
        }
        for &index in &diff.died {
            self.alive.remove(index);
        }

        self.last_evaluated = self.current.len();
        std::mem::swap(&mut self.current, &mut self.next);
        self.generation += 1;
        diff
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn population(&self) -> usize {
        self.alive.len()
    }

    fn is_alive(&self, index: u32) -> bool {
        u64::from(index) < self.cells && self.alive.contains(index)
    }

    fn alive_cells(&self) -> Vec<u32> {
        let mut cells = Vec::with_capacity(self.alive.len());
        self.alive.for_each(|index| cells.push(index));
        cells
    }

    fn frontier_len(&self) -> usize {
        self.current.len()
    }

    fn last_evaluated(&self) -> usize {
        self.last_evaluated
    }
}
