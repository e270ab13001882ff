//! Straightforward hash-set engine. Serial, no tuning knobs.

use std::collections::HashSet;

use super::{
    EngineBackend, EngineError, GenerationDiff, LifeEngine, Transition, accept_initial,
    grid_cells, transition,
};
use crate::topology::neighbors;

pub struct ReferenceEngine {
    size: u32,
    alive: HashSet<u32>,
    /// Next generation's frontier; `queued` mirrors it for dedup.
    frontier: Vec<u32>,
    queued: HashSet<u32>,
    generation: u64,
    last_evaluated: usize,
}

impl ReferenceEngine {
    pub fn new<I>(size: u32, initial_alive: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = u32>,
    {
        let cells = grid_cells(size)?;
        let mut engine = Self {
            size,
            alive: HashSet::new(),
            frontier: Vec::new(),
            queued: HashSet::new(),
            generation: 0,
            last_evaluated: 0,
        };
        for index in initial_alive {
            if accept_initial(index, cells) && engine.alive.insert(index) {
                engine.enqueue_with_neighbors(index);
            }
        }
        Ok(engine)
    }

    fn enqueue(&mut self, index: u32) {
        if self.queued.insert(index) {
            self.frontier.push(index);
        }
    }

    fn enqueue_with_neighbors(&mut self, index: u32) {
        self.enqueue(index);
        for n in neighbors(index, self.size) {
            self.enqueue(n);
        }
    }

    pub fn alive(&self) -> &HashSet<u32> {
        &self.alive
    }
}

impl LifeEngine for ReferenceEngine {
    fn backend(&self) -> EngineBackend {
        EngineBackend::Reference
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn step(&mut self) -> GenerationDiff {
        let to_check = std::mem::take(&mut self.frontier);
        self.queued.clear();

        let mut diff = GenerationDiff::default();
        for &index in &to_check {
            let was_alive = self.alive.contains(&index);
            let count = neighbors(index, self.size)
                .iter()
                .filter(|&&n| self.alive.contains(&n))
                .count() as u8;
            match transition(was_alive, count) {
                Transition::Unchanged => continue,
                Transition::Born => diff.born.push(index),
                Transition::Died => diff.died.push(index),
            }
            self.enqueue_with_neighbors(index);
        }

        for index in &diff.born {
            self.alive.insert(*index);
        }
        for index in &diff.died {
            self.alive.remove(index);
        }

        self.last_evaluated = to_check.len();
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
        self.alive.contains(&index)
    }

    fn alive_cells(&self) -> Vec<u32> {
        let mut cells: Vec<u32> = self.alive.iter().copied().collect();
        cells.sort_unstable();
        cells
    }

    fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    fn last_evaluated(&self) -> usize {
        self.last_evaluated
    }
}
