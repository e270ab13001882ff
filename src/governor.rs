//! Paces generation diffs from a transport onto a fixed-rate display.
//!
//! The governor keeps its own copy of the universe and advances it only by
//! applying diffs in the order they arrived. It keeps a FIFO of diffs ahead of
//! the display, asks for one batch at a time when the FIFO runs low, and
//! slows playback when a batch took longer per generation than the current
//! speed can hide.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::engine::GenerationDiff;
use crate::pattern::Pattern;
use crate::transport::{BatchTransport, Request, Response, ResultsBatch};

const DEFAULT_BATCH_SIZE: usize = 25;
const DEFAULT_HIGH_WATER: usize = 50;
const DEFAULT_FRAME_RATE: u32 = 60;
const DEFAULT_CYCLES_PER_RENDER: u32 = 6;

/// Pacing knobs. Defaults give 10 generations per second at 60 frames.
#[derive(Clone, Debug)]
pub struct GovernorConfig {
    /// Generations requested per batch.
    pub batch_size: usize,
    /// Target buffer depth; a new batch is requested below half of it.
    pub high_water: usize,
    /// Display refreshes per second.
    pub frame_rate: u32,
    /// Initial frames per generation.
    pub cycles_per_render: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            high_water: DEFAULT_HIGH_WATER,
            frame_rate: DEFAULT_FRAME_RATE,
            cycles_per_render: DEFAULT_CYCLES_PER_RENDER,
        }
    }
}

impl GovernorConfig {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    pub fn high_water(mut self, n: usize) -> Self {
        self.high_water = n.max(1);
        self
    }

    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps.max(1);
        self
    }

    pub fn cycles_per_render(mut self, cycles: u32) -> Self {
        self.cycles_per_render = cycles.max(1);
        self
    }

    pub fn low_water(&self) -> usize {
        (self.high_water / 2).max(1)
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }
}

/// What the display receives once per frame.
///
/// `born`/`died` are present only on frames that consumed a diff; otherwise
/// the surface must redraw from `alive` if `did_change` is set.
#[derive(Clone, Copy, Debug)]
pub struct DisplayUpdate<'a> {
    pub alive: &'a HashSet<u32>,
    pub born: Option<&'a [u32]>,
    pub died: Option<&'a [u32]>,
    pub preview: &'a HashSet<u32>,
    pub did_change: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GovernorStatus {
    pub started: bool,
    pub paused: bool,
    pub faulted: bool,
    pub generation: u64,
    pub population: usize,
    pub cycles_per_render: u32,
    pub buffered: usize,
}

/// The presentation side of the pipeline.
pub trait DisplaySurface {
    fn update_display(&mut self, update: DisplayUpdate<'_>);

    fn report_status(&mut self, _status: &GovernorStatus) {}
}

pub struct Governor<T, D> {
    config: GovernorConfig,
    size: u32,
    transport: T,
    display: D,
    alive: HashSet<u32>,
    preview: HashSet<u32>,
    buffer: VecDeque<GenerationDiff>,
    cycles_per_render: u32,
    current_cycle: u32,
    pending_request_at: Option<Instant>,
    start_sent: bool,
    started: bool,
    paused: bool,
    terminated: bool,
    fault: Option<String>,
    did_change: bool,
    generation: u64,
}

impl<T: BatchTransport, D: DisplaySurface> Governor<T, D> {
    pub fn new(size: u32, transport: T, display: D) -> Self {
        Self::with_config(size, transport, display, GovernorConfig::default())
    }

    pub fn with_config(size: u32, transport: T, display: D, config: GovernorConfig) -> Self {
        let cycles = config.cycles_per_render.max(1);
        Self {
            config,
            size,
            transport,
            display,
            alive: HashSet::new(),
            preview: HashSet::new(),
            buffer: VecDeque::new(),
            cycles_per_render: cycles,
            current_cycle: cycles,
            pending_request_at: None,
            start_sent: false,
            started: false,
            paused: false,
            terminated: false,
            fault: None,
            did_change: true,
            generation: 0,
        }
    }

    pub fn alive(&self) -> &HashSet<u32> {
        &self.alive
    }

    pub fn preview(&self) -> &HashSet<u32> {
        &self.preview
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The next diff playback will apply.
    pub fn front(&self) -> Option<&GenerationDiff> {
        self.buffer.front()
    }

    pub fn cycles_per_render(&self) -> u32 {
        self.cycles_per_render
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending_request_at.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn generations_per_second(&self) -> f64 {
        f64::from(self.config.frame_rate) / f64::from(self.cycles_per_render)
    }

    pub fn status(&self) -> GovernorStatus {
        GovernorStatus {
            started: self.started,
            paused: self.paused,
            faulted: self.fault.is_some(),
            generation: self.generation,
            population: self.alive.len(),
            cycles_per_render: self.cycles_per_render,
            buffered: self.buffer.len(),
        }
    }

    /// Edits are only accepted before the initial universe is sent.
    fn editable(&self) -> bool {
        !self.start_sent && !self.terminated
    }

    fn in_grid(&self, index: u32) -> bool {
        u64::from(index) < u64::from(self.size) * u64::from(self.size)
    }

    /// Flip one cell. Returns whether the edit was applied.
    pub fn toggle_cell(&mut self, index: u32) -> bool {
        if !self.editable() || !self.in_grid(index) {
            debug!(index, "toggle ignored");
            return false;
        }
        if !self.alive.remove(&index) {
            self.alive.insert(index);
        }
        self.did_change = true;
        true
    }

    /// Add `indices` to the universe, or show them as the preview.
    ///
    /// A preview replaces the previous one; a real placement clears it.
    pub fn place_pattern(&mut self, indices: &[u32], is_preview: bool) -> bool {
        if !self.editable() {
            debug!(cells = indices.len(), is_preview, "placement ignored");
            return false;
        }
        let cells: Vec<u32> = indices.iter().copied().filter(|&i| self.in_grid(i)).collect();
        self.preview.clear();
        if is_preview {
            self.preview.extend(cells);
        } else {
            self.alive.extend(cells);
        }
        self.did_change = true;
        true
    }

    /// Place `pattern` centred on `(row, col)`.
    pub fn place_pattern_at(
        &mut self,
        pattern: &Pattern,
        row: u32,
        col: u32,
        is_preview: bool,
    ) -> bool {
        let cells = pattern.cells_at(row, col, self.size);
        self.place_pattern(&cells, is_preview)
    }

    pub fn clear_preview(&mut self) {
        self.preview.clear();
        self.did_change = true;
    }

    pub fn clear_alive_cells(&mut self) -> bool {
        if !self.editable() {
            return false;
        }
        self.alive.clear();
        self.did_change = true;
        true
    }

    /// Send the universe to the engine on first call; resume afterwards.
    pub fn play(&mut self) {
        if self.terminated || self.fault.is_some() {
            return;
        }
        self.paused = false;
        if self.start_sent {
            return;
        }
        let mut initial_alive: Vec<u32> = self.alive.iter().copied().collect();
        initial_alive.sort_unstable();
        info!(size = self.size, population = initial_alive.len(), "starting simulation");
        match self.transport.post(Request::Start {
            size: self.size,
            initial_alive,
        }) {
            Ok(()) => {
                self.start_sent = true;
                self.preview.clear();
            }
            Err(err) => self.fail(format!("could not start simulation: {err}")),
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Target a playback rate; never faster than one generation per frame.
    pub fn set_speed(&mut self, generations_per_second: f64) {
        if generations_per_second.is_nan() || generations_per_second <= 0.0 {
            warn!(generations_per_second, "ignoring non-positive speed");
            return;
        }
        let cycles = (f64::from(self.config.frame_rate) / generations_per_second)
            .round()
            .clamp(1.0, f64::from(u32::MAX)) as u32;
        self.cycles_per_render = cycles;
        self.current_cycle = self.current_cycle.min(cycles);
    }

    /// Stop all further ticks and tear down the transport.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        info!(generation = self.generation, "terminating governor");
        self.terminated = true;
        self.pending_request_at = None;
        self.transport.terminate();
    }

    fn fail(&mut self, reason: String) {
        error!(%reason, "simulation faulted");
        self.fault = Some(reason);
        self.pending_request_at = None;
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// One display frame at time `now`.
    pub fn tick_at(&mut self, now: Instant) {
        if self.terminated {
            return;
        }
        while let Some(response) = self.transport.poll() {
            self.handle_response_at(response, now);
        }
        if self.fault.is_some() {
            let status = self.status();
            self.display.report_status(&status);
            return;
        }

        let consumed = self.advance_playback();
        self.request_more(now);

        let (born, died) = match &consumed {
            Some(diff) => (Some(diff.born.as_slice()), Some(diff.died.as_slice())),
            None => (None, None),
        };
        self.display.update_display(DisplayUpdate {
            alive: &self.alive,
            born,
            died,
            preview: &self.preview,
            did_change: self.did_change,
        });
        self.did_change = false;

        let status = self.status();
        self.display.report_status(&status);
    }

    fn advance_playback(&mut self) -> Option<GenerationDiff> {
        if !self.started || self.paused {
            return None;
        }
        self.current_cycle = self.current_cycle.saturating_sub(1);
        if self.current_cycle > 0 {
            return None;
        }
        self.current_cycle = self.cycles_per_render;

        let diff = self.buffer.pop_front()?;
        for &index in &diff.born {
            self.alive.insert(index);
        }
        for index in &diff.died {
            self.alive.remove(index);
        }
        self.generation += 1;
        self.did_change = true;
        Some(diff)
    }

    fn request_more(&mut self, now: Instant) {
        if !self.started
            || self.pending_request_at.is_some()
            || self.buffer.len() >= self.config.low_water()
        {
            return;
        }
        let count = self.config.batch_size;
        match self.transport.post(Request::RequestResults { count }) {
            Ok(()) => self.pending_request_at = Some(now),
            Err(err) => self.fail(format!("could not request results: {err}")),
        }
    }

    /// Fold one transport reply into governor state, as observed at `now`.
    pub fn handle_response_at(&mut self, response: Response, now: Instant) {
        if self.terminated {
            return;
        }
        match response {
            Response::Started => {
                info!("simulation started");
                self.started = true;
            }
            Response::Faulted { reason } => self.fail(reason),
            Response::Results(batch) => self.accept_batch(batch, now),
        }
    }

    fn accept_batch(&mut self, batch: ResultsBatch, now: Instant) {
        let count = batch.results.len();
        self.buffer.extend(batch.results);

        let Some(requested_at) = self.pending_request_at.take() else {
            warn!(count, "received results without a pending request");
            return;
        };
        if count == 0 {
            return;
        }

        let elapsed = now.saturating_duration_since(requested_at);
        let per_generation = elapsed / count as u32;
        let sustainable = self.config.frame_budget() * self.cycles_per_render;
        debug!(
            count,
            compute_ms = batch.duration,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            buffered = self.buffer.len(),
            "batch received"
        );
        if per_generation > sustainable {
            self.cycles_per_render += 1;
            warn!(
                per_generation_ms = per_generation.as_secs_f64() * 1000.0,
                generations_per_second = self.generations_per_second(),
                "batch latency exceeds frame budget; reducing speed"
            );
        }
    }
}
