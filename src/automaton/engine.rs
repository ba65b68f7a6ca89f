//! The dense simulation engine.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::automaton::grid::{seeded_live_indices, Grid, DEFAULT_ENERGY};
use crate::automaton::neighbors::{MooreCounter, NeighborCounter};
use crate::automaton::pattern::Pattern;
use crate::automaton::region::{self, Region};
use crate::automaton::rules::{RuleSet, SimulationParams};
use crate::automaton::stepping::{step_parallel, CellUpdate};
use crate::error::{BoundsError, ConfigurationError, StepError};
use crate::metrics::{MetricsSnapshot, PerformanceMetrics};
use crate::state::{CellState, Dimensions, Position};

/// Receives every cell whose alive flag flipped, on the stepping thread.
pub type CellListener = Box<dyn FnMut(&CellUpdate) + Send>;

/// Receives the metrics after every committed step.
pub type MetricsListener = Box<dyn FnMut(&MetricsSnapshot) + Send>;

/// Hardware parallelism, at least 1.
pub fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn build_pool(workers: usize) -> Result<Arc<rayon::ThreadPool>, ConfigurationError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("voxel-step-{i}"))
        .build()
        .map(Arc::new)
        .map_err(|e| ConfigurationError::WorkerPool(e.to_string()))
}

/// Owns the canonical dense state and advances it one generation per
/// [`step`](GridEngine::step).
///
/// Outside of `step` the engine is single-threaded from the caller's point
/// of view. Inside it, a fixed-size rayon pool processes contiguous chunks
/// of the volume and the call returns only after the buffer swap.
pub struct GridEngine {
    grid: Option<Grid>,
    params: SimulationParams,
    pool: Arc<rayon::ThreadPool>,
    workers: usize,
    counter: Arc<dyn NeighborCounter>,
    metrics: Arc<PerformanceMetrics>,
    paused: bool,
    cell_listener: Option<CellListener>,
    metrics_listener: Option<MetricsListener>,
}

impl GridEngine {
    /// An uninitialized engine using every available core.
    pub fn new(params: SimulationParams) -> Result<Self, ConfigurationError> {
        Self::with_workers(params, 0)
    }

    /// An uninitialized engine with `workers` pool threads (0 = detected).
    pub fn with_workers(params: SimulationParams, workers: usize) -> Result<Self, ConfigurationError> {
        params.validate()?;
        let workers = if workers == 0 {
            detected_parallelism()
        } else {
            workers
        };
        Ok(GridEngine {
            grid: None,
            params,
            pool: build_pool(workers)?,
            workers,
            counter: Arc::new(MooreCounter),
            metrics: Arc::new(PerformanceMetrics::new()),
            paused: false,
            cell_listener: None,
            metrics_listener: None,
        })
    }

    /// Allocate two all-dead buffers, replacing any previous grid.
    pub fn initialize(&mut self, dims: Dimensions) -> Result<(), ConfigurationError> {
        let grid = Grid::new(dims)?;
        let (bytes, efficiency) = grid.buffer_usage();
        self.metrics.set_memory_efficiency(efficiency);
        self.grid = Some(grid);
        info!(%dims, bytes, workers = self.workers, "grid initialized");
        Ok(())
    }

    /// Reinitialize at new extents. The previous state is discarded, not
    /// migrated.
    pub fn resize_grid(&mut self, dims: Dimensions) -> Result<(), ConfigurationError> {
        let previous = self.dimensions();
        self.initialize(dims)?;
        info!(?previous, %dims, "grid resized; prior state discarded");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.grid.is_some()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.grid.as_ref().map(Grid::dimensions)
    }

    /// Read access to the committed grid.
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    fn grid_or_bounds(&self, pos: Position) -> Result<&Grid, BoundsError> {
        self.grid.as_ref().ok_or(BoundsError {
            position: pos,
            dimensions: Dimensions::default(),
        })
    }

    /// Place or clear one cell. Alive cells start at age 1 with `energy`.
    pub fn set_cell(&mut self, pos: Position, alive: bool, energy: u8) -> Result<(), BoundsError> {
        let cell = if alive {
            CellState::spawned(energy)
        } else {
            CellState::DEAD
        };
        match self.grid.as_mut() {
            Some(grid) => grid.set(pos, cell),
            None => Err(BoundsError {
                position: pos,
                dimensions: Dimensions::default(),
            }),
        }
    }

    pub fn get_cell(&self, pos: Position) -> Result<CellState, BoundsError> {
        self.grid_or_bounds(pos)?.get(pos)
    }

    pub fn generation(&self) -> u64 {
        self.grid.as_ref().map_or(0, Grid::generation)
    }

    /// Alive cells in the committed generation.
    pub fn live_cell_count(&self) -> usize {
        self.grid.as_ref().map_or(0, Grid::population)
    }

    /// Recount alive cells from the buffer.
    pub fn recount_population(&mut self) -> usize {
        self.grid.as_mut().map_or(0, Grid::recount_population)
    }

    pub fn live_positions(&self) -> Vec<Position> {
        self.grid.as_ref().map(Grid::live_positions).unwrap_or_default()
    }

    /// Advance exactly one generation.
    ///
    /// On failure nothing is committed: the generation counter, population
    /// and every cell stay as they were before the call.
    pub fn step(&mut self) -> Result<(), StepError> {
        let grid = self.grid.as_mut().ok_or(StepError::Uninitialized)?;
        let started = Instant::now();
        let dims = grid.dimensions();
        let generation = grid.generation();
        let collect = self.cell_listener.is_some();

        let (current, next) = grid.split_buffers();
        let outcome = step_parallel(
            &self.pool,
            self.workers,
            self.counter.as_ref(),
            &self.params,
            dims,
            current,
            next,
            collect,
        )
        .map_err(|err| {
            warn!(generation, %err, "step failed; generation not committed");
            err
        })?;

        grid.commit(outcome.population);
        let elapsed = started.elapsed();
        self.metrics.record_step(grid.len(), elapsed);
        debug!(
            generation = generation + 1,
            population = outcome.population,
            births = outcome.births,
            deaths = outcome.deaths,
            elapsed_us = elapsed.as_micros() as u64,
            "step committed"
        );

        if let Some(listener) = self.cell_listener.as_mut() {
            for update in &outcome.updates {
                listener(update);
            }
        }
        if let Some(listener) = self.metrics_listener.as_mut() {
            listener(&self.metrics.snapshot());
        }
        Ok(())
    }

    /// Step `generations` times, stopping at the first failure.
    pub fn run_simulation(&mut self, generations: u64) -> Result<(), StepError> {
        for _ in 0..generations {
            self.step()?;
        }
        Ok(())
    }

    /// Kill every cell and zero the counters and metrics.
    pub fn reset_simulation(&mut self) {
        if let Some(grid) = self.grid.as_mut() {
            grid.clear();
        }
        self.metrics.reset();
        debug!("simulation reset");
    }

    /// Flag for an external driving loop. The engine itself never runs on
    /// its own, so this does not affect `step` or `run_simulation`.
    pub fn pause_simulation(&mut self) {
        self.paused = true;
    }

    pub fn resume_simulation(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn set_simulation_params(&mut self, params: SimulationParams) -> Result<(), ConfigurationError> {
        params.validate()?;
        debug!(rule = %params.rules.name, "simulation params updated");
        self.params = params;
        Ok(())
    }

    pub fn set_rule_set(&mut self, rules: RuleSet) {
        self.params.rules = rules;
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Rebuild the pool with `workers` threads; 0 means detected parallelism.
    pub fn set_worker_count(&mut self, workers: usize) -> Result<(), ConfigurationError> {
        let workers = if workers == 0 {
            detected_parallelism()
        } else {
            workers
        };
        if workers != self.workers {
            self.pool = build_pool(workers)?;
            self.workers = workers;
            debug!(workers, "worker pool rebuilt");
        }
        Ok(())
    }

    /// Swap the neighbor-counting routine.
    pub fn set_neighbor_counter(&mut self, counter: Arc<dyn NeighborCounter>) {
        debug!(counter = counter.name(), "neighbor counter replaced");
        self.counter = counter;
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared handle for readers on other threads.
    pub fn metrics_handle(&self) -> Arc<PerformanceMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn on_cell_update(&mut self, listener: impl FnMut(&CellUpdate) + Send + 'static) {
        self.cell_listener = Some(Box::new(listener));
    }

    pub fn on_metrics(&mut self, listener: impl FnMut(&MetricsSnapshot) + Send + 'static) {
        self.metrics_listener = Some(Box::new(listener));
    }

    pub fn clear_listeners(&mut self) {
        self.cell_listener = None;
        self.metrics_listener = None;
    }

    /// Replace the committed state with a seeded random fill. Returns the
    /// resulting population.
    pub fn randomize(&mut self, density: f64, seed: u64) -> usize {
        let Some(grid) = self.grid.as_mut() else {
            return 0;
        };
        let generation = grid.generation();
        let live = seeded_live_indices(grid.dimensions(), density, seed);
        grid.clear();
        for &idx in &live {
            grid.set_index(idx, CellState::spawned(DEFAULT_ENERGY));
        }
        debug!(density, seed, population = live.len(), generation, "grid randomized");
        live.len()
    }

    /// Place `cells` shifted by `offset`; out-of-range cells are skipped.
    pub fn load_pattern(&mut self, cells: &[Position], offset: Position) -> usize {
        self.grid
            .as_mut()
            .map_or(0, |grid| region::load_pattern(grid, cells, offset))
    }

    pub fn load(&mut self, pattern: &Pattern, offset: Position) -> usize {
        self.load_pattern(&pattern.cells, offset)
    }

    /// Live cells inside `bounds`, relative to its min corner clipped to
    /// the grid.
    pub fn save_pattern(&self, bounds: Region) -> Vec<Position> {
        self.grid
            .as_ref()
            .map(|grid| region::save_pattern(grid, bounds))
            .unwrap_or_default()
    }

    pub fn extract_region(&self, out: &mut [u8], bounds: Region) -> u64 {
        self.grid
            .as_ref()
            .map_or(0, |grid| region::extract_region(grid, out, bounds))
    }

    pub fn import_region(&mut self, input: &[u8], bounds: Region) -> u64 {
        self.grid
            .as_mut()
            .map_or(0, |grid| region::import_region(grid, input, bounds))
    }

    /// Private copy for isolated experiments.
    ///
    /// Shares the worker pool and neighbor counter, copies the grid and
    /// parameters, and starts with fresh metrics and no listeners. Nothing
    /// done to the copy is visible through `self`.
    pub fn detached_clone(&self) -> GridEngine {
        GridEngine {
            grid: self.grid.clone(),
            params: self.params.clone(),
            pool: Arc::clone(&self.pool),
            workers: self.workers,
            counter: Arc::clone(&self.counter),
            metrics: Arc::new(PerformanceMetrics::new()),
            paused: false,
            cell_listener: None,
            metrics_listener: None,
        }
    }
}
