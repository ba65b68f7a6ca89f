//! The per-cell transition and the chunked parallel stepping kernel.
//!
//! Workers read only from the committed buffer and each writes a disjoint
//! contiguous slice of the scratch buffer, so no locking is needed while
//! they run. Results are independent of the worker count.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;

use crate::automaton::grid::position_of;
use crate::automaton::neighbors::{GridView, NeighborCounter, Neighborhood};
use crate::automaton::rules::SimulationParams;
use crate::error::StepError;
use crate::state::{CellState, Dimensions, Position};

/// A cell whose alive flag flipped during a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellUpdate {
    pub position: Position,
    pub state: CellState,
}

/// Aggregate of one committed step.
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub population: usize,
    pub births: usize,
    pub deaths: usize,
    /// Flipped cells in ascending index order; empty unless requested.
    pub updates: Vec<CellUpdate>,
}

/// Next state of one cell given what it sees.
///
/// - survive: age + 1 (saturating at `max_age`), energy decays but never
///   below `energy_floor`
/// - birth: age 1, energy is a tenth of the neighbors' energy, capped at 255
/// - otherwise dead with zero age and energy
#[inline]
pub fn transition(cell: &CellState, hood: Neighborhood, params: &SimulationParams) -> CellState {
    let alive = params.rules.next_alive(cell.alive, hood.alive);
    let neighbor_count = hood.alive;
    match (cell.alive, alive) {
        (true, true) => {
            let decayed = (cell.energy as f32 * (1.0 - params.energy_decay_rate)).floor();
            CellState {
                alive: true,
                age: cell.age.saturating_add(1).min(params.max_age),
                energy: (decayed as u8).max(params.energy_floor),
                neighbor_count,
            }
        }
        (false, true) => CellState {
            alive: true,
            age: 1,
            energy: (hood.energy_sum / 10).min(255) as u8,
            neighbor_count,
        },
        _ => CellState {
            neighbor_count,
            ..CellState::DEAD
        },
    }
}

/// Contiguous chunk length so that `workers` chunks cover `total` cells.
#[inline]
pub fn chunk_size(total: usize, workers: usize) -> usize {
    total.div_ceil(workers.max(1)).max(1)
}

#[derive(Default)]
struct ChunkReport {
    population: usize,
    births: usize,
    deaths: usize,
    updates: Vec<CellUpdate>,
}

fn process_chunk(
    view: &GridView<'_>,
    counter: &dyn NeighborCounter,
    params: &SimulationParams,
    start: usize,
    out: &mut [CellState],
    collect_updates: bool,
) -> ChunkReport {
    let mut report = ChunkReport::default();
    for (offset, slot) in out.iter_mut().enumerate() {
        let idx = start + offset;
        let pos = position_of(view.dims, idx);
        let cell = &view.cells[idx];
        let next = transition(cell, counter.count(view, idx, pos), params);

        if next.alive {
            report.population += 1;
        }
        if next.alive != cell.alive {
            if next.alive {
                report.births += 1;
            } else {
                report.deaths += 1;
            }
            if collect_updates {
                report.updates.push(CellUpdate {
                    position: pos,
                    state: next,
                });
            }
        }
        *slot = next;
    }
    report
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Fill `next` from `current` on `pool`.
///
/// Blocks until every chunk has finished. A failed chunk fails the whole
/// step; the caller must not commit `next` in that case.
#[allow(clippy::too_many_arguments)]
pub fn step_parallel(
    pool: &rayon::ThreadPool,
    workers: usize,
    counter: &dyn NeighborCounter,
    params: &SimulationParams,
    dims: Dimensions,
    current: &[CellState],
    next: &mut [CellState],
    collect_updates: bool,
) -> Result<StepOutcome, StepError> {
    debug_assert_eq!(current.len(), next.len());
    let total = current.len();
    let chunk = chunk_size(total, workers);
    let view = GridView {
        dims,
        cells: current,
        boundary: params.rules.boundary,
    };

    let reports: Vec<Result<ChunkReport, StepError>> = pool.install(|| {
        next.par_chunks_mut(chunk)
            .enumerate()
            .map(|(i, out)| {
                let start = i * chunk;
                let end = start + out.len();
                catch_unwind(AssertUnwindSafe(|| {
                    process_chunk(&view, counter, params, start, out, collect_updates)
                }))
                .map_err(|payload| StepError::WorkerFailure {
                    chunk: i,
                    start,
                    end,
                    message: panic_message(payload),
                })
            })
            .collect()
    });

    let mut outcome = StepOutcome::default();
    for report in reports {
        let report = report?;
        outcome.population += report.population;
        outcome.births += report.births;
        outcome.deaths += report.deaths;
        outcome.updates.extend(report.updates);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::grid::{index_of, Grid};
    use crate::automaton::neighbors::MooreCounter;
    use crate::automaton::rules::{BoundaryPolicy, NeighborSet, RuleSet};

    fn b4s4() -> SimulationParams {
        SimulationParams::with_rules(RuleSet::new(
            NeighborSet::range(4, 4),
            NeighborSet::range(4, 4),
            BoundaryPolicy::DeadBounded,
        ))
    }

    fn pool(n: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(n).build().unwrap()
    }

    fn step_once(grid: &mut Grid, params: &SimulationParams, workers: usize) -> StepOutcome {
        let dims = grid.dimensions();
        let pool = pool(workers);
        let (current, next) = grid.split_buffers();
        let outcome =
            step_parallel(&pool, workers, &MooreCounter, params, dims, current, next, true).unwrap();
        grid.commit(outcome.population);
        outcome
    }

    #[test]
    fn test_step_b4s4_basic() {
        let mut grid = Grid::new(Dimensions::cube(8)).unwrap();
        // Center + 4 orthogonal neighbors
        for (x, y) in [(4, 4), (3, 4), (5, 4), (4, 3), (4, 5)] {
            grid.set(Position::new(x, y, 4), CellState::spawned(100)).unwrap();
        }
        assert_eq!(grid.population(), 5);

        let outcome = step_once(&mut grid, &b4s4(), 2);

        // Center had 4 neighbors, survives
        let center = grid.get(Position::new(4, 4, 4)).unwrap();
        assert!(center.alive);
        assert_eq!(center.age, 2);
        assert_eq!(center.neighbor_count, 4);

        // Arms had 3 neighbors and die
        assert!(!grid.is_alive(Position::new(3, 4, 4)));
        assert!(!grid.is_alive(Position::new(4, 5, 4)));

        assert_eq!(grid.generation(), 1);
        assert_eq!(grid.population(), outcome.population);
        assert_eq!(outcome.deaths, 4);
        assert_eq!(grid.recount_population(), outcome.population);
    }

    #[test]
    fn test_step_empty_grid_stays_empty() {
        let mut grid = Grid::new(Dimensions::cube(4)).unwrap();
        let outcome = step_once(&mut grid, &b4s4(), 3);
        assert_eq!(outcome.population, 0);
        assert!(outcome.updates.is_empty());
        assert_eq!(grid.generation(), 1);
    }

    #[test]
    fn test_transition_energy_and_age() {
        let params = SimulationParams {
            energy_decay_rate: 0.5,
            max_age: 3,
            energy_floor: 2,
            rules: b4s4().rules,
        };
        let survivor = CellState {
            alive: true,
            age: 3,
            energy: 3,
            neighbor_count: 0,
        };
        let hood = Neighborhood {
            alive: 4,
            energy_sum: 2000,
        };

        let next = transition(&survivor, hood, &params);
        assert!(next.alive);
        assert_eq!(next.age, 3, "age saturates at max_age");
        assert_eq!(next.energy, 2, "floor(3 * 0.5) = 1 is lifted to the floor");

        let born = transition(&CellState::DEAD, hood, &params);
        assert_eq!(born.age, 1);
        assert_eq!(born.energy, 200);

        let rich = Neighborhood {
            alive: 4,
            energy_sum: 26 * 255,
        };
        assert_eq!(transition(&CellState::DEAD, rich, &params).energy, 255);

        let lonely = Neighborhood {
            alive: 1,
            energy_sum: 90,
        };
        let dead = transition(&survivor, lonely, &params);
        assert_eq!(dead, CellState { neighbor_count: 1, ..CellState::DEAD });
    }

    #[test]
    fn test_chunk_size_covers_total() {
        assert_eq!(chunk_size(100, 8), 13);
        assert_eq!(chunk_size(64, 1), 64);
        assert_eq!(chunk_size(3, 8), 1);
        assert_eq!(chunk_size(0, 4), 1);
        for (total, workers) in [(1000, 7), (27, 27), (5, 2)] {
            let c = chunk_size(total, workers);
            assert!(c * workers >= total);
        }
    }

    #[test]
    fn test_updates_come_in_index_order() {
        let dims = Dimensions::cube(6);
        let mut grid = Grid::new(dims).unwrap();
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2), (4, 4)] {
            grid.set(Position::new(x, y, 3), CellState::spawned(50)).unwrap();
        }
        let outcome = step_once(&mut grid, &b4s4(), 4);
        let indices: Vec<usize> = outcome
            .updates
            .iter()
            .map(|u| {
                let p = u.position;
                index_of(dims, p.x as u32, p.y as u32, p.z as u32)
            })
            .collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(outcome.births + outcome.deaths, outcome.updates.len());
    }

    struct Exploding(usize);

    impl NeighborCounter for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn count(&self, view: &GridView<'_>, index: usize, pos: Position) -> Neighborhood {
            if index == self.0 {
                panic!("boom at {index}");
            }
            MooreCounter.count(view, index, pos)
        }
    }

    #[test]
    fn test_worker_panic_becomes_step_error() {
        let dims = Dimensions::cube(4);
        let mut grid = Grid::new(dims).unwrap();
        let pool = pool(4);
        let (current, next) = grid.split_buffers();
        let err = step_parallel(&pool, 4, &Exploding(40), &b4s4(), dims, current, next, false)
            .unwrap_err();
        match err {
            StepError::WorkerFailure {
                chunk,
                start,
                end,
                message,
            } => {
                assert_eq!(chunk, 2);
                assert_eq!((start, end), (32, 48));
                assert!(message.contains("boom at 40"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
