//! Numeric measures over a single committed generation or a population
//! series. None of these step a grid.

use ahash::{AHashMap, AHashSet};
use glam::DVec3;

use crate::automaton::grid::{index_of, Grid};

/// Normalized Shannon entropy of the non-overlapping 2x2x2 block patterns.
///
/// Blocks are tiled from the origin; a trailing slab on an odd axis is
/// ignored. The entropy is divided by `log2(distinct patterns)`, so the
/// result is in `[0, 1]` and is 0 whenever fewer than two patterns occur.
pub fn block_entropy(grid: &Grid) -> f64 {
    let dims = grid.dimensions();
    let cells = grid.cells();
    let (bw, bh, bd) = (dims.width / 2, dims.height / 2, dims.depth / 2);

    let mut counts: AHashMap<u8, u32> = AHashMap::new();
    for bz in 0..bd {
        for by in 0..bh {
            for bx in 0..bw {
                let mut key = 0u8;
                let mut bit = 0;
                for dz in 0..2 {
                    for dy in 0..2 {
                        for dx in 0..2 {
                            let idx = index_of(dims, bx * 2 + dx, by * 2 + dy, bz * 2 + dz);
                            if cells[idx].alive {
                                key |= 1 << bit;
                            }
                            bit += 1;
                        }
                    }
                }
                *counts.entry(key).or_insert(0) += 1;
            }
        }
    }

    if counts.len() < 2 {
        return 0.0;
    }
    let total: u32 = counts.values().sum();
    let total = total as f64;
    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();
    entropy / (counts.len() as f64).log2()
}

/// Number of distinct 3x3x3 occupancy patterns centred on interior cells.
pub fn neighborhood_diversity(grid: &Grid) -> usize {
    let dims = grid.dimensions();
    if dims.width < 3 || dims.height < 3 || dims.depth < 3 {
        return 0;
    }
    let cells = grid.cells();
    let mut seen: AHashSet<u32> = AHashSet::new();
    for z in 1..dims.depth - 1 {
        for y in 1..dims.height - 1 {
            for x in 1..dims.width - 1 {
                let mut key = 0u32;
                for nz in z - 1..=z + 1 {
                    for ny in y - 1..=y + 1 {
                        for nx in x - 1..=x + 1 {
                            key = (key << 1) | cells[index_of(dims, nx, ny, nz)].alive as u32;
                        }
                    }
                }
                seen.insert(key);
            }
        }
    }
    seen.len()
}

/// Mean of block entropy and `distinct 3x3x3 patterns / 27`.
///
/// The diversity term is not capped, so busy grids score above 1.
pub fn complexity(grid: &Grid) -> f64 {
    (block_entropy(grid) + neighborhood_diversity(grid) as f64 / 27.0) * 0.5
}

/// Population-weighted center of the live cells, `None` when empty.
pub fn centroid(grid: &Grid) -> Option<DVec3> {
    let live = grid.live_positions();
    if live.is_empty() {
        return None;
    }
    let sum = live.iter().fold(DVec3::ZERO, |acc, p| {
        acc + DVec3::new(p.x as f64, p.y as f64, p.z as f64)
    });
    Some(sum / live.len() as f64)
}

/// Live cells seen by live cells within a Chebyshev `radius`, over the
/// most that could be seen if every cell were alive and interior.
///
/// The box is clipped at the grid edges without wrapping. In `[0, 1]`.
pub fn interaction_density(grid: &Grid, radius: u32) -> f64 {
    let dims = grid.dimensions();
    let side = 2 * u64::from(radius) + 1;
    let per_cell = side.saturating_mul(side).saturating_mul(side) - 1;
    let denominator = (dims.cell_count() as u64).saturating_mul(per_cell);
    if denominator == 0 {
        return 0.0;
    }

    let cells = grid.cells();
    let span = |c: i32, limit: u32| {
        let c = c as u32;
        c.saturating_sub(radius)..c.saturating_add(radius).saturating_add(1).min(limit)
    };
    let mut seen = 0u64;
    for p in grid.live_positions() {
        for z in span(p.z, dims.depth) {
            for y in span(p.y, dims.height) {
                for x in span(p.x, dims.width) {
                    if cells[index_of(dims, x, y, z)].alive {
                        seen += 1;
                    }
                }
            }
        }
        // The cell itself
        seen -= 1;
    }
    seen as f64 / denominator as f64
}

/// Population variance (divides by `n`).
pub fn population_variance(series: &[usize]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().map(|&p| p as f64).sum::<f64>() / n;
    series
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// `1 - min(variance / total_cells, 1)`.
pub fn stability_score(series: &[usize], total_cells: usize) -> f64 {
    if total_cells == 0 {
        return 1.0;
    }
    1.0 - (population_variance(series) / total_cells as f64).min(1.0)
}

/// `(last - first) / (first * generations)`, or 0 when the series starts
/// empty or is too short to compare.
pub fn growth_rate(series: &[usize], generations: u32) -> f64 {
    match (series.first(), series.last()) {
        (Some(&first), Some(&last)) if first > 0 && series.len() >= 2 && generations > 0 => {
            (last as f64 - first as f64) / (first as f64 * generations as f64)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::grid::position_of;
    use crate::automaton::pattern::Pattern;
    use crate::state::{CellState, Dimensions, Position};

    fn grid_with(dims: Dimensions, live: &[Position]) -> Grid {
        let mut g = Grid::new(dims).unwrap();
        for &p in live {
            g.set(p, CellState::spawned(1)).unwrap();
        }
        g
    }

    #[test]
    fn test_entropy_of_uniform_grids_is_zero() {
        let dead = Grid::new(Dimensions::cube(6)).unwrap();
        assert_eq!(block_entropy(&dead), 0.0);

        let all: Vec<Position> = (0..216)
            .map(|i| position_of(Dimensions::cube(6), i))
            .collect();
        let full = grid_with(Dimensions::cube(6), &all);
        assert_eq!(block_entropy(&full), 0.0);
    }

    #[test]
    fn test_entropy_two_equal_patterns_is_one() {
        // 4x2x2 holds exactly two blocks; fill the first one.
        let g = grid_with(Dimensions::new(4, 2, 2), &Pattern::block().cells);
        assert!((block_entropy(&g) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_entropy_in_unit_interval() {
        let g = grid_with(
            Dimensions::cube(8),
            &[Position::new(0, 0, 0), Position::new(3, 2, 5), Position::new(7, 7, 7)],
        );
        let h = block_entropy(&g);
        assert!(h > 0.0 && h <= 1.0, "entropy {h}");
    }

    #[test]
    fn test_entropy_without_full_blocks() {
        let g = grid_with(Dimensions::new(1, 4, 4), &[Position::new(0, 1, 1)]);
        assert_eq!(block_entropy(&g), 0.0);
    }

    #[test]
    fn test_interaction_density() {
        let dims = Dimensions::cube(3);
        assert_eq!(interaction_density(&Grid::new(dims).unwrap(), 1), 0.0);
        assert_eq!(interaction_density(&grid_with(dims, &[Position::new(1, 1, 1)]), 1), 0.0);

        let pair = grid_with(dims, &[Position::new(0, 0, 0), Position::new(2, 2, 2)]);
        assert_eq!(interaction_density(&pair, 1), 0.0);
        assert!((interaction_density(&pair, 2) - 2.0 / (27.0 * 124.0)).abs() < 1e-12);

        // Clipped box sizes per axis are 2, 3, 2, so sum(box) = 7^3
        let all: Vec<Position> = (0..27).map(|i| position_of(dims, i)).collect();
        let full = grid_with(dims, &all);
        let expected = (343.0 - 27.0) / (27.0 * 26.0);
        assert!((interaction_density(&full, 1) - expected).abs() < 1e-12);
        assert!(interaction_density(&full, 4) <= 1.0);
    }

    #[test]
    fn test_neighborhood_diversity() {
        let empty = Grid::new(Dimensions::cube(5)).unwrap();
        assert_eq!(neighborhood_diversity(&empty), 1);
        assert!((complexity(&empty) - 0.5 / 27.0).abs() < 1e-12);

        let one = grid_with(Dimensions::cube(5), &[Position::new(2, 2, 2)]);
        // Each of the 27 interior cells sees the live cell at a different
        // offset.
        assert_eq!(neighborhood_diversity(&one), 27);

        let thin = Grid::new(Dimensions::new(2, 5, 5)).unwrap();
        assert_eq!(neighborhood_diversity(&thin), 0);
    }

    #[test]
    fn test_centroid() {
        let g = grid_with(
            Dimensions::cube(4),
            &[Position::new(0, 0, 0), Position::new(2, 2, 0)],
        );
        assert_eq!(centroid(&g), Some(DVec3::new(1.0, 1.0, 0.0)));
        assert_eq!(centroid(&Grid::new(Dimensions::cube(2)).unwrap()), None);
    }

    #[test]
    fn test_series_measures() {
        assert_eq!(population_variance(&[4, 4, 4]), 0.0);
        assert_eq!(population_variance(&[2, 4]), 1.0);
        assert_eq!(stability_score(&[5, 5, 5], 64), 1.0);
        assert_eq!(stability_score(&[0, 64], 64), 0.0);

        assert_eq!(growth_rate(&[10, 20], 10), 0.1);
        assert_eq!(growth_rate(&[10, 5], 5), -0.1);
        assert_eq!(growth_rate(&[0, 50], 10), 0.0);
        assert_eq!(growth_rate(&[7], 10), 0.0);
    }
}
