//! Batch distribution for parallel replay.
//!
//! Seeds are split into contiguous batches, one per worker; each batch runs its
//! battles back to back so results can be stitched together in input order.

use rayon::prelude::*;
use serde::Serialize;

use crate::combat::battle::{BattleConfig, BattleDriver, EndReason};
use crate::error::EngineError;
use crate::parallel::pool::WorkerPool;

/// Split `total` items into up to `num_batches` ranges `[start, end)`.
/// Batches are as equal in size as possible; later batches may be smaller.
///
/// # Example
/// ```
/// # use idlecombat::parallel::batch_ranges;
/// let ranges = batch_ranges(100, 4);
/// assert_eq!(ranges, vec![(0, 25), (25, 50), (50, 75), (75, 100)]);
/// ```
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let size = base + if i < remainder { 1 } else { 0 };
        let end = start + size;
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Result of one independent battle in a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepSummary {
    pub seed: u64,
    pub simulated_seconds: f64,
    pub total_damage: i64,
    pub dps: f64,
    pub killed: bool,
    pub kill_time: Option<f64>,
    pub kills: u32,
    pub segments: usize,
    pub rng_draws: i64,
    pub end_reason: Option<EndReason>,
}

fn run_one(template: &BattleConfig, seed: u64) -> Result<SweepSummary, EngineError> {
    let mut driver = BattleDriver::new(BattleConfig {
        seed,
        ..template.clone()
    })?;
    driver.fast_forward_to(template.target_duration);
    let status = driver.status();
    Ok(SweepSummary {
        seed,
        simulated_seconds: status.simulated_seconds,
        total_damage: status.total_damage,
        dps: status.dps,
        killed: status.killed,
        kill_time: status.kill_time,
        kills: status.kills,
        segments: status.segment_count,
        rng_draws: status.rng_index_end - status.rng_index_start,
        end_reason: status.end_reason,
    })
}

/// Fast-forwards one battle per seed in parallel, each to the template's target
/// duration. Output order matches `seeds`.
pub fn sweep_seeds(
    template: &BattleConfig,
    seeds: &[u64],
    pool: &WorkerPool,
) -> Result<Vec<SweepSummary>, EngineError> {
    template.validate()?;
    let ranges = batch_ranges(seeds.len(), pool.effective_workers());
    let batches: Vec<Result<Vec<SweepSummary>, EngineError>> = pool.install(|| {
        ranges
            .par_iter()
            .map(|&(start, end)| {
                seeds[start..end]
                    .iter()
                    .map(|&seed| run_one(template, seed))
                    .collect()
            })
            .collect()
    });
    let mut summaries = Vec::with_capacity(seeds.len());
    for batch in batches {
        summaries.extend(batch?);
    }
    Ok(summaries)
}
