use log::debug;

use super::config::AttributionPolicy;
use super::deltas::PairDelta;
use super::windows::WindowPlan;
use crate::metrics::AttributionMetrics;

/// Credits each delta to the plan's windows and returns one accumulator per
/// window. Deltas that cannot be placed inside the range are dropped and
/// their seconds counted in `metrics.seconds_dropped`.
pub fn apply_policy(
    plan: &WindowPlan,
    deltas: &[PairDelta],
    policy: AttributionPolicy,
    metrics: &mut AttributionMetrics,
) -> Vec<i64> {
    let mut accumulators = vec![0i64; plan.len()];

    for delta in deltas {
        let placed = match policy {
            AttributionPolicy::StartWindow => credit_start_window(plan, delta, &mut accumulators),
            AttributionPolicy::Proportional => credit_proportionally(plan, delta, &mut accumulators),
        };

        if placed == 0 {
            metrics.pairs_out_of_range += 1;
            debug!(
                "dropping {}s starting at {} outside [{}, {})",
                delta.delta_secs,
                delta.from.to_rfc3339(),
                plan.start().to_rfc3339(),
                plan.end().to_rfc3339()
            );
        } else {
            metrics.pairs_attributed += 1;
        }
        metrics.seconds_dropped += delta.delta_secs - placed;
    }

    accumulators
}

fn credit_start_window(plan: &WindowPlan, delta: &PairDelta, accumulators: &mut [i64]) -> i64 {
    match plan.index_of(delta.from) {
        Some(index) => {
            accumulators[index] += delta.delta_secs;
            delta.delta_secs
        }
        None => 0,
    }
}

/// Spreads the delta over the capture span `[from, to)` as if playback ran at
/// a constant rate between the two polls. Whole seconds are handed out by
/// largest remainder so the credited parts add up to the in-range share.
fn credit_proportionally(plan: &WindowPlan, delta: &PairDelta, accumulators: &mut [i64]) -> i64 {
    let span_ms = (delta.to - delta.from).num_milliseconds();
    if span_ms <= 0 {
        return credit_start_window(plan, delta, accumulators);
    }

    let mut overlaps: Vec<(usize, i64)> = Vec::new();
    for (index, window) in plan.windows().iter().enumerate() {
        if window.end <= delta.from {
            continue;
        }
        if window.start >= delta.to {
            break;
        }
        let overlap_start = window.start.max(delta.from);
        let overlap_end = window.end.min(delta.to);
        let overlap_ms = (overlap_end - overlap_start).num_milliseconds();
        if overlap_ms > 0 {
            overlaps.push((index, overlap_ms));
        }
    }

    if overlaps.is_empty() {
        return 0;
    }

    let delta_secs = i128::from(delta.delta_secs);
    let span = i128::from(span_ms);
    let covered: i128 = overlaps.iter().map(|(_, ms)| i128::from(*ms)).sum();
    let target = (delta_secs * covered / span) as i64;

    let mut shares: Vec<(usize, i64, i128)> = overlaps
        .iter()
        .map(|(index, ms)| {
            let scaled = delta_secs * i128::from(*ms);
            (*index, (scaled / span) as i64, scaled % span)
        })
        .collect();

    let floor_sum: i64 = shares.iter().map(|(_, secs, _)| *secs).sum();
    let mut leftover = target - floor_sum;

    // ties go to the earlier window
    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by(|a, b| shares[*b].2.cmp(&shares[*a].2).then(a.cmp(b)));
    for position in by_remainder {
        if leftover <= 0 {
            break;
        }
        shares[position].1 += 1;
        leftover -= 1;
    }

    for (index, secs, _) in &shares {
        accumulators[*index] += secs;
    }
    target
}
