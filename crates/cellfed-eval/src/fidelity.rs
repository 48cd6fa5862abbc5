//! Temporal fidelity: how closely generated timing matches real timing.
//!
//! Timing is compared through per-UE inter-arrival times (IATs): events are
//! grouped by UE, sorted by timestamp, and consecutive differences taken.
//! The two IAT samples are compared with the two-sample
//! Kolmogorov-Smirnov statistic, the maximum vertical distance between
//! their empirical CDFs. Lower is better.

use std::collections::BTreeMap;

use cellfed_types::{Event, UeId};

/// Per-UE inter-arrival times of a trace, in UE order.
pub fn inter_arrival_times(events: &[Event]) -> Vec<f64> {
    let mut per_ue: BTreeMap<&UeId, Vec<f64>> = BTreeMap::new();
    for event in events {
        per_ue.entry(&event.ue_id).or_default().push(event.timestamp);
    }

    per_ue
        .into_values()
        .flat_map(|mut stamps| {
            stamps.sort_by(f64::total_cmp);
            stamps
                .windows(2)
                .filter_map(|w| match w {
                    [a, b] => Some(b - a),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Two-sample Kolmogorov-Smirnov D statistic.
///
/// Returns `None` if either sample is empty after dropping NaNs.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> Option<f64> {
    let a = sorted_finite(a);
    let b = sorted_finite(b);
    if a.is_empty() || b.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0_usize, 0_usize);
    let mut d = 0.0_f64;

    while let (Some(&x), Some(&y)) = (a.get(i), b.get(j)) {
        let cut = x.min(y);
        while a.get(i).is_some_and(|v| *v <= cut) {
            i = i.saturating_add(1);
        }
        while b.get(j).is_some_and(|v| *v <= cut) {
            j = j.saturating_add(1);
        }
        #[allow(clippy::cast_precision_loss)]
        let gap = (i as f64 / n - j as f64 / m).abs();
        d = d.max(gap);
    }
    Some(d)
}

/// KS distance between the IAT distributions of two traces.
///
/// Returns `1.0`, the maximum distance, when either trace has no IATs
/// (fewer than two events for every UE).
pub fn temporal_fidelity(real: &[Event], generated: &[Event]) -> f64 {
    ks_statistic(&inter_arrival_times(real), &inter_arrival_times(generated)).unwrap_or(1.0)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    out.sort_by(f64::total_cmp);
    out
}
