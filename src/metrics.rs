// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{segment::MIN_LAP_DURATION, LapSegment};
use getset::CopyGetters;
use serde::Serialize;
use std::{cmp::Ordering, collections::HashSet};


/// Statistical summary over the valid laps of a session. All fields are
/// zero when no lap passed the validity gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct LapMetrics {
  lap_count:       usize,
  valid_lap_count: usize,
  best_lap:        f64,
  median_lap:      f64,
  worst_lap:       f64,
  stddev_lap:      f64,
  iqr_lap:         f64,
}


/// Same statistical shape as `LapMetrics`, computed over clean laps. The
/// clean gate is currently identical to the validity gate - events and
/// incidents annotate a lap rather than disqualify it, since an imperfect
/// but completed lap still reflects real pace - but downstream consumers
/// key on this as a separate result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct CleanMetrics {
  clean_lap_count:  usize,
  clean_best_lap:   f64,
  clean_median_lap: f64,
  clean_worst_lap:  f64,
  clean_stddev_lap: f64,
  clean_iqr_lap:    f64,
}


/// Linear interpolation percentile over an already sorted list.
fn percentile(sorted_values: &[f64], pct: f64) -> f64 {
  if sorted_values.is_empty() {
    return 0.0;
  }
  let k = (sorted_values.len() - 1) as f64 * pct;
  let f = k.floor() as usize;
  let c = (f + 1).min(sorted_values.len() - 1);
  if f == c {
    return sorted_values[f];
  }
  sorted_values[f] + (sorted_values[c] - sorted_values[f]) * (k - f as f64)
}

/// Population standard deviation; zero for fewer than two values.
fn pstdev(values: &[f64]) -> f64 {
  if values.len() < 2 {
    return 0.0;
  }
  let mean = values.iter().sum::<f64>() / values.len() as f64;
  let variance = values.iter()
                       .map(|value| (value - mean) * (value - mean))
                       .sum::<f64>()
                 / values.len() as f64;
  variance.sqrt()
}

fn sorted_valid_times(segments: &[LapSegment],
                      min_time: f64,
                      max_time: f64)
                      -> Vec<f64> {
  let mut times: Vec<f64> =
    segments.iter()
            .filter(|segment| is_valid_lap(segment, min_time, max_time))
            .map(|segment| segment.lap_time())
            .collect();
  times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
  times
}


/// The sole gate for inclusion in lap statistics: the segment is complete,
/// not a reset, carries an engine reported time and that time lies within
/// the track specific window. A `max_time` of zero leaves the upper side
/// unbounded.
pub fn is_valid_lap(segment: &LapSegment,
                    min_time: f64,
                    max_time: f64)
                    -> bool {
  if !segment.is_complete() || segment.is_reset() {
    return false;
  }
  if !segment.has_official_time() {
    return false;
  }
  if segment.lap_time() < min_time {
    return false;
  }
  if max_time > 0.0 && segment.lap_time() > max_time {
    return false;
  }
  true
}


pub fn compute_lap_metrics(segments: &[LapSegment],
                           min_valid_lap_time: f64,
                           max_valid_lap_time: f64)
                           -> LapMetrics {
  let times =
    sorted_valid_times(segments, min_valid_lap_time, max_valid_lap_time);
  if times.is_empty() {
    return LapMetrics::default();
  }

  LapMetrics { lap_count:       segments.len(),
               valid_lap_count: times.len(),
               best_lap:        times[0],
               median_lap:      percentile(&times, 0.5),
               worst_lap:       times[times.len() - 1],
               stddev_lap:      pstdev(&times),
               iqr_lap:         percentile(&times, 0.75)
                                - percentile(&times, 0.25), }
}

pub fn compute_clean_metrics(segments: &[LapSegment],
                             min_valid_lap_time: f64,
                             max_valid_lap_time: f64)
                             -> CleanMetrics {
  let times =
    sorted_valid_times(segments, min_valid_lap_time, max_valid_lap_time);
  if times.is_empty() {
    return CleanMetrics::default();
  }

  CleanMetrics { clean_lap_count:  times.len(),
                 clean_best_lap:   times[0],
                 clean_median_lap: percentile(&times, 0.5),
                 clean_worst_lap:  times[times.len() - 1],
                 clean_stddev_lap: pstdev(&times),
                 clean_iqr_lap:    percentile(&times, 0.75)
                                   - percentile(&times, 0.25), }
}


/// Replaces the best lap with an externally reported value, e.g. the
/// simulator's own best lap channel. Non-positive overrides are ignored.
pub fn override_best_lap(metrics: LapMetrics, best_lap_time: f64)
                         -> LapMetrics {
  if best_lap_time <= 0.0 {
    return metrics;
  }
  LapMetrics { best_lap: best_lap_time,
               ..metrics }
}


/// Lap numbers driven on cold tyres.
///
/// After a reset the driver usually does an untimed recovery lap back to
/// the start/finish line, which warms the tyres again. So the first
/// full length lap after a reset is flagged as an outlap only when it is
/// itself a valid lap; any full length lap, valid or not, clears the cold
/// tyre state for the laps after it.
pub fn identify_outlaps(segments: &[LapSegment],
                        min_valid_lap_time: f64,
                        max_valid_lap_time: f64)
                        -> HashSet<i32> {
  let mut outlaps = HashSet::new();
  let mut need_outlap = true; // session starts on cold tyres

  for segment in segments {
    if segment.is_reset() {
      need_outlap = true;
    } else if segment.is_complete()
              && segment.lap_time() > MIN_LAP_DURATION
    {
      if need_outlap
         && is_valid_lap(segment, min_valid_lap_time, max_valid_lap_time)
      {
        outlaps.insert(segment.lap_number());
      }
      need_outlap = false;
    }
  }

  outlaps
}


#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;


  fn lap(number: i32,
         time: f64,
         complete: bool,
         reset: bool,
         official: bool)
         -> LapSegment {
    LapSegment::new(number, 0, 1, 0.0, time, time, complete, reset, official)
  }

  fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
  }

  #[test]
  fn is_valid_lap_test() {
    assert_eq!(true, is_valid_lap(&lap(1, 95.0, true, false, true), 0.0, 0.0));
    assert_eq!(false,
               is_valid_lap(&lap(1, 95.0, false, false, true), 0.0, 0.0));
    assert_eq!(false,
               is_valid_lap(&lap(1, 95.0, true, true, true), 0.0, 0.0));
    assert_eq!(false,
               is_valid_lap(&lap(1, 95.0, true, false, false), 0.0, 0.0));
    assert_eq!(false,
               is_valid_lap(&lap(1, 95.0, true, false, true), 100.0, 0.0));
    assert_eq!(false,
               is_valid_lap(&lap(1, 95.0, true, false, true), 0.0, 90.0));
    // a zero upper bound leaves the window open ended
    assert_eq!(true,
               is_valid_lap(&lap(1, 600.0, true, false, true), 0.0, 0.0));
  }

  #[test]
  fn lap_metrics_test() {
    let segments = vec![lap(1, 91.5, true, false, true),
                        lap(2, 95.0, true, false, true),
                        lap(3, 30.0, true, true, true), // reset, ignored
                        lap(4, 90.0, true, false, true),
                        lap(5, 92.0, true, false, true),
                        lap(6, 45.0, false, false, false)]; // in progress

    let metrics = compute_lap_metrics(&segments, 0.0, 0.0);
    // valid durations sorted: [90.0, 91.5, 92.0, 95.0]
    assert_eq!(6, metrics.lap_count());
    assert_eq!(4, metrics.valid_lap_count());
    assert_eq!(90.0, metrics.best_lap());
    assert_eq!(95.0, metrics.worst_lap());
    assert_eq!(91.75, metrics.median_lap());
    assert_eq!(true, close(1.625, metrics.iqr_lap())); // 92.75 - 91.125
    assert_eq!(true, close(3.296875f64.sqrt(), metrics.stddev_lap()));

    let clean = compute_clean_metrics(&segments, 0.0, 0.0);
    assert_eq!(4, clean.clean_lap_count());
    assert_eq!(90.0, clean.clean_best_lap());
    assert_eq!(95.0, clean.clean_worst_lap());
    assert_eq!(metrics.median_lap(), clean.clean_median_lap());
    assert_eq!(metrics.stddev_lap(), clean.clean_stddev_lap());
    assert_eq!(metrics.iqr_lap(), clean.clean_iqr_lap());
  }

  #[test]
  fn quartile_test() {
    // five laps with evenly spread durations: exact quartile indices
    let segments: Vec<LapSegment> =
      (0..5).map(|k| lap(k, 90.0 + k as f64, true, false, true)).collect();
    let metrics = compute_lap_metrics(&segments, 0.0, 0.0);
    assert_eq!(92.0, metrics.median_lap());
    assert_eq!(2.0, metrics.iqr_lap()); // P75(93) - P25(91)
  }

  #[test]
  fn no_valid_laps_test() {
    // every duration outside the window: zeroed statistics, not an error
    let segments = vec![lap(1, 55.0, true, false, true),
                        lap(2, 250.0, true, false, true)];
    assert_eq!(LapMetrics::default(),
               compute_lap_metrics(&segments, 60.0, 200.0));
    assert_eq!(CleanMetrics::default(),
               compute_clean_metrics(&segments, 60.0, 200.0));
    assert_eq!(LapMetrics::default(), compute_lap_metrics(&[], 0.0, 0.0));
  }

  #[test]
  fn override_best_lap_test() {
    let metrics = compute_lap_metrics(&[lap(1, 95.0, true, false, true)],
                                      0.0,
                                      0.0);
    assert_eq!(95.0, metrics.best_lap());
    assert_eq!(94.2, override_best_lap(metrics, 94.2).best_lap());
    assert_eq!(95.0, override_best_lap(metrics, 0.0).best_lap());
    assert_eq!(95.0, override_best_lap(metrics, -1.0).best_lap());
    // only the best lap changes
    assert_eq!(metrics.median_lap(),
               override_best_lap(metrics, 94.2).median_lap());
  }

  #[test]
  fn outlap_test() {
    // session start counts as cold tyres: lap 1 is an outlap. the reset in
    // lap 3 is followed directly by a valid lap 4, which is an outlap too.
    let segments = vec![lap(1, 95.0, true, false, true),
                        lap(2, 94.0, true, false, true),
                        lap(3, 40.0, false, true, false),
                        lap(4, 96.0, true, false, true)];
    let outlaps = identify_outlaps(&segments, 0.0, 0.0);
    assert_eq!(vec![1, 4],
               { let mut laps: Vec<i32> = outlaps.into_iter().collect();
                 laps.sort_unstable();
                 laps });
  }

  #[test]
  fn outlap_recovery_lap_test() {
    // the full length recovery lap after the reset is invalid (no official
    // time) but warms the tyres, so the valid lap after it is no outlap
    let segments = vec![lap(1, 95.0, true, false, true),
                        lap(2, 40.0, false, true, false),
                        lap(3, 120.0, true, false, false),
                        lap(4, 94.0, true, false, true)];
    let outlaps = identify_outlaps(&segments, 0.0, 0.0);
    assert_eq!(vec![1], { let mut laps: Vec<i32> =
                            outlaps.into_iter().collect();
                          laps.sort_unstable();
                          laps });

    // a short recovery attempt does not clear the cold tyre state
    let segments = vec![lap(1, 95.0, true, false, true),
                        lap(2, 40.0, false, true, false),
                        lap(3, 30.0, true, false, false),
                        lap(4, 94.0, true, false, true)];
    let outlaps = identify_outlaps(&segments, 0.0, 0.0);
    assert_eq!(vec![1, 4], { let mut laps: Vec<i32> =
                               outlaps.into_iter().collect();
                             laps.sort_unstable();
                             laps });
  }
}
