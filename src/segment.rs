// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::TelemetryError;
use crate::Result;
use getset::CopyGetters;
use serde::{Deserialize, Serialize};


/// Default distance fraction drop between two samples treated as a rollback.
pub const DIST_DROP_THRESHOLD: f64 = 0.05;

/// Shortest duration a lap counter increment is trusted as a real lap. The
/// counter increments even on some aborted attempts; anything quicker than
/// this is recorded as a reset.
pub const MIN_LAP_DURATION: f64 = 60.0;


/// Thresholds steering lap boundary detection. The defaults match the
/// behavior the derived data downstream is calibrated against; override them
/// only for unusual venues.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
#[serde(default)]
pub struct SegmentationConfig {
  dist_drop_threshold: f64,
  min_lap_duration:    f64,
}

impl SegmentationConfig {
  pub fn new(dist_drop_threshold: f64, min_lap_duration: f64) -> Self {
    Self { dist_drop_threshold,
           min_lap_duration }
  }
}

impl Default for SegmentationConfig {
  fn default() -> Self {
    Self { dist_drop_threshold: DIST_DROP_THRESHOLD,
           min_lap_duration:    MIN_LAP_DURATION, }
  }
}


/// One physical loop attempt, delimited by a lap counter increment or a
/// distance fraction rollback. Segments partition the record index space;
/// each segment ends on the sample right before the next one starts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct LapSegment {
  lap_number:        i32,
  start_idx:         usize,
  end_idx:           usize,
  start_time:        f64,
  end_time:          f64,
  lap_time:          f64,
  is_complete:       bool,
  is_reset:          bool,
  has_official_time: bool,
}

impl LapSegment {
  pub fn new(lap_number: i32,
             start_idx: usize,
             end_idx: usize,
             start_time: f64,
             end_time: f64,
             lap_time: f64,
             is_complete: bool,
             is_reset: bool,
             has_official_time: bool)
             -> Self {
    Self { lap_number,
           start_idx,
           end_idx,
           start_time,
           end_time,
           lap_time,
           is_complete,
           is_reset,
           has_official_time }
  }
}


/// A return to a prior track position, invalidating the attempt in progress.
/// Captured at the position the car was recalled from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ResetEvent {
  lap_number:   i32,
  lap_dist_pct: f64,
  index:        usize,
}

impl ResetEvent {
  pub fn new(lap_number: i32, lap_dist_pct: f64, index: usize) -> Self {
    Self { lap_number,
           lap_dist_pct,
           index }
  }
}


fn check_lengths(reference: usize, others: &[usize]) -> Result<()> {
  if others.iter().any(|&len| len != reference) {
    return Err(TelemetryError::InputShape("all input channels must be the \
                                           same length".to_string()).into());
  }
  Ok(())
}


/// Partitions the recording into lap segments.
///
/// A boundary occurs between two consecutive samples when the distance
/// fraction rolls back by more than the configured threshold or the lap
/// counter increases; both at once is still one boundary. The closed
/// segment takes the engine reported lap duration when it is positive and a
/// synthesized `end - start` duration otherwise. Whatever samples remain
/// after the last boundary become a trailing segment for the unfinished lap
/// at recording end.
pub fn segment_laps(session_time: &[f64],
                    lap: &[i32],
                    lap_dist_pct: &[f64],
                    lap_last_lap_time: &[f64],
                    lap_completed: &[i32],
                    config: &SegmentationConfig)
                    -> Result<Vec<LapSegment>> {
  check_lengths(session_time.len(),
                &[lap.len(),
                  lap_dist_pct.len(),
                  lap_last_lap_time.len(),
                  lap_completed.len()])?;

  let mut segments = Vec::new();
  if session_time.is_empty() {
    return Ok(segments);
  }

  let mut start_idx = 0usize;
  let mut last_lap_completed = lap_completed[0];

  for i in 1..session_time.len() {
    let dist_drop =
      lap_dist_pct[i] < lap_dist_pct[i - 1] - config.dist_drop_threshold();
    let lap_increment = lap[i] > lap[i - 1];
    if !dist_drop && !lap_increment {
      continue;
    }

    let end_idx = i - 1;
    let end_time = session_time[end_idx];

    let official_time = lap_last_lap_time[i];
    let has_official_time = official_time > 0.0;
    let lap_time = if has_official_time {
      official_time
    } else {
      end_time - session_time[start_idx]
    };

    let completed_now = lap_completed[i];
    let is_complete = completed_now > last_lap_completed || lap_increment;
    let is_reset = (dist_drop && !lap_increment)
                   || (lap_increment && lap_time < config.min_lap_duration());

    segments.push(LapSegment::new(lap[i - 1],
                                  start_idx,
                                  end_idx,
                                  session_time[start_idx],
                                  end_time,
                                  lap_time,
                                  is_complete,
                                  is_reset,
                                  has_official_time));

    start_idx = i;
    last_lap_completed = completed_now;
  }

  if session_time.len() > 1 && start_idx < session_time.len() - 1 {
    let end_idx = session_time.len() - 1;
    segments.push(LapSegment::new(lap[end_idx],
                                  start_idx,
                                  end_idx,
                                  session_time[start_idx],
                                  session_time[end_idx],
                                  session_time[end_idx]
                                  - session_time[start_idx],
                                  false,
                                  false,
                                  false));
  }

  Ok(segments)
}


/// Runs the boundary scan of `segment_laps` over the position channels alone
/// and reports each rollback without a counter increment. Used when only
/// reset locations are needed, not the full lap structure.
pub fn detect_reset_events(lap: &[i32],
                           lap_dist_pct: &[f64],
                           session_time: &[f64],
                           config: &SegmentationConfig)
                           -> Result<Vec<ResetEvent>> {
  check_lengths(lap.len(), &[lap_dist_pct.len(), session_time.len()])?;

  let mut events = Vec::new();
  for i in 1..lap.len() {
    let dist_drop =
      lap_dist_pct[i] < lap_dist_pct[i - 1] - config.dist_drop_threshold();
    let lap_increment = lap[i] > lap[i - 1];
    if dist_drop && !lap_increment {
      events.push(ResetEvent::new(lap[i - 1], lap_dist_pct[i - 1], i));
    }
  }

  Ok(events)
}
