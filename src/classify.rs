// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Author: Florian Eich <florian@bmc-labs.com>

use super::{LapSegment, ResetEvent};
use serde::Serialize;
use std::fmt;


const RACE_SIM_MIN_LAPS: usize = 10;
const RACE_SIM_MIN_SPAN: f64 = 1200.0; // 20 minutes
const CLUSTER_PCT_RANGE: f64 = 0.3;
const DOMINANT_RATIO: f64 = 0.6;


/// Driving pattern of a whole session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionClass {
  CornerIsolation,
  RaceSim,
  HotLaps,
  Mixed,
}

impl SessionClass {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::CornerIsolation => "corner_isolation",
      Self::RaceSim => "race_sim",
      Self::HotLaps => "hot_laps",
      Self::Mixed => "mixed",
    }
  }
}

impl fmt::Display for SessionClass {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}


fn counts_as_valid(segment: &LapSegment, min_valid_lap_time: f64) -> bool {
  segment.is_complete()
  && !segment.is_reset()
  && segment.lap_time() >= min_valid_lap_time
}

fn max_consecutive_valid(segments: &[LapSegment],
                         min_valid_lap_time: f64)
                         -> usize {
  let mut max_run = 0;
  let mut current_run = 0;
  for segment in segments {
    if counts_as_valid(segment, min_valid_lap_time) {
      current_run += 1;
      max_run = max_run.max(current_run);
    } else {
      current_run = 0;
    }
  }
  max_run
}


/// Labels the session's driving pattern from its lap and reset structure.
///
/// Rules are checked in fixed priority order and the first match wins:
/// mostly invalid laps with resets clustered in a narrow band of the track
/// is corner isolation practice; ten or more consecutive valid laps across
/// more than twenty minutes is a race simulation; mostly valid laps are hot
/// laps; anything else, including an empty session, is mixed.
pub fn classify_session(segments: &[LapSegment],
                        reset_events: &[ResetEvent],
                        min_valid_lap_time: f64)
                        -> SessionClass {
  if segments.is_empty() {
    return SessionClass::Mixed;
  }

  let total = segments.len();
  let valid_count = segments.iter()
                            .filter(|segment| {
                              counts_as_valid(segment, min_valid_lap_time)
                            })
                            .count();
  let invalid_count = segments.iter()
                              .filter(|segment| {
                                segment.is_reset()
                                || !segment.is_complete()
                                || segment.lap_time() < min_valid_lap_time
                              })
                              .count();

  let valid_ratio = valid_count as f64 / total as f64;
  let invalid_ratio = invalid_count as f64 / total as f64;

  if invalid_ratio > DOMINANT_RATIO && !reset_events.is_empty() {
    let pct_range = if reset_events.len() > 1 {
      let low = reset_events.iter()
                            .map(ResetEvent::lap_dist_pct)
                            .fold(f64::INFINITY, f64::min);
      let high = reset_events.iter()
                             .map(ResetEvent::lap_dist_pct)
                             .fold(f64::NEG_INFINITY, f64::max);
      high - low
    } else {
      0.0
    };
    if pct_range < CLUSTER_PCT_RANGE {
      return SessionClass::CornerIsolation;
    }
  }

  if valid_count >= RACE_SIM_MIN_LAPS {
    let session_span = segments[segments.len() - 1].end_time()
                       - segments[0].start_time();
    if session_span > RACE_SIM_MIN_SPAN
       && max_consecutive_valid(segments, min_valid_lap_time)
          >= RACE_SIM_MIN_LAPS
    {
      return SessionClass::RaceSim;
    }
  }

  if valid_ratio > DOMINANT_RATIO {
    return SessionClass::HotLaps;
  }

  SessionClass::Mixed
}
