// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{LapSegment, TelemetryError};
use crate::Result;
use getset::CopyGetters;
use serde::Serialize;
use std::{cmp::Ordering, collections::HashMap, fmt};


// detection thresholds, tuned conservative: a missed event is preferable to
// a phantom one
const SPIN_YAW_RATE: f64 = 2.0; // rad/s
const SAVE_YAW_RATE: f64 = 1.2; // rad/s
const MIN_SPIN_SPEED: f64 = 8.0; // m/s
const MIN_SAVE_SPEED: f64 = 12.0; // m/s
const MIN_SAVE_STEER: f64 = 0.4; // rad

const MIN_RUN_SECONDS: f64 = 0.5;
const COOLDOWN_SECONDS: f64 = 1.5;
const FALLBACK_SAMPLE_RATE: f64 = 60.0;

/// Default distance fraction width of one hotspot bucket.
pub const HOTSPOT_BUCKET_SIZE: f64 = 0.05;


/// Kind of a detected driving error.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  OffTrack,
  Spin,
  BigSave,
}

impl EventKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::OffTrack => "off_track",
      Self::Spin => "spin",
      Self::BigSave => "big_save",
    }
  }

  /// Whether this kind counts against a lap. A big save is aggressive
  /// driving that worked out, not a fault.
  pub fn is_serious(&self) -> bool {
    !matches!(self, Self::BigSave)
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}


/// One detected driving error, anchored to the sample it was confirmed at.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct IncidentEvent {
  kind:         EventKind,
  index:        usize,
  session_time: f64,
  lap_number:   i32,
}

impl IncidentEvent {
  pub fn new(kind: EventKind,
             index: usize,
             session_time: f64,
             lap_number: i32)
             -> Self {
    Self { kind,
           index,
           session_time,
           lap_number }
  }
}


/// Estimates the sampling rate from the median of positive consecutive
/// timestamp deltas. Yields 0.0 when no estimate is possible.
fn sample_rate(session_time: &[f64]) -> f64 {
  if session_time.len() < 2 {
    return 0.0;
  }
  let mut deltas: Vec<f64> = session_time.windows(2)
                                         .map(|pair| pair[1] - pair[0])
                                         .filter(|&delta| delta > 0.0)
                                         .collect();
  if deltas.is_empty() {
    return 0.0;
  }
  deltas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

  let mid = deltas.len() / 2;
  let median = if deltas.len() % 2 == 0 {
    (deltas[mid - 1] + deltas[mid]) / 2.0
  } else {
    deltas[mid]
  };
  1.0 / median
}


/// Detects off track excursions, spins and corrective saves from kinematic
/// channels using run length thresholds with a shared cooldown.
///
/// Off track and spin runs must persist for half a second of samples and are
/// reported at the last sample of the run; a save needs no run length and is
/// reported immediately. Each detection opens a 1.5 second cooldown during
/// which only the off track counter keeps arming, so at most one event fires
/// per window. A pure function of its inputs; repeated runs yield identical
/// results.
pub fn detect_events(session_time: &[f64],
                     lap: &[i32],
                     speed: &[f64],
                     yaw_rate: &[f64],
                     steering_angle: &[f64],
                     is_on_track: &[bool])
                     -> Result<Vec<IncidentEvent>> {
  if [lap.len(),
      speed.len(),
      yaw_rate.len(),
      steering_angle.len(),
      is_on_track.len()].iter()
                        .any(|&len| len != session_time.len())
  {
    return Err(TelemetryError::InputShape("all input channels must be the \
                                           same length".to_string()).into());
  }

  let mut hz = sample_rate(session_time);
  if hz <= 0.0 {
    hz = FALLBACK_SAMPLE_RATE;
  }

  let min_off_track_samples = (MIN_RUN_SECONDS * hz).max(1.0) as usize;
  let min_spin_samples = (MIN_RUN_SECONDS * hz).max(1.0) as usize;
  let cooldown_samples = (COOLDOWN_SECONDS * hz).max(1.0) as usize;

  let mut events = Vec::new();
  let mut cooldown = 0usize;
  let mut off_track_run = 0usize;
  let mut spin_run = 0usize;

  for i in 0..session_time.len() {
    if cooldown > 0 {
      cooldown -= 1;
    }

    if !is_on_track[i] {
      off_track_run += 1;
    } else {
      if off_track_run >= min_off_track_samples {
        events.push(IncidentEvent::new(EventKind::OffTrack,
                                       i - 1,
                                       session_time[i - 1],
                                       lap[i - 1]));
        cooldown = cooldown_samples;
      }
      off_track_run = 0;
    }

    if cooldown > 0 {
      spin_run = 0;
      continue;
    }

    if yaw_rate[i].abs() >= SPIN_YAW_RATE && speed[i] >= MIN_SPIN_SPEED {
      spin_run += 1;
    } else {
      if spin_run >= min_spin_samples {
        events.push(IncidentEvent::new(EventKind::Spin,
                                       i - 1,
                                       session_time[i - 1],
                                       lap[i - 1]));
        cooldown = cooldown_samples;
      }
      spin_run = 0;
    }

    if cooldown == 0
       && yaw_rate[i].abs() >= SAVE_YAW_RATE
       && speed[i] >= MIN_SAVE_SPEED
       && steering_angle[i].abs() >= MIN_SAVE_STEER
    {
      events.push(IncidentEvent::new(EventKind::BigSave,
                                     i,
                                     session_time[i],
                                     lap[i]));
      cooldown = cooldown_samples;
    }
  }

  Ok(events)
}


/// Per lap incident tally from the simulator's own pulse channel. The
/// channel spikes for a single tick and returns to zero, so only rising
/// edges count; the value behind each edge is summed within each segment's
/// index range.
pub fn incident_counts(player_incidents: &[i32],
                       segments: &[LapSegment])
                       -> HashMap<i32, i32> {
  let mut by_lap = HashMap::new();
  if player_incidents.is_empty() {
    return by_lap;
  }

  for segment in segments {
    let mut total = 0;
    let upper = (segment.end_idx() + 1).min(player_incidents.len());
    for i in segment.start_idx()..upper {
      let value = player_incidents[i];
      let previous = if i > 0 { player_incidents[i - 1] } else { 0 };
      if value > 0 && previous == 0 {
        total += value;
      }
    }
    by_lap.insert(segment.lap_number(), total);
  }

  by_lap
}


/// Total detected events per kind.
pub fn summarize_events(events: &[IncidentEvent])
                        -> HashMap<EventKind, usize> {
  let mut summary = HashMap::new();
  for event in events {
    *summary.entry(event.kind()).or_insert(0) += 1;
  }
  summary
}


/// Number of detected events per lap, all kinds included.
pub fn event_counts_by_lap(events: &[IncidentEvent]) -> HashMap<i32, i32> {
  let mut counts = HashMap::new();
  for event in events {
    *counts.entry(event.lap_number()).or_insert(0) += 1;
  }
  counts
}

/// Number of off track and spin events per lap; big saves are excluded.
pub fn serious_event_counts_by_lap(events: &[IncidentEvent])
                                   -> HashMap<i32, i32> {
  let mut counts = HashMap::new();
  for event in events {
    if event.kind().is_serious() {
      *counts.entry(event.lap_number()).or_insert(0) += 1;
    }
  }
  counts
}


/// Buckets events along the lap by distance fraction and returns
/// `(bucket start, bucket end, count)` triples, busiest bucket first.
pub fn hotspot_buckets(events: &[IncidentEvent],
                       lap_dist_pct: &[f64],
                       bucket_size: f64)
                       -> Vec<(f64, f64, usize)> {
  let round4 = |value: f64| (value * 1e4).round() / 1e4;

  let mut buckets: HashMap<i64, usize> = HashMap::new();
  for event in events {
    if event.index() >= lap_dist_pct.len() {
      continue;
    }
    let pct = lap_dist_pct[event.index()];
    if pct < 0.0 {
      continue;
    }
    *buckets.entry((pct / bucket_size).floor() as i64).or_insert(0) += 1;
  }

  let mut results: Vec<(f64, f64, usize)> =
    buckets.into_iter()
           .map(|(bucket, count)| {
             let start = round4(bucket as f64 * bucket_size);
             (start, round4(start + bucket_size), count)
           })
           .collect();
  results.sort_by(|a, b| b.2.cmp(&a.2));
  results
}
