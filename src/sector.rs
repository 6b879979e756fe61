// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{LapSegment, TelemetryError};
use crate::Result;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;


// a forward jump this large within one lap is a wrap artifact, not driving
const WRAP_JUMP: f64 = 0.5;

fn round4(value: f64) -> f64 {
  (value * 1e4).round() / 1e4
}


/// A named `[start, end)` distance fraction range of the track, possibly
/// wrapping across the start/finish line. Supplied by the caller as already
/// resolved track configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, CopyGetters,
         Getters)]
pub struct Zone {
  #[getset(get = "pub")]
  name:  String,
  #[getset(get_copy = "pub")]
  start: f64,
  #[getset(get_copy = "pub")]
  end:   f64,
}

impl Zone {
  pub fn new(name: String, start: f64, end: f64) -> Self {
    Self { name, start, end }
  }
}


/// Time spent in one zone during one lap.
#[derive(Clone, Debug, PartialEq, Serialize, CopyGetters, Getters)]
pub struct SectorTime {
  #[getset(get_copy = "pub")]
  lap_number:  i32,
  #[getset(get = "pub")]
  sector_name: String,
  #[getset(get_copy = "pub")]
  sector_time: f64,
}

impl SectorTime {
  pub fn new(lap_number: i32, sector_name: String, sector_time: f64) -> Self {
    Self { lap_number,
           sector_name,
           sector_time }
  }
}


/// Finds the interpolated time at which the distance fraction first crosses
/// a boundary within a lap's index range. Only forward, non wrapping
/// crossings qualify.
fn find_boundary_crossing(session_time: &[f64],
                          lap_dist_pct: &[f64],
                          start_idx: usize,
                          end_idx: usize,
                          boundary: f64)
                          -> Option<f64> {
  for i in start_idx..end_idx {
    let pct_before = lap_dist_pct[i];
    let pct_after = lap_dist_pct[i + 1];

    if pct_before < boundary
       && boundary <= pct_after
       && (pct_after - pct_before) < WRAP_JUMP
    {
      let frac = (boundary - pct_before) / (pct_after - pct_before);
      return Some(session_time[i]
                  + frac * (session_time[i + 1] - session_time[i]));
    }
  }
  None
}


/// Computes per lap zone durations by interpolating the session time at
/// each zone boundary crossing.
///
/// A lap yields sector times only when every boundary resolves; laps with
/// partially resolved boundaries are skipped entirely rather than reported
/// with estimated sectors. Durations are rounded to four decimals.
pub fn compute_sector_times(session_time: &[f64],
                            lap_dist_pct: &[f64],
                            segments: &[LapSegment],
                            zones: &[Zone])
                            -> Result<Vec<SectorTime>> {
  if session_time.len() != lap_dist_pct.len() {
    return Err(TelemetryError::InputShape("session time and distance \
                                           fraction channels must be the \
                                           same length".to_string()).into());
  }

  let mut results = Vec::new();
  if zones.is_empty() || segments.is_empty() {
    return Ok(results);
  }

  // zone edges strictly inside the lap; start/finish is implicit
  let mut boundaries: Vec<f64> =
    zones.iter()
         .flat_map(|zone| vec![zone.start(), zone.end()])
         .filter(|&boundary| boundary > 0.0 && boundary < 1.0)
         .collect();
  boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
  boundaries.dedup();

  for segment in segments {
    if !segment.is_complete() {
      continue;
    }
    let start_idx = segment.start_idx();
    let end_idx = segment.end_idx();
    if end_idx <= start_idx || end_idx >= session_time.len() {
      continue;
    }

    let mut crossing_times = vec![session_time[start_idx]];
    for &boundary in &boundaries {
      if let Some(time) = find_boundary_crossing(session_time,
                                                 lap_dist_pct,
                                                 start_idx,
                                                 end_idx,
                                                 boundary)
      {
        crossing_times.push(time);
      }
    }
    crossing_times.push(session_time[end_idx]);

    if crossing_times.len() != boundaries.len() + 2 {
      continue;
    }

    for (k, zone) in zones.iter().enumerate() {
      if k + 1 < crossing_times.len() {
        let sector_time = crossing_times[k + 1] - crossing_times[k];
        results.push(SectorTime::new(segment.lap_number(),
                                     zone.name().clone(),
                                     round4(sector_time)));
      }
    }
  }

  Ok(results)
}


/// Maps a distance fraction to the name of the first zone containing it,
/// honoring zones which wrap across the start/finish line.
pub fn tag_zone<'a>(lap_dist_pct: f64, zones: &'a [Zone]) -> Option<&'a str> {
  for zone in zones {
    if zone.start() <= zone.end() {
      if zone.start() <= lap_dist_pct && lap_dist_pct < zone.end() {
        return Some(zone.name());
      }
    } else if lap_dist_pct >= zone.start() || lap_dist_pct < zone.end() {
      return Some(zone.name());
    }
  }
  None
}
