// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{classify_session,
            compute_clean_metrics,
            compute_lap_metrics,
            compute_sector_times,
            detect_events,
            detect_reset_events,
            event_counts_by_lap,
            identify_outlaps,
            incident_counts,
            override_best_lap,
            segment_laps,
            serious_event_counts_by_lap,
            CleanMetrics,
            IbtFile,
            IncidentEvent,
            LapMetrics,
            LapSegment,
            ResetEvent,
            SectorTime,
            SegmentationConfig,
            SessionClass,
            Zone};
use crate::Result;
use chrono::NaiveDateTime;
use getset::{CopyGetters, Getters};
use lazy_static::lazy_static;
use log::debug;
use serde::Deserialize;
use std::{collections::{HashMap, HashSet},
          path::Path};


/// Channels every recording must carry for lap derivation.
pub const REQUIRED_CHANNELS: [&str; 7] = ["SessionTime",
                                          "Lap",
                                          "LapDistPct",
                                          "LapLastLapTime",
                                          "LapCompleted",
                                          "PlayerIncidents",
                                          "LapBestLapTime"];

/// Channels event detection additionally needs. Recordings without them
/// still derive laps and metrics; they just report no events.
pub const EVENT_CHANNELS: [&str; 7] = ["SessionTime",
                                       "Lap",
                                       "LapDistPct",
                                       "Speed",
                                       "YawRate",
                                       "SteeringWheelAngle",
                                       "IsOnTrack"];


lazy_static! {
  static ref METADATA_KEYS: HashMap<&'static str, &'static str> = {
    let mut keys = HashMap::new();
    keys.insert("TrackDisplayName", "track");
    keys.insert("TrackName", "track_id");
    keys.insert("CarScreenName", "car");
    keys.insert("CarClassShortName", "car_class");
    keys.insert("SessionType", "session_type");
    keys
  };
}

/// Pulls the interesting keys out of the colon delimited session info text.
pub fn extract_session_metadata(session_info: &str)
                                -> HashMap<String, String> {
  let mut metadata = HashMap::new();
  for line in session_info.lines() {
    let (key, value) = match line.split_once(':') {
      Some(pair) => pair,
      None => continue,
    };
    if let Some(&mapped) = METADATA_KEYS.get(key.trim()) {
      metadata.insert(mapped.to_string(), value.trim().to_string());
    }
    if metadata.len() == METADATA_KEYS.len() {
      break;
    }
  }
  metadata
}


/// Caller supplied analysis configuration: the track specific valid lap
/// window, optional named zones for sector timing and the segmentation
/// thresholds. The library never resolves a track identifier to this
/// configuration itself.
#[derive(Clone, Debug, Default, Deserialize, CopyGetters, Getters)]
#[serde(default)]
pub struct AnalysisOptions {
  #[getset(get_copy = "pub")]
  min_valid_lap_time: f64,
  #[getset(get_copy = "pub")]
  max_valid_lap_time: f64,
  #[getset(get = "pub")]
  zones:              Vec<Zone>,
  #[getset(get = "pub")]
  segmentation:       SegmentationConfig,
}

impl AnalysisOptions {
  /// A zero bound disables that side of the window.
  pub fn new(min_valid_lap_time: f64, max_valid_lap_time: f64) -> Self {
    Self { min_valid_lap_time,
           max_valid_lap_time,
           ..Self::default() }
  }

  pub fn with_zones(mut self, zones: Vec<Zone>) -> Self {
    self.zones = zones;
    self
  }

  pub fn with_segmentation(mut self, segmentation: SegmentationConfig)
                           -> Self {
    self.segmentation = segmentation;
    self
  }
}


/// Everything derived from one recording in a single pass: lap structure,
/// events, statistics, sector times and the session classification.
#[derive(Clone, Debug, CopyGetters, Getters)]
pub struct SessionData {
  #[getset(get_copy = "pub")]
  datetime:              NaiveDateTime,
  #[getset(get = "pub")]
  metadata:              HashMap<String, String>,
  #[getset(get = "pub")]
  segments:              Vec<LapSegment>,
  #[getset(get = "pub")]
  reset_events:          Vec<ResetEvent>,
  #[getset(get = "pub")]
  events:                Vec<IncidentEvent>,
  #[getset(get = "pub")]
  incidents_by_lap:      HashMap<i32, i32>,
  #[getset(get = "pub")]
  events_by_lap:         HashMap<i32, i32>,
  #[getset(get = "pub")]
  serious_events_by_lap: HashMap<i32, i32>,
  #[getset(get_copy = "pub")]
  metrics:               LapMetrics,
  #[getset(get_copy = "pub")]
  clean_metrics:         CleanMetrics,
  #[getset(get = "pub")]
  outlaps:               HashSet<i32>,
  #[getset(get = "pub")]
  sector_times:          Vec<SectorTime>,
  #[getset(get_copy = "pub")]
  classification:        SessionClass,
}

impl SessionData {
  /// Loads a recording from disk and derives the full session data.
  pub fn load(path: &Path, options: &AnalysisOptions) -> Result<Self> {
    Self::analyze(&IbtFile::load(path)?, options)
  }

  /// Derives the full session data from an already decoded recording.
  pub fn analyze(file: &IbtFile, options: &AnalysisOptions) -> Result<Self> {
    let channels = file.channels(&REQUIRED_CHANNELS)?;
    let session_time = channels[0].floats()?;
    let lap = channels[1].ints()?;
    let lap_dist_pct = channels[2].floats()?;
    let lap_last_lap_time = channels[3].floats()?;
    let lap_completed = channels[4].ints()?;
    let player_incidents = channels[5].ints()?;
    let best_lap_channel = channels[6].floats()?;

    let segments = segment_laps(&session_time,
                                &lap,
                                &lap_dist_pct,
                                &lap_last_lap_time,
                                &lap_completed,
                                options.segmentation())?;
    let reset_events = detect_reset_events(&lap,
                                           &lap_dist_pct,
                                           &session_time,
                                           options.segmentation())?;
    debug!("derived {} segments and {} reset events",
           segments.len(),
           reset_events.len());

    let mut metrics = compute_lap_metrics(&segments,
                                          options.min_valid_lap_time(),
                                          options.max_valid_lap_time());
    let reported_best = best_lap_channel.iter()
                                        .copied()
                                        .filter(|&value| value > 0.0)
                                        .fold(f64::INFINITY, f64::min);
    if reported_best.is_finite() {
      metrics = override_best_lap(metrics, reported_best);
    }
    let clean_metrics = compute_clean_metrics(&segments,
                                              options.min_valid_lap_time(),
                                              options.max_valid_lap_time());

    let events = if EVENT_CHANNELS.iter().all(|name| file.has_var(name)) {
      let kinematics = file.channels(&["Speed",
                                       "YawRate",
                                       "SteeringWheelAngle",
                                       "IsOnTrack"])?;
      detect_events(&session_time,
                    &lap,
                    &kinematics[0].floats()?,
                    &kinematics[1].floats()?,
                    &kinematics[2].floats()?,
                    &kinematics[3].bools()?)?
    } else {
      debug!("kinematic channels missing, skipping event detection");
      Vec::new()
    };

    let sector_times = compute_sector_times(&session_time,
                                            &lap_dist_pct,
                                            &segments,
                                            options.zones())?;

    let classification = classify_session(&segments,
                                          &reset_events,
                                          options.min_valid_lap_time());

    Ok(Self { datetime: file.datetime()?,
              metadata: extract_session_metadata(file.session_info()),
              incidents_by_lap: incident_counts(&player_incidents,
                                                &segments),
              events_by_lap: event_counts_by_lap(&events),
              serious_events_by_lap: serious_event_counts_by_lap(&events),
              outlaps: identify_outlaps(&segments,
                                        options.min_valid_lap_time(),
                                        options.max_valid_lap_time()),
              segments,
              reset_events,
              events,
              metrics,
              clean_metrics,
              sector_times,
              classification })
  }

  pub fn number_of_laps(&self) -> usize {
    self.segments.len()
  }

  pub fn number_of_events(&self) -> usize {
    self.events.len()
  }
}
