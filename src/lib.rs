// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

mod channel;
mod classify;
mod error;
mod event;
mod ibt_file;
mod metrics;
mod sector;
mod segment;
mod session;

pub use channel::{Channel, ChannelValue, VarType};
pub use classify::{classify_session, SessionClass};
pub use error::{Result, TelemetryError};
pub use event::{detect_events,
                event_counts_by_lap,
                hotspot_buckets,
                incident_counts,
                serious_event_counts_by_lap,
                summarize_events,
                EventKind,
                IncidentEvent,
                HOTSPOT_BUCKET_SIZE};
pub use ibt_file::{DiskHeader,
                   IbtFile,
                   Records,
                   TelemetryHeader,
                   VarBuf,
                   VarHeader};
pub use metrics::{compute_clean_metrics,
                  compute_lap_metrics,
                  identify_outlaps,
                  is_valid_lap,
                  override_best_lap,
                  CleanMetrics,
                  LapMetrics};
pub use sector::{compute_sector_times, tag_zone, SectorTime, Zone};
pub use segment::{detect_reset_events,
                  segment_laps,
                  LapSegment,
                  ResetEvent,
                  SegmentationConfig,
                  DIST_DROP_THRESHOLD,
                  MIN_LAP_DURATION};
pub use session::{extract_session_metadata,
                  AnalysisOptions,
                  SessionData,
                  EVENT_CHANNELS,
                  REQUIRED_CHANNELS};
