// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use thiserror::Error;


/// Result type used throughout the library. Errors which callers are
/// expected to distinguish are raised as `TelemetryError` and can be
/// recovered with `Report::downcast_ref`; everything else is an ad hoc
/// report.
pub type Result<T> = eyre::Result<T>;


/// Errors a caller may want to handle individually rather than bubble up.
///
/// - `Format` is fatal to the decode of the recording it occurred in; the
///   byte source is truncated or malformed and there is no partial recovery.
/// - `UnknownChannel` is fatal only to the decode call which requested the
///   channel. Callers may treat it as "feature unavailable" and continue,
///   e.g. skip event detection when kinematic channels were not recorded.
/// - `InputShape` indicates channels of differing lengths were passed to a
///   derivation and is a caller bug, never a data condition.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TelemetryError {
  #[error("malformed telemetry data: {0}")]
  Format(String),
  #[error("no channel '{0}' found")]
  UnknownChannel(String),
  #[error("channel shape mismatch: {0}")]
  InputShape(String),
}
