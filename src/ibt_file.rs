// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{channel::zero_terminated_ascii,
            Channel,
            ChannelValue,
            TelemetryError,
            VarType};
use crate::Result;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use chrono::NaiveDateTime;
use eyre::{ensure, eyre};
use getset::{CopyGetters, Getters};
use log::debug;
use std::{collections::HashMap,
          fs,
          io::Cursor,
          path::{Path, PathBuf}};


pub(crate) const TELEMETRY_HEADER_LEN: usize = 112;
pub(crate) const DISK_HEADER_LEN: usize = 32;
pub(crate) const VAR_HEADER_LEN: usize = 144;

const NAME_FIELD_LEN: usize = 32;
const DESC_FIELD_LEN: usize = 64;
const UNIT_FIELD_LEN: usize = 32;


fn format_error(message: String) -> eyre::Report {
  TelemetryError::Format(message).into()
}


/// One record buffer slot of the telemetry header: how many ticks it holds
/// and where in the byte source it starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct VarBuf {
  tick_count: i32,
  buf_offset: i32,
}


/// Fixed 112 byte header at the start of every telemetry recording.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct TelemetryHeader {
  #[getset(get_copy = "pub")]
  version:             i32,
  #[getset(get_copy = "pub")]
  status:              i32,
  #[getset(get_copy = "pub")]
  tick_rate:           i32,
  #[getset(get_copy = "pub")]
  session_info_update: i32,
  #[getset(get_copy = "pub")]
  session_info_len:    i32,
  #[getset(get_copy = "pub")]
  session_info_offset: i32,
  #[getset(get_copy = "pub")]
  num_vars:            i32,
  #[getset(get_copy = "pub")]
  var_header_offset:   i32,
  #[getset(get_copy = "pub")]
  num_buf:             i32,
  #[getset(get_copy = "pub")]
  buf_len:             i32,
  #[getset(get = "pub")]
  var_bufs:            [VarBuf; 4],
}

impl TelemetryHeader {
  fn parse(raw: &[u8]) -> Result<Self> {
    let mut cursor = Cursor::new(raw);
    let version = cursor.read_i32::<LittleEndian>()?;
    let status = cursor.read_i32::<LittleEndian>()?;
    let tick_rate = cursor.read_i32::<LittleEndian>()?;
    let session_info_update = cursor.read_i32::<LittleEndian>()?;
    let session_info_len = cursor.read_i32::<LittleEndian>()?;
    let session_info_offset = cursor.read_i32::<LittleEndian>()?;
    let num_vars = cursor.read_i32::<LittleEndian>()?;
    let var_header_offset = cursor.read_i32::<LittleEndian>()?;
    let num_buf = cursor.read_i32::<LittleEndian>()?;
    let buf_len = cursor.read_i32::<LittleEndian>()?;
    let _pad1 = cursor.read_i32::<LittleEndian>()?;
    let _pad2 = cursor.read_i32::<LittleEndian>()?;

    let mut var_bufs = [VarBuf::default(); 4];
    for var_buf in var_bufs.iter_mut() {
      let tick_count = cursor.read_i32::<LittleEndian>()?;
      let buf_offset = cursor.read_i32::<LittleEndian>()?;
      let _pad1 = cursor.read_i32::<LittleEndian>()?;
      let _pad2 = cursor.read_i32::<LittleEndian>()?;
      *var_buf = VarBuf { tick_count, buf_offset };
    }

    Ok(Self { version,
              status,
              tick_rate,
              session_info_update,
              session_info_len,
              session_info_offset,
              num_vars,
              var_header_offset,
              num_buf,
              buf_len,
              var_bufs })
  }
}


/// 32 byte disk header following the telemetry header: absolute session
/// start time plus session level totals.
#[derive(Clone, Copy, Debug, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DiskHeader {
  start_time:         i64,
  session_start_time: f64,
  session_end_time:   f64,
  session_lap_count:  i32,
  record_count:       i32,
}

impl DiskHeader {
  fn parse(raw: &[u8]) -> Result<Self> {
    let mut cursor = Cursor::new(raw);
    Ok(Self { start_time:         cursor.read_i64::<LittleEndian>()?,
              session_start_time: cursor.read_f64::<LittleEndian>()?,
              session_end_time:   cursor.read_f64::<LittleEndian>()?,
              session_lap_count:  cursor.read_i32::<LittleEndian>()?,
              record_count:       cursor.read_i32::<LittleEndian>()?, })
  }
}


/// Describes one channel within the fixed width record buffer: its type,
/// element count and byte offset into each record.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct VarHeader {
  #[getset(get_copy = "pub")]
  var_type:      VarType,
  #[getset(get_copy = "pub")]
  offset:        i32,
  #[getset(get_copy = "pub")]
  count:         i32,
  #[getset(get_copy = "pub")]
  count_as_time: i32,
  #[getset(get = "pub")]
  name:          String,
  #[getset(get = "pub")]
  desc:          String,
  #[getset(get = "pub")]
  unit:          String,
}

impl VarHeader {
  fn parse(raw: &[u8]) -> Result<Self> {
    let tag = LittleEndian::read_i32(&raw[..4]);
    let offset = LittleEndian::read_i32(&raw[4..8]);
    let count = LittleEndian::read_i32(&raw[8..12]);
    let count_as_time = LittleEndian::read_i32(&raw[12..16]);

    let name = zero_terminated_ascii(&raw[16..16 + NAME_FIELD_LEN]);
    let desc = zero_terminated_ascii(&raw[48..48 + DESC_FIELD_LEN]);
    let unit = zero_terminated_ascii(&raw[112..112 + UNIT_FIELD_LEN]);

    let var_type = VarType::from_tag(tag).ok_or_else(|| {
                     format_error(format!("unknown type tag {} for '{}'",
                                          tag, name))
                   })?;

    Ok(Self { var_type,
              offset,
              count,
              count_as_time,
              name,
              desc,
              unit })
  }

  /// Number of bytes this channel occupies within one record.
  pub fn byte_len(&self) -> usize {
    self.var_type.size() * self.count.max(1) as usize
  }

  fn check_span(&self, buf_len: usize) -> Result<()> {
    if self.offset < 0 || self.offset as usize + self.byte_len() > buf_len {
      return Err(format_error(format!("descriptor '{}' spans outside the \
                                       record buffer",
                                      self.name)));
    }
    Ok(())
  }

  /// Decodes this channel's value from a raw record. The record must be at
  /// least `buf_len` bytes; spans are checked once per decode run, not per
  /// record.
  pub fn decode(&self, record: &[u8]) -> ChannelValue {
    let offset = self.offset as usize;
    match self.var_type {
      VarType::Char => {
        let raw = &record[offset..offset + self.count.max(1) as usize];
        ChannelValue::Char(zero_terminated_ascii(raw))
      }
      _ if self.count > 1 => {
        let size = self.var_type.size();
        ChannelValue::Array((0..self.count as usize).map(|k| {
                                                      self.scalar(record,
                                                                  offset
                                                                  + k * size)
                                                    })
                                                    .collect())
      }
      _ => self.scalar(record, offset),
    }
  }

  fn scalar(&self, record: &[u8], at: usize) -> ChannelValue {
    match self.var_type {
      VarType::Char => {
        ChannelValue::Char(zero_terminated_ascii(&record[at..at + 1]))
      }
      VarType::Bool => ChannelValue::Bool(record[at] != 0),
      VarType::Int => {
        ChannelValue::Int(LittleEndian::read_i32(&record[at..at + 4]))
      }
      VarType::BitField => {
        ChannelValue::BitField(LittleEndian::read_u32(&record[at..at + 4]))
      }
      VarType::Float => {
        ChannelValue::Float(LittleEndian::read_f32(&record[at..at + 4]))
      }
      VarType::Double => {
        ChannelValue::Double(LittleEndian::read_f64(&record[at..at + 8]))
      }
    }
  }
}


/// Lazy iterator over the raw fixed width records of a recording. Finite:
/// ends after the declared record count or on short read, whichever comes
/// first. Restartable by requesting a fresh iterator from the file.
pub struct Records<'a> {
  data:      &'a [u8],
  offset:    usize,
  buf_len:   usize,
  remaining: usize,
}

impl<'a> Iterator for Records<'a> {
  type Item = &'a [u8];

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 || self.buf_len == 0 {
      return None;
    }
    let end = self.offset.checked_add(self.buf_len)?;
    if end > self.data.len() {
      return None;
    }
    let record = &self.data[self.offset..end];
    self.offset = end;
    self.remaining -= 1;
    Some(record)
  }
}


/// Holds a fully read telemetry recording and provides access to its
/// headers, descriptors and decoded channels.
#[derive(Clone, Debug, PartialEq, Getters)]
pub struct IbtFile {
  #[getset(get = "pub")]
  path:         PathBuf,
  data:         Vec<u8>,
  #[getset(get = "pub")]
  header:       TelemetryHeader,
  #[getset(get = "pub")]
  disk_header:  DiskHeader,
  #[getset(get = "pub")]
  var_headers:  Vec<VarHeader>,
  var_index:    HashMap<String, usize>,
  #[getset(get = "pub")]
  session_info: String,
}

impl IbtFile {
  // FILE OPENING FUNCTIONS ------------------------------------------------ //
  /// Reads an ibt file from disk and decodes its headers, descriptor table
  /// and session info block.
  pub fn load(path: &Path) -> Result<Self> {
    let extension =
      path.extension()
          .unwrap_or_default()
          .to_str()
          .ok_or(eyre!("file extension is not valid unicode ({})",
                       path.display()))?;

    ensure!(path.exists() && path.is_file(),
            "path does not exist or is not a valid file ({})",
            path.display());
    ensure!(extension == "ibt",
            "only files with extension .ibt accepted ({})",
            path.display());

    let data = fs::read(path)?;
    debug!("read {} bytes from {}", data.len(), path.display());

    let mut file = Self::from_bytes(data)?;
    file.path = path.to_owned();
    Ok(file)
  }

  /// Decodes a recording from an in-memory byte buffer.
  pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
    if data.len() < TELEMETRY_HEADER_LEN {
      return Err(format_error("data too small to contain telemetry header"
                              .to_string()));
    }
    let header = TelemetryHeader::parse(&data[..TELEMETRY_HEADER_LEN])?;

    if data.len() < TELEMETRY_HEADER_LEN + DISK_HEADER_LEN {
      return Err(format_error("data too small to contain disk header"
                              .to_string()));
    }
    let disk_header =
      DiskHeader::parse(&data[TELEMETRY_HEADER_LEN..TELEMETRY_HEADER_LEN
                                                    + DISK_HEADER_LEN])?;

    if header.num_vars < 0
       || header.var_header_offset < 0
       || header.session_info_len < 0
       || header.session_info_offset < 0
       || header.buf_len < 0
    {
      return Err(format_error("header declares negative offsets or lengths"
                              .to_string()));
    }

    let table_start = header.var_header_offset as usize;
    let table_len = header.num_vars as usize * VAR_HEADER_LEN;
    let table =
      data.get(table_start..table_start + table_len)
          .ok_or_else(|| {
            format_error("unexpected end of data while reading variable \
                          descriptors".to_string())
          })?;
    let var_headers = table.chunks_exact(VAR_HEADER_LEN)
                           .map(VarHeader::parse)
                           .collect::<Result<Vec<VarHeader>>>()?;
    let var_index = var_headers.iter()
                               .enumerate()
                               .map(|(idx, var)| (var.name().clone(), idx))
                               .collect();

    let info_start = header.session_info_offset as usize;
    let info_len = header.session_info_len as usize;
    let raw_info =
      data.get(info_start..info_start + info_len).ok_or_else(|| {
            format_error("unexpected end of data while reading session info"
                         .to_string())
          })?;
    let session_info = String::from_utf8_lossy(raw_info).trim_end_matches('\0')
                                                        .to_string();

    debug!("decoded {} variable descriptors, {} records declared",
           var_headers.len(),
           disk_header.record_count());

    Ok(Self { path: PathBuf::new(),
              data,
              header,
              disk_header,
              var_headers,
              var_index,
              session_info })
  }

  // HEADER LEVEL FUNCTIONS ------------------------------------------------ //
  /// Absolute wall clock time at which the recording started.
  pub fn datetime(&self) -> Result<NaiveDateTime> {
    NaiveDateTime::from_timestamp_opt(self.disk_header.start_time(), 0)
      .ok_or_else(|| {
        eyre!("session start time {} out of range",
              self.disk_header.start_time())
      })
  }

  /// Looks up the descriptor for a channel by name.
  pub fn var(&self, name: &str) -> Result<&VarHeader> {
    self.var_index
        .get(name)
        .map(|&idx| &self.var_headers[idx])
        .ok_or_else(|| TelemetryError::UnknownChannel(name.to_string()).into())
  }

  pub fn has_var(&self, name: &str) -> bool {
    self.var_index.contains_key(name)
  }

  pub fn var_names(&self) -> Vec<String> {
    self.var_headers.iter().map(|var| var.name().clone()).collect()
  }

  // RECORD LEVEL FUNCTIONS ------------------------------------------------ //
  /// Iterates the raw fixed width records of the recording.
  pub fn records(&self) -> Records<'_> {
    Records { data:      &self.data,
              offset:    self.header.var_bufs()[0].buf_offset().max(0)
                         as usize,
              buf_len:   self.header.buf_len().max(0) as usize,
              remaining: self.disk_header.record_count().max(0) as usize, }
  }

  /// Decodes the requested channels in one pass over the record buffer,
  /// preserving record order. Fails with `UnknownChannel` for names without
  /// a descriptor and `Format` for descriptors reaching outside the record.
  pub fn channels(&self, names: &[&str]) -> Result<Vec<Channel>> {
    let buf_len = self.header.buf_len().max(0) as usize;
    let mut vars = Vec::with_capacity(names.len());
    for name in names {
      let var = self.var(name)?;
      var.check_span(buf_len)?;
      vars.push(var);
    }

    let capacity = self.disk_header.record_count().max(0) as usize;
    let mut columns: Vec<Vec<ChannelValue>> =
      (0..vars.len()).map(|_| Vec::with_capacity(capacity)).collect();
    for record in self.records() {
      for (column, var) in columns.iter_mut().zip(vars.iter()) {
        column.push(var.decode(record));
      }
    }

    Ok(vars.iter()
           .zip(columns)
           .map(|(var, values)| {
             Channel::new(var.name().clone(), var.unit().clone(), values)
           })
           .collect())
  }

  /// Decodes a single channel by name.
  pub fn channel(&self, name: &str) -> Result<Channel> {
    Ok(self.channels(&[name])?.remove(0))
  }
}


#[cfg(test)]
pub(crate) mod synth {
  use super::*;

  /// Specification of one synthetic channel: descriptor fields plus one
  /// value per record.
  pub(crate) struct SynthChannel {
    pub name:     &'static str,
    pub unit:     &'static str,
    pub var_type: VarType,
    pub count:    usize,
    pub values:   Vec<ChannelValue>,
  }

  impl SynthChannel {
    pub(crate) fn scalars(name: &'static str,
                          unit: &'static str,
                          var_type: VarType,
                          values: Vec<ChannelValue>)
                          -> Self {
      Self { name, unit, var_type, count: 1, values }
    }
  }

  /// Encodes one channel value at its record offset, the exact inverse of
  /// `VarHeader::decode`.
  pub(crate) fn encode_value(buffer: &mut [u8],
                             offset: usize,
                             var_type: VarType,
                             value: &ChannelValue) {
    match value {
      ChannelValue::Char(text) => {
        let bytes = text.as_bytes();
        buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
      }
      ChannelValue::Bool(value) => buffer[offset] = *value as u8,
      ChannelValue::Int(value) => {
        LittleEndian::write_i32(&mut buffer[offset..offset + 4], *value)
      }
      ChannelValue::BitField(value) => {
        LittleEndian::write_u32(&mut buffer[offset..offset + 4], *value)
      }
      ChannelValue::Float(value) => {
        LittleEndian::write_f32(&mut buffer[offset..offset + 4], *value)
      }
      ChannelValue::Double(value) => {
        LittleEndian::write_f64(&mut buffer[offset..offset + 8], *value)
      }
      ChannelValue::Array(items) => {
        for (k, item) in items.iter().enumerate() {
          encode_value(buffer, offset + k * var_type.size(), var_type, item);
        }
      }
    }
  }

  /// Builds a complete synthetic recording: headers, descriptor table,
  /// session info block and record buffer.
  pub(crate) fn build_file(tick_rate: i32,
                           start_time: i64,
                           session_info: &str,
                           channels: &[SynthChannel])
                           -> Vec<u8> {
    let record_count =
      channels.get(0).map(|channel| channel.values.len()).unwrap_or(0);
    for channel in channels {
      assert_eq!(record_count, channel.values.len());
    }

    let mut offsets = Vec::with_capacity(channels.len());
    let mut buf_len = 0usize;
    for channel in channels {
      offsets.push(buf_len);
      buf_len += channel.var_type.size() * channel.count;
    }

    let var_header_offset = TELEMETRY_HEADER_LEN + DISK_HEADER_LEN;
    let session_info_offset =
      var_header_offset + channels.len() * VAR_HEADER_LEN;
    let buf_offset = session_info_offset + session_info.len();
    let mut data = vec![0u8; buf_offset + buf_len * record_count];

    let mut ints = [0i32; 28];
    ints[0] = 2; // version
    ints[1] = 1; // status
    ints[2] = tick_rate;
    ints[4] = session_info.len() as i32;
    ints[5] = session_info_offset as i32;
    ints[6] = channels.len() as i32;
    ints[7] = var_header_offset as i32;
    ints[8] = 1; // num_buf
    ints[9] = buf_len as i32;
    ints[12] = record_count as i32; // var_bufs[0].tick_count
    ints[13] = buf_offset as i32; // var_bufs[0].buf_offset
    for (k, value) in ints.iter().enumerate() {
      LittleEndian::write_i32(&mut data[k * 4..k * 4 + 4], *value);
    }

    LittleEndian::write_i64(&mut data[112..120], start_time);
    LittleEndian::write_f64(&mut data[120..128], 0.0);
    LittleEndian::write_f64(&mut data[128..136], record_count as f64);
    LittleEndian::write_i32(&mut data[136..140], 0);
    LittleEndian::write_i32(&mut data[140..144], record_count as i32);

    for (k, channel) in channels.iter().enumerate() {
      let base = var_header_offset + k * VAR_HEADER_LEN;
      LittleEndian::write_i32(&mut data[base..base + 4],
                              channel.var_type.tag());
      LittleEndian::write_i32(&mut data[base + 4..base + 8],
                              offsets[k] as i32);
      LittleEndian::write_i32(&mut data[base + 8..base + 12],
                              channel.count as i32);
      let name = channel.name.as_bytes();
      data[base + 16..base + 16 + name.len()].copy_from_slice(name);
      let unit = channel.unit.as_bytes();
      data[base + 112..base + 112 + unit.len()].copy_from_slice(unit);
    }

    let info = session_info.as_bytes();
    data[session_info_offset..session_info_offset + info.len()]
      .copy_from_slice(info);

    for record_idx in 0..record_count {
      let record_base = buf_offset + record_idx * buf_len;
      let record = &mut data[record_base..record_base + buf_len];
      for (k, channel) in channels.iter().enumerate() {
        encode_value(record,
                     offsets[k],
                     channel.var_type,
                     &channel.values[record_idx]);
      }
    }

    data
  }
}


#[cfg(test)]
mod tests {
  use super::{synth::{build_file, encode_value, SynthChannel}, *};
  use pretty_assertions::assert_eq;


  fn sample_file() -> Vec<u8> {
    build_file(60,
               1609459200,
               "TrackDisplayName: Okayama International\nTrackName: okayama \
                full\n",
               &[SynthChannel::scalars("SessionTime",
                                       "s",
                                       VarType::Double,
                                       vec![ChannelValue::Double(0.0),
                                            ChannelValue::Double(1.5),
                                            ChannelValue::Double(3.0)]),
                 SynthChannel::scalars("Lap",
                                       "",
                                       VarType::Int,
                                       vec![ChannelValue::Int(1),
                                            ChannelValue::Int(1),
                                            ChannelValue::Int(2)]),
                 SynthChannel::scalars("Speed",
                                       "m/s",
                                       VarType::Float,
                                       vec![ChannelValue::Float(41.5),
                                            ChannelValue::Float(42.0),
                                            ChannelValue::Float(43.25)]),
                 SynthChannel::scalars("IsOnTrack",
                                       "",
                                       VarType::Bool,
                                       vec![ChannelValue::Bool(true),
                                            ChannelValue::Bool(false),
                                            ChannelValue::Bool(true)]),
                 SynthChannel { name:     "CarIdxTireTemp",
                                unit:     "C",
                                var_type: VarType::Float,
                                count:    2,
                                values:   vec![
                   ChannelValue::Array(vec![ChannelValue::Float(80.0),
                                            ChannelValue::Float(81.0)]),
                   ChannelValue::Array(vec![ChannelValue::Float(82.0),
                                            ChannelValue::Float(83.0)]),
                   ChannelValue::Array(vec![ChannelValue::Float(84.0),
                                            ChannelValue::Float(85.0)]),
                 ], },
                 SynthChannel { name:     "DisplayUnits",
                                unit:     "",
                                var_type: VarType::Char,
                                count:    4,
                                values:   vec![
                   ChannelValue::Char("km".to_string()),
                   ChannelValue::Char("mi".to_string()),
                   ChannelValue::Char("km".to_string()),
                 ], }])
  }

  #[test]
  fn header_too_short_test() {
    let report = IbtFile::from_bytes(vec![0u8; 50]).unwrap_err();
    assert_eq!(Some(&TelemetryError::Format("data too small to contain \
                                             telemetry header".to_string())),
               report.downcast_ref::<TelemetryError>());

    let report = IbtFile::from_bytes(vec![0u8; 120]).unwrap_err();
    assert_eq!(Some(&TelemetryError::Format("data too small to contain disk \
                                             header".to_string())),
               report.downcast_ref::<TelemetryError>());
  }

  #[test]
  fn session_info_too_short_test() {
    let mut data = sample_file();
    // truncate into the session info block
    let info_offset = LittleEndian::read_i32(&data[20..24]) as usize;
    data.truncate(info_offset + 4);
    let report = IbtFile::from_bytes(data).unwrap_err();
    assert_eq!(true,
               matches!(report.downcast_ref::<TelemetryError>(),
                        Some(TelemetryError::Format(_))));
  }

  #[test]
  fn headers_test() {
    let file = IbtFile::from_bytes(sample_file()).unwrap();

    assert_eq!(2, file.header().version());
    assert_eq!(1, file.header().status());
    assert_eq!(60, file.header().tick_rate());
    assert_eq!(6, file.header().num_vars());
    assert_eq!(1, file.header().num_buf());
    assert_eq!(8 + 4 + 4 + 1 + 8 + 4, file.header().buf_len());
    assert_eq!(3, file.header().var_bufs()[0].tick_count());

    assert_eq!(1609459200, file.disk_header().start_time());
    assert_eq!(3, file.disk_header().record_count());
    assert_eq!("2021-01-01 00:00:00",
               file.datetime().unwrap().to_string());

    assert_eq!(true, file.session_info().contains("Okayama International"));
  }

  #[test]
  fn descriptor_lookup_test() {
    let file = IbtFile::from_bytes(sample_file()).unwrap();

    let speed = file.var("Speed").unwrap();
    assert_eq!(VarType::Float, speed.var_type());
    assert_eq!(12, speed.offset());
    assert_eq!(1, speed.count());
    assert_eq!("m/s", speed.unit());
    assert_eq!(4, speed.byte_len());

    assert_eq!(true, file.has_var("SessionTime"));
    assert_eq!(false, file.has_var("YawRate"));
    assert_eq!(vec!["SessionTime".to_string(),
                    "Lap".to_string(),
                    "Speed".to_string(),
                    "IsOnTrack".to_string(),
                    "CarIdxTireTemp".to_string(),
                    "DisplayUnits".to_string()],
               file.var_names());

    let report = file.var("YawRate").unwrap_err();
    assert_eq!(Some(&TelemetryError::UnknownChannel("YawRate".to_string())),
               report.downcast_ref::<TelemetryError>());
  }

  #[test]
  fn records_test() {
    let file = IbtFile::from_bytes(sample_file()).unwrap();

    let records: Vec<&[u8]> = file.records().collect();
    assert_eq!(3, records.len());
    for record in &records {
      assert_eq!(file.header().buf_len() as usize, record.len());
    }

    // restartable: a fresh iterator starts over
    assert_eq!(3, file.records().count());
  }

  #[test]
  fn short_record_buffer_test() {
    let mut data = sample_file();
    // drop the last record and half of the second
    let buf_len = LittleEndian::read_i32(&data[36..40]) as usize;
    data.truncate(data.len() - buf_len - buf_len / 2);

    let file = IbtFile::from_bytes(data).unwrap();
    assert_eq!(3, file.disk_header().record_count());
    assert_eq!(1, file.records().count());

    let lap = file.channel("Lap").unwrap();
    assert_eq!(vec![ChannelValue::Int(1)], *lap.values());
  }

  #[test]
  fn channel_decode_test() {
    let file = IbtFile::from_bytes(sample_file()).unwrap();

    let channels =
      file.channels(&["SessionTime", "Lap", "Speed", "IsOnTrack"]).unwrap();
    assert_eq!(vec![0.0, 1.5, 3.0], channels[0].floats().unwrap());
    assert_eq!(vec![1, 1, 2], channels[1].ints().unwrap());
    assert_eq!(vec![41.5, 42.0, 43.25], channels[2].floats().unwrap());
    assert_eq!(vec![true, false, true], channels[3].bools().unwrap());

    let text = file.channel("DisplayUnits").unwrap();
    assert_eq!(vec![ChannelValue::Char("km".to_string()),
                    ChannelValue::Char("mi".to_string()),
                    ChannelValue::Char("km".to_string())],
               *text.values());

    let temps = file.channel("CarIdxTireTemp").unwrap();
    assert_eq!(ChannelValue::Array(vec![ChannelValue::Float(84.0),
                                        ChannelValue::Float(85.0)]),
               temps.values()[2]);
  }

  #[test]
  fn descriptor_span_test() {
    let mut data = sample_file();
    // patch the Speed descriptor offset to reach past the record end
    let table_start = LittleEndian::read_i32(&data[28..32]) as usize;
    let speed_base = table_start + 2 * VAR_HEADER_LEN;
    LittleEndian::write_i32(&mut data[speed_base + 4..speed_base + 8], 1000);

    let file = IbtFile::from_bytes(data).unwrap();
    let report = file.channel("Speed").unwrap_err();
    assert_eq!(true,
               matches!(report.downcast_ref::<TelemetryError>(),
                        Some(TelemetryError::Format(_))));
    // other channels remain decodable
    assert_eq!(vec![1, 1, 2], file.channel("Lap").unwrap().ints().unwrap());
  }

  #[test]
  fn round_trip_test() {
    let file = IbtFile::from_bytes(sample_file()).unwrap();
    let buf_len = file.header().buf_len() as usize;

    let names: Vec<&str> =
      vec!["SessionTime", "Lap", "Speed", "IsOnTrack", "CarIdxTireTemp"];
    let channels = file.channels(&names).unwrap();

    for (record_idx, record) in file.records().enumerate() {
      let mut encoded = vec![0u8; buf_len];
      for (channel, name) in channels.iter().zip(names.iter()) {
        let var = file.var(name).unwrap();
        encode_value(&mut encoded,
                     var.offset() as usize,
                     var.var_type(),
                     &channel.values()[record_idx]);
      }
      // the character channel is not re-encoded; compare up to its offset
      let text_offset = file.var("DisplayUnits").unwrap().offset() as usize;
      assert_eq!(&record[..text_offset], &encoded[..text_offset]);
    }
  }
}
