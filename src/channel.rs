// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use eyre::eyre;
use getset::Getters;
use serde::Serialize;

use super::Result;


/// Primitive type of a channel as declared by its variable descriptor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum VarType {
  Char,
  Bool,
  Int,
  BitField,
  Float,
  Double,
}

impl VarType {
  /// Parses a descriptor type tag. Tags outside the known set yield `None`.
  pub fn from_tag(tag: i32) -> Option<Self> {
    match tag {
      0 => Some(Self::Char),
      1 => Some(Self::Bool),
      2 => Some(Self::Int),
      3 => Some(Self::BitField),
      4 => Some(Self::Float),
      5 => Some(Self::Double),
      _ => None,
    }
  }

  /// The descriptor type tag this type decodes from.
  pub fn tag(self) -> i32 {
    match self {
      Self::Char => 0,
      Self::Bool => 1,
      Self::Int => 2,
      Self::BitField => 3,
      Self::Float => 4,
      Self::Double => 5,
    }
  }

  /// Size of one element of this type within a record, in bytes.
  pub fn size(self) -> usize {
    match self {
      Self::Char | Self::Bool => 1,
      Self::Int | Self::BitField | Self::Float => 4,
      Self::Double => 8,
    }
  }
}


/// One decoded sample of a channel. Scalar for descriptors with an element
/// count of one, `Array` otherwise - except for character channels, whose
/// whole element run decodes into a single text value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ChannelValue {
  Char(String),
  Bool(bool),
  Int(i32),
  BitField(u32),
  Float(f32),
  Double(f64),
  Array(Vec<ChannelValue>),
}

impl ChannelValue {
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
      Self::Int(value) => Some(f64::from(*value)),
      Self::BitField(value) => Some(f64::from(*value)),
      Self::Float(value) => Some(f64::from(*value)),
      Self::Double(value) => Some(*value),
      Self::Char(_) | Self::Array(_) => None,
    }
  }

  pub fn as_i32(&self) -> Option<i32> {
    match self {
      Self::Bool(value) => Some(*value as i32),
      Self::Int(value) => Some(*value),
      Self::BitField(value) => Some(*value as i32),
      Self::Char(_) | Self::Float(_) | Self::Double(_) | Self::Array(_) => {
        None
      }
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(value) => Some(*value),
      Self::Int(value) => Some(*value != 0),
      Self::BitField(value) => Some(*value != 0),
      Self::Float(value) => Some(*value != 0.0),
      Self::Double(value) => Some(*value != 0.0),
      Self::Char(_) | Self::Array(_) => None,
    }
  }
}


/// Holds the decoded samples of a channel and its descriptor metadata. One
/// value per record; all channels decoded from the same file share the same
/// index space.
#[derive(Clone, Debug, Default, PartialEq, Getters, Serialize)]
#[getset(get = "pub")]
pub struct Channel {
  name:   String,
  unit:   String,
  values: Vec<ChannelValue>,
}

impl Channel {
  pub fn new(name: String, unit: String, values: Vec<ChannelValue>) -> Self {
    Self { name, unit, values }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Coerces all samples to `f64`. Booleans map to 0.0/1.0. Fails on
  /// character and array channels.
  pub fn floats(&self) -> Result<Vec<f64>> {
    self.values
        .iter()
        .map(|value| {
          value.as_f64().ok_or_else(|| {
                          eyre!("channel '{}' holds non-numeric samples",
                                self.name)
                        })
        })
        .collect()
  }

  /// Coerces all samples to `i32`. Fails on floating point, character and
  /// array channels.
  pub fn ints(&self) -> Result<Vec<i32>> {
    self.values
        .iter()
        .map(|value| {
          value.as_i32().ok_or_else(|| {
                          eyre!("channel '{}' holds non-integer samples",
                                self.name)
                        })
        })
        .collect()
  }

  /// Coerces all samples to `bool`, treating any non-zero numeric value as
  /// true. Fails on character and array channels.
  pub fn bools(&self) -> Result<Vec<bool>> {
    self.values
        .iter()
        .map(|value| {
          value.as_bool().ok_or_else(|| {
                           eyre!("channel '{}' holds non-boolean samples",
                                 self.name)
                         })
        })
        .collect()
  }
}


/// Decodes a fixed-length, zero-terminated byte field into text: the prefix
/// up to the first zero byte, with non-ASCII bytes dropped.
pub(crate) fn zero_terminated_ascii(raw: &[u8]) -> String {
  raw.iter()
     .take_while(|&&byte| byte != 0)
     .filter(|byte| byte.is_ascii())
     .map(|&byte| byte as char)
     .collect()
}
