//! Canonical structured representation for arguments and results crossing a
//! module boundary.
//!
//! Binary layout (all integers big-endian):
//! - `Int`: `[0] [i64]`
//! - `Str`: `[1] [len:u32] [utf8...]`
//! - `Tuple`: `[2] [count:u32] [item...]`
//! - `Record`: `[3] [count:u32] ([nameLen:u32] [name...] [item])...`
//!
//! [`ValueType`] uses the same tags, with the payload replaced by the nested
//! types (no payload for `Int` and `Str`).

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{read_string, string_encode_size, write_string, MAX_STRING_LEN};

/// Maximum number of items in a tuple or record.
pub const MAX_ITEMS: usize = 256;

/// Maximum nesting depth of tuples and records.
pub const MAX_DEPTH: usize = 16;

const TAG_INT: u8 = 0;
const TAG_STR: u8 = 1;
const TAG_TUPLE: u8 = 2;
const TAG_RECORD: u8 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Int,
    Str,
    Tuple(Vec<ValueType>),
    Record(Vec<(String, ValueType)>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Str(String),
    Tuple(Vec<Value>),
    Record(Vec<(String, Value)>),
}

impl Value {
    /// The empty tuple, used by entry points that return nothing.
    pub fn unit() -> Self {
        Self::Tuple(Vec::new())
    }

    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Structural type of this value. Field names and order are part of a record's type.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Str(_) => ValueType::Str,
            Self::Tuple(items) => ValueType::Tuple(items.iter().map(Value::value_type).collect()),
            Self::Record(fields) => ValueType::Record(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.value_type()))
                    .collect(),
            ),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Record(fields) => {
                f.write_str("{")?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("int"),
            Self::Str => f.write_str("string"),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Record(fields) => {
                f.write_str("{")?;
                for (idx, (name, ty)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn read_count(reader: &mut impl Buf, ty: &'static str) -> Result<usize, Error> {
    let count = u32::read(reader)? as usize;
    if count > MAX_ITEMS {
        return Err(Error::Invalid(ty, "too many items"));
    }
    Ok(count)
}

fn enter(depth: usize, ty: &'static str) -> Result<usize, Error> {
    if depth >= MAX_DEPTH {
        return Err(Error::Invalid(ty, "nested too deeply"));
    }
    Ok(depth + 1)
}

impl Write for ValueType {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Int => TAG_INT.write(writer),
            Self::Str => TAG_STR.write(writer),
            Self::Tuple(items) => {
                TAG_TUPLE.write(writer);
                (items.len() as u32).write(writer);
                for item in items {
                    item.write(writer);
                }
            }
            Self::Record(fields) => {
                TAG_RECORD.write(writer);
                (fields.len() as u32).write(writer);
                for (name, ty) in fields {
                    write_string(name, writer);
                    ty.write(writer);
                }
            }
        }
    }
}

impl ValueType {
    fn read_nested(reader: &mut impl Buf, depth: usize) -> Result<Self, Error> {
        let ty = match u8::read(reader)? {
            TAG_INT => Self::Int,
            TAG_STR => Self::Str,
            TAG_TUPLE => {
                let depth = enter(depth, "ValueType")?;
                let count = read_count(reader, "ValueType")?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::read_nested(reader, depth)?);
                }
                Self::Tuple(items)
            }
            TAG_RECORD => {
                let depth = enter(depth, "ValueType")?;
                let count = read_count(reader, "ValueType")?;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = read_string(reader, MAX_STRING_LEN)?;
                    fields.push((name, Self::read_nested(reader, depth)?));
                }
                Self::Record(fields)
            }
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(ty)
    }
}

impl Read for ValueType {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Self::read_nested(reader, 0)
    }
}

impl EncodeSize for ValueType {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Int | Self::Str => 0,
                Self::Tuple(items) => {
                    u32::SIZE + items.iter().map(EncodeSize::encode_size).sum::<usize>()
                }
                Self::Record(fields) => {
                    u32::SIZE
                        + fields
                            .iter()
                            .map(|(name, ty)| string_encode_size(name) + ty.encode_size())
                            .sum::<usize>()
                }
            }
    }
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Int(v) => {
                TAG_INT.write(writer);
                v.write(writer);
            }
            Self::Str(s) => {
                TAG_STR.write(writer);
                write_string(s, writer);
            }
            Self::Tuple(items) => {
                TAG_TUPLE.write(writer);
                (items.len() as u32).write(writer);
                for item in items {
                    item.write(writer);
                }
            }
            Self::Record(fields) => {
                TAG_RECORD.write(writer);
                (fields.len() as u32).write(writer);
                for (name, value) in fields {
                    write_string(name, writer);
                    value.write(writer);
                }
            }
        }
    }
}

impl Value {
    fn read_nested(reader: &mut impl Buf, depth: usize) -> Result<Self, Error> {
        let value = match u8::read(reader)? {
            TAG_INT => Self::Int(i64::read(reader)?),
            TAG_STR => Self::Str(read_string(reader, MAX_STRING_LEN)?),
            TAG_TUPLE => {
                let depth = enter(depth, "Value")?;
                let count = read_count(reader, "Value")?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::read_nested(reader, depth)?);
                }
                Self::Tuple(items)
            }
            TAG_RECORD => {
                let depth = enter(depth, "Value")?;
                let count = read_count(reader, "Value")?;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = read_string(reader, MAX_STRING_LEN)?;
                    fields.push((name, Self::read_nested(reader, depth)?));
                }
                Self::Record(fields)
            }
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(value)
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Self::read_nested(reader, 0)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Int(_) => i64::SIZE,
                Self::Str(s) => string_encode_size(s),
                Self::Tuple(items) => {
                    u32::SIZE + items.iter().map(EncodeSize::encode_size).sum::<usize>()
                }
                Self::Record(fields) => {
                    u32::SIZE
                        + fields
                            .iter()
                            .map(|(name, value)| string_encode_size(name) + value.encode_size())
                            .sum::<usize>()
                }
            }
    }
}
