use bytes::{Buf, BufMut};
use commonware_codec::{DecodeExt, EncodeSize, Error, FixedSize, RangeCfg, Read, ReadExt, Write};
use commonware_cryptography::{
    sha256::{Digest, Sha256},
    Hasher,
};
use commonware_utils::{from_hex, hex, union};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{
    bytes_encode_size, read_bytes, read_string, string_encode_size, write_bytes, write_string,
    MAX_BYTES_LEN, MAX_STRING_LEN,
};
use crate::value::Value;

pub const NAMESPACE: &[u8] = b"_DYNLINK";
pub const MODULE_SUFFIX: &[u8] = b"_MODULE";
pub const ACCOUNT_SUFFIX: &[u8] = b"_ACCOUNT";
/// Maximum number of arguments (or results) carried by one call.
pub const MAX_ARGS: usize = 64;

/// Address of a deployed module or an account.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Digest);

impl Address {
    /// Address of the `sequence`-th instance deployed in this host, running code `code_id`.
    pub fn module(code_id: u64, sequence: u64) -> Self {
        let mut seed = Vec::with_capacity(2 * u64::SIZE);
        code_id.write(&mut seed);
        sequence.write(&mut seed);
        Self::derive(MODULE_SUFFIX, &seed)
    }

    /// Address of an externally-owned account identified by `seed`.
    pub fn account(seed: &[u8]) -> Self {
        Self::derive(ACCOUNT_SUFFIX, seed)
    }

    fn derive(suffix: &[u8], seed: &[u8]) -> Self {
        Self(Sha256::hash(&union(&union(NAMESPACE, suffix), seed)))
    }

    pub fn from_hex(value: &str) -> Option<Self> {
        let bytes = from_hex(value)?;
        Digest::decode(bytes.as_slice()).ok().map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex(self.0.as_ref())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps traces readable.
        let hex = self.to_hex();
        write!(f, "Address({})", &hex[..8.min(hex.len())])
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).ok_or_else(|| serde::de::Error::custom("expected a hex address"))
    }
}

impl Write for Address {
    fn write(&self, writer: &mut impl BufMut) {
        self.0.write(writer);
    }
}

impl Read for Address {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self(Digest::read(reader)?))
    }
}

impl FixedSize for Address {
    const SIZE: usize = Digest::SIZE;
}

/// Location of a value in the host's state.
#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Debug)]
pub enum Key {
    /// A raw key inside a module's storage namespace (tag 0).
    Storage { namespace: Address, key: Vec<u8> },
}

impl Key {
    pub fn storage(namespace: &Address, key: &[u8]) -> Self {
        Self::Storage {
            namespace: namespace.clone(),
            key: key.to_vec(),
        }
    }
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Storage { namespace, key } => {
                0u8.write(writer);
                namespace.write(writer);
                write_bytes(key, writer);
            }
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match u8::read(reader)? {
            0 => Self::Storage {
                namespace: Address::read(reader)?,
                key: read_bytes(reader, MAX_BYTES_LEN)?,
            },
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Storage { key, .. } => Address::SIZE + bytes_encode_size(key),
            }
    }
}

/// Names an entry point and carries its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub entry_point: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Message {
    pub fn new(entry_point: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            entry_point: entry_point.into(),
            args,
        }
    }
}

impl Write for Message {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.entry_point, writer);
        self.args.write(writer);
    }
}

impl Read for Message {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let entry_point = read_string(reader, MAX_STRING_LEN)?;
        let args = Vec::<Value>::read_cfg(reader, &(RangeCfg::from(0..=MAX_ARGS), ()))?;
        Ok(Self { entry_point, args })
    }
}

impl EncodeSize for Message {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.entry_point) + self.args.encode_size()
    }
}

/// A top-level invocation submitted by an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub sender: Address,
    pub target: Address,
    pub message: Message,
    /// Value attached by the sender. Visible to the root frame only.
    pub attached_value: u64,
}

impl Write for Transaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.sender.write(writer);
        self.target.write(writer);
        self.message.write(writer);
        self.attached_value.write(writer);
    }
}

impl Read for Transaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            sender: Address::read(reader)?,
            target: Address::read(reader)?,
            message: Message::read(reader)?,
            attached_value: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Transaction {
    fn encode_size(&self) -> usize {
        2 * Address::SIZE + self.message.encode_size() + u64::SIZE
    }
}

/// An attribute emitted by a module during an invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub module: Address,
    pub key: String,
    pub value: String,
}

impl LogEntry {
    pub fn new(module: Address, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            module,
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl Write for LogEntry {
    fn write(&self, writer: &mut impl BufMut) {
        self.module.write(writer);
        write_string(&self.key, writer);
        write_string(&self.value, writer);
    }
}

impl Read for LogEntry {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            module: Address::read(reader)?,
            key: read_string(reader, MAX_STRING_LEN)?,
            value: read_string(reader, MAX_STRING_LEN)?,
        })
    }
}

impl EncodeSize for LogEntry {
    fn encode_size(&self) -> usize {
        Address::SIZE + string_encode_size(&self.key) + string_encode_size(&self.value)
    }
}
