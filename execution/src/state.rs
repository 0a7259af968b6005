use anyhow::Result;
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, Read, ReadExt, Write};
use dynlink_types::{
    codec::{bytes_encode_size, read_bytes, write_bytes, MAX_BYTES_LEN},
    Address, Key,
};
use std::collections::BTreeMap;

#[cfg(any(test, feature = "mocks"))]
use std::collections::HashMap;

use crate::Error;

/// Committed key/value state the host executes against.
pub trait State {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>>;
    fn insert(&mut self, key: Key, value: Vec<u8>) -> Result<()>;
    fn delete(&mut self, key: &Key) -> Result<()>;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        for (key, status) in changes {
            match status {
                Status::Update(value) => self.insert(key, value)?,
                Status::Delete => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "mocks"))]
#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Vec<u8>>,
}

#[cfg(any(test, feature = "mocks"))]
impl Memory {
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

#[cfg(any(test, feature = "mocks"))]
impl State for Memory {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>> {
        Ok(self.state.get(key).cloned())
    }

    fn insert(&mut self, key: Key, value: Vec<u8>) -> Result<()> {
        self.state.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> Result<()> {
        self.state.remove(key);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Update(Vec<u8>),
    Delete,
}

impl Write for Status {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Status::Update(value) => {
                0u8.write(writer);
                write_bytes(value, writer);
            }
            Status::Delete => 1u8.write(writer),
        }
    }
}

impl Read for Status {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, CodecError> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Status::Update(read_bytes(reader, MAX_BYTES_LEN)?)),
            1 => Ok(Status::Delete),
            _ => Err(CodecError::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Status {
    fn encode_size(&self) -> usize {
        1 + match self {
            Status::Update(value) => bytes_encode_size(value),
            Status::Delete => 0,
        }
    }
}

/// Position in a [Journal] that can later be reverted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Write overlay scoped to one top-level invocation.
///
/// Reads fall through pending writes to the underlying state. Every write records
/// the previous pending status so a failed nested call can be undone with
/// [Journal::revert]. Dropping the journal discards everything.
pub struct Journal<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,
    undo: Vec<(Key, Option<Status>)>,
}

impl<'a, S: State> Journal<'a, S> {
    pub fn new(state: &'a S) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
            undo: Vec::new(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.undo.len())
    }

    /// Undo every write recorded after `checkpoint`, newest first.
    pub fn revert(&mut self, checkpoint: Checkpoint) {
        while self.undo.len() > checkpoint.0 {
            let Some((key, previous)) = self.undo.pop() else {
                break;
            };
            match previous {
                Some(status) => {
                    self.pending.insert(key, status);
                }
                None => {
                    self.pending.remove(&key);
                }
            }
        }
    }

    /// Read `key` from `namespace`.
    pub fn read(&self, namespace: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.get(&Key::storage(namespace, key))
            .map_err(Error::State)
    }

    /// Write `key` in `namespace`, unless the active frame is read-only.
    pub fn write(
        &mut self,
        namespace: &Address,
        key: &[u8],
        value: Vec<u8>,
        read_only: bool,
    ) -> Result<(), Error> {
        if read_only {
            return Err(Error::ReadOnlyViolation);
        }
        self.insert(Key::storage(namespace, key), value)
            .map_err(Error::State)
    }

    /// Remove `key` from `namespace`, unless the active frame is read-only.
    pub fn remove(&mut self, namespace: &Address, key: &[u8], read_only: bool) -> Result<(), Error> {
        if read_only {
            return Err(Error::ReadOnlyViolation);
        }
        self.delete(&Key::storage(namespace, key))
            .map_err(Error::State)
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }

    fn record(&mut self, key: Key, status: Status) {
        let previous = self.pending.insert(key.clone(), status);
        self.undo.push((key, previous));
    }
}

impl<'a, S: State> State for Journal<'a, S> {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key)?,
        })
    }

    fn insert(&mut self, key: Key, value: Vec<u8>) -> Result<()> {
        self.record(key, Status::Update(value));
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> Result<()> {
        self.record(key.clone(), Status::Delete);
        Ok(())
    }
}
