//! Entry point and interface descriptors.
//!
//! A module exports a declared set of [`EntryPoint`]s. A caller describes what it
//! expects from a callee with an [`Interface`]; the host checks the two against
//! each other before any call is bound.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::{Value, ValueType};

/// Whether an entry point may write to storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    ReadOnly,
    ReadWrite,
}

impl Mutability {
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
    pub mutability: Mutability,
}

impl EntryPoint {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ValueType>,
        results: Vec<ValueType>,
        mutability: Mutability,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            results,
            mutability,
        }
    }

    /// A read-only entry point.
    pub fn read_only(
        name: impl Into<String>,
        params: Vec<ValueType>,
        results: Vec<ValueType>,
    ) -> Self {
        Self::new(name, params, results, Mutability::ReadOnly)
    }

    /// A read-write entry point.
    pub fn read_write(
        name: impl Into<String>,
        params: Vec<ValueType>,
        results: Vec<ValueType>,
    ) -> Self {
        Self::new(name, params, results, Mutability::ReadWrite)
    }

    /// True when `other` declares the same name, parameter and result types, and mutability.
    pub fn matches(&self, other: &EntryPoint) -> bool {
        self == other
    }

    /// True when `args` have exactly the declared arity and structural types.
    pub fn accepts(&self, args: &[Value]) -> bool {
        conforms(&self.params, args)
    }

    /// True when `results` have exactly the declared arity and structural types.
    pub fn returns(&self, results: &[Value]) -> bool {
        conforms(&self.results, results)
    }
}

fn conforms(types: &[ValueType], values: &[Value]) -> bool {
    types.len() == values.len()
        && types
            .iter()
            .zip(values)
            .all(|(ty, value)| value.value_type() == *ty)
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(") -> (")?;
        for (idx, result) in self.results.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{result}")?;
        }
        f.write_str(")")?;
        if self.mutability.is_read_only() {
            f.write_str(" [read-only]")?;
        }
        Ok(())
    }
}

/// A named set of entry points a caller requires a callee to export.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub entry_points: Vec<EntryPoint>,
}

impl Interface {
    pub fn new(name: impl Into<String>, entry_points: Vec<EntryPoint>) -> Self {
        Self {
            name: name.into(),
            entry_points,
        }
    }

    pub fn get(&self, name: &str) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|ep| ep.name == name)
    }
}
