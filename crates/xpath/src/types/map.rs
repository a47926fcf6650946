use std::fmt;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::{Atomic, Item};
use crate::error::EvalError;

/// A map key. Numeric keys are normalized so that `1`, `1.0` and `1e0`
/// address the same entry; untyped keys are treated as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    String(String),
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    /// Non-integral double, stored by bit pattern.
    Double(u64),
}

impl MapKey {
    pub fn from_atomic(atomic: Atomic) -> Self {
        match atomic {
            Atomic::String(s) | Atomic::Untyped(s) => MapKey::String(s),
            Atomic::Boolean(b) => MapKey::Boolean(b),
            Atomic::Integer(i) => MapKey::Integer(i),
            Atomic::Decimal(d) => match d.fract().is_zero().then(|| d.to_i64()).flatten() {
                Some(i) => MapKey::Integer(i),
                None => MapKey::Decimal(d.normalize()),
            },
            Atomic::Double(d) => {
                if d.fract() == 0.0 && d >= i64::MIN as f64 && d < i64::MAX as f64 {
                    MapKey::Integer(d as i64)
                } else if d.is_nan() {
                    MapKey::Double(f64::NAN.to_bits())
                } else {
                    MapKey::Double(d.to_bits())
                }
            }
        }
    }

    pub fn to_atomic(&self) -> Atomic {
        match self {
            MapKey::String(s) => Atomic::String(s.clone()),
            MapKey::Boolean(b) => Atomic::Boolean(*b),
            MapKey::Integer(i) => Atomic::Integer(*i),
            MapKey::Decimal(d) => Atomic::Decimal(*d),
            MapKey::Double(bits) => Atomic::Double(f64::from_bits(*bits)),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            other => f.write_str(&other.to_atomic().to_string_value()),
        }
    }
}

/// An immutable-by-convention map value; entries keep insertion order.
#[derive(Debug, Clone)]
pub struct ItemMap<N> {
    entries: IndexMap<MapKey, Item<N>>,
}

impl<N: Clone> ItemMap<N> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Builds a map from constructor entries; a repeated key is an error.
    pub fn from_entries(entries: Vec<(MapKey, Item<N>)>) -> Result<Self, EvalError> {
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            if map.contains_key(&key) {
                return Err(EvalError::DuplicateKey(key.to_string()));
            }
            map.insert(key, value);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, key: &MapKey) -> Option<&Item<N>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn put(&self, key: MapKey, value: Item<N>) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(key, value);
        Self { entries }
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Item<N>> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Item<N>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Clone> Default for ItemMap<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: PartialEq> PartialEq for ItemMap<N> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.entries.get(k).is_some_and(|o| v == o))
    }
}
