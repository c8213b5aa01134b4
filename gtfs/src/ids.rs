use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// IDs exactly as they appear in the GTFS files.
pub mod orig {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct StopID(String);

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct TripID(String);

    impl StopID {
        pub fn new<S: Into<String>>(x: S) -> Self {
            Self(x.into())
        }

        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl TripID {
        pub fn new<S: Into<String>>(x: S) -> Self {
            Self(x.into())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopID(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripID(usize);

impl CheapID for StopID {
    fn new(x: usize) -> Self {
        Self(x)
    }
}
impl CheapID for TripID {
    fn new(x: usize) -> Self {
        Self(x)
    }
}

pub trait CheapID: Copy {
    fn new(x: usize) -> Self;
}

/// Assigns dense numeric IDs in insertion order, so iterating a map keyed by the cheap ID
/// follows file order.
#[derive(Serialize, Deserialize)]
pub struct IDMapping<K: Ord, V> {
    orig_to_cheap: BTreeMap<K, V>,
    // We don't need to store the inverse. It's more convenient for each object to own that.
}

impl<K: Clone + std::fmt::Debug + Ord, V: CheapID> IDMapping<K, V> {
    pub fn new() -> Self {
        Self {
            orig_to_cheap: BTreeMap::new(),
        }
    }

    pub fn insert_new(&mut self, orig: K) -> Result<V> {
        let cheap = V::new(self.orig_to_cheap.len());
        if self.orig_to_cheap.insert(orig.clone(), cheap).is_some() {
            bail!("IDMapping::insert_new has duplicate input for {:?}", orig);
        }
        Ok(cheap)
    }

    pub fn lookup(&self, orig: &K) -> Result<V> {
        match self.orig_to_cheap.get(orig) {
            Some(x) => Ok(*x),
            None => bail!("IDMapping lookup of {:?} failed", orig),
        }
    }

    pub fn len(&self) -> usize {
        self.orig_to_cheap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orig_to_cheap.is_empty()
    }
}

impl<K: Clone + std::fmt::Debug + Ord, V: CheapID> Default for IDMapping<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheap_ids_follow_insertion_order() {
        let mut ids: IDMapping<orig::StopID, StopID> = IDMapping::new();
        let b = ids.insert_new(orig::StopID::new("b")).unwrap();
        let a = ids.insert_new(orig::StopID::new("a")).unwrap();
        assert!(b < a);
        assert_eq!(ids.lookup(&orig::StopID::new("a")).unwrap(), a);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn duplicates_and_unknowns_fail() {
        let mut ids: IDMapping<orig::TripID, TripID> = IDMapping::new();
        ids.insert_new(orig::TripID::new("t1")).unwrap();
        assert!(ids.insert_new(orig::TripID::new("t1")).is_err());
        assert!(ids.lookup(&orig::TripID::new("t2")).is_err());
    }
}
