//! Generic selection set over item identifiers
//!
//! The same type backs requirement selection (keyed by requirement id) and
//! test case selection (keyed by row id).

use std::collections::HashSet;
use std::hash::Hash;
use uuid::Uuid;

use crate::models::{Requirement, TestCase};

/// Items that can be referenced from a [`SelectionSet`]
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> &Self::Key;
}

impl Keyed for TestCase {
    type Key = Uuid;

    fn key(&self) -> &Uuid {
        &self.id
    }
}

impl Keyed for Requirement {
    type Key = String;

    fn key(&self) -> &String {
        &self.id
    }
}

/// Identifiers marked for the next bulk operation.
///
/// Mutations never fail. Ids that no longer resolve are dropped when the
/// set is materialized against the current items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSet<K: Eq + Hash> {
    ids: HashSet<K>,
}

impl<K: Eq + Hash> Default for SelectionSet<K> {
    fn default() -> Self {
        Self {
            ids: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> SelectionSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes or excludes one id
    pub fn toggle(&mut self, id: K, included: bool) {
        if included {
            self.ids.insert(id);
        } else {
            self.ids.remove(&id);
        }
    }

    /// Replaces the selection with exactly `ids`
    pub fn select_all<I: IntoIterator<Item = K>>(&mut self, ids: I) {
        self.ids = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drops every id in `ids` from the selection
    pub fn remove_all<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        for id in ids {
            self.ids.remove(id);
        }
    }

    /// Keeps only the ids accepted by `present`
    pub fn retain<F: FnMut(&K) -> bool>(&mut self, present: F) {
        self.ids.retain(present);
    }

    pub fn contains(&self, id: &K) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.ids.iter()
    }

    /// Resolves the selection against `items`, in item order.
    ///
    /// Selected ids with no matching item are skipped silently.
    pub fn materialize<'a, T>(&self, items: &'a [T]) -> Vec<&'a T>
    where
        T: Keyed<Key = K>,
    {
        items
            .iter()
            .filter(|item| self.ids.contains(item.key()))
            .collect()
    }
}
