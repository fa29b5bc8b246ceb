//! Diff resolution for keyed sub-resource collections.
//!
//! Every sub-resource reconciler starts here: given the last-known state
//! and the desired plan for one collection, compute the minimal
//! add/update/remove sets. Pure functions, no I/O.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::error::PlanError;

/// The minimal operation set converging one keyed collection.
///
/// The three sets partition by key: no key appears in more than one, and
/// entries identical between state and plan appear in none.
#[derive(Debug, Clone)]
pub struct KeyedDiff<T> {
    /// Entries present in the plan but not in state.
    pub to_add: Vec<T>,
    /// Entries present in both with differing values.
    pub to_update: Vec<UpdatedEntry<T>>,
    /// Entries present in state but absent from the plan.
    pub to_remove: Vec<T>,
}

/// An entry whose key survives but whose value changed.
#[derive(Debug, Clone)]
pub struct UpdatedEntry<T> {
    /// The entry as last known (carries server-assigned identifiers).
    pub previous: T,
    /// The entry as desired.
    pub desired: T,
}

impl<T> KeyedDiff<T> {
    /// Returns true if nothing needs to change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    /// Returns the total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_remove.len()
    }
}

impl<T> Default for KeyedDiff<T> {
    fn default() -> Self {
        Self {
            to_add: vec![],
            to_update: vec![],
            to_remove: vec![],
        }
    }
}

/// Computes the diff between a state collection and a plan collection,
/// matching entries by `key_fn`.
///
/// Additions and updates come out in plan order; removals in state order.
/// An empty plan against a non-empty state yields "remove all" -- the
/// distinct "no change" signal is expressed by the caller never invoking
/// the resolver (plan field absent).
pub fn diff_keyed<T, K, F>(state: &[T], plan: &[T], key_fn: F) -> KeyedDiff<T>
where
    T: Clone + PartialEq,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let state_by_key: HashMap<K, &T> = state.iter().map(|entry| (key_fn(entry), entry)).collect();
    let plan_keys: HashSet<K> = plan.iter().map(&key_fn).collect();

    let mut diff = KeyedDiff::default();

    for desired in plan {
        match state_by_key.get(&key_fn(desired)) {
            None => diff.to_add.push(desired.clone()),
            Some(previous) if *previous != desired => diff.to_update.push(UpdatedEntry {
                previous: (*previous).clone(),
                desired: desired.clone(),
            }),
            Some(_) => {}
        }
    }

    for previous in state {
        if !plan_keys.contains(&key_fn(previous)) {
            diff.to_remove.push(previous.clone());
        }
    }

    diff
}

/// The resolved form of an order-significant collection (routes).
#[derive(Debug, Clone)]
pub struct OrderedDiff<T> {
    /// The desired entries in plan-declared order.
    pub entries: Vec<T>,
    /// Whether the desired sequence differs from state.
    pub changed: bool,
}

/// Resolves an order-significant collection, matching state entries by a
/// content-derived key.
///
/// # Errors
///
/// Returns [`PlanError::AmbiguousEntry`] when two plan entries share a
/// content key -- such an entry cannot be matched unambiguously against
/// state.
pub fn diff_ordered<T, K, F>(
    state: &[T],
    plan: &[T],
    key_fn: F,
    collection: &str,
) -> Result<OrderedDiff<T>, PlanError>
where
    T: Clone + PartialEq,
    K: Eq + Hash + std::fmt::Display,
    F: Fn(&T) -> K,
{
    let mut seen: HashSet<K> = HashSet::with_capacity(plan.len());
    for entry in plan {
        let key = key_fn(entry);
        if !seen.insert(key) {
            return Err(PlanError::AmbiguousEntry {
                collection: collection.to_string(),
                key: key_fn(entry).to_string(),
            });
        }
    }

    Ok(OrderedDiff {
        changed: state != plan,
        entries: plan.to_vec(),
    })
}
