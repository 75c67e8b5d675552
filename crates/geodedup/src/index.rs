//! Order-maintained index over one scalar projection of a record set.
//!
//! A [`SortedIndex`] keeps `(key, id)` pairs sorted by key in a balanced tree,
//! plus an id map for O(log n) removal. Two of them (latitude and longitude)
//! form the rectangular pre-filter of the deduplicator.

use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Record identifier type.
pub type RecordId = u64;

/// Errors reported by [`SortedIndex`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// The id is not (or no longer) in the index.
    #[error("Unknown id {0}: not present in index")]
    UnknownId(RecordId),

    /// Two records share the same id.
    #[error("Duplicate id {0}")]
    DuplicateId(RecordId),

    /// The key projection produced NaN or an infinity.
    #[error("Non-finite key for id {id}")]
    NonFiniteKey { id: RecordId },
}

pub type Result<T> = std::result::Result<T, IndexError>;

type Entry = (OrderedFloat<f64>, RecordId);

/// Sorted index over borrowed records.
///
/// Invariants:
/// - `entries` is ordered ascending by key, ties broken by id;
/// - every id in `by_id` has exactly one entry in `entries`, with the same key.
pub struct SortedIndex<'a, T> {
    entries: BTreeSet<Entry>,
    by_id: HashMap<RecordId, (OrderedFloat<f64>, &'a T)>,
}

impl<'a, T> SortedIndex<'a, T> {
    /// Build an index over `records`, keyed by `key_fn` and identified by `id_fn`.
    ///
    /// # Errors
    /// [`IndexError::NonFiniteKey`] if a key is NaN or infinite,
    /// [`IndexError::DuplicateId`] if two records share an id.
    pub fn build<K, I>(records: &'a [T], key_fn: K, id_fn: I) -> Result<Self>
    where
        K: Fn(&T) -> f64,
        I: Fn(&T) -> RecordId,
    {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut entries = BTreeSet::new();

        for record in records {
            let id = id_fn(record);
            let key = key_fn(record);
            if !key.is_finite() {
                return Err(IndexError::NonFiniteKey { id });
            }
            let key = OrderedFloat(key);
            if by_id.insert(id, (key, record)).is_some() {
                return Err(IndexError::DuplicateId(id));
            }
            entries.insert((key, id));
        }

        Ok(Self { entries, by_id })
    }

    /// Records with `low <= key <= high`, in ascending key order.
    ///
    /// Bounds are inclusive. Infinite bounds are allowed; an inverted range or a
    /// NaN bound yields nothing.
    pub fn range(&self, low: f64, high: f64) -> impl Iterator<Item = (RecordId, &'a T)> + '_ {
        let bounds = if low.is_nan() || high.is_nan() || low > high {
            None
        } else {
            Some((OrderedFloat(low), RecordId::MIN)..=(OrderedFloat(high), RecordId::MAX))
        };

        bounds
            .into_iter()
            .flat_map(move |bounds| self.entries.range(bounds))
            .map(move |&(_, id)| (id, self.by_id[&id].1))
    }

    /// Ids with `low <= key <= high`, in ascending key order.
    pub fn range_ids(&self, low: f64, high: f64) -> impl Iterator<Item = RecordId> + '_ {
        self.range(low, high).map(|(id, _)| id)
    }

    /// Remove the record with `id`, returning it.
    ///
    /// # Errors
    /// [`IndexError::UnknownId`] if `id` is absent, including when it was
    /// already removed. The index is left untouched in that case.
    pub fn remove_by_id(&mut self, id: RecordId) -> Result<&'a T> {
        let (key, record) = self.by_id.remove(&id).ok_or(IndexError::UnknownId(id))?;
        let removed = self.entries.remove(&(key, id));
        debug_assert!(removed, "id map and key set out of sync for {id}");
        Ok(record)
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&'a T> {
        self.by_id.get(&id).map(|&(_, record)| record)
    }

    /// Whether `id` is present.
    #[must_use]
    pub fn contains_id(&self, id: RecordId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// All records in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &'a T)> + '_ {
        self.entries.iter().map(move |&(_, id)| (id, self.by_id[&id].1))
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    #[derive(Debug, Clone)]
    struct Item {
        id: u64,
        key: f64,
    }

    fn items(keys: &[f64]) -> Vec<Item> {
        keys.iter()
            .enumerate()
            .map(|(i, &key)| Item { id: i as u64, key })
            .collect()
    }

    fn build(items: &[Item]) -> SortedIndex<'_, Item> {
        SortedIndex::build(items, |it| it.key, |it| it.id).unwrap()
    }

    #[test]
    fn test_build_and_full_range() {
        let data = items(&[3.0, -1.0, 2.5, 0.0, 2.5]);
        let index = build(&data);

        assert_eq!(index.len(), 5);
        let all: Vec<_> = index.range(f64::NEG_INFINITY, f64::INFINITY).collect();
        assert_eq!(all.len(), 5);

        let keys: Vec<f64> = all.iter().map(|(_, it)| it.key).collect();
        assert_eq!(keys, vec![-1.0, 0.0, 2.5, 2.5, 3.0]);
    }

    #[test]
    fn test_full_range_any_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data: Vec<Item> = (0..200)
            .map(|i| Item {
                id: i,
                key: rng.gen_range(-90.0..90.0),
            })
            .collect();

        for _ in 0..5 {
            data.shuffle(&mut rng);
            let index = build(&data);
            let mut ids: Vec<_> = index.range_ids(f64::NEG_INFINITY, f64::INFINITY).collect();
            ids.sort_unstable();
            assert_eq!(ids, (0..200).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_range_is_inclusive() {
        let data = items(&[1.0, 2.0, 3.0, 4.0]);
        let index = build(&data);

        let ids: Vec<_> = index.range_ids(2.0, 3.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_range_ties_all_returned() {
        let data = items(&[5.0, 5.0, 5.0, 6.0]);
        let index = build(&data);

        let ids: Vec<_> = index.range_ids(5.0, 5.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_range_inverted_or_nan_is_empty() {
        let data = items(&[1.0, 2.0]);
        let index = build(&data);

        assert_eq!(index.range(3.0, 1.0).count(), 0);
        assert_eq!(index.range(f64::NAN, 1.0).count(), 0);
        assert_eq!(index.range(0.0, f64::NAN).count(), 0);
    }

    #[test]
    fn test_range_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(42);
        let data: Vec<Item> = (0..500)
            .map(|i| Item {
                id: i,
                key: (rng.gen_range(-1800..1800) as f64) / 10.0,
            })
            .collect();
        let index = build(&data);

        for _ in 0..100 {
            let a: f64 = rng.gen_range(-200.0..200.0);
            let b: f64 = a + rng.gen_range(0.0..50.0);

            let got: Vec<(u64, f64)> = index.range(a, b).map(|(id, it)| (id, it.key)).collect();

            let mut expected: Vec<(u64, f64)> = data
                .iter()
                .filter(|it| a <= it.key && it.key <= b)
                .map(|it| (it.id, it.key))
                .collect();
            expected.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));

            assert_eq!(got, expected);
            assert!(got.windows(2).all(|w| w[0].1 <= w[1].1));
        }
    }

    #[test]
    fn test_remove_by_id() {
        let data = items(&[1.0, 2.0, 2.0, 3.0]);
        let mut index = build(&data);

        let removed = index.remove_by_id(2).unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(index.len(), 3);
        assert!(!index.contains_id(2));
        assert!(index.get(2).is_none());
        assert!(index.range_ids(f64::NEG_INFINITY, f64::INFINITY).all(|id| id != 2));

        // The other record with the same key is still there.
        assert_eq!(index.range_ids(2.0, 2.0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_double_removal_is_reported() {
        let data = items(&[1.0, 2.0]);
        let mut index = build(&data);

        assert!(index.remove_by_id(0).is_ok());
        assert_eq!(index.remove_by_id(0).unwrap_err(), IndexError::UnknownId(0));
        assert_eq!(index.remove_by_id(99).unwrap_err(), IndexError::UnknownId(99));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_all_then_empty() {
        let data = items(&[0.5, -0.5, 0.0]);
        let mut index = build(&data);
        for id in 0..3 {
            index.remove_by_id(id).unwrap();
        }
        assert!(index.is_empty());
        assert_eq!(index.range(f64::NEG_INFINITY, f64::INFINITY).count(), 0);
    }

    #[test]
    fn test_build_rejects_duplicate_id() {
        let data = vec![Item { id: 1, key: 0.0 }, Item { id: 1, key: 1.0 }];
        let result = SortedIndex::build(&data, |it| it.key, |it| it.id);
        assert_eq!(result.err(), Some(IndexError::DuplicateId(1)));
    }

    #[test]
    fn test_build_rejects_nan_key() {
        let data = vec![Item { id: 4, key: f64::NAN }];
        let result = SortedIndex::build(&data, |it| it.key, |it| it.id);
        assert_eq!(result.err(), Some(IndexError::NonFiniteKey { id: 4 }));
    }

    #[test]
    fn test_iter_order() {
        let data = items(&[9.0, -9.0, 0.0]);
        let index = build(&data);
        let order: Vec<_> = index.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_empty_index() {
        let data: Vec<Item> = Vec::new();
        let index = build(&data);
        assert!(index.is_empty());
        assert_eq!(index.range(-1.0, 1.0).count(), 0);
    }
}
