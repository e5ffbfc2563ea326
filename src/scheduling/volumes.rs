//! Volume Sets
//!
//! Per-driver sets of volume identifiers. Identifiers are claim keys
//! (`<namespace>/<claim>`), so two pods mounting the same claim contribute a
//! single identifier.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

/// Mapping from CSI driver name to the deduplicated volume identifiers it serves
///
/// A driver never maps to an empty set and driver names are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Volumes {
    by_driver: BTreeMap<String, BTreeSet<String>>,
}

impl Volumes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `volume_id` under `driver`
    ///
    /// Repeated inserts are no-ops. Empty driver names or identifiers are
    /// ignored.
    pub fn add(&mut self, driver: impl Into<String>, volume_id: impl Into<String>) {
        let driver = driver.into();
        let volume_id = volume_id.into();
        if driver.is_empty() || volume_id.is_empty() {
            return;
        }
        self.by_driver.entry(driver).or_default().insert(volume_id);
    }

    /// Union of both sets, leaving `self` and `other` untouched
    pub fn union(&self, other: &Volumes) -> Volumes {
        let mut merged = self.clone();
        merged.insert(other);
        merged
    }

    /// Merge `other` into `self`
    pub fn insert(&mut self, other: &Volumes) {
        for (driver, ids) in &other.by_driver {
            match self.by_driver.get_mut(driver) {
                Some(existing) => existing.extend(ids.iter().cloned()),
                None => {
                    self.by_driver.insert(driver.clone(), ids.clone());
                }
            }
        }
    }

    /// Identifiers tracked for `driver`
    pub fn get(&self, driver: &str) -> Option<&BTreeSet<String>> {
        self.by_driver.get(driver)
    }

    /// Number of identifiers tracked for `driver`
    pub fn count(&self, driver: &str) -> usize {
        self.by_driver.get(driver).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, driver: &str, volume_id: &str) -> bool {
        self.by_driver
            .get(driver)
            .is_some_and(|ids| ids.contains(volume_id))
    }

    /// Driver names, in sorted order
    pub fn drivers(&self) -> impl Iterator<Item = &str> {
        self.by_driver.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, BTreeSet<String>> {
        self.by_driver.iter()
    }

    /// Number of drivers
    pub fn len(&self) -> usize {
        self.by_driver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_driver.is_empty()
    }

    /// Number of identifiers across all drivers
    pub fn total(&self) -> usize {
        self.by_driver.values().map(BTreeSet::len).sum()
    }
}

impl<'a> IntoIterator for &'a Volumes {
    type Item = (&'a String, &'a BTreeSet<String>);
    type IntoIter = btree_map::Iter<'a, String, BTreeSet<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<D, V> FromIterator<(D, V)> for Volumes
where
    D: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (D, V)>>(iter: I) -> Self {
        let mut volumes = Volumes::new();
        for (driver, id) in iter {
            volumes.add(driver, id);
        }
        volumes
    }
}

impl<D, V> Extend<(D, V)> for Volumes
where
    D: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (D, V)>>(&mut self, iter: I) {
        for (driver, id) in iter {
            self.add(driver, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EBS: &str = "ebs.csi.aws.com";
    const PD: &str = "pd.csi.storage.gke.io";

    #[test]
    fn test_add_is_idempotent() {
        let mut volumes = Volumes::new();
        volumes.add(EBS, "ns/pvc-1");
        volumes.add(EBS, "ns/pvc-1");
        volumes.add(EBS, "ns/pvc-2");

        assert_eq!(volumes.count(EBS), 2);
        assert_eq!(volumes.len(), 1);
        assert!(volumes.contains(EBS, "ns/pvc-1"));
        assert!(!volumes.contains(PD, "ns/pvc-1"));
    }

    #[test]
    fn test_add_ignores_empty_driver() {
        let mut volumes = Volumes::new();
        volumes.add("", "ns/pvc-1");
        volumes.add(EBS, "");

        assert!(volumes.is_empty());
        assert_eq!(volumes.get(""), None);
        assert_eq!(volumes.get(EBS), None);
    }

    #[test]
    fn test_union_leaves_inputs_untouched() {
        let a: Volumes = [(EBS, "ns/pvc-1"), (EBS, "ns/pvc-2")].into_iter().collect();
        let b: Volumes = [(EBS, "ns/pvc-2"), (PD, "ns/pvc-3")].into_iter().collect();
        let a_before = a.clone();
        let b_before = b.clone();

        let merged = a.union(&b);

        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
        // shared identifier counted once
        assert_eq!(merged.count(EBS), 2);
        assert!(merged.count(EBS) < a.count(EBS) + b.count(EBS));
        assert_eq!(merged.count(PD), 1);
        assert_eq!(merged.total(), 3);
    }

    #[test]
    fn test_union_of_disjoint_sets_adds_counts() {
        let a: Volumes = [(EBS, "ns/pvc-1")].into_iter().collect();
        let b: Volumes = [(EBS, "ns/pvc-2"), (EBS, "ns/pvc-3")].into_iter().collect();

        let merged = a.union(&b);
        assert_eq!(merged.count(EBS), a.count(EBS) + b.count(EBS));
    }

    #[test]
    fn test_insert_order_independent() {
        let sets: Vec<Volumes> = vec![
            [(EBS, "ns/a"), (PD, "ns/b")].into_iter().collect(),
            [(EBS, "ns/a"), (EBS, "ns/c")].into_iter().collect(),
            [(PD, "ns/d")].into_iter().collect(),
        ];

        let mut forward = Volumes::new();
        for set in &sets {
            forward.insert(set);
        }

        let mut backward = Volumes::new();
        for set in sets.iter().rev() {
            backward.insert(set);
        }

        // (a ∪ b) ∪ c == a ∪ (b ∪ c)
        let mut grouped = sets[0].clone();
        grouped.insert(&sets[1].union(&sets[2]));

        assert_eq!(forward, backward);
        assert_eq!(forward, grouped);
        assert_eq!(forward.count(EBS), 2);
        assert_eq!(forward.count(PD), 2);
    }

    #[test]
    fn test_drivers_sorted() {
        let mut volumes = Volumes::new();
        volumes.extend([(PD, "ns/b"), (EBS, "ns/a")]);

        let drivers: Vec<_> = volumes.drivers().collect();
        assert_eq!(drivers, vec![EBS, PD]);
    }
}
