use std::collections::BTreeMap;

use super::FeatureId;

/// Features of one fragment keyed by id, in insertion order.
#[derive(Debug)]
pub struct FeatureTable<F> {
    features: BTreeMap<FeatureId, F>,
    next_id: u32,
}

impl<F> Default for FeatureTable<F> {
    fn default() -> Self {
        Self {
            features: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<F> FeatureTable<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, feature: F) -> FeatureId {
        let id = FeatureId::new(self.next_id);
        self.next_id += 1;
        self.features.insert(id, feature);
        id
    }

    pub fn get(&self, id: FeatureId) -> Option<&F> {
        self.features.get(&id)
    }

    pub fn get_mut(&mut self, id: FeatureId) -> Option<&mut F> {
        self.features.get_mut(&id)
    }

    pub fn remove(&mut self, id: FeatureId) -> Option<F> {
        self.features.remove(&id)
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.features.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.features.keys().copied()
    }

    /// First feature matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&F) -> bool) -> Option<FeatureId> {
        self.features
            .iter()
            .find(|(_, feature)| predicate(feature))
            .map(|(id, _)| *id)
    }

    /// Empties the table and restarts ids at 1, handing back the features so
    /// the caller can dispose of their scene objects.
    pub fn clear(&mut self) -> Vec<F> {
        self.next_id = 1;
        std::mem::take(&mut self.features).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_and_not_reused() {
        let mut table = FeatureTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!((a.get(), b.get()), (1, 2));

        table.remove(b);
        let c = table.insert("c");
        assert_eq!(c.get(), 3);
        assert!(!table.contains(b));
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut table = FeatureTable::new();
        table.insert(1);
        table.insert(2);
        assert_eq!(table.clear(), vec![1, 2]);
        assert!(table.is_empty());
        assert_eq!(table.insert(3).get(), 1);
    }

    #[test]
    fn test_find() {
        let mut table = FeatureTable::new();
        table.insert(10);
        let id = table.insert(20);
        assert_eq!(table.find(|v| *v == 20), Some(id));
        assert_eq!(table.find(|v| *v == 30), None);
    }
}
