//! An add-remove container for nogoods with hash-indexed duplicate
//! suppression.

use std::collections::BTreeSet;

use fnv::FnvHashMap;
use log::debug;

use crate::hexkin_assert_extreme;
use crate::nogoods::Nogood;

/// Stores nogoods in a slot vector. Duplicate insertions bump a per-slot
/// add-count instead of creating a new entry; removed slots are reused
/// lowest-first and can be compacted away with [`NogoodSet::defragment`].
#[derive(Clone, Debug, Default)]
pub struct NogoodSet {
    nogoods: Vec<Nogood>,
    add_count: Vec<u32>,
    free_slots: BTreeSet<usize>,
    by_hash: FnvHashMap<u64, Vec<usize>>,
}

impl NogoodSet {
    pub fn new() -> NogoodSet {
        NogoodSet::default()
    }

    /// Adds a nogood and returns its slot index. An equal nogood that is
    /// already present keeps its index and has its add-count incremented.
    pub fn add_nogood(&mut self, nogood: Nogood) -> usize {
        if let Some(slots) = self.by_hash.get(&nogood.hash_value()) {
            for index in slots {
                if self.nogoods[*index] == nogood {
                    self.add_count[*index] += 1;
                    return *index;
                }
            }
        }

        let index = match self.free_slots.pop_first() {
            Some(slot) => {
                self.nogoods[slot] = nogood;
                self.add_count[slot] = 1;
                slot
            }
            None => {
                self.nogoods.push(nogood);
                self.add_count.push(1);
                self.nogoods.len() - 1
            }
        };
        self.by_hash
            .entry(self.nogoods[index].hash_value())
            .or_default()
            .push(index);
        index
    }

    pub fn nogood(&self, index: usize) -> &Nogood {
        &self.nogoods[index]
    }

    pub fn add_count(&self, index: usize) -> u32 {
        self.add_count[index]
    }

    /// The number of live nogoods.
    pub fn count(&self) -> usize {
        self.nogoods.len() - self.free_slots.len()
    }

    /// The number of slots, live or free. Indices below this bound may be
    /// probed with [`NogoodSet::is_live`].
    pub fn slot_count(&self) -> usize {
        self.nogoods.len()
    }

    pub fn is_live(&self, index: usize) -> bool {
        index < self.nogoods.len() && !self.free_slots.contains(&index)
    }

    fn unregister_hash(&mut self, index: usize) {
        if let Some(slots) = self.by_hash.get_mut(&self.nogoods[index].hash_value()) {
            slots.retain(|slot| *slot != index);
            if slots.is_empty() {
                let _ = self.by_hash.remove(&self.nogoods[index].hash_value());
            }
        }
    }

    pub fn remove_by_index(&mut self, index: usize) {
        if !self.is_live(index) {
            return;
        }
        self.add_count[index] = 0;
        self.unregister_hash(index);
        let _ = self.free_slots.insert(index);
    }

    pub fn remove_nogood(&mut self, nogood: &Nogood) {
        let index = self
            .by_hash
            .get(&nogood.hash_value())
            .into_iter()
            .flatten()
            .copied()
            .find(|slot| &self.nogoods[*slot] == nogood);
        if let Some(index) = index {
            debug!("removing nogood {:?} (index {})", nogood, index);
            self.remove_by_index(index);
        }
    }

    fn prune_free_tail(&mut self) {
        while let Some(last) = self.nogoods.len().checked_sub(1) {
            if !self.free_slots.remove(&last) {
                break;
            }
            let _ = self.nogoods.pop();
            let _ = self.add_count.pop();
        }
    }

    /// Compacts the slot vector so that no free slots remain; live indices
    /// are renumbered contiguously.
    pub fn defragment(&mut self) {
        if self.free_slots.is_empty() {
            return;
        }

        // repeatedly move the last live slot into the lowest free slot
        self.prune_free_tail();
        while let Some(free) = self.free_slots.pop_first() {
            let used = self.nogoods.len() - 1;
            self.nogoods.swap(free, used);
            self.add_count.swap(free, used);
            let _ = self.nogoods.pop();
            let _ = self.add_count.pop();
            let hash = self.nogoods[free].hash_value();
            let slots = self.by_hash.entry(hash).or_default();
            slots.retain(|slot| *slot != used);
            slots.push(free);
            self.prune_free_tail();
        }

        hexkin_assert_extreme!(
            self.by_hash
                .values()
                .flatten()
                .all(|slot| *slot < self.nogoods.len()),
            "hash index points past the compacted slot vector"
        );
    }

    /// Deletes every nogood whose add-count is below 5 % of the maximum
    /// add-count.
    pub fn forget_least_frequently_added(&mut self) {
        let max = self
            .by_hash
            .values()
            .flatten()
            .map(|slot| self.add_count[*slot])
            .max()
            .unwrap_or(0);
        let threshold = max as f64 * 0.05;
        for index in 0..self.nogoods.len() {
            if self.is_live(index) && (self.add_count[index] as f64) < threshold {
                debug!("forgetting nogood {:?}", self.nogoods[index]);
                self.remove_by_index(index);
            }
        }
    }

    /// Iterates the live slot indices.
    pub fn live_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nogoods.len()).filter(|index| !self.free_slots.contains(index))
    }
}

#[cfg(test)]
mod tests {
    use super::NogoodSet;
    use crate::basic_types::Id;
    use crate::nogoods::Nogood;

    fn ng(addrs: &[(u32, bool)]) -> Nogood {
        Nogood::from_literals(
            addrs
                .iter()
                .map(|(addr, positive)| Id::literal(*addr, *positive, true)),
        )
    }

    #[test]
    fn duplicate_insertion_is_idempotent_except_for_add_count() {
        let mut set = NogoodSet::new();
        let first = set.add_nogood(ng(&[(1, true), (2, false)]));
        assert_eq!(set.add_count(first), 1);

        let second = set.add_nogood(ng(&[(2, false), (1, true)]));
        assert_eq!(first, second);
        assert_eq!(set.add_count(first), 2);
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn removed_slots_are_reused_lowest_first() {
        let mut set = NogoodSet::new();
        let a = set.add_nogood(ng(&[(1, true)]));
        let b = set.add_nogood(ng(&[(2, true)]));
        let _c = set.add_nogood(ng(&[(3, true)]));
        set.remove_by_index(b);
        set.remove_by_index(a);
        assert_eq!(set.count(), 1);

        let d = set.add_nogood(ng(&[(4, true)]));
        assert_eq!(d, a);
    }

    #[test]
    fn defragment_preserves_content() {
        let mut set = NogoodSet::new();
        let mut expected = Vec::new();
        for address in 0..8 {
            let nogood = ng(&[(address, true), (address + 100, false)]);
            let _ = set.add_nogood(nogood.clone());
            expected.push(nogood);
        }
        set.remove_nogood(&expected.remove(1));
        set.remove_nogood(&expected.remove(4));
        set.defragment();

        assert_eq!(set.count(), 6);
        assert_eq!(set.slot_count(), 6);
        let mut live: Vec<_> = set.live_indices().map(|i| set.nogood(i).clone()).collect();
        live.sort_by_key(Nogood::hash_value);
        expected.sort_by_key(Nogood::hash_value);
        assert_eq!(live, expected);

        // re-adding an existing nogood must still find it after renumbering
        let index = set.add_nogood(expected[0].clone());
        assert_eq!(set.count(), 6);
        assert_eq!(set.add_count(index), 2);
    }

    #[test]
    fn forgetting_drops_rarely_added_nogoods() {
        let mut set = NogoodSet::new();
        let frequent = ng(&[(1, true)]);
        for _ in 0..100 {
            let _ = set.add_nogood(frequent.clone());
        }
        let rare = set.add_nogood(ng(&[(2, true)]));
        set.forget_least_frequently_added();
        assert!(!set.is_live(rare));
        assert_eq!(set.count(), 1);
        set.defragment();
        assert_eq!(set.slot_count(), 1);
    }
}
