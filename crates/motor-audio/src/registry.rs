//! The set of streams the pump services each frame.

use crate::source::StreamId;

/// What the sweep callback decided for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Keep,
    Retire,
}

/// Unordered list of currently playing streams.
///
/// Removal swaps the last entry into the freed slot, so order is not
/// preserved.
#[derive(Debug, Default)]
pub struct PlaybackRegistry {
    playing: Vec<StreamId>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.playing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playing.is_empty()
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.playing.contains(&id)
    }

    pub fn ids(&self) -> &[StreamId] {
        &self.playing
    }

    /// Register `id`. Returns false if it was already registered.
    pub fn insert(&mut self, id: StreamId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.playing.push(id);
        true
    }

    /// Unregister `id`. Returns false if it was not registered.
    pub fn remove(&mut self, id: StreamId) -> bool {
        match self.playing.iter().position(|&p| p == id) {
            Some(index) => {
                self.playing.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Visit every registered stream once, dropping those `f` retires.
    ///
    /// The cursor only advances past an entry that was kept; a retired entry
    /// is replaced by the last one, which is visited next.
    pub fn sweep<F: FnMut(StreamId) -> Sweep>(&mut self, mut f: F) -> usize {
        let mut retired = 0;
        let mut cursor = 0;
        while cursor < self.playing.len() {
            match f(self.playing[cursor]) {
                Sweep::Keep => cursor += 1,
                Sweep::Retire => {
                    self.playing.swap_remove(cursor);
                    retired += 1;
                }
            }
        }
        retired
    }

    pub fn clear(&mut self) {
        self.playing.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut registry = PlaybackRegistry::new();
        assert!(registry.insert(StreamId(1)));
        assert!(!registry.insert(StreamId(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_swaps_last_in() {
        let mut registry = PlaybackRegistry::new();
        for id in 1..=4 {
            registry.insert(StreamId(id));
        }
        assert!(registry.remove(StreamId(2)));
        assert!(!registry.remove(StreamId(2)));
        assert_eq!(registry.ids(), &[StreamId(1), StreamId(4), StreamId(3)]);
    }

    #[test]
    fn test_sweep_visits_swapped_entry() {
        let mut registry = PlaybackRegistry::new();
        for id in 1..=3 {
            registry.insert(StreamId(id));
        }
        let mut visited = Vec::new();
        let retired = registry.sweep(|id| {
            visited.push(id.0);
            if id.0 == 1 { Sweep::Retire } else { Sweep::Keep }
        });
        assert_eq!(retired, 1);
        assert_eq!(visited, vec![1, 3, 2]);
        assert_eq!(registry.ids(), &[StreamId(3), StreamId(2)]);
    }

    #[test]
    fn test_sweep_retire_all() {
        let mut registry = PlaybackRegistry::new();
        for id in 1..=5 {
            registry.insert(StreamId(id));
        }
        assert_eq!(registry.sweep(|_| Sweep::Retire), 5);
        assert!(registry.is_empty());
    }

    proptest! {
        #[test]
        fn sweep_visits_each_stream_once(
            retire in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let mut registry = PlaybackRegistry::new();
            for id in 0..retire.len() as u64 {
                registry.insert(StreamId(id));
            }

            let mut visited = Vec::new();
            let retired = registry.sweep(|id| {
                visited.push(id.0);
                if retire[id.0 as usize] { Sweep::Retire } else { Sweep::Keep }
            });

            let unique: HashSet<u64> = visited.iter().copied().collect();
            prop_assert_eq!(visited.len(), retire.len());
            prop_assert_eq!(unique.len(), retire.len());
            prop_assert_eq!(retired, retire.iter().filter(|&&r| r).count());

            let kept: HashSet<u64> = registry.ids().iter().map(|id| id.0).collect();
            let expected: HashSet<u64> = (0..retire.len() as u64)
                .filter(|&id| !retire[id as usize])
                .collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
