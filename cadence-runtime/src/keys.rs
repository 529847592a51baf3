//! Current key table
//!
//! Holds the latest known state per key id and computes this cycle's
//! edges from each drained batch. Only the engine thread touches it.
//!
//! Merge rules, applied once per cycle:
//!
//! 1. Every retained entry's edge flag is cleared.
//! 2. Incoming keys are processed in submission order. A key whose id is
//!    already in the table is flagged if its state differs, inherits the
//!    retained friendly name and replaces the entry. A key seen for the
//!    first time is flagged and gets a generated name.
//! 3. The batch, with its flags, is kept as the cycle's incoming
//!    snapshot until the next merge.
//!
//! Because each incoming key replaces the table entry before the next one
//! is diffed, a press and release of the same id in one batch produce two
//! flagged entries in the snapshot and leave the release in the table.

use cadence_core::{Key, KeyId, KeyState, NameGenerator};

/// Retained key states plus the current cycle's incoming batch
pub struct KeyTable {
    current: Vec<Key>,
    incoming: Vec<Key>,
    names: Box<dyn NameGenerator>,
}

impl KeyTable {
    /// Empty table
    pub fn new(names: Box<dyn NameGenerator>) -> Self {
        Self {
            current: Vec::new(),
            incoming: Vec::new(),
            names,
        }
    }

    /// Merge a drained batch and replace the incoming snapshot
    pub fn merge(&mut self, batch: Vec<Key>) {
        for key in &mut self.current {
            key.item_mut().set_just_changed(false);
        }
        self.incoming.clear();

        for mut key in batch {
            match self.current.iter().position(|k| k.id() == key.id()) {
                Some(index) => {
                    let retained = self.current.remove(index);
                    let changed = retained.state() != key.state();
                    key.item_mut().set_just_changed(changed);
                    if let Some(name) = retained.friendly_name() {
                        key.item_mut().set_friendly_name(name);
                    }
                }
                None => {
                    key.item_mut().set_just_changed(true);
                    key.item_mut().ensure_name("Key", self.names.as_mut());
                }
            }
            self.current.push(key.clone());
            self.incoming.push(key);
        }
    }

    /// Latest retained state of `id`
    pub fn get(&self, id: impl Into<KeyId>) -> Option<&Key> {
        let id = id.into();
        self.current.iter().find(|k| k.id() == id)
    }

    /// Latest retained state of the key named `name`
    pub fn get_named(&self, name: &str) -> Option<&Key> {
        self.current.iter().find(|k| k.friendly_name() == Some(name))
    }

    /// Check if `id` currently has `state`
    ///
    /// Keys never submitted match nothing.
    pub fn is(&self, id: impl Into<KeyId>, state: KeyState) -> bool {
        self.get(id).is_some_and(|k| k.is(state))
    }

    /// Check if the key named `name` currently has `state`
    pub fn named_is(&self, name: &str, state: KeyState) -> bool {
        self.get_named(name).is_some_and(|k| k.is(state))
    }

    /// Check if `id` changed to `state` in this cycle's batch
    pub fn just_changed_to(&self, id: impl Into<KeyId>, state: KeyState) -> bool {
        let id = id.into();
        self.incoming
            .iter()
            .any(|k| k.id() == id && k.just_changed_to(state))
    }

    /// Check if the key named `name` changed to `state` in this cycle's batch
    pub fn named_just_changed_to(&self, name: &str, state: KeyState) -> bool {
        self.incoming
            .iter()
            .any(|k| k.friendly_name() == Some(name) && k.just_changed_to(state))
    }

    /// Retained keys, oldest update first
    pub fn current(&self) -> &[Key] {
        &self.current
    }

    /// This cycle's batch after diffing
    pub fn incoming(&self) -> &[Key] {
        &self.incoming
    }

    /// Forget every key
    pub fn clear(&mut self) {
        self.current.clear();
        self.incoming.clear();
    }
}

impl core::fmt::Debug for KeyTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyTable")
            .field("current", &self.current)
            .field("incoming", &self.incoming)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::item::label;
    use cadence_core::Sequential;
    use proptest::prelude::*;

    fn table() -> KeyTable {
        KeyTable::new(Box::new(Sequential::new()))
    }

    #[test]
    fn test_first_appearance_is_a_change() {
        let mut keys = table();
        keys.merge(vec![Key::active('A')]);

        let a = keys.get('A').unwrap();
        assert!(a.is_active());
        assert!(a.just_changed());
        assert_eq!(a.friendly_name(), Some("Key0"));
        assert!(keys.just_changed_to('A', KeyState::Active));
    }

    #[test]
    fn test_repeated_state_is_not_a_change() {
        let mut keys = table();
        keys.merge(vec![Key::active('A')]);
        keys.merge(vec![Key::active('A')]);

        assert!(!keys.get('A').unwrap().just_changed());
        assert!(!keys.just_changed_to('A', KeyState::Active));
        assert!(keys.is('A', KeyState::Active));
    }

    #[test]
    fn test_state_flip_is_a_change() {
        let mut keys = table();
        keys.merge(vec![Key::active('A')]);
        keys.merge(vec![Key::inactive('A')]);

        assert!(keys.get('A').unwrap().just_changed());
        assert!(keys.just_changed_to('A', KeyState::Inactive));
        assert!(keys.is('A', KeyState::Inactive));
    }

    #[test]
    fn test_untouched_keys_keep_state() {
        let mut keys = table();
        keys.merge(vec![Key::active('A'), Key::active('B')]);
        keys.merge(vec![Key::inactive('B')]);

        let a = keys.get('A').unwrap();
        assert!(a.is_active());
        assert!(!a.just_changed());
        assert!(keys.get('B').unwrap().just_changed());

        keys.merge(Vec::new());
        assert!(keys.incoming().is_empty());
        assert!(!keys.get('B').unwrap().just_changed());
        assert!(keys.is('B', KeyState::Inactive));
    }

    #[test]
    fn test_names_are_sticky() {
        let mut keys = table();
        keys.merge(vec![Key::active('W').with_label(label("forward").unwrap())]);
        keys.merge(vec![Key::inactive('W').with_label(label("other").unwrap())]);

        assert_eq!(keys.get('W').unwrap().friendly_name(), Some("forward"));
        assert!(keys.named_is("forward", KeyState::Inactive));
        assert!(keys.named_just_changed_to("forward", KeyState::Inactive));
        assert!(keys.get_named("other").is_none());
    }

    #[test]
    fn test_duplicate_ids_in_one_batch() {
        let mut keys = table();
        keys.merge(vec![Key::inactive('S')]);
        keys.merge(vec![Key::active('S'), Key::inactive('S')]);

        // Last entry wins the table
        assert_eq!(keys.current().len(), 1);
        assert!(keys.is('S', KeyState::Inactive));

        // Both transitions are visible this cycle
        assert!(keys.just_changed_to('S', KeyState::Active));
        assert!(keys.just_changed_to('S', KeyState::Inactive));
    }

    #[test]
    fn test_duplicate_same_state_in_one_batch() {
        let mut keys = table();
        keys.merge(vec![Key::active('S'), Key::active('S')]);

        assert_eq!(keys.incoming().len(), 2);
        assert!(keys.incoming()[0].just_changed());
        assert!(!keys.incoming()[1].just_changed());
        assert!(!keys.get('S').unwrap().just_changed());
    }

    #[test]
    fn test_unknown_keys_match_nothing() {
        let keys = table();
        assert!(!keys.is('Z', KeyState::Inactive));
        assert!(!keys.just_changed_to('Z', KeyState::Active));
        assert!(keys.get_named("Key0").is_none());
    }

    fn batch() -> impl Strategy<Value = Vec<(u32, bool)>> {
        proptest::collection::vec((0u32..4, any::<bool>()), 0..8)
    }

    proptest! {
        #[test]
        fn prop_table_tracks_last_state(batches in proptest::collection::vec(batch(), 1..6)) {
            let mut keys = table();
            let mut expected = std::collections::BTreeMap::new();

            for batch in batches {
                let before = expected.clone();
                keys.merge(
                    batch
                        .iter()
                        .map(|&(id, active)| Key::new(id, KeyState::from_bool(active)))
                        .collect(),
                );
                for &(id, active) in &batch {
                    expected.insert(id, active);
                }

                for (&id, &active) in &expected {
                    let key = keys.get(id).unwrap();
                    prop_assert_eq!(key.is_active(), active);
                    // Unique ids in the table
                    prop_assert_eq!(keys.current().iter().filter(|k| k.id() == KeyId(id)).count(), 1);
                    if !batch.iter().any(|&(b, _)| b == id) {
                        prop_assert!(!key.just_changed());
                    } else if batch.iter().filter(|&&(b, _)| b == id).count() == 1 {
                        let changed = before.get(&id) != Some(&active);
                        prop_assert_eq!(key.just_changed(), changed);
                    }
                }
            }
        }
    }
}
