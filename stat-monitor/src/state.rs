use crate::models::{Fields, SourceId, SourceState};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Store des états par source : un verrou par source, la map n'est verrouillée
/// en écriture que pour créer une nouvelle entrée.
#[derive(Default)]
pub struct SourceStore {
    sources: RwLock<HashMap<SourceId, Shared<SourceState>>>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fusionne les champs dans l'état de `id` (créé si absent).
    /// Retourne `true` si la source vient d'être créée.
    pub fn merge(&self, id: SourceId, fields: &Fields, now: OffsetDateTime) -> bool {
        let (slot, created) = self.slot(id, now);
        slot.lock().apply(fields, now);
        created
    }

    /// Copie immuable, lue sans garder de verrou pendant le formatage.
    pub fn snapshot(&self, id: SourceId) -> Option<SourceState> {
        let slot = self.sources.read().get(&id).cloned()?;
        let state = slot.lock().clone();
        Some(state)
    }

    pub fn all_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.sources.read().keys().copied().collect();
        ids.sort();
        ids
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    fn slot(&self, id: SourceId, now: OffsetDateTime) -> (Shared<SourceState>, bool) {
        let existing = self.sources.read().get(&id).cloned();
        if let Some(slot) = existing {
            return (slot, false);
        }

        // une autre tâche a pu créer l'entrée entre les deux verrous
        let mut sources = self.sources.write();
        if let Some(slot) = sources.get(&id) {
            return (slot.clone(), false);
        }
        let slot = new_state(SourceState::new(id, now));
        sources.insert(id, slot.clone());
        (slot, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::thread;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_creates_lazily() {
        let store = SourceStore::new();
        let now = OffsetDateTime::now_utc();
        assert!(store.snapshot(SourceId::DalyBms).is_none());

        assert!(store.merge(SourceId::DalyBms, &fields(json!({"voltage": 52.0})), now));
        assert!(!store.merge(SourceId::DalyBms, &fields(json!({"current": -3.2})), now));
        assert_eq!(store.len(), 1);
        assert_eq!(store.all_ids(), vec![SourceId::DalyBms]);
    }

    #[test]
    fn disjoint_merges_are_order_independent() {
        let now = OffsetDateTime::now_utc();
        let a = fields(json!({"a": 1}));
        let b = fields(json!({"b": 2}));

        let first = SourceStore::new();
        first.merge(SourceId::Ina238, &a, now);
        first.merge(SourceId::Ina238, &b, now);

        let second = SourceStore::new();
        second.merge(SourceId::Ina238, &b, now);
        second.merge(SourceId::Ina238, &a, now);

        let expected = fields(json!({"a": 1, "b": 2}));
        assert_eq!(first.snapshot(SourceId::Ina238).unwrap().fields, expected);
        assert_eq!(second.snapshot(SourceId::Ina238).unwrap().fields, expected);
    }

    #[test]
    fn snapshot_is_detached_from_later_merges() {
        let store = SourceStore::new();
        let now = OffsetDateTime::now_utc();
        store.merge(SourceId::UnifiedBattery, &fields(json!({"battery_level": 80.0})), now);
        let snap = store.snapshot(SourceId::UnifiedBattery).unwrap();
        store.merge(SourceId::UnifiedBattery, &fields(json!({"battery_level": 79.0})), now);

        assert_eq!(snap.fields["battery_level"], json!(80.0));
    }

    #[test]
    fn concurrent_merges_never_tear_a_record() {
        let store = Arc::new(SourceStore::new());
        let now = OffsetDateTime::now_utc();
        let writers: Vec<_> = (0..4)
            .map(|n| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        let id = if n % 2 == 0 { SourceId::DalyBms } else { SourceId::Ina238 };
                        // les deux champs portent toujours la même valeur dans un message
                        store.merge(id, &fields(json!({"x": i, "y": i})), now);
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            for id in [SourceId::DalyBms, SourceId::Ina238] {
                if let Some(snap) = store.snapshot(id) {
                    assert_eq!(snap.fields.get("x"), snap.fields.get("y"));
                }
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(store.len(), 2);
    }
}
