//! # store
//!
//! Process-wide typed state store — the only legal cross-task mutable
//! state.
//!
//! Each record type owns a flat keyspace prefix (its lowercased name).
//! `save` writes every field of a record and bumps the record's `.count`
//! counter as one transaction under the write lock; the counter is then
//! published on a per-record broadcast channel so subscribers know to
//! `load`. Readers take a counter-consistent snapshot under the read
//! lock and never observe a torn write.
//!
//! ## Guarantees
//! - At most one counter value published per save.
//! - Counters within a record type are observed in monotonic order.
//! - No ordering guarantee across distinct record types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, RwLock};

/// Capacity of each per-record counter channel. Laggards drop counters,
/// never block the saver.
const CHANNEL_CAPACITY: usize = 16;

/// Wall clock as fractional seconds since the epoch, the store's
/// timestamp representation.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

// ── Values ────────────────────────────────────────────────────────────────────

/// A single stored field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Fractional seconds since the epoch.
    Timestamp(f64),
    Str(String),
}

// ── Record schema ─────────────────────────────────────────────────────────────

/// A snapshot view over one record's keyspace, handed to
/// [`Record::from_fields`] while the read lock is held.
pub struct Snapshot<'a> {
    prefix: &'static str,
    fields: &'a HashMap<String, Value>,
}

impl Snapshot<'_> {
    fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(&format!("{}.{}", self.prefix, field))
    }

    pub fn i64(&self, field: &str, default: i64) -> i64 {
        match self.get(field) {
            Some(Value::Int(v)) => *v,
            _ => default,
        }
    }

    pub fn f64(&self, field: &str, default: f64) -> f64 {
        match self.get(field) {
            Some(Value::Float(v)) => *v,
            Some(Value::Int(v)) => *v as f64,
            _ => default,
        }
    }

    pub fn bool(&self, field: &str, default: bool) -> bool {
        match self.get(field) {
            Some(Value::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn timestamp(&self, field: &str, default: f64) -> f64 {
        match self.get(field) {
            Some(Value::Timestamp(v)) => *v,
            Some(Value::Float(v)) => *v,
            _ => default,
        }
    }

    pub fn string(&self, field: &str, default: &str) -> String {
        match self.get(field) {
            Some(Value::Str(v)) => v.clone(),
            _ => default.to_string(),
        }
    }
}

/// A record with an explicit, hand-written field schema.
///
/// Flattening rules: scalars under `prefix.field`; arrays as
/// `prefix.field1`, `prefix.field2`, …; composite fields spelled out as
/// sub-fields (`prefix.location.latitude`).
pub trait Record: Default + Send + Sync + 'static {
    /// Lowercased record-type name, the keyspace prefix.
    const PREFIX: &'static str;

    /// Field names (without prefix) and values, every field every time.
    fn to_fields(&self) -> Vec<(String, Value)>;

    /// Rebuild from a snapshot; absent fields take the record default.
    fn from_fields(snap: &Snapshot<'_>) -> Self;
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    fields: HashMap<String, Value>,
    counters: HashMap<&'static str, u64>,
    channels: HashMap<&'static str, broadcast::Sender<u64>>,
}

impl Inner {
    fn channel(&mut self, prefix: &'static str) -> broadcast::Sender<u64> {
        self.channels
            .entry(prefix)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

/// Cheaply cloneable handle to the shared store.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<Inner>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write default field values for `T`, only where absent. Idempotent.
    pub async fn setup<T: Record>(&self) {
        let defaults = T::default().to_fields();
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        for (field, value) in defaults {
            inner
                .fields
                .entry(format!("{}.{}", T::PREFIX, field))
                .or_insert(value);
        }
        inner.counters.entry(T::PREFIX).or_insert(0);
    }

    /// Persist every field of `record` and bump its counter as a single
    /// transaction, then publish the new counter. Returns the counter.
    pub async fn save<T: Record>(&self, record: &T) -> u64 {
        let fields = record.to_fields();
        let (count, tx) = {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            for (field, value) in fields {
                inner
                    .fields
                    .insert(format!("{}.{}", T::PREFIX, field), value);
            }
            let counter = inner.counters.entry(T::PREFIX).or_insert(0);
            *counter += 1;
            let count = *counter;
            inner
                .fields
                .insert(format!("{}.count", T::PREFIX), Value::Int(count as i64));
            (count, inner.channel(T::PREFIX))
        };
        // Publish outside the lock; no receivers is fine.
        let _ = tx.send(count);
        count
    }

    /// Load-modify-save under one write lock, so read-modify-write from
    /// a record's single writer (and the shared alarm bitmap) cannot
    /// interleave with another saver.
    pub async fn update<T: Record>(&self, mutate: impl FnOnce(&mut T)) -> u64 {
        let (count, tx) = {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            let mut record = T::from_fields(&Snapshot {
                prefix: T::PREFIX,
                fields: &inner.fields,
            });
            mutate(&mut record);
            for (field, value) in record.to_fields() {
                inner
                    .fields
                    .insert(format!("{}.{}", T::PREFIX, field), value);
            }
            let counter = inner.counters.entry(T::PREFIX).or_insert(0);
            *counter += 1;
            let count = *counter;
            inner
                .fields
                .insert(format!("{}.count", T::PREFIX), Value::Int(count as i64));
            (count, inner.channel(T::PREFIX))
        };
        let _ = tx.send(count);
        count
    }

    /// Counter-consistent snapshot of `T`.
    pub async fn load<T: Record>(&self) -> T {
        let guard = self.inner.read().await;
        T::from_fields(&Snapshot {
            prefix: T::PREFIX,
            fields: &guard.fields,
        })
    }

    pub async fn counter<T: Record>(&self) -> u64 {
        self.inner
            .read()
            .await
            .counters
            .get(T::PREFIX)
            .copied()
            .unwrap_or(0)
    }

    /// Subscribe to `T`'s counter channel. Subscribers receive counters
    /// published after this call and `load` when they want the data.
    pub async fn subscribe<T: Record>(&self) -> broadcast::Receiver<u64> {
        self.inner.write().await.channel(T::PREFIX).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Probe {
        depth: f64,
        label: String,
        wet: bool,
    }

    impl Record for Probe {
        const PREFIX: &'static str = "probe";

        fn to_fields(&self) -> Vec<(String, Value)> {
            vec![
                ("depth".into(), Value::Float(self.depth)),
                ("label".into(), Value::Str(self.label.clone())),
                ("wet".into(), Value::Bool(self.wet)),
            ]
        }

        fn from_fields(snap: &Snapshot<'_>) -> Self {
            Self {
                depth: snap.f64("depth", 0.0),
                label: snap.string("label", ""),
                wet: snap.bool("wet", false),
            }
        }
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let store = StateStore::new();
        let rec = Probe {
            depth: 12.5,
            label: "keel".into(),
            wet: true,
        };
        let count = store.save(&rec).await;
        assert_eq!(count, 1);
        assert_eq!(store.load::<Probe>().await, rec);
        assert_eq!(store.counter::<Probe>().await, 1);
    }

    #[tokio::test]
    async fn setup_is_idempotent_and_never_overwrites() {
        let store = StateStore::new();
        store
            .save(&Probe {
                depth: 3.0,
                ..Default::default()
            })
            .await;
        store.setup::<Probe>().await;
        store.setup::<Probe>().await;
        assert_eq!(store.load::<Probe>().await.depth, 3.0);
    }

    #[tokio::test]
    async fn subscribers_see_monotonic_counters() {
        let store = StateStore::new();
        let mut rx = store.subscribe::<Probe>().await;
        store.save(&Probe::default()).await;
        store.save(&Probe::default()).await;
        assert_eq!(rx.recv().await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_applies_mutation_atomically() {
        let store = StateStore::new();
        store
            .save(&Probe {
                depth: 1.0,
                ..Default::default()
            })
            .await;
        store.update::<Probe>(|p| p.depth += 1.0).await;
        assert_eq!(store.load::<Probe>().await.depth, 2.0);
        assert_eq!(store.counter::<Probe>().await, 2);
    }

    #[tokio::test]
    async fn missing_fields_take_defaults() {
        let store = StateStore::new();
        let loaded = store.load::<Probe>().await;
        assert_eq!(loaded, Probe::default());
    }
}
