//! Persisted reactive values.

use crate::settings::store::SettingsStore;
use crate::settings::writer::SettingsWriter;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Handle for removing a listener from a [`Persisted`] cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct ListenerSet<T> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener<T>)>,
}

struct Inner<T> {
    key: String,
    value: RwLock<T>,
    listeners: Mutex<ListenerSet<T>>,
    writer: Arc<SettingsWriter>,
}

/// A preference value with observable get/set semantics backed by durable
/// storage.
///
/// The in-memory value is always the last value set, independent of whether
/// the asynchronous store write has completed. Reads never touch the store;
/// writes are serialized and persisted on the shared [`SettingsWriter`]
/// thread, in assignment order, without blocking the setter.
///
/// Corrupted or schema-mismatched stored data is treated as "value absent":
/// construction falls back to the default with a warning rather than failing,
/// so bad preferences can never block startup.
pub struct Persisted<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Persisted<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Create a cell under `key`, reading the initial value from `store` or
    /// falling back to `default`.
    ///
    /// A successfully decoded value primes the writer's dedup state, so
    /// re-setting the same value does not rewrite it.
    pub fn new(
        key: impl Into<String>,
        default: T,
        store: &dyn SettingsStore,
        writer: Arc<SettingsWriter>,
    ) -> Self {
        let key = key.into();
        let value = match store.read(&key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    writer.prime(&key, bytes);
                    value
                }
                Err(e) => {
                    tracing::warn!(%key, "stored value undecodable, using default: {e}");
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(%key, "failed to read stored value, using default: {e}");
                default
            }
        };

        Self {
            inner: Arc::new(Inner {
                key,
                value: RwLock::new(value),
                listeners: Mutex::new(ListenerSet {
                    next_id: 0,
                    entries: Vec::new(),
                }),
                writer,
            }),
        }
    }

    /// The store key this cell persists under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Latest in-memory value. Never touches the store.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Update the value.
    ///
    /// The new value is immediately visible to [`get`](Self::get) and to
    /// listeners; serialization and the store write happen later on the
    /// writer thread.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();

        // Enqueue before notifying: a listener may re-enter `set`, and store
        // writes must stay in assignment order.
        let persisted = value.clone();
        self.inner.writer.enqueue(
            &self.inner.key,
            Box::new(move || serde_json::to_vec(&persisted)),
        );

        // Snapshot the listener list so callbacks run without the lock held;
        // a listener may re-enter the cell (set, subscribe, unsubscribe).
        let listeners: Vec<Listener<T>> = {
            let set = self.inner.listeners.lock();
            set.entries.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in &listeners {
            listener(&value);
        }
    }

    /// Register a change listener.
    ///
    /// The listener is immediately invoked with the current value
    /// (replay-of-latest), then once per subsequent [`set`](Self::set).
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let listener: Listener<T> = Arc::new(listener);
        let id = {
            let mut set = self.inner.listeners.lock();
            let id = SubscriptionId(set.next_id);
            set.next_id += 1;
            set.entries.push((id, listener.clone()));
            id
        };
        // Replay outside the lock so the listener may re-enter the cell
        listener(&self.get());
        id
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .listeners
            .lock()
            .entries
            .retain(|(entry_id, _)| *entry_id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::testing::CountingStore;
    use std::sync::Arc;

    fn cell<T>(store: &Arc<CountingStore>, key: &str, default: T) -> (Persisted<T>, Arc<SettingsWriter>)
    where
        T: Serialize + DeserializeOwned + Clone + Send + 'static,
    {
        let writer = Arc::new(SettingsWriter::new(store.clone() as Arc<dyn SettingsStore>));
        let cell = Persisted::new(key, default, store.as_ref(), writer.clone());
        (cell, writer)
    }

    #[test]
    fn construction_round_trips_a_prior_write() {
        let store = Arc::new(CountingStore::new());
        store
            .write("deviceId", Some(&serde_json::to_vec("cam-1").unwrap()))
            .unwrap();

        let (cell, _writer) = cell(&store, "deviceId", String::from("default"));
        assert_eq!(cell.get(), "cam-1");
    }

    #[test]
    fn malformed_bytes_fall_back_to_default() {
        let store = Arc::new(CountingStore::new());
        store.write("enabled", Some(b"not json {{")).unwrap();

        let (cell, _writer) = cell(&store, "enabled", true);
        assert!(cell.get());
    }

    #[test]
    fn set_is_synchronously_visible() {
        let store = Arc::new(CountingStore::new());
        let (cell, _writer) = cell(&store, "enabled", false);

        cell.set(true);
        assert!(cell.get());
    }

    #[test]
    fn get_never_touches_the_store() {
        let store = Arc::new(CountingStore::new());
        let (cell, _writer) = cell(&store, "enabled", false);

        let reads_before = store.read_count();
        cell.set(true);
        cell.get();
        cell.get();
        assert_eq!(store.read_count(), reads_before);
    }

    #[test]
    fn sets_persist_in_assignment_order() {
        let store = Arc::new(CountingStore::new());
        let (cell, writer) = cell(&store, "deviceId", String::new());

        cell.set("a".to_string());
        cell.set("b".to_string());
        cell.set("c".to_string());
        writer.flush();

        assert_eq!(
            store.payloads("deviceId"),
            vec![b"\"a\"".to_vec(), b"\"b\"".to_vec(), b"\"c\"".to_vec()]
        );
    }

    #[test]
    fn reassigning_the_same_value_is_coalesced() {
        let store = Arc::new(CountingStore::new());
        let (cell, writer) = cell(&store, "enabled", false);

        cell.set(true);
        cell.set(true);
        cell.set(true);
        writer.flush();

        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn restoring_the_stored_value_skips_the_rewrite() {
        let store = Arc::new(CountingStore::new());
        store
            .write("deviceId", Some(&serde_json::to_vec("cam-1").unwrap()))
            .unwrap();
        let writes_before = store.write_count();

        let (cell, writer) = cell(&store, "deviceId", String::new());
        cell.set("cam-1".to_string());
        writer.flush();

        assert_eq!(store.write_count(), writes_before);
    }

    #[test]
    fn encode_failure_keeps_memory_authoritative() {
        let store = Arc::new(CountingStore::new());
        // serde_json refuses maps with non-string keys at encode time
        let (cell, writer) = cell(
            &store,
            "shortcuts",
            std::collections::HashMap::<(u8, u8), bool>::new(),
        );

        let mut bad = std::collections::HashMap::new();
        bad.insert((1u8, 2u8), true);
        cell.set(bad.clone());
        writer.flush();

        assert_eq!(cell.get(), bad);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn subscriber_receives_current_value_then_every_set() {
        let store = Arc::new(CountingStore::new());
        let (cell, _writer) = cell(&store, "enabled", false);
        cell.set(true);

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        cell.subscribe(move |v| sink.lock().push(*v));

        cell.set(false);
        cell.set(true);

        assert_eq!(*seen.lock(), vec![true, false, true]);
    }

    #[test]
    fn every_update_is_broadcast_even_when_unchanged() {
        let store = Arc::new(CountingStore::new());
        let (cell, _writer) = cell(&store, "enabled", false);

        let count = Arc::new(parking_lot::Mutex::new(0usize));
        let sink = count.clone();
        cell.subscribe(move |_| *sink.lock() += 1);

        cell.set(false);
        cell.set(false);

        // one replay plus one notification per set, dedup only affects I/O
        assert_eq!(*count.lock(), 3);
    }

    #[test]
    fn listener_may_set_the_cell_it_observes() {
        let store = Arc::new(CountingStore::new());
        let (cell, writer) = cell(&store, "volume", 0_i32);

        // A clamping observer writes back through the same cell it watches
        let clamp = cell.clone();
        cell.subscribe(move |v| {
            if *v < 0 {
                clamp.set(0);
            }
        });

        cell.set(-5);
        assert_eq!(cell.get(), 0);

        // Both assignments persist, in assignment order
        writer.flush();
        assert_eq!(
            store.payloads("volume"),
            vec![b"-5".to_vec(), b"0".to_vec()]
        );
    }

    #[test]
    fn listener_may_attach_another_listener() {
        let store = Arc::new(CountingStore::new());
        let (cell, _writer) = cell(&store, "enabled", false);

        let late = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let handle = cell.clone();
        let sink = late.clone();
        let armed = Arc::new(parking_lot::Mutex::new(false));
        let armed_flag = armed.clone();
        cell.subscribe(move |v| {
            // First change attaches a second observer through the same cell
            if *v && !std::mem::replace(&mut *armed_flag.lock(), true) {
                let sink = sink.clone();
                handle.subscribe(move |v| sink.lock().push(*v));
            }
        });

        cell.set(true);
        cell.set(false);

        // replay of `true`, then the subsequent set
        assert_eq!(*late.lock(), vec![true, false]);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let store = Arc::new(CountingStore::new());
        let (cell, _writer) = cell(&store, "enabled", false);

        let count = Arc::new(parking_lot::Mutex::new(0usize));
        let sink = count.clone();
        let id = cell.subscribe(move |_| *sink.lock() += 1);

        cell.set(true);
        cell.unsubscribe(id);
        cell.set(false);

        assert_eq!(*count.lock(), 2);
    }
}
