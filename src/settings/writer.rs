//! Background persistence queue.
//!
//! A single writer thread drains encode+write jobs in submission order, so
//! durable state always trails in-memory state by a prefix and never reorders.
//! Consecutive payloads under a key that serialize to identical bytes are
//! coalesced to avoid redundant I/O.

use crate::settings::store::SettingsStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

pub(crate) type EncodeFn = Box<dyn FnOnce() -> Result<Vec<u8>, serde_json::Error> + Send>;

enum Job {
    /// Encode and persist a value.
    Write { key: String, encode: EncodeFn },
    /// Seed dedup state with bytes already known to be in the store.
    Prime { key: String, payload: Vec<u8> },
    /// Acknowledge once every prior job has been processed.
    Flush(SyncSender<()>),
}

/// Shared background writer for persisted settings.
///
/// Jobs run to completion once submitted; there is no cancellation. Dropping
/// the writer closes the queue and joins the thread, draining whatever was
/// already enqueued.
pub struct SettingsWriter {
    tx: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SettingsWriter {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name("settings-writer".into())
            .spawn(move || {
                let mut last: HashMap<String, Vec<u8>> = HashMap::new();
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Prime { key, payload } => {
                            last.insert(key, payload);
                        }
                        Job::Write { key, encode } => {
                            let payload = match encode() {
                                Ok(p) => p,
                                Err(e) => {
                                    tracing::warn!(%key, "skipping write, encode failed: {e}");
                                    continue;
                                }
                            };
                            if last.get(&key).map(Vec::as_slice) == Some(payload.as_slice()) {
                                tracing::trace!(%key, "unchanged payload, write coalesced");
                                continue;
                            }
                            match store.write(&key, Some(&payload)) {
                                Ok(()) => {
                                    last.insert(key, payload);
                                }
                                Err(e) => {
                                    // Leave dedup state untouched so the next
                                    // set retries the payload.
                                    tracing::warn!(%key, "settings write failed: {e}");
                                }
                            }
                        }
                        Job::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })
            .expect("failed to spawn settings writer thread");

        Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    pub(crate) fn enqueue(&self, key: &str, encode: EncodeFn) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Job::Write {
                key: key.to_string(),
                encode,
            });
        }
    }

    pub(crate) fn prime(&self, key: &str, payload: Vec<u8>) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Job::Prime {
                key: key.to_string(),
                payload,
            });
        }
    }

    /// Block until every previously submitted job has been processed.
    pub fn flush(&self) {
        let ack_rx = {
            let tx = self.tx.lock();
            let Some(tx) = tx.as_ref() else { return };
            let (ack_tx, ack_rx) = mpsc::sync_channel(1);
            if tx.send(Job::Flush(ack_tx)).is_err() {
                return;
            }
            ack_rx
        };
        let _ = ack_rx.recv();
    }
}

impl Drop for SettingsWriter {
    fn drop(&mut self) {
        self.tx.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}
