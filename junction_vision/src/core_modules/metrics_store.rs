// THEORY:
// The metrics store is the one place where the pipeline's output becomes
// visible to the rest of the process. The pipeline task is its only writer;
// HTTP handlers, overlay renderers and pollers are readers.
//
// Every publish replaces the whole `JunctionSnapshot` behind an `Arc` in a
// `tokio::sync::watch` channel. A reader therefore holds either the previous
// snapshot or the next one, never a mix of fields from both, and the writer is
// only blocked for the pointer swap.

use crate::pipeline::JunctionSnapshot;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle to the latest published snapshot.
#[derive(Clone)]
pub struct MetricsStore {
    tx: Arc<watch::Sender<Arc<JunctionSnapshot>>>,
}

impl MetricsStore {
    pub fn new(initial: JunctionSnapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Atomically replaces the published snapshot.
    pub fn publish(&self, snapshot: JunctionSnapshot) {
        self.tx.send_replace(Arc::new(snapshot));
    }

    /// The most recently published snapshot.
    pub fn read_state(&self) -> Arc<JunctionSnapshot> {
        self.tx.borrow().clone()
    }

    /// A receiver that is notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<JunctionSnapshot>> {
        self.tx.subscribe()
    }
}
