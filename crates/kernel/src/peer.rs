use std::sync::Mutex;

use gridrealm_common::protocol::{self, Notify};
use tracing::warn;

/// Outbound half of a client session. Implementations frame and transmit
/// the already-encoded bytes.
pub trait RemotePeer: Send + Sync {
    fn send(&self, bytes: Vec<u8>);
}

/// Encode and send one notification; encoding failures are logged and dropped.
pub(crate) fn send_notify(peer: &dyn RemotePeer, message: &Notify) {
    match protocol::encode(message) {
        Ok(bytes) => peer.send(bytes),
        Err(e) => warn!(error = %e, "dropping notification"),
    }
}

/// Peer that keeps every payload in memory. Used by headless drivers.
#[derive(Debug, Default)]
pub struct MemoryPeer {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MemoryPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode and drain everything received so far. Undecodable payloads
    /// are skipped.
    pub fn take(&self) -> Vec<Notify> {
        let raw = match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(_) => return Vec::new(),
        };
        raw.iter()
            .filter_map(|bytes| protocol::decode(bytes).ok())
            .collect()
    }
}

impl RemotePeer for MemoryPeer {
    fn send(&self, bytes: Vec<u8>) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(bytes);
        }
    }
}
