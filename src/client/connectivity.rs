//! Online/offline state shared between the request cache and whoever observes the network

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Connectivity flag backed by a `watch` channel
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });

        if changed {
            if online {
                info!("Network connection restored");
            } else {
                info!("Network connection lost, requests will wait");
            }
        }
    }

    /// Receiver for observers that want to react to changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Resolve immediately when online, otherwise once connectivity returns
    pub async fn wait_for_online(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel
        let _ = rx.wait_for(|online| *online).await;
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
