//! Connectivity feed backed by a `watch` channel
//!
//! The platform layer pushes reachability changes through
//! [`WatchConnectivity::set`]; the network monitor subscribes to them.

use fieldvisit_core::ConnectivitySource;
use fieldvisit_domain::Connectivity;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug)]
pub struct WatchConnectivity {
    sender: watch::Sender<Connectivity>,
}

impl WatchConnectivity {
    pub fn new(initial: Connectivity) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Publish a new state; repeats of the current state are not broadcast.
    pub fn set(&self, state: Connectivity) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            debug!(%state, "connectivity changed");
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.sender.borrow()
    }
}

impl ConnectivitySource for WatchConnectivity {
    fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_changes_only() {
        let source = WatchConnectivity::new(Connectivity::Disconnected);
        let mut rx = source.subscribe();

        source.set(Connectivity::Disconnected);
        assert!(!rx.has_changed().unwrap());

        source.set(Connectivity::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Connectivity::Connected);
        assert_eq!(source.current(), Connectivity::Connected);
    }
}
