//! Change dispatcher
//!
//! Polls every tag's debounced state on a fixed period, compares it with the
//! published snapshot and notifies both sinks on change:
//! - push subscribers get the full snapshot (a fresh viewer needs all tags)
//! - the UDP sink gets one line for the changed tag only

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use motion_common::TagChange;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::state::SharedState;
use crate::udp::UdpNotifier;

/// Periodic reconciliation of tag states against the published snapshot
pub struct ChangeDispatcher {
    state: Arc<SharedState>,
    udp: UdpNotifier,
    poll_interval: Duration,
}

impl ChangeDispatcher {
    pub fn new(state: Arc<SharedState>, udp: UdpNotifier, poll_interval: Duration) -> Self {
        Self {
            state,
            udp,
            poll_interval,
        }
    }

    /// Poll until `shutdown` turns true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Change dispatcher started (every {} ms, UDP to {})",
            self.poll_interval.as_millis(),
            self.udp.destination()
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reconcile(Instant::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Change dispatcher stopped");
    }

    /// One poll: publish every tag whose debounced state differs from the snapshot
    pub async fn reconcile(&self, now: Instant) -> Vec<TagChange> {
        let sampled = self.state.registry.sample(now);

        let mut changes = Vec::new();
        {
            let mut snapshot = self.state.snapshot.write().await;
            for (id, moving) in sampled {
                if let Some(change) = snapshot.record(&id, moving, Utc::now()) {
                    debug!("Published {} moving={}", change.id, change.moving);
                    self.state.broadcast_snapshot(snapshot.clone());
                    changes.push(change);
                }
            }
        }

        for change in &changes {
            self.udp.notify(change).await;
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket;

    async fn setup() -> (Arc<SharedState>, ChangeDispatcher, UdpSocket) {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let udp = UdpNotifier::bind(receiver.local_addr().unwrap().to_string())
            .await
            .unwrap();
        let state = Arc::new(SharedState::new(Duration::from_secs(4)));
        let dispatcher = ChangeDispatcher::new(Arc::clone(&state), udp, Duration::from_millis(500));
        (state, dispatcher, receiver)
    }

    async fn recv_line(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 128];
        let (n, _) = socket.recv_from(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_empty_registry_publishes_nothing() {
        let (state, dispatcher, _receiver) = setup().await;
        assert!(dispatcher.reconcile(Instant::now()).await.is_empty());
        assert!(state.current_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_sighting_is_published() {
        let (state, dispatcher, receiver) = setup().await;
        let mut rx = state.subscribe();
        let t0 = Instant::now();
        state.registry.update("AA:BB", true, t0);

        let changes = dispatcher.reconcile(t0).await;
        assert_eq!(changes, vec![TagChange { id: "AA:BB".to_string(), moving: true }]);

        let pushed = rx.recv().await.unwrap();
        assert!(pushed.get("AA:BB").unwrap().moving);
        assert_eq!(recv_line(&receiver).await, "AA:BB,1\n");
    }

    #[tokio::test]
    async fn test_repeated_polls_without_change_are_silent() {
        let (state, dispatcher, _receiver) = setup().await;
        let t0 = Instant::now();
        state.registry.update("AA:BB", true, t0);
        dispatcher.reconcile(t0).await;

        let mut rx = state.subscribe();
        for i in 1..5 {
            let changes = dispatcher.reconcile(t0 + Duration::from_millis(500 * i)).await;
            assert!(changes.is_empty());
        }
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_still_is_published_after_threshold() {
        let (state, dispatcher, receiver) = setup().await;
        let t0 = Instant::now();
        state.registry.update("AA:BB", true, t0);
        dispatcher.reconcile(t0).await;
        assert_eq!(recv_line(&receiver).await, "AA:BB,1\n");

        let stop = t0 + Duration::from_secs(1);
        state.registry.update("AA:BB", false, stop);

        // Within the grace window nothing changes
        assert!(dispatcher.reconcile(stop + Duration::from_secs(3)).await.is_empty());

        let changes = dispatcher.reconcile(stop + Duration::from_secs(4)).await;
        assert_eq!(changes, vec![TagChange { id: "AA:BB".to_string(), moving: false }]);
        assert_eq!(recv_line(&receiver).await, "AA:BB,0\n");
        assert!(!state.current_snapshot().await.get("AA:BB").unwrap().moving);
    }

    #[tokio::test]
    async fn test_each_change_broadcasts_full_snapshot() {
        let (state, dispatcher, _receiver) = setup().await;
        let mut rx = state.subscribe();
        let t0 = Instant::now();
        state.registry.update("A", true, t0);
        state.registry.update("B", true, t0);

        let changes = dispatcher.reconcile(t0).await;
        assert_eq!(changes.len(), 2);

        let _first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (state, dispatcher, receiver) = setup().await;
        state.registry.update("AA:BB", true, Instant::now());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(dispatcher.run(rx));

        // First tick fires immediately
        assert_eq!(recv_line(&receiver).await, "AA:BB,1\n");

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("dispatcher should stop")
            .unwrap();
    }
}
