//! # Connectivity
//!
//! Two separate signals, with different jobs:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ReachabilityProbe (authoritative)     NetworkMonitor (advisory)        │
//! │  ─────────────────────────────────     ───────────────────────────      │
//! │  HEAD {base}/inventariocomputo         last-known online flag           │
//! │  bounded timeout                       cheap to read, watchable         │
//! │                                                                         │
//! │  Asked right before every              Drives the UI and the            │
//! │  send-or-enqueue decision and          offline → online edge that       │
//! │  at the start of every pass.           starts an automatic pass.        │
//! │                                                                         │
//! │                    NEVER used as the final gate for a send              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Edge Detection
//! ```text
//!   monitor:  off ── off ── on ── on ── on ── off ── on
//!   edge:                   ▲                        ▲
//!                        fires                    fires
//! ```
//! Repeated "online" events and the state the subscriber starts in never
//! fire.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

use crate::config::RemoteSettings;
use crate::error::SyncResult;

// =============================================================================
// Reachability Probe
// =============================================================================

/// Authoritative "can we talk to the inventory service right now" check.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns `false` on any transport error, timeout or server failure.
    async fn probe_reachable(&self) -> bool;
}

/// Probes the service with a bounded `HEAD` request.
///
/// Any response below 500 counts as reachable: the route exists and the
/// server answered. Response bodies are ignored.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    url: Url,
}

impl HttpProber {
    pub fn new(settings: &RemoteSettings) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.probe_timeout())
            .connect_timeout(settings.probe_timeout())
            .build()?;

        Ok(HttpProber {
            client,
            url: settings.probe_url()?,
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProber {
    async fn probe_reachable(&self) -> bool {
        match self.client.head(self.url.clone()).send().await {
            Ok(resp) if resp.status().is_server_error() => {
                debug!(status = %resp.status(), "Probe answered with server error");
                false
            }
            Ok(resp) => {
                debug!(status = %resp.status(), "Probe succeeded");
                true
            }
            Err(e) => {
                debug!(error = %e, timeout = e.is_timeout(), "Probe failed");
                false
            }
        }
    }
}

// =============================================================================
// Network Monitor
// =============================================================================

/// Last-known connectivity, shared by the UI and the sync agent.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<NetworkState>>,
}

/// Value carried by the watch channel.
///
/// `reconnects` counts offline → online transitions so a listener that only
/// sees the coalesced latest value still learns that a reconnect happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NetworkState {
    online: bool,
    reconnects: u64,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(NetworkState {
            online: initially_online,
            reconnects: 0,
        });
        NetworkMonitor { tx: Arc::new(tx) }
    }

    /// Records a network-state event. Returns `true` if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if current.online == online {
                return false;
            }
            current.online = online;
            if online {
                current.reconnects += 1;
            }
            true
        });

        if changed {
            info!(online, "Network state changed");
        }
        changed
    }

    /// The last state reported.
    pub fn last_known(&self) -> bool {
        self.tx.borrow().online
    }

    /// Subscribes to state changes. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> NetworkSubscription {
        NetworkSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Subscribes to offline → online transitions only.
    pub fn online_edges(&self) -> OnlineEdge {
        OnlineEdge::new(self.subscribe())
    }
}

/// A live view of the monitor's state.
#[derive(Debug)]
pub struct NetworkSubscription {
    rx: watch::Receiver<NetworkState>,
}

impl NetworkSubscription {
    /// Waits for the next change and returns the new state.
    ///
    /// Returns `None` once every monitor handle is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        Some(self.next_state().await?.online)
    }

    pub fn current(&self) -> bool {
        self.rx.borrow().online
    }

    async fn next_state(&mut self) -> Option<NetworkState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// Fires once per offline → online transition.
///
/// Transitions that happen while nobody is polling are not lost: if the
/// device dropped and came back between two polls, the next poll fires.
#[derive(Debug)]
pub struct OnlineEdge {
    subscription: NetworkSubscription,
    seen_reconnects: u64,
}

impl OnlineEdge {
    fn new(subscription: NetworkSubscription) -> Self {
        let seen_reconnects = subscription.rx.borrow().reconnects;
        OnlineEdge {
            subscription,
            seen_reconnects,
        }
    }

    /// Waits until the device comes back online.
    ///
    /// Cancel-safe. Returns `None` once the monitor is gone.
    pub async fn next_online(&mut self) -> Option<()> {
        loop {
            let state = self.subscription.next_state().await?;
            let rising = state.reconnects != self.seen_reconnects;
            self.seen_reconnects = state.reconnects;
            if rising && state.online {
                return Some(());
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
