//! The privileged side of the channel.
//!
//! A [`Bridge`] owns the channel token, forwards UI commands to the engine
//! and relays its state snapshots upward. The engine may not be listening
//! yet when the first commands arrive, so commands are buffered until the
//! engine announces `ready`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::channel::{ChannelNames, ChannelToken, Command, Percent, Transport};
use crate::state::AudioState;
use crate::volume::{VolumeMethod, VolumeSetting};
use crate::{ChannelError, EngineConfig};

/// Messages the bridge forwards to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeUpdate {
    /// The engine announced readiness.
    Ready,
    /// A state snapshot arrived from the engine.
    AudioState(AudioState),
}

/// Answer to a status query, served from the bridge's own setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    /// Last requested volume, in percent.
    pub volume: f64,
    /// Last requested method.
    pub method: VolumeMethod,
    /// Whether new media re-apply the volume.
    pub persist: bool,
    /// Whether the engine has announced readiness.
    pub ready: bool,
}

struct BridgeState {
    ready: bool,
    pending: VecDeque<String>,
    setting: VolumeSetting,
    persist: bool,
}

/// Forwards commands to one page's engine and collects its state.
///
/// # Example
///
/// ```ignore
/// use page_audio::{Bridge, ChannelTransport, EngineConfig, VolumeMethod};
/// use tokio::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel(32);
/// let bridge = Bridge::new(ChannelTransport::new(tx), EngineConfig::default());
///
/// // Hand bridge.token() to the loader, then:
/// bridge.set_volume(300.0, VolumeMethod::Both).await?;
/// let state = bridge.query_state().await;
/// ```
pub struct Bridge {
    token: ChannelToken,
    names: ChannelNames,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    state: Mutex<BridgeState>,
    snapshots: watch::Sender<Option<AudioState>>,
    updates: Option<mpsc::Sender<BridgeUpdate>>,
}

impl Bridge {
    /// Creates a bridge with a freshly generated token.
    pub fn new<T: Transport + 'static>(transport: T, config: EngineConfig) -> Self {
        Self::with_token(transport, config, ChannelToken::generate())
    }

    /// Creates a bridge with a known token.
    pub fn with_token<T: Transport + 'static>(
        transport: T,
        config: EngineConfig,
        token: ChannelToken,
    ) -> Self {
        let names = ChannelNames::new(&config.channel_prefix, &token);
        let (snapshots, _) = watch::channel(None);
        Self {
            token,
            names,
            transport: Arc::new(transport),
            config,
            state: Mutex::new(BridgeState {
                ready: false,
                pending: VecDeque::new(),
                setting: VolumeSetting::default(),
                persist: false,
            }),
            snapshots,
            updates: None,
        }
    }

    /// Forward readiness and snapshots to `sender`.
    #[must_use]
    pub fn with_updates(mut self, sender: mpsc::Sender<BridgeUpdate>) -> Self {
        self.updates = Some(sender);
        self
    }

    /// The token to deliver to the engine out of band.
    pub fn token(&self) -> &ChannelToken {
        &self.token
    }

    /// This bridge's channel event names.
    pub fn channel_names(&self) -> &ChannelNames {
        &self.names
    }

    /// Returns `true` once the engine announced readiness.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Number of commands waiting for the engine.
    pub fn pending_commands(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Stores and forwards a volume change.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidLevel`] if `level` is not a usable number,
    /// or whatever the transport reports.
    pub async fn set_volume(
        &self,
        level: impl Into<Percent>,
        method: VolumeMethod,
    ) -> Result<(), ChannelError> {
        let level = level.into();
        let setting = VolumeSetting::from_percent(level.value()?, method);
        self.state.lock().setting = setting;
        self.send(&Command::SetVolume { level, method }).await
    }

    /// Stores and forwards the persist flag.
    ///
    /// # Errors
    ///
    /// Whatever the transport reports.
    pub async fn set_persist(&self, enabled: bool) -> Result<(), ChannelError> {
        self.state.lock().persist = enabled;
        self.send(&Command::SetPersist { enabled }).await
    }

    /// The bridge's own view of the current setting.
    pub fn status(&self) -> BridgeStatus {
        let st = self.state.lock();
        BridgeStatus {
            volume: st.setting.percent(),
            method: st.setting.method,
            persist: st.persist,
            ready: st.ready,
        }
    }

    /// The most recent snapshot received, if any.
    pub fn latest_state(&self) -> Option<AudioState> {
        self.snapshots.borrow().clone()
    }

    /// Asks the engine for a fresh snapshot.
    ///
    /// Waits at most [`EngineConfig::state_query_timeout`], then returns the
    /// latest snapshot received, which may be stale or `None`. Never fails.
    pub async fn query_state(&self) -> Option<AudioState> {
        // Subscribing marks the current snapshot as seen
        let mut receiver = self.snapshots.subscribe();

        if let Err(e) = self.send(&Command::GetState).await {
            tracing::debug!(error = %e, "state query not delivered");
        } else if tokio::time::timeout(self.config.state_query_timeout, receiver.changed())
            .await
            .is_err()
        {
            tracing::debug!(
                timeout_ms = self.config.state_query_timeout.as_millis() as u64,
                "state query timed out, returning last snapshot"
            );
        }
        self.latest_state()
    }

    /// Feeds an event from the channel.
    ///
    /// Events not addressed to this bridge are ignored.
    pub async fn handle_event(&self, event: &str, detail: &str) {
        if event == self.names.ready() {
            self.on_ready().await;
        } else if event == self.names.state() {
            match serde_json::from_str::<AudioState>(detail) {
                Ok(state) => {
                    self.snapshots.send_replace(Some(state.clone()));
                    self.forward(BridgeUpdate::AudioState(state)).await;
                }
                Err(e) => tracing::debug!(error = %e, "dropping malformed state"),
            }
        } else {
            tracing::trace!(event, "ignoring foreign event");
        }
    }

    async fn on_ready(&self) {
        let pending = {
            let mut st = self.state.lock();
            st.ready = true;
            std::mem::take(&mut st.pending)
        };
        tracing::info!(flushed = pending.len(), "engine ready");

        for payload in pending {
            if let Err(e) = self.transport.emit(self.names.command(), &payload).await {
                tracing::warn!(error = %e, "failed to flush buffered command");
            }
        }
        self.forward(BridgeUpdate::Ready).await;
    }

    async fn send(&self, command: &Command) -> Result<(), ChannelError> {
        let payload = command.encode()?;
        {
            let mut st = self.state.lock();
            if !st.ready {
                if st.pending.len() >= self.config.pending_command_capacity {
                    st.pending.pop_front();
                    tracing::debug!("engine not ready, dropping oldest buffered command");
                }
                if self.config.pending_command_capacity > 0 {
                    st.pending.push_back(payload);
                }
                return Ok(());
            }
        }
        self.transport.emit(self.names.command(), &payload).await
    }

    async fn forward(&self, update: BridgeUpdate) {
        if let Some(ref updates) = self.updates {
            if updates.send(update).await.is_err() {
                tracing::debug!("update receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelMessage, ChannelTransport};
    use std::time::Duration;

    fn bridge(capacity: usize) -> (Bridge, mpsc::Receiver<ChannelMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let config = EngineConfig {
            pending_command_capacity: capacity,
            ..Default::default()
        };
        let token = ChannelToken::from_string("tok").unwrap();
        (
            Bridge::with_token(ChannelTransport::new(tx), config, token),
            rx,
        )
    }

    #[tokio::test]
    async fn test_commands_buffer_until_ready() {
        let (bridge, mut rx) = bridge(8);

        bridge.set_volume(200.0, VolumeMethod::Both).await.unwrap();
        bridge.set_persist(true).await.unwrap();
        assert_eq!(bridge.pending_commands(), 2);
        assert!(rx.try_recv().is_err());

        bridge.handle_event("page-audio:tok:ready", "{}").await;
        assert!(bridge.is_ready());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, "page-audio:tok:command");
        assert_eq!(
            Command::decode(&first.detail).unwrap(),
            Command::SetVolume {
                level: Percent::Number(200.0),
                method: VolumeMethod::Both
            }
        );
        let second = rx.recv().await.unwrap();
        assert_eq!(
            Command::decode(&second.detail).unwrap(),
            Command::SetPersist { enabled: true }
        );
    }

    #[tokio::test]
    async fn test_buffer_drops_oldest() {
        let (bridge, mut rx) = bridge(1);

        bridge.set_persist(false).await.unwrap();
        bridge.set_persist(true).await.unwrap();
        assert_eq!(bridge.pending_commands(), 1);

        bridge.handle_event("page-audio:tok:ready", "{}").await;
        let only = rx.recv().await.unwrap();
        assert_eq!(
            Command::decode(&only.detail).unwrap(),
            Command::SetPersist { enabled: true }
        );
    }

    #[tokio::test]
    async fn test_status_reflects_last_request() {
        let (bridge, _rx) = bridge(8);
        bridge
            .set_volume(Percent::Text("150%".into()), VolumeMethod::GraphOnly)
            .await
            .unwrap();

        let status = bridge.status();
        assert!((status.volume - 150.0).abs() < 1e-9);
        assert_eq!(status.method, VolumeMethod::GraphOnly);
        assert!(!status.ready);
    }

    #[tokio::test]
    async fn test_invalid_level_is_rejected() {
        let (bridge, _rx) = bridge(8);
        let result = bridge
            .set_volume(Percent::Text("loud".into()), VolumeMethod::Both)
            .await;
        assert!(matches!(result, Err(ChannelError::InvalidLevel(_))));
        assert_eq!(bridge.pending_commands(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_state_times_out_with_last_snapshot() {
        let (bridge, _rx) = bridge(8);
        let started = tokio::time::Instant::now();

        assert_eq!(bridge.query_state().await, None);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_state_events_are_forwarded() {
        let (updates_tx, mut updates_rx) = mpsc::channel(4);
        let (bridge, _rx) = bridge(8);
        let bridge = bridge.with_updates(updates_tx);

        let state = AudioState {
            has_native_audio: true,
            native_audio_count: 1,
            ..Default::default()
        };
        bridge
            .handle_event("page-audio:tok:state", &state.signature())
            .await;

        assert_eq!(bridge.latest_state(), Some(state.clone()));
        assert_eq!(
            updates_rx.recv().await.unwrap(),
            BridgeUpdate::AudioState(state)
        );
    }

    #[tokio::test]
    async fn test_foreign_and_malformed_events_ignored() {
        let (bridge, _rx) = bridge(8);
        bridge.handle_event("page-audio:other:ready", "{}").await;
        bridge.handle_event("page-audio:tok:state", "nope").await;
        assert!(!bridge.is_ready());
        assert_eq!(bridge.latest_state(), None);
    }
}
