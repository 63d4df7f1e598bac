//! The page-context engine.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{ChannelNames, Command, Transport};
use crate::deferred::Debouncer;
use crate::detect::{detect, Detection};
use crate::discovery::{Discovery, DomMutation, MediaEvent};
use crate::graph::{BoostContext, GraphRouter, RouteOutcome};
use crate::host::{AudioGraph, ContextId, ElementId, MediaDocument, NodeId};
use crate::state::{AudioState, StateTracker};
use crate::volume::{decide, Decision, VolumeSetting, UNITY};
use crate::{EngineBuilder, EngineConfig, EngineError, EngineEvent, EventCallback, HostError};

/// Mutable engine state. Lives from attach to page unload.
#[derive(Default)]
struct EngineState {
    setting: VolumeSetting,
    persist: bool,
    router: GraphRouter,
    boost: BoostContext,
    discovery: Discovery,
    detections: HashMap<ElementId, Detection>,
    tracker: StateTracker,
    /// Events raised under the lock, delivered after it is released.
    outbox: Vec<EngineEvent>,
}

pub(crate) struct EngineInner {
    names: ChannelNames,
    graph: Option<Arc<dyn AudioGraph>>,
    document: Arc<dyn MediaDocument>,
    transport: Arc<dyn Transport>,
    event_callback: Option<EventCallback>,
    state: Mutex<EngineState>,
    reapply: Debouncer,
    refresh: Debouncer,
}

/// Handle to an attached engine.
///
/// Created by [`EngineBuilder::attach()`]. Cloning is cheap and every clone
/// drives the same engine.
///
/// The host adapter calls the hook methods where the page would otherwise
/// talk to the platform directly:
///
/// | page activity                    | hook                                    |
/// |----------------------------------|-----------------------------------------|
/// | constructs an audio context      | [`context_created`](Engine::context_created) |
/// | calls `node.connect(target)`     | [`connect`](Engine::connect)            |
/// | a context reports `closed`       | [`context_closed`](Engine::context_closed) |
/// | DOM mutation records             | [`handle_mutations`](Engine::handle_mutations) |
/// | media element events             | [`media_event`](Engine::media_event)    |
/// | channel event                    | [`handle_channel_event`](Engine::handle_channel_event) |
///
/// # Example
///
/// ```ignore
/// let engine = Engine::builder()
///     .graph(page.clone())
///     .document(page.clone())
///     .transport(ChannelTransport::new(tx))
///     .attach()
///     .await?;
///
/// let ctx = page.new_page_context();
/// engine.context_created(ctx)?;
/// ```
///
/// [`EngineBuilder::attach()`]: crate::EngineBuilder::attach
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Creates a builder for configuring and attaching an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn new(
        config: &EngineConfig,
        names: ChannelNames,
        graph: Option<Arc<dyn AudioGraph>>,
        document: Arc<dyn MediaDocument>,
        transport: Arc<dyn Transport>,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                names,
                graph,
                document,
                transport,
                event_callback,
                state: Mutex::new(EngineState::default()),
                reapply: Debouncer::new("reapply-volume", config.reapply_delay),
                refresh: Debouncer::new("refresh-state", config.state_refresh_delay),
            }),
        }
    }

    /// Initial scan, `ready` signal and first state refresh.
    pub(crate) async fn start(&self) -> Result<(), EngineError> {
        let found = {
            let mut st = self.inner.state.lock();
            let found = st.discovery.scan(self.document());
            for element in &found {
                self.record_discovery(&mut st, *element);
            }
            found.len()
        };
        self.flush_events();

        let ready = self.inner.names.ready();
        self.inner
            .transport
            .emit(ready, "{}")
            .await
            .map_err(|source| EngineError::ReadyFailed {
                event: ready.to_string(),
                source,
            })?;

        tracing::info!(
            media = found,
            graph = self.inner.graph.is_some(),
            transport = self.inner.transport.name(),
            "engine ready"
        );
        self.schedule_refresh();
        Ok(())
    }

    fn document(&self) -> &dyn MediaDocument {
        &*self.inner.document
    }

    fn graph(&self) -> Option<&dyn AudioGraph> {
        self.inner.graph.as_deref()
    }

    // ---- graph capture ------------------------------------------------------

    /// Instruments a context the page just constructed.
    ///
    /// The context stays fully usable by the page whatever happens here.
    /// Returns the injected gain node.
    ///
    /// # Errors
    ///
    /// [`HostError::Unsupported`] without a graph capability, or whatever the
    /// host reports while wiring the gain stage.
    pub fn context_created(&self, context: ContextId) -> Result<NodeId, HostError> {
        let graph = self.graph().ok_or(HostError::Unsupported)?;
        let result = {
            let mut st = self.inner.state.lock();
            let level = st.setting.graph_level();
            st.router.capture(graph, context, level)
        };

        match &result {
            Ok(gain) => {
                tracing::debug!(context = %context, gain = %gain, "context captured");
                self.emit(EngineEvent::ContextCaptured { context });
                self.schedule_refresh();
            }
            Err(e) => {
                tracing::warn!(context = %context, error = %e, "failed to instrument context");
            }
        }
        result
    }

    /// Performs a page-authored connection.
    ///
    /// Connections to a captured context's destination land on the
    /// engine's gain instead.
    ///
    /// # Errors
    ///
    /// Whatever the host's native connect reports.
    pub fn connect(&self, from: NodeId, to: NodeId) -> Result<(), HostError> {
        let graph = self.graph().ok_or(HostError::Unsupported)?;
        let target = self.inner.state.lock().router.resolve_target(from, to);
        if target != to {
            tracing::trace!(from = %from, to = %to, via = %target, "connection redirected");
        }
        graph.connect(from, target)
    }

    /// Drops a closed context from tracking.
    pub fn context_closed(&self, context: ContextId) {
        let released = self.inner.state.lock().router.release(context);
        if released {
            tracing::debug!(context = %context, "context released");
            self.emit(EngineEvent::ContextReleased { context });
            self.schedule_refresh();
        }
    }

    // ---- discovery ----------------------------------------------------------

    /// Feeds a batch of DOM mutation records.
    pub fn handle_mutations(&self, mutations: &[DomMutation]) {
        let (changed, reapply) = {
            let mut st = self.inner.state.lock();
            let outcome = st.discovery.observe(self.document(), mutations);

            for element in &outcome.added {
                self.record_discovery(&mut st, *element);
            }
            for element in &outcome.changed {
                self.redetect(&mut st, *element);
            }
            for element in &outcome.removed {
                self.forget(&mut st, *element);
            }

            let reapply = !outcome.added.is_empty()
                && (st.persist || st.setting.method.touches_native());
            (!outcome.is_empty(), reapply)
        };
        self.flush_events();

        if reapply {
            self.schedule_reapply();
        }
        if changed {
            self.schedule_refresh();
        }
    }

    /// Feeds an event from a media element's listeners.
    ///
    /// Events for elements no longer in the document are dropped.
    pub fn media_event(&self, element: ElementId, event: MediaEvent) {
        if self.document().describe(element).is_none() {
            tracing::trace!(element = %element, ?event, "event for detached element");
            return;
        }
        let reapply = {
            let mut st = self.inner.state.lock();
            if st.discovery.process(self.document(), element) {
                self.record_discovery(&mut st, element);
            } else {
                self.redetect(&mut st, element);
            }
            event == MediaEvent::Play && st.persist
        };
        self.flush_events();

        if reapply {
            self.schedule_reapply();
        }
        self.schedule_refresh();
    }

    fn record_discovery(&self, st: &mut EngineState, element: ElementId) {
        if let Some(descriptor) = self.document().describe(element) {
            st.detections.insert(element, detect(&descriptor));
            st.outbox.push(EngineEvent::MediaDiscovered {
                element,
                kind: descriptor.kind,
            });
        }
    }

    fn redetect(&self, st: &mut EngineState, element: ElementId) {
        if let Some(descriptor) = self.document().describe(element) {
            st.detections.insert(element, detect(&descriptor));
        }
    }

    fn forget(&self, st: &mut EngineState, element: ElementId) {
        st.boost.release(self.graph(), element);
        st.detections.remove(&element);
        st.outbox.push(EngineEvent::MediaRemoved { element });
    }

    // ---- commands -----------------------------------------------------------

    /// Feeds an event from the channel.
    ///
    /// Events not addressed to this engine's command name are ignored.
    /// Malformed payloads are dropped.
    pub async fn handle_channel_event(&self, event: &str, detail: &str) {
        if event != self.inner.names.command() {
            tracing::trace!(event, "ignoring foreign event");
            return;
        }
        match Command::decode(detail) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                tracing::debug!(error = %e, "dropping command payload");
                self.emit(EngineEvent::PayloadDropped {
                    event: event.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Executes a decoded command.
    pub async fn execute(&self, command: Command) {
        match command {
            Command::SetVolume { .. } => {
                if let Some(setting) = command.volume_setting() {
                    self.set_volume(setting);
                }
            }
            Command::SetPersist { enabled } => {
                self.inner.state.lock().persist = enabled;
                if enabled {
                    self.schedule_reapply();
                }
            }
            Command::GetState => {
                self.refresh_state(true).await;
            }
        }
    }

    /// Replaces the volume setting and applies it immediately.
    pub fn set_volume(&self, setting: VolumeSetting) {
        tracing::debug!(
            percent = setting.percent(),
            method = ?setting.method,
            "volume set"
        );
        self.inner.state.lock().setting = setting;
        self.apply_volume();
        self.schedule_refresh();
    }

    // ---- volume application -------------------------------------------------

    /// Applies the current setting to every gain stage and media element.
    pub fn apply_volume(&self) {
        {
            let mut st = self.inner.state.lock();
            let setting = st.setting;
            let graph = self.graph();

            if let Some(graph) = graph {
                st.boost.prune(graph);
                for context in st.router.apply(graph, setting.graph_level()) {
                    st.outbox.push(EngineEvent::ContextReleased { context });
                }
            }
            for element in self.document().media_elements() {
                self.apply_to_element(&mut st, graph, element, setting);
            }
            if let Some(graph) = graph {
                st.boost.set_gain(graph, setting.graph_level());
            }
        }
        self.flush_events();
    }

    fn apply_to_element(
        &self,
        st: &mut EngineState,
        graph: Option<&dyn AudioGraph>,
        element: ElementId,
        setting: VolumeSetting,
    ) {
        let document = self.document();
        match decide(setting, st.boost.is_routed(element)) {
            Decision::Native { volume, neutralize } => {
                if neutralize {
                    tracing::trace!(element = %element, "boost neutralized");
                }
                document.set_volume(element, volume);
            }
            Decision::Routed => document.set_volume(element, UNITY),
            Decision::TryRoute { fallback } => {
                let result = match graph {
                    Some(graph) => st.boost.route(graph, document, element, setting.graph_level()),
                    None => Err(HostError::Unsupported),
                };
                match result {
                    Ok(RouteOutcome::Routed) => {
                        tracing::debug!(element = %element, "routed through boost graph");
                    }
                    Ok(RouteOutcome::AlreadyRouted) => {}
                    Err(HostError::Unsupported) => {
                        document.set_volume(element, fallback);
                    }
                    Err(e) => {
                        tracing::warn!(
                            element = %element,
                            error = %e,
                            "routing failed, falling back to native volume"
                        );
                        document.set_volume(element, fallback);
                        st.outbox.push(EngineEvent::RoutingFailed {
                            element,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    // ---- state --------------------------------------------------------------

    /// Recomputes the snapshot and broadcasts it if it changed (or if forced).
    ///
    /// Returns the snapshot that was sent, if any.
    pub async fn refresh_state(&self, force: bool) -> Option<AudioState> {
        let (snapshot, signature) = {
            let mut st = self.inner.state.lock();
            let snapshot = self.collect(&mut st);
            let Some(signature) = st.tracker.admit(&snapshot, force) else {
                tracing::debug!("state unchanged, not broadcasting");
                return None;
            };
            (snapshot, signature)
        };
        self.flush_events();

        let event = self.inner.names.state();
        match self.inner.transport.emit(event, &signature).await {
            Ok(()) => {
                self.emit(EngineEvent::StateBroadcast { forced: force });
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to broadcast state");
                self.inner.state.lock().tracker.invalidate();
                self.emit(EngineEvent::TransportFailed {
                    event: event.to_string(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Recomputes the snapshot without broadcasting it.
    pub fn snapshot(&self) -> AudioState {
        let snapshot = {
            let mut st = self.inner.state.lock();
            self.collect(&mut st)
        };
        self.flush_events();
        snapshot
    }

    fn collect(&self, st: &mut EngineState) -> AudioState {
        let mut snapshot = AudioState::default();

        if let Some(graph) = self.graph() {
            st.boost.prune(graph);
            for context in st.router.prune(graph) {
                st.outbox.push(EngineEvent::ContextReleased { context });
            }
            let boost = usize::from(st.boost.is_live(graph));
            snapshot.set_contexts(st.router.len() + boost);
        }

        for element in st.discovery.reconcile(self.document()) {
            self.forget(st, element);
        }

        for element in self.document().media_elements() {
            let Some(descriptor) = self.document().describe(element) else {
                continue;
            };
            let detection = detect(&descriptor);
            snapshot.add_media(descriptor.kind, &detection);
            st.detections.insert(element, detection);
        }

        snapshot
    }

    // ---- scheduling ---------------------------------------------------------

    fn schedule_refresh(&self) {
        let engine = self.clone();
        self.inner.refresh.schedule(async move {
            engine.refresh_state(false).await;
        });
    }

    fn schedule_reapply(&self) {
        let engine = self.clone();
        self.inner.reapply.schedule(async move {
            engine.apply_volume();
        });
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(ref callback) = self.inner.event_callback {
            callback(event);
        }
    }

    fn flush_events(&self) {
        let events = std::mem::take(&mut self.inner.state.lock().outbox);
        for event in events {
            self.emit(event);
        }
    }

    // ---- inspection ---------------------------------------------------------

    /// The current volume setting.
    pub fn setting(&self) -> VolumeSetting {
        self.inner.state.lock().setting
    }

    /// Whether newly discovered media re-apply the last volume.
    pub fn persist(&self) -> bool {
        self.inner.state.lock().persist
    }

    /// This engine's channel event names.
    pub fn channel_names(&self) -> &ChannelNames {
        &self.inner.names
    }

    /// Returns `true` if the element has been processed by discovery.
    pub fn is_processed(&self, element: ElementId) -> bool {
        self.inner.state.lock().discovery.is_processed(element)
    }

    /// Returns `true` if the element plays through the boost graph.
    pub fn is_routed(&self, element: ElementId) -> bool {
        self.inner.state.lock().boost.is_routed(element)
    }

    /// The gain injected into a captured context.
    pub fn context_gain(&self, context: ContextId) -> Option<NodeId> {
        self.inner.state.lock().router.gain_for(context)
    }

    /// The boost graph's gain, once it exists.
    pub fn boost_gain(&self) -> Option<NodeId> {
        self.inner.state.lock().boost.gain()
    }

    /// The engine-owned boost context, once it exists.
    pub fn boost_context(&self) -> Option<ContextId> {
        self.inner.state.lock().boost.context()
    }

    /// Number of elements playing through the boost graph.
    pub fn routed_count(&self) -> usize {
        self.inner.state.lock().boost.routed_count()
    }

    /// The last detection result for an element.
    pub fn detection(&self, element: ElementId) -> Option<Detection> {
        self.inner.state.lock().detections.get(&element).cloned()
    }

    /// Returns `true` while a state refresh is scheduled.
    pub fn refresh_pending(&self) -> bool {
        self.inner.refresh.is_pending()
    }
}
