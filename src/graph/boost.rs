//! The engine-owned boost graph for native media elements.
//!
//! Native element volume stops at unity. To go beyond it an element's output
//! is pulled into a dedicated context through an element source and scaled
//! by that context's gain.

use std::collections::HashMap;

use crate::deferred::spawn_detached;
use crate::host::{AudioGraph, ContextId, ContextState, ElementId, MediaDocument, NodeId};
use crate::volume::UNITY;
use crate::HostError;

/// Outcome of a successful [`BoostContext::route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteOutcome {
    /// The element now plays through the boost gain.
    Routed,
    /// The element was already routed; nothing changed.
    AlreadyRouted,
}

#[derive(Debug, Clone, Copy)]
struct BoostGraph {
    context: ContextId,
    gain: NodeId,
}

/// Lazily created shared context plus its element-source associations.
#[derive(Debug, Default)]
pub(crate) struct BoostContext {
    graph: Option<BoostGraph>,
    routed: HashMap<ElementId, NodeId>,
}

impl BoostContext {
    /// Forgets the boost graph and every routed association if its context
    /// closed. Returns `true` if anything was dropped.
    pub fn prune(&mut self, graph: &dyn AudioGraph) -> bool {
        match self.graph {
            Some(boost) if !graph.context_state(boost.context).is_live() => {
                tracing::debug!(
                    context = %boost.context,
                    routed = self.routed.len(),
                    "boost context closed, dropping associations"
                );
                self.graph = None;
                self.routed.clear();
                true
            }
            _ => false,
        }
    }

    /// Returns the live boost graph, creating or recreating it as needed.
    fn ensure(&mut self, graph: &dyn AudioGraph, level: f64) -> Result<BoostGraph, HostError> {
        self.prune(graph);
        if let Some(existing) = self.graph {
            return Ok(existing);
        }

        let context = graph.create_context()?;
        let gain = graph.create_gain(context)?;
        graph.set_gain(gain, level)?;
        graph.connect(gain, graph.destination(context)?)?;

        let created = BoostGraph { context, gain };
        self.graph = Some(created);
        tracing::debug!(context = %context, "boost context created");
        Ok(created)
    }

    /// Routes a media element through the boost gain.
    ///
    /// On success the element's native volume is set to unity and the gain
    /// owns its loudness. A suspended context is resumed fire-and-forget;
    /// a failed resume is not a routing failure.
    pub fn route(
        &mut self,
        graph: &dyn AudioGraph,
        document: &dyn MediaDocument,
        element: ElementId,
        level: f64,
    ) -> Result<RouteOutcome, HostError> {
        let boost = self.ensure(graph, level)?;
        if self.routed.contains_key(&element) {
            return Ok(RouteOutcome::AlreadyRouted);
        }

        let source = graph.create_element_source(boost.context, element)?;
        graph.connect(source, boost.gain)?;
        self.routed.insert(element, source);
        document.set_volume(element, UNITY);

        if graph.context_state(boost.context) == ContextState::Suspended {
            spawn_detached("boost context resume", graph.resume(boost.context));
        }
        Ok(RouteOutcome::Routed)
    }

    /// Disconnects and forgets an element's source, e.g. after removal.
    pub fn release(&mut self, graph: Option<&dyn AudioGraph>, element: ElementId) -> bool {
        let Some(source) = self.routed.remove(&element) else {
            return false;
        };
        if let Some(graph) = graph {
            if let Err(e) = graph.disconnect(source) {
                tracing::debug!(element = %element, error = %e, "failed to disconnect source");
            }
        }
        true
    }

    /// Writes the boost gain, if the boost graph exists.
    pub fn set_gain(&self, graph: &dyn AudioGraph, value: f64) {
        if let Some(boost) = self.graph {
            if let Err(e) = graph.set_gain(boost.gain, value) {
                tracing::debug!(error = %e, "failed to update boost gain");
            }
        }
    }

    pub fn is_routed(&self, element: ElementId) -> bool {
        self.routed.contains_key(&element)
    }

    pub fn routed_count(&self) -> usize {
        self.routed.len()
    }

    /// Returns `true` if the boost context exists and is not closed.
    pub fn is_live(&self, graph: &dyn AudioGraph) -> bool {
        self.graph
            .is_some_and(|boost| graph.context_state(boost.context).is_live())
    }

    pub fn gain(&self) -> Option<NodeId> {
        self.graph.map(|boost| boost.gain)
    }

    pub fn context(&self) -> Option<ContextId> {
        self.graph.map(|boost| boost.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockPage;

    #[test]
    fn test_route_creates_context_lazily() {
        let page = MockPage::new();
        let audio = page.insert_audio("a.mp3");
        page.set_volume(audio, 0.3);
        let mut boost = BoostContext::default();

        assert!(!boost.is_live(&page));
        assert_eq!(page.context_count(), 0);

        let outcome = boost.route(&page, &page, audio, 2.0).unwrap();

        assert_eq!(outcome, RouteOutcome::Routed);
        assert!(boost.is_live(&page));
        assert_eq!(page.volume(audio), Some(1.0));
        assert_eq!(page.gain_value(boost.gain().unwrap()), Some(2.0));
    }

    #[test]
    fn test_route_twice_is_idempotent() {
        let page = MockPage::new();
        let audio = page.insert_audio("a.mp3");
        let mut boost = BoostContext::default();

        boost.route(&page, &page, audio, 2.0).unwrap();
        let outcome = boost.route(&page, &page, audio, 2.0).unwrap();

        assert_eq!(outcome, RouteOutcome::AlreadyRouted);
        assert_eq!(page.element_source_count(audio), 1);
        assert_eq!(boost.routed_count(), 1);
    }

    #[test]
    fn test_route_failure_leaves_element_unrouted() {
        let page = MockPage::new();
        let audio = page.insert_audio("https://other.test/a.mp3");
        page.block_element_source(audio);
        page.set_volume(audio, 0.3);
        let mut boost = BoostContext::default();

        let result = boost.route(&page, &page, audio, 2.0);

        assert!(matches!(result, Err(HostError::ElementSourceFailed { .. })));
        assert!(!boost.is_routed(audio));
        assert_eq!(page.volume(audio), Some(0.3));
    }

    #[test]
    fn test_route_without_graph_capability() {
        let page = MockPage::without_graph();
        let audio = page.insert_audio("a.mp3");
        let mut boost = BoostContext::default();

        let result = boost.route(&page, &page, audio, 2.0);
        assert!(matches!(result, Err(HostError::Unsupported)));
    }

    #[test]
    fn test_closed_context_is_recreated() {
        let page = MockPage::new();
        let first = page.insert_audio("a.mp3");
        let second = page.insert_audio("b.mp3");
        let mut boost = BoostContext::default();

        boost.route(&page, &page, first, 2.0).unwrap();
        let old = boost.context().unwrap();
        page.close_context(old);

        boost.route(&page, &page, second, 2.0).unwrap();
        assert_ne!(boost.context(), Some(old));
        assert!(!boost.is_routed(first));
        assert!(boost.is_routed(second));
    }

    #[test]
    fn test_prune_drops_associations_of_closed_context() {
        let page = MockPage::new();
        let audio = page.insert_audio("a.mp3");
        let mut boost = BoostContext::default();
        boost.route(&page, &page, audio, 3.0).unwrap();

        assert!(!boost.prune(&page));
        assert!(boost.is_routed(audio));

        page.close_context(boost.context().unwrap());
        assert!(boost.prune(&page));
        assert!(!boost.is_routed(audio));
        assert_eq!(boost.routed_count(), 0);
        assert!(boost.context().is_none());
        assert!(boost.gain().is_none());
        assert!(!boost.prune(&page));
    }

    #[test]
    fn test_route_after_prune_recreates_context() {
        let page = MockPage::new();
        let first = page.insert_audio("a.mp3");
        let mut boost = BoostContext::default();
        boost.route(&page, &page, first, 3.0).unwrap();
        let old = boost.context().unwrap();
        page.close_context(old);
        boost.prune(&page);

        let second = page.insert_audio("b.mp3");
        assert_eq!(
            boost.route(&page, &page, second, 3.0).unwrap(),
            RouteOutcome::Routed
        );
        let recreated = boost.context().unwrap();
        assert_ne!(recreated, old);
        assert_eq!(page.context_state(recreated), ContextState::Running);
        assert_eq!(page.gain_value(boost.gain().unwrap()), Some(3.0));
    }

    #[test]
    fn test_release_disconnects_source() {
        let page = MockPage::new();
        let audio = page.insert_audio("a.mp3");
        let mut boost = BoostContext::default();
        boost.route(&page, &page, audio, 2.0).unwrap();

        assert!(boost.release(Some(&page), audio));
        assert!(!boost.is_routed(audio));
        assert!(!boost.release(Some(&page), audio));
    }

    #[tokio::test]
    async fn test_suspended_context_resumed_in_background() {
        let page = MockPage::new();
        page.set_start_suspended(true);
        let audio = page.insert_audio("a.mp3");
        let mut boost = BoostContext::default();

        boost.route(&page, &page, audio, 2.0).unwrap();
        tokio::task::yield_now().await;

        assert_eq!(
            page.context_state(boost.context().unwrap()),
            ContextState::Running
        );
    }

    #[tokio::test]
    async fn test_failed_resume_is_not_a_routing_failure() {
        let page = MockPage::new();
        page.set_start_suspended(true);
        page.set_resume_fails(true);
        let audio = page.insert_audio("a.mp3");
        let mut boost = BoostContext::default();

        assert!(boost.route(&page, &page, audio, 2.0).is_ok());
        tokio::task::yield_now().await;
        assert_eq!(
            page.context_state(boost.context().unwrap()),
            ContextState::Suspended
        );
    }
}
