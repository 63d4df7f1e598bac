//! Gain-stage injection for page-created audio-graph contexts.

use std::collections::HashMap;

use crate::host::{AudioGraph, ContextId, NodeId};
use crate::HostError;

/// The engine's gain stage inside one page context.
#[derive(Debug, Clone, Copy)]
struct TrackedContext {
    gain: NodeId,
    destination: NodeId,
}

/// Tracks every captured context and its injected gain.
///
/// The association is non-owning: entries are dropped as soon as the host
/// reports the context closed, and a dropped context never receives gain
/// updates again.
#[derive(Debug, Default)]
pub(crate) struct GraphRouter {
    contexts: HashMap<ContextId, TrackedContext>,
    destinations: HashMap<NodeId, ContextId>,
}

impl GraphRouter {
    /// Inserts a gain stage between the context and its real destination.
    ///
    /// Capturing an already tracked context returns its existing gain.
    pub fn capture(
        &mut self,
        graph: &dyn AudioGraph,
        context: ContextId,
        level: f64,
    ) -> Result<NodeId, HostError> {
        if let Some(tracked) = self.contexts.get(&context) {
            return Ok(tracked.gain);
        }

        let destination = graph.destination(context)?;
        let gain = graph.create_gain(context)?;
        graph.set_gain(gain, level)?;
        graph.connect(gain, destination)?;

        self.contexts.insert(context, TrackedContext { gain, destination });
        self.destinations.insert(destination, context);
        Ok(gain)
    }

    /// Where a page-authored connection from `from` to `to` should really go.
    ///
    /// Connections aimed at a tracked context's destination are redirected to
    /// its gain, except from the gain itself.
    pub fn resolve_target(&self, from: NodeId, to: NodeId) -> NodeId {
        match self
            .destinations
            .get(&to)
            .and_then(|context| self.contexts.get(context))
        {
            Some(tracked) if tracked.gain != from => tracked.gain,
            _ => to,
        }
    }

    /// Stops tracking a context. Returns `true` if it was tracked.
    pub fn release(&mut self, context: ContextId) -> bool {
        match self.contexts.remove(&context) {
            Some(tracked) => {
                self.destinations.remove(&tracked.destination);
                true
            }
            None => false,
        }
    }

    /// Releases every context the host reports closed.
    pub fn prune(&mut self, graph: &dyn AudioGraph) -> Vec<ContextId> {
        let closed: Vec<ContextId> = self
            .contexts
            .keys()
            .copied()
            .filter(|context| !graph.context_state(*context).is_live())
            .collect();
        for context in &closed {
            self.release(*context);
        }
        closed
    }

    /// Writes `value` into every live gain, pruning closed contexts first.
    ///
    /// Returns the contexts pruned along the way.
    pub fn apply(&mut self, graph: &dyn AudioGraph, value: f64) -> Vec<ContextId> {
        let pruned = self.prune(graph);
        for (context, tracked) in &self.contexts {
            if let Err(e) = graph.set_gain(tracked.gain, value) {
                tracing::warn!(context = %context, error = %e, "failed to update gain");
            }
        }
        pruned
    }

    /// Number of tracked contexts. Call [`prune`](Self::prune) first for an
    /// accurate live count.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn gain_for(&self, context: ContextId) -> Option<NodeId> {
        self.contexts.get(&context).map(|t| t.gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockPage;

    #[test]
    fn test_capture_inserts_gain_before_destination() {
        let page = MockPage::new();
        let ctx = page.new_page_context();
        let mut router = GraphRouter::default();

        let gain = router.capture(&page, ctx, 2.0).unwrap();
        let destination = page.destination(ctx).unwrap();

        assert_eq!(page.gain_value(gain), Some(2.0));
        assert_eq!(page.outputs(gain), vec![destination]);
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_capture_is_idempotent() {
        let page = MockPage::new();
        let ctx = page.new_page_context();
        let mut router = GraphRouter::default();

        let first = router.capture(&page, ctx, 1.0).unwrap();
        let second = router.capture(&page, ctx, 1.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_resolve_target_redirects_destination() {
        let page = MockPage::new();
        let ctx = page.new_page_context();
        let mut router = GraphRouter::default();
        let gain = router.capture(&page, ctx, 1.0).unwrap();
        let destination = page.destination(ctx).unwrap();
        let osc = page.create_node(ctx);
        let filter = page.create_node(ctx);

        assert_eq!(router.resolve_target(osc, destination), gain);
        // The gain itself must reach the real destination
        assert_eq!(router.resolve_target(gain, destination), destination);
        // Intermediate nodes are untouched
        assert_eq!(router.resolve_target(osc, filter), filter);
    }

    #[test]
    fn test_apply_prunes_closed_contexts() {
        let page = MockPage::new();
        let open = page.new_page_context();
        let closed = page.new_page_context();
        let mut router = GraphRouter::default();
        let open_gain = router.capture(&page, open, 1.0).unwrap();
        let closed_gain = router.capture(&page, closed, 1.0).unwrap();

        page.close_context(closed);
        let pruned = router.apply(&page, 0.25);

        assert_eq!(pruned, vec![closed]);
        assert_eq!(router.len(), 1);
        assert_eq!(page.gain_value(open_gain), Some(0.25));
        // The pruned context's gain was not touched
        assert_eq!(page.gain_value(closed_gain), Some(1.0));
    }

    #[test]
    fn test_suspended_context_is_kept() {
        let page = MockPage::new();
        let ctx = page.new_page_context();
        let mut router = GraphRouter::default();
        router.capture(&page, ctx, 1.0).unwrap();

        page.suspend_context(ctx);
        assert!(router.prune(&page).is_empty());
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_release_forgets_destination() {
        let page = MockPage::new();
        let ctx = page.new_page_context();
        let mut router = GraphRouter::default();
        router.capture(&page, ctx, 1.0).unwrap();
        let destination = page.destination(ctx).unwrap();
        let osc = page.create_node(ctx);

        assert!(router.release(ctx));
        assert!(!router.release(ctx));
        assert_eq!(router.resolve_target(osc, destination), destination);
        assert!(router.gain_for(ctx).is_none());
    }
}
