//! In-memory page for testing without a browser or audio backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::{
    AudioGraph, ContextId, ContextState, ElementId, MediaDescriptor, MediaDocument, MediaKind,
    NodeId, SourceDescriptor,
};
use crate::HostError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Media(MediaKind),
    Source,
    Container,
}

#[derive(Debug)]
struct MockElement {
    tag: Tag,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    connected: bool,
    src: Option<String>,
    mime: Option<String>,
    volume: f64,
    listeners: bool,
}

impl MockElement {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            parent: None,
            children: Vec::new(),
            connected: false,
            src: None,
            mime: None,
            volume: 1.0,
            listeners: false,
        }
    }
}

#[derive(Debug)]
enum NodeKind {
    Destination,
    Gain(f64),
    ElementSource(ElementId),
    Other,
}

#[derive(Debug)]
struct MockNode {
    kind: NodeKind,
    outputs: Vec<NodeId>,
}

#[derive(Debug)]
struct MockContext {
    state: ContextState,
    destination: NodeId,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    graph_unsupported: bool,
    start_suspended: bool,
    resume_fails: bool,
    contexts: HashMap<ContextId, MockContext>,
    nodes: HashMap<NodeId, MockNode>,
    elements: HashMap<ElementId, MockElement>,
    order: Vec<ElementId>,
    captured: HashSet<ElementId>,
    blocked: HashSet<ElementId>,
    loader_token: Option<String>,
}

impl MockState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.next());
        self.nodes.insert(
            id,
            MockNode {
                kind,
                outputs: Vec::new(),
            },
        );
        id
    }

    fn add_context(&mut self) -> ContextId {
        let id = ContextId::new(self.next());
        let destination = self.add_node(NodeKind::Destination);
        let state = if self.start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        self.contexts.insert(id, MockContext { state, destination });
        id
    }

    fn live_context(&self, context: ContextId) -> Result<&MockContext, HostError> {
        match self.contexts.get(&context) {
            Some(ctx) if ctx.state == ContextState::Closed => {
                Err(HostError::ContextClosed(context))
            }
            Some(ctx) => Ok(ctx),
            None => Err(HostError::UnknownContext(context)),
        }
    }

    fn add_element(&mut self, tag: Tag) -> ElementId {
        let id = ElementId::new(self.next());
        self.elements.insert(id, MockElement::new(tag));
        self.order.push(id);
        id
    }

    fn set_connected(&mut self, root: ElementId, connected: bool) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(el) = self.elements.get_mut(&id) {
                el.connected = connected;
                stack.extend(el.children.iter().copied());
            }
        }
    }

    fn is_media(&self, id: ElementId) -> bool {
        self.elements
            .get(&id)
            .is_some_and(|el| matches!(el.tag, Tag::Media(_)))
    }
}

/// A mock page implementing both [`AudioGraph`] and [`MediaDocument`].
///
/// This allows testing the full engine without a browser, making it suitable
/// for CI environments. Cloning shares the same page.
///
/// # Example
///
/// ```
/// use page_audio::{MediaDocument, MockPage};
///
/// let page = MockPage::new();
///
/// // The page's own script builds a graph
/// let ctx = page.new_page_context();
/// let osc = page.create_node(ctx);
///
/// // Media shows up in the document
/// let audio = page.insert_audio("track.mp3");
/// assert_eq!(page.media_elements(), vec![audio]);
/// ```
#[derive(Clone, Default)]
pub struct MockPage {
    state: Arc<Mutex<MockState>>,
}

impl MockPage {
    /// Creates an empty page with audio-graph support.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a page whose host has no audio-graph constructor.
    pub fn without_graph() -> Self {
        let page = Self::new();
        page.state.lock().graph_unsupported = true;
        page
    }

    /// Makes new contexts start suspended, as autoplay policies do.
    pub fn set_start_suspended(&self, suspended: bool) {
        self.state.lock().start_suspended = suspended;
    }

    /// Makes future `resume` calls fail.
    pub fn set_resume_fails(&self, fails: bool) {
        self.state.lock().resume_fails = fails;
    }

    // ---- audio graph, page side -------------------------------------------

    /// Creates a context the way the page's own script would.
    ///
    /// Hand the result to [`Engine::context_created`](crate::Engine::context_created)
    /// to simulate the wrapped constructor.
    pub fn new_page_context(&self) -> ContextId {
        self.state.lock().add_context()
    }

    /// Creates a generic page-authored node (oscillator, buffer source, ...).
    pub fn create_node(&self, _context: ContextId) -> NodeId {
        self.state.lock().add_node(NodeKind::Other)
    }

    /// Closes a context.
    pub fn close_context(&self, context: ContextId) {
        if let Some(ctx) = self.state.lock().contexts.get_mut(&context) {
            ctx.state = ContextState::Closed;
        }
    }

    /// Suspends a running context.
    pub fn suspend_context(&self, context: ContextId) {
        if let Some(ctx) = self.state.lock().contexts.get_mut(&context) {
            if ctx.state == ContextState::Running {
                ctx.state = ContextState::Suspended;
            }
        }
    }

    /// Returns the nodes `node` is connected to.
    pub fn outputs(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.outputs.clone())
            .unwrap_or_default()
    }

    /// Returns a gain node's current value, or `None` if `node` is not a gain.
    pub fn gain_value(&self, node: NodeId) -> Option<f64> {
        match self.state.lock().nodes.get(&node)?.kind {
            NodeKind::Gain(value) => Some(value),
            _ => None,
        }
    }

    /// Returns how many element-source nodes exist for an element.
    pub fn element_source_count(&self, element: ElementId) -> usize {
        self.state
            .lock()
            .nodes
            .values()
            .filter(|n| matches!(n.kind, NodeKind::ElementSource(e) if e == element))
            .count()
    }

    /// Returns how many contexts exist in any state.
    pub fn context_count(&self) -> usize {
        self.state.lock().contexts.len()
    }

    // ---- document ----------------------------------------------------------

    /// Inserts an `<audio src=...>` at the document root.
    pub fn insert_audio(&self, src: &str) -> ElementId {
        let id = self.create_media(MediaKind::Audio, Some(src));
        self.append(None, id);
        id
    }

    /// Inserts a `<video src=...>` at the document root.
    pub fn insert_video(&self, src: &str) -> ElementId {
        let id = self.create_media(MediaKind::Video, Some(src));
        self.append(None, id);
        id
    }

    /// Creates a detached media element.
    pub fn create_media(&self, kind: MediaKind, src: Option<&str>) -> ElementId {
        let mut st = self.state.lock();
        let id = st.add_element(Tag::Media(kind));
        if let Some(el) = st.elements.get_mut(&id) {
            el.src = src.map(str::to_string);
        }
        id
    }

    /// Creates a detached `<source src=... type=...>` element.
    pub fn create_source(&self, src: Option<&str>, mime: Option<&str>) -> ElementId {
        let mut st = self.state.lock();
        let id = st.add_element(Tag::Source);
        if let Some(el) = st.elements.get_mut(&id) {
            el.src = src.map(str::to_string);
            el.mime = mime.map(str::to_string);
        }
        id
    }

    /// Creates a detached non-media container (`<div>`).
    pub fn create_container(&self) -> ElementId {
        self.state.lock().add_element(Tag::Container)
    }

    /// Appends `child` under `parent`, or at the document root when `None`.
    ///
    /// The child's subtree becomes connected if the parent is.
    pub fn append(&self, parent: Option<ElementId>, child: ElementId) {
        let mut st = self.state.lock();
        let connected = match parent {
            None => true,
            Some(p) => {
                let Some(parent_el) = st.elements.get_mut(&p) else {
                    return;
                };
                parent_el.children.push(child);
                parent_el.connected
            }
        };
        if let Some(el) = st.elements.get_mut(&child) {
            el.parent = parent;
        }
        st.set_connected(child, connected);
    }

    /// Removes an element and its subtree from the document.
    pub fn remove(&self, element: ElementId) {
        let mut st = self.state.lock();
        let parent = st.elements.get_mut(&element).and_then(|el| el.parent.take());
        if let Some(parent) = parent {
            if let Some(p) = st.elements.get_mut(&parent) {
                p.children.retain(|c| *c != element);
            }
        }
        st.set_connected(element, false);
    }

    /// Sets `src` or `type` on an element.
    pub fn set_attribute(&self, element: ElementId, name: &str, value: &str) {
        if let Some(el) = self.state.lock().elements.get_mut(&element) {
            match name {
                "src" => el.src = Some(value.to_string()),
                "type" => el.mime = Some(value.to_string()),
                _ => {}
            }
        }
    }

    /// Makes element-source creation fail for `element`, as for cross-origin media.
    pub fn block_element_source(&self, element: ElementId) {
        self.state.lock().blocked.insert(element);
    }

    /// Returns `true` if the engine attached listeners to `element`.
    pub fn listeners_attached(&self, element: ElementId) -> bool {
        self.state
            .lock()
            .elements
            .get(&element)
            .is_some_and(|el| el.listeners)
    }

    /// Attaches a channel token to the simulated loader element.
    pub fn set_loader_token(&self, token: &str) {
        self.state.lock().loader_token = Some(token.to_string());
    }

    /// Returns the token still attached to the loader element, if any.
    pub fn loader_token(&self) -> Option<String> {
        self.state.lock().loader_token.clone()
    }
}

impl AudioGraph for MockPage {
    fn create_context(&self) -> Result<ContextId, HostError> {
        let mut st = self.state.lock();
        if st.graph_unsupported {
            return Err(HostError::Unsupported);
        }
        Ok(st.add_context())
    }

    fn context_state(&self, context: ContextId) -> ContextState {
        self.state
            .lock()
            .contexts
            .get(&context)
            .map_or(ContextState::Closed, |ctx| ctx.state)
    }

    fn destination(&self, context: ContextId) -> Result<NodeId, HostError> {
        self.state
            .lock()
            .contexts
            .get(&context)
            .map(|ctx| ctx.destination)
            .ok_or(HostError::UnknownContext(context))
    }

    fn create_gain(&self, context: ContextId) -> Result<NodeId, HostError> {
        let mut st = self.state.lock();
        st.live_context(context)?;
        Ok(st.add_node(NodeKind::Gain(1.0)))
    }

    fn set_gain(&self, gain: NodeId, value: f64) -> Result<(), HostError> {
        match self.state.lock().nodes.get_mut(&gain) {
            Some(MockNode {
                kind: NodeKind::Gain(current),
                ..
            }) => {
                *current = value;
                Ok(())
            }
            _ => Err(HostError::UnknownNode(gain)),
        }
    }

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), HostError> {
        let mut st = self.state.lock();
        if !st.nodes.contains_key(&to) {
            return Err(HostError::UnknownNode(to));
        }
        let node = st.nodes.get_mut(&from).ok_or(HostError::UnknownNode(from))?;
        if !node.outputs.contains(&to) {
            node.outputs.push(to);
        }
        Ok(())
    }

    fn disconnect(&self, node: NodeId) -> Result<(), HostError> {
        let mut st = self.state.lock();
        let node = st.nodes.get_mut(&node).ok_or(HostError::UnknownNode(node))?;
        node.outputs.clear();
        Ok(())
    }

    fn create_element_source(
        &self,
        context: ContextId,
        element: ElementId,
    ) -> Result<NodeId, HostError> {
        let mut st = self.state.lock();
        st.live_context(context)?;
        if !st.is_media(element) {
            return Err(HostError::element_source(element, "not a media element"));
        }
        if st.blocked.contains(&element) {
            return Err(HostError::element_source(element, "cross-origin media"));
        }
        if !st.captured.insert(element) {
            return Err(HostError::element_source(
                element,
                "already captured by another graph",
            ));
        }
        Ok(st.add_node(NodeKind::ElementSource(element)))
    }

    fn resume(&self, context: ContextId) -> BoxFuture<'static, Result<(), HostError>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut st = state.lock();
            if st.resume_fails {
                return Err(HostError::backend("resume rejected by autoplay policy"));
            }
            let ctx = st
                .contexts
                .get_mut(&context)
                .ok_or(HostError::UnknownContext(context))?;
            if ctx.state == ContextState::Suspended {
                ctx.state = ContextState::Running;
            }
            Ok(())
        })
    }
}

impl MediaDocument for MockPage {
    fn media_elements(&self) -> Vec<ElementId> {
        let st = self.state.lock();
        st.order
            .iter()
            .copied()
            .filter(|id| {
                st.elements
                    .get(id)
                    .is_some_and(|el| el.connected && matches!(el.tag, Tag::Media(_)))
            })
            .collect()
    }

    fn media_within(&self, node: ElementId) -> Vec<ElementId> {
        let st = self.state.lock();
        let mut found = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(el) = st.elements.get(&id) else {
                continue;
            };
            if el.connected && matches!(el.tag, Tag::Media(_)) {
                found.push(id);
            }
            stack.extend(el.children.iter().rev().copied());
        }
        found
    }

    fn owning_media(&self, node: ElementId) -> Option<ElementId> {
        let st = self.state.lock();
        let el = st.elements.get(&node)?;
        match el.tag {
            Tag::Media(_) => Some(node),
            Tag::Source => el.parent.filter(|p| st.is_media(*p)),
            Tag::Container => None,
        }
    }

    fn describe(&self, element: ElementId) -> Option<MediaDescriptor> {
        let st = self.state.lock();
        let el = st.elements.get(&element).filter(|el| el.connected)?;
        let Tag::Media(kind) = el.tag else {
            return None;
        };
        let sources: Vec<SourceDescriptor> = el
            .children
            .iter()
            .filter_map(|c| st.elements.get(c))
            .filter(|c| c.tag == Tag::Source)
            .map(|c| SourceDescriptor {
                src: c.src.clone(),
                mime: c.mime.clone(),
            })
            .collect();
        let current_src = el
            .src
            .clone()
            .or_else(|| sources.iter().find_map(|s| s.src.clone()));
        Some(MediaDescriptor {
            kind,
            current_src,
            sources,
        })
    }

    fn volume(&self, element: ElementId) -> Option<f64> {
        self.state.lock().elements.get(&element).map(|el| el.volume)
    }

    fn set_volume(&self, element: ElementId, volume: f64) {
        if let Some(el) = self.state.lock().elements.get_mut(&element) {
            el.volume = volume;
        }
    }

    fn attach_listeners(&self, element: ElementId) {
        if let Some(el) = self.state.lock().elements.get_mut(&element) {
            el.listeners = true;
        }
    }

    fn take_channel_token(&self) -> Option<String> {
        self.state.lock().loader_token.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_page_nested_media() {
        let page = MockPage::new();
        let div = page.create_container();
        let inner = page.create_container();
        let video = page.create_media(MediaKind::Video, Some("clip.webm"));
        page.append(Some(inner), video);
        page.append(Some(div), inner);

        // Not connected yet
        assert!(page.media_elements().is_empty());

        page.append(None, div);
        assert_eq!(page.media_elements(), vec![video]);
        assert_eq!(page.media_within(div), vec![video]);
    }

    #[test]
    fn test_mock_page_remove_subtree() {
        let page = MockPage::new();
        let div = page.create_container();
        page.append(None, div);
        let audio = page.create_media(MediaKind::Audio, Some("a.mp3"));
        page.append(Some(div), audio);

        page.remove(div);
        assert!(page.media_elements().is_empty());
        assert!(page.describe(audio).is_none());
    }

    #[test]
    fn test_mock_page_describe_sources() {
        let page = MockPage::new();
        let video = page.create_media(MediaKind::Video, None);
        let source = page.create_source(Some("movie.mp4"), Some("video/mp4"));
        page.append(Some(video), source);
        page.append(None, video);

        let desc = page.describe(video).unwrap();
        assert_eq!(desc.kind, MediaKind::Video);
        assert_eq!(desc.current_src.as_deref(), Some("movie.mp4"));
        assert_eq!(desc.sources.len(), 1);
        assert_eq!(page.owning_media(source), Some(video));
    }

    #[test]
    fn test_mock_page_element_source_only_once() {
        let page = MockPage::new();
        let ctx = page.create_context().unwrap();
        let audio = page.insert_audio("a.mp3");

        assert!(page.create_element_source(ctx, audio).is_ok());
        assert!(matches!(
            page.create_element_source(ctx, audio),
            Err(HostError::ElementSourceFailed { .. })
        ));
        assert_eq!(page.element_source_count(audio), 1);
    }

    #[test]
    fn test_mock_page_without_graph() {
        let page = MockPage::without_graph();
        assert!(matches!(page.create_context(), Err(HostError::Unsupported)));
    }

    #[tokio::test]
    async fn test_mock_page_resume() {
        let page = MockPage::new();
        page.set_start_suspended(true);
        let ctx = page.create_context().unwrap();
        assert_eq!(page.context_state(ctx), ContextState::Suspended);

        page.resume(ctx).await.unwrap();
        assert_eq!(page.context_state(ctx), ContextState::Running);
    }

    #[test]
    fn test_mock_page_loader_token_taken_once() {
        let page = MockPage::new();
        page.set_loader_token("abc");
        assert_eq!(page.take_channel_token().as_deref(), Some("abc"));
        assert!(page.take_channel_token().is_none());
    }
}
