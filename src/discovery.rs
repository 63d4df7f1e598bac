//! Media discovery: which media elements exist and which need attention.
//!
//! The host adapter forwards DOM mutation records as [`DomMutation`]s and
//! per-element events as [`MediaEvent`]s. [`Discovery`] turns them into the
//! set of elements to process, re-detect and release.

use std::collections::HashSet;

use crate::host::{ElementId, MediaDocument};

/// Attributes whose change can alter what an element plays.
const WATCHED_ATTRIBUTES: &[&str] = &["src", "type"];

/// One DOM mutation record, as seen by a subtree observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomMutation {
    /// Nodes inserted anywhere in the document. They may be media elements
    /// or contain them at any depth.
    Added(Vec<ElementId>),
    /// Nodes removed from the document.
    Removed(Vec<ElementId>),
    /// An attribute changed on a node.
    Attribute {
        /// The node whose attribute changed.
        target: ElementId,
        /// Attribute name.
        name: String,
    },
}

/// Per-element events that may change detectable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// `loadedmetadata`
    LoadedMetadata,
    /// `loadstart`
    LoadStart,
    /// `durationchange`
    DurationChange,
    /// `error`
    Error,
    /// `play`
    Play,
}

/// What a batch of mutations means for the engine.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DiscoveryOutcome {
    /// Media elements seen for the first time.
    pub added: Vec<ElementId>,
    /// Known media whose source may have changed.
    pub changed: Vec<ElementId>,
    /// Processed media no longer in the document.
    pub removed: Vec<ElementId>,
}

impl DiscoveryOutcome {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Tracks processed media elements.
#[derive(Debug, Default)]
pub(crate) struct Discovery {
    processed: HashSet<ElementId>,
}

impl Discovery {
    /// Marks an element processed and attaches its listeners.
    ///
    /// Returns `false` if it was already processed.
    pub fn process(&mut self, document: &dyn MediaDocument, element: ElementId) -> bool {
        if !self.processed.insert(element) {
            return false;
        }
        document.attach_listeners(element);
        true
    }

    /// Processes every media element already in the document.
    pub fn scan(&mut self, document: &dyn MediaDocument) -> Vec<ElementId> {
        document
            .media_elements()
            .into_iter()
            .filter(|element| self.process(document, *element))
            .collect()
    }

    /// Interprets a batch of mutation records.
    pub fn observe(
        &mut self,
        document: &dyn MediaDocument,
        mutations: &[DomMutation],
    ) -> DiscoveryOutcome {
        let mut outcome = DiscoveryOutcome::default();

        for mutation in mutations {
            match mutation {
                DomMutation::Added(nodes) => {
                    for node in nodes {
                        for element in document.media_within(*node) {
                            if self.process(document, element) {
                                outcome.added.push(element);
                            }
                        }
                    }
                }
                DomMutation::Attribute { target, name } => {
                    if !WATCHED_ATTRIBUTES.contains(&name.as_str()) {
                        continue;
                    }
                    if let Some(element) = document.owning_media(*target) {
                        // A source attribute can reveal media we never saw
                        if self.process(document, element) {
                            outcome.added.push(element);
                        } else if !outcome.changed.contains(&element) {
                            outcome.changed.push(element);
                        }
                    }
                }
                DomMutation::Removed(_) => {}
            }
        }

        // Removal records don't say which descendants were media, and a node
        // may be re-inserted within the same batch. Reconcile against the
        // document instead.
        if mutations
            .iter()
            .any(|m| matches!(m, DomMutation::Removed(nodes) if !nodes.is_empty()))
        {
            outcome.removed = self.reconcile(document);
        }

        tracing::trace!(
            added = outcome.added.len(),
            changed = outcome.changed.len(),
            removed = outcome.removed.len(),
            "mutations observed"
        );
        outcome
    }

    /// Drops processed elements that left the document and returns them.
    pub fn reconcile(&mut self, document: &dyn MediaDocument) -> Vec<ElementId> {
        let present: HashSet<ElementId> = document.media_elements().into_iter().collect();
        let gone: Vec<ElementId> = self
            .processed
            .iter()
            .copied()
            .filter(|element| !present.contains(element))
            .collect();
        for element in &gone {
            self.processed.remove(element);
        }
        gone
    }

    pub fn is_processed(&self, element: ElementId) -> bool {
        self.processed.contains(&element)
    }

    #[cfg(test)]
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MediaKind, MockPage};

    #[test]
    fn test_scan_processes_existing_media_once() {
        let page = MockPage::new();
        let a = page.insert_audio("a.mp3");
        let v = page.insert_video("v.mp4");
        let mut discovery = Discovery::default();

        assert_eq!(discovery.scan(&page), vec![a, v]);
        assert!(page.listeners_attached(a));
        assert!(discovery.scan(&page).is_empty());
    }

    #[test]
    fn test_nested_insertion_is_found() {
        let page = MockPage::new();
        let mut discovery = Discovery::default();
        discovery.scan(&page);

        let outer = page.create_container();
        let inner = page.create_container();
        let video = page.create_media(MediaKind::Video, Some("clip.webm"));
        page.append(Some(inner), video);
        page.append(Some(outer), inner);
        page.append(None, outer);

        let outcome = discovery.observe(&page, &[DomMutation::Added(vec![outer])]);
        assert_eq!(outcome.added, vec![video]);
        assert!(discovery.is_processed(video));
    }

    #[test]
    fn test_source_attribute_change_marks_owner_changed() {
        let page = MockPage::new();
        let video = page.create_media(MediaKind::Video, None);
        let source = page.create_source(Some("a.mp4"), None);
        page.append(Some(video), source);
        page.append(None, video);
        let mut discovery = Discovery::default();
        discovery.scan(&page);

        page.set_attribute(source, "src", "b.webm");
        let outcome = discovery.observe(
            &page,
            &[
                DomMutation::Attribute {
                    target: source,
                    name: "src".into(),
                },
                DomMutation::Attribute {
                    target: video,
                    name: "type".into(),
                },
            ],
        );
        assert_eq!(outcome.changed, vec![video]);
    }

    #[test]
    fn test_irrelevant_attribute_ignored() {
        let page = MockPage::new();
        let audio = page.insert_audio("a.mp3");
        let mut discovery = Discovery::default();
        discovery.scan(&page);

        let outcome = discovery.observe(
            &page,
            &[DomMutation::Attribute {
                target: audio,
                name: "class".into(),
            }],
        );
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_removal_of_container_releases_nested_media() {
        let page = MockPage::new();
        let div = page.create_container();
        page.append(None, div);
        let audio = page.create_media(MediaKind::Audio, Some("a.mp3"));
        page.append(Some(div), audio);
        let mut discovery = Discovery::default();
        discovery.scan(&page);

        page.remove(div);
        let outcome = discovery.observe(&page, &[DomMutation::Removed(vec![div])]);

        assert_eq!(outcome.removed, vec![audio]);
        assert!(!discovery.is_processed(audio));
        assert_eq!(discovery.processed_count(), 0);
    }
}
