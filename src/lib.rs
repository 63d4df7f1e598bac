//! # page-audio
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Per-page audio interception and gain routing.
//!
//! `page-audio` lets a privileged controller make a page louder (or quieter)
//! than the page itself allows. The engine sits inside the page and
//!
//! - injects a gain stage into every audio-graph context the page creates,
//! - routes native `<audio>`/`<video>` elements through a shared boost graph
//!   when the requested level exceeds what native volume can express,
//! - tracks media as it comes and goes and reports a deduplicated
//!   [`AudioState`] snapshot, codecs and stream type included,
//! - talks to its [`Bridge`] over a private, token-scoped channel.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use page_audio::{
//!     Bridge, ChannelMessage, ChannelTransport, Engine, EngineConfig, MockPage, VolumeMethod,
//! };
//! use tokio::sync::mpsc;
//!
//! let page = MockPage::new();
//! let (to_bridge, mut bridge_rx) = mpsc::channel::<ChannelMessage>(32);
//! let (to_engine, mut engine_rx) = mpsc::channel::<ChannelMessage>(32);
//!
//! let bridge = Bridge::new(ChannelTransport::new(to_engine), EngineConfig::default());
//! page.set_loader_token(bridge.token().as_str());
//!
//! let engine = Engine::builder()
//!     .graph(page.clone())
//!     .document(page.clone())
//!     .transport(ChannelTransport::new(to_bridge))
//!     .on_event(|e| tracing::debug!(?e, "engine event"))
//!     .attach()
//!     .await?;
//!
//! bridge.set_volume(300.0, VolumeMethod::Both).await?;
//! ```
//!
//! ## Architecture
//!
//! - **Host traits**: [`AudioGraph`] and [`MediaDocument`] abstract the page.
//!   The host adapter calls the [`Engine`] hooks where the page acts.
//! - **Engine state**: one mutex-guarded struct. Hooks mutate it, release
//!   the lock, then deliver events and schedule deferred work.
//! - **Deferred work**: volume re-application and state refresh are debounced
//!   on the tokio runtime, with at most one outstanding run each.

#![warn(missing_docs)]
// Percent and gain math mixes integer counts and floats
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod bridge;
mod builder;
mod channel;
mod config;
mod deferred;
mod detect;
mod discovery;
mod engine;
mod error;
mod event;
mod graph;
pub mod host;
mod state;
mod volume;

pub use bridge::{Bridge, BridgeStatus, BridgeUpdate};
pub use builder::EngineBuilder;
pub use channel::{
    ChannelMessage, ChannelNames, ChannelToken, ChannelTransport, Command, Percent, Transport,
};
pub use config::EngineConfig;
pub use detect::{detect, Detection};
pub use discovery::{DomMutation, MediaEvent};
pub use engine::Engine;
pub use error::{ChannelError, EngineError, HostError};
pub use event::{event_callback, EngineEvent, EventCallback};
pub use host::{
    AudioGraph, ContextId, ContextState, ElementId, MediaDescriptor, MediaDocument, MediaKind,
    MockPage, NodeId, SourceDescriptor,
};
pub use state::{AudioState, Codec, CodecKind};
pub use volume::{decide, Decision, VolumeMethod, VolumeSetting, UNITY};
