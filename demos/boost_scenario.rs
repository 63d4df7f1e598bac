//! Boost scenario example.
//!
//! Simulates a page with an `<audio>` element and a script-built audio graph,
//! then drives the engine from a bridge: 50%, 300%, and back to native-only.
//!
//! Run with: cargo run --example boost_scenario

use std::sync::Arc;
use std::time::Duration;

use page_audio::{
    AudioGraph, Bridge, BridgeUpdate, ChannelMessage, ChannelTransport, Engine, EngineConfig,
    MediaDocument, MockPage, VolumeMethod,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let page = MockPage::new();
    let audio = page.insert_audio("https://radio.example/live/track.mp3");

    let (to_engine_tx, mut to_engine_rx) = mpsc::channel::<ChannelMessage>(32);
    let (to_bridge_tx, mut to_bridge_rx) = mpsc::channel::<ChannelMessage>(32);
    let (updates_tx, mut updates_rx) = mpsc::channel(32);

    let bridge = Arc::new(
        Bridge::new(ChannelTransport::new(to_engine_tx), EngineConfig::default())
            .with_updates(updates_tx),
    );
    // The loader hands the token to the page-context script
    page.set_loader_token(bridge.token().as_str());

    let relay = Arc::clone(&bridge);
    tokio::spawn(async move {
        while let Some(msg) = to_bridge_rx.recv().await {
            relay.handle_event(&msg.event, &msg.detail).await;
        }
    });

    let engine = Engine::builder()
        .graph(page.clone())
        .document(page.clone())
        .transport(ChannelTransport::new(to_bridge_tx))
        .on_event(|e| tracing::debug!(?e, "engine event"))
        .attach()
        .await?;

    let dispatcher = engine.clone();
    tokio::spawn(async move {
        while let Some(msg) = to_engine_rx.recv().await {
            dispatcher.handle_channel_event(&msg.event, &msg.detail).await;
        }
    });

    tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            if let BridgeUpdate::AudioState(state) = update {
                println!("state: {}", state.signature());
            }
        }
    });

    // The page's own synth
    let ctx = page.new_page_context();
    let gain = engine.context_created(ctx)?;
    let osc = page.create_node(ctx);
    engine.connect(osc, page.destination(ctx)?)?;

    for (percent, method) in [
        (50.0, VolumeMethod::Both),
        (300.0, VolumeMethod::Both),
        (80.0, VolumeMethod::NativeOnly),
    ] {
        bridge.set_volume(percent, method).await?;
        tokio::time::sleep(Duration::from_millis(200)).await;

        println!(
            "{percent}% {method:?}: element volume {:?}, routed {}, page gain {:?}, boost gain {:?}",
            page.volume(audio),
            engine.is_routed(audio),
            page.gain_value(gain),
            engine.boost_gain().and_then(|g| page.gain_value(g)),
        );
    }

    if let Some(state) = bridge.query_state().await {
        println!(
            "\n{} context(s), {} audio element(s), stream type {:?}",
            state.web_audio_contexts, state.native_audio_count, state.stream_type
        );
    }

    println!("\nDone!");

    Ok(())
}
