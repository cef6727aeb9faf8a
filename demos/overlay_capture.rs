//! Overlay-driven capture example.
//!
//! Wires a `LifecycleWatcher` to a `CaptureController` over the in-memory
//! DOM and the mock media platform: opening the overlay starts capture of
//! the page's video, closing it destroys the session.
//!
//! Run with: cargo run --example overlay_capture

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use page_capture::media::{MockPlatform, MockVideo};
use page_capture::{
    AudioChunk, CaptureController, CaptureEvent, DomTree, Hooks, LifecycleWatcher, MemoryDom,
    NodeId, VideoFrame, WatcherOptions, DEFAULT_CLASS_NAME,
};
use tokio::sync::mpsc;

#[derive(Debug)]
enum Overlay {
    Shown(NodeId),
    Hidden(NodeId),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let dom = Arc::new(MemoryDom::new());
    let platform = Arc::new(MockPlatform::new());
    let video = Arc::new(MockVideo::new("feed", 1280, 720));
    video.play();
    platform.add_video(video.clone());

    // Forward captured output to channels and count what arrives
    let (audio_tx, mut audio_rx) = mpsc::channel::<AudioChunk>(64);
    let (frame_tx, mut frame_rx) = mpsc::channel::<VideoFrame>(8);
    let hooks = Hooks::new();
    hooks.forward_audio(audio_tx);
    hooks.forward_frames(frame_tx);

    let samples = Arc::new(AtomicU64::new(0));
    let frames = Arc::new(AtomicU64::new(0));
    let sample_count = samples.clone();
    tokio::spawn(async move {
        while let Some(chunk) = audio_rx.recv().await {
            sample_count.fetch_add(chunk.frames as u64, Ordering::Relaxed);
        }
    });
    let frame_count = frames.clone();
    tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            println!(
                "frame {}x{} (from {}x{}) at {:.2}s, {} bytes of data URL",
                frame.width,
                frame.height,
                frame.original_width,
                frame.original_height,
                frame.ts,
                frame.data.len()
            );
            frame_count.fetch_add(1, Ordering::Relaxed);
        }
    });

    let mut controller = CaptureController::new(platform.clone())
        .with_hooks(hooks)
        .on_event(|event| match event {
            CaptureEvent::SessionStarted { target, degraded } => {
                println!("capture started for {target} (degraded: {degraded})");
            }
            CaptureEvent::SessionDestroyed { target } => println!("capture released for {target}"),
            other => println!("event: {other:?}"),
        });

    // Watcher callbacks run on the observe task, so hand them to main
    let (overlay_tx, mut overlay_rx) = mpsc::unbounded_channel();
    let hidden_tx = overlay_tx.clone();
    let options = WatcherOptions::default()
        .on_add(move |node| {
            let _ = overlay_tx.send(Overlay::Shown(node));
        })
        .on_remove(move |node| {
            let _ = hidden_tx.send(Overlay::Hidden(node));
        });
    let mut watcher = LifecycleWatcher::new(dom.clone(), options)?;
    watcher.start();

    // The page opens its detail overlay
    let mask = dom.create_element("div", &[DEFAULT_CLASS_NAME]);
    dom.append_child(dom.root(), mask);

    if let Some(Overlay::Shown(node)) = overlay_rx.recv().await {
        println!("overlay {node} shown");
        controller.start(None).await?;
    }

    // Two seconds of speech followed by one of silence, in 20 ms blocks
    let context = platform.last_context().ok_or("no audio context was created")?;
    let mut ticker = tokio::time::interval(Duration::from_millis(20));
    for block in 0..150 {
        ticker.tick().await;
        if block < 100 {
            context.push_tone(0.2, 480);
        } else {
            context.push_silence(480);
        }
    }

    // The page closes the overlay
    dom.remove(mask);
    if let Some(Overlay::Hidden(node)) = overlay_rx.recv().await {
        println!("overlay {node} hidden");
        for target in controller.targets() {
            if let Some(stats) = controller.stats(&target) {
                println!("{target}: {stats:?}");
            }
        }
        controller.destroy_all().await;
    }

    watcher.destroy();
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!(
        "received {} audio samples and {} frames",
        samples.load(Ordering::Relaxed),
        frames.load(Ordering::Relaxed)
    );
    Ok(())
}
