//! # page-capture
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Speech-gated audio and downsized still-frame capture for video playing
//! inside a page, synchronized with the lifecycle of an overlay element.
//!
//! The crate has two cooperating halves that only meet through the caller:
//!
//! - [`LifecycleWatcher`]: watches a DOM subtree and reports when a
//!   class-tagged element appears or disappears.
//! - [`CaptureController`]: owns one capture session per video target, each
//!   running an audio pipeline (voice-activity gate + 16-bit quantization)
//!   and a video pipeline (1 frame/s, 20% downscale, JPEG).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use page_capture::{CaptureController, Hooks, LifecycleWatcher, WatcherOptions};
//! use tokio::sync::mpsc;
//!
//! let (audio_tx, mut audio_rx) = mpsc::channel(64);
//! let hooks = Hooks::new();
//! hooks.forward_audio(audio_tx);
//!
//! let mut controller = CaptureController::new(platform.clone()).with_hooks(hooks);
//! let target = controller.start(None).await?;
//!
//! while let Some(chunk) = audio_rx.recv().await {
//!     // 24kHz mono i16, only while someone is speaking
//! }
//!
//! controller.destroy(&target).await;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! MediaElement → AudioContext tap → processor task ─port─→ delivery task → audio hook
//! MediaElement → refresh ticks → FrameGate → RasterSurface → frame hook
//! DomTree mutations → ElementTracker → on_add / on_remove
//! ```
//!
//! Every browser primitive is a trait ([`DomTree`], [`MediaElement`],
//! [`AudioContext`], [`RasterSurface`], [`MediaPlatform`]). In-memory and
//! software implementations ship with the crate so the full pipeline runs in
//! tests and CI without a browser.

#![warn(missing_docs)]
// Sample and pixel math requires intentional numeric casts
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod chunk;
mod config;
mod controller;
pub mod dom;
mod error;
mod event;
pub mod format;
mod frame;
mod hooks;
pub mod media;
mod pipeline;
mod session;
pub mod surface;
mod target;
pub mod watcher;

pub use chunk::AudioChunk;
pub use config::{AudioConfig, CaptureConfig, VideoConfig};
pub use controller::CaptureController;
pub use dom::{DomTree, MemoryDom, MutationBatch, MutationRecord, NodeId};
pub use error::CaptureError;
pub use event::{event_callback, CaptureEvent, EventCallback};
pub use frame::{FrameEncoding, ImageFormat, VideoFrame};
pub use hooks::{AudioHook, FrameHook, Hooks};
pub use media::{
    AudioBlock, AudioContext, AudioGraph, AudioTap, ContextState, MediaElement, MediaPlatform,
    RawFrame, ReadyState,
};
pub use pipeline::{FrameGate, VoiceGate};
pub use session::SessionStats;
pub use surface::{RasterSurface, SoftwareSurface};
pub use target::TargetId;
pub use watcher::{ElementCallback, LifecycleWatcher, WatcherOptions, DEFAULT_CLASS_NAME};
