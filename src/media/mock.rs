//! In-memory media doubles for running capture without a browser.
//!
//! [`MockPlatform`] hands out [`MockVideo`] elements, [`MockAudioContext`]s
//! and [`SoftwareSurface`]s. Tests drive playback state on the video and feed
//! render blocks into the context's tap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{
    AudioBlock, AudioContext, AudioGraph, AudioTap, ContextState, MediaElement, MediaPlatform,
    RawFrame, ReadyState,
};
use crate::surface::RasterSurface;
use crate::{CaptureError, SoftwareSurface, TargetId};

/// A video element with settable playback state.
///
/// Starts paused, fully buffered, at time zero.
///
/// # Example
///
/// ```
/// use page_capture::media::MockVideo;
/// use page_capture::MediaElement;
///
/// let video = MockVideo::new("player", 1280, 720);
/// assert!(video.is_paused());
/// video.play();
/// assert!(!video.is_paused());
/// assert_eq!(video.read_frame().unwrap().width, 1280);
/// ```
pub struct MockVideo {
    id: TargetId,
    paused: AtomicBool,
    prepared: AtomicBool,
    ready_state: Mutex<ReadyState>,
    dimensions: Mutex<(u32, u32)>,
    current_time: Mutex<f64>,
    color: [u8; 4],
}

impl MockVideo {
    /// Creates a paused video with the given native size.
    pub fn new(id: impl Into<TargetId>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            paused: AtomicBool::new(true),
            prepared: AtomicBool::new(false),
            ready_state: Mutex::new(ReadyState::HaveEnoughData),
            dimensions: Mutex::new((width, height)),
            current_time: Mutex::new(0.0),
            color: [32, 96, 160, 255],
        }
    }

    /// Starts playback.
    pub fn play(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Pauses playback.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Sets the buffering state.
    pub fn set_ready_state(&self, state: ReadyState) {
        *self.ready_state.lock() = state;
    }

    /// Sets the native video size.
    pub fn set_dimensions(&self, width: u32, height: u32) {
        *self.dimensions.lock() = (width, height);
    }

    /// Sets the playback position in seconds.
    pub fn set_current_time(&self, seconds: f64) {
        *self.current_time.lock() = seconds;
    }

    /// Returns `true` once [`MediaElement::prepare_for_capture`] was called.
    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::SeqCst)
    }
}

impl MediaElement for MockVideo {
    fn id(&self) -> TargetId {
        self.id.clone()
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn ready_state(&self) -> ReadyState {
        *self.ready_state.lock()
    }

    fn video_dimensions(&self) -> (u32, u32) {
        *self.dimensions.lock()
    }

    fn current_time(&self) -> f64 {
        *self.current_time.lock()
    }

    fn prepare_for_capture(&self) {
        self.prepared.store(true, Ordering::SeqCst);
    }

    fn read_frame(&self) -> Option<RawFrame> {
        if !self.ready_state().can_draw() {
            return None;
        }
        let (width, height) = self.video_dimensions();
        Some(RawFrame::solid(width, height, self.color))
    }
}

type BlockSender = Arc<Mutex<Option<mpsc::Sender<AudioBlock>>>>;

/// Tap graph handed out by [`MockAudioContext`]. Disconnecting it closes
/// the block stream.
struct MockGraph {
    sender: BlockSender,
    disconnected: Arc<AtomicBool>,
}

impl AudioGraph for MockGraph {
    fn disconnect(&mut self) {
        self.sender.lock().take();
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// An audio context whose tap is fed by the test.
///
/// Contexts start suspended. Blocks pushed with
/// [`push_block`](Self::push_block) reach the attached tap; they are
/// discarded while the context is not running, like a suspended graph that
/// renders nothing.
pub struct MockAudioContext {
    sample_rate: u32,
    channels: u16,
    state: Mutex<ContextState>,
    tap_supported: bool,
    fail_resume: bool,
    sender: BlockSender,
    disconnected: Arc<AtomicBool>,
}

impl MockAudioContext {
    /// Creates a suspended context that supports the audio tap.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            state: Mutex::new(ContextState::Suspended),
            tap_supported: true,
            fail_resume: false,
            sender: Arc::new(Mutex::new(None)),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes [`AudioContext::attach_tap`] fail as on a platform without
    /// off-thread processing.
    pub fn without_tap(mut self) -> Self {
        self.tap_supported = false;
        self
    }

    /// Makes [`AudioContext::resume`] fail.
    pub fn failing_resume(mut self) -> Self {
        self.fail_resume = true;
        self
    }

    /// Sample rate the context was created with.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count the context was created with.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns `true` once a tap has been installed and not yet disconnected.
    pub fn has_tap(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Returns `true` once the tap graph was disconnected.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Feeds one render block into the tap.
    ///
    /// Returns `false` if the block was not delivered: no tap, context not
    /// running, or the tap channel is full.
    pub fn push_block(&self, block: AudioBlock) -> bool {
        if self.state() != ContextState::Running {
            return false;
        }
        match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(block).is_ok(),
            None => false,
        }
    }

    /// Feeds a constant-amplitude block of `frames` samples.
    pub fn push_tone(&self, amplitude: f32, frames: usize) -> bool {
        self.push_block(AudioBlock::mono(vec![amplitude; frames]))
    }

    /// Feeds a silent block of `frames` samples.
    pub fn push_silence(&self, frames: usize) -> bool {
        self.push_tone(0.0, frames)
    }
}

#[async_trait]
impl AudioContext for MockAudioContext {
    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(CaptureError::AudioBackend("context is closed".to_string()));
        }
        if self.fail_resume {
            return Err(CaptureError::AudioBackend("resume was rejected".to_string()));
        }
        *state = ContextState::Running;
        Ok(())
    }

    async fn suspend(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(CaptureError::AudioBackend("context is closed".to_string()));
        }
        *state = ContextState::Suspended;
        Ok(())
    }

    async fn close(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(CaptureError::AudioBackend("context is already closed".to_string()));
        }
        *state = ContextState::Closed;
        self.sender.lock().take();
        Ok(())
    }

    async fn attach_tap(
        &self,
        _element: Arc<dyn MediaElement>,
        capacity: usize,
    ) -> Result<AudioTap, CaptureError> {
        if !self.tap_supported {
            return Err(CaptureError::capability_unavailable(
                "audio worklet is not supported",
            ));
        }
        if self.state() == ContextState::Closed {
            return Err(CaptureError::AudioBackend("context is closed".to_string()));
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        *self.sender.lock() = Some(tx);
        self.disconnected.store(false, Ordering::SeqCst);

        Ok(AudioTap {
            blocks: rx,
            graph: Box::new(MockGraph {
                sender: Arc::clone(&self.sender),
                disconnected: Arc::clone(&self.disconnected),
            }),
        })
    }
}

/// A page with a list of [`MockVideo`]s.
///
/// Every audio context it creates is kept so tests can feed and inspect it.
#[derive(Default)]
pub struct MockPlatform {
    videos: Mutex<Vec<Arc<MockVideo>>>,
    contexts: Mutex<Vec<Arc<MockAudioContext>>>,
    tap_unsupported: AtomicBool,
    fail_resume: AtomicBool,
}

impl MockPlatform {
    /// Creates a page without videos.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a video to the page.
    pub fn add_video(&self, video: Arc<MockVideo>) {
        self.videos.lock().push(video);
    }

    /// Removes the video with the given id.
    pub fn remove_video(&self, id: &TargetId) {
        self.videos.lock().retain(|video| &video.id != id);
    }

    /// Controls whether new contexts support the audio tap.
    pub fn set_tap_supported(&self, supported: bool) {
        self.tap_unsupported.store(!supported, Ordering::SeqCst);
    }

    /// Controls whether new contexts fail to resume.
    pub fn set_fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    /// Every context created so far, oldest first.
    pub fn contexts(&self) -> Vec<Arc<MockAudioContext>> {
        self.contexts.lock().clone()
    }

    /// The most recently created context.
    pub fn last_context(&self) -> Option<Arc<MockAudioContext>> {
        self.contexts.lock().last().cloned()
    }
}

impl MediaPlatform for MockPlatform {
    fn first_video(&self) -> Option<Arc<dyn MediaElement>> {
        self.videos
            .lock()
            .first()
            .map(|video| Arc::clone(video) as Arc<dyn MediaElement>)
    }

    fn create_audio_context(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Arc<dyn AudioContext>, CaptureError> {
        let mut context = MockAudioContext::new(sample_rate, channels);
        if self.tap_unsupported.load(Ordering::SeqCst) {
            context = context.without_tap();
        }
        if self.fail_resume.load(Ordering::SeqCst) {
            context = context.failing_resume();
        }

        let context = Arc::new(context);
        self.contexts.lock().push(Arc::clone(&context));
        Ok(context)
    }

    fn create_surface(&self) -> Box<dyn RasterSurface> {
        Box::new(SoftwareSurface::new())
    }
}
