use std::path::PathBuf;
use std::time::{Duration, Instant};

/// High-level behaviour requested by the caller.
///
/// The render policy decides whether frames should animate continuously,
/// be evaluated at a fixed timestamp, or be exported to disk.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Run the preview window continuously, optionally clamping the frame rate.
    Animate {
        /// Optional requested frames-per-second cap.
        target_fps: Option<f32>,
    },
    /// Show a single frame frozen at `time` seconds.
    Still { time: f32 },
    /// Render one frame at `time` seconds off-screen and write it to `path` as PNG.
    Export { time: f32, path: PathBuf },
}

impl RenderPolicy {
    /// Policies that show one instant rather than an animation.
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Still { .. } | Self::Export { .. })
    }
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Animate { target_fps: None }
    }
}

/// Snapshot of the clock supplied to the animation driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
    frame: u64,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time, frame: 0 }
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.time, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Simulated clock advancing by a constant step per sample, starting at
/// `start`. Useful for deterministic frame sequences.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    start: f32,
    step: f32,
    frame: u64,
}

impl SteppedTimeSource {
    pub fn new(start: f32, step: f32) -> Self {
        Self {
            start,
            step,
            frame: 0,
        }
    }

    /// A clock ticking at `fps` frames per second from zero.
    pub fn at_fps(fps: f32) -> Self {
        Self::new(0.0, if fps > 0.0 { 1.0 / fps } else { 0.0 })
    }
}

impl TimeSource for SteppedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.start + self.step * self.frame as f32, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> BoxedTimeSource {
    match policy {
        RenderPolicy::Animate { .. } => Box::new(SystemTimeSource::new()),
        RenderPolicy::Still { time } | RenderPolicy::Export { time, .. } => {
            Box::new(FixedTimeSource::new(*time))
        }
    }
}

/// Decides when the host should issue the next redraw.
///
/// Animated policies render every refresh or at most `target_fps`; still
/// policies render once and then idle until [`FrameScheduler::reset`].
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Option<Duration>,
    one_shot: bool,
    last_frame: Option<Instant>,
    rendered_once: bool,
}

impl FrameScheduler {
    pub fn new(policy: &RenderPolicy) -> Self {
        let (interval, one_shot) = match policy {
            RenderPolicy::Animate { target_fps } => (
                target_fps
                    .filter(|fps| fps.is_finite() && *fps > 0.0)
                    .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps))),
                false,
            ),
            RenderPolicy::Still { .. } | RenderPolicy::Export { .. } => (None, true),
        };
        Self {
            interval,
            one_shot,
            last_frame: None,
            rendered_once: false,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        if self.one_shot {
            return !self.rendered_once;
        }
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
        self.rendered_once = true;
    }

    /// When the next capped frame is due; `None` means "now" or "never".
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.one_shot {
            return None;
        }
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
        self.rendered_once = false;
    }
}
