use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Abstraction over where animation time comes from.
pub trait TimeSource: Send {
    /// Restarts the source at zero.
    fn reset(&mut self);
    /// Seconds elapsed since the last reset.
    fn elapsed(&mut self) -> f32;
}

/// Time source backed by the monotonic system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
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
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
    }

    fn elapsed(&mut self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Time source driven by hand; used for deterministic exports and tests.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Arc<Mutex<f32>>,
}

impl ManualTimeSource {
    pub fn new(start: f32) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the shared time forward; every clone observes the change.
    pub fn advance(&self, seconds: f32) {
        if let Ok(mut now) = self.now.lock() {
            *now += seconds;
        }
    }

    fn read(&self) -> f32 {
        self.now.lock().map(|now| *now).unwrap_or(0.0)
    }
}

impl TimeSource for ManualTimeSource {
    fn reset(&mut self) {
        if let Ok(mut now) = self.now.lock() {
            *now = 0.0;
        }
    }

    fn elapsed(&mut self) -> f32 {
        self.read()
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Free-running animation clock.
///
/// Starts at zero when created, advances on every [`AnimationClock::tick`]
/// and never goes backwards. Once stopped it no longer advances.
pub struct AnimationClock {
    source: BoxedTimeSource,
    seconds: f32,
    running: bool,
}

impl AnimationClock {
    pub fn new(mut source: BoxedTimeSource) -> Self {
        source.reset();
        Self {
            source,
            seconds: 0.0,
            running: true,
        }
    }

    pub fn system() -> Self {
        Self::new(Box::new(SystemTimeSource::new()))
    }

    /// Samples the source; returns the (monotonic) elapsed seconds.
    pub fn tick(&mut self) -> f32 {
        if self.running {
            let sampled = self.source.elapsed();
            if sampled > self.seconds {
                self.seconds = sampled;
            }
        }
        self.seconds
    }

    pub fn seconds(&self) -> f32 {
        self.seconds
    }

    pub fn stop(&mut self) {
        self.running = false;
    }
}

impl std::fmt::Debug for AnimationClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationClock")
            .field("seconds", &self.seconds)
            .field("running", &self.running)
            .finish()
    }
}
