//! Thread-safe engine handle
//!
//! Frame callbacks and the 1 Hz timer usually live on different threads.
//! All writes are serialized through one mutex around [`PpgEngine`]; the
//! latest estimate and validity are republished after every write into a
//! separate `RwLock` so readers take a consistent copy without waiting on
//! an in-flight computation.

use crate::config::{ConfigError, PulseConfig};
use crate::engine::{Guidance, PpgEngine};
use crate::estimator::BpmEstimate;
use crate::gate::ValidityState;
use crate::sample::{FrameObservation, Sample};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Snapshot published to readers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Published {
    pub estimate: BpmEstimate,
    pub validity: ValidityState,
    pub guidance: Guidance,
}

impl Published {
    fn from_engine(engine: &PpgEngine) -> Self {
        Self {
            estimate: engine.current_estimate(),
            validity: engine.current_validity(),
            guidance: engine.guidance(),
        }
    }
}

struct Inner {
    engine: Mutex<PpgEngine>,
    published: RwLock<Published>,
}

/// Cloneable handle to one shared engine
#[derive(Clone)]
pub struct SharedPpgEngine {
    inner: Arc<Inner>,
}

impl SharedPpgEngine {
    pub fn new() -> Self {
        Self::from_engine(PpgEngine::new())
    }

    pub fn with_config(config: PulseConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_engine(PpgEngine::with_config(config)?))
    }

    pub fn from_engine(engine: PpgEngine) -> Self {
        let published = Published::from_engine(&engine);
        Self {
            inner: Arc::new(Inner {
                engine: Mutex::new(engine),
                published: RwLock::new(published),
            }),
        }
    }

    /// Run `f` under the writer lock and republish before releasing it.
    fn write<R>(&self, f: impl FnOnce(&mut PpgEngine) -> R) -> R {
        let mut engine = self.inner.engine.lock();
        let out = f(&mut engine);
        *self.inner.published.write() = Published::from_engine(&engine);
        out
    }

    pub fn submit_sample(&self, sample: Sample) {
        self.write(|e| e.submit_sample(sample));
    }

    pub fn submit_dropout(&self, timestamp_us: i64) {
        self.write(|e| e.submit_dropout(timestamp_us));
    }

    pub fn submit(&self, observation: FrameObservation) {
        self.write(|e| e.submit(observation));
    }

    pub fn observe_presence(&self, confidence: f32) {
        self.write(|e| e.observe_presence(confidence));
    }

    pub fn tick(&self) -> BpmEstimate {
        self.write(|e| e.tick())
    }

    /// Serialized with `tick`: a reset issued during a computation lands
    /// after it and overwrites its result.
    pub fn reset(&self) {
        self.write(|e| e.reset());
    }

    pub fn current_estimate(&self) -> BpmEstimate {
        self.inner.published.read().estimate
    }

    pub fn current_validity(&self) -> ValidityState {
        self.inner.published.read().validity
    }

    pub fn guidance(&self) -> Guidance {
        self.inner.published.read().guidance
    }

    /// Estimate, validity and guidance from the same write
    pub fn snapshot(&self) -> Published {
        *self.inner.published.read()
    }

    /// Run a read-only query against the engine under the writer lock
    pub fn with_engine<R>(&self, f: impl FnOnce(&PpgEngine) -> R) -> R {
        f(&self.inner.engine.lock())
    }
}

impl Default for SharedPpgEngine {
    fn default() -> Self {
        Self::new()
    }
}
