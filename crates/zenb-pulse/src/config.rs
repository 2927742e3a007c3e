use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PulseConfig {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    /// Trailing window held by the ring buffer (seconds)
    pub window_sec: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Span over which frame coverage is measured (seconds)
    pub coverage_window_sec: f32,
    /// Minimum fraction of attempted frames that must yield a sample
    pub min_coverage: f32,
    /// Minimum frame attempts inside the coverage window before judging
    pub min_frames: usize,
    /// Span of recent samples used for level and variance checks (seconds)
    pub stats_window_sec: f32,
    /// Samples at or below this level count as a dark / occluded frame
    pub dark_level: f32,
    /// Samples at or above this level count as a saturated frame
    pub saturation_level: f32,
    /// Minimum std-dev of recent samples (normalized units)
    pub noise_floor: f32,
    /// Maximum std-dev of recent samples before it is treated as motion
    pub motion_ceiling: f32,
    /// Continuous good-signal time needed for Acquiring -> Valid (seconds)
    pub min_valid_duration_sec: f32,
    /// Minimum external presence confidence, when a detector reports one
    pub min_presence: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PeriodicityMethod {
    /// Windowed FFT peak search
    Spectral,
    /// Normalized autocorrelation lag search
    Autocorrelation,
}

impl Default for PeriodicityMethod {
    fn default() -> Self {
        Self::Spectral
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EstimatorConfig {
    pub method: PeriodicityMethod,
    /// Minimum valid history before an estimate is attempted (seconds)
    pub min_analysis_window_sec: f32,
    /// Uniform resampling rate (Hz)
    pub resample_hz: f32,
    /// Moving-average length removed during detrending (seconds)
    pub detrend_window_sec: f32,
    /// Lowest plausible heart rate (BPM)
    pub min_bpm: f32,
    /// Highest plausible heart rate (BPM)
    pub max_bpm: f32,
    /// Detrended std-dev below which the window is considered flat
    pub flat_epsilon: f32,
    /// Minimum confidence for a raw estimate to be accepted
    pub min_confidence: f32,
    /// Exponential smoothing factor against the previous estimate
    pub smoothing_alpha: f32,
    /// Largest change between consecutive accepted estimates (BPM)
    pub max_step_bpm: f32,
    /// Consecutive rejections after which the held estimate is marked stale
    pub max_consecutive_rejections: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { window_sec: 20.0 }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            coverage_window_sec: 1.0,
            min_coverage: 0.9,
            min_frames: 10,
            stats_window_sec: 2.0,
            dark_level: 0.02,
            saturation_level: 0.995,
            noise_floor: 0.0,
            motion_ceiling: 0.08,
            min_valid_duration_sec: 3.0,
            min_presence: 0.5,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            method: PeriodicityMethod::Spectral,
            min_analysis_window_sec: 5.0,
            resample_hz: 30.0,
            detrend_window_sec: 1.5,
            min_bpm: 40.0,
            max_bpm: 180.0,
            flat_epsilon: 1e-5,
            min_confidence: 0.6,
            smoothing_alpha: 0.5,
            max_step_bpm: 3.0,
            max_consecutive_rejections: 10,
        }
    }
}

impl PulseConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PulseConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    /// Environment variables are prefixed with ZENB_PULSE_
    /// Example: ZENB_PULSE_BUFFER_WINDOW_SEC=15
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. User config file (if exists)
    /// 3. Default config file
    /// 4. Built-in defaults (lowest priority)
    ///
    /// Files are merged key by key: a user file naming only
    /// `[estimator] max_step_bpm` keeps every other value from the default file.
    pub fn load_layered(
        default_path: Option<&Path>,
        user_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();

        for path in [default_path, user_path].into_iter().flatten() {
            if path.exists() {
                let content = fs::read_to_string(path)?;
                let layer: toml::Table = toml::from_str(&content)?;
                merge_tables(&mut merged, layer);
            }
        }

        let mut config: PulseConfig = toml::Value::Table(merged).try_into()?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        fn read<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
            match std::env::var(key) {
                Ok(val) => val
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::Validation(format!("Invalid {}", key))),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        if let Some(v) = read("ZENB_PULSE_BUFFER_WINDOW_SEC")? {
            self.buffer.window_sec = v;
        }
        if let Some(v) = read("ZENB_PULSE_GATE_MIN_COVERAGE")? {
            self.gate.min_coverage = v;
        }
        if let Some(v) = read("ZENB_PULSE_GATE_MIN_VALID_DURATION_SEC")? {
            self.gate.min_valid_duration_sec = v;
        }
        if let Some(v) = read("ZENB_PULSE_GATE_MOTION_CEILING")? {
            self.gate.motion_ceiling = v;
        }
        if let Some(v) = read("ZENB_PULSE_ESTIMATOR_MIN_ANALYSIS_WINDOW_SEC")? {
            self.estimator.min_analysis_window_sec = v;
        }
        if let Some(v) = read("ZENB_PULSE_ESTIMATOR_MAX_STEP_BPM")? {
            self.estimator.max_step_bpm = v;
        }
        if let Ok(val) = std::env::var("ZENB_PULSE_ESTIMATOR_METHOD") {
            self.estimator.method = match val.trim().to_ascii_lowercase().as_str() {
                "spectral" => PeriodicityMethod::Spectral,
                "autocorrelation" => PeriodicityMethod::Autocorrelation,
                _ => {
                    return Err(ConfigError::Validation(
                        "Invalid ZENB_PULSE_ESTIMATOR_METHOD".to_string(),
                    ))
                }
            };
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Validation(msg.to_string()));

        let b = &self.buffer;
        if !(b.window_sec > 0.0) {
            return fail("buffer.window_sec must be positive");
        }

        let g = &self.gate;
        if !(g.coverage_window_sec > 0.0) {
            return fail("gate.coverage_window_sec must be positive");
        }
        if !(g.min_coverage > 0.0 && g.min_coverage <= 1.0) {
            return fail("gate.min_coverage must be in (0, 1]");
        }
        if !(g.stats_window_sec > 0.0) {
            return fail("gate.stats_window_sec must be positive");
        }
        if !(g.dark_level >= 0.0 && g.dark_level < g.saturation_level && g.saturation_level <= 1.0)
        {
            return fail("gate levels must satisfy 0 <= dark_level < saturation_level <= 1");
        }
        if !(g.noise_floor >= 0.0 && g.noise_floor <= g.motion_ceiling) {
            return fail("gate.noise_floor must be in [0, motion_ceiling]");
        }
        if !(g.min_valid_duration_sec >= 0.0) {
            return fail("gate.min_valid_duration_sec must be non-negative");
        }
        if !(0.0..=1.0).contains(&g.min_presence) {
            return fail("gate.min_presence must be in [0, 1]");
        }

        let e = &self.estimator;
        if !(e.min_analysis_window_sec > 0.0 && e.min_analysis_window_sec <= b.window_sec) {
            return fail("estimator.min_analysis_window_sec must be in (0, buffer.window_sec]");
        }
        if !(e.min_bpm > 0.0 && e.min_bpm < e.max_bpm) {
            return fail("estimator.min_bpm must be positive and below max_bpm");
        }
        // Nyquist must sit above the top of the band
        if !(e.resample_hz > 2.0 * e.max_bpm / 60.0) {
            return fail("estimator.resample_hz must exceed twice the max_bpm frequency");
        }
        if !(e.detrend_window_sec > 0.0) {
            return fail("estimator.detrend_window_sec must be positive");
        }
        if !(e.smoothing_alpha > 0.0 && e.smoothing_alpha <= 1.0) {
            return fail("estimator.smoothing_alpha must be in (0, 1]");
        }
        if !(e.max_step_bpm > 0.0) {
            return fail("estimator.max_step_bpm must be positive");
        }
        if !(0.0..=1.0).contains(&e.min_confidence) {
            return fail("estimator.min_confidence must be in [0, 1]");
        }
        if e.max_consecutive_rejections == 0 {
            return fail("estimator.max_consecutive_rejections must be at least 1");
        }

        Ok(())
    }
}

/// Overlay `layer` onto `base`, descending into tables present in both.
fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}
