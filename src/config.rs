//! Tunable thresholds for the association engine, the stabilizer, the
//! template tracker backend and alert cues.
//!
//! Every struct carries the production defaults and can be partially
//! overridden from JSON.

use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};

/// Configuration for the track association engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Detections narrower or shorter than this never become tracks.
    pub min_size: f32,
    /// IoU above which two boxes are considered in conflict.
    pub max_overlap: f32,
    /// Inception correlation needed to accept a candidate, and the level an
    /// existing track must hold to defend its position.
    pub marginal_correlation: f32,
    /// Tracks whose correlation falls below this are dropped.
    pub min_correlation: f32,
    /// Free slots before weakest-track eviction kicks in.
    pub max_tracks: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_size: 4.0,
            max_overlap: 0.2,
            marginal_correlation: 0.75,
            min_correlation: 0.3,
            max_tracks: 3,
        }
    }
}

/// Configuration for the classification stabilizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub window_len: usize,
    /// Detections below this confidence never become the dominant label.
    pub min_confidence: f32,
    pub alert_interval_ms: u64,
    pub reminder_interval_ms: u64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window_len: 4,
            min_confidence: 0.6,
            alert_interval_ms: 1500,
            reminder_interval_ms: 7000,
        }
    }
}

/// Configuration for the template-matching frame tracker backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateTrackerConfig {
    /// The backend works on frames shrunk by this integer factor.
    pub downsample_factor: usize,
    /// Search radius around the predicted position, in downsampled pixels.
    pub search_radius: usize,
    /// Templates with a lower luminance standard deviation cannot be locked onto.
    pub min_texture_std: f32,
    /// Templates are clipped to this side length (downsampled pixels).
    pub max_template_side: usize,
}

impl Default for TemplateTrackerConfig {
    fn default() -> Self {
        Self {
            downsample_factor: 2,
            search_radius: 8,
            min_texture_std: 2.0,
            max_template_side: 48,
        }
    }
}

/// Which output devices alert cues are routed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub audio: bool,
    pub vibration: bool,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            audio: true,
            vibration: true,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub engine: EngineConfig,
    pub stabilizer: StabilizerConfig,
    pub template: TemplateTrackerConfig,
    pub cues: CueConfig,
}

impl PipelineConfig {
    /// Load a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_json::from_str(json).map_err(|e| FusionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds outside their meaningful range.
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(FusionError::Config(format!("{name} must be in [0, 1], got {v}")))
            }
        };
        unit("engine.max_overlap", self.engine.max_overlap)?;
        unit("engine.marginal_correlation", self.engine.marginal_correlation)?;
        unit("engine.min_correlation", self.engine.min_correlation)?;
        unit("stabilizer.min_confidence", self.stabilizer.min_confidence)?;

        if !(self.engine.min_size >= 0.0) {
            return Err(FusionError::Config("engine.min_size must be >= 0".into()));
        }
        if self.engine.max_tracks == 0 {
            return Err(FusionError::Config("engine.max_tracks must be >= 1".into()));
        }
        if self.stabilizer.window_len == 0 {
            return Err(FusionError::Config(
                "stabilizer.window_len must be >= 1".into(),
            ));
        }
        if self.template.downsample_factor == 0 {
            return Err(FusionError::Config(
                "template.downsample_factor must be >= 1".into(),
            ));
        }
        Ok(())
    }
}
