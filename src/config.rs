//! Runtime configuration for clustering, precaching, animation and heat maps.
//!
//! Every section has serde defaults, so partial documents are accepted:
//!
//! ```rust
//! use geocluster::Config;
//!
//! let config = Config::from_json(r#"{ "clustering": { "max_distance": 80 } }"#).unwrap();
//! assert_eq!(config.clustering.max_distance, 80);
//! assert_eq!(config.precache.capacity, 5);
//! ```

use crate::animation::Easing;
use crate::camera::ViewportSize;
use crate::cluster::DEFAULT_MAX_DISTANCE_AT_ZOOM;
use crate::error::{GeoclusterError, Result};
use crate::heatmap::{DEFAULT_OPACITY, DEFAULT_RADIUS, MAX_RADIUS, MIN_RADIUS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub precache: PrecacheConfig,

    #[serde(default)]
    pub animation: AnimationConfig,

    #[serde(default)]
    pub heatmap: HeatmapConfig,
}

/// Which clustering algorithm a [`ClusterManager`](crate::manager::ClusterManager) builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    #[default]
    Distance,
    Grid,
    ViewBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusteringConfig {
    #[serde(default)]
    pub algorithm: AlgorithmKind,

    /// Pixels at zoom 0 within which items are grouped (grid cell size for the grid algorithm).
    #[serde(default = "ClusteringConfig::default_max_distance")]
    pub max_distance: u32,

    /// Initial viewport for the view-based algorithm.
    #[serde(default)]
    pub viewport: ViewportSize,
}

impl ClusteringConfig {
    const fn default_max_distance() -> u32 {
        DEFAULT_MAX_DISTANCE_AT_ZOOM
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmKind::default(),
            max_distance: Self::default_max_distance(),
            viewport: ViewportSize::default(),
        }
    }
}

/// Settings for [`PreCachingAlgorithmDecorator`](crate::cluster::PreCachingAlgorithmDecorator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrecacheConfig {
    /// Wrap the algorithm in the precaching decorator at all.
    #[serde(default = "PrecacheConfig::default_enabled")]
    pub enabled: bool,

    /// Number of zoom levels kept in the cache.
    #[serde(default = "PrecacheConfig::default_capacity")]
    pub capacity: usize,

    #[serde(default = "PrecacheConfig::default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "PrecacheConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl PrecacheConfig {
    const fn default_enabled() -> bool {
        true
    }

    const fn default_capacity() -> usize {
        5
    }

    const fn default_min_delay_ms() -> u64 {
        500
    }

    const fn default_max_delay_ms() -> u64 {
        1000
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_delay_ms(mut self, min_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.min_delay_ms = min_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(GeoclusterError::InvalidConfig(
                "precache capacity must be greater than zero".to_string(),
            ));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(GeoclusterError::InvalidConfig(format!(
                "precache delay range is empty: {}ms > {}ms",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            capacity: Self::default_capacity(),
            min_delay_ms: Self::default_min_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
        }
    }
}

/// Timing for [`ClusterAnimator`](crate::animation::ClusterAnimator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationConfig {
    #[serde(default = "AnimationConfig::default_duration_ms")]
    pub zoom_in_duration_ms: u64,

    #[serde(default = "AnimationConfig::default_duration_ms")]
    pub zoom_out_duration_ms: u64,

    #[serde(default)]
    pub zoom_in_easing: Easing,

    #[serde(default)]
    pub zoom_out_easing: Easing,

    #[serde(default = "AnimationConfig::default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl AnimationConfig {
    const fn default_duration_ms() -> u64 {
        300
    }

    const fn default_frame_interval_ms() -> u64 {
        16
    }

    pub fn with_durations_ms(mut self, zoom_in: u64, zoom_out: u64) -> Self {
        self.zoom_in_duration_ms = zoom_in;
        self.zoom_out_duration_ms = zoom_out;
        self
    }

    pub fn with_easing(mut self, zoom_in: Easing, zoom_out: Easing) -> Self {
        self.zoom_in_easing = zoom_in;
        self.zoom_out_easing = zoom_out;
        self
    }

    pub fn with_frame_interval_ms(mut self, frame_interval_ms: u64) -> Self {
        self.frame_interval_ms = frame_interval_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            return Err(GeoclusterError::InvalidConfig(
                "animation frame interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            zoom_in_duration_ms: Self::default_duration_ms(),
            zoom_out_duration_ms: Self::default_duration_ms(),
            zoom_in_easing: Easing::default(),
            zoom_out_easing: Easing::default(),
            frame_interval_ms: Self::default_frame_interval_ms(),
        }
    }
}

/// Defaults applied by [`HeatmapTileProvider::builder`](crate::heatmap::HeatmapTileProvider::builder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeatmapConfig {
    #[serde(default = "HeatmapConfig::default_radius")]
    pub radius: u32,

    #[serde(default = "HeatmapConfig::default_opacity")]
    pub opacity: f64,

    /// Zero means "derive from the data".
    #[serde(default)]
    pub max_intensity: f64,
}

impl HeatmapConfig {
    const fn default_radius() -> u32 {
        DEFAULT_RADIUS
    }

    const fn default_opacity() -> f64 {
        DEFAULT_OPACITY
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_RADIUS..=MAX_RADIUS).contains(&self.radius) {
            return Err(GeoclusterError::InvalidConfig(format!(
                "heat map radius {} outside [{}, {}]",
                self.radius, MIN_RADIUS, MAX_RADIUS
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(GeoclusterError::InvalidConfig(format!(
                "heat map opacity {} outside [0, 1]",
                self.opacity
            )));
        }
        if !self.max_intensity.is_finite() || self.max_intensity < 0.0 {
            return Err(GeoclusterError::InvalidConfig(format!(
                "heat map max intensity must be finite and non-negative, got {}",
                self.max_intensity
            )));
        }
        Ok(())
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            radius: Self::default_radius(),
            opacity: Self::default_opacity(),
            max_intensity: 0.0,
        }
    }
}

impl Config {
    pub fn with_algorithm(mut self, algorithm: AlgorithmKind) -> Self {
        self.clustering.algorithm = algorithm;
        self
    }

    pub fn with_max_distance(mut self, max_distance: u32) -> Self {
        self.clustering.max_distance = max_distance;
        self
    }

    pub fn with_viewport(mut self, viewport: ViewportSize) -> Self {
        self.clustering.viewport = viewport;
        self
    }

    pub fn with_precache(mut self, precache: PrecacheConfig) -> Self {
        self.precache = precache;
        self
    }

    pub fn with_animation(mut self, animation: AnimationConfig) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_heatmap(mut self, heatmap: HeatmapConfig) -> Self {
        self.heatmap = heatmap;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.clustering.max_distance == 0 {
            return Err(GeoclusterError::InvalidConfig(
                "max distance between clustered items must be greater than zero".to_string(),
            ));
        }
        self.precache.validate()?;
        self.animation.validate()?;
        self.heatmap.validate()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.clustering.algorithm, AlgorithmKind::Distance);
        assert_eq!(config.clustering.max_distance, 100);
        assert_eq!(config.precache.capacity, 5);
        assert_eq!(config.precache.min_delay(), Duration::from_millis(500));
        assert_eq!(config.precache.max_delay(), Duration::from_millis(1000));
        assert_eq!(config.animation.zoom_in_duration_ms, 300);
        assert_eq!(config.animation.zoom_out_easing, Easing::Decelerate);
        assert_eq!(config.heatmap.radius, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_algorithm(AlgorithmKind::Grid)
            .with_max_distance(64)
            .with_precache(PrecacheConfig::default().with_capacity(3).with_delay_ms(10, 20));

        let json = config.to_json().unwrap();
        let deserialized = Config::from_json(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().with_max_distance(0).validate().is_err());
        assert!(
            Config::default()
                .with_precache(PrecacheConfig::default().with_delay_ms(20, 10))
                .validate()
                .is_err()
        );
        assert!(
            Config::default()
                .with_precache(PrecacheConfig::default().with_capacity(0))
                .validate()
                .is_err()
        );

        let heatmap = HeatmapConfig {
            radius: 5,
            ..HeatmapConfig::default()
        };
        let err = Config::default().with_heatmap(heatmap).validate().unwrap_err();
        assert!(matches!(err, GeoclusterError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = Config::from_json(r#"{ "clustering": { "max_distnce": 80 } }"#);
        assert!(matches!(result, Err(GeoclusterError::Serialization(_))));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(
            r#"
            [clustering]
            algorithm = "view_based"

            [heatmap]
            radius = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.clustering.algorithm, AlgorithmKind::ViewBased);
        assert_eq!(config.heatmap.radius, 30);
    }
}
