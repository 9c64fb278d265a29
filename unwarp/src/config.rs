//! Configuration types for calibration.
//!
//! All tunables of the grid search, point propagation and resampling live
//! here. Each struct validates its own ranges with `assert!`; runtime inputs
//! (row counts, margins, point sets) are checked by the operations and
//! reported as errors instead.

use serde::{Deserialize, Serialize};

// =============================================================================
// Interpolation configuration
// =============================================================================

/// Interpolation used when resampling the unwarped image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Bilinear interpolation (order 1).
    #[default]
    Bilinear,
    /// Catmull-Rom bicubic interpolation (order 3). Smoother, may ring at dot edges.
    Bicubic,
}

// =============================================================================
// Margin search configuration
// =============================================================================

/// Bounds for the linear margin search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginSearchConfig {
    /// Margin increment per iteration.
    pub step: f64,
    /// Maximum number of steps before giving up.
    pub max_iterations: usize,
    /// Smallest margin the search may try.
    pub min_margin: f64,
    /// Largest margin the search may try. Must stay below 0.5.
    pub max_margin: f64,
}

impl Default for MarginSearchConfig {
    fn default() -> Self {
        Self {
            step: 0.005,
            max_iterations: 200,
            min_margin: 0.0,
            max_margin: 0.495,
        }
    }
}

impl MarginSearchConfig {
    pub fn validate(&self) {
        assert!(
            self.step > 0.0 && self.step < 0.5,
            "margin step must be in (0, 0.5), got {}",
            self.step
        );
        assert!(
            self.max_iterations > 0,
            "margin max_iterations must be positive, got {}",
            self.max_iterations
        );
        assert!(
            self.min_margin >= 0.0 && self.min_margin < self.max_margin,
            "min_margin must be in [0, max_margin), got {}",
            self.min_margin
        );
        assert!(
            self.max_margin < 0.5,
            "max_margin must be below 0.5, got {}",
            self.max_margin
        );
    }
}

// =============================================================================
// Propagation configuration
// =============================================================================

/// Settings for carrying points through a depth stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Windows are registered to within `1 / upsample_factor` of a pixel.
    /// 250 is precise enough without slowing propagation down too much.
    pub upsample_factor: usize,
    /// Correlation box half width is the median dot spacing divided by this.
    /// Smaller divisors give larger windows but let neighbouring dots in.
    pub spacing_divisor: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            upsample_factor: 250,
            spacing_divisor: 4.0,
        }
    }
}

impl PropagationConfig {
    pub fn validate(&self) {
        assert!(
            self.upsample_factor >= 1,
            "upsample_factor must be at least 1, got {}",
            self.upsample_factor
        );
        assert!(
            self.spacing_divisor >= 2.0,
            "spacing_divisor must be at least 2 so windows stay within one dot pitch, got {}",
            self.spacing_divisor
        );
    }
}

// =============================================================================
// Top-level configuration
// =============================================================================

/// Complete calibration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub interpolation: InterpolationMethod,
    pub margin_search: MarginSearchConfig,
    pub propagation: PropagationConfig,
}

impl Config {
    /// Coarser search and registration for quick previews.
    pub fn fast() -> Self {
        Self {
            interpolation: InterpolationMethod::Bilinear,
            margin_search: MarginSearchConfig {
                step: 0.01,
                ..Default::default()
            },
            propagation: PropagationConfig {
                upsample_factor: 20,
                ..Default::default()
            },
        }
    }

    pub fn validate(&self) {
        self.margin_search.validate();
        self.propagation.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate();
        Config::fast().validate();
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.interpolation, InterpolationMethod::Bilinear);
        assert_eq!(config.margin_search.step, 0.005);
        assert_eq!(config.propagation.upsample_factor, 250);
        assert_eq!(config.propagation.spacing_divisor, 4.0);
    }

    #[test]
    #[should_panic(expected = "max_margin must be below 0.5")]
    fn test_max_margin_at_half_rejected() {
        MarginSearchConfig {
            max_margin: 0.5,
            ..Default::default()
        }
        .validate();
    }

    #[test]
    #[should_panic(expected = "margin step must be in (0, 0.5)")]
    fn test_zero_step_rejected() {
        MarginSearchConfig {
            step: 0.0,
            ..Default::default()
        }
        .validate();
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "margin_search": { "step": 0.01 }, "interpolation": "Bicubic" }"#)
                .unwrap();
        assert_eq!(config.interpolation, InterpolationMethod::Bicubic);
        assert_eq!(config.margin_search.step, 0.01);
        assert_eq!(config.margin_search.max_iterations, 200);
        assert_eq!(config.propagation.upsample_factor, 250);
    }
}
