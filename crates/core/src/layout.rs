//! Layout metrics for breakdown panels

use crate::data::Dimension;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Share of the dashboard width given to each breakdown panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Total display width in pixels
    pub available_width: f64,
    pub platform_share: f64,
    pub priority_share: f64,
    pub category_share: f64,
    /// Left offset of the panels as a fraction of the width
    pub margin_share: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            available_width: 1280.0,
            platform_share: 0.3,
            priority_share: 0.3,
            category_share: 0.3,
            margin_share: 0.025,
        }
    }
}

impl LayoutConfig {
    pub fn share(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Platform => self.platform_share,
            Dimension::Priority => self.priority_share,
            Dimension::Category => self.category_share,
        }
    }

    /// Width of each item in the panel for `dimension`
    pub fn item_width(&self, dimension: Dimension, cardinality: usize) -> f64 {
        item_width(cardinality, self.available_width, self.share(dimension))
    }

    /// Panel offset in pixels
    pub fn margin(&self) -> f64 {
        self.available_width * self.margin_share
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.available_width.is_finite() && self.available_width > 0.0) {
            return Err(Error::ConfigError(format!(
                "available width must be positive, got {}",
                self.available_width
            )));
        }

        let shares = Dimension::ALL
            .iter()
            .map(|d| (d.as_str(), self.share(*d)))
            .chain(std::iter::once(("margin", self.margin_share)));
        for (name, share) in shares {
            if !(0.0..=1.0).contains(&share) {
                return Err(Error::ConfigError(format!(
                    "{} share must be within 0..=1, got {}",
                    name, share
                )));
            }
        }

        Ok(())
    }
}

/// Per-item width `width * share / cardinality`; 0 when there is nothing to lay out
pub fn item_width(cardinality: usize, width: f64, share: f64) -> f64 {
    if cardinality == 0 {
        return 0.0;
    }
    let item = width * share / cardinality as f64;
    if item.is_finite() && item > 0.0 {
        item
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_width() {
        assert_eq!(item_width(4, 1000.0, 0.3), 75.0);
        assert_eq!(item_width(1, 1000.0, 0.5), 500.0);
    }

    #[test]
    fn test_zero_cardinality() {
        assert_eq!(item_width(0, 1000.0, 0.3), 0.0);
    }

    #[test]
    fn test_bad_inputs_clamp_to_zero() {
        assert_eq!(item_width(3, -100.0, 0.3), 0.0);
        assert_eq!(item_width(3, f64::NAN, 0.3), 0.0);
        assert_eq!(item_width(3, f64::INFINITY, 0.3), 0.0);
    }

    #[test]
    fn test_per_dimension_shares() {
        let config = LayoutConfig {
            available_width: 1000.0,
            platform_share: 0.5,
            priority_share: 0.25,
            ..Default::default()
        };

        assert_eq!(config.item_width(Dimension::Platform, 5), 100.0);
        assert_eq!(config.item_width(Dimension::Priority, 5), 50.0);
        assert_eq!(config.margin(), 25.0);
    }

    #[test]
    fn test_validate() {
        assert!(LayoutConfig::default().validate().is_ok());

        let wide = LayoutConfig {
            category_share: 1.5,
            ..Default::default()
        };
        assert!(matches!(wide.validate(), Err(Error::ConfigError(_))));

        let narrow = LayoutConfig {
            available_width: 0.0,
            ..Default::default()
        };
        assert!(narrow.validate().is_err());
    }
}
