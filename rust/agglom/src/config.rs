// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Agglomeration and cleanup parameters.
//!
//! All angles are in degrees. Length and area tolerances are relative to the
//! grid's own scale so one configuration serves small and large models.
//! Defaults are starting points, not calibrated constants; every value can be
//! overridden through the `with_*` builders or by deserializing a partial
//! JSON object (missing fields fall back to the defaults).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the merge engine decides whether to fuse two loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Rank by predicted quad quality and enforce the angle thresholds.
    #[default]
    QualityAware,
    /// Accept any convex, coplanar merge in front order. Kept as a fallback.
    Legacy,
}

/// Which coarse-mesh assembly path the driver takes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMode {
    /// Merges must produce quadrilaterals; unpaired loops are kept as they are.
    #[default]
    Quad,
    /// A second pass may also fuse leftover loops into merged triangles.
    Mixed,
}

/// Which measure flags a triangle as high-aspect-ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatioMetric {
    /// Longest edge over shortest edge.
    #[default]
    EdgeLength,
    /// Circumradius over twice the inradius (1 for an equilateral triangle).
    RadiusRatio,
}

/// Parameters for one agglomeration or simplification run.
///
/// # Example
///
/// ```
/// use vortex_agglom::{AgglomConfig, MergePolicy};
///
/// let config = AgglomConfig::default()
///     .with_quad_angles(20.0, 40.0)
///     .with_merge_policy(MergePolicy::QualityAware);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgglomConfig {
    /// Quads whose worst corner deviates from 90 degrees by at most this much
    /// are accepted without comparison. Default: `30`
    pub good_quad_angle: f64,
    /// Quads deviating by more than this are always rejected. Default: `50`
    pub worst_quad_angle: f64,
    /// Largest angle between two loop normals for them to be merged. Default: `20`
    pub coplanar_angle: f64,
    /// Two edges (or a polygon vertex) within this many degrees of straight
    /// count as colinear. Default: `5`
    pub colinear_angle: f64,
    /// Largest interior corner angle a merged loop may have. Default: `175`
    pub convex_max_angle: f64,
    /// Border turning angle above which a node is a CORNER. Default: `30`
    pub corner_angle: f64,
    /// Weld distance as a fraction of the bounding-box diagonal. Default: `1e-8`
    pub duplicate_tolerance: f64,
    /// Loops smaller than this fraction of their neighbors' mean area are
    /// removed. Default: `1e-3`
    pub small_area_ratio: f64,
    /// Triangles above this aspect ratio are repaired. Default: `20`
    pub max_aspect_ratio: f64,
    /// Smallest triangle angle before it counts as a needle. Default: `3`
    pub bad_triangle_min_angle: f64,
    /// Shortest triangle edge, relative to its longest, before it counts as a
    /// needle. Default: `1e-3`
    pub bad_triangle_min_edge_ratio: f64,
    /// Smallest number of triangles around an interior node that forms a
    /// fan worth simplifying. Default: `7`
    pub fan_min_triangles: usize,
    /// Upper bound on full cleanup rounds in `simplify_mesh`. Default: `8`
    pub max_cleanup_rounds: usize,
    pub merge_policy: MergePolicy,
    pub assembly_mode: AssemblyMode,
    pub aspect_ratio_metric: AspectRatioMetric,
}

impl Default for AgglomConfig {
    fn default() -> Self {
        Self {
            good_quad_angle: 30.0,
            worst_quad_angle: 50.0,
            coplanar_angle: 20.0,
            colinear_angle: 5.0,
            convex_max_angle: 175.0,
            corner_angle: vortex_grid::DEFAULT_CORNER_ANGLE,
            duplicate_tolerance: 1e-8,
            small_area_ratio: 1e-3,
            max_aspect_ratio: 20.0,
            bad_triangle_min_angle: 3.0,
            bad_triangle_min_edge_ratio: 1e-3,
            fan_min_triangles: 7,
            max_cleanup_rounds: 8,
            merge_policy: MergePolicy::default(),
            assembly_mode: AssemblyMode::default(),
            aspect_ratio_metric: AspectRatioMetric::default(),
        }
    }
}

impl AgglomConfig {
    /// Set the accept-at-once and always-reject quad angle thresholds.
    #[must_use]
    pub fn with_quad_angles(mut self, good: f64, worst: f64) -> Self {
        self.good_quad_angle = good;
        self.worst_quad_angle = worst;
        self
    }

    /// Set the coplanarity limit.
    #[must_use]
    pub fn with_coplanar_angle(mut self, angle: f64) -> Self {
        self.coplanar_angle = angle;
        self
    }

    /// Set the colinearity tolerance.
    #[must_use]
    pub fn with_colinear_angle(mut self, angle: f64) -> Self {
        self.colinear_angle = angle;
        self
    }

    #[must_use]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    #[must_use]
    pub fn with_assembly_mode(mut self, mode: AssemblyMode) -> Self {
        self.assembly_mode = mode;
        self
    }

    #[must_use]
    pub fn with_aspect_ratio_metric(mut self, metric: AspectRatioMetric) -> Self {
        self.aspect_ratio_metric = metric;
        self
    }

    /// Set the aspect ratio above which triangles are repaired.
    #[must_use]
    pub fn with_max_aspect_ratio(mut self, ratio: f64) -> Self {
        self.max_aspect_ratio = ratio;
        self
    }

    /// Set the small-loop area ratio.
    #[must_use]
    pub fn with_small_area_ratio(mut self, ratio: f64) -> Self {
        self.small_area_ratio = ratio;
        self
    }

    /// Set the fan size threshold.
    #[must_use]
    pub fn with_fan_min_triangles(mut self, count: usize) -> Self {
        self.fan_min_triangles = count;
        self
    }

    /// Checks that the parameters are mutually consistent.
    pub fn validate(&self) -> Result<()> {
        let angle = |name: &str, value: f64, lo: f64, hi: f64| {
            if value.is_finite() && (lo..=hi).contains(&value) {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!(
                    "{name} = {value} is outside [{lo}, {hi}]"
                )))
            }
        };
        angle("good_quad_angle", self.good_quad_angle, 0.0, 90.0)?;
        angle("worst_quad_angle", self.worst_quad_angle, 0.0, 90.0)?;
        angle("coplanar_angle", self.coplanar_angle, 0.0, 180.0)?;
        angle("colinear_angle", self.colinear_angle, 0.0, 45.0)?;
        angle("convex_max_angle", self.convex_max_angle, 90.0, 180.0)?;
        angle("corner_angle", self.corner_angle, 0.0, 180.0)?;
        angle("bad_triangle_min_angle", self.bad_triangle_min_angle, 0.0, 60.0)?;

        if self.good_quad_angle > self.worst_quad_angle {
            return Err(Error::InvalidConfig(format!(
                "good_quad_angle ({}) exceeds worst_quad_angle ({})",
                self.good_quad_angle, self.worst_quad_angle
            )));
        }
        for (name, value) in [
            ("duplicate_tolerance", self.duplicate_tolerance),
            ("small_area_ratio", self.small_area_ratio),
            ("bad_triangle_min_edge_ratio", self.bad_triangle_min_edge_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be >= 0, got {value}")));
            }
        }
        if !(self.max_aspect_ratio >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_aspect_ratio must be >= 1, got {}",
                self.max_aspect_ratio
            )));
        }
        if self.fan_min_triangles < 3 {
            return Err(Error::InvalidConfig("fan_min_triangles must be >= 3".into()));
        }
        if self.max_cleanup_rounds == 0 {
            return Err(Error::InvalidConfig("max_cleanup_rounds must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AgglomConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.merge_policy, MergePolicy::QualityAware);
        assert_eq!(config.assembly_mode, AssemblyMode::Quad);
    }

    #[test]
    fn inverted_quad_angles_are_rejected() {
        let config = AgglomConfig::default().with_quad_angles(60.0, 40.0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = AgglomConfig::default().with_colinear_angle(f64::NAN);
        assert!(config.validate().is_err());

        config = AgglomConfig::default().with_max_aspect_ratio(0.5);
        assert!(config.validate().is_err());

        config = AgglomConfig::default().with_fan_min_triangles(2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AgglomConfig =
            serde_json::from_str(r#"{ "worst_quad_angle": 45.0, "merge_policy": "legacy" }"#)
                .unwrap();
        assert_eq!(config.worst_quad_angle, 45.0);
        assert_eq!(config.merge_policy, MergePolicy::Legacy);
        assert_eq!(config.good_quad_angle, 30.0);
        assert!(config.validate().is_ok());
    }
}
