use psd_engine_core::{Interpolation, PoseType};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::naming::{MirrorConvention, NodeNaming};

/// Manager-wide naming and solver settings.
///
/// Every field has a default, so a host config only needs to list what it
/// changes:
///
/// ```
/// use psd_posespace::ManagerConfig;
///
/// let cfg = ManagerConfig::from_json_str(r#"{ "mirror": { "left": "L_", "right": "R_" } }"#)
///     .unwrap();
/// assert_eq!(cfg.mirror.left, "L_");
/// assert_eq!(cfg.container, "pose_manager");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Top-level scope every solver is parented under.
    pub container: String,
    pub solver_suffix: String,
    pub blend_suffix: String,
    pub proxy_suffix: String,
    pub mirror: MirrorConvention,
    /// Applied to every solver the manager creates.
    pub interpolation: Interpolation,
    /// Applied to every pose the manager adds.
    pub pose_type: PoseType,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            container: "pose_manager".to_string(),
            solver_suffix: "_pmInterpolator".to_string(),
            blend_suffix: "_bm".to_string(),
            proxy_suffix: "_pm".to_string(),
            mirror: MirrorConvention::default(),
            interpolation: Interpolation::Gaussian,
            pose_type: PoseType::Swing,
        }
    }
}

impl ManagerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_mirror(mut self, mirror: MirrorConvention) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn naming(&self) -> NodeNaming<'_> {
        NodeNaming::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let cfg = ManagerConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ManagerConfig::default());
        assert_eq!(cfg.pose_type, PoseType::Swing);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = ManagerConfig::from_json_str(r#"{ "blend_suffix": "_blend" }"#).unwrap();
        assert_eq!(cfg.blend_suffix, "_blend");
        assert_eq!(cfg.proxy_suffix, "_pm");
        assert_eq!(cfg.mirror, MirrorConvention::default());
    }

    #[test]
    fn malformed_config_is_a_json_error() {
        let err = ManagerConfig::from_json_str("{ container: 1 }").unwrap_err();
        assert!(matches!(err, crate::PoseSpaceError::Json(_)));
    }
}
