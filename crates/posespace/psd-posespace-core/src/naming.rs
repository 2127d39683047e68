//! Derived node names and the left/right mirror convention.

use serde::{Deserialize, Serialize};

use crate::config::ManagerConfig;

/// Names of the engine nodes the manager creates for drivers and driven
/// targets.
#[derive(Debug, Clone, Copy)]
pub struct NodeNaming<'a> {
    config: &'a ManagerConfig,
}

impl<'a> NodeNaming<'a> {
    pub fn new(config: &'a ManagerConfig) -> Self {
        Self { config }
    }

    pub fn container(&self) -> &'a str {
        &self.config.container
    }

    pub fn solver(&self, driver: &str) -> String {
        format!("{driver}{}", self.config.solver_suffix)
    }

    pub fn blend(&self, driven: &str) -> String {
        format!("{driven}{}", self.config.blend_suffix)
    }

    pub fn proxy(&self, driven: &str) -> String {
        format!("{driven}{}", self.config.proxy_suffix)
    }
}

/// Side tokens used to find a node's counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConvention {
    pub left: String,
    pub right: String,
}

impl Default for MirrorConvention {
    fn default() -> Self {
        Self::new("_L", "_R")
    }
}

impl MirrorConvention {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Direction to mirror `name` in. The left token takes precedence when a
    /// name carries both.
    pub fn mapping_for(&self, name: &str) -> Option<MirrorMapping<'_>> {
        if !self.left.is_empty() && name.contains(&self.left) {
            Some(MirrorMapping {
                from: &self.left,
                to: &self.right,
            })
        } else if !self.right.is_empty() && name.contains(&self.right) {
            Some(MirrorMapping {
                from: &self.right,
                to: &self.left,
            })
        } else {
            None
        }
    }

    pub fn mirror_name(&self, name: &str) -> Option<String> {
        self.mapping_for(name).map(|m| m.apply(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorMapping<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

impl MirrorMapping<'_> {
    /// Replace every occurrence of the source token.
    pub fn apply(&self, name: &str) -> String {
        name.replace(self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_use_configured_suffixes() {
        let config = ManagerConfig::default();
        let naming = NodeNaming::new(&config);
        assert_eq!(naming.solver("jaw"), "jaw_pmInterpolator");
        assert_eq!(naming.blend("chin"), "chin_bm");
        assert_eq!(naming.proxy("chin"), "chin_pm");
        assert_eq!(naming.container(), "pose_manager");
    }

    #[test]
    fn left_token_wins_when_both_present() {
        let conv = MirrorConvention::default();
        let m = conv.mapping_for("lip_L_R").unwrap();
        assert_eq!(m.from, "_L");
        assert_eq!(m.apply("lip_L_R"), "lip_R_R");
        assert_eq!(conv.mirror_name("brow_R").as_deref(), Some("brow_L"));
        assert_eq!(conv.mirror_name("chin"), None);
    }

    #[test]
    fn prefix_tokens_replace_every_occurrence() {
        let conv = MirrorConvention::new("L_", "R_");
        assert_eq!(conv.mirror_name("L_brow").as_deref(), Some("R_brow"));
        assert_eq!(conv.mirror_name("L_brow_L_tip").as_deref(), Some("R_brow_R_tip"));
    }
}
