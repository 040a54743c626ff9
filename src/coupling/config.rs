//! Coupling configuration of one patch: what to sample, where, and from which
//! displaced points.
//!
//! [`SampleDict`] is the settings record exactly as read or written;
//! [`SampleConfig`] is the validated, immutable form the engine works with.

use crate::geometry::surface::ProjectionSurface;
use crate::geometry::vector::Vec3;
use crate::mesh_error::MeshCouplingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a sample point is matched against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SampleMode {
    /// Cell of the target region containing the point.
    NearestCell,
    /// Nearest face centre of the target patch.
    NearestPatchFace,
    /// Target patch faces, coupled by area-weighted interpolation.
    NearestPatchFaceAMI,
    /// Target patch faces, coupled by direct face intersection.
    PatchToPatch,
    /// Nearest boundary face of the target region, any patch.
    NearestFace,
}

impl SampleMode {
    /// Dictionary names, in declaration order.
    pub const NAMES: [(SampleMode, &'static str); 5] = [
        (SampleMode::NearestCell, "nearestCell"),
        (SampleMode::NearestPatchFace, "nearestPatchFace"),
        (SampleMode::NearestPatchFaceAMI, "nearestPatchFaceAMI"),
        (SampleMode::PatchToPatch, "patchToPatch"),
        (SampleMode::NearestFace, "nearestFace"),
    ];

    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize].1
    }

    /// Modes that sample a single named patch of the target region.
    pub fn samples_patch(self) -> bool {
        matches!(
            self,
            SampleMode::NearestPatchFace | SampleMode::NearestPatchFaceAMI | SampleMode::PatchToPatch
        )
    }
}

impl fmt::Display for SampleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == s)
            .map(|(m, _)| *m)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::NAMES.iter().map(|(_, n)| *n).collect();
                format!("unknown sampleMode `{s}`, expected one of {names:?}")
            })
    }
}

/// Displacement vector(s) for [`OffsetMode::Direction`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Offset {
    /// Same vector for every face.
    Uniform(Vec3),
    /// One vector per local patch face.
    PerFace(Vec<Vec3>),
}

/// How face centres are displaced into sample points.
#[derive(Clone, Debug, PartialEq)]
pub enum OffsetMode {
    None,
    /// Signed distance along the outward unit normal.
    Normal(f64),
    Direction(Offset),
}

impl OffsetMode {
    pub const NAMES: [&'static str; 3] = ["none", "normal", "direction"];

    pub fn name(&self) -> &'static str {
        match self {
            OffsetMode::None => "none",
            OffsetMode::Normal(_) => "normal",
            OffsetMode::Direction(_) => "direction",
        }
    }
}

/// One coupling record as it appears in the settings source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SampleDict {
    pub sample_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub couple_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<ProjectionSurface>,
    #[serde(rename = "AMIReverse", default, skip_serializing_if = "Option::is_none")]
    pub ami_reverse: Option<bool>,
}

/// Validated coupling configuration. Immutable once built.
///
/// The target may be named directly (`sample_region`, `sample_patch`) or
/// through a couple group; which one is usable is only checked when the
/// target is first resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleConfig {
    mode: SampleMode,
    sample_region: String,
    sample_patch: String,
    couple_group: Option<String>,
    offset: OffsetMode,
    ami_reverse: bool,
    surface: Option<ProjectionSurface>,
}

impl SampleConfig {
    /// Configuration with no target and no offset.
    pub fn new(mode: SampleMode) -> Self {
        Self {
            mode,
            sample_region: String::new(),
            sample_patch: String::new(),
            couple_group: None,
            offset: OffsetMode::None,
            ami_reverse: false,
            surface: None,
        }
    }

    pub fn with_target(mut self, region: impl Into<String>, patch: impl Into<String>) -> Self {
        self.sample_region = region.into();
        self.sample_patch = patch.into();
        self
    }

    pub fn with_couple_group(mut self, group: impl Into<String>) -> Self {
        self.couple_group = Some(group.into());
        self
    }

    pub fn with_offset(mut self, offset: OffsetMode) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_ami_reverse(mut self, reverse: bool) -> Self {
        self.ami_reverse = reverse;
        self
    }

    pub fn with_surface(mut self, surface: ProjectionSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Parse and validate a settings record for patch `patch` of `region`.
    pub fn from_dict(region: &str, patch: &str, dict: &SampleDict) -> Result<Self, MeshCouplingError> {
        let err = |reason: String| MeshCouplingError::config(patch, region, reason);

        let mode: SampleMode = dict.sample_mode.parse().map_err(err)?;
        let offset = match dict.offset_mode.as_deref().unwrap_or("none") {
            "none" => OffsetMode::None,
            "normal" => OffsetMode::Normal(
                dict.distance
                    .ok_or_else(|| err("offsetMode `normal` requires `distance`".into()))?,
            ),
            "direction" => OffsetMode::Direction(
                dict.offset
                    .clone()
                    .ok_or_else(|| err("offsetMode `direction` requires `offset`".into()))?,
            ),
            other => {
                return Err(err(format!(
                    "unknown offsetMode `{other}`, expected one of {:?}",
                    OffsetMode::NAMES
                )));
            }
        };
        if dict.distance.is_some() && !matches!(offset, OffsetMode::Normal(_)) {
            return Err(err("`distance` is only used with offsetMode `normal`".into()));
        }
        if dict.offset.is_some() && !matches!(offset, OffsetMode::Direction(_)) {
            return Err(err("`offset` is only used with offsetMode `direction`".into()));
        }

        let config = Self {
            mode,
            sample_region: dict.sample_region.clone().unwrap_or_default(),
            sample_patch: dict.sample_patch.clone().unwrap_or_default(),
            couple_group: dict.couple_group.clone().filter(|g| !g.is_empty()),
            offset,
            ami_reverse: dict.ami_reverse.unwrap_or(false),
            surface: dict.surface.clone(),
        };
        config.validate(region, patch)?;
        Ok(config)
    }

    /// Mode-specific consistency checks.
    pub fn validate(&self, region: &str, patch: &str) -> Result<(), MeshCouplingError> {
        let err = |reason: String| MeshCouplingError::config(patch, region, reason);
        let ami = self.mode == SampleMode::NearestPatchFaceAMI;
        if let Some(surface) = &self.surface {
            if !ami {
                return Err(err(format!(
                    "a projection `surface` is only used by sampleMode `nearestPatchFaceAMI`, not `{}`",
                    self.mode
                )));
            }
            surface.validate().map_err(|e| err(e.to_string()))?;
        }
        if self.ami_reverse && !ami {
            return Err(err(format!(
                "`AMIReverse` is only used by sampleMode `nearestPatchFaceAMI`, not `{}`",
                self.mode
            )));
        }
        if let OffsetMode::Normal(d) = self.offset {
            if !d.is_finite() {
                return Err(err(format!("offset distance must be finite, got {d}")));
            }
        }
        Ok(())
    }

    /// Settings record holding this configuration; feeding it back to
    /// [`from_dict`](Self::from_dict) yields an equal configuration.
    pub fn to_dict(&self) -> SampleDict {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());
        let (distance, offset) = match &self.offset {
            OffsetMode::None => (None, None),
            OffsetMode::Normal(d) => (Some(*d), None),
            OffsetMode::Direction(o) => (None, Some(o.clone())),
        };
        SampleDict {
            sample_mode: self.mode.name().to_owned(),
            sample_region: non_empty(&self.sample_region),
            sample_patch: non_empty(&self.sample_patch),
            couple_group: self.couple_group.clone(),
            offset_mode: Some(self.offset.name().to_owned()),
            distance,
            offset,
            surface: self.surface.clone(),
            ami_reverse: self.ami_reverse.then_some(true),
        }
    }

    pub fn mode(&self) -> SampleMode {
        self.mode
    }

    /// Explicit target region; empty when the target comes from a couple group.
    pub fn sample_region(&self) -> &str {
        &self.sample_region
    }

    /// Explicit target patch; may be empty.
    pub fn sample_patch(&self) -> &str {
        &self.sample_patch
    }

    pub fn couple_group(&self) -> Option<&str> {
        self.couple_group.as_deref()
    }

    pub fn offset(&self) -> &OffsetMode {
        &self.offset
    }

    pub fn ami_reverse(&self) -> bool {
        self.ami_reverse
    }

    pub fn surface(&self) -> Option<&ProjectionSurface> {
        self.surface.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(mode: &str) -> SampleDict {
        SampleDict {
            sample_mode: mode.into(),
            ..Default::default()
        }
    }

    #[test]
    fn mode_names_roundtrip() {
        for (mode, name) in SampleMode::NAMES {
            assert_eq!(name.parse::<SampleMode>().unwrap(), mode);
            assert_eq!(mode.to_string(), name);
        }
        assert!("nearestVertex".parse::<SampleMode>().is_err());
    }

    #[test]
    fn normal_offset_requires_distance() {
        let mut d = dict("nearestCell");
        d.offset_mode = Some("normal".into());
        let err = SampleConfig::from_dict("fluid", "wall", &d).unwrap_err();
        match err {
            MeshCouplingError::Config { patch, region, reason } => {
                assert_eq!((patch.as_str(), region.as_str()), ("wall", "fluid"));
                assert!(reason.contains("distance"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        d.distance = Some(-0.5);
        let cfg = SampleConfig::from_dict("fluid", "wall", &d).unwrap();
        assert_eq!(cfg.offset(), &OffsetMode::Normal(-0.5));
    }

    #[test]
    fn surface_outside_ami_is_rejected() {
        let mut d = dict("nearestPatchFace");
        d.surface = Some(ProjectionSurface::Plane {
            point: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
        });
        assert!(SampleConfig::from_dict("r", "p", &d).is_err());
        d.sample_mode = "nearestPatchFaceAMI".into();
        assert!(SampleConfig::from_dict("r", "p", &d).is_ok());
    }

    #[test]
    fn to_dict_roundtrip() {
        let cfg = SampleConfig::new(SampleMode::NearestPatchFaceAMI)
            .with_couple_group("baffle")
            .with_offset(OffsetMode::Direction(Offset::Uniform([0.0, 0.0, 0.1])))
            .with_ami_reverse(true);
        let again = SampleConfig::from_dict("r", "p", &cfg.to_dict()).unwrap();
        assert_eq!(again, cfg);
    }
}
