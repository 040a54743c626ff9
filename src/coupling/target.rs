//! Resolution of the sampled region and patch.
//!
//! An explicit `sampleRegion` wins. Without one, the couple group must name
//! exactly one other patch, anywhere in the registry; that patch fixes both
//! the region and the patch.

use crate::coupling::config::SampleConfig;
use crate::mesh::registry::RegionRegistry;
use crate::mesh_error::MeshCouplingError;
use log::info;

/// Target of a coupled patch, computed once and cached until `clear_out`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub region: String,
    /// Empty for modes that do not sample a patch and were given none.
    pub patch: String,
    pub is_same_region: bool,
}

/// Resolve the target of patch `patch` of region `region`.
pub fn resolve_target(
    regions: &RegionRegistry,
    region: &str,
    patch: &str,
    config: &SampleConfig,
) -> Result<ResolvedTarget, MeshCouplingError> {
    let err = |reason: String| MeshCouplingError::config(patch, region, reason);
    let needs_patch = config.mode().samples_patch();

    let (target_region, target_patch) = if !config.sample_region().is_empty() {
        let target_region = config.sample_region();
        if !regions.contains(target_region) {
            return Err(err(format!("sampleRegion `{target_region}` does not exist")));
        }
        let target_patch = if config.sample_patch().is_empty() && needs_patch {
            let group = config.couple_group().ok_or_else(|| {
                err(format!(
                    "sampleMode `{}` needs a samplePatch or a coupleGroup",
                    config.mode()
                ))
            })?;
            let candidates: Vec<String> = regions
                .patches_in_group(group)
                .filter(|(m, p)| m.name() == target_region && !(m.name() == region && p.name() == patch))
                .map(|(_, p)| p.name().to_owned())
                .collect();
            match candidates.as_slice() {
                [only] => only.clone(),
                [] => {
                    return Err(err(format!(
                        "no patch of region `{target_region}` is in coupleGroup `{group}`"
                    )));
                }
                many => {
                    return Err(err(format!(
                        "coupleGroup `{group}` is ambiguous in region `{target_region}`: {many:?}"
                    )));
                }
            }
        } else {
            config.sample_patch().to_owned()
        };
        (target_region.to_owned(), target_patch)
    } else {
        let group = config.couple_group().ok_or_else(|| {
            err("neither sampleRegion nor coupleGroup is given".to_owned())
        })?;
        let candidates: Vec<(String, String)> = regions
            .patches_in_group(group)
            .filter(|(m, p)| !(m.name() == region && p.name() == patch))
            .map(|(m, p)| (m.name().to_owned(), p.name().to_owned()))
            .collect();
        match candidates.as_slice() {
            [(r, p)] => {
                info!("patch `{patch}` of region `{region}`: coupleGroup `{group}` resolves to patch `{p}` of region `{r}`");
                (r.clone(), p.clone())
            }
            [] => {
                return Err(err(format!("no other patch is in coupleGroup `{group}`")));
            }
            many => {
                let names: Vec<String> = many.iter().map(|(r, p)| format!("{r}/{p}")).collect();
                return Err(err(format!(
                    "coupleGroup `{group}` must name exactly one other patch, found {}: {}",
                    names.len(),
                    names.join(", ")
                )));
            }
        }
    };

    if needs_patch {
        if target_patch.is_empty() {
            return Err(err(format!(
                "sampleMode `{}` needs a samplePatch",
                config.mode()
            )));
        }
        regions
            .get_patch(&target_region, &target_patch)
            .map_err(|e| err(e.to_string()))?;
    }

    Ok(ResolvedTarget {
        is_same_region: target_region == region,
        region: target_region,
        patch: target_patch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::config::SampleMode;
    use crate::mesh::block::{BlockMesh, Side};

    fn registry() -> RegionRegistry {
        RegionRegistry::new()
            .with(
                BlockMesh::new("solid", [0.0; 3], [1.0; 3], [1, 1, 1])
                    .with_group(Side::ZMax, "interface")
                    .build()
                    .unwrap(),
            )
            .unwrap()
            .with(
                BlockMesh::new("fluid", [0.0, 0.0, 1.0], [1.0; 3], [1, 1, 1])
                    .with_group(Side::ZMin, "interface")
                    .build()
                    .unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn couple_group_finds_partner() {
        let cfg = SampleConfig::new(SampleMode::NearestPatchFace).with_couple_group("interface");
        let t = resolve_target(&registry(), "solid", "zMax", &cfg).unwrap();
        assert_eq!(
            t,
            ResolvedTarget {
                region: "fluid".into(),
                patch: "zMin".into(),
                is_same_region: false
            }
        );
    }

    #[test]
    fn explicit_region_wins() {
        let cfg = SampleConfig::new(SampleMode::NearestCell)
            .with_target("solid", "")
            .with_couple_group("interface");
        let t = resolve_target(&registry(), "fluid", "zMin", &cfg).unwrap();
        assert_eq!(t.region, "solid");
        assert!(t.patch.is_empty());
    }

    #[test]
    fn missing_patch_is_config_error() {
        let cfg = SampleConfig::new(SampleMode::NearestPatchFace).with_target("fluid", "nowhere");
        let err = resolve_target(&registry(), "solid", "zMax", &cfg).unwrap_err();
        assert!(matches!(err, MeshCouplingError::Config { ref patch, .. } if patch == "zMax"));
    }

    #[test]
    fn nothing_to_resolve() {
        let cfg = SampleConfig::new(SampleMode::NearestCell);
        assert!(resolve_target(&registry(), "solid", "zMax", &cfg).is_err());
    }
}
