//! The parameter registry: built-in descriptor tables, override application,
//! and target-group selection.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which built-in table a parameter was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Info,
    Tc,
}

/// `--spsa-target` selector: which origin group SPSA is allowed to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Both,
    Info,
    Tc,
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "both" => Ok(Group::Both),
            "info" => Ok(Group::Info),
            "tc" => Ok(Group::Tc),
            other => Err(format!("unknown spsa target {other:?}, expected both|info|tc")),
        }
    }
}

/// One tunable scalar's metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Descriptor {
    pub range: (f64, f64),
    pub default: f64,
    pub c_end: f64,
    pub r_end: f64,
    pub origin: Origin,
    pub update: bool,
}

impl Descriptor {
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.range.0).min(self.range.1)
    }
}

/// A mapping of override names to fixed integer values, loaded from a JSON
/// file of the form `{"name": value, ...}`.
pub type Overrides = HashMap<String, i64>;

pub fn load_overrides_file(path: &Path) -> Result<Overrides, ConfigError> {
    let text =
        std::fs::read_to_string(path).map_err(|source| ConfigError::ReadOverrideFile {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::ParseOverrideFile {
        path: path.to_path_buf(),
        source,
    })
}

/// The merged, immutable set of parameter descriptors for one optimization
/// run.
#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: HashMap<String, Descriptor>,
}

impl Registry {
    /// Build the registry from the built-in tables, apply overrides (which
    /// pin parameters), then restrict `update` to the selected group.
    ///
    /// Unknown override names are reported through `warnings` (not fatal,
    /// `ConfigError` policy) rather than failing the load.
    pub fn load(
        overrides_info: &Overrides,
        overrides_tc: &Overrides,
        target: Group,
        warnings: &mut Vec<ConfigError>,
    ) -> Registry {
        let mut descriptors = HashMap::new();
        for (name, descriptor) in builtin_info() {
            descriptors.insert(name, descriptor);
        }
        for (name, descriptor) in builtin_tc() {
            if descriptors.contains_key(&name) {
                warnings.push(ConfigError::DuplicateName { name: name.clone() });
            }
            descriptors.insert(name, descriptor);
        }

        apply_overrides(&mut descriptors, overrides_info, Path::new("<json-info>"), warnings);
        apply_overrides(&mut descriptors, overrides_tc, Path::new("<json-tc>"), warnings);

        for descriptor in descriptors.values_mut() {
            let in_group = match target {
                Group::Both => true,
                Group::Info => descriptor.origin == Origin::Info,
                Group::Tc => descriptor.origin == Origin::Tc,
            };
            if !in_group {
                descriptor.update = false;
            }
        }

        Registry { descriptors }
    }

    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.descriptors.get(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.descriptors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn updating_names(&self) -> impl Iterator<Item = &str> {
        self.descriptors
            .iter()
            .filter(|(_, d)| d.update)
            .map(|(k, _)| k.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(|s| s.as_str())
    }
}

fn apply_overrides(
    descriptors: &mut HashMap<String, Descriptor>,
    overrides: &Overrides,
    source_path: &Path,
    warnings: &mut Vec<ConfigError>,
) {
    for (name, value) in overrides {
        match descriptors.get_mut(name) {
            Some(descriptor) => {
                descriptor.default = *value as f64;
                descriptor.update = false;
            }
            None => warnings.push(ConfigError::UnknownOverride {
                path: source_path.to_path_buf(),
                name: name.clone(),
            }),
        }
    }
}

macro_rules! table {
    ($origin:expr, $($name:literal: ($lo:expr, $hi:expr), $default:expr, $c_end:expr, $r_end:expr;)+) => {
        vec![$((
            $name.to_string(),
            Descriptor {
                range: ($lo as f64, $hi as f64),
                default: $default as f64,
                c_end: $c_end as f64,
                r_end: $r_end as f64,
                origin: $origin,
                update: true,
            },
        )),+]
    };
}

/// The "info" (search heuristics) built-in table, ported from
/// `original_source/scripts/spsa.py`'s `PARAM_INFO`.
fn builtin_info() -> Vec<(String, Descriptor)> {
    table! { Origin::Info,
        "futilityMarginGain": (100, 200), 165, 20, 0.0020;
        "reductionA": (1000, 2000), 1642, 100, 0.0020;
        "reductionB": (500, 1500), 1024, 100, 0.0020;
        "reductionC": (500, 1500), 916, 100, 0.0020;
        "statBonusA": (1, 30), 12, 3, 0.0020;
        "statBonusB": (100, 500), 282, 40, 0.0020;
        "statBonusC": (100, 500), 349, 40, 0.0020;
        "statBonusD": (1000, 2000), 1594, 100, 0.0020;
        "reductionInit": (1000, 3000), 2026, 200, 0.0020;
        "counterMoveHistoryThreshold": (-150, 0), -1, 15, 0.0020;
        "aspirationDeltaA": (0, 30), 10, 3, 0.0020;
        "aspirationDeltaB": (10000, 20000), 15620, 1000, 0.0020;
        "aspirationDeltaC": (2, 7), 4, 0.5, 0.0020;
        "aspirationDeltaD": (1, 10), 2, 0.5, 0.0020;
        "bonusInitialGain": (-100, 0), -19, 10, 0.0020;
        "bonusInitialThreshold": (1000, 3000), 1914, 200, 0.0020;
        "improvementDefault": (0, 400), 168, 40, 0.0020;
        "mateBetaDelta": (50, 250), 137, 20, 0.0020;
        "mateDepthThreshold": (1, 10), 5, 0.5, 0.0020;
        "mateExtraBonus": (10, 100), 62, 9, 0.0020;
        "futilityBaseDelta": (50, 200), 153, 15, 0.0020;
        "razoringA": (-500, 0), -369, 50, 0.0020;
        "razoringB": (-500, 0), -254, 50, 0.0020;
        "futilityA": (100, 500), 303, 40, 0.0020;
        "futilityDepth": (3, 12), 8, 0.5, 0.0020;
        "nullMoveThreshA": (10000, 20000), 17139, 1000, 0.0020;
        "nullMoveThreshB": (-100, 0), -20, 10, 0.0020;
        "nullMoveThreshC": (1, 20), 13, 1, 0.0020;
        "nullMoveThreshD": (100, 500), 233, 40, 0.0020;
        "nullMoveThreshE": (1, 50), 25, 5, 0.0020;
        "nullMoveRA": (100, 500), 168, 40, 0.0020;
        "nullMoveRB": (1, 20), 7, 1, 0.0020;
        "nullMoveRC": (1, 10), 3, 0.5, 0.0020;
        "nullMoveRD": (1, 10), 4, 0.5, 0.0020;
        "nullMoveRE": (100, 1500), 861, 140, 0.0020;
        "nullMoveDepth": (8, 20), 14, 0.5, 0.0020;
        "nullMovePlyA": (1, 5), 3, 0.5, 0.0020;
        "nullMovePlyB": (1, 8), 4, 0.8, 0.0020;
        "probCutBetaA": (100, 300), 191, 20, 0.0020;
        "probCutBetaB": (10, 100), 54, 9, 0.0020;
        "probCutDepthLimit": (1, 10), 4, 0.5, 0.0020;
        "probCutDepth": (1, 10), 3, 0.5, 0.0020;
        "ttDecreaseA": (1, 5), 3, 0.5, 0.0020;
        "ttDecreaseB": (1, 5), 2, 0.5, 0.0020;
        "ttDecreaseDepth": (1, 20), 9, 0.5, 0.0020;
        "probCutBetaC": (300, 500), 417, 20, 0.0020;
        "probCutDepthThresh": (1, 5), 2, 0.5, 0.0020;
        "shallowPruningDepthA": (1, 15), 7, 1, 0.0020;
        "shallowPruningA": (100, 300), 180, 20, 0.0020;
        "shallowPruningB": (100, 300), 201, 20, 0.0020;
        "shallowPruningC": (1, 10), 6, 0.5, 0.0020;
        "sseThreshold": (-500, 0), -222, 50, 0.0020;
        "shallowPruningDepthB": (1, 10), 5, 0.5, 0.0020;
        "shallowPruningD": (-5000, -1000), -3875, 400, 0.0020;
        "shallowPruningGain": (1, 5), 2, 0.5, 0.0020;
        "shallowPruningDepthC": (1, 20), 13, 1, 0.0020;
        "shallowPruningE": (50, 200), 106, 15, 0.0020;
        "shallowPruningF": (100, 200), 145, 10, 0.0020;
        "shallowPruningG": (10, 100), 52, 9, 0.0020;
        "shallowPruningH": (-100, 0), -24, 10, 0.0020;
        "shallowPruningI": (-50, 0), -15, 5, 0.0020;
        "singularExtDepthA": (1, 8), 4, 0.5, 0.0020;
        "singularExtDepthB": (1, 5), 2, 0.5, 0.0020;
        "singularExtDepthC": (1, 5), 3, 0.5, 0.0020;
        "singularBetaA": (1, 5), 3, 0.5, 0.0020;
        "singularExtentionA": (10, 50), 25, 4, 0.0020;
        "singularExtentionB": (5, 15), 9, 0.5, 0.0020;
        "singularExtDepthD": (5, 15), 9, 0.5, 0.0020;
        "singularExtentionC": (50, 150), 82, 10, 0.0020;
        "singularExtentionD": (1000, 10000), 5177, 900, 0.0020;
        "lmrDepthThreshold": (1, 5), 2, 0.5, 0.0020;
        "lmrMoveCountThreshold": (1, 15), 7, 0.5, 0.0020;
        "lmrDecTTPv": (0, 3), 2, 0.5, 0.0020;
        "lmrDecMoveCount": (0, 3), 1, 0.5, 0.0020;
        "lmrDecSingular": (0, 3), 1, 0.5, 0.0020;
        "lmrIncCutNode": (0, 3), 2, 0.5, 0.0020;
        "lmrIncTTCapture": (0, 3), 1, 0.5, 0.0020;
        "lmrPvNodeA": (1, 5), 1, 0.5, 0.0020;
        "lmrPvNodeB": (1, 20), 11, 1, 0.0020;
        "lmrPvNodeC": (1, 5), 3, 0.5, 0.0020;
        "lmrCutoffCntThresh": (1, 5), 3, 0.5, 0.0020;
        "lmrIncCutoffCnt": (0, 3), 1, 0.5, 0.0020;
        "lmrStatGain": (1, 5), 2, 0.5, 0.0020;
        "lmrStatDelta": (1000, 10000), 4433, 900, 0.0020;
        "lmrRDecA": (10000, 20000), 13628, 1000, 0.0020;
        "lmrRDecB": (1000, 10000), 4000, 900, 0.0020;
        "lmrRDecDepthA": (3, 10), 7, 0.5, 0.0020;
        "lmrRDecDepthB": (11, 30), 19, 1, 0.0020;
        "lmrDeepSearchA": (10, 100), 64, 9, 0.0020;
        "lmrDeepSearchB": (1, 20), 11, 1, 0.0020;
    }
}

/// The "tc" (time-control) built-in table, ported from
/// `original_source/scripts/spsa.py`'s `PARAM_TC_INFO`.
fn builtin_tc() -> Vec<(String, Descriptor)> {
    table! { Origin::Tc,
        "fallingEvalA": (10, 100), 66, 10, 0.0020;
        "fallingEvalB": (5, 25), 14, 2, 0.0020;
        "fallingEvalC": (3, 10), 6, 1, 0.0020;
        "fallingEvalD": (100, 1000), 617, 90, 0.0020;
        "fallingEvalClampMin": (1, 99), 51, 10, 0.0020;
        "fallingEvalClampMax": (101, 200), 151, 10, 0.0020;
        "timeReductionDepth": (4, 12), 8, 0.5, 0.0020;
        "timeReductionA": (100, 200), 156, 10, 0.0020;
        "timeReductionB": (30, 120), 69, 10, 0.0020;
        "timeReductionC": (100, 180), 140, 10, 0.0020;
        "timeReductionD": (150, 250), 217, 10, 0.0020;
        "bestMoveInstabilityA": (100, 250), 179, 15, 0.0020;
        "totalTimeGain": (30, 100), 75, 5, 0.0020;
        "optExtraA": (50, 150), 100, 10, 0.0020;
        "optExtraB": (50, 150), 125, 10, 0.0020;
        "optExtraC": (50, 150), 111, 10, 0.0020;
        "optConstantA": (100, 500), 334, 40, 0.0020;
        "optConstantB": (10, 50), 30, 4, 0.0020;
        "optConstantC": (10, 100), 49, 10, 0.0020;
        "maxConstantA": (100, 500), 340, 40, 0.0020;
        "maxConstantB": (100, 500), 300, 40, 0.0020;
        "maxConstantC": (100, 500), 276, 40, 0.0020;
        "optScaleA": (100, 200), 120, 10, 0.0020;
        "optScaleB": (20, 40), 31, 2, 0.0020;
        "optScaleC": (30, 60), 44, 3, 0.0020;
        "optScaleD": (10, 50), 21, 4, 0.0020;
        "maxScaleA": (50, 100), 69, 5, 0.0020;
        "maxScaleB": (100, 150), 122, 5, 0.0020;
        "maximumTimeA": (50, 150), 84, 10, 0.0020;
        "maximumTimeB": (0, 30), 10, 3, 0.0020;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_have_no_accidental_overlap() {
        let mut warnings = Vec::new();
        let registry = Registry::load(&Overrides::new(), &Overrides::new(), Group::Both, &mut warnings);
        assert!(warnings.is_empty(), "unexpected duplicates: {warnings:?}");
        assert_eq!(registry.len(), builtin_info().len() + builtin_tc().len());
    }

    #[test]
    fn every_default_lies_within_its_range() {
        let mut warnings = Vec::new();
        let registry = Registry::load(&Overrides::new(), &Overrides::new(), Group::Both, &mut warnings);
        for (name, descriptor) in registry.iter() {
            assert!(
                descriptor.range.0 <= descriptor.default && descriptor.default <= descriptor.range.1,
                "{name} default {} outside range {:?}",
                descriptor.default,
                descriptor.range
            );
        }
    }

    #[test]
    fn group_selection_gates_update_flag() {
        let mut warnings = Vec::new();
        let registry = Registry::load(&Overrides::new(), &Overrides::new(), Group::Tc, &mut warnings);
        for (_, descriptor) in registry.iter() {
            match descriptor.origin {
                Origin::Tc => assert!(descriptor.update),
                Origin::Info => assert!(!descriptor.update),
            }
        }
    }

    #[test]
    fn override_pins_parameter_and_overwrites_default() {
        let mut overrides = Overrides::new();
        overrides.insert("reductionA".to_string(), 1500);
        let mut warnings = Vec::new();
        let registry = Registry::load(&overrides, &Overrides::new(), Group::Info, &mut warnings);
        let descriptor = registry.get("reductionA").unwrap();
        assert_eq!(descriptor.default, 1500.0);
        assert!(!descriptor.update);
        assert!(warnings.is_empty());
    }

    #[test]
    fn unknown_override_is_reported_not_fatal() {
        let mut overrides = Overrides::new();
        overrides.insert("notARealParameter".to_string(), 42);
        let mut warnings = Vec::new();
        let registry = Registry::load(&overrides, &Overrides::new(), Group::Both, &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], ConfigError::UnknownOverride { .. }));
        assert!(registry.get("notARealParameter").is_none());
    }
}
