//! Process-wide defaults.
//!
//! [`Settings`] is loaded once (from JSON, or [`Settings::default`]) and handed
//! by reference to the [`crate::pipeline::Designer`]. Every field carries a
//! default, so a partial file is valid:
//!
//! ```json
//! {
//!   "references": { "hg38": { "fasta": "genomes/hg38.fa" } },
//!   "design": { "n_primers": 5, "max_pair_tm_diff": 1.5 },
//!   "engine": { "kind": "primer3", "primer3_path": "/usr/local/bin/primer3_core" }
//! }
//! ```
//!
//! Relative FASTA paths resolve against the directory holding the settings file.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dna::BisulfitePolicy;
use crate::error::{DesignError, Result};
use crate::qc::QcThresholds;
use crate::reference::ReferenceCatalog;
use crate::thermo::Conditions;

/// `opt` target with an inclusive `[min, max]` range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub opt: T,
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy + std::fmt::Display> Bounds<T> {
    pub const fn new(opt: T, min: T, max: T) -> Self { Self { opt, min, max } }

    pub fn contains(&self, v: T) -> bool { self.min <= v && v <= self.max }

    /// `min <= opt <= max`, else a `DesignParameter` error naming `parameter`.
    pub fn validate(&self, parameter: &str) -> Result<()> {
        if self.min > self.max {
            return Err(DesignError::parameter(parameter, format!("min ({}) > max ({})", self.min, self.max)));
        }
        if self.opt < self.min || self.opt > self.max {
            return Err(DesignError::parameter(
                parameter,
                format!("opt ({}) outside [{}, {}]", self.opt, self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Length / Tm / GC constraints for one oligo class.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OligoConstraints {
    pub length: Bounds<usize>,
    pub tm: Bounds<f64>,
    pub gc: Bounds<f64>,
}

impl OligoConstraints {
    pub const PRIMER: Self = Self {
        length: Bounds::new(25, 20, 30),
        tm: Bounds::new(60.0, 50.0, 70.0),
        gc: Bounds::new(45.0, 35.0, 65.0),
    };

    pub const PROBE: Self = Self {
        length: Bounds::new(25, 20, 30),
        tm: Bounds::new(68.0, 65.0, 72.0),
        gc: Bounds::new(45.0, 35.0, 65.0),
    };

    /// Validate all three ranges; `prefix` is `primer` or `probe`.
    pub fn validate(&self, prefix: &str) -> Result<()> {
        self.length.validate(&format!("{prefix}_length"))?;
        if self.length.min == 0 {
            return Err(DesignError::parameter(&format!("{prefix}_min_length"), "must be > 0"));
        }
        self.tm.validate(&format!("{prefix}_tm"))?;
        self.gc.validate(&format!("{prefix}_gc"))
    }
}

/// Allowed gap between probe Tm and primer Tm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TmDiff {
    pub min: f64,
    pub max: f64,
}

impl Default for TmDiff {
    fn default() -> Self { Self { min: 6.0, max: 8.0 } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BisulfiteSettings {
    pub enabled: bool,
    pub cpg: BisulfitePolicy,
    /// Signed 1-based positions: `+p` keeps the C at `p`, `-p` converts it.
    pub methylation_pattern: Vec<i64>,
}

/// Design defaults applied to every unset [`crate::params::DesignParameters`] field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignDefaults {
    pub min_amplicon_length: usize,
    pub max_amplicon_length: usize,
    pub n_primers: usize,
    pub n_probes: usize,
    pub primer: OligoConstraints,
    pub probe: OligoConstraints,
    pub max_pair_tm_diff: f64,
    pub primer_probe_tm_diff: TmDiff,
    pub bisulfite: BisulfiteSettings,
    /// Engine-specific options forwarded verbatim (e.g. `PRIMER_MAX_POLY_X`).
    pub engine_args: BTreeMap<String, String>,
}

impl Default for DesignDefaults {
    fn default() -> Self {
        Self {
            min_amplicon_length: 80,
            max_amplicon_length: 120,
            n_primers: 10,
            n_probes: 10,
            primer: OligoConstraints::PRIMER,
            probe: OligoConstraints::PROBE,
            max_pair_tm_diff: 2.0,
            primer_probe_tm_diff: TmDiff::default(),
            bisulfite: BisulfiteSettings::default(),
            engine_args: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub fasta: PathBuf,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Built-in picker and nearest-neighbour thermodynamics.
    #[default]
    Native,
    /// External `primer3_core` for oligo search.
    Primer3,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub kind: EngineKind,
    pub primer3_path: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self { Self { kind: EngineKind::Native, primer3_path: PathBuf::from("primer3_core") } }
}

/// Everything a [`crate::pipeline::Designer`] needs besides the per-call overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub references: BTreeMap<String, ReferenceEntry>,
    pub design: DesignDefaults,
    pub conditions: Conditions,
    pub qc: QcThresholds,
    pub engine: EngineSettings,
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |reason: String| DesignError::Config { path: path.display().to_string(), reason };
        let text = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        let mut settings: Settings = serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        for entry in settings.references.values_mut() {
            if entry.fasta.is_relative() {
                entry.fasta = base.join(&entry.fasta);
            }
        }
        settings.design.primer.validate("primer")?;
        settings.design.probe.validate("probe")?;
        Ok(settings)
    }

    /// A reference catalog over the configured FASTA paths.
    pub fn reference_catalog(&self) -> ReferenceCatalog {
        ReferenceCatalog::new(self.references.iter().map(|(k, v)| (k.clone(), v.fasta.clone())).collect())
    }
}
