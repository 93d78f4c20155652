//! Per-call design overrides and their resolution against [`DesignDefaults`].
//!
//! Resolution happens once, before any engine is invoked; engines only ever see
//! [`ResolvedParameters`].
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{Bounds, DesignDefaults, OligoConstraints, TmDiff};
use crate::dna::{BisulfitePolicy, MethylationPattern};
use crate::error::{DesignError, Result};

/// Caller-supplied overrides; `None` means "use the configured default".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignParameters {
    pub min_amplicon_length: Option<usize>,
    pub max_amplicon_length: Option<usize>,
    pub n_primers: Option<usize>,
    /// `Some(0)` disables probe search.
    pub n_probes: Option<usize>,

    pub primer_opt_length: Option<usize>,
    pub primer_min_length: Option<usize>,
    pub primer_max_length: Option<usize>,
    pub primer_opt_tm: Option<f64>,
    pub primer_min_tm: Option<f64>,
    pub primer_max_tm: Option<f64>,
    pub primer_opt_gc: Option<f64>,
    pub primer_min_gc: Option<f64>,
    pub primer_max_gc: Option<f64>,
    pub max_pair_tm_diff: Option<f64>,

    pub probe_opt_length: Option<usize>,
    pub probe_min_length: Option<usize>,
    pub probe_max_length: Option<usize>,
    pub probe_opt_tm: Option<f64>,
    pub probe_min_tm: Option<f64>,
    pub probe_max_tm: Option<f64>,
    pub probe_opt_gc: Option<f64>,
    pub probe_min_gc: Option<f64>,
    pub probe_max_gc: Option<f64>,

    /// Probe Tm minus primer Tm, lower end.
    pub min_tm_diff: Option<f64>,
    /// Probe Tm minus primer Tm, upper end.
    pub max_tm_diff: Option<f64>,

    pub bisulfite: Option<bool>,
    pub cpg_policy: Option<BisulfitePolicy>,
    pub methylation_pattern: Option<Vec<i64>>,

    /// Merged over the configured passthrough map; caller keys win.
    pub engine_args: BTreeMap<String, String>,
}

/// Bisulfite conversion as applied to one design call.
#[derive(Clone, Debug, PartialEq)]
pub struct BisulfiteConversion {
    pub policy: BisulfitePolicy,
    pub pattern: MethylationPattern,
}

/// Fully-specified, validated design parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedParameters {
    pub min_amplicon_length: usize,
    pub max_amplicon_length: usize,
    pub n_primers: usize,
    pub n_probes: usize,
    pub primer: OligoConstraints,
    pub probe: OligoConstraints,
    pub max_pair_tm_diff: f64,
    pub tm_diff: TmDiff,
    pub bisulfite: Option<BisulfiteConversion>,
    pub engine_args: BTreeMap<String, String>,
}

fn pick<T: Copy>(value: Option<T>, default: T) -> T { value.unwrap_or(default) }

impl DesignParameters {
    /// Fill unset fields from `defaults` and validate the result.
    pub fn resolve(&self, defaults: &DesignDefaults) -> Result<ResolvedParameters> {
        let d = defaults;
        let primer = OligoConstraints {
            length: Bounds::new(
                pick(self.primer_opt_length, d.primer.length.opt),
                pick(self.primer_min_length, d.primer.length.min),
                pick(self.primer_max_length, d.primer.length.max),
            ),
            tm: Bounds::new(
                pick(self.primer_opt_tm, d.primer.tm.opt),
                pick(self.primer_min_tm, d.primer.tm.min),
                pick(self.primer_max_tm, d.primer.tm.max),
            ),
            gc: Bounds::new(
                pick(self.primer_opt_gc, d.primer.gc.opt),
                pick(self.primer_min_gc, d.primer.gc.min),
                pick(self.primer_max_gc, d.primer.gc.max),
            ),
        };

        let tm_diff = match (self.min_tm_diff, self.max_tm_diff) {
            (None, None) => d.primer_probe_tm_diff,
            (Some(v), None) | (None, Some(v)) => TmDiff { min: v, max: v },
            (Some(min), Some(max)) => TmDiff { min, max },
        };
        // A caller-supplied Tm gap anchors the probe window on the primer optimum.
        let probe_tm_default = if self.min_tm_diff.is_some() || self.max_tm_diff.is_some() {
            let base = primer.tm.opt;
            Bounds::new(base + (tm_diff.min + tm_diff.max) / 2.0, base + tm_diff.min, base + tm_diff.max)
        } else {
            d.probe.tm
        };
        let probe = OligoConstraints {
            length: Bounds::new(
                pick(self.probe_opt_length, d.probe.length.opt),
                pick(self.probe_min_length, d.probe.length.min),
                pick(self.probe_max_length, d.probe.length.max),
            ),
            tm: Bounds::new(
                pick(self.probe_opt_tm, probe_tm_default.opt),
                pick(self.probe_min_tm, probe_tm_default.min),
                pick(self.probe_max_tm, probe_tm_default.max),
            ),
            gc: Bounds::new(
                pick(self.probe_opt_gc, d.probe.gc.opt),
                pick(self.probe_min_gc, d.probe.gc.min),
                pick(self.probe_max_gc, d.probe.gc.max),
            ),
        };

        let bisulfite = if pick(self.bisulfite, d.bisulfite.enabled) {
            let signed = self.methylation_pattern.as_deref().unwrap_or(&d.bisulfite.methylation_pattern);
            Some(BisulfiteConversion {
                policy: pick(self.cpg_policy, d.bisulfite.cpg),
                pattern: MethylationPattern::from_signed(signed),
            })
        } else {
            None
        };

        let mut engine_args = d.engine_args.clone();
        engine_args.extend(self.engine_args.iter().map(|(k, v)| (k.clone(), v.clone())));

        let resolved = ResolvedParameters {
            min_amplicon_length: pick(self.min_amplicon_length, d.min_amplicon_length),
            max_amplicon_length: pick(self.max_amplicon_length, d.max_amplicon_length),
            n_primers: pick(self.n_primers, d.n_primers),
            n_probes: pick(self.n_probes, d.n_probes),
            primer,
            probe,
            max_pair_tm_diff: pick(self.max_pair_tm_diff, d.max_pair_tm_diff),
            tm_diff,
            bisulfite,
            engine_args,
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

impl ResolvedParameters {
    pub fn probe_mode(&self) -> bool { self.n_probes > 0 }

    fn validate(&self) -> Result<()> {
        if self.min_amplicon_length == 0 {
            return Err(DesignError::parameter("min_amplicon_length", "must be > 0"));
        }
        if self.min_amplicon_length > self.max_amplicon_length {
            return Err(DesignError::parameter(
                "amplicon_length",
                format!("min ({}) > max ({})", self.min_amplicon_length, self.max_amplicon_length),
            ));
        }
        if self.n_primers == 0 {
            return Err(DesignError::parameter("n_primers", "must be > 0"));
        }
        self.primer.validate("primer")?;
        if self.probe_mode() {
            self.probe.validate("probe")?;
            if self.tm_diff.min > self.tm_diff.max {
                return Err(DesignError::parameter(
                    "tm_diff",
                    format!("min ({}) > max ({})", self.tm_diff.min, self.tm_diff.max),
                ));
            }
        }
        if self.max_pair_tm_diff < 0.0 {
            return Err(DesignError::parameter("max_pair_tm_diff", "must be >= 0"));
        }
        Ok(())
    }

    /// `(name, value)` rows describing the effective parameters.
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = vec![
            ("min_amplicon_length".into(), self.min_amplicon_length.to_string()),
            ("max_amplicon_length".into(), self.max_amplicon_length.to_string()),
            ("n_primers".into(), self.n_primers.to_string()),
            ("n_probes".into(), self.n_probes.to_string()),
            ("max_pair_tm_diff".into(), self.max_pair_tm_diff.to_string()),
        ];
        let mut oligo = |prefix: &str, c: &OligoConstraints| {
            for (field, b) in [("length", c.length.map(|v| v as f64)), ("tm", c.tm), ("gc", c.gc)] {
                for (which, v) in [("opt", b.opt), ("min", b.min), ("max", b.max)] {
                    rows.push((format!("{prefix}_{which}_{field}"), v.to_string()));
                }
            }
        };
        oligo("primer", &self.primer);
        if self.probe_mode() {
            oligo("probe", &self.probe);
            rows.push(("min_tm_diff".into(), self.tm_diff.min.to_string()));
            rows.push(("max_tm_diff".into(), self.tm_diff.max.to_string()));
        }
        rows.push(("bisulfite".into(), self.bisulfite.is_some().to_string()));
        if let Some(b) = &self.bisulfite {
            rows.push(("cpg_policy".into(), format!("{:?}", b.policy).to_lowercase()));
        }
        rows.extend(self.engine_args.iter().map(|(k, v)| (k.clone(), v.clone())));
        rows
    }
}

impl<T: Copy> Bounds<T> {
    fn map<U>(self, f: impl Fn(T) -> U) -> Bounds<U> {
        Bounds { opt: f(self.opt), min: f(self.min), max: f(self.max) }
    }
}
