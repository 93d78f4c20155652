//! Oligo search: argument construction for the design engine and its ranked output.
//!
//! One parameterized component covers the three search shapes:
//!
//! | [`SearchMode`] | primers | internal oligo |
//! |----------------|---------|----------------|
//! | `PrimerOnly`   | picked  | off            |
//! | `ProbeAuto`    | off     | picked near the target |
//! | `ProbeFixed`   | picked around the probe footprint | the supplied sequence |
//!
//! Engines implement [`OligoDesigner`]; they receive fully-resolved arguments
//! and never consult defaults themselves.
use std::collections::BTreeMap;

use log::debug;

use crate::config::{Bounds, OligoConstraints};
use crate::error::{DesignError, Result};
use crate::oligo::locate;
use crate::params::ResolvedParameters;
use crate::thermo::Conditions;
use crate::window::TemplateWindow;

/// `(start, length)` on the template, 0-based.
pub type Interval = (usize, usize);

#[derive(Clone, Debug, PartialEq)]
pub enum SearchMode {
    PrimerOnly,
    /// Free probe search restricted to the neighbourhood of the target.
    ProbeAuto,
    /// Primer search around an already chosen probe.
    ProbeFixed { sequence: String },
}

/// Per-template engine inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceArgs {
    pub template: String,
    pub target: Option<Interval>,
    pub excluded_regions: Vec<Interval>,
    pub internal_excluded_regions: Vec<Interval>,
    pub internal_oligo: Option<String>,
}

/// Task-level engine inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalArgs {
    pub pick_left: bool,
    pub pick_right: bool,
    pub pick_internal: bool,
    pub num_return: usize,
    pub primer: OligoConstraints,
    pub internal: Option<OligoConstraints>,
    /// Inclusive product size range.
    pub product_size: (usize, usize),
    pub max_pair_tm_diff: f64,
    pub conditions: Conditions,
    /// Engine-specific options, forwarded verbatim.
    pub passthrough: BTreeMap<String, String>,
}

impl GlobalArgs {
    /// Reject contradictory bounds before an engine sees them.
    pub fn validate(&self) -> Result<()> {
        if !(self.pick_left || self.pick_right || self.pick_internal) {
            return Err(DesignError::parameter("task", "nothing to pick"));
        }
        if self.num_return == 0 {
            return Err(DesignError::parameter("num_return", "must be > 0"));
        }
        if self.pick_left || self.pick_right {
            self.primer.validate("primer")?;
            if self.product_size.0 > self.product_size.1 {
                return Err(DesignError::parameter(
                    "product_size",
                    format!("min ({}) > max ({})", self.product_size.0, self.product_size.1),
                ));
            }
        }
        if self.pick_internal {
            let internal = self
                .internal
                .as_ref()
                .ok_or_else(|| DesignError::parameter("internal", "internal oligo requested without bounds"))?;
            internal.validate("internal")?;
        }
        Ok(())
    }
}

/// Ranked engine output; index = rank, lower is preferred.
///
/// `left[r]`/`right[r]` are 5'→3' primer sequences, `internal[r]` the probe on
/// the template's forward strand.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineOutput {
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub internal: Vec<String>,
    pub pairs: usize,
}

impl EngineOutput {
    pub fn rank_count(&self) -> usize { self.left.len().max(self.right.len()).max(self.internal.len()).max(self.pairs) }

    pub fn is_empty(&self) -> bool { self.rank_count() == 0 }
}

/// The oligo-design engine.
pub trait OligoDesigner {
    fn name(&self) -> &str;

    fn design(&self, sequence: &SequenceArgs, global: &GlobalArgs) -> Result<EngineOutput>;
}

/// Clamp `[start, end)` to `[0, len)` and drop it if empty.
fn region(start: usize, end: usize, len: usize) -> Option<Interval> {
    let end = end.min(len);
    (start < end).then(|| (start, end - start))
}

/// Build engine arguments for one search over `window`.
///
/// `primer_tm` overrides the resolved primer Tm bounds (probe-relative search).
pub fn build_args(
    mode: &SearchMode,
    window: &TemplateWindow,
    params: &ResolvedParameters,
    conditions: &Conditions,
    primer_tm: Option<Bounds<f64>>,
) -> Result<(SequenceArgs, GlobalArgs)> {
    let template = &window.template_sequence;
    let len = template.len();
    let (target_start, target_end) = (window.target_start_index(), window.target_end_index());
    let mut primer = params.primer;
    if let Some(tm) = primer_tm {
        primer.tm = tm;
    }
    let mut seq = SequenceArgs {
        template: template.clone(),
        target: Some((target_start, window.target_len())),
        ..SequenceArgs::default()
    };
    let mut global = GlobalArgs {
        pick_left: true,
        pick_right: true,
        pick_internal: false,
        num_return: params.n_primers,
        primer,
        internal: None,
        product_size: (params.min_amplicon_length, params.max_amplicon_length),
        max_pair_tm_diff: params.max_pair_tm_diff,
        conditions: *conditions,
        passthrough: params.engine_args.clone(),
    };

    match mode {
        SearchMode::PrimerOnly => {}
        SearchMode::ProbeAuto => {
            global.pick_left = false;
            global.pick_right = false;
            global.pick_internal = true;
            global.num_return = params.n_probes;
            global.internal = Some(params.probe);
            let flank = params.probe.length.max;
            seq.internal_excluded_regions = [
                region(0, (target_end + 1).saturating_sub(flank), len),
                region(target_start + flank, len, len),
            ]
            .into_iter()
            .flatten()
            .collect();
        }
        SearchMode::ProbeFixed { sequence } => {
            let (probe_start, probe_end, _) = locate(sequence, template)?;
            seq.internal_oligo = Some(sequence.clone());
            seq.internal_excluded_regions =
                [region(0, probe_start.saturating_sub(1), len), region(probe_end + 2, len, len)]
                    .into_iter()
                    .flatten()
                    .collect();
            seq.excluded_regions = region(probe_start.saturating_sub(1), probe_end + 2, len).into_iter().collect();
            global.pick_internal = true;
            let n = sequence.len();
            global.internal = Some(OligoConstraints {
                length: Bounds::new(n, 1, n.max(30)),
                tm: Bounds::new(params.probe.tm.opt.clamp(0.0, 100.0), 0.0, 100.0),
                gc: Bounds::new(params.probe.gc.opt.clamp(0.0, 100.0), 0.0, 100.0),
            });
        }
    }
    global.validate()?;
    debug!("{}: {mode:?} args target={:?} excluded={:?} internal_excluded={:?}", window.region, seq.target, seq.excluded_regions, seq.internal_excluded_regions);
    Ok((seq, global))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesignDefaults;
    use crate::params::DesignParameters;
    use crate::reference::InMemoryReference;
    use crate::region::Region;

    fn window() -> TemplateWindow {
        let seq = "ACGTTGCAAC".repeat(30);
        let reference = InMemoryReference::new().with_contig("chr1", &seq);
        TemplateWindow::build(&Region::new("chr1", 100, 120, None).unwrap(), 120, &reference, None).unwrap()
    }

    fn params() -> ResolvedParameters { DesignParameters::default().resolve(&DesignDefaults::default()).unwrap() }

    #[test]
    fn primer_only_targets_the_region() {
        let w = window();
        let (seq, global) = build_args(&SearchMode::PrimerOnly, &w, &params(), &Conditions::default(), None).unwrap();
        assert_eq!(seq.target, Some((w.target_start_index(), 21)));
        assert!(global.pick_left && global.pick_right && !global.pick_internal);
        assert_eq!(global.num_return, 10);
        assert_eq!(global.product_size, (80, 120));
        assert_eq!(global.conditions.dna_conc, 50.0);
    }

    #[test]
    fn probe_auto_masks_far_flanks() {
        let w = window();
        let (seq, global) = build_args(&SearchMode::ProbeAuto, &w, &params(), &Conditions::default(), None).unwrap();
        assert!(!global.pick_left && global.pick_internal);
        assert_eq!(seq.target, Some((49, 21)));
        // target 49..=69 in a 120 bp window, flank 30
        assert_eq!((w.target_start_index(), w.target_end_index()), (49, 69));
        assert_eq!(seq.internal_excluded_regions, vec![(0, 40), (79, 41)]);
    }

    #[test]
    fn probe_fixed_relaxes_internal_and_masks_footprint() {
        let w = window();
        let probe = w.template_sequence[45..70].to_string();
        let tm = Bounds::new(60.0, 58.0, 60.0);
        let mode = SearchMode::ProbeFixed { sequence: probe.clone() };
        let (seq, global) = build_args(&mode, &w, &params(), &Conditions::default(), Some(tm)).unwrap();
        assert_eq!(global.primer.tm, tm);
        assert_eq!(seq.internal_oligo.as_deref(), Some(probe.as_str()));
        let (start, end, _) = locate(&probe, &w.template_sequence).unwrap();
        assert_eq!(seq.excluded_regions, vec![(start - 1, end - start + 3)]);
        let internal = global.internal.unwrap();
        assert_eq!((internal.tm.min, internal.tm.max), (0.0, 100.0));
        assert_eq!(internal.length.max, 30);

        let forged = SearchMode::ProbeFixed { sequence: "GGGGGGGGGGGGGGGGGGGG".into() };
        assert!(matches!(
            build_args(&forged, &w, &params(), &Conditions::default(), None),
            Err(DesignError::OligoNotLocated { .. })
        ));
    }

    #[test]
    fn rank_count_is_the_widest_role() {
        let out = EngineOutput { left: vec!["A".into(); 3], right: vec!["C".into(); 2], internal: vec![], pairs: 2 };
        assert_eq!(out.rank_count(), 3);
        assert!(EngineOutput::default().is_empty());
    }

    #[test]
    fn contradictory_global_args_rejected() {
        let w = window();
        let (_, mut global) = build_args(&SearchMode::PrimerOnly, &w, &params(), &Conditions::default(), None).unwrap();
        global.product_size = (200, 100);
        assert!(matches!(global.validate(), Err(DesignError::DesignParameter { .. })));
        global.product_size = (80, 120);
        global.pick_internal = true;
        assert!(global.validate().is_err());
    }
}
