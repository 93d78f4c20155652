//! Candidate search for one template window.
//!
//! Without probes this is a single primer search. With probes it runs as
//! `PROBE_SEARCH` (probes covering the target) followed by one `PRIMER_SEARCH` per
//! probe with primer Tm pinned below that probe's Tm; the per-probe amplicon
//! groups are concatenated in probe rank order.
use log::{debug, warn};

use crate::amplicon::{Amplicon, Assembler};
use crate::config::{Bounds, TmDiff};
use crate::error::Result;
use crate::oligo::{Oligo, Role};
use crate::params::ResolvedParameters;
use crate::search::{build_args, OligoDesigner, SearchMode};
use crate::thermo::{Conditions, ThermoEngine};
use crate::window::TemplateWindow;

/// Primer Tm window derived from a probe's Tm.
///
/// `opt` and `max` coincide: both sit `min_diff` below the probe.
pub fn primer_tm_for_probe(probe_tm: f64, diff: &TmDiff) -> Bounds<f64> {
    Bounds { opt: probe_tm - diff.min, min: probe_tm - diff.max, max: probe_tm - diff.min }
}

/// Runs the search for one window.
pub struct CandidateSearch<'a> {
    pub window: &'a TemplateWindow,
    pub params: &'a ResolvedParameters,
    pub conditions: &'a Conditions,
    pub designer: &'a (dyn OligoDesigner + Sync),
    pub thermo: &'a (dyn ThermoEngine + Sync),
}

impl CandidateSearch<'_> {
    fn assembler(&self) -> Assembler<'_> {
        Assembler {
            window: self.window,
            thermo: self.thermo,
            conditions: self.conditions,
            probe_mode: self.params.probe_mode(),
        }
    }

    /// All amplicons for the window, pre-QC, in rank order.
    pub fn run(&self) -> Result<Vec<Amplicon>> {
        if !self.params.probe_mode() {
            return self.primer_only();
        }
        let probes = self.probe_search()?;
        if probes.is_empty() {
            warn!("{}: no probe candidates", self.window.region);
            return Ok(Vec::new());
        }
        let mut amplicons = Vec::new();
        for (rank, probe) in probes.iter().enumerate() {
            let group = self.primer_search(probe)?;
            debug!("{}: probe rank {rank} ({}) gave {} amplicons", self.window.region, probe.sequence, group.len());
            amplicons.extend(group);
        }
        Ok(amplicons)
    }

    fn primer_only(&self) -> Result<Vec<Amplicon>> {
        let (seq, global) = build_args(&SearchMode::PrimerOnly, self.window, self.params, self.conditions, None)?;
        let output = self.designer.design(&seq, &global)?;
        Ok(self.assembler().assemble(&output, None))
    }

    /// `PROBE_SEARCH`: ranked probes that locate in the template and cover the target.
    pub fn probe_search(&self) -> Result<Vec<Oligo>> {
        let (seq, global) = build_args(&SearchMode::ProbeAuto, self.window, self.params, self.conditions, None)?;
        let output = self.designer.design(&seq, &global)?;
        let mut probes = Vec::with_capacity(output.internal.len());
        for sequence in &output.internal {
            match Oligo::evaluate(
                sequence,
                Role::Probe,
                &self.window.template_sequence,
                &self.window.reference_template_sequence,
                self.thermo,
                self.conditions,
            ) {
                Ok(probe) if self.covers_target(&probe) => probes.push(probe),
                Ok(probe) => debug!(
                    "{}: probe {} ({}..={}) misses the target",
                    self.window.region, probe.sequence, probe.start_index, probe.end_index
                ),
                Err(e) => warn!("{}: dropping probe: {e}", self.window.region),
            }
        }
        Ok(probes)
    }

    fn covers_target(&self, probe: &Oligo) -> bool {
        probe.start_index <= self.window.target_start_index() && probe.end_index >= self.window.target_end_index()
    }

    /// `PRIMER_SEARCH` around one fixed probe.
    pub fn primer_search(&self, probe: &Oligo) -> Result<Vec<Amplicon>> {
        let tm = primer_tm_for_probe(probe.tm, &self.params.tm_diff);
        let mode = SearchMode::ProbeFixed { sequence: probe.sequence.clone() };
        let (seq, global) = build_args(&mode, self.window, self.params, self.conditions, Some(tm))?;
        let output = self.designer.design(&seq, &global)?;
        Ok(self.assembler().assemble(&output, Some(probe)))
    }
}
