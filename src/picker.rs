//! Built-in oligo-design engine.
//!
//! Enumerates every window of allowed length on the template, keeps those
//! inside the Tm/GC bounds and outside excluded regions, and ranks them by a
//! primer3-style penalty `|Tm - opt_Tm| + |len - opt_len|`. Pairs must flank
//! the target, fall in the product size range and agree in Tm within the
//! allowed difference; pair penalty is the sum of both primers plus their Tm gap.
use log::debug;

use crate::config::OligoConstraints;
use crate::dna::{gc_percent, reverse_complement};
use crate::error::Result;
use crate::search::{EngineOutput, GlobalArgs, Interval, OligoDesigner, SequenceArgs};
use crate::thermo::{Conditions, NearestNeighbor, ThermoEngine};

/// Upper bound on single-oligo candidates kept per role before pairing.
const MAX_CANDIDATES: usize = 400;

#[derive(Clone, Debug)]
struct Candidate {
    sequence: String,
    start: usize,
    end: usize,
    tm: f64,
    penalty: f64,
}

fn overlaps(start: usize, end: usize, regions: &[Interval]) -> bool {
    regions.iter().any(|&(s, l)| l > 0 && start < s + l && s <= end)
}

fn is_acgt(seq: &[u8]) -> bool { seq.iter().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) }

fn rank(mut candidates: Vec<Candidate>, limit: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| a.penalty.total_cmp(&b.penalty).then(a.start.cmp(&b.start)));
    candidates.truncate(limit);
    candidates
}

/// Native engine backed by any [`ThermoEngine`] for Tm.
#[derive(Clone, Debug, Default)]
pub struct NativePicker<T = NearestNeighbor> {
    thermo: T,
}

impl<T: ThermoEngine> NativePicker<T> {
    pub fn new(thermo: T) -> Self { Self { thermo } }

    /// All windows satisfying `c`, on the forward strand or as reverse complements.
    fn scan(
        &self,
        template: &[u8],
        c: &OligoConstraints,
        cond: &Conditions,
        reverse: bool,
        keep: impl Fn(usize, usize) -> bool,
    ) -> Vec<Candidate> {
        let mut out = Vec::new();
        for len in c.length.min..=c.length.max {
            if len > template.len() {
                break;
            }
            for start in 0..=(template.len() - len) {
                let end = start + len - 1;
                let site = &template[start..=end];
                if !keep(start, end) || !is_acgt(site) {
                    continue;
                }
                let forward = String::from_utf8_lossy(site).into_owned();
                let sequence = if reverse { reverse_complement(&forward) } else { forward };
                if !c.gc.contains(gc_percent(&sequence)) {
                    continue;
                }
                let tm = self.thermo.calc_tm(&sequence, cond);
                if !c.tm.contains(tm) {
                    continue;
                }
                let penalty = (tm - c.tm.opt).abs() + (len as f64 - c.length.opt as f64).abs();
                out.push(Candidate { sequence, start, end, tm, penalty });
            }
        }
        out
    }

    fn internal_candidates(&self, seq: &SequenceArgs, global: &GlobalArgs, template: &str) -> Vec<Candidate> {
        if let Some(fixed) = &seq.internal_oligo {
            let fixed = fixed.to_ascii_uppercase();
            let Some(start) = template.find(&fixed) else { return Vec::new() };
            let tm = self.thermo.calc_tm(&fixed, &global.conditions);
            return vec![Candidate { end: start + fixed.len() - 1, sequence: fixed, start, tm, penalty: 0.0 }];
        }
        let Some(c) = global.internal.as_ref() else { return Vec::new() };
        let excluded = &seq.internal_excluded_regions;
        rank(self.scan(template.as_bytes(), c, &global.conditions, false, |s, e| !overlaps(s, e, excluded)), MAX_CANDIDATES)
    }
}

impl<T: ThermoEngine> OligoDesigner for NativePicker<T> {
    fn name(&self) -> &str { "native" }

    fn design(&self, seq: &SequenceArgs, global: &GlobalArgs) -> Result<EngineOutput> {
        global.validate()?;
        let upper = seq.template.to_ascii_uppercase();
        let template = upper.as_bytes();
        let (target_start, target_end) = match seq.target {
            Some((s, l)) if l > 0 => (s, s + l - 1),
            _ => (usize::MAX, 0),
        };
        let excluded = &seq.excluded_regions;
        let internal = if global.pick_internal { self.internal_candidates(seq, global, &upper) } else { Vec::new() };

        if !global.pick_left && !global.pick_right {
            let internal: Vec<String> = internal.into_iter().take(global.num_return).map(|c| c.sequence).collect();
            debug!("native: {} internal oligos", internal.len());
            return Ok(EngineOutput { internal, ..EngineOutput::default() });
        }

        let left = if global.pick_left {
            let keep = |s, e| (seq.target.is_none() || e < target_start) && !overlaps(s, e, excluded);
            rank(self.scan(template, &global.primer, &global.conditions, false, keep), MAX_CANDIDATES)
        } else {
            Vec::new()
        };
        let right = if global.pick_right {
            let keep = |s, e| (seq.target.is_none() || s > target_end) && !overlaps(s, e, excluded);
            rank(self.scan(template, &global.primer, &global.conditions, true, keep), MAX_CANDIDATES)
        } else {
            Vec::new()
        };

        if !(global.pick_left && global.pick_right) {
            let take = |v: Vec<Candidate>| -> Vec<String> { v.into_iter().take(global.num_return).map(|c| c.sequence).collect() };
            return Ok(EngineOutput { left: take(left), right: take(right), ..EngineOutput::default() });
        }

        let (min_size, max_size) = global.product_size;
        let mut pairs: Vec<(f64, usize, usize, Option<usize>)> = Vec::new();
        for (li, l) in left.iter().enumerate() {
            for (ri, r) in right.iter().enumerate() {
                if r.end < l.start {
                    continue;
                }
                let size = r.end - l.start + 1;
                let tm_gap = (l.tm - r.tm).abs();
                if size < min_size || size > max_size || tm_gap > global.max_pair_tm_diff || r.start <= l.end {
                    continue;
                }
                let mut penalty = l.penalty + r.penalty + tm_gap;
                let probe = if global.pick_internal {
                    let Some(pi) = internal.iter().position(|p| p.start > l.end && p.end < r.start) else { continue };
                    penalty += internal[pi].penalty;
                    Some(pi)
                } else {
                    None
                };
                pairs.push((penalty, li, ri, probe));
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        pairs.truncate(global.num_return);

        let mut out = EngineOutput { pairs: pairs.len(), ..EngineOutput::default() };
        for (_, li, ri, pi) in pairs {
            out.left.push(left[li].sequence.clone());
            out.right.push(right[ri].sequence.clone());
            if let Some(pi) = pi {
                out.internal.push(internal[pi].sequence.clone());
            }
        }
        debug!("native: {} pairs from {} left / {} right candidates", out.pairs, left.len(), right.len());
        Ok(out)
    }
}
