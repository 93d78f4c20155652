//! Template window around a target region.
//!
//! The window is grown symmetrically so that it spans `max_amplicon_length`
//! bases; the downstream flank absorbs the odd base. The upstream edge is
//! clamped to position 1.
use log::debug;

use crate::dna::bisulfite_convert;
use crate::error::{DesignError, Result};
use crate::params::BisulfiteConversion;
use crate::reference::ReferenceSource;
use crate::region::Region;

/// Window coordinates before any sequence is fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowPlan {
    /// 1-based, inclusive.
    pub template_start: u64,
    /// 1-based, inclusive.
    pub template_end: u64,
    /// 0-based offset of `region.start` within the template.
    pub target_start_index: usize,
    /// 0-based offset of `region.end` within the template.
    pub target_end_index: usize,
}

impl WindowPlan {
    pub fn new(region: &Region, max_amplicon_length: usize) -> Self {
        let target_len = region.len();
        let max = max_amplicon_length as u64;
        let (upstream, downstream) = if max > target_len {
            let extra = max - target_len;
            let upstream = extra / 2;
            (upstream, extra - upstream)
        } else {
            (0, 0)
        };
        let template_start = region.start.saturating_sub(upstream).max(1);
        let target_start_index = (region.start - template_start) as usize;
        Self {
            template_start,
            template_end: region.end + downstream,
            target_start_index,
            target_end_index: target_start_index + target_len as usize - 1,
        }
    }

    pub fn len(&self) -> usize { (self.template_end - self.template_start + 1) as usize }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Fetched template plus target coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateWindow {
    pub region: Region,
    pub plan: WindowPlan,
    /// Sequence handed to oligo search (bisulfite-converted when enabled).
    pub template_sequence: String,
    /// Unconverted reference bases; used for CpG / cytosine counting.
    pub reference_template_sequence: String,
}

impl TemplateWindow {
    pub fn target_start_index(&self) -> usize { self.plan.target_start_index }

    pub fn target_end_index(&self) -> usize { self.plan.target_end_index }

    pub fn target_len(&self) -> usize { self.plan.target_end_index - self.plan.target_start_index + 1 }

    /// Fetch the window for `region` from `reference`.
    pub fn build(
        region: &Region,
        max_amplicon_length: usize,
        reference: &dyn ReferenceSource,
        bisulfite: Option<&BisulfiteConversion>,
    ) -> Result<Self> {
        region.validate()?;
        let plan = WindowPlan::new(region, max_amplicon_length);
        let tag = |e: DesignError| match e {
            DesignError::ReferenceFetch { reason, .. } => DesignError::ReferenceFetch { region: region.id(), reason },
            other => other,
        };
        let reference_template_sequence =
            reference.fetch(&region.chrom, plan.template_start - 1, plan.template_end).map_err(tag)?;
        if reference_template_sequence.len() < plan.target_end_index + 1 {
            return Err(DesignError::ReferenceFetch {
                region: region.id(),
                reason: format!(
                    "fetched template ({} bp) shorter than the target interval",
                    reference_template_sequence.len()
                ),
            });
        }

        let template_sequence = match bisulfite {
            Some(conv) => {
                let contig_len = reference.sequence_length(&region.chrom).unwrap_or(plan.template_end);
                let next_base = if plan.template_end < contig_len {
                    reference
                        .fetch(&region.chrom, plan.template_end, plan.template_end + 1)
                        .map_err(tag)?
                        .bytes()
                        .next()
                } else {
                    None
                };
                bisulfite_convert(&reference_template_sequence, plan.template_start, next_base, conv.policy, &conv.pattern)
            }
            None => reference_template_sequence.clone(),
        };
        debug!(
            "window {}:{}-{} for {} (target {}..={})",
            region.chrom, plan.template_start, plan.template_end, region, plan.target_start_index, plan.target_end_index
        );
        Ok(Self { region: region.clone(), plan, template_sequence, reference_template_sequence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::{BisulfitePolicy, MethylationPattern};
    use crate::reference::InMemoryReference;

    fn contig(len: usize) -> String { "ACGTTGCAAC".repeat(len / 10 + 1)[..len].to_string() }

    #[test]
    fn symmetric_window_of_max_length() {
        let region = Region::new("chr1", 1000, 1020, None).unwrap();
        let plan = WindowPlan::new(&region, 120);
        assert_eq!(plan.len(), 120);
        // extra = 99 -> 49 upstream, 50 downstream
        assert_eq!((plan.template_start, plan.template_end), (951, 1070));
        assert_eq!(plan.target_end_index - plan.target_start_index + 1, 21);
    }

    #[test]
    fn wide_target_gets_no_flank_and_start_clamps() {
        let region = Region::new("chr1", 100, 300, None).unwrap();
        let plan = WindowPlan::new(&region, 120);
        assert_eq!((plan.template_start, plan.template_end), (100, 300));

        let near_start = Region::new("chr1", 10, 20, None).unwrap();
        let plan = WindowPlan::new(&near_start, 120);
        assert_eq!(plan.template_start, 1);
        assert_eq!(plan.target_start_index, 9);
    }

    #[test]
    fn target_relocalizes_in_fetched_template() {
        let seq = contig(2000);
        let reference = InMemoryReference::new().with_contig("chr1", &seq);
        let region = Region::new("chr1", 1000, 1020, None).unwrap();
        let w = TemplateWindow::build(&region, 120, &reference, None).unwrap();
        assert_eq!(w.template_sequence.len(), 120);
        assert_eq!(&w.template_sequence[w.target_start_index()..=w.target_end_index()], &seq[999..1020]);
        assert_eq!(w.template_sequence, w.reference_template_sequence);
    }

    #[test]
    fn fetch_errors_carry_region_id() {
        let reference = InMemoryReference::new().with_contig("chr1", &contig(100));
        let region = Region::new("chr1", 90, 95, Some("NEAR_END".into())).unwrap();
        match TemplateWindow::build(&region, 120, &reference, None) {
            Err(DesignError::ReferenceFetch { region, .. }) => assert_eq!(region, "NEAR_END"),
            other => panic!("unexpected {other:?}"),
        }
        let missing = Region::new("chrZ", 10, 20, None).unwrap();
        assert!(matches!(TemplateWindow::build(&missing, 120, &reference, None), Err(DesignError::ReferenceFetch { .. })));
    }

    #[test]
    fn bisulfite_keeps_reference_template() {
        let seq = format!("{}CG", "AC".repeat(60));
        let reference = InMemoryReference::new().with_contig("chr1", &seq);
        let region = Region::new("chr1", 50, 60, None).unwrap();
        let conv = BisulfiteConversion { policy: BisulfitePolicy::Methylated, pattern: MethylationPattern::default() };
        let w = TemplateWindow::build(&region, 20, &reference, Some(&conv)).unwrap();
        assert!(w.reference_template_sequence.contains('C'));
        assert!(!w.template_sequence.contains('C'));
        assert_eq!(w.template_sequence.len(), w.reference_template_sequence.len());
    }
}
