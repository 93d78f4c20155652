//! Region → ranked, QC-annotated amplicon candidates.
//!
//! ### Concurrency
//! A design call touches only shared read-only state (settings, the reference
//! catalog, the engines), so [`Designer::design_batch`] runs one region per
//! rayon worker with no coordination. Engines must be `Sync`; wrap one that is
//! not in [`crate::thermo::Serialized`]. A failing region yields its own `Err`
//! and never affects its siblings.
use log::{info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::amplicon::{record_schema, AmpliconRecord};
use crate::config::Settings;
use crate::error::{DesignError, Result};
use crate::params::{DesignParameters, ResolvedParameters};
use crate::probe::CandidateSearch;
use crate::qc::QcEvaluator;
use crate::reference::ReferenceCatalog;
use crate::region::Region;
use crate::search::OligoDesigner;
use crate::thermo::ThermoEngine;
use crate::window::TemplateWindow;

/// Result of designing one region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionDesign {
    pub region: Region,
    pub reference: String,
    pub parameters: ResolvedParameters,
    /// Every surviving candidate, QC-annotated, in rank order.
    pub total: Vec<AmpliconRecord>,
    /// The subset of `total` that passed QC, same order.
    pub passed: Vec<AmpliconRecord>,
}

impl RegionDesign {
    pub fn probe_mode(&self) -> bool { self.parameters.probe_mode() }

    /// Column order shared by `total` and `passed`.
    pub fn columns(&self) -> Vec<String> {
        let mut cols = record_schema(self.probe_mode());
        cols.extend(["heterodimer_dg".to_string(), "heterodimer_tm".to_string()]);
        cols
    }
}

/// The design entry point; cheap to construct, borrows everything.
pub struct Designer<'a> {
    pub settings: &'a Settings,
    pub references: &'a ReferenceCatalog,
    pub thermo: &'a (dyn ThermoEngine + Sync),
    pub designer: &'a (dyn OligoDesigner + Sync),
}

impl Designer<'_> {
    /// Design primers (and probes, unless `n_probes == 0`) for `region`.
    ///
    /// An empty `total` is a normal outcome, not an error.
    pub fn design(&self, region: &Region, reference_name: &str, params: &DesignParameters) -> Result<RegionDesign> {
        region.validate()?;
        let reference = self.references.handle(reference_name)?.ok_or_else(|| DesignError::UnknownReference {
            reference: reference_name.to_string(),
            region: region.id(),
        })?;
        let parameters = params.resolve(&self.settings.design)?;
        let conditions = &self.settings.conditions;

        let window = TemplateWindow::build(region, parameters.max_amplicon_length, reference.as_ref(), parameters.bisulfite.as_ref())?;
        let search = CandidateSearch {
            window: &window,
            params: &parameters,
            conditions,
            designer: self.designer,
            thermo: self.thermo,
        };
        let amplicons = search.run()?;
        let records = amplicons.iter().map(|a| a.to_record(parameters.probe_mode())).collect();
        let qc = QcEvaluator { thermo: self.thermo, conditions, thresholds: &self.settings.qc };
        let report = qc.run(records);

        if report.total.is_empty() {
            warn!("{region}: no candidates ({} engine, reference {reference_name})", self.designer.name());
        }
        info!("{region}: {} candidates, {} passed QC", report.total.len(), report.passed.len());
        Ok(RegionDesign {
            region: region.clone(),
            reference: reference_name.to_string(),
            parameters,
            total: report.total,
            passed: report.passed,
        })
    }

    /// Design many regions in parallel; output order follows `regions`.
    ///
    /// `threads` defaults to the number of CPUs.
    pub fn design_batch(
        &self,
        regions: &[Region],
        reference_name: &str,
        params: &DesignParameters,
        threads: Option<usize>,
    ) -> Result<Vec<Result<RegionDesign>>> {
        let n = threads.unwrap_or_else(num_cpus::get).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| DesignError::engine(format!("thread pool: {e}")))?;
        let results: Vec<Result<RegionDesign>> =
            pool.install(|| regions.par_iter().map(|r| self.design(r, reference_name, params)).collect());
        for (region, result) in regions.iter().zip(&results) {
            if let Err(e) = result {
                warn!("{region}: {e}");
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::picker::NativePicker;
    use crate::reference::InMemoryReference;
    use crate::thermo::NearestNeighbor;

    fn catalog() -> ReferenceCatalog {
        let catalog = ReferenceCatalog::default();
        catalog.register("toy", Arc::new(InMemoryReference::new().with_contig("chr1", &"ACGTTGCAAC".repeat(40))));
        catalog
    }

    #[test]
    fn unknown_reference_and_invalid_region() {
        let settings = Settings::default();
        let catalog = catalog();
        let picker = NativePicker::new(NearestNeighbor);
        let d = Designer { settings: &settings, references: &catalog, thermo: &NearestNeighbor, designer: &picker };
        let region = Region::new("chr1", 100, 120, None).unwrap();
        match d.design(&region, "hg99", &DesignParameters::default()) {
            Err(DesignError::UnknownReference { reference, region }) => {
                assert_eq!(reference, "hg99");
                assert_eq!(region, "chr1:100-120");
            }
            other => panic!("unexpected {other:?}"),
        }
        let inverted = Region { chrom: "chr1".into(), start: 20, end: 10, name: None };
        assert!(matches!(d.design(&inverted, "toy", &DesignParameters::default()), Err(DesignError::InvalidRegion { .. })));
    }

    #[test]
    fn batch_isolates_failures() {
        let settings = Settings::default();
        let catalog = catalog();
        let picker = NativePicker::new(NearestNeighbor);
        let d = Designer { settings: &settings, references: &catalog, thermo: &NearestNeighbor, designer: &picker };
        let regions = vec![
            Region::new("chr1", 150, 170, None).unwrap(),
            Region::new("chrX", 150, 170, None).unwrap(),
            Region::new("chr1", 390, 399, None).unwrap(),
        ];
        let params = DesignParameters { n_probes: Some(0), ..Default::default() };
        let results = d.design_batch(&regions, "toy", &params, Some(2)).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(DesignError::ReferenceFetch { .. })));
        assert!(matches!(results[2], Err(DesignError::ReferenceFetch { .. })));
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.columns().len(), record_schema(false).len() + 2);
    }
}
