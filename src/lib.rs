#![forbid(unsafe_code)]
//! # qprimer
//!
//! qPCR **primer/probe design** for genomic target regions: build a template
//! window around the target, search ranked primer pairs (and optionally a
//! target-covering hydrolysis probe), assemble amplicon candidates and filter
//! them by thermodynamic **QC** (hairpin, homodimer, heterodimer).
//!
//! ## Highlights
//! - 🧬 **Two search modes**: primer-only, or probe-first with primer Tm pinned below each probe.
//! - 🌡️ **Built-in thermodynamics**: nearest-neighbour Tm and secondary structures, no external binary needed.
//! - 🔌 **Pluggable engines**: native picker or `primer3_core`, behind one trait.
//! - 🧵 **Batch mode**: regions run in parallel; one failing region never stops the rest.
//!
//! ## Examples
//! ```rust
//! use std::sync::Arc;
//! use qprimer::config::Settings;
//! use qprimer::params::DesignParameters;
//! use qprimer::pipeline::Designer;
//! use qprimer::picker::NativePicker;
//! use qprimer::reference::{InMemoryReference, ReferenceCatalog};
//! use qprimer::region::Region;
//! use qprimer::thermo::NearestNeighbor;
//!
//! let settings = Settings::default();
//! let catalog = ReferenceCatalog::default();
//! catalog.register("toy", Arc::new(InMemoryReference::new().with_contig("chr1", &"ACGTTGCAAC".repeat(50))));
//! let picker = NativePicker::new(NearestNeighbor);
//! let designer = Designer { settings: &settings, references: &catalog, thermo: &NearestNeighbor, designer: &picker };
//! let region: Region = "chr1:200-220".parse().unwrap();
//! let params = DesignParameters { n_probes: Some(0), ..Default::default() };
//! let design = designer.design(&region, "toy", &params).unwrap();
//! assert!(design.passed.len() <= design.total.len());
//! ```
//!
//! ## Version
//! See [`VERSION`].

pub mod error;
pub mod region;
pub mod dna;
pub mod reference;
pub mod config;
pub mod params;
pub mod window;
pub mod thermo;
pub mod oligo;
pub mod amplicon;
pub mod search;
pub mod picker;
pub mod primer3;
pub mod probe;
pub mod qc;
pub mod pipeline;
pub mod report;

use config::{EngineKind, EngineSettings};
use search::OligoDesigner;
use thermo::{Conditions, NearestNeighbor, ThermoEngine};

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Instantiate the oligo-search engine selected in the settings.
pub fn oligo_designer(engine: &EngineSettings) -> Box<dyn OligoDesigner + Send + Sync> {
    match engine.kind {
        EngineKind::Native => Box::new(picker::NativePicker::new(NearestNeighbor)),
        EngineKind::Primer3 => Box::new(primer3::Primer3Core::new(&engine.primer3_path)),
    }
}

/// `(metric, value)` rows describing one oligo: length, GC, Tm and self-structures.
///
/// # Examples
/// ```
/// let rows = qprimer::oligo_rows("AGCTTGCATGCCTGCAGGTCGACT", &Default::default());
/// assert_eq!(rows[0], ("length".to_string(), "24".to_string()));
/// ```
pub fn oligo_rows(seq: &str, conditions: &Conditions) -> Vec<(String, String)> {
    let seq = seq.to_ascii_uppercase();
    let hairpin = NearestNeighbor.calc_hairpin(&seq, conditions);
    let homodimer = NearestNeighbor.calc_homodimer(&seq, conditions);
    vec![
        ("length".into(), seq.len().to_string()),
        ("gc_percent".into(), format!("{:.2}", dna::gc_percent(&seq))),
        ("tm".into(), format!("{:.2}", NearestNeighbor.calc_tm(&seq, conditions))),
        ("hairpin_found".into(), hairpin.structure_found.to_string()),
        ("hairpin_tm".into(), format!("{:.2}", hairpin.tm)),
        ("hairpin_dg".into(), format!("{:.2}", hairpin.dg)),
        ("homodimer_found".into(), homodimer.structure_found.to_string()),
        ("homodimer_tm".into(), format!("{:.2}", homodimer.tm)),
        ("homodimer_dg".into(), format!("{:.2}", homodimer.dg)),
    ]
}
