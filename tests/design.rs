mod common;

use std::sync::Mutex;

use qprimer::amplicon::FieldValue;
use qprimer::config::Settings;
use qprimer::dna::reverse_complement;
use qprimer::error::{DesignError, Result};
use qprimer::params::DesignParameters;
use qprimer::pipeline::Designer;
use qprimer::qc::QcThresholds;
use qprimer::reference::ReferenceCatalog;
use qprimer::region::Region;
use qprimer::search::{EngineOutput, GlobalArgs, OligoDesigner, SequenceArgs};
use qprimer::thermo::NearestNeighbor;

type Script = dyn Fn(&SequenceArgs, &GlobalArgs) -> EngineOutput + Send + Sync;

/// Engine stand-in answering from a closure and recording every call.
struct Scripted {
    script: Box<Script>,
    calls: Mutex<Vec<(SequenceArgs, GlobalArgs)>>,
}

impl Scripted {
    fn new(script: impl Fn(&SequenceArgs, &GlobalArgs) -> EngineOutput + Send + Sync + 'static) -> Self {
        Self { script: Box::new(script), calls: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<(SequenceArgs, GlobalArgs)> { self.calls.lock().unwrap().clone() }
}

impl OligoDesigner for Scripted {
    fn name(&self) -> &str { "scripted" }

    fn design(&self, sequence: &SequenceArgs, global: &GlobalArgs) -> Result<EngineOutput> {
        self.calls.lock().unwrap().push((sequence.clone(), global.clone()));
        Ok((self.script)(sequence, global))
    }
}

fn forward(template: &str, start: usize, end: usize) -> String { template[start..end].to_string() }

fn reverse(template: &str, start: usize, end: usize) -> String { reverse_complement(&template[start..end]) }

struct Fixture {
    _dir: tempfile::TempDir,
    settings: Settings,
    catalog: ReferenceCatalog,
}

/// File-backed `toy` reference and permissive QC.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::from_json_file(common::write_settings(dir.path())).unwrap();
    settings.qc = QcThresholds::permissive();
    let catalog = settings.reference_catalog();
    Fixture { _dir: dir, settings, catalog }
}

fn target() -> Region { "chr1:301-320".parse().unwrap() }

fn primer_only() -> DesignParameters { DesignParameters { n_probes: Some(0), ..Default::default() } }

#[test]
fn single_pair_over_a_full_window() {
    let fx = fixture();
    let engine = Scripted::new(|seq, _| EngineOutput {
        left: vec![forward(&seq.template, 0, 20)],
        right: vec![reverse(&seq.template, 100, 120)],
        internal: vec![],
        pairs: 1,
    });
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    let mut params = primer_only();
    params.engine_args.insert("PRIMER_MAX_POLY_X".into(), "4".into());

    let design = designer.design(&target(), "toy", &params).unwrap();
    assert_eq!(design.total.len(), 1);
    assert_eq!(design.passed, design.total);

    let record = &design.total[0];
    let genome = common::genome();
    assert_eq!(record.get("template_sequence"), Some(&FieldValue::Text(genome[250..370].to_string())));
    assert_eq!(record.get("target_start_index"), Some(&FieldValue::Int(50)));
    assert_eq!(record.get("target_end_index"), Some(&FieldValue::Int(69)));
    assert_eq!(record.get("amplicon_length"), Some(&FieldValue::Int(120)));
    assert_eq!(record.get("reverse_strand"), Some(&FieldValue::Text("reverse".into())));
    assert_eq!(record.get("reverse_start_index"), Some(&FieldValue::Int(100)));
    assert!(record.get("probe_sequence").is_none());
    assert!(record.get("heterodimer_dg").is_some());

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let (seq, global) = &calls[0];
    assert_eq!(seq.target, Some((50, 20)));
    assert!(global.pick_left && global.pick_right && !global.pick_internal);
    assert_eq!(global.num_return, 10);
    assert_eq!(global.product_size, (80, 120));
    assert_eq!(global.passthrough.get("PRIMER_MAX_POLY_X").map(String::as_str), Some("4"));
}

#[test]
fn forged_oligo_is_dropped_and_valid_rank_kept() {
    let fx = fixture();
    let engine = Scripted::new(|seq, _| EngineOutput {
        left: vec!["ACGTACGTACGTACGTACGT".into(), forward(&seq.template, 5, 25)],
        right: vec![reverse(&seq.template, 100, 120), reverse(&seq.template, 95, 115)],
        internal: vec![],
        pairs: 2,
    });
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    let design = designer.design(&target(), "toy", &primer_only()).unwrap();
    assert_eq!(design.total.len(), 1);
    let genome = common::genome();
    assert_eq!(design.total[0].get("forward_sequence"), Some(&FieldValue::Text(genome[255..275].to_string())));
    assert_eq!(design.total[0].get("amplicon_length"), Some(&FieldValue::Int(110)));
}

#[test]
fn single_primer_ranks_reach_the_total_table() {
    let fx = fixture();
    let engine = Scripted::new(|seq, _| EngineOutput {
        left: vec![forward(&seq.template, 0, 20), forward(&seq.template, 5, 25)],
        right: vec![reverse(&seq.template, 100, 120)],
        internal: vec![],
        pairs: 1,
    });
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    let design = designer.design(&target(), "toy", &primer_only()).unwrap();
    assert_eq!(design.total.len(), 2);
    assert_eq!(design.passed, design.total);

    let lone = &design.total[1];
    assert!(lone.get("reverse_sequence").unwrap().is_missing());
    assert!(lone.get("amplicon_sequence").unwrap().is_missing());
    assert_eq!(lone.get("heterodimer_dg"), Some(&FieldValue::Float(0.0)));
    assert_eq!(lone.get("heterodimer_tm"), Some(&FieldValue::Float(0.0)));
}

#[test]
fn no_probe_candidates_is_an_empty_result() {
    let fx = fixture();
    let engine = Scripted::new(|_, _| EngineOutput::default());
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    let design = designer.design(&target(), "toy", &DesignParameters::default()).unwrap();
    assert!(design.probe_mode());
    assert!(design.total.is_empty());
    assert!(design.passed.is_empty());

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let (seq, global) = &calls[0];
    assert!(global.pick_internal && !global.pick_left && !global.pick_right);
    assert_eq!(seq.target, Some((50, 20)));
}

#[test]
fn probe_groups_follow_probe_rank() {
    let fx = fixture();
    let genome = common::genome();
    let t = &genome[250..370];
    let (p1, p2, off_target) = (forward(t, 45, 72), forward(t, 48, 73), forward(t, 0, 25));
    let first = p1.clone();
    let probes = vec![p1.clone(), off_target.clone(), p2.clone()];
    let engine = Scripted::new(move |seq, global| {
        if !global.pick_left {
            return EngineOutput { internal: probes.clone(), ..Default::default() };
        }
        let t = &seq.template;
        let n = if seq.internal_oligo.as_deref() == Some(first.as_str()) { 2 } else { 1 };
        let (left, right): (Vec<_>, Vec<_>) =
            [(0, 100), (5, 95)].iter().take(n).map(|&(l, r)| (forward(t, l, l + 20), reverse(t, r, r + 20))).unzip();
        EngineOutput { left, right, internal: vec![], pairs: n }
    });
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    let design = designer.design(&target(), "toy", &DesignParameters::default()).unwrap();

    let probe_of = |i: usize| design.total[i].get("probe_sequence").and_then(FieldValue::as_str).map(str::to_string);
    assert_eq!(design.total.len(), 3);
    assert_eq!(probe_of(0).as_deref(), Some(p1.as_str()));
    assert_eq!(probe_of(1).as_deref(), Some(p1.as_str()));
    assert_eq!(probe_of(2).as_deref(), Some(p2.as_str()));
    assert_eq!(design.total[1].get("amplicon_length"), Some(&FieldValue::Int(110)));

    let calls = engine.calls();
    assert_eq!(calls.len(), 3);
    for (seq, global) in &calls[1..] {
        assert!(seq.internal_oligo.is_some());
        assert_eq!(global.primer.tm.opt, global.primer.tm.max);
        assert!(global.primer.tm.min < global.primer.tm.max);
    }
    assert_eq!(calls[2].0.internal_oligo.as_deref(), Some(p2.as_str()));
    assert!(calls.iter().all(|(seq, _)| seq.internal_oligo.as_deref() != Some(off_target.as_str())));
}

#[test]
fn bisulfite_template_goes_to_the_engine() {
    let fx = fixture();
    let engine = Scripted::new(|_, _| EngineOutput::default());
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    let params = DesignParameters { bisulfite: Some(true), ..primer_only() };
    let design = designer.design(&target(), "toy", &params).unwrap();
    assert!(design.total.is_empty());

    let calls = engine.calls();
    let template = calls[0].0.template.as_bytes();
    let genome = common::genome();
    assert_ne!(calls[0].0.template, genome[250..370]);
    for i in 0..template.len() - 1 {
        if template[i] == b'C' {
            assert_eq!(template[i + 1], b'G', "non-CpG C survived at {i}");
        }
    }
}

#[test]
fn batch_keeps_order_and_isolates_failures() {
    let fx = fixture();
    let engine = Scripted::new(|seq, _| {
        let t = &seq.template;
        EngineOutput { left: vec![forward(t, 0, 20)], right: vec![reverse(t, t.len() - 20, t.len())], internal: vec![], pairs: 1 }
    });
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    let regions = vec![
        Region::new("chr1", 301, 320, Some("T1".into())).unwrap(),
        Region::new("chrX", 301, 320, Some("T2".into())).unwrap(),
        Region::new("chr1", 590, 600, Some("T3".into())).unwrap(),
        Region::new("chr1", 151, 170, Some("T4".into())).unwrap(),
    ];
    let results = designer.design_batch(&regions, "toy", &primer_only(), Some(3)).unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().region.id(), "T1");
    match &results[1] {
        Err(DesignError::ReferenceFetch { region, .. }) => assert_eq!(region, "T2"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(results[2], Err(DesignError::ReferenceFetch { .. })));
    assert_eq!(results[3].as_ref().unwrap().total.len(), 1);
}

#[test]
fn unknown_reference_carries_region() {
    let fx = fixture();
    let engine = Scripted::new(|_, _| EngineOutput::default());
    let designer = Designer { settings: &fx.settings, references: &fx.catalog, thermo: &NearestNeighbor, designer: &engine };
    match designer.design(&target(), "hg38", &primer_only()) {
        Err(DesignError::UnknownReference { reference, region }) => {
            assert_eq!(reference, "hg38");
            assert_eq!(region, "chr1:301-320");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(engine.calls().is_empty());
}
