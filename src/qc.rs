//! Threshold QC over flattened amplicon records.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::amplicon::{AmpliconRecord, FieldValue};
use crate::error::{DesignError, Result};
use crate::thermo::{Conditions, ThermoEngine};

/// Secondary-structure cutoffs; all energies in kcal/mol, temperatures in °C.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcThresholds {
    pub hairpin_max_tm: f64,
    pub hairpin_min_dg: f64,
    pub homodimer_min_dg: f64,
    pub heterodimer_min_dg: f64,
    pub heterodimer_max_tm: f64,
}

impl Default for QcThresholds {
    fn default() -> Self {
        Self {
            hairpin_max_tm: 47.0,
            hairpin_min_dg: -5.0,
            homodimer_min_dg: -6.0,
            heterodimer_min_dg: -6.0,
            heterodimer_max_tm: 45.0,
        }
    }
}

impl QcThresholds {
    /// Thresholds that accept every record.
    pub fn permissive() -> Self {
        Self {
            hairpin_max_tm: f64::INFINITY,
            hairpin_min_dg: f64::NEG_INFINITY,
            homodimer_min_dg: f64::NEG_INFINITY,
            heterodimer_min_dg: f64::NEG_INFINITY,
            heterodimer_max_tm: f64::INFINITY,
        }
    }

    /// Pass/fail for a record already carrying heterodimer metrics.
    ///
    /// Absent numeric fields count as `0.0`, the "no structure" value.
    pub fn passes(&self, record: &AmpliconRecord) -> bool {
        let v = |key: &str| record.get(key).and_then(FieldValue::as_f64).unwrap_or(0.0);
        let hairpin = ["forward", "reverse"]
            .iter()
            .all(|r| v(&format!("{r}_hairpin_tm")) <= self.hairpin_max_tm && v(&format!("{r}_hairpin_dg")) >= self.hairpin_min_dg);
        let homodimer = ["forward", "reverse"].iter().all(|r| v(&format!("{r}_homodimer_dg")) >= self.homodimer_min_dg);
        let heterodimer = v("heterodimer_dg") >= self.heterodimer_min_dg && v("heterodimer_tm") <= self.heterodimer_max_tm;
        hairpin && homodimer && heterodimer
    }
}

/// QC outcome for one candidate list; both lists keep input rank order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QcReport {
    pub total: Vec<AmpliconRecord>,
    pub passed: Vec<AmpliconRecord>,
}

/// `Some(sequence)`, `None` for a primer the rank lacks, or `MalformedAmplicon`.
fn primer_sequence(record: &AmpliconRecord, key: &str) -> Result<Option<String>> {
    match record.get(key) {
        Some(FieldValue::Missing) => Ok(None),
        Some(FieldValue::Text(s)) => Ok(Some(s.clone())),
        _ => Err(DesignError::MalformedAmplicon { field: key.to_string() }),
    }
}

/// Runs heterodimer evaluation and threshold filtering.
pub struct QcEvaluator<'a> {
    pub thermo: &'a (dyn ThermoEngine + Sync),
    pub conditions: &'a Conditions,
    pub thresholds: &'a QcThresholds,
}

impl QcEvaluator<'_> {
    /// Add `heterodimer_dg` / `heterodimer_tm` to `record` and test it.
    ///
    /// A record holding only one primer has no heterodimer and gets `0.0` for
    /// both; a sequence key that is absent or not text is malformed.
    pub fn evaluate(&self, mut record: AmpliconRecord) -> Result<(AmpliconRecord, bool)> {
        let forward = primer_sequence(&record, "forward_sequence")?;
        let reverse = primer_sequence(&record, "reverse_sequence")?;
        let (dg, tm) = match (forward, reverse) {
            (Some(f), Some(r)) => {
                let hetero = self.thermo.calc_heterodimer(&f, &r, self.conditions);
                if hetero.structure_found { (hetero.dg, hetero.tm) } else { (0.0, 0.0) }
            }
            _ => (0.0, 0.0),
        };
        record.set("heterodimer_dg", FieldValue::Float(dg));
        record.set("heterodimer_tm", FieldValue::Float(tm));
        let pass = self.thresholds.passes(&record);
        Ok((record, pass))
    }

    /// Evaluate every record; malformed ones are logged and skipped.
    pub fn run(&self, records: Vec<AmpliconRecord>) -> QcReport {
        let mut report = QcReport::default();
        for (rank, record) in records.into_iter().enumerate() {
            match self.evaluate(record) {
                Ok((record, pass)) => {
                    if pass {
                        report.passed.push(record.clone());
                    }
                    report.total.push(record);
                }
                Err(e) => warn!("skipping candidate {rank}: {e}"),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermo::ThermoResult;

    /// Reports a fixed heterodimer; hairpins/homodimers are never queried here.
    struct FixedDimer(ThermoResult);

    impl ThermoEngine for FixedDimer {
        fn calc_tm(&self, _: &str, _: &Conditions) -> f64 { 60.0 }
        fn calc_hairpin(&self, _: &str, _: &Conditions) -> ThermoResult { ThermoResult::none() }
        fn calc_heterodimer(&self, _: &str, _: &str, _: &Conditions) -> ThermoResult { self.0 }
    }

    fn record(hairpin_dg: f64) -> AmpliconRecord {
        let mut r = AmpliconRecord::new();
        r.set("forward_sequence", FieldValue::Text("ACGTACGTAC".into()));
        r.set("reverse_sequence", FieldValue::Text("TTGCATGCAA".into()));
        for role in ["forward", "reverse"] {
            r.set(&format!("{role}_hairpin_tm"), FieldValue::Float(30.0));
            r.set(&format!("{role}_hairpin_dg"), FieldValue::Float(hairpin_dg));
            r.set(&format!("{role}_homodimer_dg"), FieldValue::Float(-3.0));
        }
        r
    }

    #[test]
    fn no_structure_collapses_to_neutral_zero() {
        let thermo = FixedDimer(ThermoResult { structure_found: false, tm: 12.0, dg: -2.0, dh: 0.0, ds: 0.0 });
        let qc = QcEvaluator { thermo: &thermo, conditions: &Conditions::default(), thresholds: &QcThresholds::default() };
        let (r, pass) = qc.evaluate(record(-1.0)).unwrap();
        assert_eq!(r.get("heterodimer_dg"), Some(&FieldValue::Float(0.0)));
        assert_eq!(r.get("heterodimer_tm"), Some(&FieldValue::Float(0.0)));
        assert!(pass);
    }

    #[test]
    fn strong_heterodimer_fails() {
        let thermo = FixedDimer(ThermoResult { structure_found: true, tm: 50.0, dg: -9.0, dh: -60.0, ds: -170.0 });
        let qc = QcEvaluator { thermo: &thermo, conditions: &Conditions::default(), thresholds: &QcThresholds::default() };
        let report = qc.run(vec![record(-1.0)]);
        assert_eq!(report.total.len(), 1);
        assert!(report.passed.is_empty());
    }

    #[test]
    fn tightening_never_grows_passed() {
        let thermo = FixedDimer(ThermoResult::none());
        let records: Vec<_> = [-1.0, -3.0, -4.5, -7.0].into_iter().map(record).collect();
        let loose = QcThresholds::default();
        let tight = QcThresholds { hairpin_min_dg: -2.0, ..loose };
        let c = Conditions::default();
        let run = |t: &QcThresholds| QcEvaluator { thermo: &thermo, conditions: &c, thresholds: t }.run(records.clone());
        let (l, t) = (run(&loose), run(&tight));
        assert_eq!(l.total.len(), t.total.len());
        assert_eq!(l.passed.len(), 3);
        assert_eq!(t.passed.len(), 1);
        assert_eq!(run(&QcThresholds::permissive()).passed, l.total);
    }

    #[test]
    fn malformed_record_is_skipped() {
        let thermo = FixedDimer(ThermoResult::none());
        let qc = QcEvaluator { thermo: &thermo, conditions: &Conditions::default(), thresholds: &QcThresholds::default() };
        let mut wrong_type = record(-1.0);
        wrong_type.set("reverse_sequence", FieldValue::Int(7));
        assert!(matches!(qc.evaluate(wrong_type.clone()), Err(DesignError::MalformedAmplicon { .. })));
        let mut no_key = AmpliconRecord::new();
        no_key.set("forward_sequence", FieldValue::Text("ACGTACGTAC".into()));
        assert!(matches!(qc.evaluate(no_key.clone()), Err(DesignError::MalformedAmplicon { .. })));
        let report = qc.run(vec![wrong_type, no_key, record(-1.0)]);
        assert_eq!(report.total.len(), 1);
        assert_eq!(report.passed.len(), 1);
    }

    #[test]
    fn single_primer_rank_has_no_heterodimer() {
        let thermo = FixedDimer(ThermoResult { structure_found: true, tm: 50.0, dg: -9.0, dh: -60.0, ds: -170.0 });
        let qc = QcEvaluator { thermo: &thermo, conditions: &Conditions::default(), thresholds: &QcThresholds::default() };
        let mut forward_only = record(-1.0);
        forward_only.set("reverse_sequence", FieldValue::Missing);
        let (r, pass) = qc.evaluate(forward_only.clone()).unwrap();
        assert_eq!(r.get("heterodimer_dg"), Some(&FieldValue::Float(0.0)));
        assert_eq!(r.get("heterodimer_tm"), Some(&FieldValue::Float(0.0)));
        assert!(pass);
        let report = qc.run(vec![record(-1.0), forward_only]);
        assert_eq!(report.total.len(), 2);
        assert_eq!(report.passed.len(), 1);
    }
}
