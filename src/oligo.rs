//! Designed oligonucleotides: location in the template, thermodynamics and
//! CpG-derived counts.
use core::fmt;

use crate::amplicon::FieldValue;
use crate::dna::{count_cpg, count_cytosine, gc_percent, reverse_complement};
use crate::error::{DesignError, Result};
use crate::thermo::{Conditions, ThermoEngine, ThermoResult};

/// Template strand an oligo matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Forward => "forward",
            Strand::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Role of an oligo within an amplicon; also the record key prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Forward,
    Reverse,
    Probe,
}

impl Role {
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Forward => "forward",
            Role::Reverse => "reverse",
            Role::Probe => "probe",
        }
    }
}

/// Per-oligo record fields, in output order.
pub const OLIGO_FIELDS: [&str; 15] = [
    "sequence",
    "strand",
    "length",
    "start_index",
    "end_index",
    "tm",
    "gc_percent",
    "hairpin_found",
    "hairpin_tm",
    "hairpin_dg",
    "homodimer_found",
    "homodimer_tm",
    "homodimer_dg",
    "cpg_count",
    "non_cpg_cytosine_count",
];

/// Locate `sequence` in `template`: exact match first, then its reverse complement.
///
/// Returns 0-based inclusive `(start, end)` and the matching strand.
///
/// # Examples
/// ```
/// use qprimer::oligo::{locate, Strand};
/// assert_eq!(locate("GGT", "AAGGTAA").unwrap(), (2, 4, Strand::Forward));
/// assert_eq!(locate("ACC", "AAGGTAA").unwrap(), (2, 4, Strand::Reverse));
/// assert!(locate("CCCC", "AAGGTAA").is_err());
/// ```
pub fn locate(sequence: &str, template: &str) -> Result<(usize, usize, Strand)> {
    let not_located = || DesignError::OligoNotLocated { sequence: sequence.to_string() };
    if sequence.is_empty() {
        return Err(not_located());
    }
    let end = |start: usize| start + sequence.len() - 1;
    if let Some(start) = template.find(sequence) {
        return Ok((start, end(start), Strand::Forward));
    }
    template
        .find(&reverse_complement(sequence))
        .map(|start| (start, end(start), Strand::Reverse))
        .ok_or_else(not_located)
}

/// Strand-oriented window of `reference` used for CpG counting.
///
/// Forward: `[start, end + 1]` so a trailing C can pair with the next G.
/// Reverse: reverse complement of `[start - 1, end]` for the same reason on the
/// other strand. Both are clamped to the template.
fn cpg_window(reference: &str, start: usize, end: usize, strand: Strand) -> String {
    let n = reference.len();
    match strand {
        Strand::Forward => reference[start.min(n)..(end + 2).min(n)].to_string(),
        Strand::Reverse => reverse_complement(&reference[start.saturating_sub(1).min(n)..(end + 1).min(n)]),
    }
}

fn footprint(reference: &str, start: usize, end: usize, strand: Strand) -> String {
    let n = reference.len();
    let slice = &reference[start.min(n)..(end + 1).min(n)];
    match strand {
        Strand::Forward => slice.to_string(),
        Strand::Reverse => reverse_complement(slice),
    }
}

/// CpG dinucleotides at an oligo's binding site on `strand`.
pub fn cpg_in_range(reference: &str, start: usize, end: usize, strand: Strand) -> usize {
    count_cpg(&cpg_window(reference, start, end, strand))
}

/// Cytosines at the binding site that are not part of a CpG.
pub fn non_cpg_cytosine_in_range(reference: &str, start: usize, end: usize, strand: Strand) -> usize {
    count_cytosine(&footprint(reference, start, end, strand)).saturating_sub(cpg_in_range(reference, start, end, strand))
}

/// One designed primer or probe.
#[derive(Clone, Debug, PartialEq)]
pub struct Oligo {
    pub sequence: String,
    pub strand: Strand,
    pub role: Role,
    /// 0-based inclusive offsets into the template window.
    pub start_index: usize,
    pub end_index: usize,
    pub tm: f64,
    pub gc_percent: f64,
    pub hairpin: ThermoResult,
    pub homodimer: ThermoResult,
    pub cpg_count: usize,
    pub non_cpg_cytosine_count: usize,
}

impl Oligo {
    /// Locate `sequence` in `template` and evaluate it.
    ///
    /// CpG counts come from `reference_template`, which differs from `template`
    /// only when the search ran on a bisulfite-converted window.
    pub fn evaluate(
        sequence: &str,
        role: Role,
        template: &str,
        reference_template: &str,
        thermo: &dyn ThermoEngine,
        conditions: &Conditions,
    ) -> Result<Self> {
        let sequence = sequence.to_ascii_uppercase();
        let (start_index, end_index, strand) = locate(&sequence, template)?;
        Ok(Self {
            tm: thermo.calc_tm(&sequence, conditions),
            gc_percent: gc_percent(&sequence),
            hairpin: thermo.calc_hairpin(&sequence, conditions),
            homodimer: thermo.calc_homodimer(&sequence, conditions),
            cpg_count: cpg_in_range(reference_template, start_index, end_index, strand),
            non_cpg_cytosine_count: non_cpg_cytosine_in_range(reference_template, start_index, end_index, strand),
            sequence,
            strand,
            role,
            start_index,
            end_index,
        })
    }

    pub fn len(&self) -> usize { self.sequence.len() }

    pub fn is_empty(&self) -> bool { self.sequence.is_empty() }

    /// Whether the last `n` bases of the oligo match `reference` at its binding site.
    ///
    /// Useful after bisulfite conversion: a mismatching 3' end will not extend
    /// on unconverted template.
    pub fn three_prime_matches(&self, n: usize, reference: &str) -> bool {
        let n = n.min(self.len());
        let site = footprint(reference, self.start_index, self.end_index, self.strand);
        site.len() == self.len() && site[site.len() - n..] == self.sequence[self.len() - n..]
    }

    /// Record values in [`OLIGO_FIELDS`] order.
    pub fn field_values(&self) -> [FieldValue; 15] {
        [
            FieldValue::Text(self.sequence.clone()),
            FieldValue::Text(self.strand.as_str().to_string()),
            FieldValue::Int(self.len() as i64),
            FieldValue::Int(self.start_index as i64),
            FieldValue::Int(self.end_index as i64),
            FieldValue::Float(self.tm),
            FieldValue::Float(self.gc_percent),
            FieldValue::Bool(self.hairpin.structure_found),
            FieldValue::Float(self.hairpin.tm),
            FieldValue::Float(self.hairpin.dg),
            FieldValue::Bool(self.homodimer.structure_found),
            FieldValue::Float(self.homodimer.tm),
            FieldValue::Float(self.homodimer.dg),
            FieldValue::Int(self.cpg_count as i64),
            FieldValue::Int(self.non_cpg_cytosine_count as i64),
        ]
    }
}
