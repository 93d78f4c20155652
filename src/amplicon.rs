//! Amplicon candidates and their flattened record view.
//!
//! ### Record schema
//! A record is an ordered list of `(key, value)` pairs with a declared key set:
//! the amplicon fields below, then `forward_*` and `reverse_*` oligo fields,
//! then `probe_*` fields in probe mode only. A role with no oligo still emits
//! its keys, valued [`FieldValue::Missing`]. QC appends `heterodimer_dg` and
//! `heterodimer_tm`.
use core::fmt;

use log::warn;

use crate::error::Result;
use crate::oligo::{Oligo, Role, OLIGO_FIELDS};
use crate::search::EngineOutput;
use crate::thermo::{Conditions, ThermoEngine};
use crate::window::TemplateWindow;

/// Amplicon-level record fields, in output order.
pub const AMPLICON_FIELDS: [&str; 6] = [
    "reference_template_sequence",
    "template_sequence",
    "target_start_index",
    "target_end_index",
    "amplicon_sequence",
    "amplicon_length",
];

/// One cell of an [`AmpliconRecord`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Missing,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool { matches!(self, FieldValue::Missing) }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Missing => Ok(()),
        }
    }
}

/// Flattened, key-stable view of an amplicon.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AmpliconRecord {
    fields: Vec<(String, FieldValue)>,
}

impl AmpliconRecord {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replace the value under `key`, or append it.
    pub fn set(&mut self, key: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> { self.fields.iter().map(|(k, _)| k.as_str()) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> { self.fields.iter().map(|(k, v)| (k.as_str(), v)) }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

/// One candidate product: primer pair plus optional probe over a template window.
#[derive(Clone, Debug, PartialEq)]
pub struct Amplicon {
    pub template_sequence: String,
    pub reference_template_sequence: String,
    pub target_start_index: usize,
    pub target_end_index: usize,
    pub forward_primer: Option<Oligo>,
    pub reverse_primer: Option<Oligo>,
    pub probe: Option<Oligo>,
}

impl Amplicon {
    /// `template[forward.start ..= reverse.end]` when both primers are present.
    pub fn amplicon_sequence(&self) -> Option<&str> {
        let (f, r) = (self.forward_primer.as_ref()?, self.reverse_primer.as_ref()?);
        if f.start_index > r.end_index || r.end_index >= self.template_sequence.len() {
            return None;
        }
        Some(&self.template_sequence[f.start_index..=r.end_index])
    }

    pub fn amplicon_length(&self) -> Option<usize> { self.amplicon_sequence().map(str::len) }

    /// The probe spans the whole target interval.
    pub fn probe_covers_target(&self) -> bool {
        self.probe
            .as_ref()
            .is_some_and(|p| p.start_index <= self.target_start_index && p.end_index >= self.target_end_index)
    }

    /// Flatten into a record; `probe_mode` controls whether `probe_*` keys exist.
    pub fn to_record(&self, probe_mode: bool) -> AmpliconRecord {
        let mut record = AmpliconRecord::new();
        let amplicon_values = [
            FieldValue::Text(self.reference_template_sequence.clone()),
            FieldValue::Text(self.template_sequence.clone()),
            FieldValue::Int(self.target_start_index as i64),
            FieldValue::Int(self.target_end_index as i64),
            self.amplicon_sequence().map_or(FieldValue::Missing, |s| FieldValue::Text(s.to_string())),
            self.amplicon_length().map_or(FieldValue::Missing, |n| FieldValue::Int(n as i64)),
        ];
        for (key, value) in AMPLICON_FIELDS.iter().zip(amplicon_values) {
            record.set(key, value);
        }
        let mut roles = vec![(Role::Forward, &self.forward_primer), (Role::Reverse, &self.reverse_primer)];
        if probe_mode {
            roles.push((Role::Probe, &self.probe));
        }
        for (role, oligo) in roles {
            let values = oligo.as_ref().map(Oligo::field_values);
            for (i, field) in OLIGO_FIELDS.iter().enumerate() {
                let value = values.as_ref().map_or(FieldValue::Missing, |v| v[i].clone());
                record.set(&format!("{}_{field}", role.prefix()), value);
            }
        }
        record
    }
}

/// Every record key for a mode, before QC.
pub fn record_schema(probe_mode: bool) -> Vec<String> {
    let roles: &[Role] = if probe_mode { &[Role::Forward, Role::Reverse, Role::Probe] } else { &[Role::Forward, Role::Reverse] };
    AMPLICON_FIELDS
        .iter()
        .map(|f| f.to_string())
        .chain(roles.iter().flat_map(|r| OLIGO_FIELDS.iter().map(move |f| format!("{}_{f}", r.prefix()))))
        .collect()
}

/// Turns ranked engine output into amplicons, one per rank, in rank order.
pub struct Assembler<'a> {
    pub window: &'a TemplateWindow,
    pub thermo: &'a (dyn ThermoEngine + Sync),
    pub conditions: &'a Conditions,
    pub probe_mode: bool,
}

impl Assembler<'_> {
    fn oligo(&self, sequence: &str, role: Role) -> Result<Oligo> {
        Oligo::evaluate(
            sequence,
            role,
            &self.window.template_sequence,
            &self.window.reference_template_sequence,
            self.thermo,
            self.conditions,
        )
    }

    /// Build the amplicon for rank `rank`.
    ///
    /// `fixed_probe` stands in for the probe when the engine did not echo one.
    pub fn assemble_rank(&self, output: &EngineOutput, rank: usize, fixed_probe: Option<&Oligo>) -> Result<Amplicon> {
        let forward_primer = output.left.get(rank).map(|s| self.oligo(s, Role::Forward)).transpose()?;
        let reverse_primer = output.right.get(rank).map(|s| self.oligo(s, Role::Reverse)).transpose()?;
        let probe = if self.probe_mode {
            match output.internal.get(rank) {
                Some(s) => Some(self.oligo(s, Role::Probe)?),
                None => fixed_probe.cloned(),
            }
        } else {
            None
        };
        Ok(Amplicon {
            template_sequence: self.window.template_sequence.clone(),
            reference_template_sequence: self.window.reference_template_sequence.clone(),
            target_start_index: self.window.target_start_index(),
            target_end_index: self.window.target_end_index(),
            forward_primer,
            reverse_primer,
            probe,
        })
    }

    /// Assemble every rank, dropping unlocatable candidates and, in probe mode,
    /// candidates whose probe does not cover the target.
    pub fn assemble(&self, output: &EngineOutput, fixed_probe: Option<&Oligo>) -> Vec<Amplicon> {
        let mut amplicons = Vec::new();
        for rank in 0..output.rank_count() {
            let amplicon = match self.assemble_rank(output, rank, fixed_probe) {
                Ok(a) => a,
                Err(e) => {
                    warn!("{}: dropping rank {rank}: {e}", self.window.region);
                    continue;
                }
            };
            if amplicon.forward_primer.is_none() && amplicon.reverse_primer.is_none() {
                continue;
            }
            if self.probe_mode && !amplicon.probe_covers_target() {
                continue;
            }
            amplicons.push(amplicon);
        }
        amplicons
    }
}
