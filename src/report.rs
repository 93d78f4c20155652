//! Tabular output: candidate tables (all / QC-passed), the parameters table and
//! a compact standard-column view, as polars `DataFrame`s and CSV files.
//!
//! Column dtypes are fixed per key (not inferred from data), so tables from
//! different regions always stack.
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use polars::prelude::*;

use crate::amplicon::{AmpliconRecord, FieldValue};
use crate::pipeline::RegionDesign;

/// Compact column set for quick review; probe columns only in probe mode.
pub fn standard_columns(probe_mode: bool) -> Vec<String> {
    let mut cols: Vec<String> =
        ["reference_template_sequence", "amplicon_sequence", "amplicon_length"].iter().map(|s| s.to_string()).collect();
    let roles: &[&str] = if probe_mode { &["forward", "reverse", "probe"] } else { &["forward", "reverse"] };
    for role in roles {
        for field in ["sequence", "tm", "gc_percent", "hairpin_tm", "homodimer_dg"] {
            cols.push(format!("{role}_{field}"));
        }
    }
    cols.extend(["heterodimer_dg".to_string(), "heterodimer_tm".to_string()]);
    cols
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    All,
    Passed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Text,
    Int,
    Float,
    Bool,
}

fn kind_of(key: &str) -> Kind {
    if key == "region" || key.ends_with("_sequence") || key.ends_with("_strand") {
        Kind::Text
    } else if key.ends_with("_found") {
        Kind::Bool
    } else if key.ends_with("_length") || key.ends_with("_index") || key.ends_with("_count") {
        Kind::Int
    } else {
        Kind::Float
    }
}

fn column(key: &str, values: Vec<Option<&FieldValue>>) -> Series {
    match kind_of(key) {
        Kind::Text => Series::new(
            key,
            values.iter().map(|v| v.filter(|v| !v.is_missing()).map(|v| v.to_string())).collect::<Vec<Option<String>>>(),
        ),
        Kind::Int => Series::new(
            key,
            values
                .iter()
                .map(|v| match v {
                    Some(FieldValue::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<Option<i64>>>(),
        ),
        Kind::Bool => Series::new(
            key,
            values
                .iter()
                .map(|v| match v {
                    Some(FieldValue::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<Option<bool>>>(),
        ),
        Kind::Float => Series::new(key, values.iter().map(|v| v.and_then(FieldValue::as_f64)).collect::<Vec<Option<f64>>>()),
    }
}

/// One frame over `(region_id, record)` rows with the given columns.
pub fn records_frame(rows: &[(String, &AmpliconRecord)], columns: &[String]) -> PolarsResult<DataFrame> {
    let mut series = vec![Series::new("region", rows.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>())];
    for key in columns {
        series.push(column(key, rows.iter().map(|(_, r)| r.get(key)).collect()));
    }
    DataFrame::new(series)
}

/// Candidate table over every design, in input order then rank order.
pub fn candidates_frame(designs: &[RegionDesign], table: Table, standard: bool) -> PolarsResult<DataFrame> {
    let mut columns: Vec<String> = Vec::new();
    for d in designs {
        let cols = if standard { standard_columns(d.probe_mode()) } else { d.columns() };
        for c in cols {
            if !columns.contains(&c) {
                columns.push(c);
            }
        }
    }
    let rows: Vec<(String, &AmpliconRecord)> = designs
        .iter()
        .flat_map(|d| {
            let records = match table {
                Table::All => &d.total,
                Table::Passed => &d.passed,
            };
            records.iter().map(move |r| (d.region.id(), r))
        })
        .collect();
    records_frame(&rows, &columns)
}

/// Effective parameters per region: `region, reference, parameter, value`.
pub fn parameters_frame(designs: &[RegionDesign]) -> PolarsResult<DataFrame> {
    let (mut region, mut reference, mut name, mut value) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for d in designs {
        for (k, v) in d.parameters.rows() {
            region.push(d.region.id());
            reference.push(d.reference.clone());
            name.push(k);
            value.push(v);
        }
    }
    df!(
        "region"    => region,
        "reference" => reference,
        "parameter" => name,
        "value"     => value,
    )
}

pub fn write_csv<W: Write>(df: &mut DataFrame, writer: W) -> PolarsResult<()> {
    CsvWriter::new(writer).include_header(true).finish(df)
}

/// Write `candidates.csv`, `qc_passed.csv` and `parameters.csv` into `out_dir`.
pub fn write_report(designs: &[RegionDesign], out_dir: &Path, standard: bool) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let tables = [
        ("candidates.csv", candidates_frame(designs, Table::All, standard)?),
        ("qc_passed.csv", candidates_frame(designs, Table::Passed, standard)?),
        ("parameters.csv", parameters_frame(designs)?),
    ];
    let mut written = Vec::with_capacity(tables.len());
    for (name, mut df) in tables {
        let path = out_dir.join(name);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        write_csv(&mut df, file).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
