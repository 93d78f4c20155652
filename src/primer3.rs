//! `primer3_core` adapter.
//!
//! Arguments are written as a Boulder-IO record (`KEY=VALUE` lines closed by a
//! lone `=`) to the child's stdin; the reply is parsed the same way.
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::config::OligoConstraints;
use crate::error::{DesignError, Result};
use crate::search::{EngineOutput, GlobalArgs, Interval, OligoDesigner, SequenceArgs};

/// Runs an external `primer3_core` per search.
#[derive(Clone, Debug)]
pub struct Primer3Core {
    executable: PathBuf,
}

impl Primer3Core {
    pub fn new<P: AsRef<Path>>(executable: P) -> Self { Self { executable: executable.as_ref().to_path_buf() } }
}

fn intervals(regions: &[Interval]) -> String {
    regions.iter().map(|(s, l)| format!("{s},{l}")).collect::<Vec<_>>().join(" ")
}

fn bool_flag(v: bool) -> &'static str {
    if v { "1" } else { "0" }
}

fn push_constraints(lines: &mut Vec<(String, String)>, prefix: &str, c: &OligoConstraints) {
    lines.extend([
        (format!("{prefix}_OPT_SIZE"), c.length.opt.to_string()),
        (format!("{prefix}_MIN_SIZE"), c.length.min.to_string()),
        (format!("{prefix}_MAX_SIZE"), c.length.max.to_string()),
        (format!("{prefix}_OPT_TM"), c.tm.opt.to_string()),
        (format!("{prefix}_MIN_TM"), c.tm.min.to_string()),
        (format!("{prefix}_MAX_TM"), c.tm.max.to_string()),
        (format!("{prefix}_OPT_GC_PERCENT"), c.gc.opt.to_string()),
        (format!("{prefix}_MIN_GC"), c.gc.min.to_string()),
        (format!("{prefix}_MAX_GC"), c.gc.max.to_string()),
    ]);
}

/// Render one Boulder-IO record for `primer3_core`.
pub fn boulder_input(seq: &SequenceArgs, global: &GlobalArgs) -> String {
    let mut lines: Vec<(String, String)> = vec![
        ("SEQUENCE_ID".into(), "qprimer".into()),
        ("SEQUENCE_TEMPLATE".into(), seq.template.clone()),
    ];
    if let Some((s, l)) = seq.target {
        lines.push(("SEQUENCE_TARGET".into(), format!("{s},{l}")));
    }
    if !seq.excluded_regions.is_empty() {
        lines.push(("SEQUENCE_EXCLUDED_REGION".into(), intervals(&seq.excluded_regions)));
    }
    if !seq.internal_excluded_regions.is_empty() {
        lines.push(("SEQUENCE_INTERNAL_EXCLUDED_REGION".into(), intervals(&seq.internal_excluded_regions)));
    }
    if let Some(probe) = &seq.internal_oligo {
        lines.push(("SEQUENCE_INTERNAL_OLIGO".into(), probe.clone()));
    }
    let c = &global.conditions;
    lines.extend([
        ("PRIMER_TASK".to_string(), "generic".to_string()),
        ("PRIMER_PICK_LEFT_PRIMER".into(), bool_flag(global.pick_left).into()),
        ("PRIMER_PICK_RIGHT_PRIMER".into(), bool_flag(global.pick_right).into()),
        ("PRIMER_PICK_INTERNAL_OLIGO".into(), bool_flag(global.pick_internal).into()),
        ("PRIMER_NUM_RETURN".into(), global.num_return.to_string()),
        ("PRIMER_SALT_MONOVALENT".into(), c.mv_conc.to_string()),
        ("PRIMER_SALT_DIVALENT".into(), c.dv_conc.to_string()),
        ("PRIMER_DNTP_CONC".into(), c.dntp_conc.to_string()),
        ("PRIMER_DNA_CONC".into(), c.dna_conc.to_string()),
    ]);
    if global.pick_left || global.pick_right {
        push_constraints(&mut lines, "PRIMER", &global.primer);
        lines.push(("PRIMER_PRODUCT_SIZE_RANGE".into(), format!("{}-{}", global.product_size.0, global.product_size.1)));
        lines.push(("PRIMER_PAIR_MAX_DIFF_TM".into(), global.max_pair_tm_diff.to_string()));
    }
    if let (true, Some(internal)) = (global.pick_internal, &global.internal) {
        lines.push(("PRIMER_INTERNAL_NUM_RETURN".into(), global.num_return.to_string()));
        lines.extend([
            ("PRIMER_INTERNAL_SALT_MONOVALENT".to_string(), c.mv_conc.to_string()),
            ("PRIMER_INTERNAL_SALT_DIVALENT".into(), c.dv_conc.to_string()),
            ("PRIMER_INTERNAL_DNTP_CONC".into(), c.dntp_conc.to_string()),
            ("PRIMER_INTERNAL_DNA_CONC".into(), c.dna_conc.to_string()),
        ]);
        push_constraints(&mut lines, "PRIMER_INTERNAL", internal);
    }
    lines.extend(global.passthrough.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut out = String::new();
    for (k, v) in lines {
        out.push_str(&k);
        out.push('=');
        out.push_str(&v);
        out.push('\n');
    }
    out.push_str("=\n");
    out
}

/// Parse the first Boulder-IO record of `text` into ranked sequences.
pub fn parse_boulder(text: &str) -> Result<EngineOutput> {
    let mut tags = BTreeMap::new();
    for line in text.lines() {
        if line == "=" {
            break;
        }
        if let Some((k, v)) = line.split_once('=') {
            tags.insert(k.to_string(), v.to_string());
        }
    }
    if let Some(err) = tags.get("PRIMER_ERROR") {
        return Err(DesignError::parameter("primer3", err.clone()));
    }
    let count = |key: &str| -> Result<usize> {
        match tags.get(key) {
            None => Ok(0),
            Some(v) => v.trim().parse().map_err(|_| DesignError::engine(format!("{key}={v} is not a count"))),
        }
    };
    let sequences = |role: &str, n: usize| -> Result<Vec<String>> {
        (0..n)
            .map(|i| {
                let key = format!("PRIMER_{role}_{i}_SEQUENCE");
                tags.get(&key).cloned().ok_or_else(|| DesignError::engine(format!("missing {key}")))
            })
            .collect()
    };
    Ok(EngineOutput {
        left: sequences("LEFT", count("PRIMER_LEFT_NUM_RETURNED")?)?,
        right: sequences("RIGHT", count("PRIMER_RIGHT_NUM_RETURNED")?)?,
        internal: sequences("INTERNAL", count("PRIMER_INTERNAL_NUM_RETURNED")?)?,
        pairs: count("PRIMER_PAIR_NUM_RETURNED")?,
    })
}

impl OligoDesigner for Primer3Core {
    fn name(&self) -> &str { "primer3" }

    fn design(&self, seq: &SequenceArgs, global: &GlobalArgs) -> Result<EngineOutput> {
        global.validate()?;
        let input = boulder_input(seq, global);
        debug!("running {} ({} bp template)", self.executable.display(), seq.template.len());
        let spawn_error = |e: std::io::Error| DesignError::engine(format!("{}: {e}", self.executable.display()));
        let mut child = Command::new(&self.executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).map_err(spawn_error)?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;
        if !output.status.success() {
            return Err(DesignError::engine(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_boulder(&String::from_utf8_lossy(&output.stdout))
    }
}
