//! Sequence helpers: reverse complement, GC content, CpG counting and the
//! bisulfite-conversion hook.
//!
//! Everything here is a pure function over upper-case DNA strings.
//!
//! # Examples
//! ```
//! use qprimer::dna::{reverse_complement, gc_percent, count_cpg};
//! assert_eq!(reverse_complement("AACG"), "CGTT");
//! assert_eq!(gc_percent("AACG"), 50.0);
//! assert_eq!(count_cpg("ACGTCGA"), 2);
//! ```
use std::collections::HashSet;

use bio::alphabets::dna;
use serde::{Deserialize, Serialize};

/// Reverse complement of an upper-case DNA string.
pub fn reverse_complement(seq: &str) -> String {
    String::from_utf8_lossy(&dna::revcomp(seq.as_bytes())).into_owned()
}

/// GC percentage (0–100) over unambiguous bases; ambiguous codes are ignored.
pub fn gc_percent(seq: &str) -> f64 {
    let (mut gc, mut total) = (0usize, 0usize);
    for b in seq.bytes().map(|b| b.to_ascii_uppercase()) {
        match b {
            b'G' | b'C' => { gc += 1; total += 1; }
            b'A' | b'T' => total += 1,
            _ => {}
        }
    }
    if total == 0 { 0.0 } else { gc as f64 * 100.0 / total as f64 }
}

/// Number of `CG` dinucleotides.
pub fn count_cpg(seq: &str) -> usize { seq.matches("CG").count() }

/// Number of `C` bases.
pub fn count_cytosine(seq: &str) -> usize { seq.bytes().filter(|&b| b == b'C').count() }

/// Default fate of CpG cytosines during bisulfite conversion.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BisulfitePolicy {
    /// CpG cytosines are protected and stay `C`.
    #[default]
    #[serde(alias = "methyl")]
    Methylated,
    /// CpG cytosines convert to `T` like every other cytosine.
    #[serde(alias = "unmethyl")]
    Unmethylated,
}

impl std::str::FromStr for BisulfitePolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "methylated" | "methyl" => Ok(Self::Methylated),
            "unmethylated" | "unmethyl" => Ok(Self::Unmethylated),
            other => Err(format!("Unknown CpG policy: {other}")),
        }
    }
}

/// Per-position overrides of the CpG policy, keyed by 1-based genomic position.
///
/// Built from a signed list: `+p` marks the C at `p` as methylated (kept),
/// `-p` as unmethylated (converted).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethylationPattern {
    methylated: HashSet<u64>,
    unmethylated: HashSet<u64>,
}

impl MethylationPattern {
    pub fn from_signed(positions: &[i64]) -> Self {
        let mut p = Self::default();
        for &pos in positions {
            if pos > 0 {
                p.methylated.insert(pos as u64);
            } else if pos < 0 {
                p.unmethylated.insert(pos.unsigned_abs());
            }
        }
        p
    }

    pub fn is_empty(&self) -> bool { self.methylated.is_empty() && self.unmethylated.is_empty() }

    fn keeps_cytosine(&self, position: u64, policy: BisulfitePolicy) -> bool {
        if self.methylated.contains(&position) {
            true
        } else if self.unmethylated.contains(&position) {
            false
        } else {
            policy == BisulfitePolicy::Methylated
        }
    }
}

/// In-silico bisulfite conversion of the forward strand.
///
/// * non-CpG `C` → `T`;
/// * CpG `C` → kept or `T` per `pattern`, falling back to `policy`;
/// * every other base is copied.
///
/// `window_start` is the 1-based genomic position of `seq[0]`. `next_base` is
/// the reference base right after the window (if any) so that a trailing `C`
/// can still be recognised as part of a CpG.
pub fn bisulfite_convert(
    seq: &str,
    window_start: u64,
    next_base: Option<u8>,
    policy: BisulfitePolicy,
    pattern: &MethylationPattern,
) -> String {
    let bytes = seq.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'C' {
            out.push(b);
            continue;
        }
        let next = bytes.get(i + 1).copied().or(next_base);
        let keep = next == Some(b'G') && pattern.keeps_cytosine(window_start + i as u64, policy);
        out.push(if keep { b'C' } else { b'T' });
    }
    String::from_utf8_lossy(&out).into_owned()
}
