#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

/// Deterministic 600 bp contig; no 20-mer occurs twice.
pub fn genome() -> String {
    let mut state: u64 = 42;
    (0..600)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            b"ACGT"[((state >> 33) % 4) as usize] as char
        })
        .collect()
}

/// Write `contigs` as a 60-column FASTA named `genome.fa` plus its `.fai`.
pub fn write_indexed_fasta(dir: &Path, contigs: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("genome.fa");
    let mut fa = std::fs::File::create(&path).unwrap();
    let mut fai = std::fs::File::create(dir.join("genome.fa.fai")).unwrap();
    let mut offset = 0usize;
    for (name, seq) in contigs {
        let header = format!(">{name}\n");
        offset += header.len();
        fa.write_all(header.as_bytes()).unwrap();
        writeln!(fai, "{name}\t{}\t{offset}\t60\t61", seq.len()).unwrap();
        for chunk in seq.as_bytes().chunks(60) {
            fa.write_all(chunk).unwrap();
            fa.write_all(b"\n").unwrap();
            offset += chunk.len() + 1;
        }
    }
    path
}

/// A settings file pointing reference `toy` at `genome.fa` (relative path).
pub fn write_settings(dir: &Path) -> PathBuf {
    write_indexed_fasta(dir, &[("chr1", &genome())]);
    let path = dir.join("settings.json");
    std::fs::write(&path, r#"{"references": {"toy": {"fasta": "genome.fa"}}, "design": {"n_primers": 10}}"#).unwrap();
    path
}
