//! Genomic target regions.
//!
//! Coordinates are **1-based, inclusive** on both ends, the way users type them
//! (`chr1:1000-1020`). Conversion to 0-based end-exclusive happens only at the
//! reference accessor boundary.
use core::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DesignError, Result};

/// A target interval on one chromosome.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Chromosome / contig name as it appears in the reference FASTA.
    pub chrom: String,
    /// First base of the target (1-based, inclusive).
    pub start: u64,
    /// Last base of the target (1-based, inclusive).
    pub end: u64,
    /// Optional user label.
    #[serde(default)]
    pub name: Option<String>,
}

impl Region {
    /// Build and validate a region.
    ///
    /// # Examples
    /// ```
    /// let r = qprimer::region::Region::new("chr1", 1000, 1020, None).unwrap();
    /// assert_eq!(r.len(), 21);
    /// assert!(qprimer::region::Region::new("chr1", 20, 10, None).is_err());
    /// ```
    pub fn new(chrom: &str, start: u64, end: u64, name: Option<String>) -> Result<Self> {
        let r = Self { chrom: chrom.to_string(), start, end, name };
        r.validate()?;
        Ok(r)
    }

    /// Check `start <= end`, non-zero coordinates and a non-empty chromosome.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(DesignError::InvalidRegion { region: self.id(), reason });
        if self.chrom.trim().is_empty() {
            return fail("missing chromosome".to_string());
        }
        if self.start == 0 || self.end == 0 {
            return fail("coordinates are 1-based; 0 is not a valid position".to_string());
        }
        if self.start > self.end {
            return fail(format!("start ({}) > end ({})", self.start, self.end));
        }
        Ok(())
    }

    /// Target length in bases.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 { self.end - self.start + 1 }

    /// Stable identifier: the user label if any, otherwise `chrom:start-end`.
    pub fn id(&self) -> String {
        match &self.name {
            Some(n) if !n.is_empty() => n.clone(),
            _ => self.locus(),
        }
    }

    /// `chrom:start-end` regardless of label.
    pub fn locus(&self) -> String { format!("{}:{}-{}", self.chrom, self.start, self.end) }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.id()) }
}

impl FromStr for Region {
    type Err = DesignError;

    /// Parse `chrom:start-end`; thousands separators (`,`) are tolerated.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| DesignError::InvalidRegion { region: s.to_string(), reason: reason.to_string() };
        let (chrom, span) = s.trim().rsplit_once(':').ok_or_else(|| invalid("expected chrom:start-end"))?;
        let (start, end) = span.split_once('-').ok_or_else(|| invalid("expected start-end after ':'"))?;
        let parse = |v: &str| v.replace(',', "").trim().parse::<u64>().map_err(|_| invalid("coordinates must be positive integers"));
        Region::new(chrom, parse(start)?, parse(end)?, None)
    }
}

/// Read regions from a CSV file with header `chrom,start,end[,name]`.
///
/// Every row is validated; the first bad row fails the whole file.
pub fn read_regions_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Region>> {
    let path = path.as_ref();
    let config_error = |reason: String| DesignError::Config { path: path.display().to_string(), reason };
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path).map_err(|e| config_error(e.to_string()))?;
    let mut regions = Vec::new();
    for (line, row) in reader.deserialize::<Region>().enumerate() {
        let region = row.map_err(|e| config_error(format!("row {}: {e}", line + 1)))?;
        region.validate()?;
        regions.push(region);
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_locus_string() {
        let r: Region = "chr1:1,000-1,020".parse().unwrap();
        assert_eq!(r.chrom, "chr1");
        assert_eq!((r.start, r.end), (1000, 1020));
        assert_eq!(r.len(), 21);
        assert_eq!(r.id(), "chr1:1000-1020");
    }

    #[test]
    fn reject_inverted_and_zero() {
        assert!(matches!(Region::new("chr1", 21, 20, None), Err(DesignError::InvalidRegion { .. })));
        assert!(matches!(Region::new("chr1", 0, 20, None), Err(DesignError::InvalidRegion { .. })));
        assert!(matches!(Region::new("", 1, 20, None), Err(DesignError::InvalidRegion { .. })));
        assert!("chr1-100".parse::<Region>().is_err());
        assert!("chr1:a-b".parse::<Region>().is_err());
    }

    #[test]
    fn name_overrides_identifier() {
        let r = Region::new("chr2", 5, 9, Some("GENE_X".into())).unwrap();
        assert_eq!(r.id(), "GENE_X");
        assert_eq!(r.locus(), "chr2:5-9");
        assert_eq!(r.to_string(), "GENE_X");
    }

    #[test]
    fn regions_csv_with_optional_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.csv");
        std::fs::write(&path, "chrom,start,end,name\nchr1,100,120,T1\nchr2, 5 ,9,\n").unwrap();
        let regions = read_regions_csv(&path).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id(), "T1");
        assert_eq!(regions[1].id(), "chr2:5-9");

        std::fs::write(&path, "chrom,start,end\nchr1,30,20\n").unwrap();
        assert!(matches!(read_regions_csv(&path), Err(DesignError::InvalidRegion { .. })));
        assert!(matches!(read_regions_csv(dir.path().join("missing.csv")), Err(DesignError::Config { .. })));
    }
}
