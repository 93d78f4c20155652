//! Error taxonomy for a design call.
//!
//! Region-level failures (`InvalidRegion`, `UnknownReference`, `ReferenceFetch`)
//! abort one region's design and carry the region identifier. Candidate-level
//! failures (`OligoNotLocated`, `MalformedAmplicon`) are reported per candidate;
//! the pipeline logs them, drops the candidate and keeps going.
//!
//! An empty result is *not* an error: a design call that yields zero amplicons
//! returns empty lists.
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DesignError>;

/// Everything that can go wrong while designing primers/probes for a region.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    /// `start > end`, zero coordinates or an unparsable region string.
    #[error("Invalid region '{region}': {reason}")]
    InvalidRegion {
        /// Region identifier as supplied by the caller.
        region: String,
        /// Explanation of why it's invalid.
        reason: String,
    },

    /// Reference name not present in the configuration.
    #[error("Unknown reference '{reference}' (region {region})")]
    UnknownReference {
        /// The reference name that was requested.
        reference: String,
        /// Region whose design needed it.
        region: String,
    },

    /// Chromosome missing from the FASTA, window outside its bounds, or a short read.
    #[error("Could not fetch template for region {region}: {reason}")]
    ReferenceFetch {
        /// Region identifier.
        region: String,
        /// Explanation of the failure.
        reason: String,
    },

    /// Contradictory or missing bounds handed to the search engine.
    #[error("Invalid design parameter '{parameter}': {reason}")]
    DesignParameter {
        /// Parameter name.
        parameter: String,
        /// Explanation of why it's invalid.
        reason: String,
    },

    /// An engine-returned oligo is absent from its template on both strands.
    #[error("Oligo {sequence} (or its reverse complement) not found in template")]
    OligoNotLocated {
        /// The offending oligo sequence.
        sequence: String,
    },

    /// A QC input record lacks a required field.
    #[error("Malformed amplicon record: missing or non-numeric field '{field}'")]
    MalformedAmplicon {
        /// Name of the missing field.
        field: String,
    },

    /// The oligo-design engine could not be run or produced unreadable output.
    #[error("Oligo design engine failed: {reason}")]
    Engine {
        /// Explanation of the failure.
        reason: String,
    },

    /// Settings or input files could not be read or parsed.
    #[error("Could not load '{path}': {reason}")]
    Config {
        /// Path of the offending file.
        path: String,
        /// Explanation of the failure.
        reason: String,
    },
}

impl DesignError {
    pub(crate) fn parameter(parameter: &str, reason: impl Into<String>) -> Self {
        Self::DesignParameter { parameter: parameter.to_string(), reason: reason.into() }
    }

    pub(crate) fn engine(reason: impl Into<String>) -> Self {
        Self::Engine { reason: reason.into() }
    }

    /// `true` for failures that only invalidate a single candidate.
    pub fn is_candidate_level(&self) -> bool {
        matches!(self, Self::OligoNotLocated { .. } | Self::MalformedAmplicon { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_region_message() {
        let error = DesignError::InvalidRegion {
            region: "chr1:20-10".to_string(),
            reason: "start (20) > end (10)".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Invalid region 'chr1:20-10'"));
        assert!(msg.contains("start (20) > end (10)"));
    }

    #[test]
    fn test_unknown_reference_carries_region() {
        let error = DesignError::UnknownReference {
            reference: "hg99".to_string(),
            region: "chr1:1-10".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("hg99"));
        assert!(msg.contains("chr1:1-10"));
    }

    #[test]
    fn test_candidate_level_classification() {
        assert!(DesignError::OligoNotLocated { sequence: "ACGT".into() }.is_candidate_level());
        assert!(DesignError::MalformedAmplicon { field: "forward_sequence".into() }.is_candidate_level());
        assert!(!DesignError::parameter("n_primers", "must be > 0").is_candidate_level());
        assert!(!DesignError::engine("boom").is_candidate_level());
    }
}
