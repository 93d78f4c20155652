//! Reference sequence access.
//!
//! ### Design
//! - [`ReferenceSource`] is the read-only capability the pipeline needs:
//!   contig lengths plus `fetch(chrom, start0, end0)` in **0-based, end-exclusive**
//!   coordinates returning upper-case bases.
//! - [`FastaReference`] reads an indexed FASTA (`.fai` next to the file) via the
//!   `bio` crate. The reader needs `&mut` to seek, so it sits behind a mutex;
//!   concurrent regions serialize only on the seek+read itself.
//! - [`ReferenceCatalog`] maps reference names to FASTA paths and caches opened
//!   handles. The cache is append-only: populated on first use, never invalidated.
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use bio::io::fasta;
use log::debug;

use crate::error::{DesignError, Result};

/// Read-only access to reference contigs.
pub trait ReferenceSource: Send + Sync {
    /// Length of `chrom`, or `None` if the contig is absent.
    fn sequence_length(&self, chrom: &str) -> Option<u64>;

    /// Upper-case bases of `chrom[start0..end0]`.
    fn fetch(&self, chrom: &str, start0: u64, end0: u64) -> Result<String>;
}

fn fetch_error(chrom: &str, start0: u64, end0: u64, reason: impl Into<String>) -> DesignError {
    DesignError::ReferenceFetch { region: format!("{chrom}:{}-{end0}", start0 + 1), reason: reason.into() }
}

fn check_bounds(source: &dyn ReferenceSource, chrom: &str, start0: u64, end0: u64) -> Result<()> {
    let len = source
        .sequence_length(chrom)
        .ok_or_else(|| fetch_error(chrom, start0, end0, format!("chromosome '{chrom}' not found in reference")))?;
    if start0 >= end0 || end0 > len {
        return Err(fetch_error(chrom, start0, end0, format!("interval outside contig bounds (length {len})")));
    }
    Ok(())
}

/// Indexed FASTA on disk.
pub struct FastaReference {
    path: PathBuf,
    lengths: HashMap<String, u64>,
    reader: Mutex<fasta::IndexedReader<File>>,
}

impl FastaReference {
    /// Open `path` together with its `path.fai` index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fai = PathBuf::from(format!("{}.fai", path.display()));
        let config_error = |reason: String| DesignError::Config { path: path.display().to_string(), reason };
        if !fai.exists() {
            return Err(config_error(format!("missing FASTA index {} (run `samtools faidx`)", fai.display())));
        }
        let index = fasta::Index::from_file(&fai).map_err(|e| config_error(e.to_string()))?;
        let lengths = index.sequences().into_iter().map(|s| (s.name, s.len)).collect();
        let file = File::open(&path).map_err(|e| config_error(e.to_string()))?;
        debug!("opened reference {}", path.display());
        Ok(Self { path, lengths, reader: Mutex::new(fasta::IndexedReader::with_index(file, index)) })
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl ReferenceSource for FastaReference {
    fn sequence_length(&self, chrom: &str) -> Option<u64> { self.lengths.get(chrom).copied() }

    fn fetch(&self, chrom: &str, start0: u64, end0: u64) -> Result<String> {
        check_bounds(self, chrom, start0, end0)?;
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let mut buf = Vec::with_capacity((end0 - start0) as usize);
        reader.fetch(chrom, start0, end0).map_err(|e| fetch_error(chrom, start0, end0, e.to_string()))?;
        reader.read(&mut buf).map_err(|e| fetch_error(chrom, start0, end0, e.to_string()))?;
        buf.make_ascii_uppercase();
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Contigs held in memory; handy for ad-hoc sequences and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReference {
    contigs: HashMap<String, String>,
}

impl InMemoryReference {
    pub fn new() -> Self { Self::default() }

    /// Add (or replace) a contig; bases are upper-cased on insert.
    pub fn with_contig(mut self, name: &str, sequence: &str) -> Self {
        self.contigs.insert(name.to_string(), sequence.to_ascii_uppercase());
        self
    }
}

impl ReferenceSource for InMemoryReference {
    fn sequence_length(&self, chrom: &str) -> Option<u64> { self.contigs.get(chrom).map(|s| s.len() as u64) }

    fn fetch(&self, chrom: &str, start0: u64, end0: u64) -> Result<String> {
        check_bounds(self, chrom, start0, end0)?;
        Ok(self.contigs[chrom][start0 as usize..end0 as usize].to_string())
    }
}

/// Name → reference resolution with a populate-on-first-use handle cache.
#[derive(Default)]
pub struct ReferenceCatalog {
    paths: BTreeMap<String, PathBuf>,
    handles: RwLock<HashMap<String, Arc<dyn ReferenceSource>>>,
}

impl ReferenceCatalog {
    pub fn new(paths: BTreeMap<String, PathBuf>) -> Self {
        Self { paths, handles: RwLock::new(HashMap::new()) }
    }

    /// Register an already-open source under `name` (wins over any configured path).
    pub fn register(&self, name: &str, source: Arc<dyn ReferenceSource>) {
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        handles.insert(name.to_string(), source);
    }

    /// Every name that [`ReferenceCatalog::handle`] can resolve, sorted.
    pub fn names(&self) -> Vec<String> {
        let handles = self.handles.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = self.paths.keys().cloned().chain(handles.keys().cloned()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn path_of(&self, name: &str) -> Option<&Path> { self.paths.get(name).map(PathBuf::as_path) }

    /// Resolve `name` to an open source.
    ///
    /// Returns `Ok(None)` when the name is not configured, and an error when the
    /// configured FASTA cannot be opened.
    pub fn handle(&self, name: &str) -> Result<Option<Arc<dyn ReferenceSource>>> {
        if let Some(h) = self.handles.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Ok(Some(Arc::clone(h)));
        }
        let Some(path) = self.paths.get(name) else { return Ok(None) };
        let opened: Arc<dyn ReferenceSource> = Arc::new(FastaReference::open(path)?);
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        Ok(Some(Arc::clone(handles.entry(name.to_string()).or_insert(opened))))
    }
}
