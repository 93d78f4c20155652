//! Oligo thermodynamics: melting temperature and secondary-structure energetics.
//!
//! ### Design
//! - [`ThermoEngine`] is the opaque capability the rest of the crate depends on.
//!   Energies are reported in **kcal/mol** (`dg`, `dh`), entropy in cal/(K·mol),
//!   temperatures in °C. When no structure is found, `tm` and `dg` are `0.0`.
//! - [`NearestNeighbor`] is the built-in engine: SantaLucia (1998) unified
//!   nearest-neighbour parameters, SantaLucia salt correction with the
//!   divalent→monovalent equivalence `mv + 120·√(dv − dNTP)`.
//!   Dimers are scored as the most stable ungapped antiparallel duplex; hairpins
//!   as the most stable stem (≥ 2 bp) closing a loop of ≥ 3 nt.
//! - Engines are called through `&self`. An engine whose binding is not safe for
//!   concurrent use goes behind [`Serialized`], which makes every call exclusive
//!   while the rest of the pipeline stays parallel.
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

const R: f64 = 1.987; // cal/(K·mol)
const T37: f64 = 310.15;
const KELVIN: f64 = 273.15;
const MIN_HAIRPIN_LOOP: usize = 3;

/// Reaction conditions shared by every thermodynamic calculation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditions {
    /// Monovalent cation concentration, mM.
    pub mv_conc: f64,
    /// Divalent cation concentration, mM.
    pub dv_conc: f64,
    /// dNTP concentration, mM.
    pub dntp_conc: f64,
    /// Oligo concentration, nM.
    pub dna_conc: f64,
}

impl Default for Conditions {
    fn default() -> Self { Self { mv_conc: 50.0, dv_conc: 1.5, dntp_conc: 0.6, dna_conc: 50.0 } }
}

impl Conditions {
    /// Monovalent-equivalent salt in mol/L.
    fn sodium_equivalent(&self) -> f64 {
        let free_mg = (self.dv_conc - self.dntp_conc).max(0.0);
        ((self.mv_conc + 120.0 * free_mg.sqrt()) / 1000.0).max(1e-6)
    }

    fn salt_entropy(&self, n_pairs: usize) -> f64 {
        0.368 * n_pairs.saturating_sub(1) as f64 * self.sodium_equivalent().ln()
    }
}

/// Outcome of a secondary-structure calculation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThermoResult {
    pub structure_found: bool,
    /// °C; `0.0` when no structure.
    pub tm: f64,
    /// kcal/mol at 37 °C; `0.0` when no structure.
    pub dg: f64,
    /// kcal/mol.
    pub dh: f64,
    /// cal/(K·mol).
    pub ds: f64,
}

impl ThermoResult {
    /// The neutral "nothing forms" result.
    pub fn none() -> Self { Self::default() }
}

/// Thermodynamic evaluator for single oligos and oligo pairs.
pub trait ThermoEngine {
    /// Duplex melting temperature of `seq` against its perfect complement.
    fn calc_tm(&self, seq: &str, cond: &Conditions) -> f64;

    fn calc_hairpin(&self, seq: &str, cond: &Conditions) -> ThermoResult;

    fn calc_homodimer(&self, seq: &str, cond: &Conditions) -> ThermoResult {
        self.calc_heterodimer(seq, seq, cond)
    }

    fn calc_heterodimer(&self, a: &str, b: &str, cond: &Conditions) -> ThermoResult;
}

/// Serializes every call into a wrapped engine that is not safe to share.
pub struct Serialized<E> {
    inner: Mutex<E>,
}

impl<E> Serialized<E> {
    pub fn new(engine: E) -> Self { Self { inner: Mutex::new(engine) } }
}

impl<E: ThermoEngine> ThermoEngine for Serialized<E> {
    fn calc_tm(&self, seq: &str, cond: &Conditions) -> f64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).calc_tm(seq, cond)
    }
    fn calc_hairpin(&self, seq: &str, cond: &Conditions) -> ThermoResult {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).calc_hairpin(seq, cond)
    }
    fn calc_homodimer(&self, seq: &str, cond: &Conditions) -> ThermoResult {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).calc_homodimer(seq, cond)
    }
    fn calc_heterodimer(&self, a: &str, b: &str, cond: &Conditions) -> ThermoResult {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).calc_heterodimer(a, b, cond)
    }
}

/// Built-in nearest-neighbour engine. Stateless, so freely shared across threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestNeighbor;

/// (ΔH kcal/mol, ΔS cal/(K·mol)) for the 5'→3' dinucleotide `xy` paired with its complement.
fn stack(x: u8, y: u8) -> Option<(f64, f64)> {
    Some(match (x, y) {
        (b'A', b'A') | (b'T', b'T') => (-7.9, -22.2),
        (b'A', b'T') => (-7.2, -20.4),
        (b'T', b'A') => (-7.2, -21.3),
        (b'C', b'A') | (b'T', b'G') => (-8.5, -22.7),
        (b'G', b'T') | (b'A', b'C') => (-8.4, -22.4),
        (b'C', b'T') | (b'A', b'G') => (-7.8, -21.0),
        (b'G', b'A') | (b'T', b'C') => (-8.2, -22.2),
        (b'C', b'G') => (-10.6, -27.2),
        (b'G', b'C') => (-9.8, -24.4),
        (b'G', b'G') | (b'C', b'C') => (-8.0, -19.9),
        _ => return None,
    })
}

fn terminal(b: u8) -> (f64, f64) {
    match b {
        b'G' | b'C' => (0.1, -2.8),
        _ => (2.3, 4.1),
    }
}

fn pairs(a: u8, b: u8) -> bool {
    matches!((a, b), (b'A', b'T') | (b'T', b'A') | (b'G', b'C') | (b'C', b'G'))
}

/// Sum of stacking terms over a top-strand segment.
fn stacks(seg: &[u8]) -> (f64, f64) {
    seg.windows(2)
        .filter_map(|w| stack(w[0], w[1]))
        .fold((0.0, 0.0), |(h, s), (dh, ds)| (h + dh, s + ds))
}

/// ΔH/ΔS of a bimolecular duplex formed by `seg` and its complement.
fn duplex(seg: &[u8]) -> (f64, f64) {
    let (mut dh, mut ds) = stacks(seg);
    for b in [seg[0], seg[seg.len() - 1]] {
        let (h, s) = terminal(b);
        dh += h;
        ds += s;
    }
    (dh, ds)
}

fn bimolecular_tm(dh: f64, ds: f64, cond: &Conditions) -> f64 {
    let ct = cond.dna_conc * 1e-9;
    dh * 1000.0 / (ds + R * (ct / 4.0).ln()) - KELVIN
}

fn dg37(dh: f64, ds: f64) -> f64 { dh - T37 * ds / 1000.0 }

/// Hairpin loop initiation free energy at 37 °C, kcal/mol.
fn loop_penalty(n: usize) -> f64 {
    const TABLE: [f64; 7] = [3.5, 3.5, 3.3, 4.0, 4.2, 4.3, 4.5];
    if n <= 9 {
        TABLE[n - MIN_HAIRPIN_LOOP]
    } else {
        4.5 + 2.44 * R * T37 / 1000.0 * (n as f64 / 9.0).ln()
    }
}

fn upper(seq: &str) -> Vec<u8> { seq.bytes().map(|b| b.to_ascii_uppercase()).collect() }

impl ThermoEngine for NearestNeighbor {
    fn calc_tm(&self, seq: &str, cond: &Conditions) -> f64 {
        let s = upper(seq);
        if s.len() < 2 {
            return 0.0;
        }
        let (dh, ds) = duplex(&s);
        bimolecular_tm(dh, ds + cond.salt_entropy(s.len()), cond)
    }

    fn calc_hairpin(&self, seq: &str, cond: &Conditions) -> ThermoResult {
        let s = upper(seq);
        let n = s.len();
        let mut best = ThermoResult::none();
        // (i, j) is the pair closing the loop; the stem grows outward from it.
        for i in 0..n {
            for j in (i + MIN_HAIRPIN_LOOP + 1)..n {
                if !pairs(s[i], s[j]) {
                    continue;
                }
                let mut len = 1;
                while len <= i && j + len < n && pairs(s[i - len], s[j + len]) {
                    len += 1;
                }
                if len < 2 {
                    continue;
                }
                let (dh, stem_ds) = stacks(&s[i + 1 - len..=i]);
                let loop_dg = loop_penalty(j - i - 1);
                let ds = stem_ds - loop_dg * 1000.0 / T37 + cond.salt_entropy(len);
                let dg = dg37(dh, ds);
                if dg < 0.0 && dg < best.dg {
                    let tm = (dh * 1000.0 / ds - KELVIN).max(0.0);
                    best = ThermoResult { structure_found: true, tm, dg, dh, ds };
                }
            }
        }
        best
    }

    fn calc_heterodimer(&self, a: &str, b: &str, cond: &Conditions) -> ThermoResult {
        let (a, b) = (upper(a), upper(b));
        let mut best = ThermoResult::none();
        if a.is_empty() || b.is_empty() {
            return best;
        }
        // Antiparallel: a[i] pairs with b[d - i]; walk every diagonal d.
        for d in 0..(a.len() + b.len() - 1) {
            let lo = d.saturating_sub(b.len() - 1);
            let hi = d.min(a.len() - 1);
            let mut run_start: Option<usize> = None;
            for i in lo..=hi + 1 {
                let paired = i <= hi && pairs(a[i], b[d - i]);
                match (paired, run_start) {
                    (true, None) => run_start = Some(i),
                    (false, Some(st)) => {
                        run_start = None;
                        if i - st < 2 {
                            continue;
                        }
                        let (dh, ds) = duplex(&a[st..i]);
                        let ds = ds + cond.salt_entropy(i - st);
                        let dg = dg37(dh, ds);
                        if dg < 0.0 && dg < best.dg {
                            let tm = bimolecular_tm(dh, ds, cond).max(0.0);
                            best = ThermoResult { structure_found: true, tm, dg, dh, ds };
                        }
                    }
                    _ => {}
                }
            }
        }
        best
    }
}
