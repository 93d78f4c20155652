use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::info;
use polars::prelude::*;

use qprimer::config::Settings;
use qprimer::dna::BisulfitePolicy;
use qprimer::params::DesignParameters;
use qprimer::pipeline::{Designer, RegionDesign};
use qprimer::region::{read_regions_csv, Region};
use qprimer::report::{self, Table};
use qprimer::thermo::{NearestNeighbor, ThermoEngine};

/// qprimer CLI
#[derive(Parser)]
#[command(name = "qprimer")]
#[command(version)]
#[command(about = "qPCR primer/probe design with thermodynamic QC", long_about = None)]
struct Cli {
    /// Settings JSON (references, defaults, conditions, QC thresholds, engine)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Design primers (and probes) for one region
    Design {
        /// Reference name from the settings file
        #[arg(long)]
        reference: String,
        /// Target as chrom:start-end (1-based, inclusive)
        #[arg(long)]
        region: Region,
        /// Label for the region (default: chrom:start-end)
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        overrides: Overrides,
        /// Write candidates.csv / qc_passed.csv / parameters.csv here instead of stdout
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Only the compact column set
        #[arg(long)]
        standard_columns: bool,
    },

    /// Design every region listed in a CSV (chrom,start,end[,name])
    Batch {
        /// Reference name from the settings file
        #[arg(long)]
        reference: String,
        /// Regions CSV
        #[arg(long)]
        regions: PathBuf,
        /// Threads (default: all CPUs)
        #[arg(long)]
        threads: Option<usize>,
        #[command(flatten)]
        overrides: Overrides,
        /// Output directory
        #[arg(long, default_value = "qprimer_out")]
        out_dir: PathBuf,
        /// Only the compact column set
        #[arg(long)]
        standard_columns: bool,
    },

    /// List configured references
    References,

    /// Tm, GC and secondary structures of one oligo (heterodimer with a second)
    Thermo {
        seq: String,
        seq2: Option<String>,
    },
}

/// Per-run overrides of the configured design defaults.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Primer pairs to request per search
    #[arg(long)]
    n_primers: Option<usize>,
    /// Probes to request; 0 disables probe design
    #[arg(long)]
    n_probes: Option<usize>,
    #[arg(long)]
    min_amplicon_length: Option<usize>,
    #[arg(long)]
    max_amplicon_length: Option<usize>,
    #[arg(long)]
    primer_opt_tm: Option<f64>,
    #[arg(long)]
    primer_min_tm: Option<f64>,
    #[arg(long)]
    primer_max_tm: Option<f64>,
    #[arg(long)]
    probe_opt_tm: Option<f64>,
    #[arg(long)]
    probe_min_tm: Option<f64>,
    #[arg(long)]
    probe_max_tm: Option<f64>,
    /// Largest Tm gap between forward and reverse primer
    #[arg(long)]
    max_pair_tm_diff: Option<f64>,
    /// Probe Tm minus primer Tm, lower end
    #[arg(long)]
    min_tm_diff: Option<f64>,
    /// Probe Tm minus primer Tm, upper end
    #[arg(long)]
    max_tm_diff: Option<f64>,
    /// Design against the bisulfite-converted template
    #[arg(long)]
    bisulfite: bool,
    /// CpG policy for bisulfite conversion (methylated|unmethylated)
    #[arg(long)]
    cpg: Option<BisulfitePolicy>,
    /// Signed CpG positions, e.g. "1005,-1012" (+ keeps C, - converts)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    methylation_pattern: Option<Vec<i64>>,
    /// Engine passthrough KEY=VALUE (repeatable)
    #[arg(long = "engine-arg", value_parser = parse_key_value)]
    engine_args: Vec<(String, String)>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

impl Overrides {
    fn into_parameters(self) -> DesignParameters {
        DesignParameters {
            n_primers: self.n_primers,
            n_probes: self.n_probes,
            min_amplicon_length: self.min_amplicon_length,
            max_amplicon_length: self.max_amplicon_length,
            primer_opt_tm: self.primer_opt_tm,
            primer_min_tm: self.primer_min_tm,
            primer_max_tm: self.primer_max_tm,
            probe_opt_tm: self.probe_opt_tm,
            probe_min_tm: self.probe_min_tm,
            probe_max_tm: self.probe_max_tm,
            max_pair_tm_diff: self.max_pair_tm_diff,
            min_tm_diff: self.min_tm_diff,
            max_tm_diff: self.max_tm_diff,
            bisulfite: self.bisulfite.then_some(true),
            cpg_policy: self.cpg,
            methylation_pattern: self.methylation_pattern,
            engine_args: self.engine_args.into_iter().collect::<BTreeMap<_, _>>(),
            ..Default::default()
        }
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(p) => Settings::from_json_file(p).with_context(|| format!("loading settings from {}", p.display())),
        None => Ok(Settings::default()),
    }
}

fn emit(designs: &[RegionDesign], out_dir: Option<&Path>, standard: bool) -> anyhow::Result<()> {
    match out_dir {
        Some(dir) => {
            for path in report::write_report(designs, dir, standard)? {
                info!("wrote {}", path.display());
            }
        }
        None => {
            let mut df = report::candidates_frame(designs, Table::Passed, standard)?;
            report::write_csv(&mut df, std::io::stdout())?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Design { reference, region, name, overrides, out_dir, standard_columns } => {
            let region = Region { name: name.or(region.name), ..region };
            let references = settings.reference_catalog();
            let engine = qprimer::oligo_designer(&settings.engine);
            let designer = Designer { settings: &settings, references: &references, thermo: &NearestNeighbor, designer: engine.as_ref() };
            let design = designer
                .design(&region, &reference, &overrides.into_parameters())
                .with_context(|| format!("designing {region}"))?;
            emit(std::slice::from_ref(&design), out_dir.as_deref(), standard_columns)?;
        }

        Commands::Batch { reference, regions, threads, overrides, out_dir, standard_columns } => {
            let regions = read_regions_csv(&regions).with_context(|| format!("reading {}", regions.display()))?;
            let references = settings.reference_catalog();
            let engine = qprimer::oligo_designer(&settings.engine);
            let designer = Designer { settings: &settings, references: &references, thermo: &NearestNeighbor, designer: engine.as_ref() };
            let results = designer.design_batch(&regions, &reference, &overrides.into_parameters(), threads)?;
            let total = results.len();
            let designs: Vec<RegionDesign> = results.into_iter().filter_map(Result::ok).collect();
            info!("{} of {total} regions designed", designs.len());
            if designs.is_empty() && total > 0 {
                bail!("every region failed; see the log above");
            }
            emit(&designs, Some(&out_dir), standard_columns)?;
        }

        Commands::References => {
            let references = settings.reference_catalog();
            let names = references.names();
            let paths: Vec<String> = names
                .iter()
                .map(|n| references.path_of(n).map(|p| p.display().to_string()).unwrap_or_default())
                .collect();
            let mut df = df!(
                "reference" => names,
                "fasta"     => paths,
            )?;
            report::write_csv(&mut df, std::io::stdout())?;
        }

        Commands::Thermo { seq, seq2 } => {
            let conditions = &settings.conditions;
            let mut rows = qprimer::oligo_rows(&seq, conditions);
            if let Some(other) = seq2 {
                let hetero = NearestNeighbor.calc_heterodimer(&seq.to_ascii_uppercase(), &other.to_ascii_uppercase(), conditions);
                rows.push(("heterodimer_found".into(), hetero.structure_found.to_string()));
                rows.push(("heterodimer_tm".into(), format!("{:.2}", hetero.tm)));
                rows.push(("heterodimer_dg".into(), format!("{:.2}", hetero.dg)));
            }
            let mut df = df!(
                "metric" => rows.iter().map(|r| r.0.clone()).collect::<Vec<_>>(),
                "value"  => rows.iter().map(|r| r.1.clone()).collect::<Vec<_>>(),
            )?;
            report::write_csv(&mut df, std::io::stdout())?;
        }
    }
    Ok(())
}
