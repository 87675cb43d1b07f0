use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use foodme_taxonomy::{
    blast_mask, consensus_from_hits, krona_table, HitReportSchema, LineagePolicy, MaskOptions,
    Taxdump, TaxonomySource,
};

#[derive(Parser)]
#[command(
    name = "foodme-taxonomy",
    version,
    about = "Taxonomy post-processing for metabarcoding BLAST results"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lowest common ancestor of the hits of every query
    Consensus(ConsensusArgs),
    /// Krona text table from a count table with Count and Taxid columns
    Krona(KronaArgs),
    /// Database taxids descending from a parent taxid
    Mask(MaskArgs),
}

#[derive(Args)]
struct TaxonomyArgs {
    /// NCBI nodes.dmp
    #[arg(
        long,
        requires = "rankedlineage",
        conflicts_with = "taxdb",
        required_unless_present = "taxdb"
    )]
    nodes: Option<PathBuf>,
    /// NCBI rankedlineage.dmp
    #[arg(long, requires = "nodes")]
    rankedlineage: Option<PathBuf>,
    /// Flat taxDB file (taxid, parent, name, rank)
    #[arg(long)]
    taxdb: Option<PathBuf>,
}

impl TaxonomyArgs {
    /// clap guarantees either `--taxdb` or both NCBI dump paths.
    fn source(&self) -> TaxonomySource {
        match &self.taxdb {
            Some(taxdb) => TaxonomySource::TaxDb(taxdb.clone()),
            None => TaxonomySource::Ncbi {
                nodes: self.nodes.clone().unwrap_or_default(),
                rankedlineage: self.rankedlineage.clone().unwrap_or_default(),
            },
        }
    }
}

#[derive(Args)]
struct ConsensusArgs {
    #[command(flatten)]
    taxonomy: TaxonomyArgs,
    /// Tabular BLAST report with a header line
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    /// Keep only hits within this bitscore of the best hit of each query
    #[arg(long)]
    bitscore_delta: Option<f64>,
}

#[derive(Args)]
struct KronaArgs {
    #[command(flatten)]
    taxonomy: TaxonomyArgs,
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    /// Report unknown taxids as Unassigned instead of failing
    #[arg(long)]
    lenient: bool,
}

#[derive(Args)]
struct MaskArgs {
    #[command(flatten)]
    taxonomy: TaxonomyArgs,
    /// Database taxid list, one per line after a header
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    /// Taxid whose descendants are kept
    #[arg(long)]
    parent: String,
    /// Do not keep the parent taxid itself
    #[arg(long)]
    exclude_parent: bool,
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
    {
        spinner.set_style(style);
    }
    spinner.set_message(msg);
    spinner
}

fn load_taxonomy(args: &TaxonomyArgs) -> foodme_taxonomy::Result<Taxdump> {
    let spinner = spinner("blue", "Loading taxonomy...");
    let taxdump = args.source().load()?;
    spinner.finish_with_message(format!("Loaded {} taxa.", taxdump.len()));
    Ok(taxdump)
}

fn run(cli: Cli) -> foodme_taxonomy::Result<()> {
    match cli.command {
        Commands::Consensus(args) => {
            let txd = load_taxonomy(&args.taxonomy)?;
            let schema = HitReportSchema {
                max_bitscore_delta: args.bitscore_delta,
                ..HitReportSchema::default()
            };
            let spinner = spinner("green", "Resolving consensus taxa...");
            let report = consensus_from_hits(&txd, &args.input, &args.output, &schema)?;
            spinner.finish_with_message(format!("Resolved {} queries.", report.rows.len()));
        }
        Commands::Krona(args) => {
            let txd = load_taxonomy(&args.taxonomy)?;
            let policy = if args.lenient {
                LineagePolicy::Lenient
            } else {
                LineagePolicy::Strict
            };
            let spinner = spinner("yellow", "Expanding lineages...");
            let rows = krona_table(&txd, &args.input, &args.output, policy)?;
            spinner.finish_with_message(format!("Wrote {rows} lineage rows."));
        }
        Commands::Mask(args) => {
            let txd = load_taxonomy(&args.taxonomy)?;
            let options = MaskOptions {
                include_parent: !args.exclude_parent,
            };
            let spinner = spinner("cyan", "Filtering database taxids...");
            let mask = blast_mask(&txd, &args.input, &args.parent, &args.output, &options)?;
            spinner.finish_with_message(format!("Kept {} taxids.", mask.entries.len()));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("foodme-taxonomy").chain(args.iter().copied()))
    }

    fn mask_source(args: &[&str]) -> TaxonomySource {
        match parse(args).unwrap().command {
            Commands::Mask(mask) => mask.taxonomy.source(),
            _ => panic!("expected the mask subcommand"),
        }
    }

    const MASK: [&str; 6] = ["mask", "-i", "taxids.txt", "-o", "mask.txt", "--parent=9895"];

    #[test]
    fn taxonomy_source_is_required() {
        let err = parse(&MASK).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn ncbi_dump_needs_both_files() {
        let args: Vec<&str> = MASK.iter().copied().chain(["--nodes", "nodes.dmp"]).collect();
        let err = parse(&args).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let args: Vec<&str> = MASK
            .iter()
            .copied()
            .chain(["--nodes", "nodes.dmp", "--rankedlineage", "rankedlineage.dmp"])
            .collect();
        assert_eq!(
            mask_source(&args),
            TaxonomySource::Ncbi {
                nodes: PathBuf::from("nodes.dmp"),
                rankedlineage: PathBuf::from("rankedlineage.dmp"),
            }
        );
    }

    #[test]
    fn taxdb_alone_is_enough() {
        let args: Vec<&str> = MASK.iter().copied().chain(["--taxdb", "taxdb.tsv"]).collect();
        assert_eq!(mask_source(&args), TaxonomySource::TaxDb(PathBuf::from("taxdb.tsv")));
    }

    #[test]
    fn ncbi_dump_and_taxdb_conflict() {
        let args: Vec<&str> = MASK
            .iter()
            .copied()
            .chain(["--nodes", "n.dmp", "--rankedlineage", "r.dmp", "--taxdb", "taxdb.tsv"])
            .collect();
        let err = parse(&args).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }
}
