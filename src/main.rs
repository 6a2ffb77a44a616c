use clap::Parser;
use log::{error, info};
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use stitcher::align::AlignConfig;
use stitcher::fasta::create_consensus_fasta;
use stitcher::prediction_store::{summarize_store, ChunkStore, PredictionFile};
use stitcher::scheduler::{run_stitching, RunConfig, DEFAULT_THREADS};
use stitcher::stitch::StitchConfig;

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Path to the prediction file holding per-chunk base and run-length predictions.
    #[clap(short = 's', long, value_parser)]
    sequence_store: String,

    /// Number of threads for parallel processing.
    #[clap(short = 't', long, value_parser, default_value_t = DEFAULT_THREADS)]
    num_threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "1")]
    verbose: u8,
}

/// Stitch chunked run-length predictions into one polished sequence per contig.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Stitch every contig and write the consensus FASTA
    Stitch {
        #[clap(flatten)]
        common: CommonOpts,

        /// Output directory; created if it does not exist
        #[clap(short = 'o', long, value_parser)]
        output_dir: String,

        /// Prefix of the output file name (<prefix>_consensus.fa)
        #[clap(long, value_parser, default_value = "stitched")]
        output_prefix: String,

        /// Bases taken from each side of a chunk boundary for alignment
        #[clap(short = 'w', long, value_parser, default_value_t = AlignConfig::default().window)]
        window: usize,

        /// Score for a matching base
        #[clap(long, value_parser, default_value_t = AlignConfig::default().match_score)]
        match_score: i32,

        /// Score for a mismatching base
        #[clap(long, value_parser, allow_hyphen_values = true, default_value_t = AlignConfig::default().mismatch_score)]
        mismatch_score: i32,

        /// Penalty for opening a gap
        #[clap(long, value_parser, default_value_t = AlignConfig::default().gap_open)]
        gap_open: i32,

        /// Penalty for extending a gap
        #[clap(long, value_parser, default_value_t = AlignConfig::default().gap_extend)]
        gap_extend: i32,

        /// Minimum alignment score accepted as a splice anchor
        #[clap(short = 'm', long, value_parser, default_value_t = AlignConfig::default().min_anchor_score)]
        min_anchor_score: i32,

        /// Concatenate chunks of the same region (<region>_<index> ids) without aligning them
        #[clap(long, action)]
        contiguous_regions: bool,

        /// Exit with an error if any contig failed to stitch
        #[clap(long, action)]
        strict: bool,
    },
    /// Print prediction store statistics
    Stats {
        #[clap(flatten)]
        common: CommonOpts,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Stitch {
            common,
            output_dir,
            output_prefix,
            window,
            match_score,
            mismatch_score,
            gap_open,
            gap_extend,
            min_anchor_score,
            contiguous_regions,
            strict,
        } => {
            init_logger(common.verbose);
            let store = PredictionFile::open(&common.sequence_store)?;
            // Fail on a store without predictions before creating any output
            let contigs = store.list_contigs()?;
            info!(
                "Prediction store {} lists {} contigs",
                common.sequence_store,
                contigs.len()
            );

            let config = RunConfig {
                threads: common.num_threads,
                stitch: StitchConfig {
                    align: AlignConfig {
                        window,
                        match_score,
                        mismatch_score,
                        gap_open,
                        gap_extend,
                        min_anchor_score,
                    },
                    contiguous_regions,
                },
            };
            config.stitch.align.validate()?;

            let (output_path, mut sink) =
                create_consensus_fasta(Path::new(&output_dir), &output_prefix)?;
            info!("Writing consensus to {}", output_path.display());

            let summary = run_stitching(&store, &mut sink, &config)?;
            info!(
                "Wrote {} consensus records to {}",
                sink.records(),
                output_path.display()
            );
            sink.finish()?;

            if summary.has_failures() {
                let names: Vec<&str> = summary.failed.iter().map(|(c, _)| c.as_str()).collect();
                error!(
                    "{} contigs were skipped and are missing from the output: {}",
                    names.len(),
                    names.join(", ")
                );
            }
            if strict && summary.has_failures() {
                return Err(io::Error::other(format!(
                    "{} of {} contigs failed to stitch",
                    summary.failed.len(),
                    summary.contigs
                )));
            }
        }
        Args::Stats { common } => {
            init_logger(common.verbose);
            let store = PredictionFile::open(&common.sequence_store)?;
            let summary = summarize_store(&store)?;

            println!("Number of contigs: {}", summary.contigs);
            println!("Number of chunks: {}", summary.chunks);
            println!("Predicted positions: {}", summary.predicted_positions);
            if summary.contigs > 0 {
                println!(
                    "Mean chunks per contig: {:.2}",
                    summary.chunks as f64 / summary.contigs as f64
                );
            }
            if let Some((contig, chunks)) = summary.largest_contig {
                println!("Largest contig: {} ({} chunks)", contig, chunks);
            }
        }
    }

    Ok(())
}

fn init_logger(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();
}
