//! Contig-level parallel stitching with ordered output
//!
//! Each contig is one unit of work on a dedicated rayon pool, spawned in
//! listing order. Finished contigs travel over a channel to a sequenced
//! collector on the calling thread, which buffers results that arrive early
//! and hands each contig to the sink only after all earlier contigs.

use crate::error::StitchErr;
use crate::fasta::ConsensusSink;
use crate::prediction_store::ChunkStore;
use crate::stitch::{stitch_contig, StitchConfig, StitchOutcome, StitchStats};
use log::{debug, error, info, warn};
use rayon::ThreadPoolBuilder;
use std::collections::BTreeMap;
use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

pub const DEFAULT_THREADS: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

/// Configuration for a whole stitching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of worker threads stitching contigs.
    /// Default: 5
    pub threads: NonZeroUsize,
    pub stitch: StitchConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            threads: DEFAULT_THREADS,
            stitch: StitchConfig::default(),
        }
    }
}

/// What happened to each contig of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub contigs: usize,
    pub written: usize,
    pub empty: usize,
    /// Failed contigs with the error that stopped them, in listing order
    pub failed: Vec<(String, StitchErr)>,
    pub bases_written: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

enum ContigResult {
    Consensus(Vec<u8>, StitchStats),
    Empty(StitchStats),
    Failed(StitchErr),
}

/// Stitch every contig of `store` and write the consensus sequences to `sink`
/// in listing order.
///
/// A contig that fails to stitch is skipped and recorded in the summary. The
/// run itself fails only when the contigs cannot be listed (e.g. the store has
/// no predictions) or the sink cannot be written.
pub fn run_stitching<S, W>(
    store: &S,
    sink: &mut W,
    config: &RunConfig,
) -> Result<RunSummary, StitchErr>
where
    S: ChunkStore + ?Sized,
    W: ConsensusSink + ?Sized,
{
    let start = Instant::now();
    config.stitch.align.validate()?;
    let contigs = store.list_contigs()?;

    let available = num_cpus::get();
    if config.threads.get() > available {
        warn!(
            "Requested {} threads but only {} CPUs are available",
            config.threads, available
        );
    }
    info!(
        "Stitching {} contigs with {} threads",
        contigs.len(),
        config.threads
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.threads.get())
        .thread_name(|i| format!("stitch-{i}"))
        .build()
        .map_err(|e| io::Error::other(format!("Failed to build thread pool: {e}")))?;

    let mut summary = RunSummary {
        contigs: contigs.len(),
        ..RunSummary::default()
    };
    let abort = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<(usize, ContigResult)>();

    std::thread::scope(|scope| {
        let contigs = &contigs;
        let abort = &abort;
        let pool = &pool;
        let stitch_config = &config.stitch;

        scope.spawn(move || {
            pool.scope_fifo(|fifo| {
                for (idx, contig) in contigs.iter().enumerate() {
                    let tx = tx.clone();
                    fifo.spawn_fifo(move |_| {
                        if abort.load(Ordering::Relaxed) {
                            return;
                        }
                        let result = stitch_one(store, contig, stitch_config);
                        // Sending fails only once the collector gave up on a sink error
                        let _ = tx.send((idx, result));
                    });
                }
            });
            drop(tx);
        });

        collect_in_order(rx, contigs, sink, &mut summary, abort)
    })?;

    info!(
        "Stitched {} contigs in {:.2}s: {} written ({} bp), {} empty, {} failed",
        summary.contigs,
        start.elapsed().as_secs_f64(),
        summary.written,
        summary.bases_written,
        summary.empty,
        summary.failed.len()
    );

    Ok(summary)
}

fn stitch_one<S: ChunkStore + ?Sized>(store: &S, contig: &str, config: &StitchConfig) -> ContigResult {
    let start = Instant::now();
    match stitch_contig(store, contig, config) {
        Ok(StitchOutcome { sequence, stats }) => {
            debug!(
                "Stitched {} chunks of {} in {:.3}s",
                stats.chunks,
                contig,
                start.elapsed().as_secs_f64()
            );
            if sequence.is_empty() {
                ContigResult::Empty(stats)
            } else {
                ContigResult::Consensus(sequence, stats)
            }
        }
        Err(e) => ContigResult::Failed(e),
    }
}

/// Sequenced collector: buffers early results and emits contigs strictly in
/// listing order.
fn collect_in_order<W: ConsensusSink + ?Sized>(
    rx: mpsc::Receiver<(usize, ContigResult)>,
    contigs: &[String],
    sink: &mut W,
    summary: &mut RunSummary,
    abort: &AtomicBool,
) -> Result<(), StitchErr> {
    let mut pending: BTreeMap<usize, ContigResult> = BTreeMap::new();
    let mut next = 0usize;

    for (idx, result) in rx {
        pending.insert(idx, result);
        while let Some(result) = pending.remove(&next) {
            if let Err(e) = emit(&contigs[next], result, sink, summary) {
                abort.store(true, Ordering::Relaxed);
                return Err(e.into());
            }
            next += 1;
        }
    }

    Ok(())
}

fn emit<W: ConsensusSink + ?Sized>(
    contig: &str,
    result: ContigResult,
    sink: &mut W,
    summary: &mut RunSummary,
) -> io::Result<()> {
    match result {
        ContigResult::Consensus(sequence, stats) => {
            sink.write_contig(contig, &sequence)?;
            summary.written += 1;
            summary.bases_written += sequence.len();
            info!(
                "Finished contig {}: polished sequence length {} ({} chunks, {} anchored, {} concatenated)",
                contig,
                sequence.len(),
                stats.chunks,
                stats.anchored,
                stats.fallbacks
            );
        }
        ContigResult::Empty(stats) => {
            summary.empty += 1;
            warn!(
                "Contig {} produced an empty consensus from {} chunks, no record written",
                contig, stats.chunks
            );
        }
        ContigResult::Failed(err) => {
            error!("Skipping contig {}: {}", contig, err);
            summary.failed.push((contig.to_string(), err));
        }
    }
    Ok(())
}
