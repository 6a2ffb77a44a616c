//! Alignment-guided stitching of the ordered chunks of one contig
//!
//! Stitching is a left fold over chunks in key order: each decoded chunk is
//! spliced onto the consensus built so far at the anchor found between the
//! consensus tail and the chunk head. Only adjacent chunks are ever aligned.

use crate::align::{find_anchor, AlignConfig};
use crate::error::StitchErr;
use crate::prediction_store::ChunkStore;
use log::{debug, warn};

/// Configuration for stitching one contig.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StitchConfig {
    pub align: AlignConfig,
    /// Concatenate consecutive chunks of the same region without aligning them.
    /// Default: false
    pub contiguous_regions: bool,
}

/// Counters describing how a contig's chunks were joined.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StitchStats {
    pub chunks: usize,
    pub empty_chunks: usize,
    pub anchored: usize,
    pub fallbacks: usize,
    pub contained: usize,
    pub region_joins: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchOutcome {
    pub sequence: Vec<u8>,
    pub stats: StitchStats,
}

impl StitchOutcome {
    /// The consensus, or `None` when every chunk decoded empty
    pub fn into_consensus(self) -> Option<Vec<u8>> {
        if self.sequence.is_empty() {
            None
        } else {
            Some(self.sequence)
        }
    }
}

/// Region prefix of a `<region>_<index>` chunk id.
pub fn chunk_region(chunk_id: &str) -> Option<&str> {
    let (region, index) = chunk_id.rsplit_once('_')?;
    if region.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(region)
}

/// Incremental consensus builder for one contig.
pub struct Stitcher<'a> {
    contig: &'a str,
    config: &'a StitchConfig,
    consensus: Vec<u8>,
    prev_chunk: Option<String>,
    stats: StitchStats,
}

impl<'a> Stitcher<'a> {
    pub fn new(contig: &'a str, config: &'a StitchConfig) -> Self {
        Stitcher {
            contig,
            config,
            consensus: Vec::new(),
            prev_chunk: None,
            stats: StitchStats::default(),
        }
    }

    /// Current consensus length
    pub fn len(&self) -> usize {
        self.consensus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consensus.is_empty()
    }

    /// Splice the next chunk (in key order) onto the consensus.
    pub fn push(&mut self, chunk_id: &str, decoded: &[u8]) {
        self.stats.chunks += 1;
        let same_region = self.config.contiguous_regions
            && self
                .prev_chunk
                .as_deref()
                .and_then(chunk_region)
                .is_some_and(|prev| chunk_region(chunk_id) == Some(prev));
        self.prev_chunk = Some(chunk_id.to_string());

        if decoded.is_empty() {
            self.stats.empty_chunks += 1;
            debug!("{}: chunk {} decoded empty", self.contig, chunk_id);
            return;
        }
        if self.is_empty() {
            self.consensus.extend_from_slice(decoded);
            return;
        }
        if same_region {
            self.consensus.extend_from_slice(decoded);
            self.stats.region_joins += 1;
            return;
        }

        match find_anchor(&self.consensus, decoded, &self.config.align) {
            Some(anchor) => {
                let replaced_tail = self.len() - anchor.left_offset;
                let appended = decoded.len() - anchor.right_offset;
                if appended < replaced_tail {
                    // The rest of the chunk lies inside the already stitched overlap
                    debug!(
                        "{}: chunk {} is contained in the consensus tail (anchor {}:{}, score {})",
                        self.contig, chunk_id, anchor.left_offset, anchor.right_offset, anchor.score
                    );
                    self.stats.contained += 1;
                    return;
                }
                debug!(
                    "{}: chunk {} anchored at {}:{} with score {}",
                    self.contig, chunk_id, anchor.left_offset, anchor.right_offset, anchor.score
                );
                self.consensus.truncate(anchor.left_offset);
                self.consensus
                    .extend_from_slice(&decoded[anchor.right_offset..]);
                self.stats.anchored += 1;
            }
            None => {
                warn!(
                    "{}: no confident anchor before chunk {}, concatenating without trimming",
                    self.contig, chunk_id
                );
                self.consensus.extend_from_slice(decoded);
                self.stats.fallbacks += 1;
            }
        }
    }

    pub fn finish(self) -> StitchOutcome {
        StitchOutcome {
            sequence: self.consensus,
            stats: self.stats,
        }
    }
}

/// Stitch already decoded chunks, given in key order.
pub fn stitch_sequences<K, S>(
    contig: &str,
    chunks: impl IntoIterator<Item = (K, S)>,
    config: &StitchConfig,
) -> StitchOutcome
where
    K: AsRef<str>,
    S: AsRef<[u8]>,
{
    let mut stitcher = Stitcher::new(contig, config);
    for (chunk_id, decoded) in chunks {
        stitcher.push(chunk_id.as_ref(), decoded.as_ref());
    }
    stitcher.finish()
}

/// Read, decode and stitch every chunk of `contig`.
///
/// The first missing chunk or malformed prediction aborts the contig.
pub fn stitch_contig<S: ChunkStore + ?Sized>(
    store: &S,
    contig: &str,
    config: &StitchConfig,
) -> Result<StitchOutcome, StitchErr> {
    let chunk_ids = store.list_chunks(contig)?;
    let mut stitcher = Stitcher::new(contig, config);

    for chunk_id in &chunk_ids {
        let prediction = store.read_chunk(contig, chunk_id)?;
        let decoded = prediction.decode().map_err(|source| StitchErr::Decode {
            chunk: chunk_id.clone(),
            source,
        })?;
        stitcher.push(chunk_id, &decoded);
    }

    Ok(stitcher.finish())
}
