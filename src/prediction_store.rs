//! Keyed access to materialized chunk predictions
//!
//! Predictions live in a hierarchy `namespace -> contig -> chunk`; stitching
//! only reads the `predictions` namespace. Chunk ids sort lexicographically in
//! genomic order, which is relied on and never re-validated here.

use crate::chunk_map::{find_chunk_offset, ChunkEntry, ChunkMap};
use crate::error::StitchErr;
use crate::rle::{decode_run_lengths, encode_sequence, DecodeErr};
use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PREDICTIONS_NAMESPACE: &str = "predictions";
const MAGIC: &[u8] = b"STCHPRD1";
const HEADER_SIZE: u64 = 16;
/// Decode limits so a corrupt length prefix fails instead of allocating
const CHUNK_DECODE_LIMIT: usize = 1 << 26;
const CHUNK_MAP_DECODE_LIMIT: usize = 1 << 30;

/// Raw prediction for one chunk: parallel base-label and run-length arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPrediction {
    pub labels: Vec<u8>,
    pub run_lengths: Vec<i32>,
}

impl ChunkPrediction {
    pub fn new(labels: Vec<u8>, run_lengths: Vec<i32>) -> Self {
        ChunkPrediction {
            labels,
            run_lengths,
        }
    }

    /// Build a prediction that decodes back to `sequence`.
    pub fn from_sequence(sequence: &[u8], max_run_length: usize) -> Result<Self, DecodeErr> {
        let (labels, run_lengths) = encode_sequence(sequence, max_run_length)?;
        Ok(ChunkPrediction::new(labels, run_lengths))
    }

    pub fn decode(&self) -> Result<Vec<u8>, DecodeErr> {
        decode_run_lengths(&self.labels, &self.run_lengths)
    }

    /// Number of predicted pileup positions
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Read-only access to chunk predictions, shared by all stitching workers.
pub trait ChunkStore: Sync {
    /// Contig ids in listing order.
    fn list_contigs(&self) -> Result<Vec<String>, StitchErr>;
    /// Chunk ids of one contig, sorted lexicographically.
    fn list_chunks(&self, contig: &str) -> Result<Vec<String>, StitchErr>;
    fn read_chunk(&self, contig: &str, chunk_id: &str) -> Result<ChunkPrediction, StitchErr>;
}

fn missing_namespace() -> StitchErr {
    StitchErr::NotFound(format!(
        "store does not contain the '{}' namespace",
        PREDICTIONS_NAMESPACE
    ))
}

fn missing_contig(contig: &str) -> StitchErr {
    StitchErr::NotFound(format!("contig '{}'", contig))
}

fn missing_chunk(contig: &str, chunk_id: &str) -> StitchErr {
    StitchErr::NotFound(format!("chunk '{}' of contig '{}'", chunk_id, contig))
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

type ContigChunks = BTreeMap<String, BTreeMap<String, ChunkPrediction>>;

/// Store held entirely in memory; also the builder for prediction files.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    namespaces: BTreeMap<String, ContigChunks>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store with an empty `predictions` namespace
    pub fn new() -> Self {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(PREDICTIONS_NAMESPACE.to_string(), ContigChunks::new());
        MemoryStore { namespaces }
    }

    /// Store with no namespaces at all
    pub fn without_predictions() -> Self {
        MemoryStore {
            namespaces: BTreeMap::new(),
        }
    }

    pub fn insert_chunk(&mut self, contig: &str, chunk_id: &str, prediction: ChunkPrediction) {
        self.insert_in(PREDICTIONS_NAMESPACE, contig, chunk_id, prediction);
    }

    pub fn insert_in(
        &mut self,
        namespace: &str,
        contig: &str,
        chunk_id: &str,
        prediction: ChunkPrediction,
    ) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .entry(contig.to_string())
            .or_default()
            .insert(chunk_id.to_string(), prediction);
    }

    fn predictions(&self) -> Result<&ContigChunks, StitchErr> {
        self.namespaces
            .get(PREDICTIONS_NAMESPACE)
            .ok_or_else(missing_namespace)
    }

    /// Serialize the store with its chunk map at the end
    pub fn write_to<W: Write + Seek>(&self, mut writer: W) -> io::Result<()> {
        let mut chunk_map = ChunkMap::new();

        writer.write_all(MAGIC)?;
        // Placeholder for the chunk map offset
        writer.write_all(&[0u8; 8])?;
        let mut current_offset = HEADER_SIZE;

        for (namespace, contigs) in &self.namespaces {
            for (contig, chunks) in contigs {
                if chunks.is_empty() {
                    // Keep the contig listed even without payloads
                    chunk_map
                        .namespaces
                        .entry(namespace.clone())
                        .or_default()
                        .entry(contig.clone())
                        .or_default();
                }
                for (chunk_id, prediction) in chunks {
                    chunk_map.add_entry(namespace, contig, chunk_id, current_offset);
                    let payload = bincode::serde::encode_to_vec(
                        (contig.as_str(), chunk_id.as_str(), prediction),
                        bincode::config::standard(),
                    )
                    .map_err(|e| {
                        io::Error::other(format!(
                            "Failed to encode chunk {chunk_id} of {contig}: {e:?}"
                        ))
                    })?;
                    writer.write_all(&payload)?;
                    current_offset += payload.len() as u64;
                }
            }
            if contigs.is_empty() {
                chunk_map.namespaces.entry(namespace.clone()).or_default();
            }
        }

        let chunk_map_offset = current_offset;
        let chunk_map_data =
            bincode::serde::encode_to_vec(&chunk_map, bincode::config::standard())
                .map_err(|e| io::Error::other(format!("Failed to encode chunk map: {e:?}")))?;
        writer.write_all(&chunk_map_data)?;

        // Go back and update the chunk map offset in the header
        writer.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        writer.write_all(&chunk_map_offset.to_le_bytes())?;
        writer.flush()?;

        Ok(())
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }
}

impl ChunkStore for MemoryStore {
    fn list_contigs(&self) -> Result<Vec<String>, StitchErr> {
        Ok(self.predictions()?.keys().cloned().collect())
    }

    fn list_chunks(&self, contig: &str) -> Result<Vec<String>, StitchErr> {
        let chunks = self
            .predictions()?
            .get(contig)
            .ok_or_else(|| missing_contig(contig))?;
        Ok(chunks.keys().cloned().collect())
    }

    fn read_chunk(&self, contig: &str, chunk_id: &str) -> Result<ChunkPrediction, StitchErr> {
        self.predictions()?
            .get(contig)
            .ok_or_else(|| missing_contig(contig))?
            .get(chunk_id)
            .cloned()
            .ok_or_else(|| missing_chunk(contig, chunk_id))
    }
}

// ---------------------------------------------------------------------------
// On-disk store
// ---------------------------------------------------------------------------

/// Prediction file opened for lazy, concurrent chunk reads.
///
/// Only the header and chunk map are read at open time; each `read_chunk`
/// opens its own handle and decodes one payload.
#[derive(Debug)]
pub struct PredictionFile {
    path: PathBuf,
    contig_order: Vec<String>,
    /// `None` when the file has no `predictions` namespace
    contigs: Option<FxHashMap<String, Vec<ChunkEntry>>>,
}

impl PredictionFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StitchErr> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StitchErr::NotFound(format!("prediction file {}", path.display()))
            } else {
                StitchErr::Io(e)
            }
        })?;
        let mut reader = BufReader::new(file);

        let mut magic_buf = [0u8; 8];
        reader.read_exact(&mut magic_buf).map_err(|_| {
            StitchErr::InvalidFormat(format!("{} is too short to be a prediction file", path.display()))
        })?;
        if magic_buf != MAGIC {
            return Err(StitchErr::InvalidFormat(format!(
                "invalid magic bytes in {}",
                path.display()
            )));
        }

        let mut offset_buf = [0u8; 8];
        reader.read_exact(&mut offset_buf)?;
        let chunk_map_offset = u64::from_le_bytes(offset_buf);

        reader.seek(SeekFrom::Start(chunk_map_offset))?;
        let mut chunk_map: ChunkMap = bincode::serde::decode_from_std_read(
            &mut reader,
            bincode::config::standard().with_limit::<CHUNK_MAP_DECODE_LIMIT>(),
        )
        .map_err(|e| StitchErr::InvalidFormat(format!("failed to load chunk map: {e}")))?;

        let (contig_order, contigs) = match chunk_map.take_namespace(PREDICTIONS_NAMESPACE) {
            Some(contigs) => {
                let order: Vec<String> = contigs.keys().cloned().collect();
                (order, Some(contigs.into_iter().collect::<FxHashMap<_, _>>()))
            }
            None => (Vec::new(), None),
        };
        debug!(
            "Opened prediction file {} with {} contigs",
            path.display(),
            contig_order.len()
        );

        Ok(PredictionFile {
            path,
            contig_order,
            contigs,
        })
    }

    fn entries(&self, contig: &str) -> Result<&[ChunkEntry], StitchErr> {
        self.contigs
            .as_ref()
            .ok_or_else(missing_namespace)?
            .get(contig)
            .map(Vec::as_slice)
            .ok_or_else(|| missing_contig(contig))
    }
}

impl ChunkStore for PredictionFile {
    fn list_contigs(&self) -> Result<Vec<String>, StitchErr> {
        if self.contigs.is_none() {
            return Err(missing_namespace());
        }
        Ok(self.contig_order.clone())
    }

    fn list_chunks(&self, contig: &str) -> Result<Vec<String>, StitchErr> {
        Ok(self
            .entries(contig)?
            .iter()
            .map(|e| e.chunk_id.clone())
            .collect())
    }

    fn read_chunk(&self, contig: &str, chunk_id: &str) -> Result<ChunkPrediction, StitchErr> {
        let offset = find_chunk_offset(self.entries(contig)?, chunk_id)
            .ok_or_else(|| missing_chunk(contig, chunk_id))?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);
        let (stored_contig, stored_chunk, prediction): (String, String, ChunkPrediction) =
            bincode::serde::decode_from_std_read(
                &mut reader,
                bincode::config::standard().with_limit::<CHUNK_DECODE_LIMIT>(),
            )
            .map_err(|e| {
                StitchErr::InvalidFormat(format!(
                    "failed to read chunk {chunk_id} of {contig}: {e}"
                ))
            })?;

        if stored_contig != contig || stored_chunk != chunk_id {
            return Err(StitchErr::InvalidFormat(format!(
                "chunk mismatch: expected {contig}/{chunk_id}, got {stored_contig}/{stored_chunk}"
            )));
        }

        Ok(prediction)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub contigs: usize,
    pub chunks: usize,
    pub predicted_positions: usize,
    /// Contig with the most chunks, with its chunk count
    pub largest_contig: Option<(String, usize)>,
}

/// Count contigs, chunks and predicted positions in a store
pub fn summarize_store<S: ChunkStore + ?Sized>(store: &S) -> Result<StoreSummary, StitchErr> {
    let mut summary = StoreSummary::default();
    for contig in store.list_contigs()? {
        let chunk_ids = store.list_chunks(&contig)?;
        for chunk_id in &chunk_ids {
            summary.predicted_positions += store.read_chunk(&contig, chunk_id)?.len();
        }
        summary.contigs += 1;
        summary.chunks += chunk_ids.len();
        let is_largest = summary
            .largest_contig
            .as_ref()
            .map_or(true, |(_, count)| chunk_ids.len() > *count);
        if is_largest {
            summary.largest_contig = Some((contig, chunk_ids.len()));
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prediction(seq: &[u8]) -> ChunkPrediction {
        ChunkPrediction::from_sequence(seq, 10).unwrap()
    }

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_chunk("contig_2", "0000_0", prediction(b"TTTT"));
        store.insert_chunk("contig_1", "0001_0", prediction(b"GGCC"));
        store.insert_chunk("contig_1", "0000_1", prediction(b"ACGT"));
        store.insert_chunk("contig_1", "0000_0", prediction(b"AACC"));
        store.insert_in("images", "contig_9", "0000_0", prediction(b"NNNN"));
        store
    }

    #[test]
    fn test_memory_store_listing_is_sorted() {
        let store = sample_store();
        assert_eq!(store.list_contigs().unwrap(), vec!["contig_1", "contig_2"]);
        assert_eq!(
            store.list_chunks("contig_1").unwrap(),
            vec!["0000_0", "0000_1", "0001_0"]
        );
        assert_eq!(store.read_chunk("contig_1", "0000_1").unwrap(), prediction(b"ACGT"));
    }

    #[test]
    fn test_memory_store_missing_keys() {
        let store = sample_store();
        assert!(matches!(
            store.list_chunks("contig_9"),
            Err(StitchErr::NotFound(_))
        ));
        assert!(matches!(
            store.read_chunk("contig_1", "0009_0"),
            Err(StitchErr::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_store_without_predictions_namespace() {
        let mut store = MemoryStore::without_predictions();
        store.insert_in("images", "contig_1", "0000_0", prediction(b"ACGT"));
        assert!(matches!(store.list_contigs(), Err(StitchErr::NotFound(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let store = sample_store();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("predictions.bin");
        store.write_to_path(&path).unwrap();

        let file = PredictionFile::open(&path).unwrap();
        assert_eq!(file.list_contigs().unwrap(), store.list_contigs().unwrap());
        for contig in file.list_contigs().unwrap() {
            let chunks = file.list_chunks(&contig).unwrap();
            assert_eq!(chunks, store.list_chunks(&contig).unwrap());
            for chunk_id in chunks {
                assert_eq!(
                    file.read_chunk(&contig, &chunk_id).unwrap(),
                    store.read_chunk(&contig, &chunk_id).unwrap()
                );
            }
        }
        assert!(matches!(
            file.read_chunk("contig_2", "0000_1"),
            Err(StitchErr::NotFound(_))
        ));
        // Other namespaces are not visible through the predictions view.
        assert!(matches!(
            file.list_chunks("contig_9"),
            Err(StitchErr::NotFound(_))
        ));
    }

    #[test]
    fn test_file_without_predictions_namespace() {
        let mut store = MemoryStore::without_predictions();
        store.insert_in("images", "contig_1", "0000_0", prediction(b"ACGT"));
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("images.bin");
        store.write_to_path(&path).unwrap();

        let file = PredictionFile::open(&path).unwrap();
        assert!(matches!(file.list_contigs(), Err(StitchErr::NotFound(_))));
    }

    #[test]
    fn test_empty_predictions_namespace_is_not_missing() {
        let store = MemoryStore::new();
        let mut buffer = Cursor::new(Vec::new());
        store.write_to(&mut buffer).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, buffer.into_inner()).unwrap();
        let file = PredictionFile::open(&path).unwrap();
        assert!(file.list_contigs().unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bogus.bin");
        std::fs::write(&path, b"NOTASTOREFILE___").unwrap();
        assert!(matches!(
            PredictionFile::open(&path),
            Err(StitchErr::InvalidFormat(_))
        ));
        assert!(matches!(
            PredictionFile::open(dir.path().join("missing.bin")),
            Err(StitchErr::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_length_prefix_is_invalid_format() {
        let mut store = MemoryStore::new();
        store.insert_chunk("chr1", "0000_0", prediction(b"ACGTACGTAC"));
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        store.write_to_path(&path).unwrap();

        // The first payload starts right after the header with the contig
        // name length; replace it with a 1 TiB varint length.
        let mut bytes = std::fs::read(&path).unwrap();
        let start = HEADER_SIZE as usize;
        bytes[start] = 253;
        bytes[start + 1..start + 9].copy_from_slice(&(1u64 << 40).to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        let file = PredictionFile::open(&path).unwrap();
        assert!(matches!(
            file.read_chunk("chr1", "0000_0"),
            Err(StitchErr::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_summarize_store() {
        let summary = summarize_store(&sample_store()).unwrap();
        assert_eq!(summary.contigs, 2);
        assert_eq!(summary.chunks, 4);
        // "AACC" -> 2 runs, "ACGT" -> 4, "GGCC" -> 2, "TTTT" -> 1
        assert_eq!(summary.predicted_positions, 9);
        assert_eq!(summary.largest_contig, Some(("contig_1".to_string(), 3)));
    }
}
