//! Library-level tests that tile a known genome into overlapping chunks,
//! store them in a prediction file and stitch them back.

use stitcher::fasta::FastaSink;
use stitcher::prediction_store::{ChunkPrediction, ChunkStore, MemoryStore, PredictionFile};
use stitcher::scheduler::{run_stitching, RunConfig};
use stitcher::stitch::{stitch_contig, StitchConfig};
use tempfile::TempDir;

fn make_random_dna(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"ACGT"[((state >> 33) % 4) as usize]
        })
        .collect()
}

/// Split `genome` into chunks of `chunk_len` that overlap by `overlap` bases.
fn tile(genome: &[u8], chunk_len: usize, overlap: usize) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_len).min(genome.len());
        chunks.push(genome[start..end].to_vec());
        if end == genome.len() {
            break;
        }
        start = end - overlap;
    }
    chunks
}

fn store_from_tiles(contig: &str, tiles: &[Vec<u8>]) -> MemoryStore {
    let mut store = MemoryStore::new();
    // Inserted back to front; the store must still list them by id
    for (k, tile) in tiles.iter().enumerate().rev() {
        store.insert_chunk(
            contig,
            &format!("{k:04}_0"),
            ChunkPrediction::from_sequence(tile, 12).unwrap(),
        );
    }
    store
}

#[test]
fn test_overlapping_tiles_reconstruct_genome() {
    let genome = make_random_dna(2000, 42);
    let tiles = tile(&genome, 300, 40);
    assert_eq!(tiles.len(), 8);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("predictions.bin");
    store_from_tiles("chr1", &tiles).write_to_path(&path).unwrap();

    let store = PredictionFile::open(&path).unwrap();
    let outcome = stitch_contig(&store, "chr1", &StitchConfig::default()).unwrap();
    assert_eq!(outcome.stats.chunks, 8);
    assert_eq!(outcome.stats.anchored, 7);
    assert_eq!(outcome.stats.fallbacks, 0);
    assert_eq!(outcome.sequence, genome);
}

#[test]
fn test_overlap_substitution_takes_left_chunk() {
    let genome = make_random_dna(2000, 42);
    let mut tiles = tile(&genome, 300, 40);
    // Corrupt one base inside every overlap on the right-hand chunk
    for tile in tiles.iter_mut().skip(1) {
        tile[20] = if tile[20] == b'A' { b'C' } else { b'A' };
    }

    let store = store_from_tiles("chr1", &tiles);
    let outcome = stitch_contig(&store, "chr1", &StitchConfig::default()).unwrap();
    assert_eq!(outcome.stats.anchored, 7);
    assert_eq!(outcome.sequence, genome);
}

#[test]
fn test_run_over_prediction_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("predictions.bin");

    let mut store = MemoryStore::new();
    let mut genomes = Vec::new();
    for (i, contig) in ["chr2", "chr10", "chr1"].iter().enumerate() {
        let genome = make_random_dna(900, 7 + i as u64);
        for (k, tile) in tile(&genome, 250, 35).iter().enumerate() {
            store.insert_chunk(
                contig,
                &format!("{k:04}_0"),
                ChunkPrediction::from_sequence(tile, 12).unwrap(),
            );
        }
        genomes.push((contig.to_string(), genome));
    }
    store.write_to_path(&path).unwrap();

    let file = PredictionFile::open(&path).unwrap();
    assert_eq!(file.list_contigs().unwrap(), vec!["chr1", "chr10", "chr2"]);

    let mut sink = FastaSink::new(Vec::new());
    let summary = run_stitching(&file, &mut sink, &RunConfig::default()).unwrap();
    assert_eq!(summary.written, 3);
    assert!(!summary.has_failures());

    genomes.sort();
    let mut expected = Vec::new();
    for (contig, genome) in &genomes {
        expected.extend_from_slice(format!(">{contig}\n").as_bytes());
        expected.extend_from_slice(genome);
        expected.push(b'\n');
    }
    assert_eq!(sink.finish().unwrap(), expected);
}
