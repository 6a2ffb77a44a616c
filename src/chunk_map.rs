use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chunk map entry: chunk_id -> payload offset in the serialized prediction file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub chunk_id: String,
    pub offset: u64,
}

/// Chunk map structure: namespace -> contig -> chunk entries sorted by chunk_id
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChunkMap {
    pub namespaces: BTreeMap<String, BTreeMap<String, Vec<ChunkEntry>>>,
}

impl ChunkMap {
    /// Create a new empty chunk map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk_id -> offset mapping, keeping the contig's entries sorted
    pub fn add_entry(&mut self, namespace: &str, contig: &str, chunk_id: &str, offset: u64) {
        let entries = self
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .entry(contig.to_string())
            .or_default();
        match entries.binary_search_by(|e| e.chunk_id.as_str().cmp(chunk_id)) {
            Ok(idx) => entries[idx].offset = offset,
            Err(idx) => entries.insert(
                idx,
                ChunkEntry {
                    chunk_id: chunk_id.to_string(),
                    offset,
                },
            ),
        }
    }

    /// Take every contig of one namespace out of the map
    pub fn take_namespace(&mut self, namespace: &str) -> Option<BTreeMap<String, Vec<ChunkEntry>>> {
        self.namespaces.remove(namespace)
    }
}

/// Get the payload offset of a chunk from a contig's sorted entries
pub fn find_chunk_offset(entries: &[ChunkEntry], chunk_id: &str) -> Option<u64> {
    entries
        .binary_search_by(|e| e.chunk_id.as_str().cmp(chunk_id))
        .ok()
        .map(|idx| entries[idx].offset)
}
