// lib.rs
pub mod align;
pub mod chunk_map;
pub mod error;
pub mod fasta;
pub mod prediction_store;
pub mod rle;
pub mod scheduler;
pub mod stitch;
