use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for finished contig consensus sequences.
pub trait ConsensusSink {
    fn write_contig(&mut self, contig: &str, sequence: &[u8]) -> io::Result<()>;
}

/// Writes one two-line FASTA record per contig.
pub struct FastaSink<W: Write> {
    writer: W,
    records: usize,
}

impl<W: Write> FastaSink<W> {
    pub fn new(writer: W) -> Self {
        FastaSink { writer, records: 0 }
    }

    /// Number of records written so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> ConsensusSink for FastaSink<W> {
    fn write_contig(&mut self, contig: &str, sequence: &[u8]) -> io::Result<()> {
        writeln!(self.writer, ">{}", contig)?;
        self.writer.write_all(sequence)?;
        writeln!(self.writer)?;
        self.records += 1;
        Ok(())
    }
}

/// Collects records in memory, in the order they are written.
impl ConsensusSink for Vec<(String, Vec<u8>)> {
    fn write_contig(&mut self, contig: &str, sequence: &[u8]) -> io::Result<()> {
        self.push((contig.to_string(), sequence.to_vec()));
        Ok(())
    }
}

pub fn consensus_output_path(output_dir: &Path, prefix: &str) -> PathBuf {
    output_dir.join(format!("{}_consensus.fa", prefix))
}

/// Create the output directory if needed and open the consensus FASTA in it
pub fn create_consensus_fasta(
    output_dir: &Path,
    prefix: &str,
) -> io::Result<(PathBuf, FastaSink<BufWriter<File>>)> {
    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir)?;
        info!("Created output directory {}", output_dir.display());
    }
    let path = consensus_output_path(output_dir, prefix);
    let file = File::create(&path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to create output file '{}': {}", path.display(), e),
        )
    })?;
    Ok((path, FastaSink::new(BufWriter::new(file))))
}
