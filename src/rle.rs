//! Run-length decoding of per-chunk base predictions
//!
//! The predictor emits one base label and one run length per pileup column.
//! A column labelled as a gap is a deletion call and contributes no bases;
//! every other column expands to its base repeated `run_length` times.

/// Numeric base labels as stored in chunk predictions.
pub const GAP_LABEL: u8 = 0;
const LABEL_BASES: [u8; 6] = [0, b'A', b'C', b'G', b'T', b'N'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErr {
    NonPositiveRunLength { position: usize, value: i32 },
    UnknownLabel { position: usize, label: u8 },
    LengthMismatch { labels: usize, run_lengths: usize },
}

impl std::fmt::Display for DecodeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErr::NonPositiveRunLength { position, value } => write!(
                f,
                "run length {} at position {} must be positive",
                value, position
            ),
            DecodeErr::UnknownLabel { position, label } => {
                write!(f, "unknown base label {} at position {}", label, position)
            }
            DecodeErr::LengthMismatch {
                labels,
                run_lengths,
            } => write!(
                f,
                "{} base labels but {} run lengths",
                labels, run_lengths
            ),
        }
    }
}

impl std::error::Error for DecodeErr {}

/// Map a base label to its nucleotide, `None` for a gap.
pub fn label_to_base(label: u8) -> Option<Option<u8>> {
    match label {
        GAP_LABEL => Some(None),
        1..=5 => Some(Some(LABEL_BASES[label as usize])),
        _ => None,
    }
}

/// Map a nucleotide (either case) to its base label.
pub fn base_to_label(base: u8) -> Option<u8> {
    match base.to_ascii_uppercase() {
        b'A' => Some(1),
        b'C' => Some(2),
        b'G' => Some(3),
        b'T' => Some(4),
        b'N' => Some(5),
        _ => None,
    }
}

/// Expand (label, run length) pairs into literal bases.
pub fn decode_run_lengths(labels: &[u8], run_lengths: &[i32]) -> Result<Vec<u8>, DecodeErr> {
    if labels.len() != run_lengths.len() {
        return Err(DecodeErr::LengthMismatch {
            labels: labels.len(),
            run_lengths: run_lengths.len(),
        });
    }

    let mut decoded = Vec::with_capacity(labels.len());
    for (position, (&label, &run_length)) in labels.iter().zip(run_lengths).enumerate() {
        let base = match label_to_base(label) {
            Some(Some(base)) => base,
            // Gap: deletion call, run length ignored
            Some(None) => continue,
            None => return Err(DecodeErr::UnknownLabel { position, label }),
        };
        if run_length <= 0 {
            return Err(DecodeErr::NonPositiveRunLength {
                position,
                value: run_length,
            });
        }
        decoded.resize(decoded.len() + run_length as usize, base);
    }

    Ok(decoded)
}

/// Run-length encode a base sequence into parallel label and run-length arrays.
///
/// Runs longer than `max_run_length` are split across consecutive entries with
/// the same label, so every stored run length is within `1..=max_run_length`.
pub fn encode_sequence(
    sequence: &[u8],
    max_run_length: usize,
) -> Result<(Vec<u8>, Vec<i32>), DecodeErr> {
    let max_run_length = max_run_length.clamp(1, i32::MAX as usize);
    let mut labels = Vec::new();
    let mut run_lengths = Vec::new();

    let mut i = 0;
    while i < sequence.len() {
        let label = base_to_label(sequence[i]).ok_or(DecodeErr::UnknownLabel {
            position: i,
            label: sequence[i],
        })?;

        let mut run = 1usize;
        while i + run < sequence.len() && base_to_label(sequence[i + run]) == Some(label) {
            run += 1;
        }

        let mut remaining = run;
        while remaining > 0 {
            let step = remaining.min(max_run_length);
            labels.push(label);
            run_lengths.push(step as i32);
            remaining -= step;
        }
        i += run;
    }

    Ok((labels, run_lengths))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_expands_runs() {
        let decoded = decode_run_lengths(&[1, 2, 3, 4], &[3, 1, 2, 1]).unwrap();
        assert_eq!(decoded, b"AAACGGT");
    }

    #[test]
    fn test_decode_skips_gaps_and_ignores_their_run_length() {
        let decoded = decode_run_lengths(&[1, 0, 4, 0], &[2, 7, 1, -3]).unwrap();
        assert_eq!(decoded, b"AAT");
    }

    #[test]
    fn test_decode_all_gaps_is_empty() {
        let decoded = decode_run_lengths(&[0, 0, 0], &[1, 0, 5]).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_n_label() {
        assert_eq!(decode_run_lengths(&[5, 1], &[2, 1]).unwrap(), b"NNA");
    }

    #[test]
    fn test_decode_zero_run_length_is_error() {
        let err = decode_run_lengths(&[1, 2], &[1, 0]).unwrap_err();
        assert_eq!(
            err,
            DecodeErr::NonPositiveRunLength {
                position: 1,
                value: 0
            }
        );
    }

    #[test]
    fn test_decode_negative_run_length_is_error() {
        let err = decode_run_lengths(&[3], &[-2]).unwrap_err();
        assert_eq!(
            err,
            DecodeErr::NonPositiveRunLength {
                position: 0,
                value: -2
            }
        );
    }

    #[test]
    fn test_decode_unknown_label_is_error() {
        let err = decode_run_lengths(&[1, 6], &[1, 1]).unwrap_err();
        assert_eq!(err, DecodeErr::UnknownLabel { position: 1, label: 6 });
    }

    #[test]
    fn test_decode_length_mismatch_is_error() {
        let err = decode_run_lengths(&[1, 2, 3], &[1, 1]).unwrap_err();
        assert_eq!(
            err,
            DecodeErr::LengthMismatch {
                labels: 3,
                run_lengths: 2
            }
        );
    }

    #[test]
    fn test_encode_splits_long_runs() {
        let (labels, run_lengths) = encode_sequence(b"AAAAAAAC", 3).unwrap();
        assert_eq!(labels, vec![1, 1, 1, 2]);
        assert_eq!(run_lengths, vec![3, 3, 1, 1]);
    }

    #[test]
    fn test_encode_rejects_unknown_base() {
        assert!(encode_sequence(b"ACXT", 10).is_err());
    }

    #[test]
    fn test_decode_round_trip() {
        let sequences: [&[u8]; 4] = [
            b"",
            b"ACGTTTTTTTTTTTTGCANNNA",
            b"GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
            b"acgtnACGTN",
        ];
        for max_run in [1, 4, 255] {
            for seq in sequences {
                let (labels, run_lengths) = encode_sequence(seq, max_run).unwrap();
                assert!(run_lengths.iter().all(|&r| r >= 1 && r as usize <= max_run));
                let decoded = decode_run_lengths(&labels, &run_lengths).unwrap();
                assert_eq!(decoded, seq.to_ascii_uppercase());
            }
        }
    }
}
