//! Local alignment of adjacent chunk boundaries
//!
//! The tail window of the left sequence is aligned against the head window of
//! the right sequence with an affine-gap Smith-Waterman (Gotoh) recurrence.
//! Only the end cell of the best local segment is needed to splice, so the
//! dynamic programming keeps two rows instead of a full traceback matrix.

use crate::error::StitchErr;
use log::debug;
use std::cmp::max;

const NEG_INF: i32 = i32::MIN / 2;
/// Largest `(window + 1) * |score|` accepted, keeping every DP cell and the
/// `NEG_INF` sentinels clear of `i32` overflow.
const MAX_SCORE_SPAN: u64 = (i32::MAX / 4) as u64;

/// Scoring and window parameters for boundary alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignConfig {
    /// Number of bases taken from each side of the boundary.
    /// Default: 50
    pub window: usize,
    /// Default: 1
    pub match_score: i32,
    /// Default: -1
    pub mismatch_score: i32,
    /// Penalty for the first position of a gap.
    /// Default: 2
    pub gap_open: i32,
    /// Penalty for each further position of a gap.
    /// Default: 1
    pub gap_extend: i32,
    /// Alignments scoring below this are reported as a miss.
    /// Default: 10
    pub min_anchor_score: i32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        AlignConfig {
            window: 50,
            match_score: 1,
            mismatch_score: -1,
            gap_open: 2,
            gap_extend: 1,
            min_anchor_score: 10,
        }
    }
}

impl AlignConfig {
    /// Check that the scoring can be evaluated without overflow.
    pub fn validate(&self) -> Result<(), StitchErr> {
        if self.match_score <= 0 {
            return Err(StitchErr::InvalidConfig(format!(
                "match score must be positive, got {}",
                self.match_score
            )));
        }
        if self.gap_open < 0 || self.gap_extend < 0 {
            return Err(StitchErr::InvalidConfig(format!(
                "gap penalties must not be negative, got open {} and extend {}",
                self.gap_open, self.gap_extend
            )));
        }
        let cells = (self.window as u64).saturating_add(1);
        let scores = [
            ("match score", self.match_score),
            ("mismatch score", self.mismatch_score),
            ("gap open", self.gap_open),
            ("gap extend", self.gap_extend),
        ];
        for (name, score) in scores {
            let span = cells.saturating_mul(u64::from(score.unsigned_abs()));
            if span > MAX_SCORE_SPAN {
                return Err(StitchErr::InvalidConfig(format!(
                    "{} {} is too large for a window of {}",
                    name, score, self.window
                )));
            }
        }
        Ok(())
    }
}

/// Splice point between two adjacent sequences.
///
/// `left_offset` is where the left sequence is cut (bases before it are kept),
/// `right_offset` is where the right sequence resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub left_offset: usize,
    pub right_offset: usize,
    pub score: i32,
}

/// Find the splice anchor between the end of `left` and the start of `right`.
///
/// Returns `None` when either window is empty or no local alignment reaches
/// `min_anchor_score`. `config` must pass [`AlignConfig::validate`].
pub fn find_anchor(left: &[u8], right: &[u8], config: &AlignConfig) -> Option<Anchor> {
    let left_start = left.len() - left.len().min(config.window);
    let tail = &left[left_start..];
    let head = &right[..right.len().min(config.window)];

    let (i, j, score) = best_local_end(tail, head, config)?;
    if score < config.min_anchor_score {
        debug!(
            "best boundary alignment scored {} (< {}), no anchor",
            score, config.min_anchor_score
        );
        return None;
    }

    Some(Anchor {
        left_offset: left_start + i,
        right_offset: j,
        score,
    })
}

#[inline]
fn substitution(a: u8, b: u8, config: &AlignConfig) -> i32 {
    if a == b && a != b'N' {
        config.match_score
    } else {
        config.mismatch_score
    }
}

/// End cell `(i, j, score)` of the best local alignment, where `i` and `j`
/// count the bases of `a` and `b` consumed.
///
/// Equal scores are resolved towards the end that discards the fewest bases
/// around the boundary, `(a.len() - i) + j`, then towards the smallest `(i, j)`.
fn best_local_end(a: &[u8], b: &[u8], config: &AlignConfig) -> Option<(usize, usize, i32)> {
    let m = a.len();
    let n = b.len();
    if m == 0 || n == 0 {
        return None;
    }

    let discarded = |i: usize, j: usize| (m - i) + j;

    let mut h_prev = vec![0i32; n + 1];
    let mut f_prev = vec![NEG_INF; n + 1];
    let mut h_cur = vec![0i32; n + 1];
    let mut f_cur = vec![NEG_INF; n + 1];
    let mut best: Option<(usize, usize, i32)> = None;

    for i in 1..=m {
        h_cur[0] = 0;
        f_cur[0] = NEG_INF;
        // Gap in `a` running along the current row
        let mut e = NEG_INF;

        for j in 1..=n {
            e = max(h_cur[j - 1] - config.gap_open, e - config.gap_extend);
            f_cur[j] = max(h_prev[j] - config.gap_open, f_prev[j] - config.gap_extend);
            let diag = h_prev[j - 1] + substitution(a[i - 1], b[j - 1], config);
            let h = max(max(0, diag), max(e, f_cur[j]));
            h_cur[j] = h;

            if h <= 0 {
                continue;
            }
            // Row-major scan visits the lexicographically smaller cell first,
            // so an equal candidate only wins on a strictly smaller discard.
            let better = match best {
                None => true,
                Some((bi, bj, bs)) => {
                    h > bs || (h == bs && discarded(i, j) < discarded(bi, bj))
                }
            };
            if better {
                best = Some((i, j, h));
            }
        }

        std::mem::swap(&mut h_prev, &mut h_cur);
        std::mem::swap(&mut f_prev, &mut f_cur);
    }

    best
}
