//! Architecture matcher: scores a candidate code window against every
//! loaded profile and accepts at most one.
//!
//! Acceptance is gated twice: the best score must clear the mode-dependent
//! confidence threshold, and it must beat the runner-up by a minimum
//! separation. Scores inside the separation margin resolve to "no match", a
//! hard rule, so closely related encodings (e.g. 32/64-bit variants of one
//! family) never flip-flop between runs.

use crate::arch::CodeInfo;
use crate::sigdb::SignatureDatabase;
use tracing::trace;

/// Acceptance threshold in normal mode.
pub const ACCEPT_THRESHOLD: f32 = 0.48;

/// Acceptance threshold in aggressive mode. Lower threshold, higher code
/// recall, more false positives; a deliberate caller-controlled trade-off.
pub const ACCEPT_THRESHOLD_AGGRESSIVE: f32 = 0.30;

/// Minimum margin the best profile must have over the runner-up.
pub const MIN_SEPARATION: f32 = 0.02;

/// Windows shorter than this carry too little signal to score.
pub const MIN_MATCH_WINDOW: usize = 16;

/// Score `window` against every profile in `db` and return the winning
/// architecture with its bitness and endianness, or `None`.
///
/// Scores themselves are mode-independent; `aggressive` only selects the
/// acceptance threshold, so the set of windows matched in normal mode is a
/// subset of the set matched aggressively.
pub fn match_window(
    window: &[u8],
    db: &SignatureDatabase,
    aggressive: bool,
) -> Option<CodeInfo> {
    if window.len() < MIN_MATCH_WINDOW {
        return None;
    }

    let mut best: Option<(f32, CodeInfo, &str)> = None;
    let mut second_score = 0.0f32;

    for profile in db.profiles() {
        let score = profile.score(window);
        match best {
            Some((best_score, _, _)) if score > best_score => {
                second_score = best_score;
                best = Some((score, profile.info, profile.name.as_str()));
            }
            Some((best_score, _, _)) => {
                if score > second_score && score < best_score {
                    second_score = score;
                }
                // An exact tie with the leader leaves the separation at
                // zero, which the margin check below rejects.
                if (score - best_score).abs() < f32::EPSILON {
                    second_score = best_score;
                }
            }
            None => best = Some((score, profile.info, profile.name.as_str())),
        }
    }

    let (best_score, info, name) = best?;
    let threshold = if aggressive {
        ACCEPT_THRESHOLD_AGGRESSIVE
    } else {
        ACCEPT_THRESHOLD
    };

    trace!(
        profile = name,
        best = best_score,
        second = second_score,
        threshold,
        "architecture match candidate"
    );

    if best_score < threshold {
        return None;
    }
    if best_score - second_score < MIN_SEPARATION {
        // Ambiguous between near-equal profiles: classified as generic
        // data, never an arbitrary pick.
        return None;
    }
    Some(info)
}
