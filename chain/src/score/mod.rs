//! Witness skip-score engine: the fork-choice rule for the block DAG.
//!
//! Blocks do not extend a single chain; any block may name any prior block
//! as its parent, and the graph folds into one canonical sequence by
//! picking, at every fork, the branch with the highest recursively-computed
//! "skip score". This module transcribes `ComputeSkip`, `CheckBadSigOrder`,
//! and `CalcSkipScore`/`CalcSkipScoreRecursive` from the original
//! implementation's `block.cpp`, generalized from raw pointer walks over a
//! `SmartBuf` heap to an `Arc<BlockNode>` walk.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::types::block::BlockNode;

/// Width, in bits, of the left-justified score window returned by
/// [`calc_skip_score`]. Scores are always compared as plain `u64`s once
/// left-justified, so a wider or later-arriving branch with a smaller
/// absolute skip sum can still lose to a branch with more signatures.
pub const MAX_SCORE_BITS: u32 = 64;

/// `skip(prev_witness, next_witness, n)`: the number of witness slots
/// between the expected next witness (`prev_witness + 1 mod n`) and the
/// witness that actually signed. Zero means the committee signed in
/// perfect round-robin order.
pub fn skip(prev_witness: u8, next_witness: u8, nwitnesses: u8) -> u16 {
    let n = nwitnesses as i64;
    let prev = prev_witness as i64;
    let next = next_witness as i64;
    (((next - ((prev + 1).rem_euclid(n))).rem_euclid(n)) as u16).min(u16::MAX)
}

/// Walks back through `nconfsigs` (or `next_nconfsigs` when `top_witness`
/// is being considered as an extension of the branch) prior blocks,
/// summing skip values, and rejects the branch if the accumulated skip
/// exceeds what `nwitnesses` can tolerate without a witness signing twice
/// within the confirmation window.
///
/// `top_witness`: when `Some(w)`, the caller is a witness evaluating
/// whether building atop `block` with witness index `w` would itself
/// violate ordering, before any block has actually been produced. This
/// mirrors the original's `top_witness >= 0` branch, which recomputes
/// `nwitnesses`/`nconfsigs` from the block's `next_*` fields rather than
/// its current ones, since a block the witness is about to build would
/// fall under whatever committee is active *after* this block.
pub fn check_bad_sig_order(block: &Arc<BlockNode>, top_witness: Option<u8>) -> Result<bool, &'static str> {
    let mut cur = Arc::clone(block);

    let (mut nwitnesses, mut nconfsigs) = (cur.aux.params.nwitnesses, cur.aux.params.nconfsigs);

    if top_witness.is_some() {
        nwitnesses = cur.aux.params.next_nwitnesses;
        nconfsigs = ((nwitnesses as u32 - cur.aux.params.next_maxmal as u32) / 2
            + cur.aux.params.next_maxmal as u32
            + 1) as u8;
    }

    let mut nsigs: u32 = 0;
    let mut skipsum: u32 = 0;

    if let Some(w) = top_witness {
        nsigs += 1;
        skipsum += skip(cur.aux.witness, w, nwitnesses) as u32;
    }

    while nsigs < nconfsigs as u32 {
        nsigs += 1;
        skipsum += cur.aux.skip as u32;

        let prior = cur.prior.lock().clone();
        let Some(prior_block) = prior else {
            if cur.aux.level != 0 {
                return Ok(true);
            }
            break;
        };

        let expected_level = cur.aux.level - 1;
        cur = prior_block;

        if cur.aux.level != expected_level {
            return Err("block level sequence error");
        }
    }

    Ok(skipsum + nconfsigs as u32 > nwitnesses as u32)
}

/// Recursively computes the bit-packed skip score of `block` relative to
/// `last_indelible`, with memoization keyed by `genstamp`. Returns
/// `(score, scorebits)` *not yet left-justified* to [`MAX_SCORE_BITS`];
/// only the outermost call (made through [`calc_skip_score`]) performs
/// that final shift, matching the original's split between the recursive
/// helper and its public entry point.
fn calc_skip_score_recursive(
    block: &Arc<BlockNode>,
    last_indelible: &Arc<BlockNode>,
    genstamp: u32,
    maltest: bool,
) -> (u64, u32) {
    if genstamp != 0 && genstamp == block.aux.score_genstamp.load(Ordering::Acquire) {
        if let Some((score, bits)) = *block.aux.score.lock().unwrap() {
            return (score, bits as u32);
        }
    }

    if Arc::ptr_eq(block, last_indelible) && !maltest {
        return (1, 1);
    }

    if block.aux.level <= last_indelible.aux.level && !maltest {
        return (0, 0);
    }

    if maltest {
        let offset = block.aux.params.nskipconfsigs as u64;
        let target_level = last_indelible.aux.level.saturating_sub(offset);
        if block.aux.level <= target_level {
            return (1, 1);
        }
    }

    let prior = block.prior.lock().clone();
    let Some(prior_block) = prior else {
        return if maltest { (1, 1) } else { (0, 0) };
    };

    let (score, scorebits) = calc_skip_score_recursive(&prior_block, last_indelible, genstamp, maltest);

    if score == 0 {
        return (0, 0);
    }

    let score = (score << (block.aux.skip as u32 + 1)) | 1;
    let scorebits = scorebits + block.aux.skip as u32 + 1;

    if genstamp != 0 {
        *block.aux.score.lock().unwrap() = Some((score, scorebits as u16));
        block.aux.score_genstamp.store(genstamp, Ordering::Release);
    }

    (score, scorebits)
}

/// Computes the left-justified skip score of `block` relative to
/// `last_indelible`. Returns `0` if `block` does not chain back to
/// `last_indelible` at all (production mode only — `maltest` mode never
/// returns a hard zero for a missing or pruned ancestor, since it exists
/// to measure how *far* a malicious branch got, not to enforce chaining).
///
/// `top_witness`: when `Some(w)`, folds in one additional hypothetical
/// signature from witness `w` extending `block`, used by the witness
/// builder to compare "build here" against competing branches before
/// actually producing a block.
pub fn calc_skip_score(
    block: &Arc<BlockNode>,
    top_witness: Option<u8>,
    last_indelible: &Arc<BlockNode>,
    genstamp: u32,
    maltest: bool,
) -> u64 {
    if maltest {
        let offset = block.aux.params.nskipconfsigs as u64;
        let target_level = last_indelible.aux.level.saturating_sub(offset);
        if block.aux.level <= target_level {
            return 0;
        }
    }

    let (mut score, mut scorebits) = calc_skip_score_recursive(block, last_indelible, genstamp, maltest);

    if score != 0 {
        if let Some(w) = top_witness {
            let nwitnesses = block.aux.params.next_nwitnesses;
            let s = skip(block.aux.witness, w, nwitnesses) as u32;
            score = (score << (s + 1)) | 1;
            scorebits += s + 1;
        }
    }

    if scorebits > MAX_SCORE_BITS {
        if maltest {
            scorebits = MAX_SCORE_BITS;
        } else {
            score = 0;
        }
    }

    if scorebits < MAX_SCORE_BITS {
        score <<= MAX_SCORE_BITS - scorebits;
    }

    score
}
