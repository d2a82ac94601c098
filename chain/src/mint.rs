//! Mint window: the feature-gated bootstrap phase during which only mint
//! transactions are accepted, one per accepting witness per level, with a
//! per-level donation schedule.
//!
//! Transcribed from `CCmint.h`'s `CC_MINT_COUNT` and the mint-specific
//! branches referenced throughout `processtx.cpp`/`block.cpp`. Mint
//! bootstrap and genesis-file generation are out of scope here; this
//! module implements only the validity predicate a block validator
//! consults while the mint window is active.

use crate::types::tx::TxKind;

/// Number of levels, starting at genesis, during which only mint
/// transactions are admissible. The original source carries two values
/// under the same name for different network profiles (`200000` for
/// mainnet, `12` for a fast test profile); this crate exposes it as a
/// config knob rather than a compile-time constant so both profiles are
/// reachable without a rebuild.
pub const CC_MINT_COUNT_DEFAULT: u64 = 200_000;

#[derive(Clone, Copy, Debug)]
pub struct MintWindowConfig {
    pub mint_count: u64,
    pub enabled: bool,
}

impl Default for MintWindowConfig {
    fn default() -> Self {
        MintWindowConfig { mint_count: CC_MINT_COUNT_DEFAULT, enabled: false }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MintWindowViolation {
    /// A non-mint transaction was offered while the mint window is still
    /// open for this level.
    NonMintDuringMintWindow,
    /// More than one mint transaction from the same witness was offered
    /// at the same level.
    DuplicateMintPerLevel,
}

/// Whether `level` still falls inside the mint window.
pub fn is_mint_level(config: &MintWindowConfig, level: u64) -> bool {
    config.enabled && level < config.mint_count
}

/// Checks a block's transaction list against the mint-window rule: while
/// the window is open, every transaction in the block must be a `Mint`,
/// and a witness may contribute at most one per level.
pub fn check_mint_window(config: &MintWindowConfig, level: u64, tx_kinds: &[TxKind]) -> Result<(), MintWindowViolation> {
    if !is_mint_level(config, level) {
        return Ok(());
    }

    let mut mint_count = 0usize;
    for kind in tx_kinds {
        match kind {
            TxKind::Mint => mint_count += 1,
            _ => return Err(MintWindowViolation::NonMintDuringMintWindow),
        }
    }

    if mint_count > 1 {
        return Err(MintWindowViolation::DuplicateMintPerLevel);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_window_rejects_payment_tx_while_open() {
        let config = MintWindowConfig { mint_count: 10, enabled: true };
        let result = check_mint_window(&config, 3, &[TxKind::Payment]);
        assert_eq!(result, Err(MintWindowViolation::NonMintDuringMintWindow));
    }

    #[test]
    fn mint_window_allows_single_mint_tx() {
        let config = MintWindowConfig { mint_count: 10, enabled: true };
        let result = check_mint_window(&config, 3, &[TxKind::Mint]);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn mint_window_rejects_duplicate_mint_per_level() {
        let config = MintWindowConfig { mint_count: 10, enabled: true };
        let result = check_mint_window(&config, 3, &[TxKind::Mint, TxKind::Mint]);
        assert_eq!(result, Err(MintWindowViolation::DuplicateMintPerLevel));
    }

    #[test]
    fn window_closed_permits_any_tx_kind() {
        let config = MintWindowConfig { mint_count: 10, enabled: true };
        let result = check_mint_window(&config, 11, &[TxKind::Payment, TxKind::Payment]);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn disabled_mint_window_never_applies() {
        let config = MintWindowConfig { mint_count: 10, enabled: false };
        assert!(!is_mint_level(&config, 0));
    }
}
