//! Program derived addresses.
//!
//! A PDA is `SHA-256(seed_0 || ... || seed_n || program_id || "ProgramDerivedAddress")`
//! that is required to fall OFF the Ed25519 curve, so no private key can
//! ever sign for it. Only the owning program can "sign" via `invoke_signed`.

use sha2::{Digest, Sha256};

use crate::address::{Address, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::error::SolError;

/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds, bump included.
pub const MAX_SEEDS: usize = 16;

/// Domain tag appended to every PDA preimage.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Derive a program address from `seeds` and `program_id`.
///
/// Fails with [`SolError::MaxSeedsExceeded`] past 16 seeds, with
/// [`SolError::MaxSeedLengthExceeded`] when any seed is longer
/// than 32 bytes and with [`SolError::InvalidSeeds`] when the hash lands on
/// the curve.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<Address, SolError> {
    if seeds.len() > MAX_SEEDS {
        return Err(SolError::MaxSeedsExceeded {
            len: seeds.len(),
            max: MAX_SEEDS,
        });
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        if seed.len() > MAX_SEED_LEN {
            return Err(SolError::MaxSeedLengthExceeded {
                len: seed.len(),
                max: MAX_SEED_LEN,
            });
        }
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();
    let address = Address::new(hash);

    if address.is_on_curve() {
        return Err(SolError::InvalidSeeds);
    }

    Ok(address)
}

/// Find a valid program address and its bump seed.
///
/// Bumps are tried from 255 down to 1 and the first off-curve result wins.
/// Bump 0 is never tried.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), SolError> {
    for bump in (1u8..=255).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(SolError::InvalidSeeds) => {}
            Err(e) => return Err(e),
        }
    }

    Err(SolError::NoViableBump)
}

/// Derive an address from a base address, a text seed and an owner program.
///
/// `SHA-256(base || seed || owner)`. Unlike a PDA the result may lie on the
/// curve.
pub fn create_with_seed(base: &Address, seed: &str, owner: &Address) -> Result<Address, SolError> {
    if seed.len() > MAX_SEED_LEN {
        return Err(SolError::MaxSeedLengthExceeded {
            len: seed.len(),
            max: MAX_SEED_LEN,
        });
    }

    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(seed.as_bytes());
    hasher.update(owner.as_bytes());
    Ok(Address::new(hasher.finalize().into()))
}

/// Derive the associated token account address for a wallet + mint pair.
///
/// The ATA is a PDA with seeds `[wallet, token_program_id, mint]` under the
/// Associated Token Account program.
pub fn get_associated_token_address(wallet: &Address, mint: &Address) -> Result<Address, SolError> {
    find_program_address(
        &[
            wallet.as_bytes(),
            TOKEN_PROGRAM_ID.as_bytes(),
            mint.as_bytes(),
        ],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}
