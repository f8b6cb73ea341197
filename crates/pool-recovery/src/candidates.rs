//! Candidate generation: the window of accounts the wallet could have opened.

use bitcoin::secp256k1::PublicKey;

use crate::account::{CandidateAccount, KeyLocator};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::keychain::{KeyDerivation, SharedSecretDerivation};

/// Derive `count` candidate accounts for indices `0..count`.
///
/// Any failure aborts the whole batch: the search is only defined over a
/// complete, gap-free window.
pub fn generate_candidates(
    count: u32,
    keys: &dyn KeyDerivation,
    secrets: &dyn SharedSecretDerivation,
    auctioneer_key: &PublicKey,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<CandidateAccount>> {
    let mut candidates = Vec::with_capacity(count as usize);

    for index in 0..count {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            log::info!("candidate generation cancelled at index {index}");
            return Err(Error::Cancelled);
        }

        let locator = KeyLocator::account(index);
        let trader_key = keys.derive_key(locator)?;
        if trader_key.locator != locator {
            return Err(Error::KeyDerivation {
                index,
                reason: format!("derived key reports locator {:?}", trader_key.locator),
            });
        }
        let secret = secrets.derive_shared_secret(auctioneer_key, &locator)?;

        candidates.push(CandidateAccount {
            trader_key,
            auctioneer_key: *auctioneer_key,
            secret,
        });
    }

    log::debug!("derived {} candidate account keys", candidates.len());
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockKeyRing, test_auctioneer_key};

    #[test]
    fn indices_are_dense_from_zero() {
        let ring = MockKeyRing::new();
        let candidates =
            generate_candidates(5, &ring, &ring, &test_auctioneer_key(), None).unwrap();
        let indices: Vec<u32> = candidates.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(
            candidates
                .iter()
                .all(|c| c.auctioneer_key == test_auctioneer_key())
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let ring = MockKeyRing::new();
        let a = generate_candidates(3, &ring, &ring, &test_auctioneer_key(), None).unwrap();
        let b = generate_candidates(3, &ring, &ring, &test_auctioneer_key(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_count_yields_nothing() {
        let ring = MockKeyRing::new();
        let candidates =
            generate_candidates(0, &ring, &ring, &test_auctioneer_key(), None).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn key_failure_aborts_batch() {
        let ring = MockKeyRing::new().fail_key_at(2);
        let err = generate_candidates(5, &ring, &ring, &test_auctioneer_key(), None).unwrap_err();
        assert!(matches!(err, Error::KeyDerivation { index: 2, .. }));
    }

    #[test]
    fn secret_failure_aborts_batch() {
        let ring = MockKeyRing::new().fail_secret_at(0);
        let err = generate_candidates(5, &ring, &ring, &test_auctioneer_key(), None).unwrap_err();
        assert!(matches!(err, Error::SharedSecret { index: 0, .. }));
    }

    #[test]
    fn cancellation_aborts_before_derivation() {
        let ring = MockKeyRing::new();
        let token = CancellationToken::new();
        token.cancel();
        let err = generate_candidates(5, &ring, &ring, &test_auctioneer_key(), Some(&token))
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(ring.keys_derived(), 0);
    }
}
