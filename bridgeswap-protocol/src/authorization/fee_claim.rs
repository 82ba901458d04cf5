// Executor fee claims: an off-chain authority signs (fee, deadline, destination)
// and the origin side checks the recovered signer before a transfer leaves.

use crate::config::RouterConfig;
use crate::cross_chain::types::RouterError;
use ethers::abi::{self, Token};
use ethers::signers::{LocalWallet, Signer, WalletError};
use ethers::types::{Address, Bytes, Signature, H256, U256};
use ethers::utils::{hash_message, keccak256};

pub const DEFAULT_FEE_DOMAIN_TAG: &str = "bridgeswap.fee-claim.v1";

const SIGNATURE_LEN: usize = 65;

/// keccak256 of the packed (tag, deadline, dst chain, fee) tuple.
pub fn fee_claim_digest(domain_tag: &str, fee: U256, fee_deadline: u64, dst_chain_id: u64) -> H256 {
    // Packed encoding of uint256 values is their full 32-byte word
    let mut message = domain_tag.as_bytes().to_vec();
    message.extend(abi::encode(&[
        Token::Uint(U256::from(fee_deadline)),
        Token::Uint(U256::from(dst_chain_id)),
        Token::Uint(fee),
    ]));
    H256::from(keccak256(message))
}

/// Signs a fee claim the way the off-chain authority does: an EIP-191
/// personal-message signature over [`fee_claim_digest`].
pub async fn sign_fee_claim(
    wallet: &LocalWallet,
    domain_tag: &str,
    fee: U256,
    fee_deadline: u64,
    dst_chain_id: u64,
) -> Result<Bytes, WalletError> {
    let digest = fee_claim_digest(domain_tag, fee, fee_deadline, dst_chain_id);
    let signature = wallet.sign_message(digest.as_bytes()).await?;
    Ok(signature.to_vec().into())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeAuthorizer {
    authorizer: Address,
    domain_tag: String,
}

impl FeeAuthorizer {
    pub fn new(authorizer: Address, domain_tag: impl Into<String>) -> Self {
        FeeAuthorizer {
            authorizer,
            domain_tag: domain_tag.into(),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.fee_authorizer, config.fee_domain_tag.clone())
    }

    pub fn authorizer(&self) -> Address {
        self.authorizer
    }

    pub fn domain_tag(&self) -> &str {
        &self.domain_tag
    }

    /// Fails closed: an expired claim is rejected before the signature is
    /// looked at, and any malformed or foreign signature is `InvalidSignature`.
    pub fn verify(
        &self,
        fee: U256,
        fee_deadline: u64,
        dst_chain_id: u64,
        signature: &[u8],
        now: u64,
    ) -> Result<(), RouterError> {
        if now >= fee_deadline {
            return Err(RouterError::ExpiredFee { deadline: fee_deadline, now });
        }
        if signature.len() != SIGNATURE_LEN {
            log::debug!("[FeeAuthorizer] Rejecting signature of length {}", signature.len());
            return Err(RouterError::InvalidSignature);
        }

        let digest = fee_claim_digest(&self.domain_tag, fee, fee_deadline, dst_chain_id);
        let signature = Signature::try_from(signature).map_err(|_| RouterError::InvalidSignature)?;
        let signer = signature
            .recover(hash_message(digest.as_bytes()))
            .map_err(|_| RouterError::InvalidSignature)?;

        if signer != self.authorizer {
            log::warn!(
                "[FeeAuthorizer] Fee claim signed by {:?}, expected {:?}",
                signer,
                self.authorizer
            );
            return Err(RouterError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn setup() -> (LocalWallet, FeeAuthorizer) {
        let wallet = LocalWallet::new(&mut thread_rng());
        let authorizer = FeeAuthorizer::new(wallet.address(), DEFAULT_FEE_DOMAIN_TAG);
        (wallet, authorizer)
    }

    #[test]
    fn digest_depends_on_every_field() {
        let base = fee_claim_digest("tag", U256::from(10), 100, 2);
        assert_eq!(base, fee_claim_digest("tag", U256::from(10), 100, 2));
        assert_ne!(base, fee_claim_digest("other", U256::from(10), 100, 2));
        assert_ne!(base, fee_claim_digest("tag", U256::from(11), 100, 2));
        assert_ne!(base, fee_claim_digest("tag", U256::from(10), 101, 2));
        assert_ne!(base, fee_claim_digest("tag", U256::from(10), 100, 3));
    }

    #[tokio::test]
    async fn test_sign_verify_fee_claim() {
        let (wallet, authorizer) = setup();
        let sig = sign_fee_claim(&wallet, DEFAULT_FEE_DOMAIN_TAG, U256::from(25), 1_000, 137)
            .await
            .unwrap();
        assert_eq!(sig.len(), 65);
        assert_eq!(authorizer.verify(U256::from(25), 1_000, 137, &sig, 999), Ok(()));

        // Any altered field invalidates the claim
        assert_eq!(
            authorizer.verify(U256::from(26), 1_000, 137, &sig, 999),
            Err(RouterError::InvalidSignature)
        );
        assert_eq!(
            authorizer.verify(U256::from(25), 1_000, 10, &sig, 999),
            Err(RouterError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn expired_claim_is_rejected_before_signature_check() {
        let (wallet, authorizer) = setup();
        let sig = sign_fee_claim(&wallet, DEFAULT_FEE_DOMAIN_TAG, U256::one(), 500, 2)
            .await
            .unwrap();
        assert_eq!(
            authorizer.verify(U256::one(), 500, 2, &sig, 500),
            Err(RouterError::ExpiredFee { deadline: 500, now: 500 })
        );
        assert_eq!(
            authorizer.verify(U256::one(), 500, 2, &[], 600),
            Err(RouterError::ExpiredFee { deadline: 500, now: 600 })
        );
    }

    #[tokio::test]
    async fn foreign_signer_and_garbage_are_rejected() {
        let (_, authorizer) = setup();
        let stranger = LocalWallet::new(&mut thread_rng());
        let sig = sign_fee_claim(&stranger, DEFAULT_FEE_DOMAIN_TAG, U256::one(), 500, 2)
            .await
            .unwrap();
        assert_eq!(
            authorizer.verify(U256::one(), 500, 2, &sig, 0),
            Err(RouterError::InvalidSignature)
        );
        assert_eq!(
            authorizer.verify(U256::one(), 500, 2, &[0u8; 64], 0),
            Err(RouterError::InvalidSignature)
        );
        assert_eq!(
            authorizer.verify(U256::one(), 500, 2, &[0xFFu8; 65], 0),
            Err(RouterError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn domain_tag_separates_authorities() {
        let (wallet, _) = setup();
        let other_domain = FeeAuthorizer::new(wallet.address(), "another-router");
        let sig = sign_fee_claim(&wallet, DEFAULT_FEE_DOMAIN_TAG, U256::one(), 500, 2)
            .await
            .unwrap();
        assert_eq!(
            other_domain.verify(U256::one(), 500, 2, &sig, 0),
            Err(RouterError::InvalidSignature)
        );
    }
}
