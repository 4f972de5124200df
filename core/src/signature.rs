//! Signer recovery over two separated signing domains.
//!
//! Counterparties sign a 32-byte message hash, never the hash itself: the
//! hash is first wrapped in a domain-specific prefix and re-hashed. A
//! signature produced for channel state updates therefore never recovers to
//! the same signer when presented as a utility authorization, and vice versa.

use ethers::types::{Address, Bytes, H256};
use ethers::utils::keccak256;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::error::SignatureError;

/// Prefix for channel state-update messages.
pub const CHANNEL_MESSAGE_PREFIX: &[u8] = b"\x16Vector Signed Message:\n32";

/// Prefix for out-of-band utility authorizations.
pub const UTILITY_MESSAGE_PREFIX: &[u8] = b"\x17Utility Signed Message:\n32";

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Signing domain a signature was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningDomain {
    /// State updates exchanged between channel counterparties.
    Channel,
    /// Authorizations that are not part of channel state.
    Utility,
}

impl SigningDomain {
    pub fn prefix(&self) -> &'static [u8] {
        match self {
            Self::Channel => CHANNEL_MESSAGE_PREFIX,
            Self::Utility => UTILITY_MESSAGE_PREFIX,
        }
    }

    /// Digest that is actually signed for `message` in this domain.
    pub fn digest(&self, message: &H256) -> H256 {
        match self {
            Self::Channel => hash_channel_message(message),
            Self::Utility => hash_utility_message(message),
        }
    }
}

/// `keccak256(CHANNEL_MESSAGE_PREFIX || message)`.
pub fn hash_channel_message(message: &H256) -> H256 {
    prefixed(CHANNEL_MESSAGE_PREFIX, message)
}

/// `keccak256(UTILITY_MESSAGE_PREFIX || message)`.
pub fn hash_utility_message(message: &H256) -> H256 {
    prefixed(UTILITY_MESSAGE_PREFIX, message)
}

fn prefixed(prefix: &[u8], message: &H256) -> H256 {
    let mut buf = Vec::with_capacity(prefix.len() + 32);
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(message.as_bytes());
    H256(keccak256(buf))
}

/// Ledger address controlled by `key`: the last 20 bytes of the keccak
/// hash of its uncompressed public point.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the address that signed `message` in `domain`.
///
/// # Errors
///
/// Fails if the signature is not 65 bytes, carries an unknown recovery id,
/// has a non-normalized (high) `s`, or does not recover to a public key.
pub fn recover(
    domain: SigningDomain,
    message: &H256,
    signature: &[u8],
) -> Result<Address, SignatureError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(SignatureError::InvalidLength(signature.len()));
    }
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| SignatureError::Malformed(e.to_string()))?;
    if sig.normalize_s().is_some() {
        return Err(SignatureError::HighS);
    }
    let v = signature[64];
    let recovery_id = match v {
        0 | 1 => RecoveryId::from_byte(v),
        27 | 28 => RecoveryId::from_byte(v - 27),
        _ => None,
    }
    .ok_or(SignatureError::InvalidRecoveryId(v))?;

    let digest = domain.digest(message);
    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(address_of(&key))
}

/// Check that `signature` over `message` in `domain` was made by `expected`.
pub fn verify(
    domain: SigningDomain,
    message: &H256,
    signature: &[u8],
    expected: Address,
) -> Result<(), SignatureError> {
    let recovered = recover(domain, message, signature)?;
    if recovered != expected {
        return Err(SignatureError::SignerMismatch {
            expected,
            recovered,
        });
    }
    Ok(())
}

/// Sign `message` in `domain`, producing an `r || s || v` signature with
/// `v` in `{27, 28}`.
pub fn sign(
    domain: SigningDomain,
    key: &SigningKey,
    message: &H256,
) -> Result<Bytes, SignatureError> {
    let digest = domain.digest(message);
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(digest.as_bytes())
        .map_err(|e| SignatureError::Malformed(e.to_string()))?;
    let mut out = sig.to_bytes().to_vec();
    out.push(recovery_id.to_byte() + 27);
    Ok(out.into())
}

/// True if `signature` is empty or all zero bytes, the placeholder used by
/// canonical cancel resolvers.
pub fn is_empty_signature(signature: &[u8]) -> bool {
    signature.iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use ethers::types::U256;

    use super::*;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    #[test]
    fn recovers_signer_in_each_domain() {
        let sk = key(0x11);
        let signer = address_of(sk.verifying_key());
        let message = H256(keccak256(b"vtransfer"));

        for domain in [SigningDomain::Channel, SigningDomain::Utility] {
            let sig = sign(domain, &sk, &message).unwrap();
            assert_eq!(sig.len(), SIGNATURE_LENGTH);
            assert_eq!(recover(domain, &message, &sig).unwrap(), signer);
            assert!(verify(domain, &message, &sig, signer).is_ok());
        }
    }

    #[test]
    fn cross_domain_signature_does_not_verify() {
        let sk = key(0x22);
        let signer = address_of(sk.verifying_key());
        let message = H256::repeat_byte(0x42);

        let channel_sig = sign(SigningDomain::Channel, &sk, &message).unwrap();
        assert!(matches!(
            verify(SigningDomain::Utility, &message, &channel_sig, signer),
            Err(SignatureError::SignerMismatch { .. })
        ));

        let utility_sig = sign(SigningDomain::Utility, &sk, &message).unwrap();
        assert!(matches!(
            verify(SigningDomain::Channel, &message, &utility_sig, signer),
            Err(SignatureError::SignerMismatch { .. })
        ));
    }

    #[test]
    fn domains_hash_differently() {
        let message = H256::repeat_byte(0x01);
        assert_ne!(
            hash_channel_message(&message),
            hash_utility_message(&message)
        );
    }

    #[test]
    fn accepts_zero_based_recovery_id() {
        let sk = key(0x33);
        let signer = address_of(sk.verifying_key());
        let message = H256::repeat_byte(0x07);
        let mut sig = sign(SigningDomain::Utility, &sk, &message)
            .unwrap()
            .to_vec();
        sig[64] -= 27;
        assert_eq!(
            recover(SigningDomain::Utility, &message, &sig).unwrap(),
            signer
        );
    }

    #[test]
    fn rejects_malformed_signatures() {
        let message = H256::zero();
        assert_eq!(
            recover(SigningDomain::Utility, &message, &[0u8; 64]),
            Err(SignatureError::InvalidLength(64))
        );

        let sk = key(0x44);
        let mut sig = sign(SigningDomain::Utility, &sk, &message)
            .unwrap()
            .to_vec();
        sig[64] = 29;
        assert_eq!(
            recover(SigningDomain::Utility, &message, &sig),
            Err(SignatureError::InvalidRecoveryId(29))
        );

        // r = s = 0 is not a valid signature
        let zeroed = recover(SigningDomain::Utility, &message, &[0u8; 65]);
        assert!(zeroed.is_err());
    }

    #[test]
    fn rejects_high_s() {
        let sk = key(0x55);
        let message = H256::repeat_byte(0x09);
        let sig = sign(SigningDomain::Utility, &sk, &message).unwrap();

        // flip s to n - s
        let order = U256::from_str_radix(
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
            16,
        )
        .unwrap();
        let s = U256::from_big_endian(&sig[32..64]);
        let mut bytes = sig.to_vec();
        (order - s).to_big_endian(&mut bytes[32..64]);
        bytes[64] = if sig[64] == 27 { 28 } else { 27 };
        assert_eq!(
            recover(SigningDomain::Utility, &message, &bytes),
            Err(SignatureError::HighS)
        );
    }

    #[test]
    fn empty_signature_placeholder() {
        assert!(is_empty_signature(&[]));
        assert!(is_empty_signature(&[0u8; 65]));
        assert!(!is_empty_signature(&[0, 0, 1]));
    }
}
