use ethers::types::{Address, U256};
use thiserror::Error;

/// Transfer-related errors.
///
/// Every variant maps to a stable reason code (see [`TransferError::reason`])
/// so hosts can distinguish rejection classes without parsing messages.
#[derive(Debug, Error, PartialEq)]
pub enum TransferError {
    #[error("sender balance must be nonzero")]
    ZeroSenderBalance,

    #[error("cannot create transfer with nonzero recipient initial balance")]
    NonzeroRecipientBalance,

    #[error("receiver address cannot be the zero address")]
    ZeroReceiver,

    #[error("mediator address cannot be the zero address")]
    ZeroMediator,

    #[error("collateral must be nonzero")]
    ZeroCollateral,

    #[error("collateral ({collateral}) must equal the sender balance ({balance})")]
    CollateralMismatch { collateral: U256, balance: U256 },

    #[error("UUID cannot be null")]
    EmptyUuid,

    /// Expiration closer than the minimum window.
    #[error("expiration {expiration} must be at or after {earliest}")]
    ExpirationTooSoon { expiration: U256, earliest: U256 },

    #[error("per-unit amount must be at least 1")]
    InvalidRateAmount,

    #[error("per-unit time must be at least 1 second")]
    InvalidRateTime,

    #[error("lock hash cannot be empty")]
    EmptyLockHash,

    /// Resolver data was produced for a different transfer.
    #[error("resolver UUID does not match transfer UUID")]
    UuidMismatch,

    #[error("cannot transfer {amount}, more than the collateral of {collateral}")]
    ExceedsCollateral { amount: U256, collateral: U256 },

    #[error("cannot take {amount}, more than the allocation of {allocation}")]
    ExceedsAllocation { amount: U256, allocation: U256 },

    #[error("payment rate exceeded: requested {amount}, withdrawable {withdrawable}")]
    ExceedsRate { amount: U256, withdrawable: U256 },

    #[error("initiator and responder must be set")]
    EmptySigners,

    #[error("sha256(preimage) does not match lock hash")]
    InvalidPreimage,

    #[error("resolution does not conserve the locked balance")]
    BalanceNotConserved,

    #[error("balance amounts overflow")]
    BalanceOverflow,

    #[error("no transfer definition registered at {0:?}")]
    UnknownDefinition(Address),

    #[error("no transfer definition named {0}")]
    UnknownDefinitionName(String),

    #[error("signature error: {0}")]
    Signature(SignatureError),

    #[error("codec error: {0}")]
    Codec(CodecError),
}

impl TransferError {
    /// Stable, machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ZeroSenderBalance => "ZERO_SENDER_BALANCE",
            Self::NonzeroRecipientBalance => "NONZERO_RECIPIENT_BALANCE",
            Self::ZeroReceiver => "ZERO_RECEIVER",
            Self::ZeroMediator => "ZERO_MEDIATOR",
            Self::ZeroCollateral => "ZERO_COLLATERAL",
            Self::CollateralMismatch { .. } => "COLLATERAL_MISMATCH",
            Self::EmptyUuid => "EMPTY_UUID",
            Self::ExpirationTooSoon { .. } => "EXPIRATION_TOO_SOON",
            Self::InvalidRateAmount => "INVALID_RATE_AMOUNT",
            Self::InvalidRateTime => "INVALID_RATE_TIME",
            Self::EmptyLockHash => "EMPTY_LOCKHASH",
            Self::UuidMismatch => "UUID_MISMATCH",
            Self::ExceedsCollateral { .. } => "EXCEEDS_COLLATERAL",
            Self::ExceedsAllocation { .. } => "EXCEEDS_ALLOCATION",
            Self::ExceedsRate { .. } => "EXCEEDS_RATE",
            Self::EmptySigners => "EMPTY_SIGNERS",
            Self::InvalidPreimage => "INVALID_PREIMAGE",
            Self::BalanceNotConserved => "BALANCE_NOT_CONSERVED",
            Self::BalanceOverflow => "BALANCE_OVERFLOW",
            Self::UnknownDefinition(_) => "UNKNOWN_DEFINITION",
            Self::UnknownDefinitionName(_) => "UNKNOWN_DEFINITION",
            Self::Signature(_) => "INVALID_SIGNATURE",
            Self::Codec(_) => "MALFORMED_ENCODING",
        }
    }
}

/// Errors from signer recovery and verification.
#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("signature s-value is not normalized")]
    HighS,

    #[error("signature decoding error: {0}")]
    Malformed(String),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("recovered {recovered:?}, expected {expected:?}")]
    SignerMismatch {
        expected: Address,
        recovered: Address,
    },

    #[error("signer {0:?} is not authorized to resolve this transfer")]
    UnauthorizedSigner(Address),
}

/// Errors while decoding ABI payloads.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("abi decoding failed: {0}")]
    Abi(String),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("payload is not the canonical encoding of {encoding}")]
    NonCanonical { encoding: String },
}

impl From<ethers::abi::Error> for CodecError {
    fn from(value: ethers::abi::Error) -> Self {
        Self::Abi(value.to_string())
    }
}

impl From<SignatureError> for TransferError {
    fn from(value: SignatureError) -> Self {
        Self::Signature(value)
    }
}

impl From<CodecError> for TransferError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<ethers::abi::Error> for TransferError {
    fn from(value: ethers::abi::Error) -> Self {
        Self::Codec(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_stable() {
        assert_eq!(
            TransferError::ZeroSenderBalance.reason(),
            "ZERO_SENDER_BALANCE"
        );
        assert_eq!(
            TransferError::from(SignatureError::HighS).reason(),
            "INVALID_SIGNATURE"
        );
        assert_eq!(
            TransferError::from(CodecError::MissingField("UUID")).reason(),
            "MALFORMED_ENCODING"
        );
    }
}
