use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256, U256};
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::{BlockContext, TransferDefinition};
use crate::codec::{bytes32_token, bytes_token, AbiTuple, Field, Fields, Kind, Schema};
use crate::error::{CodecError, TransferError};
use crate::signature::{self, SigningDomain, SIGNATURE_LENGTH};
use crate::{Balance, Result};

/// Hashlock swap.
///
/// The full payer amount moves to the payee once the responder reveals a
/// preimage whose SHA-256 equals `lockHash`, as long as the block height has
/// not passed the expiry the host attaches through [`BlockContext::expiry`]
/// (zero means no expiry). A zero preimage, or a correct one presented too
/// late, refunds the payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrosschainTransfer {
    address: Address,
}

impl CrosschainTransfer {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Check the initiator's channel-domain signature over `state.data`.
    pub fn verify_initiator(&self, state: &CrosschainTransferState) -> Result<()> {
        signature::verify(
            SigningDomain::Channel,
            &state.data,
            &state.initiator_signature,
            state.initiator,
        )?;
        Ok(())
    }
}

/// `sha256(preimage)`, the lock a preimage opens.
pub fn lock_hash(preimage: &H256) -> H256 {
    H256::from_slice(&Sha256::digest(preimage.as_bytes()))
}

#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrosschainTransferState {
    /// Initiator's channel-domain signature over `data`.
    pub initiator_signature: Bytes,
    pub initiator: Address,
    pub responder: Address,
    pub data: H256,
    pub nonce: U256,
    /// Passed through for post-resolution side effects.
    pub fee: U256,
    pub call_to: Address,
    pub call_data: Bytes,
    pub lock_hash: H256,
}

#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrosschainTransferResolver {
    pub responder_signature: Bytes,
    pub pre_image: H256,
}

impl AbiTuple for CrosschainTransferState {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field {
                name: "initiatorSignature",
                kind: Kind::Bytes,
            },
            Field {
                name: "initiator",
                kind: Kind::Address,
            },
            Field {
                name: "responder",
                kind: Kind::Address,
            },
            Field {
                name: "data",
                kind: Kind::Bytes32,
            },
            Field {
                name: "nonce",
                kind: Kind::Uint256,
            },
            Field {
                name: "fee",
                kind: Kind::Uint256,
            },
            Field {
                name: "callTo",
                kind: Kind::Address,
            },
            Field {
                name: "callData",
                kind: Kind::Bytes,
            },
            Field {
                name: "lockHash",
                kind: Kind::Bytes32,
            },
        ],
    };

    fn to_tokens(&self) -> Vec<Token> {
        vec![
            bytes_token(&self.initiator_signature),
            Token::Address(self.initiator),
            Token::Address(self.responder),
            bytes32_token(&self.data),
            Token::Uint(self.nonce),
            Token::Uint(self.fee),
            Token::Address(self.call_to),
            bytes_token(&self.call_data),
            bytes32_token(&self.lock_hash),
        ]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            initiator_signature: f.bytes()?,
            initiator: f.address()?,
            responder: f.address()?,
            data: f.bytes32()?,
            nonce: f.uint()?,
            fee: f.uint()?,
            call_to: f.address()?,
            call_data: f.bytes()?,
            lock_hash: f.bytes32()?,
        })
    }
}

impl AbiTuple for CrosschainTransferResolver {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field {
                name: "responderSignature",
                kind: Kind::Bytes,
            },
            Field {
                name: "preImage",
                kind: Kind::Bytes32,
            },
        ],
    };

    fn to_tokens(&self) -> Vec<Token> {
        vec![
            bytes_token(&self.responder_signature),
            bytes32_token(&self.pre_image),
        ]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            responder_signature: f.bytes()?,
            pre_image: f.bytes32()?,
        })
    }
}

impl TransferDefinition for CrosschainTransfer {
    type State = CrosschainTransferState;
    type Resolver = CrosschainTransferResolver;

    const NAME: &'static str = "CrosschainTransfer";

    fn address(&self) -> Address {
        self.address
    }

    fn cancel_resolver(&self) -> CrosschainTransferResolver {
        CrosschainTransferResolver {
            responder_signature: vec![0u8; SIGNATURE_LENGTH].into(),
            pre_image: H256::zero(),
        }
    }

    fn admit(
        &self,
        balance: &Balance,
        state: &CrosschainTransferState,
        _ctx: &BlockContext,
    ) -> Result<()> {
        if balance.payer_amount().is_zero() {
            return Err(TransferError::ZeroSenderBalance);
        }
        if !balance.payee_amount().is_zero() {
            return Err(TransferError::NonzeroRecipientBalance);
        }
        if state.lock_hash.is_zero() {
            return Err(TransferError::EmptyLockHash);
        }
        Ok(())
    }

    fn settle(
        &self,
        balance: &Balance,
        state: &CrosschainTransferState,
        resolver: &CrosschainTransferResolver,
        ctx: &BlockContext,
    ) -> Result<Balance> {
        if state.initiator.is_zero() || state.responder.is_zero() {
            return Err(TransferError::EmptySigners);
        }
        if resolver.pre_image.is_zero() {
            debug!("zero preimage, refunding");
            return Ok(*balance);
        }

        let computed = lock_hash(&resolver.pre_image);
        let opened: bool = computed.as_bytes().ct_eq(state.lock_hash.as_bytes()).into();
        if !opened {
            warn!(
                lock_hash = %hex::encode(state.lock_hash),
                computed = %hex::encode(computed),
                "preimage does not open lock"
            );
            return Err(TransferError::InvalidPreimage);
        }

        if ctx.is_expired() {
            debug!(expiry = %ctx.expiry, height = %ctx.number, "lock expired, refunding");
            return Ok(*balance);
        }
        debug!("preimage revealed, paying responder");
        balance.transfer_all()
    }
}
