use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use k256::ecdsa::SigningKey;
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{BlockContext, TransferDefinition};
use crate::codec::{bytes32_token, bytes_token, AbiTuple, Field, Fields, Kind, Schema};
use crate::error::{CodecError, SignatureError, TransferError};
use crate::signature::{self, SigningDomain, SIGNATURE_LENGTH};
use crate::{Balance, Result};

/// Streaming payment.
///
/// The receiver may withdraw `deltaAmount` for every full `deltaTime`
/// seconds elapsed since `start`, accrual stopping at `expiration` and never
/// exceeding what the payer locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameterized {
    address: Address,
}

impl Parameterized {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

/// Accrual rate: `delta_amount` per `delta_time` seconds.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub delta_amount: U256,
    pub delta_time: U256,
}

impl Rate {
    fn validate(&self) -> Result<()> {
        if self.delta_amount.is_zero() {
            return Err(TransferError::InvalidRateAmount);
        }
        if self.delta_time.is_zero() {
            return Err(TransferError::InvalidRateTime);
        }
        Ok(())
    }
}

#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizedState {
    pub receiver: Address,
    /// Unix timestamp accrual starts from.
    pub start: U256,
    /// Unix timestamp accrual stops at.
    pub expiration: U256,
    #[cfg_attr(feature = "json", serde(rename = "UUID"))]
    pub uuid: H256,
    pub rate: Rate,
}

impl ParameterizedState {
    /// Most the receiver may take at time `now` out of `allocation`.
    ///
    /// `min(allocation, floor(elapsed / deltaTime) * deltaAmount)` where
    /// `elapsed = min(now, expiration) - start`, saturating at zero and at
    /// `U256::MAX`. Non-decreasing in `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidRateTime`] if `deltaTime` is zero.
    pub fn max_withdrawable(&self, allocation: U256, now: U256) -> Result<U256> {
        if self.rate.delta_time.is_zero() {
            return Err(TransferError::InvalidRateTime);
        }
        let elapsed = now.min(self.expiration).saturating_sub(self.start);
        let periods = elapsed / self.rate.delta_time;
        let accrued = periods.saturating_mul(self.rate.delta_amount);
        Ok(accrued.min(allocation))
    }
}

#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizedResolverData {
    #[cfg_attr(feature = "json", serde(rename = "UUID"))]
    pub uuid: H256,
    pub payment_amount_taken: U256,
}

impl ParameterizedResolverData {
    /// `keccak256(abi.encode(data))`.
    pub fn message_hash(&self) -> H256 {
        H256(keccak256(self.abi_encode()))
    }
}

#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizedResolver {
    pub data: ParameterizedResolverData,
    pub payee_signature: Bytes,
}

impl ParameterizedResolver {
    /// Sign `data` as a utility message with the payee's `key`.
    pub fn signed(
        data: ParameterizedResolverData,
        key: &SigningKey,
    ) -> std::result::Result<Self, SignatureError> {
        let payee_signature = signature::sign(SigningDomain::Utility, key, &data.message_hash())?;
        Ok(Self {
            data,
            payee_signature,
        })
    }
}

const RATE_SCHEMA: Schema = Schema {
    fields: &[
        Field {
            name: "deltaAmount",
            kind: Kind::Uint256,
        },
        Field {
            name: "deltaTime",
            kind: Kind::Uint256,
        },
    ],
};

const RESOLVER_DATA_SCHEMA: Schema = Schema {
    fields: &[
        Field {
            name: "UUID",
            kind: Kind::Bytes32,
        },
        Field {
            name: "paymentAmountTaken",
            kind: Kind::Uint256,
        },
    ],
};

impl AbiTuple for Rate {
    const SCHEMA: Schema = RATE_SCHEMA;

    fn to_tokens(&self) -> Vec<Token> {
        vec![Token::Uint(self.delta_amount), Token::Uint(self.delta_time)]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            delta_amount: f.uint()?,
            delta_time: f.uint()?,
        })
    }
}

impl AbiTuple for ParameterizedState {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field {
                name: "receiver",
                kind: Kind::Address,
            },
            Field {
                name: "start",
                kind: Kind::Uint256,
            },
            Field {
                name: "expiration",
                kind: Kind::Uint256,
            },
            Field {
                name: "UUID",
                kind: Kind::Bytes32,
            },
            Field {
                name: "rate",
                kind: Kind::Tuple(&RATE_SCHEMA),
            },
        ],
    };

    fn to_tokens(&self) -> Vec<Token> {
        vec![
            Token::Address(self.receiver),
            Token::Uint(self.start),
            Token::Uint(self.expiration),
            bytes32_token(&self.uuid),
            self.rate.to_token(),
        ]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            receiver: f.address()?,
            start: f.uint()?,
            expiration: f.uint()?,
            uuid: f.bytes32()?,
            rate: f.tuple()?,
        })
    }
}

impl AbiTuple for ParameterizedResolverData {
    const SCHEMA: Schema = RESOLVER_DATA_SCHEMA;

    fn to_tokens(&self) -> Vec<Token> {
        vec![
            bytes32_token(&self.uuid),
            Token::Uint(self.payment_amount_taken),
        ]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            uuid: f.bytes32()?,
            payment_amount_taken: f.uint()?,
        })
    }
}

impl AbiTuple for ParameterizedResolver {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field {
                name: "data",
                kind: Kind::Tuple(&RESOLVER_DATA_SCHEMA),
            },
            Field {
                name: "payeeSignature",
                kind: Kind::Bytes,
            },
        ],
    };

    fn to_tokens(&self) -> Vec<Token> {
        vec![self.data.to_token(), bytes_token(&self.payee_signature)]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            data: f.tuple()?,
            payee_signature: f.bytes()?,
        })
    }
}

impl TransferDefinition for Parameterized {
    type State = ParameterizedState;
    type Resolver = ParameterizedResolver;

    const NAME: &'static str = "Parameterized";

    fn address(&self) -> Address {
        self.address
    }

    fn cancel_resolver(&self) -> ParameterizedResolver {
        ParameterizedResolver {
            data: ParameterizedResolverData {
                uuid: H256::zero(),
                payment_amount_taken: U256::zero(),
            },
            payee_signature: vec![0u8; SIGNATURE_LENGTH].into(),
        }
    }

    fn admit(
        &self,
        balance: &Balance,
        state: &ParameterizedState,
        ctx: &BlockContext,
    ) -> Result<()> {
        if !balance.payee_amount().is_zero() {
            return Err(TransferError::NonzeroRecipientBalance);
        }
        if state.receiver.is_zero() {
            return Err(TransferError::ZeroReceiver);
        }
        let earliest = ctx.earliest_expiration();
        if state.expiration < earliest {
            return Err(TransferError::ExpirationTooSoon {
                expiration: state.expiration,
                earliest,
            });
        }
        if state.uuid.is_zero() {
            return Err(TransferError::EmptyUuid);
        }
        state.rate.validate()
    }

    fn settle(
        &self,
        balance: &Balance,
        state: &ParameterizedState,
        resolver: &ParameterizedResolver,
        ctx: &BlockContext,
    ) -> Result<Balance> {
        let data = &resolver.data;
        let taken = data.payment_amount_taken;
        if taken.is_zero() && signature::is_empty_signature(&resolver.payee_signature) {
            debug!("cancel resolver, balance unchanged");
            return Ok(*balance);
        }
        if data.uuid != state.uuid {
            return Err(TransferError::UuidMismatch);
        }
        signature::verify(
            SigningDomain::Utility,
            &data.message_hash(),
            &resolver.payee_signature,
            state.receiver,
        )
        .inspect_err(|e| warn!(error = %e, "payee signature rejected"))?;

        let allocation = balance.payer_amount();
        if taken > allocation {
            return Err(TransferError::ExceedsAllocation {
                amount: taken,
                allocation,
            });
        }
        state.rate.validate()?;
        let withdrawable = state.max_withdrawable(allocation, ctx.timestamp)?;
        if taken > withdrawable {
            return Err(TransferError::ExceedsRate {
                amount: taken,
                withdrawable,
            });
        }
        debug!(%taken, %withdrawable, "payment taken");
        balance.transfer(taken)
    }
}
