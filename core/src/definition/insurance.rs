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

/// Escrow with an arbiter.
///
/// The payer locks `collateral`. The receiver may cancel at any time by
/// signing a resolver, returning everything to the payer. The mediator may
/// award the receiver any amount up to the collateral. Both signatures are
/// utility-domain signatures over `keccak256(abi.encode(data))`.
///
/// # Example
///
/// ```
/// use ethers::types::{Address, H256, U256};
/// use k256::ecdsa::SigningKey;
/// use vtransfer_core::definition::insurance::{
///     Insurance, InsuranceResolver, InsuranceResolverData, InsuranceState,
/// };
/// use vtransfer_core::signature::address_of;
/// use vtransfer_core::{Balance, BlockContext, TransferDefinition};
///
/// let mediator = SigningKey::from_slice(&[7u8; 32]).unwrap();
/// let uuid = H256::repeat_byte(1);
/// let state = InsuranceState {
///     receiver: Address::repeat_byte(0xbb),
///     mediator: address_of(mediator.verifying_key()),
///     collateral: U256::from(10_000),
///     expiration: U256::from(1_000_000),
///     uuid,
/// };
/// let balance = Balance::new(
///     Address::repeat_byte(0xaa),
///     U256::from(10_000),
///     Address::repeat_byte(0xbb),
///     U256::zero(),
/// );
/// let data = InsuranceResolverData { amount: U256::from(5_000), uuid };
/// let resolver = InsuranceResolver::signed(data, &mediator).unwrap();
///
/// let insurance = Insurance::new(Address::repeat_byte(0x01));
/// let ctx = BlockContext::new(0, 0);
/// let result = insurance.resolve_decoded(&balance, &state, &resolver, &ctx).unwrap();
/// assert_eq!(result.amount, [U256::from(5_000), U256::from(5_000)]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insurance {
    address: Address,
}

impl Insurance {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

/// Terms of an insurance transfer.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsuranceState {
    pub receiver: Address,
    pub mediator: Address,
    /// Ceiling on any mediator award; must equal the payer's locked amount.
    pub collateral: U256,
    /// Unix timestamp (seconds).
    pub expiration: U256,
    #[cfg_attr(feature = "json", serde(rename = "UUID"))]
    pub uuid: H256,
}

/// Signed payload of an insurance resolver.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsuranceResolverData {
    pub amount: U256,
    #[cfg_attr(feature = "json", serde(rename = "UUID"))]
    pub uuid: H256,
}

impl InsuranceResolverData {
    /// `keccak256(abi.encode(data))`, the message signers commit to.
    pub fn message_hash(&self) -> H256 {
        H256(keccak256(self.abi_encode()))
    }
}

#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsuranceResolver {
    pub data: InsuranceResolverData,
    pub signature: Bytes,
}

impl InsuranceResolver {
    /// Sign `data` as a utility message with `key`.
    pub fn signed(
        data: InsuranceResolverData,
        key: &SigningKey,
    ) -> std::result::Result<Self, SignatureError> {
        let signature = signature::sign(SigningDomain::Utility, key, &data.message_hash())?;
        Ok(Self { data, signature })
    }
}

const RESOLVER_DATA_SCHEMA: Schema = Schema {
    fields: &[
        Field {
            name: "amount",
            kind: Kind::Uint256,
        },
        Field {
            name: "UUID",
            kind: Kind::Bytes32,
        },
    ],
};

impl AbiTuple for InsuranceState {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field {
                name: "receiver",
                kind: Kind::Address,
            },
            Field {
                name: "mediator",
                kind: Kind::Address,
            },
            Field {
                name: "collateral",
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
        ],
    };

    fn to_tokens(&self) -> Vec<Token> {
        vec![
            Token::Address(self.receiver),
            Token::Address(self.mediator),
            Token::Uint(self.collateral),
            Token::Uint(self.expiration),
            bytes32_token(&self.uuid),
        ]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            receiver: f.address()?,
            mediator: f.address()?,
            collateral: f.uint()?,
            expiration: f.uint()?,
            uuid: f.bytes32()?,
        })
    }
}

impl AbiTuple for InsuranceResolverData {
    const SCHEMA: Schema = RESOLVER_DATA_SCHEMA;

    fn to_tokens(&self) -> Vec<Token> {
        vec![Token::Uint(self.amount), bytes32_token(&self.uuid)]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            amount: f.uint()?,
            uuid: f.bytes32()?,
        })
    }
}

impl AbiTuple for InsuranceResolver {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field {
                name: "data",
                kind: Kind::Tuple(&RESOLVER_DATA_SCHEMA),
            },
            Field {
                name: "signature",
                kind: Kind::Bytes,
            },
        ],
    };

    fn to_tokens(&self) -> Vec<Token> {
        vec![self.data.to_token(), bytes_token(&self.signature)]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut f = Fields::new(Self::SCHEMA, tokens);
        Ok(Self {
            data: f.tuple()?,
            signature: f.bytes()?,
        })
    }
}

impl TransferDefinition for Insurance {
    type State = InsuranceState;
    type Resolver = InsuranceResolver;

    const NAME: &'static str = "Insurance";

    fn address(&self) -> Address {
        self.address
    }

    fn cancel_resolver(&self) -> InsuranceResolver {
        InsuranceResolver {
            data: InsuranceResolverData {
                amount: U256::zero(),
                uuid: H256::zero(),
            },
            signature: vec![0u8; SIGNATURE_LENGTH].into(),
        }
    }

    fn admit(&self, balance: &Balance, state: &InsuranceState, ctx: &BlockContext) -> Result<()> {
        if balance.payer_amount().is_zero() {
            return Err(TransferError::ZeroSenderBalance);
        }
        if !balance.payee_amount().is_zero() {
            return Err(TransferError::NonzeroRecipientBalance);
        }
        if state.receiver.is_zero() {
            return Err(TransferError::ZeroReceiver);
        }
        if state.mediator.is_zero() {
            return Err(TransferError::ZeroMediator);
        }
        if state.collateral.is_zero() {
            return Err(TransferError::ZeroCollateral);
        }
        if state.collateral != balance.payer_amount() {
            return Err(TransferError::CollateralMismatch {
                collateral: state.collateral,
                balance: balance.payer_amount(),
            });
        }
        if state.uuid.is_zero() {
            return Err(TransferError::EmptyUuid);
        }
        let earliest = ctx.earliest_expiration();
        if state.expiration < earliest {
            return Err(TransferError::ExpirationTooSoon {
                expiration: state.expiration,
                earliest,
            });
        }
        Ok(())
    }

    fn settle(
        &self,
        balance: &Balance,
        state: &InsuranceState,
        resolver: &InsuranceResolver,
        _ctx: &BlockContext,
    ) -> Result<Balance> {
        let data = &resolver.data;
        if data.amount.is_zero() && signature::is_empty_signature(&resolver.signature) {
            debug!("cancel resolver, balance unchanged");
            return Ok(*balance);
        }
        if data.uuid != state.uuid {
            return Err(TransferError::UuidMismatch);
        }

        let signer = signature::recover(
            SigningDomain::Utility,
            &data.message_hash(),
            &resolver.signature,
        )
        .inspect_err(|e| warn!(error = %e, "insurance resolver signature rejected"))?;

        if signer == state.receiver {
            debug!(receiver = ?signer, "receiver cancelled payment");
            return Ok(*balance);
        }
        if signer != state.mediator {
            warn!(signer = ?signer, "resolver signed by neither receiver nor mediator");
            return Err(SignatureError::UnauthorizedSigner(signer).into());
        }

        let ceiling = state.collateral.min(balance.payer_amount());
        if data.amount > ceiling {
            return Err(TransferError::ExceedsCollateral {
                amount: data.amount,
                collateral: ceiling,
            });
        }
        debug!(amount = %data.amount, "mediator awarded payment");
        balance.transfer(data.amount)
    }
}
