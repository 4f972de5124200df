//! The transfer definition interface and its three implementations.
//!
//! A definition is a pure function pair: `create` admits a transfer given
//! its initial balance and agreed terms, `resolve` finalizes it given a
//! resolver and returns the new balance. Hosts own all storage and pass the
//! ambient [`BlockContext`] on each call.

use ethers::types::{Address, Bytes, U256};
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::codec::AbiTuple;
use crate::{Balance, Result};

/// Hashlock swap released by a SHA-256 preimage.
pub mod crosschain;
/// Escrow released by receiver cancellation or a mediator award.
pub mod insurance;
/// Linear-rate payment stream.
pub mod parameterized;

pub use crosschain::CrosschainTransfer;
pub use insurance::Insurance;
pub use parameterized::Parameterized;

/// Minimum distance between creation time and expiration, in seconds.
pub const MIN_EXPIRATION_WINDOW: u64 = 3 * 24 * 60 * 60;

/// Read-only ledger context for the current call.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockContext {
    /// Block timestamp in seconds.
    pub timestamp: U256,
    /// Block height.
    pub number: U256,
    /// Height after which a height-bounded transfer refunds instead of
    /// paying out. Attached by the host per transfer; zero for none.
    #[cfg_attr(feature = "json", serde(default))]
    pub expiry: U256,
}

impl BlockContext {
    pub fn new(timestamp: u64, number: u64) -> Self {
        Self {
            timestamp: U256::from(timestamp),
            number: U256::from(number),
            expiry: U256::zero(),
        }
    }

    /// Bound the current transfer to heights at or below `expiry`.
    pub fn with_expiry(self, expiry: u64) -> Self {
        Self {
            expiry: U256::from(expiry),
            ..self
        }
    }

    /// True once the height has passed a nonzero `expiry`.
    pub fn is_expired(&self) -> bool {
        !self.expiry.is_zero() && self.number > self.expiry
    }

    /// Earliest expiration accepted at creation time.
    pub fn earliest_expiration(&self) -> U256 {
        self.timestamp.saturating_add(U256::from(MIN_EXPIRATION_WINDOW))
    }
}

/// Static metadata published to the transfer registry.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInformation {
    pub name: String,
    /// Address the definition is registered under.
    pub definition: Address,
    pub state_encoding: String,
    pub resolver_encoding: String,
    /// Resolver that finalizes the transfer with the balance unchanged.
    pub encoded_cancel: Bytes,
}

/// Lifecycle shared by every transfer definition.
pub trait TransferDefinition {
    /// Terms agreed at creation.
    type State: AbiTuple;
    /// Input supplied at resolution.
    type Resolver: AbiTuple;

    /// Registry name.
    const NAME: &'static str;

    /// Address this definition is registered under.
    fn address(&self) -> Address;

    /// The resolver that returns the balance unchanged.
    fn cancel_resolver(&self) -> Self::Resolver;

    /// Check creation preconditions.
    fn admit(&self, balance: &Balance, state: &Self::State, ctx: &BlockContext) -> Result<()>;

    /// Compute the final balance.
    fn settle(
        &self,
        balance: &Balance,
        state: &Self::State,
        resolver: &Self::Resolver,
        ctx: &BlockContext,
    ) -> Result<Balance>;

    fn registry_information(&self) -> RegistryInformation {
        RegistryInformation {
            name: Self::NAME.to_string(),
            definition: self.address(),
            state_encoding: Self::State::SCHEMA.encoding(),
            resolver_encoding: Self::Resolver::SCHEMA.encoding(),
            encoded_cancel: self.cancel_resolver().abi_encode(),
        }
    }

    /// Admit a transfer with decoded terms. Returns `true` on acceptance.
    #[instrument(skip_all, fields(definition = Self::NAME))]
    fn create_decoded(
        &self,
        balance: &Balance,
        state: &Self::State,
        ctx: &BlockContext,
    ) -> Result<bool> {
        self.admit(balance, state, ctx)?;
        debug!("transfer admitted");
        Ok(true)
    }

    /// Resolve a transfer with decoded terms, enforcing conservation.
    #[instrument(skip_all, fields(definition = Self::NAME))]
    fn resolve_decoded(
        &self,
        balance: &Balance,
        state: &Self::State,
        resolver: &Self::Resolver,
        ctx: &BlockContext,
    ) -> Result<Balance> {
        let result = self.settle(balance, state, resolver, ctx)?;
        balance.ensure_conserved(&result)?;
        debug!(payee = %result.payee_amount(), "transfer resolved");
        Ok(result)
    }

    /// `create(balance, encodedState)`.
    fn create(&self, balance: &Balance, encoded_state: &[u8], ctx: &BlockContext) -> Result<bool> {
        let state = Self::State::abi_decode(encoded_state)?;
        self.create_decoded(balance, &state, ctx)
    }

    /// `resolve(balance, encodedState, encodedResolver)`.
    fn resolve(
        &self,
        balance: &Balance,
        encoded_state: &[u8],
        encoded_resolver: &[u8],
        ctx: &BlockContext,
    ) -> Result<Balance> {
        let state = Self::State::abi_decode(encoded_state)?;
        let resolver = Self::Resolver::abi_decode(encoded_resolver)?;
        self.resolve_decoded(balance, &state, &resolver, ctx)
    }
}

/// Any registered definition, dispatched by variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Insurance(Insurance),
    Parameterized(Parameterized),
    Crosschain(CrosschainTransfer),
}

impl Definition {
    /// Build the definition registered under `name`, if it is known.
    pub fn from_name(name: &str, address: Address) -> Option<Self> {
        match name {
            n if n == Insurance::NAME => Some(Insurance::new(address).into()),
            n if n == Parameterized::NAME => Some(Parameterized::new(address).into()),
            n if n == CrosschainTransfer::NAME => Some(CrosschainTransfer::new(address).into()),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Insurance(_) => Insurance::NAME,
            Self::Parameterized(_) => Parameterized::NAME,
            Self::Crosschain(_) => CrosschainTransfer::NAME,
        }
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Insurance(d) => d.address(),
            Self::Parameterized(d) => d.address(),
            Self::Crosschain(d) => d.address(),
        }
    }

    pub fn registry_information(&self) -> RegistryInformation {
        match self {
            Self::Insurance(d) => d.registry_information(),
            Self::Parameterized(d) => d.registry_information(),
            Self::Crosschain(d) => d.registry_information(),
        }
    }

    pub fn create(
        &self,
        balance: &Balance,
        encoded_state: &[u8],
        ctx: &BlockContext,
    ) -> Result<bool> {
        match self {
            Self::Insurance(d) => d.create(balance, encoded_state, ctx),
            Self::Parameterized(d) => d.create(balance, encoded_state, ctx),
            Self::Crosschain(d) => d.create(balance, encoded_state, ctx),
        }
    }

    pub fn resolve(
        &self,
        balance: &Balance,
        encoded_state: &[u8],
        encoded_resolver: &[u8],
        ctx: &BlockContext,
    ) -> Result<Balance> {
        match self {
            Self::Insurance(d) => d.resolve(balance, encoded_state, encoded_resolver, ctx),
            Self::Parameterized(d) => d.resolve(balance, encoded_state, encoded_resolver, ctx),
            Self::Crosschain(d) => d.resolve(balance, encoded_state, encoded_resolver, ctx),
        }
    }
}

impl From<Insurance> for Definition {
    fn from(value: Insurance) -> Self {
        Self::Insurance(value)
    }
}

impl From<Parameterized> for Definition {
    fn from(value: Parameterized) -> Self {
        Self::Parameterized(value)
    }
}

impl From<CrosschainTransfer> for Definition {
    fn from(value: CrosschainTransfer) -> Self {
        Self::Crosschain(value)
    }
}
