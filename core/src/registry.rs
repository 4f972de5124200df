//! Directory of registered transfer definitions, keyed by address.

use std::collections::BTreeMap;

use ethers::types::Address;
use tracing::{info, instrument};

use crate::definition::{BlockContext, Definition, RegistryInformation};
use crate::{Balance, Result, TransferError};

/// Lookup of definitions by the address they are registered under.
pub trait TransferRegistry {
    fn definition(&self, address: &Address) -> Option<&Definition>;

    /// Metadata for every registered definition.
    fn registry_information(&self) -> Vec<RegistryInformation>;

    /// Run `create` on the definition registered at `address`.
    #[instrument(skip(self, balance, encoded_state, ctx))]
    fn create_transfer(
        &self,
        address: &Address,
        balance: &Balance,
        encoded_state: &[u8],
        ctx: &BlockContext,
    ) -> Result<bool> {
        let definition = self
            .definition(address)
            .ok_or(TransferError::UnknownDefinition(*address))?;
        definition.create(balance, encoded_state, ctx)
    }

    /// Run `resolve` on the definition registered at `address`.
    #[instrument(skip(self, balance, encoded_state, encoded_resolver, ctx))]
    fn resolve_transfer(
        &self,
        address: &Address,
        balance: &Balance,
        encoded_state: &[u8],
        encoded_resolver: &[u8],
        ctx: &BlockContext,
    ) -> Result<Balance> {
        let definition = self
            .definition(address)
            .ok_or(TransferError::UnknownDefinition(*address))?;
        definition.resolve(balance, encoded_state, encoded_resolver, ctx)
    }
}

/// In-memory [`TransferRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    definitions: BTreeMap<Address, Definition>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition`, replacing any previous one at the same address.
    pub fn register(&mut self, definition: impl Into<Definition>) -> Option<Definition> {
        let definition = definition.into();
        info!(
            name = definition.name(),
            address = ?definition.address(),
            "registering transfer definition"
        );
        self.definitions.insert(definition.address(), definition)
    }

    pub fn by_name(&self, name: &str) -> Option<&Definition> {
        self.definitions.values().find(|d| d.name() == name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl TransferRegistry for Directory {
    fn definition(&self, address: &Address) -> Option<&Definition> {
        self.definitions.get(address)
    }

    fn registry_information(&self) -> Vec<RegistryInformation> {
        self.definitions
            .values()
            .map(Definition::registry_information)
            .collect()
    }
}

impl FromIterator<Definition> for Directory {
    fn from_iter<I: IntoIterator<Item = Definition>>(iter: I) -> Self {
        let mut directory = Self::new();
        for definition in iter {
            directory.register(definition);
        }
        directory
    }
}
