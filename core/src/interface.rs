//! JSON (de)serialization of deployment metadata and transfer fixtures.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::Context;
use ethers::types::{Address, H256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::definition::Definition;
use crate::registry::Directory;
use crate::{Result, TransferError};

/// Reads a JSON-encoded file from the given `path` and deserializes into type `T`.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be opened, read, or parsed.
///
/// # Examples
///
/// ```ignore
/// # use vtransfer_core::interface::{load_transfer_data, AddressBook};
/// let book: AddressBook = load_transfer_data("./address-book.json").unwrap();
/// ```
pub fn load_transfer_data<P, T>(path: P) -> anyhow::Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("loading transfer data: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing JSON from {:?}", path))
}

/// Writes `data` as pretty-printed JSON to the given `path`.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be created or data cannot be serialized.
pub fn save_transfer_data<P, T>(path: P, data: &T) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating file {:?}", path))?;
    serde_json::to_writer_pretty(file, data)
        .with_context(|| format!("serializing to JSON to {:?}", path))
}

/// Deployment record for one definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressBookEntry {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_code_hash: Option<H256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_code_hash: Option<H256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<H256>,
}

impl AddressBookEntry {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            runtime_code_hash: None,
            creation_code_hash: None,
            tx_hash: None,
        }
    }
}

/// Deployed definitions keyed by registry name.
pub type AddressBook = BTreeMap<String, AddressBookEntry>;

/// Build a [`Directory`] from an address book.
///
/// # Errors
///
/// Returns `TransferError::UnknownDefinitionName` if an entry names no known
/// definition.
pub fn directory_from_address_book(book: &AddressBook) -> Result<Directory> {
    book.iter()
        .map(|(name, entry)| {
            Definition::from_name(name, entry.address)
                .ok_or_else(|| TransferError::UnknownDefinitionName(name.clone()))
        })
        .collect()
}

/// Address book recording every definition in `directory`.
pub fn address_book_from_directory(directory: &Directory) -> AddressBook {
    use crate::registry::TransferRegistry;

    directory
        .registry_information()
        .into_iter()
        .map(|info| (info.name, AddressBookEntry::new(info.definition)))
        .collect()
}
