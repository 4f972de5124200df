/// Two-party balances and the conservation invariant
pub mod balance;
/// ABI tuple schemas and encoding
pub mod codec;
/// Transfer definitions: Insurance, Parameterized and
/// crosschain hashlock transfers
pub mod definition;
/// JSON loading of deployment metadata
#[cfg(feature = "json")]
pub mod interface;
/// Address-keyed directory of registered definitions
pub mod registry;
/// Domain-separated signer recovery
pub mod signature;

pub mod error;

pub use balance::Balance;
pub use definition::{BlockContext, Definition, RegistryInformation, TransferDefinition};
pub use error::TransferError;
pub use registry::{Directory, TransferRegistry};

pub type Result<T> = std::result::Result<T, TransferError>;
