//! Source extensions for hondana.
//!
//! - [`capability`]: the contract every source implements, and the runtimes
//!   (native, RPC, subprocess) that adapt an installed extension to it.
//! - [`store`]: where descriptors of installed extensions are kept.
//! - [`repository`]: where installable extensions come from.
//! - [`Loader`]: install, update, uninstall and resolve.

pub mod capability;
mod descriptor;
pub mod error;
mod loader;
mod manifest;
pub mod models;
pub mod repository;
pub mod store;

pub use crate::capability::{CapabilityHandle, SourceCapability};
pub use crate::descriptor::{ExtensionDescriptor, HeaderPolicy, InstallState, InvalidHeader, Runtime, UnknownInstallState};
pub use crate::loader::{CatalogEntry, InstallOutcome, Loader, Resolver, ResolverHandle};
pub use crate::manifest::{CONTRACT_VERSION, ExtensionPackage, ManifestEntry, Operation, is_compatible};
pub use crate::repository::{ExtensionRepository, HttpRepository, RepositoryHandle};
pub use crate::store::{DescriptorStore, StoreHandle};
