//! Sync layer: HTTP clients for the filing registries and downstream collaborators.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub mod crm;
#[cfg(feature = "http")]
pub mod forms;
#[cfg(feature = "http")]
pub mod notify;
#[cfg(feature = "http")]
pub mod patent;
#[cfg(feature = "http")]
pub mod storage;
#[cfg(feature = "http")]
pub mod trademark;

#[cfg(feature = "http")]
pub use crm::CrmClient;
#[cfg(feature = "http")]
pub use forms::FormAutomationClient;
#[cfg(feature = "http")]
pub use http::{HttpSettings, SyncError};
#[cfg(feature = "http")]
pub use notify::EmailRelayNotifier;
#[cfg(feature = "http")]
pub use patent::PatentRegistryClient;
#[cfg(feature = "http")]
pub use storage::StorageClient;
#[cfg(feature = "http")]
pub use trademark::TrademarkRegistryClient;
