//! # ld-provider
//!
//! LaunchDarkly API client used by the Terraform provider's resources.
//!
//! [`LdClient`] binds the execution layer from `ld_provider_retries` to one
//! configured HTTP client: a single concurrency gate, one set of retry
//! policies and one cancellation token shared by every call.
//!
//! ## Example
//!
//! ```ignore
//! use ld_provider::prelude::*;
//!
//! let config = ProviderConfig::from_env()?.merge(block);
//! let client = LdClient::new(config)?;
//!
//! let flag: serde_json::Value = client
//!     .patch(
//!         "api/v2/flags/default/checkout",
//!         &[PatchOperation::replace("/name", "Checkout v2")],
//!     )
//!     .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod patch;
pub mod telemetry;

// Re-exports
pub use api::{ListEnvelope, TEAM_ROLES_PAGE_SIZE};
pub use client::{LdClient, LdClientBuilder, API_VERSION_HEADER, NO_QUERY, USER_AGENT_PRODUCT};
pub use config::{Credential, ProviderConfig};
pub use error::{ProviderError, Result};
pub use patch::{PatchOp, PatchOperation};
pub use telemetry::{init_tracing, LogFormat};

pub use ld_provider_retries as retries;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{LdClient, PatchOperation, ProviderConfig, ProviderError, Result};
    pub use ld_provider_retries::prelude::*;
}
