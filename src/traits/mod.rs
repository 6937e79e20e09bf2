//! Adapter contracts
//!
//! The two seams through which everything outside the core plugs in:
//!
//! - [`FrontendAdapter`] converts between one client-facing wire format and
//!   the IR.
//! - [`BackendAdapter`] converts an IR request into a call against one
//!   specific provider and back.
//!
//! Provider dialects are selected at construction time by picking adapter
//! implementations, never by runtime type inspection.

mod backend;
mod capabilities;
mod frontend;

pub use backend::{BackendAdapter, ModelListing};
pub use capabilities::{AdapterMetadata, BackendCapabilities};
pub use frontend::{FrontendAdapter, IdentityFrontend};
