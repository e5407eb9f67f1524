//! Versioned project and document state.
//!
//! The [`SnapshotStore`] is the single mutable authority over which projects
//! and documents exist. Every mutation builds a new immutable root from the
//! previous one and installs it in one step, so readers holding a
//! [`ProjectSnapshot`] or [`DocumentSnapshot`] always see a consistent view.
//! After each successful mutation exactly one [`ProjectChange`] is delivered
//! to subscribers of the store's [`ChangeBus`].

mod document;
mod error;
mod events;
mod host;
mod key;
mod project;
mod store;

pub use document::DocumentSnapshot;
pub use error::ProjectError;
pub use events::ChangeBus;
pub use events::ChangeKind;
pub use events::ProjectChange;
pub use events::ProjectChangeListener;
pub use events::SubscriptionId;
pub use host::HostDocument;
pub use host::HostProject;
pub use host::ProjectConfiguration;
pub use host::ProjectWorkspaceState;
pub use host::SymbolInfo;
pub use host::SymbolKind;
pub use key::DocumentKey;
pub use key::ProjectKey;
pub use project::ProjectSnapshot;
pub use store::SnapshotStore;
pub use store::StoreState;
