//! Editor features over project snapshots.
//!
//! The [`ProjectionEngine`] maps host positions into generated documents and
//! the [`Delegator`] routes each feature request to whichever handler owns
//! the projected language.

mod cancel;
mod definition;
mod delegation;
mod hover;
mod projection;
mod range;

pub use cancel::CancellationToken;
pub use definition::DefinitionFeature;
pub use definition::Location;
pub use delegation::generated_path;
pub use delegation::DelegatedHandler;
pub use delegation::DelegatedRequest;
pub use delegation::DelegationError;
pub use delegation::Delegator;
pub use delegation::DispatchError;
pub use delegation::DocumentIdentifier;
pub use delegation::Feature;
pub use delegation::HandlerRegistry;
pub use delegation::HostPosition;
pub use delegation::HostRequest;
pub use delegation::LocalHandler;
pub use delegation::LocalRequest;
pub use delegation::RegistryError;
pub use delegation::RemapToHost;
pub use delegation::ResponseMapper;
pub use hover::Hover;
pub use hover::HoverFeature;
pub use hover::TemplateHoverService;
pub use projection::Projection;
pub use projection::ProjectionEngine;
pub use projection::ProjectionError;
pub use range::Range;
