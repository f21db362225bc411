//! # Block Registry (pbm-02)
//!
//! Maps `(type, schema_version)` to a handler descriptor and validates incoming
//! block bodies against the registered shape before they are accepted.
//!
//! ## Resolution
//!
//! ```text
//! resolve("text", 3) ──→ newest registered version <= 3
//!                   └──→ none? Fallback descriptor (generic placeholder)
//! ```
//!
//! An older peer receiving a block type it does not know must keep the
//! conversation alive, so resolution never fails and receipt-side schema
//! violations degrade to a [`PlaceholderBlock`] through [`BlockRegistry::accept`].
//!
//! ## Concurrency
//!
//! Read-mostly. Registrations happen at startup; lookups are safe from any
//! number of conversations at once.

mod descriptor;
mod errors;
mod registry;
mod resolved;

pub use descriptor::{BlockDescriptor, FieldSpec, FieldType, Handler};
pub use errors::RegistryError;
pub use registry::{BlockRegistry, Resolution};
pub use resolved::{PlaceholderBlock, ResolvedBlock};
