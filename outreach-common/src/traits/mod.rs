//! Collaborator contracts consumed by the dispatch core
//!
//! The marketing site, the scrapers, the copy generation, and the
//! actual email/web-form mechanics all live behind these three traits.
//! The core only ever sees: a source that yields targets, a generator
//! that turns a target into a message, and a transport that attempts
//! one delivery.

pub mod generator;
pub mod source;
pub mod transport;

pub use generator::{ContentGenerator, RenderError};
pub use source::{SourceError, TargetSource};
pub use transport::{Transport, TransportError};
