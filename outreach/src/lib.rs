//! Campaign runner: configuration, built-in collaborators, and the
//! process controller that wires them into the dispatch core.

pub mod controller;
pub mod generator;
pub mod source;
pub mod transport;

pub use controller::Outreach;
