//! Narrator Core — shared domain abstractions.
//!
//! This crate defines the identifiers, determinism seams, error taxonomy and
//! the two outbound ports (message transport and document store) that every
//! other crate depends on. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod documents;
pub mod error;
pub mod event;
pub mod ids;
pub mod rng;
pub mod transport;
