//! Application layer: directory, services, routing and handlers.

pub mod command_handlers;
pub mod directory;
pub mod query_handlers;
pub mod router;
pub mod services;
pub mod views;
