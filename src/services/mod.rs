//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and error mapping.

pub mod address;
pub mod measurement;
pub mod persistence;
pub mod pin;
pub mod workflow;
