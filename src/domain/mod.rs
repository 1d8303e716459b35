//! Domain Layer
//!
//! Entities, value objects, ports and pure services. Nothing here talks to
//! the network or the filesystem directly.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
