//! Futile Core - Core abstractions shared by the resource pool and its callers
//!
//! This crate provides the fundamental traits and types the other futile
//! crates depend on:
//!
//! - `Resource` - The capability interface every pooled resource exposes
//! - `ConnectParams` - Opaque parameter bundle handed to resource factories
//! - `FutileError` - The common error taxonomy

mod error;
mod params;
mod resource;

pub use error::*;
pub use params::*;
pub use resource::*;
