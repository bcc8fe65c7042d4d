//! QeVR: turns vulnerability scan exports into TippingPoint SMS eVR imports.

pub mod config;
pub mod data;
pub mod error;
pub mod upload;

pub use error::{ErrorKind, QevrError};
