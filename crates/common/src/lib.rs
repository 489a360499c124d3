//! Types shared by the VK client crates and the `vk-call` binary

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
