//! Per-resource method groups
//!
//! Each category is a thin borrowed view over `VkApi` that builds the
//! parameter bag for a method and picks the typed or untyped call path.

pub mod calls;

pub use calls::{CallStartResult, CallsCategory, CallsForceFinishParams, CallsStartParams};
