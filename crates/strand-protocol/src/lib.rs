//! # strand-protocol
//!
//! Wire-format types shared by the Strand sync client and server:
//!
//! - **Resource keys**: `(type, id)` pairs with stable compound strings and
//!   derived data-bus publication paths
//! - **Frames**: tagged-union client→server and server→client messages
//! - **Deltas**: version-anchored incremental changes and the shallow-merge
//!   function both sides apply them with

#![deny(unsafe_code)]

pub mod delta;
pub mod errors;
pub mod frames;
pub mod key;
pub mod merge;

pub use delta::{Delta, apply_delta};
pub use errors::ProtocolError;
pub use frames::{ClientFrame, ServerFrame};
pub use key::ResourceKey;
pub use merge::shallow_merge;
