//! Real-time private chat.
//!
//! A connection authenticates, registers its socket in the
//! [`ConnectionRegistry`], and from then on every non-blank payload is stored
//! first and pushed to both participants second.

pub mod registry;
pub mod session;

pub use registry::{ConnectionRegistry, ConnectionSender, Registration};
pub use session::{
    run, ActiveSession, CloseReason, InboundMessage, OutboundMessage, RelayBackend, RelayError,
};
