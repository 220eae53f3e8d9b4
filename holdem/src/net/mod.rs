//! Wire protocol: tagged client and server events.

pub mod messages;

pub use messages::{ActionWire, ClientEvent, ServerEvent, SocialEvent};
