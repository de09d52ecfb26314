//! Pusher wire protocol
//!
//! Inbound and outbound message shapes plus close codes.

mod close_codes;
pub mod messages;

pub use close_codes::CloseCode;
pub use messages::{
    ClientMessage, PresenceData, ServerMessage, SigninData, SubscribeData, UnsubscribeData,
};
