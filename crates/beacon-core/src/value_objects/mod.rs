//! Value objects - immutable types that represent domain concepts

mod payload;
mod socket_id;

pub use payload::{data_to_bytes, data_to_kilobytes};
pub use socket_id::SocketId;
