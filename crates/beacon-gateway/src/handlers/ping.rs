//! `pusher:ping` / `pusher:pong` handling

use crate::connection::Connection;
use crate::protocol::ServerMessage;

/// Keep-alive handler
pub struct PingHandler;

impl PingHandler {
    /// Reply to a client ping
    pub fn handle(connection: &Connection) {
        connection.touch();
        connection.send_message(&ServerMessage::pong());
    }

    /// A client pong only proves the connection is alive
    pub fn handle_pong(connection: &Connection) {
        connection.touch();
    }
}
