//! WebSocket chat rooms.
//!
//! Clients connect to `/ws/chat/:room?token=<jwt>`. Every connection in a
//! room receives the typing indicators and answers produced for any member.

pub mod handler;
pub mod rooms;

pub use handler::chat_socket;
pub use rooms::{ChatRooms, RoomEvent};
