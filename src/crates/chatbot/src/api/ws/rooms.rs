//! Room registry of broadcast channels.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const ROOM_CAPACITY: usize = 100;

/// Events fanned out to every connection in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    Typing {
        is_typing: bool,
    },
    Message {
        sender: String,
        message: String,
        source: String,
        message_id: Option<i64>,
        sheet_name: Option<String>,
    },
}

impl RoomEvent {
    pub fn typing(is_typing: bool) -> Self {
        RoomEvent::Typing { is_typing }
    }

    pub fn error(reason: impl std::fmt::Display) -> Self {
        RoomEvent::Message {
            sender: "assistant".to_string(),
            message: format!("Sorry, an error occurred: {}", reason),
            source: "error".to_string(),
            message_id: None,
            sheet_name: None,
        }
    }
}

/// Channels keyed by group name, created on first join.
#[derive(Default)]
pub struct ChatRooms {
    rooms: DashMap<String, broadcast::Sender<RoomEvent>>,
}

impl ChatRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_name(room: &str) -> String {
        format!("chat_{}", room)
    }

    /// The sender for `group`, creating the channel if needed.
    pub fn join(&self, group: &str) -> broadcast::Sender<RoomEvent> {
        self.rooms
            .entry(group.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .clone()
    }

    /// Drop the channel once nobody listens.
    pub fn leave(&self, group: &str) {
        self.rooms
            .remove_if(group, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscribers(&self, group: &str) -> usize {
        self.rooms
            .get(group)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(RoomEvent::typing(true)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "typing", "is_typing": true}));

        let json = serde_json::to_value(RoomEvent::error("boom")).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["source"], "error");
        assert_eq!(json["message"], "Sorry, an error occurred: boom");
    }

    #[tokio::test]
    async fn test_members_share_a_channel() {
        let rooms = ChatRooms::new();
        let group = ChatRooms::group_name("team");
        assert_eq!(group, "chat_team");

        let first = rooms.join(&group);
        let mut a = first.subscribe();
        let mut b = rooms.join(&group).subscribe();
        assert_eq!(rooms.subscribers(&group), 2);

        first.send(RoomEvent::typing(true)).unwrap();
        assert_eq!(a.recv().await.unwrap(), RoomEvent::typing(true));
        assert_eq!(b.recv().await.unwrap(), RoomEvent::typing(true));

        rooms.leave(&group);
        assert_eq!(rooms.len(), 1);

        drop(a);
        drop(b);
        rooms.leave(&group);
        assert!(rooms.is_empty());
    }
}
