//! Room names and the two-way room membership table.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// A logical broadcast scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// `user:<id>`, joined automatically when a connection authenticates.
    Personal(String),
    /// `conversation:<id>`, joined on demand after a participation check.
    Conversation(String),
}

impl Room {
    pub fn personal(user_id: impl Into<String>) -> Self {
        Room::Personal(user_id.into())
    }

    pub fn conversation(conversation_id: impl Into<String>) -> Self {
        Room::Conversation(conversation_id.into())
    }

    /// Wire name, e.g. `conversation:conv_01H...`.
    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn is_conversation(&self) -> bool {
        matches!(self, Room::Conversation(_))
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Personal(id) => write!(f, "user:{id}"),
            Room::Conversation(id) => write!(f, "conversation:{id}"),
        }
    }
}

/// Room → connections and connection → rooms, kept in step.
///
/// Not synchronized; the dispatcher owns it behind a single lock.
#[derive(Debug, Default)]
pub struct RoomTable {
    members: HashMap<Room, HashSet<String>>,
    rooms_by_conn: HashMap<String, HashSet<Room>>,
}

impl RoomTable {
    /// Add `conn_id` to `room`. Returns `false` when it was already a member.
    pub fn join(&mut self, conn_id: &str, room: Room) -> bool {
        let added = self
            .rooms_by_conn
            .entry(conn_id.to_string())
            .or_default()
            .insert(room.clone());
        if added {
            self.members
                .entry(room)
                .or_default()
                .insert(conn_id.to_string());
        }
        added
    }

    /// Remove `conn_id` from `room`. Returns `false` when it was not a member.
    pub fn leave(&mut self, conn_id: &str, room: &Room) -> bool {
        let removed = self
            .rooms_by_conn
            .get_mut(conn_id)
            .is_some_and(|rooms| rooms.remove(room));
        if removed {
            self.remove_member(room, conn_id);
        }
        removed
    }

    /// Drop every membership of `conn_id`, returning the rooms it held.
    pub fn remove_connection(&mut self, conn_id: &str) -> Vec<Room> {
        let rooms: Vec<Room> = self
            .rooms_by_conn
            .remove(conn_id)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();
        for room in &rooms {
            self.remove_member(room, conn_id);
        }
        rooms
    }

    fn remove_member(&mut self, room: &Room, conn_id: &str) {
        if let Some(set) = self.members.get_mut(room) {
            set.remove(conn_id);
            if set.is_empty() {
                self.members.remove(room);
            }
        }
    }

    pub fn members(&self, room: &Room) -> impl Iterator<Item = &String> {
        self.members.get(room).into_iter().flatten()
    }

    pub fn rooms_of(&self, conn_id: &str) -> HashSet<Room> {
        self.rooms_by_conn.get(conn_id).cloned().unwrap_or_default()
    }

    /// Number of conversation rooms `conn_id` belongs to.
    pub fn conversation_count(&self, conn_id: &str) -> usize {
        self.rooms_by_conn
            .get(conn_id)
            .map(|rooms| rooms.iter().filter(|r| r.is_conversation()).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_use_kind_prefix() {
        assert_eq!(Room::personal("usr_1").name(), "user:usr_1");
        assert_eq!(Room::conversation("conv_1").name(), "conversation:conv_1");
    }

    #[test]
    fn join_and_leave_keep_both_directions_in_step() {
        let mut table = RoomTable::default();
        let room = Room::conversation("c1");

        assert!(table.join("conn_a", room.clone()));
        assert!(!table.join("conn_a", room.clone()));
        assert!(table.join("conn_b", room.clone()));
        assert_eq!(table.members(&room).count(), 2);
        assert!(table.rooms_of("conn_a").contains(&room));

        assert!(table.leave("conn_a", &room));
        assert!(!table.leave("conn_a", &room));
        assert!(!table.rooms_of("conn_a").contains(&room));
        assert_eq!(table.members(&room).collect::<Vec<_>>(), vec!["conn_b"]);
    }

    #[test]
    fn leaving_an_unjoined_room_is_a_noop() {
        let mut table = RoomTable::default();
        assert!(!table.leave("conn_a", &Room::conversation("c1")));
        assert_eq!(table.members.len(), 0);
    }

    #[test]
    fn remove_connection_releases_every_room() {
        let mut table = RoomTable::default();
        table.join("conn_a", Room::personal("u1"));
        table.join("conn_a", Room::conversation("c1"));
        table.join("conn_b", Room::conversation("c1"));
        assert_eq!(table.conversation_count("conn_a"), 1);

        let mut released = table.remove_connection("conn_a");
        released.sort_by_key(|r| r.name());
        assert_eq!(
            released,
            vec![Room::conversation("c1"), Room::personal("u1")]
        );
        assert!(table.rooms_of("conn_a").is_empty());
        assert_eq!(table.members(&Room::personal("u1")).count(), 0);
        assert_eq!(table.members(&Room::conversation("c1")).count(), 1);
        assert_eq!(table.members.len(), 1);
    }
}
