//! Room membership registry.
//!
//! Membership is indexed both ways: room name to members, and connection to
//! the rooms it belongs to. Both sides are updated together by every
//! mutating operation, so a connection's rooms never need a full scan.
//!
//! Joins append. A connection that joins the same room twice holds two
//! memberships there, receives two copies of that room's traffic, and needs
//! two leaves to be gone from it.
//!
//! The registry is not synchronized. It is owned by the relay hub task, which
//! applies every join, leave and removal one at a time.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Opaque handle for a live client connection.
pub type ConnectionId = Uuid;

/// A named broadcast group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    name: String,
    members: Vec<ConnectionId>,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in the order they joined.
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    pub fn contains(&self, connection: &ConnectionId) -> bool {
        self.members.contains(connection)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn insert(&mut self, connection: ConnectionId) {
        self.members.push(connection);
    }

    /// Drop the earliest membership held by `connection`.
    fn remove(&mut self, connection: &ConnectionId) -> bool {
        match self.members.iter().position(|member| member == connection) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    fn remove_all(&mut self, connection: &ConnectionId) {
        self.members.retain(|member| member != connection);
    }
}

/// What a join changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Rooms the connection was added to, repeats included.
    pub joined: Vec<String>,
    /// Rooms that did not exist before this join.
    pub created: Vec<String>,
    /// Rooms that already held the connection and now hold it once more.
    pub already_member: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    /// The room does not exist or the connection is not in it.
    NotMember,
}

/// Point-in-time copy of every room and its members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub rooms: BTreeMap<String, Vec<ConnectionId>>,
}

impl RegistrySnapshot {
    pub fn members(&self, room: &str) -> Option<&[ConnectionId]> {
        self.rooms.get(room).map(Vec::as_slice)
    }

    pub fn rooms_of(&self, connection: &ConnectionId) -> Vec<&str> {
        self.rooms
            .iter()
            .filter(|(_, members)| members.contains(connection))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    /// Membership count per room, keyed by connection.
    memberships: HashMap<ConnectionId, BTreeMap<String, usize>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the named room, creating it empty if needed.
    pub fn ensure_room(&mut self, name: &str) -> &mut Room {
        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| Room::new(name))
    }

    pub fn join(&mut self, connection: ConnectionId, names: &[String]) -> JoinOutcome {
        let mut outcome = JoinOutcome::default();
        for name in names {
            if !self.rooms.contains_key(name) {
                outcome.created.push(name.clone());
            }
            self.ensure_room(name).insert(connection);
            let count = self
                .memberships
                .entry(connection)
                .or_default()
                .entry(name.clone())
                .or_insert(0);
            if *count > 0 {
                outcome.already_member.push(name.clone());
            }
            *count += 1;
            outcome.joined.push(name.clone());
        }
        outcome
    }

    /// Give up one membership in `name`. A connection that joined twice is
    /// still a member after the first leave.
    pub fn leave(&mut self, connection: &ConnectionId, name: &str) -> LeaveOutcome {
        let removed = self
            .rooms
            .get_mut(name)
            .is_some_and(|room| room.remove(connection));
        if !removed {
            return LeaveOutcome::NotMember;
        }

        if let Some(rooms) = self.memberships.get_mut(connection) {
            if let Some(count) = rooms.get_mut(name) {
                *count -= 1;
                if *count == 0 {
                    rooms.remove(name);
                }
            }
            if rooms.is_empty() {
                self.memberships.remove(connection);
            }
        }
        LeaveOutcome::Left
    }

    /// Remove every membership the connection holds, repeats included.
    ///
    /// Returns the rooms it was removed from; an unknown connection yields
    /// an empty list.
    pub fn remove_everywhere(&mut self, connection: &ConnectionId) -> Vec<String> {
        let Some(names) = self.memberships.remove(connection) else {
            return Vec::new();
        };
        for name in names.keys() {
            if let Some(room) = self.rooms.get_mut(name) {
                room.remove_all(connection);
            }
        }
        names.into_keys().collect()
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Rooms the connection currently belongs to, in name order.
    pub fn rooms_of(&self, connection: &ConnectionId) -> impl Iterator<Item = &str> {
        self.memberships
            .get(connection)
            .into_iter()
            .flat_map(|names| names.keys().map(String::as_str))
    }

    pub fn is_member(&self, connection: &ConnectionId) -> bool {
        self.memberships.contains_key(connection)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of connections that belong to at least one room.
    pub fn connection_count(&self) -> usize {
        self.memberships.len()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            rooms: self
                .rooms
                .iter()
                .map(|(name, room)| (name.clone(), room.members.clone()))
                .collect(),
        }
    }
}
