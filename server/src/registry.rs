use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::error::RoomError;
use crate::room::{ConnectionId, Room, RoomCode};

const LOG_TAG: &str = "[ROOM]";
const CODE_RANGE: RangeInclusive<u16> = 1000..=9999;
const CODE_SPACE: usize = 9000;

/// What became of a room when one of its members left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub code: RoomCode,
    /// The host left and the room no longer exists.
    pub room_closed: bool,
    /// Members still connected at the moment of departure, in join order.
    pub remaining: Vec<ConnectionId>,
}

/// All live rooms, plus which room each connection is in.
pub struct RoomRegistry {
    /// room code -> Room
    rooms: HashMap<RoomCode, Room>,
    /// connection -> room code; lookup only, rooms own their members
    memberships: HashMap<ConnectionId, RoomCode>,
    rng: StdRng,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Registry with a deterministic code sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            rng,
        }
    }

    pub fn create_room(&mut self, host: ConnectionId) -> Result<RoomCode, RoomError> {
        if self.memberships.contains_key(&host) {
            return Err(RoomError::AlreadyInRoom);
        }

        let code = self.generate_code()?;
        self.rooms
            .insert(code.clone(), Room::new(code.clone(), host));
        self.memberships.insert(host, code.clone());

        tracing::info!("{LOG_TAG} Room {} created by {}", code, host);
        Ok(code)
    }

    /// Adds `id` to the room. Joining a room one is already in is a no-op
    /// that still succeeds.
    pub fn join(&mut self, code: &RoomCode, id: ConnectionId) -> Result<&Room, RoomError> {
        if !self.rooms.contains_key(code) {
            return Err(RoomError::RoomNotFound);
        }
        if let Some(current) = self.memberships.get(&id) {
            if current != code {
                return Err(RoomError::AlreadyInRoom);
            }
        }

        let room = self
            .rooms
            .get_mut(code)
            .ok_or(RoomError::RoomNotFound)?;
        if room.add_member(id) {
            self.memberships.insert(id, code.clone());
            tracing::info!("{LOG_TAG} {} joined room {}", id, code);
        }
        Ok(room)
    }

    /// Removes `id` from whatever room it is in. A departing host takes the
    /// room down with it.
    pub fn leave(&mut self, id: ConnectionId) -> Option<Departure> {
        let code = self.memberships.remove(&id)?;
        let room = self.rooms.get_mut(&code)?;
        room.remove_member(id);
        let remaining = room.members().to_vec();

        let room_closed = room.is_host(id);
        if room_closed {
            self.destroy_room(&code);
        } else {
            tracing::info!("{LOG_TAG} {} left room {}", id, code);
        }

        Some(Departure {
            code,
            room_closed,
            remaining,
        })
    }

    /// Removes the room and clears every member's association with it.
    pub fn destroy_room(&mut self, code: &RoomCode) -> Option<Room> {
        let room = self.rooms.remove(code)?;
        for member in room.members() {
            if self.memberships.get(member) == Some(code) {
                self.memberships.remove(member);
            }
        }
        tracing::info!("{LOG_TAG} Room {} closed", code);
        Some(room)
    }

    pub fn get(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    pub fn room_of(&self, id: ConnectionId) -> Option<&RoomCode> {
        self.memberships.get(&id)
    }

    pub fn find_room_by_connection(&self, id: ConnectionId) -> Option<&Room> {
        self.room_of(id).and_then(|code| self.rooms.get(code))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn generate_code(&mut self) -> Result<RoomCode, RoomError> {
        if self.rooms.len() >= CODE_SPACE {
            return Err(RoomError::NoCodesAvailable);
        }
        loop {
            let code = RoomCode::from(self.rng.gen_range(CODE_RANGE).to_string());
            if !self.rooms.contains_key(&code) {
                break Ok(code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn create_room_makes_caller_host_and_member() {
        let mut registry = RoomRegistry::with_seed(7);
        let host = Uuid::new_v4();

        let code = registry.create_room(host).unwrap();

        let room = registry.get(&code).unwrap();
        assert_eq!(room.host(), host);
        assert!(room.is_host(host));
        assert_eq!(room.members(), &[host]);
        assert_eq!(registry.room_of(host), Some(&code));
    }

    #[test]
    fn codes_are_four_digits_and_unique() {
        let mut registry = RoomRegistry::with_seed(42);
        let mut seen = HashSet::new();

        for _ in 0..500 {
            let code = registry.create_room(Uuid::new_v4()).unwrap();
            assert_eq!(code.as_str().len(), 4);
            let value: u16 = code.as_str().parse().unwrap();
            assert!(CODE_RANGE.contains(&value));
            assert!(seen.insert(code), "duplicate live code");
        }
        assert_eq!(registry.len(), 500);
    }

    #[test]
    fn freed_code_space_is_reusable() {
        let mut registry = RoomRegistry::with_seed(1);
        let hosts: Vec<_> = (0..CODE_SPACE).map(|_| Uuid::new_v4()).collect();
        for host in &hosts {
            registry.create_room(*host).unwrap();
        }

        assert_eq!(
            registry.create_room(Uuid::new_v4()),
            Err(RoomError::NoCodesAvailable)
        );

        let freed = registry.room_of(hosts[0]).cloned().unwrap();
        registry.leave(hosts[0]);

        let code = registry.create_room(Uuid::new_v4()).unwrap();
        assert_eq!(code, freed);
    }

    #[test]
    fn create_while_in_a_room_is_rejected() {
        let mut registry = RoomRegistry::with_seed(3);
        let host = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let code = registry.create_room(host).unwrap();
        registry.join(&code, viewer).unwrap();

        assert_eq!(registry.create_room(host), Err(RoomError::AlreadyInRoom));
        assert_eq!(registry.create_room(viewer), Err(RoomError::AlreadyInRoom));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn join_twice_keeps_single_membership() {
        let mut registry = RoomRegistry::with_seed(3);
        let host = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let code = registry.create_room(host).unwrap();

        registry.join(&code, viewer).unwrap();
        let room = registry.join(&code, viewer).unwrap();

        assert_eq!(room.members(), &[host, viewer]);
    }

    #[test]
    fn join_unknown_code_changes_nothing() {
        let mut registry = RoomRegistry::with_seed(3);
        let host = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let code = registry.create_room(host).unwrap();
        let missing = RoomCode::from("0000");

        let err = registry.join(&missing, viewer).unwrap_err();

        assert_eq!(err, RoomError::RoomNotFound);
        assert_eq!(registry.room_of(viewer), None);
        assert_eq!(registry.get(&code).unwrap().members(), &[host]);
    }

    #[test]
    fn join_second_room_is_rejected() {
        let mut registry = RoomRegistry::with_seed(3);
        let first = registry.create_room(Uuid::new_v4()).unwrap();
        let second = registry.create_room(Uuid::new_v4()).unwrap();
        let viewer = Uuid::new_v4();

        registry.join(&first, viewer).unwrap();

        assert_eq!(
            registry.join(&second, viewer).unwrap_err(),
            RoomError::AlreadyInRoom
        );
        assert_eq!(registry.room_of(viewer), Some(&first));
        assert!(!registry.get(&second).unwrap().contains(viewer));
    }

    #[test]
    fn viewer_leaving_keeps_room() {
        let mut registry = RoomRegistry::with_seed(3);
        let host = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let code = registry.create_room(host).unwrap();
        registry.join(&code, a).unwrap();
        registry.join(&code, b).unwrap();

        let departure = registry.leave(a).unwrap();

        assert_eq!(
            departure,
            Departure {
                code: code.clone(),
                room_closed: false,
                remaining: vec![host, b],
            }
        );
        assert_eq!(registry.room_of(a), None);
        assert_eq!(registry.get(&code).unwrap().members(), &[host, b]);
    }

    #[test]
    fn host_leaving_destroys_room_and_memberships() {
        let mut registry = RoomRegistry::with_seed(3);
        let host = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let code = registry.create_room(host).unwrap();
        registry.join(&code, viewer).unwrap();

        let departure = registry.leave(host).unwrap();

        assert!(departure.room_closed);
        assert_eq!(departure.remaining, vec![viewer]);
        assert!(registry.get(&code).is_none());
        assert!(registry.find_room_by_connection(viewer).is_none());
        assert!(registry.is_empty());
        assert_eq!(
            registry.join(&code, Uuid::new_v4()).unwrap_err(),
            RoomError::RoomNotFound
        );
    }

    #[test]
    fn leave_without_room_is_none() {
        let mut registry = RoomRegistry::with_seed(3);
        assert_eq!(registry.leave(Uuid::new_v4()), None);
    }
}
