use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one accepted socket.
pub type ConnectionId = Uuid;

/// Four-digit, human-typeable room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoomCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Most recent playback command issued by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPoint {
    pub action: String,
    pub time: f64,
}

/// The loaded video and where playback was last seen.
///
/// Serialized as the `data` payload of `sync_initial`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoState {
    pub video_url: String,
    pub last_sync: Option<SyncPoint>,
}

/// One watch session: a host, its viewers, and the shared video state.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    host: ConnectionId,
    /// Join order, host first. Never holds duplicates.
    members: Vec<ConnectionId>,
    video: Option<VideoState>,
}

impl Room {
    pub(crate) fn new(code: RoomCode, host: ConnectionId) -> Self {
        Self {
            code,
            host,
            members: vec![host],
            video: None,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host(&self) -> ConnectionId {
        self.host
    }

    pub fn is_host(&self, id: ConnectionId) -> bool {
        self.host == id
    }

    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains(&id)
    }

    pub fn video(&self) -> Option<&VideoState> {
        self.video.as_ref()
    }

    /// Returns `false` if `id` was already a member.
    pub(crate) fn add_member(&mut self, id: ConnectionId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.members.push(id);
        true
    }

    pub(crate) fn remove_member(&mut self, id: ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != id);
        self.members.len() != before
    }

    /// Replaces the video and forgets the previous playback position.
    pub fn load_video(&mut self, url: String) {
        self.video = Some(VideoState {
            video_url: url,
            last_sync: None,
        });
    }

    /// Playback commands before any video is loaded have nothing to attach
    /// to and are not remembered.
    pub fn record_sync(&mut self, point: SyncPoint) {
        if let Some(video) = self.video.as_mut() {
            video.last_sync = Some(point);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_room_has_host_as_only_member() {
        let host = Uuid::new_v4();
        let room = Room::new(RoomCode::from("4821"), host);

        assert_eq!(room.members(), &[host]);
        assert!(room.is_host(host));
        assert!(room.video().is_none());
    }

    #[test]
    fn add_member_keeps_join_order_without_duplicates() {
        let host = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut room = Room::new(RoomCode::from("4821"), host);

        assert!(room.add_member(a));
        assert!(room.add_member(b));
        assert!(!room.add_member(a));

        assert_eq!(room.members(), &[host, a, b]);
    }

    #[test]
    fn loading_a_video_resets_last_sync() {
        let mut room = Room::new(RoomCode::from("4821"), Uuid::new_v4());
        room.load_video("https://example.com/a.mp4".into());
        room.record_sync(SyncPoint {
            action: "play".into(),
            time: 12.5,
        });
        assert!(room.video().and_then(|v| v.last_sync.as_ref()).is_some());

        room.load_video("https://example.com/b.mp4".into());

        let video = room.video().cloned();
        assert_eq!(
            video,
            Some(VideoState {
                video_url: "https://example.com/b.mp4".into(),
                last_sync: None,
            })
        );
    }

    #[test]
    fn sync_without_video_is_not_remembered() {
        let mut room = Room::new(RoomCode::from("4821"), Uuid::new_v4());
        room.record_sync(SyncPoint {
            action: "pause".into(),
            time: 3.0,
        });
        assert!(room.video().is_none());
    }

    #[test]
    fn video_state_serializes_with_camel_case_keys() {
        let state = VideoState {
            video_url: "X".into(),
            last_sync: None,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({ "videoUrl": "X", "lastSync": null }));
    }
}
