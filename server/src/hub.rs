//! The single owner of room state.
//!
//! Every socket task talks to the hub through a [`HubHandle`]; the hub task
//! applies events one at a time, so room mutation and fan-out never race.

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

use crate::error::RoomError;
use crate::protocol::{self, Inbound, Outbound};
use crate::registry::RoomRegistry;
use crate::room::{ConnectionId, RoomCode, SyncPoint};

pub const ANONYMOUS: &str = "Anonymous";

pub type ClientSender = mpsc::UnboundedSender<Outbound>;

#[derive(Debug)]
pub enum HubEvent {
    Opened {
        id: ConnectionId,
        sender: ClientSender,
    },
    Inbound {
        id: ConnectionId,
        text: String,
    },
    Closed {
        id: ConnectionId,
    },
    Status {
        respond_to: oneshot::Sender<HubStatus>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub rooms: usize,
    pub connections: usize,
}

/// A connected client as the hub sees it.
struct Connection {
    sender: ClientSender,
    name: String,
}

pub struct Hub {
    registry: RoomRegistry,
    connections: HashMap<ConnectionId, Connection>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::with_registry(RoomRegistry::new())
    }

    pub fn with_registry(registry: RoomRegistry) -> Self {
        Self {
            registry,
            connections: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn status(&self) -> HubStatus {
        HubStatus {
            rooms: self.registry.len(),
            connections: self.connections.len(),
        }
    }

    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Opened { id, sender } => self.handle_opened(id, sender),
            HubEvent::Inbound { id, text } => self.handle_inbound(id, &text),
            HubEvent::Closed { id } => self.handle_closed(id),
            HubEvent::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
        }
    }

    pub fn handle_opened(&mut self, id: ConnectionId, sender: ClientSender) {
        self.connections.insert(
            id,
            Connection {
                sender,
                name: ANONYMOUS.to_string(),
            },
        );
        tracing::info!("Client {} connected", id);
    }

    pub fn handle_inbound(&mut self, id: ConnectionId, text: &str) {
        let Some(connection) = self.connections.get_mut(&id) else {
            tracing::warn!("Message from unknown client {}", id);
            return;
        };

        let envelope = match protocol::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Dropping frame from {}: {}", id, e);
                return;
            }
        };

        if let Some(name) = envelope.sender {
            connection.name = name;
        }

        match envelope.message {
            Ok(message) => self.dispatch(id, message),
            Err(e) => tracing::warn!("Ignoring message from {}: {}", id, e),
        }
    }

    pub fn handle_closed(&mut self, id: ConnectionId) {
        let name = self.display_name(id);
        self.connections.remove(&id);

        if let Some(departure) = self.registry.leave(id) {
            let notice = if departure.room_closed {
                Outbound::system(format!("Host ({name}) left — room closed"))
            } else {
                Outbound::system(format!("{name} left"))
            };
            self.send_all(&departure.remaining, &notice);
        }

        tracing::info!("Client {} disconnected", id);
    }

    fn dispatch(&mut self, id: ConnectionId, message: Inbound) {
        match message {
            Inbound::Create => self.create(id),
            Inbound::Join { code } => self.join(id, code),
            Inbound::LoadVideo { code, url } => self.load_video(id, code, url),
            Inbound::Sync { code, action, time } => {
                self.sync(id, code, SyncPoint { action, time })
            }
            Inbound::Chat { code, text } => self.chat(id, &code, text),
        }
    }

    fn create(&mut self, id: ConnectionId) {
        match self.registry.create_room(id) {
            Ok(code) => self.send_to(id, Outbound::RoomCreated { code }),
            Err(e) => self.send_error(id, &e),
        }
    }

    fn join(&mut self, id: ConnectionId, code: Option<RoomCode>) {
        let Some(code) = code else {
            self.send_error(id, &RoomError::RoomNotFound);
            return;
        };
        let initial = match self.registry.join(&code, id).map(|room| room.video().cloned()) {
            Ok(initial) => initial,
            Err(e) => {
                self.send_error(id, &e);
                return;
            }
        };

        if let Some(data) = initial {
            self.send_to(
                id,
                Outbound::SyncInitial {
                    code: code.clone(),
                    data,
                },
            );
        }

        let name = self.display_name(id);
        self.broadcast(&code, &Outbound::system(format!("{name} joined")));
    }

    fn load_video(&mut self, id: ConnectionId, code: RoomCode, url: String) {
        let Some(room) = self
            .registry
            .get_mut(&code)
            .filter(|room| room.is_host(id))
        else {
            self.send_error(id, &RoomError::NotHost);
            return;
        };
        room.load_video(url.clone());
        tracing::info!("[VIDEO] Host in room {} loaded {}", code, url);

        let sender = self.display_name(id);
        self.broadcast(&code, &Outbound::LoadVideo { sender, url });
    }

    fn sync(&mut self, id: ConnectionId, code: RoomCode, point: SyncPoint) {
        let Some(room) = self.registry.get_mut(&code) else {
            return;
        };
        if !room.is_host(id) {
            tracing::debug!("Ignoring sync from non-host {} in room {}", id, code);
            return;
        }
        room.record_sync(point.clone());
        let viewers: Vec<_> = room
            .members()
            .iter()
            .copied()
            .filter(|member| *member != id)
            .collect();

        let message = Outbound::Sync {
            action: point.action,
            time: point.time,
        };
        self.send_all(&viewers, &message);
    }

    fn chat(&self, id: ConnectionId, code: &RoomCode, text: String) {
        let sender = self.display_name(id);
        self.broadcast(
            code,
            &Outbound::Chat {
                sender,
                text,
                is_system: false,
            },
        );
    }

    fn display_name(&self, id: ConnectionId) -> String {
        self.connections
            .get(&id)
            .map(|connection| connection.name.clone())
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }

    fn send_error(&self, id: ConnectionId, error: &RoomError) {
        tracing::debug!("Rejecting request from {}: {:?}", id, error);
        self.send_to(
            id,
            Outbound::Error {
                message: error.to_string(),
            },
        );
    }

    fn send_to(&self, id: ConnectionId, message: Outbound) {
        if let Some(connection) = self.connections.get(&id) {
            if connection.sender.send(message).is_err() {
                tracing::debug!("Client {} channel closed, message skipped", id);
            }
        }
    }

    /// Delivers to every member of the room whose channel is still open.
    fn broadcast(&self, code: &RoomCode, message: &Outbound) {
        if let Some(room) = self.registry.get(code) {
            self.send_all(room.members(), message);
        }
    }

    fn send_all(&self, members: &[ConnectionId], message: &Outbound) {
        tracing::debug!("Broadcasting {:?} to {} members", message, members.len());
        for member in members {
            self.send_to(*member, message.clone());
        }
    }
}

/// Cloneable entry point to a running hub task.
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::UnboundedSender<HubEvent>,
}

impl HubHandle {
    pub fn spawn() -> Self {
        Self::spawn_with(Hub::new())
    }

    pub fn spawn_with(hub: Hub) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(hub, rx));
        Self { events }
    }

    pub fn open(&self, id: ConnectionId, sender: ClientSender) {
        self.submit(HubEvent::Opened { id, sender });
    }

    pub fn inbound(&self, id: ConnectionId, text: String) {
        self.submit(HubEvent::Inbound { id, text });
    }

    pub fn closed(&self, id: ConnectionId) {
        self.submit(HubEvent::Closed { id });
    }

    pub async fn status(&self) -> Option<HubStatus> {
        let (respond_to, rx) = oneshot::channel();
        self.submit(HubEvent::Status { respond_to });
        rx.await.ok()
    }

    fn submit(&self, event: HubEvent) {
        if self.events.send(event).is_err() {
            tracing::error!("Hub is not running, event dropped");
        }
    }
}

/// Applies events until every [`HubHandle`] is gone.
pub async fn run(mut hub: Hub, mut events: mpsc::UnboundedReceiver<HubEvent>) {
    while let Some(event) = events.recv().await {
        hub.handle(event);
    }
    tracing::info!("Hub stopped with {} live rooms", hub.registry.len());
}
