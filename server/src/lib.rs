pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod transport;

pub use config::Config;
pub use hub::{Hub, HubHandle};
pub use registry::RoomRegistry;
