pub mod events;
pub mod fanout;
pub mod handler;
pub mod membership;
pub mod rooms;
pub mod server;
pub mod session;
