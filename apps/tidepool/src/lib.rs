pub mod api;
pub mod client;
pub mod layout;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod transport;
