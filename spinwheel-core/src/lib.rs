pub mod busy;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod session;
pub mod sources;
pub mod sse;
pub mod telemetry;
pub mod transport;
