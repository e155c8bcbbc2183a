// ABOUTME: PostgreSQL utilities module
// ABOUTME: Exports connection management and the session interface used for COPY transfers

pub mod connection;
pub mod session;

pub use connection::{connect, connect_with_retry};
pub use session::TableSession;
