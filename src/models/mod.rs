//! Wire models shared by the gateway and the auth service.

pub mod envelope;
pub mod health;

pub use envelope::{Envelope, SUCCESS_CODE};
pub use health::HealthResponse;
