pub mod clock;
pub mod config;
pub mod error;
pub mod router;
pub mod session_loop;

pub use clock::TokioClock;
pub use config::{DemoConfig, HostConfig, LogFormat};
pub use error::HostError;
pub use router::{RouterHandle, spawn_router};
pub use session_loop::{SessionBroadcast, SessionCommand, SessionSnapshot, spawn_session};
