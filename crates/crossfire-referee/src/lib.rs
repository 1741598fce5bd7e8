pub mod arena;
pub mod authority;
pub mod config;
pub mod control_point;
pub mod events;
pub mod flag;
pub mod ledger;
#[cfg(any(test, feature = "test-helpers"))]
pub mod loopback;
pub mod referee;
pub mod session;

pub use authority::{Authority, AuthorityChange};
pub use config::RefereeConfig;
pub use events::{DropReason, MatchEvent, Outbox};
#[cfg(any(test, feature = "test-helpers"))]
pub use loopback::Loopback;
pub use referee::MatchReferee;
pub use session::MatchSession;
