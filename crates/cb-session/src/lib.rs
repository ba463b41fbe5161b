//! Per-chat conversation memory with idle expiry.
//!
//! [`SessionStore`] owns one sliding-window history per chat id and
//! [`Sweeper`] periodically drops chats that went quiet.

pub mod clock;
pub mod store;
pub mod sweeper;
pub mod turn;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{SessionHandle, SessionStore, SessionSummary};
pub use sweeper::{Sweeper, SweeperConfig, SweeperGuard};
pub use turn::{Role, Turn};
pub use window::TurnWindow;
