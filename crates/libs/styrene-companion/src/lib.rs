//! Async coordination layer for a paired-device session channel.
//!
//! The channel (see [`Channel`]) is callback driven: sends report through
//! reply/error handlers, transfers report through a shared "finished"
//! notification, and state changes arrive on a delegate. This crate turns
//! that into futures and streams:
//!
//! - [`EventBus`]: the delegate, with one hot broadcast subject per event kind
//! - state streams: activation, reachability and outstanding transfers,
//!   each replaying the channel's current value to every new subscriber
//! - [`CompanionSession::await_ready`]: waits for activated and reachable
//! - [`CompanionSession::send_message`] and friends: one send, one result
//! - [`CompanionSession::transfer_file`] and
//!   [`CompanionSession::transfer_user_info`]: completion is matched by handle
//!   identity, and dropping the tracker cancels the transfer
//!
//! [`StubChannel`] is an in-memory channel for driving all of the above by
//! hand.
//!
//! ```rust
//! use styrene_companion::{ActivationState, CompanionSession, SessionConfig, StubChannel};
//!
//! let stub = StubChannel::with_state(ActivationState::Activated, true);
//! let session = CompanionSession::new(stub.clone(), SessionConfig::default()).unwrap();
//! assert!(session.is_reachable_now());
//! ```

pub mod bus;
pub mod channel;
pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use bus::EventBus;
pub use channel::{Channel, ChannelDelegate, ErrorHandler, ReplyHandler};
pub use config::SessionConfig;
pub use error::{ChannelError, ConfigError, SessionError};
pub use session::CompanionSession;
pub use types::*;

mod stub;
pub use stub::{PendingSend, StubChannel, StubTransfer};
