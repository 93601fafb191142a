//! Boundary to the underlying session channel.
//!
//! The channel is an external collaborator: it owns the transport and the
//! OS-level session, exposes synchronous state reads and callback-based
//! operations, and pushes events to a single registered [`ChannelDelegate`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ChannelError;
use crate::types::*;

/// Called at most once with the counterpart's reply.
pub type ReplyHandler<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Called at most once with the failure of a send.
pub type ErrorHandler = Box<dyn FnOnce(ChannelError) + Send + 'static>;

/// Imperative surface of the session channel.
///
/// For reply-bearing sends exactly one of `on_reply` / `on_error` fires.
/// Transfer starts return their handle synchronously; completion arrives later
/// through the delegate.
pub trait Channel: Send + Sync {
    /// Whether this device can run a session at all.
    fn is_supported(&self) -> bool {
        true
    }

    fn set_delegate(&self, delegate: Arc<dyn ChannelDelegate>);

    /// Idempotent request to begin or continue activation.
    fn activate(&self);

    fn activation_state(&self) -> ActivationState;

    fn is_reachable(&self) -> bool;

    fn outstanding_file_transfers(&self) -> Vec<FileTransfer>;

    fn outstanding_user_info_transfers(&self) -> Vec<UserInfoTransfer>;

    fn application_context(&self) -> Message;

    fn received_application_context(&self) -> Message;

    fn update_application_context(&self, context: Message) -> Result<(), ChannelError>;

    fn send_message(
        &self,
        message: Message,
        on_reply: ReplyHandler<Message>,
        on_error: ErrorHandler,
    );

    fn send_message_no_reply(&self, message: Message, on_error: ErrorHandler);

    fn send_data(&self, data: Vec<u8>, on_reply: ReplyHandler<Vec<u8>>, on_error: ErrorHandler);

    fn send_data_no_reply(&self, data: Vec<u8>, on_error: ErrorHandler);

    fn transfer_file(&self, path: PathBuf, metadata: Option<Message>) -> FileTransfer;

    fn transfer_user_info(&self, user_info: Message) -> UserInfoTransfer;
}

/// Push notifications from the channel, delivered serially.
pub trait ChannelDelegate: Send + Sync {
    fn activation_did_change(&self, state: ActivationState, error: Option<ChannelError>);

    fn reachability_did_change(&self, reachable: bool);

    fn did_receive_message(&self, message: Message);

    fn did_receive_message_with_reply(&self, message: Message, reply: ReplyCallback<Message>);

    fn did_receive_data(&self, data: Vec<u8>);

    fn did_receive_data_with_reply(&self, data: Vec<u8>, reply: ReplyCallback<Vec<u8>>);

    fn file_transfer_did_finish(&self, transfer: FileTransfer, error: Option<ChannelError>);

    fn user_info_transfer_did_finish(
        &self,
        transfer: UserInfoTransfer,
        error: Option<ChannelError>,
    );

    fn did_receive_application_context(&self, context: Message);

    fn did_receive_user_info(&self, user_info: Message);

    fn did_receive_file(&self, file: SessionFile);
}
