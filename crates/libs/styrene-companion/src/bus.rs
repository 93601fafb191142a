//! Typed event bus fed by the channel's delegate callbacks.
//!
//! One `tokio::sync::broadcast` subject per event kind. Subjects are hot:
//! nothing is buffered for subscribers that do not exist yet.

use tokio::sync::broadcast;

use crate::channel::ChannelDelegate;
use crate::error::ChannelError;
use crate::types::*;

pub struct EventBus {
    activation: broadcast::Sender<ActivationChanged>,
    reachability: broadcast::Sender<bool>,
    messages: broadcast::Sender<Message>,
    messages_with_reply: broadcast::Sender<InboundRequest<Message>>,
    data: broadcast::Sender<Vec<u8>>,
    data_with_reply: broadcast::Sender<InboundRequest<Vec<u8>>>,
    file_transfers_finished: broadcast::Sender<TransferFinished<FileTransfer>>,
    user_info_transfers_finished: broadcast::Sender<TransferFinished<UserInfoTransfer>>,
    application_context: broadcast::Sender<Message>,
    user_info: broadcast::Sender<Message>,
    files: broadcast::Sender<SessionFile>,
}

fn publish<T>(kind: &'static str, tx: &broadcast::Sender<T>, event: T) {
    if tx.send(event).is_err() {
        log::trace!("bus: no subscribers for {kind} event, dropped");
    }
}

fn outcome(error: Option<ChannelError>) -> Result<(), ChannelError> {
    match error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

impl EventBus {
    /// `capacity` bounds how far a subscriber may fall behind per event kind.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; [`SessionConfig`](crate::SessionConfig)
    /// validation rejects that before it gets here.
    pub fn new(capacity: usize) -> Self {
        Self {
            activation: broadcast::channel(capacity).0,
            reachability: broadcast::channel(capacity).0,
            messages: broadcast::channel(capacity).0,
            messages_with_reply: broadcast::channel(capacity).0,
            data: broadcast::channel(capacity).0,
            data_with_reply: broadcast::channel(capacity).0,
            file_transfers_finished: broadcast::channel(capacity).0,
            user_info_transfers_finished: broadcast::channel(capacity).0,
            application_context: broadcast::channel(capacity).0,
            user_info: broadcast::channel(capacity).0,
            files: broadcast::channel(capacity).0,
        }
    }

    pub fn activation(&self) -> broadcast::Receiver<ActivationChanged> {
        self.activation.subscribe()
    }

    pub fn reachability(&self) -> broadcast::Receiver<bool> {
        self.reachability.subscribe()
    }

    pub fn messages(&self) -> broadcast::Receiver<Message> {
        self.messages.subscribe()
    }

    pub fn messages_with_reply(&self) -> broadcast::Receiver<InboundRequest<Message>> {
        self.messages_with_reply.subscribe()
    }

    pub fn data(&self) -> broadcast::Receiver<Vec<u8>> {
        self.data.subscribe()
    }

    pub fn data_with_reply(&self) -> broadcast::Receiver<InboundRequest<Vec<u8>>> {
        self.data_with_reply.subscribe()
    }

    pub fn file_transfers_finished(&self) -> broadcast::Receiver<TransferFinished<FileTransfer>> {
        self.file_transfers_finished.subscribe()
    }

    pub fn user_info_transfers_finished(
        &self,
    ) -> broadcast::Receiver<TransferFinished<UserInfoTransfer>> {
        self.user_info_transfers_finished.subscribe()
    }

    pub fn application_context(&self) -> broadcast::Receiver<Message> {
        self.application_context.subscribe()
    }

    pub fn user_info(&self) -> broadcast::Receiver<Message> {
        self.user_info.subscribe()
    }

    pub fn files(&self) -> broadcast::Receiver<SessionFile> {
        self.files.subscribe()
    }
}

impl ChannelDelegate for EventBus {
    fn activation_did_change(&self, state: ActivationState, error: Option<ChannelError>) {
        match &error {
            Some(err) => log::warn!("bus: activation changed to {state:?} with error: {err}"),
            None => log::debug!("bus: activation changed to {state:?}"),
        }
        publish("activation", &self.activation, ActivationChanged { state, error });
    }

    fn reachability_did_change(&self, reachable: bool) {
        log::debug!("bus: counterpart reachable={reachable}");
        publish("reachability", &self.reachability, reachable);
    }

    fn did_receive_message(&self, message: Message) {
        publish("message", &self.messages, message);
    }

    fn did_receive_message_with_reply(&self, message: Message, reply: ReplyCallback<Message>) {
        publish(
            "message-with-reply",
            &self.messages_with_reply,
            InboundRequest { payload: message, reply },
        );
    }

    fn did_receive_data(&self, data: Vec<u8>) {
        publish("data", &self.data, data);
    }

    fn did_receive_data_with_reply(&self, data: Vec<u8>, reply: ReplyCallback<Vec<u8>>) {
        publish("data-with-reply", &self.data_with_reply, InboundRequest { payload: data, reply });
    }

    fn file_transfer_did_finish(&self, transfer: FileTransfer, error: Option<ChannelError>) {
        log::debug!("bus: file transfer {:?} finished, error={error:?}", transfer.handle);
        publish(
            "file-transfer-finished",
            &self.file_transfers_finished,
            TransferFinished { subject: transfer, outcome: outcome(error) },
        );
    }

    fn user_info_transfer_did_finish(
        &self,
        transfer: UserInfoTransfer,
        error: Option<ChannelError>,
    ) {
        log::debug!("bus: user info transfer {:?} finished, error={error:?}", transfer.handle);
        publish(
            "user-info-transfer-finished",
            &self.user_info_transfers_finished,
            TransferFinished { subject: transfer, outcome: outcome(error) },
        );
    }

    fn did_receive_application_context(&self, context: Message) {
        publish("application-context", &self.application_context, context);
    }

    fn did_receive_user_info(&self, user_info: Message) {
        publish("user-info", &self.user_info, user_info);
    }

    fn did_receive_file(&self, file: SessionFile) {
        publish("file", &self.files, file);
    }
}
