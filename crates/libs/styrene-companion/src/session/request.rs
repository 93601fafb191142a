use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::channel::{ErrorHandler, ReplyHandler};
use crate::error::ChannelError;

use super::*;

/// Single-resolution slot shared by the reply and error handlers of one send.
///
/// The first handler to fire takes the sender; anything after that is
/// logged and dropped.
struct ReplySlot<T> {
    tx: Arc<Mutex<Option<oneshot::Sender<Result<T, ChannelError>>>>>,
}

impl<T: Send + 'static> ReplySlot<T> {
    fn new() -> (Self, oneshot::Receiver<Result<T, ChannelError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Arc::new(Mutex::new(Some(tx))) }, rx)
    }

    fn resolve(
        tx: &Mutex<Option<oneshot::Sender<Result<T, ChannelError>>>>,
        result: Result<T, ChannelError>,
    ) {
        let sender = tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(sender) => {
                if sender.send(result).is_err() {
                    log::trace!("session: reply arrived after the caller gave up");
                }
            }
            None => log::warn!("session: channel settled a send more than once, ignoring"),
        }
    }

    /// Consumes the slot so that the handlers hold the only references; a
    /// channel that drops both unused closes the reply.
    fn handlers(self) -> (ReplyHandler<T>, ErrorHandler) {
        let reply_tx = Arc::clone(&self.tx);
        let error_tx = self.tx;
        (
            Box::new(move |reply| Self::resolve(&reply_tx, Ok(reply))),
            Box::new(move |err| Self::resolve(&error_tx, Err(err))),
        )
    }
}

async fn settle<T>(rx: oneshot::Receiver<Result<T, ChannelError>>) -> Result<T, SessionError> {
    match rx.await {
        Ok(result) => result.map_err(SessionError::from),
        Err(_) => Err(SessionError::Closed),
    }
}

/// No-reply sends only hear back on failure. A channel that drops the error
/// handler unused has accepted the send.
async fn settle_no_reply(rx: oneshot::Receiver<ChannelError>) -> Result<(), SessionError> {
    match rx.await {
        Ok(err) => Err(SessionError::Transport(err)),
        Err(_) => Ok(()),
    }
}

fn error_only() -> (ErrorHandler, oneshot::Receiver<ChannelError>) {
    let (tx, rx) = oneshot::channel::<ChannelError>();
    let handler: ErrorHandler = Box::new(move |err: ChannelError| {
        if tx.send(err).is_err() {
            log::trace!("session: send failure arrived after the caller gave up");
        }
    });
    (handler, rx)
}

impl CompanionSession {
    /// Sends `message` once the session is ready and resolves with the reply.
    ///
    /// The send itself cannot be aborted; dropping the future only discards
    /// the eventual reply.
    pub async fn send_message(
        &self,
        message: Message,
        wait_for_session: bool,
    ) -> Result<Message, SessionError> {
        self.await_ready(wait_for_session).await?;
        let (slot, rx) = ReplySlot::new();
        let (on_reply, on_error) = slot.handlers();
        log::debug!("session: sending message with {} keys", message.len());
        self.channel.send_message(message, on_reply, on_error);
        settle(rx).await
    }

    pub async fn send_data(
        &self,
        data: Vec<u8>,
        wait_for_session: bool,
    ) -> Result<Vec<u8>, SessionError> {
        self.await_ready(wait_for_session).await?;
        let (slot, rx) = ReplySlot::new();
        let (on_reply, on_error) = slot.handlers();
        log::debug!("session: sending {} bytes of data", data.len());
        self.channel.send_data(data, on_reply, on_error);
        settle(rx).await
    }

    /// Sends without asking for a reply. Fails only on a transport error; if
    /// the channel neither fails nor releases its error handler, this never
    /// resolves.
    pub async fn send_message_no_reply(
        &self,
        message: Message,
        wait_for_session: bool,
    ) -> Result<(), SessionError> {
        self.await_ready(wait_for_session).await?;
        let (on_error, rx) = error_only();
        self.channel.send_message_no_reply(message, on_error);
        settle_no_reply(rx).await
    }

    pub async fn send_data_no_reply(
        &self,
        data: Vec<u8>,
        wait_for_session: bool,
    ) -> Result<(), SessionError> {
        self.await_ready(wait_for_session).await?;
        let (on_error, rx) = error_only();
        self.channel.send_data_no_reply(data, on_error);
        settle_no_reply(rx).await
    }
}
