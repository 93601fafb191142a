//! Async facade over the channel: state streams, readiness, replies and
//! transfer tracking, all derived from one [`EventBus`].

mod readiness;
mod request;
mod state;
mod transfer;

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::bus::EventBus;
use crate::channel::Channel;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::types::*;

/// Coordination layer for one channel talking to one counterpart.
///
/// Cheap to clone; clones share the channel and the bus.
#[derive(Clone)]
pub struct CompanionSession {
    channel: Arc<dyn Channel>,
    bus: Arc<EventBus>,
}

impl CompanionSession {
    /// Registers a fresh event bus as the channel's delegate.
    ///
    /// With `auto_activate` set this also requests activation, failing with
    /// [`SessionError::Unsupported`] on devices without a channel.
    pub fn new(channel: Arc<dyn Channel>, config: SessionConfig) -> Result<Self, SessionError> {
        config.validate().map_err(|err| SessionError::InvalidConfig(err.to_string()))?;
        let bus = Arc::new(EventBus::new(config.event_capacity));
        channel.set_delegate(bus.clone());
        let session = Self { channel, bus };
        if config.auto_activate {
            session.activate()?;
        }
        Ok(session)
    }

    pub fn activate(&self) -> Result<(), SessionError> {
        if !self.channel.is_supported() {
            log::warn!("session: channel is not supported on this device");
            return Err(SessionError::Unsupported);
        }
        log::debug!("session: requesting activation");
        self.channel.activate();
        Ok(())
    }

    pub fn current_activation_state(&self) -> ActivationState {
        self.channel.activation_state()
    }

    pub fn is_reachable_now(&self) -> bool {
        self.channel.is_reachable()
    }

    pub fn application_context(&self) -> Message {
        self.channel.application_context()
    }

    pub fn received_application_context_snapshot(&self) -> Message {
        self.channel.received_application_context()
    }

    /// Hands the latest context to the channel, which delivers it whenever the
    /// counterpart is next reachable. Requires an activated session.
    pub fn update_application_context(&self, context: Message) -> Result<(), SessionError> {
        if !self.channel.activation_state().is_activated() {
            return Err(SessionError::SessionNotActivated);
        }
        self.channel.update_application_context(context).map_err(SessionError::from)
    }

    // ── Pass-through inbound streams ──────────────────────────────────────────

    pub fn activation_changes(&self) -> impl Stream<Item = ActivationChanged> + Send + 'static {
        live("activation", self.bus.activation())
    }

    pub fn messages(&self) -> impl Stream<Item = Message> + Send + 'static {
        live("message", self.bus.messages())
    }

    pub fn messages_with_reply(
        &self,
    ) -> impl Stream<Item = InboundRequest<Message>> + Send + 'static {
        live("message-with-reply", self.bus.messages_with_reply())
    }

    pub fn data(&self) -> impl Stream<Item = Vec<u8>> + Send + 'static {
        live("data", self.bus.data())
    }

    pub fn data_with_reply(
        &self,
    ) -> impl Stream<Item = InboundRequest<Vec<u8>>> + Send + 'static {
        live("data-with-reply", self.bus.data_with_reply())
    }

    pub fn received_application_context(&self) -> impl Stream<Item = Message> + Send + 'static {
        live("application-context", self.bus.application_context())
    }

    pub fn received_user_info(&self) -> impl Stream<Item = Message> + Send + 'static {
        live("user-info", self.bus.user_info())
    }

    pub fn received_files(&self) -> impl Stream<Item = SessionFile> + Send + 'static {
        live("file", self.bus.files())
    }
}

/// Forwards a bus subscription as-is; lagged events are logged and skipped.
fn live<T>(
    kind: &'static str,
    mut rx: broadcast::Receiver<T>,
) -> impl Stream<Item = T> + Send + 'static
where
    T: Clone + Send + 'static,
{
    stream! {
        loop {
            match rx.recv().await {
                Ok(event) => yield event,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("session: {kind} subscriber lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
