use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Dictionary payload used for messages, user info and application context.
pub type Message = serde_json::Map<String, serde_json::Value>;

/// A file handed to or received from the channel, with optional metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionFile {
    pub path: PathBuf,
    pub metadata: Option<Message>,
}

// ── Session state ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    #[default]
    NotActivated,
    Inactive,
    Activated,
}

impl ActivationState {
    pub fn is_activated(self) -> bool {
        self == Self::Activated
    }
}

/// Activation change as reported by the channel, with the error that
/// accompanied it (for example a failed activation attempt).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationChanged {
    pub state: ActivationState,
    pub error: Option<ChannelError>,
}

// ── Transfers ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub completed_unit_count: u64,
    pub total_unit_count: u64,
}

impl Progress {
    pub const fn new(completed_unit_count: u64, total_unit_count: u64) -> Self {
        Self { completed_unit_count, total_unit_count }
    }

    /// Fraction in `0.0..=1.0`; an unknown total reports `0.0`.
    pub fn fraction_completed(&self) -> f64 {
        if self.total_unit_count == 0 {
            return 0.0;
        }
        (self.completed_unit_count.min(self.total_unit_count)) as f64
            / self.total_unit_count as f64
    }

    pub fn is_finished(&self) -> bool {
        self.total_unit_count > 0 && self.completed_unit_count >= self.total_unit_count
    }
}

/// Channel-side control surface of one in-flight transfer.
pub trait TransferControl: Send + Sync {
    fn cancel(&self);

    fn is_transferring(&self) -> bool;

    /// Progress snapshot, for transfers that report one.
    fn progress(&self) -> Option<Progress> {
        None
    }
}

/// Identity-comparable token for one transfer started on the channel.
///
/// Two handles are equal only when they wrap the same control object; equal
/// payloads never make two transfers equal.
#[derive(Clone)]
pub struct TransferHandle {
    control: Arc<dyn TransferControl>,
}

impl TransferHandle {
    pub fn new(control: Arc<dyn TransferControl>) -> Self {
        Self { control }
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.control) as *const ()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_transferring(&self) -> bool {
        self.control.is_transferring()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.control.progress()
    }
}

impl PartialEq for TransferHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for TransferHandle {}

impl Hash for TransferHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferHandle({:p})", self.identity())
    }
}

/// Anything carried by a transfer-finished event.
pub trait TransferSubject {
    fn handle(&self) -> &TransferHandle;
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileTransfer {
    pub handle: TransferHandle,
    pub file: SessionFile,
}

impl FileTransfer {
    pub fn progress(&self) -> Progress {
        self.handle.progress().unwrap_or_default()
    }
}

impl TransferSubject for FileTransfer {
    fn handle(&self) -> &TransferHandle {
        &self.handle
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserInfoTransfer {
    pub handle: TransferHandle,
    pub user_info: Message,
}

impl TransferSubject for UserInfoTransfer {
    fn handle(&self) -> &TransferHandle {
        &self.handle
    }
}

/// Uniform `(subject, outcome)` shape for transfer completion events.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferFinished<S> {
    pub subject: S,
    pub outcome: Result<(), ChannelError>,
}

// ── Inbound requests ──────────────────────────────────────────────────────────

/// Reply path for an inbound message that expects an answer.
///
/// Passed through from the channel unchanged; calling it more than once is
/// up to the channel to handle.
pub struct ReplyCallback<T> {
    reply: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T> ReplyCallback<T> {
    pub fn new(reply: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self { reply: Arc::new(reply) }
    }

    pub fn reply(&self, value: T) {
        (self.reply)(value)
    }
}

impl<T> Clone for ReplyCallback<T> {
    fn clone(&self) -> Self {
        Self { reply: Arc::clone(&self.reply) }
    }
}

impl<T> fmt::Debug for ReplyCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyCallback")
    }
}

/// Inbound payload paired with the callback that answers it.
#[derive(Clone, Debug)]
pub struct InboundRequest<T> {
    pub payload: T,
    pub reply: ReplyCallback<T>,
}

impl<T> InboundRequest<T> {
    pub fn respond(&self, value: T) {
        self.reply.reply(value)
    }
}
