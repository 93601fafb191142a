use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::channel::{Channel, ChannelDelegate, ErrorHandler, ReplyHandler};
use crate::error::ChannelError;
use crate::types::*;

/// Transfer control recorded by [`StubChannel`].
#[derive(Debug)]
pub struct StubTransfer {
    cancels: AtomicUsize,
    transferring: AtomicBool,
    progress: Mutex<Option<Progress>>,
}

impl StubTransfer {
    fn new(progress: Option<Progress>) -> Self {
        Self {
            cancels: AtomicUsize::new(0),
            transferring: AtomicBool::new(true),
            progress: Mutex::new(progress),
        }
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn set_progress(&self, progress: Progress) {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner) = Some(progress);
    }

    fn finish(&self) {
        self.transferring.store(false, Ordering::SeqCst);
    }
}

impl TransferControl for StubTransfer {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.transferring.store(false, Ordering::SeqCst);
    }

    fn is_transferring(&self) -> bool {
        self.transferring.load(Ordering::SeqCst)
    }

    fn progress(&self) -> Option<Progress> {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A send captured by [`StubChannel`], waiting for the test to settle it.
pub struct PendingSend<T> {
    pub payload: T,
    on_reply: Option<ReplyHandler<T>>,
    on_error: ErrorHandler,
}

impl<T> PendingSend<T> {
    pub fn reply(self, reply: T) {
        match self.on_reply {
            Some(on_reply) => on_reply(reply),
            None => log::warn!("stub: reply to a send that asked for none"),
        }
    }

    pub fn fail(self, err: ChannelError) {
        (self.on_error)(err)
    }

    /// Releases both handlers unused, the way a channel accepts a no-reply send.
    pub fn accept(self) {}
}

#[derive(Default)]
struct StubState {
    unsupported: bool,
    delegate: Option<Arc<dyn ChannelDelegate>>,
    activate_calls: usize,
    activation: ActivationState,
    reachable: bool,
    file_transfers: Vec<(FileTransfer, Arc<StubTransfer>)>,
    user_info_transfers: Vec<(UserInfoTransfer, Arc<StubTransfer>)>,
    application_context: Message,
    received_application_context: Message,
    context_error: Option<ChannelError>,
    messages: VecDeque<PendingSend<Message>>,
    data: VecDeque<PendingSend<Vec<u8>>>,
}

/// In-memory [`Channel`] driven by hand.
///
/// State setters update the snapshot first and then notify the delegate, the
/// order a real channel uses. Sends queue up until the test settles them;
/// transfers stay outstanding until finished or cancelled.
#[derive(Default)]
pub struct StubChannel {
    state: Mutex<StubState>,
}

impl StubChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Starts in the given state without notifying anyone.
    pub fn with_state(activation: ActivationState, reachable: bool) -> Arc<Self> {
        let stub = Self::default();
        {
            let mut state = stub.lock();
            state.activation = activation;
            state.reachable = reachable;
        }
        Arc::new(stub)
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The registered delegate, for firing events that carry no state.
    pub fn delegate(&self) -> Option<Arc<dyn ChannelDelegate>> {
        self.lock().delegate.clone()
    }

    fn notify(&self, f: impl FnOnce(&dyn ChannelDelegate)) {
        // cloned out so the delegate never runs under the stub's lock
        if let Some(delegate) = self.delegate() {
            f(delegate.as_ref());
        }
    }

    pub fn set_supported(&self, supported: bool) {
        self.lock().unsupported = !supported;
    }

    pub fn activate_calls(&self) -> usize {
        self.lock().activate_calls
    }

    pub fn set_activation_state(&self, activation: ActivationState) {
        self.lock().activation = activation;
        self.notify(|delegate| delegate.activation_did_change(activation, None));
    }

    pub fn fail_activation(&self, activation: ActivationState, err: ChannelError) {
        self.lock().activation = activation;
        self.notify(|delegate| delegate.activation_did_change(activation, Some(err)));
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
        self.notify(|delegate| delegate.reachability_did_change(reachable));
    }

    pub fn set_received_application_context(&self, context: Message) {
        self.lock().received_application_context = context.clone();
        self.notify(|delegate| delegate.did_receive_application_context(context));
    }

    pub fn fail_next_context_update(&self, err: ChannelError) {
        self.lock().context_error = Some(err);
    }

    pub fn pending_messages(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn pending_data(&self) -> usize {
        self.lock().data.len()
    }

    pub fn take_message(&self) -> Option<PendingSend<Message>> {
        self.lock().messages.pop_front()
    }

    pub fn take_data(&self) -> Option<PendingSend<Vec<u8>>> {
        self.lock().data.pop_front()
    }

    /// Every file transfer started so far, with its control.
    pub fn started_file_transfers(&self) -> Vec<(FileTransfer, Arc<StubTransfer>)> {
        self.lock().file_transfers.clone()
    }

    pub fn started_user_info_transfers(&self) -> Vec<(UserInfoTransfer, Arc<StubTransfer>)> {
        self.lock().user_info_transfers.clone()
    }

    /// Marks the transfer done and fires its finished event.
    pub fn finish_file_transfer(&self, transfer: &FileTransfer, error: Option<ChannelError>) {
        self.mark_finished(&transfer.handle);
        let transfer = transfer.clone();
        self.notify(|delegate| delegate.file_transfer_did_finish(transfer, error));
    }

    pub fn finish_user_info_transfer(
        &self,
        transfer: &UserInfoTransfer,
        error: Option<ChannelError>,
    ) {
        self.mark_finished(&transfer.handle);
        let transfer = transfer.clone();
        self.notify(|delegate| delegate.user_info_transfer_did_finish(transfer, error));
    }

    fn mark_finished(&self, handle: &TransferHandle) {
        let state = self.lock();
        let controls = state
            .file_transfers
            .iter()
            .map(|(transfer, control)| (&transfer.handle, control))
            .chain(state.user_info_transfers.iter().map(|(t, control)| (&t.handle, control)));
        for (candidate, control) in controls {
            if candidate == handle {
                control.finish();
            }
        }
    }
}

impl Channel for StubChannel {
    fn is_supported(&self) -> bool {
        !self.lock().unsupported
    }

    fn set_delegate(&self, delegate: Arc<dyn ChannelDelegate>) {
        self.lock().delegate = Some(delegate);
    }

    fn activate(&self) {
        self.lock().activate_calls += 1;
    }

    fn activation_state(&self) -> ActivationState {
        self.lock().activation
    }

    fn is_reachable(&self) -> bool {
        self.lock().reachable
    }

    fn outstanding_file_transfers(&self) -> Vec<FileTransfer> {
        self.lock()
            .file_transfers
            .iter()
            .filter(|(_, control)| control.is_transferring())
            .map(|(transfer, _)| transfer.clone())
            .collect()
    }

    fn outstanding_user_info_transfers(&self) -> Vec<UserInfoTransfer> {
        self.lock()
            .user_info_transfers
            .iter()
            .filter(|(_, control)| control.is_transferring())
            .map(|(transfer, _)| transfer.clone())
            .collect()
    }

    fn application_context(&self) -> Message {
        self.lock().application_context.clone()
    }

    fn received_application_context(&self) -> Message {
        self.lock().received_application_context.clone()
    }

    fn update_application_context(&self, context: Message) -> Result<(), ChannelError> {
        let mut state = self.lock();
        if let Some(err) = state.context_error.take() {
            return Err(err);
        }
        state.application_context = context;
        Ok(())
    }

    fn send_message(
        &self,
        message: Message,
        on_reply: ReplyHandler<Message>,
        on_error: ErrorHandler,
    ) {
        self.lock().messages.push_back(PendingSend {
            payload: message,
            on_reply: Some(on_reply),
            on_error,
        });
    }

    fn send_message_no_reply(&self, message: Message, on_error: ErrorHandler) {
        self.lock().messages.push_back(PendingSend { payload: message, on_reply: None, on_error });
    }

    fn send_data(&self, data: Vec<u8>, on_reply: ReplyHandler<Vec<u8>>, on_error: ErrorHandler) {
        self.lock().data.push_back(PendingSend {
            payload: data,
            on_reply: Some(on_reply),
            on_error,
        });
    }

    fn send_data_no_reply(&self, data: Vec<u8>, on_error: ErrorHandler) {
        self.lock().data.push_back(PendingSend { payload: data, on_reply: None, on_error });
    }

    fn transfer_file(&self, path: PathBuf, metadata: Option<Message>) -> FileTransfer {
        let control = Arc::new(StubTransfer::new(Some(Progress::new(0, 100))));
        let transfer = FileTransfer {
            handle: TransferHandle::new(control.clone()),
            file: SessionFile { path, metadata },
        };
        self.lock().file_transfers.push((transfer.clone(), control));
        transfer
    }

    fn transfer_user_info(&self, user_info: Message) -> UserInfoTransfer {
        let control = Arc::new(StubTransfer::new(None));
        let transfer =
            UserInfoTransfer { handle: TransferHandle::new(control.clone()), user_info };
        self.lock().user_info_transfers.push((transfer.clone(), control));
        transfer
    }
}
