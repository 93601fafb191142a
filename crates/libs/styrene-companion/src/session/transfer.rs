use std::future::Future;
use std::path::PathBuf;

use tokio::sync::broadcast::error::TryRecvError;

use super::*;

/// One tracked transfer: its handle plus a private subscription to the shared
/// finished stream of its kind.
///
/// Retired on the first event carrying this handle. Dropped while still armed,
/// it first drains events already delivered to it; only if none of them is
/// its completion does it unsubscribe and cancel the transfer on the channel.
struct PendingTransfer<S: TransferSubject + Clone> {
    handle: TransferHandle,
    finished: Option<broadcast::Receiver<TransferFinished<S>>>,
    armed: bool,
}

impl<S> PendingTransfer<S>
where
    S: TransferSubject + Clone + Send + 'static,
{
    fn new(handle: TransferHandle, finished: broadcast::Receiver<TransferFinished<S>>) -> Self {
        Self { handle, finished: Some(finished), armed: true }
    }

    async fn finished(&mut self) -> Result<(), SessionError> {
        loop {
            let Some(rx) = self.finished.as_mut() else {
                return Err(SessionError::Closed);
            };
            let received = rx.recv().await;
            match received {
                Ok(event) if event.subject.handle() == &self.handle => {
                    self.retire();
                    return event.outcome.map_err(SessionError::from);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    if self.handle.is_transferring() {
                        log::warn!(
                            "session: transfer {:?} lagged by {skipped} events, still running",
                            self.handle
                        );
                        continue;
                    }
                    log::warn!(
                        "session: completion of {:?} lost to lag of {skipped} events",
                        self.handle
                    );
                    self.retire();
                    return Err(SessionError::Lagged { skipped });
                }
                Err(RecvError::Closed) => return Err(SessionError::Closed),
            }
        }
    }
}

impl<S: TransferSubject + Clone> PendingTransfer<S> {
    fn retire(&mut self) {
        self.armed = false;
        self.finished = None;
    }

    /// True when a completion for this handle already sits in the buffer.
    fn completion_delivered(&mut self) -> bool {
        let Some(rx) = self.finished.as_mut() else {
            return false;
        };
        loop {
            match rx.try_recv() {
                Ok(event) if event.subject.handle() == &self.handle => return true,
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return false,
            }
        }
    }
}

impl<S: TransferSubject + Clone> Drop for PendingTransfer<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.completion_delivered() {
            log::trace!("session: transfer {:?} finished before it was dropped", self.handle);
            self.retire();
            return;
        }
        // unsubscribe before cancelling so a racing finished event is never seen
        self.finished.take();
        log::debug!("session: transfer {:?} abandoned, cancelling", self.handle);
        self.handle.cancel();
    }
}

impl CompanionSession {
    /// Starts a file transfer and tracks it to completion.
    ///
    /// The transfer starts immediately, not on first poll. The stream yields
    /// one progress snapshot, then ends on success or yields the transfer's
    /// error. Dropping the stream before that cancels the transfer.
    pub fn transfer_file(
        &self,
        path: PathBuf,
        metadata: Option<Message>,
    ) -> impl Stream<Item = Result<Progress, SessionError>> + Send + 'static {
        let finished = self.bus.file_transfers_finished();
        let transfer = self.channel.transfer_file(path, metadata);
        log::debug!(
            "session: started file transfer {:?} for {}",
            transfer.handle,
            transfer.file.path.display()
        );
        let mut pending = PendingTransfer::new(transfer.handle.clone(), finished);
        stream! {
            yield Ok(transfer.progress());
            if let Err(err) = pending.finished().await {
                yield Err(err);
            }
        }
    }

    /// Starts a user-info transfer; resolves when the channel reports it
    /// delivered. Dropping the future first cancels the transfer.
    pub fn transfer_user_info(
        &self,
        user_info: Message,
    ) -> impl Future<Output = Result<(), SessionError>> + Send + 'static {
        let finished = self.bus.user_info_transfers_finished();
        let transfer = self.channel.transfer_user_info(user_info);
        log::debug!("session: started user info transfer {:?}", transfer.handle);
        let mut pending = PendingTransfer::new(transfer.handle, finished);
        async move { pending.finished().await }
    }
}
