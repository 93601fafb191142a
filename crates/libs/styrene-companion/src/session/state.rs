use super::*;

/// Snapshot first, then live values. A lag re-reads the snapshot since the
/// missed values are superseded by the current one anyway.
fn replay_then_live<E, T>(
    kind: &'static str,
    mut rx: broadcast::Receiver<E>,
    read: impl Fn() -> T + Send + 'static,
    map: impl Fn(E) -> T + Send + 'static,
) -> impl Stream<Item = T> + Send + 'static
where
    E: Clone + Send + 'static,
    T: Send + 'static,
{
    // subscribed before reading, so no transition falls between the two
    let initial = read();
    stream! {
        yield initial;
        loop {
            match rx.recv().await {
                Ok(event) => yield map(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("session: {kind} state lagged by {skipped}, re-reading channel");
                    yield read();
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

impl CompanionSession {
    /// Activation state at subscription time, then every change.
    pub fn activation_state(&self) -> impl Stream<Item = ActivationState> + Send + 'static {
        let rx = self.bus.activation();
        let channel = Arc::clone(&self.channel);
        replay_then_live(
            "activation",
            rx,
            move || channel.activation_state(),
            |event: ActivationChanged| event.state,
        )
    }

    /// Reachability at subscription time, then every change.
    pub fn reachability(&self) -> impl Stream<Item = bool> + Send + 'static {
        let rx = self.bus.reachability();
        let channel = Arc::clone(&self.channel);
        replay_then_live("reachability", rx, move || channel.is_reachable(), |reachable| reachable)
    }

    /// The channel's outstanding file transfers, re-read on every file
    /// finished event (including events for transfers nobody tracks anymore).
    pub fn outstanding_file_transfers(
        &self,
    ) -> impl Stream<Item = Vec<FileTransfer>> + Send + 'static {
        let rx = self.bus.file_transfers_finished();
        let read = Arc::clone(&self.channel);
        let reread = Arc::clone(&self.channel);
        replay_then_live(
            "file-transfers",
            rx,
            move || read.outstanding_file_transfers(),
            move |_finished| reread.outstanding_file_transfers(),
        )
    }

    pub fn outstanding_user_info_transfers(
        &self,
    ) -> impl Stream<Item = Vec<UserInfoTransfer>> + Send + 'static {
        let rx = self.bus.user_info_transfers_finished();
        let read = Arc::clone(&self.channel);
        let reread = Arc::clone(&self.channel);
        replay_then_live(
            "user-info-transfers",
            rx,
            move || read.outstanding_user_info_transfers(),
            move |_finished| reread.outstanding_user_info_transfers(),
        )
    }
}
