use std::pin::Pin;

use futures::StreamExt;

use super::*;

type BoxedReachability = Pin<Box<dyn Stream<Item = bool> + Send>>;

async fn next_reachable(inner: &mut Option<BoxedReachability>) -> Option<bool> {
    match inner {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

impl CompanionSession {
    /// Resolves once the session is activated and the counterpart reachable.
    ///
    /// Without `wait_for_session` the current state decides immediately.
    /// With it, every activation re-subscribes to reachability from scratch,
    /// and leaving the activated state drops the reachability wait, so a
    /// stale `true` never resolves the gate. Dropping the future cancels the
    /// wait.
    pub async fn await_ready(&self, wait_for_session: bool) -> Result<(), SessionError> {
        if !wait_for_session {
            return self.check_ready();
        }

        let mut activation = Box::pin(self.activation_state());
        let mut reachability: Option<BoxedReachability> = None;
        loop {
            tokio::select! {
                biased;
                state = activation.next() => match state {
                    Some(ActivationState::Activated) => {
                        reachability = Some(Box::pin(self.reachability()));
                    }
                    Some(state) => {
                        log::trace!("session: waiting for activation, currently {state:?}");
                        reachability = None;
                    }
                    None => return Err(SessionError::Closed),
                },
                reachable = next_reachable(&mut reachability) => match reachable {
                    Some(true) if self.check_ready().is_ok() => {
                        log::debug!("session: ready");
                        return Ok(());
                    }
                    Some(_) => {}
                    None => return Err(SessionError::Closed),
                },
            }
        }
    }

    fn check_ready(&self) -> Result<(), SessionError> {
        if !self.channel.activation_state().is_activated() {
            return Err(SessionError::SessionNotActivated);
        }
        if !self.channel.is_reachable() {
            return Err(SessionError::CounterpartNotReachable);
        }
        Ok(())
    }
}
