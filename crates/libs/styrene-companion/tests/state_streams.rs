use futures::{FutureExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use styrene_companion::{
    ActivationState, Channel, CompanionSession, SessionConfig, StubChannel,
};

fn session_with(stub: &Arc<StubChannel>, config: SessionConfig) -> CompanionSession {
    let _ = env_logger::builder().is_test(true).try_init();
    CompanionSession::new(stub.clone(), config).expect("session")
}

fn session(stub: &Arc<StubChannel>) -> CompanionSession {
    session_with(stub, SessionConfig::default())
}

#[tokio::test]
async fn activation_state_starts_with_the_state_at_subscription() {
    let stub = StubChannel::with_state(ActivationState::NotActivated, false);
    let session = session(&stub);
    stub.set_activation_state(ActivationState::Inactive);
    stub.set_activation_state(ActivationState::Activated);

    let mut states = Box::pin(session.activation_state());
    assert_eq!(states.next().await, Some(ActivationState::Activated));
    assert!(states.next().now_or_never().is_none());

    stub.set_activation_state(ActivationState::Inactive);
    assert_eq!(states.next().await, Some(ActivationState::Inactive));
}

#[tokio::test]
async fn late_subscribers_only_see_their_own_snapshot() {
    let stub = StubChannel::with_state(ActivationState::Inactive, false);
    let session = session(&stub);

    let mut early = Box::pin(session.activation_state());
    stub.set_activation_state(ActivationState::Activated);
    let mut late = Box::pin(session.activation_state());
    stub.set_activation_state(ActivationState::NotActivated);

    assert_eq!(early.next().await, Some(ActivationState::Inactive));
    assert_eq!(early.next().await, Some(ActivationState::Activated));
    assert_eq!(early.next().await, Some(ActivationState::NotActivated));

    assert_eq!(late.next().await, Some(ActivationState::Activated));
    assert_eq!(late.next().await, Some(ActivationState::NotActivated));
    assert!(late.next().now_or_never().is_none());
}

#[tokio::test]
async fn reachability_replays_then_follows_changes() {
    let stub = StubChannel::with_state(ActivationState::Activated, true);
    let session = session(&stub);

    let mut reachable = Box::pin(session.reachability());
    assert_eq!(reachable.next().await, Some(true));

    stub.set_reachable(false);
    stub.set_reachable(true);
    assert_eq!(reachable.next().await, Some(false));
    assert_eq!(reachable.next().await, Some(true));
    assert!(reachable.next().now_or_never().is_none());
}

#[tokio::test]
async fn lagged_state_stream_resyncs_from_the_channel() {
    let stub = StubChannel::with_state(ActivationState::NotActivated, false);
    let config = SessionConfig { event_capacity: 2, ..SessionConfig::default() };
    let session = session_with(&stub, config);

    let mut states = Box::pin(session.activation_state());
    stub.set_activation_state(ActivationState::Inactive);
    stub.set_activation_state(ActivationState::Activated);
    stub.set_activation_state(ActivationState::Inactive);
    stub.set_activation_state(ActivationState::Activated);

    assert_eq!(states.next().await, Some(ActivationState::NotActivated));
    // lag surfaces as a fresh read of the channel
    assert_eq!(states.next().await, Some(ActivationState::Activated));
    assert_eq!(states.next().await, Some(ActivationState::Inactive));
    assert_eq!(states.next().await, Some(ActivationState::Activated));
}

#[tokio::test]
async fn outstanding_file_transfers_change_only_on_finished_events() {
    let stub = StubChannel::with_state(ActivationState::Activated, true);
    let session = session(&stub);
    let first = stub.transfer_file(PathBuf::from("/tmp/a.bin"), None);
    let second = stub.transfer_file(PathBuf::from("/tmp/b.bin"), None);

    let mut outstanding = Box::pin(session.outstanding_file_transfers());
    assert_eq!(outstanding.next().await, Some(vec![first.clone(), second.clone()]));
    assert!(outstanding.next().now_or_never().is_none());

    stub.finish_file_transfer(&first, None);
    assert_eq!(outstanding.next().await, Some(vec![second.clone()]));

    stub.finish_file_transfer(&second, None);
    assert_eq!(outstanding.next().await, Some(vec![]));
    assert!(outstanding.next().now_or_never().is_none());
}

#[tokio::test]
async fn outstanding_transfers_still_refresh_for_cancelled_trackers() {
    let stub = StubChannel::with_state(ActivationState::Activated, true);
    let session = session(&stub);

    let tracked = session.transfer_file(PathBuf::from("/tmp/c.bin"), None);
    let mut outstanding = Box::pin(session.outstanding_file_transfers());
    assert_eq!(outstanding.next().await.map(|transfers| transfers.len()), Some(1));

    drop(tracked);
    let (transfer, control) = stub.started_file_transfers().remove(0);
    assert_eq!(control.cancel_count(), 1);

    // the channel reports the cancelled transfer as finished anyway
    stub.finish_file_transfer(&transfer, None);
    assert_eq!(outstanding.next().await, Some(vec![]));
    assert_eq!(control.cancel_count(), 1);
}

#[tokio::test]
async fn outstanding_user_info_transfers_follow_the_channel() {
    let stub = StubChannel::with_state(ActivationState::Activated, true);
    let session = session(&stub);
    let transfer = stub.transfer_user_info(styrene_companion::Message::new());

    let mut outstanding = Box::pin(session.outstanding_user_info_transfers());
    assert_eq!(outstanding.next().await, Some(vec![transfer.clone()]));

    stub.finish_user_info_transfer(&transfer, None);
    assert_eq!(outstanding.next().await, Some(vec![]));
}
