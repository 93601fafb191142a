use futures::{FutureExt, StreamExt};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use styrene_companion::{
    ActivationState, ChannelError, CompanionSession, ConfigError, Message, ReplyCallback,
    SessionConfig, SessionError, SessionFile, StubChannel,
};
use tempfile::NamedTempFile;

fn session(stub: &Arc<StubChannel>) -> CompanionSession {
    let _ = env_logger::builder().is_test(true).try_init();
    CompanionSession::new(stub.clone(), SessionConfig::default()).expect("session")
}

fn message(value: serde_json::Value) -> Message {
    value.as_object().cloned().expect("object payload")
}

#[test]
fn activate_forwards_to_a_supported_channel() {
    let stub = StubChannel::new();
    let session = session(&stub);
    assert_eq!(stub.activate_calls(), 0);

    session.activate().expect("activate");
    session.activate().expect("activate again");
    assert_eq!(stub.activate_calls(), 2);
}

#[test]
fn activate_reports_unsupported_channels() {
    let stub = StubChannel::new();
    stub.set_supported(false);
    let session = session(&stub);

    assert_eq!(session.activate(), Err(SessionError::Unsupported));
    assert_eq!(stub.activate_calls(), 0);
}

#[test]
fn auto_activate_requests_activation_on_creation() {
    let stub = StubChannel::new();
    let config = SessionConfig { auto_activate: true, ..SessionConfig::default() };
    let _session = CompanionSession::new(stub.clone(), config).expect("session");
    assert_eq!(stub.activate_calls(), 1);

    let unsupported = StubChannel::new();
    unsupported.set_supported(false);
    let config = SessionConfig { auto_activate: true, ..SessionConfig::default() };
    let result = CompanionSession::new(unsupported.clone(), config);
    assert!(matches!(result, Err(SessionError::Unsupported)));
}

#[test]
fn invalid_config_is_rejected_before_touching_the_channel() {
    let stub = StubChannel::new();
    let config = SessionConfig { event_capacity: 0, auto_activate: true };
    let result = CompanionSession::new(stub.clone(), config);
    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    assert_eq!(stub.activate_calls(), 0);
    assert!(stub.delegate().is_none());
}

#[test]
fn loads_config_from_file() {
    let file = NamedTempFile::new().expect("temp file");
    fs::write(file.path(), "event_capacity = 16\nauto_activate = true\n").expect("write");

    let cfg = SessionConfig::from_path(file.path()).expect("load");
    assert_eq!(cfg, SessionConfig { event_capacity: 16, auto_activate: true });
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = SessionConfig::from_path(dir.path().join("absent.toml")).expect_err("must fail");
    assert!(matches!(err, ConfigError::Io(_)));
}

#[tokio::test]
async fn activation_changes_carry_channel_errors() {
    let stub = StubChannel::new();
    let session = session(&stub);
    let mut changes = Box::pin(session.activation_changes());

    let err = ChannelError::new(7002, "activation failed");
    stub.fail_activation(ActivationState::NotActivated, err.clone());
    stub.set_activation_state(ActivationState::Activated);

    let first = changes.next().await.expect("first change");
    assert_eq!(first.state, ActivationState::NotActivated);
    assert_eq!(first.error, Some(err));
    let second = changes.next().await.expect("second change");
    assert_eq!(second.state, ActivationState::Activated);
    assert_eq!(second.error, None);
}

#[tokio::test]
async fn inbound_streams_pass_payloads_through() {
    let stub = StubChannel::with_state(ActivationState::Activated, true);
    let session = session(&stub);
    let delegate = stub.delegate().expect("bus registered as delegate");

    // nobody listening yet: dropped
    delegate.did_receive_message(message(json!({ "early": true })));

    let mut messages = Box::pin(session.messages());
    let mut data = Box::pin(session.data());
    let mut user_info = Box::pin(session.received_user_info());
    let mut files = Box::pin(session.received_files());

    delegate.did_receive_message(message(json!({ "late": true })));
    delegate.did_receive_data(vec![4, 2]);
    delegate.did_receive_user_info(message(json!({ "steps": 1200 })));
    let file = SessionFile { path: PathBuf::from("/inbox/photo.jpg"), metadata: None };
    delegate.did_receive_file(file.clone());

    assert_eq!(messages.next().await, Some(message(json!({ "late": true }))));
    assert!(messages.next().now_or_never().is_none());
    assert_eq!(data.next().await, Some(vec![4, 2]));
    assert_eq!(user_info.next().await, Some(message(json!({ "steps": 1200 }))));
    assert_eq!(files.next().await, Some(file));
}

#[tokio::test]
async fn inbound_requests_reply_through_the_channel_callback() {
    let stub = StubChannel::with_state(ActivationState::Activated, true);
    let session = session(&stub);
    let delegate = stub.delegate().expect("bus registered as delegate");

    let replies: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = replies.clone();
    let reply = ReplyCallback::new(move |reply: Message| {
        sink.lock().expect("replies lock").push(reply);
    });

    let mut requests = Box::pin(session.messages_with_reply());
    let mut data_requests = Box::pin(session.data_with_reply());
    delegate.did_receive_message_with_reply(message(json!({ "q": "status" })), reply);
    delegate.did_receive_data_with_reply(vec![1], ReplyCallback::new(|_reply: Vec<u8>| {}));

    let request = requests.next().await.expect("request");
    assert_eq!(request.payload, message(json!({ "q": "status" })));
    request.respond(message(json!({ "status": "ok" })));
    assert_eq!(*replies.lock().expect("replies lock"), vec![message(json!({ "status": "ok" }))]);

    let data_request = data_requests.next().await.expect("data request");
    assert_eq!(data_request.payload, vec![1]);
}

#[tokio::test]
async fn application_context_requires_activation() {
    let stub = StubChannel::with_state(ActivationState::Inactive, false);
    let session = session(&stub);
    let context = message(json!({ "theme": "dark" }));

    assert_eq!(
        session.update_application_context(context.clone()),
        Err(SessionError::SessionNotActivated)
    );

    stub.set_activation_state(ActivationState::Activated);
    session.update_application_context(context.clone()).expect("update while unreachable");
    assert_eq!(session.application_context(), context);

    let err = ChannelError::new(7010, "payload too large");
    stub.fail_next_context_update(err.clone());
    assert_eq!(
        session.update_application_context(Message::new()),
        Err(SessionError::Transport(err))
    );
    assert_eq!(session.application_context(), context);
}

#[tokio::test]
async fn received_application_context_streams_and_snapshots() {
    let stub = StubChannel::with_state(ActivationState::Activated, true);
    let session = session(&stub);
    let mut contexts = Box::pin(session.received_application_context());

    let context = message(json!({ "units": "metric" }));
    stub.set_received_application_context(context.clone());

    assert_eq!(contexts.next().await, Some(context.clone()));
    assert_eq!(session.received_application_context_snapshot(), context);
}
