//! Media Bridge Integration Tests
//!
//! Runs the bridge against the loopback pipeline with channel-backed
//! transports standing in for the platform's WebSocket.

use axum::extract::ws::Message;
use base64::{engine::general_purpose::STANDARD, Engine};
use callbridge::domain::pipeline::{CancelToken, SessionBinding};
use callbridge::domain::shared::CorrelationId;
use callbridge::infrastructure::media::{BridgeEnd, BridgeSummary, MediaSessionRegistry, MediaStreamBridge};
use callbridge::infrastructure::pipeline::LoopbackPipeline;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

type Inbound = UnboundedSender<Result<Message, axum::Error>>;

struct RunningSession {
    correlation_id: CorrelationId,
    cancel: CancelToken,
    sessions: Arc<MediaSessionRegistry>,
    inbound: Inbound,
    outbound: UnboundedReceiver<Message>,
    handle: JoinHandle<callbridge::Result<BridgeSummary>>,
}

fn start_session() -> RunningSession {
    let sessions = Arc::new(MediaSessionRegistry::new());
    let bridge = Arc::new(MediaStreamBridge::new(
        Arc::new(LoopbackPipeline::new()),
        sessions.clone(),
        50,
    ));

    let correlation_id = CorrelationId::new();
    let cancel = CancelToken::new();
    let binding = SessionBinding {
        correlation_id: correlation_id.clone(),
        destination_number: Some("+18005550100".to_string()),
        caller_id: Some("+14255550123".to_string()),
        cancel: cancel.clone(),
    };

    let (inbound, stream) = mpsc::unbounded::<Result<Message, axum::Error>>();
    let (sink, outbound) = mpsc::unbounded::<Message>();

    let handle = tokio::spawn(async move { bridge.run(binding, stream, sink).await });

    RunningSession {
        correlation_id,
        cancel,
        sessions,
        inbound,
        outbound,
        handle,
    }
}

fn send_text(inbound: &Inbound, value: Value) {
    inbound
        .unbounded_send(Ok(Message::Text(value.to_string())))
        .expect("bridge still reading");
}

fn audio_metadata(sample_rate: u32, channels: u16) -> Value {
    json!({
        "kind": "AudioMetadata",
        "audioMetadata": {
            "subscriptionId": "sub-1",
            "encoding": "PCM",
            "sampleRate": sample_rate,
            "channels": channels,
            "length": 640
        }
    })
}

fn audio_data(payload: &[u8]) -> Value {
    json!({
        "kind": "AudioData",
        "audioData": {
            "timestamp": "2026-01-05T10:00:00.000Z",
            "participantRawID": "4:+14255550123",
            "data": STANDARD.encode(payload),
            "silent": false
        }
    })
}

/// Next outbound frame, decoded back to PCM bytes
async fn next_outbound_pcm(outbound: &mut UnboundedReceiver<Message>) -> Vec<u8> {
    let message = tokio::time::timeout(Duration::from_secs(2), outbound.next())
        .await
        .expect("outbound frame in time")
        .expect("connection still open");

    let Message::Text(text) = message else {
        panic!("expected a text envelope, got {:?}", message);
    };
    let envelope: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(envelope["kind"], "AudioData");
    STANDARD
        .decode(envelope["audioData"]["data"].as_str().unwrap())
        .unwrap()
}

async fn finish(session: RunningSession) -> BridgeSummary {
    tokio::time::timeout(Duration::from_secs(2), session.handle)
        .await
        .expect("bridge finished in time")
        .expect("bridge task did not panic")
        .expect("bridge session ran")
}

async fn wait_until_registered(sessions: &MediaSessionRegistry, id: &CorrelationId) {
    for _ in 0..100 {
        if sessions.get(id).await.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("media session {} never registered", id);
}

#[tokio::test]
async fn test_caller_audio_echoes_back_in_20ms_frames() {
    let mut session = start_session();

    send_text(&session.inbound, audio_metadata(16_000, 1));
    let pcm: Vec<u8> = (0..1280u32).map(|i| (i % 251) as u8).collect();
    send_text(&session.inbound, audio_data(&pcm));

    let first = next_outbound_pcm(&mut session.outbound).await;
    let second = next_outbound_pcm(&mut session.outbound).await;
    assert_eq!(first.len(), 640);
    assert_eq!(second.len(), 640);
    assert_eq!(first, pcm[..640]);
    assert_eq!(second, pcm[640..]);

    session
        .inbound
        .unbounded_send(Ok(Message::Close(None)))
        .unwrap();
    let summary = finish(session).await;

    assert_eq!(summary.end, BridgeEnd::PeerClosed);
    assert_eq!(summary.frames_in, 1);
    assert_eq!(summary.frames_out, 2);
    assert_eq!(summary.decode_failures, 0);
}

#[tokio::test]
async fn test_narrowband_audio_is_resampled_for_playback() {
    let mut session = start_session();

    // Two 20 ms frames at 8 kHz mono; the resampler holds back one sample
    // between them, so only the second completes an outbound frame
    send_text(&session.inbound, audio_metadata(8_000, 1));
    send_text(&session.inbound, audio_data(&[0u8; 320]));
    send_text(&session.inbound, audio_data(&[0u8; 320]));

    let frame = next_outbound_pcm(&mut session.outbound).await;
    assert_eq!(frame.len(), 640);

    session.inbound.close_channel();
    let summary = finish(session).await;
    assert_eq!(summary.end, BridgeEnd::PeerClosed);
}

#[tokio::test]
async fn test_peer_close_cancels_pipeline_and_unregisters() {
    let session = start_session();
    wait_until_registered(&session.sessions, &session.correlation_id).await;
    assert_eq!(session.sessions.active_count().await, 1);

    session.inbound.close_channel();

    let cancel = session.cancel.clone();
    let sessions = session.sessions.clone();
    let correlation_id = session.correlation_id.clone();
    let summary = finish(session).await;

    assert_eq!(summary.end, BridgeEnd::PeerClosed);
    assert!(cancel.is_cancelled());
    assert!(sessions.get(&correlation_id).await.is_none());
    assert_eq!(sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let mut session = start_session();

    session
        .inbound
        .unbounded_send(Ok(Message::Text("{not json".to_string())))
        .unwrap();
    send_text(
        &session.inbound,
        json!({"kind": "AudioData", "audioData": {"data": "%%% not base64 %%%"}}),
    );
    send_text(&session.inbound, audio_data(&[7u8; 640]));

    let frame = next_outbound_pcm(&mut session.outbound).await;
    assert_eq!(frame, vec![7u8; 640]);

    session.inbound.close_channel();
    let summary = finish(session).await;

    assert_eq!(summary.end, BridgeEnd::PeerClosed);
    assert_eq!(summary.decode_failures, 2);
    assert_eq!(summary.frames_in, 1);
}

#[tokio::test]
async fn test_non_audio_messages_are_ignored() {
    let session = start_session();

    send_text(
        &session.inbound,
        json!({"kind": "DtmfData", "dtmfData": {"data": "5"}}),
    );
    session
        .inbound
        .unbounded_send(Ok(Message::Ping(vec![1, 2, 3])))
        .unwrap();

    session.inbound.close_channel();
    let summary = finish(session).await;

    assert_eq!(summary.end, BridgeEnd::PeerClosed);
    assert_eq!(summary.frames_in, 0);
    assert_eq!(summary.decode_failures, 0);
}

#[tokio::test]
async fn test_registry_cancel_ends_session() {
    let mut session = start_session();
    wait_until_registered(&session.sessions, &session.correlation_id).await;

    assert!(session.sessions.cancel(&session.correlation_id).await);

    // The bridge closes its side of the connection
    let closed = tokio::time::timeout(Duration::from_secs(2), session.outbound.next())
        .await
        .expect("connection closed in time");
    assert!(closed.is_none());

    let summary = finish(session).await;
    assert_eq!(summary.end, BridgeEnd::Cancelled);
}

#[tokio::test]
async fn test_transport_error_ends_session() {
    let session = start_session();

    session
        .inbound
        .unbounded_send(Err(axum::Error::new("connection reset")))
        .unwrap();

    let summary = finish(session).await;
    assert!(matches!(summary.end, BridgeEnd::TransportError(_)));
}
