//! Session lifecycle against the in-memory transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bridge::protocol::{CameraQuery, CameraResponse, DepartmentListQuery, EnterPrepPhase, MoveCameraCommand};
use bridge::{Bridge, BridgeOptions, ConnectionState, Error, FakeConnection, FakeTransportFactory, Listener, MessageType};
use parking_lot::Mutex;
use serde_json::json;

type Log = Arc<Mutex<Vec<String>>>;

fn fake_bridge() -> (Bridge, FakeTransportFactory) {
	let factory = FakeTransportFactory::new();
	let counter = Arc::new(AtomicUsize::new(0));
	let options = BridgeOptions::default()
		.transport_factory(factory.clone())
		.id_generator(move || format!("msg-{}", counter.fetch_add(1, Ordering::SeqCst)));
	(Bridge::with_options(options), factory)
}

/// Records lifecycle events in order.
fn record_lifecycle(bridge: &Bridge) -> Log {
	let log: Log = Arc::default();
	let l = Arc::clone(&log);
	bridge.on(Listener::connecting(move || l.lock().push("connecting".to_string())));
	let l = Arc::clone(&log);
	bridge.on(Listener::connected(move || l.lock().push("connected".to_string())));
	let l = Arc::clone(&log);
	bridge.on(Listener::disconnected(move |reconnecting| l.lock().push(format!("disconnected({reconnecting})"))));
	log
}

fn record_messages(bridge: &Bridge) -> Log {
	let log: Log = Arc::default();
	let l = Arc::clone(&log);
	bridge.on(Listener::message(move |envelope| l.lock().push(envelope.message_type.to_string())));
	log
}

async fn eventually(mut check: impl FnMut() -> bool) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while !check() {
			tokio::time::sleep(Duration::from_millis(2)).await;
		}
	})
	.await
	.expect("condition was not reached in time");
}

async fn ready_bridge() -> (Bridge, FakeTransportFactory, FakeConnection) {
	let (bridge, factory) = fake_bridge();
	bridge.connect().unwrap();
	let conn = factory.latest().unwrap();
	conn.open();
	conn.inject_ready("abc");
	eventually(|| bridge.is_ready()).await;
	(bridge, factory, conn)
}

fn sent_ids(conn: &FakeConnection) -> Vec<String> {
	conn.take_sent().iter().map(|frame| frame["id"].as_str().unwrap_or_default().to_string()).collect()
}

#[tokio::test]
async fn queued_sends_flush_in_order_before_connected() {
	let (bridge, factory) = fake_bridge();
	let lifecycle = record_lifecycle(&bridge);
	bridge.connect().unwrap();
	let conn = factory.latest().unwrap();
	assert_eq!(conn.url(), "ws://localhost:8787");

	let written_at_connected = Arc::new(AtomicUsize::new(usize::MAX));
	let observed = Arc::clone(&written_at_connected);
	let watcher = conn.clone();
	bridge.on(Listener::connected(move || observed.store(watcher.sent_count(), Ordering::SeqCst)));

	bridge.send(&CameraQuery {}).unwrap();
	bridge.send(&DepartmentListQuery {}).unwrap();
	bridge.send(&MoveCameraCommand { x: 1.0, y: 2.0, zoom: 3.0 }).unwrap();
	assert_eq!(bridge.queued_messages(), 3);

	conn.open();
	conn.inject_ready("abc");
	eventually(|| bridge.is_ready()).await;

	assert_eq!(written_at_connected.load(Ordering::SeqCst), 3);
	let frames = conn.take_sent();
	let types: Vec<_> = frames.iter().map(|frame| frame["type"].as_str().unwrap_or_default()).collect();
	assert_eq!(types, ["CameraQuery", "DepartmentListQuery", "MoveCameraCommand"]);
	assert_eq!(bridge.queued_messages(), 0);
	assert_eq!(*lifecycle.lock(), ["connecting", "connected"]);
}

#[tokio::test]
async fn open_socket_without_handshake_is_not_ready() {
	let (bridge, factory) = fake_bridge();
	bridge.connect().unwrap();
	let conn = factory.latest().unwrap();
	conn.open();
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert!(!bridge.is_ready());
	assert!(bridge.is_connecting());
	assert_eq!(bridge.client_id(), None);

	bridge.send(&CameraQuery {}).unwrap();
	assert_eq!(conn.sent_count(), 0);
	assert_eq!(bridge.queued_messages(), 1);
}

#[tokio::test]
async fn messages_after_ready_carry_the_session_id() {
	let (bridge, _factory, conn) = ready_bridge().await;
	assert_eq!(bridge.client_id().as_deref(), Some("abc"));

	bridge.send(&CameraQuery {}).unwrap();
	let frames = conn.take_sent();
	assert_eq!(frames.len(), 1);
	assert_eq!(frames[0]["clientID"], "abc");
	assert_eq!(frames[0]["id"], "msg-0");
}

#[tokio::test]
async fn request_resolves_with_typed_reply() {
	let (bridge, _factory, conn) = ready_bridge().await;

	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.request(&CameraQuery {}).await }
	});
	eventually(|| conn.sent_count() == 1).await;
	let id = sent_ids(&conn).remove(0);

	conn.inject_reply("abc", &id, "CameraResponse", json!({"x": 1.5, "y": -2.0, "zoom": 10.0}));
	let camera = task.await.unwrap().unwrap();

	assert_eq!(camera, CameraResponse { x: 1.5, y: -2.0, zoom: 10.0 });
	assert_eq!(bridge.pending_replies(), 0);
}

#[tokio::test]
async fn reply_is_also_published_as_message() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let messages = record_messages(&bridge);

	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.send_and_wait_for_reply(&CameraQuery {}, None).await }
	});
	eventually(|| conn.sent_count() == 1).await;
	let id = sent_ids(&conn).remove(0);
	conn.inject_reply("abc", &id, "CameraResponse", json!({"x": 0, "y": 0, "zoom": 1}));

	let reply = task.await.unwrap().unwrap();
	assert_eq!(reply.reply_to.as_deref(), Some(id.as_str()));
	eventually(|| !messages.lock().is_empty()).await;
	assert_eq!(*messages.lock(), ["CameraResponse"]);
}

#[tokio::test(start_paused = true)]
async fn reply_timeout_clears_pending_entry() {
	let (bridge, _factory, _conn) = ready_bridge().await;

	let result = bridge.send_raw_and_wait_for_reply(MessageType::CameraQuery, json!({}), Some(Duration::from_millis(100))).await;

	assert!(matches!(result, Err(Error::Timeout)));
	assert_eq!(bridge.pending_replies(), 0);
}

#[tokio::test(start_paused = true)]
async fn late_reply_after_timeout_is_not_dispatched() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let messages = record_messages(&bridge);

	let result = bridge.send_raw_and_wait_for_reply(MessageType::CameraQuery, json!({}), Some(Duration::from_millis(50))).await;
	assert!(result.unwrap_err().is_timeout());

	let id = sent_ids(&conn).remove(0);
	conn.inject_reply("abc", &id, "CameraResponse", json!({"x": 0, "y": 0, "zoom": 1}));
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert!(messages.lock().is_empty());
	assert!(bridge.is_ready());
}

#[tokio::test]
async fn error_reply_rejects_with_remote_text() {
	let (bridge, _factory, conn) = ready_bridge().await;

	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.request(&CameraQuery {}).await }
	});
	eventually(|| conn.sent_count() == 1).await;
	let id = sent_ids(&conn).remove(0);
	conn.inject_error("abc", &id, "camera is locked");

	match task.await.unwrap() {
		Err(Error::Remote(text)) => assert_eq!(text, "camera is locked"),
		other => panic!("expected remote error, got {other:?}"),
	}
}

#[tokio::test]
async fn transport_close_rejects_pending_requests() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let lifecycle = record_lifecycle(&bridge);

	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.request(&CameraQuery {}).await }
	});
	eventually(|| bridge.pending_replies() == 1).await;
	conn.close_remote(1006, "");

	assert!(matches!(task.await.unwrap(), Err(Error::ConnectionClosed)));
	assert_eq!(bridge.state(), ConnectionState::Disconnected);
	assert_eq!(bridge.client_id(), None);
	assert_eq!(*lifecycle.lock(), ["disconnected(false)"]);
}

#[tokio::test]
async fn reconnect_rejects_pending_and_restarts() {
	let (bridge, factory) = fake_bridge();
	let lifecycle = record_lifecycle(&bridge);
	bridge.connect().unwrap();
	let first = factory.latest().unwrap();
	first.open();
	first.inject_ready("abc");
	eventually(|| bridge.is_ready()).await;

	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.request(&CameraQuery {}).await }
	});
	eventually(|| bridge.pending_replies() == 1).await;
	bridge.connect().unwrap();

	assert!(matches!(task.await.unwrap(), Err(Error::ConnectionClosed)));
	assert_eq!(*lifecycle.lock(), ["connecting", "connected", "disconnected(true)", "connecting"]);
	assert_eq!(factory.opened(), 2);

	// the old transport's close event must not tear down the new session
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(bridge.state(), ConnectionState::Connecting);
	assert_eq!(lifecycle.lock().len(), 4);

	let second = factory.latest().unwrap();
	second.open();
	second.inject_ready("def");
	eventually(|| bridge.is_ready()).await;
	assert_eq!(bridge.client_id().as_deref(), Some("def"));
}

#[tokio::test]
async fn stale_transport_events_are_ignored() {
	let (bridge, factory) = fake_bridge();
	bridge.connect().unwrap();
	let first = factory.latest().unwrap();
	bridge.connect().unwrap();
	let second = factory.latest().unwrap();
	let lifecycle = record_lifecycle(&bridge);

	first.inject_ready("old");
	first.close_remote(1001, "going away");
	second.open();
	second.inject_ready("new");
	eventually(|| bridge.is_ready()).await;

	assert_eq!(bridge.client_id().as_deref(), Some("new"));
	assert_eq!(*lifecycle.lock(), ["connected"]);
}

#[tokio::test]
async fn queued_request_rejected_on_close_is_not_resent() {
	let (bridge, factory) = fake_bridge();
	bridge.connect().unwrap();
	let first = factory.latest().unwrap();

	let fire_and_forget = bridge.send(&MoveCameraCommand { x: 4.0, y: 5.0, zoom: 6.0 }).unwrap();
	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.request(&CameraQuery {}).await }
	});
	eventually(|| bridge.queued_messages() == 2).await;

	first.close_remote(1006, "");
	assert!(matches!(task.await.unwrap(), Err(Error::ConnectionClosed)));
	assert_eq!(bridge.queued_messages(), 1);

	bridge.connect().unwrap();
	let second = factory.latest().unwrap();
	second.open();
	second.inject_ready("abc");
	eventually(|| bridge.is_ready()).await;

	assert_eq!(sent_ids(&second), [fire_and_forget.id]);
}

#[tokio::test]
async fn disconnect_emits_final_disconnected() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let lifecycle = record_lifecycle(&bridge);

	bridge.disconnect();
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert_eq!(bridge.state(), ConnectionState::Disconnected);
	assert_eq!(conn.ready_state(), bridge::ReadyState::Closed);
	assert_eq!(*lifecycle.lock(), ["disconnected(false)"]);
}

#[tokio::test]
async fn binary_and_malformed_frames_are_ignored() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let messages = record_messages(&bridge);

	conn.inject_binary(vec![1, 2, 3]);
	conn.inject_text("{ not json");
	conn.inject_json(json!({"id": "1", "when": "", "clientID": "abc", "type": "Teleport"}));
	conn.inject_json(json!({"id": "2", "when": "", "clientID": "abc", "type": "ExitManagePhase"}));
	eventually(|| !messages.lock().is_empty()).await;

	assert_eq!(*messages.lock(), ["ExitManagePhase"]);
	assert!(bridge.is_ready());
}

#[tokio::test]
async fn inbound_events_decode_to_typed_payloads() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let received = Arc::new(Mutex::new(None));
	let slot = Arc::clone(&received);
	bridge.on(Listener::message(move |envelope| {
		if envelope.is::<EnterPrepPhase>() {
			*slot.lock() = envelope.decode::<EnterPrepPhase>().ok();
		}
	}));

	conn.inject_json(json!({"id": "e1", "when": "2024-05-01T12:00:00.000Z", "clientID": "abc", "type": "EnterPrepPhase", "day": 12, "lobPoints": 40}));
	eventually(|| received.lock().is_some()).await;

	assert_eq!(*received.lock(), Some(EnterPrepPhase { day: 12, lob_points: 40 }));
}

#[tokio::test]
async fn session_mismatch_drops_message() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let messages = record_messages(&bridge);

	conn.inject_json(json!({"id": "x", "when": "", "clientID": "intruder", "type": "ExitManagePhase"}));
	conn.inject_json(json!({"id": "y", "when": "", "clientID": "", "type": "ExitManagePhase"}));
	eventually(|| !messages.lock().is_empty()).await;

	assert_eq!(*messages.lock(), ["ExitManagePhase"]);
	assert!(bridge.is_ready());
}

#[tokio::test]
async fn listeners_subscribe_once_and_unsubscribe() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let count = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&count);
	let listener = Listener::message(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	assert!(bridge.on(listener.clone()));
	assert!(!bridge.on(listener.clone()));
	conn.inject_json(json!({"id": "1", "when": "", "clientID": "abc", "type": "ExitPrepPhase"}));
	eventually(|| count.load(Ordering::SeqCst) == 1).await;

	assert!(bridge.off(&listener));
	assert!(!bridge.off(&listener));
	let sentinel = record_messages(&bridge);
	conn.inject_json(json!({"id": "2", "when": "", "clientID": "abc", "type": "ExitPrepPhase"}));
	eventually(|| !sentinel.lock().is_empty()).await;
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_listener_does_not_starve_others() {
	let (bridge, _factory, conn) = ready_bridge().await;
	bridge.on(Listener::message(|_| panic!("listener failure")));
	let messages = record_messages(&bridge);

	conn.inject_json(json!({"id": "1", "when": "", "clientID": "abc", "type": "ExitPrepPhase"}));
	eventually(|| !messages.lock().is_empty()).await;

	assert_eq!(*messages.lock(), ["ExitPrepPhase"]);
}

#[tokio::test]
async fn null_client_id_event_is_dispatched() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let messages = record_messages(&bridge);

	conn.inject_json(json!({"id": "e1", "when": "2024-05-01T12:00:00.000Z", "clientID": null, "type": "ExitPrepPhase"}));
	eventually(|| !messages.lock().is_empty()).await;

	assert_eq!(*messages.lock(), ["ExitPrepPhase"]);
}

#[tokio::test]
async fn null_client_id_reply_settles_request() {
	let (bridge, _factory, conn) = ready_bridge().await;

	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.request(&CameraQuery {}).await }
	});
	eventually(|| conn.sent_count() == 1).await;
	let id = sent_ids(&conn).remove(0);
	conn.inject_json(json!({
		"id": "r1",
		"when": "2024-05-01T12:00:00.000Z",
		"clientID": null,
		"type": "CameraResponse",
		"replyTo": id,
		"x": 2.0,
		"y": 3.0,
		"zoom": 4.0,
	}));

	let camera = task.await.unwrap().unwrap();
	assert_eq!(camera, CameraResponse { x: 2.0, y: 3.0, zoom: 4.0 });
}

#[tokio::test]
async fn flushed_frames_keep_the_client_id_they_were_built_with() {
	let (bridge, factory) = fake_bridge();
	bridge.connect().unwrap();
	let conn = factory.latest().unwrap();
	bridge.send(&CameraQuery {}).unwrap();

	conn.open();
	conn.inject_ready("abc");
	eventually(|| bridge.is_ready()).await;
	bridge.send(&CameraQuery {}).unwrap();

	let frames = conn.take_sent();
	assert_eq!(frames.len(), 2);
	assert_eq!(frames[0]["clientID"], "");
	assert_eq!(frames[1]["clientID"], "abc");
}

#[tokio::test]
async fn reply_with_foreign_client_id_is_rejected() {
	let (bridge, _factory, conn) = ready_bridge().await;
	let messages = record_messages(&bridge);

	let task = tokio::spawn({
		let bridge = bridge.clone();
		async move { bridge.request(&CameraQuery {}).await }
	});
	eventually(|| conn.sent_count() == 1).await;
	let id = sent_ids(&conn).remove(0);

	conn.inject_reply("intruder", &id, "CameraResponse", json!({"x": 9.0, "y": 9.0, "zoom": 9.0}));
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(bridge.pending_replies(), 1);
	assert!(messages.lock().is_empty());
	assert!(!task.is_finished());

	conn.inject_reply("abc", &id, "CameraResponse", json!({"x": 1.0, "y": 1.0, "zoom": 1.0}));
	assert_eq!(task.await.unwrap().unwrap(), CameraResponse { x: 1.0, y: 1.0, zoom: 1.0 });
	eventually(|| !messages.lock().is_empty()).await;
	assert_eq!(*messages.lock(), ["CameraResponse"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remote_close_racing_reconnect_spares_new_requests() {
	for _ in 0..50 {
		let (bridge, factory) = fake_bridge();
		bridge.connect().unwrap();
		let old = factory.latest().unwrap();
		old.open();

		let closer = std::thread::spawn(move || old.close_remote(1006, ""));
		bridge.connect().unwrap();
		let result = bridge.send_raw_and_wait_for_reply(MessageType::CameraQuery, json!({}), Some(Duration::from_millis(20))).await;
		closer.join().unwrap();

		// nothing answers on the new session, so only the timer may end the request
		assert!(matches!(result, Err(Error::Timeout)), "{result:?}");
		assert_eq!(bridge.queued_messages(), 1);
	}
}
