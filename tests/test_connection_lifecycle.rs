//! Connection lifecycle tests
//!
//! Drives the connection manager tick by tick against a fake session, a
//! hand-driven clock and a togglable link flag.


use dynamic_mqtt::testing::FakeSession;
use dynamic_mqtt::{ConnectionState, Credentials, DeferredString, MqttSession, SessionState};
use manager_helpers::{full_credentials, harness, harness_with_link};
use rumqttc::QoS;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(16);

#[test]
fn test_link_down_never_connects() {
    let mut h = harness_with_link(FakeSession::new(), full_credentials(), false);

    let attempts = h.run_for(Duration::from_secs(30), Duration::from_millis(250));

    assert!(attempts.is_empty());
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(h.manager.session().pump_calls(), 0);
    assert_eq!(h.manager.stats().last_attempt_ms, None);
}

#[test]
fn test_link_loss_leaves_connected_state_untouched() {
    let mut h = harness(FakeSession::new(), full_credentials());
    h.manager.tick();
    assert_eq!(h.manager.state(), ConnectionState::Connected);
    let pumps = h.manager.session().pump_calls();

    h.link.set(false);
    h.run_for(Duration::from_secs(10), Duration::from_millis(500));

    assert_eq!(h.manager.state(), ConnectionState::Connected);
    assert_eq!(h.manager.session().pump_calls(), pumps);
    assert_eq!(h.manager.session().connect_count(), 1);

    h.link.set(true);
    h.manager.tick();
    assert_eq!(h.manager.session().pump_calls(), pumps + 1);
}

#[test]
fn test_missing_credential_blocks_connect() {
    let credentials = Credentials::new(
        DeferredString::literal("device-42"),
        DeferredString::literal("sensor"),
        DeferredString::empty(),
    );
    let mut h = harness(FakeSession::new(), credentials);

    h.manager.tick();
    assert_eq!(h.manager.session().connect_count(), 0);
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(h.manager.stats().credential_stalls, 1);

    // Stalls are rate limited like attempts
    h.clock.advance(Duration::from_secs(1));
    h.manager.tick();
    assert_eq!(h.manager.stats().credential_stalls, 1);

    h.clock.advance(Duration::from_secs(4));
    h.manager.tick();
    assert_eq!(h.manager.stats().credential_stalls, 2);
    assert_eq!(h.manager.stats().connect_attempts, 0);
}

#[test]
fn test_unreachable_broker_retries_every_five_seconds() {
    let mut h = harness(FakeSession::unreachable(), full_credentials());

    let attempts = h.run_for(Duration::from_secs(12), TICK);

    assert!((2..=3).contains(&attempts.len()), "attempts: {attempts:?}");
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= 5000, "attempts too close: {attempts:?}");
    }
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);

    let stats = h.manager.stats();
    assert_eq!(stats.connect_attempts, attempts.len() as u64);
    assert_eq!(stats.connect_failures, attempts.len() as u64);
    assert_eq!(stats.successful_connects, 0);
}

#[test]
fn test_first_attempt_is_immediate() {
    let mut h = harness(FakeSession::unreachable(), full_credentials());
    h.clock.set(123);

    h.manager.tick();

    assert_eq!(h.manager.session().connect_count(), 1);
    assert_eq!(h.manager.stats().last_attempt_ms, Some(123));
}

#[test]
fn test_credentials_arriving_mid_run() {
    let password = Rc::new(RefCell::new(None::<String>));
    let source = Rc::clone(&password);
    let credentials = Credentials::new(
        DeferredString::literal("device-42"),
        DeferredString::literal("sensor"),
        DeferredString::from_fn(move || source.borrow().clone()),
    );
    let mut h = harness(FakeSession::new(), credentials);

    h.manager.tick();
    assert_eq!(h.manager.session().connect_count(), 0);

    *password.borrow_mut() = Some("provisioned".to_string());

    // Still inside the retry window opened by the stalled tick
    h.clock.advance(Duration::from_secs(2));
    h.manager.tick();
    assert_eq!(h.manager.session().connect_count(), 0);

    h.clock.advance(Duration::from_secs(3));
    h.manager.tick();
    assert_eq!(h.manager.session().connect_count(), 1);
    assert_eq!(
        h.manager.session().connect_calls()[0],
        (
            "device-42".to_string(),
            "sensor".to_string(),
            "provisioned".to_string()
        )
    );
    assert_eq!(h.manager.state(), ConnectionState::Connected);
}

#[test]
fn test_connect_subscribes_each_topic_once_in_order() {
    let mut h = harness(FakeSession::new(), full_credentials());
    h.manager.register_subscription("a/b", |_, _| {});
    h.manager.register_subscription("c/d", |_, _| {});
    h.manager.register_subscription("a/b", |_, _| {});

    h.manager.tick();

    assert_eq!(
        h.manager.session().subscribe_calls(),
        &[
            ("a/b".to_string(), QoS::AtLeastOnce),
            ("c/d".to_string(), QoS::AtLeastOnce),
        ]
    );
}

#[test]
fn test_subscribe_failure_keeps_connection() {
    let mut h = harness(
        FakeSession::new().with_subscribe_result(false),
        full_credentials(),
    );
    h.manager.register_subscription("a/b", |_, _| {});
    h.manager.register_subscription("c/d", |_, _| {});

    h.manager.tick();

    assert_eq!(h.manager.state(), ConnectionState::Connected);
    assert_eq!(h.manager.session().subscribe_calls().len(), 2);
    assert_eq!(h.manager.stats().subscribe_failures, 2);
}

#[test]
fn test_session_drop_waits_full_interval_before_reconnect() {
    let mut h = harness(FakeSession::new(), full_credentials());
    h.manager.register_subscription("a/b", |_, _| {});
    h.manager.tick();
    assert_eq!(h.manager.state(), ConnectionState::Connected);

    h.clock.advance(Duration::from_secs(60));
    h.manager.session_mut().drop_connection();
    h.manager.tick();

    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(h.manager.session().connect_count(), 1);
    assert_eq!(h.manager.stats().sessions_lost, 1);

    h.clock.advance(Duration::from_millis(4999));
    h.manager.tick();
    assert_eq!(h.manager.session().connect_count(), 1);

    h.clock.advance(Duration::from_millis(1));
    h.manager.tick();
    assert_eq!(h.manager.session().connect_count(), 2);
    assert_eq!(h.manager.state(), ConnectionState::Connected);

    // Subscriptions are re-issued on every connect
    assert_eq!(h.manager.session().subscribe_calls().len(), 2);
}

#[test]
fn test_failed_connect_keeps_session_state_code() {
    let mut h = harness(
        FakeSession::unreachable().with_failure_state(SessionState::BadCredentials),
        full_credentials(),
    );

    h.manager.tick();

    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    assert_eq!(h.manager.session().state().code(), 4);
}

#[test]
fn test_recovers_after_failures() {
    let mut h = harness(
        FakeSession::new().with_connect_results([false, false]),
        full_credentials(),
    );

    let attempts = h.run_for(Duration::from_secs(11), TICK);

    assert_eq!(attempts.len(), 3);
    assert_eq!(h.manager.state(), ConnectionState::Connected);
    let stats = h.manager.stats();
    assert_eq!(stats.connect_failures, 2);
    assert_eq!(stats.successful_connects, 1);
}

#[test]
fn test_publish_requires_connection() {
    let mut h = harness(FakeSession::unreachable(), full_credentials());
    assert!(!h.manager.publish("status", "hello", false));

    h.manager.tick();
    assert!(!h.manager.publish("status", "hello", false));
    assert!(h.manager.session().published().is_empty());
}

#[test]
fn test_publish_after_session_drop_fails() {
    let mut h = harness(FakeSession::new(), full_credentials());
    h.manager.tick();
    assert!(h.manager.publish("status", [1u8, 2, 3], false));

    h.manager.session_mut().drop_connection();
    assert!(!h.manager.publish("status", [4u8], false));
    assert_eq!(h.manager.session().published().len(), 1);
}

#[test]
fn test_inbound_messages_reach_handlers() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut h = harness(FakeSession::new(), full_credentials());
    let sink = Rc::clone(&seen);
    h.manager.register_subscription("devices/42/cmd", move |topic, payload| {
        sink.borrow_mut().push(format!("{topic}={payload}"));
    });

    h.manager.session_mut().inject_message("devices/42/cmd", "reboot");
    h.manager.session_mut().inject_message("devices/43/cmd", "reboot");

    // Connect tick does not pump
    h.manager.tick();
    assert!(seen.borrow().is_empty());

    h.manager.tick();
    assert_eq!(*seen.borrow(), vec!["devices/42/cmd=reboot"]);
    assert_eq!(h.manager.stats().messages_dispatched, 1);
}
