mod common;

use common::Recorder;
use serde_json::{json, Value};
use std::time::Duration;
use webviewer_bridge::{BridgeError, ConfigureOptions, Dispatch, HostCall, InvocationRequest};

#[test]
fn invoke_without_database_fails_before_dispatch() {
    let (page, bridge) = common::bridge_at("file:///viewer/index.html");
    let err = bridge
        .invoke(HostCall::new("get_message").on_success(|_| {}))
        .unwrap_err();
    assert!(matches!(err, BridgeError::MissingDatabase));
    assert!(page.clicked_links().is_empty());
    assert_eq!(page.pending_timers(), 0);
    assert!(!bridge.invoker().is_pending());
}

#[test]
fn invoke_dispatches_by_link_click() {
    let (page, bridge) = common::bridge();
    let dispatch = bridge
        .invoke(InvocationRequest::new("∆").database("† †"))
        .unwrap();
    assert_eq!(dispatch, Dispatch::Sent("fmp://$/%E2%80%A0%20%E2%80%A0?script=%E2%88%86".into()));
    assert_eq!(page.clicked_links(), [dispatch.url()]);
    assert!(page.navigations().is_empty());
}

#[test]
fn deliver_result_resolves_once_and_disarms_timeout() {
    let (page, bridge) = common::bridge();
    let received = Recorder::<Value>::new();
    let failed = Recorder::<String>::new();
    let fail_sink = failed.sink();

    bridge
        .invoke(
            HostCall::new(InvocationRequest::new("∆").database("† †"))
                .timeout(Duration::from_millis(1_000))
                .on_success(received.sink())
                .on_failure(move |e| fail_sink(e.to_string())),
        )
        .unwrap();
    assert_eq!(bridge.invoker().pending_deadline_ms(), Some(1_000));

    bridge.deliver_result(json!("some data")).unwrap();
    assert_eq!(received.take(), [json!("some data")]);
    assert!(!bridge.invoker().is_pending());

    page.advance_time(5_000).unwrap();
    bridge.deliver_result(json!("again")).unwrap();
    assert_eq!(received.len(), 0);
    assert_eq!(failed.len(), 0);
}

#[test]
fn timeout_reports_standard_message_and_clears_pending() {
    let (page, bridge) = common::bridge();
    let received = Recorder::<Value>::new();
    let failed = Recorder::<String>::new();
    let fail_sink = failed.sink();

    bridge
        .invoke(
            HostCall::new("get_message")
                .timeout(Duration::from_millis(6_000))
                .on_success(received.sink())
                .on_failure(move |e| fail_sink(e.to_string())),
        )
        .unwrap();

    page.advance_time(6_000).unwrap();
    assert_eq!(failed.take(), ["no response from host before timeout (6000ms)"]);
    assert!(!bridge.invoker().is_pending());

    // A late answer has nobody to go to.
    bridge.deliver_result(json!(1)).unwrap();
    assert_eq!(received.len(), 0);
}

#[test]
fn timeout_without_failure_callback_is_raised() {
    let (page, bridge) = common::bridge();
    bridge
        .configure(ConfigureOptions::new().timeout_limit(Duration::from_millis(100)))
        .unwrap();
    bridge
        .invoke(HostCall::new("get_message").on_success(|_| {}))
        .unwrap();

    let err = page.advance_time(100).unwrap_err();
    assert!(matches!(err, BridgeError::ResponseTimeout { timeout_ms: 100 }));
}

#[test]
fn deliver_without_pending_call_is_a_no_op() {
    let (_page, bridge) = common::bridge();
    bridge.deliver_result(json!({"orphan": true})).unwrap();
}

#[test]
fn fire_and_forget_does_not_wait() {
    let (page, bridge) = common::bridge();
    bridge.invoke("log_event").unwrap();
    assert!(!bridge.invoker().is_pending());
    assert_eq!(page.pending_timers(), 0);

    let second = bridge.invoke("log_event").unwrap();
    assert!(!second.is_queued());
    assert_eq!(page.clicked_links().len(), 2);
}

#[test]
fn overlapping_calls_are_queued_in_order() {
    let (page, bridge) = common::bridge();
    let received = Recorder::<(u8, Value)>::new();

    let first_sink = received.sink();
    let second_sink = received.sink();
    let third_sink = received.sink();

    let first = bridge
        .invoke(HostCall::new("one").on_success(move |v| first_sink((1, v))))
        .unwrap();
    let second = bridge
        .invoke(HostCall::new("two").on_success(move |v| second_sink((2, v))))
        .unwrap();
    let third = bridge
        .invoke(HostCall::new("three").on_success(move |v| third_sink((3, v))))
        .unwrap();

    assert!(!first.is_queued());
    assert_eq!(second, Dispatch::Queued("fmp://$/theDB?script=two".into()));
    assert!(third.is_queued());
    assert_eq!(page.clicked_links(), ["fmp://$/theDB?script=one"]);
    assert_eq!(bridge.invoker().queued_len(), 2);

    bridge.deliver_result(json!("a")).unwrap();
    assert_eq!(
        page.clicked_links(),
        ["fmp://$/theDB?script=one", "fmp://$/theDB?script=two"]
    );
    bridge.deliver_result(json!("b")).unwrap();
    bridge.deliver_result(json!("c")).unwrap();

    assert_eq!(
        received.take(),
        [(1, json!("a")), (2, json!("b")), (3, json!("c"))]
    );
    assert_eq!(bridge.invoker().queued_len(), 0);
    assert!(!bridge.invoker().is_pending());
}

#[test]
fn queued_call_starts_after_predecessor_times_out() {
    let (page, bridge) = common::bridge();
    let failed = Recorder::<String>::new();
    let fail_sink = failed.sink();

    bridge
        .invoke(
            HostCall::new("slow")
                .timeout(Duration::from_millis(100))
                .on_failure(move |e| fail_sink(e.to_string())),
        )
        .unwrap();
    bridge
        .invoke(HostCall::new("next").on_success(|_| {}))
        .unwrap();

    page.advance_time(100).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(page.clicked_links().last().unwrap(), "fmp://$/theDB?script=next");
    assert!(bridge.invoker().is_pending());
    assert_eq!(bridge.invoker().pending_deadline_ms(), Some(3_100));
}

#[test]
fn configuration_errors_are_raised_even_while_busy() {
    let (page, bridge) = common::bridge();
    bridge
        .invoke(HostCall::new("one").on_success(|_| {}))
        .unwrap();
    let err = bridge.invoke(InvocationRequest::new("")).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(bridge.invoker().queued_len(), 0);
    assert_eq!(page.clicked_links().len(), 1);
}

#[test]
fn callback_may_start_a_new_call() {
    let (page, bridge) = common::bridge();
    let received = Recorder::<Value>::new();
    let inner = bridge.clone();
    let sink = received.sink();

    bridge
        .invoke(HostCall::new("first").on_success(move |_| {
            inner
                .invoke(HostCall::new("second").on_success(sink))
                .unwrap();
        }))
        .unwrap();

    bridge.deliver_result(json!(1)).unwrap();
    assert!(bridge.invoker().is_pending());
    assert_eq!(page.clicked_links().last().unwrap(), "fmp://$/theDB?script=second");

    bridge.deliver_result(json!(2)).unwrap();
    assert_eq!(received.take(), [json!(2)]);
}

#[test]
fn call_started_from_a_callback_waits_behind_queued_calls() {
    let (page, bridge) = common::bridge();
    let dispatched = Recorder::<Dispatch>::new();
    let received = Recorder::<Value>::new();
    let inner = bridge.clone();
    let record = dispatched.sink();
    let sink = received.sink_fn();
    let queued_sink = received.sink_fn();

    bridge
        .invoke(HostCall::new("first").on_success(move |_| {
            record(inner.invoke(HostCall::new("from_cb").on_success(sink)).unwrap());
        }))
        .unwrap();
    bridge
        .invoke(HostCall::new("queued").on_success(queued_sink))
        .unwrap();

    bridge.deliver_result(json!(1)).unwrap();
    assert_eq!(
        dispatched.take(),
        [Dispatch::Queued("fmp://$/theDB?script=from_cb".into())]
    );
    assert_eq!(
        page.clicked_links(),
        ["fmp://$/theDB?script=first", "fmp://$/theDB?script=queued"]
    );

    bridge.deliver_result(json!("queued")).unwrap();
    assert_eq!(page.clicked_links().last().unwrap(), "fmp://$/theDB?script=from_cb");
    assert!(bridge.invoker().is_pending());

    bridge.deliver_result(json!("from_cb")).unwrap();
    assert_eq!(received.take(), [json!("queued"), json!("from_cb")]);
    assert!(!bridge.invoker().is_pending());
}

#[test]
fn fragment_in_address_schedules_reload_of_unchanged_address() {
    let href = "file:///viewer/index.html?db=theDB#state";
    let (page, bridge) = common::bridge_at(href);
    bridge.invoke("refresh").unwrap();

    assert!(page.navigations().is_empty());
    page.advance_time(1).unwrap();
    assert_eq!(page.navigations(), [href]);
}

#[test]
fn no_reload_without_fragment() {
    let (page, bridge) = common::bridge();
    bridge.invoke("refresh").unwrap();
    page.flush().unwrap();
    assert!(page.navigations().is_empty());
}

#[test]
fn dispatch_failure_is_returned_synchronously() {
    let (page, bridge) = common::bridge();
    page.set_links_blocked(true);
    let err = bridge
        .invoke(HostCall::new("one").on_success(|_| {}))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Platform(_)));
    assert!(!bridge.invoker().is_pending());
}

#[test]
fn queued_dispatch_failure_goes_to_its_failure_callback() {
    let (page, bridge) = common::bridge();
    let failed = Recorder::<String>::new();
    let sink = failed.sink();

    bridge
        .invoke(HostCall::new("one").on_success(|_| {}))
        .unwrap();
    bridge
        .invoke(HostCall::new("two").on_failure(move |e| sink(e.to_string())))
        .unwrap();

    page.set_links_blocked(true);
    bridge.deliver_result(Value::Null).unwrap();
    assert_eq!(failed.take(), ["platform error: page body is not available"]);
    assert!(!bridge.invoker().is_pending());
    assert_eq!(bridge.invoker().queued_len(), 0);
}
