mod common;

use webviewer_bridge::invoker::compose_url;
use webviewer_bridge::params::UrlParams;
use webviewer_bridge::{BridgeError, ConfigureOptions, InvocationRequest};

fn unicode_request() -> InvocationRequest {
    InvocationRequest::new("∆&")
        .database("† †")
        .parameter("‡+‡")
        .variable("$_var1", "∫$")
        .variable("$_var2", "∑")
}

#[test]
fn url_matches_host_contract_byte_for_byte() {
    let (_page, bridge) = common::bridge();
    let url = bridge.build_url(&unicode_request()).expect("url");
    assert_eq!(
        url,
        "fmp://$/%E2%80%A0%20%E2%80%A0?script=%E2%88%86%26&param=%E2%80%A1%2B%E2%80%A1\
         &%24_var1=%E2%88%AB%24&%24_var2=%E2%88%91"
    );
}

#[test]
fn single_variable_contract() {
    let request = InvocationRequest::new("∆&")
        .database("† †")
        .parameter("‡+‡")
        .variable("$_v1", "∫$");
    let url = compose_url(&request, None, &UrlParams::default()).expect("url");
    assert_eq!(
        url,
        "fmp://$/%E2%80%A0%20%E2%80%A0?script=%E2%88%86%26&param=%E2%80%A1%2B%E2%80%A1&%24_v1=%E2%88%AB%24"
    );
}

#[test]
fn database_defaults_to_db_query_param() {
    let (_page, bridge) = common::bridge();
    let url = bridge
        .build_url(&InvocationRequest::new("∆").parameter("‡‡"))
        .expect("url");
    assert_eq!(url, "fmp://$/theDB?script=%E2%88%86&param=%E2%80%A1%E2%80%A1");
}

#[test]
fn param_is_omitted_when_absent() {
    let (_page, bridge) = common::bridge();
    let url = bridge.build_url(&"∆".into()).expect("url");
    assert_eq!(url, "fmp://$/theDB?script=%E2%88%86");
}

#[test]
fn configured_database_overrides_query_param_and_request_overrides_both() {
    let (_page, bridge) = common::bridge();
    bridge
        .configure(ConfigureOptions::new().database_name("finance"))
        .unwrap();
    assert_eq!(
        bridge.build_url(&"s".into()).unwrap(),
        "fmp://$/finance?script=s"
    );
    assert_eq!(
        bridge
            .build_url(&InvocationRequest::new("s").database("hr"))
            .unwrap(),
        "fmp://$/hr?script=s"
    );
}

#[test]
fn database_path_is_used_verbatim() {
    let request = InvocationRequest::new("s")
        .database("Sales Data")
        .database_path("fmserver.local");
    let url = compose_url(&request, None, &UrlParams::default()).unwrap();
    assert_eq!(url, "fmp://fmserver.local/Sales%20Data?script=s");
}

#[test]
fn scalar_variables_are_stringified_in_insertion_order() {
    let request = InvocationRequest::new("s")
        .database("db")
        .variable("$count", 3)
        .variable("$flag", false)
        .variable("$ratio", 0.5);
    let url = compose_url(&request, None, &UrlParams::default()).unwrap();
    assert_eq!(url, "fmp://$/db?script=s&%24count=3&%24flag=false&%24ratio=0.5");
}

#[test]
fn include_url_params_forwards_page_params_after_variables() {
    let (_page, bridge) = common::bridge_at("file:///v.html?db=theDB&wv=wv 1&isZoo");
    let request = InvocationRequest::new("s")
        .variable("$x", "1")
        .include_url_params(true);
    assert_eq!(
        bridge.build_url(&request).unwrap(),
        "fmp://$/theDB?script=s&%24x=1&$_db=theDB&$_wv=wv%201&$_isZoo=true"
    );
}

#[test]
fn forwarded_param_prefix_is_literal_and_name_is_encoded() {
    let (_page, bridge) = common::bridge_at("file:///v.html?db=theDB&my%20key=a%26b");
    let request = InvocationRequest::new("s").include_url_params(true);
    assert_eq!(
        bridge.build_url(&request).unwrap(),
        "fmp://$/theDB?script=s&$_db=theDB&$_my%20key=a%26b"
    );
}

#[test]
fn missing_script_is_a_configuration_error() {
    let (_page, bridge) = common::bridge();
    let err = bridge.build_url(&InvocationRequest::new("")).unwrap_err();
    assert!(matches!(err, BridgeError::MissingScript));
    assert!(err.is_configuration());
}

#[test]
fn missing_database_names_the_setup_step() {
    let (_page, bridge) = common::bridge_at("file:///viewer/index.html");
    let err = bridge.build_url(&"s".into()).unwrap_err();
    assert!(matches!(err, BridgeError::MissingDatabase));
    let msg = err.to_string();
    assert!(msg.contains("configure"), "{msg}");
    assert!(msg.contains("\"db\""), "{msg}");
}

#[test]
fn request_round_trips_through_json() {
    let request = unicode_request();
    let json = serde_json::to_string(&request).unwrap();
    let back: InvocationRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(back, request);

    let minimal: InvocationRequest = serde_json::from_str(r#"{"script":"s"}"#).unwrap();
    assert_eq!(minimal.database_path, "$");
    assert!(minimal.variables.is_empty());
}
