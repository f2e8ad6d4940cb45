// Integration tests for the request handler and resource client,
// using wiremock as the controller.

use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sdnlink_api::{
    AcceptablePolicy, ControllerClient, Credentials, Endpoints, Format, HandlerConfig, Payload,
    RequestHandler, ResourceKind, SdnClient, TenantType, TIMEOUT_STATUS, UNREACHABLE_BODY,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Turn a wiremock URI (`http://127.0.0.1:PORT`) into a host entry.
fn host_of(server: &MockServer) -> String {
    server
        .uri()
        .trim_start_matches("http://")
        .to_owned()
}

/// A host on a port nothing listens on; connection refused immediately.
const DEAD_HOST: &str = "127.0.0.1:1";

/// A controller that answers its first request with a session cookie
/// and then drops every later connection before writing a response.
/// Raw TCP rather than wiremock: mock servers keep serving until the
/// whole test ends, and this double has to go dead mid-test.
async fn flaky_controller() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let host = listener.local_addr().expect("addr").to_string();
    tokio::spawn(async move {
        let mut served = false;
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            if served {
                drop(socket);
                continue;
            }
            served = true;
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      set-cookie: sessionid=abc123\r\n\
                      content-length: 2\r\n\
                      connection: close\r\n\r\n{}",
                )
                .await;
        }
    });
    host
}

fn config(hosts: Vec<String>) -> HandlerConfig {
    HandlerConfig {
        endpoints: Endpoints::new(hosts, 443, "/v2.0/")
            .expect("non-empty host list")
            .with_scheme("http"),
        credentials: None,
        timeout: Duration::from_secs(2),
        format: Format::Json,
    }
}

fn handler(hosts: Vec<String>) -> RequestHandler {
    RequestHandler::new(config(hosts)).expect("handler")
}

fn client(hosts: Vec<String>) -> SdnClient {
    SdnClient::new(config(hosts), AcceptablePolicy::default()).expect("client")
}

fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("test bodies are objects"),
    }
}

// ── Handler: failover and session ───────────────────────────────────

#[tokio::test]
async fn first_responding_endpoint_ends_the_attempt_loop() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    // A 500 is an application-level answer, not a transport failure:
    // the secondary must never be contacted.
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&secondary)
        .await;

    let handler = handler(vec![host_of(&primary), host_of(&secondary)]);
    let (status, body) = handler
        .execute(reqwest::Method::GET, "networks", None, None)
        .await
        .expect("execute");

    assert_eq!(status, 500);
    assert_eq!(body, Payload::Raw("boom".into()));
    assert_eq!(handler.controller_if_changed().await, None);
}

#[tokio::test]
async fn transport_failure_fails_over_to_next_endpoint() {
    let live = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
        .mount(&live)
        .await;

    let handler = handler(vec![DEAD_HOST.into(), host_of(&live)]);
    let (status, body) = handler
        .execute(reqwest::Method::GET, "networks", None, None)
        .await
        .expect("execute");

    assert_eq!(status, 200);
    assert_eq!(body, Payload::Json(json!({"networks": []})));

    // The change is broadcast exactly once, then the flag resets.
    assert_eq!(handler.controller_if_changed().await, Some(host_of(&live)));
    assert_eq!(handler.controller_if_changed().await, None);
}

#[tokio::test]
async fn exhausting_all_endpoints_returns_timeout_sentinel() {
    let handler = handler(vec![DEAD_HOST.into(), DEAD_HOST.into()]);
    let (status, body) = handler
        .execute(reqwest::Method::GET, "networks", None, None)
        .await
        .expect("execute never raises for transport failure");

    assert_eq!(status, TIMEOUT_STATUS);
    assert_eq!(body, Payload::Raw(UNREACHABLE_BODY.into()));
}

#[tokio::test]
async fn session_cookie_carried_across_calls() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sessionid=abc123")
                .set_body_json(json!({"networks": []})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .and(header("cookie", "sessionid=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ports": []})))
        .expect(1)
        .mount(&server)
        .await;

    let handler = handler(vec![host_of(&server)]);
    handler
        .execute(reqwest::Method::GET, "networks", None, None)
        .await
        .expect("first call");
    let (status, _) = handler
        .execute(reqwest::Method::GET, "ports", None, None)
        .await
        .expect("second call");

    assert_eq!(status, 200);
}

#[tokio::test]
async fn transport_failure_clears_the_session_cookie() {
    let secondary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ports": []})))
        .expect(1)
        .mount(&secondary)
        .await;

    let primary = flaky_controller().await;
    let handler = handler(vec![primary, host_of(&secondary)]);

    // First call lands on the primary and primes the cookie.
    let (status, _) = handler
        .execute(reqwest::Method::GET, "networks", None, None)
        .await
        .expect("first call");
    assert_eq!(status, 200);

    // The primary now kills connections; the failed attempt must drop
    // the stale cookie before the secondary is tried.
    let (status, _) = handler
        .execute(reqwest::Method::GET, "ports", None, None)
        .await
        .expect("failover call");
    assert_eq!(status, 200);

    let requests = secondary.received_requests().await.expect("recorded");
    assert_eq!(requests.len(), 1);
    assert!(
        !requests[0].headers.contains_key("cookie"),
        "stale session cookie must not follow a transport failure"
    );
}

#[tokio::test]
async fn basic_auth_header_sent_when_credentials_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(vec![host_of(&server)]);
    config.credentials = Some(Credentials {
        userid: "admin".into(),
        password: "admin".to_owned().into(),
    });
    let handler = RequestHandler::new(config).expect("handler");

    let (status, _) = handler
        .execute(reqwest::Method::GET, "networks", None, None)
        .await
        .expect("execute");
    assert_eq!(status, 200);
}

#[tokio::test]
async fn response_payload_gets_router_external_patch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks/n-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"network": {"id": "n-1", "router_external": true}}"#),
        )
        .mount(&server)
        .await;

    let handler = handler(vec![host_of(&server)]);
    let (_, body) = handler
        .execute(reqwest::Method::GET, "networks/n-1", None, None)
        .await
        .expect("execute");

    assert_eq!(
        body,
        Payload::Json(json!({"network": {"id": "n-1", "router:external": true}}))
    );
}

// ── Resource client ─────────────────────────────────────────────────

#[tokio::test]
async fn list_passes_filters_as_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/subnets"))
        .and(query_param("network_id", "n-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subnets": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(vec![host_of(&server)]);
    let (status, _) = client
        .list(
            ResourceKind::Subnet,
            &[("network_id".into(), "n-1".into())],
        )
        .await
        .expect("list");
    assert_eq!(status, 200);
}

#[tokio::test]
async fn create_normalizes_attribute_names_and_drops_unset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/networks"))
        .and(body_json(json!({"name": "ext-net", "router_external": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "n-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(vec![host_of(&server)]);
    let body = map(json!({
        "name": "ext-net",
        "router:external": true,
        "description": null,
    }));
    let (status, _) = client
        .create(ResourceKind::Network, &body)
        .await
        .expect("create");
    assert_eq!(status, 201);
}

#[tokio::test]
async fn update_supports_sub_action_targets() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2.0/routers/r-1/add_router_interface"))
        .and(body_json(json!({"subnet_id": "s-1"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(vec![host_of(&server)]);
    let body = map(json!({"subnet_id": "s-1"}));
    let (status, _) = client
        .update(ResourceKind::Router, "r-1/add_router_interface", &body)
        .await
        .expect("update");
    assert_eq!(status, 200);
}

#[tokio::test]
async fn delete_targets_element_path() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/ports/p-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(vec![host_of(&server)]);
    let (status, _) = client
        .delete(ResourceKind::Port, "p-1")
        .await
        .expect("delete");
    assert_eq!(status, 204);
}

#[tokio::test]
async fn resolve_tenant_maps_overlay_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tenants/t-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "t-1", "network_type": "DOVE"})),
        )
        .mount(&server)
        .await;

    let client = client(vec![host_of(&server)]);
    let tenant = client
        .resolve_tenant("t-1")
        .await
        .expect("lookup")
        .expect("acceptable status");
    assert_eq!(tenant.id.as_deref(), Some("t-1"));
    assert_eq!(tenant.tenant_type, Some(TenantType::Overlay));
}

#[tokio::test]
async fn resolve_tenant_without_reported_type_stays_untyped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tenants/t-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t-2"})))
        .mount(&server)
        .await;

    let client = client(vec![host_of(&server)]);
    let tenant = client
        .resolve_tenant("t-2")
        .await
        .expect("lookup")
        .expect("acceptable status");
    assert_eq!(tenant.id.as_deref(), Some("t-2"));
    assert_eq!(tenant.tenant_type, None);
}

#[tokio::test]
async fn resolve_tenant_returns_none_on_unacceptable_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tenants/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(vec![host_of(&server)]);
    let tenant = client.resolve_tenant("missing").await.expect("lookup");
    assert_eq!(tenant, None);
}
