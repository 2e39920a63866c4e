//! Wire contract of the coordinator client.

use std::time::Duration;

use courier_core::domain::{
    CorrelationId, DeviceInfo, EndpointError, ReplyRecord, ReplyType, SendErrorCode, SendTask,
    StatusLabel, StatusReport, TaskId,
};
use courier_core::impls::HttpEndpoint;
use courier_core::ports::{FetchOutcome, RemoteEndpoint};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROBE: &str = "/api/sms/probe";
const REPLIES: &str = "/api/sms/replies";

fn endpoint(server: &MockServer) -> HttpEndpoint {
    endpoint_with_timeouts(server, Duration::from_secs(2), Duration::from_secs(2))
}

fn endpoint_with_timeouts(server: &MockServer, connect: Duration, read: Duration) -> HttpEndpoint {
    HttpEndpoint::new(
        format!("{}{PROBE}", server.uri()),
        format!("{}{REPLIES}", server.uri()),
        "secret",
        connect,
        read,
    )
    .unwrap()
}

fn task(id: i64) -> SendTask {
    SendTask {
        task_id: TaskId::new(id),
        correlation_id: CorrelationId::new(100),
        destination: "+381600000001".into(),
        body: "Hello".into(),
        dispatched_at_ms: 0,
    }
}

fn reply(message: &str) -> ReplyRecord {
    ReplyRecord {
        phone_from: "+381600000001".into(),
        phone_to: "+381600099999".into(),
        message: message.into(),
        received_timestamp: 1_700_000_000_000,
        shipment_id: Some(CorrelationId::new(100)),
        original_queue_id: Some(TaskId::new(7)),
        reply_type: ReplyType::DeliveryConfirmation,
        device_info: DeviceInfo {
            platform_version: "14".into(),
            app_version: "1.0.0".into(),
            device_id: "dev-01".into(),
        },
    }
}

async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn fetch_parses_task_and_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROBE))
        .and(header("X-API-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "phone": "+381600000001",
            "message": "Hello",
            "queue_id": 7,
            "shipment_id": 100
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = endpoint(&server).fetch_task().await.unwrap();
    let FetchOutcome::Task(payload) = outcome else {
        panic!("expected a task, got {outcome:?}");
    };
    assert_eq!(payload.phone, "+381600000001");
    assert_eq!(payload.queue_id, TaskId::new(7));
    assert_eq!(payload.shipment_id, CorrelationId::new(100));
}

#[tokio::test]
async fn no_content_means_no_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROBE))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    assert_eq!(endpoint(&server).fetch_task().await.unwrap(), FetchOutcome::Empty);
}

#[tokio::test]
async fn unauthorized_is_its_own_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = endpoint(&server).fetch_task().await.unwrap_err();
    assert!(matches!(err, EndpointError::Unauthorized));
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = endpoint(&server).fetch_task().await.unwrap_err();
    assert!(matches!(err, EndpointError::UnexpectedStatus(503)));
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = endpoint(&server).fetch_task().await.unwrap_err();
    assert!(matches!(err, EndpointError::Malformed(_)));
}

#[tokio::test]
async fn slow_response_hits_the_read_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    // generous connect timeout; only the read timeout can fire
    let endpoint =
        endpoint_with_timeouts(&server, Duration::from_secs(2), Duration::from_millis(300));
    let err = endpoint.fetch_task().await.unwrap_err();
    assert!(matches!(err, EndpointError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_coordinator_is_a_transport_error() {
    // bind then release a port so nothing is listening on it
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base = format!("http://127.0.0.1:{port}");
    let endpoint = HttpEndpoint::new(
        format!("{base}{PROBE}"),
        format!("{base}{REPLIES}"),
        "secret",
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
    .unwrap();

    let err = endpoint.fetch_task().await.unwrap_err();
    assert!(matches!(err, EndpointError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn single_status_report_is_posted_as_an_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROBE))
        .and(header("X-API-Key", "secret"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let report = StatusReport::new(&task(7), StatusLabel::Failed).with_error(SendErrorCode::RadioOff);
    endpoint(&server).report_statuses(&[report]).await.unwrap();

    assert_eq!(
        received_bodies(&server).await,
        vec![json!({
            "queue_id": 7,
            "phone": "+381600000001",
            "status": "failed",
            "error_code": "RADIO_OFF"
        })]
    );
}

#[tokio::test]
async fn several_status_reports_are_posted_as_an_ordered_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROBE))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let reports = vec![
        StatusReport::new(&task(7), StatusLabel::Processing),
        StatusReport::new(&task(7), StatusLabel::Pending),
    ];
    endpoint(&server).report_statuses(&reports).await.unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies[0][0]["status"], "processing");
    assert_eq!(bodies[0][1]["status"], "pending");
}

#[tokio::test]
async fn status_post_with_non_200_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let report = StatusReport::new(&task(7), StatusLabel::Sent);
    let err = endpoint(&server).report_statuses(&[report]).await.unwrap_err();
    assert!(matches!(err, EndpointError::UnexpectedStatus(201)));
}

#[tokio::test]
async fn empty_batches_make_no_request() {
    let server = MockServer::start().await;
    let endpoint = endpoint(&server);
    endpoint.report_statuses(&[]).await.unwrap();
    endpoint.submit_replies(&[]).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn replies_are_posted_to_the_reply_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPLIES))
        .and(header("X-API-Key", "secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let endpoint = endpoint(&server);
    endpoint.submit_replies(&[reply("GOT IT")]).await.unwrap();
    endpoint
        .submit_replies(&[reply("first"), reply("second")])
        .await
        .unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(
        bodies[0],
        json!({
            "phone_from": "+381600000001",
            "phone_to": "+381600099999",
            "message": "GOT IT",
            "received_timestamp": 1_700_000_000_000_i64,
            "shipment_id": 100,
            "original_queue_id": 7,
            "reply_type": "delivery_confirmation",
            "device_info": {"android_version": "14", "app_version": "1.0.0", "device_id": "dev-01"}
        })
    );
    assert_eq!(bodies[1].as_array().map(Vec::len), Some(2));
    assert_eq!(bodies[1][0]["message"], "first");
}
