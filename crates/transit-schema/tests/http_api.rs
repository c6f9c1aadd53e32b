//! End-to-end tests for `HttpSchemaApi` against an in-process structural API
//! served by `tiny_http`.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use transit_core::ApiEndpoint;
use transit_schema::{ClientTimeouts, DiffOutcome, HttpSchemaApi, SchemaApi, SchemaError};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    url: String,
    body: String,
    authorization: Option<String>,
}

type Handler = dyn Fn(&Recorded) -> (u16, String) + Send + Sync;

struct FakeApi {
    server: Arc<tiny_http::Server>,
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    worker: Option<JoinHandle<()>>,
}

impl FakeApi {
    fn start(handler: impl Fn(&Recorded) -> (u16, String) + Send + Sync + 'static) -> Self {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let worker = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let recorded = Recorded {
                        method: request.method().to_string(),
                        url: request.url().to_string(),
                        body,
                        authorization: request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("Authorization"))
                            .map(|h| h.value.as_str().to_string()),
                    };
                    requests.lock().unwrap().push(recorded.clone());
                    let (status, body) = handler(&recorded);
                    let response = if status == 204 {
                        tiny_http::Response::from_string("").with_status_code(204)
                    } else {
                        tiny_http::Response::from_string(body).with_status_code(status)
                    };
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            base_url: format!("http://127.0.0.1:{port}"),
            requests,
            worker: Some(worker),
        }
    }

    fn client(&self) -> HttpSchemaApi {
        client_for(&self.base_url, Duration::from_secs(5))
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn client_for(base_url: &str, request_timeout: Duration) -> HttpSchemaApi {
    HttpSchemaApi::new(
        "stage",
        ApiEndpoint {
            base_url: base_url.to_string(),
            token: "secret-token".into(),
        },
        ClientTimeouts {
            connect: Duration::from_secs(2),
            request: request_timeout,
        },
    )
    .unwrap()
}

fn snapshot_doc() -> Value {
    json!({
        "version": 1,
        "directus": "10.10.4",
        "vendor": "postgres",
        "collections": [{"collection": "articles"}],
        "fields": [{"collection": "articles", "field": "title"}],
        "relations": []
    })
}

#[tokio::test]
async fn snapshot_is_unwrapped_and_authenticated() {
    let api = FakeApi::start(|_| (200, json!({ "data": snapshot_doc() }).to_string()));
    let snapshot = api.client().snapshot().await.unwrap();

    assert_eq!(snapshot.document(), &snapshot_doc());
    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "/schema/snapshot");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer secret-token")
    );
}

#[tokio::test]
async fn snapshot_rejects_html_login_page() {
    let api = FakeApi::start(|_| (200, "<html>please log in</html>".into()));
    let err = api.client().snapshot().await.unwrap_err();
    assert!(matches!(err, SchemaError::MalformedSnapshot(_)));
}

#[tokio::test]
async fn diff_submits_unwrapped_document() {
    let api = FakeApi::start(|req| match req.url.as_str() {
        "/schema/snapshot" => (200, json!({ "data": snapshot_doc() }).to_string()),
        _ => (204, String::new()),
    });
    let client = api.client();
    let snapshot = client.snapshot().await.unwrap();
    let outcome = client.diff(&snapshot, false).await.unwrap();

    assert_eq!(outcome, DiffOutcome::Identical);
    let diff_request = &api.requests()[1];
    assert_eq!(diff_request.method, "POST");
    assert_eq!(diff_request.url, "/schema/diff");
    let submitted: Value = serde_json::from_str(&diff_request.body).unwrap();
    assert_eq!(submitted, snapshot_doc());
    assert!(submitted.get("data").is_none());
}

#[tokio::test]
async fn force_flag_is_forwarded() {
    let api = FakeApi::start(|_| (204, String::new()));
    let snapshot = transit_schema::SchemaSnapshot::from_value(snapshot_doc()).unwrap();
    api.client().diff(&snapshot, true).await.unwrap();
    assert_eq!(api.requests()[0].url, "/schema/diff?force=true");
}

#[tokio::test]
async fn diff_then_apply_sends_the_diff_not_the_snapshot() {
    let diff_payload = json!({
        "hash": "h1",
        "diff": {
            "collections": [],
            "fields": [{"collection": "articles", "field": "subtitle", "diff": [{"kind": "N"}]}],
            "relations": []
        }
    });
    let response = json!({ "data": diff_payload.clone() }).to_string();
    let api = FakeApi::start(move |req| match req.url.as_str() {
        "/schema/diff" => (200, response.clone()),
        "/schema/apply" => (204, String::new()),
        _ => (404, String::new()),
    });
    let client = api.client();
    let snapshot = transit_schema::SchemaSnapshot::from_value(snapshot_doc()).unwrap();

    let DiffOutcome::Changes(diff) = client.diff(&snapshot, false).await.unwrap() else {
        panic!("expected changes");
    };
    client.apply(&diff).await.unwrap();

    let apply_request = &api.requests()[1];
    assert_eq!(apply_request.url, "/schema/apply");
    let submitted: Value = serde_json::from_str(&apply_request.body).unwrap();
    assert_eq!(submitted, diff_payload);
}

#[tokio::test]
async fn apply_rejection_is_apply_error_with_excerpt() {
    let api = FakeApi::start(|_| {
        (
            400,
            r#"{"errors":[{"message":"Provided hash does not match the current instance's schema hash"}]}"#.into(),
        )
    });
    let diff = transit_schema::SchemaDiff::from_value(json!({"hash": "h", "diff": {"fields": [{}]}}))
        .unwrap();
    let err = api.client().apply(&diff).await.unwrap_err();
    match err {
        SchemaError::Apply {
            status, excerpt, ..
        } => {
            assert_eq!(status, 400);
            assert!(excerpt.contains("schema hash"));
        }
        other => panic!("unexpected: {other}"),
    }
}

#[tokio::test]
async fn forbidden_apply_is_permission_denied() {
    let api = FakeApi::start(|_| (403, r#"{"errors":[{"message":"You don't have permission"}]}"#.into()));
    let diff = transit_schema::SchemaDiff::from_value(json!({"hash": "h", "diff": {"fields": [{}]}}))
        .unwrap();
    let err = api.client().apply(&diff).await.unwrap_err();
    assert!(matches!(err, SchemaError::PermissionDenied { status: 403, .. }));
}

#[tokio::test]
async fn permission_probe_distinguishes_forbidden() {
    let api = FakeApi::start(|req| match req.url.as_str() {
        "/server/health" => (200, r#"{"status":"ok"}"#.into()),
        _ => (403, r#"{"errors":[{"message":"You don't have permission"}]}"#.into()),
    });
    let client = api.client();
    client.health().await.unwrap();
    let err = client.probe_structural_access().await.unwrap_err();
    assert!(matches!(err, SchemaError::PermissionDenied { status: 403, .. }));
}

#[tokio::test]
async fn health_probe_is_unauthenticated() {
    let api = FakeApi::start(|_| (200, r#"{"status":"ok"}"#.into()));
    api.client().health().await.unwrap();
    assert_eq!(api.requests()[0].authorization, None);
}

#[tokio::test]
async fn unhealthy_instance_is_reported() {
    let api = FakeApi::start(|_| (503, r#"{"status":"error"}"#.into()));
    let err = api.client().health().await.unwrap_err();
    assert!(matches!(err, SchemaError::Unhealthy { status: 503, .. }));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let api = FakeApi::start(|_| {
        std::thread::sleep(Duration::from_millis(800));
        (200, "{}".into())
    });
    let client = client_for(&api.base_url, Duration::from_millis(200));
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, SchemaError::Timeout { .. }), "{err}");
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = client_for(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2));
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, SchemaError::Unreachable { .. }), "{err}");
}
