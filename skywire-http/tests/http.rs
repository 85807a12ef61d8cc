use serde_json::{Value, json};
use skywire_http::{Auth, HttpClient, HttpError, HttpMethod, RequestOpts};
use std::borrow::Cow;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_attaches_bearer_and_repeated_query_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.actor.getProfiles"))
        .and(header("authorization", "Bearer jwt-123"))
        .and(header("content-type", "application/json"))
        .and(query_param("actors", "alice.test"))
        .and(query_param("actors", "bob.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"profiles": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: Value = client
        .get_json(
            "xrpc/app.bsky.actor.getProfiles",
            RequestOpts {
                auth: Some(Auth::Bearer("jwt-123")),
                query: Some(vec![
                    ("actors", Cow::Borrowed("alice.test")),
                    ("actors", Cow::Borrowed("bob.test")),
                ]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(got, json!({"profiles": []}));
}

#[tokio::test]
async fn post_serializes_body_as_json() {
    let server = MockServer::start().await;
    let body = json!({"identifier": "alice.test", "password": "pw"});
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: Value = client
        .post_json("xrpc/com.atproto.server.createSession", None, &body)
        .await
        .unwrap();
    assert_eq!(got["ok"], json!(true));
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": "UpstreamFailure",
            "message": "try later"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_json::<Value>("xrpc/app.bsky.feed.getAuthorFeed", RequestOpts::default())
        .await
        .unwrap_err();

    match err {
        HttpError::Api {
            status,
            message,
            body,
        } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(message, "UpstreamFailure: try later");
            assert!(body.contains("try later"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn raw_bytes_are_returned_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let bytes = client
        .request_bytes::<()>(HttpMethod::GET, "raw", None, RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"not json");

    let err = client
        .get_json::<Value>("raw", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, ref snip) if snip == "not json"));
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    // Bind then drop a listener so the port is (very likely) closed.
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let client = HttpClient::new(&uri).unwrap();
    let err = client
        .get_json::<Value>("xrpc/anything", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Transport(_)), "got {err:?}");
}
