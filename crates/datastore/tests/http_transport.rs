//! HTTP transport against a mock server, driven from a `LocalSet`.

use std::rc::Rc;
use std::time::Duration;

use datastore::{HttpTransport, LoadError, LoadState, RemoteConfig, Store};
use serde_json::json;
use tokio::task::LocalSet;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn settle(store: &Store, name: &str) -> LoadState {
    for _ in 0..200 {
        match store.load_state(name) {
            Some(LoadState::Loading) => tokio::time::sleep(Duration::from_millis(10)).await,
            Some(state) => return state,
            None => panic!("unknown source {name}"),
        }
    }
    panic!("source {name} never finished loading");
}

#[tokio::test]
async fn loads_json_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/albums"))
        .and(query_param("user", "ada lovelace"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"[{"id": "a1", "title": "Lisbon"}]"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let local = LocalSet::new();
    local
        .run_until(async {
            let store = Store::with_transport(Rc::new(HttpTransport::new()));
            let config = RemoteConfig::json(format!("{}/albums?user={{user}}", server.uri()))
                .with_param("user", "ada lovelace");
            store.add_remote("albums", config).unwrap();

            assert!(store.nodes("$albums").unwrap().is_empty());
            assert_eq!(settle(&store, "albums").await, LoadState::Loaded);
            assert_eq!(
                store.value("$albums/a1/title").unwrap(),
                Some(json!("Lisbon"))
            );
        })
        .await;
}

#[tokio::test]
async fn enveloped_xml_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"cb(<feed><entry href="/p/1">One</entry></feed>);"#),
        )
        .mount(&server)
        .await;

    let local = LocalSet::new();
    local
        .run_until(async {
            let store = Store::with_transport(Rc::new(HttpTransport::new()));
            let config = RemoteConfig::xml(format!("{}/feed", server.uri()))
                .with_envelope("cb(", ");")
                .with_autoload(true);
            store.add_remote("feed", config).unwrap();

            assert_eq!(settle(&store, "feed").await, LoadState::Loaded);
            assert_eq!(store.value("$feed/entry/@href").unwrap(), Some(json!("/p/1")));
        })
        .await;
}

#[tokio::test]
async fn http_errors_mark_the_source_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let local = LocalSet::new();
    local
        .run_until(async {
            let store = Store::with_transport(Rc::new(HttpTransport::new()));
            store
                .add_remote("gone", RemoteConfig::json(format!("{}/missing", server.uri())))
                .unwrap();
            store.load("gone");

            assert_eq!(settle(&store, "gone").await, LoadState::Failed);
            assert_eq!(
                store.source("gone").unwrap().last_error(),
                Some(LoadError::Status(404))
            );
        })
        .await;
}

#[test]
fn fetching_without_a_runtime_fails_the_load() {
    let store = Store::with_transport(Rc::new(HttpTransport::new()));
    store
        .add_remote("albums", RemoteConfig::json("http://127.0.0.1:9/albums"))
        .unwrap();
    store.load("albums");

    assert_eq!(store.load_state("albums"), Some(LoadState::Failed));
    assert!(matches!(
        store.source("albums").unwrap().last_error(),
        Some(LoadError::Network(_))
    ));
}
