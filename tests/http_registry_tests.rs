//! HttpRegistry against a mocked registry service.

mod common;

use apg::cancel::Cancellation;
use apg::config::RegistrySettings;
use apg::names::Pattern;
use apg::registry::http::HttpRegistry;
use apg::registry::{Api, ApiSpec, Registry, RegistryError};
use apg::visitor::{self, Collector};
use common::{gzip, PETSTORE};
use serde_json::json;
use wiremock::matchers::{bearer_token, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APIS: &str = "/v1/projects/demo/locations/global/apis";

fn client(server: &MockServer) -> HttpRegistry {
    let settings = RegistrySettings {
        address: server.uri(),
        token: Some("secret".into()),
        api_key: Some("key-1".into()),
        ..Default::default()
    };
    HttpRegistry::new(&settings).unwrap()
}

#[tokio::test]
async fn test_listing_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(APIS))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apis": [{"name": "projects/demo/locations/global/apis/a"}],
            "nextPageToken": "t"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(APIS))
        .and(query_param("pageToken", "t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apis": [{"name": "projects/demo/locations/global/apis/b"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = client(&server);
    let pattern = Pattern::parse("projects/demo/locations/global/apis").unwrap();
    let mut collector = Collector::default();
    let count = visitor::visit(&registry, &pattern, "", &Cancellation::new(), &mut collector)
        .await
        .unwrap();
    assert_eq!(count, 2);
    let names: Vec<&str> = collector.resources.iter().map(|r| r.name()).collect();
    assert_eq!(
        names,
        [
            "projects/demo/locations/global/apis/a",
            "projects/demo/locations/global/apis/b"
        ]
    );
}

#[tokio::test]
async fn test_wildcard_ids_become_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{APIS}/-/versions")))
        .and(query_param("filter", "version_id == 'v1'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = client(&server);
    let pattern = Pattern::parse("projects/demo/locations/global/apis/-/versions/v1").unwrap();
    assert!(pattern.collection);
    let mut collector = Collector::default();
    let count = visitor::visit(&registry, &pattern, "", &Cancellation::new(), &mut collector)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_credentials_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{APIS}/books")))
        .and(bearer_token("secret"))
        .and(header("x-goog-api-key", "key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/locations/global/apis/books",
            "displayName": "Books"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api: Api = client(&server)
        .get("projects/demo/locations/global/apis/books")
        .await
        .unwrap();
    assert_eq!(api.display_name, "Books");
}

#[tokio::test]
async fn test_error_status_maps_to_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{APIS}/ghost")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "api not found", "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .get::<Api>("projects/demo/locations/global/apis/ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(ref message) if message == "api not found"));
}

#[tokio::test]
async fn test_contents_carry_their_mime_type() {
    let server = MockServer::start().await;
    let spec = "projects/demo/locations/global/apis/books/versions/v1/specs/openapi";
    Mock::given(method("GET"))
        .and(path(format!("/v1/{spec}:getContents")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("openapi: 3.0.0\n", "application/x.openapi;version=3"),
        )
        .mount(&server)
        .await;

    let contents = client(&server).get_contents(spec, false).await.unwrap();
    assert_eq!(contents.mime_type, "application/x.openapi;version=3");
    assert_eq!(&contents.data[..], b"openapi: 3.0.0\n");
}

fn gzip_spec(name: &str) -> ApiSpec {
    ApiSpec {
        name: name.to_string(),
        mime_type: "application/x.openapi+gzip;version=3.0.0".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_spec_contents_decompressed_by_the_service() {
    let server = MockServer::start().await;
    let spec = "projects/demo/locations/global/apis/books/versions/v1/specs/openapi";
    Mock::given(method("GET"))
        .and(path(format!("/v1/{spec}:getContents")))
        .and(header("accept-encoding", "gzip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(PETSTORE, "application/x.openapi;version=3.0.0"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let contents = visitor::fetch_spec_contents(&client(&server), &gzip_spec(spec))
        .await
        .unwrap();
    assert_eq!(contents.mime_type, "application/x.openapi;version=3.0.0");
    assert_eq!(contents.data, PETSTORE.as_bytes());
}

#[tokio::test]
async fn test_spec_contents_served_compressed() {
    let server = MockServer::start().await;
    let spec = "projects/demo/locations/global/apis/books/versions/v1/specs/openapi";
    Mock::given(method("GET"))
        .and(path(format!("/v1/{spec}:getContents")))
        .and(header("accept-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            gzip(PETSTORE.as_bytes()),
            "application/x.openapi+gzip;version=3.0.0",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let contents = visitor::fetch_spec_contents(&client(&server), &gzip_spec(spec))
        .await
        .unwrap();
    assert_eq!(contents.mime_type, "application/x.openapi;version=3.0.0");
    assert_eq!(contents.data, PETSTORE.as_bytes());
}

#[tokio::test]
async fn test_update_sends_mask_and_allow_missing() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{APIS}/books")))
        .and(query_param("updateMask", "labels"))
        .and(query_param("allowMissing", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/locations/global/apis/books",
            "labels": {"tier": "gold"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut api = Api {
        name: "projects/demo/locations/global/apis/books".into(),
        ..Default::default()
    };
    api.labels.insert("tier".into(), "gold".into());
    let updated = client(&server).update(&api, &["labels"], true).await.unwrap();
    assert_eq!(updated.labels.get("tier").map(String::as_str), Some("gold"));
}

#[tokio::test]
async fn test_delete_forwards_force() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{APIS}/books")))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .delete("projects/demo/locations/global/apis/books", true)
        .await
        .unwrap();
}
