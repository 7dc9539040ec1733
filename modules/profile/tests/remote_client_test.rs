use httpmock::prelude::*;
use profile::client::ProfileApi;
use profile::error::ProfileError;
use profile::gateways::RemoteProfileClient;
use profile::model::{Collection, Profile, ProfilePatch};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use modkit::TracedClient;

fn stored(version: i64) -> Value {
    serde_json::to_value(Profile {
        key: "demo".into(),
        name: "Ada".into(),
        version,
        ..Default::default()
    })
    .unwrap()
}

fn client_for(server: &MockServer) -> RemoteProfileClient {
    let base = Url::parse(&server.url("/api")).unwrap();
    RemoteProfileClient::new(TracedClient::default(), base, "demo")
}

#[tokio::test]
async fn get_or_create_fetches_and_remembers() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/profile/demo");
            then.status(200).json_body(stored(3));
        })
        .await;

    let client = client_for(&server);
    let p = client.get_or_create().await.unwrap();
    assert_eq!(p.version, 3);
    assert_eq!(p.name, "Ada");
    assert_eq!(client.last_known().map(|p| p.version), Some(3));
    m.assert_async().await;
}

#[tokio::test]
async fn unavailable_server_falls_back_to_the_last_copy() {
    let server = MockServer::start_async().await;
    let ok = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/profile/demo");
            then.status(200).json_body(stored(4));
        })
        .await;

    let client = client_for(&server);
    client.get_or_create().await.unwrap();
    ok.delete_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/profile/demo");
            then.status(503).json_body(json!({
                "type": "about:blank",
                "title": "Internal error",
                "status": 503,
                "detail": "The profile store is unavailable",
                "code": "PROFILE_UPSTREAM"
            }));
        })
        .await;

    let p = client.get_or_create().await.unwrap();
    assert_eq!(p.version, 4);
}

#[tokio::test]
async fn late_older_response_does_not_replace_the_newer_copy() {
    let server = MockServer::start_async().await;
    let newer = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/profile/endorse/React");
            then.status(200).json_body(stored(7));
        })
        .await;
    // the GET was answered before the endorsement landed
    let older = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/profile/demo");
            then.status(200).json_body(stored(6));
        })
        .await;

    let client = client_for(&server);
    assert_eq!(client.endorse_skill("React").await.unwrap().version, 7);
    assert_eq!(client.get_or_create().await.unwrap().version, 6);
    assert_eq!(client.last_known().map(|p| p.version), Some(7));
    newer.assert_async().await;
    older.assert_async().await;
}

#[tokio::test]
async fn unreachable_without_cache_is_upstream_unavailable() {
    // grab a free port, then close it so connections are refused
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = Url::parse(&format!("http://{addr}/api")).unwrap();
    let client = RemoteProfileClient::new(TracedClient::default(), base, "demo");
    let err = client.get_or_create().await.unwrap_err();
    assert!(matches!(err, ProfileError::UpstreamUnavailable { .. }), "{err:?}");
}

#[tokio::test]
async fn replace_sends_only_the_set_fields() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/profile/demo")
                .header_exists("x-request-id")
                .json_body(json!({"avatarUrl": "/uploads/1.png"}));
            then.status(200).json_body(stored(5));
        })
        .await;

    let client = client_for(&server);
    let patch = ProfilePatch {
        avatar_url: Some("/uploads/1.png".into()),
        ..Default::default()
    };
    assert_eq!(client.replace(patch).await.unwrap().version, 5);
    m.assert_async().await;
}

#[tokio::test]
async fn problem_codes_become_contract_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/profile/endorse/Cobol");
            then.status(404).json_body(json!({
                "type": "about:blank",
                "title": "Skill not found",
                "status": 404,
                "detail": "Skill 'Cobol' was not found",
                "code": "PROFILE_SKILL_NOT_FOUND"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/profile/skills");
            then.status(400).json_body(json!({
                "type": "about:blank",
                "title": "Validation error",
                "status": 400,
                "detail": "skills.name: skill name cannot be empty",
                "code": "PROFILE_VALIDATION"
            }));
        })
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.endorse_skill("Cobol").await.unwrap_err(),
        ProfileError::SkillNotFound {
            name: "Cobol".into()
        }
    );
    assert_eq!(
        client.replace_skills(vec![" ".into()]).await.unwrap_err(),
        ProfileError::validation("skills.name: skill name cannot be empty")
    );
}

#[tokio::test]
async fn entry_removal_targets_the_collection_route() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    let path = format!("/api/profile/certification/{id}");
    let m = server
        .mock_async(|when, then| {
            when.method(DELETE).path(path.as_str());
            then.status(200).json_body(stored(6));
        })
        .await;

    let client = client_for(&server);
    let p = client
        .remove_nested_item(Collection::Certifications, id)
        .await
        .unwrap();
    assert_eq!(p.version, 6);
    m.assert_async().await;
}
