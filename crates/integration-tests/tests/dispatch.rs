mod harness;

use harness::config::ConfigBuilder;
use harness::server::TestServer;
use harness::stubs::RecordedDuration;
use keel_core::Phase;
use serde_json::json;

async fn server() -> TestServer {
    TestServer::start(ConfigBuilder::new().build()).await.unwrap()
}

// -- Binding and validation --

#[tokio::test]
async fn valid_json_body_answers_declared_status() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .json(&json!({ "email": "ada@example.com", "name": "Ada" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201);
    assert_eq!(resp.headers()["content-type"], "application/json");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "id": "u_1", "email": "ada@example.com", "name": "Ada" }));
}

#[tokio::test]
async fn form_body_binds_like_json() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("email=grace%40example.com&name=Grace")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["email"], "grace@example.com");
}

#[tokio::test]
async fn missing_required_field_is_a_validation_error() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["errors"], json!([{ "field": "email", "message": "required" }]));
}

#[tokio::test]
async fn every_failing_field_is_reported() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .json(&json!({ "email": "not-an-email", "name": "A" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    let fields: Vec<_> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(fields, ["email", "name"]);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .header("content-type", "application/json")
        .body("{\"email\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn unsupported_content_type_is_a_bad_request() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .header("content-type", "text/plain")
        .body("email=ada@example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn path_parameters_bind_into_input() {
    let server = server().await;

    let resp = server.client().get(server.url("/users/grace")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["id"], "grace");
    assert_eq!(body["email"], "grace@example.com");
}

// -- Error translation --

#[tokio::test]
async fn missing_row_is_not_found() {
    let server = server().await;

    let resp = server.client().get(server.url("/users/missing")).send().await.unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "code": "NOT_FOUND", "message": "resource not found" }));
}

#[tokio::test]
async fn unique_violation_names_the_column() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .json(&json!({ "email": "taken@example.com", "name": "Ada" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["message"], "a record with this email already exists");
}

#[tokio::test]
async fn internal_errors_hide_their_cause() {
    let server = server().await;

    let resp = server.client().get(server.url("/leak")).send().await.unwrap();

    assert_eq!(resp.status(), 500);
    let text = resp.text().await.unwrap();
    assert!(!text.contains("hunter2"));
    assert!(!text.contains("10.0.0.5"));

    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["message"], keel_core::GENERIC_INTERNAL_MESSAGE);
}

// -- Authorization guard --

#[tokio::test]
async fn anonymous_caller_needs_authentication() {
    let server = server().await;

    let resp = server.client().get(server.url("/me")).send().await.unwrap();

    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["message"], "authentication required");
}

#[tokio::test]
async fn rejected_credential_is_unauthorized() {
    let server = server().await;

    for token in ["bogus", "outage"] {
        let resp = server
            .client()
            .get(server.url("/me"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401, "token {token}");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "invalid or expired credentials");
    }
}

#[tokio::test]
async fn verified_identity_reaches_the_handler() {
    let server = server().await;

    let resp = server
        .client()
        .get(server.url("/me"))
        .header("authorization", "bearer user-token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let server = server().await;

    let resp = server
        .client()
        .delete(server.url("/users/7"))
        .bearer_auth("user-token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(body["message"], "missing permission 'users:delete'");
}

#[tokio::test]
async fn public_routes_ignore_bad_credentials() {
    let server = server().await;

    let resp = server
        .client()
        .get(server.url("/users/grace"))
        .bearer_auth("bogus")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

// -- Response shapes --

#[tokio::test]
async fn no_content_route_answers_204() {
    let server = server().await;

    let resp = server
        .client()
        .delete(server.url("/users/7"))
        .bearer_auth("admin-token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 204);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn file_route_answers_attachment() {
    let server = server().await;

    let resp = server
        .client()
        .get(server.url("/reports/q3"))
        .bearer_auth("admin-token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "text/csv");
    assert_eq!(resp.headers()["content-disposition"], "attachment; filename=\"q3.csv\"");
    assert_eq!(resp.text().await.unwrap(), "month,total\njan,10\n");
}

// -- Fallbacks --

#[tokio::test]
async fn unknown_route_is_not_found() {
    let server = server().await;

    let resp = server.client().get(server.url("/nope")).send().await.unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "code": "NOT_FOUND", "message": "route not found" }));
}

#[tokio::test]
async fn wrong_method_is_405_with_bad_request_code() {
    let server = server().await;

    let resp = server.client().put(server.url("/users")).send().await.unwrap();

    assert_eq!(resp.status(), 405);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "code": "BAD_REQUEST", "message": "method not allowed" }));
}

// -- Phase recording --

fn phases(durations: &[RecordedDuration]) -> Vec<(Phase, u16)> {
    durations.iter().map(|d| (d.phase, d.status)).collect()
}

#[tokio::test]
async fn successful_dispatch_records_both_phases_once() {
    let server = server().await;

    let resp = server.client().get(server.url("/users/grace")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let recorded = server.observability().durations_for("get_user");
    assert_eq!(phases(&recorded), [(Phase::Bind, 200), (Phase::Handler, 200)]);
}

#[tokio::test]
async fn rejected_input_records_only_bind() {
    let server = server().await;

    let resp = server
        .client()
        .post(server.url("/users"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let recorded = server.observability().durations_for("create_user");
    assert_eq!(phases(&recorded), [(Phase::Bind, 400)]);
}

#[tokio::test]
async fn guard_rejection_records_only_bind() {
    let server = server().await;

    let resp = server.client().get(server.url("/me")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let recorded = server.observability().durations_for("whoami");
    assert_eq!(phases(&recorded), [(Phase::Bind, 401)]);
}

#[tokio::test]
async fn handler_error_status_is_recorded() {
    let server = server().await;

    let resp = server.client().get(server.url("/users/missing")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let recorded = server.observability().durations_for("get_user");
    assert_eq!(phases(&recorded), [(Phase::Bind, 200), (Phase::Handler, 404)]);
}
