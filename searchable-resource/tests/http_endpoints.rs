//! End-to-end tests: axum router → builder → in-memory engine → JSON envelope

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use searchable_resource::prelude::*;

type Builder = SearchableBuilder<Arc<MemoryEngine>>;

fn users(count: usize) -> Arc<MemoryEngine> {
    let names = ["A", "B", "C", "D", "E", "F"];
    let rows = (0..count).map(|i| {
        json!({
            "id": i + 1,
            "name": names[i % names.len()],
            "email": format!("tester{}@test.com", i + 1),
            "role": if i % 2 == 0 { "admin" } else { "editor" },
        })
    });
    Arc::new(MemoryEngine::from_values(rows))
}

fn app<F>(engine: Arc<MemoryEngine>, configure: F) -> Router
where
    F: Fn(Builder) -> std::result::Result<Builder, ConfigurationError> + Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/users",
        get(move |params: RequestParams| {
            let engine = Arc::clone(&engine);
            let configure = configure.clone();
            async move {
                let builder = configure(SearchableBuilder::new(engine))?;
                builder.execute(&params).await
            }
        }),
    )
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn names(body: &Value) -> Vec<&str> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_default_order_is_id_descending() {
    let (status, body) = get_json(app(users(3), Ok), "/users").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["C", "B", "A"]);
    assert_eq!(body["query"], json!({"order_by": "id", "sort": "desc"}));
}

#[tokio::test]
async fn test_order_by_name_descending() {
    let router = app(users(3), |builder| Ok(builder.orderable(["id", "name"])));
    let (status, body) = get_json(router, "/users?order_by=name&sort=desc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["C", "B", "A"]);
    assert_eq!(body["query"]["order_by"], "name");
}

#[tokio::test]
async fn test_per_page_outside_options_is_rejected() {
    let engine = users(3);
    let router = app(Arc::clone(&engine), |builder| {
        Ok(builder.per_page_options([10, 25, 50, 100]).paginate(10))
    });

    let (status, body) = get_json(router, "/users?per_page=110").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&String> = body["errors"].as_object().unwrap().keys().collect();
    assert_eq!(fields, vec!["per_page"]);
    assert_eq!(engine.executions(), 0);
}

#[tokio::test]
async fn test_only_offending_fields_are_reported() {
    let engine = users(3);
    let router = app(Arc::clone(&engine), |builder| {
        Ok(builder
            .query(EqualsFilter::new("role").with_rule_str("string|in:admin,editor")?)?
            .paginate(10))
    });

    let (status, body) = get_json(router, "/users?role=owner&sort=desc&page=0").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&String> = body["errors"].as_object().unwrap().keys().collect();
    assert_eq!(fields, vec!["page", "role"]);
    assert_eq!(
        body["errors"]["role"],
        json!(["The selected role is invalid."])
    );
    assert_eq!(engine.executions(), 0);
}

#[tokio::test]
async fn test_search_matches_name_or_email() {
    let router = app(users(3), |builder| {
        builder.query(SearchFilter::new(["name", "email"]))
    });

    let (status, body) = get_json(router, "/users?search=tester2@test.com").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["email"], "tester2@test.com");
    assert_eq!(body["query"]["search"], "tester2@test.com");
}

#[tokio::test]
async fn test_search_wildcards_match_literally() {
    let router = app(users(3), |builder| {
        builder.query(SearchFilter::new(["name", "email"]))
    });

    let (status, body) = get_json(router, "/users?search=tester_").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_labeled_filter_options() {
    let router = app(users(3), |builder| {
        Ok(builder
            .query(
                CallbackFilter::new(["option"], |_query, _params| {})
                    .with_options(OptionSet::new().with("option", ["my_option"])),
            )?
            .labeled(true)
            .formatter(OptionsFormatter::new().with_title_case("option")))
    });

    let (_, body) = get_json(router, "/users").await;

    assert_eq!(
        body["options"]["option"],
        json!([{"label": "My Option", "value": "my_option"}])
    );
    assert_eq!(
        body["options"]["order_by"],
        json!([{"label": "Id", "value": "id"}])
    );
}

#[tokio::test]
async fn test_unpaginated_options_have_no_per_page() {
    let router = app(users(3), |builder| {
        Ok(builder.query(EqualsFilter::new("role").with_options(["admin", "editor"]))?)
    });

    let (_, body) = get_json(router, "/users?role=admin&page=2&per_page=999").await;

    let options = body["options"].as_object().unwrap();
    assert!(!options.contains_key("per_page"));
    assert_eq!(options["role"], json!(["admin", "editor"]));
    assert!(body.get("pagination").is_none());
    assert!(body["query"].get("page").is_none());
    assert_eq!(names(&body), vec!["C", "A"]);
}

#[tokio::test]
async fn test_first_and_last_page_flags() {
    let engine = users(6);
    let paginated = |builder: Builder| -> std::result::Result<Builder, ConfigurationError> {
        Ok(builder.per_page_options([4]).paginate(4))
    };

    let (_, first) = get_json(app(Arc::clone(&engine), paginated), "/users?page=1").await;
    assert_eq!(first["pagination"]["isFirstPage"], true);
    assert_eq!(first["pagination"]["isLastPage"], false);
    assert_eq!(first["pagination"]["total"], 6);
    assert_eq!(first["pagination"]["last_page"], 2);
    assert_eq!(first["data"].as_array().unwrap().len(), 4);

    let (_, last) = get_json(app(Arc::clone(&engine), paginated), "/users?page=2&per_page=4").await;
    assert_eq!(last["pagination"]["isFirstPage"], false);
    assert_eq!(last["pagination"]["isLastPage"], true);
    assert_eq!(last["pagination"]["from"], 5);
    assert_eq!(last["pagination"]["to"], 6);
    assert_eq!(last["query"]["page"], 2);
    assert_eq!(last["query"]["per_page"], 4);

    let (status, beyond) = get_json(app(engine, paginated), "/users?page=5").await;
    assert_eq!(status, StatusCode::OK);
    assert!(beyond["data"].as_array().unwrap().is_empty());
    assert_eq!(beyond["pagination"]["last_page"], 2);
    assert_eq!(beyond["pagination"]["isFirstPage"], false);
    assert_eq!(beyond["pagination"]["isLastPage"], false);
}

#[tokio::test]
async fn test_simple_pagination_has_unknown_last_page() {
    let router = app(users(6), |builder| {
        Ok(builder.per_page_options([4]).simple_paginate(4))
    });

    let (_, body) = get_json(router, "/users").await;

    assert_eq!(body["pagination"]["isFirstPage"], true);
    assert_eq!(body["pagination"]["isLastPage"], Value::Null);
    assert_eq!(body["pagination"]["has_more_pages"], true);
    assert!(body["pagination"].get("total").is_none());
}

#[tokio::test]
async fn test_filters_only_see_their_own_fields() {
    let seen: Arc<Mutex<Vec<(String, Vec<String>)>>> = Arc::default();
    let recorder = Arc::clone(&seen);

    let router = app(users(3), move |builder| {
        let role_seen = Arc::clone(&recorder);
        let search_seen = Arc::clone(&recorder);
        builder
            .query(CallbackFilter::new(["role"], move |query, params| {
                let keys = params.iter().map(|(key, _)| key.clone()).collect();
                role_seen.lock().unwrap().push(("role".into(), keys));
                if let Some(role) = params.get_str("role") {
                    query.where_eq("role", role.to_string());
                }
            }))?
            .query(CallbackFilter::new(["search"], move |_query, params| {
                let keys = params.iter().map(|(key, _)| key.clone()).collect();
                search_seen.lock().unwrap().push(("search".into(), keys));
            }))
    });

    let (status, _) = get_json(router, "/users?role=admin&search=tester&sort=asc").await;
    assert_eq!(status, StatusCode::OK);

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("role".to_string(), vec!["role".to_string()]),
            ("search".to_string(), vec!["search".to_string()]),
        ]
    );
}

#[tokio::test]
async fn test_registry_resources_and_extra_data() {
    let registry = Registry::new()
        .filter("role", || EqualsFilter::new("role"))
        .resource("summary", |row| json!({"id": row["id"], "contact": row["email"]}));

    let router = app(users(3), move |builder| {
        Ok(builder
            .queries_named(&registry, ["role"])?
            .resource_named(&registry, "summary")?
            .with("meta", json!({"version": 1})))
    });

    let (_, body) = get_json(router, "/users?role=editor").await;

    assert_eq!(body["data"], json!([{"id": 2, "contact": "tester2@test.com"}]));
    assert_eq!(body["meta"], json!({"version": 1}));
    assert_eq!(body["query"]["role"], "editor");
}

#[tokio::test]
async fn test_unknown_resource_is_a_server_error() {
    let router = app(users(3), |builder| {
        builder.resource_named(&Registry::new(), "missing")
    });

    let (status, body) = get_json(router, "/users").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CONFIGURATION_ERROR");
}
