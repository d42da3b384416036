#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Shortcut endpoints driven through a real axum router.

mod common;

use axum::{http::StatusCode, Router};
use common::{obj, send, RecordingModel};
use handle_sdk::{
    scopes::{includes, order, pagination, where_},
    CallArgs, FakeGenerator, Handle, HandleError, HandleOptions, Method, OptionDescriptor,
};
use serde_json::{json, Value};

fn trail(data: Value, step: &str) -> Value {
    let mut data = data;
    let mut steps = data["trail"].as_array().cloned().unwrap_or_default();
    steps.push(json!(step));
    data["trail"] = Value::Array(steps);
    data
}

#[tokio::test]
async fn find_all_reads_the_query_string() {
    let model = RecordingModel::new();
    model.reply(Method::FindAll, json!([{"id": 3}]));
    let handle = Handle::new(model.clone(), HandleOptions::new());
    let app = Router::new().route("/posts", handle.find_all("id, author_id").into());

    let (status, body) = send(app, "GET", "/posts?id=3&other=x", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": [{"id": 3}], "meta": {"count": 1}}));
    let call = model.last_call();
    assert_eq!(call.method, Method::FindAll);
    assert_eq!(call.args, CallArgs::Options(obj(json!({"where": {"id": "3"}}))));
}

#[tokio::test]
async fn two_argument_methods_get_values_and_options() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());
    let app = Router::new().route("/posts", handle.create(json!({"fields": ["title"]})).into());

    let (status, body) = send(app, "POST", "/posts", Some(r#"{"title": "hello", "views": 2}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"method": "create"}}));
    assert_eq!(
        model.last_call().args,
        CallArgs::ValuesAndOptions(json!({"title": "hello", "views": 2}), obj(json!({"fields": ["title"]})))
    );
}

#[tokio::test]
async fn zero_argument_methods_get_nothing() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());
    let app = Router::new().route("/posts/describe", handle.describe("id").into());

    let (status, _) = send(app, "GET", "/posts/describe?id=1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(model.last_call().args, CallArgs::Empty);
}

#[tokio::test]
async fn empty_body_is_an_empty_object() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());
    let app = Router::new().route("/posts", handle.create(None::<Value>).into());

    let (status, _) = send(app, "POST", "/posts", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(model.last_call().args, CallArgs::ValuesAndOptions(json!({}), Default::default()));
}

#[tokio::test]
async fn invalid_json_is_a_bad_request() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());
    let app = Router::new().route("/posts", handle.create(None::<Value>).into());

    let (status, body) = send(app, "POST", "/posts", Some("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn hooks_run_global_then_local() {
    let model = RecordingModel::new();
    model.reply(Method::FindOne, json!({"id": 1}));
    let options = HandleOptions::new()
        .before(|data, _| Ok(trail(data, "global")))
        .after(|result, _| Ok(json!({"global": result})));
    let handle = Handle::new(model.clone(), options);
    let endpoint = handle
        .find_one(OptionDescriptor::func(|data, _| Ok(json!({"trail": data["trail"].clone()}))))
        .before(|data, _| Ok(trail(data, "local")))
        .after(|result, _| Ok(json!({"local": result})));
    let app = Router::new().route("/posts/one", endpoint.into());

    let (status, body) = send(app, "GET", "/posts/one", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"local": {"global": {"id": 1}}}}));
    assert_eq!(
        model.last_call().args,
        CallArgs::Options(obj(json!({"trail": ["global", "local"]})))
    );
}

#[tokio::test]
async fn before_hook_errors_skip_the_model() {
    let model = RecordingModel::new();
    let options = HandleOptions::new().before(|_, ctx| match ctx.header("x-user") {
        Some(_) => Ok(json!({})),
        None => Err(HandleError::BadRequest("x-user header required".into())),
    });
    let handle = Handle::new(model.clone(), options);
    let app = Router::new().route("/posts", handle.find_all(None::<Value>).into());

    let (status, body) = send(app, "GET", "/posts", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], json!("bad request: x-user header required"));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn data_hook_shapes_success_and_error_bodies() {
    let model = RecordingModel::new();
    model.fail(Method::Update, "title is required");
    let options = HandleOptions::new().data(|err, result, _| match err {
        Some(e) => json!({"ok": false, "reason": e.to_string()}),
        None => json!({"ok": true, "result": result}),
    });
    let handle = Handle::new(model.clone(), options);
    let app = Router::new()
        .route("/posts", handle.count(None::<Value>).into())
        .route("/posts/update", handle.update("id").into());

    let (status, body) = send(app.clone(), "GET", "/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "result": {"method": "count"}}));

    let (status, body) = send(app, "PUT", "/posts/update", Some(r#"{"id": 1}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"ok": false, "reason": "validation: title is required"}));
}

#[tokio::test]
async fn method_scopes_are_consumed_by_the_next_shortcut() {
    let model = RecordingModel::new();
    let mut handle = Handle::new(model.clone(), HandleOptions::new());
    handle.default_scope([order(json!(["id", "DESC"]))]);
    let scoped = handle.scope([where_("title"), pagination(10, 0)]).find_all(None::<Value>);
    let plain = handle.find_all(None::<Value>);
    let app = Router::new()
        .route("/scoped", scoped.into())
        .route("/plain", plain.into());

    send(app.clone(), "GET", "/scoped?title=rust&page=2", None).await;
    assert_eq!(
        model.last_call().args,
        CallArgs::Options(obj(json!({
            "order": ["id", "DESC"],
            "where": {"title": "rust"},
            "limit": 10,
            "offset": 20
        })))
    );

    send(app, "GET", "/plain?title=rust", None).await;
    assert_eq!(
        model.last_call().args,
        CallArgs::Options(obj(json!({"order": ["id", "DESC"]})))
    );
}

#[tokio::test]
async fn later_scopes_win_and_objects_merge() {
    let model = RecordingModel::new();
    let mut handle = Handle::new(model.clone(), HandleOptions::new());
    handle.default_scope([where_("author_id"), includes(["author"])]);
    let endpoint = handle
        .scope([pagination(5, 0)])
        .find_all(json!({"limit": 1, "where": {"draft": false}}));
    let app = Router::new().route("/posts", endpoint.into());

    send(app, "GET", "/posts?author_id=4", None).await;

    assert_eq!(
        model.last_call().args,
        CallArgs::Options(obj(json!({
            "where": {"draft": false, "author_id": "4"},
            "include": ["author"],
            "limit": 5,
            "offset": 0
        })))
    );
}

#[tokio::test]
async fn raw_scope_uses_named_model_scopes() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());

    assert!(matches!(handle.raw_scope(["missing"]), Err(HandleError::UnknownScope(_))));

    let published = handle.raw_scope(["published"]).unwrap();
    let app = Router::new().route("/published", published.find_all(None::<Value>).into());
    send(app, "GET", "/published", None).await;

    assert_eq!(model.last_call().scopes, vec!["published".to_string()]);
}

#[tokio::test]
async fn raw_calls_return_the_model_result() {
    let model = RecordingModel::new();
    model.reply(Method::Count, json!(7));
    let handle = Handle::new(model.clone(), HandleOptions::new());

    handle.scope([order(json!("id"))]);
    let n = handle.raw(Method::Count, "author_id", json!({"author_id": 2})).await.unwrap();
    assert_eq!(n, json!(7));
    assert_eq!(
        model.last_call().args,
        CallArgs::Options(obj(json!({"where": {"author_id": 2}, "order": "id"})))
    );

    handle.raw(Method::Count, "author_id", json!({"author_id": 2})).await.unwrap();
    assert_eq!(
        model.last_call().args,
        CallArgs::Options(obj(json!({"where": {"author_id": 2}})))
    );
}

#[tokio::test]
async fn toggle_creates_then_destroys() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());
    let app = Router::new().route("/like", handle.toggle("post_id, user_id").into());
    let body = r#"{"post_id": 1, "user_id": 9}"#;

    model.reply(Method::FindOne, Value::Null);
    send(app.clone(), "POST", "/like", Some(body)).await;
    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].method, Method::Create);
    assert_eq!(
        calls[1].args,
        CallArgs::ValuesAndOptions(json!({"post_id": 1, "user_id": 9}), Default::default())
    );

    model.reply(Method::FindOne, json!({"post_id": 1, "user_id": 9}));
    send(app, "POST", "/like", Some(body)).await;
    let last = model.last_call();
    assert_eq!(last.method, Method::Destroy);
    assert_eq!(
        last.args,
        CallArgs::Options(obj(json!({"where": {"post_id": 1, "user_id": 9}})))
    );
}

#[tokio::test]
async fn mock_needs_a_generator() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());
    assert!(matches!(handle.mock(json!({"data|2": [{}]})), Err(HandleError::MockUnavailable)));

    let handle = Handle::new(model.clone(), HandleOptions::new().mock(FakeGenerator));
    let endpoint = handle.mock(json!({"data|3": [{"title": "@title", "draft": true}]})).unwrap();
    let app = Router::new().route("/mock", endpoint.into());

    let (status, _) = send(app, "POST", "/mock", None).await;

    assert_eq!(status, StatusCode::OK);
    let call = model.last_call();
    assert_eq!(call.method, Method::BulkCreate);
    let rows = call.args.values().and_then(Value::as_array).cloned().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["draft"] == json!(true) && r["title"].is_string()));
}

#[tokio::test]
async fn mock_consumes_method_scopes_and_applies_defaults() {
    let model = RecordingModel::new();
    let mut handle = Handle::new(model.clone(), HandleOptions::new().mock(FakeGenerator));
    handle.default_scope([where_("batch")]);
    let seeded = handle
        .scope([order(json!("title"))])
        .mock(json!({"data|2": [{"title": "@title"}]}))
        .unwrap();
    let plain = handle.find_all(None::<Value>);
    let app = Router::new()
        .route("/mock", seeded.into())
        .route("/plain", plain.into());

    let (status, _) = send(app.clone(), "POST", "/mock", Some(r#"{"batch": 7}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let call = model.last_call();
    assert_eq!(call.method, Method::BulkCreate);
    assert_eq!(call.args.options(), Some(&obj(json!({"where": {"batch": 7}, "order": "title"}))));
    assert_eq!(call.args.values().and_then(Value::as_array).map(Vec::len), Some(2));

    send(app, "GET", "/plain", None).await;
    let call = model.last_call();
    assert_eq!(call.method, Method::FindAll);
    assert_eq!(call.args, CallArgs::Options(Default::default()));
}

#[tokio::test]
async fn wrong_verb_is_rejected_by_the_router() {
    let model = RecordingModel::new();
    let handle = Handle::new(model.clone(), HandleOptions::new());
    let app = Router::new().route("/posts", handle.destroy("id").into());

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/posts?id=1")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(model.calls().is_empty());
}
