//! Example server: loads the model file from CONFIG_PATH and mounts generated handlers for `posts`.

use axum::{http::Method as HttpMethod, routing::MethodRouter, Router};
use handle_sdk::{
    extractors::BODY_LIMIT,
    load_model_config, resolve,
    scopes::{fuzzy_query_keyed, includes, it, order, pagination_default, where_},
    FakeGenerator, Handle, HandleError, HandleOptions, Method, PgModel,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("handle_sdk=info".parse()?))
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/handle".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "demos/model.json".into());
    let config = load_model_config(&config_path).await?;
    let model = Arc::new(resolve(&config)?);

    let options = HandleOptions::new()
        .before(|data, ctx| {
            tracing::debug!(uri = %ctx.uri, "before");
            Ok(data)
        })
        .mock(FakeGenerator);
    let mut posts = Handle::new(PgModel::new(pool, model, "posts")?, options);
    posts.default_scope([order(json!(["id", "DESC"]))]);

    let published = posts.raw_scope(["published"])?;

    let search = posts
        .scope([
            fuzzy_query_keyed("title", "q"),
            pagination_default(),
            it(vec!["author".into()], vec![includes(["author"])], vec![]),
        ])
        .find_all(None::<Value>);

    let publish = posts.transaction(HttpMethod::PUT, |flow| async move {
        let id = flow.data().get("id").cloned().unwrap_or(Value::Null);
        let post = flow.raw_find_by_pk(None::<Value>).await?;
        if post.is_null() {
            return Err(HandleError::NotFound(format!("post {}", id)));
        }
        flow.raw_with(Method::Update, "id", json!({ "draft": false })).await
    });

    let mock_rule = json!({
        "data|10": [{"title": "@title", "name": "@name", "body": "@paragraph", "views": "@integer", "draft": "@bool"}]
    });

    let app = Router::new()
        .route("/posts", MethodRouter::from(search).merge(posts.create(None::<Value>).into()))
        .route("/posts/one", posts.find_by_pk(None::<Value>).into())
        .route("/posts/count", posts.count("author_id").into())
        .route("/posts/update", posts.scope([where_("id")]).update(None::<Value>).into())
        .route("/posts/destroy", posts.destroy("id").into())
        .route("/posts/publish", publish.into())
        .route("/posts/like", posts.toggle("id, author_id").into())
        .route("/posts/mock", posts.mock(mock_rule)?.into())
        .route("/posts/published", published.find_all(None::<Value>).into())
        .route("/posts/describe", posts.describe(None::<Value>).into())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http());

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
