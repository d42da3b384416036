#![allow(dead_code)]

//! Recording model and request helpers shared by the integration tests.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use handle_sdk::{CallArgs, HandleError, Method, Model, ModelTransaction};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt; // for oneshot

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub method: Method,
    pub args: CallArgs,
    pub scopes: Vec<String>,
    pub in_tx: bool,
}

/// Model double: records every call and answers with canned replies.
#[derive(Clone, Default)]
pub struct RecordingModel {
    calls: Arc<Mutex<Vec<Call>>>,
    events: Arc<Mutex<Vec<String>>>,
    replies: Arc<Mutex<HashMap<Method, Result<Value, String>>>>,
    scopes: Vec<String>,
    in_tx: bool,
}

impl RecordingModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, method: Method, value: Value) {
        self.replies.lock().unwrap().insert(method, Ok(value));
    }

    pub fn fail(&self, method: Method, message: &str) {
        self.replies.lock().unwrap().insert(method, Err(message.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Call {
        self.calls().pop().expect("no call recorded")
    }

    /// Transaction lifecycle: "begin", "commit", "rollback".
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Model for RecordingModel {
    fn name(&self) -> &str {
        "posts"
    }

    async fn call(&self, method: Method, args: CallArgs) -> Result<Value, HandleError> {
        self.calls.lock().unwrap().push(Call {
            method,
            args,
            scopes: self.scopes.clone(),
            in_tx: self.in_tx,
        });
        match self.replies.lock().unwrap().get(&method) {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(msg)) => Err(HandleError::Validation(msg.clone())),
            None => Ok(json!({ "method": method.name() })),
        }
    }

    fn scoped(&self, names: &[String]) -> Result<Arc<dyn Model>, HandleError> {
        if let Some(bad) = names.iter().find(|n| n.as_str() == "missing") {
            return Err(HandleError::UnknownScope(bad.clone()));
        }
        let mut model = self.clone();
        model.scopes.extend(names.iter().cloned());
        Ok(Arc::new(model))
    }

    async fn begin(&self) -> Result<Box<dyn ModelTransaction>, HandleError> {
        self.events.lock().unwrap().push("begin".into());
        let mut model = self.clone();
        model.in_tx = true;
        Ok(Box::new(RecordingTx { model }))
    }
}

struct RecordingTx {
    model: RecordingModel,
}

#[async_trait]
impl ModelTransaction for RecordingTx {
    fn model(&self) -> Arc<dyn Model> {
        Arc::new(self.model.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), HandleError> {
        self.model.events.lock().unwrap().push("commit".into());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), HandleError> {
        self.model.events.lock().unwrap().push("rollback".into());
        Ok(())
    }
}

pub fn obj(v: Value) -> serde_json::Map<String, Value> {
    v.as_object().cloned().expect("object")
}

/// Sends one request through `app` and returns the status with the JSON body.
pub async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).expect("json body");
    (status, json)
}
