//! Proxied model methods, their declared arity and HTTP verb.

use axum::http;
use serde_json::Value;

use crate::options::QueryOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    FindAll,
    FindOne,
    FindByPk,
    FindAndCountAll,
    Count,
    Max,
    Min,
    Sum,
    Describe,
    Create,
    BulkCreate,
    Upsert,
    FindOrCreate,
    Update,
    Destroy,
}

impl Method {
    pub const ALL: [Method; 15] = [
        Method::FindAll,
        Method::FindOne,
        Method::FindByPk,
        Method::FindAndCountAll,
        Method::Count,
        Method::Max,
        Method::Min,
        Method::Sum,
        Method::Describe,
        Method::Create,
        Method::BulkCreate,
        Method::Upsert,
        Method::FindOrCreate,
        Method::Update,
        Method::Destroy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::FindAll => "findAll",
            Method::FindOne => "findOne",
            Method::FindByPk => "findByPk",
            Method::FindAndCountAll => "findAndCountAll",
            Method::Count => "count",
            Method::Max => "max",
            Method::Min => "min",
            Method::Sum => "sum",
            Method::Describe => "describe",
            Method::Create => "create",
            Method::BulkCreate => "bulkCreate",
            Method::Upsert => "upsert",
            Method::FindOrCreate => "findOrCreate",
            Method::Update => "update",
            Method::Destroy => "destroy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// 1: `(options)`, 2: `(values, options)`, 0: no arguments.
    pub fn arity(self) -> usize {
        match self {
            Method::Describe => 0,
            Method::FindByPk | Method::Create | Method::BulkCreate | Method::Upsert | Method::Update => 2,
            _ => 1,
        }
    }

    /// Verb the generated shortcut handler answers to; also decides where request data is read from.
    pub fn http_method(self) -> http::Method {
        match self {
            Method::Create | Method::BulkCreate | Method::Upsert | Method::FindOrCreate => http::Method::POST,
            Method::Update => http::Method::PUT,
            Method::Destroy => http::Method::DELETE,
            _ => http::Method::GET,
        }
    }
}

/// Argument list handed to [`crate::model::Model::call`].
#[derive(Clone, Debug, PartialEq)]
pub enum CallArgs {
    Empty,
    Options(QueryOptions),
    ValuesAndOptions(Value, QueryOptions),
}

impl CallArgs {
    /// Shapes the arguments after the declared arity.
    pub fn build(arity: usize, values: Value, options: QueryOptions) -> Self {
        match arity {
            1 => CallArgs::Options(options),
            2 => CallArgs::ValuesAndOptions(values, options),
            _ => CallArgs::Empty,
        }
    }

    pub fn options(&self) -> Option<&QueryOptions> {
        match self {
            CallArgs::Options(o) | CallArgs::ValuesAndOptions(_, o) => Some(o),
            CallArgs::Empty => None,
        }
    }

    pub fn values(&self) -> Option<&Value> {
        match self {
            CallArgs::ValuesAndOptions(v, _) => Some(v),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (Option<Value>, QueryOptions) {
        match self {
            CallArgs::Empty => (None, QueryOptions::new()),
            CallArgs::Options(o) => (None, o),
            CallArgs::ValuesAndOptions(v, o) => (Some(v), o),
        }
    }
}
