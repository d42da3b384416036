//! Handle SDK: generate axum handlers from a data model, with composable query scopes and lifecycle hooks.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handle;
pub mod mock;
pub mod model;
pub mod options;
pub mod response;
pub mod scopes;
pub mod sql;

pub use config::{load_model_config, parse_model_config, resolve, ModelConfig, ResolvedEntity, ResolvedModel};
pub use error::{ConfigError, HandleError};
pub use extractors::RequestContext;
pub use handle::{Endpoint, Flow, Handle, HandleOptions};
pub use mock::{FakeGenerator, MockGenerator};
pub use model::{CallArgs, Method, Model, ModelTransaction, PgModel};
pub use options::{get_options, OptionDescriptor, QueryOptions};
pub use response::{error_body, success_body};
pub use scopes::{mixin_scopes, Condition, Scope};
