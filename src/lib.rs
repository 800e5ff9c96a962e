//! Routine API: REST endpoints synthesized from PostgreSQL functions and procedures.

pub mod case;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod pg_type;
pub mod response;
pub mod routes;
pub mod routing;
pub mod service;
pub mod sql;
pub mod state;

pub use catalog::{load_routines, Routine, RoutineRow};
pub use config::{load_options_from_path, RoutineOptions};
pub use connection::{ConnectionFactory, ConnectionSource, DirectConnect};
pub use endpoint::{synthesize, EndpointDescriptor, HttpMethod, ParamLocation};
pub use error::{AppError, ConfigError};
pub use extractors::Identity;
pub use hooks::{HookContext, ParameterHook, SynthesisHooks};
pub use pg_type::{TypeCategory, TypeDescriptor};
pub use routes::{common_routes, common_routes_with_ready, routine_routes, with_routines};
pub use routing::{Endpoint, RoutingTable};
pub use state::AppState;
