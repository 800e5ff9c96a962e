//! Extension points for the host application.

use crate::catalog::Routine;
use crate::config::RoutineOptions;
use crate::endpoint::EndpointDescriptor;
use crate::error::AppError;
use crate::extractors::Identity;
use crate::sql::CommandParameter;
use async_trait::async_trait;
use std::sync::Arc;

/// Replaces the default `{prefix}/{schema}/{name}/` URL.
pub type UrlBuilder = Arc<dyn Fn(&Routine, &RoutineOptions) -> String + Send + Sync>;

/// Sees each descriptor after comment directives are applied; `None` drops the endpoint.
pub type EndpointCreated = Arc<dyn Fn(&Routine, EndpointDescriptor) -> Option<EndpointDescriptor> + Send + Sync>;

#[derive(Clone, Default)]
pub struct SynthesisHooks {
    pub url_builder: Option<UrlBuilder>,
    pub endpoint_created: Option<EndpointCreated>,
}

impl std::fmt::Debug for SynthesisHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisHooks")
            .field("url_builder", &self.url_builder.is_some())
            .field("endpoint_created", &self.endpoint_created.is_some())
            .finish()
    }
}

/// What a parameter hook sees about the call being made.
pub struct HookContext<'a> {
    pub routine: &'a Routine,
    pub endpoint: &'a EndpointDescriptor,
    pub identity: &'a Identity,
}

/// Runs after parameters are bound and before the routine executes.
/// May rewrite values (e.g. inject the caller's id) or reject the request.
#[async_trait]
pub trait ParameterHook: Send + Sync {
    async fn before_execute(&self, ctx: HookContext<'_>, params: &mut Vec<CommandParameter>) -> Result<(), AppError>;
}
