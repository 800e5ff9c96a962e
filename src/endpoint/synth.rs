//! One routine in, zero or one endpoint descriptor out.

use crate::case::to_kebab_case;
use crate::catalog::Routine;
use crate::config::{CommentsMode, RoutineOptions};
use crate::endpoint::comment::{parse_comment, Directive};
use crate::endpoint::{EndpointDescriptor, HttpMethod, ParamLocation};
use crate::hooks::SynthesisHooks;
use axum::http::HeaderMap;

/// `{prefix}/{schema}/{name}/` in kebab-case; the `public` schema is left out.
pub fn default_url(routine: &Routine, options: &RoutineOptions) -> String {
    let mut url = options.url_prefix.clone();
    if routine.schema != "public" {
        url.push('/');
        url.push_str(&to_kebab_case(&routine.schema));
    }
    url.push('/');
    url.push_str(&to_kebab_case(&routine.name));
    url.push('/');
    url
}

fn default_method(routine: &Routine) -> HttpMethod {
    if routine.name.to_lowercase().contains("get") {
        HttpMethod::Get
    } else {
        HttpMethod::Post
    }
}

pub fn synthesize(routine: &Routine, options: &RoutineOptions, hooks: &SynthesisHooks) -> Option<EndpointDescriptor> {
    let mut method = default_method(routine);
    let mut url = match &hooks.url_builder {
        Some(build) => build(routine, options),
        None => default_url(routine, options),
    };
    let mut location: Option<ParamLocation> = None;
    let mut requires_authorization = options.require_authorization;
    let mut command_timeout = options.command_timeout();
    let mut content_type = None;
    let mut headers = HeaderMap::new();
    let mut has_http_tag = false;

    if options.comments_mode != CommentsMode::Ignore {
        let comment = routine.comment.as_deref().unwrap_or("");
        for parsed in parse_comment(comment) {
            for error in &parsed.errors {
                tracing::warn!(
                    routine = %routine.qualified_name(),
                    line = %parsed.line,
                    error = %error,
                    "invalid comment directive, keeping previous value"
                );
            }
            let Some(directive) = parsed.directive else {
                continue;
            };
            match directive {
                Directive::Http { method: m, path } => {
                    has_http_tag = true;
                    if let Some(m) = m {
                        method = m;
                    }
                    if let Some(p) = path {
                        url = p;
                    }
                }
                Directive::Path(p) => url = p,
                Directive::ParamLocation(l) => location = Some(l),
                Directive::Authorize => requires_authorization = true,
                Directive::AllowAnonymous => requires_authorization = false,
                Directive::CommandTimeout(t) => command_timeout = Some(t),
                Directive::ContentType(ct) => content_type = Some(ct),
                Directive::Header(name, value) => {
                    headers.append(name, value);
                }
            }
        }
    }

    if options.comments_mode == CommentsMode::OnlyWithHttpTag && !has_http_tag {
        tracing::debug!(routine = %routine.qualified_name(), "no HTTP tag, skipped");
        return None;
    }

    let descriptor = EndpointDescriptor {
        url,
        method,
        param_location: location.unwrap_or_else(|| method.default_location()),
        requires_authorization,
        param_names: routine.params.iter().map(|p| options.name_case.convert(&p.name)).collect(),
        column_names: routine.columns.iter().map(|c| options.name_case.convert(&c.name)).collect(),
        command_timeout,
        content_type,
        headers,
    };

    match &hooks.endpoint_created {
        Some(created) => created(routine, descriptor),
        None => Some(descriptor),
    }
}
