//! Template engine for dynamic responses.
//!
//! Uses Handlebars; templates see the inbound request under `request`.

use crate::error::RenderError;
use crate::request::Request;
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;

/// Template engine for rendering dynamic responses.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

#[derive(Debug, Serialize)]
struct TemplateContext {
    request: RequestContext,
}

/// Request fields visible to templates.
#[derive(Debug, Serialize)]
struct RequestContext {
    method: String,
    url: String,
    path: String,
    /// First value per parameter
    query: HashMap<String, String>,
    /// First value per header, lowercase names
    headers: HashMap<String, String>,
    /// URL regex capture groups
    captures: HashMap<String, String>,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    json: Option<serde_json::Value>,
}

impl TemplateEngine {
    /// Create a new template engine.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.register_helper("uuid", Box::new(uuid_helper));
        handlebars.register_helper("now", Box::new(now_helper));
        handlebars.register_helper("random", Box::new(random_helper));
        handlebars.register_helper("default", Box::new(default_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));

        // Bodies are not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render a template against a request.
    pub fn render(
        &self,
        template: &str,
        request: &Request,
        captures: HashMap<String, String>,
    ) -> Result<String, RenderError> {
        let body = request.body_text().into_owned();
        let json = serde_json::from_str(&body).ok();

        let ctx = TemplateContext {
            request: RequestContext {
                method: request.method.clone(),
                url: request.url.clone(),
                path: request.path().to_string(),
                query: request.query_params(),
                headers: request.header_map(),
                captures,
                body,
                json,
            },
        };

        self.handlebars
            .render_template(template, &ctx)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Custom Handlebars helpers

fn uuid_helper(
    _: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    out.write(&uuid::Uuid::new_v4().to_string())?;
    Ok(())
}

fn now_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or("%Y-%m-%dT%H:%M:%S%.3fZ");

    out.write(&chrono::Utc::now().format(format).to_string())?;
    Ok(())
}

fn random_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    use rand::Rng;

    let min = h.param(0).and_then(|v| v.value().as_i64()).unwrap_or(0);
    let max = h.param(1).and_then(|v| v.value().as_i64()).unwrap_or(100);
    let value = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    out.write(&value.to_string())?;
    Ok(())
}

fn default_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let fallback = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("");

    match h.param(0).map(|v| v.value()) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => out.write(s)?,
        Some(v) if !v.is_null() && !v.is_string() => out.write(&v.to_string())?,
        _ => out.write(fallback)?,
    }
    Ok(())
}

fn upper_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&value.to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&value.to_lowercase())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(template: &str, request: &Request) -> String {
        TemplateEngine::new()
            .render(template, request, HashMap::new())
            .unwrap()
    }

    #[test]
    fn test_request_fields() {
        let request = Request::new("GET", "/list?page=1");
        assert_eq!(
            render("{{request.method}} {{request.path}} page {{request.query.page}}", &request),
            "GET /list page 1"
        );
    }

    #[test]
    fn test_headers() {
        let request = Request::new("GET", "/").with_header("User-Agent", "test-client");
        assert_eq!(
            render("Client: {{request.headers.user-agent}}", &request),
            "Client: test-client"
        );
    }

    #[test]
    fn test_request_json_body() {
        let request = Request::new("POST", "/users").with_body(r#"{"name":"John"}"#);
        assert_eq!(render("Name: {{request.json.name}}", &request), "Name: John");
    }

    #[test]
    fn test_captures() {
        let mut captures = HashMap::new();
        captures.insert("id".to_string(), "123".to_string());
        let result = TemplateEngine::new()
            .render("User {{request.captures.id}}", &Request::new("GET", "/users/123"), captures)
            .unwrap();
        assert_eq!(result, "User 123");
    }

    #[test]
    fn test_uuid_helper() {
        let result = render("ID: {{uuid}}", &Request::new("GET", "/"));
        let id = result.strip_prefix("ID: ").unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_default_helper() {
        assert_eq!(
            render(
                "Value: {{default request.query.missing \"fallback\"}}",
                &Request::new("GET", "/")
            ),
            "Value: fallback"
        );
    }

    #[test]
    fn test_upper_lower_helpers() {
        let request = Request::new("GET", "/?name=John");
        assert_eq!(
            render(
                "{{upper request.query.name}} {{lower request.query.name}}",
                &request
            ),
            "JOHN john"
        );
    }

    #[test]
    fn test_invalid_template_is_render_error() {
        let result = TemplateEngine::new().render("{{#if}}", &Request::new("GET", "/"), HashMap::new());
        assert!(matches!(result, Err(RenderError::Template(_))));
    }
}
