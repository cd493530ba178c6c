/* 📖 # What happens to a request that reaches the docs middleware?

Requests that are not GET/HEAD, or whose decoded path does not start with the mount path, are
passed on to the next service untouched. Docs requests go through the same steps every time:

1. wait until the initial build is settled (a failed build answers 500),
2. validate, using the cached outcome when the document has not changed,
3. expand the document for this request and render it, either through a configured
   `RequestHook` or the built-in renderer.

Validation never short-circuits the request: an invalid document still reaches the hook, which
can decide to render anyway.
*/

use percent_encoding::percent_decode_str;
use serde_json::Value;
use tracing::{debug, instrument};

use swagdoc_base::SwagdocResult;
use swagdoc_base::pal::http::{HttpMethod, HttpRequest, HttpResponse, HttpService};

use crate::builder::ApiDocs;
use crate::expander::{RequestContext, expand};
use crate::render::{DocsRenderer, RenderContext};

/// Renders a docs request with the built-in renderer, on behalf of a `RequestHook`.
#[derive(Debug)]
pub struct RenderNow<'a> {
    renderer: &'a DocsRenderer,
    path: &'a str,
    accept: Option<&'a str>,
    context: &'a RenderContext,
}

impl RenderNow<'_> {
    /// Render the request's own context.
    pub fn render(&self) -> SwagdocResult<HttpResponse> {
        self.renderer.render(self.path, self.accept, self.context)
    }

    /// Render with `data` in place of the expanded document.
    pub fn render_with(&self, data: Value) -> SwagdocResult<HttpResponse> {
        let context = RenderContext {
            data,
            ..self.context.clone()
        };
        self.renderer.render(self.path, self.accept, &context)
    }
}

/// Custom handling of docs requests, called instead of the built-in renderer.
///
/// A hook may answer itself, render through `render`, or hand the request to `next`, the service
/// the middleware wraps.
pub trait RequestHook: std::fmt::Debug + Send + Sync + 'static {
    fn handle(
        &self,
        request: &HttpRequest,
        context: &RenderContext,
        render: &RenderNow<'_>,
        next: &dyn HttpService,
    ) -> SwagdocResult<HttpResponse>;
}

/// Serves the docs of one mount and delegates everything else to `next`.
#[derive(Debug)]
pub struct ApiDocsMiddleware {
    api_docs: ApiDocs,
    renderer: DocsRenderer,
    hook: Option<Box<dyn RequestHook>>,
    next: Box<dyn HttpService>,
}

impl ApiDocsMiddleware {
    pub fn new(api_docs: ApiDocs, next: Box<dyn HttpService>) -> Self {
        let renderer = DocsRenderer::from_mount(api_docs.pal(), api_docs.mount());
        Self {
            api_docs,
            renderer,
            hook: None,
            next,
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn RequestHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Decoded path of a docs request, `None` for requests meant for `next`.
    fn docs_path(&self, request: &HttpRequest) -> Option<String> {
        if !request.method().is_read() {
            return None;
        }
        let path = percent_decode_str(request.path_without_query()).decode_utf8_lossy();
        path.starts_with(self.api_docs.mount().path.as_str())
            .then(|| path.into_owned())
    }

    fn serve_docs(&self, request: &HttpRequest, path: &str) -> SwagdocResult<HttpResponse> {
        let docs = self.api_docs.docs();
        if let Err(error) = docs.wait_ready() {
            debug!(state = "DONE", error = %error, "document build failed");
            return Ok(self
                .renderer
                .with_cors(HttpResponse::internal_error().with_body(error.to_string())));
        }

        debug!(state = "VALIDATING");
        let outcome = docs.ensure_valid();

        debug!(state = "RENDERING", valid = outcome.is_valid());
        let swagger_doc = docs.snapshot();
        let context = RenderContext {
            data: expand(&swagger_doc, &RequestContext::from_request(request)),
            swagger_doc,
            is_valid: outcome.is_valid(),
            errors: outcome.issues().to_vec(),
        };
        let render = RenderNow {
            renderer: &self.renderer,
            path,
            accept: request.header("Accept"),
            context: &context,
        };
        let response = match &self.hook {
            Some(hook) => hook.handle(request, &context, &render, &*self.next)?,
            None => render.render()?,
        };

        debug!(state = "DONE", status = response.status().as_u16());
        Ok(response)
    }
}

impl HttpService for ApiDocsMiddleware {
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    fn handle_request(&self, request: HttpRequest) -> SwagdocResult<HttpResponse> {
        let Some(path) = self.docs_path(&request) else {
            debug!(state = "NOT_MATCHED");
            return self.next.handle_request(request);
        };

        let response = self.serve_docs(&request, &path)?;
        if *request.method() == HttpMethod::Head {
            return Ok(response.with_body(Vec::new()));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorsOrigin, MountConfig};
    use expect_test::expect;
    use serde_json::json;
    use swagdoc_base::pal::http::{HttpServerConfig, HttpStatusCode, NotFoundService};
    use swagdoc_base::{MockPal, Pal, PalHandle};

    const INDEX_JS: &str = r#"
'use strict';

/**
 * @SwaggerHeader
 * info:
 *   title: Swagger Sample App
 *   version: 1.0.1
 * tags:
 *   - name: pet
 *     description: Everything about your Pets
 * @SwaggerTag
 *   test:
 *     description: just another test
 */
module.exports = function (router) {
    /**
     * @SwaggerPath
     *   /pet:
     *     post:
     *       summary: just a test route
     *       tags:
     *         - test
     *       responses:
     *         200:
     *           description: OK
     */
    router.post('/pet', function (req, res) {});
};
"#;

    const MAIN_HTML: &str = r#"<title>{{ data.info.title }}</title>
{% for tag in data.paths["/pet"].post.tags -%}
<h2>{{ tag.name }}: {{ tag.description }}</h2>
{%- endfor %}"#;

    fn petstore_pal() -> MockPal {
        let mock = MockPal::new();
        mock.add_file("controllers/index.js", INDEX_JS);
        mock.add_file("templates/main.html", MAIN_HTML);
        mock
    }

    fn middleware(mock: &MockPal, mount: MountConfig) -> ApiDocsMiddleware {
        let api_docs = ApiDocs::spawn(PalHandle::new(mock.clone()), mount).unwrap();
        ApiDocsMiddleware::new(api_docs, Box::new(NotFoundService))
    }

    fn with_templates() -> MountConfig {
        MountConfig::new("controllers").with_template_files("templates")
    }

    fn get(path: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, path).with_header("Host", "localhost:8000")
    }

    fn json_body(response: &HttpResponse) -> Value {
        serde_json::from_slice(response.body().as_bytes()).unwrap()
    }

    #[test]
    fn test_json_suffix_serves_raw_document() {
        let mock = petstore_pal();
        let service = middleware(&mock, with_templates());

        let response = service.handle_request(get("/swagger.json")).unwrap();

        assert_eq!(response.status(), HttpStatusCode::Ok);
        let body = json_body(&response);
        assert_eq!(body["paths"]["/pet"]["post"]["tags"], json!(["test"]));
        assert!(body.get("basePath").is_none());
        assert_eq!(body, service.api_docs.docs().snapshot());
    }

    #[test]
    fn test_html_serves_expanded_document() {
        let mock = petstore_pal();
        let service = middleware(&mock, with_templates());

        let response = service
            .handle_request(get("/swagger").with_header("Accept", "text/html"))
            .unwrap();

        assert_eq!(response.status(), HttpStatusCode::Ok);
        expect![[r#"
            <title>Swagger Sample App</title>
            <h2>test: just another test</h2>"#]]
        .assert_eq(&response.body().as_string().unwrap());
    }

    #[test]
    fn test_unsupported_accept_is_not_acceptable() {
        let mock = petstore_pal();
        let service = middleware(&mock, with_templates());

        let response = service
            .handle_request(get("/swagger").with_header("Accept", "application/xml"))
            .unwrap();

        assert_eq!(response.status(), HttpStatusCode::NotAcceptable);
        assert_eq!(response.body().as_string().unwrap(), "Not Acceptable");
    }

    #[test]
    fn test_other_requests_go_to_next() {
        let mock = petstore_pal();
        let service = middleware(&mock, MountConfig::new("controllers"));

        let post = service
            .handle_request(HttpRequest::new(HttpMethod::Post, "/swagger"))
            .unwrap();
        let elsewhere = service.handle_request(get("/pets")).unwrap();

        assert_eq!(post.body().as_string().unwrap(), "Cannot POST /swagger");
        assert_eq!(elsewhere.body().as_string().unwrap(), "Cannot GET /pets");
    }

    #[test]
    fn test_mount_path_is_matched_after_percent_decoding() {
        let mock = petstore_pal();
        let service = middleware(&mock, MountConfig::new("controllers").with_path("/api docs"));

        let response = service.handle_request(get("/api%20docs.json?x=1")).unwrap();

        assert_eq!(response.status(), HttpStatusCode::Ok);
    }

    #[test]
    fn test_head_has_no_body() {
        let mock = petstore_pal();
        let service = middleware(&mock, MountConfig::new("controllers"));

        let response = service
            .handle_request(HttpRequest::new(HttpMethod::Head, "/swagger"))
            .unwrap();

        assert_eq!(response.status(), HttpStatusCode::Ok);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_invalid_document_is_500_with_issues() {
        let mock = MockPal::new();
        mock.add_file("controllers/index.js", "/** @SwaggerPath\n * pets: {}\n */");
        let service = middleware(
            &mock,
            MountConfig::new("controllers").with_cors_origin(CorsOrigin::Enabled(true)),
        );

        let response = service.handle_request(get("/swagger")).unwrap();

        assert_eq!(response.status(), HttpStatusCode::InternalServerError);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin"),
            Some(&"*".to_string())
        );
        let paths: Vec<Value> = json_body(&response)
            .as_array()
            .unwrap()
            .iter()
            .map(|issue| issue["path"].clone())
            .collect();
        assert_eq!(paths, vec![json!("/info/title"), json!("/info/version"), json!("/paths/pets")]);
    }

    #[test]
    fn test_failed_build_is_500() {
        let mock = MockPal::new();
        mock.add_file("controllers/index.js", "/** @SwaggerModels\n * Pet: {}\n */");
        let service = middleware(&mock, MountConfig::new("controllers"));

        let response = service.handle_request(get("/swagger")).unwrap();

        assert_eq!(response.status(), HttpStatusCode::InternalServerError);
        assert_eq!(
            response.body().as_string().unwrap(),
            concat!(
                "Building the API document failed: ",
                "controllers/index.js: Invalid Section SwaggerModels"
            )
        );
        assert!(!response.headers().contains("Access-Control-Allow-Origin"));
    }

    #[test]
    fn test_failed_build_still_allows_cross_origin() {
        let mock = MockPal::new();
        mock.add_file("controllers/index.js", "/** @SwaggerModels\n * Pet: {}\n */");
        let mount = MountConfig::new("controllers").with_cors_origin(CorsOrigin::Enabled(true));
        let service = middleware(&mock, mount);

        let response = service.handle_request(get("/swagger")).unwrap();

        assert_eq!(response.status(), HttpStatusCode::InternalServerError);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin"),
            Some(&"*".to_string())
        );
    }

    #[derive(Debug)]
    struct TitleOnly;

    impl RequestHook for TitleOnly {
        fn handle(
            &self,
            request: &HttpRequest,
            context: &RenderContext,
            render: &RenderNow<'_>,
            next: &dyn HttpService,
        ) -> SwagdocResult<HttpResponse> {
            if request.path_without_query() == "/swagger/private" {
                return next.handle_request(request.clone());
            }
            assert!(context.is_valid);
            render.render_with(json!({"title": context.data["info"]["title"]}))
        }
    }

    #[test]
    fn test_request_hook_renders_its_own_data() {
        let mock = petstore_pal();
        mock.add_file("templates/main.html", "<p>{{ data.title }}</p>");
        let service = middleware(&mock, with_templates()).with_hook(Box::new(TitleOnly));

        let json = service.handle_request(get("/swagger.json")).unwrap();
        assert_eq!(json_body(&json)["info"]["title"], json!("Swagger Sample App"));

        let html = service.handle_request(get("/swagger.html")).unwrap();
        assert_eq!(html.body().as_string().unwrap(), "<p>Swagger Sample App</p>");
    }

    #[test]
    fn test_request_hook_can_delegate_to_next() {
        let mock = petstore_pal();
        let service = middleware(&mock, with_templates()).with_hook(Box::new(TitleOnly));

        let response = service.handle_request(get("/swagger/private?token=1")).unwrap();

        assert_eq!(response.status(), HttpStatusCode::NotFound);
        assert_eq!(response.body().as_string().unwrap(), "Cannot GET /swagger/private");
    }

    #[test]
    fn test_served_through_mock_http_server() {
        let mock = petstore_pal();
        let service = middleware(&mock, MountConfig::new("controllers"));
        let handle = mock
            .start_http_server(Box::new(service), HttpServerConfig::default())
            .unwrap();

        let response = mock
            .simulate_request(handle.port(), get("/swagger").with_header("Accept", "*/*"))
            .unwrap();

        assert_eq!(response.status(), HttpStatusCode::Ok);
        assert_eq!(json_body(&response)["swagger"], json!("2.0"));
    }
}
