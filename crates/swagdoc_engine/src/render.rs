/* 📖 # Which representation does a docs request get?

The JSON representation is the stored document exactly as assembled, since that is what API
tooling consumes. The HTML representation renders the `main.html` template with the expanded
document, for people reading in a browser.

An explicit `.json` suffix always means JSON, and without a template directory JSON is all there
is. A `.html`/`.htm` suffix means HTML. Otherwise the Accept header decides, highest q-value
first; a request without Accept gets JSON, and one that accepts neither gets 406.
*/

use serde::Serialize;
use serde_json::Value;
use tera::Tera;
use tracing::debug;

use swagdoc_base::pal::http::{HttpResponse, HttpStatusCode};
use swagdoc_base::{FilePath, PalHandle, ResultExt, SwagdocResult};

use crate::config::MountConfig;
use crate::validator::ValidationIssue;

/// Name of the template looked up in the template directory.
pub const MAIN_TEMPLATE: &str = "main.html";

/// Everything a renderer or request hook may need for one docs request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderContext {
    /// Expanded document.
    pub data: Value,
    /// Document as assembled, without expansion.
    pub swagger_doc: Value,
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
}

/// Renders the HTML representation of the docs.
pub trait TemplateRenderer: std::fmt::Debug + Send + Sync + 'static {
    fn render(&self, context: &RenderContext) -> SwagdocResult<String>;
}

/// Renders `main.html` from a template directory with tera.
///
/// The template is read on every render, so edits show up without a restart. Its variables are
/// the fields of `RenderContext`.
#[derive(Debug, Clone)]
pub struct TeraTemplateRenderer {
    pal: PalHandle,
    template_dir: FilePath,
}

impl TeraTemplateRenderer {
    pub fn new(pal: PalHandle, template_dir: FilePath) -> Self {
        Self { pal, template_dir }
    }
}

impl TemplateRenderer for TeraTemplateRenderer {
    fn render(&self, context: &RenderContext) -> SwagdocResult<String> {
        let path = self.template_dir.join(MAIN_TEMPLATE);
        let source = self
            .pal
            .read_file_to_string(&path)
            .with_context(|| format!("Failed to load template {}", path))?;

        let mut tera = Tera::default();
        tera.add_raw_template(MAIN_TEMPLATE, &source)
            .map_err(|e| swagdoc_base::err!("Failed to parse template {}: {}", path, e))?;
        let variables = tera::Context::from_serialize(context)
            .map_err(|e| swagdoc_base::err!("Failed to prepare template variables: {}", e))?;
        tera.render(MAIN_TEMPLATE, &variables).map_err(|e| {
            swagdoc_base::err!("Failed to render template {}: {}", path, tera_error_chain(&e))
        })
    }
}

fn tera_error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Json,
    Html,
}

impl Representation {
    fn media_type(&self) -> (&'static str, &'static str) {
        match self {
            Representation::Json => ("application", "json"),
            Representation::Html => ("text", "html"),
        }
    }
}

/// Choose the representation for a request path and Accept header.
pub fn negotiate(path: &str, accept: Option<&str>, html_available: bool) -> Option<Representation> {
    if path.ends_with(".json") || !html_available {
        return Some(Representation::Json);
    }
    if path.ends_with(".html") || path.ends_with(".htm") {
        return Some(Representation::Html);
    }
    let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
        return Some(Representation::Json);
    };

    let ranges = parse_accept(accept);
    let mut best: Option<(Representation, f32, usize)> = None;
    for offer in [Representation::Json, Representation::Html] {
        let Some((quality, position)) = match_offer(offer, &ranges) else {
            continue;
        };
        if quality <= 0.0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, best_quality, best_position)) => {
                quality > best_quality || (quality == best_quality && position < best_position)
            }
        };
        if better {
            best = Some((offer, quality, position));
        }
    }
    best.map(|(offer, _, _)| offer)
}

#[derive(Debug, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    quality: f32,
}

fn parse_accept(accept: &str) -> Vec<MediaRange> {
    accept
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let (kind, subtype) = parts.next()?.trim().split_once('/')?;
            let mut quality = 1.0;
            for q in parts.filter_map(|param| param.trim().strip_prefix("q=")) {
                // A range with an unparsable q-value is dropped.
                quality = q
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|q| (0.0..=1.0).contains(q))?;
            }
            Some(MediaRange {
                kind: kind.trim().to_ascii_lowercase(),
                subtype: subtype.trim().to_ascii_lowercase(),
                quality,
            })
        })
        .collect()
}

/// Quality and Accept position of the most specific range matching `offer`.
fn match_offer(offer: Representation, ranges: &[MediaRange]) -> Option<(f32, usize)> {
    let (kind, subtype) = offer.media_type();
    ranges
        .iter()
        .enumerate()
        .filter_map(|(position, range)| {
            let specificity = match (range.kind.as_str(), range.subtype.as_str()) {
                (k, s) if k == kind && s == subtype => 2,
                (k, "*") if k == kind => 1,
                ("*", "*") => 0,
                _ => return None,
            };
            Some((specificity, range.quality, position))
        })
        .max_by_key(|(specificity, _, _)| *specificity)
        .map(|(_, quality, position)| (quality, position))
}

/// The built-in renderer of a docs mount.
#[derive(Debug)]
pub struct DocsRenderer {
    allow_origin: Option<String>,
    templates: Option<Box<dyn TemplateRenderer>>,
}

impl DocsRenderer {
    pub fn new(allow_origin: Option<String>, templates: Option<Box<dyn TemplateRenderer>>) -> Self {
        Self {
            allow_origin,
            templates,
        }
    }

    /// Renderer configured by a mount: CORS origin and optional tera templates.
    pub fn from_mount(pal: &PalHandle, mount: &MountConfig) -> Self {
        let templates = mount.template_files.as_deref().map(|dir| {
            Box::new(TeraTemplateRenderer::new(pal.clone(), FilePath::from(dir)))
                as Box<dyn TemplateRenderer>
        });
        Self::new(
            mount.cors_origin.allow_origin().map(str::to_string),
            templates,
        )
    }

    /// Respond to a docs request for `path` (query string removed, percent-decoded).
    pub fn render(
        &self,
        path: &str,
        accept: Option<&str>,
        context: &RenderContext,
    ) -> SwagdocResult<HttpResponse> {
        let response = self.render_body(path, accept, context)?;
        Ok(self.with_cors(response))
    }

    /// Add the configured `Access-Control-Allow-Origin` header, if any.
    pub fn with_cors(&self, response: HttpResponse) -> HttpResponse {
        match &self.allow_origin {
            Some(origin) => response.with_header("Access-Control-Allow-Origin", origin.clone()),
            None => response,
        }
    }

    fn render_body(
        &self,
        path: &str,
        accept: Option<&str>,
        context: &RenderContext,
    ) -> SwagdocResult<HttpResponse> {
        if !context.is_valid {
            debug!(errors = context.errors.len(), "serving validation errors");
            return Ok(HttpResponse::json(to_json(&context.errors)?)
                .with_status(HttpStatusCode::InternalServerError));
        }

        let representation = negotiate(path, accept, self.templates.is_some());
        debug!(?representation, path, "negotiated representation");
        match (representation, &self.templates) {
            (Some(Representation::Html), Some(templates)) => {
                Ok(HttpResponse::html(templates.render(context)?).with_header("Vary", "Accept"))
            }
            (Some(_), _) => {
                Ok(HttpResponse::json(to_json(&context.swagger_doc)?).with_header("Vary", "Accept"))
            }
            (None, _) => Ok(HttpResponse::text(HttpStatusCode::NotAcceptable.reason_phrase())
                .with_status(HttpStatusCode::NotAcceptable)
                .with_header("Vary", "Accept")),
        }
    }
}

fn to_json(value: &impl Serialize) -> SwagdocResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| swagdoc_base::err!("Failed to serialize JSON response: {}", e))
}
