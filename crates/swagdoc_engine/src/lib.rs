/* 📖 # How does swagdoc_engine fit together?

annotation -> scanner -> builder -> (document, section) -> handle -> validator / expander ->
render -> middleware.

The scanner extracts `@Swagger*` fragments from source comments and streams them to the builder
thread, which merges them into the one `AggregateDocument` behind a `DocsHandle`. The middleware
waits for the build, validates through the cache, expands a copy per request and renders it.
*/

pub mod annotation;
pub mod builder;
pub mod config;
pub mod document;
pub mod expander;
pub mod handle;
pub mod middleware;
pub mod render;
pub mod scanner;
pub mod section;
pub mod validator;

pub use annotation::{AnnotationFragment, DocComment, DocTag, extract_fragments, is_section_tag};
pub use builder::{ApiDocs, BuildCommand, DocumentBuilder};
pub use config::{Config, CorsOrigin, MountConfig, ServerConfig, load_config};
pub use document::AggregateDocument;
pub use expander::{RequestContext, expand};
pub use handle::{BuildStatus, DocsHandle, ReadyGate};
pub use middleware::{ApiDocsMiddleware, RenderNow, RequestHook};
pub use render::{DocsRenderer, RenderContext, TemplateRenderer, TeraTemplateRenderer};
pub use scanner::{AnnotationSink, FileAnnotations, ScanError, ScanResult, scan_directory};
pub use section::SectionKind;
pub use validator::{
    SchemaValidator, SwaggerSchemaValidator, ValidationIssue, Validity, ValidityCache,
    ValidityOutcome,
};
