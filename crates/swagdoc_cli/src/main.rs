/* 📖 # Why is the CLI so small?

`swagdoc [config]` reads `swagdoc.toml` (or the given path) from the current directory, builds the
document once, and serves it until the process is stopped. A positional argument is all the
input it needs, so there is no argument parser.

The build is awaited before the server starts, so a broken annotation (an unknown section or a
payload that is not YAML) stops the process with exit code 1 instead of serving 500s.

Exit codes:
- 0: server stopped
- 1: config could not be loaded, the document could not be built, or the server could not start
*/

use std::env;
use std::process;

use swagdoc_base::pal::http::{HttpServerConfig, NotFoundService};
use swagdoc_base::tracing::init_tracing;
use swagdoc_base::{FilePath, PalHandle, RealPal};
use swagdoc_engine::{ApiDocs, ApiDocsMiddleware, load_config};

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let config_path = env::args().nth(1).unwrap_or_else(|| "swagdoc.toml".to_string());

    let current_dir = env::current_dir().unwrap_or_else(|e| {
        eprintln!("Error: Failed to get current directory: {}", e);
        process::exit(1);
    });
    let pal = PalHandle::new(RealPal::new(current_dir));

    let config = match load_config(&pal, &FilePath::from(config_path.as_str())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config from {}: {}", config_path, e);
            process::exit(1);
        }
    };

    let api_docs = match ApiDocs::build(pal.clone(), config.mount.clone()) {
        Ok(api_docs) => api_docs,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let outcome = api_docs.docs().ensure_valid();
    if !outcome.is_valid() {
        eprintln!("\nWarning: the API document does not validate:");
        for issue in outcome.issues() {
            eprintln!("  - {}", issue);
        }
    }

    let service = ApiDocsMiddleware::new(api_docs, Box::new(NotFoundService));
    let server_config =
        HttpServerConfig::new(config.server.host.clone()).with_port(config.server.port);
    let handle = match pal.start_http_server(Box::new(service), server_config) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: Failed to start HTTP server: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Serving API docs at http://{}{}",
        handle.address(&config.server.host),
        config.mount.path
    );
    handle.wait();
}
