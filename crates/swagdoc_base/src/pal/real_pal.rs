use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::{SwagdocError, SwagdocResult, error::ErrorKind};

use super::FilePath;
use super::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService,
};
use super::traits::{Pal, ReadSeek};

/* 📖 # Why std::fs and tiny_http instead of an async stack?

Swagdoc does a one-off directory scan at startup and then answers small documentation requests.
Blocking std::fs calls and tiny_http's synchronous accept loop cover both. The server loop polls
with a timeout so that `HttpServerHandle::shutdown` is noticed without a second wake-up channel.
*/

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Concrete PAL implementation using the real filesystem via std::fs.
///
/// All file paths are resolved relative to a configured base directory.
#[derive(Debug)]
pub struct RealPal {
    base_dir: PathBuf,
}

impl RealPal {
    /// Create a new RealPal with the given base directory.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Resolve a FilePath to a filesystem path.
    fn resolve_path(&self, path: &FilePath) -> PathBuf {
        self.base_dir.join(path.as_path())
    }

    fn file_error(path: PathBuf, source: std::io::Error) -> Box<SwagdocError> {
        Box::new(SwagdocError::new(ErrorKind::FileError { path, source }))
    }
}

impl Pal for RealPal {
    #[instrument(skip(self), fields(path = %path))]
    fn file_exists(&self, path: &FilePath) -> SwagdocResult<bool> {
        let resolved = self.resolve_path(path);
        let exists = resolved.exists();
        debug!(exists, resolved = %resolved.display(), "checked file existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path))]
    fn read_file(&self, path: &FilePath) -> SwagdocResult<Box<dyn ReadSeek + 'static>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "opening file for reading");
        let file = fs::File::open(&resolved).map_err(|e| {
            debug!(error = %e, "failed to open file");
            Self::file_error(resolved, e)
        })?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path))]
    fn read_directory(&self, path: &FilePath) -> SwagdocResult<Vec<String>> {
        let resolved = self.resolve_path(path);
        let entries = fs::read_dir(&resolved).map_err(|e| {
            debug!(error = %e, "failed to list directory");
            Self::file_error(resolved.clone(), e)
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::file_error(resolved.clone(), e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        debug!(count = names.len(), "listed directory");
        Ok(names)
    }

    #[instrument(skip(self, service), fields(address = %config.address()))]
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> SwagdocResult<HttpServerHandle> {
        let server = tiny_http::Server::http(config.address()).map_err(|e| {
            crate::err!("Failed to bind HTTP server to {}: {}", config.address(), e)
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| crate::err!("HTTP server is not bound to an IP address"))?;
        debug!(port, "HTTP server bound");

        let handle = HttpServerHandle::new(port);
        let shutdown = Arc::clone(handle.shutdown_flag());
        let server_name = config.server_name.clone();
        let worker = std::thread::Builder::new()
            .name(format!("http-{}", port))
            .spawn(move || serve(server, service.as_ref(), &shutdown, &server_name))
            .map_err(|e| crate::err!("Failed to spawn HTTP server thread: {}", e))?;

        Ok(handle.with_worker(worker))
    }
}

fn serve(
    server: tiny_http::Server,
    service: &dyn HttpService,
    shutdown: &AtomicBool,
    server_name: &str,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let mut request = match server.recv_timeout(ACCEPT_POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "failed to receive HTTP request");
                continue;
            }
        };

        let response = match to_http_request(&mut request) {
            Some(http_request) => service.handle_request(http_request).unwrap_or_else(|e| {
                warn!(error = %e, url = request.url(), "HTTP service failed");
                HttpResponse::internal_error().with_body(e.to_string())
            }),
            None => HttpResponse::new(super::http::HttpStatusCode::MethodNotAllowed),
        };
        debug!(
            method = %request.method(),
            url = request.url(),
            status = response.status().as_u16(),
            "handled request"
        );

        if let Err(e) = request.respond(to_tiny_response(response, server_name)) {
            warn!(error = %e, "failed to write HTTP response");
        }
    }
    debug!("HTTP server loop stopped");
}

fn to_http_request(request: &mut tiny_http::Request) -> Option<HttpRequest> {
    let method = HttpMethod::parse(request.method().as_str())?;
    let mut http_request = HttpRequest::new(method, request.url());
    for header in request.headers() {
        http_request =
            http_request.with_header(header.field.as_str().as_str(), header.value.as_str());
    }
    let mut body = Vec::new();
    if let Err(e) = request.as_reader().read_to_end(&mut body) {
        warn!(error = %e, "failed to read request body");
    }
    Some(http_request.with_body(body))
}

fn to_tiny_response(
    response: HttpResponse,
    server_name: &str,
) -> tiny_http::Response<Cursor<Vec<u8>>> {
    let status = response.status().as_u16();
    let mut headers: Vec<tiny_http::Header> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
        })
        .collect();
    if let Ok(server) = tiny_http::Header::from_bytes(&b"Server"[..], server_name.as_bytes()) {
        headers.push(server);
    }
    let body = response.into_body().into_bytes();
    let length = body.len();
    tiny_http::Response::new(
        tiny_http::StatusCode(status),
        headers,
        Cursor::new(body),
        Some(length),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::http::NotFoundService;
    use std::io::Write;
    use std::net::TcpStream;
    use tempfile::TempDir;

    fn setup_test_dir() -> (TempDir, RealPal) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let pal = RealPal::new(temp_dir.path().to_path_buf());
        (temp_dir, pal)
    }

    #[test]
    fn test_file_exists() {
        let (temp_dir, pal) = setup_test_dir();
        fs::write(temp_dir.path().join("test.js"), "content").unwrap();

        assert!(pal.file_exists(&FilePath::from("test.js")).unwrap());
        assert!(!pal.file_exists(&FilePath::from("missing.js")).unwrap());
    }

    #[test]
    fn test_read_file() {
        let (temp_dir, pal) = setup_test_dir();
        fs::write(temp_dir.path().join("test.js"), "hello world").unwrap();

        let result = pal.read_file_to_string(&FilePath::from("test.js")).unwrap();
        assert_eq!(result, "hello world");
    }

    #[test]
    fn test_read_file_not_found() {
        let (_temp_dir, pal) = setup_test_dir();

        let error = pal.read_file(&FilePath::from("nonexistent.js")).err().unwrap();
        assert!(matches!(error.kind(), ErrorKind::FileError { .. }));
    }

    #[test]
    fn test_read_directory_sorted() {
        let (temp_dir, pal) = setup_test_dir();
        fs::create_dir(temp_dir.path().join("controllers")).unwrap();
        fs::create_dir(temp_dir.path().join("controllers/admin")).unwrap();
        fs::write(temp_dir.path().join("controllers/users.js"), "").unwrap();
        fs::write(temp_dir.path().join("controllers/pets.js"), "").unwrap();

        let names = pal.read_directory(&FilePath::from("controllers")).unwrap();
        assert_eq!(names, vec!["admin", "pets.js", "users.js"]);
    }

    #[test]
    fn test_read_directory_not_found() {
        let (_temp_dir, pal) = setup_test_dir();

        assert!(pal.read_directory(&FilePath::from("nonexistent")).is_err());
    }

    #[test]
    fn test_http_server_round_trip() {
        let (_temp_dir, pal) = setup_test_dir();
        let handle = pal
            .start_http_server(Box::new(NotFoundService), HttpServerConfig::default())
            .unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", handle.port())).unwrap();
        stream
            .write_all(b"GET /nothing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();

        assert!(raw.starts_with("HTTP/1.1 404"), "unexpected response: {raw}");
        assert!(raw.ends_with("Cannot GET /nothing"), "unexpected response: {raw}");

        handle.shutdown();
        handle.wait();
    }
}
