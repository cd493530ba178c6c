use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::Mutex;

use crate::SwagdocError;
use crate::SwagdocResult;
use crate::error::ErrorKind;

use super::FilePath;
use super::http::{HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService};
use super::traits::{Pal, ReadSeek};

/* 📖 # Why use HashMap for MockPal storage?

MockPal keeps file contents in memory behind Arc<Mutex<_>>. Tests get a deterministic controller
tree with no filesystem side effects, clones share the same storage, and directory listings are
derived from the stored file paths so a test only has to add the files it cares about.
Files registered with `add_unreadable_file` show up in listings but fail on read, which is how
tests exercise the scanner's error collection.
*/

/// In-memory PAL implementation for testing.
///
/// # Examples
///
/// ```
/// use swagdoc_base::{MockPal, Pal, FilePath};
///
/// let mock = MockPal::new();
/// mock.add_file("controllers/pets.js", "/** @SwaggerPath */");
/// let names = mock.read_directory(&FilePath::from("controllers")).unwrap();
/// assert_eq!(names, vec!["pets.js".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct MockPal {
    files: Arc<Mutex<HashMap<FilePath, Vec<u8>>>>,
    unreadable: Arc<Mutex<HashSet<FilePath>>>,
    directories: Arc<Mutex<HashSet<FilePath>>>,
    http_servers: Arc<Mutex<HashMap<u16, HttpServerInfo>>>,
    next_port: Arc<AtomicU16>,
}

/// Information about a registered HTTP server.
#[derive(Debug)]
struct HttpServerInfo {
    service: Box<dyn HttpService>,
    _config: HttpServerConfig,
}

impl MockPal {
    /// Create a new empty MockPal.
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            unreadable: Arc::new(Mutex::new(HashSet::new())),
            directories: Arc::new(Mutex::new(HashSet::new())),
            http_servers: Arc::new(Mutex::new(HashMap::new())),
            next_port: Arc::new(AtomicU16::new(10000)),
        }
    }

    /// Add a file to the mock storage. Parent directories exist implicitly.
    pub fn add_file(&self, path: impl Into<FilePath>, content: impl Into<Vec<u8>>) {
        let path = path.into().normalized();
        self.unreadable.lock().remove(&path);
        self.files.lock().insert(path, content.into());
    }

    /// Add a file that is listed in its directory but cannot be read.
    pub fn add_unreadable_file(&self, path: impl Into<FilePath>) {
        let path = path.into().normalized();
        self.files.lock().insert(path.clone(), vec![]);
        self.unreadable.lock().insert(path);
    }

    /// Add an (empty) directory to the mock storage.
    pub fn add_directory(&self, path: impl Into<FilePath>) {
        self.directories.lock().insert(path.into().normalized());
    }

    /// Simulate an HTTP request to a running server.
    ///
    /// Looks up the service registered for `port` and invokes it directly, no sockets involved.
    /// Service errors are returned as-is so tests can inspect them.
    pub fn simulate_request(&self, port: u16, request: HttpRequest) -> SwagdocResult<HttpResponse> {
        let servers = self.http_servers.lock();
        let server_info = servers
            .get(&port)
            .ok_or_else(|| crate::err!("No HTTP server registered on port {}", port))?;

        server_info.service.handle_request(request)
    }

    /// Get the number of registered HTTP servers.
    pub fn http_server_count(&self) -> usize {
        self.http_servers.lock().len()
    }

    fn not_found(path: &FilePath, what: &str) -> Box<SwagdocError> {
        Box::new(SwagdocError::new(ErrorKind::FileError {
            path: path.as_path().to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found: {}", what, path),
            ),
        }))
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal for MockPal {
    fn file_exists(&self, path: &FilePath) -> SwagdocResult<bool> {
        Ok(self.files.lock().contains_key(&path.normalized()))
    }

    fn read_file(&self, path: &FilePath) -> SwagdocResult<Box<dyn ReadSeek + 'static>> {
        let path = path.normalized();
        if self.unreadable.lock().contains(&path) {
            return Err(Box::new(SwagdocError::new(ErrorKind::FileError {
                path: path.as_path().to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("Permission denied: {}", path),
                ),
            })));
        }
        let content = self
            .files
            .lock()
            .get(&path)
            .ok_or_else(|| Self::not_found(&path, "File"))?
            .clone();
        Ok(Box::new(Cursor::new(content)))
    }

    fn read_directory(&self, path: &FilePath) -> SwagdocResult<Vec<String>> {
        let dir = path.normalized();
        let prefix = dir.as_relative().as_str();
        let files = self.files.lock();
        if files.contains_key(&dir) {
            return Err(Box::new(SwagdocError::new(ErrorKind::FileError {
                path: dir.as_path().to_path_buf(),
                source: std::io::Error::other(format!("Not a directory: {}", dir)),
            })));
        }
        let directories = self.directories.lock();

        let mut names = BTreeSet::new();
        let mut found = prefix.is_empty() || directories.contains(&dir);
        for entry in files.keys().chain(directories.iter()) {
            let entry = entry.as_relative().as_str();
            let rest = if prefix.is_empty() {
                Some(entry)
            } else {
                entry
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('/'))
            };
            if let Some(rest) = rest {
                found = true;
                if let Some(name) = rest.split('/').next().filter(|name| !name.is_empty()) {
                    names.insert(name.to_string());
                }
            }
        }
        if !found {
            return Err(Self::not_found(&dir, "Directory"));
        }
        Ok(names.into_iter().collect())
    }

    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> SwagdocResult<HttpServerHandle> {
        let port = match config.port {
            Some(p) if p != 0 => p,
            _ => self.next_port.fetch_add(1, Ordering::SeqCst),
        };

        self.http_servers.lock().insert(
            port,
            HttpServerInfo {
                service,
                _config: config,
            },
        );

        Ok(HttpServerHandle::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::http::{HttpMethod, HttpStatusCode, NotFoundService};

    #[test]
    fn test_file_exists() {
        let pal = MockPal::new();
        pal.add_file("test.js", "content");

        assert!(pal.file_exists(&FilePath::from("test.js")).unwrap());
        assert!(pal.file_exists(&FilePath::from("./test.js")).unwrap());
        assert!(!pal.file_exists(&FilePath::from("other.js")).unwrap());
    }

    #[test]
    fn test_read_file() {
        let pal = MockPal::new();
        pal.add_file("test.js", "hello world");

        let result = pal.read_file_to_string(&FilePath::from("test.js")).unwrap();
        assert_eq!(result, "hello world");
    }

    #[test]
    fn test_read_file_not_found() {
        let pal = MockPal::new();

        let error = pal.read_file(&FilePath::from("nonexistent.js")).err().unwrap();
        assert!(matches!(error.kind(), ErrorKind::FileError { .. }));
    }

    #[test]
    fn test_read_unreadable_file() {
        let pal = MockPal::new();
        pal.add_unreadable_file("controllers/locked.js");

        assert_eq!(
            pal.read_directory(&FilePath::from("controllers")).unwrap(),
            vec!["locked.js".to_string()]
        );
        assert!(
            pal.read_file(&FilePath::from("controllers/locked.js"))
                .is_err()
        );
    }

    #[test]
    fn test_read_directory_lists_direct_children() {
        let pal = MockPal::new();
        pal.add_file("controllers/pets.js", "");
        pal.add_file("controllers/users.js", "");
        pal.add_file("controllers/admin/audit.js", "");
        pal.add_file("templates/main.html", "");

        let names = pal.read_directory(&FilePath::from("controllers")).unwrap();
        assert_eq!(names, vec!["admin", "pets.js", "users.js"]);

        let root = pal.read_directory(&FilePath::from(".")).unwrap();
        assert_eq!(root, vec!["controllers", "templates"]);
    }

    #[test]
    fn test_read_directory_empty_and_missing() {
        let pal = MockPal::new();
        pal.add_directory("empty");

        assert!(pal.read_directory(&FilePath::from("empty")).unwrap().is_empty());
        assert!(pal.read_directory(&FilePath::from("missing")).is_err());
    }

    #[test]
    fn test_read_directory_on_file_fails() {
        let pal = MockPal::new();
        pal.add_file("controllers/pets.js", "");

        assert!(
            pal.read_directory(&FilePath::from("controllers/pets.js"))
                .is_err()
        );
    }

    #[test]
    fn test_http_server_mock() {
        let pal = MockPal::new();
        let handle = pal
            .start_http_server(Box::new(NotFoundService), HttpServerConfig::default())
            .unwrap();

        assert_eq!(handle.port(), 10000);
        assert_eq!(pal.http_server_count(), 1);

        let response = pal
            .simulate_request(handle.port(), HttpRequest::new(HttpMethod::Get, "/missing"))
            .unwrap();
        assert_eq!(response.status(), HttpStatusCode::NotFound);
    }

    #[test]
    fn test_simulate_request_unknown_port() {
        let pal = MockPal::new();

        let result = pal.simulate_request(9999, HttpRequest::new(HttpMethod::Get, "/"));
        assert!(result.is_err());
    }
}
