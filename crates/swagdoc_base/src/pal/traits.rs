use std::io::{Read, Seek};
use std::sync::Arc;

use crate::SwagdocResult;

use super::file_path::FilePath;
use super::http::{HttpServerConfig, HttpServerHandle, HttpService};

/* 📖 # What is the Platform Abstraction Layer (PAL)?

The PAL is the only place where swagdoc touches the filesystem or opens sockets.
The scanner lists directories and reads controller files through it, the renderer reads
templates through it, and the CLI starts its HTTP server through it. MockPal implements the
same trait in memory, so the whole pipeline can be tested without a real directory tree or port.
*/

/// Trait combining Read + Seek for file operations.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Platform Abstraction Layer (PAL) trait providing filesystem and HTTP operations.
///
/// Two implementations are provided:
/// - `RealPal`: Uses the real filesystem via `std::fs` and `tiny_http`
/// - `MockPal`: In-memory implementation for testing
pub trait Pal: std::fmt::Debug + Send + Sync + 'static {
    /// Check if a file exists at the given path.
    fn file_exists(&self, path: &FilePath) -> SwagdocResult<bool>;

    /// Open a file for reading.
    fn read_file(&self, path: &FilePath) -> SwagdocResult<Box<dyn ReadSeek + 'static>>;

    /// Read entire file contents as a UTF-8 string.
    fn read_file_to_string(&self, path: &FilePath) -> SwagdocResult<String> {
        let mut reader = self.read_file(path)?;
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).map_err(|e| {
            Box::new(crate::SwagdocError::new(crate::error::ErrorKind::FileError {
                path: path.as_path().to_path_buf(),
                source: e,
            }))
        })?;
        String::from_utf8(contents).map_err(|_e| crate::err!("File is not valid UTF-8: {}", path))
    }

    /// List the entry names of a directory (files and subdirectories, not recursive).
    ///
    /// Names are returned sorted so that callers see a stable order.
    fn read_directory(&self, path: &FilePath) -> SwagdocResult<Vec<String>>;

    /// Start an HTTP server with the given service.
    ///
    /// Returns a handle to the running server. The server keeps accepting connections until
    /// `shutdown()` is called on the handle.
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> SwagdocResult<HttpServerHandle>;
}

/// Handle to a PAL implementation, enabling shared ownership.
///
/// ```no_run
/// use swagdoc_base::{RealPal, PalHandle};
///
/// let pal = PalHandle::new(RealPal::new(".".into()));
/// let pal_clone = pal.clone();
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    /// Create a new PalHandle from a Pal implementation.
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
