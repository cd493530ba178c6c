use serde::Deserialize;
use tracing::{debug, instrument};

use swagdoc_base::{FilePath, PalHandle, ResultExt, SwagdocResult};

/* 📖 # Why is cors_origin either a bool or a string?

`cors_origin = true` is shorthand for allowing every origin (`*`), `false` turns the header off,
and a string names the one origin that is allowed. An untagged enum keeps the TOML as short as
the intent while giving the renderer a single `allow_origin()` to ask.
*/

/// CORS setting of a docs mount.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    Enabled(bool),
    Origin(String),
}

impl CorsOrigin {
    /// Value of the `Access-Control-Allow-Origin` header, if any.
    pub fn allow_origin(&self) -> Option<&str> {
        match self {
            CorsOrigin::Enabled(true) => Some("*"),
            CorsOrigin::Enabled(false) => None,
            CorsOrigin::Origin(origin) => Some(origin),
        }
    }
}

impl Default for CorsOrigin {
    fn default() -> Self {
        CorsOrigin::Enabled(false)
    }
}

/// Where the annotated sources live and where the docs are served.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MountConfig {
    /// Root directory scanned for annotated source files.
    pub directory: String,
    /// URL prefix the docs are served under.
    #[serde(default = "default_mount_path")]
    pub path: String,
    #[serde(default)]
    pub cors_origin: CorsOrigin,
    /// Directory holding `main.html`. Without it only JSON is served.
    #[serde(default)]
    pub template_files: Option<String>,
    /// File extension (without the dot) of the files to scan.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl MountConfig {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            path: default_mount_path(),
            cors_origin: CorsOrigin::default(),
            template_files: None,
            extension: default_extension(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_cors_origin(mut self, cors_origin: CorsOrigin) -> Self {
        self.cors_origin = cors_origin;
        self
    }

    pub fn with_template_files(mut self, template_files: impl Into<String>) -> Self {
        self.template_files = Some(template_files.into());
        self
    }
}

/// Address the CLI binds its HTTP server to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Contents of `swagdoc.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub mount: MountConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_mount_path() -> String {
    "/swagger".to_string()
}

fn default_extension() -> String {
    "js".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Load and parse a `swagdoc.toml` through the PAL.
#[instrument(skip(pal), fields(path = %path))]
pub fn load_config(pal: &PalHandle, path: &FilePath) -> SwagdocResult<Config> {
    if !pal.file_exists(path)? {
        swagdoc_base::bail!("Config file {} not found", path);
    }
    let content = pal
        .read_file_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| swagdoc_base::err!("Failed to parse config file {}: {}", path, e))?;
    debug!(directory = %config.mount.directory, mount = %config.mount.path, "loaded config");
    Ok(config)
}
