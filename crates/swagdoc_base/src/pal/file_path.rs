use relative_path::{RelativePath, RelativePathBuf};
use std::path::Path;

/* 📖 # Why use RelativePathBuf for FilePath?

FilePath wraps RelativePathBuf so that every path handed to the PAL is interpreted against the
PAL's base directory. The scanner builds child paths with `join`, which keeps forward slashes on
every platform, so paths in logs and errors look the same everywhere.
*/

/// Type-safe wrapper for file paths relative to PAL base directory.
///
/// # Examples
///
/// ```
/// use swagdoc_base::FilePath;
///
/// let dir = FilePath::from("controllers");
/// assert_eq!(dir.join("index.js").to_string(), "controllers/index.js");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath(RelativePathBuf);

impl FilePath {
    /// Returns the underlying RelativePath.
    pub fn as_relative(&self) -> &RelativePath {
        &self.0
    }

    /// Converts to a regular Path for use with std::fs operations.
    /// This returns the relative path portion without a base directory.
    pub fn as_path(&self) -> &Path {
        Path::new(self.as_relative().as_str())
    }

    /// Appends a single entry name, as returned by `Pal::read_directory`.
    pub fn join(&self, name: &str) -> FilePath {
        Self(self.0.join(name))
    }

    /// Last component of the path, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Lexically normalized form: `.` components and leading `./` are removed.
    pub fn normalized(&self) -> FilePath {
        Self(self.0.normalize())
    }
}

impl From<&str> for FilePath {
    fn from(s: &str) -> Self {
        Self(RelativePathBuf::from(s))
    }
}

impl From<String> for FilePath {
    fn from(s: String) -> Self {
        Self(RelativePathBuf::from(s))
    }
}

impl From<RelativePathBuf> for FilePath {
    fn from(p: RelativePathBuf) -> Self {
        Self(p)
    }
}

impl From<&Path> for FilePath {
    fn from(p: &Path) -> Self {
        Self(RelativePathBuf::from(p.to_string_lossy().into_owned()))
    }
}

impl std::fmt::Display for FilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<RelativePath> for FilePath {
    fn as_ref(&self) -> &RelativePath {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_from_str() {
        let path = FilePath::from("controllers/index.js");
        assert_eq!(path.as_path(), Path::new("controllers/index.js"));
    }

    #[test]
    fn test_file_path_join() {
        let path = FilePath::from("controllers").join("pets").join("index.js");
        assert_eq!(path.to_string(), "controllers/pets/index.js");
        assert_eq!(path.file_name(), Some("index.js"));
    }

    #[test]
    fn test_file_path_normalized() {
        assert_eq!(
            FilePath::from("./controllers/./pets").normalized(),
            FilePath::from("controllers/pets")
        );
        assert_eq!(FilePath::from(".").normalized(), FilePath::from(""));
    }

    #[test]
    fn test_file_path_from_pathbuf() {
        let pb = std::path::PathBuf::from("demos/controllers");
        let path = FilePath::from(pb.as_path());
        assert_eq!(path.as_path(), pb.as_path());
    }

    #[test]
    fn test_file_path_equality() {
        assert_eq!(FilePath::from("a.js"), FilePath::from("a.js"));
        assert_ne!(FilePath::from("a.js"), FilePath::from("b.js"));
    }
}
