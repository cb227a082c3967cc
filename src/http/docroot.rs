//! Mapping request targets onto files beneath the document root.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::http::request::Request;

/// Outcome of resolving a request target.
#[derive(Debug)]
pub enum Resolution {
    /// A regular file inside the root, opened read-only.
    Found { path: PathBuf, file: File },
    /// Missing, unreadable, or not a regular file.
    NotFound { path: PathBuf },
    /// Exists but resolves outside the root.
    Escapes { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
    canonical: Option<PathBuf>,
}

impl DocumentRoot {
    /// A root that does not exist yet is accepted; every request against it
    /// resolves to `NotFound` until it does.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let canonical = match root.canonicalize() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Document root is not accessible");
                None
            }
        };

        Self { root, canonical }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The root joined with the request target, before any filesystem checks.
    pub fn candidate(&self, request: &Request) -> PathBuf {
        let mut joined = self.root.as_os_str().to_os_string();
        joined.push(&request.path);
        PathBuf::from(joined)
    }

    /// Resolves `request` to an open file, refusing anything that escapes
    /// the root through `..` components or symlinks.
    pub fn resolve(&self, request: &Request) -> Resolution {
        let path = self.candidate(request);

        if request.is_suspicious() {
            warn!(path = %path.display(), "Suspicious path requested");
        }

        let root = match self.canonical.as_ref() {
            Some(root) => root.clone(),
            // The root may have been created after startup.
            None => match self.root.canonicalize() {
                Ok(root) => root,
                Err(_) => return Resolution::NotFound { path },
            },
        };

        let real = match path.canonicalize() {
            Ok(real) => real,
            Err(_) => return Resolution::NotFound { path },
        };

        if !real.starts_with(&root) {
            return Resolution::Escapes { path };
        }

        match open_regular(&real) {
            Ok(file) => Resolution::Found { path, file },
            Err(_) => Resolution::NotFound { path },
        }
    }
}

fn open_regular(path: &Path) -> io::Result<File> {
    let file = File::open(path)?;
    if !file.metadata()?.is_file() {
        return Err(io::Error::other("not a regular file"));
    }
    Ok(file)
}
