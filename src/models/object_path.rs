//! Hierarchical filesystem paths and their flat object-store counterparts.
//!
//! A [`SwiftPath`] is what callers hand to the filesystem layer
//! (`/logs/2024/part-0` or `swift://data.service/logs/2024/part-0`). An
//! [`ObjectPath`] is the `(container, key)` pair the store understands.
//! [`PathTranslator`] maps between the two using the filesystem root URI.

use crate::errors::{FsError, FsResult};
use std::{fmt, str::FromStr};
use url::Url;

/// Address of a single object in the flat store.
///
/// The key never carries a leading slash. A key that ends in `/` names a
/// directory marker. The empty key is the container itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    container: String,
    key: String,
}

impl ObjectPath {
    pub fn new(container: impl Into<String>, key: &str) -> Self {
        Self {
            container: container.into(),
            key: key.trim_start_matches('/').to_string(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The container root (empty key).
    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Directory form: the key with a single trailing `/`.
    ///
    /// The container root keeps its empty key, which already addresses the
    /// whole container.
    pub fn to_dir(&self) -> Self {
        if self.key.is_empty() || self.key.ends_with('/') {
            return self.clone();
        }
        Self {
            container: self.container.clone(),
            key: format!("{}/", self.key),
        }
    }

    pub fn without_trailing_slash(&self) -> Self {
        Self {
            container: self.container.clone(),
            key: self.key.trim_end_matches('/').to_string(),
        }
    }

    /// `container/key`, the form used for ancestry checks.
    pub fn uri_path(&self) -> String {
        format!("{}/{}", self.container, self.key)
    }

    /// True when `other` is this path or lives underneath it.
    pub fn is_equal_to_or_parent_of(&self, other: &ObjectPath) -> bool {
        let own = self.uri_path();
        let child = other.uri_path();
        if child == own {
            return true;
        }
        let mut parent = own;
        if !parent.ends_with('/') {
            parent.push('/');
        }
        child.starts_with(&parent)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// An absolute hierarchical path, optionally qualified with the
/// filesystem's scheme and authority.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SwiftPath {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
}

impl SwiftPath {
    /// Parse either `/absolute/path` or `scheme://authority/path`.
    ///
    /// Repeated and trailing separators are dropped, so `/a//b/` is `/a/b`.
    pub fn parse(input: &str) -> FsResult<Self> {
        let (scheme, authority, path) = match input.split_once("://") {
            Some((scheme, rest)) => {
                let (authority, path) = match rest.find('/') {
                    Some(idx) => (&rest[..idx], &rest[idx..]),
                    None => (rest, "/"),
                };
                if scheme.is_empty() || authority.is_empty() {
                    return Err(FsError::Configuration(format!(
                        "path `{input}` has no scheme or authority"
                    )));
                }
                (Some(scheme.to_string()), Some(authority.to_string()), path)
            }
            None if input.starts_with('/') => (None, None, input),
            None => {
                return Err(FsError::Configuration(format!(
                    "path `{input}` is not absolute"
                )));
            }
        };
        Ok(Self {
            scheme,
            authority,
            path: normalize(path),
        })
    }

    fn qualified(scheme: &str, authority: &str, path: &str) -> Self {
        Self {
            scheme: Some(scheme.to_string()),
            authority: Some(authority.to_string()),
            path: normalize(&format!("/{}", path)),
        }
    }

    /// The path component, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Last path component; empty for the root.
    pub fn name(&self) -> &str {
        self.path
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    pub fn parent(&self) -> Option<SwiftPath> {
        if self.is_root() {
            return None;
        }
        let idx = self.path.rfind('/')?;
        let parent = if idx == 0 { "/" } else { &self.path[..idx] };
        Some(Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: parent.to_string(),
        })
    }

    pub fn join(&self, child: &str) -> SwiftPath {
        Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: normalize(&format!("{}/{}", self.path, child)),
        }
    }

    /// Compare by path component only, ignoring qualification.
    pub fn same_location(&self, other: &SwiftPath) -> bool {
        self.path == other.path
    }
}

impl FromStr for SwiftPath {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SwiftPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scheme, &self.authority) {
            (Some(scheme), Some(authority)) => write!(f, "{}://{}{}", scheme, authority, self.path),
            _ => f.write_str(&self.path),
        }
    }
}

/// Collapse repeated separators and drop a trailing one; the root stays `/`.
fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Binds hierarchical paths to one filesystem root URI
/// (`swift://<container>.<service>/`).
#[derive(Clone, Debug)]
pub struct PathTranslator {
    scheme: String,
    authority: String,
    container: String,
}

impl PathTranslator {
    pub fn new(root_uri: &str) -> FsResult<Self> {
        let url = Url::parse(root_uri).map_err(|err| {
            FsError::Configuration(format!("invalid filesystem URI `{root_uri}`: {err}"))
        })?;
        let host = url.host_str().ok_or_else(|| {
            FsError::Configuration(format!("filesystem URI `{root_uri}` has no host"))
        })?;
        let container = match host.find('.') {
            Some(idx) if idx > 0 => host[..idx].to_string(),
            _ => {
                return Err(FsError::Configuration(format!(
                    "hostname `{host}` must be in the form container.service"
                )));
            }
        };
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
            container,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn root(&self) -> SwiftPath {
        SwiftPath::qualified(&self.scheme, &self.authority, "/")
    }

    pub fn to_object_path(&self, path: &SwiftPath) -> ObjectPath {
        ObjectPath::new(self.container.clone(), path.path())
    }

    pub fn to_dir_path(&self, path: &SwiftPath) -> ObjectPath {
        self.to_object_path(path).to_dir()
    }

    /// Rebind `path` to this filesystem's scheme and authority.
    pub fn qualify(&self, path: &SwiftPath) -> SwiftPath {
        SwiftPath::qualified(&self.scheme, &self.authority, path.path())
    }

    /// Hierarchical path of an object key.
    pub fn qualify_object(&self, object: &ObjectPath) -> SwiftPath {
        self.qualify_key(object.key())
    }

    pub fn qualify_key(&self, key: &str) -> SwiftPath {
        SwiftPath::qualified(&self.scheme, &self.authority, key)
    }
}
