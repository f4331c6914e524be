use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Prefix marking an image that lives in Google Drive.
pub const DRIVE_REF_PREFIX: &str = "google-drive-id:";

/// Where an image's bytes live. Stored on disk and in Drive as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageRef {
    #[default]
    Empty,
    /// Only valid on the device that picked it.
    Local(String),
    /// A Drive file id.
    Remote(String),
    /// Absolute http(s) URL, used by seed data and web sources.
    Url(String),
}

impl ImageRef {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            ImageRef::Empty
        } else if let Some(id) = s.strip_prefix(DRIVE_REF_PREFIX) {
            ImageRef::Remote(id.to_string())
        } else if s.starts_with("http") {
            ImageRef::Url(s.to_string())
        } else {
            ImageRef::Local(s.to_string())
        }
    }

    #[must_use]
    pub fn remote(file_id: &str) -> Self {
        ImageRef::Remote(file_id.to_string())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, ImageRef::Empty)
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, ImageRef::Remote(_))
    }

    /// True for references that must be uploaded before they can leave the
    /// device.
    #[must_use]
    pub fn needs_upload(&self) -> bool {
        matches!(self, ImageRef::Local(_))
    }

    #[must_use]
    pub fn drive_file_id(&self) -> Option<&str> {
        match self {
            ImageRef::Remote(id) => Some(id),
            _ => None,
        }
    }

    /// Filesystem path of a local reference, with any `file://` scheme removed.
    #[must_use]
    pub fn local_path(&self) -> Option<PathBuf> {
        match self {
            ImageRef::Local(uri) => {
                let path = uri.strip_prefix("file://").unwrap_or(uri);
                Some(PathBuf::from(path))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Empty => Ok(()),
            ImageRef::Local(s) | ImageRef::Url(s) => f.write_str(s),
            ImageRef::Remote(id) => write!(f, "{DRIVE_REF_PREFIX}{id}"),
        }
    }
}

impl From<String> for ImageRef {
    fn from(s: String) -> Self {
        ImageRef::parse(&s)
    }
}

impl From<ImageRef> for String {
    fn from(r: ImageRef) -> Self {
        r.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        assert_eq!(ImageRef::parse(""), ImageRef::Empty);
        assert_eq!(
            ImageRef::parse("google-drive-id:abc123"),
            ImageRef::Remote("abc123".to_string())
        );
        assert_eq!(
            ImageRef::parse("https://images.example.com/a.jpg"),
            ImageRef::Url("https://images.example.com/a.jpg".to_string())
        );
        assert_eq!(
            ImageRef::parse("file:///local.jpg"),
            ImageRef::Local("file:///local.jpg".to_string())
        );
        assert_eq!(
            ImageRef::parse("/home/me/photo.jpg"),
            ImageRef::Local("/home/me/photo.jpg".to_string())
        );
    }

    #[test]
    fn test_display_restores_original_string() {
        for s in [
            "",
            "google-drive-id:abc123",
            "http://x.test/a.png",
            "file:///local.jpg",
        ] {
            assert_eq!(ImageRef::parse(s).to_string(), s);
        }
    }

    #[test]
    fn test_serde_as_plain_string() {
        let r: ImageRef = serde_json::from_str(r#""google-drive-id:f1""#).unwrap();
        assert_eq!(r.drive_file_id(), Some("f1"));
        assert_eq!(serde_json::to_string(&r).unwrap(), r#""google-drive-id:f1""#);
    }

    #[test]
    fn test_local_path_strips_scheme() {
        let r = ImageRef::parse("file:///tmp/photo.jpg");
        assert_eq!(r.local_path(), Some(PathBuf::from("/tmp/photo.jpg")));
        assert!(r.needs_upload());
        assert!(ImageRef::parse("google-drive-id:x").local_path().is_none());
        assert!(!ImageRef::parse("https://a.test/x").needs_upload());
        assert!(!ImageRef::Empty.needs_upload());
    }
}
