use std::fmt;

mod error;
mod parser;

pub use error::{Error, Result};
pub use parser::{Reference, parse_reference};

/// Tag assumed for references that carry neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

/// Canonical identity of a container image: repository, tag and content digest.
///
/// Two references that normalize to the same triple are the same identity.
///
/// # Examples
///
/// ```
/// # use kubernetes_images_exporter::image::ImageIdentity;
/// let identity = ImageIdentity::parse("nginx:1.25");
/// assert_eq!(identity.repository, "nginx");
/// assert_eq!(identity.tag, "1.25");
/// assert_eq!(identity.digest, "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ImageIdentity {
    pub repository: String,
    pub tag: String,
    pub digest: String,
}

impl ImageIdentity {
    /// Parses an image reference, never failing.
    ///
    /// A malformed reference yields [`ImageIdentity::fallback`], so a single irregular
    /// image string never prevents a workload from being counted.
    pub fn parse(raw: &str) -> Self {
        Self::try_parse(raw).unwrap_or_else(|_| Self::fallback(raw))
    }

    /// Strictly parses an image reference.
    ///
    /// Surrounding whitespace is ignored. The tag defaults to [`DEFAULT_TAG`] only
    /// when the reference has neither a tag nor a digest.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the reference does not follow the
    /// `repository[:tag][@digest]` grammar.
    pub fn try_parse(raw: &str) -> Result<Self> {
        let reference = parse_reference(raw.trim())?;
        let tag = match (reference.tag, reference.digest) {
            (Some(tag), _) => tag,
            (None, Some(_)) => "",
            (None, None) => DEFAULT_TAG,
        };

        Ok(Self {
            repository: reference.repository.to_owned(),
            tag: tag.to_owned(),
            digest: reference.digest.unwrap_or_default().to_owned(),
        })
    }

    /// Best-effort identity for a reference that could not be parsed: the whole
    /// trimmed string as repository, with empty tag and digest.
    pub fn fallback(raw: &str) -> Self {
        Self {
            repository: raw.trim().to_owned(),
            tag: String::new(),
            digest: String::new(),
        }
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository)?;
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        if !self.digest.is_empty() {
            write!(f, "@{}", self.digest)?;
        }
        Ok(())
    }
}
