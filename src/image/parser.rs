//! Container image reference parser.
//!
//! Splits references of the form `repository[:tag][@digest]`, following the
//! grammar used by container registries and runtimes. See
//! [`distribution/reference`](https://github.com/distribution/reference/blob/main/reference.go)
//! for the grammar this is modelled on.

use super::{Error, Result};

/// Maximum length of the repository part of a reference.
const NAME_MAX_LEN: usize = 255;

/// Maximum length of a tag.
const TAG_MAX_LEN: usize = 128;

/// Represents a strictly parsed image reference.
#[derive(Debug, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Repository including the registry domain, if any.
    pub repository: &'a str,
    /// Tag, if the reference carries one.
    pub tag: Option<&'a str>,
    /// Content digest (`algorithm:hex`), if the reference is pinned.
    pub digest: Option<&'a str>,
}

/// Parses a single image reference.
///
/// Performs no allocation on success; the returned [`Reference`] borrows from
/// `reference`. A tag and a digest may both be present.
///
/// # Errors
///
/// Returns an [`Error`] naming the first part of the reference that violates the
/// grammar.
pub fn parse_reference(reference: &str) -> Result<Reference<'_>> {
    if reference.is_empty() {
        return Err(Error::Empty);
    }

    let (name_tag, digest) = match reference.split_once('@') {
        Some((name_tag, digest)) => {
            if !is_digest(digest) {
                return Err(Error::InvalidDigest(digest.to_owned()));
            }
            (name_tag, Some(digest))
        }
        None => (reference, None),
    };

    // a colon followed by a slash belongs to a registry port, not a tag
    let (repository, tag) = match name_tag.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => {
            if !is_tag(tag) {
                return Err(Error::InvalidTag(tag.to_owned()));
            }
            (repository, Some(tag))
        }
        _ => (name_tag, None),
    };

    if repository.len() > NAME_MAX_LEN {
        return Err(Error::NameTooLong(repository.to_owned()));
    }
    if !is_repository(repository) {
        return Err(Error::InvalidRepository(repository.to_owned()));
    }

    Ok(Reference {
        repository,
        tag,
        digest,
    })
}

fn is_repository(repository: &str) -> bool {
    let mut components = repository.split('/').peekable();
    let Some(first) = components.next() else {
        return false;
    };

    if components.peek().is_some() && looks_like_domain(first) {
        if !is_domain(first) {
            return false;
        }
    } else if !is_path_component(first) {
        return false;
    }

    components.all(is_path_component)
}

fn looks_like_domain(component: &str) -> bool {
    component.contains(['.', ':'])
        || component == "localhost"
        || component.bytes().any(|b| b.is_ascii_uppercase())
}

fn is_domain(domain: &str) -> bool {
    let (host, port) = match domain.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };

    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }

    !host.is_empty() && host.split('.').all(is_domain_label)
}

fn is_domain_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

/// Path components are lowercase alphanumeric runs joined by `.`, `_`, `__` or any
/// number of `-`.
fn is_path_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) if is_lower_alnum(*first) && is_lower_alnum(*last) => {}
        _ => return false,
    }

    let mut i = 0;
    while i < bytes.len() {
        if is_lower_alnum(bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !is_lower_alnum(bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let valid = matches!(separator, "." | "_" | "__") || separator.bytes().all(|b| b == b'-');
        if !valid {
            return false;
        }
    }

    true
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_digit() || b.is_ascii_lowercase()
}

fn is_tag(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    let Some(first) = bytes.first() else {
        return false;
    };

    bytes.len() <= TAG_MAX_LEN
        && (first.is_ascii_alphanumeric() || *first == b'_')
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

fn is_digest(digest: &str) -> bool {
    let Some((algorithm, encoded)) = digest.split_once(':') else {
        return false;
    };

    !encoded.is_empty()
        && encoded.bytes().all(|b| b.is_ascii_hexdigit())
        && algorithm
            .split(['-', '_', '+', '.'])
            .all(|component| {
                let bytes = component.as_bytes();
                bytes.first().is_some_and(|b| b.is_ascii_alphabetic())
                    && bytes.iter().all(|b| b.is_ascii_alphanumeric())
            })
}
