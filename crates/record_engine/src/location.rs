use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural decomposition of a URL: scheme, network location, path,
/// params, query, fragment.
///
/// Parsing never fails: input that does not look like a URL degrades
/// to a path-only location, and missing components stay empty. Field
/// order is significant because the serialized form feeds the
/// signature scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub scheme: String,
    pub netloc: String,
    pub path: String,
    pub params: String,
    pub query: String,
    pub fragment: String,
}

impl SourceLocation {
    /// Splits `url` into its six components.
    pub fn parse(url: &str) -> Self {
        let mut rest = url;
        let mut location = SourceLocation::default();

        if let Some(idx) = rest.find(':') {
            let candidate = &rest[..idx];
            if is_scheme(candidate) {
                location.scheme = candidate.to_ascii_lowercase();
                rest = &rest[idx + 1..];
            }
        }

        if let Some(after) = rest.strip_prefix("//") {
            let end = after
                .find(['/', '?', '#'])
                .unwrap_or(after.len());
            location.netloc = after[..end].to_string();
            rest = &after[end..];
        }

        if let Some(idx) = rest.find('#') {
            location.fragment = rest[idx + 1..].to_string();
            rest = &rest[..idx];
        }

        if let Some(idx) = rest.find('?') {
            location.query = rest[idx + 1..].to_string();
            rest = &rest[..idx];
        }

        // Params live in the last path segment only.
        let segment_start = rest.rfind('/').map_or(0, |i| i + 1);
        if let Some(idx) = rest[segment_start..].find(';') {
            let split = segment_start + idx;
            location.params = rest[split + 1..].to_string();
            rest = &rest[..split];
        }

        location.path = rest.to_string();
        location
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl fmt::Display for SourceLocation {
    /// Reassembles the URL from its components.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if !self.netloc.is_empty() {
            write!(f, "//{}", self.netloc)?;
        }
        write!(f, "{}", self.path)?;
        if !self.params.is_empty() {
            write!(f, ";{}", self.params)?;
        }
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SourceLocation;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_host_has_empty_path() {
        let loc = SourceLocation::parse("http://example.com");
        assert_eq!(loc.scheme, "http");
        assert_eq!(loc.netloc, "example.com");
        assert_eq!(loc.path, "");
    }

    #[test]
    fn full_url_splits_into_all_components() {
        let loc = SourceLocation::parse("https://host:8080/a/b;v=1?q=2#frag");
        assert_eq!(
            loc,
            SourceLocation {
                scheme: "https".into(),
                netloc: "host:8080".into(),
                path: "/a/b".into(),
                params: "v=1".into(),
                query: "q=2".into(),
                fragment: "frag".into(),
            }
        );
    }

    #[test]
    fn params_split_only_in_last_segment() {
        let loc = SourceLocation::parse("http://h/a;x/b");
        assert_eq!(loc.path, "/a;x/b");
        assert_eq!(loc.params, "");
    }

    #[test]
    fn non_url_degrades_to_path() {
        let loc = SourceLocation::parse("not a url");
        assert_eq!(loc.scheme, "");
        assert_eq!(loc.netloc, "");
        assert_eq!(loc.path, "not a url");
    }

    #[test]
    fn empty_input_is_all_empty() {
        assert_eq!(SourceLocation::parse(""), SourceLocation::default());
    }

    #[test]
    fn display_roundtrips_common_urls() {
        for url in [
            "http://ycombinator.com",
            "https://host/a/b?q=1#f",
            "/relative/path",
        ] {
            assert_eq!(SourceLocation::parse(url).to_string(), url);
        }
    }
}
