use crate::decode::{decode_body, DecodeError};
use crate::rules::RuleOverrides;

/// A fetched HTTP response, reduced to what extraction needs: the
/// final URL and the decoded textual body. Fetching itself is an
/// external collaborator.
pub trait FetchedResponse {
    fn url(&self) -> &str;
    fn body(&self) -> &str;
}

/// Per-site extraction rules. Callers supply one provider for the
/// whole crawl; returning `None` for a URL means the site is not
/// configured and the record is skipped.
pub trait RuleProvider {
    fn rules_for(&self, response: &dyn FetchedResponse) -> Option<RuleOverrides>;
}

impl<F> RuleProvider for F
where
    F: Fn(&dyn FetchedResponse) -> Option<RuleOverrides>,
{
    fn rules_for(&self, response: &dyn FetchedResponse) -> Option<RuleOverrides> {
        self(response)
    }
}

/// An owned, already-decoded response value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResponse {
    pub url: String,
    pub body: String,
}

impl StaticResponse {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    /// Builds a response from raw bytes, decoding them with the
    /// charset tiering of [`decode_body`].
    pub fn from_bytes(
        url: impl Into<String>,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<Self, DecodeError> {
        let decoded = decode_body(bytes, content_type)?;
        Ok(Self {
            url: url.into(),
            body: decoded.text,
        })
    }
}

impl FetchedResponse for StaticResponse {
    fn url(&self) -> &str {
        &self.url
    }

    fn body(&self) -> &str {
        &self.body
    }
}
