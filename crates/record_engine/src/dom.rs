use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::rules::{PatternKind, SelectorPattern};

/// Document could not be parsed into a usable tree. Fatal to the one
/// record being constructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("document body is empty")]
    EmptyDocument,
}

/// A selector pattern failed to evaluate. Recovered locally as zero
/// matches; extraction of the record continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("invalid css selector {expression:?}: {message}")]
    Css { expression: String, message: String },
    #[error("unsupported xpath expression {expression:?}")]
    UnsupportedXPath { expression: String },
}

/// Parsed HTML document plus the base URL used for resolving
/// relative links.
///
/// Cloning is a deep copy of the tree; pruning a clone never touches
/// the original.
#[derive(Debug, Clone)]
pub struct DomTree {
    html: Html,
    base: Option<Url>,
}

impl DomTree {
    /// Parses `text` into a document tree. The parser is
    /// error-recovering, so only an effectively empty body is
    /// rejected.
    pub fn parse(text: &str, base_url: &str) -> Result<Self, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::EmptyDocument);
        }
        Ok(Self {
            html: Html::parse_document(text),
            base: Url::parse(base_url).ok(),
        })
    }

    /// Evaluates every pattern in order against the whole document and
    /// returns the matches as one flat sequence. Non-destructive;
    /// duplicates across overlapping patterns are preserved. A failing
    /// pattern is logged and contributes zero matches.
    pub fn extract(&self, patterns: &[SelectorPattern]) -> Vec<NodeId> {
        let mut matches = Vec::new();
        for pattern in patterns {
            matches.extend(self.matches_or_empty(None, pattern));
        }
        matches
    }

    /// Like [`DomTree::extract`] for a single pattern, scoped to
    /// `scope` and its descendants. A CSS pattern can match the scope
    /// element itself (descendant-or-self), so a container doubles as
    /// its own field source.
    pub fn extract_within(&self, scope: NodeId, pattern: &SelectorPattern) -> Vec<NodeId> {
        self.matches_or_empty(Some(scope), pattern)
    }

    /// Detaches every subtree matched by `patterns`. Each pattern is
    /// resolved against the already-pruned tree before the next one
    /// runs, so overlapping prune rules compound.
    pub fn prune(&mut self, patterns: &[SelectorPattern]) {
        for pattern in patterns {
            for id in self.matches_or_empty(None, pattern) {
                if let Some(mut node) = self.html.tree.get_mut(id) {
                    node.detach();
                }
            }
        }
    }

    fn matches_or_empty(&self, scope: Option<NodeId>, pattern: &SelectorPattern) -> Vec<NodeId> {
        match self.select(scope, pattern) {
            Ok(ids) => ids,
            Err(err) => {
                log::warn!("selector recovered as zero matches: {err}");
                Vec::new()
            }
        }
    }

    fn select(
        &self,
        scope: Option<NodeId>,
        pattern: &SelectorPattern,
    ) -> Result<Vec<NodeId>, SelectorError> {
        let root = match scope {
            Some(id) => self
                .html
                .tree
                .get(id)
                .ok_or(SelectorError::UnsupportedXPath {
                    expression: pattern.expression.clone(),
                })?,
            None => self.html.tree.root(),
        };
        match pattern.kind {
            PatternKind::Css => {
                let selector = Selector::parse(&pattern.expression).map_err(|err| {
                    SelectorError::Css {
                        expression: pattern.expression.clone(),
                        message: err.to_string(),
                    }
                })?;
                // Scoped evaluation is descendant-or-self: the scope
                // element is a candidate for its own field patterns.
                // At document level the root is the document node,
                // which is never an element.
                let skip = usize::from(scope.is_none());
                Ok(root
                    .descendants()
                    .skip(skip)
                    .filter_map(ElementRef::wrap)
                    .filter(|element| selector.matches(element))
                    .map(|element| element.id())
                    .collect())
            }
            PatternKind::XPath => {
                let name = pattern.expression.strip_prefix("//").ok_or_else(|| {
                    SelectorError::UnsupportedXPath {
                        expression: pattern.expression.clone(),
                    }
                })?;
                if name == "comment()" {
                    return Ok(root
                        .descendants()
                        .skip(1)
                        .filter(|node| node.value().is_comment())
                        .map(|node| node.id())
                        .collect());
                }
                if !is_name_test(name) {
                    return Err(SelectorError::UnsupportedXPath {
                        expression: pattern.expression.clone(),
                    });
                }
                Ok(root
                    .descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .filter(|element| element.value().name().eq_ignore_ascii_case(name))
                    .map(|element| element.id())
                    .collect())
            }
        }
    }

    /// All text fragments of the subtree rooted at `id`, in document
    /// order, whitespace-normalized and joined with single spaces.
    /// Includes the subtree's trailing text (text immediately
    /// following the node inside its parent).
    pub fn fragment_text(&self, id: NodeId) -> String {
        let Some(node) = self.html.tree.get(id) else {
            return String::new();
        };
        let mut parts: Vec<String> = Vec::new();
        for descendant in node.descendants() {
            if let Some(text) = descendant.value().as_text() {
                parts.push(normalize_whitespace(&text.text));
            }
        }
        let mut sibling = node.next_sibling();
        while let Some(next) = sibling {
            match next.value().as_text() {
                Some(text) => {
                    parts.push(normalize_whitespace(&text.text));
                    sibling = next.next_sibling();
                }
                None => break,
            }
        }
        parts.retain(|part| !part.is_empty());
        parts.join(" ")
    }

    /// Value of attribute `name` on the element `id`, if both exist.
    pub fn element_attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.html
            .tree
            .get(id)
            .and_then(ElementRef::wrap)
            .and_then(|element| element.value().attr(name))
            .map(str::to_string)
    }

    /// Resolves a link reference against the document base URL.
    /// Absolute references pass through verbatim; the empty string
    /// stays empty.
    pub fn resolve(&self, reference: &str) -> String {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        if Url::parse(trimmed).is_ok() {
            return trimmed.to_string();
        }
        match &self.base {
            Some(base) => base
                .join(trimmed)
                .map(String::from)
                .unwrap_or_else(|_| trimmed.to_string()),
            None => trimmed.to_string(),
        }
    }

    /// Structural probe: the tag names of the `body` subtree in
    /// document order, skipping script and style elements.
    pub fn tag_outline(&self) -> String {
        let body = match self.select(None, &SelectorPattern::css("body")) {
            Ok(ids) => ids.into_iter().next(),
            Err(_) => None,
        };
        let Some(body) = body.and_then(|id| self.html.tree.get(id)) else {
            return String::new();
        };
        let mut tags = Vec::new();
        for node in body.descendants() {
            if let Some(element) = node.value().as_element() {
                let name = element.name();
                if name != "script" && name != "style" {
                    tags.push(name.to_string());
                }
            }
        }
        tags.join(" ")
    }
}

fn is_name_test(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(html: &str) -> DomTree {
        DomTree::parse(html, "http://example.com/dir/").unwrap()
    }

    #[test]
    fn empty_body_is_a_parse_error() {
        assert_eq!(
            DomTree::parse("   \n ", "http://example.com").unwrap_err(),
            ParseError::EmptyDocument
        );
    }

    #[test]
    fn xpath_name_test_matches_elements() {
        let dom = parse("<body><a href=\"x\">one</a><p><a>two</a></p></body>");
        let hits = dom.extract(&[SelectorPattern::xpath("//a")]);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn scoped_css_extraction_includes_the_scope_element() {
        let dom = parse("<body><a href=\"x\">one</a><a href=\"y\">two</a></body>");
        let anchors = dom.extract(&[SelectorPattern::xpath("//a")]);
        assert_eq!(anchors.len(), 2);
        let hits = dom.extract_within(anchors[0], &SelectorPattern::css("a"));
        assert_eq!(hits, vec![anchors[0]]);
    }

    #[test]
    fn xpath_comment_test_matches_comments() {
        let dom = parse("<body><!-- note --><p>text</p></body>");
        let hits = dom.extract(&[SelectorPattern::xpath("//comment()")]);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn unsupported_xpath_recovers_as_zero_matches() {
        let dom = parse("<body><a id=\"x\">one</a></body>");
        let hits = dom.extract(&[SelectorPattern::xpath("//a[@id]")]);
        assert!(hits.is_empty());
    }

    #[test]
    fn invalid_css_recovers_as_zero_matches() {
        let dom = parse("<body><a>one</a></body>");
        let hits = dom.extract(&[SelectorPattern::css("a[")]);
        assert!(hits.is_empty());
    }

    #[test]
    fn prune_detaches_matched_subtrees() {
        let mut dom = parse("<body><style>x{}</style><p>keep</p><!-- gone --></body>");
        dom.prune(&[
            SelectorPattern::xpath("//style"),
            SelectorPattern::xpath("//comment()"),
        ]);
        assert!(dom.extract(&[SelectorPattern::xpath("//style")]).is_empty());
        assert!(dom
            .extract(&[SelectorPattern::xpath("//comment()")])
            .is_empty());
        let kept = dom.extract(&[SelectorPattern::css("p")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dom.fragment_text(kept[0]), "keep");
    }

    #[test]
    fn fragment_text_normalizes_and_includes_trailing_text() {
        let dom = parse("<body><p>a\n  b <b>c</b> d</p> tail <span>next</span></body>");
        let paragraphs = dom.extract(&[SelectorPattern::css("p")]);
        assert_eq!(dom.fragment_text(paragraphs[0]), "a b c d tail");
    }

    #[test]
    fn resolve_joins_relative_against_base() {
        let dom = parse("<body></body>");
        assert_eq!(dom.resolve("page"), "http://example.com/dir/page");
        assert_eq!(dom.resolve("/abs"), "http://example.com/abs");
        assert_eq!(dom.resolve("http://other.org"), "http://other.org");
        assert_eq!(dom.resolve(""), "");
    }

    #[test]
    fn tag_outline_lists_body_subtree() {
        let dom = parse("<body><div><a>x</a><span>y</span></div><script>s</script></body>");
        assert_eq!(dom.tag_outline(), "body div a span");
    }
}
