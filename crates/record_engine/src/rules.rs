use thiserror::Error;

use crate::item::Item;

/// Error raised while parsing declarative selector rules. Rules are
/// validated once at resolve time, so a malformed pattern fails the
/// record before any extraction runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern {pattern:?} is missing its kind prefix (expected kind:path)")]
    MissingKind { pattern: String },
    #[error("pattern {pattern:?} has unknown kind {kind:?} (expected css or xpath)")]
    UnknownKind { pattern: String, kind: String },
    #[error("pattern {pattern:?} must be kind:path[\\attribute] - attribute is optional")]
    TooManyAttributes { pattern: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Css,
    XPath,
}

/// A typed selector query: `css:tr.athing` or `xpath://body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPattern {
    pub kind: PatternKind,
    pub expression: String,
}

impl SelectorPattern {
    pub fn css(expression: impl Into<String>) -> Self {
        Self {
            kind: PatternKind::Css,
            expression: expression.into(),
        }
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self {
            kind: PatternKind::XPath,
            expression: expression.into(),
        }
    }

    /// Parses `kind:expression` into a typed pattern.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let (kind, expression) = raw.split_once(':').ok_or_else(|| PatternError::MissingKind {
            pattern: raw.to_string(),
        })?;
        match kind {
            "css" => Ok(Self::css(expression)),
            "xpath" => Ok(Self::xpath(expression)),
            other => Err(PatternError::UnknownKind {
                pattern: raw.to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

/// A selector pattern with an optional attribute to extract instead of
/// text: `css:a.storylink\href`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPattern {
    pub selector: SelectorPattern,
    pub attribute: Option<String>,
}

impl FieldPattern {
    /// Parses `kind:expression[\attribute]`. More than one attribute
    /// separator is malformed.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let pattern = SelectorPattern::parse(raw)?;
        let parts: Vec<&str> = pattern.expression.split('\\').collect();
        match parts.as_slice() {
            [_] => Ok(Self {
                selector: pattern,
                attribute: None,
            }),
            [expression, attribute] => Ok(Self {
                selector: SelectorPattern {
                    kind: pattern.kind,
                    expression: (*expression).to_string(),
                },
                attribute: Some((*attribute).to_string()),
            }),
            _ => Err(PatternError::TooManyAttributes {
                pattern: raw.to_string(),
            }),
        }
    }
}

/// One link-extraction rule: a container pattern plus the named field
/// patterns evaluated inside each matched container, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRule {
    pub container: SelectorPattern,
    pub fields: Vec<(String, FieldPattern)>,
}

impl LinkRule {
    pub fn parse(spec: &LinkRuleSpec) -> Result<Self, PatternError> {
        let container = SelectorPattern::parse(&spec.container)?;
        let mut fields = Vec::with_capacity(spec.fields.len());
        for (name, raw) in &spec.fields {
            fields.push((name.clone(), FieldPattern::parse(raw)?));
        }
        Ok(Self { container, fields })
    }
}

/// Raw (unparsed) form of a [`LinkRule`], as supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRuleSpec {
    pub container: String,
    pub fields: Vec<(String, String)>,
}

impl LinkRuleSpec {
    pub fn new(container: impl Into<String>, fields: &[(&str, &str)]) -> Self {
        Self {
            container: container.into(),
            fields: fields
                .iter()
                .map(|(name, pattern)| (name.to_string(), pattern.to_string()))
                .collect(),
        }
    }
}

/// Caller-supplied overrides for one record. Every populated field
/// replaces the corresponding default wholesale; there is no deep
/// merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOverrides {
    pub link_prune: Option<Vec<String>>,
    pub link_keep: Option<Vec<LinkRuleSpec>>,
    pub text_prune: Option<Vec<String>>,
    pub text_keep: Option<Vec<String>>,
    pub source_weight: Option<i64>,
    pub target_weight: Option<i64>,
    /// Extra identity appended to the page's source identity set.
    pub target_id: Option<String>,
    /// Provenance carried over from the link that led to this page.
    pub link_item: Option<Item>,
}

/// The resolved extraction configuration for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub link_prune: Vec<SelectorPattern>,
    pub link_keep: Vec<LinkRule>,
    pub text_prune: Vec<SelectorPattern>,
    pub text_keep: Vec<SelectorPattern>,
    pub source_weight: i64,
    pub target_weight: i64,
    pub target_id: Option<String>,
    pub inherited_link_item: Item,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            link_prune: vec![
                SelectorPattern::xpath("//style"),
                SelectorPattern::xpath("//script"),
                SelectorPattern::xpath("//comment()"),
            ],
            link_keep: vec![LinkRule {
                container: SelectorPattern::xpath("//a"),
                fields: vec![
                    (
                        "target".to_string(),
                        FieldPattern {
                            selector: SelectorPattern::css("a"),
                            attribute: Some("href".to_string()),
                        },
                    ),
                    (
                        "title".to_string(),
                        FieldPattern {
                            selector: SelectorPattern::css("a"),
                            attribute: None,
                        },
                    ),
                ],
            }],
            text_prune: vec![
                SelectorPattern::xpath("//style"),
                SelectorPattern::xpath("//script"),
                SelectorPattern::xpath("//comment()"),
                SelectorPattern::css("script"),
            ],
            text_keep: vec![SelectorPattern::xpath("//body")],
            source_weight: 1,
            target_weight: 1,
            target_id: None,
            inherited_link_item: Item::new(),
        }
    }
}

impl RuleSet {
    /// Applies caller overrides on top of the defaults, parsing every
    /// pattern exactly once.
    pub fn resolve(overrides: RuleOverrides) -> Result<Self, PatternError> {
        let mut rules = RuleSet::default();
        if let Some(raw) = overrides.link_prune {
            rules.link_prune = parse_patterns(&raw)?;
        }
        if let Some(specs) = overrides.link_keep {
            rules.link_keep = specs
                .iter()
                .map(LinkRule::parse)
                .collect::<Result<_, _>>()?;
        }
        if let Some(raw) = overrides.text_prune {
            rules.text_prune = parse_patterns(&raw)?;
        }
        if let Some(raw) = overrides.text_keep {
            rules.text_keep = parse_patterns(&raw)?;
        }
        if let Some(weight) = overrides.source_weight {
            rules.source_weight = weight;
        }
        if let Some(weight) = overrides.target_weight {
            rules.target_weight = weight;
        }
        rules.target_id = overrides.target_id;
        if let Some(item) = overrides.link_item {
            rules.inherited_link_item = item;
        }
        Ok(rules)
    }

    /// Identity inherited from the link that produced this page, if
    /// the link item carried one.
    pub fn inherited_identity(&self) -> Option<&str> {
        self.inherited_link_item
            .get("id.target")
            .and_then(|value| value.as_str())
    }
}

fn parse_patterns(raw: &[String]) -> Result<Vec<SelectorPattern>, PatternError> {
    raw.iter().map(|p| SelectorPattern::parse(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn selector_pattern_parses_kind_and_expression() {
        assert_eq!(
            SelectorPattern::parse("css:tr.athing"),
            Ok(SelectorPattern::css("tr.athing"))
        );
        assert_eq!(
            SelectorPattern::parse("xpath://body"),
            Ok(SelectorPattern::xpath("//body"))
        );
    }

    #[test]
    fn selector_pattern_rejects_unknown_kind() {
        assert!(matches!(
            SelectorPattern::parse("regex:.*"),
            Err(PatternError::UnknownKind { .. })
        ));
        assert!(matches!(
            SelectorPattern::parse("no-separator"),
            Err(PatternError::MissingKind { .. })
        ));
    }

    #[test]
    fn field_pattern_splits_optional_attribute() {
        let plain = FieldPattern::parse("css:a.storylink").unwrap();
        assert_eq!(plain.attribute, None);

        let with_attr = FieldPattern::parse("css:a.storylink\\href").unwrap();
        assert_eq!(with_attr.selector.expression, "a.storylink");
        assert_eq!(with_attr.attribute.as_deref(), Some("href"));
    }

    #[test]
    fn field_pattern_rejects_double_attribute() {
        assert!(matches!(
            FieldPattern::parse("css:a\\href\\title"),
            Err(PatternError::TooManyAttributes { .. })
        ));
    }

    #[test]
    fn overrides_replace_fields_wholesale() {
        let rules = RuleSet::resolve(RuleOverrides {
            text_keep: Some(vec!["css:tr.athing".to_string()]),
            source_weight: Some(42),
            ..RuleOverrides::default()
        })
        .unwrap();

        assert_eq!(rules.text_keep, vec![SelectorPattern::css("tr.athing")]);
        assert_eq!(rules.source_weight, 42);
        // Untouched fields keep their defaults.
        assert_eq!(rules.text_prune, RuleSet::default().text_prune);
        assert_eq!(rules.target_weight, 1);
    }

    #[test]
    fn resolve_fails_fast_on_malformed_link_rule() {
        let result = RuleSet::resolve(RuleOverrides {
            link_keep: Some(vec![LinkRuleSpec::new(
                "css:tr.athing",
                &[("target", "css:a\\href\\extra")],
            )]),
            ..RuleOverrides::default()
        });
        assert!(matches!(
            result,
            Err(PatternError::TooManyAttributes { .. })
        ));
    }
}
