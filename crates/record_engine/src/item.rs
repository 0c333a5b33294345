use serde_json::{Map, Value};

use crate::location::SourceLocation;

/// An output record: an ordered mapping of dotted namespaced field
/// names (`when.date`, `weight.target`, ...) to values, ready for
/// serialization to a document store or queue.
pub type Item = Map<String, Value>;

/// Maximum length of the derived page description field.
pub const DESCRIPTION_LIMIT: usize = 200;

/// First `DESCRIPTION_LIMIT` characters of `text`, cut at a char
/// boundary.
pub fn truncate_description(text: &str) -> String {
    if text.len() <= DESCRIPTION_LIMIT {
        return text.to_string();
    }
    let mut end = DESCRIPTION_LIMIT;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Reassembles the followable URL from a link item's `target`
/// mapping. Returns `None` when the item has no structurally valid
/// target.
pub fn link_target(item: &Item) -> Option<String> {
    let value = item.get("target")?;
    let location: SourceLocation = serde_json::from_value(value.clone()).ok()?;
    Some(location.to_string())
}

#[cfg(test)]
mod tests {
    use super::{link_target, truncate_description, Item, DESCRIPTION_LIMIT};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn short_description_kept_as_is() {
        assert_eq!(truncate_description("short"), "short");
    }

    #[test]
    fn long_description_cut_at_char_boundary() {
        let text = "é".repeat(DESCRIPTION_LIMIT);
        let cut = truncate_description(&text);
        assert!(cut.len() <= DESCRIPTION_LIMIT);
        assert!(text.starts_with(&cut));
    }

    #[test]
    fn link_target_reassembles_url() {
        let mut item = Item::new();
        item.insert(
            "target".to_string(),
            json!({
                "scheme": "http",
                "netloc": "example.com",
                "path": "/a",
                "params": "",
                "query": "q=1",
                "fragment": ""
            }),
        );
        assert_eq!(
            link_target(&item).as_deref(),
            Some("http://example.com/a?q=1")
        );
    }

    #[test]
    fn link_target_missing_is_none() {
        assert_eq!(link_target(&Item::new()), None);
    }
}
