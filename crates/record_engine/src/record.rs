use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::dom::{DomTree, ParseError};
use crate::item::{truncate_description, Item};
use crate::location::SourceLocation;
use crate::response::{FetchedResponse, RuleProvider};
use crate::rules::{PatternError, RuleSet, SelectorPattern};
use crate::signature::{job_id, signature};

/// Why a record could not be constructed. The `from_*` boundaries log
/// this and return no record, so one bad page never aborts a batch.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no extraction rules configured for {url}")]
    MissingRules { url: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// One fetched page plus its resolved extraction rules.
///
/// The four derived values (`text`, `identity`, `page_item`,
/// `link_items`) and the `now` timestamp are computed on first access
/// and memoized. Overwriting `now` after any derived field has been
/// read does not invalidate the cached fields; set it before the
/// first read (tests rely on this to observe deterministic
/// identities).
#[derive(Debug, Clone)]
pub struct PageRecord {
    dom: DomTree,
    location: SourceLocation,
    rules: RuleSet,
    now: Option<DateTime<Utc>>,
    text: Option<Vec<String>>,
    id: Option<String>,
    base_item: Option<Item>,
    page_item: Option<Item>,
    link_items: Option<Vec<Item>>,
}

impl PageRecord {
    /// Wraps a parsed document with resolved rules. An identity
    /// inherited through the rules' link item pre-seeds this record's
    /// identity.
    pub fn new(url: &str, dom: DomTree, rules: RuleSet) -> Self {
        let id = rules.inherited_identity().map(str::to_string);
        Self {
            dom,
            location: SourceLocation::parse(url),
            rules,
            now: None,
            text: None,
            id,
            base_item: None,
            page_item: None,
            link_items: None,
        }
    }

    /// Builds a record from a fetched response, with per-site rules
    /// from `provider`.
    pub fn try_from_response(
        response: &dyn FetchedResponse,
        provider: &dyn RuleProvider,
    ) -> Result<Self, RecordError> {
        let overrides = provider
            .rules_for(response)
            .ok_or_else(|| RecordError::MissingRules {
                url: response.url().to_string(),
            })?;
        let rules = RuleSet::resolve(overrides)?;
        let dom = DomTree::parse(response.body(), response.url())?;
        Ok(Self::new(response.url(), dom, rules))
    }

    /// Like [`PageRecord::try_from_response`] but swallows the failure:
    /// the cause is logged and the caller gets no record.
    pub fn from_response(
        response: &dyn FetchedResponse,
        provider: &dyn RuleProvider,
    ) -> Option<Self> {
        match Self::try_from_response(response, provider) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("skipping {}: {err}", response.url());
                None
            }
        }
    }

    /// Builds a record for a page reached by following `link_item`,
    /// carrying the link's provenance into this record.
    pub fn try_from_link(
        response: &dyn FetchedResponse,
        link_item: Item,
        provider: &dyn RuleProvider,
    ) -> Result<Self, RecordError> {
        let mut overrides = provider
            .rules_for(response)
            .ok_or_else(|| RecordError::MissingRules {
                url: response.url().to_string(),
            })?;
        overrides.link_item = Some(link_item);
        let rules = RuleSet::resolve(overrides)?;
        let dom = DomTree::parse(response.body(), response.url())?;
        Ok(Self::new(response.url(), dom, rules))
    }

    /// Swallowing variant of [`PageRecord::try_from_link`].
    pub fn from_link(
        response: &dyn FetchedResponse,
        link_item: Item,
        provider: &dyn RuleProvider,
    ) -> Option<Self> {
        match Self::try_from_link(response, link_item, provider) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("skipping linked {}: {err}", response.url());
                None
            }
        }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The canonical document; pruning always happens on copies, so
    /// this tree is never mutated by any derived-field access.
    pub fn dom(&self) -> &DomTree {
        &self.dom
    }

    /// Structural probe over the canonical document.
    pub fn tag_outline(&self) -> String {
        self.dom.tag_outline()
    }

    /// Retrieval timestamp, defaulted to the current time on first
    /// access. Identity computation hashes its date portion.
    pub fn now(&mut self) -> DateTime<Utc> {
        *self.now.get_or_insert_with(Utc::now)
    }

    /// Overrides the retrieval timestamp. Must happen before any
    /// derived field is first read; later writes leave already-cached
    /// fields stale by design.
    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = Some(now);
    }

    /// Ordered, deduplicated sequence of the page's text fragments.
    pub fn text(&mut self) -> &[String] {
        if self.text.is_none() {
            let text = self.extract_text();
            self.text = Some(text);
        }
        self.text.get_or_insert_with(Vec::new)
    }

    /// Stable content-addressable identity of this page: a digest of
    /// the source location and the date portion of `now`, unless the
    /// rules inherited one from the link that led here.
    pub fn identity(&mut self) -> &str {
        if self.id.is_none() {
            let date = self.now().date_naive();
            self.id = Some(signature(&(&self.location, date)));
        }
        self.id.get_or_insert_with(String::new)
    }

    /// The canonical output record for this page.
    pub fn page_item(&mut self) -> &Item {
        self.ensure_page_item();
        self.page_item.get_or_insert_with(Item::new)
    }

    /// One output record per retained link, each inheriting this
    /// page's provenance.
    pub fn link_items(&mut self) -> &[Item] {
        if self.link_items.is_none() {
            let items = self.derive_link_items();
            self.link_items = Some(items);
        }
        self.link_items.get_or_insert_with(Vec::new)
    }

    fn extract_text(&self) -> Vec<String> {
        let mut dom = self.dom.clone();
        dom.prune(&self.rules.text_prune);
        let mut fragments: Vec<String> = Vec::new();
        for id in dom.extract(&self.rules.text_keep) {
            let fragment = dom.fragment_text(id);
            if !fragment.is_empty() && !fragments.contains(&fragment) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    fn ensure_page_item(&mut self) {
        if self.page_item.is_some() {
            return;
        }
        let id = self.identity().to_string();
        let now = self.now();
        let text = self.text().to_vec();

        let mut id_source = vec![signature(&self.location)];
        if let Some(target_id) = &self.rules.target_id {
            if !id_source.contains(target_id) {
                id_source.push(target_id.clone());
            }
        }

        let mut base = Item::new();
        base.insert("id".to_string(), Value::String(id.clone()));
        base.insert("id.job".to_string(), Value::String(job_id().to_string()));
        base.insert("id.source.date".to_string(), Value::String(id));
        base.insert(
            "id.source".to_string(),
            Value::Array(id_source.into_iter().map(Value::String).collect()),
        );
        base.insert(
            "source".to_string(),
            serde_json::to_value(&self.location).unwrap_or(Value::Null),
        );
        base.insert(
            "text".to_string(),
            Value::Array(text.iter().cloned().map(Value::String).collect()),
        );
        base.insert(
            "when.date".to_string(),
            Value::String(now.date_naive().to_string()),
        );
        base.insert(
            "when.retrieved".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        base.insert(
            "weight.source".to_string(),
            Value::from(self.rules.source_weight),
        );

        let head = self.derive_head(&text);
        let mut full = base.clone();
        for (key, value) in head {
            // Base field names are namespaced and disjoint from scanned
            // metadata; never overwrite them.
            if !full.contains_key(&key) {
                full.insert(key, value);
            }
        }

        self.base_item = Some(base);
        self.page_item = Some(full);
    }

    fn derive_head(&self, text: &[String]) -> Item {
        let mut head = Item::new();

        let titles: Vec<Value> = self
            .dom
            .extract(&[SelectorPattern::css("head title")])
            .into_iter()
            .map(|id| self.dom.fragment_text(id))
            .filter(|title| !title.is_empty())
            .map(Value::String)
            .collect();
        if !titles.is_empty() {
            head.insert("page.title".to_string(), Value::Array(titles));
        }
        if let Some(first) = text.first() {
            head.insert(
                "page.description".to_string(),
                Value::String(truncate_description(first)),
            );
        }
        head.insert(
            "page.url".to_string(),
            Value::String(self.location.to_string()),
        );

        for id in self.dom.extract(&[SelectorPattern::css("meta")]) {
            let Some(content) = self.dom.element_attr(id, "content") else {
                continue;
            };
            for attr in ["property", "name"] {
                let Some(raw_name) = self.dom.element_attr(id, attr) else {
                    continue;
                };
                if !raw_name.contains(':') {
                    continue;
                }
                let key = raw_name.split(':').collect::<Vec<_>>().join(".");
                match head.get_mut(&key) {
                    Some(Value::Array(values)) => values.push(Value::String(content.clone())),
                    _ => {
                        head.insert(key, Value::Array(vec![Value::String(content.clone())]));
                    }
                }
            }
        }
        head
    }

    fn derive_link_items(&mut self) -> Vec<Item> {
        self.ensure_page_item();
        let mut base = self.base_item.clone().unwrap_or_default();
        base.remove("text");

        let mut dom = self.dom.clone();
        dom.prune(&self.rules.link_prune);

        let mut items = Vec::new();
        let link_keep = self.rules.link_keep.clone();
        for rule in &link_keep {
            for container in dom.extract(std::slice::from_ref(&rule.container)) {
                let mut item = base.clone();
                for (name, field) in &rule.fields {
                    let matches = dom.extract_within(container, &field.selector);
                    if matches.is_empty() {
                        continue;
                    }
                    let values: Vec<Value> = match &field.attribute {
                        Some(attribute) => matches
                            .iter()
                            .filter_map(|id| dom.element_attr(*id, attribute))
                            .map(Value::String)
                            .collect(),
                        None => matches
                            .iter()
                            .map(|id| Value::String(dom.fragment_text(*id)))
                            .collect(),
                    };
                    if !values.is_empty() {
                        item.insert(name.clone(), Value::Array(values));
                    }
                }

                let raw_target = item
                    .get("target")
                    .and_then(Value::as_array)
                    .and_then(|values| values.first())
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let target = SourceLocation::parse(&dom.resolve(&raw_target));
                let target_value = serde_json::to_value(&target).unwrap_or(Value::Null);

                let source_value = item.get("source").cloned().unwrap_or(Value::Null);
                let date_value = item.get("when.date").cloned().unwrap_or(Value::Null);
                let link_id = signature(&(&source_value, &target_value, &date_value));

                item.insert("target".to_string(), target_value.clone());
                item.insert("id".to_string(), Value::String(link_id.clone()));
                item.insert(
                    "id.source.target.date".to_string(),
                    Value::String(link_id),
                );
                item.insert(
                    "id.target".to_string(),
                    Value::String(signature(&target_value)),
                );
                item.insert(
                    "weight.target".to_string(),
                    Value::from(self.rules.target_weight),
                );
                items.push(item);
            }
        }
        items
    }
}
