//! Record engine: rule-driven extraction of page and link records
//! from fetched HTML documents.
mod decode;
mod dom;
mod item;
mod location;
mod record;
mod response;
mod rules;
mod signature;

pub use decode::{decode_body, DecodeError, DecodedBody};
pub use dom::{DomTree, ParseError};
pub use item::{link_target, truncate_description, Item, DESCRIPTION_LIMIT};
pub use location::SourceLocation;
pub use record::{PageRecord, RecordError};
pub use response::{FetchedResponse, RuleProvider, StaticResponse};
pub use rules::{
    FieldPattern, LinkRule, LinkRuleSpec, PatternError, PatternKind, RuleOverrides, RuleSet,
    SelectorPattern,
};
pub use signature::{job_id, signature};
