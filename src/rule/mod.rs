pub mod expand;
pub mod extractor;
pub mod template;

pub use extractor::{load_rules, Extraction, ExtractionRule, LoadedRules, RenderedEvent, RuleError};
pub use template::{Template, TemplateError, TIMESTAMP_FORMAT};
