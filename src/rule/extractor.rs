use crate::config::types::EventConfig;
use crate::rule::expand::translate;
use crate::rule::template::{Template, TemplateError};
use chrono::{DateTime, Utc};
use regex::bytes::{CaptureMatches, Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tera::Context;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Template variables every match provides. Named capture groups may not
/// reuse these names.
pub const RESERVED_NAMES: [&str; 5] = ["match", "groups", "captures", "event_type", "channel"];

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("regex compilation error for pattern '{pattern}': {source}")]
    RegexCompilation {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("capture group '{0}' collides with a built-in template variable")]
    ReservedGroupName(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// One payload produced by a rule for one match.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedEvent {
    pub id: Uuid,
    pub rule: String,
    pub event_type: String,
    pub channel: String,
    pub payload: String,
    /// File the matched bytes came from, when known.
    pub source: Option<PathBuf>,
    pub rendered_at: DateTime<Utc>,
}

/// A compiled pattern and the template rendered for each of its matches.
#[derive(Debug)]
pub struct ExtractionRule {
    name: String,
    pattern: Regex,
    template: Template,
    event_type: String,
    channel: String,
}

impl ExtractionRule {
    /// Build a rule from a pattern and a template body.
    pub fn new(
        name: &str,
        pattern: &str,
        template_body: &str,
        event_type: &str,
        channel: &str,
    ) -> Result<Self, RuleError> {
        let pattern = compile_pattern(pattern)?;
        Self::assemble(name, pattern, template_body, event_type, channel)
    }

    /// Build a rule from its configuration, reading the template file.
    pub fn from_config(name: &str, config: &EventConfig) -> Result<Self, RuleError> {
        let pattern = compile_pattern(&config.src)?;
        let body = Template::read_body(&config.dest)?;
        Self::assemble(name, pattern, &body, &config.event_type, &config.channel_name)
    }

    fn assemble(
        name: &str,
        pattern: Regex,
        template_body: &str,
        event_type: &str,
        channel: &str,
    ) -> Result<Self, RuleError> {
        if let Some(reserved) = pattern
            .capture_names()
            .flatten()
            .find(|group| RESERVED_NAMES.contains(group))
        {
            return Err(RuleError::ReservedGroupName(reserved.to_string()));
        }

        let template = Template::compile(name, &translate(template_body, &pattern))?;

        Ok(Self {
            name: name.to_string(),
            pattern,
            template,
            event_type: event_type.to_string(),
            channel: channel.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Scan `buffer` for every non-overlapping match, left to right, and
    /// render the template for each.
    ///
    /// Rendering happens lazily as the iterator is advanced. A match whose
    /// template fails to render is logged and skipped.
    pub fn extract<'r, 'b>(&'r self, buffer: &'b [u8]) -> Extraction<'r, 'b> {
        Extraction {
            rule: self,
            matches: self.pattern.captures_iter(buffer),
        }
    }

    fn render(&self, captures: &Captures<'_>) -> Result<RenderedEvent, TemplateError> {
        let context = self.context_for(captures);
        let payload = self.template.render(&context)?;

        Ok(RenderedEvent {
            id: Uuid::new_v4(),
            rule: self.name.clone(),
            event_type: self.event_type.clone(),
            channel: self.channel.clone(),
            payload,
            source: None,
            rendered_at: Utc::now(),
        })
    }

    fn context_for(&self, captures: &Captures<'_>) -> Context {
        let mut context = Context::new();

        let groups: Vec<String> = captures
            .iter()
            .map(|group| group.map(|m| lossy(m.as_bytes())).unwrap_or_default())
            .collect();
        context.insert("match", &groups[0]);
        context.insert("event_type", &self.event_type);
        context.insert("channel", &self.channel);

        // `captures` always has every group, keyed by index and by name.
        let mut by_key: BTreeMap<String, &str> = groups
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value.as_str()))
            .collect();

        // Unmatched optional groups stay undefined at the top level so
        // templates can test for them.
        for (index, name) in self.pattern.capture_names().enumerate() {
            let Some(name) = name else { continue };
            by_key.insert(name.to_string(), groups[index].as_str());
            if let Some(m) = captures.name(name) {
                context.insert(name, &lossy(m.as_bytes()));
            }
        }
        context.insert("captures", &by_key);
        context.insert("groups", &groups);

        context
    }
}

/// Lazy sequence of payloads for one buffer. Not restartable; call
/// [`ExtractionRule::extract`] again to rescan.
pub struct Extraction<'r, 'b> {
    rule: &'r ExtractionRule,
    matches: CaptureMatches<'r, 'b>,
}

impl Iterator for Extraction<'_, '_> {
    type Item = RenderedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        for captures in self.matches.by_ref() {
            debug!(rule = %self.rule.name, "Found match");
            match self.rule.render(&captures) {
                Ok(event) => return Some(event),
                Err(e) => {
                    warn!(
                        rule = %self.rule.name,
                        matched = %lossy(&captures[0]),
                        error = %e,
                        "Skipping match that failed to render"
                    );
                }
            }
        }
        None
    }
}

/// Rules that loaded, plus the ones that were dropped and why.
#[derive(Debug, Default)]
pub struct LoadedRules {
    pub rules: Vec<ExtractionRule>,
    pub rejected: Vec<(String, RuleError)>,
}

/// Build every configured rule in order. A rule whose pattern does not
/// compile or whose template cannot be loaded is reported and left out.
pub fn load_rules(events: &[(String, EventConfig)]) -> LoadedRules {
    let mut loaded = LoadedRules::default();

    for (name, config) in events {
        match ExtractionRule::from_config(name, config) {
            Ok(rule) => {
                debug!(rule = %name, pattern = %config.src, "Loaded rule");
                loaded.rules.push(rule);
            }
            Err(e) => {
                warn!(rule = %name, error = %e, "Dropping rule");
                loaded.rejected.push((name.clone(), e));
            }
        }
    }

    loaded
}

fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::RegexCompilation {
        pattern: pattern.to_string(),
        source,
    })
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
