use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    /// Extraction rules in the order they appear in the file.
    #[serde(default, with = "ordered_events")]
    pub events: Vec<(String, EventConfig)>,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    /// Include pattern matched against the full path of directory entries.
    #[serde(default)]
    pub filter: Option<String>,
    /// Where new cursors start reading.
    #[serde(default)]
    pub start: ReadStart,
    #[serde(default)]
    pub hold_partial_lines: bool,
}

impl InputConfig {
    /// Compile the include filter. An empty pattern is the same as no filter.
    pub fn filter_regex(&self) -> Result<Option<Regex>, regex::Error> {
        match self.filter.as_deref() {
            None | Some("") => Ok(None),
            Some(pattern) => Regex::new(pattern).map(Some),
        }
    }

    /// The include filter to apply. A pattern that does not compile is
    /// logged and the input is left unfiltered.
    pub fn include_filter(&self) -> Option<Regex> {
        match self.filter_regex() {
            Ok(filter) => filter,
            Err(e) => {
                warn!(
                    filter = self.filter.as_deref().unwrap_or_default(),
                    error = %e,
                    "Could not compile input filter, tailing without it"
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStart {
    #[default]
    Beginning,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Pattern run against newly read bytes.
    pub src: String,
    /// Template file rendered for every match.
    pub dest: PathBuf,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub channel_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_watch_mode")]
    pub mode: WatchMode,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: default_watch_mode(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_watch_mode() -> WatchMode {
    WatchMode::Poll
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Poll,
    Native,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Log,
    Json,
}

// YAML mappings keep their order on the wire; a HashMap would lose it.
mod ordered_events {
    use super::EventConfig;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(events: &[(String, EventConfig)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(events.len()))?;
        for (name, event) in events {
            map.serialize_entry(name, event)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, EventConfig)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EventsVisitor;

        impl<'de> Visitor<'de> for EventsVisitor {
            type Value = Vec<(String, EventConfig)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of event names to event definitions")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Vec::new())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut events = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, event)) = access.next_entry::<String, EventConfig>()? {
                    if events.iter().any(|(existing, _)| existing == &name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate event name '{}'",
                            name
                        )));
                    }
                    events.push((name, event));
                }
                Ok(events)
            }
        }

        deserializer.deserialize_map(EventsVisitor)
    }
}
