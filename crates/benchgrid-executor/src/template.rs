//! Command templates.
//!
//! A template is compiled once per tag into a list of segments. Rendering
//! happens in two typed stages:
//!
//! ```text
//!   CommandTemplate ──bind(workload, tag)──▶ BoundCommand ──resolve(book)──▶ String
//!        static fields + tag filled in          only addr.* holes remain
//! ```
//!
//! Address placeholders stay symbolic until stage 2 because a workload may
//! refer to peers placed earlier in the same run, which are only known once
//! the run is under way.
//!
//! Placeholders:
//!
//! | placeholder | value |
//! |---|---|
//! | `{{ workload.name }}` | workload name |
//! | `{{ workload.image }}` | image without tag |
//! | `{{ workload.ports }}` | ports joined by a space |
//! | `{{ workload.mounts }}` | mounts joined by a space |
//! | `{{ workload.local_data }}` | staged files joined by a space |
//! | `{{ workload.command }}` | the workload's command key |
//! | `{{ tag }}` | tag selected for this run |
//! | `{{ addr.NAME }}` | address of workload NAME, or of the measurement service |

use std::collections::BTreeMap;

use bench_core::WorkloadConfig;
use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed placeholder at byte {offset}")]
    Unclosed { offset: usize },

    #[error("empty placeholder at byte {offset}")]
    Empty { offset: usize },

    #[error("unknown placeholder `{0}`")]
    UnknownPlaceholder(String),

    #[error("address `{0}` does not name a workload or the measurement service")]
    UnknownAddress(String),

    #[error("no command template for tag `{0}`")]
    MissingTemplate(String),

    #[error("address of `{0}` is not known yet")]
    Unresolved(String),
}

/// Static workload field usable in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Image,
    Ports,
    Mounts,
    LocalData,
    Command,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "image" => Some(Self::Image),
            "ports" => Some(Self::Ports),
            "mounts" => Some(Self::Mounts),
            "local_data" => Some(Self::LocalData),
            "command" => Some(Self::Command),
            _ => None,
        }
    }

    fn value(self, workload: &WorkloadConfig) -> String {
        match self {
            Self::Name => workload.name.clone(),
            Self::Image => workload.image.clone(),
            Self::Ports => workload.ports.join(" "),
            Self::Mounts => workload.mounts.join(" "),
            Self::LocalData => workload.local_data.join(" "),
            Self::Command => workload.command.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Field),
    Tag,
    Address(String),
}

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    segments: Vec<Segment>,
}

impl CommandTemplate {
    pub fn parse(source: &str) -> TemplateResult<Self> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let open = offset + start;
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(TemplateError::Unclosed { offset: open })?;

            let inner = after[..end].trim();
            if inner.is_empty() {
                return Err(TemplateError::Empty { offset: open });
            }
            segments.push(placeholder(inner)?);

            let consumed = start + 2 + end + 2;
            rest = &rest[consumed..];
            offset += consumed;
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Names referenced through `addr.*`, in template order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Address(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Stage 1: fill in workload fields and the tag.
    pub fn bind(&self, workload: &WorkloadConfig, tag: &str) -> BoundCommand {
        let mut parts: Vec<Part> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let text = match segment {
                Segment::Text(text) => text.clone(),
                Segment::Field(field) => field.value(workload),
                Segment::Tag => tag.to_string(),
                Segment::Address(name) => {
                    parts.push(Part::Address(name.clone()));
                    continue;
                }
            };
            match parts.last_mut() {
                Some(Part::Text(prev)) => prev.push_str(&text),
                _ => parts.push(Part::Text(text)),
            }
        }
        BoundCommand { parts }
    }
}

fn placeholder(inner: &str) -> TemplateResult<Segment> {
    if inner == "tag" {
        return Ok(Segment::Tag);
    }
    if let Some(field) = inner.strip_prefix("workload.") {
        return Field::parse(field)
            .map(Segment::Field)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(inner.to_string()));
    }
    if let Some(name) = inner.strip_prefix("addr.") {
        if !name.is_empty() && !name.contains(char::is_whitespace) {
            return Ok(Segment::Address(name.to_string()));
        }
    }
    Err(TemplateError::UnknownPlaceholder(inner.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Address(String),
}

/// A template with static fields filled in and address holes left open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCommand {
    parts: Vec<Part>,
}

impl BoundCommand {
    /// Stage 2: substitute addresses known so far.
    pub fn resolve(&self, book: &AddressBook) -> TemplateResult<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Address(name) => {
                    let address = book
                        .get(name)
                        .ok_or_else(|| TemplateError::Unresolved(name.clone()))?;
                    out.push_str(address);
                }
            }
        }
        Ok(out)
    }
}

/// Workload name → network address, filled in as a run places workloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook(BTreeMap<String, String>);

impl AddressBook {
    /// A book seeded with the measurement service under its reserved key.
    pub fn new(measurement: &str) -> Self {
        let mut book = Self::default();
        book.insert(bench_core::MEASUREMENT_KEY, measurement);
        book
    }

    pub fn insert(&mut self, name: impl Into<String>, address: impl Into<String>) {
        self.0.insert(name.into(), address.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Compiled templates keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct CommandTemplates {
    by_tag: BTreeMap<String, CommandTemplate>,
}

impl CommandTemplates {
    /// Compile every template; `known` lists names valid after `addr.`.
    ///
    /// On failure the offending tag is returned with the error.
    pub fn compile<'a>(
        commands: &BTreeMap<String, String>,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, (String, TemplateError)> {
        let known: Vec<&str> = known.into_iter().collect();
        let mut by_tag = BTreeMap::new();

        for (tag, source) in commands {
            let template = CommandTemplate::parse(source).map_err(|e| (tag.clone(), e))?;
            if let Some(unknown) = template.addresses().find(|a| !known.contains(a)) {
                return Err((tag.clone(), TemplateError::UnknownAddress(unknown.to_string())));
            }
            by_tag.insert(tag.clone(), template);
        }

        Ok(Self { by_tag })
    }

    pub fn get(&self, tag: &str) -> Option<&CommandTemplate> {
        self.by_tag.get(tag)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// Stage 1 with the template selected by `tag`.
    pub fn bind(&self, workload: &WorkloadConfig, tag: &str) -> TemplateResult<BoundCommand> {
        self.get(tag)
            .map(|t| t.bind(workload, tag))
            .ok_or_else(|| TemplateError::MissingTemplate(tag.to_string()))
    }
}
