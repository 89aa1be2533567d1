//! Tool descriptors: the metadata used for ranking and catalog bookkeeping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::ToolId;

const MAX_NAME_LEN: usize = 96;
const MAX_TERM_LEN: usize = 64;

/// Metadata describing a tool, independent of its implementation.
///
/// Deserialized values pass through [`DescriptorBuilder`], so they carry the
/// same guarantees as built ones.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct Descriptor {
    id: ToolId,
    name: String,
    description: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    keywords: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    examples: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    is_core: bool,
}

impl Descriptor {
    /// Starts building a descriptor for the supplied identifier.
    #[must_use]
    pub fn builder(id: ToolId) -> DescriptorBuilder {
        DescriptorBuilder {
            id,
            name: None,
            description: String::new(),
            keywords: BTreeSet::new(),
            tags: BTreeSet::new(),
            examples: Vec::new(),
            category: None,
            is_core: false,
        }
    }

    /// Returns the unique tool identifier.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.id
    }

    /// Human-friendly tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text description of what the tool does.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Normalised (lowercase) keywords.
    #[must_use]
    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    /// Normalised (lowercase) tags.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Example requests that should surface this tool.
    #[must_use]
    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    /// Optional grouping category.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Whether the tool must be present in every turn's resolved set.
    #[must_use]
    pub const fn is_core(&self) -> bool {
        self.is_core
    }

    /// Returns a copy of this descriptor with the core flag replaced.
    #[must_use]
    pub fn with_core(mut self, is_core: bool) -> Self {
        self.is_core = is_core;
        self
    }
}

#[derive(Deserialize)]
struct RawDescriptor {
    id: ToolId,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    is_core: bool,
}

impl TryFrom<RawDescriptor> for Descriptor {
    type Error = Error;

    fn try_from(raw: RawDescriptor) -> Result<Self> {
        let builder = Descriptor::builder(raw.id)
            .name(raw.name)?
            .keywords(raw.keywords)?
            .tags(raw.tags)?
            .description(raw.description)
            .examples(raw.examples)
            .core(raw.is_core);
        match raw.category {
            Some(category) => builder.category(category).build(),
            None => builder.build(),
        }
    }
}

/// Builder for [`Descriptor`].
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    id: ToolId,
    name: Option<String>,
    description: String,
    keywords: BTreeSet<String>,
    tags: BTreeSet<String>,
    examples: Vec<String>,
    category: Option<String>,
    is_core: bool,
}

impl DescriptorBuilder {
    /// Sets the display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the name is empty or exceeds the
    /// maximum supported length.
    pub fn name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(self.invalid("name cannot be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(self.invalid(format!("name length must be <= {MAX_NAME_LEN}")));
        }
        self.name = Some(name);
        Ok(self)
    }

    /// Sets the free-text description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a single keyword.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the keyword exceeds the maximum
    /// supported length. Blank keywords are ignored.
    pub fn keyword(mut self, keyword: impl Into<String>) -> Result<Self> {
        if let Some(term) = self.normalise_term(keyword.into())? {
            self.keywords.insert(term);
        }
        Ok(self)
    }

    /// Adds several keywords.
    ///
    /// # Errors
    ///
    /// See [`DescriptorBuilder::keyword`].
    pub fn keywords<I, S>(self, keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keywords
            .into_iter()
            .try_fold(self, |builder, keyword| builder.keyword(keyword))
    }

    /// Adds a single tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the tag exceeds the maximum
    /// supported length. Blank tags are ignored.
    pub fn tag(mut self, tag: impl Into<String>) -> Result<Self> {
        if let Some(term) = self.normalise_term(tag.into())? {
            self.tags.insert(term);
        }
        Ok(self)
    }

    /// Adds several tags.
    ///
    /// # Errors
    ///
    /// See [`DescriptorBuilder::tag`].
    pub fn tags<I, S>(self, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tags.into_iter()
            .try_fold(self, |builder, tag| builder.tag(tag))
    }

    /// Adds an example request. Blank examples are ignored.
    #[must_use]
    pub fn example(mut self, example: impl Into<String>) -> Self {
        let example = example.into();
        if !example.trim().is_empty() {
            self.examples.push(example);
        }
        self
    }

    /// Adds several example requests.
    #[must_use]
    pub fn examples<I, S>(self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        examples
            .into_iter()
            .fold(self, |builder, example| builder.example(example))
    }

    /// Sets the grouping category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = (!category.trim().is_empty()).then_some(category);
        self
    }

    /// Marks the tool as core (always resolved).
    #[must_use]
    pub fn core(mut self, is_core: bool) -> Self {
        self.is_core = is_core;
        self
    }

    /// Finalises the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if no name was supplied.
    pub fn build(self) -> Result<Descriptor> {
        let Some(name) = self.name else {
            return Err(Error::InvalidDescriptor {
                id: self.id.to_string(),
                reason: "name must be provided".into(),
            });
        };

        Ok(Descriptor {
            id: self.id,
            name,
            description: self.description,
            keywords: self.keywords,
            tags: self.tags,
            examples: self.examples,
            category: self.category,
            is_core: self.is_core,
        })
    }

    fn normalise_term(&self, term: String) -> Result<Option<String>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(None);
        }
        if term.len() > MAX_TERM_LEN {
            return Err(self.invalid(format!("terms must be <= {MAX_TERM_LEN} bytes")));
        }
        Ok(Some(term))
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidDescriptor {
            id: self.id.to_string(),
            reason: reason.into(),
        }
    }
}
