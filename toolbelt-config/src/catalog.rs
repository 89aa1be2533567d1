use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use toolbelt_primitives::{Descriptor, ToolId};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::format::{self, Format};

/// One tool as written in a catalog file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    /// Tool identifier.
    pub id: String,
    /// Display name; defaults to the id.
    pub name: Option<String>,
    /// Free-text description.
    pub description: String,
    /// Keywords, matched with the highest weight.
    pub keywords: Vec<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Example requests.
    pub examples: Vec<String>,
    /// Optional grouping.
    pub category: Option<String>,
    /// Whether the tool is always loaded.
    pub core: bool,
}

impl CatalogEntry {
    /// Validates the entry and converts it into a [`Descriptor`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEntry`] when any field is rejected.
    pub fn into_descriptor(self) -> ConfigResult<Descriptor> {
        let raw_id = self.id.clone();
        self.build().map_err(|source| ConfigError::InvalidEntry { id: raw_id, source })
    }

    fn build(self) -> toolbelt_primitives::Result<Descriptor> {
        let id = ToolId::new(self.id)?;
        let name = self.name.unwrap_or_else(|| id.to_string());
        let mut builder = Descriptor::builder(id)
            .name(name)?
            .description(self.description)
            .keywords(self.keywords)?
            .tags(self.tags)?
            .examples(self.examples)
            .core(self.core);
        if let Some(category) = self.category {
            builder = builder.category(category);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Listed(Vec<CatalogEntry>),
    Tabled {
        #[serde(default)]
        tool: Vec<CatalogEntry>,
    },
}

impl Document {
    fn into_entries(self) -> Vec<CatalogEntry> {
        match self {
            Self::Listed(entries) | Self::Tabled { tool: entries } => entries,
        }
    }
}

/// Validated descriptors read from a declarative catalog.
///
/// TOML catalogs use `[[tool]]` tables. JSON catalogs are either an array of
/// entries or an object with a `tool` array. A repeated id keeps its first
/// position and the last definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSource {
    descriptors: Vec<Descriptor>,
}

impl CatalogSource {
    /// Parses a TOML catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed input and
    /// [`ConfigError::InvalidEntry`] for entries that fail validation.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Self::parse(Format::Toml, text)
    }

    /// Parses a JSON catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed input and
    /// [`ConfigError::InvalidEntry`] for entries that fail validation.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Self::parse(Format::Json, text)
    }

    /// Loads a `.toml` or `.json` catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::UnsupportedFormat`] when
    /// the file cannot be read, plus any parse or validation error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let (format, text) = format::read(path)?;
        let source = Self::parse(format, &text)?;
        debug!(path = %path.display(), tools = source.len(), "tool catalog loaded");
        Ok(source)
    }

    /// Builds a source from entries that are already in memory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEntry`] for the first invalid entry.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> ConfigResult<Self> {
        let mut descriptors: Vec<Descriptor> = Vec::new();
        let mut positions: HashMap<ToolId, usize> = HashMap::new();
        for entry in entries {
            let descriptor = entry.into_descriptor()?;
            if let Some(&position) = positions.get(descriptor.id()) {
                warn!(tool = %descriptor.id(), "duplicate catalog entry; keeping the later definition");
                descriptors[position] = descriptor;
            } else {
                positions.insert(descriptor.id().clone(), descriptors.len());
                descriptors.push(descriptor);
            }
        }
        Ok(Self { descriptors })
    }

    fn parse(format: Format, text: &str) -> ConfigResult<Self> {
        let document: Document = format.parse(text)?;
        Self::from_entries(document.into_entries())
    }

    /// Descriptors in file order.
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Consumes the source, returning its descriptors.
    #[must_use]
    pub fn into_descriptors(self) -> Vec<Descriptor> {
        self.descriptors
    }

    /// Number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` when the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
