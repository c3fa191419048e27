use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Globally unique identity of a loadable type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn default_instantiable() -> bool {
    true
}

/// Raw description of a loaded type as reported by a [`crate::TypeProvider`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub creatable: bool,
    #[serde(default)]
    pub single_instance: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default = "default_instantiable")]
    pub instantiable: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TypeDefinition {
    /// A concrete, instantiable type carrying the creatable capability.
    pub fn creatable(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            creatable: true,
            single_instance: false,
            is_abstract: false,
            instantiable: true,
            category: None,
            description: None,
        }
    }

    pub fn single_instance(mut self) -> Self {
        self.single_instance = true;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Whether the catalog should publish this type.
    pub fn is_eligible(&self) -> bool {
        self.creatable && !self.is_abstract && self.instantiable
    }
}

#[derive(Debug)]
struct DescriptorData {
    key: TypeKey,
    name: String,
    creatable: bool,
    single_instance: bool,
    category: Option<String>,
    description: Option<String>,
}

/// Catalog-owned handle to a creatable type.
///
/// Descriptors are only minted by [`crate::TypeCatalog`]; every other
/// component holds clones of the shared handle. Equality and hashing go by
/// identity so a descriptor from an older catalog generation still compares
/// equal to the rebuilt one.
#[derive(Clone)]
pub struct TypeDescriptor {
    data: Arc<DescriptorData>,
}

impl TypeDescriptor {
    pub(crate) fn from_definition(definition: TypeDefinition) -> Self {
        Self {
            data: Arc::new(DescriptorData {
                key: TypeKey::new(definition.id),
                name: definition.name,
                creatable: definition.creatable,
                single_instance: definition.single_instance,
                category: definition.category,
                description: definition.description,
            }),
        }
    }

    pub fn key(&self) -> &TypeKey {
        &self.data.key
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn is_creatable(&self) -> bool {
        self.data.creatable
    }

    pub fn is_single_instance(&self) -> bool {
        self.data.single_instance
    }

    pub fn category(&self) -> Option<&str> {
        self.data.category.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.data.description.as_deref()
    }

    /// Case-insensitive substring match against the identity and display name.
    /// `query` must already be lowercase.
    pub fn matches_lowercase(&self, query: &str) -> bool {
        self.data.name.to_lowercase().contains(query)
            || self.data.key.as_str().to_lowercase().contains(query)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.data.key == other.data.key
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.key.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeDescriptor")
            .field(&self.data.key.as_str())
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data.name)
    }
}
