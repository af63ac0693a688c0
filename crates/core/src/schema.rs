//! Type schemas and the type registry
//!
//! Entries are described by explicit schemas instead of runtime
//! introspection. A schema names the type, its parent (single inheritance)
//! and the attributes it declares. Registration resolves, once per type:
//!
//! - the ancestor chain, used for every "is subtype of" check
//! - the full list of visible [`AttributeId`]s, inherited ones first
//!
//! An attribute is identified by its name *and* the type that declares it,
//! so two subtypes inheriting `Base::id` share one attribute identity and
//! therefore one first-level index.

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::tuple::Tuple;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// Runtime type identity, assigned at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(u32);

impl TypeTag {
    /// Raw tag value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Attribute identity: name plus declaring type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId {
    declaring_type: TypeTag,
    name: Arc<str>,
}

impl AttributeId {
    /// Create an attribute identity
    pub fn new(name: impl AsRef<str>, declaring_type: TypeTag) -> Self {
        Self {
            declaring_type,
            name: Arc::from(name.as_ref()),
        }
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type that declares the attribute
    pub fn declaring_type(&self) -> TypeTag {
        self.declaring_type
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// Declarative description of one entry type
///
/// # Examples
///
/// ```
/// use tuplespace_core::TypeSchema;
///
/// let vehicle = TypeSchema::new("Vehicle").attribute("wheels");
/// let car = TypeSchema::new("Car").extends("Vehicle").attribute("color");
/// assert_eq!(car.parent(), Some("Vehicle"));
/// # let _ = vehicle;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    name: String,
    parent: Option<String>,
    attributes: Vec<String>,
}

impl TypeSchema {
    /// Start a schema for a root type with no attributes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            attributes: Vec::new(),
        }
    }

    /// Set the parent type
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare an attribute on this type
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent type name
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Attributes declared directly on this type
    pub fn declared(&self) -> &[String] {
        &self.attributes
    }
}

/// Resolved type information, cached by the registry
#[derive(Debug)]
pub struct TypeInfo {
    tag: TypeTag,
    name: Arc<str>,
    parent: Option<TypeTag>,
    /// Self first, then parent, grandparent, ...
    ancestors: Vec<TypeTag>,
    /// Inherited attributes first, then declared ones
    attributes: Vec<AttributeId>,
    schema: TypeSchema,
}

impl TypeInfo {
    /// Type tag
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent type tag
    pub fn parent(&self) -> Option<TypeTag> {
        self.parent
    }

    /// Ancestor chain, starting with this type
    pub fn ancestors(&self) -> &[TypeTag] {
        &self.ancestors
    }

    /// Every attribute visible on this type
    pub fn attributes(&self) -> &[AttributeId] {
        &self.attributes
    }

    /// Visible attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeId> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// True when the type exposes no queryable attributes at all
    pub fn is_attributeless(&self) -> bool {
        self.attributes.is_empty()
    }

    /// True when `ancestor` is this type or one of its ancestors
    pub fn is_a(&self, ancestor: TypeTag) -> bool {
        self.ancestors.contains(&ancestor)
    }
}

/// Registry of entry types
///
/// Lookups by name go through a [`DashMap`]; resolved [`TypeInfo`]s live in
/// an append-only table indexed by tag. Registration is serialized so tags
/// are dense and parents always precede children.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    by_name: DashMap<Arc<str>, TypeTag>,
    types: RwLock<Vec<Arc<TypeInfo>>>,
    register_lock: Mutex<()>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, returning its tag
    ///
    /// Registering an identical schema twice returns the existing tag.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownType`] if the parent is not registered
    /// - [`Error::DuplicateAttribute`] if an attribute is declared twice or
    ///   shadows an inherited one
    /// - [`Error::SchemaConflict`] if the name is taken by another schema
    pub fn register(&self, schema: TypeSchema) -> Result<TypeTag> {
        let _guard = self.register_lock.lock();

        if let Some(existing) = self.lookup(schema.name()) {
            if existing.schema == schema {
                return Ok(existing.tag);
            }
            return Err(Error::SchemaConflict(schema.name));
        }

        let parent = match schema.parent() {
            Some(parent_name) => Some(
                self.lookup(parent_name)
                    .ok_or_else(|| Error::UnknownType(parent_name.to_string()))?,
            ),
            None => None,
        };

        let mut types = self.types.write();
        let tag = TypeTag(types.len() as u32);

        let mut attributes = parent
            .as_ref()
            .map(|p| p.attributes.clone())
            .unwrap_or_default();
        for name in schema.declared() {
            if attributes.iter().any(|a| a.name() == name.as_str()) {
                return Err(Error::DuplicateAttribute {
                    type_name: schema.name.clone(),
                    attribute: name.clone(),
                });
            }
            attributes.push(AttributeId::new(name, tag));
        }

        let mut ancestors = vec![tag];
        if let Some(p) = &parent {
            ancestors.extend_from_slice(&p.ancestors);
        }

        let name: Arc<str> = Arc::from(schema.name());
        let info = Arc::new(TypeInfo {
            tag,
            name: Arc::clone(&name),
            parent: parent.map(|p| p.tag),
            ancestors,
            attributes,
            schema,
        });
        types.push(info);
        self.by_name.insert(name, tag);
        Ok(tag)
    }

    /// Resolved info for a tag
    pub fn get(&self, tag: TypeTag) -> Option<Arc<TypeInfo>> {
        self.types.read().get(tag.0 as usize).cloned()
    }

    /// Resolved info for a type name
    pub fn lookup(&self, name: &str) -> Option<Arc<TypeInfo>> {
        let tag = *self.by_name.get(name)?;
        self.get(tag)
    }

    /// True when `sub` is `sup` or one of its descendants
    pub fn is_subtype(&self, sub: TypeTag, sup: TypeTag) -> bool {
        if sub == sup {
            return true;
        }
        self.get(sub).map(|info| info.is_a(sup)).unwrap_or(false)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// True when no type is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve an entry against its schema
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownType`] if the entry's type is not registered
    /// - [`Error::UndeclaredAttribute`] if the entry sets an attribute its
    ///   type does not expose
    pub fn extract(&self, entry: Entry) -> Result<Tuple> {
        let info = self
            .lookup(entry.type_name())
            .ok_or_else(|| Error::UnknownType(entry.type_name().to_string()))?;
        if let Some((name, _)) = entry.fields().find(|(name, _)| info.attribute(name).is_none()) {
            return Err(Error::UndeclaredAttribute {
                type_name: info.name().to_string(),
                attribute: name.to_string(),
            });
        }
        Ok(Tuple::new(entry, info))
    }
}
