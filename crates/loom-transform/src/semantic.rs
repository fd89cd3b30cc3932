//! Semantic model seam
//!
//! The type checker of the source language is an external collaborator. The
//! pipeline sees it through [`SemanticModel`] (annotations, value bindings)
//! and [`TypeSource`] (the checker's type table). [`TypeStore`] and
//! [`MemorySemanticModel`] are in-memory implementations used by hosts that
//! precompute their semantic information, and by tests.

use crate::ast::Decorator;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Handle into a type table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags::bitflags! {
    /// Primitive-level type flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TypeFlags: u32 {
        const ANY = 1 << 0;
        const UNKNOWN = 1 << 1;
        const NEVER = 1 << 2;
        const STRING = 1 << 3;
        const NUMBER = 1 << 4;
        const BOOLEAN = 1 << 5;
        const BIGINT = 1 << 6;
        const STRING_LITERAL = 1 << 7;
        const NUMBER_LITERAL = 1 << 8;
        const BOOLEAN_LITERAL = 1 << 9;
        const ENUM = 1 << 10;
        const VOID = 1 << 11;
        const UNDEFINED = 1 << 12;
        const NULL = 1 << 13;
        const ES_SYMBOL = 1 << 14;
        const TEMPLATE_LITERAL = 1 << 15;
        const UNION = 1 << 16;
        const INTERSECTION = 1 << 17;
        const OBJECT = 1 << 18;
        const TYPE_PARAMETER = 1 << 19;

        /// Primitives and literals of primitives
        const PRIMITIVE_LIKE = Self::STRING.bits()
            | Self::NUMBER.bits()
            | Self::BOOLEAN.bits()
            | Self::BIGINT.bits()
            | Self::STRING_LITERAL.bits()
            | Self::NUMBER_LITERAL.bits()
            | Self::BOOLEAN_LITERAL.bits()
            | Self::ENUM.bits()
            | Self::VOID.bits()
            | Self::UNDEFINED.bits()
            | Self::NULL.bits()
            | Self::ES_SYMBOL.bits();
    }
}

bitflags::bitflags! {
    /// Object type flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ObjectFlags: u32 {
        const CLASS = 1 << 0;
        const INTERFACE = 1 << 1;
        const REFERENCE = 1 << 2;
        const TUPLE = 1 << 3;
        const ANONYMOUS = 1 << 4;
        const MAPPED = 1 << 5;
        const OBJECT_LITERAL = 1 << 6;
        const ARRAY = 1 << 7;
    }
}

impl Default for TypeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for ObjectFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Where a symbol is declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSite {
    pub file: PathBuf,
    /// Declared in a declaration-only file (`.d.ts`)
    pub declaration_file: bool,
    /// Part of the language's built-in library
    pub default_library: bool,
}

impl DeclarationSite {
    pub fn source(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            declaration_file: false,
            default_library: false,
        }
    }

    pub fn declarations(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            declaration_file: true,
            default_library: false,
        }
    }

    pub fn library(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            declaration_file: true,
            default_library: true,
        }
    }
}

/// Explicit concrete-implementation tag on an interface symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcreteTag {
    /// Implemented by the given class type
    Target(TypeId),
    /// Implemented by a generated `<Interface>$Concrete` class
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolData {
    pub name: String,
    pub declaration: Option<DeclarationSite>,
    pub is_class: bool,
    /// Alias symbols point at the aliased type
    pub alias_target: Option<TypeId>,
    pub concrete: Option<ConcreteTag>,
}

impl SymbolData {
    pub fn new(name: impl Into<String>, declaration: Option<DeclarationSite>) -> Self {
        Self {
            name: name.into(),
            declaration,
            is_class: false,
            alias_target: None,
            concrete: None,
        }
    }
}

/// A property of an object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyData {
    pub name: String,
    pub ty: TypeId,
}

/// One entry of a type table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeData {
    pub flags: TypeFlags,
    pub object_flags: ObjectFlags,
    /// Intrinsic or display name
    pub name: Option<String>,
    /// Literal value text
    pub literal: Option<String>,
    pub symbol: Option<SymbolData>,
    /// Type arguments; element types for tuples and arrays
    pub type_arguments: Vec<TypeId>,
    pub properties: Vec<PropertyData>,
    /// Members of unions and intersections
    pub sub_types: Vec<TypeId>,
    /// Template literal patterns
    pub patterns: Vec<String>,
}

/// Read access to a type table
pub trait TypeSource {
    fn type_data(&self, id: TypeId) -> Option<&TypeData>;
}

/// Vector-backed type table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeStore {
    types: Vec<TypeData>,
}

impl TypeSource for TypeStore {
    fn type_data(&self, id: TypeId) -> Option<&TypeData> {
        self.types.get(id.0 as usize)
    }
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, data: TypeData) -> TypeId {
        self.types.push(data);
        TypeId(self.types.len() as u32 - 1)
    }

    /// Reserve an id to be filled later, for self-referential types
    pub fn reserve(&mut self) -> TypeId {
        self.add(TypeData::default())
    }

    /// Fill or replace an entry
    pub fn set(&mut self, id: TypeId, data: TypeData) {
        if let Some(slot) = self.types.get_mut(id.0 as usize) {
            *slot = data;
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn intrinsic(&mut self, flags: TypeFlags, name: &str) -> TypeId {
        self.add(TypeData {
            flags,
            name: Some(name.to_string()),
            ..TypeData::default()
        })
    }

    pub fn string(&mut self) -> TypeId {
        self.intrinsic(TypeFlags::STRING, "string")
    }

    pub fn number(&mut self) -> TypeId {
        self.intrinsic(TypeFlags::NUMBER, "number")
    }

    pub fn boolean(&mut self) -> TypeId {
        self.intrinsic(TypeFlags::BOOLEAN, "boolean")
    }

    pub fn null(&mut self) -> TypeId {
        self.intrinsic(TypeFlags::NULL, "null")
    }

    pub fn undefined(&mut self) -> TypeId {
        self.intrinsic(TypeFlags::UNDEFINED, "undefined")
    }

    pub fn any(&mut self) -> TypeId {
        self.intrinsic(TypeFlags::ANY, "any")
    }

    /// Literal of a primitive, named after the primitive
    pub fn literal(&mut self, flags: TypeFlags, name: &str, value: &str) -> TypeId {
        self.add(TypeData {
            flags,
            name: Some(name.to_string()),
            literal: Some(value.to_string()),
            ..TypeData::default()
        })
    }

    pub fn string_literal(&mut self, value: &str) -> TypeId {
        self.literal(TypeFlags::STRING_LITERAL, "string", value)
    }

    pub fn template(&mut self, patterns: &[&str]) -> TypeId {
        self.add(TypeData {
            flags: TypeFlags::TEMPLATE_LITERAL,
            name: Some("string".to_string()),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            ..TypeData::default()
        })
    }

    pub fn union(&mut self, members: Vec<TypeId>) -> TypeId {
        self.add(TypeData {
            flags: TypeFlags::UNION,
            sub_types: members,
            ..TypeData::default()
        })
    }

    pub fn intersection(&mut self, members: Vec<TypeId>) -> TypeId {
        self.add(TypeData {
            flags: TypeFlags::INTERSECTION,
            sub_types: members,
            ..TypeData::default()
        })
    }

    /// Class type declared in `site`
    pub fn class(&mut self, name: &str, site: DeclarationSite, properties: Vec<(&str, TypeId)>) -> TypeId {
        let mut symbol = SymbolData::new(name, Some(site));
        symbol.is_class = true;
        self.add(TypeData {
            flags: TypeFlags::OBJECT,
            object_flags: ObjectFlags::CLASS,
            name: Some(name.to_string()),
            symbol: Some(symbol),
            properties: props(properties),
            ..TypeData::default()
        })
    }

    /// Interface type declared in `site`
    pub fn interface(&mut self, name: &str, site: DeclarationSite, properties: Vec<(&str, TypeId)>) -> TypeId {
        self.add(interface_data(name, site, properties))
    }

    /// Anonymous object literal type
    pub fn object_literal(&mut self, properties: Vec<(&str, TypeId)>) -> TypeId {
        self.add(TypeData {
            flags: TypeFlags::OBJECT,
            object_flags: ObjectFlags::OBJECT_LITERAL,
            properties: props(properties),
            ..TypeData::default()
        })
    }

    pub fn tuple(&mut self, elements: Vec<TypeId>) -> TypeId {
        self.add(TypeData {
            flags: TypeFlags::OBJECT,
            object_flags: ObjectFlags::TUPLE,
            type_arguments: elements,
            ..TypeData::default()
        })
    }

    /// Array of `element`, as produced for `T[]`
    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.add(TypeData {
            flags: TypeFlags::OBJECT,
            object_flags: ObjectFlags::REFERENCE | ObjectFlags::ARRAY,
            name: Some("Array".to_string()),
            type_arguments: vec![element],
            ..TypeData::default()
        })
    }
}

/// Type data of an interface declared in `site`
pub fn interface_data(name: &str, site: DeclarationSite, properties: Vec<(&str, TypeId)>) -> TypeData {
    TypeData {
        flags: TypeFlags::OBJECT,
        object_flags: ObjectFlags::INTERFACE,
        name: Some(name.to_string()),
        symbol: Some(SymbolData::new(name, Some(site))),
        properties: props(properties),
        ..TypeData::default()
    }
}

fn props(properties: Vec<(&str, TypeId)>) -> Vec<PropertyData> {
    properties
        .into_iter()
        .map(|(name, ty)| PropertyData {
            name: name.to_string(),
            ty,
        })
        .collect()
}

/// Module-qualified annotation name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationKey {
    pub module: String,
    pub name: String,
}

impl AnnotationKey {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.module, self.name)
    }
}

/// A decorator resolved to its declaration and the plugin targets it declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub key: AnnotationKey,
    pub targets: Vec<AnnotationKey>,
}

impl Annotation {
    /// Whether any declared target is one of `keys`
    pub fn targets_any(&self, keys: &[AnnotationKey]) -> bool {
        self.targets.iter().any(|t| keys.contains(t))
    }
}

/// What the pipeline needs from the source language's checker
pub trait SemanticModel {
    /// The checker's type table
    fn types(&self) -> &dyn TypeSource;

    /// Resolve a decorator used in `unit` to its annotation
    fn annotation(&self, unit: &Path, decorator: &Decorator) -> Option<Annotation>;

    /// Whether an imported binding refers to a runtime value (not only a type)
    fn binding_has_value(&self, unit: &Path, specifier: &str, binding: &str) -> bool;
}

/// Precomputed semantic information
#[derive(Debug, Clone, Default)]
pub struct MemorySemanticModel {
    pub store: TypeStore,
    annotations: HashMap<String, Annotation>,
    type_only: HashSet<(String, String)>,
}

impl MemorySemanticModel {
    pub fn new(store: TypeStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Decorators named `decorator` resolve to `annotation`
    pub fn with_annotation(mut self, decorator: &str, annotation: Annotation) -> Self {
        self.annotations.insert(decorator.to_string(), annotation);
        self
    }

    /// `binding` imported from `specifier` only names a type
    pub fn with_type_only(mut self, specifier: &str, binding: &str) -> Self {
        self.type_only
            .insert((specifier.to_string(), binding.to_string()));
        self
    }
}

impl SemanticModel for MemorySemanticModel {
    fn types(&self) -> &dyn TypeSource {
        &self.store
    }

    fn annotation(&self, _unit: &Path, decorator: &Decorator) -> Option<Annotation> {
        self.annotations.get(&decorator.name).cloned()
    }

    fn binding_has_value(&self, _unit: &Path, specifier: &str, binding: &str) -> bool {
        !self
            .type_only
            .contains(&(specifier.to_string(), binding.to_string()))
    }
}
