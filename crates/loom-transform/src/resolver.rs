//! Declaration type resolution
//!
//! Maps checker types onto the finite set of structural categories the
//! runtime understands ([`AnyType`]). Resolution recurses through type
//! arguments, fields and union members; a second visit of the same shape or
//! managed type within one resolution yields a [`AnyType::Pointer`] back to
//! the first occurrence, so self-referential types terminate.

use crate::reference::ReferenceResolver;
use crate::semantic::{ConcreteTag, ObjectFlags, SymbolData, TypeData, TypeFlags, TypeId, TypeSource};
use crate::ResolveError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Deepest nesting a single resolution may reach
pub const MAX_DEPTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionOperator {
    And,
    Or,
}

/// Runtime description of a declaration type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnyType {
    /// Primitive, literal or built-in library type
    Literal {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        type_arguments: Vec<AnyType>,
    },
    /// Class known to the runtime container
    Managed {
        name: String,
        /// Id of the declaring unit
        module: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        type_arguments: Vec<AnyType>,
        ref_id: u32,
    },
    /// Structural object description
    Shape {
        name: Option<String>,
        field_types: BTreeMap<String, AnyType>,
        mapped: bool,
        ref_id: u32,
    },
    Composition {
        operator: CompositionOperator,
        sub_types: Vec<AnyType>,
        nullable: bool,
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        common_type: Option<String>,
    },
    Tuple {
        element_types: Vec<AnyType>,
        array: bool,
    },
    Template {
        patterns: Vec<String>,
    },
    /// Declared in a file outside the build
    Foreign { name: String, file: PathBuf },
    /// Back reference to an enclosing shape or managed type
    Pointer { ref_id: u32, name: Option<String> },
    Unknown,
}

impl AnyType {
    /// The literal `object`, used when resolution fails
    pub fn object() -> Self {
        AnyType::Literal {
            name: "object".to_string(),
            value: None,
            type_arguments: Vec::new(),
        }
    }

    /// Name of the type, when it has one
    pub fn name(&self) -> Option<&str> {
        match self {
            AnyType::Literal { name, .. }
            | AnyType::Managed { name, .. }
            | AnyType::Foreign { name, .. } => Some(name),
            AnyType::Shape { name, .. } | AnyType::Pointer { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

/// Resolves checker types of one unit
pub struct TypeResolver<'a> {
    types: &'a dyn TypeSource,
    references: &'a dyn ReferenceResolver,
    unit: &'a Path,
}

/// Shapes and managed types already emitted by one resolution, with the
/// next reference id to hand out
#[derive(Debug, Default)]
struct VisitCache {
    visited: HashMap<TypeId, (u32, Option<String>)>,
    next_ref: u32,
}

impl VisitCache {
    fn next_ref(&mut self) -> u32 {
        let ref_id = self.next_ref;
        self.next_ref += 1;
        ref_id
    }

    fn pointer(&self, id: TypeId) -> Option<AnyType> {
        self.visited.get(&id).map(|(ref_id, name)| AnyType::Pointer {
            ref_id: *ref_id,
            name: name.clone(),
        })
    }

    fn remember(&mut self, id: TypeId, name: Option<String>) -> u32 {
        let ref_id = self.next_ref();
        self.visited.insert(id, (ref_id, name));
        ref_id
    }
}

impl<'a> TypeResolver<'a> {
    pub fn new(types: &'a dyn TypeSource, references: &'a dyn ReferenceResolver, unit: &'a Path) -> Self {
        Self {
            types,
            references,
            unit,
        }
    }

    /// Resolve a type.
    ///
    /// Nesting beyond [`MAX_DEPTH`] is an error; any other failure is logged
    /// and degrades to the literal `object`. Every call starts from an empty
    /// visit cache.
    pub fn resolve(&self, ty: TypeId) -> Result<AnyType, ResolveError> {
        match self.visit(ty, 0, &mut VisitCache::default()) {
            Ok(resolved) => Ok(resolved),
            Err(error @ ResolveError::TooNested { .. }) => Err(error),
            Err(error) => {
                warn!(unit = %self.unit.display(), %ty, %error, "type resolution degraded to object");
                Ok(AnyType::object())
            }
        }
    }

    fn visit(&self, id: TypeId, depth: usize, cache: &mut VisitCache) -> Result<AnyType, ResolveError> {
        if depth > MAX_DEPTH {
            return Err(ResolveError::TooNested { limit: MAX_DEPTH });
        }
        let data = self
            .types
            .type_data(id)
            .ok_or(ResolveError::UnknownType(id.0))?;
        let flags = data.flags;
        let object_flags = data.object_flags;

        if flags.intersects(TypeFlags::TEMPLATE_LITERAL) {
            return Ok(AnyType::Template {
                patterns: data.patterns.clone(),
            });
        }

        if flags.intersects(TypeFlags::PRIMITIVE_LIKE) {
            return Ok(AnyType::Literal {
                name: data.name.clone().unwrap_or_else(|| primitive_name(flags).to_string()),
                value: data.literal.clone(),
                type_arguments: Vec::new(),
            });
        }

        if let Some(symbol) = &data.symbol {
            if let Some(concrete) = symbol.concrete {
                return self.concrete(id, symbol, data, concrete, depth, cache);
            }
        }

        if flags.intersects(TypeFlags::ANY | TypeFlags::UNKNOWN | TypeFlags::NEVER) {
            return Ok(AnyType::Unknown);
        }

        if object_flags.intersects(ObjectFlags::ARRAY) && data.symbol.is_none() {
            let element = match data.type_arguments.first() {
                Some(arg) => self.visit(*arg, depth + 1, cache)?,
                None => AnyType::Unknown,
            };
            return Ok(AnyType::Tuple {
                element_types: vec![element],
                array: true,
            });
        }

        if flags.intersects(TypeFlags::UNION | TypeFlags::INTERSECTION) {
            return self.composition(data, depth, cache);
        }

        if object_flags.intersects(ObjectFlags::ANONYMOUS) {
            if let Some(symbol) = &data.symbol {
                if let Some(file) = self.unindexed_declaration(symbol) {
                    return Ok(AnyType::Foreign {
                        name: symbol.name.clone(),
                        file,
                    });
                }
            }
            return self.shape(id, data, false, depth, cache);
        }

        if object_flags.intersects(ObjectFlags::CLASS | ObjectFlags::INTERFACE | ObjectFlags::REFERENCE) {
            let symbol = data
                .symbol
                .as_ref()
                .ok_or_else(|| ResolveError::MissingSymbol(data.name.clone().unwrap_or_default()))?;
            return self.named(id, symbol, data, depth, cache);
        }

        if object_flags.intersects(ObjectFlags::TUPLE) {
            let element_types = self.visit_all(&data.type_arguments, depth, cache)?;
            return Ok(AnyType::Tuple {
                element_types,
                array: false,
            });
        }

        if object_flags.intersects(ObjectFlags::OBJECT_LITERAL) {
            return self.shape(id, data, false, depth, cache);
        }

        if object_flags.intersects(ObjectFlags::MAPPED) {
            let mapped = !data.properties.is_empty();
            return self.shape(id, data, mapped, depth, cache);
        }

        Ok(AnyType::Literal {
            name: data.name.clone().unwrap_or_else(|| "object".to_string()),
            value: None,
            type_arguments: Vec::new(),
        })
    }

    fn visit_all(&self, ids: &[TypeId], depth: usize, cache: &mut VisitCache) -> Result<Vec<AnyType>, ResolveError> {
        ids.iter().map(|id| self.visit(*id, depth + 1, cache)).collect()
    }

    /// Alias chain, library types, foreign declarations, interfaces and classes
    fn named(
        &self,
        id: TypeId,
        symbol: &SymbolData,
        data: &TypeData,
        depth: usize,
        cache: &mut VisitCache,
    ) -> Result<AnyType, ResolveError> {
        if let Some(target) = symbol.alias_target {
            return self.visit(target, depth + 1, cache);
        }
        let library = symbol
            .declaration
            .as_ref()
            .is_some_and(|site| site.default_library);
        if library {
            return Ok(AnyType::Literal {
                name: symbol.name.clone(),
                value: None,
                type_arguments: self.visit_all(&data.type_arguments, depth, cache)?,
            });
        }
        if let Some(file) = self.unindexed_declaration(symbol) {
            return Ok(AnyType::Foreign {
                name: symbol.name.clone(),
                file,
            });
        }
        if !symbol.is_class {
            return self.shape(id, data, false, depth, cache);
        }
        self.managed(id, symbol.name.clone(), symbol, data, depth, cache)
    }

    fn concrete(
        &self,
        id: TypeId,
        symbol: &SymbolData,
        data: &TypeData,
        concrete: ConcreteTag,
        depth: usize,
        cache: &mut VisitCache,
    ) -> Result<AnyType, ResolveError> {
        match concrete {
            ConcreteTag::Target(target) => {
                let target_data = self
                    .types
                    .type_data(target)
                    .ok_or(ResolveError::UnknownType(target.0))?;
                let target_symbol = target_data
                    .symbol
                    .as_ref()
                    .ok_or_else(|| ResolveError::MissingSymbol(symbol.name.clone()))?;
                self.managed(target, target_symbol.name.clone(), target_symbol, target_data, depth, cache)
            }
            ConcreteTag::Generated => {
                let name = format!("{}$Concrete", symbol.name);
                self.managed(id, name, symbol, data, depth, cache)
            }
        }
    }

    fn managed(
        &self,
        id: TypeId,
        name: String,
        symbol: &SymbolData,
        data: &TypeData,
        depth: usize,
        cache: &mut VisitCache,
    ) -> Result<AnyType, ResolveError> {
        if let Some(pointer) = cache.pointer(id) {
            return Ok(pointer);
        }
        let ref_id = cache.remember(id, Some(name.clone()));
        let module = symbol
            .declaration
            .as_ref()
            .and_then(|site| self.references.id_of(&site.file));
        Ok(AnyType::Managed {
            name,
            module,
            type_arguments: self.visit_all(&data.type_arguments, depth, cache)?,
            ref_id,
        })
    }

    fn shape(
        &self,
        id: TypeId,
        data: &TypeData,
        mapped: bool,
        depth: usize,
        cache: &mut VisitCache,
    ) -> Result<AnyType, ResolveError> {
        if let Some(pointer) = cache.pointer(id) {
            return Ok(pointer);
        }
        let name = data
            .symbol
            .as_ref()
            .map(|s| s.name.clone())
            .or_else(|| data.name.clone());
        let ref_id = cache.remember(id, name.clone());

        let mut field_types = BTreeMap::new();
        for property in &data.properties {
            field_types.insert(property.name.clone(), self.visit(property.ty, depth + 1, cache)?);
        }
        Ok(AnyType::Shape {
            name,
            field_types,
            mapped,
            ref_id,
        })
    }

    fn composition(&self, data: &TypeData, depth: usize, cache: &mut VisitCache) -> Result<AnyType, ResolveError> {
        let operator = if data.flags.intersects(TypeFlags::UNION) {
            CompositionOperator::Or
        } else {
            CompositionOperator::And
        };

        let mut nullable = false;
        let mut optional = false;
        let mut members = Vec::new();
        for sub in &data.sub_types {
            let sub_data = self
                .types
                .type_data(*sub)
                .ok_or(ResolveError::UnknownType(sub.0))?;
            if sub_data.flags.intersects(TypeFlags::NULL) {
                nullable = true;
            } else if sub_data.flags.intersects(TypeFlags::UNDEFINED) {
                optional = true;
            } else {
                members.push(self.visit(*sub, depth + 1, cache)?);
            }
        }

        Ok(finalize(operator, members, nullable, optional, cache))
    }

    /// File of a symbol declared in a declaration file the build does not index
    fn unindexed_declaration(&self, symbol: &SymbolData) -> Option<PathBuf> {
        let site = symbol.declaration.as_ref()?;
        if site.declaration_file && !site.default_library && self.references.id_of(&site.file).is_none() {
            Some(site.file.clone())
        } else {
            None
        }
    }
}

fn finalize(
    operator: CompositionOperator,
    mut members: Vec<AnyType>,
    nullable: bool,
    optional: bool,
    cache: &mut VisitCache,
) -> AnyType {
    if members.is_empty() {
        return AnyType::Unknown;
    }

    if members.iter().all(|m| matches!(m, AnyType::Template { .. })) {
        let patterns = members
            .into_iter()
            .flat_map(|m| match m {
                AnyType::Template { patterns } => patterns,
                _ => Vec::new(),
            })
            .collect();
        return AnyType::Template { patterns };
    }

    if members.len() == 1 {
        return members.remove(0);
    }

    let common_name = match &members[0] {
        AnyType::Literal { name, .. } => Some(name.clone()),
        _ => None,
    };
    let common_type = common_name.filter(|name| {
        members
            .iter()
            .all(|m| matches!(m, AnyType::Literal { name: n, .. } if n == name))
    });

    if operator == CompositionOperator::And && members.iter().all(|m| matches!(m, AnyType::Shape { .. })) {
        return merge_shapes(members, cache);
    }

    AnyType::Composition {
        operator,
        sub_types: members,
        nullable,
        optional,
        common_type,
    }
}

fn merge_shapes(members: Vec<AnyType>, cache: &mut VisitCache) -> AnyType {
    let mut merged = BTreeMap::new();
    let mut any_mapped = false;
    for member in members {
        if let AnyType::Shape {
            field_types, mapped, ..
        } = member
        {
            any_mapped |= mapped;
            merged.extend(field_types);
        }
    }
    AnyType::Shape {
        name: None,
        field_types: merged,
        mapped: any_mapped,
        ref_id: cache.next_ref(),
    }
}

fn primitive_name(flags: TypeFlags) -> &'static str {
    if flags.intersects(TypeFlags::STRING | TypeFlags::STRING_LITERAL) {
        "string"
    } else if flags.intersects(TypeFlags::NUMBER | TypeFlags::NUMBER_LITERAL | TypeFlags::ENUM) {
        "number"
    } else if flags.intersects(TypeFlags::BOOLEAN | TypeFlags::BOOLEAN_LITERAL) {
        "boolean"
    } else if flags.intersects(TypeFlags::BIGINT) {
        "bigint"
    } else if flags.intersects(TypeFlags::NULL) {
        "null"
    } else if flags.intersects(TypeFlags::UNDEFINED) {
        "undefined"
    } else if flags.intersects(TypeFlags::VOID) {
        "void"
    } else {
        "symbol"
    }
}
