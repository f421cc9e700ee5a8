//! Type schema loading and resolution.
//!
//! The schema is an ordered list of declarations tagged `alias`, `struct`, or
//! `callback`. Field and parameter types are written as a type reference:
//! a primitive keyword (`string`, `boolean`, `int32`, `int64`, `pointer`),
//! the name of another declared type, or `Name[]` for an array of `Name`.
//!
//! [`resolve`] turns the raw declarations into a fully resolved [`TypeInfo`]
//! graph. Resolution walks struct fields recursively, carrying the resolution
//! stack so that cyclic struct references are rejected with a clear error
//! rather than recursing forever — the generators need a finite, ordered
//! field layout for every struct.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::{CodegenError, Result};

// =============================================================================
// Raw declarations (as deserialized from YAML)
// =============================================================================

/// One entry of the schema file, before resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum Declaration {
    Alias {
        name: String,
        native_type: String,
        #[serde(default)]
        is_pointer: bool,
    },
    Struct {
        name: String,
        fields: FieldList,
    },
    Callback {
        name: String,
        parameters: Vec<ParameterDecl>,
    },
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Alias { name, .. } => name,
            Declaration::Struct { name, .. } => name,
            Declaration::Callback { name, .. } => name,
        }
    }
}

/// A callback parameter declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: String,
}

/// An ordered field-name → type-reference list.
///
/// YAML mappings lose their order through `BTreeMap`/`HashMap`, and field
/// order is ABI: it determines struct layout and cleanup order. This wrapper
/// deserializes a mapping while preserving declaration order.
#[derive(Debug, Clone, Default)]
pub struct FieldList(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for FieldList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldListVisitor;

        impl<'de> Visitor<'de> for FieldListVisitor {
            type Value = FieldList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of field names to type references")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut fields = Vec::new();
                while let Some((name, type_ref)) = map.next_entry::<String, String>()? {
                    fields.push((name, type_ref));
                }
                Ok(FieldList(fields))
            }
        }

        deserializer.deserialize_map(FieldListVisitor)
    }
}

// =============================================================================
// Resolved type information
// =============================================================================

/// The closed set of primitive types usable in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// UTF-8, null-terminated, heap-allocated.
    String,
    Boolean,
    Int32,
    Int64,
    /// An opaque pointer (callback user data and the like).
    Pointer,
}

impl Primitive {
    pub fn from_keyword(keyword: &str) -> Option<Primitive> {
        match keyword {
            "string" => Some(Primitive::String),
            "boolean" => Some(Primitive::Boolean),
            "int32" => Some(Primitive::Int32),
            "int64" => Some(Primitive::Int64),
            "pointer" => Some(Primitive::Pointer),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Pointer => "pointer",
        }
    }

    pub fn c_name(self) -> &'static str {
        match self {
            Primitive::String => "char*",
            Primitive::Boolean => "bool",
            Primitive::Int32 => "int32_t",
            Primitive::Int64 => "int64_t",
            Primitive::Pointer => "void*",
        }
    }

    /// Name used when this primitive is an array element (`CreateStringArray`).
    pub fn title_case(self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Boolean => "Boolean",
            Primitive::Int32 => "Int32",
            Primitive::Int64 => "Int64",
            Primitive::Pointer => "Pointer",
        }
    }
}

/// A resolved alias: a named wrapper around a native primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasType {
    pub name: String,
    pub native_type: String,
    pub is_pointer: bool,
}

/// A resolved struct: an ordered mapping of field name → type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, TypeInfo)>,
}

/// A resolved callback signature. The implicit leading `void*` user-data
/// parameter is not listed; generators prepend it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackType {
    pub name: String,
    pub parameters: Vec<(String, TypeInfo)>,
}

/// Fully resolved type information — the closed sum the generators dispatch
/// over. No runtime reflection anywhere: every variant is known here.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
    Primitive(Primitive),
    Alias(AliasType),
    Struct(StructType),
    /// Represented at the ABI as a (count, pointer) pair, never as a native
    /// dynamic-array type.
    Array(Box<TypeInfo>),
    Callback(CallbackType),
}

impl TypeInfo {
    /// The name this type carries in the schema file.
    pub fn schema_name(&self) -> String {
        match self {
            TypeInfo::Primitive(p) => p.keyword().to_string(),
            TypeInfo::Alias(a) => a.name.clone(),
            TypeInfo::Struct(s) => s.name.clone(),
            TypeInfo::Array(el) => format!("{}[]", el.schema_name()),
            TypeInfo::Callback(c) => c.name.clone(),
        }
    }

    /// The C type name at the ABI boundary.
    pub fn c_name(&self) -> String {
        match self {
            TypeInfo::Primitive(p) => p.c_name().to_string(),
            TypeInfo::Alias(a) => a.name.clone(),
            TypeInfo::Struct(s) => format!("{}*", s.name),
            TypeInfo::Array(el) => format!("{}*", el.c_name()),
            TypeInfo::Callback(c) => c.name.clone(),
        }
    }

    /// Whether this type is represented as a pointer at the ABI boundary.
    pub fn is_pointer(&self) -> bool {
        match self {
            TypeInfo::Primitive(p) => matches!(p, Primitive::String | Primitive::Pointer),
            TypeInfo::Alias(a) => a.is_pointer,
            TypeInfo::Struct(_) => true,
            TypeInfo::Array(_) => true,
            TypeInfo::Callback(_) => true,
        }
    }

    /// Name used in generated array function names (`Create<Element>Array`).
    pub fn element_function_name(&self) -> String {
        match self {
            TypeInfo::Primitive(p) => p.title_case().to_string(),
            other => other.schema_name(),
        }
    }
}

// =============================================================================
// Loading and resolution
// =============================================================================

/// Load and resolve a schema file.
pub fn load(path: &Path) -> Result<Vec<TypeInfo>> {
    let content = std::fs::read_to_string(path).map_err(|e| CodegenError::SchemaLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let declarations: Vec<Declaration> =
        serde_yaml::from_str(&content).map_err(|e| CodegenError::SchemaLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    resolve(&declarations)
}

/// Resolve raw declarations into a [`TypeInfo`] list, in declaration order.
pub fn resolve(declarations: &[Declaration]) -> Result<Vec<TypeInfo>> {
    let mut by_name: HashMap<&str, &Declaration> = HashMap::new();
    for decl in declarations {
        if by_name.insert(decl.name(), decl).is_some() {
            return Err(CodegenError::DuplicateType(decl.name().to_string()));
        }
    }

    declarations
        .iter()
        .map(|decl| resolve_declaration(decl, &by_name, &mut Vec::new()))
        .collect()
}

fn resolve_declaration(
    decl: &Declaration,
    by_name: &HashMap<&str, &Declaration>,
    stack: &mut Vec<String>,
) -> Result<TypeInfo> {
    match decl {
        Declaration::Alias {
            name,
            native_type,
            is_pointer,
        } => Ok(TypeInfo::Alias(AliasType {
            name: name.clone(),
            native_type: native_type.clone(),
            is_pointer: *is_pointer,
        })),

        Declaration::Struct { name, fields } => {
            stack.push(name.clone());
            let mut resolved = Vec::with_capacity(fields.0.len());

            for (field_name, type_ref) in &fields.0 {
                let field_type = resolve_reference(type_ref, name, field_name, by_name, stack)?;

                if let TypeInfo::Callback(cb) = &field_type {
                    return Err(CodegenError::CallbackField {
                        field: field_name.clone(),
                        owner: name.clone(),
                        callback: cb.name.clone(),
                    });
                }

                resolved.push((field_name.clone(), field_type));
            }

            stack.pop();
            Ok(TypeInfo::Struct(StructType {
                name: name.clone(),
                fields: resolved,
            }))
        }

        Declaration::Callback { name, parameters } => {
            let mut resolved = Vec::with_capacity(parameters.len());

            for param in parameters {
                let param_type =
                    resolve_reference(&param.type_ref, name, &param.name, by_name, stack).map_err(
                        |e| match e {
                            CodegenError::UnknownType {
                                type_name, field, ..
                            } => CodegenError::UnknownParameterType {
                                type_name,
                                parameter: field,
                                owner: name.clone(),
                            },
                            other => other,
                        },
                    )?;
                resolved.push((param.name.clone(), param_type));
            }

            Ok(TypeInfo::Callback(CallbackType {
                name: name.clone(),
                parameters: resolved,
            }))
        }
    }
}

fn resolve_reference(
    type_ref: &str,
    owner: &str,
    field: &str,
    by_name: &HashMap<&str, &Declaration>,
    stack: &mut Vec<String>,
) -> Result<TypeInfo> {
    if let Some(element_ref) = type_ref.strip_suffix("[]") {
        let element = resolve_reference(element_ref, owner, field, by_name, stack)?;
        return Ok(TypeInfo::Array(Box::new(element)));
    }

    if let Some(primitive) = Primitive::from_keyword(type_ref) {
        return Ok(TypeInfo::Primitive(primitive));
    }

    let Some(decl) = by_name.get(type_ref) else {
        return Err(CodegenError::UnknownType {
            type_name: type_ref.to_string(),
            field: field.to_string(),
            owner: owner.to_string(),
        });
    };

    if stack.iter().any(|n| n == type_ref) {
        return Err(CodegenError::CyclicReference {
            owner: owner.to_string(),
            field: field.to_string(),
            type_name: type_ref.to_string(),
        });
    }

    resolve_declaration(decl, by_name, stack)
}

// =============================================================================
// Shared naming helpers
// =============================================================================

/// Convert a schema field name (`APIVersion`, `ContainerID`) to the host
/// binding convention (`api_version`, `container_id`).
///
/// Runs of uppercase letters are treated as one word whose last letter may
/// start the next word (`ReadFileDescriptor` → `read_file_descriptor`).
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            let next_lower = i + 1 < chars.len() && chars[i + 1].is_lowercase();
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();

            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

/// The distinct array element types used anywhere in the schema, in order of
/// first use. The generators emit exactly one accessor trio per entry; fields
/// sharing an element type share the trio but never a backing array.
pub fn distinct_array_elements(types: &[TypeInfo]) -> Vec<TypeInfo> {
    let mut elements: Vec<TypeInfo> = Vec::new();

    for type_info in types {
        let TypeInfo::Struct(s) = type_info else {
            continue;
        };
        for (_, field_type) in &s.fields {
            if let TypeInfo::Array(element) = field_type {
                if !elements.iter().any(|e| e == element.as_ref()) {
                    elements.push(element.as_ref().clone());
                }
            }
        }
    }

    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Vec<Declaration> {
        serde_yaml::from_str(yaml).expect("test schema should parse")
    }

    #[test]
    fn resolves_primitives_and_structs() {
        let decls = parse(
            r#"
            - name: Response
              type: struct
              fields:
                APIVersion: string
                Experimental: boolean
            "#,
        );

        let types = resolve(&decls).unwrap();
        let TypeInfo::Struct(s) = &types[0] else {
            panic!("expected struct");
        };
        assert_eq!(s.name, "Response");
        assert_eq!(s.fields[0].0, "APIVersion");
        assert_eq!(s.fields[0].1, TypeInfo::Primitive(Primitive::String));
        assert_eq!(s.fields[1].1, TypeInfo::Primitive(Primitive::Boolean));
    }

    #[test]
    fn field_order_is_preserved() {
        let decls = parse(
            r#"
            - name: Ordered
              type: struct
              fields:
                Zebra: string
                Apple: string
                Mango: boolean
            "#,
        );

        let types = resolve(&decls).unwrap();
        let TypeInfo::Struct(s) = &types[0] else {
            panic!("expected struct");
        };
        let names: Vec<&str> = s.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Zebra", "Apple", "Mango"]);
    }

    #[test]
    fn unknown_type_names_the_field() {
        let decls = parse(
            r#"
            - name: Broken
              type: struct
              fields:
                Thing: Nonexistent
            "#,
        );

        let err = resolve(&decls).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Nonexistent"), "{message}");
        assert!(message.contains("Thing"), "{message}");
        assert!(message.contains("Broken"), "{message}");
    }

    #[test]
    fn callback_fields_are_rejected() {
        let decls = parse(
            r#"
            - name: Progress
              type: callback
              parameters:
                - name: update
                  type: string
            - name: Request
              type: struct
              fields:
                OnProgress: Progress
            "#,
        );

        let err = resolve(&decls).unwrap_err();
        assert!(matches!(err, CodegenError::CallbackField { .. }), "{err}");
    }

    #[test]
    fn cyclic_structs_are_rejected() {
        let decls = parse(
            r#"
            - name: A
              type: struct
              fields:
                Next: B
            - name: B
              type: struct
              fields:
                Back: A
            "#,
        );

        let err = resolve(&decls).unwrap_err();
        assert!(matches!(err, CodegenError::CyclicReference { .. }), "{err}");
    }

    #[test]
    fn self_referential_struct_is_rejected() {
        let decls = parse(
            r#"
            - name: Node
              type: struct
              fields:
                Next: Node
            "#,
        );

        let err = resolve(&decls).unwrap_err();
        assert!(matches!(err, CodegenError::CyclicReference { .. }), "{err}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let decls = parse(
            r#"
            - name: Twice
              type: alias
              native_type: uint64_t
            - name: Twice
              type: alias
              native_type: uint32_t
            "#,
        );

        let err = resolve(&decls).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateType(_)), "{err}");
    }

    #[test]
    fn array_references_resolve_to_elements() {
        let decls = parse(
            r#"
            - name: Volume
              type: struct
              fields:
                Name: string
            - name: Listing
              type: struct
              fields:
                Volumes: Volume[]
                Labels: string[]
            "#,
        );

        let types = resolve(&decls).unwrap();
        let elements = distinct_array_elements(&types);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].schema_name(), "Volume");
        assert_eq!(elements[1].schema_name(), "string");
    }

    #[test]
    fn shared_element_types_are_deduplicated() {
        let decls = parse(
            r#"
            - name: Request
              type: struct
              fields:
                Command: string[]
                EnvironmentVariables: string[]
            - name: Other
              type: struct
              fields:
                Tags: string[]
            "#,
        );

        let types = resolve(&decls).unwrap();
        let elements = distinct_array_elements(&types);
        assert_eq!(elements.len(), 1, "string trio must be emitted only once");
    }

    #[test]
    fn snake_case_handles_acronym_runs() {
        assert_eq!(to_snake_case("APIVersion"), "api_version");
        assert_eq!(to_snake_case("ContainerID"), "container_id");
        assert_eq!(to_snake_case("ReadFileDescriptor"), "read_file_descriptor");
        assert_eq!(to_snake_case("Experimental"), "experimental");
    }
}
