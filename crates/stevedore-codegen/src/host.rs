//! Host-side binding generator.
//!
//! Emits Rust source mirroring the native ABI: alias and callback type
//! definitions, `#[repr(C)]` structs with typed accessors wired into the
//! marshaling runtime, and one `extern "C"` block for the exported function
//! set.
//!
//! The function set is not taken on faith from the schema: it is parsed back
//! out of the header artifact produced for every target platform, and
//! [`verify_consistent`] refuses to proceed unless all artifacts agree.
//! Cross-compilation drift that changed one platform's export set would
//! otherwise corrupt the ABI silently at runtime; here it fails the build
//! with the offending function names and artifact paths.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::native::EXPORTED_FUNCTION;
use crate::schema::{to_snake_case, CallbackType, Primitive, StructType, TypeInfo};
use crate::{CodegenError, Result};

const FILE_HEADER: &str = "\
// AUTOGENERATED by stevedore-codegen.
// Do not edit; it will be regenerated the next time the project is built.
";

// =============================================================================
// Exported function declarations
// =============================================================================

/// One exported native function, as parsed from a header artifact.
/// Types are kept as C type names; equality across platform artifacts is
/// exact equality of name, parameter order/types, and return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    /// C type name, `None` for `void`.
    pub return_type: Option<String>,
    /// Parameter (name, C type name) pairs, in declaration order.
    pub parameters: Vec<(String, String)>,
}

impl std::fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|(name, ty)| format!("{ty} {name}"))
            .collect();
        write!(
            f,
            "{} {}({})",
            self.return_type.as_deref().unwrap_or("void"),
            self.name,
            params.join(", ")
        )
    }
}

/// Parse every `EXPORTED_FUNCTION` declaration from a header file.
pub fn parse_header(path: &Path) -> Result<Vec<FunctionDecl>> {
    let content = std::fs::read_to_string(path).map_err(|e| CodegenError::HeaderParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_header_content(path, &content)
}

/// Parse declarations from header content already in memory.
pub fn parse_header_content(path: &Path, content: &str) -> Result<Vec<FunctionDecl>> {
    let mut functions = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(EXPORTED_FUNCTION) else {
            continue;
        };

        let decl = parse_declaration(rest.trim()).ok_or_else(|| CodegenError::HeaderParse {
            path: path.to_path_buf(),
            reason: format!("cannot parse function declaration: {line}"),
        })?;
        functions.push(decl);
    }

    Ok(functions)
}

/// Parse `<return-type> <Name>(<params>);`. Pointer stars may be attached to
/// either the type or a following space; they normalize onto the type.
fn parse_declaration(decl: &str) -> Option<FunctionDecl> {
    let decl = decl.trim().trim_end_matches(';');
    let open = decl.find('(')?;
    let close = decl.rfind(')')?;

    let (return_type, name) = split_type_and_name(&decl[..open])?;
    let params_source = decl[open + 1..close].trim();

    let mut parameters = Vec::new();
    if !params_source.is_empty() && params_source != "void" {
        for param in params_source.split(',') {
            let (ty, param_name) = split_type_and_name(param)?;
            // A void-typed parameter is never valid.
            parameters.push((param_name, ty?));
        }
    }

    Some(FunctionDecl {
        name,
        return_type,
        parameters,
    })
}

/// Split `"EngineError* DisposeClient"` into (`Some("EngineError*")`,
/// `"DisposeClient"`). A `void` type becomes `None`.
fn split_type_and_name(source: &str) -> Option<(Option<String>, String)> {
    let source = source.trim();
    let last_space = source.rfind(|c: char| c.is_whitespace() || c == '*')?;
    let name = source[last_space + 1..].to_string();
    let ty: String = source[..=last_space].split_whitespace().collect();

    if name.is_empty() || ty.is_empty() {
        return None;
    }

    let ty = if ty == "void" { None } else { Some(ty) };
    Some((ty, name))
}

/// Verify that every platform artifact exports the same function set.
///
/// Returns the agreed set. On disagreement, the error lists each function
/// that differs together with the artifact paths that contain (or omit) it.
pub fn verify_consistent(sets: &[(PathBuf, Vec<FunctionDecl>)]) -> Result<Vec<FunctionDecl>> {
    let (_, first) = sets.first().ok_or_else(|| CodegenError::AbiMismatch {
        details: "no header artifacts were provided".to_string(),
    })?;

    let mut details = String::new();
    let mut all_names: Vec<&str> = Vec::new();

    for (_, functions) in sets {
        for function in functions {
            if !all_names.contains(&function.name.as_str()) {
                all_names.push(&function.name);
            }
        }
    }
    all_names.sort_unstable();

    for name in all_names {
        let per_path: Vec<(&PathBuf, Option<&FunctionDecl>)> = sets
            .iter()
            .map(|(path, functions)| (path, functions.iter().find(|f| f.name == name)))
            .collect();

        let agreed = per_path
            .iter()
            .all(|(_, decl)| *decl == per_path[0].1 && decl.is_some());
        if agreed {
            continue;
        }

        let _ = writeln!(details, "function '{name}':");
        for (path, decl) in per_path {
            match decl {
                Some(decl) => {
                    let _ = writeln!(details, "  {} declares: {decl}", path.display());
                }
                None => {
                    let _ = writeln!(details, "  {} does not declare it", path.display());
                }
            }
        }
    }

    if !details.is_empty() {
        return Err(CodegenError::AbiMismatch { details });
    }

    Ok(first.clone())
}

// =============================================================================
// Rust binding generation
// =============================================================================

/// Generates the host binding source for a resolved schema plus the verified
/// exported function set.
pub struct HostGenerator<'a> {
    types: &'a [TypeInfo],
}

impl<'a> HostGenerator<'a> {
    pub fn new(types: &'a [TypeInfo]) -> Self {
        HostGenerator { types }
    }

    /// Generate the complete bindings file. Deterministic: types in
    /// declaration order, extern functions sorted by name.
    pub fn generate(&self, functions: &[FunctionDecl]) -> Result<String> {
        let mut out = String::new();
        out.push_str(FILE_HEADER);
        out.push('\n');

        for type_info in self.types {
            match type_info {
                TypeInfo::Alias(alias) => {
                    let rust = native_type_to_rust(&alias.native_type).ok_or_else(|| {
                        CodegenError::UnsupportedNativeType {
                            alias: alias.name.clone(),
                            native_type: alias.native_type.clone(),
                        }
                    })?;
                    let _ = writeln!(out, "pub type {} = {rust};\n", alias.name);
                }
                TypeInfo::Callback(callback) => {
                    self.generate_callback(&mut out, callback);
                }
                TypeInfo::Struct(s) => {
                    self.generate_struct(&mut out, s);
                }
                TypeInfo::Primitive(_) | TypeInfo::Array(_) => {}
            }
        }

        self.generate_extern_block(&mut out, functions)?;
        Ok(out)
    }

    fn generate_callback(&self, out: &mut String, callback: &CallbackType) {
        // The leading opaque user-data pointer is implicit in the schema but
        // explicit in the signature. `Option` because the pointer is nullable
        // at the ABI.
        let mut params = vec!["user_data: *mut ::std::os::raw::c_void".to_string()];
        for (name, ty) in &callback.parameters {
            params.push(format!("{}: {}", to_snake_case(name), rust_field_type(ty)));
        }

        let _ = writeln!(
            out,
            "pub type {} = ::std::option::Option<\n    unsafe extern \"C\" fn({}) -> bool,\n>;\n",
            callback.name,
            params.join(", "),
        );
    }

    fn generate_struct(&self, out: &mut String, s: &StructType) {
        out.push_str("#[repr(C)]\n");
        let _ = writeln!(out, "pub struct {} {{", s.name);

        for (field_name, field_type) in &s.fields {
            let rust_name = to_snake_case(field_name);
            match field_type {
                TypeInfo::Array(element) => {
                    let _ = writeln!(out, "    pub {rust_name}_count: u64,");
                    let _ = writeln!(
                        out,
                        "    pub {rust_name}: *mut {},",
                        rust_field_type(element)
                    );
                }
                other => {
                    let _ = writeln!(out, "    pub {rust_name}: {},", rust_field_type(other));
                }
            }
        }
        out.push_str("}\n\n");

        let _ = writeln!(out, "impl {} {{", s.name);
        for (index, (field_name, field_type)) in s.fields.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            self.generate_accessor(out, field_name, field_type);
        }
        out.push_str("}\n\n");

        let _ = writeln!(
            out,
            "unsafe impl crate::marshal::NativeStruct for {} {{\n    \
             const NAME: &'static str = \"{}\";\n\n    \
             unsafe fn free_raw(ptr: *mut Self) {{\n        \
             Free{}(ptr);\n    }}\n}}\n",
            s.name, s.name, s.name
        );
    }

    fn generate_accessor(&self, out: &mut String, field_name: &str, field_type: &TypeInfo) {
        let rust_name = to_snake_case(field_name);

        match field_type {
            TypeInfo::Primitive(Primitive::String) => {
                let _ = writeln!(
                    out,
                    "    pub fn {rust_name}(&self) -> ::std::option::Option<String> {{\n        \
                     unsafe {{ crate::marshal::string_field(self.{rust_name}) }}\n    }}"
                );
            }
            TypeInfo::Primitive(_) | TypeInfo::Alias(_) => {
                let _ = writeln!(
                    out,
                    "    pub fn {rust_name}(&self) -> {} {{\n        \
                     self.{rust_name}\n    }}",
                    rust_field_type(field_type)
                );
            }
            TypeInfo::Struct(nested) => {
                // A borrowed view of the pointee; ownership stays with the
                // parent struct's Free.
                let _ = writeln!(
                    out,
                    "    pub fn {rust_name}(&self) -> ::std::option::Option<&{}> {{\n        \
                     unsafe {{ crate::marshal::struct_field(self.{rust_name}) }}\n    }}",
                    nested.name
                );
            }
            TypeInfo::Array(element) => match element.as_ref() {
                TypeInfo::Struct(nested) => {
                    let _ = writeln!(
                        out,
                        "    pub fn {rust_name}(&self) -> Vec<&{}> {{\n        \
                         unsafe {{\n            \
                         crate::marshal::struct_array_field(\"{field_name}\", self.{rust_name}, self.{rust_name}_count)\n        \
                         }}\n    }}",
                        nested.name
                    );
                }
                TypeInfo::Primitive(Primitive::String) => {
                    let _ = writeln!(
                        out,
                        "    pub fn {rust_name}(&self) -> Vec<String> {{\n        \
                         unsafe {{\n            \
                         crate::marshal::string_array_field(\"{field_name}\", self.{rust_name}, self.{rust_name}_count)\n        \
                         }}\n    }}"
                    );
                }
                other => {
                    let _ = writeln!(
                        out,
                        "    pub fn {rust_name}(&self) -> &[{}] {{\n        \
                         unsafe {{\n            \
                         crate::marshal::value_array_field(\"{field_name}\", self.{rust_name}, self.{rust_name}_count)\n        \
                         }}\n    }}",
                        rust_field_type(other)
                    );
                }
            },
            TypeInfo::Callback(_) => {
                // Rejected during resolution; unreachable for a valid schema.
            }
        }
    }

    fn generate_extern_block(&self, out: &mut String, functions: &[FunctionDecl]) -> Result<()> {
        let sorted: BTreeMap<&str, &FunctionDecl> = functions
            .iter()
            .map(|function| (function.name.as_str(), function))
            .collect();

        out.push_str("extern \"C\" {\n");
        for function in sorted.values() {
            let params: Vec<String> = function
                .parameters
                .iter()
                .map(|(name, ty)| {
                    Ok(format!(
                        "{}: {}",
                        to_snake_case(name),
                        self.c_type_to_rust(ty, &function.name)?
                    ))
                })
                .collect::<Result<_>>()?;

            match &function.return_type {
                Some(ty) => {
                    let _ = writeln!(
                        out,
                        "    pub fn {}({}) -> {};",
                        function.name,
                        params.join(", "),
                        self.c_type_to_rust(ty, &function.name)?
                    );
                }
                None => {
                    let _ = writeln!(out, "    pub fn {}({});", function.name, params.join(", "));
                }
            }
        }
        out.push_str("}\n");
        Ok(())
    }

    /// Map a C type name from a header declaration to its Rust spelling,
    /// resolving user-defined names against the schema.
    fn c_type_to_rust(&self, c_type: &str, function: &str) -> Result<String> {
        let stars = c_type.chars().rev().take_while(|&c| c == '*').count();
        let base = &c_type[..c_type.len() - stars];

        let base_rust = match base {
            "void" if stars > 0 => "::std::os::raw::c_void".to_string(),
            "char" if stars > 0 => "::std::os::raw::c_char".to_string(),
            "bool" => "bool".to_string(),
            _ => match native_type_to_rust(base) {
                Some(mapped) => mapped.to_string(),
                None => {
                    let named = self.types.iter().find(|t| match t {
                        TypeInfo::Alias(a) => a.name == base,
                        TypeInfo::Struct(s) => s.name == base,
                        TypeInfo::Callback(c) => c.name == base,
                        _ => false,
                    });
                    match named {
                        Some(t) => match t {
                            TypeInfo::Alias(a) => a.name.clone(),
                            TypeInfo::Struct(s) => s.name.clone(),
                            TypeInfo::Callback(c) => c.name.clone(),
                            _ => unreachable!(),
                        },
                        None => {
                            return Err(CodegenError::HeaderParse {
                                path: PathBuf::new(),
                                reason: format!(
                                    "unknown type '{c_type}' in declaration of '{function}'"
                                ),
                            })
                        }
                    }
                }
            },
        };

        let mut rust = base_rust;
        for _ in 0..stars {
            rust = format!("*mut {rust}");
        }
        Ok(rust)
    }
}

/// Rust spelling of a field's type inside a generated struct.
fn rust_field_type(type_info: &TypeInfo) -> String {
    match type_info {
        TypeInfo::Primitive(Primitive::String) => "*mut ::std::os::raw::c_char".to_string(),
        TypeInfo::Primitive(Primitive::Boolean) => "bool".to_string(),
        TypeInfo::Primitive(Primitive::Int32) => "i32".to_string(),
        TypeInfo::Primitive(Primitive::Int64) => "i64".to_string(),
        TypeInfo::Primitive(Primitive::Pointer) => "*mut ::std::os::raw::c_void".to_string(),
        TypeInfo::Alias(a) => a.name.clone(),
        TypeInfo::Struct(s) => format!("*mut {}", s.name),
        TypeInfo::Array(element) => format!("*mut {}", rust_field_type(element)),
        TypeInfo::Callback(c) => c.name.clone(),
    }
}

fn native_type_to_rust(native_type: &str) -> Option<&'static str> {
    match native_type {
        "uint8_t" => Some("u8"),
        "uint32_t" => Some("u32"),
        "uint64_t" => Some("u64"),
        "int32_t" => Some("i32"),
        "int64_t" => Some("i64"),
        _ => None,
    }
}
