//! Native-side binding generator.
//!
//! Emits a C header and a C source file from a resolved schema. The header is
//! the single source of truth for the native build on every platform; the
//! host generator later parses the header artifacts back to build the
//! matching `extern "C"` declarations.
//!
//! Generated per struct: a typedef, `Alloc<T>` (zero-initialized storage) and
//! `Free<T>` (recursive cleanup of pointer fields in declaration order).
//! Generated once per distinct array element type used anywhere in the
//! schema: `Create<E>Array` / `Set<E>ArrayElement` / `Get<E>ArrayElement`.
//! Generated per callback: a function-pointer typedef (with the implicit
//! leading `void*` user-data parameter) and an `Invoke<C>` shim.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::schema::{self, CallbackType, StructType, TypeInfo};
use crate::{CodegenError, Result};

const FILE_HEADER: &str = "\
// AUTOGENERATED by stevedore-codegen.
// Do not edit; it will be regenerated the next time the project is built.
";

/// Marker line prefix for exported function declarations. Both generated
/// declarations and hand-maintained export fragments use it, and the host
/// generator keys its header parsing on it.
pub const EXPORTED_FUNCTION: &str = "EXPORTED_FUNCTION";

/// Generates the C artifacts for a resolved schema.
pub struct NativeGenerator<'a> {
    types: &'a [TypeInfo],
}

impl<'a> NativeGenerator<'a> {
    pub fn new(types: &'a [TypeInfo]) -> Self {
        NativeGenerator { types }
    }

    /// Write `types.h` and `types.c` into `out_dir`.
    pub fn write_to(&self, out_dir: &Path) -> Result<()> {
        let header = self.generate_header()?;
        let source = self.generate_source()?;

        for (name, content) in [("types.h", header), ("types.c", source)] {
            let path = out_dir.join(name);
            std::fs::write(&path, content).map_err(|source| CodegenError::Write {
                path: path.clone(),
                source,
            })?;
        }

        Ok(())
    }

    /// Generate the header. Deterministic: declaration order for types,
    /// first-use order for array element trios.
    pub fn generate_header(&self) -> Result<String> {
        let mut out = String::new();
        let mut emitted = SymbolSet::new();

        out.push_str(FILE_HEADER);
        out.push_str(
            "\n#include <stdint.h>\n#include <stdbool.h>\n\n\
             #ifndef TYPES_H\n#define TYPES_H\n\n\
             #ifdef WINDOWS\n\
             #define EXPORTED_FUNCTION extern __declspec(dllexport)\n\
             #else\n\
             #define EXPORTED_FUNCTION\n\
             #endif\n\n",
        );

        for type_info in self.types {
            match type_info {
                TypeInfo::Alias(alias) => {
                    let _ = writeln!(out, "typedef {} {};", alias.native_type, alias.name);
                    out.push('\n');
                }
                TypeInfo::Callback(callback) => {
                    let _ = writeln!(out, "typedef {};", callback_typedef(callback));
                    out.push('\n');
                }
                TypeInfo::Struct(s) => {
                    self.generate_struct_header(&mut out, s, &mut emitted)?;
                }
                TypeInfo::Primitive(_) | TypeInfo::Array(_) => {
                    // Never declared at the top level of a schema.
                }
            }
        }

        for element in schema::distinct_array_elements(self.types) {
            self.generate_array_declarations(&mut out, &element, &mut emitted)?;
        }

        for type_info in self.types {
            if let TypeInfo::Callback(callback) = type_info {
                emitted.claim(&format!("Invoke{}", callback.name))?;
                let _ = writeln!(
                    out,
                    "{EXPORTED_FUNCTION} bool Invoke{}({} method, {});",
                    callback.name,
                    callback.name,
                    callback_parameters(callback),
                );
                out.push('\n');
            }
        }

        out.push_str("#endif\n");
        Ok(out)
    }

    fn generate_struct_header(
        &self,
        out: &mut String,
        s: &StructType,
        emitted: &mut SymbolSet,
    ) -> Result<()> {
        out.push_str("typedef struct {\n");

        for (field_name, field_type) in &s.fields {
            match field_type {
                TypeInfo::Array(element) => {
                    // (count, pointer) pair — arrays are never a native
                    // dynamic-array type at the boundary.
                    let _ = writeln!(out, "    uint64_t {field_name}Count;");
                    let _ = writeln!(out, "    {}* {field_name};", element.c_name());
                }
                other => {
                    let _ = writeln!(out, "    {} {field_name};", other.c_name());
                }
            }
        }

        let _ = writeln!(out, "}} {};", s.name);
        out.push('\n');

        emitted.claim(&format!("Alloc{}", s.name))?;
        emitted.claim(&format!("Free{}", s.name))?;
        let _ = writeln!(out, "{EXPORTED_FUNCTION} {}* Alloc{}();", s.name, s.name);
        let _ = writeln!(
            out,
            "{EXPORTED_FUNCTION} void Free{}({}* value);",
            s.name, s.name
        );
        out.push('\n');

        Ok(())
    }

    fn generate_array_declarations(
        &self,
        out: &mut String,
        element: &TypeInfo,
        emitted: &mut SymbolSet,
    ) -> Result<()> {
        let fn_name = element.element_function_name();
        let c_name = element.c_name();

        emitted.claim(&format!("Create{fn_name}Array"))?;
        emitted.claim(&format!("Set{fn_name}ArrayElement"))?;
        emitted.claim(&format!("Get{fn_name}ArrayElement"))?;

        let _ = writeln!(
            out,
            "{EXPORTED_FUNCTION} {c_name}* Create{fn_name}Array(uint64_t size);"
        );
        let _ = writeln!(
            out,
            "{EXPORTED_FUNCTION} void Set{fn_name}ArrayElement({c_name}* array, uint64_t index, {c_name} value);"
        );
        let _ = writeln!(
            out,
            "{EXPORTED_FUNCTION} {c_name} Get{fn_name}ArrayElement({c_name}* array, uint64_t index);"
        );
        out.push('\n');

        Ok(())
    }

    /// Generate the C source implementing the declarations from the header.
    pub fn generate_source(&self) -> Result<String> {
        let mut out = String::new();

        out.push_str(FILE_HEADER);
        out.push_str("\n#include <stdlib.h>\n#include \"types.h\"\n\n");

        for type_info in self.types {
            if let TypeInfo::Struct(s) = type_info {
                self.generate_alloc(&mut out, s);
                self.generate_free(&mut out, s);
            }
        }

        for element in schema::distinct_array_elements(self.types) {
            let fn_name = element.element_function_name();
            let c_name = element.c_name();

            let _ = writeln!(
                out,
                "{c_name}* Create{fn_name}Array(uint64_t size) {{\n    \
                 return calloc(size, sizeof({c_name}));\n}}\n"
            );
            let _ = writeln!(
                out,
                "void Set{fn_name}ArrayElement({c_name}* array, uint64_t index, {c_name} value) {{\n    \
                 array[index] = value;\n}}\n"
            );
            let _ = writeln!(
                out,
                "{c_name} Get{fn_name}ArrayElement({c_name}* array, uint64_t index) {{\n    \
                 return array[index];\n}}\n"
            );
        }

        for type_info in self.types {
            if let TypeInfo::Callback(callback) = type_info {
                let forwarded: Vec<String> = std::iter::once("userData".to_string())
                    .chain(callback.parameters.iter().map(|(name, _)| name.clone()))
                    .collect();

                let _ = writeln!(
                    out,
                    "bool Invoke{}({} method, {}) {{\n    \
                     return method({});\n}}\n",
                    callback.name,
                    callback.name,
                    callback_parameters(callback),
                    forwarded.join(", "),
                );
            }
        }

        Ok(out)
    }

    /// `Alloc<T>`: zero-initialized storage, so every pointer and count field
    /// starts cleared.
    fn generate_alloc(&self, out: &mut String, s: &StructType) {
        let _ = writeln!(
            out,
            "{}* Alloc{}() {{\n    return calloc(1, sizeof({}));\n}}\n",
            s.name, s.name, s.name
        );
    }

    /// `Free<T>`: null-check, then release pointer fields in declaration
    /// order, then the struct itself. Each array field owns its own backing
    /// array even when two fields share an element type.
    fn generate_free(&self, out: &mut String, s: &StructType) {
        let _ = writeln!(out, "void Free{}({}* value) {{", s.name, s.name);
        out.push_str("    if (value == NULL) {\n        return;\n    }\n\n");

        for (field_name, field_type) in &s.fields {
            match field_type {
                TypeInfo::Primitive(p) if p.c_name() == "char*" => {
                    let _ = writeln!(out, "    free(value->{field_name});");
                }
                TypeInfo::Struct(nested) => {
                    let _ = writeln!(out, "    Free{}(value->{field_name});", nested.name);
                }
                TypeInfo::Array(element) => {
                    match element.as_ref() {
                        TypeInfo::Struct(nested) => {
                            let _ = writeln!(
                                out,
                                "    for (uint64_t i = 0; i < value->{field_name}Count; i++) {{\n        \
                                 Free{}(value->{field_name}[i]);\n    }}",
                                nested.name
                            );
                        }
                        TypeInfo::Primitive(p) if p.c_name() == "char*" => {
                            let _ = writeln!(
                                out,
                                "    for (uint64_t i = 0; i < value->{field_name}Count; i++) {{\n        \
                                 free(value->{field_name}[i]);\n    }}"
                            );
                        }
                        // Value elements need no per-element cleanup.
                        _ => {}
                    }
                    let _ = writeln!(out, "    free(value->{field_name});");
                }
                // Value fields (booleans, integers, non-pointer aliases).
                _ => {}
            }
        }

        out.push_str("    free(value);\n}\n\n");
    }
}

/// Strict-mode guard: emitting the same exported symbol twice is a
/// generation bug, not something to silently deduplicate at emit time.
struct SymbolSet(HashSet<String>);

impl SymbolSet {
    fn new() -> Self {
        SymbolSet(HashSet::new())
    }

    fn claim(&mut self, symbol: &str) -> Result<()> {
        if !self.0.insert(symbol.to_string()) {
            return Err(CodegenError::DuplicateSymbol(symbol.to_string()));
        }
        Ok(())
    }
}

fn callback_typedef(callback: &CallbackType) -> String {
    format!(
        "bool (*{})({})",
        callback.name,
        std::iter::once("void* userData".to_string())
            .chain(
                callback
                    .parameters
                    .iter()
                    .map(|(name, t)| format!("{} {}", t.c_name(), name))
            )
            .collect::<Vec<_>>()
            .join(", ")
    )
}

/// Parameter list for an `Invoke` shim: user data first, then the declared
/// parameters.
fn callback_parameters(callback: &CallbackType) -> String {
    std::iter::once("void* userData".to_string())
        .chain(
            callback
                .parameters
                .iter()
                .map(|(name, t)| format!("{} {}", t.c_name(), name)),
        )
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{resolve, Declaration};

    fn types(yaml: &str) -> Vec<TypeInfo> {
        let decls: Vec<Declaration> = serde_yaml::from_str(yaml).unwrap();
        resolve(&decls).unwrap()
    }

    #[test]
    fn header_declares_alloc_and_free_per_struct() {
        let types = types(
            r#"
            - name: Response
              type: struct
              fields:
                APIVersion: string
                Experimental: boolean
            "#,
        );

        let header = NativeGenerator::new(&types).generate_header().unwrap();
        assert!(header.contains("EXPORTED_FUNCTION Response* AllocResponse();"));
        assert!(header.contains("EXPORTED_FUNCTION void FreeResponse(Response* value);"));
        assert!(header.contains("char* APIVersion;"));
        assert!(header.contains("bool Experimental;"));
    }

    #[test]
    fn array_fields_lower_to_count_and_pointer() {
        let types = types(
            r#"
            - name: Request
              type: struct
              fields:
                Command: string[]
            "#,
        );

        let header = NativeGenerator::new(&types).generate_header().unwrap();
        assert!(header.contains("uint64_t CommandCount;"));
        assert!(header.contains("char** Command;"));
    }

    #[test]
    fn one_array_trio_per_distinct_element_type() {
        let types = types(
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

        let header = NativeGenerator::new(&types).generate_header().unwrap();
        let creates = header.matches("CreateStringArray").count();
        assert_eq!(creates, 1, "trio must be declared exactly once:\n{header}");

        let source = NativeGenerator::new(&types).generate_source().unwrap();
        let impls = source.matches("char** CreateStringArray").count();
        assert_eq!(impls, 1);
    }

    #[test]
    fn sibling_array_fields_free_their_own_backing() {
        let types = types(
            r#"
            - name: Request
              type: struct
              fields:
                Command: string[]
                EnvironmentVariables: string[]
            "#,
        );

        let source = NativeGenerator::new(&types).generate_source().unwrap();
        assert!(source.contains("free(value->Command);"));
        assert!(source.contains("free(value->EnvironmentVariables);"));
        assert!(source.contains("value->CommandCount"));
        assert!(source.contains("value->EnvironmentVariablesCount"));
    }

    #[test]
    fn free_releases_pointer_fields_in_declaration_order() {
        let types = types(
            r#"
            - name: Inner
              type: struct
              fields:
                Name: string
            - name: Outer
              type: struct
              fields:
                First: string
                Nested: Inner
                Flag: boolean
            "#,
        );

        let source = NativeGenerator::new(&types).generate_source().unwrap();
        let first = source.find("free(value->First);").unwrap();
        let nested = source.find("FreeInner(value->Nested);").unwrap();
        assert!(first < nested, "cleanup must follow declaration order");
        assert!(!source.contains("value->Flag"), "value fields need no cleanup");
    }

    #[test]
    fn callbacks_get_typedef_and_invoke_shim() {
        let types = types(
            r#"
            - name: EventCallback
              type: callback
              parameters:
                - name: event
                  type: string
            "#,
        );

        let generator = NativeGenerator::new(&types);
        let header = generator.generate_header().unwrap();
        assert!(header.contains("typedef bool (*EventCallback)(void* userData, char* event);"));
        assert!(header.contains(
            "EXPORTED_FUNCTION bool InvokeEventCallback(EventCallback method, void* userData, char* event);"
        ));

        let source = generator.generate_source().unwrap();
        assert!(source.contains("return method(userData, event);"));
    }

    #[test]
    fn write_to_emits_both_artifacts() {
        let types = types(
            r#"
            - name: Response
              type: struct
              fields:
                APIVersion: string
            "#,
        );

        let dir = tempfile::tempdir().unwrap();
        NativeGenerator::new(&types).write_to(dir.path()).unwrap();

        let header = std::fs::read_to_string(dir.path().join("types.h")).unwrap();
        let source = std::fs::read_to_string(dir.path().join("types.c")).unwrap();
        assert!(header.contains("AllocResponse"));
        assert!(source.contains("calloc(1, sizeof(Response))"));
    }

    #[test]
    fn generation_is_deterministic() {
        let types = types(
            r#"
            - name: Handle
              type: alias
              native_type: uint64_t
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

        let generator = NativeGenerator::new(&types);
        assert_eq!(
            generator.generate_header().unwrap(),
            generator.generate_header().unwrap()
        );
        assert_eq!(
            generator.generate_source().unwrap(),
            generator.generate_source().unwrap()
        );
    }
}
