use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassEntry {
    pub fqcn: String,
    pub package: String,
    pub name: String,
    pub kind: String,
    pub modifiers: Vec<String>,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub type_parameters: Vec<String>,
    pub annotations: Vec<String>,
    pub fields: Vec<FieldEntry>,
    pub methods: Vec<MethodEntry>,
    pub inner_classes: Vec<String>,
    pub source_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodEntry {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<ParameterEntry>,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub throws: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Parse one decompiled source file and return an entry per type declared in
/// it, nested types included. The recorded `source_file` is the path relative
/// to `rel_base`.
pub fn extract_file(java_file: &Path, rel_base: &Path) -> Result<Vec<ClassEntry>> {
    let source = std::fs::read_to_string(java_file)
        .with_context(|| format!("Cannot read file: {}", java_file.display()))?;
    let source_file = java_file
        .strip_prefix(rel_base)
        .unwrap_or(java_file)
        .to_string_lossy()
        .to_string();
    extract_source(&source, &source_file)
}

/// Like [`extract_file`] for in-memory source; `source_file` is recorded
/// verbatim on every entry. Entries appear in declaration order, each type
/// immediately followed by its nested types (pre-order).
pub fn extract_source(source: &str, source_file: &str) -> Result<Vec<ClassEntry>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .context("Failed to load the Java grammar")?;
    let tree = parser
        .parse(source, None)
        .context("Parser produced no syntax tree")?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    if root.has_error() {
        bail!("Parse failed: {}", syntax_errors(&root).join("; "));
    }

    let package = find_package(&root, bytes);

    let mut entries = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if is_type_declaration(child.kind()) {
            entries.extend(extract_type(&child, bytes, &package, None, source_file));
        }
    }
    Ok(entries)
}

/// Extract `node`'s own entry followed by the entries of its nested type
/// declarations, depth-first. `enclosing` carries the already-resolved fully
/// qualified name of the enclosing type, if any.
fn extract_type(
    node: &Node,
    source: &[u8],
    package: &str,
    enclosing: Option<&str>,
    source_file: &str,
) -> Vec<ClassEntry> {
    let Some(name_node) = node.child_by_field_name("name") else {
        return Vec::new();
    };
    let name = node_text(&name_node, source).to_string();
    let fqcn = match enclosing {
        Some(outer) => format!("{outer}.{name}"),
        None if package.is_empty() => name.clone(),
        None => format!("{package}.{name}"),
    };

    let kind = kind_name(node.kind());
    let (modifiers, annotations) = modifiers_and_annotations(node, source);

    let superclass = match kind {
        // An interface's extends clause names parent interfaces, not a superclass
        "interface" => None,
        "enum" => Some("java.lang.Enum".to_string()),
        "record" => Some("java.lang.Record".to_string()),
        "annotation" => Some("java.lang.Object".to_string()),
        _ => Some(
            child_of_kind(node, "superclass")
                .and_then(|n| n.named_child(0))
                .map(|t| simple_type_name(&t, source))
                .unwrap_or_else(|| "java.lang.Object".to_string()),
        ),
    };

    let interfaces = match kind {
        "interface" => type_list_names(child_of_kind(node, "extends_interfaces"), source),
        _ => type_list_names(child_of_kind(node, "super_interfaces"), source),
    };

    let type_parameters = type_parameter_names(node, source);

    let mut fields = Vec::new();
    let mut methods = Vec::new();
    let mut nested = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_members(&body, source, &mut fields, &mut methods, &mut nested);
    }

    let inner_classes: Vec<String> = nested
        .iter()
        .filter_map(|n| n.child_by_field_name("name"))
        .map(|n| node_text(&n, source).to_string())
        .collect();

    let entry = ClassEntry {
        fqcn: fqcn.clone(),
        package: package.to_string(),
        name,
        kind: kind.to_string(),
        modifiers,
        superclass,
        interfaces,
        type_parameters,
        annotations,
        fields,
        methods,
        inner_classes,
        source_file: source_file.to_string(),
    };

    let mut entries = vec![entry];
    for child in nested {
        entries.extend(extract_type(&child, source, package, Some(&fqcn), source_file));
    }
    entries
}

fn collect_members<'a>(
    body: &Node<'a>,
    source: &[u8],
    fields: &mut Vec<FieldEntry>,
    methods: &mut Vec<MethodEntry>,
    nested: &mut Vec<Node<'a>>,
) {
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "field_declaration" | "constant_declaration" => {
                fields.extend(field_entries(&child, source));
            }
            // Constructors, compact constructors, and annotation elements are
            // not methods
            "method_declaration" => {
                methods.push(method_entry(&child, source));
            }
            // Enum members follow the semicolon after the constant list
            "enum_body_declarations" => {
                collect_members(&child, source, fields, methods, nested);
            }
            k if is_type_declaration(k) => {
                nested.push(child);
            }
            _ => {}
        }
    }
}

/// Expand one field declaration into an entry per declared variable, all
/// sharing the declaration's modifiers and annotations.
fn field_entries(node: &Node, source: &[u8]) -> Vec<FieldEntry> {
    let (modifiers, annotations) = modifiers_and_annotations(node, source);
    let Some(type_node) = node.child_by_field_name("type") else {
        return Vec::new();
    };
    let base_type = node_text(&type_node, source);

    let mut entries = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "variable_declarator" {
            continue;
        }
        let Some(name) = child.child_by_field_name("name") else {
            continue;
        };
        // `int a[], b;` gives `a` the array dimensions, not `b`
        let ty = match child.child_by_field_name("dimensions") {
            Some(dims) => format!("{base_type}{}", node_text(&dims, source)),
            None => base_type.to_string(),
        };
        entries.push(FieldEntry {
            name: node_text(&name, source).to_string(),
            ty,
            modifiers: modifiers.clone(),
            annotations: annotations.clone(),
        });
    }
    entries
}

fn method_entry(node: &Node, source: &[u8]) -> MethodEntry {
    let (modifiers, annotations) = modifiers_and_annotations(node, source);
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(&n, source).to_string())
        .unwrap_or_default();
    let return_type = node
        .child_by_field_name("type")
        .map(|n| node_text(&n, source).to_string())
        .unwrap_or_default();
    let parameters = node
        .child_by_field_name("parameters")
        .map(|p| parameter_entries(&p, source))
        .unwrap_or_default();
    let throws = child_of_kind(node, "throws")
        .map(|t| {
            let mut cursor = t.walk();
            t.named_children(&mut cursor)
                .map(|n| node_text(&n, source).to_string())
                .collect()
        })
        .unwrap_or_default();

    MethodEntry {
        name,
        return_type,
        parameters,
        modifiers,
        annotations,
        throws,
    }
}

fn parameter_entries(params: &Node, source: &[u8]) -> Vec<ParameterEntry> {
    let mut entries = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        match child.kind() {
            "formal_parameter" => {
                let (Some(ty), Some(name)) = (
                    child.child_by_field_name("type"),
                    child.child_by_field_name("name"),
                ) else {
                    continue;
                };
                let ty_text = match child.child_by_field_name("dimensions") {
                    Some(dims) => format!("{}{}", node_text(&ty, source), node_text(&dims, source)),
                    None => node_text(&ty, source).to_string(),
                };
                entries.push(ParameterEntry {
                    name: node_text(&name, source).to_string(),
                    ty: ty_text,
                });
            }
            // A varargs parameter keeps its name inside a variable_declarator;
            // the recorded type is the element type
            "spread_parameter" => {
                let mut ty = None;
                let mut name = None;
                let mut inner = child.walk();
                for part in child.children(&mut inner) {
                    match part.kind() {
                        "modifiers" => {}
                        "variable_declarator" => {
                            name = part
                                .child_by_field_name("name")
                                .map(|n| node_text(&n, source).to_string());
                        }
                        _ if part.is_named() && ty.is_none() => {
                            ty = Some(node_text(&part, source).to_string());
                        }
                        _ => {}
                    }
                }
                if let (Some(ty), Some(name)) = (ty, name) {
                    entries.push(ParameterEntry { name, ty });
                }
            }
            _ => {}
        }
    }
    entries
}

/// Split a declaration's `modifiers` node into keyword modifiers and
/// annotation names, both in source order.
fn modifiers_and_annotations(node: &Node, source: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut modifiers = Vec::new();
    let mut annotations = Vec::new();
    let Some(mods) = child_of_kind(node, "modifiers") else {
        return (modifiers, annotations);
    };
    let mut cursor = mods.walk();
    for child in mods.children(&mut cursor) {
        match child.kind() {
            "annotation" | "marker_annotation" => {
                if let Some(name) = child.child_by_field_name("name") {
                    annotations.push(node_text(&name, source).to_string());
                }
            }
            "line_comment" | "block_comment" => {}
            _ => modifiers.push(node_text(&child, source).to_string()),
        }
    }
    (modifiers, annotations)
}

fn type_parameter_names(node: &Node, source: &[u8]) -> Vec<String> {
    let Some(params) = child_of_kind(node, "type_parameters") else {
        return Vec::new();
    };
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.kind() == "type_parameter" {
            // The parameter name is a type_identifier, preceded only by
            // annotations and followed by an optional bound
            let mut inner = child.walk();
            for part in child.children(&mut inner) {
                if part.kind() == "type_identifier" {
                    names.push(node_text(&part, source).to_string());
                    break;
                }
            }
        }
    }
    names
}

fn type_list_names(clause: Option<Node>, source: &[u8]) -> Vec<String> {
    let Some(clause) = clause else {
        return Vec::new();
    };
    let Some(list) = child_of_kind(&clause, "type_list") else {
        return Vec::new();
    };
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .map(|t| simple_type_name(&t, source))
        .collect()
}

/// The rightmost identifier of a possibly qualified, possibly generic type:
/// `com.example.Outer.Inner<T>` -> `Inner`.
fn simple_type_name(node: &Node, source: &[u8]) -> String {
    match node.kind() {
        "generic_type" => node
            .named_child(0)
            .map(|n| simple_type_name(&n, source))
            .unwrap_or_else(|| node_text(node, source).to_string()),
        "scoped_type_identifier" => {
            let mut cursor = node.walk();
            let mut last = None;
            for child in node.children(&mut cursor) {
                if child.kind() == "type_identifier" {
                    last = Some(child);
                }
            }
            last.map(|n| node_text(&n, source).to_string())
                .unwrap_or_else(|| node_text(node, source).to_string())
        }
        _ => node_text(node, source).to_string(),
    }
}

fn find_package(root: &Node, source: &[u8]) -> String {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "package_declaration" {
            let mut inner = child.walk();
            for part in child.children(&mut inner) {
                if part.kind() == "scoped_identifier" || part.kind() == "identifier" {
                    return node_text(&part, source).to_string();
                }
            }
        }
    }
    String::new()
}

fn child_of_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

fn kind_name(node_kind: &str) -> &'static str {
    match node_kind {
        "interface_declaration" => "interface",
        "enum_declaration" => "enum",
        "record_declaration" => "record",
        "annotation_type_declaration" => "annotation",
        _ => "class",
    }
}

fn syntax_errors(root: &Node) -> Vec<String> {
    let mut out = Vec::new();
    collect_errors(root, &mut out);
    if out.is_empty() {
        out.push("unknown syntax error".to_string());
    }
    out
}

fn collect_errors(node: &Node, out: &mut Vec<String>) {
    if node.is_error() || node.is_missing() {
        let p = node.start_position();
        out.push(format!("syntax error at {}:{}", p.row + 1, p.column + 1));
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_errors(&child, out);
    }
}

fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Vec<ClassEntry> {
        extract_source(source, "decompiled/test/Test.java").unwrap()
    }

    #[test]
    fn extracts_simple_class() {
        let source = r#"
package com.example;

public class Outer {
    private final int count;

    public Outer() {
        this.count = 0;
    }

    public int get() {
        return count;
    }
}
"#;
        let entries = extract(source);
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.fqcn, "com.example.Outer");
        assert_eq!(entry.package, "com.example");
        assert_eq!(entry.name, "Outer");
        assert_eq!(entry.kind, "class");
        assert_eq!(entry.modifiers, vec!["public"]);
        assert_eq!(entry.superclass.as_deref(), Some("java.lang.Object"));
        assert!(entry.interfaces.is_empty());
        assert!(entry.type_parameters.is_empty());
        assert!(entry.annotations.is_empty());
        assert!(entry.inner_classes.is_empty());
        assert_eq!(entry.source_file, "decompiled/test/Test.java");

        assert_eq!(entry.fields.len(), 1);
        assert_eq!(entry.fields[0].name, "count");
        assert_eq!(entry.fields[0].ty, "int");
        assert_eq!(entry.fields[0].modifiers, vec!["private", "final"]);

        // The constructor is not a method
        assert_eq!(entry.methods.len(), 1);
        assert_eq!(entry.methods[0].name, "get");
        assert_eq!(entry.methods[0].return_type, "int");
        assert_eq!(entry.methods[0].modifiers, vec!["public"]);
        assert!(entry.methods[0].parameters.is_empty());
    }

    #[test]
    fn nested_types_flatten_preorder_to_arbitrary_depth() {
        let source = r#"
package com.example;

public class A {
    static class B {
        interface C {
        }
    }
}
"#;
        let entries = extract(source);
        let fqcns: Vec<&str> = entries.iter().map(|e| e.fqcn.as_str()).collect();
        assert_eq!(fqcns, vec!["com.example.A", "com.example.A.B", "com.example.A.B.C"]);

        assert_eq!(entries[0].inner_classes, vec!["B"]);
        assert_eq!(entries[1].inner_classes, vec!["C"]);
        assert_eq!(entries[1].modifiers, vec!["static"]);
        assert_eq!(entries[2].kind, "interface");
        assert_eq!(entries[2].package, "com.example");
    }

    #[test]
    fn interface_extends_populates_interfaces_not_superclass() {
        let source = r#"
package com.example;

public interface Service<T> extends AutoCloseable, Comparable<T> {
    T find(String id);
}
"#;
        let entries = extract(source);
        let entry = &entries[0];
        assert_eq!(entry.kind, "interface");
        assert_eq!(entry.superclass, None);
        assert_eq!(entry.interfaces, vec!["AutoCloseable", "Comparable"]);
        assert_eq!(entry.type_parameters, vec!["T"]);
        assert_eq!(entry.methods.len(), 1);
        assert_eq!(entry.methods[0].name, "find");
        assert_eq!(entry.methods[0].return_type, "T");
    }

    #[test]
    fn class_extends_and_implements_use_simple_names() {
        let source = r#"
package com.example;

public final class Impl extends base.AbstractBase<String> implements Runnable, java.io.Serializable {
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.superclass.as_deref(), Some("AbstractBase"));
        assert_eq!(entry.interfaces, vec!["Runnable", "Serializable"]);
        assert_eq!(entry.modifiers, vec!["public", "final"]);
    }

    #[test]
    fn multi_variable_field_expands_with_shared_modifiers() {
        let source = r#"
package com.example;

class Counters {
    @Deprecated
    private static int a, b;
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.fields.len(), 2);
        for (field, name) in entry.fields.iter().zip(["a", "b"]) {
            assert_eq!(field.name, name);
            assert_eq!(field.ty, "int");
            assert_eq!(field.modifiers, vec!["private", "static"]);
            assert_eq!(field.annotations, vec!["Deprecated"]);
        }
    }

    #[test]
    fn array_dimensions_stay_with_their_variable() {
        let source = r#"
class Arrays {
    int a[], b;
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.fields[0].name, "a");
        assert_eq!(entry.fields[0].ty, "int[]");
        assert_eq!(entry.fields[1].name, "b");
        assert_eq!(entry.fields[1].ty, "int");
    }

    #[test]
    fn enum_gets_implicit_supertype_and_constants_are_not_fields() {
        let source = r#"
package com.example;

public enum Color {
    RED,
    GREEN;

    private int value;

    public int value() {
        return value;
    }

    static class Helper {
    }
}
"#;
        let entries = extract(source);
        let entry = &entries[0];
        assert_eq!(entry.kind, "enum");
        assert_eq!(entry.superclass.as_deref(), Some("java.lang.Enum"));
        assert_eq!(entry.fields.len(), 1);
        assert_eq!(entry.fields[0].name, "value");
        assert_eq!(entry.methods.len(), 1);
        assert_eq!(entry.methods[0].name, "value");
        assert_eq!(entry.inner_classes, vec!["Helper"]);
        assert_eq!(entries[1].fqcn, "com.example.Color.Helper");
    }

    #[test]
    fn record_gets_implicit_supertype_and_keeps_type_parameters() {
        let source = r#"
package com.example;

public record Pair<K, V>(K key, V value) implements java.util.Map.Entry<K, V> {
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.kind, "record");
        assert_eq!(entry.superclass.as_deref(), Some("java.lang.Record"));
        assert_eq!(entry.type_parameters, vec!["K", "V"]);
        assert_eq!(entry.interfaces, vec!["Entry"]);
        // Record components are not fields
        assert!(entry.fields.is_empty());
        assert!(entry.methods.is_empty());
    }

    #[test]
    fn annotation_type_elements_are_not_methods() {
        let source = r#"
package com.example;

@Documented
public @interface Marker {
    String value() default "";

    int RETRIES = 3;
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.kind, "annotation");
        assert_eq!(entry.superclass.as_deref(), Some("java.lang.Object"));
        assert_eq!(entry.annotations, vec!["Documented"]);
        assert!(entry.methods.is_empty());
        assert_eq!(entry.fields.len(), 1);
        assert_eq!(entry.fields[0].name, "RETRIES");
    }

    #[test]
    fn method_signature_details_recorded_as_written() {
        let source = r#"
package com.example;

import java.util.List;
import java.util.Map;

class Svc {
    @Override
    protected List<String> copy(Map<String, Integer> items, String... names)
            throws java.io.IOException, IllegalStateException {
        return null;
    }
}
"#;
        let entry = &extract(source)[0];
        let method = &entry.methods[0];
        assert_eq!(method.name, "copy");
        assert_eq!(method.return_type, "List<String>");
        assert_eq!(method.modifiers, vec!["protected"]);
        assert_eq!(method.annotations, vec!["Override"]);
        assert_eq!(method.throws, vec!["java.io.IOException", "IllegalStateException"]);

        assert_eq!(method.parameters.len(), 2);
        assert_eq!(method.parameters[0].name, "items");
        assert_eq!(method.parameters[0].ty, "Map<String, Integer>");
        assert_eq!(method.parameters[1].name, "names");
        assert_eq!(method.parameters[1].ty, "String");
    }

    #[test]
    fn type_parameter_names_survive_bounds_and_annotations() {
        let source = r#"
package com.example;

class Box<T extends Number, @NonNull U, V> {
    T value;
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.type_parameters, vec!["T", "U", "V"]);
    }

    #[test]
    fn sealed_modifier_is_preserved_in_order() {
        let source = r#"
package com.example;

public abstract sealed class Shape permits Circle {
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.modifiers, vec!["public", "abstract", "sealed"]);
    }

    #[test]
    fn annotation_names_recorded_as_written() {
        let source = r#"
package com.example;

@Entity
@com.example.meta.Table("users")
class User {
}
"#;
        let entry = &extract(source)[0];
        assert_eq!(entry.annotations, vec!["Entity", "com.example.meta.Table"]);
    }

    #[test]
    fn unnamed_package_uses_simple_name_as_fqcn() {
        let entries = extract("class Solo {}\n");
        assert_eq!(entries[0].fqcn, "Solo");
        assert_eq!(entries[0].package, "");
    }

    #[test]
    fn multiple_top_level_types_keep_declaration_order() {
        let entries = extract("package p;\nclass First {}\ninterface Second {}\n");
        let fqcns: Vec<&str> = entries.iter().map(|e| e.fqcn.as_str()).collect();
        assert_eq!(fqcns, vec!["p.First", "p.Second"]);
    }

    #[test]
    fn unparseable_source_is_a_recoverable_error() {
        let err = extract_source("public class {{{", "Bad.java").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Parse failed"));
        assert!(message.contains("syntax error at"));
    }
}
