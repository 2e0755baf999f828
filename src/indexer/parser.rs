// Python symbol extraction

use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::error::{Diagnostic, Result};
use crate::index::{Extraction, Parser, Symbol, SymbolKind};

/// Name of the object-initializer method.
const INITIALIZER: &str = "__init__";

/// Syntax nodes that are not constructs of their own: a definition inside a
/// class body is enclosed by the class, not by the body block.
const TRANSPARENT: &[&str] = &["block", "decorated_definition", "expression_statement"];

/// The construct immediately enclosing a node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Construct {
    Module,
    Class,
    Function {
        name: String,
        /// First parameter, the implicit receiver for methods.
        receiver: Option<String>,
    },
    Other,
}

/// Stack of enclosing constructs, innermost last.
#[derive(Debug, Default)]
struct Scope {
    stack: Vec<Construct>,
}

impl Scope {
    fn enclosing(&self) -> &Construct {
        self.stack.last().unwrap_or(&Construct::Module)
    }
}

/// Accumulates symbols for one file.
struct Collector<'a> {
    source: &'a str,
    file_path: &'a str,
    symbols: Vec<Symbol>,
}

impl Collector<'_> {
    fn text(&self, node: Node) -> Option<String> {
        node.utf8_text(self.source.as_bytes()).ok().map(str::to_string)
    }

    fn push(&mut self, name: String, kind: SymbolKind, node: Node) {
        let line = node.start_position().row + 1;
        self.symbols.push(Symbol::new(name, kind, self.file_path, line));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descend {
    Yes,
    No,
}

type Handler = fn(Node, &Scope, &mut Collector) -> Descend;

/// Node kind → handler.
const DISPATCH: &[(&str, Handler)] = &[
    ("function_definition", visit_function),
    ("class_definition", visit_class),
    ("assignment", visit_assignment),
];

fn handler_for(kind: &str) -> Option<Handler> {
    DISPATCH
        .iter()
        .find(|(node_kind, _)| *node_kind == kind)
        .map(|(_, handler)| *handler)
}

fn is_reserved_name(name: &str) -> bool {
    name.starts_with("__") && name.ends_with("__")
}

fn visit_function(node: Node, scope: &Scope, out: &mut Collector) -> Descend {
    let Some(name) = node.child_by_field_name("name").and_then(|n| out.text(n)) else {
        return Descend::Yes;
    };

    if !is_reserved_name(&name) {
        let kind = match scope.enclosing() {
            Construct::Class => SymbolKind::Method,
            _ => SymbolKind::Function,
        };
        out.push(name, kind, node);
    }

    Descend::Yes
}

fn visit_class(node: Node, _scope: &Scope, out: &mut Collector) -> Descend {
    if let Some(name) = node.child_by_field_name("name").and_then(|n| out.text(n)) {
        out.push(name, SymbolKind::Class, node);
    }
    Descend::Yes
}

fn visit_assignment(node: Node, scope: &Scope, out: &mut Collector) -> Descend {
    // `x: int` declares without assigning.
    if node.child_by_field_name("right").is_none() {
        return Descend::No;
    }

    let mut targets = Vec::new();
    collect_targets(node, &mut targets);

    for target in targets {
        if let Some((name, kind)) = classify_target(target, scope.enclosing(), out) {
            out.push(name, kind, node);
        }
    }

    // Nothing inside an assignment defines a symbol.
    Descend::No
}

/// Left-hand targets of `node`, following chains like `a = b = 1` and
/// flattening tuple/list patterns.
fn collect_targets<'t>(node: Node<'t>, targets: &mut Vec<Node<'t>>) {
    let mut current = Some(node);
    while let Some(assignment) = current {
        if let Some(left) = assignment.child_by_field_name("left") {
            flatten_pattern(left, targets);
        }
        current = assignment
            .child_by_field_name("right")
            .filter(|right| right.kind() == "assignment");
    }
}

fn flatten_pattern<'t>(node: Node<'t>, targets: &mut Vec<Node<'t>>) {
    match node.kind() {
        "pattern_list" | "tuple_pattern" | "list_pattern" | "expression_list" | "tuple" | "list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                flatten_pattern(child, targets);
            }
        }
        "parenthesized_expression" => {
            if let Some(inner) = node.named_child(0) {
                flatten_pattern(inner, targets);
            }
        }
        _ => targets.push(node),
    }
}

fn classify_target(target: Node, enclosing: &Construct, out: &Collector) -> Option<(String, SymbolKind)> {
    match (enclosing, target.kind()) {
        (Construct::Module, "identifier") => Some((out.text(target)?, SymbolKind::GlobalAttribute)),
        (Construct::Function { name, receiver }, "attribute") if name == INITIALIZER => {
            let object = target.child_by_field_name("object")?;
            let receiver = receiver.as_deref()?;
            if object.kind() != "identifier" || out.text(object)?.as_str() != receiver {
                return None;
            }
            let attribute = target.child_by_field_name("attribute")?;
            Some((out.text(attribute)?, SymbolKind::InstanceAttribute))
        }
        (Construct::Class, "attribute") => {
            let attribute = target.child_by_field_name("attribute")?;
            Some((out.text(attribute)?, SymbolKind::ClassAttribute))
        }
        _ => None,
    }
}

fn construct_for(node: Node, out: &Collector) -> Construct {
    match node.kind() {
        "module" => Construct::Module,
        "class_definition" => Construct::Class,
        "function_definition" => Construct::Function {
            name: node
                .child_by_field_name("name")
                .and_then(|n| out.text(n))
                .unwrap_or_default(),
            receiver: first_parameter(node, out),
        },
        _ => Construct::Other,
    }
}

fn first_parameter(function: Node, out: &Collector) -> Option<String> {
    let parameters = function.child_by_field_name("parameters")?;
    let mut cursor = parameters.walk();
    let first = parameters
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;

    match first.kind() {
        "identifier" => out.text(first),
        "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
            let mut cursor = first.walk();
            let name = first
                .named_children(&mut cursor)
                .find(|child| child.kind() == "identifier");
            name.and_then(|n| out.text(n))
        }
        _ => None,
    }
}

fn walk(node: Node, scope: &mut Scope, out: &mut Collector) {
    let descend = match handler_for(node.kind()) {
        Some(handler) => handler(node, &*scope, out),
        None => Descend::Yes,
    };

    if descend == Descend::No || node.named_child_count() == 0 {
        return;
    }

    let pushed = !TRANSPARENT.contains(&node.kind());
    if pushed {
        scope.stack.push(construct_for(node, out));
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, scope, out);
    }

    if pushed {
        scope.stack.pop();
    }
}

/// Location of the first syntax error in `node`, if any.
fn first_error(node: Node) -> Option<String> {
    if node.is_missing() {
        let pos = node.start_position();
        return Some(format!(
            "missing '{}' at line {}, column {}",
            node.kind(),
            pos.row + 1,
            pos.column + 1
        ));
    }
    if node.is_error() {
        let pos = node.start_position();
        return Some(format!("invalid syntax at line {}, column {}", pos.row + 1, pos.column + 1));
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Python parser using tree-sitter
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_tree(&self, content: &str) -> Result<Option<Tree>> {
        let mut parser = TreeParser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        Ok(parser.parse(content, None))
    }

    fn extract_symbols(&self, tree: &Tree, content: &str, file_path: &str) -> Vec<Symbol> {
        let mut out = Collector {
            source: content,
            file_path,
            symbols: Vec::new(),
        };
        walk(tree.root_node(), &mut Scope::default(), &mut out);
        out.symbols
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PythonParser {
    fn can_parse(&self, file_path: &str) -> bool {
        file_path.ends_with(".py")
    }

    fn extract(&self, file_path: &str, content: &str) -> Extraction {
        let tree = match self.parse_tree(content) {
            Ok(Some(tree)) => tree,
            Ok(None) => {
                return Extraction {
                    symbols: Vec::new(),
                    diagnostics: vec![Diagnostic::parse_error(file_path, "parser produced no tree")],
                }
            }
            Err(e) => {
                return Extraction {
                    symbols: Vec::new(),
                    diagnostics: vec![Diagnostic::parse_error(file_path, e.to_string())],
                }
            }
        };

        if let Some(message) = first_error(tree.root_node()) {
            return Extraction {
                symbols: Vec::new(),
                diagnostics: vec![Diagnostic::parse_error(file_path, message)],
            };
        }

        Extraction {
            symbols: self.extract_symbols(&tree, content, file_path),
            diagnostics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use proptest::prelude::*;

    fn extract(content: &str) -> Vec<(String, &'static str, usize)> {
        let extraction = PythonParser::new().extract("a.py", content);
        assert!(extraction.diagnostics.is_empty(), "{:?}", extraction.diagnostics);
        extraction
            .symbols
            .into_iter()
            .map(|s| {
                assert_eq!(s.path, "a.py");
                (s.name, s.kind.as_str(), s.line)
            })
            .collect()
    }

    fn owned(expected: &[(&str, &'static str, usize)]) -> Vec<(String, &'static str, usize)> {
        expected.iter().map(|(n, k, l)| (n.to_string(), *k, *l)).collect()
    }

    #[test]
    fn test_functions_classes_and_methods() {
        // `self.x` is assigned in `baz`, not `__init__`, so it is not an
        // instance attribute.
        let content = "def foo():\n    pass\nclass Bar:\n    def baz(self):\n        self.x = 1\n";
        assert_eq!(
            extract(content),
            owned(&[("foo", "function", 1), ("Bar", "class", 3), ("baz", "method", 4)])
        );
    }

    #[test]
    fn test_instance_attributes_only_in_initializer() {
        let content = "class Bar:\n    def __init__(self):\n        self.x = 1\n        other.y = 2\n    def baz(self):\n        self.z = 3\n";
        assert_eq!(
            extract(content),
            owned(&[("Bar", "class", 1), ("x", "instance-attribute", 3), ("baz", "method", 5)])
        );
    }

    #[test]
    fn test_receiver_need_not_be_named_self() {
        let content = "class P:\n    def __init__(me, v: int = 0):\n        me.v = v\n";
        assert_eq!(extract(content), owned(&[("P", "class", 1), ("v", "instance-attribute", 3)]));
    }

    #[test]
    fn test_global_attribute() {
        assert_eq!(extract("y = 5\n"), owned(&[("y", "global-attribute", 1)]));
    }

    #[test]
    fn test_bare_annotation_is_not_an_assignment() {
        let content = "x: int\ny: int = 1\nclass C:\n    def __init__(self):\n        self.z: str\n";
        assert_eq!(
            extract(content),
            owned(&[("y", "global-attribute", 2), ("C", "class", 3)])
        );
    }

    #[test]
    fn test_tuple_and_chained_targets() {
        let content = "a, (b, c) = 1, (2, 3)\nd = e = 0\nf[0] = 1\n";
        assert_eq!(
            extract(content),
            owned(&[
                ("a", "global-attribute", 1),
                ("b", "global-attribute", 1),
                ("c", "global-attribute", 1),
                ("d", "global-attribute", 2),
                ("e", "global-attribute", 2),
            ])
        );
    }

    #[test]
    fn test_class_attribute_requires_attribute_target() {
        let content = "class C:\n    plain = 1\n    C.counter = 0\n";
        assert_eq!(
            extract(content),
            owned(&[("C", "class", 1), ("counter", "class-attribute", 3)])
        );
    }

    #[test]
    fn test_reserved_names_skipped() {
        let content = "class C:\n    def __repr__(self):\n        return ''\n    def _private(self):\n        pass\ndef __main__():\n    pass\n";
        assert_eq!(extract(content), owned(&[("C", "class", 1), ("_private", "method", 4)]));
    }

    #[test]
    fn test_decorated_and_nested_definitions() {
        let content = "class C:\n    @property\n    def value(self):\n        def helper():\n            pass\n        return helper\n\n@cache\ndef top():\n    x = 1\n";
        assert_eq!(
            extract(content),
            owned(&[
                ("C", "class", 1),
                ("value", "method", 3),
                ("helper", "function", 4),
                ("top", "function", 9),
            ])
        );
    }

    #[test]
    fn test_nested_blocks_are_their_own_construct() {
        // Assignment under `if` is not at module scope; a def under `if`
        // inside a class is not directly enclosed by the class.
        let content = "if DEBUG:\n    level = 1\nclass C:\n    if True:\n        def m(self):\n            pass\n";
        assert_eq!(
            extract(content),
            owned(&[("C", "class", 3), ("m", "function", 5)])
        );
    }

    #[test]
    fn test_async_function() {
        assert_eq!(extract("async def fetch():\n    pass\n"), owned(&[("fetch", "function", 1)]));
    }

    #[test]
    fn test_syntax_error_yields_single_diagnostic() {
        let extraction = PythonParser::new().extract("broken.py", "def foo(:\n    pass\nx = 1\n");
        assert!(extraction.symbols.is_empty());
        assert_eq!(extraction.diagnostics.len(), 1);
        assert_eq!(extraction.diagnostics[0].kind, DiagnosticKind::ParseError);
        assert_eq!(extraction.diagnostics[0].path.as_deref(), Some("broken.py"));
        assert!(extraction.failed());
    }

    #[test]
    fn test_empty_file() {
        let extraction = PythonParser::new().extract("empty.py", "");
        assert!(extraction.symbols.is_empty());
        assert!(extraction.diagnostics.is_empty());
    }

    #[test]
    fn test_can_parse() {
        let parser = PythonParser::new();
        assert!(parser.can_parse("pkg/mod.py"));
        assert!(!parser.can_parse("pkg/mod.pyc"));
        assert!(!parser.can_parse("src/main.rs"));
    }

    #[test]
    fn test_fixture_inventory() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/test_python_project/inventory.py");
        let content = std::fs::read_to_string(path).unwrap();
        let extraction = PythonParser::new().extract("inventory.py", &content);
        assert!(extraction.diagnostics.is_empty());

        let found: Vec<_> = extraction
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind.as_str(), s.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("registry", "global-attribute", 5),
                ("MAX_ITEMS", "global-attribute", 6),
                ("LIMIT", "global-attribute", 6),
                ("Inventory", "class", 9),
                ("owner", "instance-attribute", 13),
                ("items", "instance-attribute", 14),
                ("add", "method", 16),
                ("biggest", "method", 22),
                ("Entry", "class", 25),
                ("label", "instance-attribute", 27),
                ("build_default", "function", 30),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_extraction_is_deterministic(
            names in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 1..8),
        ) {
            let mut content = String::new();
            for (i, name) in names.iter().enumerate() {
                match i % 3 {
                    0 => content.push_str(&format!("def fn_{}():\n    pass\n", name)),
                    1 => content.push_str(&format!("class K{}:\n    def m_{}(self):\n        pass\n", i, name)),
                    _ => content.push_str(&format!("v_{} = {}\n", name, i)),
                }
            }

            let parser = PythonParser::new();
            let first = parser.extract("gen.py", &content);
            let second = parser.extract("gen.py", &content);
            prop_assert!(first.diagnostics.is_empty());
            prop_assert_eq!(first, second);
        }
    }
}
