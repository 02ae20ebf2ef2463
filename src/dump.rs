//! JSON view of a tree
//!
//! Interior nodes become `{"label", "constant"?, "children"}`, tokens become
//! `{"category", "lexeme"}` and epsilon leaves become `null`.

use serde::Serialize;

use crate::parser::ast::{Ast, NodeData, NodeId};
use crate::value::Value;

/// Borrowed, serializable view of one node and its subtree
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DumpNode<'a> {
    Node {
        label: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        constant: Option<Value>,
        children: Vec<DumpNode<'a>>,
    },
    Token {
        category: &'a str,
        lexeme: &'a str,
    },
    Epsilon,
}

impl<'a> DumpNode<'a> {
    pub fn new(ast: &'a Ast, id: NodeId) -> Self {
        match &ast.node(id).data {
            NodeData::NonTerminal(nt) => DumpNode::Node {
                label: &nt.label,
                constant: nt.constant,
                children: nt.children.iter().map(|&c| DumpNode::new(ast, c)).collect(),
            },
            NodeData::Terminal(Some(token)) => DumpNode::Token {
                category: token.terminal(),
                lexeme: token.text(),
            },
            NodeData::Terminal(None) => DumpNode::Epsilon,
        }
    }
}

/// Pretty-printed JSON of the whole tree (`null` for an empty tree)
pub fn to_json(ast: &Ast) -> serde_json::Result<String> {
    let root = ast.root().map(|root| DumpNode::new(ast, root));
    serde_json::to_string_pretty(&root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::parser::parse::Parser;

    #[test]
    fn test_dump_shape() {
        let mut diagnostics = Diagnostics::new();
        let ast = Parser::new("void main() { }")
            .unwrap()
            .parse_program(&mut diagnostics);

        let json: serde_json::Value = serde_json::from_str(&to_json(&ast).unwrap()).unwrap();
        assert_eq!(json["label"], "program");

        let method = &json["children"][0];
        assert_eq!(method["label"], "method");
        assert_eq!(method["children"][1]["category"], "identifier");
        assert_eq!(method["children"][1]["lexeme"], "main");
        // `statements ::= ε`
        assert!(method["children"][6]["children"][0].is_null());
    }

    #[test]
    fn test_dump_includes_constants() {
        let mut diagnostics = Diagnostics::new();
        let mut ast = Parser::new("void main() { print(6 / 2); }")
            .unwrap()
            .parse_program(&mut diagnostics);
        crate::analyzer::analyze(&mut ast, &mut diagnostics).unwrap();

        let json = to_json(&ast).unwrap();
        assert!(json.contains("\"constant\": 3"));
    }
}
