use crate::ast::*;

/// Serializer converts a stylesheet AST back to CSS text.
///
/// Output is normalized: one declaration per line, blocks indented with the
/// configured indent string. Original whitespace is not preserved.
pub struct Serializer {
    indent_level: usize,
    indent_string: String,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_string: "  ".to_string(), // 2 spaces
        }
    }

    pub fn with_indent(indent: &str) -> Self {
        Self {
            indent_level: 0,
            indent_string: indent.to_string(),
        }
    }

    /// Serialize a stylesheet to CSS
    pub fn serialize(&mut self, sheet: &Stylesheet) -> String {
        let mut output = String::new();
        self.serialize_nodes(&sheet.nodes, &mut output);
        output
    }

    fn serialize_nodes(&mut self, nodes: &[Node], output: &mut String) {
        for node in nodes {
            match node {
                Node::Rule(rule) => self.serialize_rule(rule, output),
                Node::Decl(decl) => self.serialize_decl(decl, output),
                Node::AtRule(at_rule) => self.serialize_at_rule(at_rule, output),
            }
        }
    }

    fn serialize_rule(&mut self, rule: &Rule, output: &mut String) {
        self.write_indent(output);
        output.push_str(&rule.selector);
        output.push_str(" {\n");
        self.indent_level += 1;
        self.serialize_nodes(&rule.nodes, output);
        self.indent_level -= 1;
        self.write_indent(output);
        output.push_str("}\n");
    }

    fn serialize_decl(&mut self, decl: &Declaration, output: &mut String) {
        self.write_indent(output);
        output.push_str(&decl.prop);
        output.push_str(": ");
        output.push_str(&decl.value);
        output.push_str(";\n");
    }

    fn serialize_at_rule(&mut self, at_rule: &AtRule, output: &mut String) {
        self.write_indent(output);
        output.push('@');
        output.push_str(&at_rule.name);
        if !at_rule.params.is_empty() {
            output.push(' ');
            output.push_str(&at_rule.params);
        }

        match &at_rule.nodes {
            Some(nodes) => {
                output.push_str(" {\n");
                self.indent_level += 1;
                self.serialize_nodes(nodes, output);
                self.indent_level -= 1;
                self.write_indent(output);
                output.push_str("}\n");
            }
            None => output.push_str(";\n"),
        }
    }

    fn write_indent(&self, output: &mut String) {
        for _ in 0..self.indent_level {
            output.push_str(&self.indent_string);
        }
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to serialize a stylesheet
pub fn serialize(sheet: &Stylesheet) -> String {
    Serializer::new().serialize(sheet)
}
