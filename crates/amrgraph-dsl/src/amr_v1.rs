//! AMR surface grammar (PENMAN notation with `~e.N` alignment markers).
//!
//! ```text
//! amr        := ws* ancestor ws*
//! ancestor   := "(" ws* variable (ws "/" ws* concept alignment?)? (ws descendant)* ws* ")"
//! descendant := relation alignment? ws* node
//! node       := ancestor | constant | variable alignment? | string | number
//! variable   := [a-z]+ [0-9]*
//! concept    := [^)~ \t\r\n]+
//! relation   := ":" [^()~ \t\r\n]+
//! alignment  := "~e." [0-9]+
//! ws         := (line_space | inline_space)+
//! ```
//!
//! Every rule is memoized through [`PackratGrammar::apply_rule`]; the
//! graph-building actions in [`crate::actions`] are invoked from the rule
//! bodies.

use crate::actions::{BuiltGraph, GraphBuilder};
use crate::graph::GraphError;
use crate::node::{ConceptNode, DescendantNode, DescendantTarget, LabelNode, LiteralKind, LiteralNode, Node};
use crate::packrat::{Packrat, PackratGrammar, PackratStats, ParseError, RuleFn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bare words accepted as named constants (`:mode imperative`).
pub const MODE_KEYWORDS: &[&str] = &["imperative", "expressive", "interrogative"];

// ============================================================================
// Options and errors
// ============================================================================

/// Knobs for the AMR parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Keep `:X-of` edges in their written direction instead of normalizing
    /// them to child -> parent `:X`.
    pub preserve_inverse: bool,
    /// Move an alignment written on a relation onto its (unaligned) target.
    pub push_relation_alignments: bool,
    /// Use the memo table. Disabling it yields the plain recursive-descent
    /// parser.
    pub memoize: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            preserve_inverse: false,
            push_relation_alignments: true,
            memoize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmrParseError {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("invalid edge while building graph: {0}")]
    Graph(#[from] GraphError),

    #[error("AMR has no root variable")]
    MissingRoot,
}

/// A parsed sentence graph plus the bookkeeping the alignment resolver needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAmr {
    pub root: LabelNode,
    pub built: BuiltGraph,
    pub stats: PackratStats,
}

// ============================================================================
// Entry points
// ============================================================================

/// Parse one AMR s-expression into a sentence graph.
pub fn parse_amr(source_id: &str, text: &str, options: &ParseOptions) -> Result<ParsedAmr, AmrParseError> {
    parse_amr_tree(source_id, text, options).map(|(_, parsed)| parsed)
}

/// Like [`parse_amr`], also returning the root parse tree node.
pub fn parse_amr_tree<'src>(
    source_id: &str,
    text: &'src str,
    options: &ParseOptions,
) -> Result<(Node<'src>, ParsedAmr), AmrParseError> {
    let mut grammar = AmrGrammar::new(source_id, text, *options);
    let outcome = grammar.run(AmrGrammar::amr);
    if let Some(error) = grammar.actions.take_error() {
        return Err(AmrParseError::Graph(error));
    }
    let node = outcome?;
    let Node::Label(root) = &node else {
        return Err(AmrParseError::MissingRoot);
    };
    let root = root.clone();
    let stats = grammar.cursor.stats();
    let built = grammar.actions.finish(&root).ok_or(AmrParseError::MissingRoot)?;
    Ok((node, ParsedAmr { root, built, stats }))
}

// ============================================================================
// Grammar
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmrRule {
    Amr,
    Ancestor,
    ConceptClause,
    Descendant,
    Node,
    Reference,
    Variable,
    Concept,
    Alignment,
    Relation,
    Str,
    Number,
    Constant,
    InlineSpace,
    LineSpace,
    Whitespace,
}

pub struct AmrGrammar<'src> {
    cursor: Packrat<'src, AmrRule>,
    actions: GraphBuilder,
}

impl<'src> PackratGrammar<'src> for AmrGrammar<'src> {
    type Rule = AmrRule;

    fn cursor(&mut self) -> &mut Packrat<'src, AmrRule> {
        &mut self.cursor
    }
}

fn is_inline_space(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r'
}

fn is_lowercase(c: char) -> bool {
    c.is_ascii_lowercase()
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_sign(c: char) -> bool {
    c == '-' || c == '+'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_concept_char(c: char) -> bool {
    c != ')' && c != '~' && !c.is_whitespace()
}

fn is_relation_char(c: char) -> bool {
    c != '(' && c != ')' && c != '~' && !c.is_whitespace()
}

fn is_string_char(c: char) -> bool {
    c != '"' && c != '\\'
}

fn any_char(_: char) -> bool {
    true
}

impl<'src> AmrGrammar<'src> {
    pub fn new(source_id: &str, input: &'src str, options: ParseOptions) -> Self {
        Self {
            cursor: Packrat::new(input, options.memoize),
            actions: GraphBuilder::new(source_id, options),
        }
    }

    fn text_since(&mut self, start: usize) -> &'src str {
        let cursor = self.cursor();
        &cursor.input()[start..cursor.offset()]
    }

    // ------------------------------------------------------------------------
    // Whitespace
    // ------------------------------------------------------------------------

    fn inline_space(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::InlineSpace, |g| {
            let start = g.cursor().offset();
            g.repeat(1, None, |g| g.char_class(is_inline_space, "space"))?;
            Some(g.cursor().terminal_from(start))
        })
    }

    fn line_space(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::LineSpace, |g| {
            let start = g.cursor().offset();
            g.repeat(0, None, |g| g.char_class(is_inline_space, "space"))?;
            g.literal("\n", "newline")?;
            g.repeat(0, None, |g| g.char_class(is_inline_space, "space"))?;
            Some(g.cursor().terminal_from(start))
        })
    }

    fn whitespace(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Whitespace, |g| {
            let start = g.cursor().offset();
            let alternatives: [RuleFn<'src, Self>; 2] = [Self::line_space, Self::inline_space];
            g.repeat(1, None, |g| g.choice(&alternatives))?;
            Some(g.cursor().terminal_from(start))
        })
    }

    fn skip_whitespace(&mut self) {
        self.optional(Self::whitespace);
    }

    // ------------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------------

    fn variable(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Variable, |g| {
            let start = g.cursor().offset();
            g.repeat(1, None, |g| g.char_class(is_lowercase, "variable"))?;
            g.repeat(0, None, |g| g.char_class(is_digit, "digit"))?;
            Some(g.cursor().terminal_from(start))
        })
    }

    fn concept(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Concept, |g| {
            let start = g.cursor().offset();
            g.repeat(1, None, |g| g.char_class(is_concept_char, "concept"))?;
            Some(g.cursor().terminal_from(start))
        })
    }

    fn alignment(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Alignment, |g| {
            g.literal("~e.", "\"~e.\"")?;
            let start = g.cursor().offset();
            g.repeat(1, None, |g| g.char_class(is_digit, "digit"))?;
            let token = g.text_since(start).parse::<usize>().ok()?;
            Some(Node::Alignment(Some(token)))
        })
    }

    /// An optional alignment suffix; `None` when absent.
    fn alignment_suffix(&mut self) -> Option<usize> {
        match self.optional(Self::alignment) {
            Node::Alignment(token) => token,
            _ => None,
        }
    }

    fn relation(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Relation, |g| {
            let start = g.cursor().offset();
            g.literal(":", "\":\"")?;
            g.repeat(1, None, |g| g.char_class(is_relation_char, "relation"))?;
            Some(g.cursor().terminal_from(start))
        })
    }

    fn string(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Str, |g| {
            g.literal("\"", "string")?;
            let start = g.cursor().offset();
            let escaped: RuleFn<'src, Self> = |g| {
                let start = g.cursor().offset();
                g.literal("\\", "\"\\\\\"")?;
                g.char_class(any_char, "escaped character")?;
                Some(g.cursor().terminal_from(start))
            };
            let plain: RuleFn<'src, Self> = |g| g.char_class(is_string_char, "string character");
            let alternatives = [escaped, plain];
            g.repeat(0, None, |g| g.choice(&alternatives))?;
            let text = g.text_since(start);
            g.literal("\"", "\"\\\"\"")?;
            let alignment = g.alignment_suffix();
            Some(Node::Literal(LiteralNode {
                kind: LiteralKind::String,
                text: unescape(text),
                alignment,
            }))
        })
    }

    fn number(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Number, |g| {
            let start = g.cursor().offset();
            g.optional(|g| g.char_class(is_sign, "sign"));
            g.repeat(1, None, |g| g.char_class(is_digit, "number"))?;
            g.optional(|g| {
                let start = g.cursor().offset();
                g.literal(".", "\".\"")?;
                g.repeat(1, None, |g| g.char_class(is_digit, "digit"))?;
                Some(g.cursor().terminal_from(start))
            });
            let text = g.text_since(start);
            let alignment = g.alignment_suffix();
            Some(Node::Literal(LiteralNode {
                kind: LiteralKind::Number,
                text: text.to_string(),
                alignment,
            }))
        })
    }

    fn constant(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Constant, |g| {
            let start = g.cursor().offset();
            let matched = if g.char_class(is_sign, "constant").is_some() {
                g.not_followed_by(is_digit)
            } else {
                MODE_KEYWORDS.iter().any(|keyword| {
                    g.cursor().reset_to(start);
                    g.literal(*keyword, "constant").is_some() && g.not_followed_by(is_identifier_char)
                })
            };
            if !matched {
                return None;
            }
            let text = g.text_since(start);
            let alignment = g.alignment_suffix();
            Some(Node::Literal(LiteralNode {
                kind: LiteralKind::Constant,
                text: text.to_string(),
                alignment,
            }))
        })
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    fn amr(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Amr, |g| {
            g.skip_whitespace();
            let root = g.ancestor()?;
            g.skip_whitespace();
            Some(root)
        })
    }

    fn ancestor(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Ancestor, |g| {
            g.literal("(", "\"(\"")?;
            g.skip_whitespace();
            let variable = g.variable()?.text()?;
            let reentrant = g.actions.bind(variable);

            let concept = match g.optional(Self::concept_clause) {
                Node::Concept(concept) => Some(concept),
                _ => None,
            };

            let mut descendants = Vec::new();
            if let Node::Sequence(items) = g.repeat(0, None, Self::spaced_descendant)? {
                for item in items {
                    if let Node::Descendant(descendant) = item {
                        descendants.push(descendant);
                    }
                }
            }

            g.skip_whitespace();
            g.literal(")", "\")\"")?;
            let label = g.actions.ancestor(variable, reentrant, concept, descendants)?;
            Some(Node::Label(label))
        })
    }

    fn concept_clause(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::ConceptClause, |g| {
            g.whitespace()?;
            g.literal("/", "\"/\"")?;
            g.skip_whitespace();
            let label = g.concept()?.text()?;
            let alignment = g.alignment_suffix();
            Some(Node::Concept(ConceptNode {
                label: label.to_string(),
                alignment,
            }))
        })
    }

    fn spaced_descendant(&mut self) -> Option<Node<'src>> {
        self.whitespace()?;
        self.descendant()
    }

    fn descendant(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Descendant, |g| {
            let relation = g.relation()?.text()?;
            let relation_alignment = g.alignment_suffix();
            g.skip_whitespace();
            let target = match g.node()? {
                Node::Label(label) => DescendantTarget::Label(label),
                Node::Literal(literal) => DescendantTarget::Literal(literal),
                _ => return None,
            };
            Some(Node::Descendant(DescendantNode {
                relation: relation.to_string(),
                relation_alignment,
                inverse: crate::actions::is_inverse_role(relation),
                target,
            }))
        })
    }

    fn node(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Node, |g| {
            let alternatives: [RuleFn<'src, Self>; 5] = [
                Self::ancestor,
                Self::constant,
                Self::reference,
                Self::string,
                Self::number,
            ];
            g.choice(&alternatives)
        })
    }

    fn reference(&mut self) -> Option<Node<'src>> {
        self.apply_rule(AmrRule::Reference, |g| {
            let variable = g.variable()?.text()?;
            let alignment = g.alignment_suffix();
            Some(Node::Label(g.actions.reference(variable, alignment)))
        })
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::INSTANCE_ROLE;

    fn parse(text: &str) -> ParsedAmr {
        parse_amr("t", text, &ParseOptions::default()).expect("parse")
    }

    fn edge(parsed: &ParsedAmr, source: &str, role: &str, target: &str) -> bool {
        let g = &parsed.built.graph;
        match (g.vertex(source), g.vertex(target)) {
            (Some(s), Some(t)) => g.has_edge(s, role, t),
            _ => false,
        }
    }

    #[test]
    fn parses_minimal_amr() {
        let parsed = parse("(b / boy)");
        assert_eq!(parsed.root.variable, "b");
        assert!(edge(&parsed, "b", INSTANCE_ROLE, "b/boy"));
        assert_eq!(parsed.root.visited, vec!["b", "b/boy"]);
    }

    #[test]
    fn concept_stops_at_alignment_marker() {
        let parsed = parse("(g / go-01~e.2)");
        let g = parsed.built.graph.vertex("g").unwrap();
        assert!(parsed.built.graph.contains("g/go-01"));
        assert_eq!(parsed.built.alignments[&g].iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn literals_become_fresh_vertices() {
        let parsed = parse(r#"(n / name :op1 "Barack"~e.0 :op2 "Obama"~e.1 :polarity - :quant 5)"#);
        let g = &parsed.built.graph;
        assert_eq!(g.vertex_count(), 6);
        let texts: Vec<_> = g
            .vertices()
            .into_iter()
            .filter_map(|v| g.kind(v).and_then(|k| k.label()).map(str::to_string))
            .collect();
        assert_eq!(texts, vec!["name", "Barack", "Obama", "-", "5"]);
    }

    #[test]
    fn negative_number_is_not_a_constant() {
        let parsed = parse("(t / temperature :quant -5)");
        let literal = parsed.built.graph.vertex("t.0").unwrap();
        assert_eq!(
            parsed.built.graph.kind(literal).and_then(|k| k.label()),
            Some("-5")
        );
    }

    #[test]
    fn mode_keyword_is_a_constant_but_prefix_is_a_variable() {
        let parsed = parse("(g / go-01 :mode imperative :ARG0 (imp / person))");
        let g = &parsed.built.graph;
        assert!(g.contains("g.0"));
        assert!(g.contains("imp"));
    }

    #[test]
    fn accepts_newlines_and_indentation() {
        let parsed = parse("(w / want-01\n      :ARG0 (b / boy)\n\t:ARG1 (g / go-01\n   :ARG0 b))\n");
        assert!(edge(&parsed, "w", ":ARG0", "b"));
        assert!(edge(&parsed, "g", ":ARG0", "b"));
    }

    #[test]
    fn string_escapes_are_removed() {
        let parsed = parse(r#"(s / say-01 :ARG1 "a \"quote\"")"#);
        let literal = parsed.built.graph.vertex("s.0").unwrap();
        assert_eq!(
            parsed.built.graph.kind(literal).and_then(|k| k.label()),
            Some("a \"quote\"")
        );
    }

    #[test]
    fn relation_alignment_is_pushed_to_unaligned_target() {
        let parsed = parse("(w / want-01 :ARG0~e.1 (b / boy))");
        let b = parsed.built.graph.vertex("b").unwrap();
        assert!(parsed.built.alignments[&b].contains(&1));
        assert!(parsed.built.relation_alignments.is_empty());
    }

    #[test]
    fn relation_alignment_stays_on_relation_when_not_pushed() {
        let options = ParseOptions {
            push_relation_alignments: false,
            ..ParseOptions::default()
        };
        let parsed = parse_amr("t", "(w / want-01 :ARG0~e.1 (b / boy))", &options).unwrap();
        assert_eq!(parsed.built.relation_alignments.len(), 1);
        assert_eq!(parsed.built.relation_alignments[0].token, 1);
    }

    #[test]
    fn relation_alignment_stays_when_target_already_aligned() {
        let parsed = parse("(w / want-01 :ARG0~e.1 (b / boy~e.0))");
        let b = parsed.built.graph.vertex("b").unwrap();
        assert_eq!(parsed.built.alignments[&b].len(), 1);
        assert_eq!(parsed.built.relation_alignments.len(), 1);
    }

    #[test]
    fn missing_close_paren_reports_position() {
        let err = parse_amr("t", "(w / want-01 :ARG0 (b / boy)", &ParseOptions::default())
            .expect_err("unterminated");
        match err {
            AmrParseError::Syntax(err) => {
                assert_eq!(err.line, 1);
                assert_eq!(err.offset, 28);
                assert!(err.expected.iter().any(|e| e == "\")\""), "{err}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn memo_table_is_used() {
        let parsed = parse("(w / want-01 :ARG0 (b / boy) :ARG1 (g / go-01 :ARG0 b))");
        assert!(parsed.stats.memo_hits > 0);
    }
}
