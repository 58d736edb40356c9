//! Generic packrat parsing primitives.
//!
//! A grammar is any type that owns a [`Packrat`] cursor and implements
//! [`PackratGrammar`]. Rule bodies are plain methods returning
//! `Option<Node>`; `None` means the rule failed and the cursor is put back
//! where the rule started.
//!
//! Every named rule goes through [`PackratGrammar::apply_rule`], which keeps
//! a memo table keyed by `(rule, offset)`. A rule body runs at most once per
//! offset, so nested repetitions (AMR relations inside relations) stay linear
//! in the input length. Memoization can be switched off to get the plain
//! recursive-descent parser, which is used as a reference in tests.
//!
//! Error reporting follows the usual "furthest failure" scheme: every failed
//! terminal match records what it expected, and only the descriptions at the
//! largest offset reached are kept.

use crate::node::Node;
use ahash::AHashMap;
use std::hash::Hash;
use thiserror::Error;

/// Description recorded when a successful parse stops short of the input end.
pub const END_OF_INPUT: &str = "<end of input>";

/// A rule body that can be used as an alternative in [`PackratGrammar::choice`].
pub type RuleFn<'src, G> = fn(&mut G) -> Option<Node<'src>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {column}: expected {}", .expected.join(" or "))]
pub struct ParseError {
    /// Byte offset of the furthest failure.
    pub offset: usize,
    /// 1-based line of `offset`.
    pub line: usize,
    /// 1-based column (in characters) of `offset`.
    pub column: usize,
    pub expected: Vec<String>,
}

#[derive(Debug, Clone)]
enum Memo<'src> {
    Success { node: Node<'src>, end: usize },
    Failure,
}

/// Counters for one parse run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackratStats {
    /// Rule bodies actually executed.
    pub rule_evaluations: usize,
    /// Rule applications answered from the memo table.
    pub memo_hits: usize,
}

/// Input cursor, memo table and failure bookkeeping.
pub struct Packrat<'src, R> {
    input: &'src str,
    pos: usize,
    memo: Option<AHashMap<(R, usize), Memo<'src>>>,
    furthest: usize,
    expected: Vec<&'static str>,
    stats: PackratStats,
}

impl<'src, R: Copy + Eq + Hash> Packrat<'src, R> {
    pub fn new(input: &'src str, memoize: bool) -> Self {
        Self {
            input,
            pos: 0,
            memo: memoize.then(AHashMap::new),
            furthest: 0,
            expected: Vec::new(),
            stats: PackratStats::default(),
        }
    }

    pub fn input(&self) -> &'src str {
        self.input
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn reset_to(&mut self, offset: usize) {
        self.pos = offset;
    }

    pub fn remaining(&self) -> &'src str {
        &self.input[self.pos..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn stats(&self) -> PackratStats {
        self.stats
    }

    /// A terminal node spanning `start..offset()`.
    pub fn terminal_from(&self, start: usize) -> Node<'src> {
        Node::Terminal {
            text: &self.input[start..self.pos],
            span: start..self.pos,
        }
    }

    /// Record that `description` was expected at the current offset.
    pub fn expected(&mut self, description: &'static str) {
        if self.pos > self.furthest {
            self.furthest = self.pos;
            self.expected.clear();
        }
        if self.pos == self.furthest && !self.expected.contains(&description) {
            self.expected.push(description);
        }
    }

    fn recall(&mut self, rule: R, start: usize) -> Option<Option<Node<'src>>> {
        let entry = self.memo.as_ref()?.get(&(rule, start))?.clone();
        self.stats.memo_hits += 1;
        Some(match entry {
            Memo::Success { node, end } => {
                self.pos = end;
                Some(node)
            }
            Memo::Failure => {
                self.pos = start;
                None
            }
        })
    }

    fn remember(&mut self, rule: R, start: usize, result: &Option<Node<'src>>) {
        let end = self.pos;
        if let Some(memo) = self.memo.as_mut() {
            let entry = match result {
                Some(node) => Memo::Success {
                    node: node.clone(),
                    end,
                },
                None => Memo::Failure,
            };
            memo.insert((rule, start), entry);
        }
    }

    /// Build the error for the furthest failure seen so far.
    pub fn error(&self) -> ParseError {
        let (line, column) = line_column(self.input, self.furthest);
        ParseError {
            offset: self.furthest,
            line,
            column,
            expected: self.expected.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// 1-based line and column of a byte offset.
pub fn line_column(input: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(input.len());
    let before = &input[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Combinators shared by every packrat grammar.
pub trait PackratGrammar<'src>: Sized {
    type Rule: Copy + Eq + Hash;

    fn cursor(&mut self) -> &mut Packrat<'src, Self::Rule>;

    /// Apply a named rule at the current offset, consulting the memo table.
    fn apply_rule(
        &mut self,
        rule: Self::Rule,
        body: impl FnOnce(&mut Self) -> Option<Node<'src>>,
    ) -> Option<Node<'src>> {
        let start = self.cursor().offset();
        if let Some(result) = self.cursor().recall(rule, start) {
            return result;
        }

        self.cursor().stats.rule_evaluations += 1;
        let result = body(self);
        if result.is_none() {
            self.cursor().reset_to(start);
        }
        self.cursor().remember(rule, start, &result);
        result
    }

    /// Ordered choice: the first alternative that matches wins.
    fn choice(&mut self, alternatives: &[RuleFn<'src, Self>]) -> Option<Node<'src>> {
        let start = self.cursor().offset();
        for alternative in alternatives {
            self.cursor().reset_to(start);
            if let Some(node) = alternative(self) {
                return Some(node);
            }
        }
        self.cursor().reset_to(start);
        None
    }

    /// Apply `item` until it fails (or `max` matches were collected).
    fn repeat(
        &mut self,
        min: usize,
        max: Option<usize>,
        mut item: impl FnMut(&mut Self) -> Option<Node<'src>>,
    ) -> Option<Node<'src>> {
        let start = self.cursor().offset();
        let mut items = Vec::new();

        while max.map_or(true, |max| items.len() < max) {
            let before = self.cursor().offset();
            match item(self) {
                Some(node) => {
                    items.push(node);
                    // A match that consumed nothing would repeat forever.
                    if self.cursor().offset() == before {
                        break;
                    }
                }
                None => {
                    self.cursor().reset_to(before);
                    break;
                }
            }
        }

        if items.len() >= min {
            Some(Node::Sequence(items))
        } else {
            self.cursor().reset_to(start);
            None
        }
    }

    /// Zero-or-one repetition. Always succeeds.
    fn optional(&mut self, item: impl FnMut(&mut Self) -> Option<Node<'src>>) -> Node<'src> {
        match self.repeat(0, Some(1), item) {
            Some(Node::Sequence(mut items)) => items.pop().unwrap_or(Node::Empty),
            _ => Node::Empty,
        }
    }

    /// Match `text` exactly.
    fn literal(&mut self, text: &'static str, description: &'static str) -> Option<Node<'src>> {
        let cursor = self.cursor();
        if cursor.remaining().starts_with(text) {
            let start = cursor.offset();
            cursor.reset_to(start + text.len());
            Some(cursor.terminal_from(start))
        } else {
            cursor.expected(description);
            None
        }
    }

    /// Match a single character satisfying `accept`.
    fn char_class(&mut self, accept: fn(char) -> bool, description: &'static str) -> Option<Node<'src>> {
        let cursor = self.cursor();
        match cursor.remaining().chars().next() {
            Some(c) if accept(c) => {
                let start = cursor.offset();
                cursor.reset_to(start + c.len_utf8());
                Some(cursor.terminal_from(start))
            }
            _ => {
                cursor.expected(description);
                None
            }
        }
    }

    /// Negative lookahead on a single character; never consumes input.
    fn not_followed_by(&mut self, reject: fn(char) -> bool) -> bool {
        !self.cursor().remaining().chars().next().is_some_and(reject)
    }

    /// Run `root` and require it to consume the whole input.
    fn run(&mut self, root: RuleFn<'src, Self>) -> Result<Node<'src>, ParseError> {
        self.cursor().reset_to(0);
        match root(self) {
            Some(node) if self.cursor().at_end() => Ok(node),
            Some(_) => {
                self.cursor().expected(END_OF_INPUT);
                Err(self.cursor().error())
            }
            None => Err(self.cursor().error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum ListRule {
        List,
        Item,
    }

    /// `list := "[" item ("," item)* "]"`, `item := [a-z]+`
    struct ListGrammar<'src> {
        cursor: Packrat<'src, ListRule>,
    }

    impl<'src> PackratGrammar<'src> for ListGrammar<'src> {
        type Rule = ListRule;

        fn cursor(&mut self) -> &mut Packrat<'src, ListRule> {
            &mut self.cursor
        }
    }

    impl<'src> ListGrammar<'src> {
        fn new(input: &'src str, memoize: bool) -> Self {
            Self {
                cursor: Packrat::new(input, memoize),
            }
        }

        fn list(&mut self) -> Option<Node<'src>> {
            self.apply_rule(ListRule::List, |g| {
                g.literal("[", "\"[\"")?;
                let first = g.item()?;
                let rest = g.repeat(0, None, |g| {
                    g.literal(",", "\",\"")?;
                    g.item()
                })?;
                g.literal("]", "\"]\"")?;
                let mut items = vec![first];
                if let Node::Sequence(more) = rest {
                    items.extend(more);
                }
                Some(Node::Sequence(items))
            })
        }

        fn item(&mut self) -> Option<Node<'src>> {
            self.apply_rule(ListRule::Item, |g| {
                let start = g.cursor().offset();
                g.repeat(1, None, |g| g.char_class(|c| c.is_ascii_lowercase(), "[a-z]"))?;
                Some(g.cursor().terminal_from(start))
            })
        }
    }

    fn texts(node: &Node<'_>) -> Vec<String> {
        match node {
            Node::Sequence(items) => items
                .iter()
                .filter_map(|n| n.text().map(str::to_string))
                .collect(),
            _ => vec![],
        }
    }

    #[test]
    fn parses_whole_input() {
        let mut g = ListGrammar::new("[ab,c,def]", true);
        let node = g.run(ListGrammar::list).expect("parse");
        assert_eq!(texts(&node), vec!["ab", "c", "def"]);
    }

    #[test]
    fn reports_furthest_failure_with_all_expectations() {
        let mut g = ListGrammar::new("[ab,c", true);
        let err = g.run(ListGrammar::list).expect_err("should fail");
        assert_eq!(err.offset, 5);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 6);
        assert!(err.expected.contains(&"\",\"".to_string()), "{err}");
        assert!(err.expected.contains(&"\"]\"".to_string()), "{err}");
    }

    #[test]
    fn trailing_input_is_an_end_of_input_expectation() {
        let mut g = ListGrammar::new("[a]x", true);
        let err = g.run(ListGrammar::list).expect_err("should fail");
        assert_eq!(err.offset, 3);
        assert_eq!(err.expected, vec![END_OF_INPUT.to_string()]);
    }

    #[test]
    fn memo_hit_does_not_reenter_rule_body() {
        let mut g = ListGrammar::new("abc", true);
        let first = g.item();
        g.cursor().reset_to(0);
        let second = g.item();
        assert_eq!(first, second);
        assert_eq!(g.cursor().offset(), 3);
        let stats = g.cursor().stats();
        assert_eq!(stats.rule_evaluations, 1);
        assert_eq!(stats.memo_hits, 1);
    }

    #[test]
    fn memo_can_be_disabled() {
        let mut g = ListGrammar::new("abc", false);
        g.item();
        g.cursor().reset_to(0);
        g.item();
        let stats = g.cursor().stats();
        assert_eq!(stats.rule_evaluations, 2);
        assert_eq!(stats.memo_hits, 0);
    }

    #[test]
    fn failed_rule_restores_offset_and_is_memoized_as_failure() {
        let mut g = ListGrammar::new("[ab", true);
        assert!(g.list().is_none());
        assert_eq!(g.cursor().offset(), 0);
        assert!(g.list().is_none());
        assert_eq!(g.cursor().stats().memo_hits, 1);
    }

    #[test]
    fn line_column_counts_characters() {
        assert_eq!(line_column("ab\ncé\nx", 0), (1, 1));
        assert_eq!(line_column("ab\ncé\nx", 3), (2, 1));
        assert_eq!(line_column("ab\ncé\nx", 7), (3, 1));
        assert_eq!(line_column("ab\ncé\nx", 6), (2, 3));
    }
}
