//! Text notation for process structure trees.
//!
//! ```text
//! SEQ(EVENT(start), XOR[Gateway_1](TASK(a), LOOP(TASK(b), NULL())), TASK(c), LOOPBACK(start))
//! ```
//!
//! Interior nodes are `SEQ`, `XOR`, `AND` (with an optional `[label]`) and `LOOP` (condition, body).
//! Leaves are `TASK`, `EVENT`, `NULL` and `LOOPBACK`; everything between a leaf's parentheses is
//! its label, so labels may contain commas and balanced parentheses. Whitespace and trailing
//! commas are ignored.
//!
//! A backslash takes the next character literally. The printer escapes backslashes, `]`,
//! unbalanced parentheses, a trailing comma and leading or trailing whitespace, so every label
//! survives printing and parsing:
//!
//! ```text
//! TASK(Task_1|Check \(optional)  XOR[Gateway_1|Done?\]](...)  TASK(Pack, ship\,)
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use thiserror::Error;

use super::Pst;
use crate::flow_graph::GatewayKind;

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {offset}")]
pub struct NotationError {
    pub message: String,
    pub offset: usize,
}

impl NotationError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

pub fn parse_pst(input: &str) -> Result<Pst, NotationError> {
    parse_pst_with_depth(input, DEFAULT_MAX_DEPTH)
}

/// Parse a tree, failing once nodes nest deeper than `max_depth`
pub fn parse_pst_with_depth(input: &str, max_depth: usize) -> Result<Pst, NotationError> {
    let mut parser = Parser {
        input,
        pos: 0,
        max_depth,
    };
    parser.skip_whitespace();
    let tree = parser.parse_node(1)?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(parser.error_here("unexpected input after tree"));
    }
    Ok(tree)
}

impl FromStr for Pst {
    type Err = NotationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_pst(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Seq,
    Xor,
    And,
    Loop,
    Task,
    Event,
    Null,
    Loopback,
}

impl Kind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "SEQ" => Some(Kind::Seq),
            "XOR" => Some(Kind::Xor),
            "AND" => Some(Kind::And),
            "LOOP" => Some(Kind::Loop),
            "TASK" => Some(Kind::Task),
            "EVENT" => Some(Kind::Event),
            "NULL" => Some(Kind::Null),
            "LOOPBACK" => Some(Kind::Loopback),
            _ => None,
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error_here(&self, message: impl Into<String>) -> NotationError {
        NotationError::new(message, self.pos)
    }

    fn expect(&mut self, expected: char) -> Result<(), NotationError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error_here(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error_here(format!("expected '{expected}', found end of input"))),
        }
    }

    fn parse_node(&mut self, depth: usize) -> Result<Pst, NotationError> {
        if depth > self.max_depth {
            return Err(self.error_here(format!("nesting deeper than {} levels", self.max_depth)));
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        let name = &self.input[start..self.pos];
        if name.is_empty() {
            return Err(self.error_here("expected node kind"));
        }
        let kind = Kind::from_name(name)
            .ok_or_else(|| NotationError::new(format!("unknown node kind '{name}'"), start))?;

        let label = if self.peek() == Some('[') {
            if !matches!(kind, Kind::Xor | Kind::And) {
                return Err(self.error_here("only XOR and AND nodes take a label"));
            }
            Some(self.parse_bracket_label()?)
        } else {
            None
        };

        self.skip_whitespace();
        self.expect('(')?;
        match kind {
            Kind::Task => Ok(Pst::Task(self.parse_leaf_label()?)),
            Kind::Event => Ok(Pst::Event(self.parse_leaf_label()?)),
            Kind::Loopback => Ok(Pst::Loopback(self.parse_leaf_label()?)),
            Kind::Null => {
                // The argument of NULL carries no meaning, e.g. NULL(None)
                self.parse_leaf_label()?;
                Ok(Pst::Null)
            }
            Kind::Seq | Kind::Xor | Kind::And | Kind::Loop => {
                let open = self.pos - 1;
                let children = self.parse_children(depth)?;
                if children.is_empty() {
                    return Err(NotationError::new(format!("{name} needs at least one child"), open));
                }
                match kind {
                    Kind::Seq => Ok(Pst::Sequence(children)),
                    Kind::Xor | Kind::And => Ok(Pst::Branch {
                        kind: if kind == Kind::Xor {
                            GatewayKind::Exclusive
                        } else {
                            GatewayKind::Parallel
                        },
                        label,
                        children,
                    }),
                    _ => {
                        let [condition, body]: [Pst; 2] = children.try_into().map_err(|_| {
                            NotationError::new("LOOP needs exactly two children", open)
                        })?;
                        Ok(Pst::Loop {
                            condition: Box::new(condition),
                            body: Box::new(body),
                        })
                    }
                }
            }
        }
    }

    /// Comma separated nodes up to and including the closing parenthesis
    fn parse_children(&mut self, depth: usize) -> Result<Vec<Pst>, NotationError> {
        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.bump();
                return Ok(children);
            }
            children.push(self.parse_node(depth + 1)?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {}
                Some(c) => return Err(self.error_here(format!("expected ',' or ')', found '{c}'"))),
                None => return Err(self.error_here("unclosed '('")),
            }
        }
    }

    /// Text up to the matching closing parenthesis, trimmed
    fn parse_leaf_label(&mut self) -> Result<String, NotationError> {
        let start = self.pos;
        let mut label = Vec::new();
        let mut open = 0usize;
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => label.push((c, true)),
                    None => break,
                },
                Some(')') if open == 0 => return Ok(finish_label(label, true)),
                Some(c) => {
                    match c {
                        '(' => open += 1,
                        ')' => open -= 1,
                        _ => {}
                    }
                    label.push((c, false));
                }
                None => break,
            }
        }
        Err(NotationError::new("unclosed '('", start - 1))
    }

    fn parse_bracket_label(&mut self) -> Result<String, NotationError> {
        let open = self.pos;
        self.bump();
        let mut label = Vec::new();
        while let Some(c) = self.bump() {
            match c {
                '\\' => match self.bump() {
                    Some(c) => label.push((c, true)),
                    None => break,
                },
                ']' => return Ok(finish_label(label, false)),
                c => label.push((c, false)),
            }
        }
        Err(NotationError::new("unclosed '['", open))
    }
}

/// Characters are paired with whether they were escaped; only unescaped ones are trimmed
fn finish_label(mut label: Vec<(char, bool)>, strip_comma: bool) -> String {
    fn blank(&(c, escaped): &(char, bool)) -> bool {
        !escaped && c.is_whitespace()
    }

    while label.last().is_some_and(blank) {
        label.pop();
    }
    if strip_comma && label.last() == Some(&(',', false)) {
        label.pop();
        while label.last().is_some_and(blank) {
            label.pop();
        }
    }
    label.into_iter().skip_while(blank).map(|(c, _)| c).collect()
}

/// Escape what `finish_label` would otherwise trim or the parser would read as structure
fn escape_label(label: &str) -> String {
    let chars: Vec<char> = label.chars().collect();
    let mut escape = vec![false; chars.len()];
    let mut open = Vec::new();
    for (i, c) in chars.iter().enumerate() {
        match *c {
            '\\' | ']' => escape[i] = true,
            '(' => open.push(i),
            ')' => escape[i] = open.pop().is_none(),
            _ => {}
        }
    }
    for i in open {
        escape[i] = true;
    }
    for (i, _) in chars.iter().enumerate().take_while(|(_, c)| c.is_whitespace()) {
        escape[i] = true;
    }
    let mut end = chars.len();
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
        escape[end] = true;
    }
    if end > 0 && chars[end - 1] == ',' {
        escape[end - 1] = true;
    }

    let mut escaped = String::with_capacity(label.len());
    for (c, escape) in chars.into_iter().zip(escape) {
        if escape {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `{}` prints a tree on one line, `{:#}` prints one node per line with two-space indentation
impl Display for Pst {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let indent = if f.alternate() { Some(0) } else { None };
        write_node(f, self, indent)
    }
}

fn write_node(f: &mut Formatter<'_>, node: &Pst, indent: Option<usize>) -> FmtResult {
    let (name, label, children): (&str, Option<&str>, Vec<&Pst>) = match node {
        Pst::Task(label) => return write!(f, "TASK({})", escape_label(label)),
        Pst::Event(label) => return write!(f, "EVENT({})", escape_label(label)),
        Pst::Loopback(label) => return write!(f, "LOOPBACK({})", escape_label(label)),
        Pst::Null => return write!(f, "NULL()"),
        Pst::Sequence(children) => ("SEQ", None, children.iter().collect()),
        Pst::Branch { kind, label, children } => {
            let name = match kind {
                GatewayKind::Exclusive => "XOR",
                GatewayKind::Parallel => "AND",
            };
            (name, label.as_deref(), children.iter().collect())
        }
        Pst::Loop { condition, body } => ("LOOP", None, vec![condition.as_ref(), body.as_ref()]),
    };

    write!(f, "{name}")?;
    if let Some(label) = label {
        write!(f, "[{}]", escape_label(label))?;
    }
    write!(f, "(")?;
    match indent {
        Some(level) => {
            writeln!(f)?;
            for child in children {
                write!(f, "{:width$}", "", width = (level + 1) * 2)?;
                write_node(f, child, Some(level + 1))?;
                writeln!(f, ",")?;
            }
            write!(f, "{:width$})", "", width = level * 2)
        }
        None => {
            for (i, child) in children.into_iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_node(f, child, None)?;
            }
            write!(f, ")")
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Pst {
        Pst::Sequence(vec![
            Pst::Event("StartEvent_1|Order received".into()),
            Pst::Branch {
                kind: GatewayKind::Exclusive,
                label: Some("Gateway_1|In stock?".into()),
                children: vec![
                    Pst::Task("Task_1|Ship (express), today".into()),
                    Pst::Loop {
                        condition: Box::new(Pst::Task("Task_2".into())),
                        body: Box::new(Pst::Null),
                    },
                ],
            },
            Pst::Branch {
                kind: GatewayKind::Parallel,
                label: None,
                children: vec![Pst::Task("a".into()), Pst::Task("b".into())],
            },
            Pst::Loopback("StartEvent_1|Order received".into()),
        ])
    }

    #[test]
    fn test_compact_form() {
        let text = sample().to_string();
        assert_eq!(
            text,
            "SEQ(EVENT(StartEvent_1|Order received), XOR[Gateway_1|In stock?](TASK(Task_1|Ship (express), today), \
             LOOP(TASK(Task_2), NULL())), AND(TASK(a), TASK(b)), LOOPBACK(StartEvent_1|Order received))"
        );
        assert_eq!(parse_pst(&text).unwrap(), sample());
    }

    #[test]
    fn test_pretty_form_round_trips() {
        let text = format!("{:#}", sample());
        assert!(text.starts_with("SEQ(\n  EVENT(StartEvent_1|Order received),\n  XOR[Gateway_1|In stock?](\n    TASK("));
        assert!(text.ends_with("\n)"));
        assert_eq!(text.parse::<Pst>().unwrap(), sample());
    }

    #[test]
    fn test_accepts_legacy_null_and_trailing_commas() {
        let tree = parse_pst("SEQ(\n  TASK(a),\n  NULL(None),\n  XOR(\n    TASK(b),\n  ),\n)").unwrap();
        assert_eq!(
            tree,
            Pst::Sequence(vec![
                Pst::Task("a".into()),
                Pst::Null,
                Pst::Branch {
                    kind: GatewayKind::Exclusive,
                    label: None,
                    children: vec![Pst::Task("b".into())],
                },
            ])
        );
    }

    #[test]
    fn test_labels_with_notation_characters_round_trip() {
        let labels = [
            "Task_1|Step 1)",
            "Task_2|Check (optional",
            "Pack, ship,",
            r"Archive to C:\orders\",
            "a) (b",
            " padded ",
            "Gateway_1|[draft] ok?",
            "",
        ];
        for label in labels {
            let tree = Pst::Sequence(vec![
                Pst::Event(label.into()),
                Pst::Branch {
                    kind: GatewayKind::Exclusive,
                    label: Some(label.into()),
                    children: vec![Pst::Task(label.into()), Pst::Task("b".into())],
                },
                Pst::Loopback(label.into()),
            ]);
            assert_eq!(parse_pst(&tree.to_string()).unwrap(), tree, "compact form of {label:?}");
            assert_eq!(parse_pst(&format!("{tree:#}")).unwrap(), tree, "pretty form of {label:?}");
        }
    }

    #[test]
    fn test_only_ambiguous_characters_are_escaped() {
        assert_eq!(Pst::Task("Task_1|Step 1)".into()).to_string(), r"TASK(Task_1|Step 1\))");
        assert_eq!(Pst::Task("Check (optional".into()).to_string(), r"TASK(Check \(optional)");
        assert_eq!(Pst::Task("Pack, ship,".into()).to_string(), r"TASK(Pack, ship\,)");
        assert_eq!(Pst::Task("Ship (express)".into()).to_string(), "TASK(Ship (express))");
        let branch = Pst::Branch {
            kind: GatewayKind::Parallel,
            label: Some("Split]".into()),
            children: vec![Pst::Null],
        };
        assert_eq!(branch.to_string(), r"AND[Split\]](NULL())");

        assert_eq!(parse_pst(r"TASK(a\)\\b)").unwrap(), Pst::Task(r"a)\b".into()));
        assert_eq!(parse_pst(r"TASK(a\").unwrap_err().message, "unclosed '('");
    }

    #[test]
    fn test_error_offsets() {
        let err = parse_pst("SEQ(TASK(a), FOO(b))").unwrap_err();
        assert_eq!(err.offset, 13);
        assert!(err.message.contains("FOO"));

        let err = parse_pst("SEQ(TASK(a) TASK(b))").unwrap_err();
        assert_eq!(err.offset, 12);

        let err = parse_pst("SEQ(TASK(a)").unwrap_err();
        assert_eq!(err.message, "unclosed '('");

        let err = parse_pst("TASK(a").unwrap_err();
        assert_eq!(err.offset, 4);

        let err = parse_pst("TASK(a) extra").unwrap_err();
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse_pst("SEQ()").unwrap_err().message.contains("at least one child"));
        assert!(parse_pst("LOOP(TASK(a))").unwrap_err().message.contains("exactly two"));
        assert!(parse_pst("SEQ[x](TASK(a))").unwrap_err().message.contains("label"));
        assert!(parse_pst("").unwrap_err().message.contains("node kind"));
    }

    #[test]
    fn test_depth_limit() {
        let deep = "SEQ(".repeat(10) + "TASK(a)" + &")".repeat(10);
        assert!(parse_pst_with_depth(&deep, 11).is_ok());
        let err = parse_pst_with_depth(&deep, 5).unwrap_err();
        assert!(err.message.contains("nesting deeper than 5"));
    }
}
