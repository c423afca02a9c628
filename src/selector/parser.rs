//! Selector text -> [`Matcher`] compiler
//!
//! Grammar:
//!
//! ```text
//! selector  := alt (',' alt)*
//! alt       := compound ('>' compound)*
//! compound  := (name | '*')? attr*          at least one part
//! attr      := '[' path (op value)? ']'
//! path      := ident ('.' ident)*
//! op        := '=' | '!=' | '>' | '<' | '>=' | '<='
//! value     := string | number | regex | 'true' | 'false' | 'null' | ident
//! ```

use super::{
    AttributePredicate, AttributeTest, CompareOp, Literal, Matcher, SelectorError,
    SelectorErrorKind,
};
use regex::RegexBuilder;
use std::collections::BTreeSet;

pub(super) fn parse(text: &str) -> Result<Matcher, SelectorError> {
    let mut parser = Parser {
        text,
        chars: text.char_indices().collect(),
        pos: 0,
    };
    parser.selector()
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn selector(&mut self) -> Result<Matcher, SelectorError> {
        let mut alts = vec![self.alternative()?];
        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.bump();
                    alts.push(self.alternative()?);
                }
                Some(']') => {
                    return Err(self.error(SelectorErrorKind::UnbalancedBracket, "unbalanced `]`"))
                }
                Some(c) => {
                    return Err(self.error(
                        SelectorErrorKind::Unexpected,
                        &format!("unexpected `{}`", c),
                    ))
                }
            }
        }

        if alts.len() == 1 {
            return Ok(alts.remove(0));
        }

        // A plain type list collapses into a single type test
        if alts.iter().all(|m| matches!(m, Matcher::Type(_))) {
            let mut types = BTreeSet::new();
            for alt in alts {
                if let Matcher::Type(t) = alt {
                    types.extend(t);
                }
            }
            return Ok(Matcher::Type(types));
        }

        Ok(Matcher::Alternation(alts))
    }

    fn alternative(&mut self) -> Result<Matcher, SelectorError> {
        self.skip_ws();
        let mut current = self.compound()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            if self.peek() == Some('>') {
                self.bump();
                self.skip_ws();
                let child = self.compound()?;
                current = Matcher::Child {
                    parent: Box::new(current),
                    child: Box::new(child),
                };
            } else {
                self.pos = save;
                return Ok(current);
            }
        }
    }

    fn compound(&mut self) -> Result<Matcher, SelectorError> {
        let mut parts = Vec::new();

        match self.peek() {
            Some('*') => {
                self.bump();
                parts.push(Matcher::Any);
            }
            Some(c) if is_ident_start(c) => {
                let name = self.ident();
                parts.push(Matcher::Type(BTreeSet::from([name])));
            }
            _ => {}
        }

        while self.peek() == Some('[') {
            parts.push(Matcher::Attribute(self.attribute()?));
        }

        match parts.len() {
            0 => match self.peek() {
                Some(']') => Err(self.error(SelectorErrorKind::UnbalancedBracket, "unbalanced `]`")),
                Some(c) if !matches!(c, ',' | '>') => Err(self.error(
                    SelectorErrorKind::Unexpected,
                    &format!("unexpected `{}`", c),
                )),
                _ => Err(self.error(
                    SelectorErrorKind::EmptyAlternative,
                    "expected a node type, `*` or `[`",
                )),
            },
            1 => Ok(parts.remove(0)),
            _ => Ok(Matcher::Compound(parts)),
        }
    }

    fn attribute(&mut self) -> Result<AttributePredicate, SelectorError> {
        let open = self.pos;
        self.bump(); // '['
        self.skip_ws();

        let path = self.path()?;
        self.skip_ws();

        let test = match self.peek() {
            Some(']') => AttributeTest::Exists,
            None => {
                self.pos = open;
                return Err(self.error(
                    SelectorErrorKind::UnbalancedBracket,
                    "unterminated attribute selector",
                ));
            }
            Some(_) => {
                let op_pos = self.pos;
                let op = self.operator()?;
                self.skip_ws();
                let value_pos = self.pos;
                let test = match self.peek() {
                    Some('/') => {
                        let regex = self.regex()?;
                        let negated = match op {
                            CompareOp::Eq => false,
                            CompareOp::Ne => true,
                            _ => {
                                self.pos = op_pos;
                                return Err(self.error(
                                    SelectorErrorKind::UnknownOperator,
                                    &format!("operator `{}` cannot be used with a regex", op),
                                ));
                            }
                        };
                        AttributeTest::Regex { negated, regex }
                    }
                    _ => {
                        let literal = self.literal()?;
                        if !matches!(op, CompareOp::Eq | CompareOp::Ne)
                            && !matches!(literal, Literal::Number(_))
                        {
                            self.pos = value_pos;
                            return Err(self.error(
                                SelectorErrorKind::InvalidValue,
                                &format!("operator `{}` requires a number", op),
                            ));
                        }
                        AttributeTest::Compare(op, literal)
                    }
                };
                self.skip_ws();
                test
            }
        };

        match self.peek() {
            Some(']') => {
                self.bump();
                Ok(AttributePredicate { path, test })
            }
            None => {
                self.pos = open;
                Err(self.error(
                    SelectorErrorKind::UnbalancedBracket,
                    "unterminated attribute selector",
                ))
            }
            Some(c) => Err(self.error(
                SelectorErrorKind::Unexpected,
                &format!("expected `]`, found `{}`", c),
            )),
        }
    }

    fn path(&mut self) -> Result<Vec<String>, SelectorError> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(c) if is_ident_char(c) => segments.push(self.ident()),
                _ => {
                    return Err(self.error(
                        SelectorErrorKind::InvalidValue,
                        "expected an attribute name",
                    ))
                }
            }
            if self.peek() == Some('.') {
                self.bump();
            } else {
                return Ok(segments);
            }
        }
    }

    fn operator(&mut self) -> Result<CompareOp, SelectorError> {
        let start = self.pos;
        let op = match self.peek() {
            Some('=') => {
                self.bump();
                CompareOp::Eq
            }
            Some('!') if self.peek_at(1) == Some('=') => {
                self.pos += 2;
                CompareOp::Ne
            }
            Some('>') | Some('<') => {
                let greater = self.peek() == Some('>');
                self.bump();
                let or_equal = self.peek() == Some('=');
                if or_equal {
                    self.bump();
                }
                match (greater, or_equal) {
                    (true, false) => CompareOp::Gt,
                    (true, true) => CompareOp::Ge,
                    (false, false) => CompareOp::Lt,
                    (false, true) => CompareOp::Le,
                }
            }
            _ => {
                let op: String = self.take_while(is_operator_char);
                self.pos = start;
                let shown = if op.is_empty() {
                    self.peek().map(String::from).unwrap_or_default()
                } else {
                    op
                };
                return Err(self.error(
                    SelectorErrorKind::UnknownOperator,
                    &format!("unknown operator `{}`", shown),
                ));
            }
        };

        // `==`, `=>`, `!==`, `<>` and friends
        if self.peek().is_some_and(is_operator_char) {
            self.take_while(is_operator_char);
            let full = self.text[self.offset_of(start)..self.offset_of(self.pos)].to_string();
            self.pos = start;
            return Err(self.error(
                SelectorErrorKind::UnknownOperator,
                &format!("unknown operator `{}`", full),
            ));
        }

        Ok(op)
    }

    fn literal(&mut self) -> Result<Literal, SelectorError> {
        match self.peek() {
            Some(q @ ('\'' | '"')) => self.string(q).map(Literal::String),
            Some(c) if c.is_ascii_digit() || (c == '-' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) => {
                self.number()
            }
            Some(c) if is_ident_start(c) => {
                let word = self.ident();
                Ok(match word.as_str() {
                    "true" => Literal::Bool(true),
                    "false" => Literal::Bool(false),
                    "null" => Literal::Null,
                    _ => Literal::String(word),
                })
            }
            _ => Err(self.error(SelectorErrorKind::InvalidValue, "expected a value")),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, SelectorError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    self.pos = start;
                    return Err(self.error(SelectorErrorKind::InvalidValue, "unterminated string"));
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some(c) => {
                            out.push(c);
                            self.bump();
                        }
                        None => {
                            self.pos = start;
                            return Err(self.error(SelectorErrorKind::InvalidValue, "unterminated string"));
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.bump();
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
    }

    fn number(&mut self) -> Result<Literal, SelectorError> {
        let start = self.pos;
        let mut digits = String::new();
        if self.peek() == Some('-') {
            digits.push('-');
            self.bump();
        }
        // Take the whole word so `1e3` parses and `1px` fails at the literal
        let word = |c: char| c.is_ascii_alphanumeric() || c == '.';
        digits.push_str(&self.take_while(word));
        if digits.ends_with(['e', 'E']) {
            if let Some(sign @ ('+' | '-')) = self.peek() {
                digits.push(sign);
                self.bump();
                digits.push_str(&self.take_while(word));
            }
        }
        digits.parse::<f64>().map(Literal::Number).map_err(|_| {
            self.pos = start;
            self.error(
                SelectorErrorKind::InvalidValue,
                &format!("invalid number `{}`", digits),
            )
        })
    }

    fn regex(&mut self) -> Result<regex::Regex, SelectorError> {
        let start = self.pos;
        self.bump(); // '/'
        let mut pattern = String::new();
        loop {
            match self.peek() {
                None => {
                    self.pos = start;
                    return Err(self.error(SelectorErrorKind::InvalidValue, "unterminated regex"));
                }
                Some('\\') if self.peek_at(1) == Some('/') => {
                    pattern.push('/');
                    self.pos += 2;
                }
                Some('\\') => {
                    pattern.push('\\');
                    self.bump();
                    if let Some(c) = self.peek() {
                        pattern.push(c);
                        self.bump();
                    }
                }
                Some('/') => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    pattern.push(c);
                    self.bump();
                }
            }
        }

        let mut builder = RegexBuilder::new(&pattern);
        while let Some(flag) = self.peek().filter(|c| c.is_ascii_alphabetic()) {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'u' => builder.unicode(true),
                _ => {
                    return Err(self.error(
                        SelectorErrorKind::InvalidValue,
                        &format!("unsupported regex flag `{}`", flag),
                    ))
                }
            };
            self.bump();
        }

        builder.build().map_err(|e| {
            self.pos = start;
            self.error(SelectorErrorKind::InvalidValue, &format!("invalid regex: {}", e))
        })
    }

    fn ident(&mut self) -> String {
        self.take_while(is_ident_char)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            out.push(c);
            self.bump();
        }
        out
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    /// Byte offset of the char at index `pos`
    fn offset_of(&self, pos: usize) -> usize {
        self.chars.get(pos).map(|(i, _)| *i).unwrap_or(self.text.len())
    }

    fn error(&self, kind: SelectorErrorKind, message: &str) -> SelectorError {
        SelectorError {
            selector: self.text.to_string(),
            offset: self.offset_of(self.pos),
            kind,
            message: message.to_string(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>' | '~' | '^' | '*' | '|')
}
