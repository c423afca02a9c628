//! Shared fixtures for integration tests: a small JavaScript/TypeScript
//! subset parser and a few ready-made rules.
//!
//! Supported syntax: `var`/`let`/`const` declarations, `return`, classes
//! with methods, function expressions, `new` / call / member expressions,
//! array literals, identifiers, numbers, strings, `interface` declarations
//! and `type` aliases with object type literals.

#![allow(dead_code)]

use thaw::{
    NodeId, ParseError, Parsed, RuleHandler, TextEdit, TextRange, TreeBuilder, Value,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parse `text` with the subset parser
pub fn parse_js(text: &str) -> Result<Parsed, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = JsParser {
        text,
        tokens,
        pos: 0,
        builder: TreeBuilder::new(text),
    };
    let root = parser.program()?;
    Ok(parser.builder.finish(root)?.into())
}

/// `new Array(a, b)` -> `[a, b]`
pub fn no_array_constructor() -> RuleHandler {
    RuleHandler::new("no-array-constructor", "NewExpression[callee.name='Array']")
        .expect("valid selector")
        .on_enter(|node, ctx| {
            let args: Vec<&str> = node.children("arguments").iter().map(|a| a.text()).collect();
            let replacement = format!("[{}]", args.join(", "));
            ctx.report_with_fix(
                node,
                "The array literal notation [] is preferable.",
                [TextEdit::replace(node, replacement)],
            );
        })
}

/// Rewrites every identifier named `from` to `to`
pub fn rename(rule_id: &str, from: &str, to: &str) -> RuleHandler {
    let to = to.to_string();
    RuleHandler::new(rule_id, &format!("Identifier[name='{}']", from))
        .expect("valid selector")
        .on_enter(move |node, ctx| {
            ctx.report_with_fix(node, "rename", [TextEdit::replace(node, to.clone())]);
        })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Ident,
    Number,
    Str,
    Punct(char),
}

#[derive(Debug, Clone, Copy)]
struct Token {
    tok: Tok,
    start: usize,
    end: usize,
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c == '/' && matches!(chars.peek(), Some((_, '/'))) {
            while let Some(&(_, c)) = chars.peek() {
                if c == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }

        let tok = if c.is_alphabetic() || c == '_' || c == '$' {
            while chars
                .peek()
                .is_some_and(|&(_, c)| c.is_alphanumeric() || c == '_' || c == '$')
            {
                chars.next();
            }
            Tok::Ident
        } else if c.is_ascii_digit() {
            while chars
                .peek()
                .is_some_and(|&(_, c)| c.is_ascii_digit() || c == '.')
            {
                chars.next();
            }
            Tok::Number
        } else if c == '\'' || c == '"' {
            let mut closed = false;
            while let Some((_, next)) = chars.next() {
                if next == '\\' {
                    chars.next();
                } else if next == c {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(ParseError::syntax(start, "unterminated string"));
            }
            Tok::Str
        } else if "{}()[];,.:=<>|&+-*/!?".contains(c) {
            Tok::Punct(c)
        } else {
            return Err(ParseError::syntax(start, format!("unexpected character `{}`", c)));
        };

        let end = chars.peek().map_or(text.len(), |&(i, _)| i);
        tokens.push(Token { tok, start, end });
    }

    Ok(tokens)
}

/// A built node and its range
#[derive(Debug, Clone, Copy)]
struct Built {
    id: NodeId,
    start: usize,
    end: usize,
}

struct JsParser<'t> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
    builder: TreeBuilder,
}

impl<'t> JsParser<'t> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<Token> {
        self.tokens.get(self.pos + offset).copied()
    }

    fn slice(&self, token: Token) -> &'t str {
        &self.text[token.start..token.end]
    }

    fn is_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.tok == Tok::Punct(c))
    }

    fn is_word(&self, word: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.tok == Tok::Ident && self.slice(t) == word)
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        let token = self.peek().ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat_punct(&mut self, c: char) -> Option<Token> {
        if self.is_punct(c) {
            self.pos += 1;
            self.tokens.get(self.pos - 1).copied()
        } else {
            None
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<Token, ParseError> {
        self.eat_punct(c)
            .ok_or_else(|| self.error(&format!("expected `{}`", c)))
    }

    fn error(&self, message: &str) -> ParseError {
        let offset = self.peek().map_or(self.text.len(), |t| t.start);
        ParseError::syntax(offset, message)
    }

    fn node(&mut self, kind: &str, start: usize, end: usize) -> Built {
        let id = self.builder.node(kind, start..end);
        Built { id, start, end }
    }

    fn set_child(&mut self, parent: Built, name: &str, child: Built) -> Result<(), ParseError> {
        Ok(self.builder.set_child(parent.id, name, child.id)?)
    }

    fn set_optional(
        &mut self,
        parent: Built,
        name: &str,
        child: Option<Built>,
    ) -> Result<(), ParseError> {
        match child {
            Some(child) => self.set_child(parent, name, child),
            None => Ok(self.builder.set(parent.id, name, Value::Null)?),
        }
    }

    fn set_list(&mut self, parent: Built, name: &str, items: &[Built]) -> Result<(), ParseError> {
        self.builder.set_list(parent.id, name)?;
        for item in items {
            self.builder.push_child(parent.id, name, item.id)?;
        }
        Ok(())
    }

    fn set(&mut self, parent: Built, name: &str, value: impl Into<Value>) -> Result<(), ParseError> {
        Ok(self.builder.set(parent.id, name, value)?)
    }

    fn program(&mut self) -> Result<NodeId, ParseError> {
        let mut body = Vec::new();
        while self.peek().is_some() {
            if self.eat_punct(';').is_some() {
                continue;
            }
            body.push(self.statement()?);
        }
        let program = self.node("Program", 0, self.text.len());
        self.set(program, "sourceType", "module")?;
        self.set_list(program, "body", &body)?;
        Ok(program.id)
    }

    fn statement(&mut self) -> Result<Built, ParseError> {
        if self.is_word("class") {
            return self.class("ClassDeclaration");
        }
        if self.is_word("interface") {
            return self.interface();
        }
        if self.is_word("type") && self.peek_at(1).is_some_and(|t| t.tok == Tok::Ident) {
            return self.type_alias();
        }
        if self.is_word("var") || self.is_word("let") || self.is_word("const") {
            return self.variable_declaration();
        }
        if self.is_word("return") {
            let keyword = self.bump()?;
            let argument = if self.is_punct(';') || self.is_punct('}') || self.peek().is_none() {
                None
            } else {
                Some(self.expression()?)
            };
            let end = argument.map_or(keyword.end, |a| a.end);
            let end = self.eat_punct(';').map_or(end, |t| t.end);
            let stmt = self.node("ReturnStatement", keyword.start, end);
            self.set_optional(stmt, "argument", argument)?;
            return Ok(stmt);
        }

        let expression = self.expression()?;
        let end = self.eat_punct(';').map_or(expression.end, |t| t.end);
        let stmt = self.node("ExpressionStatement", expression.start, end);
        self.set_child(stmt, "expression", expression)?;
        Ok(stmt)
    }

    fn variable_declaration(&mut self) -> Result<Built, ParseError> {
        let keyword = self.bump()?;
        let kind = self.slice(keyword);
        let mut declarations = Vec::new();
        loop {
            let id = self.identifier()?;
            let init = if self.eat_punct('=').is_some() {
                Some(self.expression()?)
            } else {
                None
            };
            let declarator = self.node("VariableDeclarator", id.start, init.map_or(id.end, |i| i.end));
            self.set_child(declarator, "id", id)?;
            self.set_optional(declarator, "init", init)?;
            declarations.push(declarator);
            if self.eat_punct(',').is_none() {
                break;
            }
        }
        let last = declarations.last().map_or(keyword.end, |d| d.end);
        let end = self.eat_punct(';').map_or(last, |t| t.end);
        let decl = self.node("VariableDeclaration", keyword.start, end);
        self.set(decl, "kind", kind)?;
        self.set_list(decl, "declarations", &declarations)?;
        Ok(decl)
    }

    fn class(&mut self, kind: &str) -> Result<Built, ParseError> {
        let keyword = self.bump()?;
        let id = match self.peek() {
            Some(t) if t.tok == Tok::Ident => Some(self.identifier()?),
            _ => None,
        };
        let open = self.expect_punct('{')?;
        let mut methods = Vec::new();
        while self.eat_punct('}').is_none() {
            if self.eat_punct(';').is_some() {
                continue;
            }
            methods.push(self.method()?);
        }
        let close = self.tokens[self.pos - 1];

        let body = self.node("ClassBody", open.start, close.end);
        self.set_list(body, "body", &methods)?;
        let class = self.node(kind, keyword.start, close.end);
        self.set_optional(class, "id", id)?;
        self.set(class, "superClass", Value::Null)?;
        self.set_child(class, "body", body)?;
        Ok(class)
    }

    fn method(&mut self) -> Result<Built, ParseError> {
        let key = self.identifier()?;
        let name = self.slice(self.tokens[self.pos - 1]);
        let start = self.peek().map_or(key.end, |t| t.start);
        let value = self.function_rest(start, None)?;

        let method = self.node("MethodDefinition", key.start, value.end);
        self.set_child(method, "key", key)?;
        self.set_child(method, "value", value)?;
        let kind = if name == "constructor" { "constructor" } else { "method" };
        self.set(method, "kind", kind)?;
        self.set(method, "static", false)?;
        self.set(method, "computed", false)?;
        Ok(method)
    }

    /// Parameters and body of a function starting at `start`
    fn function_rest(&mut self, start: usize, id: Option<Built>) -> Result<Built, ParseError> {
        self.expect_punct('(')?;
        let mut params = Vec::new();
        while self.eat_punct(')').is_none() {
            params.push(self.identifier()?);
            if !self.is_punct(')') {
                self.expect_punct(',')?;
            }
        }
        let body = self.block()?;

        let function = self.node("FunctionExpression", start, body.end);
        self.set_optional(function, "id", id)?;
        self.set_list(function, "params", &params)?;
        self.set_child(function, "body", body)?;
        self.set(function, "generator", false)?;
        self.set(function, "async", false)?;
        Ok(function)
    }

    fn block(&mut self) -> Result<Built, ParseError> {
        let open = self.expect_punct('{')?;
        let mut body = Vec::new();
        let close = loop {
            if let Some(close) = self.eat_punct('}') {
                break close;
            }
            if self.eat_punct(';').is_some() {
                continue;
            }
            body.push(self.statement()?);
        };
        let block = self.node("BlockStatement", open.start, close.end);
        self.set_list(block, "body", &body)?;
        Ok(block)
    }

    fn interface(&mut self) -> Result<Built, ParseError> {
        let keyword = self.bump()?;
        let id = self.identifier()?;
        let body = self.type_members("TSInterfaceBody", "body")?;
        let decl = self.node("TSInterfaceDeclaration", keyword.start, body.end);
        self.set_child(decl, "id", id)?;
        self.set_list(decl, "extends", &[])?;
        self.set_child(decl, "body", body)?;
        Ok(decl)
    }

    fn type_alias(&mut self) -> Result<Built, ParseError> {
        let keyword = self.bump()?;
        let id = self.identifier()?;
        self.expect_punct('=')?;
        let annotation = self.type_node()?;
        let end = self.eat_punct(';').map_or(annotation.end, |t| t.end);
        let decl = self.node("TSTypeAliasDeclaration", keyword.start, end);
        self.set_child(decl, "id", id)?;
        self.set_child(decl, "typeAnnotation", annotation)?;
        Ok(decl)
    }

    /// `{ a: T; b(): T }` as a node of `kind` holding members in `field`
    fn type_members(&mut self, kind: &str, field: &str) -> Result<Built, ParseError> {
        let open = self.expect_punct('{')?;
        let mut members = Vec::new();
        let close = loop {
            if let Some(close) = self.eat_punct('}') {
                break close;
            }
            if self.eat_punct(';').is_some() || self.eat_punct(',').is_some() {
                continue;
            }
            members.push(self.type_member()?);
        };
        let node = self.node(kind, open.start, close.end);
        self.set_list(node, field, &members)?;
        Ok(node)
    }

    fn type_member(&mut self) -> Result<Built, ParseError> {
        let key = self.identifier()?;
        if self.is_punct('(') {
            self.bump()?;
            self.expect_punct(')')?;
            let return_type = self.type_annotation()?;
            let member = self.node("TSMethodSignature", key.start, return_type.end);
            self.set_child(member, "key", key)?;
            self.set_list(member, "params", &[])?;
            self.set_child(member, "returnType", return_type)?;
            return Ok(member);
        }
        let annotation = self.type_annotation()?;
        let member = self.node("TSPropertySignature", key.start, annotation.end);
        self.set_child(member, "key", key)?;
        self.set_child(member, "typeAnnotation", annotation)?;
        Ok(member)
    }

    fn type_annotation(&mut self) -> Result<Built, ParseError> {
        let colon = self.expect_punct(':')?;
        let inner = self.type_node()?;
        let annotation = self.node("TSTypeAnnotation", colon.start, inner.end);
        self.set_child(annotation, "typeAnnotation", inner)?;
        Ok(annotation)
    }

    fn type_node(&mut self) -> Result<Built, ParseError> {
        if self.is_punct('{') {
            return self.type_members("TSTypeLiteral", "members");
        }
        let token = self.peek().ok_or_else(|| self.error("expected a type"))?;
        let keyword = match self.slice(token) {
            "string" => Some("TSStringKeyword"),
            "number" => Some("TSNumberKeyword"),
            "void" => Some("TSVoidKeyword"),
            "any" => Some("TSAnyKeyword"),
            _ => None,
        };
        match keyword {
            Some(kind) => {
                self.bump()?;
                Ok(self.node(kind, token.start, token.end))
            }
            None => {
                let name = self.identifier()?;
                let reference = self.node("TSTypeReference", name.start, name.end);
                self.set_child(reference, "typeName", name)?;
                Ok(reference)
            }
        }
    }

    fn identifier(&mut self) -> Result<Built, ParseError> {
        match self.peek() {
            Some(token) if token.tok == Tok::Ident => {
                self.pos += 1;
                let id = self.node("Identifier", token.start, token.end);
                self.set(id, "name", self.slice(token))?;
                Ok(id)
            }
            _ => Err(self.error("expected an identifier")),
        }
    }

    fn expression(&mut self) -> Result<Built, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct('.').is_some() {
                let property = self.identifier()?;
                let member = self.node("MemberExpression", expr.start, property.end);
                self.set_child(member, "object", expr)?;
                self.set_child(member, "property", property)?;
                self.set(member, "computed", false)?;
                expr = member;
            } else if self.is_punct('(') {
                let (arguments, end) = self.arguments()?;
                let call = self.node("CallExpression", expr.start, end);
                self.set_child(call, "callee", expr)?;
                self.set_list(call, "arguments", &arguments)?;
                self.set(call, "optional", false)?;
                expr = call;
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<(Vec<Built>, usize), ParseError> {
        self.expect_punct('(')?;
        let mut arguments = Vec::new();
        let close = loop {
            if let Some(close) = self.eat_punct(')') {
                break close;
            }
            arguments.push(self.expression()?);
            if !self.is_punct(')') {
                self.expect_punct(',')?;
            }
        };
        Ok((arguments, close.end))
    }

    fn primary(&mut self) -> Result<Built, ParseError> {
        let token = self.peek().ok_or_else(|| self.error("expected an expression"))?;
        match token.tok {
            Tok::Number => {
                self.bump()?;
                let raw = self.slice(token);
                let value: f64 = raw
                    .parse()
                    .map_err(|_| ParseError::syntax(token.start, "invalid number"))?;
                self.literal(token, value)
            }
            Tok::Str => {
                self.bump()?;
                let raw = self.slice(token);
                let value = raw[1..raw.len() - 1].to_string();
                self.literal(token, value)
            }
            Tok::Ident => match self.slice(token) {
                "new" => self.new_expression(),
                "function" => {
                    self.bump()?;
                    let id = match self.peek() {
                        Some(t) if t.tok == Tok::Ident => Some(self.identifier()?),
                        _ => None,
                    };
                    self.function_rest(token.start, id)
                }
                "class" => self.class("ClassExpression"),
                "true" | "false" => {
                    self.bump()?;
                    self.literal(token, self.slice(token) == "true")
                }
                "null" => {
                    self.bump()?;
                    self.literal(token, Value::Null)
                }
                _ => self.identifier(),
            },
            Tok::Punct('[') => {
                self.bump()?;
                let mut elements = Vec::new();
                let close = loop {
                    if let Some(close) = self.eat_punct(']') {
                        break close;
                    }
                    elements.push(self.expression()?);
                    if !self.is_punct(']') {
                        self.expect_punct(',')?;
                    }
                };
                let array = self.node("ArrayExpression", token.start, close.end);
                self.set_list(array, "elements", &elements)?;
                Ok(array)
            }
            Tok::Punct('(') => {
                self.bump()?;
                let inner = self.expression()?;
                self.expect_punct(')')?;
                Ok(inner)
            }
            Tok::Punct(c) => Err(self.error(&format!("unexpected `{}`", c))),
        }
    }

    fn literal(&mut self, token: Token, value: impl Into<Value>) -> Result<Built, ParseError> {
        let literal = self.node("Literal", token.start, token.end);
        self.set(literal, "value", value)?;
        self.set(literal, "raw", self.slice(token))?;
        Ok(literal)
    }

    fn new_expression(&mut self) -> Result<Built, ParseError> {
        let keyword = self.bump()?;
        let mut callee = self.identifier()?;
        while self.eat_punct('.').is_some() {
            let property = self.identifier()?;
            let member = self.node("MemberExpression", callee.start, property.end);
            self.set_child(member, "object", callee)?;
            self.set_child(member, "property", property)?;
            self.set(member, "computed", false)?;
            callee = member;
        }
        let (arguments, end) = if self.is_punct('(') {
            self.arguments()?
        } else {
            (Vec::new(), callee.end)
        };
        let expr = self.node("NewExpression", keyword.start, end);
        self.set_child(expr, "callee", callee)?;
        self.set_list(expr, "arguments", &arguments)?;
        Ok(expr)
    }
}

/// Range helper for hand-written expectations
pub fn range(start: usize, end: usize) -> TextRange {
    TextRange::new(start, end)
}
