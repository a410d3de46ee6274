//! Named and optional parameters for "star" functions.
//!
//! A star function declares its parameters in a small list syntax:
//!
//! ```text
//! a (b 2) (label "none") :rest more
//! ```
//!
//! Each parameter may be passed by position or as a `:name value` pair, in
//! any mix. A parameter that receives nothing takes its default: the literal
//! after its name, or `#f` when none is given. `:rest name` collects the
//! positional arguments left over; `:allow-other-keys` drops keyword pairs
//! that name no parameter instead of rejecting them.
//!
//! Defaults are literals: integers, reals, strings, characters (`#\a`),
//! booleans and symbols (`'sym` or a bare word).
//!
//! ```
//! # use schemebind::prelude::*;
//! # fn main() -> BindResult<()> {
//! let scheme = Scheme::new();
//! scheme.define_star_function(
//!     "scale",
//!     "x (factor 2)",
//!     "(scale x :factor n) multiplies x",
//!     |x: i64, factor: i64| x * factor,
//! )?;
//! assert_eq!(scheme.call_as::<i64>("scale", (5,))?, 10);
//! let factor = scheme.sym(":factor");
//! assert_eq!(scheme.call_as::<i64>("scale", (factor, 3, 5))?, 15);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use schemebind_runtime::{Runtime, Value, signal};

use crate::error::{BindError, BindResult};

/// A default given in a parameter list.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Character(char),
    String(String),
    Symbol(String),
}

impl Literal {
    fn parse(token: &Token) -> Literal {
        let text = match token {
            Token::Quoted(s) => return Literal::String(s.clone()),
            Token::Word(w) => w.as_str(),
        };
        match text {
            "#t" | "#true" => return Literal::Boolean(true),
            "#f" | "#false" => return Literal::Boolean(false),
            _ => {}
        }
        if let Some(name) = text.strip_prefix("#\\") {
            let c = match name {
                "space" => Some(' '),
                "newline" => Some('\n'),
                "tab" => Some('\t'),
                _ => {
                    let mut chars = name.chars();
                    chars.next().filter(|_| chars.next().is_none())
                }
            };
            if let Some(c) = c {
                return Literal::Character(c);
            }
        }
        if let Ok(n) = text.parse::<i64>() {
            return Literal::Integer(n);
        }
        let numeric = text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
        if numeric && let Ok(x) = text.parse::<f64>() {
            return Literal::Real(x);
        }
        Literal::Symbol(text.strip_prefix('\'').unwrap_or(text).to_string())
    }

    pub fn to_value(&self, rt: &Runtime) -> Value {
        match self {
            Literal::Boolean(b) => rt.make_boolean(*b),
            Literal::Integer(n) => rt.make_integer(*n),
            Literal::Real(x) => rt.make_real(*x),
            Literal::Character(c) => rt.make_character(*c),
            Literal::String(s) => rt.make_string(s),
            Literal::Symbol(s) => rt.make_symbol(s),
        }
    }
}

/// One named parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Literal,
}

/// A parsed star-function parameter list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StarParams {
    params: Vec<Param>,
    rest: Option<String>,
    allow_other_keys: bool,
}

impl StarParams {
    /// Parses a parameter list such as `"a (b 2) :rest r"`.
    pub fn parse(desc: &str) -> BindResult<Self> {
        let mut tokens = Tokenizer::new(desc);
        let mut parsed = StarParams::default();

        while let Some(item) = tokens.next_item(desc)? {
            match item {
                Item::Open => {
                    let Some(Item::Token(Token::Word(name))) = tokens.next_item(desc)? else {
                        return Err(syntax(desc, "a parameter name must follow '('"));
                    };
                    let default = match tokens.next_item(desc)? {
                        Some(Item::Token(token)) => Literal::parse(&token),
                        Some(Item::Close) => {
                            parsed.push(desc, name, Literal::Boolean(false))?;
                            continue;
                        }
                        _ => return Err(syntax(desc, "a parameter default must be a literal")),
                    };
                    if !matches!(tokens.next_item(desc)?, Some(Item::Close)) {
                        return Err(syntax(desc, "unclosed parameter"));
                    }
                    parsed.push(desc, name, default)?;
                }
                Item::Close => return Err(syntax(desc, "unbalanced ')'")),
                Item::Token(Token::Word(word)) if word == ":rest" => {
                    let Some(Item::Token(Token::Word(name))) = tokens.next_item(desc)? else {
                        return Err(syntax(desc, ":rest needs a name"));
                    };
                    if parsed.rest.is_some() {
                        return Err(syntax(desc, "more than one :rest"));
                    }
                    parsed.rest = Some(name);
                }
                Item::Token(Token::Word(word)) if word == ":allow-other-keys" => {
                    parsed.allow_other_keys = true;
                }
                Item::Token(Token::Word(name)) => {
                    parsed.push(desc, name, Literal::Boolean(false))?;
                }
                Item::Token(Token::Quoted(_)) => {
                    return Err(syntax(desc, "a parameter name cannot be a string"));
                }
            }
        }
        Ok(parsed)
    }

    fn push(&mut self, desc: &str, name: String, default: Literal) -> BindResult<()> {
        if name.starts_with(':') {
            return Err(syntax(desc, &format!("unknown marker {name}")));
        }
        if self.rest.is_some() {
            return Err(syntax(desc, "parameters cannot follow :rest"));
        }
        if self.position(&name).is_some() {
            return Err(syntax(desc, &format!("duplicate parameter {name}")));
        }
        self.params.push(Param { name, default });
        Ok(())
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn rest(&self) -> Option<&str> {
        self.rest.as_deref()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Arranges `args` in declaration order: one value per parameter, then
    /// the rest arguments.
    pub fn bind(&self, rt: &Runtime, args: Value) -> BindResult<Value> {
        let values = rt.list_to_vec(args);
        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        let mut rest = Vec::new();
        let mut next = 0;
        let mut i = 0;

        while i < values.len() {
            let value = values[i];
            let key = rt
                .symbol_name(value)
                .filter(|name| name.len() > 1 && name.starts_with(':'));
            if let Some(key) = key {
                let found = self.position(&key[1..]);
                if found.is_some() || !self.allow_other_keys {
                    let Some(index) = found else {
                        if self.rest.is_some() {
                            rest.push(value);
                            i += 1;
                            continue;
                        }
                        return Err(BindError::wrong_type(rt, value, self.expected_keys()).at(i + 1));
                    };
                    let Some(&arg) = values.get(i + 1) else {
                        return Err(too_many(args, values.len()));
                    };
                    if slots[index].is_some() {
                        return Err(BindError::wrong_type(
                            rt,
                            value,
                            format!("a parameter not already set, not {key}"),
                        )
                        .at(i + 1));
                    }
                    slots[index] = Some(arg);
                } else if values.get(i + 1).is_none() {
                    return Err(too_many(args, values.len()));
                }
                i += 2;
                continue;
            }

            while next < slots.len() && slots[next].is_some() {
                next += 1;
            }
            if next < slots.len() {
                slots[next] = Some(value);
                next += 1;
            } else if self.rest.is_some() {
                rest.push(value);
            } else {
                return Err(too_many(args, values.len()));
            }
            i += 1;
        }

        let mut filled: Vec<Value> = slots
            .into_iter()
            .zip(&self.params)
            .map(|(slot, param)| slot.unwrap_or_else(|| param.default.to_value(rt)))
            .collect();
        filled.extend(rest);
        Ok(rt.list(&filled))
    }

    fn expected_keys(&self) -> String {
        let keys: Vec<String> = self.params.iter().map(|p| format!(":{}", p.name)).collect();
        format!("one of {}", keys.join(" "))
    }
}

impl fmt::Display for StarParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !std::mem::take(&mut first) {
                f.write_str(" ")?;
            }
            Ok(())
        };
        for param in &self.params {
            sep(f)?;
            match &param.default {
                Literal::Boolean(false) => write!(f, "{}", param.name)?,
                Literal::Boolean(true) => write!(f, "({} #t)", param.name)?,
                Literal::Integer(n) => write!(f, "({} {n})", param.name)?,
                Literal::Real(x) => write!(f, "({} {x:?})", param.name)?,
                Literal::Character(c) => write!(f, "({} #\\{c})", param.name)?,
                Literal::String(s) => write!(f, "({} {s:?})", param.name)?,
                Literal::Symbol(s) => write!(f, "({} '{s})", param.name)?,
            }
        }
        if let Some(rest) = &self.rest {
            sep(f)?;
            write!(f, ":rest {rest}")?;
        }
        if self.allow_other_keys {
            sep(f)?;
            f.write_str(":allow-other-keys")?;
        }
        Ok(())
    }
}

fn too_many(args: Value, count: usize) -> BindError {
    BindError::WrongArgsNumber {
        args,
        count,
        caller: String::new(),
    }
}

fn syntax(desc: &str, reason: &str) -> BindError {
    BindError::custom(
        signal::SYNTAX_ERROR,
        format!("bad parameter list {desc:?}: {reason}"),
    )
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
}

#[derive(Debug, PartialEq)]
enum Item {
    Open,
    Close,
    Token(Token),
}

struct Tokenizer<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn next_item(&mut self, desc: &str) -> BindResult<Option<Item>> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let Some((start, c)) = self.chars.next() else {
            return Ok(None);
        };
        let item = match c {
            '(' => Item::Open,
            ')' => Item::Close,
            '"' => Item::Token(Token::Quoted(self.quoted(desc)?)),
            _ => {
                let mut end = start + c.len_utf8();
                while let Some((i, c)) = self
                    .chars
                    .next_if(|(_, c)| !c.is_whitespace() && *c != '(' && *c != ')')
                {
                    end = i + c.len_utf8();
                }
                Item::Token(Token::Word(self.text[start..end].to_string()))
            }
        };
        Ok(Some(item))
    }

    fn quoted(&mut self, desc: &str) -> BindResult<String> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '"' => return Ok(out),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(syntax(desc, "unterminated string"))
    }
}
