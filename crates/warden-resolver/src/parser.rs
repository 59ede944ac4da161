// SPDX-License-Identifier: Apache-2.0

//! Rule file parser.
//!
//! Grammar (whitespace and `#`-to-end-of-line comments are insignificant):
//!
//! ```text
//! file    := entry*
//! entry   := "target" IDENT "{" body "}"
//! body    := (depends | update)*
//! depends := "depends" "=" "[" (dep ("," dep)*)? "]" ";"?
//! dep     := "$"? IDENT            # "$" marks a fact reference
//! update  := "update" "=" "[" IDENT "]" "{" SCRIPT "}" ";"?
//! ```
//!
//! `IDENT` matches `[A-Za-z_][A-Za-z0-9_./-]*`. `SCRIPT` is raw text; braces
//! inside it must balance (they are counted, not escaped).

use crate::error::ResolverError;

/// An unresolved dependency reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawDep {
    /// Bare name: must link to a target.
    Target(String),
    /// `$name`: a fact table reference.
    Fact(String),
}

/// One parsed `target` entry, before linking.
#[derive(Debug)]
pub(crate) struct RawTarget {
    pub(crate) name: String,
    pub(crate) deps: Vec<RawDep>,
    pub(crate) script: Option<(String, String)>,
}

/// Parses a rule file into raw target entries.
pub(crate) fn parse_rules(source: &str) -> Result<Vec<RawTarget>, ResolverError> {
    let mut scanner = Scanner::new(source);
    let mut targets: Vec<RawTarget> = Vec::new();

    loop {
        scanner.skip_trivia();
        if scanner.at_end() {
            break;
        }
        let keyword = scanner.ident()?;
        if keyword != "target" {
            return Err(scanner.fail(format!("expected 'target', found '{keyword}'")));
        }
        scanner.skip_trivia();
        let name = scanner.ident()?;
        if targets.iter().any(|t| t.name == name) {
            return Err(scanner.fail(format!("duplicate target: {name}")));
        }
        scanner.expect('{')?;

        let mut deps: Option<Vec<RawDep>> = None;
        let mut script: Option<(String, String)> = None;
        loop {
            scanner.skip_trivia();
            if scanner.eat('}') {
                break;
            }
            let field = scanner.ident()?;
            scanner.expect('=')?;
            match field.as_str() {
                "depends" => {
                    if deps.is_some() {
                        return Err(scanner.fail(format!("duplicate depends in target {name}")));
                    }
                    deps = Some(scanner.dep_list()?);
                }
                "update" => {
                    if script.is_some() {
                        return Err(scanner.fail(format!("duplicate update in target {name}")));
                    }
                    script = Some(scanner.script_block()?);
                }
                other => {
                    return Err(scanner.fail(format!("unknown field '{other}' in target {name}")));
                }
            }
            scanner.skip_trivia();
            scanner.eat(';');
        }

        targets.push(RawTarget {
            name,
            deps: deps.unwrap_or_default(),
            script,
        });
    }

    Ok(targets)
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn fail(&self, detail: String) -> ResolverError {
        ResolverError::Parse {
            line: self.line,
            detail,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, want: char) -> bool {
        if self.peek() == Some(want) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ResolverError> {
        self.skip_trivia();
        if self.eat(want) {
            Ok(())
        } else {
            let found = self.peek().map_or("end of input".into(), |c| format!("'{c}'"));
            Err(self.fail(format!("expected '{want}', found {found}")))
        }
    }

    fn ident(&mut self) -> Result<String, ResolverError> {
        self.skip_trivia();
        let mut out = String::new();
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                out.push(c);
                self.bump();
            }
            other => {
                let found = other.map_or("end of input".into(), |c| format!("'{c}'"));
                return Err(self.fail(format!("expected identifier, found {found}")));
            }
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-') {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn dep_list(&mut self) -> Result<Vec<RawDep>, ResolverError> {
        self.expect('[')?;
        let mut deps = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(']') {
                break;
            }
            if !deps.is_empty() {
                if !self.eat(',') {
                    return Err(self.fail("expected ',' or ']' in dependency list".into()));
                }
                self.skip_trivia();
            }
            let dep = if self.eat('$') {
                RawDep::Fact(self.ident()?)
            } else {
                RawDep::Target(self.ident()?)
            };
            deps.push(dep);
        }
        Ok(deps)
    }

    fn script_block(&mut self) -> Result<(String, String), ResolverError> {
        self.expect('[')?;
        let tag = self.ident()?;
        self.expect(']')?;
        self.expect('{')?;

        let mut depth = 1usize;
        let mut body = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.fail("unterminated script block".into()));
            };
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            if depth > 0 {
                body.push(c);
            }
        }
        Ok((tag, body.trim().to_owned()))
    }
}
