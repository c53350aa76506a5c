//! Narrow reader for shell-style variable assignments
//!
//! Only top-level `name=value`, `name=(...)` and their `+=` forms are
//! evaluated. Function bodies and every other command are skipped, so nothing
//! in the file is ever executed. Expansions are limited to previously assigned
//! variables; command substitution and arithmetic are rejected.

use super::pattern::{self, Anchor};
use glob::Pattern;
use std::collections::BTreeMap;
use std::fmt;

/// A shell variable value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Scalar(String),
  Array(Vec<String>),
}

impl Value {
  /// Value as seen by `$name` (arrays yield their first element)
  pub fn first(&self) -> Option<&str> {
    match self {
      Value::Scalar(s) => Some(s.as_str()),
      Value::Array(items) => items.first().map(String::as_str),
    }
  }

  /// Value as a list; an empty scalar is an empty list
  pub fn to_list(&self) -> Vec<String> {
    match self {
      Value::Scalar(s) if s.is_empty() => Vec::new(),
      Value::Scalar(s) => vec![s.clone()],
      Value::Array(items) => items.clone(),
    }
  }
}

/// Variables collected from a file, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
  values: BTreeMap<String, Value>,
}

impl Variables {
  pub fn get(&self, name: &str) -> Option<&Value> {
    self.values.get(name)
  }

  /// Scalar view of a variable; `None` when unset or empty
  pub fn scalar(&self, name: &str) -> Option<&str> {
    self.get(name).and_then(Value::first).filter(|s| !s.is_empty())
  }

  /// List view of a variable; empty when unset
  pub fn list(&self, name: &str) -> Vec<String> {
    self.get(name).map(Value::to_list).unwrap_or_default()
  }

  pub fn insert(&mut self, name: impl Into<String>, value: Value) {
    self.values.insert(name.into(), value);
  }

  fn append(&mut self, name: &str, value: Value) {
    let merged = match (self.values.remove(name), value) {
      (None, value) => value,
      (Some(Value::Scalar(mut s)), Value::Scalar(more)) => {
        s.push_str(&more);
        Value::Scalar(s)
      }
      (Some(existing), Value::Array(more)) => {
        let mut items = existing.to_list();
        items.extend(more);
        Value::Array(items)
      }
      (Some(Value::Array(mut items)), Value::Scalar(more)) => {
        // bash appends to element zero
        match items.first_mut() {
          Some(first) => first.push_str(&more),
          None => items.push(more),
        }
        Value::Array(items)
      }
    };
    self.values.insert(name.to_string(), merged);
  }
}

/// How statements that cannot be evaluated are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// Any unsupported assignment is an error (PKGBUILD)
  Strict,
  /// Unsupported assignments are skipped (makepkg.conf)
  Lenient,
}

/// Syntax or evaluation error with the 1-based line it started on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
  pub line: usize,
  pub message: String,
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "line {}: {}", self.line, self.message)
  }
}

impl std::error::Error for ParseError {}

/// Parse assignments out of `text`
pub fn parse(text: &str, mode: Mode) -> Result<Variables, ParseError> {
  parse_with(text, mode, Variables::default())
}

/// Parse with pre-seeded variables (e.g. `CARCH`)
pub fn parse_with(text: &str, mode: Mode, seed: Variables) -> Result<Variables, ParseError> {
  let mut parser = Parser {
    chars: text.chars().collect(),
    pos: 0,
    line: 1,
    vars: seed,
  };
  parser.run(mode)?;
  Ok(parser.vars)
}

struct Parser {
  chars: Vec<char>,
  pos: usize,
  line: usize,
  vars: Variables,
}

/// One word of an assignment; a lone `"${name[@]}"` splices into arrays
enum Word {
  Text(String),
  Splice(Vec<String>),
}

impl Parser {
  fn run(&mut self, mode: Mode) -> Result<(), ParseError> {
    loop {
      self.skip_separators();
      match self.peek() {
        None => return Ok(()),
        Some('#') => self.skip_comment(),
        Some(_) => {
          let (start, start_line) = (self.pos, self.line);
          if let Err(err) = self.statement() {
            if mode == Mode::Strict {
              return Err(err);
            }
            self.pos = start;
            self.line = start_line;
            self.skip_command();
          }
        }
      }
    }
  }

  fn statement(&mut self) -> Result<(), ParseError> {
    let name = self.identifier();

    if !name.is_empty() {
      if self.eat_str("+=") {
        return self.assignment(&name, true);
      }
      if self.eat('=') {
        return self.assignment(&name, false);
      }
      if name == "function" {
        self.skip_inline_space();
        self.identifier();
        return self.skip_function_body();
      }
      let save = (self.pos, self.line);
      self.skip_inline_space();
      if self.eat_str("()") {
        return self.skip_function_body();
      }
      (self.pos, self.line) = save;
    }

    self.skip_command();
    Ok(())
  }

  fn assignment(&mut self, name: &str, append: bool) -> Result<(), ParseError> {
    let value = if self.eat('(') {
      Value::Array(self.array_body()?)
    } else {
      let text = match self.word(false)? {
        Word::Text(text) => text,
        Word::Splice(items) => items.join(" "),
      };
      // `NAME=value command` only sets NAME for the command
      self.skip_inline_space();
      match self.peek() {
        None | Some('\n') | Some(';') | Some('#') => {}
        Some(_) => {
          self.skip_command();
          return Ok(());
        }
      }
      Value::Scalar(text)
    };

    if append {
      self.vars.append(name, value);
    } else {
      self.vars.insert(name, value);
    }
    Ok(())
  }

  fn array_body(&mut self) -> Result<Vec<String>, ParseError> {
    let start_line = self.line;
    let mut items = Vec::new();
    loop {
      self.skip_whitespace();
      match self.peek() {
        None => return Err(self.error_at(start_line, "unterminated array")),
        Some(')') => {
          self.pos += 1;
          return Ok(items);
        }
        Some('#') => self.skip_comment(),
        Some(_) => match self.word(true)? {
          Word::Text(text) => items.push(text),
          Word::Splice(more) => items.extend(more),
        },
      }
    }
  }

  fn word(&mut self, in_array: bool) -> Result<Word, ParseError> {
    let mut text = String::new();
    let mut segments = 0usize;
    let mut splice: Option<Vec<String>> = None;

    while let Some(c) = self.peek() {
      match c {
        ' ' | '\t' | '\n' | ';' => break,
        ')' if in_array => break,
        '(' | ')' | '|' | '&' | '<' | '>' => return Err(self.error(format!("unexpected '{}'", c))),
        '`' => return Err(self.error("command substitution is not supported")),
        '\'' => {
          self.pos += 1;
          text.push_str(&self.single_quoted()?);
          segments += 1;
        }
        '"' => {
          self.pos += 1;
          let (quoted, quoted_splice) = self.double_quoted()?;
          text.push_str(&quoted);
          splice = quoted_splice;
          segments += 1;
        }
        '\\' => {
          self.pos += 1;
          match self.next() {
            Some('\n') => {}
            Some(escaped) => text.push(escaped),
            None => {}
          }
          segments += 1;
        }
        '$' => {
          self.pos += 1;
          let expanded = self.expansion()?;
          text.push_str(&expanded.joined);
          splice = expanded.splice;
          segments += 1;
        }
        _ => {
          self.pos += 1;
          text.push(c);
          segments += 1;
        }
      }
    }

    match splice {
      Some(items) if segments == 1 => Ok(Word::Splice(items)),
      _ => Ok(Word::Text(text)),
    }
  }

  fn single_quoted(&mut self) -> Result<String, ParseError> {
    let start_line = self.line;
    let mut out = String::new();
    loop {
      match self.next() {
        None => return Err(self.error_at(start_line, "unterminated single quote")),
        Some('\'') => return Ok(out),
        Some(c) => out.push(c),
      }
    }
  }

  fn double_quoted(&mut self) -> Result<(String, Option<Vec<String>>), ParseError> {
    let start_line = self.line;
    let mut out = String::new();
    let mut parts = 0usize;
    let mut splice = None;
    loop {
      match self.next() {
        None => return Err(self.error_at(start_line, "unterminated double quote")),
        Some('"') => {
          // a lone expansion keeps its array shape
          let splice = if parts == 1 { splice } else { None };
          return Ok((out, splice));
        }
        Some('\\') => match self.next() {
          Some('\n') => {}
          Some(c @ ('$' | '"' | '\\' | '`')) => out.push(c),
          Some(c) => {
            out.push('\\');
            out.push(c);
          }
          None => return Err(self.error_at(start_line, "unterminated double quote")),
        },
        Some('`') => return Err(self.error("command substitution is not supported")),
        Some('$') => {
          let expanded = self.expansion()?;
          let had_text = !out.is_empty();
          out.push_str(&expanded.joined);
          splice = if had_text { None } else { expanded.splice };
          parts += 1;
        }
        Some(c) => {
          out.push(c);
          parts += 2;
        }
      }
    }
  }

  fn expansion(&mut self) -> Result<Expanded, ParseError> {
    match self.peek() {
      Some('(') => Err(self.error("command substitution is not supported")),
      Some('{') => {
        self.pos += 1;
        let start_line = self.line;
        let mut depth = 1;
        let mut body = String::new();
        loop {
          match self.next() {
            None => return Err(self.error_at(start_line, "unterminated ${...} expansion")),
            Some('{') => {
              depth += 1;
              body.push('{');
            }
            Some('}') => {
              depth -= 1;
              if depth == 0 {
                break;
              }
              body.push('}');
            }
            Some(c) => body.push(c),
          }
        }
        self.braced(&body)
      }
      Some(c) if c.is_ascii_alphabetic() || c == '_' => {
        let name = self.identifier();
        Ok(Expanded::text(self.lookup(&name, None)))
      }
      Some(c) if c.is_ascii_digit() || matches!(c, '@' | '*' | '#' | '?' | '!' | '$' | '-') => {
        self.pos += 1;
        Ok(Expanded::text(String::new()))
      }
      _ => Ok(Expanded::text("$".to_string())),
    }
  }

  fn braced(&self, body: &str) -> Result<Expanded, ParseError> {
    if let Some(name) = body.strip_prefix('#')
      && is_identifier(name)
    {
      let len = self.lookup(name, None).chars().count();
      return Ok(Expanded::text(len.to_string()));
    }

    let name_len = body
      .char_indices()
      .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
      .map(|(i, _)| i)
      .unwrap_or(body.len());
    let (name, mut rest) = body.split_at(name_len);
    if !is_identifier(name) {
      return Err(self.error(format!("unsupported expansion ${{{}}}", body)));
    }

    let mut index = None;
    if let Some(after) = rest.strip_prefix('[') {
      let close = after
        .find(']')
        .ok_or_else(|| self.error(format!("unterminated index in ${{{}}}", body)))?;
      index = Some(&after[..close]);
      rest = &after[close + 1..];
    }

    if let Some(idx @ ("@" | "*")) = index {
      if !rest.is_empty() {
        return Err(self.error(format!("unsupported expansion ${{{}}}", body)));
      }
      let items = self.vars.list(name);
      let joined = items.join(" ");
      let splice = if idx == "@" { Some(items) } else { None };
      return Ok(Expanded { joined, splice });
    }

    let index = match index {
      Some(raw) => Some(
        raw
          .trim()
          .parse::<usize>()
          .map_err(|_| self.error(format!("unsupported array index '{}'", raw)))?,
      ),
      None => None,
    };
    let value = self.lookup(name, index);

    if rest.is_empty() {
      return Ok(Expanded::text(value));
    }
    if let Some(default) = rest.strip_prefix(":-").or_else(|| rest.strip_prefix('-')) {
      if value.is_empty() {
        return Ok(Expanded::text(self.expand_nested(default)?));
      }
      return Ok(Expanded::text(value));
    }
    if let Some(pat) = rest.strip_prefix("##") {
      return Ok(Expanded::text(pattern::strip_prefix(&value, &self.pattern(pat)?, true)));
    }
    if let Some(pat) = rest.strip_prefix('#') {
      return Ok(Expanded::text(pattern::strip_prefix(&value, &self.pattern(pat)?, false)));
    }
    if let Some(pat) = rest.strip_prefix("%%") {
      return Ok(Expanded::text(pattern::strip_suffix(&value, &self.pattern(pat)?, true)));
    }
    if let Some(pat) = rest.strip_prefix('%') {
      return Ok(Expanded::text(pattern::strip_suffix(&value, &self.pattern(pat)?, false)));
    }
    if let Some(operand) = rest.strip_prefix('/') {
      let (all, anchor, operand) = match operand.chars().next() {
        Some('/') => (true, Anchor::Anywhere, &operand[1..]),
        Some('#') => (false, Anchor::Start, &operand[1..]),
        Some('%') => (false, Anchor::End, &operand[1..]),
        _ => (false, Anchor::Anywhere, operand),
      };
      let (pat, replacement) = operand.split_once('/').unwrap_or((operand, ""));
      if pat.is_empty() {
        return Ok(Expanded::text(value));
      }
      let pat = self.pattern(pat)?;
      let replacement = self.expand_nested(replacement)?;
      return Ok(Expanded::text(pattern::replace(&value, &pat, anchor, all, &replacement)));
    }
    match rest {
      "^^" => Ok(Expanded::text(value.to_uppercase())),
      ",," => Ok(Expanded::text(value.to_lowercase())),
      _ => Err(self.error(format!("unsupported expansion ${{{}}}", body))),
    }
  }

  /// Expand `$name` references inside an operator argument
  fn expand_nested(&self, text: &str) -> Result<String, ParseError> {
    let mut inner = Parser {
      chars: text.chars().collect(),
      pos: 0,
      line: self.line,
      vars: self.vars.clone(),
    };
    let mut out = String::new();
    while let Some(c) = inner.next() {
      match c {
        '$' => out.push_str(&inner.expansion()?.joined),
        '\\' => {
          if let Some(escaped) = inner.next() {
            out.push(escaped);
          }
        }
        '\'' | '"' => {}
        c => out.push(c),
      }
    }
    Ok(out)
  }

  /// Compile an operator's pattern argument; quoted or escaped characters
  /// match literally, unquoted `*`, `?` and `[...]` are wildcards
  fn pattern(&self, text: &str) -> Result<Pattern, ParseError> {
    let mut inner = Parser {
      chars: text.chars().collect(),
      pos: 0,
      line: self.line,
      vars: self.vars.clone(),
    };
    let mut glob = String::new();
    let mut quote = None;
    while let Some(c) = inner.next() {
      match (c, quote) {
        ('\'', Some('\'')) | ('"', Some('"')) => quote = None,
        ('\'' | '"', None) => quote = Some(c),
        ('$', Some('\'')) => glob.push('$'),
        ('$', Some(_)) => glob.push_str(&Pattern::escape(&inner.expansion()?.joined)),
        ('$', None) => glob.push_str(&inner.expansion()?.joined),
        ('\\', Some('\'')) => glob.push_str(&Pattern::escape("\\")),
        ('\\', _) => {
          if let Some(escaped) = inner.next() {
            glob.push_str(&Pattern::escape(&escaped.to_string()));
          }
        }
        (c, Some(_)) => glob.push_str(&Pattern::escape(&c.to_string())),
        // bash has no `**` outside globstar, and spells negation `[^...]` too
        ('*', None) if glob.ends_with('*') => {}
        ('^', None) if glob.ends_with('[') => glob.push('!'),
        (c, None) => glob.push(c),
      }
    }
    Pattern::new(&glob).map_err(|e| self.error(format!("invalid pattern '{}': {}", text, e.msg)))
  }

  fn lookup(&self, name: &str, index: Option<usize>) -> String {
    match (self.vars.get(name), index) {
      (None, _) => String::new(),
      (Some(Value::Scalar(s)), None | Some(0)) => s.clone(),
      (Some(Value::Scalar(_)), Some(_)) => String::new(),
      (Some(Value::Array(items)), index) => items.get(index.unwrap_or(0)).cloned().unwrap_or_default(),
    }
  }

  /// Skip `{ ... }` after a function header, honouring quotes and heredocs
  fn skip_function_body(&mut self) -> Result<(), ParseError> {
    let start_line = self.line;
    self.skip_whitespace();
    if !self.eat('{') {
      return Err(self.error("expected '{' after function header"));
    }
    let mut depth = 1usize;
    let mut at_word_start = true;
    while let Some(c) = self.next() {
      match c {
        '{' => depth += 1,
        '}' => {
          depth -= 1;
          if depth == 0 {
            return Ok(());
          }
        }
        '\'' => {
          self.single_quoted()?;
        }
        '"' => {
          self.double_quoted_raw()?;
        }
        '\\' => {
          self.next();
        }
        '#' if at_word_start => self.skip_comment(),
        '<' if self.peek() == Some('<') => {
          self.pos += 1;
          if self.peek() == Some('<') {
            // here-string
            self.pos += 1;
          } else {
            self.skip_heredoc()?;
          }
        }
        _ => {}
      }
      at_word_start = matches!(c, ' ' | '\t' | '\n' | ';' | '(' | '|' | '&');
    }
    Err(self.error_at(start_line, "unterminated function body"))
  }

  fn double_quoted_raw(&mut self) -> Result<(), ParseError> {
    let start_line = self.line;
    loop {
      match self.next() {
        None => return Err(self.error_at(start_line, "unterminated double quote")),
        Some('"') => return Ok(()),
        Some('\\') => {
          self.next();
        }
        Some(_) => {}
      }
    }
  }

  fn skip_heredoc(&mut self) -> Result<(), ParseError> {
    let strip_tabs = self.eat('-');
    self.skip_inline_space();
    let mut delimiter = String::new();
    while let Some(c) = self.peek() {
      if c.is_whitespace() || matches!(c, ';' | '|' | '&' | ')') {
        break;
      }
      self.pos += 1;
      if !matches!(c, '\'' | '"' | '\\') {
        delimiter.push(c);
      }
    }
    if delimiter.is_empty() {
      return Err(self.error("missing heredoc delimiter"));
    }
    let start_line = self.line;
    // rest of the header line
    while let Some(c) = self.next() {
      if c == '\n' {
        break;
      }
    }
    loop {
      if self.peek().is_none() {
        return Err(self.error_at(start_line, format!("unterminated heredoc '{}'", delimiter)));
      }
      let mut line = String::new();
      while let Some(c) = self.next() {
        if c == '\n' {
          break;
        }
        line.push(c);
      }
      let candidate = if strip_tabs { line.trim_start_matches('\t') } else { line.as_str() };
      if candidate == delimiter {
        return Ok(());
      }
    }
  }

  /// Skip one simple command up to an unquoted newline or `;`
  fn skip_command(&mut self) {
    let mut depth = 0usize;
    while let Some(c) = self.peek() {
      match c {
        '\n' | ';' if depth == 0 => return,
        '(' => depth += 1,
        ')' => depth = depth.saturating_sub(1),
        '\'' => {
          self.pos += 1;
          if self.single_quoted().is_err() {
            return;
          }
          continue;
        }
        '"' => {
          self.pos += 1;
          if self.double_quoted_raw().is_err() {
            return;
          }
          continue;
        }
        '\\' => {
          self.pos += 1;
          self.next();
          continue;
        }
        _ => {}
      }
      self.next();
    }
  }

  fn skip_comment(&mut self) {
    while let Some(c) = self.peek() {
      if c == '\n' {
        return;
      }
      self.pos += 1;
    }
  }

  fn skip_separators(&mut self) {
    while let Some(c) = self.peek() {
      match c {
        ' ' | '\t' | '\r' | ';' => self.pos += 1,
        '\n' => {
          self.pos += 1;
          self.line += 1;
        }
        '\\' if self.chars.get(self.pos + 1) == Some(&'\n') => {
          self.pos += 2;
          self.line += 1;
        }
        _ => return,
      }
    }
  }

  fn skip_whitespace(&mut self) {
    while let Some(c) = self.peek() {
      match c {
        ' ' | '\t' | '\r' => self.pos += 1,
        '\n' => {
          self.pos += 1;
          self.line += 1;
        }
        '\\' if self.chars.get(self.pos + 1) == Some(&'\n') => {
          self.pos += 2;
          self.line += 1;
        }
        _ => return,
      }
    }
  }

  fn skip_inline_space(&mut self) {
    while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
      self.pos += 1;
    }
  }

  fn identifier(&mut self) -> String {
    let mut out = String::new();
    while let Some(c) = self.peek() {
      let valid = c.is_ascii_alphabetic() || c == '_' || (!out.is_empty() && c.is_ascii_digit());
      if !valid {
        break;
      }
      out.push(c);
      self.pos += 1;
    }
    out
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn next(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += 1;
    if c == '\n' {
      self.line += 1;
    }
    Some(c)
  }

  fn eat(&mut self, expected: char) -> bool {
    if self.peek() == Some(expected) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn eat_str(&mut self, expected: &str) -> bool {
    let len = expected.chars().count();
    let matches = self
      .chars
      .get(self.pos..self.pos + len)
      .is_some_and(|window| window.iter().copied().eq(expected.chars()));
    if matches {
      self.pos += len;
    }
    matches
  }

  fn error(&self, message: impl Into<String>) -> ParseError {
    self.error_at(self.line, message)
  }

  fn error_at(&self, line: usize, message: impl Into<String>) -> ParseError {
    ParseError {
      line,
      message: message.into(),
    }
  }
}

struct Expanded {
  joined: String,
  splice: Option<Vec<String>>,
}

impl Expanded {
  fn text(joined: String) -> Self {
    Self { joined, splice: None }
  }
}

fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
