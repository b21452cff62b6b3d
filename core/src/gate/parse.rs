// gantry/src/gate/parse.rs

//! Parser for the textual gate language used in workflow manifests.
//!
//! ```text
//! expr    := and ('||' and)*
//! and     := unary ('&&' unary)*
//! unary   := '!' unary | primary
//! primary := '(' expr ')' | 'true' | 'false' | call | operand (('==' | '!=') literal)?
//! call    := ('always' | 'success' | 'failure' | 'cancelled') '(' ')'
//! operand := 'facts.' NAME | 'needs.' UNIT '.result' | 'needs.' UNIT '.outputs.' NAME
//! ```
//!
//! A bare `facts.X` means `facts.X == 'true'`. The whole expression may be
//! wrapped in `${{ ... }}`.

use super::expr::{Gate, StatusCheck};
use crate::error::{GantryError, GantryResult};
use crate::run::outcome::Outcome;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
  LParen,
  RParen,
  And,
  Or,
  Bang,
  Eq,
  Ne,
  Word(String),
  Quoted(String),
}

#[derive(Debug)]
struct Spanned {
  token: Token,
  pos: usize,
}

struct Parser<'a> {
  source: &'a str,
  tokens: Vec<Spanned>,
  idx: usize,
}

impl FromStr for Gate {
  type Err = GantryError;

  fn from_str(s: &str) -> GantryResult<Self> {
    Gate::parse(s)
  }
}

impl Gate {
  /// Parses a gate expression such as `facts.masterPush && !failure()`.
  pub fn parse(source: &str) -> GantryResult<Gate> {
    let (body, offset) = strip_template(source);
    let tokens = tokenize(source, body, offset)?;
    let mut parser = Parser { source, tokens, idx: 0 };
    if parser.tokens.is_empty() {
      return Err(parser.error_at(offset, "expression is empty"));
    }
    let gate = parser.parse_or()?;
    if let Some(extra) = parser.tokens.get(parser.idx) {
      return Err(parser.error_at(extra.pos, "unexpected trailing input"));
    }
    Ok(gate)
  }
}

fn strip_template(source: &str) -> (&str, usize) {
  let leading = source.len() - source.trim_start().len();
  let trimmed = source.trim();
  if let Some(inner) = trimmed.strip_prefix("${{").and_then(|s| s.strip_suffix("}}")) {
    (inner, leading + 3)
  } else {
    (source, 0)
  }
}

fn is_word_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn tokenize(source: &str, body: &str, offset: usize) -> GantryResult<Vec<Spanned>> {
  let err = |pos: usize, message: &str| GantryError::GateParse {
    expression: source.to_string(),
    position: pos,
    message: message.to_string(),
  };

  let mut tokens = Vec::new();
  let mut chars = body.char_indices().peekable();
  while let Some((i, c)) = chars.next() {
    let pos = offset + i;
    let token = match c {
      c if c.is_whitespace() => continue,
      '(' => Token::LParen,
      ')' => Token::RParen,
      '&' => match chars.next() {
        Some((_, '&')) => Token::And,
        _ => return Err(err(pos, "expected '&&'")),
      },
      '|' => match chars.next() {
        Some((_, '|')) => Token::Or,
        _ => return Err(err(pos, "expected '||'")),
      },
      '=' => match chars.next() {
        Some((_, '=')) => Token::Eq,
        _ => return Err(err(pos, "expected '=='")),
      },
      '!' => {
        if let Some((_, '=')) = chars.peek() {
          chars.next();
          Token::Ne
        } else {
          Token::Bang
        }
      }
      '\'' | '"' => {
        let mut value = String::new();
        let mut closed = false;
        for (_, next) in chars.by_ref() {
          if next == c {
            closed = true;
            break;
          }
          value.push(next);
        }
        if !closed {
          return Err(err(pos, "unterminated string literal"));
        }
        Token::Quoted(value)
      }
      c if is_word_char(c) => {
        let mut word = String::from(c);
        while let Some((_, next)) = chars.peek() {
          if !is_word_char(*next) {
            break;
          }
          word.push(*next);
          chars.next();
        }
        Token::Word(word)
      }
      other => return Err(err(pos, &format!("unexpected character '{}'", other))),
    };
    tokens.push(Spanned { token, pos });
  }
  Ok(tokens)
}

impl Parser<'_> {
  fn error_at(&self, position: usize, message: &str) -> GantryError {
    GantryError::GateParse {
      expression: self.source.to_string(),
      position,
      message: message.to_string(),
    }
  }

  fn end_pos(&self) -> usize {
    self.source.len()
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.idx).map(|s| &s.token)
  }

  fn next(&mut self) -> GantryResult<(Token, usize)> {
    match self.tokens.get(self.idx) {
      Some(spanned) => {
        self.idx += 1;
        Ok((spanned.token.clone(), spanned.pos))
      }
      None => Err(self.error_at(self.end_pos(), "unexpected end of expression")),
    }
  }

  fn expect(&mut self, expected: Token, what: &str) -> GantryResult<()> {
    let (token, pos) = self.next()?;
    if token == expected {
      Ok(())
    } else {
      Err(self.error_at(pos, &format!("expected {}", what)))
    }
  }

  fn parse_or(&mut self) -> GantryResult<Gate> {
    let mut terms = vec![self.parse_and()?];
    while self.peek() == Some(&Token::Or) {
      self.idx += 1;
      terms.push(self.parse_and()?);
    }
    Ok(if terms.len() == 1 { terms.remove(0) } else { Gate::Or(terms) })
  }

  fn parse_and(&mut self) -> GantryResult<Gate> {
    let mut terms = vec![self.parse_unary()?];
    while self.peek() == Some(&Token::And) {
      self.idx += 1;
      terms.push(self.parse_unary()?);
    }
    Ok(if terms.len() == 1 { terms.remove(0) } else { Gate::And(terms) })
  }

  fn parse_unary(&mut self) -> GantryResult<Gate> {
    if self.peek() == Some(&Token::Bang) {
      self.idx += 1;
      return Ok(!self.parse_unary()?);
    }
    self.parse_primary()
  }

  fn parse_primary(&mut self) -> GantryResult<Gate> {
    let (token, pos) = self.next()?;
    match token {
      Token::LParen => {
        let inner = self.parse_or()?;
        self.expect(Token::RParen, "')'")?;
        Ok(inner)
      }
      Token::Word(word) => self.parse_word(word, pos),
      _ => Err(self.error_at(pos, "expected a condition")),
    }
  }

  /// Consumes an optional `== literal` / `!= literal`. Returns `(negated, literal, literal_pos)`.
  fn parse_comparison(&mut self) -> GantryResult<Option<(bool, String, usize)>> {
    let negated = match self.peek() {
      Some(Token::Eq) => false,
      Some(Token::Ne) => true,
      _ => return Ok(None),
    };
    self.idx += 1;
    let (token, pos) = self.next()?;
    let literal = match token {
      Token::Quoted(value) => value,
      Token::Word(word) if word == "true" || word == "false" => word,
      _ => return Err(self.error_at(pos, "expected a quoted string or true/false")),
    };
    Ok(Some((negated, literal, pos)))
  }

  fn parse_word(&mut self, word: String, pos: usize) -> GantryResult<Gate> {
    match word.as_str() {
      "true" => return Ok(Gate::Literal(true)),
      "false" => return Ok(Gate::Literal(false)),
      "always" | "success" | "failure" | "cancelled" => {
        let check = match word.as_str() {
          "always" => StatusCheck::Always,
          "success" => StatusCheck::Success,
          "failure" => StatusCheck::Failure,
          _ => StatusCheck::Cancelled,
        };
        self.expect(Token::LParen, "'(' after status function")?;
        self.expect(Token::RParen, "')'")?;
        return Ok(Gate::Status(check));
      }
      _ => {}
    }

    let parts: Vec<&str> = word.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
      return Err(self.error_at(pos, &format!("malformed reference '{}'", word)));
    }
    match parts.as_slice() {
      ["facts", name] => {
        let name = name.to_string();
        match self.parse_comparison()? {
          None => Ok(Gate::fact(name)),
          Some((negated, literal, lit_pos)) => {
            let value = match literal.as_str() {
              "true" => true,
              "false" => false,
              _ => return Err(self.error_at(lit_pos, "facts compare against 'true' or 'false'")),
            };
            Ok(Gate::fact_is(name, value != negated))
          }
        }
      }
      ["needs", unit, "result"] => {
        let unit = unit.to_string();
        let (negated, literal, lit_pos) = self
          .parse_comparison()?
          .ok_or_else(|| self.error_at(pos, "a result must be compared with == or !="))?;
        let outcome = Outcome::from_result_keyword(&literal).ok_or_else(|| {
          self.error_at(lit_pos, "result is one of 'success', 'failure', 'skipped', 'cancelled'")
        })?;
        let gate = Gate::Result { unit, outcome };
        Ok(if negated { !gate } else { gate })
      }
      ["needs", unit, "outputs", key] => {
        let (unit, key) = (unit.to_string(), key.to_string());
        let (negated, expected, _) = self
          .parse_comparison()?
          .ok_or_else(|| self.error_at(pos, "an output must be compared with == or !="))?;
        let gate = Gate::Output { unit, key, expected };
        Ok(if negated { !gate } else { gate })
      }
      _ => Err(self.error_at(pos, &format!("unknown reference '{}'", word))),
    }
  }
}
