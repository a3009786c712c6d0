//! Arithmetic dice expressions.
//!
//! Grammar (whitespace allowed between tokens, not inside a dice term):
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '×' | '/') unary)*
//! unary := ('-' | '+') unary | atom
//! atom  := '(' expr ')' | dice | number
//! dice  := number? ('d' | 'D') (number | '%')? (('kh' | 'kl' | 'k') number)?
//! ```
//!
//! A bare `d` uses the caller's default die size, `d%` is a d100. Division
//! truncates toward zero. Counts are capped at [`MAX_DICE`] and sizes at
//! [`MAX_SIDES`] so a single message cannot ask for a million dice. Groups and
//! signs nest at most [`MAX_DEPTH`] deep and an expression holds at most
//! [`MAX_OPERATORS`] binary operators, which bounds parser and evaluator recursion.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::RandomSource;

pub const MAX_DICE: u32 = 100;
pub const MAX_SIDES: u32 = 1000;
pub const MAX_DEPTH: usize = 64;
pub const MAX_OPERATORS: usize = 128;

/// Error type for dice parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("empty dice expression")]
    Empty,
    #[error("unexpected '{found}' at position {position}")]
    Unexpected { found: char, position: usize },
    #[error("expression ended unexpectedly")]
    UnexpectedEnd,
    #[error("number too large: {0}")]
    NumberTooLarge(String),
    #[error("invalid dice count {0} (1-{max})", max = MAX_DICE)]
    InvalidDiceCount(u32),
    #[error("invalid die size {0} (1-{max})", max = MAX_SIDES)]
    InvalidDieSize(u32),
    #[error("cannot keep {keep} dice when only rolling {count}")]
    InvalidKeepCount { keep: u32, count: u32 },
    #[error("division by zero")]
    DivideByZero,
    #[error("result out of range")]
    Overflow,
    #[error("nested more than {0} levels deep")]
    TooDeep(usize),
    #[error("more than {0} operators")]
    TooManyOperators(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

/// One `NdS[khK]` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    pub keep: Option<Keep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn symbol(self) -> char {
        match self {
            Op::Add => '+',
            Op::Sub => '-',
            Op::Mul => '*',
            Op::Div => '/',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Number(i64),
    Dice(DiceTerm),
    Neg(Box<Node>),
    Group(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
}

/// A single die as it landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DieRoll {
    pub sides: u32,
    pub value: u32,
    pub kept: bool,
}

/// Everything a roll produced: the total, a human-readable breakdown and every die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollOutcome {
    pub expression: String,
    pub detail: String,
    pub total: i64,
    pub rolls: Vec<DieRoll>,
}

impl RollOutcome {
    pub fn has_dice(&self) -> bool {
        !self.rolls.is_empty()
    }
}

impl fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail == self.total.to_string() || self.detail == self.expression {
            write!(f, "{} = {}", self.expression, self.total)
        } else {
            write!(f, "{} = {} = {}", self.expression, self.detail, self.total)
        }
    }
}

/// A parsed expression. Parse once, roll as often as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceExpression {
    root: Node,
    source: String,
}

impl DiceExpression {
    /// Parse the whole input; trailing text is an error.
    pub fn parse(src: &str, default_sides: u32) -> Result<Self, DiceError> {
        let (expr, rest) = Self::parse_prefix(src, default_sides)?;
        let trimmed = rest.trim_start();
        if let Some(found) = trimmed.chars().next() {
            return Err(DiceError::Unexpected {
                found,
                position: src.len() - trimmed.len(),
            });
        }
        Ok(expr)
    }

    /// Parse the longest expression at the start of `src` and hand back the
    /// unparsed remainder (which starts right after the last consumed token).
    pub fn parse_prefix(src: &str, default_sides: u32) -> Result<(Self, &str), DiceError> {
        if src.trim().is_empty() {
            return Err(DiceError::Empty);
        }
        let mut parser = Parser::new(src, default_sides);
        parser.skip_ws();
        let start = parser.byte_pos();
        let root = parser.expr()?;
        let end = parser.end;
        let source: String = src[start..end].split_whitespace().collect();
        Ok((DiceExpression { root, source }, &src[end..]))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the expression contains no dice at all.
    pub fn is_constant(&self) -> bool {
        fn walk(node: &Node) -> bool {
            match node {
                Node::Number(_) => true,
                Node::Dice(_) => false,
                Node::Neg(inner) | Node::Group(inner) => walk(inner),
                Node::Binary(_, l, r) => walk(l) && walk(r),
            }
        }
        walk(&self.root)
    }

    pub fn roll(&self, source: &mut dyn RandomSource) -> Result<RollOutcome, DiceError> {
        let mut roller = Roller::Random(source);
        self.evaluate(&mut roller)
    }

    /// Evaluate with every die showing its highest face.
    pub fn maximum(&self) -> Result<RollOutcome, DiceError> {
        let mut roller = Roller::Maximum;
        self.evaluate(&mut roller)
    }

    fn evaluate(&self, roller: &mut Roller<'_>) -> Result<RollOutcome, DiceError> {
        let mut rolls = Vec::new();
        let (total, detail) = eval(&self.root, roller, &mut rolls)?;
        Ok(RollOutcome {
            expression: self.source.clone(),
            detail,
            total,
            rolls,
        })
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

enum Roller<'a> {
    Random(&'a mut dyn RandomSource),
    Maximum,
}

impl Roller<'_> {
    fn die(&mut self, sides: u32) -> u32 {
        match self {
            Roller::Random(src) => src.roll_die(sides),
            Roller::Maximum => sides,
        }
    }
}

fn eval(node: &Node, roller: &mut Roller<'_>, rolls: &mut Vec<DieRoll>) -> Result<(i64, String), DiceError> {
    match node {
        Node::Number(n) => Ok((*n, n.to_string())),
        Node::Dice(term) => Ok(roll_term(term, roller, rolls)),
        Node::Neg(inner) => {
            let (v, d) = eval(inner, roller, rolls)?;
            let v = v.checked_neg().ok_or(DiceError::Overflow)?;
            Ok((v, format!("-{}", d)))
        }
        Node::Group(inner) => {
            let (v, d) = eval(inner, roller, rolls)?;
            Ok((v, format!("({})", d)))
        }
        Node::Binary(op, l, r) => {
            let (lv, ld) = eval(l, roller, rolls)?;
            let (rv, rd) = eval(r, roller, rolls)?;
            let v = match op {
                Op::Add => lv.checked_add(rv).ok_or(DiceError::Overflow)?,
                Op::Sub => lv.checked_sub(rv).ok_or(DiceError::Overflow)?,
                Op::Mul => lv.checked_mul(rv).ok_or(DiceError::Overflow)?,
                Op::Div => {
                    if rv == 0 {
                        return Err(DiceError::DivideByZero);
                    }
                    lv.checked_div(rv).ok_or(DiceError::Overflow)?
                }
            };
            Ok((v, format!("{}{}{}", ld, op.symbol(), rd)))
        }
    }
}

fn roll_term(term: &DiceTerm, roller: &mut Roller<'_>, rolls: &mut Vec<DieRoll>) -> (i64, String) {
    let values: Vec<u32> = (0..term.count).map(|_| roller.die(term.sides)).collect();
    let mut kept = vec![true; values.len()];
    if let Some(keep) = term.keep {
        let mut order: Vec<usize> = (0..values.len()).collect();
        let n = match keep {
            Keep::Highest(n) => {
                order.sort_by(|a, b| values[*b].cmp(&values[*a]));
                n
            }
            Keep::Lowest(n) => {
                order.sort_by(|a, b| values[*a].cmp(&values[*b]));
                n
            }
        };
        kept = vec![false; values.len()];
        for idx in order.into_iter().take(n as usize) {
            kept[idx] = true;
        }
    }

    let mut total: i64 = 0;
    let mut shown = Vec::with_capacity(values.len());
    for (value, keep) in values.iter().zip(kept.iter()) {
        rolls.push(DieRoll {
            sides: term.sides,
            value: *value,
            kept: *keep,
        });
        if *keep {
            total += i64::from(*value);
            shown.push(value.to_string());
        } else {
            shown.push(format!("({})", value));
        }
    }

    let detail = if values.len() == 1 && term.keep.is_none() {
        shown.remove(0)
    } else {
        format!("[{}]", shown.join(", "))
    };
    (total, detail)
}

struct Parser<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    /// Byte offset just past the last consumed token character.
    end: usize,
    default_sides: u32,
    depth: usize,
    operators: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, default_sides: u32) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            end: 0,
            default_sides,
            depth: 0,
            operators: 0,
        }
    }

    fn descend(&mut self) -> Result<(), DiceError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(DiceError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn operator(&mut self) -> Result<(), DiceError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(DiceError::TooManyOperators(MAX_OPERATORS));
        }
        self.bump();
        Ok(())
    }

    fn byte_pos(&self) -> usize {
        self.chars.get(self.pos).map(|(i, _)| *i).unwrap_or(self.src.len())
    }

    fn skip_ws(&mut self) {
        while let Some((_, c)) = self.chars.get(self.pos) {
            if !c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// Next character without skipping whitespace.
    fn peek_raw(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.peek_raw()
    }

    fn bump(&mut self) -> Option<char> {
        let (i, c) = *self.chars.get(self.pos)?;
        self.pos += 1;
        self.end = i + c.len_utf8();
        Some(c)
    }

    fn unexpected(&self) -> DiceError {
        match self.chars.get(self.pos) {
            Some((i, c)) => DiceError::Unexpected {
                found: *c,
                position: *i,
            },
            None => DiceError::UnexpectedEnd,
        }
    }

    fn expr(&mut self) -> Result<Node, DiceError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some('+') => Op::Add,
                Some('-') => Op::Sub,
                _ => break,
            };
            self.operator()?;
            let right = self.term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Node, DiceError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some('*') | Some('×') => Op::Mul,
                Some('/') => Op::Div,
                _ => break,
            };
            self.operator()?;
            let right = self.unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Node, DiceError> {
        let node = match self.peek() {
            Some('-') => {
                self.descend()?;
                self.bump();
                Node::Neg(Box::new(self.unary()?))
            }
            Some('+') => {
                self.descend()?;
                self.bump();
                self.unary()?
            }
            _ => return self.atom(),
        };
        self.depth -= 1;
        Ok(node)
    }

    fn atom(&mut self) -> Result<Node, DiceError> {
        match self.peek() {
            Some('(') => {
                self.descend()?;
                self.bump();
                let inner = self.expr()?;
                match self.peek() {
                    Some(')') => {
                        self.bump();
                        self.depth -= 1;
                        Ok(Node::Group(Box::new(inner)))
                    }
                    _ => Err(self.unexpected()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == 'd' || c == 'D' => self.dice_or_number(),
            _ => Err(self.unexpected()),
        }
    }

    fn number(&mut self) -> Result<Option<i64>, DiceError> {
        let mut digits = String::new();
        while let Some(c) = self.peek_raw() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.bump();
        }
        if digits.is_empty() {
            return Ok(None);
        }
        digits
            .parse::<i64>()
            .map(Some)
            .map_err(|_| DiceError::NumberTooLarge(digits))
    }

    fn dice_or_number(&mut self) -> Result<Node, DiceError> {
        let count = self.number()?;
        if !matches!(self.peek_raw(), Some('d') | Some('D')) {
            // atom() only calls us on a digit or 'd', so a missing count means a number was read
            return count.map(Node::Number).ok_or_else(|| self.unexpected());
        }
        self.bump();

        let count = to_u32(count.unwrap_or(1), DiceError::InvalidDiceCount)?;
        if count == 0 || count > MAX_DICE {
            return Err(DiceError::InvalidDiceCount(count));
        }

        let sides = if self.peek_raw() == Some('%') {
            self.bump();
            100
        } else {
            match self.number()? {
                Some(n) => to_u32(n, DiceError::InvalidDieSize)?,
                None => self.default_sides,
            }
        };
        if sides == 0 || sides > MAX_SIDES {
            return Err(DiceError::InvalidDieSize(sides));
        }

        let keep = self.keep_suffix()?;
        if let Some(Keep::Highest(n)) | Some(Keep::Lowest(n)) = keep {
            if n == 0 || n > count {
                return Err(DiceError::InvalidKeepCount { keep: n, count });
            }
        }

        Ok(Node::Dice(DiceTerm { count, sides, keep }))
    }

    fn keep_suffix(&mut self) -> Result<Option<Keep>, DiceError> {
        if !matches!(self.peek_raw(), Some('k') | Some('K')) {
            return Ok(None);
        }
        self.bump();
        let lowest = match self.peek_raw() {
            Some('h') | Some('H') => {
                self.bump();
                false
            }
            Some('l') | Some('L') => {
                self.bump();
                true
            }
            _ => false,
        };
        let n = match self.number()? {
            Some(n) => to_u32(n, |v| DiceError::InvalidKeepCount { keep: v, count: 0 })?,
            None => return Err(self.unexpected()),
        };
        Ok(Some(if lowest { Keep::Lowest(n) } else { Keep::Highest(n) }))
    }
}

fn to_u32(n: i64, err: impl Fn(u32) -> DiceError) -> Result<u32, DiceError> {
    u32::try_from(n).map_err(|_| err(u32::MAX))
}
