//! Tokenizer and recursive-descent parser for the stage-script language.
//!
//! Scripts are sequences of expression statements separated by `;` or
//! newlines. Identifiers are case-insensitive and become VM variables on
//! first use.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    BitAnd,
    BitOr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Built-in functions with fixed arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncId {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sqrt,
    Sqr,
    Pow,
    Exp,
    Log,
    Log10,
    Abs,
    Min,
    Max,
    Sign,
    Floor,
    Ceil,
    Sigmoid,
    If,
    Equal,
    Above,
    Below,
    Band,
    Bor,
    Rand,
    Clamp,
    Smooth,
    GetOsc,
    GetSpec,
    GetTime,
    GetKbMouse,
    SetMousePos,
    MegaBuf,
    GMegaBuf,
}

impl FuncId {
    fn lookup(name: &str) -> Option<(Self, usize)> {
        let id = match name {
            "sin" => (Self::Sin, 1),
            "cos" => (Self::Cos, 1),
            "tan" => (Self::Tan, 1),
            "asin" => (Self::Asin, 1),
            "acos" => (Self::Acos, 1),
            "atan" => (Self::Atan, 1),
            "atan2" => (Self::Atan2, 2),
            "sqrt" => (Self::Sqrt, 1),
            "sqr" => (Self::Sqr, 1),
            "pow" => (Self::Pow, 2),
            "exp" => (Self::Exp, 1),
            "log" => (Self::Log, 1),
            "log10" => (Self::Log10, 1),
            "abs" => (Self::Abs, 1),
            "min" => (Self::Min, 2),
            "max" => (Self::Max, 2),
            "sign" => (Self::Sign, 1),
            "floor" => (Self::Floor, 1),
            "ceil" => (Self::Ceil, 1),
            "sigmoid" => (Self::Sigmoid, 2),
            "if" => (Self::If, 3),
            "equal" => (Self::Equal, 2),
            "above" => (Self::Above, 2),
            "below" => (Self::Below, 2),
            "band" => (Self::Band, 2),
            "bor" => (Self::Bor, 2),
            "rand" => (Self::Rand, 0),
            "clamp" => (Self::Clamp, 3),
            "smooth" => (Self::Smooth, 3),
            "getosc" => (Self::GetOsc, 3),
            "getspec" => (Self::GetSpec, 3),
            "gettime" => (Self::GetTime, 1),
            "getkbmouse" => (Self::GetKbMouse, 1),
            "setmousepos" => (Self::SetMousePos, 2),
            "megabuf" => (Self::MegaBuf, 1),
            "gmegabuf" => (Self::GMegaBuf, 1),
            _ => return None,
        };
        Some(id)
    }
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Var(usize),
    MegaBuf(Box<Expr>),
    GMegaBuf(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    Var(usize),
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Call {
        func: FuncId,
        args: Vec<Expr>,
    },
}

/// A compiled stage: statements executed in order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

fn err(message: impl Into<String>) -> ParseError {
    ParseError {
        message: message.into(),
    }
}

/// Supplies variable slots for identifiers encountered during parsing.
pub trait VarInterner {
    fn intern(&mut self, name: &str) -> usize;
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Amp,
    Pipe,
    AndAnd,
    OrOr,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    LParen,
    RParen,
    Comma,
    Semi,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\r' => i += 1,
            '\n' | ';' => {
                tokens.push(Token::Semi);
                i += 1;
            }
            '/' if i + 1 < bytes.len() && bytes[i + 1] == '/' => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '&' => {
                if bytes.get(i + 1) == Some(&'&') {
                    tokens.push(Token::AndAnd);
                    i += 2;
                } else {
                    tokens.push(Token::Amp);
                    i += 1;
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&'|') {
                    tokens.push(Token::OrOr);
                    i += 2;
                } else {
                    tokens.push(Token::Pipe);
                    i += 1;
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    tokens.push(Token::Bang);
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    tokens.push(Token::Assign);
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '+' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::PlusAssign);
                    i += 2;
                } else {
                    tokens.push(Token::Plus);
                    i += 1;
                }
            }
            '-' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::MinusAssign);
                    i += 2;
                } else {
                    tokens.push(Token::Minus);
                    i += 1;
                }
            }
            '*' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::StarAssign);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::SlashAssign);
                    i += 2;
                } else {
                    tokens.push(Token::Slash);
                    i += 1;
                }
            }
            '%' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push(Token::PercentAssign);
                    i += 2;
                } else {
                    tokens.push(Token::Percent);
                    i += 1;
                }
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_alphanumeric() {
                    end += 1;
                }
                let name: String = bytes[start..end].iter().collect::<String>().to_ascii_lowercase();
                match name.as_str() {
                    "pi" => tokens.push(Token::Num(std::f64::consts::PI)),
                    "e" => tokens.push(Token::Num(std::f64::consts::E)),
                    "phi" => tokens.push(Token::Num(1.618_033_988_749_895)),
                    _ => return Err(err(format!("unknown constant ${name}"))),
                }
                i = end;
            }
            '0'..='9' | '.' => {
                let start = i;
                let mut end = i;
                let mut seen_dot = false;
                while end < bytes.len() {
                    let d = bytes[end];
                    if d.is_ascii_digit() {
                        end += 1;
                    } else if d == '.' && !seen_dot {
                        seen_dot = true;
                        end += 1;
                    } else {
                        break;
                    }
                }
                let text: String = bytes[start..end].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| err(format!("bad number literal '{text}'")))?;
                tokens.push(Token::Num(value));
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut end = i;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == '_')
                {
                    end += 1;
                }
                let name: String = bytes[start..end].iter().collect::<String>().to_ascii_lowercase();
                tokens.push(Token::Ident(name));
                i = end;
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a, I: VarInterner> {
    tokens: Vec<Token>,
    pos: usize,
    vars: &'a mut I,
}

impl<I: VarInterner> Parser<'_, I> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Token::Semi) {}
            if self.peek().is_none() {
                break;
            }
            statements.push(self.parse_assign()?);
            if self.peek().is_some() && !self.eat(&Token::Semi) {
                return Err(err("expected ';' between statements"));
            }
        }
        Ok(Program { statements })
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_or()?;
        let op = match self.peek() {
            Some(Token::Assign) => AssignOp::Set,
            Some(Token::PlusAssign) => AssignOp::Add,
            Some(Token::MinusAssign) => AssignOp::Sub,
            Some(Token::StarAssign) => AssignOp::Mul,
            Some(Token::SlashAssign) => AssignOp::Div,
            Some(Token::PercentAssign) => AssignOp::Rem,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let target = match lhs {
            Expr::Var(slot) => AssignTarget::Var(slot),
            Expr::Call {
                func: FuncId::MegaBuf,
                mut args,
            } => AssignTarget::MegaBuf(Box::new(args.remove(0))),
            Expr::Call {
                func: FuncId::GMegaBuf,
                mut args,
            } => AssignTarget::GMegaBuf(Box::new(args.remove(0))),
            _ => return Err(err("left side of assignment is not assignable")),
        };
        let value = Box::new(self.parse_assign()?);
        Ok(Expr::Assign { target, op, value })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bit_or()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_bit_or()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bit_and()?;
        while self.eat(&Token::Pipe) {
            let rhs = self.parse_bit_and()?;
            lhs = Expr::Binary {
                op: BinOp::BitOr,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::Amp) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinOp::BitAnd,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Ge) => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_power()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_unary()?;
        if self.eat(&Token::Caret) {
            // right associative
            let rhs = self.parse_power()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.parse_assign()?;
                if !self.eat(&Token::RParen) {
                    return Err(err("missing ')'"));
                }
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let (func, arity) = FuncId::lookup(&name)
                        .ok_or_else(|| err(format!("unknown function '{name}'")))?;
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.parse_assign()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            if !self.eat(&Token::Comma) {
                                return Err(err(format!("bad argument list for '{name}'")));
                            }
                        }
                    }
                    if args.len() != arity {
                        return Err(err(format!(
                            "'{name}' takes {arity} argument(s), got {}",
                            args.len()
                        )));
                    }
                    Ok(Expr::Call { func, args })
                } else {
                    Ok(Expr::Var(self.vars.intern(&name)))
                }
            }
            other => Err(err(format!("unexpected token {other:?}"))),
        }
    }
}

/// Parse one stage script, creating variables through `vars` on first use.
pub fn parse<I: VarInterner>(source: &str, vars: &mut I) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        vars,
    };
    parser.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct TestVars {
        map: FxHashMap<String, usize>,
    }

    impl VarInterner for TestVars {
        fn intern(&mut self, name: &str) -> usize {
            let next = self.map.len();
            *self.map.entry(name.to_string()).or_insert(next)
        }
    }

    #[test]
    fn parses_statement_sequences() {
        let mut vars = TestVars::default();
        let program = parse("n=800; t=t-0.05", &mut vars).unwrap();
        assert_eq!(program.statements.len(), 2);
        assert!(vars.map.contains_key("n"));
        assert!(vars.map.contains_key("t"));
    }

    #[test]
    fn parses_default_superscope_point_script() {
        let mut vars = TestVars::default();
        let program = parse(
            "d=i+v*0.2; r=t+i*$PI*4; x=cos(r)*d; y=sin(r)*d",
            &mut vars,
        )
        .unwrap();
        assert_eq!(program.statements.len(), 4);
    }

    #[test]
    fn rejects_unknown_function_and_bad_arity() {
        let mut vars = TestVars::default();
        assert!(parse("x=frobnicate(1)", &mut vars).is_err());
        assert!(parse("x=sin(1,2)", &mut vars).is_err());
    }

    #[test]
    fn rejects_non_assignable_lhs() {
        let mut vars = TestVars::default();
        assert!(parse("1+2=3", &mut vars).is_err());
    }

    #[test]
    fn megabuf_is_assignable() {
        let mut vars = TestVars::default();
        let program = parse("megabuf(3)=7; x=megabuf(3)", &mut vars).unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn case_insensitive_identifiers() {
        let mut vars = TestVars::default();
        parse("Foo=1; FOO=foo+1", &mut vars).unwrap();
        assert_eq!(vars.map.len(), 1);
    }
}
