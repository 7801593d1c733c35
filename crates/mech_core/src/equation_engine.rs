use crate::error::{CompileError, ParseError};
use crate::symbolic::{Expr, Func, TIME};
use crate::traits::{DynamicalSystem, Scalar};
use std::cell::RefCell;
use std::collections::HashMap;

/// OpCodes for the stack-based virtual machine.
/// The VM operates on a stack of `Scalar` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant.
    LoadConst(f64),
    /// Pushes the position of a coordinate (by index).
    LoadPosition(usize),
    /// Pushes the velocity of a coordinate (by index).
    LoadVelocity(usize),
    /// Pushes the value of a parameter (by index).
    LoadParam(usize),
    /// Pushes the current time.
    LoadTime,
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes a^n.
    PowI(i32),
    /// Pops top value (a), pushes f(a).
    Call(Func),
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Values the bytecode reads from.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a, T> {
    pub t: T,
    pub positions: &'a [T],
    pub velocities: &'a [T],
    pub params: &'a [T],
}

/// Stack-based virtual machine for evaluating compiled expressions.
///
/// The VM is stateless; `execute` receives the bytecode, the frame of values
/// it may load, and a reusable stack buffer.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, frame: &Frame<'_, T>, stack: &mut Vec<T>) -> T {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(value) => stack.push(T::lit(value)),
                OpCode::LoadPosition(idx) => stack.push(frame.positions[idx]),
                OpCode::LoadVelocity(idx) => stack.push(frame.velocities[idx]),
                OpCode::LoadParam(idx) => stack.push(frame.params[idx]),
                OpCode::LoadTime => stack.push(frame.t),
                OpCode::Add => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a + b);
                }
                OpCode::Mul => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a * b);
                }
                OpCode::Pow => {
                    let (a, b) = pop_pair(stack);
                    stack.push(a.powf(b));
                }
                OpCode::PowI(n) => {
                    let a = stack.pop().unwrap_or_else(T::nan);
                    stack.push(a.powi(n));
                }
                OpCode::Call(func) => {
                    let a = stack.pop().unwrap_or_else(T::nan);
                    stack.push(apply_func(func, a));
                }
            }
        }

        // Compiled expressions always leave exactly one value.
        stack.pop().unwrap_or_else(T::nan)
    }
}

fn pop_pair<T: Scalar>(stack: &mut Vec<T>) -> (T, T) {
    let b = stack.pop().unwrap_or_else(T::nan);
    let a = stack.pop().unwrap_or_else(T::nan);
    (a, b)
}

fn apply_func<T: Scalar>(func: Func, a: T) -> T {
    match func {
        Func::Sin => a.sin(),
        Func::Cos => a.cos(),
        Func::Tan => a.tan(),
        Func::Exp => a.exp(),
        Func::Ln => a.ln(),
        Func::Sinh => a.sinh(),
        Func::Cosh => a.cosh(),
    }
}

/// Compiles a symbolic [`Expr`] into [`Bytecode`].
///
/// Coordinate functions `q(t)` and `q'(t)` resolve to the position and
/// velocity slots of `q`, other symbols to parameters, `t` to the time.
pub struct Compiler {
    pub function_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(function_names: &[String], param_names: &[String]) -> Self {
        let function_map = function_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            function_map,
            param_map,
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, CompileError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn function_index(&self, name: &str) -> Result<usize, CompileError> {
        self.function_map
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UnknownSymbol(format!("{name}({TIME})")))
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), CompileError> {
        match expr {
            Expr::Num(value) => ops.push(OpCode::LoadConst(*value)),
            Expr::Sym(name) if name == TIME => ops.push(OpCode::LoadTime),
            Expr::Sym(name) => match self.param_map.get(name) {
                Some(&idx) => ops.push(OpCode::LoadParam(idx)),
                None => return Err(CompileError::UnknownSymbol(name.clone())),
            },
            Expr::Fun(name) => ops.push(OpCode::LoadPosition(self.function_index(name)?)),
            Expr::Deriv(name, 1) => ops.push(OpCode::LoadVelocity(self.function_index(name)?)),
            Expr::Deriv(name, order) => {
                return Err(CompileError::UnsupportedDerivative {
                    name: name.clone(),
                    order: *order,
                })
            }
            Expr::Add(operands) | Expr::Mul(operands) => {
                let op = if matches!(expr, Expr::Add(_)) {
                    OpCode::Add
                } else {
                    OpCode::Mul
                };
                for (i, operand) in operands.iter().enumerate() {
                    self.compile_recursive(operand, ops)?;
                    if i > 0 {
                        ops.push(op);
                    }
                }
            }
            Expr::Pow(base, exponent) => {
                self.compile_recursive(base, ops)?;
                match exponent.as_num() {
                    Some(e) if e.fract() == 0.0 && e.abs() <= f64::from(i32::MAX) => {
                        ops.push(OpCode::PowI(e as i32))
                    }
                    _ => {
                        self.compile_recursive(exponent, ops)?;
                        ops.push(OpCode::Pow);
                    }
                }
            }
            Expr::Call(func, arg) => {
                self.compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(*func));
            }
        }
        Ok(())
    }
}

// --- Parser ---

/// Parses a string expression into a symbolic [`Expr`].
///
/// Grammar, loosest binding first: `+ -`, `* /`, unary `-`, `^` (right
/// associative), then numbers, symbols, calls and parentheses.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ParseError::UnexpectedToken {
            found: token.kind.describe(),
            position: token.position,
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Number(value) => value.to_string(),
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Plus => "+".to_string(),
            TokenKind::Minus => "-".to_string(),
            TokenKind::Star => "*".to_string(),
            TokenKind::Slash => "/".to_string(),
            TokenKind::Caret => "^".to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut text = String::new();
            let mut previous = ' ';
            while let Some(&(_, d)) = chars.peek() {
                let exponent_sign = (d == '+' || d == '-') && (previous == 'e' || previous == 'E');
                if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                    text.push(d);
                    previous = d;
                    chars.next();
                } else {
                    break;
                }
            }
            let value = text
                .parse()
                .map_err(|_| ParseError::InvalidNumber { text, position })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position,
            });
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Identifier(ident),
                position,
            });
        } else {
            let kind = match c {
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '^' => TokenKind::Caret,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                found => return Err(ParseError::UnknownCharacter { found, position }),
            };
            tokens.push(Token { kind, position });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_position(&self) -> usize {
        self.tokens.last().map_or(0, |token| token.position + 1)
    }

    fn expect_closing(&mut self) -> Result<(), ParseError> {
        match self.consume() {
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => Ok(()),
            Some(token) => Err(ParseError::ExpectedClosingParen {
                position: token.position,
            }),
            None => Err(ParseError::ExpectedClosingParen {
                position: self.end_position(),
            }),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;

        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Plus => {
                    self.consume();
                    left = left + self.parse_term()?;
                }
                TokenKind::Minus => {
                    self.consume();
                    left = left - self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Star => {
                    self.consume();
                    left = left * self.parse_unary()?;
                }
                TokenKind::Slash => {
                    self.consume();
                    left = left / self.parse_unary()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.consume();
                Ok(-self.parse_unary()?)
            }
            Some(TokenKind::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if let Some(TokenKind::Caret) = self.peek_kind() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.consume().ok_or(ParseError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::num(value)),
            TokenKind::Identifier(name) => {
                if let Some(TokenKind::LParen) = self.peek_kind() {
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_closing()?;
                    if name == "sqrt" {
                        return Ok(Expr::sqrt(arg));
                    }
                    match Func::from_name(&name) {
                        Some(func) => Ok(Expr::call(func, arg)),
                        None => Err(ParseError::UnknownFunction {
                            name,
                            position: token.position,
                        }),
                    }
                } else {
                    Ok(Expr::Sym(name))
                }
            }
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect_closing()?;
                Ok(expr)
            }
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                position: token.position,
            }),
        }
    }
}

// --- MotionSystem ---

/// Equations of motion in first-order form, evaluated with the VM.
///
/// The state holds the positions of all coordinates followed by their
/// velocities; each compiled bytecode yields the acceleration of one
/// coordinate.
pub struct MotionSystem<T: Scalar> {
    pub accelerations: Vec<Bytecode>,
    pub params: Vec<T>,
    // Interior mutability for the VM stack to avoid allocating in `apply`.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> MotionSystem<T> {
    pub fn new(accelerations: Vec<Bytecode>, params: Vec<T>) -> Self {
        Self {
            accelerations,
            params,
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }

    pub fn coordinates(&self) -> usize {
        self.accelerations.len()
    }
}

impl<T: Scalar> DynamicalSystem<T> for MotionSystem<T> {
    fn dimension(&self) -> usize {
        2 * self.accelerations.len()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        let n = self.accelerations.len();
        let (positions, velocities) = x.split_at(n);
        out[..n].copy_from_slice(velocities);

        let frame = Frame {
            t,
            positions,
            velocities,
            params: &self.params,
        };
        let mut stack = self.stack.borrow_mut();
        for (i, acceleration) in self.accelerations.iter().enumerate() {
            out[n + i] = VM::execute(acceleration, &frame, &mut stack);
        }
    }
}
