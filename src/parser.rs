//! Recursive-descent parser producing the program AST.
//!
//! Statements are parsed by straightforward descent; expressions use
//! precedence climbing over an explicit token cursor. The struct table is
//! threaded through every statement parser so declarations can be told
//! apart from assignments and calls by a type-resolution probe: a miss is
//! not an error, it just selects the other grammar branch.

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token};
use crate::ty::{Member, StructTable, Type};

/// Binary operators recognised by the language. `Eq` is the `=` comparison
/// operator, which in this language binds tighter than arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Eq,
}

impl BinaryOp {
  /// Precedence level used by the climbing loop; higher binds tighter.
  pub fn precedence(self) -> u8 {
    match self {
      BinaryOp::Add | BinaryOp::Sub => 0,
      BinaryOp::Mul => 1,
      BinaryOp::Eq => 2,
    }
  }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Num {
    value: u64,
  },
  Str {
    text: String,
  },
  Var {
    name: String,
    line: u32,
    col: u32,
  },
  /// First-class field access: `base.member`.
  Member {
    base: String,
    member: String,
    line: u32,
    col: u32,
  },
  /// `&place` – the place is always a `Var` or `Member` node.
  AddrOf {
    place: Box<Expr>,
  },
  Call {
    name: String,
    args: Vec<Expr>,
    line: u32,
    col: u32,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
}

impl Expr {
  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }
}

/// Left-hand side of an assignment statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
  Variable {
    name: String,
    line: u32,
    col: u32,
  },
  Member {
    base: String,
    member: String,
    line: u32,
    col: u32,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Declaration {
    name: String,
    ty: Type,
    init: Option<Expr>,
    line: u32,
    col: u32,
  },
  Assign {
    target: Target,
    value: Expr,
  },
  /// Assignment through a pointer: `*name = value;`.
  Store {
    name: String,
    value: Expr,
    line: u32,
    col: u32,
  },
  If {
    cond: Expr,
    body: Vec<Stmt>,
  },
  For {
    cond: Expr,
    body: Vec<Stmt>,
  },
  /// A bare call in statement position.
  Call(Expr),
  /// The `asm("...")` escape hatch; the text is emitted verbatim.
  InlineAsm(String),
  Return(Expr),
}

/// One declared function argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
  pub name: String,
  pub ty: Type,
  pub line: u32,
  pub col: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  pub return_type: Type,
  pub params: Vec<Param>,
  pub body: Vec<Stmt>,
}

/// The parsed compilation unit: functions in source order plus the struct
/// definitions registered while parsing them.
#[derive(Debug)]
pub struct Program {
  pub functions: Vec<Function>,
  pub structs: StructTable,
}

/// Parse a whole compilation unit from the token stream.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens);
  let mut structs = StructTable::default();
  let mut functions = Vec::new();

  while !stream.is_eof() {
    if stream.at_struct_definition() {
      parse_struct_definition(&mut stream, &mut structs)?;
    } else {
      functions.push(parse_function(&mut stream, &structs)?);
    }
  }

  Ok(Program { functions, structs })
}

/// `struct <name> { (<type> <ident> ,)* }` – registers the completed
/// descriptor so later declarations (and member offsets) resolve against it.
fn parse_struct_definition(
  stream: &mut TokenStream,
  structs: &mut StructTable,
) -> CompileResult<()> {
  stream.advance(); // the `struct` keyword
  let (name, line, col) = stream.expect_ident()?;
  if structs.contains(&name) {
    return Err(CompileError::syntax(
      line,
      col,
      format!("struct \"{name}\" is already defined"),
    ));
  }
  stream.skip(TokenKind::OpenBrace, "{")?;

  let mut members = Vec::new();
  while !stream.check(TokenKind::CloseBrace) {
    let (ty_line, ty_col) = stream.position();
    let Some(ty) = try_parse_type(stream, structs)? else {
      let got = stream.describe_current();
      return Err(CompileError::syntax(
        ty_line,
        ty_col,
        format!("expected a member type, but got \"{got}\""),
      ));
    };
    let (member_name, ..) = stream.expect_ident()?;
    stream.skip(TokenKind::Comma, ",")?;
    members.push(Member {
      name: member_name,
      ty,
    });
  }

  structs.define(&name, members);
  Ok(())
}

/// `<type> <ident> ( <typed-argument-list> ) { <codeblock> }`
fn parse_function(stream: &mut TokenStream, structs: &StructTable) -> CompileResult<Function> {
  let (line, col) = stream.position();
  let Some(return_type) = try_parse_type(stream, structs)? else {
    let got = stream.describe_current();
    return Err(CompileError::syntax(
      line,
      col,
      format!("expected a return type, but got \"{got}\""),
    ));
  };
  let (name, ..) = stream.expect_ident()?;
  stream.skip(TokenKind::OpenParen, "(")?;
  let params = parse_params(stream, structs)?;
  stream.skip(TokenKind::OpenBrace, "{")?;
  let body = parse_block(stream, structs)?;

  Ok(Function {
    name,
    return_type,
    params,
    body,
  })
}

/// Comma-separated `<type> <ident>` pairs up to the closing parenthesis.
fn parse_params(stream: &mut TokenStream, structs: &StructTable) -> CompileResult<Vec<Param>> {
  let mut params = Vec::new();
  if stream.check(TokenKind::CloseParen) {
    return Ok(params);
  }
  loop {
    let (line, col) = stream.position();
    let Some(ty) = try_parse_type(stream, structs)? else {
      let got = stream.describe_current();
      return Err(CompileError::syntax(
        line,
        col,
        format!("expected an argument type, but got \"{got}\""),
      ));
    };
    let (name, name_line, name_col) = stream.expect_ident()?;
    params.push(Param {
      name,
      ty,
      line: name_line,
      col: name_col,
    });
    if stream.check(TokenKind::Comma) {
      continue;
    }
    stream.skip(TokenKind::CloseParen, ")")?;
    break;
  }
  Ok(params)
}

/// Statements up to (and consuming) the closing brace.
fn parse_block(stream: &mut TokenStream, structs: &StructTable) -> CompileResult<Vec<Stmt>> {
  let mut stmts = Vec::new();
  loop {
    if stream.check(TokenKind::CloseBrace) {
      return Ok(stmts);
    }
    if stream.is_eof() {
      let (line, col) = stream.position();
      return Err(CompileError::syntax(line, col, "unexpected end of input inside a block"));
    }
    stmts.push(parse_stmt(stream, structs)?);
  }
}

fn parse_stmt(stream: &mut TokenStream, structs: &StructTable) -> CompileResult<Stmt> {
  let (line, col) = stream.position();

  // Pointer store: `*name = expr;`
  if stream.check(TokenKind::Star) {
    let (name, ..) = stream.expect_ident()?;
    stream.skip(TokenKind::Equals, "=")?;
    let value = parse_expr(stream)?;
    stream.skip(TokenKind::Semicolon, ";")?;
    return Ok(Stmt::Store {
      name,
      value,
      line,
      col,
    });
  }

  if !stream.at(TokenKind::Ident) {
    let got = stream.describe_current();
    return Err(CompileError::syntax(
      line,
      col,
      format!("expected a statement, but got \"{got}\""),
    ));
  }

  if stream.current_text() == "if" && stream.at_next(TokenKind::OpenParen) {
    return parse_if(stream, structs);
  }
  if stream.current_text() == "for" && stream.at_next(TokenKind::OpenParen) {
    return parse_for(stream, structs);
  }
  if stream.current_text() == "asm" && stream.at_next(TokenKind::OpenParen) {
    return parse_inline_asm(stream);
  }
  if stream.current_text() == "return" {
    stream.advance();
    let value = parse_expr(stream)?;
    stream.skip(TokenKind::Semicolon, ";")?;
    return Ok(Stmt::Return(value));
  }

  // A type-resolution hit means a declaration; a miss falls through to the
  // assignment and call forms.
  if let Some(ty) = try_parse_type(stream, structs)? {
    let (name, name_line, name_col) = stream.expect_ident()?;
    let init = if stream.check(TokenKind::Equals) {
      Some(parse_expr(stream)?)
    } else {
      None
    };
    stream.skip(TokenKind::Semicolon, ";")?;
    return Ok(Stmt::Declaration {
      name,
      ty,
      init,
      line: name_line,
      col: name_col,
    });
  }

  if stream.at_next(TokenKind::Equals) {
    let (name, name_line, name_col) = stream.expect_ident()?;
    stream.advance(); // `=`
    let value = parse_expr(stream)?;
    stream.skip(TokenKind::Semicolon, ";")?;
    return Ok(Stmt::Assign {
      target: Target::Variable {
        name,
        line: name_line,
        col: name_col,
      },
      value,
    });
  }

  if stream.at_next(TokenKind::Dot) {
    let (base, base_line, base_col) = stream.expect_ident()?;
    stream.advance(); // `.`
    let (member, ..) = stream.expect_ident()?;
    stream.skip(TokenKind::Equals, "=")?;
    let value = parse_expr(stream)?;
    stream.skip(TokenKind::Semicolon, ";")?;
    return Ok(Stmt::Assign {
      target: Target::Member {
        base,
        member,
        line: base_line,
        col: base_col,
      },
      value,
    });
  }

  if stream.at_next(TokenKind::OpenParen) {
    let call = parse_primary(stream)?;
    stream.skip(TokenKind::Semicolon, ";")?;
    return Ok(Stmt::Call(call));
  }

  let got = stream.describe_current();
  Err(CompileError::syntax(
    line,
    col,
    format!("expected a statement, but got \"{got}\""),
  ))
}

fn parse_if(stream: &mut TokenStream, structs: &StructTable) -> CompileResult<Stmt> {
  stream.advance(); // `if`
  stream.skip(TokenKind::OpenParen, "(")?;
  let cond = parse_expr(stream)?;
  stream.skip(TokenKind::CloseParen, ")")?;
  stream.skip(TokenKind::OpenBrace, "{")?;
  let body = parse_block(stream, structs)?;
  Ok(Stmt::If { cond, body })
}

/// `for (<expr>) { ... }` – the condition is re-evaluated every iteration;
/// there is no initializer or step clause.
fn parse_for(stream: &mut TokenStream, structs: &StructTable) -> CompileResult<Stmt> {
  stream.advance(); // `for`
  stream.skip(TokenKind::OpenParen, "(")?;
  let cond = parse_expr(stream)?;
  stream.skip(TokenKind::CloseParen, ")")?;
  stream.skip(TokenKind::OpenBrace, "{")?;
  let body = parse_block(stream, structs)?;
  Ok(Stmt::For { cond, body })
}

fn parse_inline_asm(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.advance(); // `asm`
  stream.advance(); // `(`
  let (line, col) = stream.position();
  if !stream.at(TokenKind::Str) {
    let got = stream.describe_current();
    return Err(CompileError::syntax(
      line,
      col,
      format!("asm expects a single string literal, but got \"{got}\""),
    ));
  }
  let text = stream.current_text().to_string();
  stream.advance();
  stream.skip(TokenKind::CloseParen, ")")?;
  stream.skip(TokenKind::Semicolon, ";")?;
  Ok(Stmt::InlineAsm(text))
}

/// Try to resolve a type at the cursor. Resolution order: the `struct`
/// keyword (which must name a registered struct), then the builtin table,
/// then an optional trailing `*` wrapping the base in a pointer. A miss
/// leaves the cursor unmoved and returns `None`.
fn try_parse_type(stream: &mut TokenStream, structs: &StructTable) -> CompileResult<Option<Type>> {
  if !stream.at(TokenKind::Ident) {
    return Ok(None);
  }

  let mut ty = if stream.current_text() == "struct" {
    stream.advance();
    let (name, line, col) = stream.expect_ident()?;
    let Some(ty) = structs.get(&name) else {
      return Err(CompileError::syntax(
        line,
        col,
        format!("unknown struct \"{name}\""),
      ));
    };
    ty.clone()
  } else {
    let Some(ty) = Type::builtin(stream.current_text()) else {
      return Ok(None);
    };
    stream.advance();
    ty
  };

  if stream.check(TokenKind::Star) {
    ty = Type::pointer_to(ty);
  }
  Ok(Some(ty))
}

/// Map the cursor token to a binary operator without consuming it.
fn peek_operator(stream: &TokenStream) -> Option<BinaryOp> {
  let op = match stream.current_kind() {
    TokenKind::Plus => BinaryOp::Add,
    TokenKind::Minus => BinaryOp::Sub,
    TokenKind::Star => BinaryOp::Mul,
    TokenKind::Equals => BinaryOp::Eq,
    _ => return None,
  };
  Some(op)
}

/// Expressions terminate at `;`, `)` or `,`; anything else that is not an
/// operator surfaces as a syntax error in the enclosing statement parser.
fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  let lhs = parse_primary(stream)?;
  parse_binary_rhs(stream, lhs, 0)
}

/// Precedence climbing: consume operators binding at least as tightly as
/// `min_prec`, recursing one level higher whenever the next operator binds
/// tighter, and fold the results into a left-leaning tree.
fn parse_binary_rhs(stream: &mut TokenStream, mut lhs: Expr, min_prec: u8) -> CompileResult<Expr> {
  while let Some(op) = peek_operator(stream) {
    if op.precedence() < min_prec {
      break;
    }
    stream.advance();
    let mut rhs = parse_primary(stream)?;
    while let Some(next) = peek_operator(stream) {
      if next.precedence() <= op.precedence() {
        break;
      }
      rhs = parse_binary_rhs(stream, rhs, op.precedence() + 1)?;
    }
    lhs = Expr::binary(op, lhs, rhs);
  }
  Ok(lhs)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let (line, col) = stream.position();
  match stream.current_kind() {
    TokenKind::Num => {
      let value = stream.current_text().parse::<u64>().map_err(|err| {
        CompileError::syntax(line, col, format!("invalid integer literal: {err}"))
      })?;
      stream.advance();
      Ok(Expr::Num { value })
    }
    TokenKind::Str => {
      let text = stream.current_text().to_string();
      stream.advance();
      Ok(Expr::Str { text })
    }
    TokenKind::Ampersand => {
      stream.advance();
      let place = parse_place(stream)?;
      Ok(Expr::AddrOf {
        place: Box::new(place),
      })
    }
    TokenKind::Ident if stream.at_next(TokenKind::OpenParen) => {
      let (name, name_line, name_col) = stream.expect_ident()?;
      stream.advance(); // `(`
      let args = parse_call_args(stream)?;
      Ok(Expr::Call {
        name,
        args,
        line: name_line,
        col: name_col,
      })
    }
    TokenKind::Ident => parse_place(stream),
    _ => {
      let got = stream.describe_current();
      Err(CompileError::syntax(
        line,
        col,
        format!("expected an expression, but got \"{got}\""),
      ))
    }
  }
}

/// A variable reference or single-level member access.
fn parse_place(stream: &mut TokenStream) -> CompileResult<Expr> {
  let (name, line, col) = stream.expect_ident()?;
  if stream.check(TokenKind::Dot) {
    let (member, ..) = stream.expect_ident()?;
    return Ok(Expr::Member {
      base: name,
      member,
      line,
      col,
    });
  }
  Ok(Expr::Var { name, line, col })
}

/// Comma-separated full expressions up to the closing parenthesis.
fn parse_call_args(stream: &mut TokenStream) -> CompileResult<Vec<Expr>> {
  let mut args = Vec::new();
  if stream.check(TokenKind::CloseParen) {
    return Ok(args);
  }
  loop {
    args.push(parse_expr(stream)?);
    if stream.check(TokenKind::Comma) {
      continue;
    }
    stream.skip(TokenKind::CloseParen, ")")?;
    break;
  }
  Ok(args)
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  /// Take ownership of the token stream; the parser advances `pos` as it
  /// consumes input. The tokenizer guarantees a trailing `Eof` token, so
  /// the cursor never runs off the end.
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn current(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn current_kind(&self) -> TokenKind {
    self.current().map_or(TokenKind::Eof, |t| t.kind)
  }

  fn current_text(&self) -> &str {
    self.current().map_or("", |t| t.text.as_str())
  }

  /// Line/column of the cursor token.
  fn position(&self) -> (u32, u32) {
    self.current().map_or((0, 0), |t| (t.line, t.col))
  }

  fn describe_current(&self) -> String {
    self
      .current()
      .map_or_else(|| "end of input".to_string(), describe_token)
  }

  fn advance(&mut self) {
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
  }

  /// Does the cursor token have this kind? Never consumes.
  fn at(&self, kind: TokenKind) -> bool {
    self.current_kind() == kind
  }

  /// Does the token after the cursor have this kind? Never consumes.
  fn at_next(&self, kind: TokenKind) -> bool {
    self
      .tokens
      .get(self.pos + 1)
      .is_some_and(|t| t.kind == kind)
  }

  /// `struct <ident> {` at the cursor – a definition, not a type use.
  fn at_struct_definition(&self) -> bool {
    self.at(TokenKind::Ident)
      && self.current_text() == "struct"
      && self.at_next(TokenKind::Ident)
      && self
        .tokens
        .get(self.pos + 2)
        .is_some_and(|t| t.kind == TokenKind::OpenBrace)
  }

  /// Consume the cursor token if it matches the kind.
  fn check(&mut self, kind: TokenKind) -> bool {
    if self.at(kind) {
      self.advance();
      return true;
    }
    false
  }

  fn skip(&mut self, kind: TokenKind, what: &str) -> CompileResult<()> {
    if self.check(kind) {
      Ok(())
    } else {
      let (line, col) = self.position();
      let got = self.describe_current();
      Err(CompileError::syntax(
        line,
        col,
        format!("expected \"{what}\", but got \"{got}\""),
      ))
    }
  }

  /// Consume the cursor token as an identifier, returning its text and
  /// position.
  fn expect_ident(&mut self) -> CompileResult<(String, u32, u32)> {
    if let Some(token) = self.current()
      && token.kind == TokenKind::Ident
    {
      let result = (token.text.clone(), token.line, token.col);
      self.advance();
      return Ok(result);
    }
    let (line, col) = self.position();
    let got = self.describe_current();
    Err(CompileError::syntax(
      line,
      col,
      format!("expected an identifier, but got \"{got}\""),
    ))
  }

  fn is_eof(&self) -> bool {
    self.at(TokenKind::Eof)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_source(src: &str) -> Program {
    parse(tokenize(src).expect("tokenize failed")).expect("parse failed")
  }

  fn parse_expression(src: &str) -> Expr {
    let tokens = tokenize(&format!("{src};")).expect("tokenize failed");
    let mut stream = TokenStream::new(tokens);
    parse_expr(&mut stream).expect("parse failed")
  }

  /// Constant-fold a pure arithmetic tree; only valid for test inputs.
  fn eval(expr: &Expr) -> u64 {
    match expr {
      Expr::Num { value } => *value,
      Expr::Binary { op, lhs, rhs } => {
        let (l, r) = (eval(lhs), eval(rhs));
        match op {
          BinaryOp::Add => l + r,
          BinaryOp::Sub => l - r,
          BinaryOp::Mul => l * r,
          BinaryOp::Eq => u64::from(l == r),
        }
      }
      _ => panic!("not a constant expression: {expr:?}"),
    }
  }

  #[test]
  fn integer_literal_is_a_primary() {
    assert_eq!(parse_expression("197"), Expr::Num { value: 197 });
  }

  #[test]
  fn precedence_and_associativity() {
    assert_eq!(eval(&parse_expression("1+2")), 3);
    assert_eq!(eval(&parse_expression("4*2+1")), 9);
    assert_eq!(eval(&parse_expression("1+4*2")), 9);
    assert_eq!(eval(&parse_expression("10-2-3")), 5);
    assert_eq!(eval(&parse_expression("2*3*4")), 24);
  }

  #[test]
  fn equality_binds_tighter_than_arithmetic() {
    // `1+2=2` reads as 1 + (2 = 2).
    assert_eq!(eval(&parse_expression("1+2=2")), 2);
    assert_eq!(eval(&parse_expression("3=3")), 1);
    assert_eq!(eval(&parse_expression("3=4")), 0);
  }

  #[test]
  fn binary_trees_lean_left() {
    let Expr::Binary { op, lhs, .. } = parse_expression("1+2+3") else {
      panic!("expected a binary expression");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(*lhs, Expr::Binary { .. }));
  }

  #[test]
  fn call_arguments_are_full_expressions() {
    let expr = parse_expression("add(7+gen(), gennum())");
    let Expr::Call { name, args, .. } = expr else {
      panic!("expected a call");
    };
    assert_eq!(name, "add");
    assert_eq!(args.len(), 2);
    assert!(matches!(&args[0], Expr::Binary { .. }));
    assert!(matches!(&args[1], Expr::Call { .. }));
  }

  #[test]
  fn address_of_and_member_places() {
    assert!(matches!(
      parse_expression("&foo"),
      Expr::AddrOf { place } if matches!(*place, Expr::Var { .. })
    ));
    assert!(matches!(
      parse_expression("point.x"),
      Expr::Member { .. }
    ));
  }

  #[test]
  fn parses_function_with_arguments() {
    let program = parse_source("u64 add(u64 a, u64 b) { return a + b; }");
    assert_eq!(program.functions.len(), 1);
    let func = &program.functions[0];
    assert_eq!(func.name, "add");
    assert_eq!(func.return_type, Type::builtin("u64").expect("builtin"));
    assert_eq!(func.params.len(), 2);
    assert_eq!(func.params[0].name, "a");
    assert!(matches!(func.body[0], Stmt::Return(_)));
  }

  #[test]
  fn pointer_declaration_resolves_to_pointer_type() {
    let program = parse_source("u64 main() { u32 *ptr = 22; return 0; }");
    let Stmt::Declaration { ty, init, .. } = &program.functions[0].body[0] else {
      panic!("expected a declaration");
    };
    assert_eq!(*ty, Type::pointer_to(Type::builtin("u32").expect("builtin")));
    assert_eq!(ty.size(), 8);
    assert_eq!(*init, Some(Expr::Num { value: 22 }));
  }

  #[test]
  fn struct_definition_registers_layout_for_later_declarations() {
    let program = parse_source(
      "struct pair { u64 first, u32 second, } \
       u64 main() { struct pair p; p.second = 9; return p.second; }",
    );
    let pair = program.structs.get("pair").expect("pair registered");
    assert_eq!(pair.size(), 12);
    assert_eq!(pair.member_offset("second").map(|(off, _)| off), Some(8));
    let Stmt::Declaration { ty, .. } = &program.functions[0].body[0] else {
      panic!("expected a declaration");
    };
    assert_eq!(ty.size(), 12);
    assert!(matches!(
      &program.functions[0].body[1],
      Stmt::Assign {
        target: Target::Member { .. },
        ..
      }
    ));
  }

  #[test]
  fn statement_forms() {
    let program = parse_source(
      "u64 main() { \
         u64 x = 1; \
         x = 2; \
         u64 *p = &x; \
         *p = 3; \
         if (x) { x = 4; } \
         for (x) { x = x - 1; } \
         asm(\"syscall\"); \
         exit(); \
         return x; \
       }",
    );
    let body = &program.functions[0].body;
    assert!(matches!(body[0], Stmt::Declaration { .. }));
    assert!(matches!(
      body[1],
      Stmt::Assign {
        target: Target::Variable { .. },
        ..
      }
    ));
    assert!(matches!(body[2], Stmt::Declaration { .. }));
    assert!(matches!(body[3], Stmt::Store { .. }));
    assert!(matches!(body[4], Stmt::If { .. }));
    assert!(matches!(body[5], Stmt::For { .. }));
    assert_eq!(body[6], Stmt::InlineAsm("syscall".to_string()));
    assert!(matches!(body[7], Stmt::Call(Expr::Call { .. })));
    assert!(matches!(body[8], Stmt::Return(_)));
  }

  #[test]
  fn missing_semicolon_is_a_positioned_syntax_error() {
    let err = parse(tokenize("u64 main() { return 1 }").expect("tokenize failed"))
      .expect_err("expected syntax error");
    assert!(err.to_string().contains("expected \";\""));
    assert!(err.to_string().starts_with("1:23"));
  }

  #[test]
  fn unknown_struct_in_type_position_fails() {
    let err = parse(tokenize("u64 main() { struct nope x; return 0; }").expect("tokenize failed"))
      .expect_err("expected syntax error");
    assert!(err.to_string().contains("unknown struct"));
  }

  #[test]
  fn struct_redefinition_fails() {
    let err = parse(
      tokenize("struct a { u64 x, } struct a { u64 y, } u64 main() { return 0; }")
        .expect("tokenize failed"),
    )
    .expect_err("expected syntax error");
    assert!(err.to_string().contains("already defined"));
  }

  #[test]
  fn unclosed_block_fails() {
    let err = parse(tokenize("u64 main() { return 1;").expect("tokenize failed"))
      .expect_err("expected syntax error");
    assert!(err.to_string().contains("end of input"));
  }

  #[test]
  fn non_call_expression_statement_fails() {
    let err = parse(tokenize("u64 main() { x + 1; }").expect("tokenize failed"))
      .expect_err("expected syntax error");
    assert!(err.to_string().contains("expected a statement"));
  }
}
