//! Built-in check suite behind the zero-argument CLI mode.
//!
//! Pipeline failures propagate as ordinary compile errors; property
//! mismatches abort with an assertion, mirroring the original's built-in
//! test mode. `cargo test` covers the same ground and more – this exists
//! so a bare binary can prove itself without the test harness.

use crate::error::CompileResult;
use crate::parser::{BinaryOp, Expr, Stmt, parse};
use crate::tokenizer::tokenize;

/// Constant-fold a pure arithmetic expression tree.
fn fold(expr: &Expr) -> u64 {
  match expr {
    Expr::Num { value } => *value,
    Expr::Binary { op, lhs, rhs } => {
      let (l, r) = (fold(lhs), fold(rhs));
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

fn declared_init<'a>(stmt: &'a Stmt, name: &str) -> &'a Expr {
  if let Stmt::Declaration {
    name: decl_name,
    init: Some(init),
    ..
  } = stmt
    && decl_name == name
  {
    return init;
  }
  panic!("expected a declaration of \"{name}\", got {stmt:?}");
}

/// Run the suite, returning the first pipeline error if any stage fails.
pub fn run() -> CompileResult<()> {
  let program = parse(tokenize(
    "u64 main() {\
       u64 foo = 1+2;\
       u64 bar = 4*2+1;\
       u64 zoo = 1+4*2;\
       u64 baz = func();\
       u64 booze = func()+1;\
       u64 bin = 1+func();\
       u64 fooze = 1+booze;\
       u64 same = 3=3;\
       u64 wrapped = outer(7+inner(), other());\
     }",
  )?)?;

  let body = &program.functions[0].body;
  assert_eq!(fold(declared_init(&body[0], "foo")), 3);
  assert_eq!(fold(declared_init(&body[1], "bar")), 9);
  assert_eq!(fold(declared_init(&body[2], "zoo")), 9);
  assert!(matches!(declared_init(&body[3], "baz"), Expr::Call { .. }));
  assert!(matches!(
    declared_init(&body[4], "booze"),
    Expr::Binary { lhs, rhs, .. }
      if matches!(**lhs, Expr::Call { .. }) && matches!(**rhs, Expr::Num { .. })
  ));
  assert!(matches!(
    declared_init(&body[5], "bin"),
    Expr::Binary { lhs, rhs, .. }
      if matches!(**lhs, Expr::Num { .. }) && matches!(**rhs, Expr::Call { .. })
  ));
  assert!(matches!(
    declared_init(&body[6], "fooze"),
    Expr::Binary { lhs, rhs, .. }
      if matches!(**lhs, Expr::Num { .. }) && matches!(**rhs, Expr::Var { .. })
  ));
  assert_eq!(fold(declared_init(&body[7], "same")), 1);

  let Expr::Call { name, args, .. } = declared_init(&body[8], "wrapped") else {
    panic!("expected a call initializer");
  };
  assert_eq!(name, "outer");
  assert_eq!(args.len(), 2);
  assert!(matches!(&args[0], Expr::Binary { .. }));
  assert!(matches!(&args[1], Expr::Call { .. }));

  // End to end: the generated body must compute 3 before the teardown.
  let asm = crate::generate_assembly("u64 main() { return 1+2; }")?;
  assert!(asm.contains("main:"));
  assert!(asm.contains("add rax, rcx"));
  assert!(asm.contains("mov rsp, rbp\n    pop rbp\n    ret"));

  Ok(())
}
