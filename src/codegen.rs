//! Code generation: lower the parsed program into NASM-flavoured x86-64.
//!
//! Every expression leaves its value in `rax`; binary operators evaluate
//! their right operand first, park it on the machine stack and restore it
//! into `rcx` once the left operand is in the accumulator. Locals live at
//! negative `rbp` offsets, arguments at positive ones (one pointer width
//! past the saved frame pointer and return address). String literals are
//! deferred into data fragments and emitted after all function bodies.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::error::{CompileError, CompileResult};
use crate::parser::{BinaryOp, Expr, Function, Program, Stmt, Target};
use crate::ty::{POINTER_WIDTH, Type};

/// One resolved variable inside the function being lowered.
struct Symbol {
  offset: u64,
  is_argument: bool,
  ty: Type,
}

/// Per-function symbol state, created for one function's lowering pass and
/// dropped when it completes.
#[derive(Default)]
struct Frame {
  symbols: FxHashMap<String, Symbol>,
  /// Running total of local declaration sizes; doubles as the offset of
  /// the most recent local. A single counter serves the whole function,
  /// nested blocks included.
  local_offset: u64,
}

/// A string literal waiting for the data section.
struct DataFragment {
  label: String,
  bytes: Vec<u8>,
}

/// Emit assembly for a whole program.
pub fn generate(program: &Program) -> CompileResult<String> {
  let mut codegen = Codegen::default();
  for func in &program.functions {
    codegen.emit_function(func)?;
  }
  Ok(codegen.finish())
}

#[derive(Default)]
struct Codegen {
  text: String,
  data: Vec<DataFragment>,
  /// Monotonic counter behind every generated label, so branch targets and
  /// data labels are unique across the whole compilation.
  labels: u64,
}

impl Codegen {
  fn fresh_label(&mut self, prefix: &str) -> String {
    let n = self.labels;
    self.labels += 1;
    format!("{prefix}{n}")
  }

  fn emit_function(&mut self, func: &Function) -> CompileResult<()> {
    let mut frame = Frame::default();
    let mut offset = POINTER_WIDTH;
    for param in &func.params {
      if frame.symbols.contains_key(&param.name) {
        return Err(CompileError::semantic(
          param.line,
          param.col,
          format!("redeclaration of argument \"{}\"", param.name),
        ));
      }
      frame.symbols.insert(
        param.name.clone(),
        Symbol {
          offset,
          is_argument: true,
          ty: param.ty.clone(),
        },
      );
      offset += POINTER_WIDTH;
    }

    let _ = writeln!(self.text, "{}:", func.name);
    self.text.push_str("    push rbp\n");
    self.text.push_str("    mov rbp, rsp\n");

    // The frame allocation has to precede the body, so the locals total is
    // discovered by a pre-pass over the declaration list.
    let locals = locals_size(&func.body);
    if locals > 0 {
      let _ = writeln!(self.text, "    sub rsp, 0x{:x}", locals + POINTER_WIDTH);
    }

    self.emit_block(&func.body, &mut frame)?;

    self.text.push_str("    mov rsp, rbp\n");
    self.text.push_str("    pop rbp\n");
    self.text.push_str("    ret\n\n");
    Ok(())
  }

  fn emit_block(&mut self, stmts: &[Stmt], frame: &mut Frame) -> CompileResult<()> {
    for stmt in stmts {
      self.emit_stmt(stmt, frame)?;
    }
    Ok(())
  }

  fn emit_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> CompileResult<()> {
    match stmt {
      Stmt::Declaration {
        name,
        ty,
        init,
        line,
        col,
      } => {
        if frame.symbols.contains_key(name) {
          return Err(CompileError::semantic(
            *line,
            *col,
            format!("redeclaration of variable \"{name}\""),
          ));
        }
        frame.local_offset += ty.size();
        let offset = frame.local_offset;
        frame.symbols.insert(
          name.clone(),
          Symbol {
            offset,
            is_argument: false,
            ty: ty.clone(),
          },
        );
        if let Some(init) = init {
          let reg = register_for(ty.size(), *line, *col)?;
          self.emit_expr(init, frame)?;
          let _ = writeln!(self.text, "    mov [rbp-0x{offset:x}], {reg}");
        }
      }
      Stmt::Assign { target, value } => match target {
        Target::Variable { name, line, col } => {
          let sym = lookup(frame, name, *line, *col)?;
          let (offset, is_argument) = (sym.offset, sym.is_argument);
          let reg = register_for(sym.ty.size(), *line, *col)?;
          self.emit_expr(value, frame)?;
          if is_argument {
            let _ = writeln!(self.text, "    mov [rbp+0x{:x}], {reg}", offset + POINTER_WIDTH);
          } else {
            let _ = writeln!(self.text, "    mov [rbp-0x{offset:x}], {reg}");
          }
        }
        Target::Member {
          base,
          member,
          line,
          col,
        } => {
          let (offset, size) = resolve_member(frame, base, member, *line, *col)?;
          let reg = register_for(size, *line, *col)?;
          self.emit_expr(value, frame)?;
          let _ = writeln!(self.text, "    mov [rbp-0x{offset:x}], {reg}");
        }
      },
      Stmt::Store {
        name,
        value,
        line,
        col,
      } => {
        let sym = lookup(frame, name, *line, *col)?;
        if !sym.ty.is_pointer() {
          return Err(CompileError::semantic(
            *line,
            *col,
            format!("cannot assign through \"{name}\": its type is {}, not a pointer", sym.ty.name()),
          ));
        }
        let (offset, is_argument) = (sym.offset, sym.is_argument);
        // The value lands in rax first; rcx would be clobbered by any
        // compound expression if the pointer were loaded up front.
        self.emit_expr(value, frame)?;
        if is_argument {
          let _ = writeln!(self.text, "    mov rcx, [rbp+0x{:x}]", offset + POINTER_WIDTH);
        } else {
          let _ = writeln!(self.text, "    mov rcx, [rbp-0x{offset:x}]");
        }
        self.text.push_str("    mov [rcx], rax\n");
      }
      Stmt::If { cond, body } => {
        self.emit_expr(cond, frame)?;
        // rax & rax is zero exactly when the condition value is zero.
        self.text.push_str("    and rax, rax\n");
        let end = self.fresh_label("_end_if_");
        let _ = writeln!(self.text, "    jz {end}");
        self.emit_block(body, frame)?;
        let _ = writeln!(self.text, "{end}:");
      }
      Stmt::For { cond, body } => {
        let top = self.fresh_label("_for_");
        let end = self.fresh_label("_end_for_");
        let _ = writeln!(self.text, "{top}:");
        self.emit_expr(cond, frame)?;
        self.text.push_str("    and rax, rax\n");
        let _ = writeln!(self.text, "    jz {end}");
        self.emit_block(body, frame)?;
        let _ = writeln!(self.text, "    jmp {top}");
        let _ = writeln!(self.text, "{end}:");
      }
      Stmt::Call(call) => {
        self.emit_expr(call, frame)?;
      }
      Stmt::InlineAsm(text) => {
        self.text.push_str(text);
        if !text.ends_with('\n') {
          self.text.push('\n');
        }
      }
      Stmt::Return(value) => {
        self.emit_expr(value, frame)?;
        self.text.push_str("    mov rsp, rbp\n");
        self.text.push_str("    pop rbp\n");
        self.text.push_str("    ret\n");
      }
    }
    Ok(())
  }

  fn emit_expr(&mut self, expr: &Expr, frame: &Frame) -> CompileResult<()> {
    match expr {
      Expr::Num { value } => {
        let _ = writeln!(self.text, "    mov rax, {value}");
      }
      Expr::Str { text } => {
        let label = self.fresh_label("_data_");
        let _ = writeln!(self.text, "    mov rax, {label}");
        self.data.push(DataFragment {
          label,
          bytes: text.clone().into_bytes(),
        });
      }
      Expr::Var { name, line, col } => {
        let sym = lookup(frame, name, *line, *col)?;
        let reg = register_for(sym.ty.size(), *line, *col)?;
        if sym.is_argument {
          let _ = writeln!(self.text, "    mov {reg}, [rbp+0x{:x}]", sym.offset + POINTER_WIDTH);
        } else {
          let _ = writeln!(self.text, "    mov {reg}, [rbp-0x{:x}]", sym.offset);
        }
      }
      Expr::Member {
        base,
        member,
        line,
        col,
      } => {
        let (offset, size) = resolve_member(frame, base, member, *line, *col)?;
        let reg = register_for(size, *line, *col)?;
        let _ = writeln!(self.text, "    mov {reg}, [rbp-0x{offset:x}]");
      }
      Expr::AddrOf { place } => self.emit_place_address(place, frame)?,
      Expr::Call { name, args, .. } => {
        // Arguments go onto the stack in reverse declaration order, each
        // one fully evaluated before it is pushed.
        for arg in args.iter().rev() {
          self.emit_expr(arg, frame)?;
          self.text.push_str("    push rax\n");
        }
        let _ = writeln!(self.text, "    call {name}");
        let _ = writeln!(self.text, "    add rsp, {}", args.len() as u64 * POINTER_WIDTH);
      }
      Expr::Binary { op, lhs, rhs } => {
        self.emit_expr(rhs, frame)?;
        self.text.push_str("    push rax\n");
        self.emit_expr(lhs, frame)?;
        self.text.push_str("    pop rcx\n");
        match op {
          BinaryOp::Add => self.text.push_str("    add rax, rcx\n"),
          BinaryOp::Sub => self.text.push_str("    sub rax, rcx\n"),
          BinaryOp::Mul => self.text.push_str("    mul rcx\n"),
          BinaryOp::Eq => {
            let skip = self.fresh_label("_eq_");
            self.text.push_str("    mov rdx, 0\n");
            self.text.push_str("    cmp rax, rcx\n");
            let _ = writeln!(self.text, "    jne {skip}");
            self.text.push_str("    mov rdx, 1\n");
            let _ = writeln!(self.text, "{skip}:");
            self.text.push_str("    mov rax, rdx\n");
          }
        }
      }
    }
    Ok(())
  }

  /// Compute the absolute address of a variable or member slot into rax.
  fn emit_place_address(&mut self, place: &Expr, frame: &Frame) -> CompileResult<()> {
    match place {
      Expr::Var { name, line, col } => {
        let sym = lookup(frame, name, *line, *col)?;
        self.text.push_str("    mov rax, rbp\n");
        if sym.is_argument {
          let _ = writeln!(self.text, "    add rax, 0x{:x}", sym.offset + POINTER_WIDTH);
        } else {
          let _ = writeln!(self.text, "    sub rax, 0x{:x}", sym.offset);
        }
      }
      Expr::Member {
        base,
        member,
        line,
        col,
      } => {
        let (offset, _) = resolve_member(frame, base, member, *line, *col)?;
        self.text.push_str("    mov rax, rbp\n");
        let _ = writeln!(self.text, "    sub rax, 0x{offset:x}");
      }
      _ => panic!("not an addressable place"),
    }
    Ok(())
  }

  /// Assemble the final output: fixed header, function text, then the
  /// collected string fragments as raw bytes (not null-terminated).
  fn finish(self) -> String {
    let mut out = String::from("BITS 64\nglobal _start\nsection .text\n");
    out.push_str(&self.text);
    out.push_str("section .data\n");
    for fragment in &self.data {
      if fragment.bytes.is_empty() {
        let _ = writeln!(out, "{}:", fragment.label);
        continue;
      }
      let bytes: Vec<String> = fragment.bytes.iter().map(|b| format!("0x{b:x}")).collect();
      let _ = writeln!(out, "{}: db {}", fragment.label, bytes.join(", "));
    }
    out
  }
}

/// Total bytes of local declarations in a body, nested blocks included.
/// Used to size the frame allocation before the body is lowered.
fn locals_size(stmts: &[Stmt]) -> u64 {
  let mut total = 0;
  for stmt in stmts {
    match stmt {
      Stmt::Declaration { ty, .. } => total += ty.size(),
      Stmt::If { body, .. } | Stmt::For { body, .. } => total += locals_size(body),
      _ => {}
    }
  }
  total
}

fn lookup<'a>(frame: &'a Frame, name: &str, line: u32, col: u32) -> CompileResult<&'a Symbol> {
  frame.symbols.get(name).ok_or_else(|| {
    CompileError::semantic(line, col, format!("undefined variable \"{name}\""))
  })
}

/// Resolve `base.member` to its total frame offset and the member's size.
/// Only local struct bases are supported.
fn resolve_member(
  frame: &Frame,
  base: &str,
  member: &str,
  line: u32,
  col: u32,
) -> CompileResult<(u64, u64)> {
  let sym = lookup(frame, base, line, col)?;
  if sym.is_argument {
    return Err(CompileError::semantic(
      line,
      col,
      format!("member access through argument \"{base}\" is not supported"),
    ));
  }
  if !matches!(sym.ty, Type::Struct { .. }) {
    return Err(CompileError::semantic(
      line,
      col,
      format!("\"{base}\" is not a struct (its type is {})", sym.ty.name()),
    ));
  }
  let Some((member_offset, member_ty)) = sym.ty.member_offset(member) else {
    return Err(CompileError::semantic(
      line,
      col,
      format!("{} has no member \"{member}\"", sym.ty.name()),
    ));
  };
  Ok((sym.offset + member_offset, member_ty.size()))
}

/// The accumulator name matching a value's byte size. Values that fit no
/// register (structs, the zero-sized u0) cannot be moved.
fn register_for(size: u64, line: u32, col: u32) -> CompileResult<&'static str> {
  match size {
    8 => Ok("rax"),
    4 => Ok("eax"),
    _ => Err(CompileError::semantic(
      line,
      col,
      format!("no register matches a {size}-byte value"),
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn compile(src: &str) -> CompileResult<String> {
    generate(&parse(tokenize(src).expect("tokenize failed"))?)
  }

  fn compile_ok(src: &str) -> String {
    compile(src).expect("compile failed")
  }

  #[test]
  fn argument_offsets_increase_by_pointer_width() {
    let asm = compile_ok("u64 pick(u64 a, u64 b, u64 c) { return a + b + c; }");
    // Registered offsets 8/16/24, emitted one pointer width further in.
    assert!(asm.contains("mov rax, [rbp+0x10]"));
    assert!(asm.contains("mov rax, [rbp+0x18]"));
    assert!(asm.contains("mov rax, [rbp+0x20]"));
  }

  #[test]
  fn arguments_are_assignable_in_place() {
    let asm = compile_ok("u64 clamp(u64 a) { a = 0; return a; }");
    assert!(asm.contains("mov [rbp+0x10], rax"));
  }

  #[test]
  fn address_of_an_argument_points_past_the_saved_frame() {
    let asm = compile_ok("u64 main(u64 a) { u64 *p = &a; return p; }");
    assert!(asm.contains("mov rax, rbp\n    add rax, 0x10"));
  }

  #[test]
  fn pointer_store_resolves_argument_pointers() {
    let asm = compile_ok("u0 put(u64 *slot) { *slot = 7; return 0; }");
    assert!(asm.contains("mov rcx, [rbp+0x10]\n    mov [rcx], rax"));
  }

  #[test]
  fn argument_redeclaration_aborts() {
    let err = compile("u64 twice(u64 a, u64 a) { return a; }").expect_err("expected semantic error");
    assert!(err.to_string().contains("redeclaration of argument \"a\""));
  }

  #[test]
  fn locals_grow_downward_by_their_own_size() {
    let asm = compile_ok("u64 main() { u64 a = 1; u32 b = 2; u64 c = 3; return c; }");
    assert!(asm.contains("mov [rbp-0x8], rax"));
    assert!(asm.contains("mov [rbp-0xc], eax"));
    assert!(asm.contains("mov [rbp-0x14], rax"));
    // 8 + 4 + 8 = 20 bytes of locals, plus one pointer width of slack.
    assert!(asm.contains("sub rsp, 0x1c"));
  }

  #[test]
  fn nested_blocks_share_the_function_frame() {
    let asm = compile_ok("u64 main() { u64 a = 1; if (a) { u64 b = 2; } return a; }");
    assert!(asm.contains("mov [rbp-0x8], rax"));
    assert!(asm.contains("mov [rbp-0x10], rax"));
    assert!(asm.contains("sub rsp, 0x18"));
  }

  #[test]
  fn functions_without_locals_skip_the_frame_allocation() {
    let asm = compile_ok("u64 two() { return 2; }");
    assert!(!asm.contains("sub rsp"));
  }

  #[test]
  fn branch_labels_are_pairwise_distinct() {
    let asm = compile_ok(
      "u64 main() { \
         if (1) { return 1; } \
         if (2) { return 2; } \
         for (0) { return 3; } \
         return 4; \
       }",
    );
    let mut labels: Vec<&str> = asm
      .lines()
      .filter_map(|l| l.strip_suffix(':'))
      .filter(|l| l.starts_with('_'))
      .collect();
    let total = labels.len();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), total, "generated labels collide: {asm}");
    // Two ifs and one for: three end labels plus the loop-top label.
    assert_eq!(total, 4);
  }

  #[test]
  fn equality_lowered_as_compare_and_branch() {
    let asm = compile_ok("u64 main() { return 1 = 2; }");
    assert!(asm.contains("mov rdx, 0\n    cmp rax, rcx\n    jne _eq_0\n    mov rdx, 1\n_eq_0:\n    mov rax, rdx"));
  }

  #[test]
  fn string_literal_becomes_a_data_fragment() {
    let asm = compile_ok("u64 main() { u64 s = \"hi\\n\"; return s; }");
    assert!(asm.contains("mov rax, _data_0"));
    assert!(asm.contains("_data_0: db 0x68, 0x69, 0xa"));
    // Not null-terminated.
    assert!(!asm.contains("0x68, 0x69, 0xa, 0x0"));
  }

  #[test]
  fn pointer_store_goes_through_rcx() {
    let asm = compile_ok("u64 main() { u64 x = 1; u64 *p = &x; *p = 7; return x; }");
    assert!(asm.contains("mov rcx, [rbp-0x10]\n    mov [rcx], rax"));
  }

  #[test]
  fn member_accesses_use_prefix_sum_offsets() {
    let asm = compile_ok(
      "struct pair { u64 first, u64 second, } \
       u64 main() { struct pair p; p.second = 5; return p.second; }",
    );
    // p occupies [rbp-0x10]; `second` sits one u64 past `first`.
    assert!(asm.contains("mov [rbp-0x18], rax"));
    assert!(asm.contains("mov rax, [rbp-0x18]"));
  }

  #[test]
  fn undefined_variable_aborts() {
    let err = compile("u64 main() { return missing; }").expect_err("expected semantic error");
    assert!(err.to_string().contains("undefined variable \"missing\""));
  }

  #[test]
  fn redeclaration_aborts() {
    let err =
      compile("u64 main() { u64 x = 1; u64 x = 2; return x; }").expect_err("expected semantic error");
    assert!(err.to_string().contains("redeclaration of variable \"x\""));
  }

  #[test]
  fn store_through_non_pointer_aborts() {
    let err =
      compile("u64 main() { u64 x = 1; *x = 2; return x; }").expect_err("expected semantic error");
    assert!(err.to_string().contains("not a pointer"));
  }

  #[test]
  fn struct_cannot_be_loaded_by_value() {
    let err = compile(
      "struct pair { u64 first, u64 second, } \
       u64 main() { struct pair p; u64 x = p; return x; }",
    )
    .expect_err("expected semantic error");
    assert!(err.to_string().contains("no register matches"));
  }

  #[test]
  fn inline_asm_is_emitted_verbatim() {
    let asm = compile_ok("u0 quit() { asm(\"mov rax, 60\\nsyscall\"); return 0; }");
    assert!(asm.contains("mov rax, 60\nsyscall\n"));
  }
}
