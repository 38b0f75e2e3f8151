//! Type descriptors: builtins, pointers and struct layouts.
//!
//! Sizes are fixed at definition time. Struct layout is a single
//! left-to-right prefix sum over the declared members and is never
//! recomputed; a pointer always occupies the architecture pointer width
//! regardless of its pointee.

use rustc_hash::FxHashMap;

/// Width in bytes of a pointer on the target architecture. Also the stride
/// between stacked call arguments.
pub const POINTER_WIDTH: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
  Builtin {
    name: &'static str,
    size: u64,
  },
  Pointer {
    base: Box<Type>,
  },
  Struct {
    name: String,
    size: u64,
    members: Vec<Member>,
  },
}

/// One named field of a struct, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
  pub name: String,
  pub ty: Type,
}

impl Type {
  /// Look up the fixed builtin table. Returns `None` for identifiers that
  /// name no builtin; callers use the miss to fall back to non-declaration
  /// parsing.
  pub fn builtin(name: &str) -> Option<Type> {
    let ty = match name {
      "u64" => Type::Builtin { name: "u64", size: 8 },
      "u32" => Type::Builtin { name: "u32", size: 4 },
      "u0" => Type::Builtin { name: "u0", size: 0 },
      _ => return None,
    };
    Some(ty)
  }

  pub fn pointer_to(base: Type) -> Type {
    Type::Pointer {
      base: Box::new(base),
    }
  }

  pub fn is_pointer(&self) -> bool {
    matches!(self, Type::Pointer { .. })
  }

  pub fn size(&self) -> u64 {
    match self {
      Type::Builtin { size, .. } => *size,
      Type::Pointer { .. } => POINTER_WIDTH,
      Type::Struct { size, .. } => *size,
    }
  }

  /// Name used in diagnostics.
  pub fn name(&self) -> String {
    match self {
      Type::Builtin { name, .. } => (*name).to_string(),
      Type::Pointer { base } => format!("{}*", base.name()),
      Type::Struct { name, .. } => format!("struct {name}"),
    }
  }

  /// Byte offset of a member inside a struct, together with its type.
  /// The offset is the prefix sum of the sizes declared before it.
  pub fn member_offset(&self, member: &str) -> Option<(u64, &Type)> {
    let Type::Struct { members, .. } = self else {
      return None;
    };
    let mut offset = 0;
    for m in members {
      if m.name == member {
        return Some((offset, &m.ty));
      }
      offset += m.ty.size();
    }
    None
  }
}

/// Registry of struct definitions, owned by the compilation session and
/// threaded explicitly through parsing.
#[derive(Debug, Default)]
pub struct StructTable {
  map: FxHashMap<String, Type>,
}

impl StructTable {
  /// Register a completed definition. The total size is computed here,
  /// once, as the sum of the member sizes.
  pub fn define(&mut self, name: &str, members: Vec<Member>) -> Type {
    let size = members.iter().map(|m| m.ty.size()).sum();
    let ty = Type::Struct {
      name: name.to_string(),
      size,
      members,
    };
    self.map.insert(name.to_string(), ty.clone());
    ty
  }

  pub fn get(&self, name: &str) -> Option<&Type> {
    self.map.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.map.contains_key(name)
  }
}
