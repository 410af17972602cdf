//! Data model for the emitted LLVM IR.
//!
//! Everything the language computes is a 32-bit signed integer; `i1`
//! appears only transiently between a comparison and the `zext` that
//! widens it back. Named values live in stack slots (`alloca`) so that
//! assignment can mutate them uniformly.

mod display;

use std::collections::HashSet;

use crate::error::{CompileError, CompileResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    I32,
    I1,
    /// pointer to a stack slot, always `i32*`
    Ptr,
}

/// anything that can appear as an operand of an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Const(i32),
    /// numbered temporary, rendered `%t.<n>`; the dot keeps the name out of
    /// the identifier space of source-level variables
    Register { n: usize, t: Type },
    /// named value: a function argument (`%a`) or a stack slot (`%a.addr`)
    Named { name: String, t: Type },
}

impl Entity {
    pub fn get_type(&self) -> Type {
        match self {
            Entity::Const(_) => Type::I32,
            Entity::Register { t, .. } => *t,
            Entity::Named { t, .. } => *t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
    Shl,
    Ashr,
    And,
    Or,
    Xor,
}

/// signed comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    Alloca,
    Load {
        ptr: Entity,
    },
    Store {
        val: Entity,
        ptr: Entity,
    },
    Binary {
        op: ArithOp,
        lhs: Entity,
        rhs: Entity,
    },
    Icmp {
        pred: CmpOp,
        lhs: Entity,
        rhs: Entity,
    },
    Zext {
        val: Entity,
    },
    Call {
        callee: String,
        args: Vec<Entity>,
    },
    Br {
        label: String,
    },
    CondBr {
        cond: Entity,
        then_label: String,
        else_label: String,
    },
    Phi {
        incoming: Vec<(Entity, String)>,
    },
    Ret {
        val: Entity,
    },
}

impl InstructionKind {
    pub fn with_result(self, result: Entity) -> Instruction {
        Instruction {
            kind: self,
            result: Some(result),
        }
    }

    pub fn without_result(self) -> Instruction {
        Instruction {
            kind: self,
            result: None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionKind::Br { .. } | InstructionKind::CondBr { .. } | InstructionKind::Ret { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub result: Option<Entity>,
}

impl Instruction {
    pub fn get_result(&self) -> &Entity {
        match &self.result {
            Some(entity) => entity,
            None => panic!("missing result entity information for {:?}", self),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label: String) -> Self {
        Self {
            label,
            instructions: Vec::new(),
        }
    }

    /// a block is complete once its last instruction transfers control
    pub fn is_terminated(&self) -> bool {
        self.instructions
            .last()
            .map(|instr| instr.kind.is_terminator())
            .unwrap_or(false)
    }
}

/// One function of the module: a declaration while `blocks` is `None`
/// (`extern`), upgraded in place to a definition when a `def` attaches a
/// body. All signatures are `i32 (i32, ..., i32)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionIr {
    pub name: String,
    pub params: Vec<String>,
    pub blocks: Option<Vec<BasicBlock>>,
}

impl FunctionIr {
    pub fn declaration(name: String, params: Vec<String>) -> Self {
        Self {
            name,
            params,
            blocks: None,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_none()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Structural validity of a finished definition: unique labels, every
    /// block terminated exactly at its end, every branch target and phi
    /// incoming referring to an existing block with two incoming edges per
    /// phi. Declarations are trivially valid.
    pub fn verify(&self) -> CompileResult<()> {
        let Some(blocks) = &self.blocks else {
            return Ok(());
        };
        let invalid = |reason: String| CompileError::InvalidFunction {
            name: self.name.clone(),
            reason,
        };
        if blocks.is_empty() {
            return Err(invalid("definition without basic blocks".to_string()));
        }
        let mut labels = HashSet::new();
        for block in blocks {
            if !labels.insert(block.label.clone()) {
                return Err(invalid(format!("duplicate label {}", block.label)));
            }
        }
        let check_target = |label: &String| {
            if labels.contains(label) {
                Ok(())
            } else {
                Err(invalid(format!("branch to unknown label {}", label)))
            }
        };
        for block in blocks {
            if !block.is_terminated() {
                return Err(invalid(format!("block {} is not terminated", block.label)));
            }
            for (i, instr) in block.instructions.iter().enumerate() {
                if instr.kind.is_terminator() && i + 1 != block.instructions.len() {
                    return Err(invalid(format!(
                        "terminator in the middle of block {}",
                        block.label
                    )));
                }
                match &instr.kind {
                    InstructionKind::Br { label } => check_target(label)?,
                    InstructionKind::CondBr {
                        then_label,
                        else_label,
                        ..
                    } => {
                        check_target(then_label)?;
                        check_target(else_label)?;
                    }
                    InstructionKind::Phi { incoming } => {
                        if incoming.len() != 2 {
                            return Err(invalid(format!(
                                "phi in block {} has {} incoming edges",
                                block.label,
                                incoming.len()
                            )));
                        }
                        for (_, label) in incoming {
                            check_target(label)?;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// The single module a compilation produces. Functions are kept in
/// insertion order so the rendered IR follows the source.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    functions: Vec<FunctionIr>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn add_function(&mut self, function: FunctionIr) {
        self.functions.push(function);
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionIr> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut FunctionIr> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// erase a function, declaration or definition, from the module
    pub fn remove_function(&mut self, name: &str) {
        self.functions.retain(|f| f.name != name);
    }

    pub fn functions(&self) -> &[FunctionIr] {
        &self.functions
    }
}
