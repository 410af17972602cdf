//! Textual LLVM IR rendering of the data model in [`super`].

use std::fmt::{Display, Error, Formatter};
use std::string::ToString;

use itertools::Itertools;

use super::{ArithOp, BasicBlock, CmpOp, Entity, FunctionIr, Instruction, InstructionKind, Module, Type};

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            Type::I32 => write!(f, "i32"),
            Type::I1 => write!(f, "i1"),
            Type::Ptr => write!(f, "i32*"),
        }
    }
}

impl Display for ArithOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            ArithOp::Add => write!(f, "add"),
            ArithOp::Sub => write!(f, "sub"),
            ArithOp::Mul => write!(f, "mul"),
            ArithOp::Sdiv => write!(f, "sdiv"),
            ArithOp::Srem => write!(f, "srem"),
            ArithOp::Shl => write!(f, "shl"),
            ArithOp::Ashr => write!(f, "ashr"),
            ArithOp::And => write!(f, "and"),
            ArithOp::Or => write!(f, "or"),
            ArithOp::Xor => write!(f, "xor"),
        }
    }
}

impl Display for CmpOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            CmpOp::Eq => write!(f, "eq"),
            CmpOp::Ne => write!(f, "ne"),
            CmpOp::Slt => write!(f, "slt"),
            CmpOp::Sle => write!(f, "sle"),
            CmpOp::Sgt => write!(f, "sgt"),
            CmpOp::Sge => write!(f, "sge"),
        }
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            Entity::Const(v) => write!(f, "{}", v),
            Entity::Register { n, .. } => write!(f, "%t.{}", n),
            Entity::Named { name, .. } => write!(f, "%{}", name),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match &self.kind {
            InstructionKind::Alloca => {
                write!(f, "{} = alloca i32", self.get_result())
            }
            InstructionKind::Load { ptr } => {
                write!(
                    f,
                    "{} = load i32, {} {}",
                    self.get_result(),
                    ptr.get_type(),
                    ptr
                )
            }
            InstructionKind::Store { val, ptr } => {
                write!(
                    f,
                    "store {} {}, {} {}",
                    val.get_type(),
                    val,
                    ptr.get_type(),
                    ptr
                )
            }
            InstructionKind::Binary { op, lhs, rhs } => {
                write!(
                    f,
                    "{} = {} {} {}, {}",
                    self.get_result(),
                    op,
                    lhs.get_type(),
                    lhs,
                    rhs
                )
            }
            InstructionKind::Icmp { pred, lhs, rhs } => {
                write!(
                    f,
                    "{} = icmp {} {} {}, {}",
                    self.get_result(),
                    pred,
                    lhs.get_type(),
                    lhs,
                    rhs
                )
            }
            InstructionKind::Zext { val } => {
                write!(f, "{} = zext i1 {} to i32", self.get_result(), val)
            }
            InstructionKind::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|arg| format!("{} {}", arg.get_type(), arg))
                    .join(", ");
                write!(f, "{} = call i32 @{}({})", self.get_result(), callee, args)
            }
            InstructionKind::Br { label } => {
                write!(f, "br label %{}", label)
            }
            InstructionKind::CondBr {
                cond,
                then_label,
                else_label,
            } => {
                write!(
                    f,
                    "br i1 {}, label %{}, label %{}",
                    cond, then_label, else_label
                )
            }
            InstructionKind::Phi { incoming } => {
                let incoming = incoming
                    .iter()
                    .map(|(val, label)| format!("[ {}, %{} ]", val, label))
                    .join(", ");
                write!(f, "{} = phi i32 {}", self.get_result(), incoming)
            }
            InstructionKind::Ret { val } => {
                write!(f, "ret i32 {}", val)
            }
        }
    }
}

impl Display for BasicBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let instructions = self
            .instructions
            .iter()
            .map(Instruction::to_string)
            .map(|instr| format!("  {}", instr))
            .join("\n");
        write!(f, "{}:\n{}", self.label, instructions)
    }
}

impl Display for FunctionIr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match &self.blocks {
            None => {
                let params = self.params.iter().map(|_| "i32").join(", ");
                write!(f, "declare i32 @{}({})", self.name, params)
            }
            Some(blocks) => {
                let params = self
                    .params
                    .iter()
                    .map(|param| format!("i32 %{}", param))
                    .join(", ");
                let body = blocks.iter().map(BasicBlock::to_string).join("\n\n");
                write!(f, "define i32 @{}({}) {{\n{}\n}}", self.name, params, body)
            }
        }
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "; ModuleID = '{}'\n", self.name)?;
        write!(f, "source_filename = \"{}\"\n", self.name)?;
        for function in self.functions() {
            write!(f, "\n{}\n", function)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(n: usize, t: Type) -> Entity {
        Entity::Register { n, t }
    }

    #[test]
    fn renders_memory_instructions() {
        let slot = Entity::Named {
            name: "x.addr".to_string(),
            t: Type::Ptr,
        };
        let alloca = InstructionKind::Alloca.with_result(slot.clone());
        assert_eq!(alloca.to_string(), "%x.addr = alloca i32");

        let store = InstructionKind::Store {
            val: Entity::Const(7),
            ptr: slot.clone(),
        }
        .without_result();
        assert_eq!(store.to_string(), "store i32 7, i32* %x.addr");

        let load = InstructionKind::Load { ptr: slot }.with_result(reg(1, Type::I32));
        assert_eq!(load.to_string(), "%t.1 = load i32, i32* %x.addr");
    }

    #[test]
    fn renders_arithmetic_and_comparisons() {
        let add = InstructionKind::Binary {
            op: ArithOp::Add,
            lhs: reg(1, Type::I32),
            rhs: Entity::Const(2),
        }
        .with_result(reg(2, Type::I32));
        assert_eq!(add.to_string(), "%t.2 = add i32 %t.1, 2");

        let cmp = InstructionKind::Icmp {
            pred: CmpOp::Slt,
            lhs: reg(1, Type::I32),
            rhs: Entity::Const(0),
        }
        .with_result(reg(3, Type::I1));
        assert_eq!(cmp.to_string(), "%t.3 = icmp slt i32 %t.1, 0");

        let zext = InstructionKind::Zext {
            val: reg(3, Type::I1),
        }
        .with_result(reg(4, Type::I32));
        assert_eq!(zext.to_string(), "%t.4 = zext i1 %t.3 to i32");
    }

    #[test]
    fn renders_control_flow() {
        let br = InstructionKind::Br {
            label: "ifcont.1".to_string(),
        }
        .without_result();
        assert_eq!(br.to_string(), "br label %ifcont.1");

        let cond_br = InstructionKind::CondBr {
            cond: reg(1, Type::I1),
            then_label: "then.1".to_string(),
            else_label: "else.1".to_string(),
        }
        .without_result();
        assert_eq!(
            cond_br.to_string(),
            "br i1 %t.1, label %then.1, label %else.1"
        );

        let phi = InstructionKind::Phi {
            incoming: vec![
                (reg(2, Type::I32), "then.1".to_string()),
                (Entity::Const(0), "else.1".to_string()),
            ],
        }
        .with_result(reg(3, Type::I32));
        assert_eq!(
            phi.to_string(),
            "%t.3 = phi i32 [ %t.2, %then.1 ], [ 0, %else.1 ]"
        );
    }

    #[test]
    fn renders_declaration_and_definition() {
        let decl = FunctionIr::declaration(
            "putchard".to_string(),
            vec!["c".to_string()],
        );
        assert_eq!(decl.to_string(), "declare i32 @putchard(i32)");

        let def = FunctionIr {
            name: "zero".to_string(),
            params: vec![],
            blocks: Some(vec![BasicBlock {
                label: "entry".to_string(),
                instructions: vec![InstructionKind::Ret {
                    val: Entity::Const(0),
                }
                .without_result()],
            }]),
        };
        assert_eq!(
            def.to_string(),
            "define i32 @zero() {\nentry:\n  ret i32 0\n}"
        );
    }

    #[test]
    fn renders_module_header() {
        let module = Module::new("main");
        let text = module.to_string();
        assert!(text.starts_with("; ModuleID = 'main'\nsource_filename = \"main\"\n"));
    }
}
