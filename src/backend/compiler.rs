//! The code generator: walks the expression tree of one top-level form at
//! a time and grows a single LLVM module.
//!
//! Every named value is backed by a stack slot, so `let`, parameters and
//! assignment share one mutation protocol: alloca once, store to write,
//! load to read. Comparisons and logical operators produce `i1` and are
//! immediately widened back to `i32`, keeping the value-of-everything rule
//! uniform.

use crate::error::{CompileError, CompileResult};
use crate::frontend::ast::{BinaryOp, Expr, Function, Item, PrefixOp, Prototype};
use crate::util::env::Env;

use super::context::FunctionContext;
use super::ir::{ArithOp, CmpOp, Entity, FunctionIr, InstructionKind, Module, Type};

pub struct Compiler {
    module: Module,
    /// retained prototypes of defined functions, keyed by name, so a later
    /// lookup can materialise a declaration on first use
    prototypes: Env<Prototype>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            module: Module::new("main"),
            prototypes: Env::new(),
        }
    }

    /// lower one top-level form into the module
    pub fn compile_item(&mut self, item: Item) -> CompileResult<()> {
        match item {
            Item::Function(function) => self.compile_function(function),
            Item::Extern(prototype) => self.compile_extern(prototype),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    /// `extern` lowers its prototype to an externally linked declaration
    fn compile_extern(&mut self, prototype: Prototype) -> CompileResult<()> {
        if self.module.get_function(&prototype.name).is_some() {
            self.check_signature(&prototype)?;
            return Ok(());
        }
        self.module
            .add_function(FunctionIr::declaration(prototype.name, prototype.params));
        Ok(())
    }

    fn compile_function(&mut self, function: Function) -> CompileResult<()> {
        let name = function.prototype.name.clone();
        let params = &function.prototype.params;
        for (i, param) in params.iter().enumerate() {
            if params[..i].contains(param) {
                return Err(CompileError::DuplicateArgument {
                    function: name,
                    name: param.clone(),
                });
            }
        }

        // on any lowering failure the function is erased from the module:
        // the declaration instantiated for this def must not outlive the
        // error, only one that predates it (an extern) may stay
        let had_declaration = self.module.get_function(&name).is_some();
        let result = self.lower_function(function);
        if result.is_err() && !had_declaration {
            self.module.remove_function(&name);
        }
        result
    }

    fn lower_function(&mut self, function: Function) -> CompileResult<()> {
        let Function { prototype, body } = function;
        let name = prototype.name.clone();
        let params = prototype.params.clone();

        // resolve the existing declaration or instantiate the prototype
        if !self.get_function(&name, params.len(), false)? {
            self.module
                .add_function(FunctionIr::declaration(name.clone(), params.clone()));
        }
        self.check_signature(&prototype)?;

        // retain the prototype so later calls can materialise it
        self.prototypes.insert(name.clone(), prototype);

        let mut ctx = FunctionContext::new();
        ctx.scopes.begin_scope();
        // arguments as allocas: store each argument into a slot at the top
        // of entry so assignment can treat parameters like any variable
        for param in &params {
            let slot = ctx.new_slot(param);
            ctx.push_instruction(InstructionKind::Alloca.with_result(slot.clone()));
            ctx.push_instruction(
                InstructionKind::Store {
                    val: Entity::Named {
                        name: param.clone(),
                        t: Type::I32,
                    },
                    ptr: slot.clone(),
                }
                .without_result(),
            );
            ctx.scopes.define(param.clone(), slot);
        }

        let ret = self.compile_expr(&mut ctx, &body)?;
        ctx.push_instruction(InstructionKind::Ret { val: ret }.without_result());
        ctx.scopes.end_scope();

        // verify before committing, so a failed body never leaves a
        // partial definition in the module
        let definition = FunctionIr {
            name: name.clone(),
            params,
            blocks: Some(ctx.conclude()),
        };
        definition.verify()?;
        match self.module.get_function_mut(&name) {
            Some(existing) => existing.blocks = definition.blocks,
            None => self.module.add_function(definition),
        }
        Ok(())
    }

    /// compare a prototype against the declaration already in the module
    fn check_signature(&self, prototype: &Prototype) -> CompileResult<()> {
        let Some(existing) = self.module.get_function(&prototype.name) else {
            return Ok(());
        };
        if existing.arity() != prototype.params.len() {
            return Err(CompileError::ArityMismatch {
                name: prototype.name.clone(),
                expected: existing.arity(),
                got: prototype.params.len(),
            });
        }
        for (i, (declared, given)) in existing.params.iter().zip(&prototype.params).enumerate() {
            if declared != given {
                return Err(CompileError::ArgumentNameMismatch {
                    function: prototype.name.clone(),
                    expected: declared.clone(),
                    got: given.clone(),
                    index: i + 1,
                });
            }
        }
        Ok(())
    }

    /// Function lookup protocol: the module first, then the prototype
    /// registry (materialising a declaration on the way). Returns whether
    /// the function is now present in the module.
    fn get_function(&mut self, name: &str, arity: usize, expect_declared: bool) -> CompileResult<bool> {
        if let Some(function) = self.module.get_function(name) {
            if !expect_declared && !function.is_declaration() {
                return Err(CompileError::Redefinition {
                    name: name.to_string(),
                });
            }
            if function.arity() != arity {
                return Err(CompileError::ArityMismatch {
                    name: name.to_string(),
                    expected: function.arity(),
                    got: arity,
                });
            }
            return Ok(true);
        }
        if let Some(prototype) = self.prototypes.get(name) {
            let declaration =
                FunctionIr::declaration(prototype.name.clone(), prototype.params.clone());
            self.module.add_function(declaration);
            return Ok(true);
        }
        Ok(false)
    }

    fn compile_expr(&mut self, ctx: &mut FunctionContext, expr: &Expr) -> CompileResult<Entity> {
        match expr {
            Expr::Literal(value) => Ok(Entity::Const(*value)),
            Expr::Variable(name) => {
                let slot = self.lookup_slot(ctx, name)?;
                let value = ctx.new_register(Type::I32);
                ctx.push_instruction(InstructionKind::Load { ptr: slot }.with_result(value.clone()));
                Ok(value)
            }
            Expr::Prefix { op, operand } => self.compile_prefix(ctx, *op, operand),
            Expr::Binary { op, lhs, rhs } => self.compile_binary(ctx, *op, lhs, rhs),
            Expr::Block(statements) => {
                let mut last = None;
                for stmt in statements {
                    last = Some(self.compile_expr(ctx, stmt)?);
                }
                // the block's value is its last statement's value
                last.ok_or(CompileError::EmptyBlock)
            }
            Expr::Call { callee, args } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.compile_expr(ctx, arg)?);
                }
                if !self.get_function(callee, args.len(), true)? {
                    return Err(CompileError::UndefinedFunction {
                        name: callee.clone(),
                    });
                }
                let result = ctx.new_register(Type::I32);
                ctx.push_instruction(
                    InstructionKind::Call {
                        callee: callee.clone(),
                        args: arg_values,
                    }
                    .with_result(result.clone()),
                );
                Ok(result)
            }
            Expr::Let { name, init } => {
                let value = self.compile_expr(ctx, init)?;
                let slot = ctx.new_slot(name);
                ctx.push_instruction(InstructionKind::Alloca.with_result(slot.clone()));
                ctx.push_instruction(
                    InstructionKind::Store {
                        val: value.clone(),
                        ptr: slot.clone(),
                    }
                    .without_result(),
                );
                ctx.scopes.define(name.clone(), slot);
                Ok(value)
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => self.compile_if(ctx, cond, then_branch, else_branch.as_deref()),
        }
    }

    fn compile_prefix(
        &mut self,
        ctx: &mut FunctionContext,
        op: PrefixOp,
        operand: &Expr,
    ) -> CompileResult<Entity> {
        let value = self.compile_expr(ctx, operand)?;
        match op {
            PrefixOp::Plus => Ok(value),
            PrefixOp::Neg => {
                let result = ctx.new_register(Type::I32);
                ctx.push_instruction(
                    InstructionKind::Binary {
                        op: ArithOp::Sub,
                        lhs: Entity::Const(0),
                        rhs: value,
                    }
                    .with_result(result.clone()),
                );
                Ok(result)
            }
            PrefixOp::BitNot => {
                let result = ctx.new_register(Type::I32);
                ctx.push_instruction(
                    InstructionKind::Binary {
                        op: ArithOp::Xor,
                        lhs: value,
                        rhs: Entity::Const(-1),
                    }
                    .with_result(result.clone()),
                );
                Ok(result)
            }
            PrefixOp::Not => {
                let is_zero = ctx.new_register(Type::I1);
                ctx.push_instruction(
                    InstructionKind::Icmp {
                        pred: CmpOp::Eq,
                        lhs: value,
                        rhs: Entity::Const(0),
                    }
                    .with_result(is_zero.clone()),
                );
                Ok(self.zext(ctx, is_zero))
            }
        }
    }

    fn compile_binary(
        &mut self,
        ctx: &mut FunctionContext,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> CompileResult<Entity> {
        if op == BinaryOp::Assign {
            let Expr::Variable(name) = lhs else {
                return Err(CompileError::InvalidAssignTarget);
            };
            let value = self.compile_expr(ctx, rhs)?;
            let slot = self.lookup_slot(ctx, name)?;
            ctx.push_instruction(
                InstructionKind::Store {
                    val: value.clone(),
                    ptr: slot,
                }
                .without_result(),
            );
            // the assignment's value is the stored value
            return Ok(value);
        }

        let lhs = self.compile_expr(ctx, lhs)?;
        let rhs = self.compile_expr(ctx, rhs)?;
        // arithmetic, bitwise and shift operators map straight onto IR ops
        let arith = match op {
            BinaryOp::Add => Some(ArithOp::Add),
            BinaryOp::Sub => Some(ArithOp::Sub),
            BinaryOp::Mul => Some(ArithOp::Mul),
            BinaryOp::Div => Some(ArithOp::Sdiv),
            BinaryOp::Rem => Some(ArithOp::Srem),
            BinaryOp::BitAnd => Some(ArithOp::And),
            BinaryOp::BitOr => Some(ArithOp::Or),
            BinaryOp::BitXor => Some(ArithOp::Xor),
            BinaryOp::Shl => Some(ArithOp::Shl),
            BinaryOp::Shr => Some(ArithOp::Ashr),
            _ => None,
        };
        if let Some(arith) = arith {
            return Ok(self.emit_arith(ctx, InstructionKind::Binary { op: arith, lhs, rhs }));
        }
        match op {
            BinaryOp::Eq => Ok(self.emit_cmp(ctx, CmpOp::Eq, lhs, rhs)),
            BinaryOp::Ne => Ok(self.emit_cmp(ctx, CmpOp::Ne, lhs, rhs)),
            BinaryOp::Lt => Ok(self.emit_cmp(ctx, CmpOp::Slt, lhs, rhs)),
            BinaryOp::Le => Ok(self.emit_cmp(ctx, CmpOp::Sle, lhs, rhs)),
            BinaryOp::Gt => Ok(self.emit_cmp(ctx, CmpOp::Sgt, lhs, rhs)),
            BinaryOp::Ge => Ok(self.emit_cmp(ctx, CmpOp::Sge, lhs, rhs)),
            BinaryOp::And | BinaryOp::Or => {
                // both operands always evaluate, no short-circuit: compare
                // each against zero and combine the i1 bits
                let lhs_bool = self.truthiness(ctx, lhs);
                let rhs_bool = self.truthiness(ctx, rhs);
                let combined = ctx.new_register(Type::I1);
                let combine = if op == BinaryOp::And {
                    ArithOp::And
                } else {
                    ArithOp::Or
                };
                ctx.push_instruction(
                    InstructionKind::Binary {
                        op: combine,
                        lhs: lhs_bool,
                        rhs: rhs_bool,
                    }
                    .with_result(combined.clone()),
                );
                Ok(self.zext(ctx, combined))
            }
            _ => unreachable!("assignment and arithmetic handled above"),
        }
    }

    /// If-lowering, the three-block diamond. The phi at the merge block
    /// takes each arm's value from the arm's *tail* block, which differs
    /// from the arm's head whenever the arm itself branched.
    fn compile_if(
        &mut self,
        ctx: &mut FunctionContext,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
    ) -> CompileResult<Entity> {
        let cond_value = self.compile_expr(ctx, cond)?;
        let cond_bool = self.truthiness(ctx, cond_value);

        let suffix = ctx.new_label_suffix();
        let then_label = format!("then.{}", suffix);
        let else_label = format!("else.{}", suffix);
        let merge_label = format!("ifcont.{}", suffix);

        ctx.push_instruction(
            InstructionKind::CondBr {
                cond: cond_bool,
                then_label: then_label.clone(),
                else_label: else_label.clone(),
            }
            .without_result(),
        );

        ctx.start_block(then_label);
        ctx.scopes.begin_scope();
        let then_value = self.compile_expr(ctx, then_branch)?;
        ctx.scopes.end_scope();
        let then_tail = ctx.current_label();
        ctx.push_instruction(
            InstructionKind::Br {
                label: merge_label.clone(),
            }
            .without_result(),
        );

        ctx.start_block(else_label);
        let else_value = match else_branch {
            Some(else_branch) => {
                ctx.scopes.begin_scope();
                let value = self.compile_expr(ctx, else_branch)?;
                ctx.scopes.end_scope();
                value
            }
            // an if without else contributes zero to the merge
            None => Entity::Const(0),
        };
        let else_tail = ctx.current_label();
        ctx.push_instruction(
            InstructionKind::Br {
                label: merge_label.clone(),
            }
            .without_result(),
        );

        ctx.start_block(merge_label);
        let result = ctx.new_register(Type::I32);
        ctx.push_instruction(
            InstructionKind::Phi {
                incoming: vec![(then_value, then_tail), (else_value, else_tail)],
            }
            .with_result(result.clone()),
        );
        Ok(result)
    }

    fn lookup_slot(&self, ctx: &FunctionContext, name: &str) -> CompileResult<Entity> {
        ctx.scopes
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn emit_arith(&mut self, ctx: &mut FunctionContext, kind: InstructionKind) -> Entity {
        let result = ctx.new_register(Type::I32);
        ctx.push_instruction(kind.with_result(result.clone()));
        result
    }

    /// signed comparison, widened back to i32
    fn emit_cmp(
        &mut self,
        ctx: &mut FunctionContext,
        pred: CmpOp,
        lhs: Entity,
        rhs: Entity,
    ) -> Entity {
        let bit = ctx.new_register(Type::I1);
        ctx.push_instruction(InstructionKind::Icmp { pred, lhs, rhs }.with_result(bit.clone()));
        self.zext(ctx, bit)
    }

    /// `value != 0` as an i1
    fn truthiness(&mut self, ctx: &mut FunctionContext, value: Entity) -> Entity {
        let bit = ctx.new_register(Type::I1);
        ctx.push_instruction(
            InstructionKind::Icmp {
                pred: CmpOp::Ne,
                lhs: value,
                rhs: Entity::Const(0),
            }
            .with_result(bit.clone()),
        );
        bit
    }

    fn zext(&mut self, ctx: &mut FunctionContext, bit: Entity) -> Entity {
        let wide = ctx.new_register(Type::I32);
        ctx.push_instruction(InstructionKind::Zext { val: bit }.with_result(wide.clone()));
        wide
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
