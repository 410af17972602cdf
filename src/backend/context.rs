//! Per-function emission state: the block under construction, finished
//! blocks, and the counters that keep temporaries, stack slots and labels
//! unique within one definition.

use crate::util::env::{Env, ScopeStack};

use super::ir::{BasicBlock, Entity, Instruction, Type};

pub struct FunctionContext {
    /// finished blocks, in emission order
    blocks: Vec<BasicBlock>,
    /// block currently receiving instructions
    current: BasicBlock,
    next_register: usize,
    /// per-name slot counts, so shadowed variables get distinct slot names
    slot_counts: Env<usize>,
    next_label_suffix: usize,
    pub scopes: ScopeStack<Entity>,
}

impl FunctionContext {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current: BasicBlock::new("entry".to_string()),
            next_register: 1,
            slot_counts: Env::new(),
            next_label_suffix: 1,
            scopes: ScopeStack::new(),
        }
    }

    /// next unique temporary register
    pub fn new_register(&mut self, t: Type) -> Entity {
        let n = self.next_register;
        self.next_register += 1;
        Entity::Register { n, t }
    }

    /// Stack slot named after the variable it backs. The first slot for
    /// `x` is `x.addr`, shadowing slots are `x.addr1`, `x.addr2`, ...
    pub fn new_slot(&mut self, name: &str) -> Entity {
        let count = self.slot_counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        let slot_name = if *count == 1 {
            format!("{}.addr", name)
        } else {
            format!("{}.addr{}", name, *count - 1)
        };
        Entity::Named {
            name: slot_name,
            t: Type::Ptr,
        }
    }

    /// unique suffix for the label set of one `if` diamond
    pub fn new_label_suffix(&mut self) -> usize {
        let suffix = self.next_label_suffix;
        self.next_label_suffix += 1;
        suffix
    }

    pub fn push_instruction(&mut self, instr: Instruction) {
        self.current.instructions.push(instr);
    }

    /// label of the block currently receiving instructions
    pub fn current_label(&self) -> String {
        self.current.label.clone()
    }

    /// finish the current block and start a new one with the given label
    pub fn start_block(&mut self, label: String) {
        let finished = std::mem::replace(&mut self.current, BasicBlock::new(label));
        self.blocks.push(finished);
    }

    /// flush the last open block and hand the body over
    pub fn conclude(mut self) -> Vec<BasicBlock> {
        self.blocks.push(self.current);
        self.blocks
    }
}
