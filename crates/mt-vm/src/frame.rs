//! frame.rs — one activation record on the VM's call stack.

use std::rc::Rc;

use mt_core::Closure;

/// A single call's bookkeeping: which closure is running, where its
/// instruction pointer is, and where its locals start on the value
/// stack. Spec §5 "Frame": "closure reference, instruction pointer,
/// stack base".
pub struct CallFrame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    pub base: usize,
}

impl CallFrame {
    pub fn new(closure: Rc<Closure>, base: usize) -> Self {
        Self { closure, ip: 0, base }
    }

    pub fn display_name(&self) -> String {
        self.closure.function.display_name().to_string()
    }

    /// Source line of the instruction just executed — `ip` already
    /// points past it by the time an error or trace is built.
    pub fn current_line(&self) -> u32 {
        let pc = self.ip.saturating_sub(1) as u32;
        self.closure.function.chunk.lines.line_for_pc(pc).unwrap_or(0)
    }
}
