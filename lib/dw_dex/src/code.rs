//! Method bodies: instructions stream and exception handlers table.

use crate::errors::{DexError, DexResult};
use crate::instrs::{Instr, Instruction, LabeledInstr};
use crate::types::Type;
use crate::Addr;

#[derive(Debug, Clone)]
pub struct CodeItem {
    pub(crate) registers_size: usize,
    pub(crate) insns: Vec<LabeledInstr>,
    pub(crate) tries: Vec<TryItem>,
}

impl CodeItem {
    /// Lays out `instrs` at consecutive code addresses.
    #[must_use]
    pub fn new(registers_size: usize, instrs: Vec<Instr>, tries: Vec<TryItem>) -> Self {
        let mut addr = Addr::entry();
        let insns = instrs
            .into_iter()
            .map(|instr| {
                let linstr = LabeledInstr { addr, instr };
                addr = linstr.next_addr();
                linstr
            })
            .collect();
        Self {
            registers_size,
            insns,
            tries,
        }
    }

    #[inline]
    #[must_use]
    pub const fn registers_size(&self) -> usize {
        self.registers_size
    }

    #[inline]
    #[must_use]
    pub fn instructions_count(&self) -> usize {
        self.insns.len()
    }

    /// Total size of the instructions stream, in code units.
    #[must_use]
    pub fn code_units(&self) -> usize {
        self.insns.last().map_or(0, |i| i.next_addr().0)
    }

    #[inline]
    pub fn iter_instructions(&self) -> impl Iterator<Item = &LabeledInstr> {
        self.insns.iter()
    }

    /// Returns the position of the instruction starting at `addr` in the stream.
    pub fn index_at(&self, addr: Addr) -> DexResult<usize> {
        self.insns
            .binary_search_by(|probe| probe.addr().cmp(&addr))
            .map_err(|_| DexError::InstructionNotFound(addr))
    }

    #[inline]
    pub fn instruction_at(&self, addr: Addr) -> DexResult<&LabeledInstr> {
        let index = self.index_at(addr)?;
        Ok(&self.insns[index])
    }

    /// Replaces the instruction at `addr` by another one of the very same size,
    /// so that no branch offset is invalidated.
    pub fn replace_instruction_at(&mut self, addr: Addr, instr: Instr) -> DexResult<()> {
        let index = self.index_at(addr)?;
        let old = &self.insns[index];
        if old.size() != instr.size() {
            return Err(DexError::BadInstructionSize {
                addr,
                expected: old.size(),
                actual: instr.size(),
            });
        }
        self.insns[index] = LabeledInstr { addr, instr };
        Ok(())
    }

    #[inline]
    pub fn iter_tries(&self) -> impl Iterator<Item = &TryItem> {
        self.tries.iter()
    }
}

/// A protected range of code and its ordered handlers.
#[derive(Debug, Clone)]
pub struct TryItem {
    pub(crate) start_addr: usize,
    pub(crate) insn_count: usize,
    pub(crate) handlers: Vec<CatchHandler>,
}

impl TryItem {
    #[must_use]
    pub fn new(start_addr: usize, insn_count: usize, handlers: Vec<CatchHandler>) -> Self {
        Self {
            start_addr,
            insn_count,
            handlers,
        }
    }

    #[inline]
    #[must_use]
    pub const fn start_addr(&self) -> Addr {
        Addr(self.start_addr)
    }

    /// Length of the protected range, in code units.
    #[inline]
    #[must_use]
    pub const fn insn_count(&self) -> usize {
        self.insn_count
    }

    #[inline]
    #[must_use]
    pub const fn end_addr(&self) -> Addr {
        Addr(self.start_addr + self.insn_count)
    }

    #[must_use]
    pub fn covers(&self, addr: Addr) -> bool {
        self.start_addr() <= addr && addr < self.end_addr()
    }

    #[inline]
    pub fn iter_handlers(&self) -> impl Iterator<Item = &CatchHandler> {
        self.handlers.iter()
    }
}

/// An exception handler entry; `exception` is `None` for catch-all handlers.
#[derive(Debug, Clone)]
pub struct CatchHandler {
    pub exception: Option<Type>,
    pub addr: Addr,
}

impl CatchHandler {
    #[must_use]
    pub fn typed(exception: Type, addr: usize) -> Self {
        Self {
            exception: Some(exception),
            addr: Addr(addr),
        }
    }

    #[must_use]
    pub const fn catch_all(addr: usize) -> Self {
        Self {
            exception: None,
            addr: Addr(addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Reg;

    fn sample() -> CodeItem {
        CodeItem::new(
            2,
            vec![
                Instr::Const16(Reg::from(0u8), 12),
                Instr::Nop,
                Instr::Return(Reg::from(0u8)),
            ],
            vec![TryItem::new(0, 3, vec![CatchHandler::catch_all(3)])],
        )
    }

    #[test]
    fn test_layout() {
        let code = sample();
        let addrs: Vec<usize> = code.iter_instructions().map(|i| i.addr().0).collect();
        assert_eq!(addrs, vec![0, 2, 3]);
        assert_eq!(code.code_units(), 4);
        assert!(code.instruction_at(Addr(1)).is_err());
        assert!(code.iter_tries().next().unwrap().covers(Addr(2)));
        assert!(!code.iter_tries().next().unwrap().covers(Addr(3)));
    }

    #[test]
    fn test_replace_keeps_size() {
        let mut code = sample();
        assert!(code.replace_instruction_at(Addr(2), Instr::ReturnVoid).is_ok());
        assert!(matches!(
            code.replace_instruction_at(Addr(0), Instr::Nop),
            Err(DexError::BadInstructionSize { .. })
        ));
    }
}
