//! Register types inference and deodexing of a method body.
//!
//! The analysis is a fixed point computation over the [`ControlFlow`] graph: each instruction
//! computes the types of the registers it writes from the types it is entered with, and any
//! change of an exit type is merged into the entry state of the successors, which are then
//! analyzed again. Odexed instructions are rewritten to their standard form as soon as the type
//! of their receiver is known; those which never get one are replaced by an
//! [`Instr::UnresolvedOdex`] marker once the fixed point is reached.

mod deodex;
mod rules;

use crate::classpath::ClassPath;
use crate::controlflow::{AnalyzedInstruction, ControlFlow, Merge, NodeId};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::inline::InlineMethodResolver;
use crate::typing::RegisterType;
use dw_dex::classes::ClassDef;
use dw_dex::code::{CodeItem, TryItem};
use dw_dex::instrs::{Instr, Instruction};
use dw_dex::methods::{MethodDef, MethodRef};
use dw_dex::registers::Reg;
use fixedbitset::FixedBitSet;
use log::{debug, trace};

/// Height of the register types lattice.
const LATTICE_HEIGHT: usize = 20;

const MIN_PASSES: usize = 1024;

/// Settings of a method analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerConfig {
    /// Maximum number of instruction analyses before giving up, computed from the size of the
    /// method when unset.
    pub max_passes: Option<usize>,
}

impl AnalyzerConfig {
    #[must_use]
    pub const fn with_max_passes(max_passes: usize) -> Self {
        Self {
            max_passes: Some(max_passes),
        }
    }

    /// Returns the maximum number of instruction analyses of a method. Each instruction is
    /// analyzed again at most once per change of one of its entry registers, and a register
    /// changes at most once per lattice level.
    #[must_use]
    pub fn limit(&self, instructions: usize, registers: usize) -> usize {
        self.max_passes.unwrap_or_else(|| {
            instructions
                .saturating_mul(registers + 1)
                .saturating_mul(LATTICE_HEIGHT)
                .max(MIN_PASSES)
        })
    }
}

/// Entry point of method analyses, sharing a class path (and optionally an inline table)
/// between methods.
#[derive(Debug, Clone, Copy)]
pub struct MethodAnalyzer<'a> {
    classpath: &'a ClassPath,
    inline_resolver: Option<&'a InlineMethodResolver>,
    config: AnalyzerConfig,
}

impl<'a> MethodAnalyzer<'a> {
    #[must_use]
    pub const fn new(classpath: &'a ClassPath) -> Self {
        Self {
            classpath,
            inline_resolver: None,
            config: AnalyzerConfig { max_passes: None },
        }
    }

    /// Enables deodexing of `execute-inline` instructions.
    #[must_use]
    pub const fn with_inline_resolver(mut self, resolver: &'a InlineMethodResolver) -> Self {
        self.inline_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub const fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn classpath(&self) -> &'a ClassPath {
        self.classpath
    }

    /// Analyzes a method of `class`.
    ///
    /// On failure, the error is wrapped in an [`AnalysisError::Context`] locating the
    /// instruction that could not be analyzed.
    pub fn analyze(&self, class: &ClassDef, method: &MethodDef) -> AnalysisResult<AnalyzedMethod> {
        let code = method.code.as_ref().ok_or(AnalysisError::NoCode)?;
        let method_ref = method.to_ref(&class.type_);
        let param_registers = method_ref.params_register_count() + usize::from(!method.is_static());
        if param_registers > code.registers_size() {
            return Err(AnalysisError::ParameterRegisters {
                params: param_registers,
                registers: code.registers_size(),
            });
        }

        debug!("analyzing {method_ref}");
        let cfg = ControlFlow::build(code)?;
        let mut analysis = Analysis {
            classpath: self.classpath,
            inline_resolver: self.inline_resolver,
            class,
            code,
            analyzed: FixedBitSet::with_capacity(cfg.len()),
            cfg,
            method: method_ref,
        };
        analysis.init_registers(method)?;
        analysis.run(self.config.limit(code.instructions_count(), code.registers_size()))?;
        analysis.fix_unresolved()?;
        debug!("analyzed {}", analysis.method);

        Ok(AnalyzedMethod {
            method: analysis.method,
            registers_size: code.registers_size(),
            param_registers,
            tries: code.iter_tries().cloned().collect(),
            cfg: analysis.cfg,
        })
    }
}

/// Result of a method analysis: the register types around each instruction and the deodexed
/// instructions.
#[derive(Debug, Clone)]
pub struct AnalyzedMethod {
    method: MethodRef,
    registers_size: usize,
    param_registers: usize,
    tries: Vec<TryItem>,
    cfg: ControlFlow,
}

impl AnalyzedMethod {
    #[inline]
    #[must_use]
    pub const fn method(&self) -> &MethodRef {
        &self.method
    }

    /// Number of registers holding the receiver and the arguments.
    #[inline]
    #[must_use]
    pub const fn param_register_count(&self) -> usize {
        self.param_registers
    }

    #[inline]
    #[must_use]
    pub const fn control_flow(&self) -> &ControlFlow {
        &self.cfg
    }

    pub fn instructions(&self) -> impl Iterator<Item = &AnalyzedInstruction> {
        self.cfg.instructions()
    }

    #[must_use]
    pub fn instruction(&self, index: usize) -> Option<&AnalyzedInstruction> {
        self.cfg.instruction(index)
    }

    /// Iterates over the instructions after deodexing.
    pub fn deodexed_instructions(&self) -> impl Iterator<Item = &Instr> {
        self.cfg.instructions().map(AnalyzedInstruction::instruction)
    }

    /// Rebuilds the method body with the deodexed instructions. Deodexing never changes the
    /// size of an instruction, so addresses and try blocks are unchanged.
    #[must_use]
    pub fn to_code_item(&self) -> CodeItem {
        CodeItem::new(
            self.registers_size,
            self.deodexed_instructions().cloned().collect(),
            self.tries.clone(),
        )
    }
}

/// State of the analysis of one method.
struct Analysis<'a> {
    classpath: &'a ClassPath,
    inline_resolver: Option<&'a InlineMethodResolver>,
    class: &'a ClassDef,
    code: &'a CodeItem,
    method: MethodRef,
    cfg: ControlFlow,
    analyzed: FixedBitSet,
}

#[allow(clippy::cast_possible_truncation)]
fn as_reg(index: usize) -> Reg {
    // dex register numbers fit in 16 bits
    Reg::from(index as u16)
}

impl<'a> Analysis<'a> {
    fn register_count(&self) -> usize {
        self.code.registers_size()
    }

    /// Seeds the start node: receiver and arguments from the method prototype, and every
    /// other register uninitialized.
    fn init_registers(&mut self, method: &MethodDef) -> AnalysisResult<()> {
        let total = self.register_count();
        let non_param = total - self.method.params_register_count() - usize::from(!method.is_static());

        let mut reg = non_param;
        if !method.is_static() {
            let this = self.classpath.class_of(&self.class.type_)?;
            let this_type = if method.is_constructor() {
                RegisterType::UninitThis(this)
            } else {
                RegisterType::Reference(this)
            };
            self.set_post_and_propagate(NodeId::Start, reg, this_type)?;
            reg += 1;
        }
        for param in &self.method.params.clone() {
            // the high half of wide parameters follows its low half
            self.set_post_and_propagate(
                NodeId::Start,
                reg,
                RegisterType::for_type(param, self.classpath)?,
            )?;
            reg += param.register_count();
        }

        for reg in 0..non_param {
            self.set_post_and_propagate(NodeId::Start, reg, RegisterType::Uninit)?;
        }
        Ok(())
    }

    /// Iterates until no instruction needs to be analyzed again.
    fn run(&mut self, limit: usize) -> AnalysisResult<()> {
        let mut to_analyze = FixedBitSet::with_capacity(self.cfg.len());
        for &index in self.cfg.entry_successors() {
            to_analyze.insert(index);
        }
        let mut undeodexed = FixedBitSet::with_capacity(self.cfg.len());
        let mut passes = 0;

        loop {
            let mut did_something = false;

            loop {
                let Some(index) = to_analyze.ones().next() else {
                    break;
                };
                to_analyze.set(index, false);
                if self.analyzed.contains(index) {
                    continue;
                }

                passes += 1;
                if passes > limit {
                    return Err(AnalysisError::IterationLimit(limit));
                }

                if self.cfg.instrs[index].original_instruction().odex_only() {
                    // registers may be more precise than when the instruction was deodexed
                    self.cfg.instrs[index].restore_original();
                }

                let done = self
                    .analyze_instruction(index)
                    .map_err(|err| self.locate(index, err))?;
                if !done {
                    trace!("deferring {}", self.cfg.instrs[index]);
                    undeodexed.insert(index);
                    continue;
                }
                did_something = true;
                undeodexed.set(index, false);

                let node = &self.cfg.instrs[index];
                trace!("{node}  [{}]", node.post_registers_dump());
                self.analyzed.insert(index);
                for &successor in node.successors() {
                    to_analyze.insert(successor);
                }
            }

            if !did_something {
                return Ok(());
            }
            to_analyze.union_with(&undeodexed);
        }
    }

    /// Replaces odexed instructions that analysis could not deodex.
    fn fix_unresolved(&mut self) -> AnalysisResult<()> {
        for index in 0..self.cfg.len() {
            let node = &self.cfg.instrs[index];
            if !node.instruction().odex_only() {
                continue;
            }
            let Some(replacement) =
                deodex::final_form(node.instruction()).map_err(|err| self.locate(index, err))?
            else {
                continue;
            };
            trace!("{node} replaced by {replacement}");
            self.cfg.instrs[index].set_instruction(replacement);
        }
        Ok(())
    }

    fn locate(&self, index: usize, err: AnalysisError) -> AnalysisError {
        let node = &self.cfg.instrs[index];
        err.with_context(node.instruction().mnemonic(), node.addr(), self.method.to_string())
    }

    /// Entry type of a register at an instruction.
    fn pre(&self, index: usize, reg: Reg) -> AnalysisResult<RegisterType> {
        self.cfg.instrs[index]
            .pre_register(reg.index())
            .cloned()
            .ok_or(AnalysisError::RegisterOutOfBounds(reg))
    }

    /// Sets the type of the register written by an instruction.
    fn set_destination(&mut self, index: usize, type_: RegisterType) -> AnalysisResult<bool> {
        let instr = self.cfg.instrs[index].instruction();
        let dst = instr
            .destination()
            .ok_or_else(|| AnalysisError::NoDestination(instr.mnemonic()))?;
        self.set_post_and_propagate(NodeId::Instr(index), dst.index(), type_)?;
        Ok(true)
    }

    /// Sets the exit type of a register and merges it into the successors, transitively
    /// through the instructions that do not overwrite the register. Wide values set both
    /// halves of their register pair.
    fn set_post_and_propagate(
        &mut self,
        node: NodeId,
        reg: usize,
        type_: RegisterType,
    ) -> AnalysisResult<()> {
        if reg >= self.register_count() {
            return Err(AnalysisError::RegisterOutOfBounds(as_reg(reg)));
        }
        let high = type_.wide_high();
        if !self.cfg.set_post_of(node, reg, type_) {
            return Ok(());
        }

        let mut changed = FixedBitSet::with_capacity(self.cfg.len());
        self.propagate_to_successors(node, reg, &mut changed)?;
        loop {
            let Some(index) = changed.ones().next() else {
                break;
            };
            changed.set(index, false);
            self.propagate_to_successors(NodeId::Instr(index), reg, &mut changed)?;
        }

        if let Some(high) = high {
            if reg + 1 >= self.register_count() {
                return Err(AnalysisError::WidePairOutOfBounds(as_reg(reg)));
            }
            self.set_post_and_propagate(node, reg + 1, high)?;
        }
        Ok(())
    }

    fn propagate_to_successors(
        &mut self,
        node: NodeId,
        reg: usize,
        changed: &mut FixedBitSet,
    ) -> AnalysisResult<()> {
        let type_ = self.cfg.post_of(node, reg).clone();
        for i in 0..self.cfg.successors_of(node).len() {
            let successor = self.cfg.successors_of(node)[i];
            match self.cfg.instrs[successor].merge_pre(reg, &type_, self.classpath)? {
                Merge::Unchanged => (),
                Merge::Absorbed => self.analyzed.set(successor, false),
                Merge::Propagated => {
                    self.analyzed.set(successor, false);
                    changed.insert(successor);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classpath::ClassPathConfig;
    use crate::typing::Category;
    use dw_dex::classes::ClassFlags;
    use dw_dex::code::CatchHandler;
    use dw_dex::fields::{FieldDef, FieldFlags};
    use dw_dex::methods::MethodFlags;
    use dw_dex::registers::{RegList, RegRange};
    use dw_dex::types::Type;

    pub(crate) fn r(n: u16) -> Reg {
        Reg::from(n)
    }

    pub(crate) fn regs(ns: &[u16]) -> RegList {
        RegList::new(ns.iter().copied().map(Reg::from).collect()).unwrap()
    }

    pub(crate) fn class(name: &str) -> ClassDef {
        ClassDef::new(Type::class(name), ClassFlags::ACC_PUBLIC)
            .with_superclass(Type::class("java/lang/Object"))
    }

    pub(crate) fn method(
        name: &str,
        params: Vec<Type>,
        return_type: Type,
        flags: MethodFlags,
        registers: usize,
        instrs: Vec<Instr>,
    ) -> MethodDef {
        MethodDef::new(name, params, return_type, flags)
            .with_code(CodeItem::new(registers, instrs, vec![]))
    }

    pub(crate) fn category(analyzed: &AnalyzedMethod, index: usize, reg: usize) -> Category {
        analyzed
            .instruction(index)
            .unwrap()
            .post_register(reg)
            .unwrap()
            .category()
    }

    pub(crate) fn pre_category(analyzed: &AnalyzedMethod, index: usize, reg: usize) -> Category {
        analyzed
            .instruction(index)
            .unwrap()
            .pre_register(reg)
            .unwrap()
            .category()
    }

    fn descriptor(analyzed: &AnalyzedMethod, index: usize, reg: usize) -> String {
        analyzed
            .instruction(index)
            .unwrap()
            .post_register(reg)
            .unwrap()
            .proto()
            .unwrap()
            .descriptor()
            .to_string()
    }

    fn analyze(classpath: &ClassPath, class: &ClassDef, method: &MethodDef) -> AnalyzedMethod {
        MethodAnalyzer::new(classpath).analyze(class, method).unwrap()
    }

    #[test]
    fn test_static_add() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let add = method(
            "add",
            vec![Type::Int, Type::Int],
            Type::Int,
            MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC,
            3,
            vec![Instr::AddInt(r(2), r(0), r(1)), Instr::Return(r(2))],
        );
        // parameters are the last registers: v1 and v2
        let analyzed = analyze(&cp, &foo, &add);
        assert_eq!(pre_category(&analyzed, 0, 0), Category::Uninit);
        assert_eq!(pre_category(&analyzed, 0, 1), Category::Integer);
        assert_eq!(pre_category(&analyzed, 0, 2), Category::Integer);
        assert_eq!(category(&analyzed, 0, 2), Category::Integer);
        assert_eq!(analyzed.param_register_count(), 2);

        let add = method(
            "add",
            vec![Type::Int, Type::Int],
            Type::Int,
            MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC,
            3,
            vec![Instr::AddInt(r(0), r(1), r(2)), Instr::Return(r(0))],
        );
        let analyzed = analyze(&cp, &foo, &add);
        assert_eq!(pre_category(&analyzed, 0, 1), Category::Integer);
        assert_eq!(pre_category(&analyzed, 0, 2), Category::Integer);
        assert_eq!(category(&analyzed, 0, 0), Category::Integer);
        assert_eq!(pre_category(&analyzed, 1, 0), Category::Integer);

        let add = method(
            "add",
            vec![Type::Int, Type::Int],
            Type::Int,
            MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC,
            2,
            vec![Instr::AddInt(r(2), r(0), r(1)), Instr::Return(r(2))],
        );
        let err = MethodAnalyzer::new(&cp).analyze(&foo, &add).unwrap_err();
        assert!(matches!(err.root(), AnalysisError::RegisterOutOfBounds(_)));
    }

    #[test]
    fn test_constructor_in_loop() {
        let cp = ClassPath::new(vec![class("Foo")], ClassPathConfig::default());
        let foo = class("Foo");
        let object_init = MethodRef::new(Type::class("java/lang/Object"), "<init>", vec![], Type::Void);
        let init = method(
            "<init>",
            vec![],
            Type::Void,
            MethodFlags::ACC_PUBLIC | MethodFlags::ACC_CONSTRUCTOR,
            2,
            vec![
                Instr::Const4(r(0), 0),
                Instr::IfNez(r(0), 6),
                Instr::InvokeDirect(regs(&[1]), object_init),
                Instr::Goto(-5),
                Instr::ReturnVoid,
            ],
        );
        // the back edge joins the initialized and uninitialized receivers
        let analyzed = analyze(&cp, &foo, &init);
        assert_eq!(pre_category(&analyzed, 1, 1), Category::Conflicted);
        assert_eq!(pre_category(&analyzed, 2, 1), Category::Conflicted);
        assert_eq!(category(&analyzed, 2, 1), Category::Reference);
        assert_eq!(pre_category(&analyzed, 3, 1), Category::Reference);
        assert_eq!(pre_category(&analyzed, 4, 1), Category::Conflicted);
    }

    #[test]
    fn test_constructor_call() {
        let cp = ClassPath::new(vec![class("Foo")], ClassPathConfig::default());
        let foo = class("Foo");
        let object_init = MethodRef::new(Type::class("java/lang/Object"), "<init>", vec![], Type::Void);
        let init = method(
            "<init>",
            vec![Type::Int],
            Type::Void,
            MethodFlags::ACC_PUBLIC | MethodFlags::ACC_CONSTRUCTOR,
            3,
            vec![
                Instr::InvokeDirect(regs(&[1]), object_init),
                Instr::MoveObject(r(0), r(1)),
                Instr::ReturnVoid,
            ],
        );
        let analyzed = analyze(&cp, &foo, &init);
        assert_eq!(pre_category(&analyzed, 0, 1), Category::UninitThis);
        assert_eq!(pre_category(&analyzed, 0, 2), Category::Integer);
        assert_eq!(category(&analyzed, 0, 1), Category::Reference);
        assert_eq!(descriptor(&analyzed, 0, 1), "LFoo;");
        assert_eq!(descriptor(&analyzed, 1, 0), "LFoo;");
        assert_eq!(pre_category(&analyzed, 2, 1), Category::Reference);
    }

    #[test]
    fn test_move_result_object() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let to_string = MethodRef::new(
            Type::class("java/lang/Object"),
            "toString",
            vec![],
            Type::class("java/lang/String"),
        );
        let m = method(
            "name",
            vec![],
            Type::class("java/lang/String"),
            MethodFlags::ACC_PUBLIC,
            2,
            vec![
                Instr::InvokeVirtual(regs(&[1]), to_string),
                Instr::MoveResultObject(r(0)),
                Instr::ReturnObject(r(0)),
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        assert_eq!(category(&analyzed, 1, 0), Category::Reference);
        assert_eq!(descriptor(&analyzed, 1, 0), "Ljava/lang/String;");
        assert_eq!(descriptor(&analyzed, 1, 1), "LFoo;");

        let m = method(
            "name",
            vec![],
            Type::Void,
            MethodFlags::ACC_PUBLIC,
            2,
            vec![Instr::Nop, Instr::MoveResultObject(r(0)), Instr::ReturnVoid],
        );
        let err = MethodAnalyzer::new(&cp).analyze(&foo, &m).unwrap_err();
        assert_eq!(
            err.to_string(),
            "move-result-object must occur after an invoke-*/fill-new-array instruction\n    opcode: move-result-object\n    code address: 0x1\n    method: LFoo;->name()V"
        );
    }

    #[test]
    fn test_wide_pairs() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let m = method(
            "twice",
            vec![Type::Long, Type::Double],
            Type::Long,
            MethodFlags::ACC_STATIC,
            6,
            vec![
                Instr::AddLong(r(0), r(2), r(2)),
                Instr::MoveWide(r(2), r(0)),
                Instr::ReturnWide(r(2)),
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        assert_eq!(pre_category(&analyzed, 0, 2), Category::LongLo);
        assert_eq!(pre_category(&analyzed, 0, 3), Category::LongHi);
        assert_eq!(pre_category(&analyzed, 0, 4), Category::DoubleLo);
        assert_eq!(pre_category(&analyzed, 0, 5), Category::DoubleHi);
        assert_eq!(category(&analyzed, 0, 0), Category::LongLo);
        assert_eq!(category(&analyzed, 0, 1), Category::LongHi);
        assert_eq!(pre_category(&analyzed, 2, 2), Category::LongLo);
        assert_eq!(pre_category(&analyzed, 2, 3), Category::LongHi);

        let m = method(
            "last",
            vec![],
            Type::Void,
            MethodFlags::ACC_STATIC,
            2,
            vec![Instr::ConstWide16(r(1), 3), Instr::ReturnVoid],
        );
        let err = MethodAnalyzer::new(&cp).analyze(&foo, &m).unwrap_err();
        assert!(matches!(err.root(), AnalysisError::WidePairOutOfBounds(reg) if *reg == r(1)));
    }

    #[test]
    fn test_uninitialized_references_identity() {
        let cp = ClassPath::new(vec![class("Bar")], ClassPathConfig::default());
        let foo = class("Foo");
        let bar = Type::class("Bar");
        let bar_init = MethodRef::new(bar.clone(), "<init>", vec![], Type::Void);
        let m = method(
            "make",
            vec![],
            Type::Void,
            MethodFlags::ACC_STATIC,
            3,
            vec![
                Instr::NewInstance(r(0), bar.clone()),
                Instr::NewInstance(r(1), bar),
                Instr::MoveObject(r(2), r(0)),
                Instr::InvokeDirect(regs(&[0]), bar_init),
                Instr::ReturnVoid,
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        let first = analyzed.instruction(2).unwrap().pre_register(0).unwrap();
        let second = analyzed.instruction(2).unwrap().pre_register(1).unwrap();
        assert_eq!(first.category(), second.category());
        assert_ne!(first, second);

        // the copy of the initialized object is initialized, the other object is not
        assert_eq!(category(&analyzed, 3, 0), Category::Reference);
        assert_eq!(category(&analyzed, 3, 2), Category::Reference);
        assert_eq!(category(&analyzed, 3, 1), Category::UninitRef);
        assert_eq!(pre_category(&analyzed, 4, 2), Category::Reference);
    }

    #[test]
    fn test_loop_terminates() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let m = method(
            "count",
            vec![Type::Int],
            Type::Int,
            MethodFlags::ACC_STATIC,
            3,
            vec![
                Instr::Const4(r(0), 0),
                Instr::Const4(r(1), 1),
                // outer: 0x2
                Instr::IfGe(r(0), r(2), 9),
                // inner: 0x4
                Instr::IfGe(r(1), r(2), 5),
                Instr::AddIntLit8(r(1), r(1), 1),
                Instr::Goto(-4),
                Instr::AddInt2addr(r(0), r(1)),
                Instr::Goto(-8),
                Instr::Return(r(0)),
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        assert_eq!(pre_category(&analyzed, 2, 0), Category::Integer);
        assert_eq!(pre_category(&analyzed, 3, 1), Category::Integer);
        assert_eq!(pre_category(&analyzed, 8, 0), Category::Integer);

        let err = MethodAnalyzer::new(&cp)
            .with_config(AnalyzerConfig::with_max_passes(5))
            .analyze(&foo, &m)
            .unwrap_err();
        assert!(matches!(err.root(), AnalysisError::IterationLimit(5)));
    }

    #[test]
    fn test_move_exception() {
        let cp = ClassPath::new(
            vec![
                ClassDef::new(Type::class("java/lang/Exception"), ClassFlags::ACC_PUBLIC)
                    .with_superclass(Type::class("java/lang/Throwable")),
                ClassDef::new(Type::class("java/io/IOException"), ClassFlags::ACC_PUBLIC)
                    .with_superclass(Type::class("java/lang/Exception")),
                ClassDef::new(Type::class("java/lang/RuntimeException"), ClassFlags::ACC_PUBLIC)
                    .with_superclass(Type::class("java/lang/Exception")),
            ],
            ClassPathConfig::default(),
        );
        let foo = class("Foo");
        let code = CodeItem::new(
            2,
            vec![
                Instr::InvokeStatic(
                    regs(&[]),
                    MethodRef::new(Type::class("Foo"), "run", vec![], Type::Void),
                ),
                Instr::ReturnVoid,
                Instr::MoveException(r(0)),
                Instr::Throw(r(0)),
            ],
            vec![TryItem::new(
                0,
                3,
                vec![
                    CatchHandler::typed(Type::class("java/io/IOException"), 4),
                    CatchHandler::typed(Type::class("java/lang/RuntimeException"), 4),
                ],
            )],
        );
        let m = MethodDef::new("safe", vec![], Type::Void, MethodFlags::ACC_STATIC).with_code(code);
        let analyzed = analyze(&cp, &foo, &m);
        assert_eq!(descriptor(&analyzed, 2, 0), "Ljava/lang/Exception;");
    }

    #[test]
    fn test_boolean_operations() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let m = method(
            "both",
            vec![Type::Boolean, Type::Boolean],
            Type::Boolean,
            MethodFlags::ACC_STATIC,
            4,
            vec![
                Instr::AndInt(r(0), r(2), r(3)),
                Instr::AddInt(r(1), r(2), r(3)),
                Instr::XorIntLit8(r(1), r(0), 1),
                Instr::OrIntLit16(r(0), r(0), 2),
                Instr::Return(r(0)),
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        assert_eq!(category(&analyzed, 0, 0), Category::Boolean);
        assert_eq!(category(&analyzed, 1, 1), Category::Integer);
        assert_eq!(category(&analyzed, 2, 1), Category::Boolean);
        assert_eq!(category(&analyzed, 3, 0), Category::Integer);
    }

    #[test]
    fn test_array_elements() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let m = method(
            "first",
            vec![Type::Double.array_of(1), Type::class("java/lang/String").array_of(2)],
            Type::Void,
            MethodFlags::ACC_STATIC,
            5,
            vec![
                Instr::Const4(r(0), 0),
                Instr::AgetWide(r(1), r(3), r(0)),
                Instr::AgetObject(r(1), r(4), r(0)),
                Instr::AgetObject(r(2), r(1), r(0)),
                Instr::Const4(r(1), 0),
                Instr::AgetWide(r(1), r(1), r(0)),
                Instr::ArrayLength(r(2), r(4)),
                Instr::ReturnVoid,
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        assert_eq!(category(&analyzed, 1, 1), Category::DoubleLo);
        assert_eq!(category(&analyzed, 1, 2), Category::DoubleHi);
        assert_eq!(descriptor(&analyzed, 2, 1), "[Ljava/lang/String;");
        assert_eq!(descriptor(&analyzed, 3, 2), "Ljava/lang/String;");
        // a null array reads as a long
        assert_eq!(category(&analyzed, 5, 1), Category::LongLo);
        assert_eq!(category(&analyzed, 6, 2), Category::Integer);

        let m = method(
            "first",
            vec![Type::Int.array_of(1)],
            Type::Void,
            MethodFlags::ACC_STATIC,
            3,
            vec![
                Instr::Const4(r(0), 0),
                Instr::AgetWide(r(0), r(2), r(0)),
                Instr::ReturnVoid,
            ],
        );
        let err = MethodAnalyzer::new(&cp).analyze(&foo, &m).unwrap_err();
        assert_eq!(
            err.root().to_string(),
            "aget-wide used with narrow array: (Reference,[I)"
        );
    }

    #[test]
    fn test_literal_shift_right() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let m = method(
            "shift",
            vec![Type::Int, Type::Short, Type::Char],
            Type::Void,
            MethodFlags::ACC_STATIC,
            4,
            vec![
                Instr::ShrIntLit8(r(0), r(1), 24),
                Instr::UshrIntLit8(r(0), r(1), 25),
                Instr::UshrIntLit8(r(0), r(1), 16),
                Instr::ShrIntLit8(r(0), r(2), 8),
                Instr::UshrIntLit8(r(0), r(3), 9),
                Instr::UshrIntLit8(r(0), r(3), 0),
                Instr::ShrIntLit8(r(0), r(1), 3),
                Instr::ReturnVoid,
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        assert_eq!(category(&analyzed, 0, 0), Category::Byte);
        assert_eq!(category(&analyzed, 1, 0), Category::PosByte);
        assert_eq!(category(&analyzed, 2, 0), Category::Char);
        assert_eq!(category(&analyzed, 3, 0), Category::Byte);
        assert_eq!(category(&analyzed, 4, 0), Category::PosByte);
        assert_eq!(category(&analyzed, 5, 0), Category::Char);
        assert_eq!(category(&analyzed, 6, 0), Category::Integer);
    }

    #[test]
    fn test_odexed_method() {
        let bar = ClassDef::new(Type::class("Bar"), ClassFlags::ACC_PUBLIC)
            .with_superclass(Type::class("java/lang/Object"))
            .with_field(FieldDef::new("count", Type::Int, FieldFlags::ACC_PUBLIC))
            .with_field(FieldDef::new("name", Type::class("java/lang/String"), FieldFlags::ACC_PUBLIC))
            .with_method(MethodDef::new("size", vec![], Type::Int, MethodFlags::ACC_PUBLIC));
        let cp = ClassPath::new(vec![bar], ClassPathConfig::default());
        let foo = class("Foo");
        let bar = Type::class("Bar");
        let object_init = MethodRef::new(Type::class("java/lang/Object"), "<init>", vec![], Type::Void);

        // Bar: name at offset 8, count at offset 12; size() follows the 11 Object methods
        let m = method(
            "use",
            vec![bar],
            Type::Void,
            MethodFlags::ACC_PUBLIC,
            4,
            vec![
                Instr::IgetObjectQuick(r(0), r(3), 8),
                Instr::IgetQuick(r(1), r(3), 12),
                Instr::InvokeVirtualQuick(regs(&[3]), 11),
                Instr::MoveResult(r(1)),
                Instr::InvokeObjectInitRange(RegRange::new(r(2), 1), object_init),
                Instr::ReturnVoidBarrier,
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        let code: Vec<String> = analyzed
            .deodexed_instructions()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            code,
            vec![
                "iget-object v0, v3, LBar;->name:Ljava/lang/String;",
                "iget v1, v3, LBar;->count:I",
                "invoke-virtual {v3}, LBar;->size()I",
                "move-result v1",
                "invoke-direct {v2}, Ljava/lang/Object;-><init>()V",
                "return-void",
            ]
        );
        assert_eq!(descriptor(&analyzed, 0, 0), "Ljava/lang/String;");
        assert_eq!(category(&analyzed, 3, 1), Category::Integer);
        assert_eq!(analyzed.to_code_item().code_units(), 12);
    }

    #[test]
    fn test_unresolved_field_offset() {
        let bar = ClassDef::new(Type::class("Bar"), ClassFlags::ACC_PUBLIC)
            .with_superclass(Type::class("java/lang/Object"))
            .with_field(FieldDef::new("count", Type::Int, FieldFlags::ACC_PUBLIC));
        let cp = ClassPath::new(vec![bar], ClassPathConfig::default());
        let foo = class("Foo");
        let m = method(
            "use",
            vec![Type::class("Bar")],
            Type::Void,
            MethodFlags::ACC_PUBLIC,
            3,
            vec![Instr::IgetQuick(r(0), r(2), 24), Instr::ReturnVoid],
        );
        let err = MethodAnalyzer::new(&cp).analyze(&foo, &m).unwrap_err();
        assert!(matches!(
            err.root(),
            AnalysisError::FieldNotResolved { class, offset: 24 } if class == "LBar;"
        ));
        assert!(err.to_string().starts_with(
            "Could not resolve the field in class LBar; at offset 24\n    opcode: iget-quick"
        ));
    }

    #[test]
    fn test_null_receiver() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let m = method(
            "npe",
            vec![],
            Type::Void,
            MethodFlags::ACC_STATIC,
            2,
            vec![
                Instr::Const4(r(0), 0),
                Instr::IgetQuick(r(1), r(0), 8),
                Instr::InvokeVirtualQuickRange(RegRange::new(r(0), 1), 3),
                Instr::ReturnVoid,
            ],
        );
        let analyzed = analyze(&cp, &foo, &m);
        let code: Vec<&Instr> = analyzed.deodexed_instructions().collect();
        assert_eq!(code[1], &Instr::UnresolvedOdex(r(0), 2));
        assert_eq!(code[2], &Instr::UnresolvedOdex(r(0), 3));
        // types flow through instructions that are never analyzed
        assert_eq!(pre_category(&analyzed, 2, 0), Category::Null);
        assert_eq!(pre_category(&analyzed, 2, 1), Category::Unknown);
    }

    #[test]
    fn test_execute_inline() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let resolver = InlineMethodResolver::for_vm_version(35).unwrap();
        let m = method(
            "len",
            vec![Type::class("java/lang/String")],
            Type::Int,
            MethodFlags::ACC_STATIC,
            2,
            vec![
                Instr::ExecuteInline(regs(&[1]), 4),
                Instr::MoveResult(r(0)),
                Instr::Return(r(0)),
            ],
        );
        let analyzed = MethodAnalyzer::new(&cp)
            .with_inline_resolver(&resolver)
            .analyze(&foo, &m)
            .unwrap();
        assert_eq!(
            analyzed.instruction(0).unwrap().instruction().to_string(),
            "invoke-virtual {v1}, Ljava/lang/String;->length()I"
        );
        assert_eq!(category(&analyzed, 1, 0), Category::Integer);

        let err = MethodAnalyzer::new(&cp).analyze(&foo, &m).unwrap_err();
        assert!(matches!(err.root(), AnalysisError::NoInlineResolver));
    }

    #[test]
    fn test_shared_classpath() {
        let cp = ClassPath::new(vec![class("Bar")], ClassPathConfig::default());
        let foo = class("Foo");
        let to_string = MethodRef::new(
            Type::class("java/lang/Object"),
            "toString",
            vec![],
            Type::class("java/lang/String"),
        );
        let m = method(
            "name",
            vec![Type::class("Bar")],
            Type::class("java/lang/String"),
            MethodFlags::ACC_STATIC,
            2,
            vec![
                Instr::InvokeVirtual(regs(&[1]), to_string),
                Instr::MoveResultObject(r(0)),
                Instr::ReturnObject(r(0)),
            ],
        );
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| analyze(&cp, &foo, &m)))
                .collect();
            for handle in handles {
                let analyzed = handle.join().unwrap();
                assert_eq!(descriptor(&analyzed, 1, 0), "Ljava/lang/String;");
            }
        });
    }

    #[test]
    fn test_catch_registers_state() {
        let cp = ClassPath::new(vec![], ClassPathConfig::default());
        let foo = class("Foo");
        let code = CodeItem::new(
            2,
            vec![
                Instr::Const4(r(1), 1),
                Instr::ConstString(r(1), "x".to_string()),
                Instr::Throw(r(1)),
                Instr::MoveException(r(0)),
                Instr::ReturnVoid,
            ],
            vec![TryItem::new(0, 4, vec![CatchHandler::catch_all(4)])],
        );
        let m = MethodDef::new("f", vec![], Type::Void, MethodFlags::ACC_STATIC).with_code(code);
        let analyzed = analyze(&cp, &foo, &m);
        // handlers see the registers before each throwing instruction
        assert_eq!(pre_category(&analyzed, 3, 1), Category::Conflicted);
        assert_eq!(descriptor(&analyzed, 3, 0), "Ljava/lang/Throwable;");
    }
}
