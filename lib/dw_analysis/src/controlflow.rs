//! Instruction level control flow graph.
//!
//! Every instruction of a method body becomes a node, linked to the instructions execution can
//! pass on to. A synthetic start node precedes the first instruction and carries the register
//! types the method is entered with. Exception edges do not come from the throwing
//! instruction: a throwing instruction does not modify its registers, so handlers are linked to
//! its predecessors, which is where the registers state seen by the handler comes from.

use crate::classpath::errors::ClassPathResult;
use crate::classpath::ClassPath;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::typing::RegisterType;
use dw_dex::code::CodeItem;
use dw_dex::instrs::{Instr, Instruction, LabeledInstr};
use dw_dex::registers::Reg;
use dw_dex::Addr;
use fixedbitset::FixedBitSet;
use log::trace;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write;

/// A node of the graph; the start node sorts before every instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Start,
    Instr(usize),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Start => write!(f, "<start>"),
            Self::Instr(index) => write!(f, "#{index}"),
        }
    }
}

/// Result of merging a register type into the entry state of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Merge {
    /// The entry type did not change.
    Unchanged,
    /// The entry type changed but the instruction overwrites the register.
    Absorbed,
    /// The entry type changed and flows through the instruction.
    Propagated,
}

/// An instruction node, with the register types before and after its execution.
#[derive(Debug, Clone)]
pub struct AnalyzedInstruction {
    index: usize,
    addr: Addr,
    instr: Instr,
    original: Instr,
    predecessors: BTreeSet<NodeId>,
    successors: Vec<usize>,
    pre: Vec<RegisterType>,
    post: Vec<RegisterType>,
}

impl AnalyzedInstruction {
    fn new(index: usize, linstr: &LabeledInstr, register_count: usize) -> Self {
        Self {
            index,
            addr: linstr.addr(),
            instr: linstr.instr().clone(),
            original: linstr.instr().clone(),
            predecessors: BTreeSet::new(),
            successors: Vec::new(),
            pre: vec![RegisterType::Unknown; register_count],
            post: vec![RegisterType::Unknown; register_count],
        }
    }

    /// Position of the instruction in the method body.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    /// The instruction, deodexed when analysis could resolve it.
    #[inline]
    #[must_use]
    pub const fn instruction(&self) -> &Instr {
        &self.instr
    }

    /// The instruction as found in the method body.
    #[inline]
    #[must_use]
    pub const fn original_instruction(&self) -> &Instr {
        &self.original
    }

    pub fn predecessors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.predecessors.iter().copied()
    }

    #[inline]
    #[must_use]
    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    /// Returns `true` if this instruction can be the first one executed by the method: the
    /// first instruction, and the handlers of the exceptions it (transitively) raises.
    #[must_use]
    pub fn is_beginning_instruction(&self) -> bool {
        self.predecessors.first() == Some(&NodeId::Start)
    }

    /// Unreachable instructions have no predecessor.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        !self.predecessors.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.pre.len()
    }

    #[must_use]
    pub fn pre_register(&self, reg: usize) -> Option<&RegisterType> {
        self.pre.get(reg)
    }

    #[must_use]
    pub fn post_register(&self, reg: usize) -> Option<&RegisterType> {
        self.post.get(reg)
    }

    #[inline]
    #[must_use]
    pub fn pre_registers(&self) -> &[RegisterType] {
        &self.pre
    }

    #[inline]
    #[must_use]
    pub fn post_registers(&self) -> &[RegisterType] {
        &self.post
    }

    pub(crate) fn set_instruction(&mut self, instr: Instr) {
        self.instr = instr;
    }

    pub(crate) fn restore_original(&mut self) {
        self.instr = self.original.clone();
    }

    /// Returns `true` if the instruction is a call to a constructor.
    #[must_use]
    pub fn is_invoke_init(&self) -> bool {
        if !self.instr.can_initialize_reference() {
            return false;
        }
        match &self.instr {
            Instr::InvokeDirect(_, method)
            | Instr::InvokeDirectRange(_, method)
            | Instr::InvokeDirectEmpty(_, method)
            | Instr::InvokeObjectInitRange(_, method) => method.name == "<init>",
            _ => false,
        }
    }

    /// Receiver of an invoke-kind instruction.
    pub(crate) fn object_register(&self) -> Option<Reg> {
        match &self.instr {
            Instr::InvokeDirect(args, _) | Instr::InvokeDirectEmpty(args, _) => args.first(),
            Instr::InvokeDirectRange(range, _) | Instr::InvokeObjectInitRange(range, _) => {
                if range.count() > 0 {
                    Some(range.start())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns `true` if executing the instruction writes the given register.
    ///
    /// Constructor calls write their receiver, and every other register holding the very same
    /// uninitialized reference.
    #[must_use]
    pub fn sets_register(&self, reg: usize) -> bool {
        if self.is_invoke_init() {
            let Some(object) = self.object_register() else {
                return false;
            };
            if reg == object.index() {
                return true;
            }
            let (Some(candidate), Some(object)) = (self.pre.get(reg), self.pre.get(object.index()))
            else {
                return false;
            };
            return matches!(
                candidate,
                RegisterType::UninitRef { .. } | RegisterType::UninitThis(_)
            ) && candidate == object;
        }

        let Some(dst) = self.instr.destination() else {
            return false;
        };
        reg == dst.index() || (self.instr.sets_wide_register() && reg == dst.index() + 1)
    }

    /// Sets the type of a register after the instruction; returns `true` if it changed.
    pub(crate) fn set_post(&mut self, reg: usize, type_: RegisterType) -> bool {
        if self.post[reg] == type_ {
            return false;
        }
        self.post[reg] = type_;
        true
    }

    /// Merges an incoming type into the entry state; when the instruction does not write the
    /// register, the exit state follows.
    pub(crate) fn merge_pre(
        &mut self,
        reg: usize,
        type_: &RegisterType,
        classpath: &ClassPath,
    ) -> ClassPathResult<Merge> {
        let merged = self.pre[reg].merge(type_, classpath)?;
        if merged == self.pre[reg] {
            return Ok(Merge::Unchanged);
        }
        self.pre[reg] = merged.clone();
        if self.sets_register(reg) {
            Ok(Merge::Absorbed)
        } else {
            self.post[reg] = merged;
            Ok(Merge::Propagated)
        }
    }

    /// Formats the entry register types, e.g. `v0=(Integer) v1=(Reference,Ljava/lang/String;)`.
    #[must_use]
    pub fn pre_registers_dump(&self) -> String {
        dump_registers(&self.pre)
    }

    /// Formats the exit register types.
    #[must_use]
    pub fn post_registers_dump(&self) -> String {
        dump_registers(&self.post)
    }
}

impl fmt::Display for AnalyzedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.addr, self.instr)
    }
}

fn dump_registers(registers: &[RegisterType]) -> String {
    let mut res = String::new();
    for (i, type_) in registers.iter().enumerate() {
        if i > 0 {
            res.push(' ');
        }
        // writing into a string cannot fail
        let _ = write!(res, "v{i}={type_}");
    }
    res
}

/// The synthetic node preceding the first instruction.
#[derive(Debug, Clone)]
pub(crate) struct StartNode {
    pub(crate) successors: Vec<usize>,
    pub(crate) post: Vec<RegisterType>,
}

/// Kind of an edge, as rendered in graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Sequence,
    Jump,
    Switch,
    Catch,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "<seq>"),
            Self::Jump => write!(f, "<jmp>"),
            Self::Switch => write!(f, "<switch>"),
            Self::Catch => write!(f, "<catch>"),
        }
    }
}

/// The control flow graph of a method body.
#[derive(Debug, Clone)]
pub struct ControlFlow {
    pub(crate) start: StartNode,
    pub(crate) instrs: Vec<AnalyzedInstruction>,
}

impl ControlFlow {
    /// Builds the graph of the reachable part of a method body.
    pub fn build(code: &CodeItem) -> AnalysisResult<Self> {
        let register_count = code.registers_size();
        let instrs: Vec<AnalyzedInstruction> = code
            .iter_instructions()
            .enumerate()
            .map(|(index, linstr)| AnalyzedInstruction::new(index, linstr, register_count))
            .collect();
        if instrs.is_empty() {
            return Err(AnalysisError::NoCode);
        }

        let mut builder = Builder {
            handlers: exception_handlers(code, &instrs)?,
            cfg: Self {
                start: StartNode {
                    successors: Vec::new(),
                    post: vec![RegisterType::Unknown; register_count],
                },
                instrs,
            },
            worklist: FixedBitSet::with_capacity(code.instructions_count()),
        };
        builder.link(NodeId::Start, 0, false)?;

        loop {
            let Some(index) = builder.worklist.ones().next() else {
                break;
            };
            builder.worklist.set(index, false);
            let node = &builder.cfg.instrs[index];
            let addr = node.addr;
            let instr = node.instr.clone();

            if instr.can_continue() {
                if index == builder.cfg.instrs.len() - 1 {
                    return Err(AnalysisError::ContinuesPastEnd);
                }
                builder.link(NodeId::Instr(index), index + 1, false)?;
            }

            if instr.is_switch() {
                for target in builder.cfg.switch_targets(code, addr, &instr)? {
                    builder.link(NodeId::Instr(index), target, false)?;
                }
            } else if instr.is_branch() {
                let target = builder.cfg.target(code, addr, &instr)?;
                builder.link(NodeId::Instr(index), target, false)?;
            }
        }

        trace!(
            "control flow built: {} instructions, {} reachable",
            builder.cfg.instrs.len(),
            builder.cfg.instrs.iter().filter(|i| i.is_reachable()).count()
        );
        Ok(builder.cfg)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &AnalyzedInstruction> {
        self.instrs.iter()
    }

    #[must_use]
    pub fn instruction(&self, index: usize) -> Option<&AnalyzedInstruction> {
        self.instrs.get(index)
    }

    /// Instructions following the start node.
    #[must_use]
    pub fn entry_successors(&self) -> &[usize] {
        &self.start.successors
    }

    /// Register types the method is entered with.
    #[must_use]
    pub fn entry_registers(&self) -> &[RegisterType] {
        &self.start.post
    }

    pub(crate) fn successors_of(&self, node: NodeId) -> &[usize] {
        match node {
            NodeId::Start => &self.start.successors,
            NodeId::Instr(index) => &self.instrs[index].successors,
        }
    }

    pub(crate) fn post_of(&self, node: NodeId, reg: usize) -> &RegisterType {
        match node {
            NodeId::Start => &self.start.post[reg],
            NodeId::Instr(index) => &self.instrs[index].post[reg],
        }
    }

    pub(crate) fn set_post_of(&mut self, node: NodeId, reg: usize, type_: RegisterType) -> bool {
        match node {
            NodeId::Start => {
                if self.start.post[reg] == type_ {
                    return false;
                }
                self.start.post[reg] = type_;
                true
            }
            NodeId::Instr(index) => self.instrs[index].set_post(reg, type_),
        }
    }

    fn target(&self, code: &CodeItem, addr: Addr, instr: &Instr) -> AnalysisResult<usize> {
        let offset = instr.target_offset().unwrap_or_default();
        addr.offset(offset)
            .and_then(|target| code.index_at(target).ok())
            .ok_or(AnalysisError::InvalidTarget { from: addr, offset })
    }

    fn switch_targets(
        &self,
        code: &CodeItem,
        addr: Addr,
        instr: &Instr,
    ) -> AnalysisResult<Vec<usize>> {
        let payload = self.target(code, addr, instr)?;
        let targets = self.instrs[payload]
            .instr
            .payload_targets()
            .ok_or(AnalysisError::MissingPayload(self.instrs[payload].addr))?;
        // switch targets are relative to the switch instruction, not to its payload
        targets
            .iter()
            .map(|offset| {
                addr.offset(*offset)
                    .and_then(|target| code.index_at(target).ok())
                    .ok_or(AnalysisError::InvalidTarget {
                        from: addr,
                        offset: *offset,
                    })
            })
            .collect()
    }

    fn edge_kind(&self, from: NodeId, to: usize) -> Edge {
        match from {
            NodeId::Start if to == 0 => Edge::Sequence,
            NodeId::Start => Edge::Catch,
            NodeId::Instr(index) => {
                let instr = &self.instrs[index].instr;
                if instr.can_continue() && to == index + 1 {
                    Edge::Sequence
                } else if instr.is_switch() {
                    Edge::Switch
                } else if instr.is_branch()
                    && self.instrs[index]
                        .addr
                        .offset(instr.target_offset().unwrap_or_default())
                        == Some(self.instrs[to].addr)
                {
                    Edge::Jump
                } else {
                    Edge::Catch
                }
            }
        }
    }

    /// Returns the graph of reachable instructions, labelled with their text. The start node is
    /// the first node of the graph.
    #[must_use]
    pub fn to_graph(&self) -> DiGraph<String, Edge> {
        let mut graph = DiGraph::new();
        let start = graph.add_node(String::from("<start>"));
        let nodes: Vec<Option<NodeIndex>> = self
            .instrs
            .iter()
            .map(|instr| {
                if instr.is_reachable() {
                    Some(graph.add_node(instr.to_string()))
                } else {
                    None
                }
            })
            .collect();

        for &to in &self.start.successors {
            if let Some(dst) = nodes[to] {
                graph.add_edge(start, dst, self.edge_kind(NodeId::Start, to));
            }
        }
        for (index, instr) in self.instrs.iter().enumerate() {
            let Some(src) = nodes[index] else {
                continue;
            };
            for &to in &instr.successors {
                if let Some(dst) = nodes[to] {
                    graph.add_edge(src, dst, self.edge_kind(NodeId::Instr(index), to));
                }
            }
        }
        graph
    }

    /// Renders the graph in the Graphviz DOT language.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let graph = self.to_graph();
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  nodesep=1;\n");
        // writing into a string cannot fail
        let _ = write!(
            res,
            "{}",
            Dot::with_attr_getters(
                &graph,
                &[
                    Config::GraphContentOnly,
                    Config::EdgeNoLabel,
                    Config::NodeNoLabel
                ],
                &|_, edge| {
                    let color = match edge.weight() {
                        Edge::Sequence => "black",
                        Edge::Jump => "blue",
                        Edge::Switch => "purple",
                        Edge::Catch => "orchid",
                    };
                    let mut label = String::new();
                    html_escape::encode_text_to_string(edge.weight().to_string(), &mut label);
                    format!("color={color},xlabel=<{label}>")
                },
                &|_, (_, text)| {
                    let mut label = String::new();
                    html_escape::encode_text_to_string(text, &mut label);
                    format!("shape=box,label=<{label}>")
                }
            )
        );
        res.push('}');
        res
    }
}

/// Entry instructions of the handlers catching exceptions raised by each instruction.
fn exception_handlers(
    code: &CodeItem,
    instrs: &[AnalyzedInstruction],
) -> AnalysisResult<Vec<Vec<usize>>> {
    instrs
        .iter()
        .map(|node| {
            if !node.instr.can_throw() {
                return Ok(Vec::new());
            }
            match code.iter_tries().find(|try_| try_.covers(node.addr)) {
                Some(try_) => try_
                    .iter_handlers()
                    .map(|handler| code.index_at(handler.addr).map_err(AnalysisError::from))
                    .collect(),
                None => Ok(Vec::new()),
            }
        })
        .collect()
}

struct Builder {
    cfg: ControlFlow,
    handlers: Vec<Vec<usize>>,
    worklist: FixedBitSet,
}

impl Builder {
    /// Adds an edge, then edges from the same predecessor to the handlers of the exceptions
    /// the successor may raise.
    fn link(
        &mut self,
        from: NodeId,
        to: usize,
        allow_move_exception: bool,
    ) -> AnalysisResult<()> {
        if !allow_move_exception {
            if let Instr::MoveException(_) = self.cfg.instrs[to].instr {
                let (from_name, from_addr) = match from {
                    NodeId::Start => ("start-of-method", Addr::entry()),
                    NodeId::Instr(index) => {
                        let node = &self.cfg.instrs[index];
                        (node.instr.mnemonic(), node.addr)
                    }
                };
                return Err(AnalysisError::MoveExceptionEdge {
                    from: from_name.to_string(),
                    from_addr,
                    to_addr: self.cfg.instrs[to].addr,
                });
            }
        }

        if !self.cfg.instrs[to].predecessors.insert(from) {
            return Ok(());
        }
        match from {
            NodeId::Start => self.cfg.start.successors.push(to),
            NodeId::Instr(index) => self.cfg.instrs[index].successors.push(to),
        }
        self.worklist.insert(to);

        for handler in self.handlers[to].clone() {
            self.link(from, handler, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dw_dex::code::{CatchHandler, TryItem};
    use dw_dex::fields::FieldRef;
    use dw_dex::types::Type;

    fn r(n: u16) -> Reg {
        Reg::from(n)
    }

    fn succs(cfg: &ControlFlow, index: usize) -> Vec<usize> {
        cfg.instruction(index).unwrap().successors().to_vec()
    }

    #[test]
    fn test_straight_line() {
        let code = CodeItem::new(
            2,
            vec![
                Instr::Const4(r(0), 1),
                Instr::AddInt2addr(r(0), r(0)),
                Instr::Return(r(0)),
            ],
            vec![],
        );
        let cfg = ControlFlow::build(&code).unwrap();
        assert_eq!(cfg.entry_successors(), &[0]);
        assert_eq!(succs(&cfg, 0), vec![1]);
        assert_eq!(succs(&cfg, 1), vec![2]);
        assert!(succs(&cfg, 2).is_empty());
        assert!(cfg.instruction(0).unwrap().is_beginning_instruction());
        assert!(!cfg.instruction(1).unwrap().is_beginning_instruction());
    }

    #[test]
    fn test_continues_past_end() {
        let code = CodeItem::new(1, vec![Instr::Const4(r(0), 1)], vec![]);
        assert!(matches!(
            ControlFlow::build(&code),
            Err(AnalysisError::ContinuesPastEnd)
        ));
        let code = CodeItem::new(1, vec![], vec![]);
        assert!(matches!(ControlFlow::build(&code), Err(AnalysisError::NoCode)));
    }

    #[test]
    fn test_branches_and_dead_code() {
        let code = CodeItem::new(
            1,
            vec![
                Instr::IfEqz(r(0), 4), // 0x0
                Instr::Goto(3),        // 0x2
                Instr::Nop,            // 0x3, dead
                Instr::ReturnVoid,     // 0x4
                Instr::ReturnVoid,     // 0x5
            ],
            vec![],
        );
        let cfg = ControlFlow::build(&code).unwrap();
        assert_eq!(succs(&cfg, 0), vec![1, 3]);
        assert_eq!(succs(&cfg, 1), vec![4]);
        assert!(!cfg.instruction(2).unwrap().is_reachable());
        let preds: Vec<NodeId> = cfg.instruction(3).unwrap().predecessors().collect();
        assert_eq!(preds, vec![NodeId::Instr(0)]);
    }

    #[test]
    fn test_switch_targets() {
        let code = CodeItem::new(
            1,
            vec![
                Instr::PackedSwitch(r(0), 6),                 // 0x0
                Instr::ReturnVoid,                            // 0x3
                Instr::Return(r(0)),                          // 0x4
                Instr::Return(r(0)),                          // 0x5
                Instr::PackedSwitchPayload(0, vec![4, 5, 4]), // 0x6
            ],
            vec![],
        );
        let cfg = ControlFlow::build(&code).unwrap();
        assert_eq!(succs(&cfg, 0), vec![1, 2, 3]);
        assert!(!cfg.instruction(4).unwrap().is_reachable());

        let code = CodeItem::new(
            1,
            vec![Instr::SparseSwitch(r(0), 3), Instr::ReturnVoid],
            vec![],
        );
        assert!(matches!(
            ControlFlow::build(&code),
            Err(AnalysisError::MissingPayload(Addr(3)))
        ));
    }

    #[test]
    fn test_exception_handlers() {
        let field = FieldRef::new(Type::class("Foo"), "f", Type::Int);
        let code = CodeItem::new(
            3,
            vec![
                Instr::Const4(r(0), 0),                   // 0x0
                Instr::Iget(r(1), r(2), field),           // 0x1
                Instr::Return(r(1)),                      // 0x3
                Instr::MoveException(r(0)),               // 0x4
                Instr::Throw(r(0)),                       // 0x5
            ],
            vec![TryItem::new(
                1,
                2,
                vec![CatchHandler::typed(Type::class("java/lang/Exception"), 4)],
            )],
        );
        let cfg = ControlFlow::build(&code).unwrap();
        // the handler is reached from the predecessor of the throwing instruction
        assert_eq!(succs(&cfg, 0), vec![1, 3]);
        assert_eq!(succs(&cfg, 1), vec![2]);
        assert_eq!(succs(&cfg, 3), vec![4]);
        assert_eq!(cfg.edge_kind(NodeId::Instr(0), 3), Edge::Catch);
        assert!(!cfg.instruction(3).unwrap().is_beginning_instruction());
    }

    #[test]
    fn test_handlers_of_first_instruction() {
        let code = CodeItem::new(
            1,
            vec![
                Instr::MonitorEnter(r(0)), // 0x0
                Instr::ReturnVoid,         // 0x1
                Instr::MoveException(r(0)),
                Instr::Throw(r(0)),
            ],
            vec![TryItem::new(0, 1, vec![CatchHandler::catch_all(2)])],
        );
        let cfg = ControlFlow::build(&code).unwrap();
        assert_eq!(cfg.entry_successors(), &[0, 2]);
        assert!(cfg.instruction(2).unwrap().is_beginning_instruction());
    }

    #[test]
    fn test_move_exception_edge() {
        let code = CodeItem::new(
            1,
            vec![Instr::Nop, Instr::MoveException(r(0)), Instr::Throw(r(0))],
            vec![],
        );
        let err = ControlFlow::build(&code).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Execution can pass from the nop instruction at code address 0x0 to the move-exception instruction at address 0x1"
        );
    }

    #[test]
    fn test_dot_export() {
        let code = CodeItem::new(
            1,
            vec![
                Instr::ConstString(r(0), "<b>".to_string()),
                Instr::IfEqz(r(0), -2),
                Instr::ReturnVoid,
            ],
            vec![],
        );
        let cfg = ControlFlow::build(&code).unwrap();
        let graph = cfg.to_graph();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        let dot = cfg.to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("&lt;b&gt;"));
        assert!(dot.contains("color=blue"));
    }
}
