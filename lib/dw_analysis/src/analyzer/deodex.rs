//! Rewriting of odexed instructions to their standard form.

use super::Analysis;
use crate::classpath::TypeProto;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::odex::{deodex_field_access, deodex_volatile_access};
use crate::typing::RegisterType;
use dw_dex::fields::FieldRef;
use dw_dex::instrs::{Instr, Instruction};
use dw_dex::methods::MethodRef;
use dw_dex::registers::{Reg, RegList, RegRange};
use dw_dex::types::Type;
use log::trace;
use std::convert::TryFrom;
use std::iter;
use std::sync::Arc;

/// Registers of an `execute-inline` instruction.
pub(super) enum InlineCall<'i> {
    List(&'i RegList),
    Range(RegRange),
}

/// Registers and dispatch of an `invoke-*-quick` instruction.
pub(super) enum QuickCall<'i> {
    Virtual(&'i RegList),
    VirtualRange(RegRange),
    Super(&'i RegList),
    SuperRange(RegRange),
}

impl QuickCall<'_> {
    fn receiver(&self) -> Option<Reg> {
        match self {
            Self::Virtual(args) | Self::Super(args) => args.first(),
            Self::VirtualRange(range) | Self::SuperRange(range) => {
                (range.count() > 0).then_some(range.start())
            }
        }
    }

    const fn is_super(&self) -> bool {
        matches!(self, Self::Super(_) | Self::SuperRange(_))
    }

    fn into_invoke(self, method: MethodRef) -> Instr {
        match self {
            Self::Virtual(args) => Instr::InvokeVirtual(args.clone(), method),
            Self::VirtualRange(range) => Instr::InvokeVirtualRange(range, method),
            Self::Super(args) => Instr::InvokeSuper(args.clone(), method),
            Self::SuperRange(range) => Instr::InvokeSuperRange(range, method),
        }
    }
}

/// Standard form of the odexed instructions that do not depend on register types.
fn static_form(instr: &Instr) -> AnalysisResult<Option<Instr>> {
    let deodexed = match instr {
        Instr::ReturnVoidBarrier => Instr::ReturnVoid,
        Instr::InvokeDirectEmpty(args, method) => Instr::InvokeDirect(args.clone(), method.clone()),
        Instr::InvokeObjectInitRange(range, method) => {
            let start = range.start();
            if range.count() == 1 && start.value() < 16 {
                Instr::InvokeDirect(RegList::new(vec![start])?, method.clone())
            } else {
                Instr::InvokeDirectRange(*range, method.clone())
            }
        }
        Instr::IgetVolatile(_, _, _)
        | Instr::IgetWideVolatile(_, _, _)
        | Instr::IgetObjectVolatile(_, _, _)
        | Instr::IputVolatile(_, _, _)
        | Instr::IputWideVolatile(_, _, _)
        | Instr::IputObjectVolatile(_, _, _)
        | Instr::SgetVolatile(_, _)
        | Instr::SgetWideVolatile(_, _)
        | Instr::SgetObjectVolatile(_, _)
        | Instr::SputVolatile(_, _)
        | Instr::SputWideVolatile(_, _)
        | Instr::SputObjectVolatile(_, _) => deodex_volatile_access(instr)?,
        _ => return Ok(None),
    };
    Ok(Some(deodexed))
}

/// Returns what an odexed instruction left after analysis becomes in the deodexed method:
/// its standard form when it does not need register types, an unresolved marker otherwise.
/// A call without arguments has no object register and is kept as is.
pub(super) fn final_form(instr: &Instr) -> AnalysisResult<Option<Instr>> {
    if let Some(deodexed) = static_form(instr)? {
        return Ok(Some(deodexed));
    }
    let object = match instr {
        Instr::IgetQuick(_, object, _)
        | Instr::IgetWideQuick(_, object, _)
        | Instr::IgetObjectQuick(_, object, _)
        | Instr::IputQuick(_, object, _)
        | Instr::IputWideQuick(_, object, _)
        | Instr::IputObjectQuick(_, object, _) => *object,
        Instr::ExecuteInline(args, _)
        | Instr::InvokeVirtualQuick(args, _)
        | Instr::InvokeSuperQuick(args, _) => match args.first() {
            Some(object) => object,
            None => return Ok(None),
        },
        Instr::ExecuteInlineRange(range, _)
        | Instr::InvokeVirtualQuickRange(range, _)
        | Instr::InvokeSuperQuickRange(range, _) => range.start(),
        _ => return Ok(None),
    };
    Ok(Some(Instr::UnresolvedOdex(object, instr.size())))
}

impl Analysis<'_> {
    /// Replaces the current instruction and analyzes its new form.
    fn replace_and_analyze(&mut self, index: usize, deodexed: Instr) -> AnalysisResult<bool> {
        trace!("{} deodexed to {deodexed}", self.cfg.instrs[index]);
        self.cfg.instrs[index].set_instruction(deodexed);
        self.analyze_instruction(index)
    }

    pub(super) fn deodex_static_form(&mut self, index: usize, instr: &Instr) -> AnalysisResult<bool> {
        match static_form(instr)? {
            Some(deodexed) => self.replace_and_analyze(index, deodexed),
            None => Err(AnalysisError::NotOdexedFieldAccess(instr.mnemonic())),
        }
    }

    pub(super) fn deodex_execute_inline(
        &mut self,
        index: usize,
        call: InlineCall,
        inline_index: u16,
    ) -> AnalysisResult<bool> {
        let resolver = self.inline_resolver.ok_or(AnalysisError::NoInlineResolver)?;
        let count = match &call {
            InlineCall::List(args) => args.len(),
            InlineCall::Range(range) => usize::from(range.count()),
        };
        let inline = resolver.resolve(usize::from(inline_index), count)?;
        let method = inline.method.clone();

        let deodexed = match call {
            InlineCall::List(args) if inline.is_static() => Instr::InvokeStatic(args.clone(), method),
            InlineCall::List(args) if inline.is_private() => Instr::InvokeDirect(args.clone(), method),
            InlineCall::List(args) => Instr::InvokeVirtual(args.clone(), method),
            InlineCall::Range(range) if inline.is_static() => Instr::InvokeStaticRange(range, method),
            InlineCall::Range(range) if inline.is_private() => Instr::InvokeDirectRange(range, method),
            InlineCall::Range(range) => Instr::InvokeVirtualRange(range, method),
        };
        self.replace_and_analyze(index, deodexed)
    }

    /// Type of the object an odexed instruction operates on, `None` while it is not known.
    fn receiver_proto(&self, index: usize, object: Reg) -> AnalysisResult<Option<Arc<TypeProto>>> {
        match self.pre(index, object)? {
            RegisterType::Unknown | RegisterType::Null => Ok(None),
            RegisterType::UninitRef { proto, .. }
            | RegisterType::UninitThis(proto)
            | RegisterType::Reference(proto) => Ok(Some(proto)),
            type_ => Err(AnalysisError::InvalidRegisterType {
                type_: type_.to_string(),
                reg: object,
            }),
        }
    }

    pub(super) fn deodex_quick_field(
        &mut self,
        index: usize,
        instr: &Instr,
        object: Reg,
        offset: u16,
    ) -> AnalysisResult<bool> {
        let Some(proto) = self.receiver_proto(index, object)? else {
            return Ok(false);
        };
        let offset = usize::from(offset);
        let mut field = proto
            .field_by_offset(offset, self.classpath)?
            .ok_or_else(|| AnalysisError::FieldNotResolved {
                class: proto.descriptor().to_string(),
                offset,
            })?;

        if !self.can_access_class(&field.definer.to_string())? {
            // name the field through a subclass this class can see
            let resolved = match self.accessible_definer(&proto)? {
                Some(definer) => definer
                    .field_by_offset(offset, self.classpath)?
                    .map(|f| (definer, f)),
                None => None,
            };
            let (definer, accessible) = resolved.ok_or_else(|| AnalysisError::InaccessibleDefiner {
                kind: "field",
                member: field.to_string(),
            })?;
            field = FieldRef::new(
                Type::try_from(definer.descriptor())?,
                &accessible.name,
                accessible.type_,
            );
        }

        let deodexed = deodex_field_access(instr, field)?;
        self.replace_and_analyze(index, deodexed)
    }

    pub(super) fn deodex_quick_call(
        &mut self,
        index: usize,
        call: QuickCall,
        vtable_index: u16,
    ) -> AnalysisResult<bool> {
        let object = call.receiver().ok_or_else(|| {
            AnalysisError::MissingReceiver(self.cfg.instrs[index].instruction().mnemonic())
        })?;
        let Some(proto) = self.receiver_proto(index, object)? else {
            return Ok(false);
        };
        let vtable_index = usize::from(vtable_index);

        let dispatch = if call.is_super() {
            let this = self.classpath.class_of(&self.class.type_)?;
            match this.superclass() {
                Ok(Some(superclass)) => self.classpath.class(&superclass)?,
                Ok(None) => this,
                Err(err) if err.is_unresolved() => this,
                Err(err) => return Err(err.into()),
            }
        } else {
            proto.clone()
        };
        let entry = dispatch
            .method_by_vtable_index(vtable_index, self.classpath)?
            .ok_or_else(|| AnalysisError::MethodNotResolved {
                class: proto.descriptor().to_string(),
                index: vtable_index,
            })?;

        let mut method = entry.method;
        // a super call always names a method of the superclass
        if !call.is_super() && !self.can_access_class(&method.definer.to_string())? {
            let resolved = match self.accessible_definer(&proto)? {
                Some(definer) => definer
                    .method_by_vtable_index(vtable_index, self.classpath)?
                    .map(|e| (definer, e)),
                None => None,
            };
            let (definer, accessible) = resolved.ok_or_else(|| AnalysisError::InaccessibleDefiner {
                kind: "method",
                member: method.to_string(),
            })?;
            method = MethodRef::new(
                Type::try_from(definer.descriptor())?,
                &accessible.method.name,
                accessible.method.params,
                accessible.method.return_type,
            );
        }

        self.replace_and_analyze(index, call.into_invoke(method))
    }

    /// Nearest class, starting from `proto` and up its superclasses, that this class can
    /// access.
    fn accessible_definer(&self, proto: &Arc<TypeProto>) -> AnalysisResult<Option<Arc<TypeProto>>> {
        for candidate in iter::once(proto.clone()).chain(proto.superclass_chain(self.classpath)?) {
            if self.can_access_class(candidate.descriptor())? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn can_access_class(&self, descriptor: &str) -> AnalysisResult<bool> {
        if descriptor.starts_with('[') {
            return Ok(true);
        }
        let def = self.classpath.class_def(descriptor)?;
        Ok(def.is_public() || def.package() == self.class.package())
    }
}
