//! Register types rules of each instruction.

use super::deodex::{InlineCall, QuickCall};
use super::Analysis;
use crate::classpath::TypeProto;
use crate::controlflow::NodeId;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::typing::{Category, RegisterType};
use dw_dex::instrs::{Instr, Instruction};
use dw_dex::methods::MethodRef;
use dw_dex::registers::Reg;
use dw_dex::types::Type;

const STRING: &str = "Ljava/lang/String;";
const CLASS: &str = "Ljava/lang/Class;";
const THROWABLE: &str = "Ljava/lang/Throwable;";

const fn is_boolean(category: Category) -> bool {
    matches!(category, Category::Null | Category::One | Category::Boolean)
}

const fn is_primitive_32(category: Category) -> bool {
    matches!(
        category,
        Category::Null
            | Category::One
            | Category::Boolean
            | Category::Byte
            | Category::PosByte
            | Category::Short
            | Category::PosShort
            | Category::Char
            | Category::Integer
            | Category::Float
    )
}

impl Analysis<'_> {
    /// Computes the exit types of an instruction.
    ///
    /// Returns `false` when an odexed instruction cannot be deodexed yet, because the type of
    /// its receiver is not known.
    #[allow(clippy::too_many_lines)]
    #[allow(clippy::enum_glob_use)]
    pub(super) fn analyze_instruction(&mut self, index: usize) -> AnalysisResult<bool> {
        use Instr::*;
        use RegisterType::{Boolean, Byte, Char, DoubleLo, Float, Integer, LongLo, Short};

        let instr = self.cfg.instrs[index].instruction().clone();
        match &instr {
            Nop
            | ReturnVoid
            | Return(_)
            | ReturnWide(_)
            | ReturnObject(_)
            | MonitorEnter(_)
            | MonitorExit(_)
            | FilledNewArray(_, _)
            | FilledNewArrayRange(_, _)
            | FillArrayData(_, _)
            | Throw(_)
            | Goto(_)
            | Goto16(_)
            | Goto32(_)
            | PackedSwitch(_, _)
            | SparseSwitch(_, _)
            | IfEq(_, _, _)
            | IfNe(_, _, _)
            | IfLt(_, _, _)
            | IfGe(_, _, _)
            | IfGt(_, _, _)
            | IfLe(_, _, _)
            | IfEqz(_, _)
            | IfNez(_, _)
            | IfLtz(_, _)
            | IfGez(_, _)
            | IfGtz(_, _)
            | IfLez(_, _)
            | Aput(_, _, _)
            | AputWide(_, _, _)
            | AputObject(_, _, _)
            | AputBoolean(_, _, _)
            | AputByte(_, _, _)
            | AputChar(_, _, _)
            | AputShort(_, _, _)
            | Iput(_, _, _)
            | IputWide(_, _, _)
            | IputObject(_, _, _)
            | IputBoolean(_, _, _)
            | IputByte(_, _, _)
            | IputChar(_, _, _)
            | IputShort(_, _, _)
            | Sput(_, _)
            | SputWide(_, _)
            | SputObject(_, _)
            | SputBoolean(_, _)
            | SputByte(_, _)
            | SputChar(_, _)
            | SputShort(_, _)
            | InvokeVirtual(_, _)
            | InvokeSuper(_, _)
            | InvokeStatic(_, _)
            | InvokeInterface(_, _)
            | InvokeVirtualRange(_, _)
            | InvokeSuperRange(_, _)
            | InvokeStaticRange(_, _)
            | InvokeInterfaceRange(_, _)
            | ThrowVerificationError(_, _)
            | PackedSwitchPayload(_, _)
            | SparseSwitchPayload(_, _)
            | FillArrayDataPayload(_)
            | UnresolvedOdex(_, _) => Ok(true),

            Move(_, src)
            | MoveFrom16(_, src)
            | Move16(_, src)
            | MoveWide(_, src)
            | MoveWideFrom16(_, src)
            | MoveWide16(_, src)
            | MoveObject(_, src)
            | MoveObjectFrom16(_, src)
            | MoveObject16(_, src) => {
                let type_ = self.pre(index, *src)?;
                self.set_destination(index, type_)
            }

            MoveResult(_) | MoveResultWide(_) | MoveResultObject(_) => {
                self.analyze_move_result(index)
            }
            MoveException(_) => self.analyze_move_exception(index),

            Const4(_, value) => self.set_destination(index, RegisterType::for_literal(i32::from(*value))),
            Const16(_, value) => {
                self.set_destination(index, RegisterType::for_literal(i32::from(*value)))
            }
            Const(_, value) => self.set_destination(index, RegisterType::for_literal(*value)),
            ConstHigh16(_, value) => {
                self.set_destination(index, RegisterType::for_literal(i32::from(*value) << 16))
            }
            ConstWide16(_, _) | ConstWide32(_, _) | ConstWide(_, _) | ConstWideHigh16(_, _) => {
                self.set_destination(index, LongLo)
            }
            ConstString(_, _) | ConstStringJumbo(_, _) => {
                let string = self.classpath.class(STRING)?;
                self.set_destination(index, RegisterType::Reference(string))
            }
            ConstClass(_, _) => {
                let class = self.classpath.class(CLASS)?;
                self.set_destination(index, RegisterType::Reference(class))
            }

            CheckCast(_, type_) => {
                let cast = RegisterType::for_type(type_, self.classpath)?;
                self.set_destination(index, cast)
            }
            InstanceOf(_, _, _) => self.set_destination(index, Boolean),
            ArrayLength(_, _) => self.set_destination(index, Integer),
            NewInstance(dst, type_) => self.analyze_new_instance(index, *dst, type_),
            NewArray(_, _, type_) => {
                if !matches!(type_, Type::Array(_, _)) {
                    return Err(AnalysisError::NewArrayNotArray);
                }
                let array = RegisterType::for_type(type_, self.classpath)?;
                self.set_destination(index, array)
            }

            CmplFloat(_, _, _)
            | CmpgFloat(_, _, _)
            | CmplDouble(_, _, _)
            | CmpgDouble(_, _, _)
            | CmpLong(_, _, _) => self.set_destination(index, Byte),

            Aget(_, _, _) => self.set_destination(index, Integer),
            AgetBoolean(_, _, _) => self.set_destination(index, Boolean),
            AgetByte(_, _, _) => self.set_destination(index, Byte),
            AgetChar(_, _, _) => self.set_destination(index, Char),
            AgetShort(_, _, _) => self.set_destination(index, Short),
            AgetWide(_, array, _) => self.analyze_aget_wide(index, *array, instr.mnemonic()),
            AgetObject(_, array, _) => self.analyze_aget_object(index, *array, instr.mnemonic()),

            Iget(_, _, _) | Sget(_, _) => self.set_destination(index, Integer),
            IgetBoolean(_, _, _) | SgetBoolean(_, _) => self.set_destination(index, Boolean),
            IgetByte(_, _, _) | SgetByte(_, _) => self.set_destination(index, Byte),
            IgetChar(_, _, _) | SgetChar(_, _) => self.set_destination(index, Char),
            IgetShort(_, _, _) | SgetShort(_, _) => self.set_destination(index, Short),
            IgetWide(_, _, field)
            | IgetObject(_, _, field)
            | SgetWide(_, field)
            | SgetObject(_, field) => {
                let type_ = RegisterType::for_type(&field.type_, self.classpath)?;
                self.set_destination(index, type_)
            }

            InvokeDirect(args, method) => self.analyze_invoke_direct(index, args.first(), method),
            InvokeDirectRange(range, method) => {
                let object = (range.count() > 0).then_some(range.start());
                self.analyze_invoke_direct(index, object, method)
            }

            NegInt(_, _) | NotInt(_, _) | LongToInt(_, _) | FloatToInt(_, _)
            | DoubleToInt(_, _) => self.set_destination(index, Integer),
            NegLong(_, _) | NotLong(_, _) | IntToLong(_, _) | FloatToLong(_, _)
            | DoubleToLong(_, _) => self.set_destination(index, LongLo),
            NegFloat(_, _) | IntToFloat(_, _) | LongToFloat(_, _) | DoubleToFloat(_, _) => {
                self.set_destination(index, Float)
            }
            NegDouble(_, _) | IntToDouble(_, _) | LongToDouble(_, _) | FloatToDouble(_, _) => {
                self.set_destination(index, DoubleLo)
            }
            IntToByte(_, _) => self.set_destination(index, Byte),
            IntToChar(_, _) => self.set_destination(index, Char),
            IntToShort(_, _) => self.set_destination(index, Short),

            AddInt(_, _, _)
            | SubInt(_, _, _)
            | MulInt(_, _, _)
            | DivInt(_, _, _)
            | RemInt(_, _, _)
            | ShlInt(_, _, _)
            | ShrInt(_, _, _)
            | UshrInt(_, _, _)
            | AddInt2addr(_, _)
            | SubInt2addr(_, _)
            | MulInt2addr(_, _)
            | DivInt2addr(_, _)
            | RemInt2addr(_, _)
            | ShlInt2addr(_, _)
            | ShrInt2addr(_, _)
            | UshrInt2addr(_, _)
            | AddIntLit16(_, _, _)
            | RsubInt(_, _, _)
            | MulIntLit16(_, _, _)
            | DivIntLit16(_, _, _)
            | RemIntLit16(_, _, _)
            | AddIntLit8(_, _, _)
            | RsubIntLit8(_, _, _)
            | MulIntLit8(_, _, _)
            | DivIntLit8(_, _, _)
            | RemIntLit8(_, _, _)
            | ShlIntLit8(_, _, _) => self.set_destination(index, Integer),

            AndInt(_, src1, src2) | OrInt(_, src1, src2) | XorInt(_, src1, src2) => {
                self.analyze_boolean_op(index, *src1, *src2)
            }
            AndInt2addr(dst, src) | OrInt2addr(dst, src) | XorInt2addr(dst, src) => {
                self.analyze_boolean_op(index, *dst, *src)
            }
            AndIntLit16(_, src, lit) | OrIntLit16(_, src, lit) | XorIntLit16(_, src, lit) => {
                self.analyze_boolean_literal_op(index, *src, i32::from(*lit))
            }
            AndIntLit8(_, src, lit) | OrIntLit8(_, src, lit) | XorIntLit8(_, src, lit) => {
                self.analyze_boolean_literal_op(index, *src, i32::from(*lit))
            }
            ShrIntLit8(_, src, lit) => {
                let type_ = self.literal_shift_right(index, *src, i32::from(*lit), true)?;
                self.set_destination(index, type_)
            }
            UshrIntLit8(_, src, lit) => {
                let type_ = self.literal_shift_right(index, *src, i32::from(*lit), false)?;
                self.set_destination(index, type_)
            }

            AddLong(_, _, _)
            | SubLong(_, _, _)
            | MulLong(_, _, _)
            | DivLong(_, _, _)
            | RemLong(_, _, _)
            | AndLong(_, _, _)
            | OrLong(_, _, _)
            | XorLong(_, _, _)
            | ShlLong(_, _, _)
            | ShrLong(_, _, _)
            | UshrLong(_, _, _)
            | AddLong2addr(_, _)
            | SubLong2addr(_, _)
            | MulLong2addr(_, _)
            | DivLong2addr(_, _)
            | RemLong2addr(_, _)
            | AndLong2addr(_, _)
            | OrLong2addr(_, _)
            | XorLong2addr(_, _)
            | ShlLong2addr(_, _)
            | ShrLong2addr(_, _)
            | UshrLong2addr(_, _) => self.set_destination(index, LongLo),

            AddFloat(_, _, _)
            | SubFloat(_, _, _)
            | MulFloat(_, _, _)
            | DivFloat(_, _, _)
            | RemFloat(_, _, _)
            | AddFloat2addr(_, _)
            | SubFloat2addr(_, _)
            | MulFloat2addr(_, _)
            | DivFloat2addr(_, _)
            | RemFloat2addr(_, _) => self.set_destination(index, Float),

            AddDouble(_, _, _)
            | SubDouble(_, _, _)
            | MulDouble(_, _, _)
            | DivDouble(_, _, _)
            | RemDouble(_, _, _)
            | AddDouble2addr(_, _)
            | SubDouble2addr(_, _)
            | MulDouble2addr(_, _)
            | DivDouble2addr(_, _)
            | RemDouble2addr(_, _) => self.set_destination(index, DoubleLo),

            IgetVolatile(_, _, _)
            | IgetWideVolatile(_, _, _)
            | IgetObjectVolatile(_, _, _)
            | IputVolatile(_, _, _)
            | IputWideVolatile(_, _, _)
            | IputObjectVolatile(_, _, _)
            | SgetVolatile(_, _)
            | SgetWideVolatile(_, _)
            | SgetObjectVolatile(_, _)
            | SputVolatile(_, _)
            | SputWideVolatile(_, _)
            | SputObjectVolatile(_, _)
            | InvokeDirectEmpty(_, _)
            | InvokeObjectInitRange(_, _)
            | ReturnVoidBarrier => self.deodex_static_form(index, &instr),

            ExecuteInline(args, inline_index) => {
                self.deodex_execute_inline(index, InlineCall::List(args), *inline_index)
            }
            ExecuteInlineRange(range, inline_index) => {
                self.deodex_execute_inline(index, InlineCall::Range(*range), *inline_index)
            }

            IgetQuick(_, object, offset)
            | IgetWideQuick(_, object, offset)
            | IgetObjectQuick(_, object, offset)
            | IputQuick(_, object, offset)
            | IputWideQuick(_, object, offset)
            | IputObjectQuick(_, object, offset) => {
                self.deodex_quick_field(index, &instr, *object, *offset)
            }

            InvokeVirtualQuick(args, vtable_index) => {
                self.deodex_quick_call(index, QuickCall::Virtual(args), *vtable_index)
            }
            InvokeVirtualQuickRange(range, vtable_index) => {
                self.deodex_quick_call(index, QuickCall::VirtualRange(*range), *vtable_index)
            }
            InvokeSuperQuick(args, vtable_index) => {
                self.deodex_quick_call(index, QuickCall::Super(args), *vtable_index)
            }
            InvokeSuperQuickRange(range, vtable_index) => {
                self.deodex_quick_call(index, QuickCall::SuperRange(*range), *vtable_index)
            }
        }
    }

    /// The result of a call comes from the instruction right before.
    fn analyze_move_result(&mut self, index: usize) -> AnalysisResult<bool> {
        let mnemonic = self.cfg.instrs[index].instruction().mnemonic();
        let previous = match index.checked_sub(1) {
            Some(previous) => self.cfg.instrs[previous].instruction(),
            None => return Err(AnalysisError::MoveResultPosition(mnemonic.to_string())),
        };
        if !previous.sets_result() {
            return Err(AnalysisError::MoveResultPosition(mnemonic.to_string()));
        }

        let result = match previous {
            Instr::InvokeVirtual(_, method)
            | Instr::InvokeSuper(_, method)
            | Instr::InvokeDirect(_, method)
            | Instr::InvokeStatic(_, method)
            | Instr::InvokeInterface(_, method)
            | Instr::InvokeVirtualRange(_, method)
            | Instr::InvokeSuperRange(_, method)
            | Instr::InvokeDirectRange(_, method)
            | Instr::InvokeStaticRange(_, method)
            | Instr::InvokeInterfaceRange(_, method)
            | Instr::InvokeDirectEmpty(_, method)
            | Instr::InvokeObjectInitRange(_, method) => &method.return_type,
            Instr::FilledNewArray(_, type_) | Instr::FilledNewArrayRange(_, type_) => type_,
            // the odexed call has not been resolved yet
            _ => return Ok(false),
        };
        let type_ = RegisterType::for_type(result, self.classpath)?;
        self.set_destination(index, type_)
    }

    /// The exception type is the join of the types caught by handlers starting here.
    fn analyze_move_exception(&mut self, index: usize) -> AnalysisResult<bool> {
        let addr = self.cfg.instrs[index].addr();
        let mut exception = RegisterType::Unknown;
        for try_ in self.code.iter_tries() {
            for handler in try_.iter_handlers().filter(|handler| handler.addr == addr) {
                exception = match &handler.exception {
                    None => RegisterType::Reference(self.classpath.class(THROWABLE)?),
                    Some(type_) => RegisterType::Reference(self.classpath.class_of(type_)?)
                        .merge(&exception, self.classpath)?,
                };
            }
        }
        if exception.category() == Category::Unknown {
            return Err(AnalysisError::MoveExceptionNotHandler);
        }
        self.set_destination(index, exception)
    }

    fn analyze_new_instance(&mut self, index: usize, dst: Reg, type_: &Type) -> AnalysisResult<bool> {
        let current = self.cfg.instrs[index]
            .post_register(dst.index())
            .ok_or(AnalysisError::RegisterOutOfBounds(dst))?;
        if current.category() != Category::Unknown {
            // already analyzed: the uninitialized reference keeps its identity
            return Ok(true);
        }
        let proto = self.classpath.class_of(type_)?;
        self.set_destination(index, RegisterType::UninitRef { proto, site: index })
    }

    fn analyze_aget_wide(
        &mut self,
        index: usize,
        array: Reg,
        opcode: &'static str,
    ) -> AnalysisResult<bool> {
        let array_type = self.pre(index, array)?;
        let element = match &array_type {
            // read as a long, like the VM verifier does
            RegisterType::Null => RegisterType::LongLo,
            RegisterType::Reference(proto) => match proto.as_ref() {
                TypeProto::Array(array) if array.dimensions() != 1 => {
                    return Err(not_an_array(opcode, "multi-dimensional array", &array_type));
                }
                TypeProto::Array(array) => match array.element_type() {
                    "J" => RegisterType::LongLo,
                    "D" => RegisterType::DoubleLo,
                    _ => return Err(not_an_array(opcode, "narrow array", &array_type)),
                },
                _ => return Err(not_an_array(opcode, "non-array register", &array_type)),
            },
            _ => return Err(not_an_array(opcode, "non-array register", &array_type)),
        };
        self.set_destination(index, element)
    }

    fn analyze_aget_object(
        &mut self,
        index: usize,
        array: Reg,
        opcode: &'static str,
    ) -> AnalysisResult<bool> {
        let array_type = self.pre(index, array)?;
        let element = match &array_type {
            RegisterType::Null => RegisterType::Null,
            RegisterType::Reference(proto) => match proto.as_ref() {
                TypeProto::Array(array) => {
                    RegisterType::Reference(self.classpath.class(array.immediate_element_type())?)
                }
                _ => return Err(not_an_array(opcode, "non-array register", &array_type)),
            },
            _ => return Err(not_an_array(opcode, "non-array register", &array_type)),
        };
        self.set_destination(index, element)
    }

    /// A constructor call initializes its receiver, and every copy of it.
    fn analyze_invoke_direct(
        &mut self,
        index: usize,
        object: Option<Reg>,
        method: &MethodRef,
    ) -> AnalysisResult<bool> {
        if method.name != "<init>" {
            return Ok(true);
        }
        let object = object.ok_or_else(|| {
            AnalysisError::MissingReceiver(self.cfg.instrs[index].instruction().mnemonic())
        })?;
        let initialized = match self.pre(index, object)? {
            RegisterType::UninitRef { proto, .. } | RegisterType::UninitThis(proto) => {
                RegisterType::Reference(proto)
            }
            _ => return Ok(true),
        };

        for reg in 0..self.register_count() {
            if reg == object.index() || self.cfg.instrs[index].sets_register(reg) {
                self.set_post_and_propagate(
                    NodeId::Instr(index),
                    reg,
                    initialized.clone(),
                )?;
            }
        }
        Ok(true)
    }

    /// `and`, `or` and `xor` of two booleans is a boolean.
    fn analyze_boolean_op(&mut self, index: usize, src1: Reg, src2: Reg) -> AnalysisResult<bool> {
        let type_ = if is_boolean(self.pre(index, src1)?.category())
            && is_boolean(self.pre(index, src2)?.category())
        {
            RegisterType::Boolean
        } else {
            RegisterType::Integer
        };
        self.set_destination(index, type_)
    }

    fn analyze_boolean_literal_op(
        &mut self,
        index: usize,
        src: Reg,
        literal: i32,
    ) -> AnalysisResult<bool> {
        let type_ = if is_boolean(self.pre(index, src)?.category()) && (literal == 0 || literal == 1)
        {
            RegisterType::Boolean
        } else {
            RegisterType::Integer
        };
        self.set_destination(index, type_)
    }

    /// Type of a right shift by a constant, which may narrow the shifted value.
    fn literal_shift_right(
        &self,
        index: usize,
        src: Reg,
        literal: i32,
        signed: bool,
    ) -> AnalysisResult<RegisterType> {
        let source = self.pre(index, src)?;
        if !is_primitive_32(source.category()) {
            return Err(AnalysisError::InvalidRegisterType {
                type_: source.to_string(),
                reg: src,
            });
        }
        if literal == 0 {
            return Ok(source);
        }

        let shift = literal & 0x1f;
        let narrowed = match source.category() {
            Category::Integer | Category::Float if signed => {
                if shift >= 24 {
                    Some(RegisterType::Byte)
                } else if shift >= 16 {
                    Some(RegisterType::Short)
                } else {
                    None
                }
            }
            Category::Integer | Category::Float => {
                if shift > 24 {
                    Some(RegisterType::PosByte)
                } else if shift >= 16 {
                    Some(RegisterType::Char)
                } else {
                    None
                }
            }
            Category::Short => (signed && shift >= 8).then_some(RegisterType::Byte),
            Category::PosShort => (shift >= 8).then_some(RegisterType::PosByte),
            Category::Char => (shift > 8).then_some(RegisterType::PosByte),
            Category::PosByte => Some(RegisterType::PosByte),
            Category::Null | Category::One | Category::Boolean => Some(RegisterType::Null),
            _ => None,
        };
        Ok(narrowed.unwrap_or(if signed { source } else { RegisterType::Integer }))
    }
}

fn not_an_array(opcode: &'static str, problem: &'static str, type_: &RegisterType) -> AnalysisError {
    AnalysisError::NotAnArray {
        opcode,
        problem,
        type_: type_.to_string(),
    }
}
