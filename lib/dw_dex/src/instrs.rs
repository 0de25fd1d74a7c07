//! Dalvik bytecode instructions definitions.
//!
//! Instructions carry symbolic operands (strings, types, field and method references) instead of
//! dex pool indexes, except for the odex-only forms which carry the raw inline index, vtable index
//! or field byte offset the optimizer baked in.

use crate::fields::FieldRef;
use crate::methods::MethodRef;
use crate::registers::{Reg, RegList, RegRange};
use crate::types::Type;
use crate::Addr;
use instruction_derive::Instruction;
use std::fmt;

pub trait Instruction {
    fn mnemonic(&self) -> &'static str;
    /// Size in 16-bit code units.
    fn size(&self) -> usize;
    fn can_throw(&self) -> bool;
    /// Execution may fall through to the following instruction.
    fn can_continue(&self) -> bool;
    /// Produces a value for a following `move-result*`.
    fn sets_result(&self) -> bool;
    fn sets_register(&self) -> bool;
    fn sets_wide_register(&self) -> bool;
    fn odex_only(&self) -> bool;
    fn can_initialize_reference(&self) -> bool;
    /// Register written by instructions that set a register.
    fn destination(&self) -> Option<Reg>;
    fn fmt_operands(&self, f: &mut fmt::Formatter) -> fmt::Result;
}

/// Formatting of a single instruction operand.
pub trait Operand {
    fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result;
}

macro_rules! display_operand {
    ($($t:ty),*) => {
        $(impl Operand for $t {
            fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{self}")
            }
        })*
    };
}

macro_rules! literal_operand {
    ($($t:ty),*) => {
        $(impl Operand for $t {
            fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "#{self}")
            }
        })*
    };
}

display_operand!(Reg, RegList, RegRange, Type, FieldRef, MethodRef);
literal_operand!(i8, i16, i32, i64, u8, u16, usize);

impl Operand for String {
    fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Operand for Vec<i32> {
    fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Operand for Vec<Vec<u8>> {
    fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} elements>", self.len())
    }
}

/// An instruction located at its code address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledInstr {
    pub(crate) addr: Addr,
    pub(crate) instr: Instr,
}

impl LabeledInstr {
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    #[inline]
    #[must_use]
    pub const fn instr(&self) -> &Instr {
        &self.instr
    }

    #[inline]
    #[must_use]
    pub fn next_addr(&self) -> Addr {
        self.addr.advance(self.instr.size())
    }
}

impl Instruction for LabeledInstr {
    fn mnemonic(&self) -> &'static str {
        self.instr.mnemonic()
    }

    fn size(&self) -> usize {
        self.instr.size()
    }

    fn can_throw(&self) -> bool {
        self.instr.can_throw()
    }

    fn can_continue(&self) -> bool {
        self.instr.can_continue()
    }

    fn sets_result(&self) -> bool {
        self.instr.sets_result()
    }

    fn sets_register(&self) -> bool {
        self.instr.sets_register()
    }

    fn sets_wide_register(&self) -> bool {
        self.instr.sets_wide_register()
    }

    fn odex_only(&self) -> bool {
        self.instr.odex_only()
    }

    fn can_initialize_reference(&self) -> bool {
        self.instr.can_initialize_reference()
    }

    fn destination(&self) -> Option<Reg> {
        self.instr.destination()
    }

    fn fmt_operands(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.instr.fmt_operands(f)
    }
}

impl fmt::Display for LabeledInstr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.addr, self.instr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Instruction)]
pub enum Instr {
    /// Waste cycles.
    #[instruction(mnemonic = "nop", format = "10x", can_continue)]
    Nop,

    /// Move the contents of one non-object register to another.
    #[instruction(mnemonic = "move", format = "12x", can_continue, sets_register)]
    Move(Reg, Reg),

    #[instruction(mnemonic = "move/from16", format = "22x", can_continue, sets_register)]
    MoveFrom16(Reg, Reg),
    #[instruction(mnemonic = "move/16", format = "32x", can_continue, sets_register)]
    Move16(Reg, Reg),

    /// Move the contents of one register-pair to another.
    #[instruction(
        mnemonic = "move-wide",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveWide(Reg, Reg),

    #[instruction(
        mnemonic = "move-wide/from16",
        format = "22x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveWideFrom16(Reg, Reg),
    #[instruction(
        mnemonic = "move-wide/16",
        format = "32x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveWide16(Reg, Reg),
    #[instruction(mnemonic = "move-object", format = "12x", can_continue, sets_register)]
    MoveObject(Reg, Reg),
    #[instruction(mnemonic = "move-object/from16", format = "22x", can_continue, sets_register)]
    MoveObjectFrom16(Reg, Reg),
    #[instruction(mnemonic = "move-object/16", format = "32x", can_continue, sets_register)]
    MoveObject16(Reg, Reg),

    /// Move the result of the immediately preceding invoke-kind into a register.
    #[instruction(mnemonic = "move-result", format = "11x", can_continue, sets_register)]
    MoveResult(Reg),

    #[instruction(
        mnemonic = "move-result-wide",
        format = "11x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MoveResultWide(Reg),

    /// Also valid after `filled-new-array`.
    #[instruction(mnemonic = "move-result-object", format = "11x", can_continue, sets_register)]
    MoveResultObject(Reg),

    /// Only valid as the first instruction of an exception handler.
    #[instruction(mnemonic = "move-exception", format = "11x", can_continue, sets_register)]
    MoveException(Reg),

    #[instruction(mnemonic = "return-void", format = "10x")]
    ReturnVoid,
    #[instruction(mnemonic = "return", format = "11x")]
    Return(Reg),
    #[instruction(mnemonic = "return-wide", format = "11x")]
    ReturnWide(Reg),
    #[instruction(mnemonic = "return-object", format = "11x")]
    ReturnObject(Reg),
    #[instruction(mnemonic = "const/4", format = "11n", can_continue, sets_register)]
    Const4(Reg, i8),
    #[instruction(mnemonic = "const/16", format = "21s", can_continue, sets_register)]
    Const16(Reg, i16),
    #[instruction(mnemonic = "const", format = "31i", can_continue, sets_register)]
    Const(Reg, i32),

    /// The literal is the high 16 bits of the value.
    #[instruction(mnemonic = "const/high16", format = "21h", can_continue, sets_register)]
    ConstHigh16(Reg, i16),

    #[instruction(
        mnemonic = "const-wide/16",
        format = "21s",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWide16(Reg, i16),
    #[instruction(
        mnemonic = "const-wide/32",
        format = "31i",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWide32(Reg, i32),
    #[instruction(
        mnemonic = "const-wide",
        format = "51l",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWide(Reg, i64),
    #[instruction(
        mnemonic = "const-wide/high16",
        format = "21h",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ConstWideHigh16(Reg, i16),
    #[instruction(
        mnemonic = "const-string",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    ConstString(Reg, String),
    #[instruction(
        mnemonic = "const-string/jumbo",
        format = "31c",
        can_throw,
        can_continue,
        sets_register
    )]
    ConstStringJumbo(Reg, String),
    #[instruction(mnemonic = "const-class", format = "21c", can_throw, can_continue, sets_register)]
    ConstClass(Reg, Type),
    #[instruction(mnemonic = "monitor-enter", format = "11x", can_throw, can_continue)]
    MonitorEnter(Reg),
    #[instruction(mnemonic = "monitor-exit", format = "11x", can_throw, can_continue)]
    MonitorExit(Reg),
    #[instruction(mnemonic = "check-cast", format = "21c", can_throw, can_continue, sets_register)]
    CheckCast(Reg, Type),
    #[instruction(mnemonic = "instance-of", format = "22c", can_throw, can_continue, sets_register)]
    InstanceOf(Reg, Reg, Type),
    #[instruction(
        mnemonic = "array-length",
        format = "12x",
        can_throw,
        can_continue,
        sets_register
    )]
    ArrayLength(Reg, Reg),
    #[instruction(
        mnemonic = "new-instance",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    NewInstance(Reg, Type),

    /// The type must be an array type.
    #[instruction(mnemonic = "new-array", format = "22c", can_throw, can_continue, sets_register)]
    NewArray(Reg, Reg, Type),

    /// The new array is the result of the instruction, to be fetched with `move-result-object`.
    #[instruction(
        mnemonic = "filled-new-array",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    FilledNewArray(RegList, Type),

    #[instruction(
        mnemonic = "filled-new-array/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    FilledNewArrayRange(RegRange, Type),

    /// The offset points to a `fill-array-data-payload`.
    #[instruction(mnemonic = "fill-array-data", format = "31t", can_continue)]
    FillArrayData(Reg, i32),

    #[instruction(mnemonic = "throw", format = "11x", can_throw)]
    Throw(Reg),
    #[instruction(mnemonic = "goto", format = "10t")]
    Goto(i8),
    #[instruction(mnemonic = "goto/16", format = "20t")]
    Goto16(i16),
    #[instruction(mnemonic = "goto/32", format = "30t")]
    Goto32(i32),

    /// The offset points to a `packed-switch-payload`.
    #[instruction(mnemonic = "packed-switch", format = "31t", can_continue)]
    PackedSwitch(Reg, i32),

    /// The offset points to a `sparse-switch-payload`.
    #[instruction(mnemonic = "sparse-switch", format = "31t", can_continue)]
    SparseSwitch(Reg, i32),

    #[instruction(mnemonic = "cmpl-float", format = "23x", can_continue, sets_register)]
    CmplFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmpg-float", format = "23x", can_continue, sets_register)]
    CmpgFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmpl-double", format = "23x", can_continue, sets_register)]
    CmplDouble(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmpg-double", format = "23x", can_continue, sets_register)]
    CmpgDouble(Reg, Reg, Reg),
    #[instruction(mnemonic = "cmp-long", format = "23x", can_continue, sets_register)]
    CmpLong(Reg, Reg, Reg),
    #[instruction(mnemonic = "if-eq", format = "22t", can_continue)]
    IfEq(Reg, Reg, i16),
    #[instruction(mnemonic = "if-ne", format = "22t", can_continue)]
    IfNe(Reg, Reg, i16),
    #[instruction(mnemonic = "if-lt", format = "22t", can_continue)]
    IfLt(Reg, Reg, i16),
    #[instruction(mnemonic = "if-ge", format = "22t", can_continue)]
    IfGe(Reg, Reg, i16),
    #[instruction(mnemonic = "if-gt", format = "22t", can_continue)]
    IfGt(Reg, Reg, i16),
    #[instruction(mnemonic = "if-le", format = "22t", can_continue)]
    IfLe(Reg, Reg, i16),
    #[instruction(mnemonic = "if-eqz", format = "21t", can_continue)]
    IfEqz(Reg, i16),
    #[instruction(mnemonic = "if-nez", format = "21t", can_continue)]
    IfNez(Reg, i16),
    #[instruction(mnemonic = "if-ltz", format = "21t", can_continue)]
    IfLtz(Reg, i16),
    #[instruction(mnemonic = "if-gez", format = "21t", can_continue)]
    IfGez(Reg, i16),
    #[instruction(mnemonic = "if-gtz", format = "21t", can_continue)]
    IfGtz(Reg, i16),
    #[instruction(mnemonic = "if-lez", format = "21t", can_continue)]
    IfLez(Reg, i16),
    #[instruction(mnemonic = "aget", format = "23x", can_throw, can_continue, sets_register)]
    Aget(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-wide",
        format = "23x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AgetWide(Reg, Reg, Reg),
    #[instruction(mnemonic = "aget-object", format = "23x", can_throw, can_continue, sets_register)]
    AgetObject(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "aget-boolean",
        format = "23x",
        can_throw,
        can_continue,
        sets_register
    )]
    AgetBoolean(Reg, Reg, Reg),
    #[instruction(mnemonic = "aget-byte", format = "23x", can_throw, can_continue, sets_register)]
    AgetByte(Reg, Reg, Reg),
    #[instruction(mnemonic = "aget-char", format = "23x", can_throw, can_continue, sets_register)]
    AgetChar(Reg, Reg, Reg),
    #[instruction(mnemonic = "aget-short", format = "23x", can_throw, can_continue, sets_register)]
    AgetShort(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput", format = "23x", can_throw, can_continue)]
    Aput(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-wide", format = "23x", can_throw, can_continue)]
    AputWide(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-object", format = "23x", can_throw, can_continue)]
    AputObject(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-boolean", format = "23x", can_throw, can_continue)]
    AputBoolean(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-byte", format = "23x", can_throw, can_continue)]
    AputByte(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-char", format = "23x", can_throw, can_continue)]
    AputChar(Reg, Reg, Reg),
    #[instruction(mnemonic = "aput-short", format = "23x", can_throw, can_continue)]
    AputShort(Reg, Reg, Reg),
    #[instruction(mnemonic = "iget", format = "22c", can_throw, can_continue, sets_register)]
    Iget(Reg, Reg, FieldRef),
    #[instruction(
        mnemonic = "iget-wide",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    IgetWide(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iget-object", format = "22c", can_throw, can_continue, sets_register)]
    IgetObject(Reg, Reg, FieldRef),
    #[instruction(
        mnemonic = "iget-boolean",
        format = "22c",
        can_throw,
        can_continue,
        sets_register
    )]
    IgetBoolean(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iget-byte", format = "22c", can_throw, can_continue, sets_register)]
    IgetByte(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iget-char", format = "22c", can_throw, can_continue, sets_register)]
    IgetChar(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iget-short", format = "22c", can_throw, can_continue, sets_register)]
    IgetShort(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput", format = "22c", can_throw, can_continue)]
    Iput(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput-wide", format = "22c", can_throw, can_continue)]
    IputWide(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput-object", format = "22c", can_throw, can_continue)]
    IputObject(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput-boolean", format = "22c", can_throw, can_continue)]
    IputBoolean(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput-byte", format = "22c", can_throw, can_continue)]
    IputByte(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput-char", format = "22c", can_throw, can_continue)]
    IputChar(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput-short", format = "22c", can_throw, can_continue)]
    IputShort(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "sget", format = "21c", can_throw, can_continue, sets_register)]
    Sget(Reg, FieldRef),
    #[instruction(
        mnemonic = "sget-wide",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SgetWide(Reg, FieldRef),
    #[instruction(mnemonic = "sget-object", format = "21c", can_throw, can_continue, sets_register)]
    SgetObject(Reg, FieldRef),
    #[instruction(
        mnemonic = "sget-boolean",
        format = "21c",
        can_throw,
        can_continue,
        sets_register
    )]
    SgetBoolean(Reg, FieldRef),
    #[instruction(mnemonic = "sget-byte", format = "21c", can_throw, can_continue, sets_register)]
    SgetByte(Reg, FieldRef),
    #[instruction(mnemonic = "sget-char", format = "21c", can_throw, can_continue, sets_register)]
    SgetChar(Reg, FieldRef),
    #[instruction(mnemonic = "sget-short", format = "21c", can_throw, can_continue, sets_register)]
    SgetShort(Reg, FieldRef),
    #[instruction(mnemonic = "sput", format = "21c", can_throw, can_continue)]
    Sput(Reg, FieldRef),
    #[instruction(mnemonic = "sput-wide", format = "21c", can_throw, can_continue)]
    SputWide(Reg, FieldRef),
    #[instruction(mnemonic = "sput-object", format = "21c", can_throw, can_continue)]
    SputObject(Reg, FieldRef),
    #[instruction(mnemonic = "sput-boolean", format = "21c", can_throw, can_continue)]
    SputBoolean(Reg, FieldRef),
    #[instruction(mnemonic = "sput-byte", format = "21c", can_throw, can_continue)]
    SputByte(Reg, FieldRef),
    #[instruction(mnemonic = "sput-char", format = "21c", can_throw, can_continue)]
    SputChar(Reg, FieldRef),
    #[instruction(mnemonic = "sput-short", format = "21c", can_throw, can_continue)]
    SputShort(Reg, FieldRef),
    #[instruction(
        mnemonic = "invoke-virtual",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeVirtual(RegList, MethodRef),
    #[instruction(mnemonic = "invoke-super", format = "35c", can_throw, can_continue, sets_result)]
    InvokeSuper(RegList, MethodRef),
    #[instruction(
        mnemonic = "invoke-direct",
        format = "35c",
        can_throw,
        can_continue,
        sets_result,
        can_initialize_reference
    )]
    InvokeDirect(RegList, MethodRef),
    #[instruction(mnemonic = "invoke-static", format = "35c", can_throw, can_continue, sets_result)]
    InvokeStatic(RegList, MethodRef),
    #[instruction(
        mnemonic = "invoke-interface",
        format = "35c",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeInterface(RegList, MethodRef),
    #[instruction(
        mnemonic = "invoke-virtual/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeVirtualRange(RegRange, MethodRef),
    #[instruction(
        mnemonic = "invoke-super/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeSuperRange(RegRange, MethodRef),
    #[instruction(
        mnemonic = "invoke-direct/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result,
        can_initialize_reference
    )]
    InvokeDirectRange(RegRange, MethodRef),
    #[instruction(
        mnemonic = "invoke-static/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeStaticRange(RegRange, MethodRef),
    #[instruction(
        mnemonic = "invoke-interface/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result
    )]
    InvokeInterfaceRange(RegRange, MethodRef),
    #[instruction(mnemonic = "neg-int", format = "12x", can_continue, sets_register)]
    NegInt(Reg, Reg),
    #[instruction(mnemonic = "not-int", format = "12x", can_continue, sets_register)]
    NotInt(Reg, Reg),
    #[instruction(
        mnemonic = "neg-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    NegLong(Reg, Reg),
    #[instruction(
        mnemonic = "not-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    NotLong(Reg, Reg),
    #[instruction(mnemonic = "neg-float", format = "12x", can_continue, sets_register)]
    NegFloat(Reg, Reg),
    #[instruction(
        mnemonic = "neg-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    NegDouble(Reg, Reg),
    #[instruction(
        mnemonic = "int-to-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    IntToLong(Reg, Reg),
    #[instruction(mnemonic = "int-to-float", format = "12x", can_continue, sets_register)]
    IntToFloat(Reg, Reg),
    #[instruction(
        mnemonic = "int-to-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    IntToDouble(Reg, Reg),
    #[instruction(mnemonic = "long-to-int", format = "12x", can_continue, sets_register)]
    LongToInt(Reg, Reg),
    #[instruction(mnemonic = "long-to-float", format = "12x", can_continue, sets_register)]
    LongToFloat(Reg, Reg),
    #[instruction(
        mnemonic = "long-to-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    LongToDouble(Reg, Reg),
    #[instruction(mnemonic = "float-to-int", format = "12x", can_continue, sets_register)]
    FloatToInt(Reg, Reg),
    #[instruction(
        mnemonic = "float-to-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    FloatToLong(Reg, Reg),
    #[instruction(
        mnemonic = "float-to-double",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    FloatToDouble(Reg, Reg),
    #[instruction(mnemonic = "double-to-int", format = "12x", can_continue, sets_register)]
    DoubleToInt(Reg, Reg),
    #[instruction(
        mnemonic = "double-to-long",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DoubleToLong(Reg, Reg),
    #[instruction(mnemonic = "double-to-float", format = "12x", can_continue, sets_register)]
    DoubleToFloat(Reg, Reg),
    #[instruction(mnemonic = "int-to-byte", format = "12x", can_continue, sets_register)]
    IntToByte(Reg, Reg),
    #[instruction(mnemonic = "int-to-char", format = "12x", can_continue, sets_register)]
    IntToChar(Reg, Reg),
    #[instruction(mnemonic = "int-to-short", format = "12x", can_continue, sets_register)]
    IntToShort(Reg, Reg),
    #[instruction(mnemonic = "add-int", format = "23x", can_continue, sets_register)]
    AddInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "sub-int", format = "23x", can_continue, sets_register)]
    SubInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "mul-int", format = "23x", can_continue, sets_register)]
    MulInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "div-int", format = "23x", can_throw, can_continue, sets_register)]
    DivInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "rem-int", format = "23x", can_throw, can_continue, sets_register)]
    RemInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "and-int", format = "23x", can_continue, sets_register)]
    AndInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "or-int", format = "23x", can_continue, sets_register)]
    OrInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "xor-int", format = "23x", can_continue, sets_register)]
    XorInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "shl-int", format = "23x", can_continue, sets_register)]
    ShlInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "shr-int", format = "23x", can_continue, sets_register)]
    ShrInt(Reg, Reg, Reg),
    #[instruction(mnemonic = "ushr-int", format = "23x", can_continue, sets_register)]
    UshrInt(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "add-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "sub-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "mul-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "div-long",
        format = "23x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "rem-long",
        format = "23x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "and-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AndLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "or-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    OrLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "xor-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    XorLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "shl-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShlLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "shr-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShrLong(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "ushr-long",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    UshrLong(Reg, Reg, Reg),
    #[instruction(mnemonic = "add-float", format = "23x", can_continue, sets_register)]
    AddFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "sub-float", format = "23x", can_continue, sets_register)]
    SubFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "mul-float", format = "23x", can_continue, sets_register)]
    MulFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "div-float", format = "23x", can_continue, sets_register)]
    DivFloat(Reg, Reg, Reg),
    #[instruction(mnemonic = "rem-float", format = "23x", can_continue, sets_register)]
    RemFloat(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "add-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "sub-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "mul-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "div-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivDouble(Reg, Reg, Reg),
    #[instruction(
        mnemonic = "rem-double",
        format = "23x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemDouble(Reg, Reg, Reg),
    #[instruction(mnemonic = "add-int/2addr", format = "12x", can_continue, sets_register)]
    AddInt2addr(Reg, Reg),
    #[instruction(mnemonic = "sub-int/2addr", format = "12x", can_continue, sets_register)]
    SubInt2addr(Reg, Reg),
    #[instruction(mnemonic = "mul-int/2addr", format = "12x", can_continue, sets_register)]
    MulInt2addr(Reg, Reg),
    #[instruction(
        mnemonic = "div-int/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register
    )]
    DivInt2addr(Reg, Reg),
    #[instruction(
        mnemonic = "rem-int/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register
    )]
    RemInt2addr(Reg, Reg),
    #[instruction(mnemonic = "and-int/2addr", format = "12x", can_continue, sets_register)]
    AndInt2addr(Reg, Reg),
    #[instruction(mnemonic = "or-int/2addr", format = "12x", can_continue, sets_register)]
    OrInt2addr(Reg, Reg),
    #[instruction(mnemonic = "xor-int/2addr", format = "12x", can_continue, sets_register)]
    XorInt2addr(Reg, Reg),
    #[instruction(mnemonic = "shl-int/2addr", format = "12x", can_continue, sets_register)]
    ShlInt2addr(Reg, Reg),
    #[instruction(mnemonic = "shr-int/2addr", format = "12x", can_continue, sets_register)]
    ShrInt2addr(Reg, Reg),
    #[instruction(mnemonic = "ushr-int/2addr", format = "12x", can_continue, sets_register)]
    UshrInt2addr(Reg, Reg),
    #[instruction(
        mnemonic = "add-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "sub-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "mul-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "div-long/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "rem-long/2addr",
        format = "12x",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "and-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AndLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "or-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    OrLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "xor-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    XorLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "shl-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShlLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "shr-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    ShrLong2addr(Reg, Reg),
    #[instruction(
        mnemonic = "ushr-long/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    UshrLong2addr(Reg, Reg),
    #[instruction(mnemonic = "add-float/2addr", format = "12x", can_continue, sets_register)]
    AddFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "sub-float/2addr", format = "12x", can_continue, sets_register)]
    SubFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "mul-float/2addr", format = "12x", can_continue, sets_register)]
    MulFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "div-float/2addr", format = "12x", can_continue, sets_register)]
    DivFloat2addr(Reg, Reg),
    #[instruction(mnemonic = "rem-float/2addr", format = "12x", can_continue, sets_register)]
    RemFloat2addr(Reg, Reg),
    #[instruction(
        mnemonic = "add-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    AddDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "sub-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    SubDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "mul-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    MulDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "div-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    DivDouble2addr(Reg, Reg),
    #[instruction(
        mnemonic = "rem-double/2addr",
        format = "12x",
        can_continue,
        sets_register,
        sets_wide_register
    )]
    RemDouble2addr(Reg, Reg),
    #[instruction(mnemonic = "add-int/lit16", format = "22s", can_continue, sets_register)]
    AddIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "rsub-int", format = "22s", can_continue, sets_register)]
    RsubInt(Reg, Reg, i16),
    #[instruction(mnemonic = "mul-int/lit16", format = "22s", can_continue, sets_register)]
    MulIntLit16(Reg, Reg, i16),
    #[instruction(
        mnemonic = "div-int/lit16",
        format = "22s",
        can_throw,
        can_continue,
        sets_register
    )]
    DivIntLit16(Reg, Reg, i16),
    #[instruction(
        mnemonic = "rem-int/lit16",
        format = "22s",
        can_throw,
        can_continue,
        sets_register
    )]
    RemIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "and-int/lit16", format = "22s", can_continue, sets_register)]
    AndIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "or-int/lit16", format = "22s", can_continue, sets_register)]
    OrIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "xor-int/lit16", format = "22s", can_continue, sets_register)]
    XorIntLit16(Reg, Reg, i16),
    #[instruction(mnemonic = "add-int/lit8", format = "22b", can_continue, sets_register)]
    AddIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "rsub-int/lit8", format = "22b", can_continue, sets_register)]
    RsubIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "mul-int/lit8", format = "22b", can_continue, sets_register)]
    MulIntLit8(Reg, Reg, i8),
    #[instruction(
        mnemonic = "div-int/lit8",
        format = "22b",
        can_throw,
        can_continue,
        sets_register
    )]
    DivIntLit8(Reg, Reg, i8),
    #[instruction(
        mnemonic = "rem-int/lit8",
        format = "22b",
        can_throw,
        can_continue,
        sets_register
    )]
    RemIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "and-int/lit8", format = "22b", can_continue, sets_register)]
    AndIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "or-int/lit8", format = "22b", can_continue, sets_register)]
    OrIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "xor-int/lit8", format = "22b", can_continue, sets_register)]
    XorIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "shl-int/lit8", format = "22b", can_continue, sets_register)]
    ShlIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "shr-int/lit8", format = "22b", can_continue, sets_register)]
    ShrIntLit8(Reg, Reg, i8),
    #[instruction(mnemonic = "ushr-int/lit8", format = "22b", can_continue, sets_register)]
    UshrIntLit8(Reg, Reg, i8),
    #[instruction(
        mnemonic = "iget-volatile",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        odex_only
    )]
    IgetVolatile(Reg, Reg, FieldRef),
    #[instruction(
        mnemonic = "iget-wide-volatile",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register,
        odex_only
    )]
    IgetWideVolatile(Reg, Reg, FieldRef),
    #[instruction(
        mnemonic = "iget-object-volatile",
        format = "22c",
        can_throw,
        can_continue,
        sets_register,
        odex_only
    )]
    IgetObjectVolatile(Reg, Reg, FieldRef),
    #[instruction(mnemonic = "iput-volatile", format = "22c", can_throw, can_continue, odex_only)]
    IputVolatile(Reg, Reg, FieldRef),
    #[instruction(
        mnemonic = "iput-wide-volatile",
        format = "22c",
        can_throw,
        can_continue,
        odex_only
    )]
    IputWideVolatile(Reg, Reg, FieldRef),
    #[instruction(
        mnemonic = "iput-object-volatile",
        format = "22c",
        can_throw,
        can_continue,
        odex_only
    )]
    IputObjectVolatile(Reg, Reg, FieldRef),
    #[instruction(
        mnemonic = "sget-volatile",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        odex_only
    )]
    SgetVolatile(Reg, FieldRef),
    #[instruction(
        mnemonic = "sget-wide-volatile",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register,
        odex_only
    )]
    SgetWideVolatile(Reg, FieldRef),
    #[instruction(
        mnemonic = "sget-object-volatile",
        format = "21c",
        can_throw,
        can_continue,
        sets_register,
        odex_only
    )]
    SgetObjectVolatile(Reg, FieldRef),
    #[instruction(mnemonic = "sput-volatile", format = "21c", can_throw, can_continue, odex_only)]
    SputVolatile(Reg, FieldRef),
    #[instruction(
        mnemonic = "sput-wide-volatile",
        format = "21c",
        can_throw,
        can_continue,
        odex_only
    )]
    SputWideVolatile(Reg, FieldRef),
    #[instruction(
        mnemonic = "sput-object-volatile",
        format = "21c",
        can_throw,
        can_continue,
        odex_only
    )]
    SputObjectVolatile(Reg, FieldRef),

    /// Always throws a verification error of the given kind.
    #[instruction(mnemonic = "throw-verification-error", format = "20bc", can_throw, odex_only)]
    ThrowVerificationError(u8, String),

    /// Calls the VM inline method of the given index.
    #[instruction(
        mnemonic = "execute-inline",
        format = "35mi",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    ExecuteInline(RegList, u16),

    #[instruction(
        mnemonic = "execute-inline/range",
        format = "3rmi",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    ExecuteInlineRange(RegRange, u16),

    /// Call to an empty constructor, usually `Ljava/lang/Object;-><init>()V`.
    #[instruction(
        mnemonic = "invoke-direct-empty",
        format = "35c",
        can_throw,
        can_continue,
        sets_result,
        odex_only,
        can_initialize_reference
    )]
    InvokeDirectEmpty(RegList, MethodRef),

    #[instruction(
        mnemonic = "invoke-object-init/range",
        format = "3rc",
        can_throw,
        can_continue,
        sets_result,
        odex_only,
        can_initialize_reference
    )]
    InvokeObjectInitRange(RegRange, MethodRef),

    /// Constructor return with a store barrier.
    #[instruction(mnemonic = "return-void-barrier", format = "10x", odex_only)]
    ReturnVoidBarrier,

    /// Field access by byte offset into the object.
    #[instruction(
        mnemonic = "iget-quick",
        format = "22cs",
        can_throw,
        can_continue,
        sets_register,
        odex_only
    )]
    IgetQuick(Reg, Reg, u16),

    #[instruction(
        mnemonic = "iget-wide-quick",
        format = "22cs",
        can_throw,
        can_continue,
        sets_register,
        sets_wide_register,
        odex_only
    )]
    IgetWideQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iget-object-quick",
        format = "22cs",
        can_throw,
        can_continue,
        sets_register,
        odex_only
    )]
    IgetObjectQuick(Reg, Reg, u16),
    #[instruction(mnemonic = "iput-quick", format = "22cs", can_throw, can_continue, odex_only)]
    IputQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iput-wide-quick",
        format = "22cs",
        can_throw,
        can_continue,
        odex_only
    )]
    IputWideQuick(Reg, Reg, u16),
    #[instruction(
        mnemonic = "iput-object-quick",
        format = "22cs",
        can_throw,
        can_continue,
        odex_only
    )]
    IputObjectQuick(Reg, Reg, u16),

    /// Virtual call by vtable index.
    #[instruction(
        mnemonic = "invoke-virtual-quick",
        format = "35ms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeVirtualQuick(RegList, u16),

    #[instruction(
        mnemonic = "invoke-virtual-quick/range",
        format = "3rms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeVirtualQuickRange(RegRange, u16),
    #[instruction(
        mnemonic = "invoke-super-quick",
        format = "35ms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeSuperQuick(RegList, u16),
    #[instruction(
        mnemonic = "invoke-super-quick/range",
        format = "3rms",
        can_throw,
        can_continue,
        sets_result,
        odex_only
    )]
    InvokeSuperQuickRange(RegRange, u16),

    /// First key and relative targets.
    #[instruction(
        mnemonic = "packed-switch-payload",
        format = "custom",
        size = "(_1.len() * 2) + 4"
    )]
    PackedSwitchPayload(i32, Vec<i32>),

    /// Sorted keys and relative targets.
    #[instruction(
        mnemonic = "sparse-switch-payload",
        format = "custom",
        size = "(_1.len() * 4) + 2"
    )]
    SparseSwitchPayload(Vec<i32>, Vec<i32>),

    #[instruction(
        mnemonic = "fill-array-data-payload",
        format = "custom",
        size = "(_0.len() * _0.first().map_or(0, Vec::len) + 1) / 2 + 4"
    )]
    FillArrayDataPayload(Vec<Vec<u8>>),

    /// Odexed instruction whose receiver is always null, standing for a null dereference.
    /// Keeps the size (second field) of the instruction it replaces.
    #[instruction(mnemonic = "#unresolved-odex", format = "custom", size = "*_1", can_throw)]
    UnresolvedOdex(Reg, usize),
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        self.fmt_operands(f)
    }
}

impl Instr {
    /// Relative offset (in code units) of the branch target, the switch payload, or the
    /// array data payload referenced by this instruction.
    #[allow(clippy::enum_glob_use)]
    #[must_use]
    pub fn target_offset(&self) -> Option<i32> {
        use Instr::*;
        match self {
            Goto(off) => Some(i32::from(*off)),
            Goto16(off) => Some(i32::from(*off)),
            Goto32(off) => Some(*off),
            IfEq(_, _, off) | IfNe(_, _, off) | IfLt(_, _, off) | IfGe(_, _, off)
            | IfGt(_, _, off) | IfLe(_, _, off) | IfEqz(_, off) | IfNez(_, off)
            | IfLtz(_, off) | IfGez(_, off) | IfGtz(_, off) | IfLez(_, off) => {
                Some(i32::from(*off))
            }
            PackedSwitch(_, off) | SparseSwitch(_, off) | FillArrayData(_, off) => Some(*off),
            _ => None,
        }
    }

    /// Returns `true` for instructions jumping to an offset (excluding `fill-array-data`).
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.target_offset().is_some() && !matches!(self, Self::FillArrayData(_, _))
    }

    #[must_use]
    pub const fn is_switch(&self) -> bool {
        matches!(self, Self::PackedSwitch(_, _) | Self::SparseSwitch(_, _))
    }

    /// Relative targets of a switch payload.
    #[must_use]
    pub fn payload_targets(&self) -> Option<&[i32]> {
        match self {
            Self::PackedSwitchPayload(_, targets) | Self::SparseSwitchPayload(_, targets) => {
                Some(targets)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u16) -> Reg {
        Reg::from(n)
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Instr::Nop.size(), 1);
        assert_eq!(Instr::Const(r(0), 5).size(), 3);
        assert_eq!(Instr::ConstWide(r(0), 5).size(), 5);
        assert_eq!(Instr::IgetQuick(r(0), r(1), 8).size(), 2);
        assert_eq!(Instr::PackedSwitchPayload(0, vec![1, 2, 3]).size(), 10);
        assert_eq!(Instr::SparseSwitchPayload(vec![1, 5], vec![3, 4]).size(), 10);
        assert_eq!(Instr::FillArrayDataPayload(vec![vec![0; 4]; 3]).size(), 10);
        assert_eq!(Instr::UnresolvedOdex(r(0), 3).size(), 3);
    }

    #[test]
    fn test_flags() {
        let invoke = Instr::InvokeDirect(
            RegList::from(vec![0u8]),
            MethodRef::new(Type::class("java/lang/Object"), "<init>", vec![], Type::Void),
        );
        assert!(invoke.can_throw() && invoke.can_continue() && invoke.sets_result());
        assert!(invoke.can_initialize_reference());
        assert!(!invoke.odex_only());

        assert!(Instr::AgetWide(r(0), r(2), r(3)).sets_wide_register());
        assert!(!Instr::Throw(r(0)).can_continue());
        assert!(!Instr::Goto(3).can_continue());
        assert!(!Instr::DivFloat(r(0), r(1), r(2)).can_throw());
        assert!(Instr::DivIntLit8(r(0), r(1), 2).can_throw());
        assert!(Instr::ReturnVoidBarrier.odex_only());
        assert!(!Instr::ReturnVoidBarrier.can_continue());
        assert!(!Instr::IputQuick(r(0), r(1), 8).sets_register());
        assert_eq!(Instr::AgetWide(r(4), r(2), r(3)).destination(), Some(r(4)));
        assert_eq!(Instr::Throw(r(0)).destination(), None);
    }

    #[test]
    fn test_display() {
        let field = FieldRef::new(Type::class("Foo"), "bar", Type::Int);
        assert_eq!(
            Instr::Iget(r(0), r(1), field).to_string(),
            "iget v0, v1, LFoo;->bar:I"
        );
        assert_eq!(Instr::ReturnVoid.to_string(), "return-void");
        assert_eq!(
            Instr::ConstString(r(2), "hi".to_string()).to_string(),
            "const-string v2, \"hi\""
        );
        assert_eq!(
            Instr::ExecuteInlineRange(RegRange::new(4u16, 2), 3).to_string(),
            "execute-inline/range {v4 .. v5}, #3"
        );
    }

    #[test]
    fn test_targets() {
        assert_eq!(Instr::IfEqz(r(0), -4).target_offset(), Some(-4));
        assert!(Instr::Goto32(100).is_branch());
        assert!(!Instr::FillArrayData(r(0), 6).is_branch());
        assert!(Instr::SparseSwitch(r(0), 6).is_switch());
        assert_eq!(
            Instr::PackedSwitchPayload(0, vec![4, 8]).payload_targets(),
            Some(&[4, 8][..])
        );
    }
}
