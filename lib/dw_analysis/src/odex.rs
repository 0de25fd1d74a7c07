//! Mapping of odexed field accessors back to their typed standard forms.
//!
//! Quick and volatile accessors only tell apart narrow, wide and object values, while standard
//! accessors have a variant per primitive type. The resolved field type selects the variant,
//! and must agree with the width of the odexed opcode.

use crate::errors::{AnalysisError, AnalysisResult};
use dw_dex::fields::FieldRef;
use dw_dex::instrs::{Instr, Instruction};
use dw_dex::registers::Reg;
use dw_dex::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Narrow,
    Wide,
    Object,
}

impl Width {
    const fn of(type_: &Type) -> Option<Self> {
        match type_ {
            Type::Void => None,
            Type::Long | Type::Double => Some(Self::Wide),
            Type::Class(_) | Type::Array(_, _) => Some(Self::Object),
            _ => Some(Self::Narrow),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    InstanceGet(Reg, Reg),
    InstancePut(Reg, Reg),
    StaticGet(Reg),
    StaticPut(Reg),
}

#[allow(clippy::enum_glob_use)]
fn odexed_access(instr: &Instr) -> Option<(Access, Width)> {
    use Instr::*;
    let access = match instr {
        IgetQuick(a, b, _) | IgetVolatile(a, b, _) => (Access::InstanceGet(*a, *b), Width::Narrow),
        IgetWideQuick(a, b, _) | IgetWideVolatile(a, b, _) => {
            (Access::InstanceGet(*a, *b), Width::Wide)
        }
        IgetObjectQuick(a, b, _) | IgetObjectVolatile(a, b, _) => {
            (Access::InstanceGet(*a, *b), Width::Object)
        }
        IputQuick(a, b, _) | IputVolatile(a, b, _) => (Access::InstancePut(*a, *b), Width::Narrow),
        IputWideQuick(a, b, _) | IputWideVolatile(a, b, _) => {
            (Access::InstancePut(*a, *b), Width::Wide)
        }
        IputObjectQuick(a, b, _) | IputObjectVolatile(a, b, _) => {
            (Access::InstancePut(*a, *b), Width::Object)
        }
        SgetVolatile(a, _) => (Access::StaticGet(*a), Width::Narrow),
        SgetWideVolatile(a, _) => (Access::StaticGet(*a), Width::Wide),
        SgetObjectVolatile(a, _) => (Access::StaticGet(*a), Width::Object),
        SputVolatile(a, _) => (Access::StaticPut(*a), Width::Narrow),
        SputWideVolatile(a, _) => (Access::StaticPut(*a), Width::Wide),
        SputObjectVolatile(a, _) => (Access::StaticPut(*a), Width::Object),
        _ => return None,
    };
    Some(access)
}

/// Returns the standard accessor equivalent to an odexed one, once its field is known.
#[allow(clippy::enum_glob_use)]
pub fn deodex_field_access(odexed: &Instr, field: FieldRef) -> AnalysisResult<Instr> {
    use Instr::*;

    let (access, width) = odexed_access(odexed)
        .ok_or_else(|| AnalysisError::NotOdexedFieldAccess(odexed.mnemonic()))?;
    if Width::of(&field.type_) != Some(width) {
        return Err(AnalysisError::IncorrectFieldType {
            type_: field.type_.to_string(),
            opcode: odexed.mnemonic(),
        });
    }

    let instr = match access {
        Access::InstanceGet(a, b) => match field.type_ {
            Type::Boolean => IgetBoolean(a, b, field),
            Type::Byte => IgetByte(a, b, field),
            Type::Short => IgetShort(a, b, field),
            Type::Char => IgetChar(a, b, field),
            Type::Long | Type::Double => IgetWide(a, b, field),
            Type::Class(_) | Type::Array(_, _) => IgetObject(a, b, field),
            _ => Iget(a, b, field),
        },
        Access::InstancePut(a, b) => match field.type_ {
            Type::Boolean => IputBoolean(a, b, field),
            Type::Byte => IputByte(a, b, field),
            Type::Short => IputShort(a, b, field),
            Type::Char => IputChar(a, b, field),
            Type::Long | Type::Double => IputWide(a, b, field),
            Type::Class(_) | Type::Array(_, _) => IputObject(a, b, field),
            _ => Iput(a, b, field),
        },
        Access::StaticGet(a) => match field.type_ {
            Type::Boolean => SgetBoolean(a, field),
            Type::Byte => SgetByte(a, field),
            Type::Short => SgetShort(a, field),
            Type::Char => SgetChar(a, field),
            Type::Long | Type::Double => SgetWide(a, field),
            Type::Class(_) | Type::Array(_, _) => SgetObject(a, field),
            _ => Sget(a, field),
        },
        Access::StaticPut(a) => match field.type_ {
            Type::Boolean => SputBoolean(a, field),
            Type::Byte => SputByte(a, field),
            Type::Short => SputShort(a, field),
            Type::Char => SputChar(a, field),
            Type::Long | Type::Double => SputWide(a, field),
            Type::Class(_) | Type::Array(_, _) => SputObject(a, field),
            _ => Sput(a, field),
        },
    };
    Ok(instr)
}

/// Returns the standard accessor of a volatile one, which still carries its field.
#[allow(clippy::enum_glob_use)]
pub fn deodex_volatile_access(odexed: &Instr) -> AnalysisResult<Instr> {
    use Instr::*;

    let field = match odexed {
        IgetVolatile(_, _, field)
        | IgetWideVolatile(_, _, field)
        | IgetObjectVolatile(_, _, field)
        | IputVolatile(_, _, field)
        | IputWideVolatile(_, _, field)
        | IputObjectVolatile(_, _, field)
        | SgetVolatile(_, field)
        | SgetWideVolatile(_, field)
        | SgetObjectVolatile(_, field)
        | SputVolatile(_, field)
        | SputWideVolatile(_, field)
        | SputObjectVolatile(_, field) => field.clone(),
        _ => return Err(AnalysisError::NotOdexedFieldAccess(odexed.mnemonic())),
    };
    deodex_field_access(odexed, field)
}
