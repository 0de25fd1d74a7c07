//! In-memory model of Dalvik code consumed by the DroidWorks analyses: types, class, field and
//! method definitions, method bodies and instructions.
//!
//! References between items are symbolic (descriptors and names), so that a model can be
//! produced by any dex reader, or built directly in tests.

mod addr;

pub mod classes;
pub mod code;
pub mod errors;
pub mod fields;
pub mod instrs;
pub mod methods;
pub mod registers;
pub mod types;

pub use crate::addr::Addr;

pub mod prelude {
    pub use crate::classes::{ClassDef, ClassFlags};
    pub use crate::code::{CatchHandler, CodeItem, TryItem};
    pub use crate::errors::{DexError, DexResult};
    pub use crate::fields::{FieldDef, FieldFlags, FieldRef};
    pub use crate::instrs::{Instr, Instruction, LabeledInstr};
    pub use crate::methods::{MethodDef, MethodFlags, MethodRef};
    pub use crate::registers::{Reg, RegList, RegRange};
    pub use crate::types::Type;
    pub use crate::Addr;
}
