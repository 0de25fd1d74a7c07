//! Analysis errors definition.

use crate::classpath::errors::ClassPathError;
use dw_dex::errors::DexError;
use dw_dex::registers::Reg;
use dw_dex::Addr;
use regex::Error as RegexError;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("dex error: {0}")]
    Dex(#[from] DexError),

    #[error("regex error: {0}")]
    Regex(#[from] RegexError),

    #[error("{0}")]
    ClassPath(#[from] ClassPathError),

    #[error("the method has no implementation")]
    NoCode,

    #[error("Execution can continue past the last instruction")]
    ContinuesPastEnd,

    #[error("Execution can pass from the {from} instruction at code address {from_addr} to the move-exception instruction at address {to_addr}")]
    MoveExceptionEdge {
        from: String,
        from_addr: Addr,
        to_addr: Addr,
    },

    #[error("invalid branch target: offset {offset} from code address {from}")]
    InvalidTarget { from: Addr, offset: i32 },

    #[error("no switch payload at code address {0}")]
    MissingPayload(Addr),

    #[error("{0} must occur after an invoke-*/fill-new-array instruction")]
    MoveResultPosition(String),

    #[error("move-exception must be the first instruction in an exception handler block")]
    MoveExceptionNotHandler,

    #[error("Invalid register type {type_} for register {reg}.")]
    InvalidRegisterType { type_: String, reg: Reg },

    #[error("register {0} is out of bounds")]
    RegisterOutOfBounds(Reg),

    #[error("the method takes {params} parameter registers but only has {registers} registers")]
    ParameterRegisters { params: usize, registers: usize },

    #[error("{0} does not set a register")]
    NoDestination(&'static str),

    #[error("{0} has no receiver register")]
    MissingReceiver(&'static str),

    #[error("{0} cannot be used as the first register in a wide register pair because it is the last register.")]
    WidePairOutOfBounds(Reg),

    #[error("new-array used with non-array type")]
    NewArrayNotArray,

    #[error("{opcode} used with {problem}: {type_}")]
    NotAnArray {
        opcode: &'static str,
        problem: &'static str,
        type_: String,
    },

    #[error("Could not resolve the field in class {class} at offset {offset}")]
    FieldNotResolved { class: String, offset: usize },

    #[error("Could not resolve the method in class {class} at index {index}")]
    MethodNotResolved { class: String, index: usize },

    #[error("Couldn't find accessible class while resolving {kind} {member}")]
    InaccessibleDefiner { kind: &'static str, member: String },

    #[error("Incorrect field type \"{type_}\" for {opcode}")]
    IncorrectFieldType { type_: String, opcode: &'static str },

    #[error("Not an odexed field access opcode: {0}")]
    NotOdexedFieldAccess(&'static str),

    #[error("Invalid method index: {0}")]
    InlineIndex(usize),

    #[error("Could not determine the correct inline method to use")]
    InlineAmbiguous,

    #[error("Invalid method descriptor: {0}")]
    InvalidInlineDescriptor(String),

    #[error("Cannot resolve inline method: {0}")]
    UnresolvedInline(String),

    #[error("Cannot analyze an odexed instruction unless we are deodexing")]
    NoInlineResolver,

    #[error("odex version {0} is not supported yet")]
    UnsupportedVmVersion(u32),

    #[error("analysis did not reach a fixed point after {0} passes")]
    IterationLimit(usize),

    #[error("{source}\n    opcode: {opcode}\n    code address: {address}\n    method: {method}")]
    Context {
        opcode: &'static str,
        address: Addr,
        method: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Wraps an error raised while analyzing an instruction with its location.
    #[must_use]
    pub fn with_context(self, opcode: &'static str, address: Addr, method: String) -> Self {
        Self::Context {
            opcode,
            address,
            method,
            source: Box::new(self),
        }
    }

    /// Returns the error without its location context.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            err => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let err = AnalysisError::MoveResultPosition("move-result".to_string()).with_context(
            "move-result",
            Addr(4),
            "LFoo;->bar()V".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "move-result must occur after an invoke-*/fill-new-array instruction\n    opcode: move-result\n    code address: 0x4\n    method: LFoo;->bar()V"
        );
        assert!(matches!(err.root(), AnalysisError::MoveResultPosition(_)));
    }
}
