//! # `DroidWorks` deodex
//!
//! `droidworks_deodex` is the main crate of the `DroidWorks` Dalvik register
//! types analysis and deodexing engine. The project is subdivided into multiple
//! crates, `droidworks_deodex` acts as entry point by reexporting important
//! structs and functions from those sub-crates. Most of the reexport are done
//! within the `droidworks_deodex::prelude` namespace.
//!
//! ## Library basics
//!
//! Methods are analyzed against a [`ClassPath`](prelude::ClassPath), which is
//! built once from every known class definition and then shared between
//! analyses:
//!
//! ```rust
//! use droidworks_deodex::prelude::*;
//! use droidworks_deodex::dex::classes::{ClassDef, ClassFlags};
//! use droidworks_deodex::dex::code::CodeItem;
//! use droidworks_deodex::dex::instrs::Instr;
//! use droidworks_deodex::dex::methods::{MethodDef, MethodFlags};
//! use droidworks_deodex::dex::registers::Reg;
//! use droidworks_deodex::dex::types::Type;
//!
//! let add = MethodDef::new(
//!     "add",
//!     vec![Type::Int, Type::Int],
//!     Type::Int,
//!     MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC,
//! )
//! .with_code(CodeItem::new(
//!     3,
//!     vec![
//!         Instr::AddInt(Reg::from(0u16), Reg::from(1u16), Reg::from(2u16)),
//!         Instr::Return(Reg::from(0u16)),
//!     ],
//!     vec![],
//! ));
//! let class = ClassDef::new(Type::class("Foo"), ClassFlags::ACC_PUBLIC).with_method(add);
//!
//! let classpath = ClassPath::new(vec![class.clone()], ClassPathConfig::default());
//! let analyzed = MethodAnalyzer::new(&classpath).analyze(&class, &class.methods[0])?;
//! println!("{}", analyzed.instruction(0).unwrap().post_registers_dump());
//! # Ok::<(), DwError>(())
//! ```
//!
//! Odexed code is deodexed along the way; `execute-inline` instructions need
//! an [`InlineMethodResolver`](prelude::InlineMethodResolver) for the VM
//! version that optimized the code.
//!
//! ## Sub-crates
//!
//!  - [`dw_dex`] contains the in-memory model of Dalvik classes, methods and
//!    instructions, standard and odex-only,
//!  - [`dw_analysis`] contains the class path, the register types lattice, the
//!    control flow graph and the method analyzer.

mod errors;

pub mod cli;
pub mod dw_inline;

pub use dw_analysis as analysis;
pub use dw_dex as dex;

/// Reexport module of commonly used structures and functions from `DroidWorks` project
/// sub-crates:
///
/// ```rust
/// use droidworks_deodex::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{DwError, DwResult};

    pub use dw_analysis::analyzer::{AnalyzedMethod, AnalyzerConfig, MethodAnalyzer};
    pub use dw_analysis::classpath::{ClassPath, ClassPathConfig, TypeProto};
    pub use dw_analysis::controlflow;
    pub use dw_analysis::inline::{InlineMethod, InlineMethodResolver};
    pub use dw_analysis::typing::{Category, RegisterType};
    pub use dw_analysis::{analyze_class, analyze_classes, analyze_method};

    pub use dw_dex::Addr;

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("DW_LOG", "info")
            .write_style("DW_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
