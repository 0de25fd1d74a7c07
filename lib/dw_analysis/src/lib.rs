//! This crate provides the Dalvik bytecode register types analysis and
//! deodexing engine of the `DroidWorks` project.

pub mod analyzer;
pub mod classpath;
pub mod controlflow;
pub mod errors;
pub mod inline;
pub mod odex;
pub mod typing;

use crate::analyzer::{AnalyzedMethod, MethodAnalyzer};
use crate::classpath::ClassPath;
use crate::errors::AnalysisResult;
use crate::inline::InlineMethodResolver;
use dw_dex::classes::ClassDef;
use dw_dex::methods::{MethodDef, MethodRef};
use log::debug;
use rayon::prelude::*;

/// Outcome of the analysis of one method of a batch.
pub type MethodOutcome = (MethodRef, AnalysisResult<AnalyzedMethod>);

pub fn analyze_method(
    classpath: &ClassPath,
    inline_resolver: Option<&InlineMethodResolver>,
    class: &ClassDef,
    method: &MethodDef,
) -> AnalysisResult<AnalyzedMethod> {
    let analyzer = MethodAnalyzer::new(classpath);
    match inline_resolver {
        Some(resolver) => analyzer.with_inline_resolver(resolver).analyze(class, method),
        None => analyzer.analyze(class, method),
    }
}

/// Analyzes every method of a class that has an implementation.
pub fn analyze_class(analyzer: &MethodAnalyzer, class: &ClassDef) -> Vec<MethodOutcome> {
    debug!("analyzing class {}", class.type_);
    class
        .methods
        .iter()
        .filter(|method| method.code.is_some())
        .map(|method| (method.to_ref(&class.type_), analyzer.analyze(class, method)))
        .collect()
}

/// Analyzes classes in parallel, sharing the class path of `analyzer`.
pub fn analyze_classes(analyzer: &MethodAnalyzer, classes: &[ClassDef]) -> Vec<MethodOutcome> {
    classes
        .par_iter()
        .flat_map_iter(|class| analyze_class(analyzer, class))
        .collect()
}
