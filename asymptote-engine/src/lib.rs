#![forbid(unsafe_code)]

//! # Asymptote Engine
//!
//! Static inference of worst-case Big-O time complexity.
//!
//! ## Overview
//!
//! The engine never runs the code it analyses. It reads a function's syntax
//! tree and derives an asymptotic class such as `O(n log n)` from loop
//! bounds, call costs and recursion shapes. Programs reach it through a
//! [`adapter::NodeAdapter`], which lowers a front end's tree into the
//! language-neutral [`nodes::SyntaxNode`].
//!
//! ## Quick Start
//!
//! ```
//! use asymptote_engine::nodes::{FunctionNode, SyntaxNode};
//! use asymptote_engine::{analyze_function, ComplexityClass, EngineConfig};
//!
//! let scan = FunctionNode::new(
//!     "scan",
//!     &["n"],
//!     vec![SyntaxNode::for_range(
//!         "i",
//!         SyntaxNode::lit(0),
//!         SyntaxNode::ident("n"),
//!         SyntaxNode::lit(1),
//!         SyntaxNode::call("print", vec![SyntaxNode::ident("i")]),
//!     )],
//! );
//! let report = analyze_function(&scan, &EngineConfig::default()).unwrap();
//! assert_eq!(report.complexity, ComplexityClass::ON);
//! ```
//!
//! ## Architecture
//!
//! Each function goes through the same pipeline:
//!
//! - [`tracker`]: follows how variables evolve (constant, stepped linearly,
//!   scaled by a factor)
//! - [`bound_resolution`]: turns loop headers and `while` conditions into a
//!   symbolic iteration count
//! - [`cost`]: composes a [`cost::CostExpression`], or a
//!   [`recurrence::RecurrenceRelation`] for self-recursive functions
//! - [`recurrence`]: solves relations by the master theorem or by expansion
//! - [`complexity`]: reduces an expression to a [`ComplexityClass`]
//!
//! [`analysis::Analyzer`] drives the pipeline over a whole module, in the
//! callee-first order computed by [`call_graph`].
//!
//! ## Degradation
//!
//! Whatever the engine cannot bound becomes `O(?)` with a warning. Constructs
//! with no lowering rule reject only their own function unless
//! [`EngineConfig::abort_on_unsupported`] is set.

pub mod adapter;
pub mod analysis;
pub mod bound_resolution;
pub mod call_graph;
pub mod complexity;
pub mod config;
pub mod cost;
pub mod error;
pub mod growth;
pub mod nodes;
pub mod recurrence;
pub mod tracker;

pub use analysis::{Analyzer, CancellationToken, FunctionReport, ModuleReport};
pub use complexity::ComplexityClass;
pub use config::EngineConfig;
pub use error::{AnalysisError, ConfigError, UnsupportedConstruct};

use adapter::PythonAstAdapter;

/// Analyse a single function with no knowledge of its module.
pub fn analyze_function(
    function: &nodes::FunctionNode,
    config: &EngineConfig,
) -> Result<FunctionReport, AnalysisError> {
    Analyzer::new(config.clone()).analyze_function(function)
}

/// Analyse a Python `Module` given in its JSON `ast` dump form.
pub fn analyze_python_ast(
    module: &serde_json::Value,
    config: &EngineConfig,
) -> Result<ModuleReport, AnalysisError> {
    let items = PythonAstAdapter::new().adapt_items(module)?;
    Analyzer::new(config.clone()).analyze_items(&items)
}
