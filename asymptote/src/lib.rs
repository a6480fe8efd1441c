//! Asymptote infers the worst-case Big-O time complexity of Python functions
//! without running them. It reads the JSON dump of Python's `ast` module and
//! reports one complexity class per function.
//!
//! ## Example Usage
//!
//! ```rust
//! use asymptote::{analyze_source_json, ComplexityClass, EngineConfig};
//!
//! let module = r#"{
//!     "_type": "Module",
//!     "body": [{
//!         "_type": "FunctionDef",
//!         "name": "first",
//!         "args": {"_type": "arguments", "args": [{"_type": "arg", "arg": "xs"}]},
//!         "body": [{"_type": "Return", "value": {
//!             "_type": "Subscript",
//!             "value": {"_type": "Name", "id": "xs"},
//!             "slice": {"_type": "Constant", "value": 0}
//!         }}]
//!     }]
//! }"#;
//!
//! let report = analyze_source_json(module, &EngineConfig::default()).unwrap();
//! assert_eq!(report.get("first").unwrap().complexity, ComplexityClass::O1);
//! ```

use std::path::Path;

use anyhow::{Context, Result};

pub use asymptote_engine;
pub use asymptote_engine::{
    AnalysisError, Analyzer, CancellationToken, ComplexityClass, EngineConfig, FunctionReport,
    ModuleReport,
};

/// Analyse a module given as the text of its JSON `ast` dump.
pub fn analyze_source_json(source: &str, config: &EngineConfig) -> Result<ModuleReport> {
    let module: serde_json::Value =
        serde_json::from_str(source).context("syntax tree is not valid JSON")?;
    let report = asymptote_engine::analyze_python_ast(&module, config)?;
    tracing::debug!(functions = report.functions.len(), "module analysed");
    Ok(report)
}

pub fn analyze_file(path: impl AsRef<Path>, config: &EngineConfig) -> Result<ModuleReport> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    analyze_source_json(&source, config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(EngineConfig::from_json_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NESTED: &str = r#"{
        "_type": "Module",
        "body": [{
            "_type": "FunctionDef",
            "name": "pairs",
            "args": {"_type": "arguments", "args": [{"_type": "arg", "arg": "n"}]},
            "body": [{
                "_type": "For",
                "target": {"_type": "Name", "id": "i"},
                "iter": {"_type": "Call", "func": {"_type": "Name", "id": "range"},
                         "args": [{"_type": "Name", "id": "n"}], "keywords": []},
                "body": [{
                    "_type": "For",
                    "target": {"_type": "Name", "id": "j"},
                    "iter": {"_type": "Call", "func": {"_type": "Name", "id": "range"},
                             "args": [{"_type": "Name", "id": "n"}], "keywords": []},
                    "body": [{"_type": "Pass"}],
                    "orelse": []
                }],
                "orelse": []
            }]
        }]
    }"#;

    #[test]
    fn test_analyze_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{NESTED}").unwrap();
        let report = analyze_file(file.path(), &EngineConfig::default()).unwrap();
        assert_eq!(
            report.get("pairs").unwrap().complexity,
            ComplexityClass::OPolynomial(2)
        );
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = analyze_file("/nonexistent/module.json", &EngineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/module.json"));
    }

    #[test]
    fn test_invalid_json() {
        let err = analyze_source_json("def f(): pass", &EngineConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "syntax tree is not valid JSON");
    }

    #[test]
    fn test_load_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"unresolved_call": "O(n)"}}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.unresolved_call, ComplexityClass::ON);
    }
}
