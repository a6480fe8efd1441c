use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityClass;
use crate::error::ConfigError;

static DEFAULT_BUILTIN_COSTS: Lazy<BTreeMap<String, ComplexityClass>> = Lazy::new(|| {
    let constant = [
        "len", "print", "append", "pop", "index", "abs", "int", "float", "str", "bool", "range",
        "get", "add", "isinstance", "hash", "ord", "chr", "setdefault", "popleft", "appendleft",
        "heappush", "heappop", "update", "display", "contains",
    ];
    let linear = [
        "sum", "min", "max", "list", "slice", "reversed", "copy", "set", "dict", "tuple", "join",
        "count", "extend", "insert", "remove", "any", "all", "enumerate", "zip", "map", "filter",
        "deepcopy", "heapify", "split",
    ];
    let linearithmic = ["sorted", "sort"];

    let mut costs = BTreeMap::new();
    for name in constant {
        costs.insert(name.to_string(), ComplexityClass::O1);
    }
    for name in linear {
        costs.insert(name.to_string(), ComplexityClass::ON);
    }
    for name in linearithmic {
        costs.insert(name.to_string(), ComplexityClass::ONLogN);
    }
    costs
});

fn default_builtin_costs() -> BTreeMap<String, ComplexityClass> {
    DEFAULT_BUILTIN_COSTS.clone()
}

fn default_unresolved_call() -> ComplexityClass {
    ComplexityClass::O1
}

/// Tunables of one analysis run.
///
/// Every field has a default, so `{}` is a valid configuration document and
/// partial documents only override what they name. `builtin_costs` replaces
/// the default table wholesale when present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Cost of calling an external function, keyed by its name. A dotted
    /// callee such as `items.sort` also matches on its last segment.
    #[serde(default = "default_builtin_costs")]
    pub builtin_costs: BTreeMap<String, ComplexityClass>,

    /// Cost assumed for calls that are neither module functions nor listed
    /// in `builtin_costs`.
    #[serde(default = "default_unresolved_call")]
    pub unresolved_call: ComplexityClass,

    /// Abort the whole module on the first unsupported construct instead of
    /// reporting that one function as `O(?)`.
    #[serde(default)]
    pub abort_on_unsupported: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            builtin_costs: default_builtin_costs(),
            unresolved_call: default_unresolved_call(),
            abort_on_unsupported: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Configured cost of an external callee, if any.
    pub fn builtin_cost(&self, callee: &str) -> Option<ComplexityClass> {
        self.builtin_costs.get(callee).copied().or_else(|| {
            callee
                .rsplit_once('.')
                .and_then(|(_, method)| self.builtin_costs.get(method).copied())
        })
    }
}
