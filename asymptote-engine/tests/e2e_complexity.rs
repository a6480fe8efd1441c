use asymptote_engine::{analyze_python_ast, ComplexityClass, EngineConfig, ModuleReport};

fn analyze_file(path: &str) -> ModuleReport {
    let source =
        std::fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {path}: {e}"));
    let module: serde_json::Value =
        serde_json::from_str(&source).unwrap_or_else(|e| panic!("Failed to parse {path}: {e}"));
    analyze_python_ast(&module, &EngineConfig::default())
        .unwrap_or_else(|e| panic!("Failed to analyze {path}: {e}"))
}

fn class_of(report: &ModuleReport, function: &str) -> ComplexityClass {
    report
        .get(function)
        .unwrap_or_else(|| panic!("no report for {function}"))
        .complexity
}

#[test]
fn linear_scan() {
    let result = analyze_file("tests/programs/linear_scan.json");
    assert_eq!(result.functions.len(), 1);
    assert_eq!(class_of(&result, "total"), ComplexityClass::ON);
    assert!(result.functions[0].warnings.is_empty());
}

#[test]
fn nested_loops() {
    let result = analyze_file("tests/programs/nested_loops.json");
    assert_eq!(
        class_of(&result, "count_pairs"),
        ComplexityClass::OPolynomial(2)
    );
}

#[test]
fn binary_search() {
    let result = analyze_file("tests/programs/binary_search.json");
    assert_eq!(class_of(&result, "binary_search"), ComplexityClass::OLogN);
}

#[test]
fn merge_sort() {
    let result = analyze_file("tests/programs/merge_sort.json");
    assert_eq!(class_of(&result, "merge"), ComplexityClass::ON);
    assert_eq!(class_of(&result, "merge_sort"), ComplexityClass::ONLogN);

    let names: Vec<&str> = result
        .functions
        .iter()
        .map(|f| f.function_name.as_str())
        .collect();
    assert_eq!(names, vec!["merge", "merge_sort"]);
}

#[test]
fn fibonacci() {
    let result = analyze_file("tests/programs/fibonacci.json");
    assert_eq!(class_of(&result, "fib"), ComplexityClass::OExponential);
    assert!(result.functions[0].cost.contains("T_fib(n-1)"));
    assert!(result.functions[0].cost.contains("T_fib(n-2)"));
}

#[test]
fn unsupported_construct_degrades_one_function() {
    let result = analyze_file("tests/programs/unsupported.json");
    assert_eq!(result.functions.len(), 2);

    let load = result.get("load").unwrap();
    assert_eq!(load.complexity, ComplexityClass::Unknown);
    assert_eq!(load.warnings, vec!["unsupported construct: Try"]);

    assert_eq!(class_of(&result, "halve"), ComplexityClass::OLogN);
    assert_eq!(result.worst(), ComplexityClass::Unknown);
}

#[test]
fn unsupported_construct_can_abort() {
    let source = std::fs::read_to_string("tests/programs/unsupported.json").unwrap();
    let module: serde_json::Value = serde_json::from_str(&source).unwrap();
    let config = EngineConfig {
        abort_on_unsupported: true,
        ..EngineConfig::default()
    };
    let err = analyze_python_ast(&module, &config).unwrap_err();
    assert_eq!(err.to_string(), "unsupported construct: Try");
}
