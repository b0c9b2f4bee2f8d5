//! Rule-set integration tests.
//!
//! Each rule-set is built through the function registry, type-checked, and
//! then evaluated against several argument sets:
//!
//! 1. Nested validate/error rules -- first match, depth first, short circuit
//! 2. Attribute access on a string list with `isSet` narrowing
//! 3. Mapped `stringEquals` with `all`/`any`
//! 4. Scope discipline between sibling and nested rules
//! 5. Endpoint construction from templates, headers and properties
//! 6. Concurrent evaluation of one shared rule-set
//! 7. Static types agree with evaluated values

use std::collections::BTreeMap;

use endpoint_rules_core::typecheck::check_expression;
use endpoint_rules_core::{
    Condition, Endpoint, EndpointRuleSet, EvalError, Expression, FunctionRegistry, Identifier,
    Parameter, ParameterType, Rule, Scope, Type, Value,
};
use endpoint_rules_eval::{eval_expr, evaluate, evaluate_json, RuleOutcome};
use serde_json::json;

// ──────────────────────────────────────────────
// Test fixtures
// ──────────────────────────────────────────────

fn registry() -> FunctionRegistry {
    FunctionRegistry::standard()
}

fn call(id: &str, arguments: Vec<Expression>) -> Expression {
    registry().call(id, arguments).unwrap()
}

fn reference(name: &str) -> Expression {
    Expression::reference(name)
}

fn string_equals(left: Expression, right: &str) -> Condition {
    Condition::new(call("stringEquals", vec![left, right.into()]))
}

fn required_string(name: &str) -> Parameter {
    Parameter::new(name, ParameterType::String).required(true)
}

fn args(pairs: &[(&str, Value)]) -> BTreeMap<Identifier, Value> {
    pairs
        .iter()
        .map(|(k, v)| (Identifier::from(*k), v.clone()))
        .collect()
}

fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::from(*s)).collect())
}

fn checked(version: &str, parameters: Vec<Parameter>, rules: Vec<Rule>) -> EndpointRuleSet {
    let rule_set = EndpointRuleSet::new(version, parameters, rules).unwrap();
    rule_set
        .type_check()
        .unwrap_or_else(|e| panic!("rule-set failed to type-check: {}", e));
    rule_set
}

fn error_of(rule_set: &EndpointRuleSet, arguments: &[(&str, Value)]) -> String {
    match evaluate(rule_set, &args(arguments)) {
        Ok(RuleOutcome::Error { message }) => message,
        other => panic!("expected an error outcome, got {:?}", other),
    }
}

// ──────────────────────────────────────────────
// 1. Validate / error chains
// ──────────────────────────────────────────────

fn validate_and_errors() -> EndpointRuleSet {
    let equals_a = string_equals(reference("param1"), "a");
    let equals_b = string_equals(reference("param2"), "b");
    let equals_c = string_equals(reference("param3"), "c");

    let matched = Rule::tree(vec![], vec![Rule::error(vec![], "rule matched: p3")]);
    let rule = Rule::validate_or_else(
        "param1 value is not a",
        vec![equals_a],
        Rule::error_or_else(
            "param2 is b",
            vec![equals_b.clone()],
            Rule::validate_or_else(
                "param3 value is not c",
                vec![equals_c],
                Rule::error_or_else("param2 is b", vec![equals_b], matched),
            ),
        ),
    );
    checked(
        "1.0",
        vec![
            required_string("param1"),
            required_string("param2"),
            required_string("param3"),
        ],
        vec![rule],
    )
}

#[test]
fn nested_validation_reaches_innermost_rule() {
    let rule_set = validate_and_errors();
    assert_eq!(
        error_of(
            &rule_set,
            &[
                ("param1", "a".into()),
                ("param2", "c".into()),
                ("param3", "c".into()),
            ]
        ),
        "rule matched: p3"
    );
}

#[test]
fn failed_validation_reports_its_message() {
    let rule_set = validate_and_errors();
    assert_eq!(
        error_of(
            &rule_set,
            &[
                ("param1", "b".into()),
                ("param2", "c".into()),
                ("param3", "c".into()),
            ]
        ),
        "param1 value is not a"
    );
    assert_eq!(
        error_of(
            &rule_set,
            &[
                ("param1", "a".into()),
                ("param2", "b".into()),
                ("param3", "c".into()),
            ]
        ),
        "param2 is b"
    );
    assert_eq!(
        error_of(
            &rule_set,
            &[
                ("param1", "a".into()),
                ("param2", "c".into()),
                ("param3", "d".into()),
            ]
        ),
        "param3 value is not c"
    );
}

// ──────────────────────────────────────────────
// 2. String lists
// ──────────────────────────────────────────────

#[test]
fn string_list_first_element() {
    let first = Condition::assign(call("getAttr", vec![reference("param2"), "[0]".into()]), "p2First");
    let rule = Rule::validate_or_else(
        "param1 value is not a",
        vec![string_equals(reference("param1"), "a")],
        Rule::error_or_else(
            "param2 is b",
            vec![
                first,
                Condition::new(call("isSet", vec![reference("p2First")])),
                string_equals(reference("p2First"), "b"),
            ],
            Rule::tree(vec![], vec![Rule::error(vec![], "rule matched: p3")]),
        ),
    );
    let rule_set = checked(
        "1.0",
        vec![
            required_string("param1"),
            Parameter::new("param2", ParameterType::StringArray).required(true),
        ],
        vec![rule],
    );

    assert_eq!(
        error_of(&rule_set, &[("param1", "a".into()), ("param2", strings(&["c"]))]),
        "rule matched: p3"
    );
    assert_eq!(
        error_of(&rule_set, &[("param1", "a".into()), ("param2", strings(&["b"]))]),
        "param2 is b"
    );
    // An empty list has no first element: the assign condition fails.
    assert_eq!(
        error_of(&rule_set, &[("param1", "a".into()), ("param2", strings(&[]))]),
        "rule matched: p3"
    );
}

// ──────────────────────────────────────────────
// 3. Map mode
// ──────────────────────────────────────────────

fn map_string_equals() -> EndpointRuleSet {
    let set_param = Condition::assign(call("selectSet", vec![reference("param1")]), "setParam1");
    let equals_a = Condition::assign(
        registry()
            .map("stringEquals", reference("setParam1"), vec!["a".into()])
            .unwrap(),
        "p1EqA",
    );
    let rule = Rule::tree(
        vec![set_param, equals_a],
        vec![
            Rule::error(
                vec![Condition::new(call("all", vec![reference("p1EqA"), true.into()]))],
                "all match a",
            ),
            Rule::error(
                vec![Condition::new(call("any", vec![reference("p1EqA"), true.into()]))],
                "some match a",
            ),
            Rule::error(vec![], "no match"),
        ],
    );
    checked(
        "1.1",
        vec![Parameter::new("param1", ParameterType::StringArray).required(true)],
        vec![rule],
    )
}

#[test]
fn mapped_string_equals() {
    let rule_set = map_string_equals();
    assert_eq!(
        error_of(&rule_set, &[("param1", strings(&["a", "a"]))]),
        "all match a"
    );
    assert_eq!(
        error_of(&rule_set, &[("param1", strings(&["a", "b"]))]),
        "some match a"
    );
    assert_eq!(error_of(&rule_set, &[("param1", strings(&["b"]))]), "no match");
}

#[test]
fn mapped_string_equals_from_json() {
    let rule_set = map_string_equals();
    let outcome = evaluate_json(&rule_set, &json!({"param1": ["a", "b"]})).unwrap();
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({"type": "error", "message": "some match a"})
    );
}

#[test]
fn mapping_over_unfiltered_optional_elements_fails_type_check() {
    let mut scope = Scope::new();
    scope.insert("list", Type::array(Type::optional(Type::String)));
    let mapped = registry()
        .map("stringEquals", reference("list"), vec!["a".into()])
        .unwrap();
    let err = check_expression(&mapped, &mut scope).unwrap_err();
    assert!(err.message.starts_with("Unexpected type in function map"));
}

// ──────────────────────────────────────────────
// 4. Scope discipline
// ──────────────────────────────────────────────

#[test]
fn branch_bindings_do_not_reach_later_siblings() {
    // The first rule binds `r` before failing on its second condition.
    let rule_set = EndpointRuleSet::new(
        "1.0",
        vec![Parameter::new("Region", ParameterType::String)],
        vec![
            Rule::error(
                vec![
                    Condition::assign(reference("Region"), "r"),
                    string_equals(reference("r"), "never"),
                ],
                "first",
            ),
            Rule::error(
                vec![Condition::new(call("isSet", vec![reference("r")]))],
                "leaked",
            ),
            Rule::error(vec![], "clean"),
        ],
    )
    .unwrap();
    assert_eq!(error_of(&rule_set, &[("Region", "us-east-1".into())]), "clean");

    // The checker rejects the same leak statically.
    let err = rule_set.type_check().unwrap_err();
    assert_eq!(err.message, "No binding for `r`");
}

#[test]
fn branch_bindings_reach_nested_rules() {
    let rule_set = checked(
        "1.0",
        vec![Parameter::new("Region", ParameterType::String)],
        vec![
            Rule::tree(
                vec![Condition::assign(reference("Region"), "r")],
                vec![Rule::tree(
                    vec![],
                    vec![Rule::error(
                        vec![],
                        Expression::template("nested sees {r}").unwrap(),
                    )],
                )],
            ),
            Rule::error(vec![], "no region"),
        ],
    );
    assert_eq!(
        error_of(&rule_set, &[("Region", "eu-west-1".into())]),
        "nested sees eu-west-1"
    );
    assert_eq!(error_of(&rule_set, &[]), "no region");
}

// ──────────────────────────────────────────────
// 5. Endpoints
// ──────────────────────────────────────────────

fn service_rules() -> EndpointRuleSet {
    let custom = Rule::endpoint(
        vec![
            Condition::new(call("isSet", vec![reference("Endpoint")])),
            Condition::assign(call("parseUrl", vec![reference("Endpoint")]), "url"),
        ],
        Endpoint::new(reference("Endpoint"))
            .with_property("authority", call("getAttr", vec![reference("url"), "authority".into()])),
    );
    let invalid_region = Rule::error(
        vec![Condition::new(call(
            "not",
            vec![call("isValidHostLabel", vec![reference("Region"), false.into()])],
        ))],
        Expression::template("Invalid region: {Region}").unwrap(),
    );
    let fips = Rule::endpoint(
        vec![Condition::new(call(
            "booleanEquals",
            vec![reference("UseFips"), true.into()],
        ))],
        Endpoint::new(Expression::template("https://service-fips.{Region}.example.com").unwrap()),
    );
    let regional = Rule::endpoint(
        vec![],
        Endpoint::new(Expression::template("https://service.{Region}.example.com").unwrap())
            .with_header("x-service-region", vec![reference("Region")])
            .with_property(
                "authSchemes",
                Expression::tuple(vec![Expression::record([
                    ("name", Expression::string("sigv4")),
                    ("signingRegion", reference("Region")),
                ])]),
            ),
    );
    checked(
        "1.0",
        vec![
            required_string("Region").with_built_in("AWS::Region"),
            Parameter::new("UseFips", ParameterType::Boolean)
                .with_default(false)
                .unwrap(),
            Parameter::new("Endpoint", ParameterType::String)
                .with_documentation("Override the endpoint used to send this request"),
        ],
        vec![custom, invalid_region, fips, regional],
    )
}

#[test]
fn regional_endpoint_with_headers_and_properties() {
    let outcome = evaluate_json(&service_rules(), &json!({"Region": "us-west-2"})).unwrap();
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({
            "type": "endpoint",
            "url": "https://service.us-west-2.example.com",
            "headers": {"x-service-region": ["us-west-2"]},
            "properties": {
                "authSchemes": [{"name": "sigv4", "signingRegion": "us-west-2"}]
            }
        })
    );
}

#[test]
fn fips_default_can_be_overridden() {
    let outcome = evaluate_json(
        &service_rules(),
        &json!({"Region": "us-west-2", "UseFips": true}),
    )
    .unwrap();
    assert_eq!(
        outcome.endpoint().map(|e| e.url.as_str()),
        Some("https://service-fips.us-west-2.example.com")
    );
}

#[test]
fn custom_endpoint_takes_precedence() {
    let outcome = evaluate_json(
        &service_rules(),
        &json!({"Region": "us-west-2", "Endpoint": "https://localhost:8443/custom"}),
    )
    .unwrap();
    let endpoint = outcome.endpoint().unwrap();
    assert_eq!(endpoint.url, "https://localhost:8443/custom");
    assert_eq!(endpoint.properties["authority"], Value::from("localhost:8443"));
}

#[test]
fn unparseable_custom_endpoint_falls_through() {
    let outcome = evaluate_json(
        &service_rules(),
        &json!({"Region": "us-west-2", "Endpoint": "https://example.com/?query=1"}),
    )
    .unwrap();
    assert_eq!(
        outcome.endpoint().map(|e| e.url.as_str()),
        Some("https://service.us-west-2.example.com")
    );
}

#[test]
fn invalid_region_is_an_error_outcome() {
    let outcome = evaluate_json(&service_rules(), &json!({"Region": "not a region"})).unwrap();
    assert_eq!(outcome.error(), Some("Invalid region: not a region"));
}

#[test]
fn missing_required_region() {
    assert_eq!(
        evaluate_json(&service_rules(), &json!({})).unwrap_err(),
        EvalError::MissingParameter {
            name: "Region".to_string()
        }
    );
}

// ──────────────────────────────────────────────
// 6. Concurrency
// ──────────────────────────────────────────────

#[test]
fn rule_sets_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EndpointRuleSet>();
    assert_send_sync::<FunctionRegistry>();

    let rule_set = service_rules();
    let regions = ["us-east-1", "us-west-2", "eu-central-1", "ap-south-1"];
    std::thread::scope(|s| {
        let handles: Vec<_> = regions
            .iter()
            .map(|region| {
                let rule_set = &rule_set;
                s.spawn(move || {
                    (0..50)
                        .map(|_| {
                            evaluate(rule_set, &args(&[("Region", Value::from(*region))]))
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for (region, handle) in regions.iter().zip(handles) {
            let outcomes = handle.join().unwrap();
            let expected = format!("https://service.{}.example.com", region);
            assert!(outcomes
                .iter()
                .all(|o| o.endpoint().map(|e| e.url.as_str()) == Some(expected.as_str())));
        }
    });
}

// ──────────────────────────────────────────────
// 7. Type soundness
// ──────────────────────────────────────────────

#[test]
fn evaluated_values_inhabit_their_static_types() {
    let mut types = Scope::new();
    types.insert("Region", Type::String);
    types.insert("Endpoint", Type::optional(Type::String));
    types.insert("List", Type::array(Type::optional(Type::String)));

    let expressions = vec![
        reference("Endpoint"),
        call("parseUrl", vec![Expression::string("https://example.com/a")]),
        call("parseUrl", vec![Expression::string("not a url")]),
        call(
            "substring",
            vec![reference("Region"), Expression::integer(0), Expression::integer(2), false.into()],
        ),
        call(
            "substring",
            vec![reference("Region"), Expression::integer(0), Expression::integer(99), false.into()],
        ),
        call("selectSet", vec![reference("List")]),
        call("getAttr", vec![reference("List"), "[1]".into()]),
        call("getAttr", vec![reference("List"), "[9]".into()]),
        registry()
            .map(
                "isValidHostLabel",
                call("selectSet", vec![reference("List")]),
                vec![true.into()],
            )
            .unwrap(),
        Expression::template("https://{Region}.example.com").unwrap(),
        call("uriEncode", vec![reference("Region")]),
        Expression::literal(Value::Array(vec![Value::from("a"), Value::Empty])),
    ];

    let assignments = [
        vec![
            ("Region", Value::from("us-east-1")),
            ("List", Value::Array(vec![Value::from("a"), Value::Empty, Value::from("b.c")])),
        ],
        vec![
            ("Region", Value::from("x")),
            ("Endpoint", Value::from("https://localhost")),
            ("List", Value::Array(vec![])),
        ],
    ];

    for assignment in &assignments {
        let mut values = Scope::new();
        for (name, value) in assignment {
            values.insert(*name, value.clone());
        }
        for expression in &expressions {
            let ty = check_expression(expression, &mut types)
                .unwrap_or_else(|e| panic!("{} failed to type-check: {}", expression, e));
            let value = eval_expr(expression, &values).unwrap();
            assert!(
                ty.admits(&value),
                "{} has type {} but evaluated to {}",
                expression,
                ty,
                value
            );
        }
    }

    // Literal arrays are typed from every element, so these never reach
    // evaluation with a type that does not admit their value.
    let with_empty = Expression::literal(Value::Array(vec![Value::from("a"), Value::Empty]));
    let mapped = registry()
        .map("stringEquals", with_empty, vec!["a".into()])
        .unwrap();
    let err = check_expression(&mapped, &mut types).unwrap_err();
    assert!(err.to_string().contains("selectSet"), "{}", err);

    let mixed = Expression::literal(Value::Array(vec![Value::from("a"), Value::Boolean(true)]));
    assert!(check_expression(&mixed, &mut types).is_err());
}

#[test]
fn select_set_keeps_order_and_drops_empties() {
    let mut values = Scope::new();
    values.insert(
        "List",
        Value::Array(vec![
            Value::Empty,
            Value::from("a"),
            Value::Empty,
            Value::from("b"),
            Value::from("a"),
        ]),
    );
    let filtered = eval_expr(&call("selectSet", vec![reference("List")]), &values).unwrap();
    assert_eq!(filtered, strings(&["a", "b", "a"]));
}

#[test]
fn substring_length_matches_requested_range() {
    let word = "abcdefghij";
    for start in 0..10i64 {
        for stop in (start + 1)..=10 {
            for reverse in [false, true] {
                let expr = call(
                    "substring",
                    vec![word.into(), start.into(), stop.into(), reverse.into()],
                );
                let value = eval_expr(&expr, &Scope::new()).unwrap();
                let Value::String(s) = value else {
                    panic!("substring({}, {}, {}) was empty", start, stop, reverse);
                };
                assert_eq!(s.len() as i64, stop - start);
            }
        }
    }
}
