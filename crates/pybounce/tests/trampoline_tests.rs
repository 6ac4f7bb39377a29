use std::collections::HashMap;

use pybounce::{ExecOutcome, Limits, PyValue, Trampoline};

// --- run: output capture ---

#[test]
fn test_run_returns_captured_output() {
    let mut py = Trampoline::default();

    assert_eq!(py.run("print('hello')"), "hello\n");
    assert_eq!(py.run("print('a', 1, [2, 3])"), "a 1 [2, 3]\n");
    assert_eq!(
        py.run("print('one')\nprint('two')"),
        "one\ntwo\n"
    );
}

#[test]
fn test_run_returns_empty_string_for_silent_commands() {
    let mut py = Trampoline::default();

    assert_eq!(py.run("x = 1"), "");
    assert_eq!(py.run("pass"), "");
    assert_eq!(py.run("2 + 2"), "");
}

#[test]
fn test_namespace_persists_across_runs() {
    let mut py = Trampoline::default();

    py.run("x = 1");
    assert_eq!(py.run("print(x)"), "1\n");
}

#[test]
fn test_partial_effects_survive_a_failing_command() {
    let mut py = Trampoline::default();

    let output = py.run("a = 10\nb = a + 1\nundefined_name");
    assert!(output.contains("NameError"));

    assert_eq!(py.run("print(a, b)"), "10 11\n");
}

#[test]
fn test_capture_is_restored_between_calls() {
    let mut py = Trampoline::default();

    // A failing call must not leak its redirect into the next one.
    py.run("1 / 0");
    assert_eq!(py.run("print('still works')"), "still works\n");
}

// --- run: failure diagnostics ---

#[test]
fn test_run_folds_exceptions_into_the_output() {
    let mut py = Trampoline::default();

    let output = py.run("1 / 0");
    assert!(output.contains("exception: division by zero"));
    assert!(output.contains("exception type: ZeroDivisionError"));
    assert!(output.contains("exception args: ('division by zero',)"));
    assert!(output.contains("format_exception():"));
    assert!(output.contains("Traceback (most recent call last):"));
    assert!(output.contains("ZeroDivisionError: division by zero"));
}

#[test]
fn test_run_diagnostic_includes_output_written_before_the_fault() {
    let mut py = Trampoline::default();

    let output = py.run("print('before')\n1 / 0");
    assert!(output.starts_with("before\n"));
    assert!(output.contains("ZeroDivisionError"));
}

#[test]
fn test_run_reports_syntax_errors_as_text() {
    let mut py = Trampoline::default();

    let output = py.run("def def def");
    assert!(output.contains("exception type: SyntaxError"));
}

// --- execute: discriminated results ---

#[test]
fn test_execute_success_has_no_payload() {
    let mut py = Trampoline::default();

    assert_eq!(py.execute("y = 2 + 2"), ExecOutcome::Success);
    assert!(py.execute("pass").is_success());
}

#[test]
fn test_execute_marshals_raised_exceptions() {
    let mut py = Trampoline::default();

    match py.execute("raise ValueError('bad input')") {
        ExecOutcome::Exception(record) => {
            assert_eq!(record.code.origin, "PYTHON");
            assert_eq!(record.code.exception, "ValueError");
            assert_eq!(record.code.message, "bad input");
            assert!(record.info.starts_with("\nfrom python code executed by pybounce\n"));
            assert_eq!(record.info, record.info.trim_end());
        }
        ExecOutcome::Success => panic!("expected an exception outcome"),
    }
}

#[test]
fn test_execute_traceback_names_the_failing_frames() {
    let mut py = Trampoline::default();

    match py.execute("def boom():\n    return 1 / 0\n\nboom()") {
        ExecOutcome::Exception(record) => {
            assert_eq!(record.code.exception, "ZeroDivisionError");
            assert!(record.info.contains("  File \"<string>\", line 4, in <module>"));
            assert!(record.info.contains("  File \"<string>\", line 2, in boom"));
            assert!(record.info.contains("    return 1 / 0"));
        }
        ExecOutcome::Success => panic!("expected an exception outcome"),
    }
}

#[test]
fn test_execute_mutates_the_same_namespaces_as_run() {
    let mut py = Trampoline::default();

    assert!(py.execute("counter = 5").is_success());
    assert_eq!(py.run("print(counter)"), "5\n");
}

#[test]
fn test_execute_does_not_capture_output() {
    let mut py = Trampoline::default();

    // print output goes to the real stream here, not a buffer; the next
    // run call must see an untouched capture.
    assert!(py.execute("x = 1").is_success());
    assert_eq!(py.run("print(x)"), "1\n");
}

// --- namespace pair ---

#[test]
fn test_constructor_globals_are_visible_to_code() {
    let globals = HashMap::from([("greeting".to_string(), PyValue::from("hi"))]);
    let mut py = Trampoline::new(globals, HashMap::new());

    assert_eq!(py.run("print(greeting)"), "hi\n");
}

#[test]
fn test_locals_shadow_globals() {
    let globals = HashMap::from([("who".to_string(), PyValue::from("global"))]);
    let locals = HashMap::from([("who".to_string(), PyValue::from("local"))]);
    let mut py = Trampoline::new(globals, locals);

    assert_eq!(py.run("print(who)"), "local\n");
    assert_eq!(py.get_variable("who"), Some(&PyValue::from("local")));
}

#[test]
fn test_set_and_get_variable() {
    let mut py = Trampoline::default();

    py.set_variable("n", 21);
    py.run("m = n * 2");
    assert_eq!(py.get_variable("m"), Some(&PyValue::Int(42)));
    assert_eq!(py.get_variable("missing"), None);
}

// --- functions and host callbacks ---

#[test]
fn test_definitions_persist_across_calls() {
    let mut py = Trampoline::default();

    py.run("def double(n):\n    return n * 2");
    assert_eq!(py.run("print(double(21))"), "42\n");
    assert!(py.execute("double(1)").is_success());
}

#[test]
fn test_function_defaults_and_recursion() {
    let mut py = Trampoline::default();

    py.run("def fact(n, acc=1):\n    if n <= 1:\n        return acc\n    return fact(n - 1, acc * n)");
    assert_eq!(py.run("print(fact(5))"), "120\n");
}

#[test]
fn test_registered_host_fn_is_callable() {
    let mut py = Trampoline::default();

    py.register_fn("tcl_eval", |args| {
        let script = args.first().and_then(|v| v.as_str()).unwrap_or("");
        PyValue::Str(format!("=> {}", script))
    });

    assert_eq!(py.run("print(tcl_eval('set x 1'))"), "=> set x 1\n");
}

// --- interpreter subset ---

#[test]
fn test_control_flow_and_loops() {
    let mut py = Trampoline::default();

    let output = py.run(
        "total = 0\nfor i in range(10):\n    if i == 3:\n        continue\n    if i == 6:\n        break\n    total += i\nprint(total)",
    );
    assert_eq!(output, "12\n");
}

#[test]
fn test_list_mutation_through_methods() {
    let mut py = Trampoline::default();

    py.run("nums = [1, 2]");
    py.run("nums.append(3)");
    assert_eq!(py.run("print(nums)"), "[1, 2, 3]\n");
}

#[test]
fn test_list_comprehensions() {
    let mut py = Trampoline::default();

    assert_eq!(
        py.run("print([i * i for i in range(4) if i != 2])"),
        "[0, 1, 9]\n"
    );
}

#[test]
fn test_dict_access_and_update() {
    let mut py = Trampoline::default();

    py.run("d = {'a': 1}");
    py.run("d['b'] = 2");
    assert_eq!(py.run("print(d['a'] + d['b'])"), "3\n");

    match py.execute("d['zzz']") {
        ExecOutcome::Exception(record) => {
            assert_eq!(record.code.exception, "KeyError");
            assert_eq!(record.code.message, "'zzz'");
        }
        ExecOutcome::Success => panic!("expected an exception outcome"),
    }
}

#[test]
fn test_sum_counts_booleans() {
    let mut py = Trampoline::default();

    assert_eq!(py.run("print(sum([True, True, 1]))"), "3\n");
    assert_eq!(py.run("print(sum([False, 2.5]))"), "2.5\n");
}

#[test]
fn test_integer_overflow_is_reported_not_fatal() {
    let mut py = Trampoline::default();

    let output = py.run("9223372036854775807 + 1");
    assert!(output.contains("exception type: OverflowError"));

    let output = py.run("9223372036854775807 * 2");
    assert!(output.contains("OverflowError"));

    let output = py.run("-(-9223372036854775807 - 1)");
    assert!(output.contains("OverflowError"));

    let output = py.run("sum([9223372036854775807, 1])");
    assert!(output.contains("OverflowError"));

    // The trampoline stays usable afterwards.
    assert_eq!(py.run("print(1 + 1)"), "2\n");
}

#[test]
fn test_overflow_is_catchable_in_executed_code() {
    let mut py = Trampoline::default();

    let output = py.run(
        "try:\n    9223372036854775807 + 1\nexcept OverflowError:\n    print('caught')",
    );
    assert_eq!(output, "caught\n");
}

#[test]
fn test_unsupported_constructs_fail_descriptively() {
    let mut py = Trampoline::default();

    let output = py.run("import os");
    assert!(output.contains("imports"));

    let output = py.run("class C:\n    pass");
    assert!(output.contains("class definitions"));
}

// --- exceptions inside executed code ---

#[test]
fn test_try_except_catches_and_binds_the_message() {
    let mut py = Trampoline::default();

    let output = py.run(
        "try:\n    1 / 0\nexcept ZeroDivisionError as e:\n    print('caught', e)",
    );
    assert_eq!(output, "caught division by zero\n");
}

#[test]
fn test_except_tuple_and_exception_root_match() {
    let mut py = Trampoline::default();

    let output = py.run(
        "try:\n    raise ValueError('nope')\nexcept (TypeError, ValueError):\n    print('ok')",
    );
    assert_eq!(output, "ok\n");

    let output = py.run("try:\n    undefined\nexcept Exception:\n    print('any')");
    assert_eq!(output, "any\n");
}

#[test]
fn test_non_matching_handler_propagates() {
    let mut py = Trampoline::default();

    let output = py.run("try:\n    1 / 0\nexcept TypeError:\n    print('wrong')");
    assert!(!output.contains("wrong"));
    assert!(output.contains("ZeroDivisionError"));
}

#[test]
fn test_raised_types_without_error_suffix_are_catchable() {
    let mut py = Trampoline::default();

    match py.execute("raise StopIteration('done')") {
        ExecOutcome::Exception(record) => {
            assert_eq!(record.code.exception, "StopIteration");
            assert_eq!(record.code.message, "done");
        }
        ExecOutcome::Success => panic!("expected an exception outcome"),
    }

    let output = py.run(
        "try:\n    raise StopIteration('done')\nexcept StopIteration:\n    print('stopped')",
    );
    assert_eq!(output, "stopped\n");
}

#[test]
fn test_raised_custom_types_round_trip() {
    let mut py = Trampoline::default();

    match py.execute("raise CustomWidgetError('widget 7 missing')") {
        ExecOutcome::Exception(record) => {
            assert_eq!(record.code.exception, "CustomWidgetError");
            assert_eq!(record.code.message, "widget 7 missing");
        }
        ExecOutcome::Success => panic!("expected an exception outcome"),
    }
}

// --- resource limits ---

#[test]
fn test_instruction_limit_stops_infinite_loops() {
    let mut py = Trampoline::with_limits(
        HashMap::new(),
        HashMap::new(),
        Limits {
            max_instructions: Some(1_000),
            max_recursion_depth: Some(50),
        },
    );

    let output = py.run("while True:\n    pass");
    assert!(output.contains("InstructionLimitExceeded"));
}

#[test]
fn test_limit_errors_are_not_catchable_in_executed_code() {
    let mut py = Trampoline::with_limits(
        HashMap::new(),
        HashMap::new(),
        Limits {
            max_instructions: Some(1_000),
            max_recursion_depth: Some(50),
        },
    );

    let output = py.run(
        "try:\n    while True:\n        pass\nexcept Exception:\n    print('caught')",
    );
    assert!(!output.contains("caught"));
    assert!(output.contains("InstructionLimitExceeded"));
}

#[test]
fn test_recursion_limit_surfaces_as_a_record() {
    let mut py = Trampoline::default();

    py.run("def f():\n    return f()");
    match py.execute("f()") {
        ExecOutcome::Exception(record) => {
            assert_eq!(record.code.exception, "RecursionLimitExceeded");
        }
        ExecOutcome::Success => panic!("expected an exception outcome"),
    }
}
