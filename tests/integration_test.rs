use std::{cell::RefCell, rc::Rc};

use es::{
    host::{Host, HostLibrary, RunContext},
    interpreter::Interpreter,
    Config, Error, ErrorKind, InitError, Value,
};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn capturing_host() -> (Host, Rc<RefCell<Vec<String>>>) {
    let output = Rc::new(RefCell::new(Vec::new()));
    let sink = output.clone();
    let host = Host::default()
        .with_log(move |line| sink.borrow_mut().push(line.to_string()))
        .with_prompt(|_| None);
    (host, output)
}

/// Runs `source` as if it were the file `file_name` and returns the rendered
/// result with everything the script printed.
fn run_as(file_name: &str, source: &str, config: Config) -> (Result<String, Error>, Vec<String>) {
    let (host, output) = capturing_host();
    let mut interpreter = Interpreter::init(host, config).expect("init should work");
    let result = interpreter
        .run(source, &RunContext::new(file_name))
        .and_then(|value| interpreter.stringify(&value));
    let output = output.take();
    (result, output)
}

fn test_valid_program(source: &str, expected_output: &[&str]) {
    let (result, output) = run_as("test.es", source, Config::default());
    if let Err(err) = result {
        panic!("Program should run, got:\n{err}");
    }
    assert_eq!(output, expected_output);
}

fn eval(source: &str) -> String {
    let (result, _) = run_as("test.es", source, Config::default());
    result.unwrap_or_else(|err| panic!("Program should run, got:\n{err}"))
}

fn eval_error(source: &str) -> Error {
    let (result, _) = run_as("test.es", source, Config::default());
    match result {
        Ok(value) => panic!("Program should fail, got {value}"),
        Err(err) => err,
    }
}

fn run_fixture(name: &str) -> (Result<String, Error>, Vec<String>) {
    let path = fixture(name);
    let source = std::fs::read_to_string(&path).expect("fixture should exist");
    run_as(&path, &source, Config::default())
}

#[test]
fn test_vector_class() {
    let source = r#"
    let v2 = class {
        init(x: number, y: number) {
            this.x = x;
            this.y = y;
        }

        add(v) {
            this.x += v.x;
            this.y += v.y;
            return this;
        }

        str(): string {
            return this.x.str() + ', ' + this.y.str();
        }

        clone() {
            return v2(this.x, this.y);
        }
    };

    var pos = v2(0, 0);
    print(v2);
    pos.add(v2(3, 4));
    print(pos.str());
    print(pos.clone() == pos);
    let moved = pos.clone().add(v2(1, 1));
    print(pos, moved);
    "#;
    test_valid_program(source, &["<Type: v2>", "3, 4", "false", "3, 4 4, 5"]);
}

#[test]
fn test_fib() {
    let source = r#"
    func fib(n: number): number {
        if n <= 1 {
            return n;
        }
        return fib(n - 1) + fib(n - 2);
    }

    for i in range(10) {
        print(fib(i));
    }
    "#;
    test_valid_program(
        source,
        &["0", "1", "1", "2", "3", "5", "8", "13", "21", "34"],
    );
}

#[test]
fn test_closure() {
    let source = r#"
    func makeCounter() {
        let i = 0;
        return func () {
            i += 1;
            return i;
        };
    }

    const counter = makeCounter();
    const other = makeCounter();
    counter();
    counter();
    print(counter(), other());
    "#;
    test_valid_program(source, &["3 1"]);
}

#[test]
fn test_closure_survives_block() {
    let source = r#"
    let show = nil;
    if true {
        let message = 'inside';
        show = func () message;
    }
    print(show());
    "#;
    test_valid_program(source, &["inside"]);
}

#[test]
fn test_classes_and_this() {
    let source = r#"
    class Counter {
        init() {
            this.count = 0;
        }

        increment() {
            this.count += 1;
            return this.count;
        }
    }

    const counter = Counter();
    counter.increment();
    const bound = counter.increment;
    print(bound());
    print(counter);
    print(counter.str());
    "#;
    test_valid_program(
        source,
        &["2", "<instance of Counter>", "<instance of Counter>"],
    );
}

#[test]
fn test_class_without_init_rejects_arguments() {
    let err = eval_error("class Empty {}\nEmpty(1);");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.position().line, 2);
}

#[test]
fn test_annotations() {
    assert_eq!(eval("let a: number = 10; a;"), "10");
    assert_eq!(eval("let a: string | nil = nil; a = 'x'; a;"), "x");
    assert_eq!(eval("func f(x: number) { return x; } f(10);"), "10");
    assert_eq!(eval("func f(): string | nil {} f();"), "nil");

    let err = eval_error("const a: number = 'hi';");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "Expected type 'number' but got 'String'");

    let err = eval_error("func f(x: number) { return x; }\nf([10]);");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.position().line, 2);

    let err = eval_error("func g(): string { return 1; } g();");
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_class_annotations() {
    let source = r#"
    class Point {
        init(x) {
            this.x = x;
        }
    }
    class Other {}

    func getX(p: Point): number {
        return p.x;
    }
    "#;
    assert_eq!(eval(&format!("{source}\ngetX(Point(3));")), "3");
    assert_eq!(
        eval_error(&format!("{source}\ngetX(Other());")).message(),
        "Expected type 'Point' but got 'Other'"
    );
    assert_eq!(eval(&format!("{source}\ntypeof(Point(1)) == Point;")), "true");
    assert_eq!(eval(&format!("{source}\ntypeof(Point(1)) == Other;")), "false");
}

#[test]
fn test_unresolvable_annotations() {
    assert_eq!(eval_error("let a: Missing = 1;").kind(), ErrorKind::Name);
    let err = eval_error("let n = 1; let a: n = 1;");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "'n' is not a type");
}

#[test]
fn test_concatenator() {
    let source = r#"
    class Concatenator {
        init(separator: string) {
            this.separator = separator;
            this.parts = [];
        }

        add(part: string) {
            this.parts.add(part);
            return this;
        }

        str(): string {
            return this.parts.join(this.separator);
        }
    }

    let words = Concatenator(', ');
    words + 'a' + 'b';
    print(words);
    words.add(1);
    "#;
    let (result, output) = run_as("test.es", source, Config::default());
    assert_eq!(output, ["a, b"]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn test_operator_overloading() {
    let source = r#"
    class Money {
        init(cents) {
            this.cents = cents;
        }
        add(other) {
            return Money(this.cents + other.cents);
        }
        eq(other) {
            return this.cents == other.cents;
        }
        lt(other) {
            return this.cents < other.cents;
        }
        negate() {
            return Money(-this.cents);
        }
        str() {
            return '$' + (this.cents / 100).str();
        }
    }

    let total = Money(150) + Money(250);
    print(total);
    print(total == Money(400), total != Money(400), Money(1) < Money(2));
    print(-total);
    "#;
    test_valid_program(source, &["$4", "true false true", "$-4"]);
}

#[test]
fn test_operators_without_methods() {
    assert_eq!(eval("class A {} A() == A();"), "false");
    assert_eq!(eval("class A {} const a = A(); a == a;"), "true");
    assert_eq!(eval_error("class A {} A() * 2;").kind(), ErrorKind::Type);
    assert_eq!(eval_error("1 - 'a';").kind(), ErrorKind::Type);
}

#[test]
fn test_builtin_operators() {
    assert_eq!(eval("'n=' + 1;"), "n=1");
    assert_eq!(eval("[1] + [2, 'x'];"), "[1, 2, 'x']");
    assert_eq!(eval("2 ** 3 ** 2;"), "512");
    assert_eq!(eval("7 % 3;"), "1");
    assert_eq!(eval("1 / 0;"), "Infinity");
    assert_eq!(eval("'a' < 'b';"), "true");
    assert_eq!(eval("nil ?? 'default';"), "default");
    assert_eq!(eval("0 ?? 'default';"), "0");
    assert_eq!(eval("0 || 'x';"), "true");
    assert_eq!(eval("1 && '';"), "false");
    assert_eq!(eval("!nil;"), "true");
    assert_eq!(eval("0.1 + 0.2;"), "0.30000000000000004");
}

#[test]
fn test_stringify() {
    assert_eq!(
        eval("str([1, 'a', nil, true, {b: 2, a: 1}]);"),
        "[1, 'a', nil, true, {a: 1, b: 2}]"
    );
    assert_eq!(eval("func named() {} str(named);"), "<Func: named>");
    assert_eq!(eval("const f = func () 1; str(f);"), "<Func: f>");
    assert_eq!(eval("str(number);"), "<Type: number>");
    assert_eq!(eval("str(print);"), "<Func: print>");
    assert_eq!(eval("let a = [1]; a.add(a); str(a);"), "[1, [...]]");
}

#[test]
fn test_str_must_return_string() {
    let err = eval_error("class Bad { str() { return 1; } } print(Bad());");
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_control_flow() {
    let source = r#"
    let total = 0;
    for i in range(10) {
        if i % 2 == 0 {
            continue;
        }
        if i > 7 {
            break;
        }
        total += i;
    }
    print(total);

    let n = 0;
    while true {
        n += 1;
        if n == 3 { break; }
    }
    print(n);

    for key in {b: 1, a: 2} {
        print(key);
    }
    for c in 'hi' {
        print(c);
    }

    if false {
        print('no');
    } else if nil {
        print('no');
    } else {
        print('else');
    }
    "#;
    test_valid_program(source, &["16", "3", "a", "b", "h", "i", "else"]);
}

#[test]
fn test_var_hoists_to_function() {
    assert_eq!(
        eval("func f() { if true { var x = 1; } return x; } f();"),
        "1"
    );
    assert_eq!(eval_error("if true { let y = 1; } y;").kind(), ErrorKind::Name);
}

#[test]
fn test_constants_and_names() {
    let err = eval_error("const c = 1;\nc = 2;");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.position().line, 2);

    let err = eval_error("missing;");
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(err.message(), "'missing' is not defined");
    assert_eq!(err.to_string(), "NameError: 'missing' is not defined\n    at test.es:1:1");

    assert_eq!(eval_error("print = 1;").kind(), ErrorKind::Type);
}

#[test]
fn test_arrays_strings_and_objects() {
    assert_eq!(eval("let a = [1, 2, 3]; a[-1];"), "3");
    assert_eq!(eval("let a = [1, 2, 3]; a[5];"), "nil");
    assert_eq!(eval("let a = [1, 2, 3]; a[3] = 4; a.len();"), "4");
    assert_eq!(eval("let a = [1, 2]; a.add(3); a.pop() + a.len();"), "5");
    assert_eq!(eval("[1, 'x'].contains('x');"), "true");
    assert_eq!(eval("'abc'[1];"), "b");
    assert_eq!(eval("'a,b'.split(',');"), "['a', 'b']");
    assert_eq!(eval("'Hi'.upper() + 'Hi'.lower();"), "HIhi");
    assert_eq!(eval("len('héllo');"), "5");
    assert_eq!(eval("let o = {a: 1}; o['b'] = 2; o.b + o['a'];"), "3");
    assert_eq!(eval("let o = {a: 1}; o['missing'];"), "nil");
    assert_eq!(eval("let o = {a: [1]}; let c = o.clone(); c.a.add(2); o.a;"), "[1, 2]");
    assert_eq!(eval_error("let a = [1]; a[1.5];").kind(), ErrorKind::Type);
    assert_eq!(eval_error("let o = {a: 1}; o.missing;").kind(), ErrorKind::Type);
}

#[test]
fn test_casts_and_typeof() {
    assert_eq!(eval("number('42') + 1;"), "43");
    assert_eq!(eval("number('nope');"), "NaN");
    assert_eq!(eval("string(12) + 'a';"), "12a");
    assert_eq!(eval("boolean('');"), "false");
    assert_eq!(eval("typeof(1) == number;"), "true");
    assert_eq!(eval("typeof('a');"), "<Type: string>");
    assert_eq!(eval("number.name;"), "number");
}

#[test]
fn test_import_namespace() {
    let (result, _) = run_fixture("importer.es");
    assert_eq!(result.unwrap(), "hello world");

    let source = r#"
    const lib = import('./lib/main.es');
    for symbol in lib {
        print(symbol, symbol.name);
    }
    print(lib);
    "#;
    let (result, output) = run_as(&fixture("importer.es"), source, Config::default());
    result.unwrap();
    assert_eq!(
        output,
        [
            "<Symbol: otherLib> otherLib",
            "<Symbol: doThing> doThing",
            "<Namespace main: otherLib, doThing>",
        ]
    );
}

#[test]
fn test_missing_import() {
    let err = eval_error("import('./this/path/does/not/exist.es');");
    assert_eq!(err.kind(), ErrorKind::Import);
    assert!(err.message().contains("exist.es"));

    assert_eq!(eval_error("import(1);").kind(), ErrorKind::Type);
}

#[test]
fn test_module_runs_once() {
    let source = r#"
    const a = import('./counter.es');
    const b = import('./counter.es');
    a.next();
    print(a == b);
    b.next();
    "#;
    let (result, output) = run_as(&fixture("importer.es"), source, Config::default());
    assert_eq!(result.unwrap(), "2");
    assert_eq!(output, ["loading counter", "true"]);

    let source = "const counter = import('./counter.es'); counter.count;";
    let (result, _) = run_as(&fixture("importer.es"), source, Config::default());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(err.message(), "'count' is not exported by 'counter'");
}

#[test]
fn test_import_cycle() {
    let (result, _) = run_fixture("cycle_a.es");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Import);
    assert!(err.message().starts_with("Circular import"));
    assert!(err.position().file_name.ends_with("cycle_b.es"));
}

#[test]
fn test_error_in_imported_file_keeps_position() {
    let source = "\nimport('./broken.es');";
    let (result, _) = run_as(&fixture("importer.es"), source, Config::default());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
    assert!(err.position().file_name.ends_with("broken.es"));
    assert_eq!(err.position().line, 2);
    assert_eq!(err.position().column, 9);
}

#[test]
fn test_call_depth_limit() {
    let config = Config { max_call_depth: 50 };
    let (result, _) = run_as("test.es", "func f(n) { return f(n + 1); } f(0);", config);
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "Maximum call depth exceeded");

    let config = Config { max_call_depth: 50 };
    let (result, _) = run_as(
        "test.es",
        "func down(n) { if n == 0 { return 0; } return down(n - 1); } down(40);",
        config,
    );
    assert_eq!(result.unwrap(), "0");
}

#[test]
fn test_host_library() {
    let math = HostLibrary::new("math")
        .function("max", Some(2), |args| match args {
            [Value::Number(a), Value::Number(b)] => Ok(Value::Number(a.max(*b))),
            _ => Err("max expects numbers".to_string()),
        })
        .constant("pi", 3.0);
    let (host, _) = capturing_host();
    let mut interpreter =
        Interpreter::init(host.with_library(math), Config::default()).expect("init should work");
    let context = RunContext::new("test.es");

    let value = interpreter.run("math.max(1, math.pi);", &context).unwrap();
    assert_eq!(interpreter.stringify(&value).unwrap(), "3");

    let err = interpreter.run("math.max('a', 1);", &context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "max expects numbers");

    let err = interpreter.run("math.max(1);", &context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_host_library_names() {
    let (host, _) = capturing_host();
    let err = Interpreter::init(host.with_library(HostLibrary::new("bad name")), Config::default())
        .unwrap_err();
    assert_eq!(err, InitError::InvalidName("bad name".to_string()));

    let (host, _) = capturing_host();
    let err = Interpreter::init(host.with_library(HostLibrary::new("print")), Config::default())
        .unwrap_err();
    assert_eq!(err, InitError::DuplicateBinding("print".to_string()));
}

#[test]
fn test_input() {
    let answers = RefCell::new(vec!["Ada".to_string()]);
    let prompts = Rc::new(RefCell::new(Vec::new()));
    let seen = prompts.clone();
    let host = Host::default()
        .with_log(|_| {})
        .with_prompt(move |prompt| {
            seen.borrow_mut().push(prompt.to_string());
            answers.borrow_mut().pop()
        });
    let mut interpreter = Interpreter::init(host, Config::default()).unwrap();
    let value = interpreter
        .run(
            "let name = input('name? '); [name, input('again? ')];",
            &RunContext::new("test.es"),
        )
        .unwrap();
    assert_eq!(interpreter.stringify(&value).unwrap(), "['Ada', nil]");
    assert_eq!(*prompts.borrow(), ["name? ", "again? "]);
}

#[test]
fn test_lex_and_syntax_errors() {
    let err = eval_error("let a = 1 @ 2;");
    assert_eq!(err.kind(), ErrorKind::IllegalCharacter);
    assert_eq!(err.to_string(), "IllegalCharacterError: '@'\n    at test.es:1:11");

    let err = eval_error("let = 1;");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.to_string().starts_with("SyntaxError: "));

    assert_eq!(eval_error("return 1;").kind(), ErrorKind::Syntax);
    assert_eq!(eval_error("break;").kind(), ErrorKind::Syntax);
}

#[test]
fn test_session_keeps_bindings() {
    let (host, output) = capturing_host();
    let mut interpreter = Interpreter::init(host, Config::default()).unwrap();
    let context = RunContext::new("<repl>");
    interpreter.run_session("let a = 1;", &context).unwrap();
    interpreter
        .run_session("func double(x) x * 2;", &context)
        .unwrap();
    let value = interpreter.run_session("double(a + 1);", &context).unwrap();
    assert_eq!(interpreter.stringify(&value).unwrap(), "4");

    interpreter.run("let a = 'fresh'; print(a);", &context).unwrap();
    let value = interpreter.run_session("a;", &context).unwrap();
    assert_eq!(interpreter.stringify(&value).unwrap(), "1");
    assert_eq!(*output.borrow(), ["fresh"]);
}

#[test]
fn test_default_call_depth_on_spawned_thread() {
    let max_call_depth = Config::default().max_call_depth;
    let recurse = |n: usize| {
        format!("func f(n) {{ if n == 0 {{ return 0; }} return 1 + f(n - 1); }} f({n});")
    };
    let deepest = recurse(max_call_depth - 1);
    let too_deep = recurse(max_call_depth);

    let handle = std::thread::spawn(move || {
        let (deepest, _) = run_as("test.es", &deepest, Config::default());
        let (too_deep, _) = run_as("test.es", &too_deep, Config::default());
        (
            deepest.map_err(|err| err.to_string()),
            too_deep.map_err(|err| (err.kind(), err.message())),
        )
    });
    let (deepest, too_deep) = handle.join().expect("interpreter thread should not overflow");

    assert_eq!(deepest, Ok((max_call_depth - 1).to_string()));
    assert_eq!(
        too_deep,
        Err((ErrorKind::Type, "Maximum call depth exceeded".to_string()))
    );
}

#[test]
fn test_deep_nesting_on_spawned_thread() {
    let handle = std::thread::spawn(|| {
        let nested = format!("{}1{};", "(".repeat(200), ")".repeat(200));
        let (shallow, _) = run_as("test.es", &nested, Config::default());
        let nested = format!("{}1{};", "(".repeat(5000), ")".repeat(5000));
        let (deep, _) = run_as("test.es", &nested, Config::default());
        (
            shallow.map_err(|err| err.to_string()),
            deep.map_err(|err| err.kind()),
        )
    });
    let (shallow, deep) = handle.join().expect("parser thread should not overflow");
    assert_eq!(shallow, Ok("1".to_string()));
    assert_eq!(deep, Err(ErrorKind::Syntax));
}

#[test]
fn test_range_steps_and_bounds() {
    assert_eq!(eval("range(0, 10, 3);"), "[0, 3, 6, 9]");
    assert_eq!(eval("range(5, 0, -2);"), "[5, 3, 1]");
    assert_eq!(eval("range(2, 5);"), "[2, 3, 4]");
    assert_eq!(eval("range(3, 1);"), "[]");
    assert_eq!(eval("range(0, 1, 0.25);"), "[0, 0.25, 0.5, 0.75]");

    for source in [
        "range(-1/0, 0);",
        "range(1/0);",
        "range(0, 1, 0/0);",
        "range(0, 10, 0);",
        "range(1_000_000_000_000);",
        "range('a');",
    ] {
        let err = eval_error(source);
        assert_eq!(err.kind(), ErrorKind::Type, "{source}");
        assert!(err.message().starts_with("range: "), "{source}: {}", err.message());
    }
    assert_eq!(eval_error("range(1, 2, 3, 4);").kind(), ErrorKind::Type);
}

#[test]
fn test_large_numbers_use_exponents() {
    assert_eq!(eval("str(number('1e300'));"), "1e+300");
    assert_eq!(eval("number('1e21');"), "1e+21");
    assert_eq!(eval("number('-2.5e-8');"), "-2.5e-8");
    assert_eq!(eval("2 ** 53;"), "9007199254740992");
    assert_eq!(eval("[number('1e100')];"), "[1e+100]");
}

#[test]
fn test_destructuring() {
    let source = r#"
    let [a, b] = [1, 2, 3];
    const [first, second: string] = 'hi';
    var [x, y] = {y: 'why', x: 'ex', z: 0};
    let [missing] = {};
    print(a, b, first, second, x, y, missing);
    "#;
    test_valid_program(source, &["1 2 h i ex why nil"]);

    let err = eval_error("let [a, b, c] = [1, 2];");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(
        err.message(),
        "Not enough elements to destructure: expected 3, found 2"
    );
    assert_eq!(eval_error("let [a: string] = [1];").kind(), ErrorKind::Type);
    assert_eq!(eval_error("let [a] = 1;").kind(), ErrorKind::Type);
    assert_eq!(eval_error("const [c] = [1]; c = 2;").kind(), ErrorKind::Type);
}

#[test]
fn test_destructuring_imports() {
    let importer = fixture("importer.es");
    let source = "let [doThing] = import('./lib/main.es'); doThing;";
    let (result, _) = run_as(&importer, source, Config::default());
    assert_eq!(result.unwrap(), "<Func: doThing>");

    let source = "let [nothing] = import('./lib/main.es');";
    let (result, _) = run_as(&importer, source, Config::default());
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Name);
}

#[test]
fn test_namespaces() {
    let source = r#"
    namespace shapes {
        let sides = 4;
        func area(side: number): number {
            return side * side;
        }
        var kind = 'square';
    }
    print(shapes);
    print(shapes.area(shapes.sides), shapes.kind);

    const tools = namespace {
        const version = 2;
    };
    print(tools.version);
    for symbol in tools {
        print(symbol.name, symbol.value);
    }
    print(typeof(tools));
    "#;
    test_valid_program(
        source,
        &[
            "<Namespace shapes: sides, area, kind>",
            "16 square",
            "2",
            "version 2",
            "<Type: object>",
        ],
    );

    assert_eq!(eval_error("namespace n { let a = 1 } n.b;").kind(), ErrorKind::Name);
    assert_eq!(eval_error("namespace n { let a = 1 } a;").kind(), ErrorKind::Name);
}

#[test]
fn test_typed_class_properties() {
    let source = r#"
    class Account {
        owner: string;
        balance: number;
        note
        init(owner) {
            this.owner = owner;
            this.balance = 0;
        }
    }
    let account = Account('ada');
    print(account.note);
    account.note = 1;
    account.note = 'anything';
    account.balance += 10;
    account['balance'] = account.balance * 2;
    print(account.owner, account.balance);
    "#;
    test_valid_program(source, &["nil", "ada 20"]);

    let err = eval_error("class C { n: number } let c = C(); c.n = 'x';");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(err.message().starts_with("Expected type 'number'"), "{}", err.message());
    assert_eq!(
        eval_error("class C { n: number } let c = C(); c['n'] = nil;").kind(),
        ErrorKind::Type
    );
    assert_eq!(
        eval_error("class C { init(n) { this.n = n } n: number } C('x');").kind(),
        ErrorKind::Type
    );
}
