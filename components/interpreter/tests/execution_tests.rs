//! End-to-end execution tests.
//!
//! Each test feeds source through a fresh VM with captured output and
//! checks what `print` produced, or how the run failed.

use std::io::Write;
use std::sync::{Arc, Mutex};

use interpreter::{InterpretError, Vm, VmOptions};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn run(source: &str) -> (Result<(), InterpretError>, String, String) {
    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();
    let mut vm = Vm::new(VmOptions {
        stdout: Box::new(stdout.clone()),
        stderr: Box::new(stderr.clone()),
    });
    let result = vm.interpret(source);
    (result, stdout.contents(), stderr.contents())
}

fn run_ok(source: &str) -> String {
    let (result, stdout, stderr) = run(source);
    assert!(result.is_ok(), "expected success, stderr: {}", stderr);
    stdout
}

fn run_runtime_error(source: &str) -> (String, String) {
    let (result, stdout, stderr) = run(source);
    match result {
        Err(InterpretError::Runtime(error)) => (error.message, stderr),
        other => panic!("expected a runtime error, got {:?} (stdout: {})", other.err(), stdout),
    }
}

// ---- Success scenarios -------------------------------------------------

#[test]
fn test_arithmetic_and_print() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn test_string_concatenation() {
    assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
}

#[test]
fn test_closure_capture_across_return() {
    let source = "\
fun makeCounter() { var i = 0; fun inc() { i = i + 1; print i; } return inc; }
var c = makeCounter(); c(); c(); c();
";
    assert_eq!(run_ok(source), "1\n2\n3\n");
}

#[test]
fn test_class_method_and_this() {
    let source = "\
class Greeter { greet(name) { print \"hi \" + name; } }
Greeter().greet(\"world\");
";
    assert_eq!(run_ok(source), "hi world\n");
}

#[test]
fn test_inheritance_and_super() {
    let source = "\
class A { m() { print \"A\"; } }
class B < A { m() { super.m(); print \"B\"; } }
B().m();
";
    assert_eq!(run_ok(source), "A\nB\n");
}

#[test]
fn test_fibonacci_recursion() {
    let source = "\
fun fib(n){ if (n < 2) return n; return fib(n-1) + fib(n-2); }
print fib(10);
";
    assert_eq!(run_ok(source), "55\n");
}

#[test]
fn test_control_flow() {
    assert_eq!(run_ok("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
    assert_eq!(
        run_ok("var total = 0; var n = 4; while (n > 0) { total = total + n; n = n - 1; } print total;"),
        "10\n"
    );
    assert_eq!(run_ok("if (1 < 2) print \"yes\"; else print \"no\";"), "yes\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    assert_eq!(run_ok("print nil and 1;"), "nil\n");
    assert_eq!(run_ok("print 1 and 2;"), "2\n");
    assert_eq!(run_ok("print 1 or 2;"), "1\n");
    assert_eq!(run_ok("print false or \"fallback\";"), "fallback\n");
}

#[test]
fn test_truthiness() {
    assert_eq!(run_ok("print !nil;"), "true\n");
    assert_eq!(run_ok("print !false;"), "true\n");
    assert_eq!(run_ok("print !0;"), "false\n");
    assert_eq!(run_ok("print !\"\";"), "false\n");
}

#[test]
fn test_equality_semantics() {
    assert_eq!(run_ok("print 1 == 1;"), "true\n");
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print nil == false;"), "false\n");
    assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
    // Interned strings compare equal by reference.
    assert_eq!(run_ok("print \"a\" + \"b\" == \"ab\";"), "true\n");
}

#[test]
fn test_closure_identity() {
    assert_eq!(run_ok("fun f() {} var g = f; print g == f;"), "true\n");
}

#[test]
fn test_number_formatting() {
    assert_eq!(run_ok("print 2.5;"), "2.5\n");
    assert_eq!(run_ok("print 4 / 2;"), "2\n");
    assert_eq!(run_ok("print -0.125;"), "-0.125\n");
}

#[test]
fn test_globals_persist_across_interpret_calls() {
    let stdout = SharedBuffer::default();
    let mut vm = Vm::new(VmOptions {
        stdout: Box::new(stdout.clone()),
        stderr: Box::new(SharedBuffer::default()),
    });
    vm.interpret("var x = 41;").unwrap();
    vm.interpret("x = x + 1;").unwrap();
    vm.interpret("print x;").unwrap();
    assert_eq!(stdout.contents(), "42\n");
}

#[test]
fn test_initializer_returns_receiver() {
    let source = "\
class Point { init(x) { this.x = x; } }
var p = Point(7);
print p.x;
print Point(3).x;
";
    assert_eq!(run_ok(source), "7\n3\n");
}

#[test]
fn test_fields_shadow_methods() {
    let source = "\
class Box { m() { print \"method\"; } }
var b = Box();
fun shadow() { print \"field\"; }
b.m = shadow;
b.m();
";
    assert_eq!(run_ok(source), "field\n");
}

#[test]
fn test_bound_method_remembers_receiver() {
    let source = "\
class Speaker { init(word) { this.word = word; } say() { print this.word; } }
var say = Speaker(\"bound\").say;
say();
";
    assert_eq!(run_ok(source), "bound\n");
}

#[test]
fn test_upvalues_shared_between_closures() {
    let source = "\
fun pair() {
    var shared = 0;
    fun bump() { shared = shared + 1; }
    fun read() { print shared; }
    bump(); bump(); read();
}
pair();
";
    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn test_upvalue_closed_at_scope_end() {
    let source = "\
var f;
{
    var x = 10;
    fun g() { print x; }
    f = g;
}
f();
";
    assert_eq!(run_ok(source), "10\n");
}

#[test]
fn test_clock_native() {
    assert_eq!(run_ok("print clock() >= 0;"), "true\n");
}

#[test]
fn test_gc_survives_heavy_allocation() {
    // Enough churn to cross the first collection threshold several
    // times; correctness afterwards shows reachable strings survived.
    let source = "\
var s = \"x\";
for (var i = 0; i < 21; i = i + 1) { s = s + s; }
print s == s;
print \"done\";
";
    assert_eq!(run_ok(source), "true\ndone\n");
}

// ---- Failure scenarios -------------------------------------------------

#[test]
fn test_undefined_variable() {
    let (message, stderr) = run_runtime_error("print x;");
    assert_eq!(message, "Undefined variable 'x'.");
    assert!(stderr.contains("Runtime Error: Undefined variable 'x'."));
    assert!(stderr.contains("[line 1] in script"));
}

#[test]
fn test_assign_to_undefined_global() {
    let (message, _) = run_runtime_error("y = 5;");
    assert_eq!(message, "Undefined variable 'y'.");
}

#[test]
fn test_add_type_mismatch() {
    let (message, _) = run_runtime_error("\"a\" + 1;");
    assert_eq!(message, "Operands must be two numbers or two strings.");
}

#[test]
fn test_comparison_type_mismatch() {
    let (message, _) = run_runtime_error("1 < \"2\";");
    assert_eq!(message, "Operands must be numbers.");
}

#[test]
fn test_negate_type_mismatch() {
    let (message, _) = run_runtime_error("-\"x\";");
    assert_eq!(message, "Operand must be a number.");
}

#[test]
fn test_stack_overflow() {
    let (message, stderr) = run_runtime_error("fun f() { f(); } f();");
    assert_eq!(message, "Stack overflow.");
    assert!(stderr.contains("in f()"));
}

#[test]
fn test_arity_mismatch() {
    let (message, _) = run_runtime_error("fun f(a) {} f();");
    assert_eq!(message, "Expected 1 arguments but got 0.");
    let (message, _) = run_runtime_error("class C {} C(1);");
    assert_eq!(message, "Expected 0 arguments but got 1.");
}

#[test]
fn test_call_non_callable() {
    let (message, _) = run_runtime_error("var x = 1; x();");
    assert_eq!(message, "Can only call functions and classes.");
}

#[test]
fn test_property_on_non_instance() {
    let (message, _) = run_runtime_error("var x = 1; print x.y;");
    assert_eq!(message, "Only instances have properties.");
    let (message, _) = run_runtime_error("var x = 1; x.y = 2;");
    assert_eq!(message, "Only instances have fields.");
}

#[test]
fn test_method_on_non_instance() {
    let (message, _) = run_runtime_error("var x = 1; x.m();");
    assert_eq!(message, "Only instances have methods.");
}

#[test]
fn test_undefined_property() {
    let (message, _) = run_runtime_error("class A {} A().missing();");
    assert_eq!(message, "Undefined property 'missing'.");
}

#[test]
fn test_inherit_from_non_class() {
    let (message, _) = run_runtime_error("var x = 1; class A < x {}");
    assert_eq!(message, "Superclass must be a class.");
}

#[test]
fn test_backtrace_walks_frames_innermost_first() {
    let source = "\
fun inner() { return missing; }
fun outer() { return inner(); }
outer();
";
    let (_, stderr) = run_runtime_error(source);
    let inner_at = stderr.find("in inner()").expect("inner frame");
    let outer_at = stderr.find("in outer()").expect("outer frame");
    let script_at = stderr.find("in script").expect("script frame");
    assert!(inner_at < outer_at && outer_at < script_at);
}

#[test]
fn test_stack_is_reset_after_runtime_error() {
    let stdout = SharedBuffer::default();
    let mut vm = Vm::new(VmOptions {
        stdout: Box::new(stdout.clone()),
        stderr: Box::new(SharedBuffer::default()),
    });
    assert!(vm.interpret("print missing;").is_err());
    // The VM is reusable after a failure.
    vm.interpret("print \"recovered\";").unwrap();
    assert_eq!(stdout.contents(), "recovered\n");
}

#[test]
fn test_compile_error_is_not_a_runtime_error() {
    let (result, _, _) = run("print ;");
    match result {
        Err(InterpretError::Compile(diagnostics)) => {
            assert!(!diagnostics.is_empty());
        }
        other => panic!("expected a compile error, got {:?}", other.err()),
    }
}
