use kiln_host::{Console, dump};
use std::path::PathBuf;
use vm::{Fault, FaultKind, State, Vm};

fn program_path(name: &str) -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .expect("CARGO_MANIFEST_DIR not set");
    PathBuf::from(manifest_dir)
        .parent()
        .expect("missing parent directory")
        .join(format!("programs/{name}.kiln"))
}

/// Loads and runs a program, returning the VM, result, and console text
fn run(name: &str) -> (Vm, Result<State, Fault>, String) {
    let prog =
        kiln_host::load(program_path(name)).expect("could not load program");
    let mut vm = Vm::new(prog);
    let mut console = Console::new();
    let r = vm.run(&mut console);
    let text = console.output().text().into_owned();
    (vm, r, text)
}

#[test]
fn branch() {
    let (vm, r, text) = run("branch");
    assert_eq!(r, Ok(State::Halted));
    assert_eq!(text, "1\nFlow execution finished\n");
    assert_eq!(vm.ip(), 12);
}

#[test]
fn countdown() {
    let (vm, r, text) = run("countdown");
    assert_eq!(r, Ok(State::Halted));
    assert_eq!(
        text,
        "3 - 1 = 2\n2\n\
         2 - 1 = 1\n1\n\
         1 - 1 = 0\n0\n\
         Flow execution finished\n"
    );
    assert_eq!(dump::stack(&vm), "");
}

#[test]
fn arith() {
    let (vm, r, text) = run("arith");
    assert_eq!(r, Ok(State::Halted));
    assert_eq!(
        text,
        "6 * 7 = 42\n\
         42 / 2 = 21\n\
         21 + 4 = 25\n\
         25 - 9 = 16\n\
         No operation\n\
         16\n\
         Flow execution finished\n"
    );
    assert_eq!(vm.stack(), &[16]);
}

#[test]
fn max() {
    let (_vm, r, text) = run("max");
    assert_eq!(r, Ok(State::Halted));
    assert_eq!(text, "30\nFlow execution finished\n");
}

#[test]
fn divzero() {
    let (vm, r, text) = run("divzero");
    let e = r.unwrap_err();
    assert_eq!(e.kind, FaultKind::DivisionByZero);
    assert_eq!(e.ip, 4);
    assert_eq!(e.to_string(), "division by zero (opcode 5 at ip 4)");
    assert_eq!(vm.state(), State::Faulted);
    assert_eq!(text, "");
    assert_eq!(dump::stack(&vm), "0x0001 0x0000\n");
}

#[test]
fn unknown() {
    let (vm, r, _text) = run("unknown");
    let e = r.unwrap_err();
    assert_eq!(e.kind, FaultKind::UnknownOpcode);
    assert_eq!(e.opcode, 99);
    assert_eq!(vm.stack(), &[1]);
}
