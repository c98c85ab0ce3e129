//! Human-readable dumps of machine state
use vm::Vm;

/// Number of values printed per row
const COLUMNS: usize = 4;

/// Formats the occupied stack slots, bottom first
///
/// Values are zero-padded and printed four per row.  An empty stack produces
/// an empty string.
pub fn stack(vm: &Vm) -> String {
    let mut out = String::new();
    for row in vm.stack().chunks(COLUMNS) {
        let row: Vec<String> =
            row.iter().map(|v| format!("0x{v:04}")).collect();
        out += &row.join(" ");
        out.push('\n');
    }
    out
}

/// Formats every register, in encoding order
pub fn registers(vm: &Vm) -> String {
    let mut out = String::from("Register dump:\n");
    let values: Vec<i32> = vm.registers().iter().map(|(_, v)| v).collect();
    for row in values.chunks(COLUMNS) {
        let row: Vec<String> = row.iter().map(|v| format!("{v:04}")).collect();
        out += &row.join(" ");
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use vm::{EmptyMonitor, Program};

    fn run(code: Vec<i32>) -> Vm {
        let mut vm = Vm::new(Program::from(code));
        let _ = vm.run(&mut EmptyMonitor);
        vm
    }

    #[test]
    fn stack_dump() {
        let vm = run(vec![1, 1, 1, 22, 1, 333, 1, 4444, 1, -5]);
        assert_eq!(stack(&vm), "0x0001 0x0022 0x0333 0x4444\n0x-005\n");

        let vm = run(vec![]);
        assert_eq!(stack(&vm), "");
    }

    #[test]
    fn register_dump() {
        // SET A 7, SET EXA 12
        let vm = run(vec![9, 0, 7, 9, 9, 12]);
        assert_eq!(
            registers(&vm),
            "Register dump:\n\
             0007 0000 0000 0000\n\
             0000 0000 0000 0000\n\
             0000 0012 0006 -001\n"
        );
    }
}
