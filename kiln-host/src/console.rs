use crate::Output;
use log::trace;
use std::io::Write;
use vm::{Event, Instruction, Monitor, Opcode, Vm};

/// Monitor which renders execution events as console text
///
/// Text is buffered until [`Console::output`] is called.  Each instruction is
/// also logged at `trace` level before it executes.
#[derive(Default)]
pub struct Console {
    stdout: Vec<u8>,
}

impl Console {
    /// Builds a console with an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the buffered text, leaving the buffer empty
    #[must_use]
    pub fn output(&mut self) -> Output {
        Output {
            stdout: std::mem::take(&mut self.stdout),
        }
    }
}

fn symbol(op: Opcode) -> char {
    match op {
        Opcode::Add => '+',
        Opcode::Sub => '-',
        Opcode::Mul => '*',
        Opcode::Div => '/',
        _ => '?',
    }
}

impl Monitor for Console {
    fn event(&mut self, _vm: &Vm, event: Event) {
        // Writing into a Vec<u8> cannot fail
        let _ = match event {
            Event::Arith {
                op,
                left,
                right,
                result,
            } => {
                let s = symbol(op);
                writeln!(self.stdout, "{left} {s} {right} = {result}")
            }
            Event::Log { value, .. } => writeln!(self.stdout, "{value}"),
            Event::Nop => writeln!(self.stdout, "No operation"),
            Event::Halt => writeln!(self.stdout, "Flow execution finished"),
        };
    }

    fn step(&mut self, _vm: &Vm, ip: usize, instr: &Instruction) {
        trace!("{ip:04}: {instr}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::Mutex;
    use vm::Program;

    /// Logger which keeps every `trace` line from [`Console`]
    struct Capture(Mutex<Vec<String>>);
    impl Log for Capture {
        fn enabled(&self, m: &Metadata) -> bool {
            m.level() == Level::Trace
        }
        fn log(&self, r: &Record) {
            if self.enabled(r.metadata())
                && r.target() == module_path!().trim_end_matches("::test")
            {
                self.0.lock().unwrap().push(r.args().to_string());
            }
        }
        fn flush(&self) {}
    }
    static LOGGER: Capture = Capture(Mutex::new(Vec::new()));

    #[test]
    fn trace_each_instruction() {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);

        let mut vm = Vm::new(Program::from(vec![9, 0, 7, 10, 0, 0]));
        vm.run(&mut Console::new()).unwrap();
        assert_eq!(
            *LOGGER.0.lock().unwrap(),
            ["0000: SET A 7", "0003: LOG A", "0005: HLT"]
        );
    }
}
