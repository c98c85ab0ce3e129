use criterion::{Criterion, criterion_group, criterion_main};
use kiln_vm::{EmptyMonitor, Program, State, Vm};
use std::hint::black_box;

/// Counts register `A` down from `n` to zero, one stack round-trip per step
fn countdown(n: i32) -> Program {
    Program::from(vec![
        9, 0, n, // SET A n
        13, 0, // GLD A
        1, 1, // PSH 1
        6, // SUB
        14, 0, // GPT A
        2, // POP
        12, 0, 0, 3, // IFN A 0 3
        0, // HLT
    ])
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let prog = countdown(10_000);
    c.bench_function("countdown", |b| {
        b.iter(|| {
            let mut vm = Vm::new(black_box(prog.clone()));
            let r = vm.run(&mut EmptyMonitor);
            assert_eq!(r, Ok(State::Halted));
            black_box(vm.registers()[kiln_vm::Register::C])
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
