use std::cell::RefCell;
use std::fs;
use std::io::Sink;
use std::rc::Rc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use minijs::runtime::env::Environment;
use minijs::{builtins, eval, lexer, parser};

const WORKLOADS: [(&str, &str); 2] = [
    ("fib", "tests/programs/fib/program.js"),
    ("arrays", "tests/programs/array_methods/program.js"),
];

fn bench_interpreter(c: &mut Criterion) {
    for (label, path) in WORKLOADS {
        let source =
            fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"));

        c.bench_function(&format!("tokenize_{label}"), |b| {
            b.iter(|| {
                let out = lexer::tokenize(black_box(&source));
                black_box(out);
            })
        });

        c.bench_function(&format!("parse_{label}"), |b| {
            b.iter(|| {
                let out = parser::parse_str(black_box(&source)).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("eval_{label}"), |b| {
            b.iter(|| {
                let sink: Rc<RefCell<Sink>> = Rc::new(RefCell::new(std::io::sink()));
                let env = Environment::enclosed(&builtins::default_env_with(
                    sink.clone(),
                    sink.clone(),
                ));
                let out = eval::eval_str(black_box(&source), &env).expect("eval");
                black_box(out);
            })
        });
    }
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
