//! Lexer, parser and code generator benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use jetpack_parser::{Codegen, CodegenOptions, Lexer, Parser, ParserOptions, TokenKind};

const SAMPLE_SOURCE: &str = r#"
import { readFile } from './fs.js';
import * as path from './path.js';

function fibonacci(n) {
    if (n <= 1) return n;
    return fibonacci(n - 1) + fibonacci(n - 2);
}

class Calculator {
    constructor() {
        this.result = 0;
    }

    add(x, y) {
        return x + y;
    }

    async load(file) {
        const data = await readFile(path.join('.', file));
        return JSON.parse(data);
    }
}

const calc = new Calculator();
const numbers = [1, 2, 3, 4, 5].map(n => n * 2);
const { a, b, ...rest } = { a: 1, b: 2, c: 3, d: 4 };
const template = `Hello ${name}, you have ${count} messages`;

export { Calculator, fibonacci };
export default calc;
"#;

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    group.throughput(Throughput::Bytes(SAMPLE_SOURCE.len() as u64));

    group.bench_function("sample", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(black_box(SAMPLE_SOURCE));
            loop {
                let token = lexer.next_token();
                if matches!(token.kind, TokenKind::Eof) {
                    break;
                }
            }
        });
    });

    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Bytes(SAMPLE_SOURCE.len() as u64));

    group.bench_function("parse", |b| {
        b.iter(|| {
            Parser::new(black_box(SAMPLE_SOURCE), ParserOptions::default())
                .parse()
                .unwrap()
        });
    });

    let program = Parser::new(SAMPLE_SOURCE, ParserOptions::default())
        .parse()
        .unwrap();
    group.bench_function("codegen_minify", |b| {
        b.iter(|| {
            let options = CodegenOptions {
                minify: true,
                ..Default::default()
            };
            Codegen::new(black_box(&program), options).generate()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_lexer, bench_parser);
criterion_main!(benches);
