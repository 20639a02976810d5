use std::fs;
use std::process::exit;
use std::time::Instant;

use minijs::{eval, lexer, parser};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut trace = false;
    let mut show_tokens = false;
    let mut show_ast = false;
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-t" | "--trace" => trace = true,
            "-s" | "--tokens" => show_tokens = true,
            "-p" | "--ast" => show_ast = true,
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    eprintln!("only one input file is supported");
                    exit(2);
                }
                break;
            }
        }
    }

    let Some(path) = input_path else {
        eprintln!("usage: minijs [-t|--trace] [-s|--tokens] [-p|--ast] FILE");
        exit(2);
    };
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("{path}: {error}");
            exit(2);
        }
    };

    if show_tokens {
        for token in lexer::tokenize(&source) {
            println!("{}:{} {}", token.pos.line, token.pos.column, token);
        }
        return;
    }
    if show_ast {
        match parser::parse_str(&source) {
            Ok(node) => println!("{node:#?}"),
            Err(error) => {
                eprintln!("{error}");
                exit(3);
            }
        }
        return;
    }

    let started = Instant::now();
    let result = eval::eval_default(&source);
    if let Ok(value) = &result {
        if !value.is_nullish() {
            println!("{value}");
        }
    }
    if trace {
        println!("execution time: {:?}", started.elapsed());
    }
    if let Err(error) = result {
        eprintln!("{error}");
        exit(1);
    }
}
