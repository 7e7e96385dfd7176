use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use clap::Parser as ClapParser;

use quasilang::ast::Node;
use quasilang::grouper::{Grouper, DEFAULT_LIMIT};
use quasilang::printer::Printer;
use quasilang::reader::Reader;
use quasilang::token::TokenKind;

#[derive(ClapParser, Debug)]
#[command(version, about = "Front-end for the QuasiLang toy language", long_about = None)]
struct Cli {
    /// Input file
    path: Option<PathBuf>,

    /// Input file (alternative to the positional argument)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Node budget per group
    #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Expand placeholders instead of printing them compactly
    #[arg(short, long)]
    full: bool,

    /// Dump the raw token stream instead of the tree
    #[arg(short, long)]
    tokens: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli: Cli = Cli::parse();

    let Some(path) = cli.input.or(cli.path) else {
        eprintln!("input file is required.");
        process::exit(1);
    };
    if !path.is_file() {
        eprintln!("input file is required.");
        process::exit(1);
    }

    let reader: Reader = Reader::open(&path)?;

    if cli.tokens {
        tokenize(reader);
        return Ok(());
    }

    let src = Rc::new(RefCell::new(reader));
    let tree = Grouper::with_limit(src, cli.limit).and_then(|mut grouper| grouper.parse());

    match tree {
        Ok(root) => print!("{}", Printer::new(cli.full).print(&Node::Group(root))),

        Err(e) => {
            eprintln!("{}", e);
            process::exit(65);
        }
    }

    Ok(())
}

fn tokenize(mut reader: Reader) {
    loop {
        match reader.next_token() {
            Ok(token) => {
                let done: bool = token.kind == TokenKind::Eof;
                println!("{}", token);
                if done {
                    break;
                }
            }

            Err(e) => {
                eprintln!("{}", e);
                process::exit(65);
            }
        }
    }
}
