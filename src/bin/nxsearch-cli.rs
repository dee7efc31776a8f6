//! Interactive shell over an nxsearch engine: create/open an index, add and
//! remove documents, and run boolean queries against it.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use nxsearch::{EngineConfig, Index, SearchParams};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> nxsearch::Result<()> {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => interactive_mode(None),
        2 => match args[1].as_str() {
            "--version" | "-v" => {
                println!("nxsearch-cli v{VERSION}");
                Ok(())
            }
            "--help" | "-h" => {
                print_help();
                Ok(())
            }
            path => interactive_mode(Some(PathBuf::from(path))),
        },
        _ => {
            print_help();
            Err(nxsearch::NxsError::Invalid("unexpected arguments".to_string()))
        }
    }
}

fn print_help() {
    println!(
        r#"nxsearch-cli v{VERSION}

usage:
  nxsearch-cli                open/create ./nxsdata
  nxsearch-cli <basedir>      open/create the given base directory
  nxsearch-cli --version      print version
  nxsearch-cli --help         print this help

once open, type '.help' for shell commands."#
    );
}

fn print_shell_help() {
    println!(
        r#"commands:
  .use <name>             create (if needed) and open an index
  .add <doc_id> <text>    index a document under the open index
  .remove <doc_id>        remove a document from the open index
  .algo <TF-IDF|BM25>     override the ranking algorithm for this session
  .help                   show this message
  .exit, .quit            leave the shell

anything else is run as a boolean query (AND, OR, NOT, parentheses)."#
    );
}

fn interactive_mode(basedir: Option<PathBuf>) -> nxsearch::Result<()> {
    let config = EngineConfig::resolve(basedir);
    println!("nxsearch v{VERSION}");
    println!("basedir: {}", config.basedir.display());
    println!("type '.help' for help, '.exit' to quit\n");

    let engine = nxsearch::Engine::open(config)?;
    let mut index: Option<Index> = None;
    let mut algo_override: Option<String> = None;

    let stdin = io::stdin();
    let mut buffer = String::new();
    loop {
        print!("nxsearch> ");
        io::stdout().flush().ok();
        buffer.clear();
        if stdin.lock().read_line(&mut buffer).is_err() {
            break;
        }
        let input = buffer.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(rest) = input.strip_prefix(".use ") {
            match engine.index_open(rest.trim()) {
                Ok(idx) => index = Some(idx),
                Err(_) => match engine.index_create(rest.trim(), serde_json::json!({})) {
                    Ok(idx) => index = Some(idx),
                    Err(e) => eprintln!("error: {e}"),
                },
            }
            continue;
        }
        if let Some(rest) = input.strip_prefix(".add ") {
            let Some((doc_id, text)) = rest.trim().split_once(' ') else {
                eprintln!("usage: .add <doc_id> <text>");
                continue;
            };
            match (doc_id.parse::<u64>(), index.as_mut()) {
                (Ok(id), Some(idx)) => match idx.add(id, text) {
                    Ok(()) => println!("indexed document {id}"),
                    Err(e) => eprintln!("error: {e}"),
                },
                (Err(_), _) => eprintln!("doc_id must be a non-negative integer"),
                (_, None) => eprintln!("no index open; use .use <name> first"),
            }
            continue;
        }
        if let Some(rest) = input.strip_prefix(".remove ") {
            match (rest.trim().parse::<u64>(), index.as_mut()) {
                (Ok(id), Some(idx)) => match idx.remove(id) {
                    Ok(()) => println!("removed document {id}"),
                    Err(e) => eprintln!("error: {e}"),
                },
                (Err(_), _) => eprintln!("doc_id must be a non-negative integer"),
                (_, None) => eprintln!("no index open; use .use <name> first"),
            }
            continue;
        }
        if let Some(rest) = input.strip_prefix(".algo ") {
            algo_override = Some(rest.trim().to_string());
            continue;
        }
        match input {
            ".exit" | ".quit" => {
                println!("bye");
                break;
            }
            ".help" => {
                print_shell_help();
                continue;
            }
            _ => {}
        }

        let Some(idx) = index.as_mut() else {
            eprintln!("no index open; use .use <name> first");
            continue;
        };
        let params = SearchParams {
            algo: algo_override.clone(),
            ..SearchParams::default()
        };
        match idx.search(input, &params) {
            Ok(resp) => {
                println!("{} result(s):", resp.result_count());
                for hit in resp.iter() {
                    println!("  doc {} -> {:.4}", hit.doc_id, hit.score);
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
