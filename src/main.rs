use std::fs;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use catac::frontend::printer;

/// Compiles Cata source code to LLVM textual IR.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Source file to compile.
    #[arg(default_value = "./program.cata")]
    input: PathBuf,

    /// Write the IR to this file instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print each parsed top-level form to standard error.
    #[arg(long)]
    dump_ast: bool,
}

fn main() {
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("could not open file {}: {}", cli.input.display(), e);
            exit(1);
        }
    };

    if cli.dump_ast {
        // parse errors are reported by the compile pass below
        if let Ok(items) = catac::parse(&source) {
            for item in &items {
                eprintln!("{}", printer::print_item(item));
            }
        }
    }

    let ir = match catac::compile(&source) {
        Ok(ir) => ir,
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    };

    match cli.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, ir) {
                eprintln!("failed to write {}: {}", path.display(), e);
                exit(1);
            }
        }
        None => print!("{}", ir),
    }
}
