//! Ahead-of-time compiler for the Cata expression language.
//!
//! The pipeline is strictly staged and pull-based:
//!
//! ```text
//! source bytes -> Lexer -> tokens -> Parser -> AST -> Compiler -> IR text
//! ```
//!
//! The parser drives the whole pipeline: each finished top-level form is
//! handed to the code generator before the next one is parsed, so later
//! forms see the symbol side effects of earlier ones.

pub mod backend;
pub mod error;
pub mod frontend;
pub mod util;

use backend::Compiler;
use error::CompileResult;
use frontend::ast::Item;
use frontend::lexer::Lexer;
use frontend::parser::Parser;

/// Compile Cata source code into the textual IR of a single module named
/// `main`. The first error of any stage aborts the compilation.
pub fn compile(source: &str) -> CompileResult<String> {
    let mut parser = Parser::new(Lexer::new(source));
    let mut compiler = Compiler::new();
    while let Some(item) = parser.parse_item()? {
        compiler.compile_item(item)?;
    }
    Ok(compiler.finish().to_string())
}

/// Parse a whole source file without lowering it. Used by `--dump-ast`
/// and by tests that inspect the tree.
pub fn parse(source: &str) -> CompileResult<Vec<Item>> {
    let mut parser = Parser::new(Lexer::new(source));
    let mut items = Vec::new();
    while let Some(item) = parser.parse_item()? {
        items.push(item);
    }
    Ok(items)
}
