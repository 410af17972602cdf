use thiserror::Error;

/// standardized result type used by every stage of the pipeline
pub type CompileResult<T> = Result<T, CompileError>;

/// All conditions that abort a compilation. The first error wins: there is
/// no recovery or resynchronisation, stages simply propagate with `?`.
///
/// Lexical and syntactic errors carry the line counter of the lexer at the
/// point of detection; syntactic errors additionally describe the offending
/// token as `Kind(payload)/lexeme`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    // lexical
    #[error("lexical error in line {line}: unknown character: {byte}")]
    UnknownCharacter { line: u32, byte: u8 },
    #[error("lexical error in line {line}: expected */ before end of file")]
    UnterminatedComment { line: u32 },

    // syntactic
    #[error("syntax error in line {line}: expected {expected} (got {found})")]
    UnexpectedToken {
        line: u32,
        expected: String,
        found: String,
    },
    #[error("syntax error in line {line}: top-level expressions are not supported")]
    TopLevelExpression { line: u32 },

    // semantic
    #[error("use of undeclared variable, {name}")]
    UndefinedVariable { name: String },
    #[error("called undefined function, {name}")]
    UndefinedFunction { name: String },
    #[error("function {name} expects {expected} arguments, but got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("redefinition of function, {name}")]
    Redefinition { name: String },
    #[error("left hand side of assignment must be a variable")]
    InvalidAssignTarget,
    #[error(
        "argument name, {got}, does not match prototype, {expected}, \
         in function {function} argument {index}"
    )]
    ArgumentNameMismatch {
        function: String,
        expected: String,
        got: String,
        index: usize,
    },
    #[error("duplicate argument name, {name}, in function {function}")]
    DuplicateArgument { function: String, name: String },
    #[error("block produced no value")]
    EmptyBlock,
    #[error("invalid function {name}: {reason}")]
    InvalidFunction { name: String, reason: String },
}
