//! Process instruction set.
//!
//! Programs are parsed once at process construction into a vector of
//! typed instructions; the original source text is kept alongside each
//! instruction for log display. Two dialects share the same instruction
//! kinds:
//!
//! - **Auto-generated** programs operate on the accumulator register `X`
//!   (`VAR X = 0`, `ADD <n>`, `PRINT`).
//! - **Custom** programs (authored through `screen -c`) operate on named
//!   16-bit variables and a string-addressed memory store.
//!
//! Unknown or malformed lines in custom programs are warned about and
//! dropped at parse time; execution itself never fails.

use thiserror::Error;

/// Error raised while parsing a single custom-program line.
///
/// These are reported as warnings by the parser; a bad line is dropped,
/// never fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The leading token is not a known instruction.
    #[error("unknown instruction '{0}'")]
    UnknownInstruction(String),

    /// Right number of tokens, wrong shape (e.g. non-numeric literal).
    #[error("bad argument in '{0}'")]
    BadArgument(String),

    /// Too few tokens for the instruction kind.
    #[error("missing arguments in '{0}'")]
    MissingArguments(String),
}

/// An operand of an arithmetic instruction: either a `u16` literal or a
/// variable name resolved at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(u16),
    Var(String),
}

impl Operand {
    /// Parse a token: numeric tokens become literals, everything else a
    /// variable reference.
    fn parse(token: &str) -> Self {
        match token.parse::<u16>() {
            Ok(v) => Operand::Literal(v),
            Err(_) => Operand::Var(token.to_string()),
        }
    }
}

/// A typed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `VAR X = <int>`: set the accumulator.
    SetX { value: i32 },

    /// `ADD <int>`: add to the accumulator (auto-generated dialect).
    AddX { amount: i32 },

    /// `DECLARE <var> <u16>`: bind a variable to a literal.
    Declare { var: String, value: u16 },

    /// `ADD <dst> <a> <b>`: dst <- val(a) + val(b), wrapping at u16.
    Add { dst: String, a: Operand, b: Operand },

    /// `SUBTRACT <dst> <a> <b>`: dst <- val(a) - val(b), saturating at 0.
    Subtract { dst: String, a: Operand, b: Operand },

    /// `SLEEP <n>`: arm the process sleep counter (at least 1 cycle).
    Sleep { cycles: u32 },

    /// `WRITE <addr> <var>`: memory[addr] <- val(var).
    Write { addr: String, var: String },

    /// `READ <var> <addr>`: var <- memory[addr], 0 when absent.
    Read { var: String, addr: String },

    /// `PRINT <text>`: expand variable names, strip `"` and `+`,
    /// append the result to the process log.
    Print { text: String },

    /// `FOR <k>`: expand in place by inserting `k` PRINT lines after
    /// the current position (auto-generated dialect only).
    For { prints: u8 },
}

/// One program line: the typed instruction plus its original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLine {
    /// Source text as authored or generated, used for log display.
    pub text: String,
    /// Parsed form.
    pub op: Instruction,
}

impl ProgramLine {
    pub fn new(text: impl Into<String>, op: Instruction) -> Self {
        Self {
            text: text.into(),
            op,
        }
    }
}

/// Parse one custom-program line.
///
/// Tokens are whitespace-separated; the first token selects the
/// instruction kind. `PRINT` consumes the rest of the line verbatim.
pub fn parse_line(line: &str) -> Result<ProgramLine, ParseError> {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    let keyword = tokens
        .next()
        .ok_or_else(|| ParseError::MissingArguments(line.to_string()))?;

    let op = match keyword {
        "DECLARE" => {
            let var = next_token(line, &mut tokens)?;
            let value = next_token(line, &mut tokens)?
                .parse::<u16>()
                .map_err(|_| ParseError::BadArgument(line.to_string()))?;
            Instruction::Declare {
                var: var.to_string(),
                value,
            }
        }
        "ADD" => {
            let dst = next_token(line, &mut tokens)?;
            let a = next_token(line, &mut tokens)?;
            let b = next_token(line, &mut tokens)?;
            Instruction::Add {
                dst: dst.to_string(),
                a: Operand::parse(a),
                b: Operand::parse(b),
            }
        }
        "SUBTRACT" => {
            let dst = next_token(line, &mut tokens)?;
            let a = next_token(line, &mut tokens)?;
            let b = next_token(line, &mut tokens)?;
            Instruction::Subtract {
                dst: dst.to_string(),
                a: Operand::parse(a),
                b: Operand::parse(b),
            }
        }
        "SLEEP" => {
            let n = next_token(line, &mut tokens)?
                .parse::<u32>()
                .map_err(|_| ParseError::BadArgument(line.to_string()))?;
            Instruction::Sleep {
                cycles: n.max(1),
            }
        }
        "WRITE" => {
            let addr = next_token(line, &mut tokens)?;
            let var = next_token(line, &mut tokens)?;
            Instruction::Write {
                addr: addr.to_string(),
                var: var.to_string(),
            }
        }
        "READ" => {
            let var = next_token(line, &mut tokens)?;
            let addr = next_token(line, &mut tokens)?;
            Instruction::Read {
                var: var.to_string(),
                addr: addr.to_string(),
            }
        }
        "PRINT" => {
            let text = line["PRINT".len()..].trim().to_string();
            Instruction::Print { text }
        }
        other => return Err(ParseError::UnknownInstruction(other.to_string())),
    };

    Ok(ProgramLine::new(line, op))
}

fn next_token<'a>(
    line: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<&'a str, ParseError> {
    tokens
        .next()
        .ok_or_else(|| ParseError::MissingArguments(line.to_string()))
}

/// Parse a semicolon-separated custom program.
///
/// Bad lines are logged as warnings and dropped; the surviving lines
/// form the program. An all-bad input yields an empty program, which a
/// process treats as immediately finished.
pub fn parse_program(source: &str) -> Vec<ProgramLine> {
    let mut program = Vec::new();
    for raw in source.split(';') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match parse_line(raw) {
            Ok(line) => program.push(line),
            Err(e) => log::warn!("dropping instruction: {}", e),
        }
    }
    program
}

/// Expand a PRINT payload: segments are separated by `+`, surrounding
/// quotes are stripped, and bare tokens bound in the variable store are
/// replaced by their value.
pub fn expand_print(text: &str, vars: &std::collections::HashMap<String, u16>) -> String {
    let mut out = String::new();
    for segment in text.split('+') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let quoted = segment.starts_with('"');
        let stripped = segment.trim_matches('"');
        if !quoted {
            if let Some(value) = vars.get(stripped) {
                out.push_str(&value.to_string());
                continue;
            }
        }
        out.push_str(stripped);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_declare() {
        let line = parse_line("DECLARE x 5").unwrap();
        assert_eq!(
            line.op,
            Instruction::Declare {
                var: "x".to_string(),
                value: 5
            }
        );
        assert_eq!(line.text, "DECLARE x 5");
    }

    #[test]
    fn test_parse_add_mixed_operands() {
        let line = parse_line("ADD y x 3").unwrap();
        assert_eq!(
            line.op,
            Instruction::Add {
                dst: "y".to_string(),
                a: Operand::Var("x".to_string()),
                b: Operand::Literal(3),
            }
        );
    }

    #[test]
    fn test_parse_sleep_clamps_to_one() {
        let line = parse_line("SLEEP 0").unwrap();
        assert_eq!(line.op, Instruction::Sleep { cycles: 1 });
    }

    #[test]
    fn test_parse_print_keeps_payload() {
        let line = parse_line("PRINT \"Result: \" + x").unwrap();
        assert_eq!(
            line.op,
            Instruction::Print {
                text: "\"Result: \" + x".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_instruction() {
        assert_eq!(
            parse_line("JUMP 3"),
            Err(ParseError::UnknownInstruction("JUMP".to_string()))
        );
    }

    #[test]
    fn test_parse_bad_literal() {
        assert_eq!(
            parse_line("DECLARE x lots"),
            Err(ParseError::BadArgument("DECLARE x lots".to_string()))
        );
    }

    #[test]
    fn test_parse_program_drops_bad_lines() {
        let program = parse_program("DECLARE x 5; JUMP 3; PRINT x");
        assert_eq!(program.len(), 2);
        assert!(matches!(program[0].op, Instruction::Declare { .. }));
        assert!(matches!(program[1].op, Instruction::Print { .. }));
    }

    #[test]
    fn test_parse_program_empty_input() {
        assert!(parse_program("  ;  ; ").is_empty());
    }

    #[test]
    fn test_expand_print_substitutes_bound_vars() {
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), 10u16);
        assert_eq!(expand_print("\"Value: \" + x", &vars), "Value: 10");
    }

    #[test]
    fn test_expand_print_leaves_unbound_tokens() {
        let vars = HashMap::new();
        assert_eq!(expand_print("hello", &vars), "hello");
    }

    #[test]
    fn test_expand_print_quoted_var_name_is_literal() {
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), 7u16);
        assert_eq!(expand_print("\"x\" + x", &vars), "x7");
    }
}
