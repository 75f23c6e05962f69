//! Synthetic program generation.
//!
//! The background generator mints processes with machine-written
//! programs. The basic shape is `VAR X = 0` followed by alternating
//! `PRINT`/`ADD` lines; the randomized variant mixes in `DECLARE`,
//! `SUBTRACT`, `SLEEP` and `FOR` lines. All randomness is drawn at
//! generation time and baked into the program text, so execution is
//! fully deterministic afterwards.

use rand::Rng;

use super::instruction::{Instruction, Operand, ProgramLine};

/// Build the PRINT line every auto-generated program uses.
fn print_line(name: &str) -> ProgramLine {
    let text = format!("PRINT \"Value from {}!\"", name);
    let payload = format!("\"Value from {}!\"", name);
    ProgramLine::new(text, Instruction::Print { text: payload })
}

/// Build an `ADD <n>` accumulator line.
fn add_line(amount: i32) -> ProgramLine {
    ProgramLine::new(format!("ADD {}", amount), Instruction::AddX { amount })
}

/// Generate the standard auto program of `count` instructions:
/// `VAR X = 0` first, then `PRINT` at odd indices and `ADD <1..10>` at
/// even indices.
pub fn auto_program<R: Rng>(name: &str, count: usize, rng: &mut R) -> Vec<ProgramLine> {
    let mut program = Vec::with_capacity(count);
    for index in 0..count {
        if index == 0 {
            program.push(ProgramLine::new(
                "VAR X = 0",
                Instruction::SetX { value: 0 },
            ));
        } else if index % 2 == 1 {
            program.push(print_line(name));
        } else {
            program.push(add_line(rng.gen_range(1..=10)));
        }
    }
    program
}

/// Generate the randomized auto-program variant.
///
/// Keeps the `VAR X = 0` opener, then draws each line from the full
/// auto-generated repertoire. Random operands are fixed here so the
/// interpreter stays deterministic.
pub fn auto_program_randomized<R: Rng>(
    name: &str,
    count: usize,
    rng: &mut R,
) -> Vec<ProgramLine> {
    let mut program = Vec::with_capacity(count);
    for index in 0..count {
        if index == 0 {
            program.push(ProgramLine::new(
                "VAR X = 0",
                Instruction::SetX { value: 0 },
            ));
            continue;
        }
        match rng.gen_range(0..6) {
            0 => program.push(print_line(name)),
            1 => program.push(add_line(rng.gen_range(1..=10))),
            2 => {
                let value = rng.gen::<u16>();
                program.push(ProgramLine::new(
                    format!("DECLARE x {}", value),
                    Instruction::Declare {
                        var: "x".to_string(),
                        value,
                    },
                ));
            }
            3 => {
                let amount = rng.gen_range(0..10u16);
                program.push(ProgramLine::new(
                    format!("SUBTRACT x x {}", amount),
                    Instruction::Subtract {
                        dst: "x".to_string(),
                        a: Operand::Var("x".to_string()),
                        b: Operand::Literal(amount),
                    },
                ));
            }
            4 => {
                let cycles = rng.gen_range(1..=3);
                program.push(ProgramLine::new(
                    format!("SLEEP {}", cycles),
                    Instruction::Sleep { cycles },
                ));
            }
            _ => {
                let prints = rng.gen_range(1..=4);
                program.push(ProgramLine::new(
                    format!("FOR {}", prints),
                    Instruction::For { prints },
                ));
            }
        }
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_auto_program_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let program = auto_program("p1", 5, &mut rng);
        assert_eq!(program.len(), 5);
        assert_eq!(program[0].op, Instruction::SetX { value: 0 });
        assert!(matches!(program[1].op, Instruction::Print { .. }));
        assert!(matches!(program[2].op, Instruction::AddX { .. }));
        assert!(matches!(program[3].op, Instruction::Print { .. }));
        assert!(matches!(program[4].op, Instruction::AddX { .. }));
    }

    #[test]
    fn test_auto_program_add_amounts_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let program = auto_program("p1", 100, &mut rng);
        for line in &program {
            if let Instruction::AddX { amount } = line.op {
                assert!((1..=10).contains(&amount));
            }
        }
    }

    #[test]
    fn test_auto_program_exact_count() {
        // min == max in the generator config always yields that count.
        let mut rng = StdRng::seed_from_u64(1);
        for k in [1usize, 2, 17] {
            assert_eq!(auto_program("p", k, &mut rng).len(), k);
        }
    }

    #[test]
    fn test_randomized_program_opens_with_var() {
        let mut rng = StdRng::seed_from_u64(3);
        let program = auto_program_randomized("p1", 50, &mut rng);
        assert_eq!(program.len(), 50);
        assert_eq!(program[0].op, Instruction::SetX { value: 0 });
    }

    #[test]
    fn test_randomized_program_for_counts_bounded() {
        let mut rng = StdRng::seed_from_u64(9);
        let program = auto_program_randomized("p1", 200, &mut rng);
        for line in &program {
            if let Instruction::For { prints } = line.op {
                assert!((1..=4).contains(&prints));
            }
        }
    }
}
