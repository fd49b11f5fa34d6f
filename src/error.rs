use miette::{miette, LabeledSpan, Report, Severity};

use crate::span::Span;

// Lexer errors

pub fn lex_unknown(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::unknown",
        help = "operands are registers (R0-R7), literals (42, 0x2A, 'c'), or labels",
        labels = vec![LabeledSpan::at(span, "unknown token")],
        "Encountered an unknown token",
    )
    .with_source_code(src.to_string())
}

pub fn lex_bad_literal(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::bad_lit",
        help = "decimal literals range from -32,768 to 65,535; hex literals fit 16 bits",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid numeric literal",
    )
    .with_source_code(src.to_string())
}

pub fn lex_bad_char(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::bad_char",
        help = "character literals are a single ASCII char like 'A' or an escape like '\\n'",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid character literal",
    )
    .with_source_code(src.to_string())
}

pub fn lex_unclosed_str(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::str_lit",
        help = "make sure to close string literals with a \" character",
        labels = vec![LabeledSpan::at(span, "unterminated literal")],
        "Encountered an unterminated string literal",
    )
    .with_source_code(src.to_string())
}

pub fn lex_invalid_dir(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::dir",
        help = "available directives are .ORG, .WORD, .BYTE and .ASCII",
        labels = vec![LabeledSpan::at(span, "incorrect directive")],
        "Encountered an invalid directive",
    )
    .with_source_code(src.to_string())
}

pub fn lex_bad_register(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::reg",
        help = "valid registers are R0 through R7",
        labels = vec![LabeledSpan::at(span, "invalid register")],
        "Encountered an invalid register index",
    )
    .with_source_code(src.to_string())
}

// Parser errors

pub fn parse_unknown_mnemonic(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::mnemonic",
        help = "statements start with a label declaration, a mnemonic, or a directive",
        labels = vec![LabeledSpan::at(span, "unknown mnemonic")],
        "Encountered an unknown mnemonic",
    )
    .with_source_code(src.to_string())
}

pub fn parse_unexpected(span: Span, src: &str, expected: &str, found: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unexpected_token",
        help = "check the operands allowed for this statement",
        labels = vec![LabeledSpan::at(span, "unexpected token")],
        "Expected {expected}, found {found}",
    )
    .with_source_code(src.to_string())
}

pub fn parse_trailing(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::trailing",
        help = "each line holds at most one statement",
        labels = vec![LabeledSpan::at(span, "trailing token")],
        "Unexpected token after a complete statement",
    )
    .with_source_code(src.to_string())
}

pub fn parse_eof(src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unexpected_eof",
        help = "you may be missing operands in your last statement",
        labels = vec![LabeledSpan::at_offset(src.len().saturating_sub(1), "here")],
        "Unexpected end of file",
    )
    .with_source_code(src.to_string())
}

// Assembler errors

pub fn asm_duplicate_label(span: Span, src: &str, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::duplicate_label",
        help = "labels may be declared only once per file; label names are case-sensitive",
        labels = vec![LabeledSpan::at(span, "duplicate label")],
        "Duplicate label `{name}`",
    )
    .with_source_code(src.to_string())
}

pub fn asm_undefined_label(span: Span, src: &str, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::undefined_label",
        help = "label names are case-sensitive; check the declaration spelling",
        labels = vec![LabeledSpan::at(span, "undefined label")],
        "Undefined label `{name}`",
    )
    .with_source_code(src.to_string())
}

pub fn asm_imm_range(span: Span, src: &str, val: i32, min: i32, max: i32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::imm_range",
        help = format!("this operand accepts values from {min} to {max}"),
        labels = vec![LabeledSpan::at(span, "out-of-range value")],
        "Value {val} does not fit the immediate field",
    )
    .with_source_code(src.to_string())
}

pub fn asm_bad_operands(span: Span, src: &str, mnemonic: &str, expected: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::operands",
        help = format!("{mnemonic} accepts: {expected}"),
        labels = vec![LabeledSpan::at(span, "bad operands")],
        "Invalid operands for {mnemonic}",
    )
    .with_source_code(src.to_string())
}

pub fn asm_image_overflow(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::image_overflow",
        help = "the address space ends at 0xFFFF; check .ORG directives and data sizes",
        labels = vec![LabeledSpan::at(span, "emitted past end of memory")],
        "Program does not fit in the 64 KiB address space",
    )
    .with_source_code(src.to_string())
}

// Loader errors

pub fn load_too_large(len: usize, start: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::too_large",
        help = "the image must fit below 0x10000 from its load address",
        "Program of {len} bytes does not fit in memory at 0x{start:04x}",
    )
}
