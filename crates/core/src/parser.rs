// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation-string parsing
//!
//! An operation group is a comma-separated list of specs, one per semaphore:
//!
//! ```text
//! spec  := index ('+' | '-' | '=') digits flag*
//! flag  := 'n' | 'u'
//! ```
//!
//! `n` requests no-wait, `u` requests auto-undo. `=` only accepts `0`.

use crate::limits::{MAX_SEMOPS, SEMVMX};
use crate::op::{Batch, OperationRequest};
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// What was wrong with an operation group
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("trailing comma or empty operation")]
    EmptySpec,
    #[error("expected initial digit")]
    ExpectedInitialDigit,
    #[error("expected '+', '-' or '=' after semaphore index")]
    ExpectedSign,
    #[error("expected digit after '{0}'")]
    ExpectedDigit(char),
    #[error("expected \"=0\"")]
    ExpectedZero,
    #[error("bad trailing character ({0})")]
    BadTrailingCharacter(char),
    #[error("semaphore index too large")]
    IndexTooLarge,
    #[error("operand too large (maximum={max})")]
    OperandTooLarge { max: u32 },
    #[error("too many operations (maximum={max})")]
    TooManyOperations { max: usize },
}

/// A malformed operation group, with the text that was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in \"{group}\"")]
pub struct ParseError {
    pub group: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(group: &str, kind: ParseErrorKind) -> Self {
        Self {
            group: group.to_string(),
            kind,
        }
    }

    /// Exceeding the batch size is a precondition failure rather than bad syntax
    pub fn is_precondition(&self) -> bool {
        matches!(self.kind, ParseErrorKind::TooManyOperations { .. })
    }
}

/// Parse one operation group into an ordered list of requests
pub fn parse_ops(group: &str) -> Result<Vec<OperationRequest>, ParseError> {
    // The size check comes first so an oversized group is rejected as such
    // regardless of what its specs contain.
    if group.split(',').count() > MAX_SEMOPS {
        return Err(ParseError::new(
            group,
            ParseErrorKind::TooManyOperations { max: MAX_SEMOPS },
        ));
    }

    let mut ops = Vec::new();
    for spec in group.split(',') {
        let op = parse_spec(spec).map_err(|kind| ParseError::new(group, kind))?;
        ops.push(op);
    }
    Ok(ops)
}

/// Parse one operation group into a batch ready for submission
pub fn parse_batch(group: &str) -> Result<Batch, ParseError> {
    let ops = parse_ops(group)?;
    // parse_ops never yields an empty or oversized list
    Batch::new(ops).map_err(|_| {
        ParseError::new(
            group,
            ParseErrorKind::TooManyOperations { max: MAX_SEMOPS },
        )
    })
}

fn parse_spec(spec: &str) -> Result<OperationRequest, ParseErrorKind> {
    let mut chars = spec.chars().peekable();

    match chars.peek() {
        None => return Err(ParseErrorKind::EmptySpec),
        Some(c) if !c.is_ascii_digit() => return Err(ParseErrorKind::ExpectedInitialDigit),
        Some(_) => {}
    }

    let index = read_number(&mut chars)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or(ParseErrorKind::IndexTooLarge)?;

    let sign = match chars.next() {
        Some(c @ ('+' | '-' | '=')) => c,
        _ => return Err(ParseErrorKind::ExpectedSign),
    };

    if !chars.peek().is_some_and(|c| c.is_ascii_digit()) {
        return Err(ParseErrorKind::ExpectedDigit(sign));
    }

    let magnitude = read_number(&mut chars)
        .filter(|n| *n <= u64::from(SEMVMX))
        .ok_or(ParseErrorKind::OperandTooLarge { max: SEMVMX })?;
    // Bounded by SEMVMX above
    let magnitude = magnitude as i32;

    let delta = match sign {
        '+' => magnitude,
        '-' => -magnitude,
        _ => {
            if magnitude != 0 {
                return Err(ParseErrorKind::ExpectedZero);
            }
            0
        }
    };

    let mut op = OperationRequest::new(index, delta);
    for c in chars {
        match c {
            'n' => op.no_wait = true,
            'u' => op.auto_undo = true,
            other => return Err(ParseErrorKind::BadTrailingCharacter(other)),
        }
    }

    Ok(op)
}

/// Consume a run of ASCII digits; `None` on overflow
fn read_number(chars: &mut Peekable<Chars<'_>>) -> Option<u64> {
    let mut value: u64 = 0;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        value = value.checked_mul(10)?.checked_add(u64::from(digit))?;
    }
    Some(value)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
