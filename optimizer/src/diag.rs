// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by loading, analysis and the
// rewriting passes. Diagnostics never abort analysis; the binary decides the
// exit status from the highest level seen.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0200`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Input loading (fatal).
    pub const E0001: DiagCode = DiagCode("E0001"); // unreadable input or output file
    pub const E0002: DiagCode = DiagCode("E0002"); // syntax error
    pub const E0003: DiagCode = DiagCode("E0003"); // unresolved name or malformed module
    pub const E0004: DiagCode = DiagCode("E0004"); // invalid sensor configuration

    // Engine notes.
    pub const N0100: DiagCode = DiagCode("N0100"); // both operands literal, left unfolded
    pub const N0101: DiagCode = DiagCode("N0101"); // literal operand moved to the right
    pub const N0102: DiagCode = DiagCode("N0102"); // bitwise/shift operand may be negative
    pub const N0103: DiagCode = DiagCode("N0103"); // opcode or type combination not modeled
    pub const N0104: DiagCode = DiagCode("N0104"); // integer result may wrap

    // Engine warnings.
    pub const W0200: DiagCode = DiagCode("W0200"); // declared return range disagrees
    pub const W0201: DiagCode = DiagCode("W0201"); // narrowing conversion approximated
    pub const W0202: DiagCode = DiagCode("W0202"); // recursive call or depth limit
    pub const W0203: DiagCode = DiagCode("W0203"); // visit budget exhausted
    pub const W0204: DiagCode = DiagCode("W0204"); // target layout entry ignored
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagLevel {
    Note,
    Warning,
    Error,
}

// ── Location ─────────────────────────────────────────────────────────────

/// Where in the module a diagnostic applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub function: String,
    pub value: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "@{}: {}", self.function, v),
            None => write!(f, "@{}", self.function),
        }
    }
}

// ── Cause record ─────────────────────────────────────────────────────────

/// One link in a cause chain, e.g. the call path that led to a warning.
#[derive(Debug, Clone)]
pub struct CauseRecord {
    pub message: String,
    pub location: Option<Location>,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub location: Option<Location>,
    pub message: String,
    pub hint: Option<String>,
    pub cause_chain: Vec<CauseRecord>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, location, hint, or causes.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            location: None,
            message: message.into(),
            hint: None,
            cause_chain: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message).with_code(code)
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message).with_code(code)
    }

    pub fn note(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Note, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn at(mut self, function: impl Into<String>, value: Option<String>) -> Self {
        self.location = Some(Location {
            function: function.into(),
            value,
        });
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a cause record to the chain.
    pub fn with_cause(mut self, message: impl Into<String>, location: Option<Location>) -> Self {
        self.cause_chain.push(CauseRecord {
            message: message.into(),
            location,
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
            DiagLevel::Note => "note",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: ", level, code)?;
        } else {
            write!(f, "{}: ", level)?;
        }
        if let Some(loc) = &self.location {
            write!(f, "{}: ", loc)?;
        }
        write!(f, "{}", self.message)?;
        for cause in &self.cause_chain {
            match &cause.location {
                Some(loc) => write!(f, "\n  caused by: {} ({})", cause.message, loc)?,
                None => write!(f, "\n  caused by: {}", cause.message)?,
            }
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True when any diagnostic is error-level.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}
