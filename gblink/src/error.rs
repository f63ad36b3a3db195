use std::fmt;
use std::path::PathBuf;

use arch::segment::Segment;
use color_print::cprintln;
use indexmap::IndexMap;
use thiserror::Error;

/// Source location attached to every fatal condition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pos {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Pos {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // line/col are 0-based internally, displayed 1-based
        write!(f, "{}:{}:{}", self.file, self.line + 1, self.col + 1)
    }
}

/// Broad error categories. Every condition is fatal; linking of the current
/// file aborts at the first one raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Declaration,
    Argument,
    Reference,
    Address,
    Macro,
    Include,
}

#[derive(Debug, Error)]
pub enum Error {
    // Declaration errors
    #[error("Duplicate macro argument `@{name}`")]
    DuplicateMacroArgument { name: String, pos: Pos },

    #[error("A SECTION cannot be declared within a macro body")]
    SectionInMacro { pos: Pos },

    #[error("Unknown segment name `{name}`, must be one of {expected}")]
    UnknownSegment {
        name: String,
        expected: String,
        pos: Pos,
    },

    // Argument errors
    #[error("Use of undefined macro argument `@{name}` in expression")]
    UndefinedMacroArgument { name: String, pos: Pos },

    #[error("Use of register arguments is not supported within expression macros")]
    RegisterInExpressionMacro { name: String, pos: Pos },

    #[error("Cannot expand built-in MACRO `{name}`")]
    ExpandBuiltinMacro { name: String, pos: Pos },

    #[error("Cannot expand user defined expression MACRO `{name}`")]
    ExpandExpressionMacro { name: String, pos: Pos },

    #[error("MACRO `{name}` cannot be used as a value")]
    NotAnExpressionMacro { name: String, pos: Pos },

    #[error("MACRO `{name}` takes {expected} argument(s) but {given} were given")]
    MacroArgumentCount {
        name: String,
        expected: usize,
        given: usize,
        pos: Pos,
    },

    #[error("Invalid signed byte argument value of {value}, must be between -127 and 128")]
    SignedByteRange { value: i64, pos: Pos },

    #[error("Invalid bit index value of {value}, must be between 0 and 7")]
    BitIndexRange { value: i64, pos: Pos },

    #[error("Invalid byte argument value of {value}, must be between -128 and 255")]
    ByteRange { value: i64, pos: Pos },

    #[error("Invalid word argument value of {value}, must be between -32767 and 65535")]
    WordRange { value: i64, pos: Pos },

    #[error("Only string values are allowed for fixed sized data storage")]
    FixedDataNotString { pos: Pos },

    #[error("String length of {len} exceeds allocated storage size of {size} bytes")]
    FixedDataOverflow { len: usize, size: usize, pos: Pos },

    #[error("Invalid byte argument value of {value} for data storage, must be between -128 and 255")]
    DataByteRange { value: i64, pos: Pos },

    #[error("Invalid word argument value of {value} for data storage, must be between -32767 and 65535")]
    DataWordRange { value: i64, pos: Pos },

    #[error("String value not allowed in numeric context")]
    UnexpectedString { pos: Pos },

    #[error("Invalid operands for `{op}`")]
    InvalidOperands { op: String, pos: Pos },

    #[error("Division by zero in constant expression")]
    DivisionByZero { pos: Pos },

    // Reference errors
    #[error("`{name}` could not be resolved")]
    UnresolvedSymbol { name: String, pos: Pos },

    #[error("Undefined MACRO `{name}`")]
    UndefinedMacro { name: String, pos: Pos },

    #[error("Circular reference while resolving `{name}`")]
    CircularReference { name: String, pos: Pos },

    // Address errors
    #[error("Invalid relative jump value of {value} bytes, must be -127 to 128 bytes")]
    RelativeJumpRange { value: i64, pos: Pos },

    #[error("Invalid jump address value of {value}, must be between 0 and 65535")]
    JumpAddressRange { value: i64, pos: Pos },

    #[error("Invalid jump offset, must point at the address of a valid instruction")]
    InvalidJumpTarget { pos: Pos },

    #[error("Section bank index on non-bankable segment {segment}")]
    BankOnUnbankedSegment { segment: Segment, pos: Pos },

    #[error("Section bank index out of range, must be in range 1-{max}")]
    SectionBankRange { bank: u32, max: u32, pos: Pos },

    #[error("Section offset out of range, must be in range {min:#06X}-{max:#06X}")]
    SectionOffsetRange {
        offset: usize,
        min: usize,
        max: usize,
        pos: Pos,
    },

    #[error("Section `{name}` overflows its segment, ends at {end:#06X} but must not exceed {limit:#06X}")]
    SectionOverflow {
        name: String,
        end: usize,
        limit: usize,
        pos: Pos,
    },

    // Macro errors
    #[error("Maximum macro expansion depth reached (32 levels) while expanding `{name}`")]
    MacroDepthExceeded { name: String, pos: Pos },

    // Include errors
    #[error("Failed to include binary data from `{path}`")]
    Include {
        path: PathBuf,
        source: std::io::Error,
        pos: Pos,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            DuplicateMacroArgument { .. } | SectionInMacro { .. } | UnknownSegment { .. } => {
                ErrorKind::Declaration
            }

            UndefinedMacroArgument { .. }
            | RegisterInExpressionMacro { .. }
            | ExpandBuiltinMacro { .. }
            | ExpandExpressionMacro { .. }
            | NotAnExpressionMacro { .. }
            | MacroArgumentCount { .. }
            | SignedByteRange { .. }
            | BitIndexRange { .. }
            | ByteRange { .. }
            | WordRange { .. }
            | FixedDataNotString { .. }
            | FixedDataOverflow { .. }
            | DataByteRange { .. }
            | DataWordRange { .. }
            | UnexpectedString { .. }
            | InvalidOperands { .. }
            | DivisionByZero { .. } => ErrorKind::Argument,

            UnresolvedSymbol { .. } | UndefinedMacro { .. } | CircularReference { .. } => {
                ErrorKind::Reference
            }

            RelativeJumpRange { .. }
            | JumpAddressRange { .. }
            | InvalidJumpTarget { .. }
            | BankOnUnbankedSegment { .. }
            | SectionBankRange { .. }
            | SectionOffsetRange { .. }
            | SectionOverflow { .. } => ErrorKind::Address,

            MacroDepthExceeded { .. } => ErrorKind::Macro,

            Include { .. } => ErrorKind::Include,
        }
    }

    pub fn pos(&self) -> &Pos {
        use Error::*;
        match self {
            DuplicateMacroArgument { pos, .. }
            | SectionInMacro { pos }
            | UnknownSegment { pos, .. }
            | UndefinedMacroArgument { pos, .. }
            | RegisterInExpressionMacro { pos, .. }
            | ExpandBuiltinMacro { pos, .. }
            | ExpandExpressionMacro { pos, .. }
            | NotAnExpressionMacro { pos, .. }
            | MacroArgumentCount { pos, .. }
            | SignedByteRange { pos, .. }
            | BitIndexRange { pos, .. }
            | ByteRange { pos, .. }
            | WordRange { pos, .. }
            | FixedDataNotString { pos }
            | FixedDataOverflow { pos, .. }
            | DataByteRange { pos, .. }
            | DataWordRange { pos, .. }
            | UnexpectedString { pos }
            | InvalidOperands { pos, .. }
            | DivisionByZero { pos }
            | UnresolvedSymbol { pos, .. }
            | UndefinedMacro { pos, .. }
            | CircularReference { pos, .. }
            | RelativeJumpRange { pos, .. }
            | JumpAddressRange { pos, .. }
            | InvalidJumpTarget { pos }
            | BankOnUnbankedSegment { pos, .. }
            | SectionBankRange { pos, .. }
            | SectionOffsetRange { pos, .. }
            | SectionOverflow { pos, .. }
            | MacroDepthExceeded { pos, .. }
            | Include { pos, .. } => pos,
        }
    }

    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, files: &IndexMap<String, Vec<String>>) {
        let pos = self.pos();

        cprintln!("<red,bold>error</>: {}", self);
        cprintln!("     <blue>--></> <underline>{}</>", pos);
        cprintln!("      <blue>|</>");

        let line_content = files
            .get(&pos.file)
            .and_then(|lines| lines.get(pos.line))
            .map(|s| s.as_str())
            .unwrap_or("");

        cprintln!(" <blue>{:>4} |</> {}", pos.line + 1, line_content);
        cprintln!("      <blue>|</>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let err = Error::SignedByteRange {
            value: 200,
            pos: Pos::new("main.gbs", 3, 0),
        };
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(err.pos().line, 3);

        let err = Error::InvalidJumpTarget {
            pos: Pos::default(),
        };
        assert_eq!(err.kind(), ErrorKind::Address);
    }

    #[test]
    fn pos_display() {
        let pos = Pos::new("main.gbs", 0, 4);
        assert_eq!(pos.to_string(), "main.gbs:1:5");
    }
}
