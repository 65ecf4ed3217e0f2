#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    DivisionByZero,
    TypeMismatch(&'static str),
    InvalidNumber(String),
    InvalidFormat(String),
    MissingArgument {
        filter: &'static str,
        argument: &'static str,
    },
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::DivisionByZero => write!(f, "division by zero"),
            FilterError::TypeMismatch(expected) => write!(f, "type mismatch: expected {expected}"),
            FilterError::InvalidNumber(text) => write!(f, "invalid number '{text}'"),
            FilterError::InvalidFormat(format) => write!(f, "invalid date format '{format}'"),
            FilterError::MissingArgument { filter, argument } => {
                write!(f, "filter '{filter}' requires argument '{argument}'")
            }
        }
    }
}

impl std::error::Error for FilterError {}
