use crate::error::FilterError;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(value) => value == 0,
            Number::Float(value) => value == 0.0,
        }
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        match value {
            Number::Int(value) => Value::Int(value),
            Number::Float(value) => Value::Float(value),
        }
    }
}

/// Numeric form of a scalar. Strings parse as an integer first, then as a
/// float; a string that is neither is an error.
pub fn to_number(value: &Value) -> Result<Number, FilterError> {
    match value {
        Value::Int(value) => Ok(Number::Int(*value)),
        Value::Float(value) => Ok(Number::Float(*value)),
        Value::Bool(value) => Ok(Number::Int(i64::from(*value))),
        Value::Str(text) => parse_number(text),
        _ => Err(FilterError::TypeMismatch("number")),
    }
}

fn parse_number(text: &str) -> Result<Number, FilterError> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(Number::Int(value));
    }
    trimmed
        .parse::<f64>()
        .map(Number::Float)
        .map_err(|_| FilterError::InvalidNumber(text.to_string()))
}

/// Lenient integer coercion: unparsable strings and missing values count
/// as zero, floats truncate. Collections are still rejected.
pub fn to_integer(value: &Value) -> Result<i64, FilterError> {
    match value {
        Value::List(_) | Value::Map(_) | Value::Object(_) => {
            Err(FilterError::TypeMismatch("integer"))
        }
        Value::Undefined | Value::None => Ok(0),
        other => Ok(match to_number(other) {
            Ok(Number::Int(value)) => value,
            Ok(Number::Float(value)) => value as i64,
            Err(_) => 0,
        }),
    }
}

/// Strict integer coercion used for positions and lengths.
pub fn to_index(value: &Value) -> Result<i64, FilterError> {
    match to_number(value)? {
        Number::Int(value) => Ok(value),
        Number::Float(value) => Ok(value as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_prefer_integers() {
        assert_eq!(to_number(&Value::from("17")), Ok(Number::Int(17)));
        assert_eq!(to_number(&Value::from("-17.42")), Ok(Number::Float(-17.42)));
        assert_eq!(to_number(&Value::from(" 3 ")), Ok(Number::Int(3)));
    }

    #[test]
    fn unparsable_strings_are_errors() {
        assert_eq!(
            to_number(&Value::from("foo")),
            Err(FilterError::InvalidNumber("foo".to_string()))
        );
        assert_eq!(
            to_number(&Value::None),
            Err(FilterError::TypeMismatch("number"))
        );
    }

    #[test]
    fn lenient_integers() {
        assert_eq!(to_integer(&Value::from("a")), Ok(0));
        assert_eq!(to_integer(&Value::Float(3.9)), Ok(3));
        assert_eq!(to_integer(&Value::None), Ok(0));
        assert!(to_integer(&Value::List(vec![])).is_err());
    }
}
