//! Standard filter library for Liquid-flavoured templates, plus the loose
//! value model the filters operate on.

mod date;
pub mod error;
pub mod number;
pub mod standard;
pub mod value;

pub use error::FilterError;
pub use number::{Number, to_index, to_integer, to_number};
pub use standard::{FilterArgs, StandardFilter};
pub use value::{Object, Value};

/// Looks up `name` and applies it. `None` when no such filter exists.
pub fn apply_filter(
    name: &str,
    value: &Value,
    args: &FilterArgs,
) -> Option<Result<Value, FilterError>> {
    StandardFilter::from_name(name).map(|filter| filter.apply(value, args))
}
