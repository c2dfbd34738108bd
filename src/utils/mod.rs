pub mod interval;

pub use interval::{format_interval, parse_interval, IntervalError};
