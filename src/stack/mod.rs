//! The symbolic operand-value stack.

mod value_stack;

pub use value_stack::{MetaValue, ValueSource, ValueStack};
