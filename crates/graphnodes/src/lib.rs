//! Standard node library
//!
//! Leaf nodes for constants, arithmetic, boolean reductions and console
//! output. Every node here is stateless apart from what it shows or prints.

mod boolean;
mod constant;
mod io;
mod math;

pub use boolean::Truthiness;
pub use constant::Constant;
pub use io::{ConsolePrinter, Display};
pub use math::{Abs, Arithmetic, Product, Sum};
