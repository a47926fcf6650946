mod atomic;
mod function;
mod item;
mod map;

pub use atomic::{Atomic, Numeric, format_double, parse_double, promote};
pub use function::Function;
pub use item::Item;
pub use map::{ItemMap, MapKey};
