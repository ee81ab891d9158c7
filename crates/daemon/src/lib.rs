mod domains;
mod utils;

pub use domains::*;
pub use utils::*;
