mod convert;
mod feed;
mod notify;
mod scheduler;
mod store;

pub use convert::*;
pub use feed::*;
pub use notify::*;
pub use scheduler::*;
pub use store::*;
