mod document;
mod logger;
mod store;

pub use document::*;
pub use logger::*;
pub use store::*;
