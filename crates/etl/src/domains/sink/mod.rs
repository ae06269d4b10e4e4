mod sheets;
mod table;
mod writer;

pub use sheets::*;
pub use table::*;
pub use writer::*;
