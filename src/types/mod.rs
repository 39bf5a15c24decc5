mod triangle;
pub use triangle::*;
