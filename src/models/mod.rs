pub mod order;
pub mod product;
pub mod sync;

pub use order::*;
pub use product::*;
pub use sync::*;
