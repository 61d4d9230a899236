pub mod rotation;
pub mod scale;
pub mod vec;

pub use rotation::*;
pub use scale::*;
pub use vec::*;
