pub mod decoder;
pub mod event;
pub mod filter;
pub mod lanes;
pub mod raw;

pub use decoder::*;
pub use event::*;
pub use filter::*;
pub use lanes::*;
pub use raw::*;
