pub mod clock;
pub mod event_bus;
pub mod frame;
pub mod manual_clock;
pub mod scheduler;

pub use clock::*;
pub use event_bus::*;
pub use frame::*;
pub use manual_clock::*;
pub use scheduler::*;
