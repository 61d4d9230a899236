pub mod config;
pub mod drag;
pub mod engine;
pub mod events;
pub mod markers;
pub mod projection;
pub mod render;
pub mod routes;
pub mod spinner;
pub mod style;
pub mod transition;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, GlobeConfig};
pub use drag::*;
pub use engine::*;
pub use events::*;
pub use markers::*;
pub use projection::*;
pub use render::*;
pub use routes::*;
pub use spinner::*;
pub use style::*;
pub use transition::*;
