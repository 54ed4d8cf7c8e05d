//! tracescope - live audio oscilloscope core
//!
//! Renders a continuously captured mono signal either as a scrolling
//! free-running trace or as an averaged trigger view with a draggable
//! threshold. The render core only depends on the `SampleSource` and
//! `DrawSurface` contracts; the viewer binary wires it to cpal and egui.

pub mod audio;
pub mod error;
pub mod events;
pub mod render;
pub mod session;
pub mod settings;

pub use error::ScopeError;
pub use events::{EventBus, ScopeEvent};
pub use session::Session;
pub use settings::AppSettings;
