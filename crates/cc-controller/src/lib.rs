pub mod controller;
pub mod events;
mod metrics;

pub use controller::Controller;
pub use events::ControllerEvent;
