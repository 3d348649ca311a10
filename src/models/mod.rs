pub mod event;
pub mod incident;
pub mod component;
pub mod notification;

pub use event::*;
pub use incident::*;
pub use component::*;
pub use notification::*;
