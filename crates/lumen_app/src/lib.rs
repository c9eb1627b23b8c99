//! Lumen App
//!
//! Window and input integration for the renderer.
//!
//! - [`input`]: platform-independent keys and the demo light rig they drive
//! - [`winit`](crate::winit): the winit runner (`winit` feature)

pub mod input;

#[cfg(feature = "winit")]
pub mod winit;

pub use input::{Key, LightRig, PointLight};

#[cfg(feature = "winit")]
pub use self::winit::{App, AppHandler, FrameState};
