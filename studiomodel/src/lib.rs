//! Pure Rust decoder for Studio Model (`.mdl`, version 10) character files.
//!
//! This crate is renderer-agnostic and IO-free: hand it the bytes of a model and it returns a
//! [`Model`] with the skeleton, skinned geometry, RGBA textures and decoded animation frames.
//! Building scenes, uploading GPU resources and playing animations are left to the caller.
//!
//! ```no_run
//! let bytes = std::fs::read("scientist.mdl")?;
//! let model = studiomodel::Model::from_bytes(&bytes)?;
//! for sequence in &model.sequences {
//!     println!("{}: {} frames", sequence.label, sequence.frame_count());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

mod binary;
mod error;
mod model;
mod version;

pub mod animation;
pub mod cursor;
pub mod math;
pub mod mesh;
pub mod texture;

pub use animation::CurveStrategy;
pub use binary::DecodeOptions;
pub use error::*;
pub use model::*;
pub use version::*;

#[cfg(test)]
mod test_support;
