//! SBaGenX core: a sequenced brainwave-entrainment audio generator.
//!
//! This crate implements the period compiler, the real-time voice
//! mixer, and the looping mix-input engine described in the project's
//! design notes. It deliberately stops short of a full CLI: platform
//! audio sinks, input decoders, and argument parsing are the
//! embedder's job (see [`input_buffer::SampleSource`] and
//! [`mixer::Engine`]'s buffer-oriented API).

pub mod amp_adjust;
pub mod clock;
pub mod error;
pub mod func_curve;
pub mod input_buffer;
pub mod looper;
pub mod mix_mod;
pub mod mixer;
pub mod noise;
pub mod parser;
pub mod preprogrammed;
pub mod scheduler;
pub mod voice;
pub mod wavetable;

pub use error::{Result, SbagenError};
