//! Generative arranger: assembles long, non-repeating audio from a fixed song's
//! branch recordings and pre-cut slices, bar by bar.
//!
//! Build a [`branch::SongLayout`] with [`builder::LayoutBuilder`], validate the
//! inputs into a [`context::AssemblyContext`], then run a
//! [`sequencer::Sequencer`] with any seeded [`rand::Rng`]. Identical seeds and
//! inputs produce identical output.

pub mod branch;
pub mod builder;
pub mod catalog;
pub mod context;
pub mod error;
#[doc(hidden)]
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod policy;
pub mod sequencer;
pub mod sink;
pub mod source;
pub mod states;
pub mod timeline;

pub use error::{AssemblyError, ConfigError, Result};
pub use sequencer::{assemble, PlayEvent, Rendered, Sequencer};
