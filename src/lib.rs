//! Train, persist and evaluate small convolutional digit classifiers on MNIST.
//!
//! The heavy lifting (autodiff, convolutions, optimizers, the training loop and
//! the record format) is done by [burn]; this crate wires the pieces into a
//! load → preprocess → train → save → reload → evaluate → show pipeline.

pub mod data;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod renderer;
pub mod show;
pub mod training;

pub use error::Error;
