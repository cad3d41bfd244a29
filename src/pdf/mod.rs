// src/pdf/mod.rs
//! Certificate PDF rendering.

pub mod renderer;

pub use renderer::{CertificateRenderer, RenderError, TemplateRenderer};
