//! Document rendering.
//!
//! # Data Flow
//! ```text
//! Route handler builds a Document
//!     → templates.rs (shell from minijinja templates)
//!     → stream.rs (flush shell, stream deferred sections, enforce timeout)
//!     → bot.rs decides streaming vs. buffered output
//! ```

pub mod bot;
pub mod stream;
pub mod templates;

pub use stream::{
    Document, RenderError, RenderMode, RenderState, RenderedDocument, Section, SectionError,
    StreamingRenderer, DOCUMENT_TAIL,
};
pub use templates::Templates;
