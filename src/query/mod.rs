//! Request-scoped data cache and its transfer to the browser.
//!
//! # Data Flow
//! ```text
//! Loader
//!     → client.rs (ensure/set query data on a per-request QueryClient)
//!     → dehydrate.rs (emit queries not yet sent in their current state)
//!     → render (embedded as JSON in the document)
//! ```

pub mod client;
pub mod dehydrate;

pub use client::{Query, QueryClient, QueryKey, QueryState, QueryStatus};
pub use dehydrate::{fingerprint, DehydratedQuery, DehydratedState, DehydrationRegistry};
