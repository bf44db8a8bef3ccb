//! Pipeline stages for request-to-artifact rendering.
//!
//! Each submodule implements exactly one step; data only flows forward.
//!
//! ## Data Flow
//!
//! ```text
//! params ──▶ source ──▶ template ──▶ watermark ──▶ engine
//! (merge)   (choose+GET) (minijinja) (non-prod)   (Chrome)
//! ```
//!
//! 1. [`params`]    — merge query and body into [`params::RequestParams`]
//! 2. [`source`]    — collapse the three source fields into one
//!    [`source::ContentSource`]; the only stage with network I/O
//! 3. [`template`]  — render with a per-request minijinja environment
//! 4. [`watermark`] — literal-offset title/style injection
//! 5. [`engine`]    — PDF/screenshot via headless Chrome in `spawn_blocking`

pub mod engine;
pub mod params;
pub mod source;
pub mod template;
pub mod watermark;
