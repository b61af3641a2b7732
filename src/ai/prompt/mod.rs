//! Prompt Template System
//!
//! Handlebars templates on disk with a declared variable contract.
//!
//! ## Layout
//!
//! - `template`: header metadata parsing, render context, compiled templates
//! - `cache`: bounded LRU of compiled templates
//! - `store`: name resolution, loading and rendering

mod cache;
mod store;
mod template;

pub use cache::{CacheStats, TemplateCache};
pub use store::TemplateStore;
pub use template::{CompiledTemplate, OptionalVariable, Template, TemplateContext};
