//! Scope Graph - name binding model for closure analysis
//!
//! Builders open a frame per module, function, clause, closure,
//! comprehension and branch, record the symbols each frame binds, and
//! resolve variable reads outward through the chain.

pub mod graph;
pub mod resolver;

pub use graph::{Binding, ScopeFrame, ScopeGraph, ScopeId, ScopeKind};
pub use resolver::{CaptureResolver, FrameMapping};
