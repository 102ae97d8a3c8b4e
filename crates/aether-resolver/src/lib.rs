//! Dependency resolution engine: an arena-backed dependency graph built
//! by a depth-first memoised collector (§4.G), reduced to a conflict-free
//! tree by the nearest-wins (or convergence-enforcing) conflict resolver
//! (§4.H).

pub mod arena;
pub mod collector;
pub mod conflict;
