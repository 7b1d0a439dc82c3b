pub mod policy;
pub mod strategy;

// Re-exports for convenience
pub use policy::{categories_for_zoom, PropertyTier, ZoomPolicy};
pub use strategy::{choose_strategy, QueryStrategy};
