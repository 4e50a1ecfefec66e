pub mod reconciling;

pub use reconciling::ReconcilingSink;
