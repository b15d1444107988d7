pub mod network;
pub mod spec;

pub use network::{Network, NetworkGradients};
pub use spec::{LayerSpec, NetworkSpec};
