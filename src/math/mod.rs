pub mod matrix;

pub use matrix::Matrix;
pub(crate) use matrix::sample_standard_normal;
