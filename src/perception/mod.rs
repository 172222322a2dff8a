pub mod screenshot;
pub mod types;
