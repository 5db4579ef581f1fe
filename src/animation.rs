pub mod ease;
pub mod spring;
