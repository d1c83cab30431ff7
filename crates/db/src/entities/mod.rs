pub mod image;
pub mod pod;
