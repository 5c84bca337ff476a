pub mod hash;
pub mod size;
pub mod validation;
