pub mod health;
pub mod limits;
pub mod upload;
