pub mod gorilla;
pub mod health;
pub mod keys;
pub mod pulse;
