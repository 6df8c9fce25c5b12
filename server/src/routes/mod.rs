pub mod chatting;
pub mod health;
pub mod testing;
pub mod tooling;
