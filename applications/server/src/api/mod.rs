/// API route modules
pub mod auth;
pub mod health;
pub mod me;
pub mod player;
pub mod track;
