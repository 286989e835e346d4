pub mod action;
pub mod auth;
pub mod profile;
pub mod role;
pub mod user;
