pub mod actions;
pub mod identity;
pub mod join_code;
pub mod profiles;
pub mod roles;
