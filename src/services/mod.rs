pub mod authz;
pub mod cache;
pub mod roles;
pub mod token;
