pub mod bearer_auth;
pub mod http;
pub mod role_augment;
