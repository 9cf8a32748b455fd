pub mod cache;
pub mod resolver;

pub use cache::RoleCache;
pub use resolver::{ResolutionError, RoleResolver, StaticRoleResolver};
