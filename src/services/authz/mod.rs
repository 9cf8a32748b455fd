pub mod authority;
pub mod catalog;
pub mod checker;
pub mod context;
pub mod snapshot;
pub mod trusted;

pub use authority::{AuthorityError, AuthorizationAuthority, StaticAuthority};
pub use catalog::{CatalogError, PermissionCatalog, PermissionCatalogBuilder};
pub use checker::{PermissionError, ServicePermissionChecker};
pub use context::{AuthorizationContext, AuthzError, AuthzService};
pub use snapshot::{AuthorizationSnapshot, PermissionGrant};
pub use trusted::{TrustedCall, TrustedScope};
