//! Remote access.
//!
//! Two independent channels reach the server:
//!
//! - **Query API** ([`QueryApi`]): JSON over HTTPS for definitions, policies,
//!   custom groups, manifests and user group lookups.
//! - **Command channel** ([`CommandChannel`]): a session running the
//!   appliance's command line tool for views, dashboards, reports, super
//!   metrics and metric configs.
//!
//! Both are traits so the synchronizer can be driven by in-memory fakes.

pub mod channel;
pub mod query;
pub mod rest;
pub mod ssh;

pub use channel::{ChannelError, ChannelResult, ChannelSession, CleanupGuard, CommandChannel};
pub use query::{DependentDefinitions, QueryApi, RemoteError, RemoteResult};
pub use rest::RestClient;
pub use ssh::SshChannel;
