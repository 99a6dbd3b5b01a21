/// Router Module Index
///
/// Splits routing by access level. The guard for each group is attached where the group is
/// mounted, so no handler has to remember to check it.

/// Health check and the credential endpoints (signup, register, login).
pub mod public;

/// Routes that only need a verified token.
pub mod authenticated;

/// The CRUD routes of every mounted resource, each wrapped in its own access policy.
pub mod resources;
