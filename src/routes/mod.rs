/// Router Module Index
///
/// Routes are split by who may call them. Access control is applied per module: the
/// authenticated and admin API routes rely on the `AuthUser` / `AdminUser` extractors, the
/// page routes sit behind the route guard middleware.

/// Routes accessible to everyone (read-only records, sign-in).
pub mod public;

/// Routes that require a resolved principal.
pub mod authenticated;

/// Record mutations and uploads, restricted to the admin role.
pub mod admin;

/// Visitor and admin pages, classified and redirected by the route guard.
pub mod pages;
