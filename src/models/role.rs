// src/models/role.rs

pub const ADMIN_ROLE: &str = "Admin";
pub const USER_ROLE: &str = "User";

/// Roles created at startup if missing: (name, description).
pub const DEFAULT_ROLES: [(&str, &str); 2] = [
    (ADMIN_ROLE, "Superuser with all permissions."),
    (USER_ROLE, "General user with limited access."),
];
