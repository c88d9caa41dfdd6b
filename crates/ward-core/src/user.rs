//! User identifier normalization.

/// Canonical form of a user identifier.
///
/// User identifiers compare case-insensitively everywhere in the registry.
/// Every public entry point that accepts a user id must pass it through this
/// function; internal storage and indices only ever hold normalized ids.
#[must_use]
pub fn normalize_user(user: &str) -> String {
    user.to_lowercase()
}
