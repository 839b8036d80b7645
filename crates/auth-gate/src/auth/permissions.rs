//! Permission enforcement.

use crate::auth::claims::TokenClaims;
use crate::errors::AuthError;

/// Require that validated claims grant `permission`.
///
/// Membership is exact and case-sensitive. There is no wildcard or prefix
/// expansion.
///
/// # Errors
///
/// - `AuthError::PermissionsClaimMissing` - no usable permissions list
/// - `AuthError::PermissionDenied` - the permission is not in the list
pub fn require_permission(claims: &TokenClaims, permission: &str) -> Result<(), AuthError> {
    if claims.permissions.is_none() {
        tracing::debug!(target: "gate.auth.permissions", "Token rejected: permissions claim unusable");
        return Err(AuthError::PermissionsClaimMissing);
    }

    if claims.has_permission(permission) {
        Ok(())
    } else {
        tracing::debug!(
            target: "gate.auth.permissions",
            required = %permission,
            "Token rejected: permission not granted"
        );
        Err(AuthError::PermissionDenied)
    }
}
