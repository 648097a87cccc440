//! Caller checks shared by the reservation use cases.

use crate::domain::foundation::AuthenticatedUser;
use crate::domain::reservation::ReservationError;

/// Seats can only be held or bought by users who confirmed their account.
pub(crate) fn ensure_activated(user: &AuthenticatedUser) -> Result<(), ReservationError> {
    if !user.activated {
        return Err(ReservationError::NotActivated);
    }
    Ok(())
}

pub(crate) fn validate_version(version: Option<i64>) -> Result<(), ReservationError> {
    match version {
        Some(v) if v < 0 => Err(ReservationError::validation(
            "version",
            "must be zero or greater",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    #[test]
    fn inactive_users_are_rejected() {
        let user = AuthenticatedUser::new(UserId::new("u").unwrap(), "u@x.test", None, false);
        assert_eq!(ensure_activated(&user), Err(ReservationError::NotActivated));
    }

    #[test]
    fn negative_versions_are_invalid() {
        assert!(validate_version(None).is_ok());
        assert!(validate_version(Some(0)).is_ok());
        assert!(matches!(
            validate_version(Some(-1)),
            Err(ReservationError::ValidationFailed { field, .. }) if field == "version"
        ));
    }
}
