use crate::{error::ApiError, model::role::Role};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Identity of the caller, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(ApiError::Unauthorized("Missing token".into()))),
        }
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_location_manager(&self) -> Result<(), ApiError> {
        if self.role.manages_work_locations() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin/Management only".into()))
        }
    }

    pub fn require_attendance(&self) -> Result<(), ApiError> {
        if self.role.records_attendance() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("This account does not record attendance".into()))
        }
    }

    /// Which user's history the caller may read: their own unless privileged.
    pub fn attendance_scope(&self, requested: Option<u64>) -> Option<u64> {
        if self.role.views_all_attendance() {
            requested
        } else {
            Some(self.user_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 3,
            username: "someone".into(),
            role,
        }
    }

    #[test]
    fn staff_only_sees_own_history() {
        assert_eq!(user(Role::Staff).attendance_scope(Some(99)), Some(3));
        assert_eq!(user(Role::Staff).attendance_scope(None), Some(3));
        assert_eq!(user(Role::Management).attendance_scope(Some(99)), Some(99));
        assert_eq!(user(Role::Admin).attendance_scope(None), None);
    }

    #[test]
    fn guards_follow_role_policies() {
        assert!(user(Role::Doctor).require_location_manager().is_err());
        assert!(user(Role::Management).require_location_manager().is_ok());
        assert!(user(Role::Admin).require_attendance().is_err());
        assert!(user(Role::Management).require_admin().is_err());
    }
}
