use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::utils::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Organizer,
    Admin,
}

/// Caller identity, supplied by the upstream auth layer as trusted headers.
/// Token issuance and verification live outside this service.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Organizer-of-record or admin.
    pub fn can_manage(&self, organizer_id: Uuid) -> bool {
        self.is_admin() || self.id == organizer_id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                AppError::Auth(format!("Missing or invalid {USER_ID_HEADER} header"))
            })?;

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            Some(r) if r.eq_ignore_ascii_case("organizer") => Role::Organizer,
            _ => Role::User,
        };

        Ok(CurrentUser { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_manages_everything() {
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        assert!(admin.can_manage(Uuid::new_v4()));
    }

    #[test]
    fn organizer_manages_only_their_own() {
        let id = Uuid::new_v4();
        let organizer = CurrentUser {
            id,
            role: Role::Organizer,
        };
        assert!(organizer.can_manage(id));
        assert!(!organizer.can_manage(Uuid::new_v4()));
    }
}
