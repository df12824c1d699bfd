use storefront_core::UserId;

/// Authenticated user for a request.
///
/// Inserted by the auth middleware; present on every protected route. The
/// cart surface is strictly user-scoped, so this is the only identity a
/// handler ever sees.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
