use serde::Deserialize;
use validator::Validate;

use crate::dtos::auth_dtos::not_blank;
use crate::models::page::PageRequest;
use crate::models::user::UserUpdate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,

    #[validate(
        length(min = 1, max = 150, message = "Name must be between 1 and 150 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        UserUpdate {
            email: req.email,
            name: req.name,
        }
    }
}

/// Query string accepted by the user listing.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub is_active: Option<bool>,
    pub deleted: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Filter handed to a user directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Restricts results to this id when set.
    pub owner_id: Option<String>,
    pub is_active: Option<bool>,
    pub deleted: Option<bool>,
    pub search: Option<String>,
}

impl UserQuery {
    pub fn into_parts(self, owner_id: Option<String>) -> (UserFilter, PageRequest) {
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        (
            UserFilter {
                owner_id,
                is_active: self.is_active,
                deleted: self.deleted,
                search,
            },
            PageRequest::new(self.page, self.page_size),
        )
    }
}
