use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{
        errors::ApiError,
        fields::{AuthContext, User, UserId},
    },
    repository::{delete_user, fetch_users, update_user_details, update_user_role, FetchUserQuery},
};
use axum::{
    extract::{rejection::FormRejection, Query, State},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::{deserialize_bool_from_anything, deserialize_number_from_string};
use sqlx::PgPool;

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct QueryParams {
    search: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    has_next: bool,
    has_prev: bool,
    current_page: i64,
    total_pages: i64,
    total: i64,
}

#[derive(Serialize)]
pub struct GetUsersResponse {
    users: Vec<User>,
    #[serde(flatten)]
    pagination: Pagination,
}

/// Form body posted by the users admin page; `action` picks the variant.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    UpdateRole {
        #[serde(deserialize_with = "deserialize_number_from_string")]
        user_id: i64,
        #[serde(deserialize_with = "deserialize_bool_from_anything")]
        is_admin: bool,
    },
    DeleteUser {
        #[serde(deserialize_with = "deserialize_number_from_string")]
        user_id: i64,
    },
    EditUser {
        #[serde(deserialize_with = "deserialize_number_from_string")]
        user_id: i64,
        #[serde(default)]
        name: String,
        #[serde(default)]
        email: String,
    },
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ActionResponse {
    pub message: String,
}

/// Normalises `page`/`limit` and returns `(page, limit, offset)`. Pages so far
/// out that the offset would overflow are rejected.
fn page_window(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64, i64), ApiError> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, MAX_PAGE_SIZE);
    let skip = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| ApiError::ValidationError("page is out of range".to_string()))?;
    Ok((page, limit, skip))
}

pub async fn get_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryParams>,
) -> Result<Json<GetUsersResponse>, ApiError> {
    let pool = state.get_pool();
    let (page, limit, skip) = page_window(query.page, query.limit)?;

    let query = FetchUserQuery {
        search: query.search,
        limit,
        skip,
    };

    let (users, count) = fetch_users(&pool, query).await?;

    let total_pages = ((count + limit - 1) / limit).max(1);
    Ok(Json(GetUsersResponse {
        users: users.into_iter().map(User::from).collect(),
        pagination: Pagination {
            has_next: page < total_pages,
            has_prev: page > 1,
            current_page: page,
            total_pages,
            total: count,
        },
    }))
}

pub async fn post_user_action(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthContext>,
    form: Result<Form<AdminAction>, FormRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let Form(action) = form.map_err(|e| ApiError::ValidationError(e.body_text()))?;
    tracing::info!("admin {} >>> {:?}", principal.user_id, action);

    let message = apply_action(&state.get_pool(), action).await?;
    Ok(Json(ActionResponse { message }))
}

async fn apply_action(pool: &PgPool, action: AdminAction) -> Result<String, ApiError> {
    match action {
        AdminAction::UpdateRole { user_id, is_admin } => {
            update_user_role(pool, UserId::from(user_id), is_admin).await?;
            Ok(if is_admin {
                "User promoted to admin".to_string()
            } else {
                "User admin rights removed".to_string()
            })
        }
        AdminAction::DeleteUser { user_id } => {
            let removed = delete_user(pool, UserId::from(user_id)).await?;
            Ok(format!("User deleted along with {} contributions", removed))
        }
        AdminAction::EditUser {
            user_id,
            name,
            email,
        } => {
            let (name, email) = validate_details(&name, &email)?;
            update_user_details(pool, UserId::from(user_id), name, email).await?;
            Ok("User details updated".to_string())
        }
    }
}

fn validate_details<'a>(name: &'a str, email: &'a str) -> Result<(&'a str, &'a str), ApiError> {
    let (name, email) = (name.trim(), email.trim());
    if name.is_empty() || email.is_empty() {
        return Err(ApiError::ValidationError(
            "Name and email are required".to_string(),
        ));
    }
    Ok((name, email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None).unwrap(), (1, 10, 0));
        assert_eq!(page_window(Some(-3), Some(0)).unwrap(), (1, 1, 0));
        assert_eq!(page_window(Some(3), Some(20)).unwrap(), (3, 20, 40));
        assert_eq!(
            page_window(Some(2), Some(i64::MAX)).unwrap(),
            (2, MAX_PAGE_SIZE, MAX_PAGE_SIZE)
        );
    }

    #[test]
    fn page_window_rejects_overflowing_offsets() {
        assert_eq!(
            page_window(Some(i64::MAX), Some(10)).unwrap_err(),
            ApiError::ValidationError("page is out of range".to_string())
        );
        assert!(page_window(Some(i64::MAX / 10 + 2), Some(10)).is_err());
        assert!(page_window(Some(i64::MAX / 10), Some(10)).is_ok());
    }

    fn decode(body: &str) -> Result<AdminAction, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(body)
    }

    #[test]
    fn role_toggle_form_is_decoded() {
        assert_eq!(
            decode("action=update_role&user_id=12&is_admin=1").unwrap(),
            AdminAction::UpdateRole {
                user_id: 12,
                is_admin: true
            }
        );
        assert_eq!(
            decode("action=update_role&user_id=12&is_admin=0").unwrap(),
            AdminAction::UpdateRole {
                user_id: 12,
                is_admin: false
            }
        );
    }

    #[test]
    fn edit_form_without_fields_decodes_to_empty_strings() {
        assert_eq!(
            decode("action=edit_user&user_id=3").unwrap(),
            AdminAction::EditUser {
                user_id: 3,
                name: String::new(),
                email: String::new(),
            }
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(decode("action=drop_table&user_id=3").is_err());
        assert!(decode("user_id=3").is_err());
    }

    #[test]
    fn blank_name_or_email_fails_validation() {
        for (name, email) in [("", "a@b.org"), ("Ada", ""), ("   ", "a@b.org"), ("", "")] {
            assert!(matches!(
                validate_details(name, email),
                Err(ApiError::ValidationError(_))
            ));
        }
        assert_eq!(
            validate_details(" Ada ", "ada@example.org ").unwrap(),
            ("Ada", "ada@example.org")
        );
    }
}
