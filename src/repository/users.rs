use crate::domain::{
    errors::DatabaseError,
    fields::{AuthContext, UserId},
    model::DbUser,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

pub struct FetchUserQuery {
    pub search: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

const UNIQUE_VIOLATION: &str = "23505";

pub async fn fetch_users(
    pool: &PgPool,
    query: FetchUserQuery,
) -> Result<(Vec<DbUser>, i64), DatabaseError> {
    tracing::info!("limit >>> {} offset >>> {}", query.limit, query.skip);
    let mut select_query = QueryBuilder::new(
        "select a.id, a.name, a.email, a.is_admin, a.referred_by, a.created_at as created_on, \
         (select count(*) from users as b where b.referred_by = a.id) as referrals, \
         (select sum(c.amount) from contributions as c where c.user_id = a.id) as contributed \
         from users as a ",
    );
    append_search_param_to_query(&mut select_query, &query, false, false);

    let mut count_query = QueryBuilder::new("select count(*) as count from users as a ");
    append_search_param_to_query(&mut count_query, &query, true, true);

    let users = select_query
        .build_query_as::<DbUser>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("getting list of user failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    let count = count_query.build().fetch_one(pool).await.map_err(|e| {
        tracing::error!("fetch total user count failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok((users, count.get("count")))
}

pub(crate) fn append_search_param_to_query(
    builder: &mut QueryBuilder<'_, Postgres>,
    query: &FetchUserQuery,
    skip_ordering: bool,
    skip_pagination: bool,
) {
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" where (a.name ilike ");
        builder.push_bind(pattern.clone());
        builder.push(" or a.email ilike ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if !skip_ordering {
        builder.push(" order by a.created_at desc, a.id desc ");
    }

    if !skip_pagination {
        builder.push(" limit ");
        builder.push_bind(query.limit);

        builder.push(" offset ");
        builder.push_bind(query.skip);
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Loads the caller's current role. `None` when the user no longer exists.
pub async fn fetch_principal(
    pool: &PgPool,
    user_id: UserId,
) -> Result<Option<AuthContext>, DatabaseError> {
    let row = sqlx::query("select id, is_admin from users where id = $1")
        .bind(user_id.inner())
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("loading principal failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    Ok(row.map(|row| AuthContext {
        user_id: UserId::from(row.get::<i64, _>("id")),
        is_admin: row.get("is_admin"),
    }))
}

pub async fn update_user_role(
    pool: &PgPool,
    user_id: UserId,
    is_admin: bool,
) -> Result<(), DatabaseError> {
    let result = sqlx::query("update users set is_admin = $1 where id = $2")
        .bind(is_admin)
        .bind(user_id.inner())
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!("updating user role failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }

    Ok(())
}

pub async fn update_user_details(
    pool: &PgPool,
    user_id: UserId,
    name: &str,
    email: &str,
) -> Result<(), DatabaseError> {
    let result = sqlx::query("update users set name = $1, email = $2 where id = $3")
        .bind(name)
        .bind(email)
        .bind(user_id.inner())
        .execute(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                DatabaseError::DuplicateEmail
            }
            e => {
                tracing::error!("updating user failed >>> {}", e);
                DatabaseError::ServerError
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }

    Ok(())
}

/// Deletes a user and their contributions in one transaction. Users that
/// referred anyone are kept. Returns how many contributions went with them.
pub async fn delete_user(pool: &PgPool, user_id: UserId) -> Result<u64, DatabaseError> {
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("starting delete transaction failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    let target = sqlx::query("select id from users where id = $1 for update")
        .bind(user_id.inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("locking user for delete failed >>> {}", e);
            DatabaseError::ServerError
        })?;
    if target.is_none() {
        return Err(DatabaseError::NotFound);
    }

    let dependents: i64 = sqlx::query("select count(*) as count from users where referred_by = $1")
        .bind(user_id.inner())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("counting referrals failed >>> {}", e);
            DatabaseError::ServerError
        })?
        .get("count");
    if dependents > 0 {
        tracing::info!("user {} has {} referrals, not deleting", user_id, dependents);
        return Err(DatabaseError::HasDependents);
    }

    let removed = sqlx::query("delete from contributions where user_id = $1")
        .bind(user_id.inner())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("deleting contributions failed >>> {}", e);
            DatabaseError::ServerError
        })?
        .rows_affected();

    sqlx::query("delete from users where id = $1")
        .bind(user_id.inner())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("deleting user failed >>> {}", e);
            DatabaseError::ServerError
        })?;

    tx.commit().await.map_err(|e| {
        tracing::error!("committing delete failed >>> {}", e);
        DatabaseError::ServerError
    })?;

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(search: Option<&str>) -> FetchUserQuery {
        FetchUserQuery {
            search: search.map(String::from),
            skip: 20,
            limit: 10,
        }
    }

    #[test]
    fn search_term_is_bound() {
        let mut builder = QueryBuilder::new("select * from users as a ");
        append_search_param_to_query(&mut builder, &query(Some("o'brien")), false, false);
        let sql = builder.sql();

        assert!(!sql.contains("o'brien"));
        assert!(sql.contains("a.name ilike $1 or a.email ilike $2"));
        assert!(sql.ends_with(" limit $3 offset $4"));
    }

    #[test]
    fn count_query_skips_ordering_and_pagination() {
        let mut builder = QueryBuilder::new("select count(*) as count from users as a ");
        append_search_param_to_query(&mut builder, &query(None), true, true);
        assert_eq!(builder.sql(), "select count(*) as count from users as a ");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
