use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    RestaurantOwner,
    DeliveryPartner,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::RestaurantOwner => "RESTAURANT_OWNER",
            Role::DeliveryPartner => "DELIVERY_PARTNER",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(Role::Customer),
            "RESTAURANT_OWNER" => Ok(Role::RestaurantOwner),
            "DELIVERY_PARTNER" => Ok(Role::DeliveryPartner),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("'{}' is not a valid Role", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

pub fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

pub struct CreateUserPayload {
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

pub async fn create<'e, E>(e: E, payload: CreateUserPayload) -> Result<User>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        "
        INSERT INTO users (id, email, phone_number, first_name, last_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.email)
    .bind(payload.phone_number)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.password_hash)
    .bind(payload.role)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating a user account: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching user with id {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_by_email<'e, E: PgExecutor<'e>>(e: E, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred in find_by_email: {}", err);
            Error::UnexpectedError
        })
}

pub async fn find_by_email_or_phone_number<'e, E: PgExecutor<'e>>(
    e: E,
    email: &str,
    phone_number: &str,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(email) = LOWER($1) OR phone_number = $2 LIMIT 1",
    )
    .bind(email)
    .bind(phone_number)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred in find_by_email_or_phone_number: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_restaurant_id<'e, E: PgExecutor<'e>>(
    e: E,
    restaurant_id: &str,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "
        SELECT users.*
        FROM users
        INNER JOIN restaurants ON restaurants.owner_id = users.id
        WHERE restaurants.id = $1
        ",
    )
    .bind(restaurant_id)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while fetching owner of restaurant {}: {}",
            restaurant_id,
            err
        );
        Error::UnexpectedError
    })
}

pub struct UpdateProfilePayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

pub async fn update_profile_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    payload: UpdateProfilePayload,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone_number = COALESCE($4, phone_number),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(id)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.phone_number)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating user {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn update_role_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: &str,
    role: Role,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(role)
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while updating role of user {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn find_many(
    db: &PgPool,
    pagination: Pagination,
    role: Option<Role>,
) -> Result<Paginated<User>> {
    let users = sqlx::query_as::<_, User>(
        "
        SELECT * FROM users
        WHERE $1::user_role IS NULL OR role = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        ",
    )
    .bind(role)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching users: {}", err);
        Error::UnexpectedError
    })?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE $1::user_role IS NULL OR role = $1",
    )
    .bind(role)
    .fetch_one(db)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while counting users: {}", err);
        Error::UnexpectedError
    })?;

    Ok(pagination.paginate(users, total))
}

pub async fn find_ids<'e, E: PgExecutor<'e>>(e: E, role: Option<Role>) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM users WHERE $1::user_role IS NULL OR role = $1",
    )
    .bind(role)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching user ids: {}", err);
        Error::UnexpectedError
    })
}
