use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A user as seen by the rest of the application, whatever the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub deleted: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn can_authenticate(&self) -> bool {
        self.is_active && !self.deleted
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Shape of a user in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    pub is_active: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub last_login: Option<BsonDateTime>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

impl TryFrom<UserDocument> for UserRecord {
    type Error = AppError;

    fn try_from(doc: UserDocument) -> Result<Self, Self::Error> {
        let id = doc
            ._id
            .ok_or_else(|| AppError::service("user document without _id"))?;

        Ok(UserRecord {
            id: id.to_hex(),
            email: doc.email,
            name: doc.name,
            password_hash: doc.password_hash,
            role: doc.role,
            is_active: doc.is_active,
            deleted: doc.deleted,
            last_login: doc.last_login.map(from_bson_datetime),
            created_at: from_bson_datetime(doc.created_at),
            updated_at: from_bson_datetime(doc.updated_at),
        })
    }
}

pub fn to_bson_datetime(value: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(value.timestamp_millis())
}

pub fn from_bson_datetime(value: BsonDateTime) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(value.timestamp_millis())
        .single()
        .unwrap_or_else(Utc::now)
}

/// Partial profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
    pub id: String,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        UserResponse {
            email: user.email.clone(),
            name: user.name.clone(),
            id: user.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: TokenPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub token_type: TokenType,
    pub user_id: String,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}
