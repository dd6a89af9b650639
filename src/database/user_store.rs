use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::IndexOptions,
    Collection, Database, IndexModel,
};

use crate::dtos::user_dtos::UserFilter;
use crate::errors::{AppError, Result};
use crate::models::page::{Page, PageRequest};
use crate::models::user::{to_bson_datetime, Role, UserDocument, UserRecord, UserUpdate};
use crate::services::user_directory::{normalize_email, PasswordHasher, UserDirectory};

const USERS: &str = "users";

#[derive(Clone)]
pub struct MongoUserDirectory {
    users: Collection<UserDocument>,
    hasher: PasswordHasher,
}

impl MongoUserDirectory {
    pub fn new(db: &Database, hasher: PasswordHasher) -> Self {
        Self {
            users: db.collection(USERS),
            hasher,
        }
    }

    /// Creates the unique email index if it is missing.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.users.create_index(index).await?;
        Ok(())
    }

    async fn email_taken(&self, email: &str, except: Option<ObjectId>) -> Result<bool> {
        let mut filter = doc! { "email": email };
        if let Some(id) = except {
            filter.insert("_id", doc! { "$ne": id });
        }
        Ok(self.users.find_one(filter).await?.is_some())
    }
}

fn to_filter(filter: &UserFilter) -> Option<Document> {
    let mut query = doc! {};

    if let Some(owner_id) = &filter.owner_id {
        // a malformed id cannot match anything
        let id = ObjectId::parse_str(owner_id).ok()?;
        query.insert("_id", id);
    }
    if let Some(is_active) = filter.is_active {
        query.insert("is_active", is_active);
    }
    if let Some(deleted) = filter.deleted {
        query.insert("deleted", deleted);
    }
    if let Some(search) = &filter.search {
        let pattern = escape_regex(search);
        query.insert(
            "$or",
            vec![
                doc! { "email": { "$regex": pattern.as_str(), "$options": "i" } },
                doc! { "name": { "$regex": pattern.as_str(), "$options": "i" } },
            ],
        );
    }

    Some(query)
}

fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == 11000
    )
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn create_user(&self, email: &str, name: &str, password: &str) -> Result<UserRecord> {
        let email = normalize_email(email);
        if self.email_taken(&email, None).await? {
            return Err(AppError::DuplicateKey);
        }

        let now = to_bson_datetime(Utc::now());
        let mut user = UserDocument {
            _id: None,
            email,
            name: name.trim().to_string(),
            password_hash: self.hasher.hash(password)?,
            role: Role::User,
            is_active: true,
            deleted: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        let result = self.users.insert_one(&user).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::DuplicateKey
            } else {
                AppError::MongoDB(e)
            }
        })?;

        user._id = result.inserted_id.as_object_id();
        tracing::debug!("Inserted user {:?}", user._id);

        UserRecord::try_from(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = normalize_email(email);
        self.users
            .find_one(doc! { "email": email })
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let Ok(object_id) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        self.users
            .find_one(doc! { "_id": object_id })
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    fn verify_password(&self, user: &UserRecord, plaintext: &str) -> bool {
        self.hasher.verify(plaintext, &user.password_hash)
    }

    async fn set_password(&self, user: &UserRecord, plaintext: &str) -> Result<()> {
        let object_id = ObjectId::parse_str(&user.id).map_err(|_| AppError::DocumentNotFound)?;
        let password_hash = self.hasher.hash(plaintext)?;

        let update = doc! {
            "$set": {
                "password_hash": password_hash,
                "updated_at": to_bson_datetime(Utc::now()),
            }
        };

        let result = self.users.update_one(doc! { "_id": object_id }, update).await?;
        if result.matched_count == 0 {
            return Err(AppError::DocumentNotFound);
        }
        Ok(())
    }

    async fn update_profile(&self, id: &str, update: &UserUpdate) -> Result<Option<UserRecord>> {
        let Ok(object_id) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        let mut set = doc! { "updated_at": to_bson_datetime(Utc::now()) };
        if let Some(email) = &update.email {
            let email = normalize_email(email);
            if self.email_taken(&email, Some(object_id)).await? {
                return Err(AppError::DuplicateKey);
            }
            set.insert("email", email);
        }
        if let Some(name) = &update.name {
            set.insert("name", name.trim());
        }

        let result = self
            .users
            .update_one(doc! { "_id": object_id }, doc! { "$set": set })
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::DuplicateKey
                } else {
                    AppError::MongoDB(e)
                }
            })?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<UserRecord>> {
        let Some(query) = to_filter(filter) else {
            return Ok(Page::new(Vec::new(), 0, page));
        };

        let count = self.users.count_documents(query.clone()).await?;
        let cursor = self
            .users
            .find(query)
            .sort(doc! { "_id": 1 })
            .skip(page.offset())
            .limit(i64::from(page.page_size()))
            .await?;
        let documents: Vec<UserDocument> = cursor.try_collect().await?;

        let results = documents
            .into_iter()
            .map(UserRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(results, count, page))
    }

    async fn touch_last_login(&self, id: &str) -> Result<()> {
        let Ok(object_id) = ObjectId::parse_str(id) else {
            return Ok(());
        };
        let update = doc! { "$set": { "last_login": to_bson_datetime(Utc::now()) } };
        self.users.update_one(doc! { "_id": object_id }, update).await?;
        Ok(())
    }
}
