use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bcrypt::{hash, verify};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::dtos::user_dtos::UserFilter;
use crate::errors::{AppError, Result};
use crate::models::page::{Page, PageRequest};
use crate::models::user::{Role, UserRecord, UserUpdate};

/// User persistence used by the auth flows and the profile endpoints.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create_user(&self, email: &str, name: &str, password: &str) -> Result<UserRecord>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    fn verify_password(&self, user: &UserRecord, plaintext: &str) -> bool;

    async fn set_password(&self, user: &UserRecord, plaintext: &str) -> Result<()>;

    /// Returns `None` when no user has `id`.
    async fn update_profile(&self, id: &str, update: &UserUpdate) -> Result<Option<UserRecord>>;

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<UserRecord>>;

    async fn touch_last_login(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String> {
        Ok(hash(plaintext, self.cost)?)
    }

    pub fn verify(&self, plaintext: &str, password_hash: &str) -> bool {
        match verify(plaintext, password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!("Unreadable password hash: {}", e);
                false
            }
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

/// Trims the address and lower-cases its domain part.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Directory kept in process memory. Ids are decimal sequence numbers.
pub struct InMemoryUserDirectory {
    hasher: PasswordHasher,
    users: RwLock<BTreeMap<u64, UserRecord>>,
    next_id: AtomicU64,
}

impl InMemoryUserDirectory {
    pub fn new(hasher: PasswordHasher) -> Self {
        Self {
            hasher,
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Changes a user's role, for seeding administrators.
    pub async fn set_role(&self, id: &str, role: Role) -> Result<()> {
        let key = parse_id(id).ok_or(AppError::DocumentNotFound)?;
        let mut users = self.users.write().await;
        let user = users.get_mut(&key).ok_or(AppError::DocumentNotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(())
    }

    pub async fn set_active(&self, id: &str, is_active: bool) -> Result<()> {
        let key = parse_id(id).ok_or(AppError::DocumentNotFound)?;
        let mut users = self.users.write().await;
        let user = users.get_mut(&key).ok_or(AppError::DocumentNotFound)?;
        user.is_active = is_active;
        user.updated_at = Utc::now();
        Ok(())
    }
}

fn parse_id(id: &str) -> Option<u64> {
    id.parse().ok()
}

fn matches_filter(user: &UserRecord, filter: &UserFilter) -> bool {
    if let Some(owner_id) = &filter.owner_id {
        if &user.id != owner_id {
            return false;
        }
    }
    if filter.is_active.is_some_and(|active| user.is_active != active) {
        return false;
    }
    if filter.deleted.is_some_and(|deleted| user.deleted != deleted) {
        return false;
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        if !user.email.to_lowercase().contains(&needle) && !user.name.to_lowercase().contains(&needle) {
            return false;
        }
    }
    true
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn create_user(&self, email: &str, name: &str, password: &str) -> Result<UserRecord> {
        let email = normalize_email(email);
        let password_hash = self.hasher.hash(password)?;

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(AppError::DuplicateKey);
        }

        let key = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let user = UserRecord {
            id: key.to_string(),
            email,
            name: name.trim().to_string(),
            password_hash,
            role: Role::User,
            is_active: true,
            deleted: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(key, user.clone());

        tracing::debug!("Created user {}", user.id);
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let Some(key) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self.users.read().await.get(&key).cloned())
    }

    fn verify_password(&self, user: &UserRecord, plaintext: &str) -> bool {
        self.hasher.verify(plaintext, &user.password_hash)
    }

    async fn set_password(&self, user: &UserRecord, plaintext: &str) -> Result<()> {
        let key = parse_id(&user.id).ok_or(AppError::DocumentNotFound)?;
        let password_hash = self.hasher.hash(plaintext)?;

        let mut users = self.users.write().await;
        let stored = users.get_mut(&key).ok_or(AppError::DocumentNotFound)?;
        stored.password_hash = password_hash;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(&self, id: &str, update: &UserUpdate) -> Result<Option<UserRecord>> {
        let Some(key) = parse_id(id) else {
            return Ok(None);
        };
        let email = update.email.as_deref().map(normalize_email);

        let mut users = self.users.write().await;
        if let Some(email) = &email {
            if users.iter().any(|(k, u)| *k != key && &u.email == email) {
                return Err(AppError::DuplicateKey);
            }
        }

        let Some(user) = users.get_mut(&key) else {
            return Ok(None);
        };
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(name) = &update.name {
            user.name = name.trim().to_string();
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<UserRecord>> {
        let users = self.users.read().await;
        let matching: Vec<&UserRecord> = users.values().filter(|u| matches_filter(u, filter)).collect();

        let count = matching.len() as u64;
        let results = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .cloned()
            .collect();

        Ok(Page::new(results, count, page))
    }

    async fn touch_last_login(&self, id: &str) -> Result<()> {
        let Some(key) = parse_id(id) else {
            return Ok(());
        };
        if let Some(user) = self.users.write().await.get_mut(&key) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryUserDirectory {
        InMemoryUserDirectory::new(PasswordHasher::new(4))
    }

    #[test]
    fn normalizes_domain_only() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "Jane.Doe@example.com");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[tokio::test]
    async fn creates_and_finds_users() {
        let users = directory();
        let user = users.create_user("test@Email.com", "Test", "something-a-bit-serious").await.unwrap();

        assert_eq!(user.id, "1");
        assert_eq!(user.email, "test@email.com");
        assert!(user.can_authenticate());
        assert_ne!(user.password_hash, "something-a-bit-serious");

        let by_email = users.find_by_email("test@EMAIL.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(users.find_by_id("1").await.unwrap(), Some(user));
        assert!(users.find_by_id("2").await.unwrap().is_none());
        assert!(users.find_by_id("not-a-number").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let users = directory();
        users.create_user("a@a.com", "A", "password").await.unwrap();

        let err = users.create_user("a@A.com", "B", "password").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey));
    }

    #[tokio::test]
    async fn sets_and_verifies_passwords() {
        let users = directory();
        let user = users.create_user("a@a.com", "A", "old-password").await.unwrap();
        assert!(users.verify_password(&user, "old-password"));
        assert!(!users.verify_password(&user, "wrong"));

        users.set_password(&user, "new-password").await.unwrap();
        let user = users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(users.verify_password(&user, "new-password"));
        assert!(!users.verify_password(&user, "old-password"));
    }

    #[tokio::test]
    async fn updates_profile_fields() {
        let users = directory();
        let a = users.create_user("a@a.com", "A", "password").await.unwrap();
        users.create_user("b@b.com", "B", "password").await.unwrap();

        let update = UserUpdate {
            email: None,
            name: Some("Hello World".to_string()),
        };
        let updated = users.update_profile(&a.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.name, "Hello World");
        assert_eq!(updated.email, "a@a.com");

        let taken = UserUpdate {
            email: Some("b@b.com".to_string()),
            name: None,
        };
        assert!(matches!(
            users.update_profile(&a.id, &taken).await,
            Err(AppError::DuplicateKey)
        ));
        assert!(users.update_profile("99", &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_with_filters_and_pages() {
        let users = directory();
        for i in 0..5 {
            users
                .create_user(&format!("user{}@example.com", i), &format!("User {}", i), "password")
                .await
                .unwrap();
        }
        users.set_active("3", false).await.unwrap();

        let all = users.list(&UserFilter::default(), PageRequest::new(Some(1), Some(2))).await.unwrap();
        assert_eq!(all.count, 5);
        assert_eq!(all.results.len(), 2);
        assert_eq!(all.next, Some(2));

        let active = UserFilter {
            is_active: Some(true),
            ..UserFilter::default()
        };
        assert_eq!(users.list(&active, PageRequest::default()).await.unwrap().count, 4);

        let owned = UserFilter {
            owner_id: Some("2".to_string()),
            ..UserFilter::default()
        };
        let page = users.list(&owned, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].email, "user1@example.com");

        let search = UserFilter {
            search: Some("USER 4".to_string()),
            ..UserFilter::default()
        };
        assert_eq!(users.list(&search, PageRequest::default()).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn records_last_login() {
        let users = directory();
        let user = users.create_user("a@a.com", "A", "password").await.unwrap();
        assert!(user.last_login.is_none());

        users.touch_last_login(&user.id).await.unwrap();
        let user = users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(user.last_login.is_some());
    }
}
