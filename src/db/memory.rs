//! In-process stores backing the handler tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{
    strips_last_admin, ContactFilter, ContactStore, StoreError, StoreResult, UserFilter,
    UserStore, UserWrite, Window,
};
use crate::model::{
    contact::{Contact, ContactPatch, ContactStatus, NewContact, Priority},
    user::{NewUser, User, UserPatch},
};

fn user_matches(filter: &UserFilter, user: &User) -> bool {
    user.deleted_at.is_none()
        && filter.id.map_or(true, |id| user.id == id)
        && filter.email.as_deref().map_or(true, |e| user.email == e)
        && filter.username.as_deref().map_or(true, |u| user.username == u)
        && filter.role.map_or(true, |r| user.role == r)
        && filter.is_active.map_or(true, |a| user.is_active == a)
}

fn contact_matches(filter: &ContactFilter, contact: &Contact) -> bool {
    let search_hit = match filter.search.as_deref() {
        None => true,
        Some(needle) => {
            let needle = needle.to_lowercase();
            [&contact.name, &contact.email, &contact.message]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        }
    };
    contact.deleted_at.is_none()
        && filter.status.map_or(true, |s| contact.status == s)
        && filter.priority.map_or(true, |p| contact.priority == p)
        && search_hit
}

/// Each insert is stamped one millisecond after the previous one so
/// newest-first ordering is deterministic within a test.
#[derive(Default)]
struct Clock {
    ticks: i64,
}

impl Clock {
    fn next(&mut self) -> chrono::DateTime<Utc> {
        self.ticks += 1;
        Utc::now() + Duration::milliseconds(self.ticks)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<(Clock, Vec<User>)>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_non_deleted(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let guard = self.rows.lock().unwrap();
        let mut found: Vec<User> = guard
            .1
            .iter()
            .filter(|u| user_matches(filter, u))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_one_non_deleted(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let guard = self.rows.lock().unwrap();
        Ok(guard.1.iter().find(|u| user_matches(filter, u)).cloned())
    }

    async fn count_non_deleted(&self, filter: &UserFilter) -> StoreResult<i64> {
        let guard = self.rows.lock().unwrap();
        Ok(guard.1.iter().filter(|u| user_matches(filter, u)).count() as i64)
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut guard = self.rows.lock().unwrap();
        let (clock, rows) = &mut *guard;
        let live = rows.iter().filter(|u| u.deleted_at.is_none());
        for existing in live {
            if existing.email == user.email {
                return Err(StoreError::Conflict {
                    constraint: "users_email_active_idx".into(),
                });
            }
            if existing.username == user.username {
                return Err(StoreError::Conflict {
                    constraint: "users_username_active_idx".into(),
                });
            }
        }

        let now = clock.next();
        let stored = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<UserWrite> {
        let mut guard = self.rows.lock().unwrap();
        let (clock, rows) = &mut *guard;
        let active_admins = rows
            .iter()
            .filter(|u| u.deleted_at.is_none() && u.is_active_admin())
            .count() as i64;
        let Some(user) = rows.iter_mut().find(|u| u.id == id && u.deleted_at.is_none()) else {
            return Ok(UserWrite::Missing);
        };
        if strips_last_admin(user, patch.keeps_active_admin(user), active_admins) {
            return Ok(UserWrite::LastAdmin);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(active) = patch.is_active {
            user.is_active = active;
        }
        user.updated_at = clock.next();
        Ok(UserWrite::Applied(user.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<UserWrite> {
        let mut guard = self.rows.lock().unwrap();
        let (clock, rows) = &mut *guard;
        let active_admins = rows
            .iter()
            .filter(|u| u.deleted_at.is_none() && u.is_active_admin())
            .count() as i64;
        let Some(user) = rows.iter_mut().find(|u| u.id == id && u.deleted_at.is_none()) else {
            return Ok(UserWrite::Missing);
        };
        if strips_last_admin(user, false, active_admins) {
            return Ok(UserWrite::LastAdmin);
        }
        let now = clock.next();
        user.deleted_at = Some(now);
        user.updated_at = now;
        Ok(UserWrite::Applied(user.clone()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryContactStore {
    rows: Mutex<(Clock, Vec<Contact>)>,
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn find_non_deleted(
        &self,
        filter: &ContactFilter,
        window: Option<Window>,
    ) -> StoreResult<Vec<Contact>> {
        let guard = self.rows.lock().unwrap();
        let mut found: Vec<Contact> = guard
            .1
            .iter()
            .filter(|c| contact_matches(filter, c))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(window) = window {
            found = found
                .into_iter()
                .skip(window.skip as usize)
                .take(window.limit as usize)
                .collect();
        }
        Ok(found)
    }

    async fn find_one_non_deleted(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        let guard = self.rows.lock().unwrap();
        Ok(guard
            .1
            .iter()
            .find(|c| c.id == id && c.deleted_at.is_none())
            .cloned())
    }

    async fn count_non_deleted(&self, filter: &ContactFilter) -> StoreResult<i64> {
        let guard = self.rows.lock().unwrap();
        Ok(guard
            .1
            .iter()
            .filter(|c| contact_matches(filter, c))
            .count() as i64)
    }

    async fn insert(&self, contact: NewContact) -> StoreResult<Contact> {
        let mut guard = self.rows.lock().unwrap();
        let (clock, rows) = &mut *guard;
        let now = clock.next();
        let stored = Contact {
            id: Uuid::new_v4(),
            name: contact.name,
            email: contact.email,
            project_type: contact.project_type,
            message: contact.message,
            status: ContactStatus::default(),
            priority: Priority::default(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: Uuid, patch: ContactPatch) -> StoreResult<Option<Contact>> {
        let mut guard = self.rows.lock().unwrap();
        let (clock, rows) = &mut *guard;
        let Some(contact) = rows
            .iter_mut()
            .find(|c| c.id == id && c.deleted_at.is_none())
        else {
            return Ok(None);
        };
        if let Some(status) = patch.status {
            contact.status = status;
        }
        if let Some(priority) = patch.priority {
            contact.priority = priority;
        }
        contact.updated_at = clock.next();
        Ok(Some(contact.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        let mut guard = self.rows.lock().unwrap();
        let (clock, rows) = &mut *guard;
        let Some(contact) = rows
            .iter_mut()
            .find(|c| c.id == id && c.deleted_at.is_none())
        else {
            return Ok(None);
        };
        let now = clock.next();
        contact.deleted_at = Some(now);
        contact.updated_at = now;
        Ok(Some(contact.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::Role;

    fn new_user(name: &str, role: Role) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@galaxygrid.com"),
            password_hash: "hash".to_string(),
            role,
        }
    }

    fn new_contact(name: &str) -> NewContact {
        NewContact {
            name: name.to_string(),
            email: format!("{}@x.com", name.to_lowercase()),
            project_type: "Web".to_string(),
            message: "hello there".to_string(),
        }
    }

    #[tokio::test]
    async fn find_non_deleted_never_returns_deleted_users() {
        let store = MemoryUserStore::default();
        let keep = store.insert(new_user("keep", Role::Admin)).await.unwrap();
        let gone = store.insert(new_user("gone", Role::Admin)).await.unwrap();
        store.soft_delete(gone.id).await.unwrap();

        let users = store.find_non_deleted(&UserFilter::default()).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, keep.id);
        assert!(users.iter().all(|u| u.deleted_at.is_none()));
        assert!(store
            .find_one_non_deleted(&UserFilter::id(gone.id))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn second_soft_delete_finds_nothing() {
        let store = MemoryContactStore::default();
        let contact = store.insert(new_contact("A")).await.unwrap();

        assert!(store.soft_delete(contact.id).await.unwrap().is_some());
        assert!(store.soft_delete(contact.id).await.unwrap().is_none());
        assert_eq!(
            store.count_non_deleted(&ContactFilter::default()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn keeps_one_active_admin() {
        let store = MemoryUserStore::default();
        let first = store.insert(new_user("first", Role::Admin)).await.unwrap();
        let second = store.insert(new_user("second", Role::Admin)).await.unwrap();
        let plain = store.insert(new_user("plain", Role::User)).await.unwrap();

        assert!(matches!(
            store.soft_delete(first.id).await.unwrap(),
            UserWrite::Applied(_)
        ));
        assert!(matches!(
            store.soft_delete(second.id).await.unwrap(),
            UserWrite::LastAdmin
        ));
        let demote = UserPatch {
            role: Some(Role::User),
            ..UserPatch::default()
        };
        assert!(matches!(
            store.update(second.id, demote).await.unwrap(),
            UserWrite::LastAdmin
        ));
        assert!(matches!(
            store.soft_delete(plain.id).await.unwrap(),
            UserWrite::Applied(_)
        ));
        assert!(matches!(
            store.soft_delete(first.id).await.unwrap(),
            UserWrite::Missing
        ));
    }

    #[tokio::test]
    async fn deleted_user_frees_email() {
        let store = MemoryUserStore::default();
        let first = store.insert(new_user("nova", Role::User)).await.unwrap();
        assert!(matches!(
            store.insert(new_user("nova", Role::User)).await,
            Err(StoreError::Conflict { .. })
        ));

        store.soft_delete(first.id).await.unwrap();
        assert!(store.insert(new_user("nova", Role::User)).await.is_ok());
    }

    #[tokio::test]
    async fn lists_contacts_newest_first_within_window() {
        let store = MemoryContactStore::default();
        for name in ["one", "two", "three", "four"] {
            store.insert(new_contact(name)).await.unwrap();
        }

        let page = store
            .find_non_deleted(&ContactFilter::default(), Some(Window { skip: 1, limit: 2 }))
            .await
            .unwrap();
        let names: Vec<_> = page.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["three", "two"]);
    }

    #[tokio::test]
    async fn updates_skip_deleted_contacts() {
        let store = MemoryContactStore::default();
        let contact = store.insert(new_contact("A")).await.unwrap();
        store.soft_delete(contact.id).await.unwrap();

        let patch = ContactPatch {
            status: Some(ContactStatus::Closed),
            priority: None,
        };
        assert!(store.update(contact.id, patch).await.unwrap().is_none());
    }
}
