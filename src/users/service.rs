use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

use crate::store::{DataStore, Log, NewUser, User};

/// The one designed domain failure plus a generic wrapper for store faults.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User with ID {id} not found.")]
    UserNotFound { id: i64 },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Business rules over the store: lookup-by-id-or-fail semantics, and one
/// audit log entry per mutation, written after the store mutation succeeds.
///
/// Every public method runs under the operations mutex so a mutation and
/// its audit entry are observed together by concurrent callers.
pub struct UserService {
    store: Arc<dyn DataStore>,
    ops: Mutex<()>,
}

impl UserService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            ops: Mutex::new(()),
        }
    }

    fn ops_guard(&self) -> MutexGuard<'_, ()> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_all(&self) -> Result<Vec<User>, ServiceError> {
        let _ops = self.ops_guard();
        Ok(self.store.get_all_users()?)
    }

    /// Users whose active flag matches `active`. Empty when none do.
    pub fn filter_by_active(&self, active: bool) -> Result<Vec<User>, ServiceError> {
        let _ops = self.ops_guard();
        let users = self.store.get_all_users()?;
        Ok(users.into_iter().filter(|u| u.active == active).collect())
    }

    pub fn get_by_id(&self, id: i64) -> Result<User, ServiceError> {
        let _ops = self.ops_guard();
        self.find(id)
    }

    pub fn create(&self, user: NewUser) -> Result<User, ServiceError> {
        let _ops = self.ops_guard();
        let user = self.store.create_user(user)?;
        self.store.append_log(
            user.id,
            "Created",
            &format!("User with {} has been created", user.id),
        )?;
        debug!(user_id = user.id, "user created");
        Ok(user)
    }

    pub fn update(&self, user: &User) -> Result<(), ServiceError> {
        let _ops = self.ops_guard();
        self.store.update_user(user)?;
        self.store.append_log(
            user.id,
            "Updated",
            &format!("User with {} has been updated", user.id),
        )?;
        debug!(user_id = user.id, "user updated");
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let _ops = self.ops_guard();
        let user = self.find(id)?;
        self.store.delete_user(user.id)?;
        self.store.append_log(
            id,
            "Deleted",
            &format!("User with {} has been deleted", id),
        )?;
        debug!(user_id = id, "user deleted");
        Ok(())
    }

    pub fn create_log(&self, user_id: i64, action: &str, details: &str) -> Result<Log, ServiceError> {
        let _ops = self.ops_guard();
        Ok(self.store.append_log(user_id, action, details)?)
    }

    pub fn logs_for_user(&self, user_id: i64) -> Result<Vec<Log>, ServiceError> {
        let _ops = self.ops_guard();
        Ok(self.store.logs_for_user(user_id)?)
    }

    pub fn all_logs(&self) -> Result<Vec<Log>, ServiceError> {
        let _ops = self.ops_guard();
        Ok(self.store.all_logs()?)
    }

    fn find(&self, id: i64) -> Result<User, ServiceError> {
        self.store
            .get_all_users()?
            .into_iter()
            .find(|u| u.id == id)
            .ok_or(ServiceError::UserNotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::store::MemoryStore;

    use super::*;

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryStore::new()))
    }

    fn new_user(forename: &str, email: &str, active: bool) -> NewUser {
        NewUser {
            forename: forename.to_string(),
            surname: "User".to_string(),
            email: email.to_string(),
            date_of_birth: Some(date!(1990 - 01 - 01)),
            active,
        }
    }

    #[test]
    fn get_by_id_fails_with_exact_not_found_message() {
        let service = service();
        let err = service.get_by_id(42).unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound { id: 42 }));
        assert_eq!(err.to_string(), "User with ID 42 not found.");
    }

    #[test]
    fn filter_by_active_partitions_get_all() {
        let service = service();
        service.create(new_user("A", "a@example.com", true)).expect("create");
        service.create(new_user("B", "b@example.com", false)).expect("create");
        service.create(new_user("C", "c@example.com", true)).expect("create");

        let active = service.filter_by_active(true).expect("filter active");
        let inactive = service.filter_by_active(false).expect("filter inactive");
        let all = service.get_all().expect("get all");

        assert_eq!(active.len() + inactive.len(), all.len());
        assert!(active.iter().all(|u| u.active));
        assert!(inactive.iter().all(|u| !u.active));
        assert!(active.iter().all(|a| inactive.iter().all(|i| i.id != a.id)));
    }

    #[test]
    fn filter_by_active_returns_empty_when_none_match() {
        let service = service();
        service.create(new_user("A", "a@example.com", false)).expect("create");
        assert!(service.filter_by_active(true).expect("filter").is_empty());
    }

    #[test]
    fn create_writes_exactly_one_created_log() {
        let service = service();
        let user = service
            .create(new_user("New", "newuser@example.com", true))
            .expect("create");

        let all = service.get_all().expect("get all");
        assert_eq!(
            all.iter().filter(|u| u.email == "newuser@example.com").count(),
            1
        );

        let logs = service.all_logs().expect("all logs");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].user_id, user.id);
        assert_eq!(logs[0].action, "Created");
        assert_eq!(logs[0].details, format!("User with {} has been created", user.id));
    }

    #[test]
    fn update_writes_exactly_one_updated_log() {
        let service = service();
        let mut user = service.create(new_user("A", "a@example.com", true)).expect("create");
        user.surname = "Renamed".to_string();
        service.update(&user).expect("update");

        let logs = service.logs_for_user(user.id).expect("logs");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].action, "Updated");
        assert_eq!(service.get_by_id(user.id).expect("get").surname, "Renamed");
    }

    #[test]
    fn delete_removes_user_and_writes_deleted_log() {
        let service = service();
        let user = service.create(new_user("A", "a@example.com", true)).expect("create");
        service.delete(user.id).expect("delete");

        let err = service.get_by_id(user.id).unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound { .. }));

        let logs = service.logs_for_user(user.id).expect("logs");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].action, "Deleted");
    }

    #[test]
    fn delete_of_missing_id_fails_and_writes_no_log() {
        let service = service();
        let err = service.delete(7).unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound { id: 7 }));
        assert!(service.all_logs().expect("all logs").is_empty());
    }

    #[test]
    fn logs_of_deleted_user_stay_queryable() {
        let service = service();
        let user = service.create(new_user("A", "a@example.com", true)).expect("create");
        service.delete(user.id).expect("delete");

        let logs = service.logs_for_user(user.id).expect("logs");
        assert_eq!(logs.len(), 2);
        let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, vec!["Created", "Deleted"]);
    }

    #[test]
    fn create_log_passthrough_appends_free_text_entries() {
        let service = service();
        let log = service
            .create_log(5, "Inspected", "manual entry")
            .expect("create log");
        assert_eq!(log.user_id, 5);
        assert_eq!(service.all_logs().expect("all logs"), vec![log]);
    }
}
