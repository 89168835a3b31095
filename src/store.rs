use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime};

/// A user record. The id is assigned by the store on creation and never
/// changes or gets reused afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub forename: String,
    pub surname: String,
    pub email: String,
    #[serde(default, with = "date_format")]
    pub date_of_birth: Option<Date>,
    pub active: bool,
}

/// Fields of a user before the store has assigned an id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub forename: String,
    pub surname: String,
    pub email: String,
    pub date_of_birth: Option<Date>,
    pub active: bool,
}

/// An audit log entry. Written once, never mutated or deleted. Entries
/// reference their user by id and outlive a deleted user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Log {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub details: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Persistence seam. The production store is in-memory; tests swap in
/// their own implementations (e.g. one that fails every call).
pub trait DataStore: Send + Sync {
    /// All live users, in insertion order.
    fn get_all_users(&self) -> anyhow::Result<Vec<User>>;

    /// Assigns the next unique id, persists and returns the stored record.
    fn create_user(&self, user: NewUser) -> anyhow::Result<User>;

    /// Replaces the stored record matching `user.id`. Silent no-op when
    /// the id is absent; existence checks belong to the service layer.
    fn update_user(&self, user: &User) -> anyhow::Result<()>;

    /// Removes the record matching `id`. No-op when absent.
    fn delete_user(&self, id: i64) -> anyhow::Result<()>;

    /// Appends a log entry with a store-assigned id and a UTC timestamp
    /// taken at write time.
    fn append_log(&self, user_id: i64, action: &str, details: &str) -> anyhow::Result<Log>;

    /// Logs for one user, in insertion order. Empty when none match.
    fn logs_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Log>>;

    /// Every log entry, in insertion order.
    fn all_logs(&self) -> anyhow::Result<Vec<Log>>;
}

#[derive(Debug)]
struct Inner {
    users: Vec<User>,
    logs: Vec<Log>,
    next_user_id: i64,
    next_log_id: i64,
}

/// In-memory store standing in for a database. A single mutex guards both
/// the user table and the log so every operation is atomic on its own.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                users: Vec::new(),
                logs: Vec::new(),
                next_user_id: 1,
                next_log_id: 1,
            }),
        }
    }

    /// A store preloaded with the fixed sample population.
    pub fn seeded() -> Self {
        let store = Self::new();
        store.seed(sample_users());
        store
    }

    /// Inserts users through the normal id-assignment path. Explicit call,
    /// not ambient static state, so tests can seed whatever they need.
    pub fn seed<I>(&self, users: I)
    where
        I: IntoIterator<Item = NewUser>,
    {
        let mut inner = self.lock();
        for user in users {
            let id = inner.next_user_id;
            inner.next_user_id += 1;
            inner.users.push(User {
                id,
                forename: user.forename,
                surname: user.surname,
                email: user.email,
                date_of_birth: user.date_of_birth,
                active: user.active,
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore for MemoryStore {
    fn get_all_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.lock().users.clone())
    }

    fn create_user(&self, user: NewUser) -> anyhow::Result<User> {
        let mut inner = self.lock();
        let id = inner.next_user_id;
        inner.next_user_id += 1;
        let user = User {
            id,
            forename: user.forename,
            surname: user.surname,
            email: user.email,
            date_of_birth: user.date_of_birth,
            active: user.active,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    fn update_user(&self, user: &User) -> anyhow::Result<()> {
        let mut inner = self.lock();
        if let Some(stored) = inner.users.iter_mut().find(|u| u.id == user.id) {
            *stored = user.clone();
        }
        Ok(())
    }

    fn delete_user(&self, id: i64) -> anyhow::Result<()> {
        self.lock().users.retain(|u| u.id != id);
        Ok(())
    }

    fn append_log(&self, user_id: i64, action: &str, details: &str) -> anyhow::Result<Log> {
        let mut inner = self.lock();
        let log = Log {
            id: inner.next_log_id,
            user_id,
            action: action.to_string(),
            details: details.to_string(),
            timestamp: OffsetDateTime::now_utc(),
        };
        inner.next_log_id += 1;
        inner.logs.push(log.clone());
        Ok(log)
    }

    fn logs_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Log>> {
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    fn all_logs(&self) -> anyhow::Result<Vec<Log>> {
        Ok(self.lock().logs.clone())
    }
}

/// The fixed 11-user sample population loaded at startup.
pub fn sample_users() -> Vec<NewUser> {
    let sample = |forename: &str, surname: &str, email: &str, active: bool, age: i32| NewUser {
        forename: forename.to_string(),
        surname: surname.to_string(),
        email: email.to_string(),
        date_of_birth: Some(years_ago(age)),
        active,
    };
    vec![
        sample("Peter", "Loew", "ploew@example.com", true, 20),
        sample("Benjamin Franklin", "Gates", "bfgates@example.com", true, 55),
        sample("Castor", "Troy", "ctroy@example.com", false, 18),
        sample("Memphis", "Raines", "mraines@example.com", true, 20),
        sample("Stanley", "Goodspeed", "sgodspeed@example.com", true, 70),
        sample("H.I.", "McDunnough", "himcdunnough@example.com", true, 130),
        sample("Cameron", "Poe", "cpoe@example.com", false, 25),
        sample("Edward", "Malus", "emalus@example.com", false, 80),
        sample("Damon", "Macready", "dmacready@example.com", false, 100),
        sample("Johnny", "Blaze", "jblaze@example.com", true, 36),
        sample("Robin", "Feld", "rfeld@example.com", true, 22),
    ]
}

fn years_ago(years: i32) -> Date {
    let today = OffsetDateTime::now_utc().date();
    // Feb 29 has no counterpart in most years; clamp to the 28th.
    let day = if today.month() == Month::February {
        today.day().min(28)
    } else {
        today.day()
    };
    Date::from_calendar_date(today.year() - years, today.month(), day).unwrap_or(today)
}

/// Serde helpers for optional `[year]-[month]-[day]` dates of birth.
pub(crate) mod date_format {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{format_description::FormatItem, macros::format_description, Date};

    const FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => {
                let formatted = date.format(FORMAT).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&formatted)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| Date::parse(&raw, FORMAT).map_err(serde::de::Error::custom))
            .transpose()
    }
}
