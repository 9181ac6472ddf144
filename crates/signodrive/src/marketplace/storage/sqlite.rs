use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::migrations;
use super::{MarketplaceStorage, StorageError};
use crate::marketplace::domain::{
    Application, ApplicationId, DriverId, DriverProfile, FleetOwnerId, FleetOwnerProfile, Job,
    JobId, Notification, NotificationId, TransporterId, TransporterProfile, Trip, TripId, User,
    UserId,
};

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StorageError::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            _ => StorageError::Unavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Unavailable(format!("corrupt row body: {err}"))
    }
}

/// SQLite-backed storage. A single connection is shared behind a mutex.
#[derive(Debug)]
pub struct SqliteStorage {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create the database at `path`, creating parent directories and running migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    StorageError::Unavailable(format!(
                        "cannot create {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        debug!(path = %path.display(), "opening sqlite storage");
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!(path = %path.display(), "sqlite storage ready");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        migrations::initialize_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_version(&self) -> Result<i32, StorageError> {
        migrations::schema_version(&*self.conn()?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection mutex poisoned".to_string()))
    }

    /// Inserts a placeholder row to obtain the id, then writes the body carrying that id.
    fn insert_row<T, F>(
        &self,
        insert_sql: &str,
        columns: &[&dyn ToSql],
        update_sql: &str,
        mut record: T,
        assign_id: F,
    ) -> Result<T, StorageError>
    where
        T: Serialize,
        F: FnOnce(&mut T, u64),
    {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(insert_sql, columns)?;
        let id = tx.last_insert_rowid();
        assign_id(&mut record, id as u64);
        let body = serde_json::to_string(&record)?;
        tx.execute(update_sql, params![body, id])?;
        tx.commit()?;
        Ok(record)
    }

    fn update_row(&self, sql: &str, columns: &[&dyn ToSql]) -> Result<(), StorageError> {
        let changed = self.conn()?.execute(sql, columns)?;
        if changed == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    fn fetch_one<T: DeserializeOwned>(
        &self,
        sql: &str,
        key: &dyn ToSql,
    ) -> Result<Option<T>, StorageError> {
        let body: Option<String> = self
            .conn()?
            .query_row(sql, [key], |row| row.get(0))
            .optional()?;
        body.map(|body| serde_json::from_str(&body).map_err(StorageError::from))
            .transpose()
    }

    fn fetch_many<T: DeserializeOwned>(
        &self,
        sql: &str,
        columns: &[&dyn ToSql],
    ) -> Result<Vec<T>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let bodies = stmt
            .query_map(columns, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StorageError::from))
            .collect()
    }
}

fn id(value: u64) -> i64 {
    value as i64
}

impl MarketplaceStorage for SqliteStorage {
    fn insert_user(&self, user: User) -> Result<User, StorageError> {
        let phone = user.phone.clone();
        self.insert_row(
            "INSERT INTO users (phone, body) VALUES (?1, '{}')",
            &[&phone],
            "UPDATE users SET body = ?1 WHERE id = ?2",
            user,
            |user, id| user.id = UserId(id),
        )
        .map_err(|err| match err {
            StorageError::Conflict(_) => {
                StorageError::Conflict(format!("phone {phone} is already registered"))
            }
            other => other,
        })
    }

    fn user(&self, user_id: UserId) -> Result<Option<User>, StorageError> {
        self.fetch_one("SELECT body FROM users WHERE id = ?1", &id(user_id.0))
    }

    fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError> {
        self.fetch_one("SELECT body FROM users WHERE phone = ?1", &phone)
    }

    fn update_user(&self, user: User) -> Result<(), StorageError> {
        let body = serde_json::to_string(&user)?;
        self.update_row(
            "UPDATE users SET phone = ?1, body = ?2 WHERE id = ?3",
            &[&user.phone, &body, &id(user.id.0)],
        )
    }

    fn delete_user(&self, user_id: UserId) -> Result<(), StorageError> {
        self.update_row("DELETE FROM users WHERE id = ?1", &[&id(user_id.0)])
    }

    fn insert_driver(&self, driver: DriverProfile) -> Result<DriverProfile, StorageError> {
        self.insert_row(
            "INSERT INTO drivers (user_id, body) VALUES (?1, '{}')",
            &[&id(driver.user_id.0)],
            "UPDATE drivers SET body = ?1 WHERE id = ?2",
            driver,
            |driver, id| driver.id = DriverId(id),
        )
    }

    fn driver(&self, driver_id: DriverId) -> Result<Option<DriverProfile>, StorageError> {
        self.fetch_one("SELECT body FROM drivers WHERE id = ?1", &id(driver_id.0))
    }

    fn driver_by_user(&self, user_id: UserId) -> Result<Option<DriverProfile>, StorageError> {
        self.fetch_one(
            "SELECT body FROM drivers WHERE user_id = ?1",
            &id(user_id.0),
        )
    }

    fn update_driver(&self, driver: DriverProfile) -> Result<(), StorageError> {
        let body = serde_json::to_string(&driver)?;
        self.update_row(
            "UPDATE drivers SET body = ?1 WHERE id = ?2",
            &[&body, &id(driver.id.0)],
        )
    }

    fn drivers(&self) -> Result<Vec<DriverProfile>, StorageError> {
        self.fetch_many("SELECT body FROM drivers ORDER BY id", &[])
    }

    fn insert_fleet_owner(
        &self,
        owner: FleetOwnerProfile,
    ) -> Result<FleetOwnerProfile, StorageError> {
        self.insert_row(
            "INSERT INTO fleet_owners (user_id, body) VALUES (?1, '{}')",
            &[&id(owner.user_id.0)],
            "UPDATE fleet_owners SET body = ?1 WHERE id = ?2",
            owner,
            |owner, id| owner.id = FleetOwnerId(id),
        )
    }

    fn fleet_owner(&self, owner_id: FleetOwnerId) -> Result<Option<FleetOwnerProfile>, StorageError> {
        self.fetch_one(
            "SELECT body FROM fleet_owners WHERE id = ?1",
            &id(owner_id.0),
        )
    }

    fn fleet_owner_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<FleetOwnerProfile>, StorageError> {
        self.fetch_one(
            "SELECT body FROM fleet_owners WHERE user_id = ?1",
            &id(user_id.0),
        )
    }

    fn update_fleet_owner(&self, owner: FleetOwnerProfile) -> Result<(), StorageError> {
        let body = serde_json::to_string(&owner)?;
        self.update_row(
            "UPDATE fleet_owners SET body = ?1 WHERE id = ?2",
            &[&body, &id(owner.id.0)],
        )
    }

    fn fleet_owners(&self) -> Result<Vec<FleetOwnerProfile>, StorageError> {
        self.fetch_many("SELECT body FROM fleet_owners ORDER BY id", &[])
    }

    fn insert_transporter(
        &self,
        transporter: TransporterProfile,
    ) -> Result<TransporterProfile, StorageError> {
        self.insert_row(
            "INSERT INTO transporters (user_id, body) VALUES (?1, '{}')",
            &[&id(transporter.user_id.0)],
            "UPDATE transporters SET body = ?1 WHERE id = ?2",
            transporter,
            |transporter, id| transporter.id = TransporterId(id),
        )
    }

    fn transporter(
        &self,
        transporter_id: TransporterId,
    ) -> Result<Option<TransporterProfile>, StorageError> {
        self.fetch_one(
            "SELECT body FROM transporters WHERE id = ?1",
            &id(transporter_id.0),
        )
    }

    fn transporter_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<TransporterProfile>, StorageError> {
        self.fetch_one(
            "SELECT body FROM transporters WHERE user_id = ?1",
            &id(user_id.0),
        )
    }

    fn update_transporter(&self, transporter: TransporterProfile) -> Result<(), StorageError> {
        let body = serde_json::to_string(&transporter)?;
        self.update_row(
            "UPDATE transporters SET body = ?1 WHERE id = ?2",
            &[&body, &id(transporter.id.0)],
        )
    }

    fn transporters(&self) -> Result<Vec<TransporterProfile>, StorageError> {
        self.fetch_many("SELECT body FROM transporters ORDER BY id", &[])
    }

    fn insert_job(&self, job: Job) -> Result<Job, StorageError> {
        let status = job.status.label();
        self.insert_row(
            "INSERT INTO jobs (status, body) VALUES (?1, '{}')",
            &[&status],
            "UPDATE jobs SET body = ?1 WHERE id = ?2",
            job,
            |job, id| job.id = JobId(id),
        )
    }

    fn job(&self, job_id: JobId) -> Result<Option<Job>, StorageError> {
        self.fetch_one("SELECT body FROM jobs WHERE id = ?1", &id(job_id.0))
    }

    fn update_job(&self, job: Job) -> Result<(), StorageError> {
        let body = serde_json::to_string(&job)?;
        self.update_row(
            "UPDATE jobs SET status = ?1, body = ?2 WHERE id = ?3",
            &[&job.status.label(), &body, &id(job.id.0)],
        )
    }

    fn delete_job(&self, job_id: JobId) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM jobs WHERE id = ?1", [id(job_id.0)])?;
        if removed == 0 {
            return Err(StorageError::NotFound);
        }
        tx.execute(
            "DELETE FROM applications WHERE job_id = ?1",
            [id(job_id.0)],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn jobs(&self) -> Result<Vec<Job>, StorageError> {
        self.fetch_many("SELECT body FROM jobs ORDER BY id", &[])
    }

    fn insert_application(&self, application: Application) -> Result<Application, StorageError> {
        let (job_id, driver_id) = (application.job_id, application.driver_id);
        self.insert_row(
            "INSERT INTO applications (job_id, driver_id, status, body) VALUES (?1, ?2, ?3, '{}')",
            &[&id(job_id.0), &id(driver_id.0), &application.status.label()],
            "UPDATE applications SET body = ?1 WHERE id = ?2",
            application,
            |application, id| application.id = ApplicationId(id),
        )
        .map_err(|err| match err {
            StorageError::Conflict(_) => StorageError::Conflict(format!(
                "driver {driver_id} already applied to job {job_id}"
            )),
            other => other,
        })
    }

    fn application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<Application>, StorageError> {
        self.fetch_one(
            "SELECT body FROM applications WHERE id = ?1",
            &id(application_id.0),
        )
    }

    fn update_application(&self, application: Application) -> Result<(), StorageError> {
        let body = serde_json::to_string(&application)?;
        self.update_row(
            "UPDATE applications SET status = ?1, body = ?2 WHERE id = ?3",
            &[&application.status.label(), &body, &id(application.id.0)],
        )
    }

    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StorageError> {
        self.fetch_many(
            "SELECT body FROM applications WHERE job_id = ?1 ORDER BY id",
            &[&id(job_id.0)],
        )
    }

    fn applications_for_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<Application>, StorageError> {
        self.fetch_many(
            "SELECT body FROM applications WHERE driver_id = ?1 ORDER BY id",
            &[&id(driver_id.0)],
        )
    }

    fn insert_trip(&self, trip: Trip) -> Result<Trip, StorageError> {
        self.insert_row(
            "INSERT INTO trips (driver_id, body) VALUES (?1, '{}')",
            &[&id(trip.driver_id.0)],
            "UPDATE trips SET body = ?1 WHERE id = ?2",
            trip,
            |trip, id| trip.id = TripId(id),
        )
    }

    fn trip(&self, trip_id: TripId) -> Result<Option<Trip>, StorageError> {
        self.fetch_one("SELECT body FROM trips WHERE id = ?1", &id(trip_id.0))
    }

    fn update_trip(&self, trip: Trip) -> Result<(), StorageError> {
        let body = serde_json::to_string(&trip)?;
        self.update_row(
            "UPDATE trips SET body = ?1 WHERE id = ?2",
            &[&body, &id(trip.id.0)],
        )
    }

    fn trips_for_driver(&self, driver_id: DriverId) -> Result<Vec<Trip>, StorageError> {
        self.fetch_many(
            "SELECT body FROM trips WHERE driver_id = ?1 ORDER BY id",
            &[&id(driver_id.0)],
        )
    }

    fn insert_notification(&self, notification: Notification) -> Result<Notification, StorageError> {
        let user_id = id(notification.user_id.0);
        let read = notification.read;
        self.insert_row(
            "INSERT INTO notifications (user_id, is_read, body) VALUES (?1, ?2, '{}')",
            &[&user_id, &read],
            "UPDATE notifications SET body = ?1 WHERE id = ?2",
            notification,
            |notification, id| notification.id = NotificationId(id),
        )
    }

    fn notification(
        &self,
        notification_id: NotificationId,
    ) -> Result<Option<Notification>, StorageError> {
        self.fetch_one(
            "SELECT body FROM notifications WHERE id = ?1",
            &id(notification_id.0),
        )
    }

    fn update_notification(&self, notification: Notification) -> Result<(), StorageError> {
        let body = serde_json::to_string(&notification)?;
        self.update_row(
            "UPDATE notifications SET is_read = ?1, body = ?2 WHERE id = ?3",
            &[&notification.read, &body, &id(notification.id.0)],
        )
    }

    fn notifications_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError> {
        self.fetch_many(
            "SELECT body FROM notifications WHERE user_id = ?1 ORDER BY id",
            &[&id(user_id.0)],
        )
    }
}
