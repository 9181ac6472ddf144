use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{MarketplaceStorage, StorageError};
use crate::marketplace::domain::{
    Application, ApplicationId, DriverId, DriverProfile, FleetOwnerId, FleetOwnerProfile, Job,
    JobId, Notification, NotificationId, TransporterId, TransporterProfile, Trip, TripId, User,
    UserId,
};

/// Map-backed storage. Cloning shares the underlying tables.
#[derive(Default, Clone)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    drivers: BTreeMap<DriverId, DriverProfile>,
    fleet_owners: BTreeMap<FleetOwnerId, FleetOwnerProfile>,
    transporters: BTreeMap<TransporterId, TransporterProfile>,
    jobs: BTreeMap<JobId, Job>,
    applications: BTreeMap<ApplicationId, Application>,
    trips: BTreeMap<TripId, Trip>,
    notifications: BTreeMap<NotificationId, Notification>,
    sequences: Sequences,
}

/// Per-entity counters; ids are never reused, even after deletes.
#[derive(Default)]
struct Sequences {
    users: u64,
    drivers: u64,
    fleet_owners: u64,
    transporters: u64,
    jobs: u64,
    applications: u64,
    trips: u64,
    notifications: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Unavailable("storage mutex poisoned".to_string()))
    }
}

fn replace<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, value: V) -> Result<(), StorageError> {
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(StorageError::NotFound),
    }
}

impl MarketplaceStorage for InMemoryStorage {
    fn insert_user(&self, mut user: User) -> Result<User, StorageError> {
        let mut tables = self.tables()?;
        if tables.users.values().any(|existing| existing.phone == user.phone) {
            return Err(StorageError::Conflict(format!(
                "phone {} is already registered",
                user.phone
            )));
        }
        user.id = UserId(next(&mut tables.sequences.users));
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|user| user.phone == phone)
            .cloned())
    }

    fn update_user(&self, user: User) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        if tables
            .users
            .values()
            .any(|existing| existing.phone == user.phone && existing.id != user.id)
        {
            return Err(StorageError::Conflict(format!(
                "phone {} is already registered",
                user.phone
            )));
        }
        replace(&mut tables.users, user.id, user)
    }

    fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        match self.tables()?.users.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound),
        }
    }

    fn insert_driver(&self, mut driver: DriverProfile) -> Result<DriverProfile, StorageError> {
        let mut tables = self.tables()?;
        if tables
            .drivers
            .values()
            .any(|existing| existing.user_id == driver.user_id)
        {
            return Err(StorageError::Conflict(format!(
                "user {} already has a driver profile",
                driver.user_id
            )));
        }
        driver.id = DriverId(next(&mut tables.sequences.drivers));
        tables.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    fn driver(&self, id: DriverId) -> Result<Option<DriverProfile>, StorageError> {
        Ok(self.tables()?.drivers.get(&id).cloned())
    }

    fn driver_by_user(&self, user_id: UserId) -> Result<Option<DriverProfile>, StorageError> {
        Ok(self
            .tables()?
            .drivers
            .values()
            .find(|driver| driver.user_id == user_id)
            .cloned())
    }

    fn update_driver(&self, driver: DriverProfile) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        replace(&mut tables.drivers, driver.id, driver)
    }

    fn drivers(&self) -> Result<Vec<DriverProfile>, StorageError> {
        Ok(self.tables()?.drivers.values().cloned().collect())
    }

    fn insert_fleet_owner(
        &self,
        mut owner: FleetOwnerProfile,
    ) -> Result<FleetOwnerProfile, StorageError> {
        let mut tables = self.tables()?;
        if tables
            .fleet_owners
            .values()
            .any(|existing| existing.user_id == owner.user_id)
        {
            return Err(StorageError::Conflict(format!(
                "user {} already has a fleet owner profile",
                owner.user_id
            )));
        }
        owner.id = FleetOwnerId(next(&mut tables.sequences.fleet_owners));
        tables.fleet_owners.insert(owner.id, owner.clone());
        Ok(owner)
    }

    fn fleet_owner(&self, id: FleetOwnerId) -> Result<Option<FleetOwnerProfile>, StorageError> {
        Ok(self.tables()?.fleet_owners.get(&id).cloned())
    }

    fn fleet_owner_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<FleetOwnerProfile>, StorageError> {
        Ok(self
            .tables()?
            .fleet_owners
            .values()
            .find(|owner| owner.user_id == user_id)
            .cloned())
    }

    fn update_fleet_owner(&self, owner: FleetOwnerProfile) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        replace(&mut tables.fleet_owners, owner.id, owner)
    }

    fn fleet_owners(&self) -> Result<Vec<FleetOwnerProfile>, StorageError> {
        Ok(self.tables()?.fleet_owners.values().cloned().collect())
    }

    fn insert_transporter(
        &self,
        mut transporter: TransporterProfile,
    ) -> Result<TransporterProfile, StorageError> {
        let mut tables = self.tables()?;
        if tables
            .transporters
            .values()
            .any(|existing| existing.user_id == transporter.user_id)
        {
            return Err(StorageError::Conflict(format!(
                "user {} already has a transporter profile",
                transporter.user_id
            )));
        }
        transporter.id = TransporterId(next(&mut tables.sequences.transporters));
        tables.transporters.insert(transporter.id, transporter.clone());
        Ok(transporter)
    }

    fn transporter(&self, id: TransporterId) -> Result<Option<TransporterProfile>, StorageError> {
        Ok(self.tables()?.transporters.get(&id).cloned())
    }

    fn transporter_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<TransporterProfile>, StorageError> {
        Ok(self
            .tables()?
            .transporters
            .values()
            .find(|transporter| transporter.user_id == user_id)
            .cloned())
    }

    fn update_transporter(&self, transporter: TransporterProfile) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        replace(&mut tables.transporters, transporter.id, transporter)
    }

    fn transporters(&self) -> Result<Vec<TransporterProfile>, StorageError> {
        Ok(self.tables()?.transporters.values().cloned().collect())
    }

    fn insert_job(&self, mut job: Job) -> Result<Job, StorageError> {
        let mut tables = self.tables()?;
        job.id = JobId(next(&mut tables.sequences.jobs));
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, StorageError> {
        Ok(self.tables()?.jobs.get(&id).cloned())
    }

    fn update_job(&self, job: Job) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        replace(&mut tables.jobs, job.id, job)
    }

    fn delete_job(&self, id: JobId) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        if tables.jobs.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        tables
            .applications
            .retain(|_, application| application.job_id != id);
        Ok(())
    }

    fn jobs(&self) -> Result<Vec<Job>, StorageError> {
        Ok(self.tables()?.jobs.values().cloned().collect())
    }

    fn insert_application(
        &self,
        mut application: Application,
    ) -> Result<Application, StorageError> {
        let mut tables = self.tables()?;
        if tables.applications.values().any(|existing| {
            existing.job_id == application.job_id && existing.driver_id == application.driver_id
        }) {
            return Err(StorageError::Conflict(format!(
                "driver {} already applied to job {}",
                application.driver_id, application.job_id
            )));
        }
        application.id = ApplicationId(next(&mut tables.sequences.applications));
        tables.applications.insert(application.id, application.clone());
        Ok(application)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StorageError> {
        Ok(self.tables()?.applications.get(&id).cloned())
    }

    fn update_application(&self, application: Application) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        replace(&mut tables.applications, application.id, application)
    }

    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StorageError> {
        Ok(self
            .tables()?
            .applications
            .values()
            .filter(|application| application.job_id == job_id)
            .cloned()
            .collect())
    }

    fn applications_for_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<Application>, StorageError> {
        Ok(self
            .tables()?
            .applications
            .values()
            .filter(|application| application.driver_id == driver_id)
            .cloned()
            .collect())
    }

    fn insert_trip(&self, mut trip: Trip) -> Result<Trip, StorageError> {
        let mut tables = self.tables()?;
        trip.id = TripId(next(&mut tables.sequences.trips));
        tables.trips.insert(trip.id, trip.clone());
        Ok(trip)
    }

    fn trip(&self, id: TripId) -> Result<Option<Trip>, StorageError> {
        Ok(self.tables()?.trips.get(&id).cloned())
    }

    fn update_trip(&self, trip: Trip) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        replace(&mut tables.trips, trip.id, trip)
    }

    fn trips_for_driver(&self, driver_id: DriverId) -> Result<Vec<Trip>, StorageError> {
        Ok(self
            .tables()?
            .trips
            .values()
            .filter(|trip| trip.driver_id == driver_id)
            .cloned()
            .collect())
    }

    fn insert_notification(
        &self,
        mut notification: Notification,
    ) -> Result<Notification, StorageError> {
        let mut tables = self.tables()?;
        notification.id = NotificationId(next(&mut tables.sequences.notifications));
        tables
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StorageError> {
        Ok(self.tables()?.notifications.get(&id).cloned())
    }

    fn update_notification(&self, notification: Notification) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        replace(&mut tables.notifications, notification.id, notification)
    }

    fn notifications_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError> {
        Ok(self
            .tables()?
            .notifications
            .values()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect())
    }
}
