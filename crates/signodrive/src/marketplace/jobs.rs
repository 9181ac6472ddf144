use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationStatus, DriverProfile, Job, JobId, JobPoster, JobStatus, VehicleType,
};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

/// Rejected job lifecycle move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("job cannot move from {from} to {to}")]
pub struct JobTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    matches!(
        (from, to),
        (Draft, Open)
            | (Draft, Closed)
            | (Open, Paused)
            | (Open, Closed)
            | (Open, Filled)
            | (Paused, Open)
            | (Paused, Closed)
    )
}

pub fn transition(job: &mut Job, to: JobStatus) -> Result<(), JobTransitionError> {
    if !can_transition(job.status, to) {
        return Err(JobTransitionError {
            from: job.status,
            to,
        });
    }
    job.status = to;
    Ok(())
}

/// Query-string filter for job listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub vehicle_type: Option<VehicleType>,
    pub location: Option<String>,
    pub min_salary: Option<u32>,
    pub fleet_owner_id: Option<u64>,
    pub transporter_id: Option<u64>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        if self.status.is_some_and(|status| status != job.status) {
            return false;
        }
        if self
            .vehicle_type
            .is_some_and(|vehicle| vehicle != job.vehicle_type)
        {
            return false;
        }
        if let Some(location) = self.location.as_deref().filter(|l| !l.trim().is_empty()) {
            if !contains_ignore_case(&job.location, location) {
                return false;
            }
        }
        if self.min_salary.is_some_and(|min| job.salary_max < min) {
            return false;
        }
        if let Some(owner) = self.fleet_owner_id {
            if !matches!(job.poster, JobPoster::FleetOwner(id) if id.0 == owner) {
                return false;
            }
        }
        if let Some(transporter) = self.transporter_id {
            if !matches!(job.poster, JobPoster::Transporter(id) if id.0 == transporter) {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            if !contains_ignore_case(&job.title, search)
                && !contains_ignore_case(&job.description, search)
            {
                return false;
            }
        }
        true
    }

    /// Filters, sorts newest first, and paginates.
    pub fn apply(&self, jobs: Vec<Job>) -> Vec<Job> {
        let mut matched: Vec<Job> = jobs.into_iter().filter(|job| self.matches(job)).collect();
        matched.sort_by_key(|job| Reverse((job.created_at, job.id)));

        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        matched
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(limit)
            .collect()
    }
}

/// Filter for a job's applicant list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantFilter {
    pub status: Option<ApplicationStatus>,
}

impl ApplicantFilter {
    pub fn apply(&self, applications: Vec<Application>) -> Vec<Application> {
        let mut matched: Vec<Application> = applications
            .into_iter()
            .filter(|application| self.status.map_or(true, |s| application.status == s))
            .collect();
        matched.sort_by_key(|application| (application.applied_at, application.id));
        matched
    }
}

/// Applicant counts shown on the poster's job dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_applications: usize,
    pub pending: usize,
    pub shortlisted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub withdrawn: usize,
    pub remaining_openings: u32,
}

impl JobStats {
    pub fn compute(job: &Job, applications: &[Application]) -> Self {
        let count = |status: ApplicationStatus| {
            applications
                .iter()
                .filter(|application| application.status == status)
                .count()
        };
        let accepted = count(ApplicationStatus::Accepted);

        Self {
            job_id: job.id,
            status: job.status,
            total_applications: applications.len(),
            pending: count(ApplicationStatus::Pending),
            shortlisted: count(ApplicationStatus::Shortlisted),
            accepted,
            rejected: count(ApplicationStatus::Rejected),
            withdrawn: count(ApplicationStatus::Withdrawn),
            remaining_openings: job.openings.saturating_sub(accepted as u32),
        }
    }
}

/// Open jobs that fit the driver's vehicles and, when listed, preferred locations.
pub fn recommended_for(driver: &DriverProfile, jobs: Vec<Job>) -> Vec<Job> {
    let mut matched: Vec<Job> = jobs
        .into_iter()
        .filter(|job| job.status == JobStatus::Open)
        .filter(|job| driver.vehicle_types.contains(&job.vehicle_type))
        .filter(|job| {
            driver.preferred_locations.is_empty()
                || driver
                    .preferred_locations
                    .iter()
                    .any(|location| contains_ignore_case(&job.location, location))
        })
        .collect();
    matched.sort_by_key(|job| Reverse((job.created_at, job.id)));
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{
        ApplicationId, DriverId, FleetOwnerId, JobType, TransporterId, UserId,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn job(id: u64, title: &str, location: &str, vehicle: VehicleType) -> Job {
        let created = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap() + Duration::hours(id as i64);
        Job {
            id: JobId(id),
            poster: JobPoster::FleetOwner(FleetOwnerId(1)),
            title: title.to_string(),
            description: "Company accommodation provided".to_string(),
            vehicle_type: vehicle,
            location: location.to_string(),
            salary_min: 18000,
            salary_max: 24000,
            job_type: JobType::FullTime,
            openings: 2,
            required_experience_years: 2,
            required_license: None,
            status: JobStatus::Open,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn lifecycle_transitions_follow_the_table() {
        let mut posting = job(1, "Driver", "Pune", VehicleType::Truck);
        transition(&mut posting, JobStatus::Paused).expect("open -> paused");
        transition(&mut posting, JobStatus::Open).expect("paused -> open");
        transition(&mut posting, JobStatus::Filled).expect("open -> filled");

        let err = transition(&mut posting, JobStatus::Open).unwrap_err();
        assert_eq!(err.from, JobStatus::Filled);
        assert_eq!(err.to, JobStatus::Open);
        assert_eq!(err.to_string(), "job cannot move from filled to open");
    }

    #[test]
    fn same_state_and_draft_shortcuts_are_rejected() {
        assert!(!can_transition(JobStatus::Open, JobStatus::Open));
        assert!(!can_transition(JobStatus::Draft, JobStatus::Filled));
        assert!(!can_transition(JobStatus::Draft, JobStatus::Paused));
        assert!(can_transition(JobStatus::Draft, JobStatus::Open));
    }

    #[test]
    fn filter_matches_location_and_search_case_insensitively() {
        let jobs = vec![
            job(1, "Trailer pilot", "Navi Mumbai", VehicleType::Trailer),
            job(2, "City delivery", "Pune", VehicleType::MiniTruck),
            job(3, "Trailer relief", "Mumbai Port", VehicleType::Trailer),
        ];

        let filter = JobFilter {
            location: Some("mumbai".to_string()),
            search: Some("TRAILER".to_string()),
            ..JobFilter::default()
        };
        let ids: Vec<u64> = filter.apply(jobs).iter().map(|job| job.id.0).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn min_salary_compares_against_upper_bound() {
        let mut rich = job(1, "A", "Pune", VehicleType::Truck);
        rich.salary_max = 40000;
        let poor = job(2, "B", "Pune", VehicleType::Truck);

        let filter = JobFilter {
            min_salary: Some(30000),
            ..JobFilter::default()
        };
        let matched = filter.apply(vec![rich, poor]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, JobId(1));
    }

    #[test]
    fn poster_filter_distinguishes_roles() {
        let mut transporter_job = job(1, "A", "Pune", VehicleType::Truck);
        transporter_job.poster = JobPoster::Transporter(TransporterId(1));
        let owner_job = job(2, "B", "Pune", VehicleType::Truck);

        let filter = JobFilter {
            transporter_id: Some(1),
            ..JobFilter::default()
        };
        let matched = filter.apply(vec![transporter_job, owner_job]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, JobId(1));
    }

    #[test]
    fn pagination_is_clamped() {
        let jobs: Vec<Job> = (1..=5)
            .map(|id| job(id, "Driver", "Pune", VehicleType::Truck))
            .collect();

        let page = JobFilter {
            limit: Some(2),
            offset: Some(1),
            ..JobFilter::default()
        }
        .apply(jobs.clone());
        let ids: Vec<u64> = page.iter().map(|job| job.id.0).collect();
        assert_eq!(ids, vec![4, 3]);

        let zero_limit = JobFilter {
            limit: Some(0),
            ..JobFilter::default()
        }
        .apply(jobs);
        assert_eq!(zero_limit.len(), 1);
    }

    fn application(id: u64, status: ApplicationStatus) -> Application {
        let at = Utc.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap() + Duration::minutes(id as i64);
        Application {
            id: ApplicationId(id),
            job_id: JobId(1),
            driver_id: DriverId(id),
            cover_note: None,
            expected_salary: None,
            status,
            applied_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn stats_count_each_status() {
        let posting = job(1, "Driver", "Pune", VehicleType::Truck);
        let applications = vec![
            application(1, ApplicationStatus::Pending),
            application(2, ApplicationStatus::Accepted),
            application(3, ApplicationStatus::Rejected),
            application(4, ApplicationStatus::Shortlisted),
        ];
        let stats = JobStats::compute(&posting, &applications);
        assert_eq!(stats.total_applications, 4);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.remaining_openings, 1);
        assert_eq!(stats.withdrawn, 0);
    }

    #[test]
    fn applicant_filter_keeps_requested_status_in_arrival_order() {
        let applications = vec![
            application(3, ApplicationStatus::Pending),
            application(1, ApplicationStatus::Pending),
            application(2, ApplicationStatus::Rejected),
        ];
        let pending = ApplicantFilter {
            status: Some(ApplicationStatus::Pending),
        }
        .apply(applications);
        let ids: Vec<u64> = pending.iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn recommendations_respect_vehicles_and_locations() {
        let now = Utc::now();
        let driver = DriverProfile {
            id: DriverId(1),
            user_id: UserId(1),
            full_name: "Anil".to_string(),
            phone: "9000000001".to_string(),
            email: None,
            date_of_birth: None,
            address: None,
            city: None,
            license_number: None,
            license_type: None,
            license_expiry: None,
            identity_number: None,
            experience_years: None,
            vehicle_types: vec![VehicleType::Tanker],
            preferred_locations: vec!["gujarat".to_string()],
            photo_url: None,
            available: true,
            verified: false,
            created_at: now,
            updated_at: now,
        };
        let mut closed = job(3, "Tanker", "Surat, Gujarat", VehicleType::Tanker);
        closed.status = JobStatus::Closed;
        let jobs = vec![
            job(1, "Tanker", "Vadodara, Gujarat", VehicleType::Tanker),
            job(2, "Tanker", "Indore", VehicleType::Tanker),
            closed,
            job(4, "Truck", "Ahmedabad, Gujarat", VehicleType::Truck),
        ];

        let recommended = recommended_for(&driver, jobs);
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].id, JobId(1));
    }
}
