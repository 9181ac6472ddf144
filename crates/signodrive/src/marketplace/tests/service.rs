use super::common::*;
use chrono::Duration;

use crate::marketplace::domain::{
    ApplicationStatus, DriverId, DriverUpdate, JobId, JobStatus, JobUpdate, NewNotification,
    NewTrip, NotificationKind, TripCompletion, TripStatus, UserId, UserRole, VehicleType,
};
use crate::marketplace::jobs::{ApplicantFilter, JobFilter};
use crate::marketplace::service::{Entity, MarketplaceError};
use crate::marketplace::storage::{MarketplaceStorage, StorageError};

#[test]
fn create_driver_requires_a_driver_account() {
    let (service, storage, _) = build_service();
    let owner = seed_user(&storage, "9123456780", UserRole::FleetOwner);

    match service.create_driver(new_driver(owner.id, "9123456780")) {
        Err(MarketplaceError::Validation(error)) => assert_eq!(error.field, "user_id"),
        other => panic!("expected role validation error, got {other:?}"),
    }

    match service.create_driver(new_driver(UserId(99), "9123456780")) {
        Err(MarketplaceError::NotFound {
            entity: Entity::User,
            id: 99,
        }) => {}
        other => panic!("expected missing user, got {other:?}"),
    }
}

#[test]
fn second_driver_profile_for_same_user_conflicts() {
    let (service, storage, _) = build_service();
    let driver = seed_driver(&service, &storage, "9811111111");

    match service.create_driver(new_driver(driver.user_id, "9811111111")) {
        Err(MarketplaceError::Storage(StorageError::Conflict(_))) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn driver_update_bumps_completion() {
    let (service, storage, clock) = build_service();
    let driver = seed_driver(&service, &storage, "9811111111");
    let before = service.driver_completion(driver.id).expect("completion");

    clock.advance(Duration::minutes(5));
    let updated = service
        .update_driver(
            driver.id,
            DriverUpdate {
                email: Some("Ramesh.Yadav@Example.in".to_string()),
                license_number: Some("mp09 2015 0012345".to_string()),
                available: Some(false),
                ..DriverUpdate::default()
            },
        )
        .expect("update succeeds");

    assert_eq!(updated.email.as_deref(), Some("ramesh.yadav@example.in"));
    assert_eq!(updated.license_number.as_deref(), Some("MP0920150012345"));
    assert!(!updated.available);
    assert!(updated.updated_at > driver.updated_at);

    let after = service.driver_completion(driver.id).expect("completion");
    assert_eq!(after.completed, before.completed + 2);
    assert!(after.percent > before.percent);
}

#[test]
fn job_needs_an_existing_poster() {
    let (service, _, _) = build_service();
    match service.create_job(new_job(crate::marketplace::domain::FleetOwnerId(5))) {
        Err(MarketplaceError::NotFound {
            entity: Entity::FleetOwner,
            ..
        }) => {}
        other => panic!("expected missing fleet owner, got {other:?}"),
    }
}

#[test]
fn applying_notifies_the_poster() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let driver = seed_driver(&service, &storage, "9811111111");
    let job = seed_job(&service, owner.id);

    let application = service
        .apply(application_for(job.id, driver.id))
        .expect("application accepted");
    assert_eq!(application.status, ApplicationStatus::Pending);

    let inbox = service
        .notifications(owner.user_id, false)
        .expect("owner inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::ApplicationReceived);
    assert!(inbox[0].message.contains("Ramesh Yadav"));

    match service.apply(application_for(job.id, driver.id)) {
        Err(MarketplaceError::Storage(StorageError::Conflict(_))) => {}
        other => panic!("expected duplicate conflict, got {other:?}"),
    }
}

#[test]
fn applying_to_a_paused_job_is_rejected() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let driver = seed_driver(&service, &storage, "9811111111");
    let job = seed_job(&service, owner.id);
    service
        .change_job_status(job.id, JobStatus::Paused)
        .expect("pause");

    match service.apply(application_for(job.id, driver.id)) {
        Err(MarketplaceError::JobNotOpen { status, .. }) => assert_eq!(status, JobStatus::Paused),
        other => panic!("expected job not open, got {other:?}"),
    }
}

#[test]
fn accepting_the_last_opening_fills_the_job() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let first = seed_driver(&service, &storage, "9811111111");
    let second = seed_driver(&service, &storage, "9822222222");
    let job = seed_job(&service, owner.id);

    let accepted = service
        .apply(application_for(job.id, first.id))
        .expect("first applies");
    let waiting = service
        .apply(application_for(job.id, second.id))
        .expect("second applies");

    service
        .change_application_status(accepted.id, ApplicationStatus::Shortlisted)
        .expect("shortlist");
    service
        .change_application_status(accepted.id, ApplicationStatus::Accepted)
        .expect("accept");

    assert_eq!(service.job(job.id).unwrap().status, JobStatus::Filled);

    let first_inbox = service.notifications(first.user_id, false).unwrap();
    assert_eq!(first_inbox.len(), 2);
    assert!(first_inbox
        .iter()
        .all(|n| n.kind == NotificationKind::ApplicationStatus));

    let second_inbox = service.notifications(second.user_id, false).unwrap();
    assert_eq!(second_inbox.len(), 1);
    assert_eq!(second_inbox[0].kind, NotificationKind::JobStatus);
    assert!(second_inbox[0].message.contains("filled"));

    let stats = service.job_stats(job.id).unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.remaining_openings, 0);
    assert_eq!(
        service
            .job_applications(
                job.id,
                ApplicantFilter {
                    status: Some(ApplicationStatus::Pending)
                }
            )
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect::<Vec<_>>(),
        vec![waiting.id]
    );
}

#[test]
fn filled_job_rejects_further_acceptances() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let first = seed_driver(&service, &storage, "9811111111");
    let second = seed_driver(&service, &storage, "9822222222");
    let job = seed_job(&service, owner.id);

    let hired = service.apply(application_for(job.id, first.id)).unwrap();
    let late = service.apply(application_for(job.id, second.id)).unwrap();
    service
        .change_application_status(hired.id, ApplicationStatus::Accepted)
        .expect("accept");
    assert_eq!(service.job(job.id).unwrap().status, JobStatus::Filled);

    match service.change_application_status(late.id, ApplicationStatus::Accepted) {
        Err(MarketplaceError::JobNotOpen { status, .. }) => assert_eq!(status, JobStatus::Filled),
        other => panic!("expected job not open, got {other:?}"),
    }
    assert_eq!(
        service.application(late.id).unwrap().status,
        ApplicationStatus::Pending
    );
    let stats = service.job_stats(job.id).unwrap();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.remaining_openings, 0);
}

#[test]
fn paused_job_accepts_nobody_until_reopened() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let driver = seed_driver(&service, &storage, "9811111111");
    let job = seed_job(&service, owner.id);
    let application = service.apply(application_for(job.id, driver.id)).unwrap();
    service
        .change_job_status(job.id, JobStatus::Paused)
        .expect("pause");

    match service.change_application_status(application.id, ApplicationStatus::Accepted) {
        Err(MarketplaceError::JobNotOpen { status, .. }) => assert_eq!(status, JobStatus::Paused),
        other => panic!("expected job not open, got {other:?}"),
    }

    service
        .change_job_status(job.id, JobStatus::Open)
        .expect("reopen");
    service
        .change_application_status(application.id, ApplicationStatus::Accepted)
        .expect("accept after reopening");
    assert_eq!(service.job(job.id).unwrap().status, JobStatus::Filled);
}

#[test]
fn withdrawal_is_silent_and_final() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let driver = seed_driver(&service, &storage, "9811111111");
    let job = seed_job(&service, owner.id);
    let application = service.apply(application_for(job.id, driver.id)).unwrap();

    service
        .change_application_status(application.id, ApplicationStatus::Withdrawn)
        .expect("withdraw");
    assert!(service.notifications(driver.user_id, false).unwrap().is_empty());

    match service.change_application_status(application.id, ApplicationStatus::Shortlisted) {
        Err(MarketplaceError::ApplicationTransition(error)) => {
            assert_eq!(error.from, ApplicationStatus::Withdrawn);
        }
        other => panic!("expected transition error, got {other:?}"),
    }
}

#[test]
fn closing_a_job_notifies_open_applicants_only() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let active = seed_driver(&service, &storage, "9811111111");
    let rejected = seed_driver(&service, &storage, "9822222222");
    let job = seed_job(&service, owner.id);

    service.apply(application_for(job.id, active.id)).unwrap();
    let turned_down = service.apply(application_for(job.id, rejected.id)).unwrap();
    service
        .change_application_status(turned_down.id, ApplicationStatus::Rejected)
        .unwrap();

    service
        .change_job_status(job.id, JobStatus::Closed)
        .expect("close");

    let active_inbox = service.notifications(active.user_id, false).unwrap();
    assert_eq!(active_inbox.len(), 1);
    assert_eq!(active_inbox[0].kind, NotificationKind::JobStatus);
    // Only the rejection message, nothing for the closure.
    assert_eq!(service.notifications(rejected.user_id, false).unwrap().len(), 1);

    match service.change_job_status(job.id, JobStatus::Open) {
        Err(MarketplaceError::JobTransition(error)) => assert_eq!(error.from, JobStatus::Closed),
        other => panic!("expected transition error, got {other:?}"),
    }
}

#[test]
fn job_updates_respect_salary_and_accepted_counts() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let driver = seed_driver(&service, &storage, "9811111111");
    let mut request = new_job(owner.id);
    request.openings = 3;
    let job = service.create_job(request).unwrap();

    match service.update_job(
        job.id,
        JobUpdate {
            salary_max: Some(20000),
            ..JobUpdate::default()
        },
    ) {
        Err(MarketplaceError::Validation(error)) => assert_eq!(error.field, "salary_max"),
        other => panic!("expected salary validation, got {other:?}"),
    }

    let application = service.apply(application_for(job.id, driver.id)).unwrap();
    service
        .change_application_status(application.id, ApplicationStatus::Accepted)
        .unwrap();

    match service.update_job(
        job.id,
        JobUpdate {
            openings: Some(0),
            ..JobUpdate::default()
        },
    ) {
        Err(MarketplaceError::Validation(error)) => assert_eq!(error.field, "openings"),
        other => panic!("expected openings validation, got {other:?}"),
    }

    let updated = service
        .update_job(
            job.id,
            JobUpdate {
                openings: Some(1),
                title: Some("  Senior trailer driver ".to_string()),
                ..JobUpdate::default()
            },
        )
        .expect("shrinking to the accepted count is allowed");
    assert_eq!(updated.openings, 1);
    assert_eq!(updated.title, "Senior trailer driver");
}

#[test]
fn terminal_jobs_cannot_be_edited() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let job = seed_job(&service, owner.id);
    service.change_job_status(job.id, JobStatus::Closed).unwrap();

    match service.update_job(job.id, JobUpdate::default()) {
        Err(MarketplaceError::JobNotOpen { status, .. }) => assert_eq!(status, JobStatus::Closed),
        other => panic!("expected job not open, got {other:?}"),
    }
}

#[test]
fn deleting_a_job_removes_its_applications() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let driver = seed_driver(&service, &storage, "9811111111");
    let job = seed_job(&service, owner.id);
    let application = service.apply(application_for(job.id, driver.id)).unwrap();

    service.delete_job(job.id).expect("delete");

    assert!(service.driver_applications(driver.id).unwrap().is_empty());
    assert!(storage.application(application.id).unwrap().is_none());
    match service.delete_job(job.id) {
        Err(MarketplaceError::NotFound {
            entity: Entity::Job,
            ..
        }) => {}
        other => panic!("expected missing job, got {other:?}"),
    }
}

#[test]
fn job_listing_filters_newest_first() {
    let (service, storage, clock) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let transporter = seed_transporter(&service, &storage);

    let older = seed_job(&service, owner.id);
    clock.advance(Duration::hours(1));
    let mut tanker = new_job(owner.id);
    tanker.vehicle_type = VehicleType::Tanker;
    tanker.title = "Tanker driver".to_string();
    let tanker = service.create_job(tanker).unwrap();
    clock.advance(Duration::hours(1));
    let mut hauled = new_job(owner.id);
    hauled.poster = crate::marketplace::domain::JobPoster::Transporter(transporter.id);
    let hauled = service.create_job(hauled).unwrap();

    let all = service.jobs(&JobFilter::default()).unwrap();
    assert_eq!(
        all.iter().map(|j| j.id).collect::<Vec<_>>(),
        vec![hauled.id, tanker.id, older.id]
    );

    let trailers = service
        .jobs(&JobFilter {
            vehicle_type: Some(VehicleType::Trailer),
            fleet_owner_id: Some(owner.id.0),
            ..JobFilter::default()
        })
        .unwrap();
    assert_eq!(trailers.len(), 1);
    assert_eq!(trailers[0].id, older.id);

    let page = service
        .jobs(&JobFilter {
            limit: Some(1),
            offset: Some(1),
            ..JobFilter::default()
        })
        .unwrap();
    assert_eq!(page[0].id, tanker.id);
}

#[test]
fn recommendations_match_vehicles_and_locations() {
    let (service, storage, _) = build_service();
    let owner = seed_fleet_owner(&service, &storage);
    let driver = seed_driver(&service, &storage, "9811111111");

    let matching = seed_job(&service, owner.id);
    let mut elsewhere = new_job(owner.id);
    elsewhere.location = "Chennai".to_string();
    service.create_job(elsewhere).unwrap();
    let mut bus = new_job(owner.id);
    bus.vehicle_type = VehicleType::Bus;
    service.create_job(bus).unwrap();

    let recommended = service.recommended_jobs(driver.id).unwrap();
    assert_eq!(
        recommended.iter().map(|j| j.id).collect::<Vec<_>>(),
        vec![matching.id]
    );
}

#[test]
fn trip_lifecycle_and_summary() {
    let (service, storage, clock) = build_service();
    let driver = seed_driver(&service, &storage, "9811111111");

    let planned = service
        .log_trip(NewTrip {
            driver_id: driver.id,
            vehicle_number: "mp09 hf-4521".to_string(),
            origin: "Indore".to_string(),
            destination: "Mumbai".to_string(),
            started_at: start_time() + Duration::hours(2),
            notes: None,
        })
        .expect("trip logged");
    assert_eq!(planned.status, TripStatus::Planned);
    assert_eq!(planned.vehicle_number, "MP09HF4521");

    let started = service.start_trip(planned.id).expect("start early");
    assert_eq!(started.status, TripStatus::InProgress);
    assert_eq!(started.started_at, start_time());

    match service.complete_trip(
        planned.id,
        TripCompletion {
            ended_at: start_time() - Duration::hours(1),
            distance_km: 10.0,
            earnings: None,
        },
    ) {
        Err(MarketplaceError::Validation(error)) => assert_eq!(error.field, "ended_at"),
        other => panic!("expected ended_at validation, got {other:?}"),
    }

    clock.advance(Duration::hours(14));
    service
        .complete_trip(
            planned.id,
            TripCompletion {
                ended_at: clock_now(&clock),
                distance_km: 588.5,
                earnings: Some(4200),
            },
        )
        .expect("complete");

    let cancelled = service
        .log_trip(NewTrip {
            driver_id: driver.id,
            vehicle_number: "MP09HF4521".to_string(),
            origin: "Mumbai".to_string(),
            destination: "Indore".to_string(),
            started_at: clock_now(&clock) - Duration::minutes(30),
            notes: Some("Return load".to_string()),
        })
        .unwrap();
    assert_eq!(cancelled.status, TripStatus::InProgress);
    service.cancel_trip(cancelled.id).unwrap();

    match service.start_trip(cancelled.id) {
        Err(MarketplaceError::TripTransition(error)) => assert_eq!(error.from, TripStatus::Cancelled),
        other => panic!("expected trip transition error, got {other:?}"),
    }

    let summary = service.trip_summary(driver.id).unwrap();
    assert_eq!(summary.total_trips, 2);
    assert_eq!(summary.completed_trips, 1);
    assert_eq!(summary.total_earnings, 4200);
    assert!((summary.total_distance_km - 588.5).abs() < f64::EPSILON);

    let csv = service.export_trips(driver.id).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("trip_id,vehicle_number"));
    assert!(lines[1].contains("completed"));
    assert!(lines[2].contains("Return load"));
}

fn clock_now(clock: &ManualClock) -> chrono::DateTime<chrono::Utc> {
    use crate::marketplace::service::Clock;
    clock.now()
}

#[test]
fn trips_for_unknown_driver_are_not_found() {
    let (service, _, _) = build_service();
    match service.trip_summary(DriverId(12)) {
        Err(MarketplaceError::NotFound {
            entity: Entity::Driver,
            id: 12,
        }) => {}
        other => panic!("expected missing driver, got {other:?}"),
    }
}

#[test]
fn notifications_list_newest_first_and_mark_read() {
    let (service, storage, clock) = build_service();
    let user = seed_user(&storage, "9811111111", UserRole::Driver);

    let first = service
        .create_notification(NewNotification {
            user_id: user.id,
            kind: NotificationKind::System,
            title: "KYC".to_string(),
            message: "Upload your licence".to_string(),
        })
        .unwrap();
    clock.advance(Duration::minutes(1));
    let second = service
        .create_notification(NewNotification {
            user_id: user.id,
            kind: NotificationKind::System,
            title: "Tip".to_string(),
            message: "Add a profile photo".to_string(),
        })
        .unwrap();

    let listed = service.notifications(user.id, false).unwrap();
    assert_eq!(
        listed.iter().map(|n| n.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );

    service.mark_notification_read(first.id).unwrap();
    let unread = service.notifications(user.id, true).unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(service.unread_count(user.id).unwrap(), 1);

    assert_eq!(service.mark_all_read(user.id).unwrap(), 1);
    assert_eq!(service.mark_all_read(user.id).unwrap(), 0);
    assert_eq!(service.unread_count(user.id).unwrap(), 0);
}

#[test]
fn notification_for_unknown_user_is_rejected() {
    let (service, _, _) = build_service();
    match service.create_notification(NewNotification {
        user_id: UserId(3),
        kind: NotificationKind::System,
        title: "Hello".to_string(),
        message: "World".to_string(),
    }) {
        Err(MarketplaceError::NotFound {
            entity: Entity::User,
            ..
        }) => {}
        other => panic!("expected missing user, got {other:?}"),
    }
}

#[test]
fn storage_outage_surfaces_as_storage_error() {
    let service = unavailable_service();
    match service.job(JobId(1)) {
        Err(MarketplaceError::Storage(StorageError::Unavailable(message))) => {
            assert_eq!(message, "database offline");
        }
        other => panic!("expected unavailable storage, got {other:?}"),
    }
}
