use chrono::{Duration, Utc};
use clap::Args;
use signodrive::config::{AppConfig, RegistrationConfig};
use signodrive::error::AppError;
use signodrive::frappe::FrappeClient;
use signodrive::marketplace::{
    ApplicationStatus, CompleteRegistration, DriverDetails, FleetOwnerDetails, InMemoryStorage,
    JobPoster, JobStatus, JobType, MarketplaceService, NewApplication, NewJob, NewTrip,
    RegisteredAccount, RegistrationProfile, SqliteStorage, StartRegistration, TripCompletion,
    VehicleType, VerifyRegistration,
};
use signodrive::marketplace::storage::SCHEMA_VERSION;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Also print the driver's trip log as CSV.
    #[arg(long)]
    pub(crate) show_csv: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct MigrateArgs {
    /// Database file to migrate (defaults to APP_DATABASE_PATH).
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct FrappeJobsArgs {
    /// Maximum number of job openings to list.
    #[arg(long, default_value_t = 20)]
    pub(crate) limit: usize,
}

pub(crate) fn run_migrate(args: MigrateArgs) -> Result<(), AppError> {
    let path = match args.database {
        Some(path) => path,
        None => AppConfig::load()?.storage.database_path,
    };
    let storage = SqliteStorage::open(&path)?;
    println!(
        "Database {} at schema version {} (latest {})",
        storage.path().display(),
        storage.schema_version()?,
        SCHEMA_VERSION
    );
    Ok(())
}

pub(crate) async fn run_frappe_jobs(args: FrappeJobsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let client = FrappeClient::from_config(&config.frappe)?;
    let jobs = client.open_jobs(args.limit).await?;

    println!("Open job openings on {}", client.base_url());
    if jobs.is_empty() {
        println!("- none");
    }
    for job in jobs {
        let salary = match (job.lower_range, job.upper_range) {
            (Some(low), Some(high)) => format!("INR {low:.0}-{high:.0}"),
            (Some(low), None) => format!("from INR {low:.0}"),
            _ => "salary not listed".to_string(),
        };
        println!(
            "- {} | {} | {} | {}",
            job.name,
            job.job_title,
            job.location.as_deref().unwrap_or("location not listed"),
            salary
        );
    }
    Ok(())
}

fn register(
    service: &MarketplaceService<InMemoryStorage>,
    phone: &str,
    full_name: &str,
    profile: RegistrationProfile,
) -> Result<RegisteredAccount, AppError> {
    let registration = RegistrationConfig::default();
    let session = service.start_registration(StartRegistration {
        phone: phone.to_string(),
        role: profile.role(),
    })?;
    service.verify_registration(VerifyRegistration {
        session_id: session.session_id.clone(),
        otp: registration.otp_code,
    })?;
    Ok(service.complete_registration(CompleteRegistration {
        session_id: session.session_id,
        full_name: full_name.to_string(),
        email: None,
        profile,
    })?)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service = MarketplaceService::new(
        Arc::new(InMemoryStorage::new()),
        &RegistrationConfig::default(),
    );

    println!("SignoDrive marketplace demo");

    let owner_account = register(
        &service,
        "9876500001",
        "Harpreet Kaur",
        RegistrationProfile::FleetOwner(FleetOwnerDetails {
            company_name: "Punjab Roadways Logistics".to_string(),
            fleet_size: 25,
            city: Some("Ludhiana".to_string()),
            ..FleetOwnerDetails::default()
        }),
    )?;
    let driver_account = register(
        &service,
        "9876500002",
        "Mohan Lal",
        RegistrationProfile::Driver(DriverDetails {
            city: Some("Ludhiana".to_string()),
            experience_years: Some(9),
            vehicle_types: vec![VehicleType::Truck, VehicleType::Trailer],
            preferred_locations: vec!["Ludhiana".to_string()],
            ..DriverDetails::default()
        }),
    )?;
    let (Some(owner_id), Some(driver_id)) =
        (owner_account.fleet_owner_id, driver_account.driver_id)
    else {
        println!("  Registration did not create the expected profiles");
        return Ok(());
    };
    println!(
        "- Registered fleet owner {} (user {}) and driver {} (user {})",
        owner_id, owner_account.user.id, driver_id, driver_account.user.id
    );

    let completion = service.driver_completion(driver_id)?;
    println!(
        "  Driver profile {}% complete, missing: {}",
        completion.percent,
        completion.missing.join(", ")
    );

    let job = service.create_job(NewJob {
        poster: JobPoster::FleetOwner(owner_id),
        title: "Trailer driver, Ludhiana to Kandla".to_string(),
        description: "Container haulage, 4 round trips a month".to_string(),
        vehicle_type: VehicleType::Trailer,
        location: "Ludhiana".to_string(),
        salary_min: 28000,
        salary_max: 35000,
        job_type: JobType::FullTime,
        openings: 1,
        required_experience_years: 5,
        required_license: None,
        status: JobStatus::Open,
    })?;
    println!("- Posted job {} \"{}\" ({})", job.id, job.title, job.status);

    let recommended = service.recommended_jobs(driver_id)?;
    println!("  {} job(s) recommended for the driver", recommended.len());

    let application = service.apply(NewApplication {
        job_id: job.id,
        driver_id,
        cover_note: Some("Nine years on trailers, clean record".to_string()),
        expected_salary: Some(32000),
    })?;
    println!("- Driver applied: application {}", application.id);

    service.change_application_status(application.id, ApplicationStatus::Shortlisted)?;
    let accepted = service.change_application_status(application.id, ApplicationStatus::Accepted)?;
    let job = service.job(job.id)?;
    println!(
        "  Application {} -> {} | job now {}",
        accepted.id, accepted.status, job.status
    );

    let started_at = Utc::now() - Duration::hours(20);
    let trip = service.log_trip(NewTrip {
        driver_id,
        vehicle_number: "PB10 GH 7788".to_string(),
        origin: "Ludhiana".to_string(),
        destination: "Kandla".to_string(),
        started_at,
        notes: Some("First run for Punjab Roadways".to_string()),
    })?;
    service.complete_trip(
        trip.id,
        TripCompletion {
            ended_at: Utc::now(),
            distance_km: 1224.0,
            earnings: Some(9500),
        },
    )?;
    let summary = service.trip_summary(driver_id)?;
    println!(
        "- Trips: {} logged, {} completed, {:.1} km, INR {} earned",
        summary.total_trips, summary.completed_trips, summary.total_distance_km, summary.total_earnings
    );

    for (label, user_id) in [
        ("Fleet owner", owner_account.user.id),
        ("Driver", driver_account.user.id),
    ] {
        println!("\n{label} notifications");
        for notification in service.notifications(user_id, false)? {
            println!("  - [{}] {}", notification.title, notification.message);
        }
    }

    if args.show_csv {
        println!("\nTrip log CSV");
        print!("{}", service.export_trips(driver_id)?);
    }

    Ok(())
}
