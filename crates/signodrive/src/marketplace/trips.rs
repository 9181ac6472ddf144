use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{DriverId, Trip, TripCompletion, TripStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("trip cannot move from {from} to {to}")]
pub struct TripTransitionError {
    pub from: TripStatus,
    pub to: TripStatus,
}

pub fn can_transition(from: TripStatus, to: TripStatus) -> bool {
    use TripStatus::*;
    matches!(
        (from, to),
        (Planned, InProgress) | (Planned, Cancelled) | (InProgress, Completed) | (InProgress, Cancelled)
    )
}

fn transition(trip: &mut Trip, to: TripStatus) -> Result<(), TripTransitionError> {
    if !can_transition(trip.status, to) {
        return Err(TripTransitionError {
            from: trip.status,
            to,
        });
    }
    trip.status = to;
    Ok(())
}

/// Trips that start in the future are logged as planned; the rest are already under way.
pub fn initial_status(started_at: DateTime<Utc>, now: DateTime<Utc>) -> TripStatus {
    if started_at > now {
        TripStatus::Planned
    } else {
        TripStatus::InProgress
    }
}

pub fn start(trip: &mut Trip, now: DateTime<Utc>) -> Result<(), TripTransitionError> {
    transition(trip, TripStatus::InProgress)?;
    if trip.started_at > now {
        trip.started_at = now;
    }
    Ok(())
}

pub fn complete(trip: &mut Trip, completion: TripCompletion) -> Result<(), TripTransitionError> {
    transition(trip, TripStatus::Completed)?;
    trip.ended_at = Some(completion.ended_at);
    trip.distance_km = Some(completion.distance_km);
    trip.earnings = completion.earnings;
    Ok(())
}

pub fn cancel(trip: &mut Trip) -> Result<(), TripTransitionError> {
    transition(trip, TripStatus::Cancelled)
}

/// Totals over a driver's completed trips.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub driver_id: DriverId,
    pub total_trips: usize,
    pub completed_trips: usize,
    pub total_distance_km: f64,
    pub total_earnings: u64,
}

impl TripSummary {
    pub fn compute(driver_id: DriverId, trips: &[Trip]) -> Self {
        let completed: Vec<&Trip> = trips
            .iter()
            .filter(|trip| trip.status == TripStatus::Completed)
            .collect();

        Self {
            driver_id,
            total_trips: trips.len(),
            completed_trips: completed.len(),
            total_distance_km: completed.iter().filter_map(|trip| trip.distance_km).sum(),
            total_earnings: completed
                .iter()
                .filter_map(|trip| trip.earnings)
                .map(u64::from)
                .sum(),
        }
    }
}

/// Column order of the trip export; matches the fields of `TripCsvRow`.
pub const TRIP_CSV_HEADER: [&str; 10] = [
    "trip_id",
    "vehicle_number",
    "origin",
    "destination",
    "started_at",
    "ended_at",
    "status",
    "distance_km",
    "earnings",
    "notes",
];

#[derive(Debug, Serialize)]
struct TripCsvRow<'a> {
    trip_id: u64,
    vehicle_number: &'a str,
    origin: &'a str,
    destination: &'a str,
    started_at: String,
    ended_at: String,
    status: &'static str,
    distance_km: String,
    earnings: String,
    notes: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum TripExportError {
    #[error("failed to write trip csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to finish trip csv: {0}")]
    Flush(String),
}

/// Renders the driver's trip log as CSV with a header row.
pub fn export_csv(trips: &[Trip]) -> Result<String, TripExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(TRIP_CSV_HEADER)?;
    for trip in trips {
        writer.serialize(TripCsvRow {
            trip_id: trip.id.0,
            vehicle_number: &trip.vehicle_number,
            origin: &trip.origin,
            destination: &trip.destination,
            started_at: trip.started_at.to_rfc3339(),
            ended_at: trip
                .ended_at
                .map(|ended| ended.to_rfc3339())
                .unwrap_or_default(),
            status: trip.status.label(),
            distance_km: trip
                .distance_km
                .map(|distance| format!("{distance:.1}"))
                .unwrap_or_default(),
            earnings: trip
                .earnings
                .map(|earnings| earnings.to_string())
                .unwrap_or_default(),
            notes: trip.notes.as_deref().unwrap_or_default(),
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| TripExportError::Flush(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| TripExportError::Flush(err.to_string()))
}
