use super::domain::{Application, ApplicationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("application cannot move from {from} to {to}")]
pub struct ApplicationTransitionError {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

pub fn can_transition(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    use ApplicationStatus::*;
    matches!(
        (from, to),
        (Pending, Shortlisted)
            | (Pending, Accepted)
            | (Pending, Rejected)
            | (Pending, Withdrawn)
            | (Shortlisted, Accepted)
            | (Shortlisted, Rejected)
            | (Shortlisted, Withdrawn)
    )
}

pub fn transition(
    application: &mut Application,
    to: ApplicationStatus,
) -> Result<(), ApplicationTransitionError> {
    if !can_transition(application.status, to) {
        return Err(ApplicationTransitionError {
            from: application.status,
            to,
        });
    }
    application.status = to;
    Ok(())
}

/// Message sent to the driver when the poster moves their application.
pub(crate) fn status_message(status: ApplicationStatus, job_title: &str) -> Option<String> {
    match status {
        ApplicationStatus::Shortlisted => {
            Some(format!("You have been shortlisted for \"{job_title}\"."))
        }
        ApplicationStatus::Accepted => Some(format!(
            "Congratulations! Your application for \"{job_title}\" was accepted."
        )),
        ApplicationStatus::Rejected => Some(format!(
            "Your application for \"{job_title}\" was not selected this time."
        )),
        ApplicationStatus::Pending | ApplicationStatus::Withdrawn => None,
    }
}
