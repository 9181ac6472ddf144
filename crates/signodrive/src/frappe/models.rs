use serde::{Deserialize, Serialize};

pub const DRIVER_DOCTYPE: &str = "Driver";
pub const JOB_DOCTYPE: &str = "Job Opening";
pub const APPLICATION_DOCTYPE: &str = "Job Applicant";

/// Driver document as stored in Frappe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrappeDriver {
    pub name: String,
    pub full_name: String,
    pub cell_number: Option<String>,
    pub license_number: Option<String>,
    pub issuing_date: Option<String>,
    pub expiry_date: Option<String>,
    pub status: Option<String>,
    pub address: Option<String>,
}

impl FrappeDriver {
    pub const FIELDS: &'static [&'static str] = &[
        "name",
        "full_name",
        "cell_number",
        "license_number",
        "issuing_date",
        "expiry_date",
        "status",
        "address",
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrappeJob {
    pub name: String,
    pub job_title: String,
    pub designation: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub lower_range: Option<f64>,
    pub upper_range: Option<f64>,
    pub planned_vacancies: Option<u32>,
    pub creation: Option<String>,
}

impl FrappeJob {
    pub const FIELDS: &'static [&'static str] = &[
        "name",
        "job_title",
        "designation",
        "status",
        "description",
        "location",
        "lower_range",
        "upper_range",
        "planned_vacancies",
        "creation",
    ];

    pub fn is_open(&self) -> bool {
        self.status.eq_ignore_ascii_case("open")
    }
}

/// Job applicant document; `job_title` links to the job opening's `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrappeApplication {
    pub name: String,
    pub applicant_name: String,
    pub email_id: Option<String>,
    pub phone_number: Option<String>,
    pub job_title: Option<String>,
    pub status: String,
    pub cover_letter: Option<String>,
    pub creation: Option<String>,
}

impl FrappeApplication {
    pub const FIELDS: &'static [&'static str] = &[
        "name",
        "applicant_name",
        "email_id",
        "phone_number",
        "job_title",
        "status",
        "cover_letter",
        "creation",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFrappeApplication {
    pub applicant_name: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email_id: Option<String>,
    pub job_title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cover_letter: Option<String>,
}
