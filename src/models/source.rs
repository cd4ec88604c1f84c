//! Registry source definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Type classification of a registry listing.
///
/// Used as the document type in the search index and to scope the delete
/// phase of a reindex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ClinicalOfficers,
    Doctors,
    HealthFacilities,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ClinicalOfficers => "clinical-officers",
            Category::Doctors => "doctors",
            Category::HealthFacilities => "health-facilities",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single registry listing to crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short unique name, used in logs, alerts and document ids
    pub name: String,

    /// Type classification of the records
    pub category: Category,

    /// Listing URL with a `{page}` placeholder
    pub site_url: String,

    /// Ordered field names; the last one holds the synthetic document id
    pub fields: Vec<String>,

    /// Classification tag added to every record and used to scope deletion
    #[serde(default)]
    pub doctor_type: Option<String>,

    /// Storage key of the current snapshot
    pub archive_key: String,

    /// Storage key of the dated snapshots, with a `{date}` placeholder
    pub historical_key: String,

    /// CSS selector of the results table
    #[serde(default = "defaults::table_selector")]
    pub table_selector: String,

    /// CSS selector of a row, relative to the table
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// CSS selector of a cell, relative to a row
    #[serde(default = "defaults::cell_selector")]
    pub cell_selector: String,

    /// CSS selector of the pagination indicator on page 1
    #[serde(default = "defaults::pagination_selector")]
    pub pagination_selector: String,
}

impl SourceConfig {
    /// URL of a listing page.
    pub fn page_url(&self, page: u32) -> String {
        self.site_url.replace("{page}", &page.to_string())
    }

    /// Historical snapshot key for a run date formatted as `YYYYMMDD`.
    pub fn historical_key_for(&self, date: &str) -> String {
        self.historical_key.replace("{date}", date)
    }

    /// Number of scraped columns; the id slot is not a column.
    pub fn column_count(&self) -> usize {
        self.fields.len().saturating_sub(1)
    }

    /// Validate a source definition.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("source name is empty"));
        }
        if !self.site_url.contains("{page}") {
            return Err(AppError::validation(format!(
                "source '{}': site_url has no {{page}} placeholder",
                self.name
            )));
        }
        url::Url::parse(&self.page_url(1))?;
        if self.fields.len() < 2 {
            return Err(AppError::validation(format!(
                "source '{}': at least one column field and the id field are required",
                self.name
            )));
        }
        if !self.historical_key.contains("{date}") {
            return Err(AppError::validation(format!(
                "source '{}': historical_key has no {{date}} placeholder",
                self.name
            )));
        }
        if self.archive_key == self.historical_key {
            return Err(AppError::validation(format!(
                "source '{}': archive_key and historical_key must differ",
                self.name
            )));
        }
        Ok(())
    }
}

pub(crate) mod defaults {
    use super::{Category, SourceConfig};

    pub fn table_selector() -> String {
        "table.zebra".into()
    }
    pub fn row_selector() -> String {
        "tbody tr".into()
    }
    pub fn cell_selector() -> String {
        "td".into()
    }
    pub fn pagination_selector() -> String {
        "div#tnt_pagination".into()
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    pub fn default_sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig {
                name: "doctors".into(),
                category: Category::Doctors,
                site_url: "http://medicalboard.co.ke/online-services/retention/?currpage={page}"
                    .into(),
                fields: fields(&[
                    "name",
                    "reg_date",
                    "reg_no",
                    "postal_address",
                    "qualifications",
                    "speciality",
                    "sub_speciality",
                    "id",
                ]),
                doctor_type: Some("local_doctor".into()),
                archive_key: "data/doctors.json".into(),
                historical_key: "data/archive/doctors-{date}.json".into(),
                table_selector: table_selector(),
                row_selector: row_selector(),
                cell_selector: cell_selector(),
                pagination_selector: pagination_selector(),
            },
            SourceConfig {
                name: "foreign-doctors".into(),
                category: Category::Doctors,
                site_url: "http://medicalboard.co.ke/online-services/foreign-doctors-license-register/?currpage={page}"
                    .into(),
                fields: fields(&[
                    "name",
                    "reg_no",
                    "postal_address",
                    "qualifications",
                    "facility",
                    "practice_type",
                    "id",
                ]),
                doctor_type: Some("foreign_doctor".into()),
                archive_key: "data/foreign_doctors.json".into(),
                historical_key: "data/archive/foreign_doctors-{date}.json".into(),
                table_selector: table_selector(),
                row_selector: row_selector(),
                cell_selector: cell_selector(),
                pagination_selector: pagination_selector(),
            },
            SourceConfig {
                name: "clinical-officers".into(),
                category: Category::ClinicalOfficers,
                site_url: "http://clinicalofficerscouncil.org/online-services/retention/?currpage={page}"
                    .into(),
                fields: fields(&[
                    "name",
                    "reg_date",
                    "reg_no",
                    "address",
                    "qualifications",
                    "id",
                ]),
                doctor_type: None,
                archive_key: "data/clinical_officers.json".into(),
                historical_key: "data/archive/clinical_officers-{date}.json".into(),
                table_selector: table_selector(),
                row_selector: row_selector(),
                cell_selector: cell_selector(),
                pagination_selector: pagination_selector(),
            },
        ]
    }
}
