use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Role tag of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Job,
    Candidate,
}

impl OwnerType {
    /// The type a profile of this type is matched against.
    pub fn opposite(self) -> OwnerType {
        match self {
            OwnerType::Job => OwnerType::Candidate,
            OwnerType::Candidate => OwnerType::Job,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OwnerType::Job => "job",
            OwnerType::Candidate => "candidate",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" => Ok(OwnerType::Job),
            "candidate" => Ok(OwnerType::Candidate),
            other => Err(StoreError::InvalidOwnerType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryBand {
    pub min: u32,
    pub max: u32,
    pub currency: String,
}

/// Read-only view of a job or candidate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub owner_type: OwnerType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: Option<f32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub salary: Option<SalaryBand>,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Profile {
    pub fn new(id: impl Into<String>, owner_type: OwnerType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_type,
            title: title.into(),
            skills: Vec::new(),
            experience_years: None,
            location: None,
            remote: false,
            salary: None,
            summary: String::new(),
            active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_experience(mut self, years: f32) -> Self {
        self.experience_years = Some(years);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>, remote: bool) -> Self {
        self.location = Some(location.into());
        self.remote = remote;
        self
    }

    pub fn with_salary(mut self, min: u32, max: u32, currency: impl Into<String>) -> Self {
        self.salary = Some(SalaryBand {
            min,
            max,
            currency: currency.into(),
        });
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Skills trimmed and de-duplicated case-insensitively, first spelling kept.
    pub fn normalized_skills(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.to_lowercase()))
            .collect()
    }

    /// Text handed to the embedding provider.
    ///
    /// Fixed field order, empty fields skipped, one `Label: value` line per
    /// field. Unchanged profile data always yields the same text.
    pub fn embedding_text(&self) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(6);

        let title = self.title.trim();
        if !title.is_empty() {
            lines.push(format!("Title: {title}"));
        }

        let skills = self.normalized_skills();
        if !skills.is_empty() {
            lines.push(format!("Skills: {}", skills.join(", ")));
        }

        if let Some(years) = self.experience_years.filter(|y| y.is_finite() && *y >= 0.0) {
            lines.push(format!("Experience: {years} years"));
        }

        let location = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        match (location, self.remote) {
            (Some(loc), true) => lines.push(format!("Location: {loc} (remote)")),
            (Some(loc), false) => lines.push(format!("Location: {loc}")),
            (None, true) => lines.push("Location: remote".to_string()),
            (None, false) => {}
        }

        if let Some(band) = &self.salary {
            let currency = band.currency.trim();
            if currency.is_empty() {
                lines.push(format!("Salary: {}-{}", band.min, band.max));
            } else {
                lines.push(format!("Salary: {}-{} {currency}", band.min, band.max));
            }
        }

        let summary = self.summary.trim();
        if !summary.is_empty() {
            lines.push(format!("Summary: {summary}"));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Profile {
        Profile::new("job-1", OwnerType::Job, "Backend Engineer")
            .with_skills(["Rust", "tokio", "rust", " "])
            .with_experience(5.0)
            .with_location("Berlin", true)
            .with_salary(70_000, 90_000, "EUR")
            .with_summary("  Build matching services.  ")
    }

    #[test]
    fn embedding_text_has_stable_layout() {
        let text = job().embedding_text();
        assert_eq!(
            text,
            "Title: Backend Engineer\n\
             Skills: Rust, tokio\n\
             Experience: 5 years\n\
             Location: Berlin (remote)\n\
             Salary: 70000-90000 EUR\n\
             Summary: Build matching services."
        );
    }

    #[test]
    fn regeneration_from_unchanged_data_is_identical() {
        let p = job();
        assert_eq!(p.embedding_text(), p.clone().embedding_text());
    }

    #[test]
    fn blank_profile_yields_empty_text() {
        let p = Profile::new("c-1", OwnerType::Candidate, "   ").with_summary("\n\t");
        assert!(p.embedding_text().trim().is_empty());
    }

    #[test]
    fn remote_without_location() {
        let mut p = Profile::new("c-2", OwnerType::Candidate, "");
        p.remote = true;
        assert_eq!(p.embedding_text(), "Location: remote");
    }

    #[test]
    fn owner_type_parsing_and_opposite() {
        assert_eq!("Job".parse::<OwnerType>().unwrap(), OwnerType::Job);
        assert_eq!(OwnerType::Job.opposite(), OwnerType::Candidate);
        assert!(matches!(
            "recruiter".parse::<OwnerType>(),
            Err(StoreError::InvalidOwnerType(_))
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let p: Profile =
            serde_json::from_str(r#"{"id":"j","ownerType":"job","title":"Chef"}"#).unwrap();
        assert!(p.active);
        assert!(p.skills.is_empty());
        assert_eq!(p.embedding_text(), "Title: Chef");
    }
}
