use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MIN_DURATION_MINUTES: i64 = 15;
pub const MAX_DURATION_MINUTES: i64 = 480;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceCategory {
    FacialTreatments,
    BodyTreatments,
    AntiAging,
    AcneTreatments,
    SkinAnalysis,
    ChemicalPeels,
    Microdermabrasion,
    LaserTreatments,
    Consultation,
    Packages,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 10] = [
        ServiceCategory::FacialTreatments,
        ServiceCategory::BodyTreatments,
        ServiceCategory::AntiAging,
        ServiceCategory::AcneTreatments,
        ServiceCategory::SkinAnalysis,
        ServiceCategory::ChemicalPeels,
        ServiceCategory::Microdermabrasion,
        ServiceCategory::LaserTreatments,
        ServiceCategory::Consultation,
        ServiceCategory::Packages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::FacialTreatments => "facial-treatments",
            ServiceCategory::BodyTreatments => "body-treatments",
            ServiceCategory::AntiAging => "anti-aging",
            ServiceCategory::AcneTreatments => "acne-treatments",
            ServiceCategory::SkinAnalysis => "skin-analysis",
            ServiceCategory::ChemicalPeels => "chemical-peels",
            ServiceCategory::Microdermabrasion => "microdermabrasion",
            ServiceCategory::LaserTreatments => "laser-treatments",
            ServiceCategory::Consultation => "consultation",
            ServiceCategory::Packages => "packages",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceCategory::FacialTreatments => "Facial Treatments",
            ServiceCategory::BodyTreatments => "Body Treatments",
            ServiceCategory::AntiAging => "Anti-Aging",
            ServiceCategory::AcneTreatments => "Acne Treatments",
            ServiceCategory::SkinAnalysis => "Skin Analysis",
            ServiceCategory::ChemicalPeels => "Chemical Peels",
            ServiceCategory::Microdermabrasion => "Microdermabrasion",
            ServiceCategory::LaserTreatments => "Laser Treatments",
            ServiceCategory::Consultation => "Consultation",
            ServiceCategory::Packages => "Packages",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub category: ServiceCategory,
    pub duration_minutes: i64,
    pub price: Decimal,
    pub preparation_minutes: i64,
    pub cleanup_minutes: i64,
    /// Minimum hours between booking and appointment start.
    pub booking_advance_notice_hours: i64,
    pub is_active: bool,
    pub is_popular: bool,
    pub is_featured: bool,
    pub display_order: i64,
    pub rating: RatingSummary,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Service {
    /// Span that must stay free on the calendar: treatment plus prep and cleanup.
    pub fn total_duration(&self) -> i64 {
        self.duration_minutes + self.preparation_minutes + self.cleanup_minutes
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

/// Admin payload for creating or replacing a catalog entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    pub category: ServiceCategory,
    pub duration_minutes: i64,
    pub price: Decimal,
    #[serde(default = "default_buffer_minutes")]
    pub preparation_minutes: i64,
    #[serde(default = "default_buffer_minutes")]
    pub cleanup_minutes: i64,
    #[serde(default = "default_advance_notice")]
    pub booking_advance_notice_hours: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub display_order: i64,
}

fn default_buffer_minutes() -> i64 {
    15
}

fn default_advance_notice() -> i64 {
    24
}

fn default_true() -> bool {
    true
}

impl ServiceInput {
    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Service name is required".to_string());
        }
        if name.chars().count() > 100 {
            return Err("Service name cannot exceed 100 characters".to_string());
        }
        if self.description.chars().count() > 1000 {
            return Err("Description cannot exceed 1000 characters".to_string());
        }
        if self.short_description.chars().count() > 200 {
            return Err("Short description cannot exceed 200 characters".to_string());
        }
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(format!(
                "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
            ));
        }
        if self.price.is_sign_negative() {
            return Err("Price cannot be negative".to_string());
        }
        if self.preparation_minutes < 0 || self.cleanup_minutes < 0 {
            return Err("Preparation and cleanup time cannot be negative".to_string());
        }
        if self.booking_advance_notice_hours < 0 {
            return Err("Advance notice cannot be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub service_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}
