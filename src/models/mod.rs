use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Sentinels ─────────────────────────────────────────────────────────────────

// The board renders experience/remote/compensation badges only when the
// poster filled them in. Missing badges get fixed sentinel strings, never
// empty values.
pub const EXPERIENCE_SENTINEL: &str = "not specified";
pub const REMOTE_WORK_SENTINEL: &str = "not indicated";
pub const GRADE_SENTINEL: &str = "not specified";

// ── Vacancy ───────────────────────────────────────────────────────────────────

/// One harvested job posting. `title`, `company`, `city` and `link` are
/// present on every well-formed card; the rest fall back to sentinels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vacancy {
    pub title: String,
    pub company: String,
    pub experience: String,
    pub remote_work: String,
    pub grade: String,
    pub city: String,
    pub link: String,
    pub scraped_at: NaiveDateTime,
}

// ── Filter preset ─────────────────────────────────────────────────────────────

/// A saved free-text search filter. Managed through the repository only;
/// the scrape pipeline never reads these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterPreset {
    pub id: i64,
    pub name: String,
    pub text: String,
    pub created_at: NaiveDateTime,
}
