use crate::error::StoreError;
use crate::models::{FilterPreset, Vacancy};
use chrono::{NaiveDateTime, Utc};
use duckdb::{Connection, params};
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS vacancies_id_seq;
CREATE TABLE IF NOT EXISTS vacancies (
    id          INTEGER PRIMARY KEY DEFAULT nextval('vacancies_id_seq'),
    title       VARCHAR NOT NULL CHECK (length(title) > 0),
    company     VARCHAR NOT NULL CHECK (length(company) > 0),
    experience  VARCHAR NOT NULL,
    remote_work VARCHAR NOT NULL,
    grade       VARCHAR NOT NULL,
    city        VARCHAR NOT NULL,
    link        VARCHAR NOT NULL,
    scraped_at  TIMESTAMP NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS filter_presets_id_seq;
CREATE TABLE IF NOT EXISTS filter_presets (
    id          INTEGER PRIMARY KEY DEFAULT nextval('filter_presets_id_seq'),
    name        VARCHAR NOT NULL,
    filter_text VARCHAR NOT NULL,
    created_at  TIMESTAMP NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS scrape_runs_id_seq;
CREATE TABLE IF NOT EXISTS scrape_runs (
    id                INTEGER PRIMARY KEY DEFAULT nextval('scrape_runs_id_seq'),
    started_at        TIMESTAMP NOT NULL,
    finished_at       TIMESTAMP,
    status            VARCHAR NOT NULL DEFAULT 'running',
    pages_total       INTEGER DEFAULT 0,
    pages_failed      INTEGER DEFAULT 0,
    cards_skipped     INTEGER DEFAULT 0,
    records_persisted INTEGER DEFAULT 0,
    error_msg         VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_vacancies_city    ON vacancies (city);
CREATE INDEX IF NOT EXISTS idx_vacancies_company ON vacancies (company);
"#;

// ── Repository ────────────────────────────────────────────────────────────────

/// Summary of the most recent scrape run, for the `stats` command.
#[derive(Debug)]
pub struct LastRun {
    pub started_at: NaiveDateTime,
    pub status: String,
    pub records_persisted: i64,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL)?;
        self.conn.execute_batch(INDEXES)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Vacancies ─────────────────────────────────────────────────────────────

    /// Swap the whole snapshot in one transaction: clear, bulk insert,
    /// commit. Any failure rolls back and leaves the previous snapshot.
    pub fn replace_all_vacancies(&self, vacancies: &[Vacancy]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM vacancies", [])?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO vacancies
                       (title, company, experience, remote_work, grade, city, link, scraped_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for v in vacancies {
                stmt.execute(params![
                    v.title,
                    v.company,
                    v.experience,
                    v.remote_work,
                    v.grade,
                    v.city,
                    v.link,
                    v.scraped_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(vacancies.len())
    }

    pub fn list_vacancies(&self) -> Result<Vec<Vacancy>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"SELECT title, company, experience, remote_work, grade, city, link, scraped_at
               FROM vacancies ORDER BY id"#,
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(Vacancy {
                title: r.get(0)?,
                company: r.get(1)?,
                experience: r.get(2)?,
                remote_work: r.get(3)?,
                grade: r.get(4)?,
                city: r.get(5)?,
                link: r.get(6)?,
                scraped_at: r.get(7)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn vacancy_count(&self) -> Result<i64, StoreError> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM vacancies")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    // ── Filter presets ────────────────────────────────────────────────────────

    pub fn create_preset(&self, name: &str, text: &str) -> Result<i64, StoreError> {
        let id = self.conn.query_row(
            "INSERT INTO filter_presets (name, filter_text, created_at) VALUES (?, ?, ?) RETURNING id",
            params![name, text, Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    /// Returns whether a preset with that id existed.
    pub fn delete_preset(&self, id: i64) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM filter_presets WHERE id = ?", params![id])?;
        Ok(n > 0)
    }

    pub fn list_presets(&self) -> Result<Vec<FilterPreset>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, filter_text, created_at FROM filter_presets ORDER BY id",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(FilterPreset {
                id: r.get(0)?,
                name: r.get(1)?,
                text: r.get(2)?,
                created_at: r.get(3)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ── Scrape run log ────────────────────────────────────────────────────────

    pub fn begin_scrape_run(&self) -> Result<i64, StoreError> {
        let id = self.conn.query_row(
            "INSERT INTO scrape_runs (started_at, status) VALUES (?, 'running') RETURNING id",
            params![Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn finish_scrape_run(
        &self,
        run_id: i64,
        pages_total: usize,
        pages_failed: usize,
        cards_skipped: usize,
        records_persisted: usize,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            r#"UPDATE scrape_runs SET
               finished_at = ?, status = ?,
               pages_total = ?, pages_failed = ?, cards_skipped = ?,
               records_persisted = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                pages_total as i64,
                pages_failed as i64,
                cards_skipped as i64,
                records_persisted as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn last_run(&self) -> Option<LastRun> {
        let mut stmt = self
            .conn
            .prepare(
                r#"SELECT started_at, status, records_persisted
                   FROM scrape_runs ORDER BY id DESC LIMIT 1"#,
            )
            .ok()?;
        stmt.query_row([], |r| {
            Ok(LastRun {
                started_at: r.get(0)?,
                status: r.get(1)?,
                records_persisted: r.get(2)?,
            })
        })
        .ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn repo() -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        repo
    }

    fn vacancy(title: &str, city: &str) -> Vacancy {
        Vacancy {
            title: title.to_string(),
            company: "Initech".to_string(),
            experience: "1-3 years".to_string(),
            remote_work: "not indicated".to_string(),
            grade: "not specified".to_string(),
            city: city.to_string(),
            link: format!("https://hh.ru/vacancy/{title}"),
            scraped_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let repo = repo();
        repo.run_migrations().unwrap();
        assert_eq!(repo.vacancy_count().unwrap(), 0);
    }

    #[test]
    fn replace_all_swaps_the_snapshot() {
        let repo = repo();

        repo.replace_all_vacancies(&[vacancy("a", "Berlin"), vacancy("b", "Riga")])
            .unwrap();
        assert_eq!(repo.vacancy_count().unwrap(), 2);

        repo.replace_all_vacancies(&[vacancy("c", "Tallinn")]).unwrap();
        let stored = repo.list_vacancies().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "c");
    }

    #[test]
    fn replace_all_is_idempotent() {
        let repo = repo();
        let batch = vec![vacancy("a", "Berlin"), vacancy("b", "Riga")];

        repo.replace_all_vacancies(&batch).unwrap();
        let first = repo.list_vacancies().unwrap();
        repo.replace_all_vacancies(&batch).unwrap();
        let second = repo.list_vacancies().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn failed_replace_keeps_the_previous_snapshot() {
        let repo = repo();
        repo.replace_all_vacancies(&[vacancy("a", "Berlin"), vacancy("b", "Riga")])
            .unwrap();

        // empty title violates the table constraint mid-batch
        let poisoned = vec![vacancy("c", "Tallinn"), vacancy("", "Vilnius")];
        assert!(repo.replace_all_vacancies(&poisoned).is_err());

        let stored = repo.list_vacancies().unwrap();
        let titles: Vec<&str> = stored.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[test]
    fn preset_round_trip() {
        let repo = repo();

        let id = repo.create_preset("rustaceans", "rust developer").unwrap();
        let presets = repo.list_presets().unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].name, "rustaceans");
        assert_eq!(presets[0].text, "rust developer");

        assert!(repo.delete_preset(id).unwrap());
        assert!(!repo.delete_preset(id).unwrap());
        assert!(repo.list_presets().unwrap().is_empty());
    }

    #[test]
    fn scrape_runs_are_logged() {
        let repo = repo();

        let run_id = repo.begin_scrape_run().unwrap();
        repo.finish_scrape_run(run_id, 4, 1, 2, 38, None).unwrap();

        let last = repo.last_run().unwrap();
        assert_eq!(last.status, "success");
        assert_eq!(last.records_persisted, 38);
    }
}
