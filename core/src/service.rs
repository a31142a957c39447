use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use crate::advice::{advice_prompt, split_advice_sections};
use crate::csv_import::parse_csv;
use crate::db::{AdviceCache, Database, StoredDataset};
use crate::llm::{ChatRequest, ChatSession, CompletionProvider};
use crate::merge::{MergeOptions, merge_by_date};
use crate::models::{AdviceSection, Dataset, DatasetKind, MergedRecord};
use crate::summary::{DEFAULT_CALORIE_GOAL, HealthReport};

/// Advice returned to callers, with where it came from.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Advice {
    pub text: String,
    pub cached: bool,
    pub sections: Vec<AdviceSection>,
}

pub struct HealthService {
    db: Database,
    merge_options: MergeOptions,
    calorie_goal: f64,
}

impl HealthService {
    pub fn new(db_path: &Path) -> Result<Self> {
        Ok(Self::with_database(Database::open(db_path)?))
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::with_database(Database::open_in_memory()?))
    }

    #[must_use]
    pub fn with_database(db: Database) -> Self {
        Self {
            db,
            merge_options: MergeOptions::default(),
            calorie_goal: DEFAULT_CALORIE_GOAL,
        }
    }

    #[must_use]
    pub fn with_merge_options(mut self, options: MergeOptions) -> Self {
        self.merge_options = options;
        self
    }

    #[must_use]
    pub fn with_calorie_goal(mut self, goal: f64) -> Self {
        self.calorie_goal = goal;
        self
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    // --- Datasets ---

    /// Parse a CSV export and store it as the `kind` dataset.
    ///
    /// The previous dataset is only replaced once the whole file parsed.
    pub fn import_csv<R: Read>(&self, kind: DatasetKind, reader: R, file_name: Option<&str>) -> Result<usize> {
        let rows = parse_csv(reader)
            .with_context(|| format!("Failed to import {kind} data"))?;
        self.db.save_dataset(kind, &rows, file_name)?;
        tracing::info!(%kind, rows = rows.len(), file = file_name.unwrap_or("-"), "dataset imported");
        Ok(rows.len())
    }

    pub fn import_file(&self, kind: DatasetKind, path: &Path) -> Result<usize> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let name = path.file_name().and_then(|n| n.to_str());
        self.import_csv(kind, file, name)
    }

    pub fn dataset(&self, kind: DatasetKind) -> Result<Dataset> {
        self.db.load_dataset(kind)
    }

    pub fn datasets(&self) -> Result<(Dataset, Dataset, Dataset)> {
        Ok((
            self.db.load_dataset(DatasetKind::Nutrition)?,
            self.db.load_dataset(DatasetKind::Measurement)?,
            self.db.load_dataset(DatasetKind::Exercise)?,
        ))
    }

    pub fn list_datasets(&self) -> Result<Vec<StoredDataset>> {
        self.db.list_datasets()
    }

    /// Drop one dataset, or everything (all datasets and cached advice).
    pub fn reset(&self, kind: Option<DatasetKind>) -> Result<()> {
        if let Some(kind) = kind {
            self.db.delete_dataset(kind)?;
        } else {
            for kind in DatasetKind::ALL {
                self.db.delete_dataset(kind)?;
            }
            AdviceCache::new(&self.db).clear()?;
        }
        tracing::info!(kind = kind.map_or("all", DatasetKind::as_str), "datasets reset");
        Ok(())
    }

    // --- Derived views ---

    pub fn merged(&self) -> Result<Vec<MergedRecord>> {
        let (nutrition, measurement, exercise) = self.datasets()?;
        Ok(merge_by_date(&nutrition, &measurement, &exercise, &self.merge_options))
    }

    pub fn report(&self) -> Result<HealthReport> {
        let (nutrition, measurement, exercise) = self.datasets()?;
        Ok(HealthReport::build(&nutrition, &measurement, &exercise, self.calorie_goal))
    }

    // --- Advice ---

    /// Cached advice unless `regenerate` is set or nothing is cached.
    ///
    /// A failed request leaves any previously cached advice in place and
    /// returns the error.
    pub fn advice(&self, provider: &dyn CompletionProvider, model: &str, regenerate: bool) -> Result<Advice> {
        let cache = AdviceCache::new(&self.db);
        if !regenerate {
            if let Some(text) = cache.get()? {
                return Ok(Advice {
                    sections: split_advice_sections(&text),
                    text,
                    cached: true,
                });
            }
        }

        let (nutrition, measurement, exercise) = self.datasets()?;
        let prompt = advice_prompt(&nutrition, &measurement, &exercise)?;
        tracing::debug!(chars = prompt.len(), "requesting advice");

        let reply = provider
            .complete(&ChatRequest::advice(model, prompt))
            .context("Failed to fetch advice")?;
        let text = reply.content;
        cache.set(&text)?;

        let sections = split_advice_sections(&text);
        if sections.is_empty() {
            tracing::warn!("advice has none of the expected section headings");
        }
        Ok(Advice {
            sections,
            text,
            cached: false,
        })
    }

    pub fn clear_advice(&self) -> Result<bool> {
        AdviceCache::new(&self.db).clear()
    }

    // --- Chat ---

    pub fn chat(
        &self,
        session: &mut ChatSession,
        provider: &dyn CompletionProvider,
        model: &str,
        question: &str,
    ) -> Result<String> {
        let rows = self.db.load_dataset(session.kind())?;
        session.ask(provider, model, &rows, question)
    }
}
