use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use recipe_eval::blinding::{BlindingOutcome, SeededDraws, load_or_generate};
use recipe_eval::config::{Annotator, StudyConfig};
use recipe_eval::dataset::load_samples;
use recipe_eval::model::{BlindedPair, Sample};
use recipe_eval::prepare::{parse_error_count, prepare};
use recipe_eval::store::{CsvFileStore, SharedSheetStore, SqliteSheet, TableStore};
use recipe_eval::submission::RecordLayout;
use tracing::{info, warn};

use crate::cli::{StoreKind, StudyArgs};

pub struct StudyContext {
    pub config: StudyConfig,
    pub workdir: PathBuf,
    pub store_kind: StoreKind,
    pub annotator: Option<Annotator>,
}

impl StudyContext {
    pub fn open(args: &StudyArgs) -> Result<Self> {
        let config = StudyConfig::load(args.config.as_deref())?;

        let annotator = match (args.store, args.annotator.as_deref()) {
            (StoreKind::Shared, None) => bail!("--annotator is required with --store shared"),
            (StoreKind::Shared, Some(name)) => {
                let roster = config.roster();
                if roster.names().is_empty() {
                    bail!("no annotators configured; add an `annotators` list to the study config");
                }
                Some(roster.resolve(name)?)
            }
            (StoreKind::Local, Some(name)) => {
                warn!(annotator = name, "annotator is ignored by the local store");
                None
            }
            (StoreKind::Local, None) => None,
        };

        info!(
            workdir = %args.workdir.display(),
            store = args.store.as_str(),
            annotator = annotator.as_ref().map(Annotator::as_str).unwrap_or("-"),
            "opened study"
        );

        Ok(Self {
            config,
            workdir: args.workdir.clone(),
            store_kind: args.store,
            annotator,
        })
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.workdir.join(&self.config.dataset_file)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.workdir.join(&self.config.mapping_file)
    }

    pub fn layout(&self) -> RecordLayout {
        match self.store_kind {
            StoreKind::Local => RecordLayout::SingleUser,
            StoreKind::Shared => RecordLayout::MultiUser,
        }
    }

    pub fn annotator_filter(&self) -> Option<&str> {
        self.annotator.as_ref().map(Annotator::as_str)
    }

    pub fn evaluation_store(&self) -> Result<Box<dyn TableStore>> {
        match self.store_kind {
            StoreKind::Local => Ok(Box::new(CsvFileStore::new(
                self.workdir.join(&self.config.results_file),
            ))),
            StoreKind::Shared => {
                let path = self.workdir.join(&self.config.shared_sheet_db);
                let sheet = SqliteSheet::open(&path, &self.config.shared_worksheet)
                    .with_context(|| format!("failed to open shared sheet {}", path.display()))?;
                Ok(Box::new(SharedSheetStore::new(
                    sheet,
                    self.config.max_write_attempts,
                )))
            }
        }
    }

    pub fn load_samples(&self) -> Result<Vec<Sample>> {
        let path = self.dataset_path();
        load_samples(&path, &self.config.model_columns())
            .with_context(|| format!("failed to load dataset {}", path.display()))
    }

    pub fn load_blinding(&self, sample_count: usize) -> Result<BlindingOutcome> {
        let path = self.mapping_path();
        let store = CsvFileStore::new(&path);
        load_or_generate(&store, sample_count, &mut SeededDraws::new(self.config.seed))
            .with_context(|| {
                format!(
                    "refusing to continue with blinding mapping {}; fix or restore it before annotating",
                    path.display()
                )
            })
    }

    pub fn load_pairs(&self) -> Result<Vec<BlindedPair>> {
        let samples = self.load_samples()?;
        let outcome = self.load_blinding(samples.len())?;
        let pairs = prepare(&samples, &outcome.map).context("failed to blind samples")?;

        let degraded = parse_error_count(&pairs);
        if degraded > 0 {
            warn!(fields = degraded, "some recipe outputs could not be parsed");
        }

        Ok(pairs)
    }
}
