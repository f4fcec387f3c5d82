use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use recipe_eval::model::{Cookable, ErrorTag, ErrorTags, Preference};

#[derive(Parser, Debug)]
#[command(
    name = "recipe-eval",
    version,
    about = "Blinded A/B evaluation of generated recipes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Assign(AssignArgs),
    Status(StatusArgs),
    Show(ShowArgs),
    Submit(SubmitArgs),
    Export(ExportArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StoreKind {
    Local,
    Shared,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Shared => "shared",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StudyArgs {
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = StoreKind::Local)]
    pub store: StoreKind,

    #[arg(long)]
    pub annotator: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AssignArgs {
    #[command(flatten)]
    pub study: StudyArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    #[arg(long, default_value_t = false)]
    pub list: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    #[arg(long, conflicts_with = "next_pending")]
    pub index: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub next_pending: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PreferenceArg {
    A,
    B,
    Tie,
}

impl From<PreferenceArg> for Preference {
    fn from(value: PreferenceArg) -> Self {
        match value {
            PreferenceArg::A => Preference::A,
            PreferenceArg::B => Preference::B,
            PreferenceArg::Tie => Preference::Tie,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CookableArg {
    Yes,
    Maybe,
    No,
}

impl From<CookableArg> for Cookable {
    fn from(value: CookableArg) -> Self {
        match value {
            CookableArg::Yes => Cookable::Yes,
            CookableArg::Maybe => Cookable::Maybe,
            CookableArg::No => Cookable::No,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ErrorTagArg {
    MissingCoreIngredient,
    Hallucination,
    BadQuantities,
    BadTimes,
    BadTemperatures,
    StepMismatch,
    SafetyIssue,
    FormatError,
}

impl From<ErrorTagArg> for ErrorTag {
    fn from(value: ErrorTagArg) -> Self {
        match value {
            ErrorTagArg::MissingCoreIngredient => ErrorTag::MissingCoreIngredient,
            ErrorTagArg::Hallucination => ErrorTag::Hallucination,
            ErrorTagArg::BadQuantities => ErrorTag::BadQuantities,
            ErrorTagArg::BadTimes => ErrorTag::BadTimes,
            ErrorTagArg::BadTemperatures => ErrorTag::BadTemperatures,
            ErrorTagArg::StepMismatch => ErrorTag::StepMismatch,
            ErrorTagArg::SafetyIssue => ErrorTag::SafetyIssue,
            ErrorTagArg::FormatError => ErrorTag::FormatError,
        }
    }
}

pub fn error_tags(values: &[ErrorTagArg]) -> ErrorTags {
    values.iter().copied().map(ErrorTag::from).collect()
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    #[arg(long)]
    pub sample_id: u64,

    #[arg(long, value_enum)]
    pub pref_ingredients: Option<PreferenceArg>,

    #[arg(long, value_enum)]
    pub pref_numbers: Option<PreferenceArg>,

    #[arg(long, value_enum)]
    pub pref_procedure: Option<PreferenceArg>,

    #[arg(long, value_enum)]
    pub pref_overall: Option<PreferenceArg>,

    #[arg(long, value_enum, default_value_t = CookableArg::Yes)]
    pub a_cookable: CookableArg,

    #[arg(long, default_value_t = 3)]
    pub a_trust: u8,

    #[arg(long = "a-error", value_enum)]
    pub a_errors: Vec<ErrorTagArg>,

    #[arg(long, value_enum, default_value_t = CookableArg::Yes)]
    pub b_cookable: CookableArg,

    #[arg(long, default_value_t = 3)]
    pub b_trust: u8,

    #[arg(long = "b-error", value_enum)]
    pub b_errors: Vec<ErrorTagArg>,

    #[arg(long, default_value = "")]
    pub notes: String,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub study: StudyArgs,
}
