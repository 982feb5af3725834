use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use humanize_core::error::CoreError;
use humanize_core::request::{IntegrityMode, JobParameters, Tone};

#[derive(Parser, Debug)]
#[command(name = "humanize")]
#[command(about = "Submit text to a humanization backend and collect the results")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Humanize one text, given inline or as a file.
    Run {
        /// Text to transform.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// .txt, .pdf or .docx file to extract the text from.
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,

        /// Write the result to `<DIR>/humanized_text.txt`.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Save the result to the recent results list.
        #[arg(long)]
        save: bool,

        /// Print before/after text metrics.
        #[arg(long)]
        metrics: bool,
    },

    /// Humanize several files, one job each.
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,

        /// Write one `humanized_<name>` file per completed item.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// List the account's style profiles.
    Profiles {},

    /// Show recently saved results.
    History {
        /// Print the full humanized text of each entry.
        #[arg(long)]
        full: bool,
    },
}

/// Transformation parameters shared by `run` and `batch`.
#[derive(ClapArgs, Debug, Default)]
pub struct ParamArgs {
    /// neutral, casual, formal, persuasive or academic.
    #[arg(long)]
    pub tone: Option<String>,
    #[arg(long)]
    pub formality: Option<f64>,
    #[arg(long)]
    pub burstiness: Option<f64>,
    #[arg(long)]
    pub perplexity_target: Option<u32>,
    #[arg(long)]
    pub idiom_density: Option<f64>,
    #[arg(long)]
    pub conciseness: Option<f64>,
    #[arg(long)]
    pub temperature: Option<f64>,
    #[arg(long)]
    pub seed: Option<i64>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    #[arg(long)]
    pub no_preserve_citations: bool,
    #[arg(long)]
    pub no_preserve_quotes: bool,
    #[arg(long)]
    pub no_keep_language: bool,
    /// Integrity-constrained mode; results carry a watermark id.
    #[arg(long)]
    pub academic: bool,
    /// Style profile id or name to derive parameters from.
    #[arg(long)]
    pub profile: Option<String>,
}

impl ParamArgs {
    /// Apply the flags given on top of the defaults. Range checks happen
    /// when the request is built.
    pub fn to_parameters(&self) -> Result<JobParameters, CoreError> {
        let defaults = JobParameters::default();
        let tone = match &self.tone {
            Some(tone) => Tone::parse(tone)?,
            None => defaults.tone,
        };
        Ok(JobParameters {
            tone,
            formality: self.formality.unwrap_or(defaults.formality),
            burstiness: self.burstiness.unwrap_or(defaults.burstiness),
            perplexity_target: self.perplexity_target.unwrap_or(defaults.perplexity_target),
            idiom_density: self.idiom_density.unwrap_or(defaults.idiom_density),
            conciseness: self.conciseness.unwrap_or(defaults.conciseness),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            seed: self.seed,
            max_tokens: self.max_tokens,
            preserve_citations: !self.no_preserve_citations,
            preserve_quotes: !self.no_preserve_quotes,
            keep_language: !self.no_keep_language,
            integrity_mode: if self.academic {
                IntegrityMode::Academic
            } else {
                IntegrityMode::Editor
            },
            style_profile_id: None,
        })
    }
}
