use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for CLI commands
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ToleranceArg {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Parser)]
#[command(name = "retrace")]
#[command(version, about = "Retrace - turn recorded browser sessions into automation workflows")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a recording and print the extracted action sequence
    Inspect {
        /// Recording file (.json hybrid event array or .bin proto session)
        file: PathBuf,

        /// Extraction tolerance
        #[arg(long, value_enum, default_value = "medium")]
        tolerance: ToleranceArg,

        /// Also identify workflow parameters
        #[arg(long)]
        params: bool,
    },

    /// Generate template driver code for every extracted action
    Codegen {
        /// Recording file (.json hybrid event array or .bin proto session)
        file: PathBuf,

        /// Extraction tolerance
        #[arg(long, value_enum, default_value = "medium")]
        tolerance: ToleranceArg,
    },
}
