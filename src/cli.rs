use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Decode captcha classifier outputs into text.
#[derive(Parser, Debug)]
#[command(name = "captcha-ocr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Model table JSON extending the built-in declarations
    #[arg(long, global = true, env = "CAPTCHA_OCR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log decoding diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode score tensors saved as JSON
    Decode {
        /// Files holding {"shape": [...], "data": [...]}
        #[arg(required = true)]
        tensors: Vec<PathBuf>,

        /// Model identifier used to look up the output layout
        #[arg(long)]
        hint: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run an ONNX classifier on preprocessed inputs, then decode
    Run {
        #[arg(short, long)]
        model: PathBuf,

        /// Preprocessed input tensors as JSON
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Defaults to the model file name
        #[arg(long)]
        hint: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputArgs {
    /// Known answer used to rank candidate decodings
    #[arg(long, conflicts_with = "label_from_filename")]
    pub reference: Option<String>,

    /// Take each input's file name as its known answer
    #[arg(long)]
    pub label_from_filename: bool,

    /// Print the full decode report as JSON
    #[arg(long)]
    pub json: bool,
}
