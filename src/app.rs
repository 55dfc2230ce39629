use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use captcha_decoder_lib::{
    DecodeEngine, DecodeOptions, Decoded, DecoderConfig, InferenceProvider, OnnxProvider,
    ScoreTensor,
};
use serde::Serialize;

use crate::cli::{Cli, Command, OutputArgs};
use crate::error::CliError;
use crate::label::label_from_path;
use crate::tensor_io::read_tensor;

const CONFIG_DIR: &str = "captcha-ocr";
const CONFIG_FILE: &str = "models.json";

#[derive(Serialize)]
struct Report<'a> {
    input: &'a Path,
    #[serde(flatten)]
    decoded: &'a Decoded,
}

/// Runs one command. Returns `false` when any input failed to decode.
pub fn run(cli: Cli) -> Result<bool, CliError> {
    let engine = DecodeEngine::new(load_config(cli.config.as_deref())?)?;

    match cli.command {
        Command::Decode {
            tensors,
            hint,
            output,
        } => Ok(decode_each(&tensors, &output, |path, reference| {
            let tensor = ScoreTensor::new(read_tensor(path)?);
            Ok(engine.decode_detailed(&tensor, hint.as_deref(), reference)?)
        })),
        Command::Run {
            model,
            inputs,
            hint,
            output,
        } => {
            let mut provider = OnnxProvider::new(&model)?;
            let hint = hint.unwrap_or_else(|| provider.model_name().to_string());
            Ok(decode_each(&inputs, &output, |path, reference| {
                let input = read_tensor(path)?;
                let tensor = provider.run(input.view())?;
                Ok(engine.decode_detailed(&tensor, Some(&hint), reference)?)
            }))
        }
    }
}

/// Per-run tally of decoded inputs and reference matches.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchSummary {
    total: usize,
    decoded: usize,
    referenced: usize,
    matched: usize,
}

impl BatchSummary {
    fn record(&mut self, text: Option<&str>, reference: Option<&str>) {
        self.total += 1;
        let Some(text) = text else {
            return;
        };
        self.decoded += 1;
        if let Some(reference) = reference {
            self.referenced += 1;
            if text == reference {
                self.matched += 1;
            }
        }
    }

    fn all_decoded(&self) -> bool {
        self.decoded == self.total
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Decoded {}/{} inputs ({} failed)",
            self.decoded,
            self.total,
            self.total - self.decoded
        )?;
        if self.referenced > 0 {
            write!(f, ", {}/{} matched their reference", self.matched, self.referenced)?;
        }
        Ok(())
    }
}

fn decode_each<F>(paths: &[PathBuf], output: &OutputArgs, mut decode: F) -> bool
where
    F: FnMut(&Path, Option<&str>) -> Result<Decoded, CliError>,
{
    let mut summary = BatchSummary::default();
    for path in paths {
        let start = Instant::now();
        let reference = reference_for(path, output);
        let result = decode(path, reference.as_deref()).and_then(|decoded| {
            print_result(path, &decoded, output.json)?;
            Ok(decoded.text)
        });
        match result {
            Ok(text) => {
                log::info!("{} decoded in {:?}", path.display(), start.elapsed());
                summary.record(Some(&text), reference.as_deref());
            }
            Err(err) => {
                log::error!("{}: {err}", path.display());
                eprintln!("{}: {}", path.display(), err.user_message());
                summary.record(None, reference.as_deref());
            }
        }
    }
    log::info!("{summary}");
    summary.all_decoded()
}

fn reference_for(path: &Path, output: &OutputArgs) -> Option<String> {
    if let Some(reference) = &output.reference {
        return Some(reference.clone());
    }
    if !output.label_from_filename {
        return None;
    }
    let label = label_from_path(path);
    if label.is_none() {
        log::warn!("No label in file name {}, decoding without reference", path.display());
    }
    label
}

fn print_result(path: &Path, decoded: &Decoded, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string(&Report { input: path, decoded })?);
    } else {
        println!("{}\t{}", path.display(), decoded.text);
    }
    Ok(())
}

/// `--config` (or `$CAPTCHA_OCR_CONFIG`), else the per-user table if it
/// exists, else the built-ins. Engine options always come from the environment.
pub fn load_config(explicit: Option<&Path>) -> Result<DecoderConfig, CliError> {
    let path = explicit.map(Path::to_path_buf).or_else(|| {
        let candidate = default_config_path()?;
        candidate.is_file().then_some(candidate)
    });

    let mut config = match path {
        Some(path) => DecoderConfig::load(path)?,
        None => {
            log::debug!("No model table found, using built-in declarations");
            DecoderConfig::builtin()
        }
    };
    config.options = DecodeOptions::from_env();
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|base| base.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_failures_and_matches() {
        let mut summary = BatchSummary::default();
        summary.record(Some("4213"), Some("4213"));
        summary.record(Some("4214"), Some("4213"));
        summary.record(None, Some("0000"));
        summary.record(Some("AB12"), None);
        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                decoded: 3,
                referenced: 2,
                matched: 1,
            }
        );
        assert!(!summary.all_decoded());
        assert_eq!(
            summary.to_string(),
            "Decoded 3/4 inputs (1 failed), 1/2 matched their reference"
        );
    }

    #[test]
    fn summary_without_references() {
        let mut summary = BatchSummary::default();
        summary.record(Some("x"), None);
        assert!(summary.all_decoded());
        assert_eq!(summary.to_string(), "Decoded 1/1 inputs (0 failed)");
    }
}
