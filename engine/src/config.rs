//! Declared model configuration: the hint → schema table, the named
//! vocabularies, and the engine's tunables.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::vocab::Vocabulary;

pub const TOKENIZER_VOCABULARY: &str = "tokenizer_62";

/// Upper bound for declared and searched sequence lengths.
pub const MAX_SEQUENCE_LENGTH: usize = 64;

const BUILTIN_VOCABULARIES: [(&str, &str); 5] = [
    (
        "63",
        "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$",
    ),
    ("37_uppercase", "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$"),
    ("37_lowercase", "abcdefghijklmnopqrstuvwxyz0123456789$"),
    ("11", "0123456789$"),
    (
        TOKENIZER_VOCABULARY,
        "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
    ),
];

/// Searched in this order when the shape alone has to identify the layout.
const BUILTIN_RESHAPE_ORDER: [&str; 4] = ["63", "37_uppercase", "37_lowercase", "11"];

const BUILTIN_ORDERINGS: [(&str, &str); 6] = [
    (
        "digits_first",
        "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ$",
    ),
    (
        "uppercase_first",
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789$",
    ),
    ("digits_first_lowercase", "0123456789abcdefghijklmnopqrstuvwxyz$"),
    ("digits_first_uppercase", "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ$"),
    ("uppercase_first", "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$"),
    ("lowercase_first", "abcdefghijklmnopqrstuvwxyz0123456789$"),
];

/// `(sequence_length, vocabulary)` for the flat-output model family.
const BUILTIN_FLAT_MODELS: [(u32, usize, &str); 8] = [
    (1, 6, "63"),
    (2, 6, "11"),
    (3, 5, "63"),
    (4, 6, "37_lowercase"),
    (5, 5, "37_uppercase"),
    (6, 4, "63"),
    (7, 6, "11"),
    (8, 5, "37_uppercase"),
];

static QUANTIZED_SUFFIX_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\.(?:int8|uint8|fp16|quant|quantized)\.onnx$"));

/// Reduces a model hint to the key used by [`ModelTable`]: file name only,
/// lower-cased, quantization infix folded away.
pub fn normalize_hint(hint: &str) -> String {
    let name = hint
        .trim()
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match &*QUANTIZED_SUFFIX_RE {
        Ok(re) => re.replace(&name, ".onnx").into_owned(),
        Err(_) => name,
    }
}

/// Declared output layout of a known model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum ModelSpec {
    TokenizerSequence {
        vocabulary: String,
    },
    TimeMajorCollapsing,
    FlatSegmented {
        sequence_length: usize,
        vocabulary: String,
    },
}

impl ModelSpec {
    pub fn vocabulary(&self) -> Option<&str> {
        match self {
            Self::TokenizerSequence { vocabulary } | Self::FlatSegmented { vocabulary, .. } => {
                Some(vocabulary)
            }
            Self::TimeMajorCollapsing => None,
        }
    }
}

/// Explicit `ModelHint → ModelSpec` lookup.
#[derive(Debug, Clone, Default)]
pub struct ModelTable {
    entries: HashMap<String, ModelSpec>,
}

impl ModelTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        let tokenizer = ModelSpec::TokenizerSequence {
            vocabulary: TOKENIZER_VOCABULARY.to_string(),
        };
        table.insert("captcha.onnx", tokenizer.clone());
        table.insert("model.onnx", tokenizer);
        table.insert("crnn_model.onnx", ModelSpec::TimeMajorCollapsing);
        table.insert("crnn.onnx", ModelSpec::TimeMajorCollapsing);
        for (version, sequence_length, vocabulary) in BUILTIN_FLAT_MODELS {
            let spec = ModelSpec::FlatSegmented {
                sequence_length,
                vocabulary: vocabulary.to_string(),
            };
            table.insert(&format!("captcha_model_v{version}.onnx"), spec.clone());
            table.insert(&format!("model_v{version}.onnx"), spec);
        }
        table
    }

    pub fn insert(&mut self, name: &str, spec: ModelSpec) {
        self.entries.insert(normalize_hint(name), spec);
    }

    pub fn lookup(&self, hint: &str) -> Option<&ModelSpec> {
        self.entries.get(&normalize_hint(hint))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &ModelSpec)> {
        self.entries.iter()
    }
}

/// Named vocabularies plus the search order used for shape-only inference
/// and the alternative orderings tried during calibration.
#[derive(Debug, Clone, Default)]
pub struct SymbolTables {
    vocabularies: HashMap<String, String>,
    reshape_order: Vec<String>,
    orderings: Vec<(String, String)>,
}

impl SymbolTables {
    pub fn builtin() -> Self {
        Self {
            vocabularies: BUILTIN_VOCABULARIES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reshape_order: BUILTIN_RESHAPE_ORDER.iter().map(|k| k.to_string()).collect(),
            orderings: BUILTIN_ORDERINGS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn insert(&mut self, key: &str, symbols: &str) {
        self.vocabularies.insert(key.to_string(), symbols.to_string());
    }

    pub fn get(&self, key: &str) -> Option<Vocabulary> {
        self.vocabularies.get(key).map(|s| Vocabulary::new(s))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vocabularies.contains_key(key)
    }

    /// Known vocabularies in search order, for shape-only inference.
    pub fn reshape_candidates(&self) -> impl Iterator<Item = (&str, Vocabulary)> + '_ {
        self.reshape_order
            .iter()
            .filter_map(|key| self.get(key).map(|v| (key.as_str(), v)))
    }

    /// Alternative symbol orders of the same size as `canonical`, excluding
    /// `canonical` itself.
    pub fn orderings_for<'a>(
        &'a self,
        canonical: &'a Vocabulary,
    ) -> impl Iterator<Item = (&'a str, Vocabulary)> + 'a {
        self.orderings.iter().filter_map(move |(name, symbols)| {
            let vocab = Vocabulary::new(symbols);
            (vocab.len() == canonical.len() && vocab != *canonical).then(|| (name.as_str(), vocab))
        })
    }
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Upper bound on positions for a tensor to count as tokenizer output.
    pub max_tokenizer_positions: usize,
    /// Try registered alternative vocabulary orderings when a reference is given.
    pub calibrate_orderings: bool,
    pub min_sequence_length: usize,
    pub max_sequence_length: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_tokenizer_positions: 64,
            calibrate_orderings: true,
            min_sequence_length: 4,
            max_sequence_length: 10,
        }
    }
}

impl DecodeOptions {
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.apply_env_overrides("CAPTCHA_");
        options
    }

    pub fn apply_env_overrides(&mut self, prefix: &str) {
        let parse_env = |suffix: &str| std::env::var(format!("{prefix}{suffix}")).ok();
        let apply = |suffix: &str, target: &mut usize| {
            if let Some(raw) = parse_env(suffix) {
                match raw.parse() {
                    Ok(v) => *target = v,
                    Err(err) => log::warn!("Ignoring invalid {prefix}{suffix} value '{raw}': {err}"),
                }
            }
        };

        apply("MAX_TOKENIZER_POSITIONS", &mut self.max_tokenizer_positions);
        apply("MIN_SEQUENCE_LENGTH", &mut self.min_sequence_length);
        apply("MAX_SEQUENCE_LENGTH", &mut self.max_sequence_length);

        if let Some(raw) = parse_env("CALIBRATE_ORDERINGS") {
            match raw.parse::<bool>() {
                Ok(v) => self.calibrate_orderings = v,
                Err(err) => {
                    log::warn!("Ignoring invalid {prefix}CALIBRATE_ORDERINGS value '{raw}': {err}")
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    vocabularies: HashMap<String, String>,
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    reshape_order: Option<Vec<String>>,
    #[serde(default)]
    orderings: Vec<OrderingEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    names: Vec<String>,
    #[serde(flatten)]
    spec: ModelSpec,
}

#[derive(Debug, Deserialize)]
struct OrderingEntry {
    name: String,
    symbols: String,
}

/// Read-only tables handed to the engine at startup.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub models: ModelTable,
    pub symbols: SymbolTables,
    pub options: DecodeOptions,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DecoderConfig {
    pub fn builtin() -> Self {
        Self {
            models: ModelTable::builtin(),
            symbols: SymbolTables::builtin(),
            options: DecodeOptions::default(),
        }
    }

    /// Built-in tables extended by the JSON file at `path`. File entries win
    /// over built-ins with the same key.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let start = Instant::now();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::builtin();
        config.merge_json(&content, path)?;
        config.validate()?;
        log::info!(
            "Loaded decoder configuration from {} ({} models) in {:?}",
            path.display(),
            config.models.len(),
            start.elapsed()
        );
        Ok(config)
    }

    pub fn merge_json(&mut self, content: &str, origin: &Path) -> Result<(), ConfigError> {
        let file: ConfigFile = serde_json::from_str(content).map_err(|source| ConfigError::Json {
            path: origin.to_path_buf(),
            source,
        })?;

        for (key, symbols) in &file.vocabularies {
            self.symbols.insert(key, symbols);
        }
        for entry in file.models {
            for name in &entry.names {
                self.models.insert(name, entry.spec.clone());
            }
        }
        if let Some(order) = file.reshape_order {
            self.symbols.reshape_order = order;
        }
        self.symbols.orderings.extend(
            file.orderings
                .into_iter()
                .map(|o| (o.name, o.symbols)),
        );
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let options = &self.options;
        if options.min_sequence_length == 0
            || options.min_sequence_length > options.max_sequence_length
            || options.max_sequence_length > MAX_SEQUENCE_LENGTH
        {
            return Err(ConfigError::InvalidReshapeBounds {
                min: options.min_sequence_length,
                max: options.max_sequence_length,
            });
        }
        for (key, symbols) in &self.symbols.vocabularies {
            if symbols.is_empty() {
                return Err(ConfigError::EmptyVocabulary(key.clone()));
            }
        }
        for (name, spec) in self.models.iter() {
            if let ModelSpec::FlatSegmented {
                sequence_length, ..
            } = spec
            {
                if !(1..=MAX_SEQUENCE_LENGTH).contains(sequence_length) {
                    return Err(ConfigError::InvalidSequenceLength {
                        model: name.clone(),
                        length: *sequence_length,
                        max: MAX_SEQUENCE_LENGTH,
                    });
                }
            }
            if let Some(vocabulary) = spec.vocabulary() {
                if !self.symbols.contains(vocabulary) {
                    return Err(ConfigError::DanglingVocabulary {
                        model: name.clone(),
                        vocabulary: vocabulary.to_string(),
                    });
                }
            }
        }
        for key in &self.symbols.reshape_order {
            if !self.symbols.contains(key) {
                return Err(ConfigError::DanglingVocabulary {
                    model: "reshape_order".to_string(),
                    vocabulary: key.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_is_valid() {
        assert!(DecoderConfig::builtin().validate().is_ok());
    }

    #[test]
    fn hint_normalization() {
        assert_eq!(normalize_hint("models/Captcha_Model_V1.onnx"), "captcha_model_v1.onnx");
        assert_eq!(normalize_hint("C:\\m\\model_v2.int8.onnx"), "model_v2.onnx");
        assert_eq!(normalize_hint("  crnn_model.onnx "), "crnn_model.onnx");
    }

    #[test]
    fn builtin_table_covers_model_families() {
        let table = ModelTable::builtin();
        assert_eq!(
            table.lookup("captcha_model_v5.onnx"),
            Some(&ModelSpec::FlatSegmented {
                sequence_length: 5,
                vocabulary: "37_uppercase".to_string()
            })
        );
        assert!(matches!(
            table.lookup("/tmp/captcha.onnx"),
            Some(ModelSpec::TokenizerSequence { .. })
        ));
        assert_eq!(table.lookup("crnn_model.onnx"), Some(&ModelSpec::TimeMajorCollapsing));
        assert!(table.lookup("resnet.onnx").is_none());
    }

    #[test]
    fn orderings_match_size_and_skip_canonical() {
        let tables = SymbolTables::builtin();
        let canonical = tables.get("37_uppercase").unwrap();
        let names: Vec<&str> = tables.orderings_for(&canonical).map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["digits_first_lowercase", "digits_first_uppercase", "lowercase_first"]
        );
    }

    #[test]
    fn merge_json_extends_tables() {
        let mut config = DecoderConfig::builtin();
        let json = r#"{
            "vocabularies": { "hex": "0123456789abcdef" },
            "models": [
                { "names": ["hex_v1.onnx"], "schema": "flat_segmented", "sequence_length": 8, "vocabulary": "hex" },
                { "names": ["ocr_ctc.onnx"], "schema": "time_major_collapsing" }
            ]
        }"#;
        config.merge_json(json, Path::new("inline.json")).unwrap();
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.models.lookup("hex_v1.onnx"),
            Some(ModelSpec::FlatSegmented { sequence_length: 8, .. })
        ));
        assert_eq!(config.models.lookup("ocr_ctc.onnx"), Some(&ModelSpec::TimeMajorCollapsing));
    }

    #[test]
    fn dangling_vocabulary_is_rejected() {
        let mut config = DecoderConfig::builtin();
        let json = r#"{ "models": [ { "names": ["x.onnx"], "schema": "tokenizer_sequence", "vocabulary": "nope" } ] }"#;
        config.merge_json(json, Path::new("inline.json")).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DanglingVocabulary { .. })
        ));
    }

    #[test]
    fn invalid_json_reports_origin() {
        let mut config = DecoderConfig::builtin();
        let err = config
            .merge_json("{ not json", Path::new("broken.json"))
            .unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let mut config = DecoderConfig::builtin();
        config.options.min_sequence_length = 9;
        config.options.max_sequence_length = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidReshapeBounds { min: 9, max: 4 })
        ));
    }

    #[test]
    fn oversized_search_bound_is_rejected() {
        let mut config = DecoderConfig::builtin();
        config.options.max_sequence_length = usize::MAX / 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidReshapeBounds { min: 4, .. })
        ));
        config.options.max_sequence_length = MAX_SEQUENCE_LENGTH;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn declared_sequence_length_is_bounded() {
        for length in ["0", "18446744073709551615"] {
            let mut config = DecoderConfig::builtin();
            let json = format!(
                r#"{{ "models": [ {{ "names": ["big.onnx"], "schema": "flat_segmented", "sequence_length": {length}, "vocabulary": "63" }} ] }}"#
            );
            config.merge_json(&json, Path::new("inline.json")).unwrap();
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidSequenceLength { .. })
            ));
        }
    }
}
