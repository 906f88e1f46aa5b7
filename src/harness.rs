//! Equivalence harness: the (codec, size) check matrix.
//!
//! For every size budget one tree is generated and folded in memory to get
//! the reference digest. Every selected codec then encodes that tree, and
//! the bytes are decoded by the same codec and by every other selected codec
//! of the same format. A pair passes when every digest it produced equals the
//! reference.
use std::fmt;

use chrono::Utc;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::codec::{self, Codec};
use crate::config::CheckConfig;
use crate::error::Result;
use crate::fold::{FoldOptions, fold_value};
use crate::generate::generate;
use crate::hash::Digest;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Reference,
    Encode,
    Decode,
    CrossDecode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Reference => "reference",
            Stage::Encode => "encode",
            Stage::Decode => "decode",
            Stage::CrossDecode => "cross-decode",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    Mismatch { expected: Digest, actual: Digest },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub stage: Stage,
    /// The codec that performed the failing stage.
    pub codec: &'static str,
    #[serde(flatten)]
    pub problem: Problem,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::Mismatch { expected, actual } => {
                write!(f, "{} by {}: digest {actual}, expected {expected}", self.stage, self.codec)
            }
            Problem::Error { message } => write!(f, "{} by {}: {message}", self.stage, self.codec),
        }
    }
}

/// Outcome of one (codec, size) pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairResult {
    pub codec: &'static str,
    pub size: usize,
    pub nodes: usize,
    pub reference: Option<Digest>,
    pub encoded_len: Option<usize>,
    pub failures: Vec<Failure>,
}

impl PairResult {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    fn check(&mut self, stage: Stage, codec: &'static str, expected: Digest, got: Result<Digest>) {
        let problem = match got {
            Ok(actual) if actual == expected => return,
            Ok(actual) => Problem::Mismatch { expected, actual },
            Err(err) => Problem::Error { message: err.to_string() },
        };
        let failure = Failure { stage, codec, problem };
        tracing::warn!(pair = self.codec, size = self.size, %failure, "check failed");
        self.failures.push(failure);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub started_at: String,
    pub seed: u64,
    pub fold: FoldOptions,
    pub sizes: Vec<usize>,
    /// Results per encoding codec, in registry order, sizes in config order.
    pub codecs: IndexMap<&'static str, Vec<PairResult>>,
}

impl Report {
    pub fn pairs(&self) -> impl Iterator<Item = &PairResult> {
        self.codecs.values().flatten()
    }

    pub fn passed(&self) -> bool {
        self.pairs().all(PairResult::passed)
    }

    pub fn failed_pairs(&self) -> usize {
        self.pairs().filter(|p| !p.passed()).count()
    }
}

struct Tree {
    size: usize,
    value: Value,
    reference: std::result::Result<Digest, String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Codecs named by `config`, or all of them. Unknown names are skipped;
/// [`CheckConfig::validate`] reports them.
pub fn selected_codecs(config: &CheckConfig) -> Vec<&'static dyn Codec> {
    codec::all()
        .filter(|c| config.codecs.is_empty() || config.codecs.iter().any(|n| n == c.name()))
        .collect()
}

pub fn run(config: &CheckConfig) -> Report {
    run_with(config, &selected_codecs(config))
}

/// Run the matrix over an explicit codec list.
pub fn run_with(config: &CheckConfig, codecs: &[&dyn Codec]) -> Report {
    let started_at = Utc::now().to_rfc3339();
    tracing::info!(sizes = ?config.sizes, codecs = codecs.len(), seed = config.seed, "starting check");

    let trees: Vec<Tree> = config
        .sizes
        .par_iter()
        .map(|&size| {
            let value = generate(size, config.seed);
            let reference = fold_value(&value, &config.fold).map_err(|e| e.to_string());
            Tree { size, value, reference }
        })
        .collect();

    let pairs: Vec<(&dyn Codec, &Tree)> = codecs
        .iter()
        .flat_map(|&c| trees.iter().map(move |t| (c, t)))
        .collect();
    let results: Vec<PairResult> = pairs
        .par_iter()
        .map(|&(codec, tree)| check_pair(codec, tree, codecs, &config.fold))
        .collect();

    let mut by_codec: IndexMap<&'static str, Vec<PairResult>> =
        codecs.iter().map(|c| (c.name(), Vec::new())).collect();
    for result in results {
        by_codec.entry(result.codec).or_default().push(result);
    }

    Report {
        started_at,
        seed: config.seed,
        fold: config.fold.clone(),
        sizes: config.sizes.clone(),
        codecs: by_codec,
    }
}

fn check_pair(codec: &dyn Codec, tree: &Tree, codecs: &[&dyn Codec], options: &FoldOptions) -> PairResult {
    let mut result = PairResult {
        codec: codec.name(),
        size: tree.size,
        nodes: tree.value.node_count(),
        reference: None,
        encoded_len: None,
        failures: Vec::new(),
    };
    let reference = match &tree.reference {
        Ok(digest) => *digest,
        Err(message) => {
            result.failures.push(Failure {
                stage: Stage::Reference,
                codec: codec.name(),
                problem: Problem::Error { message: message.clone() },
            });
            return result;
        }
    };
    result.reference = Some(reference);

    let encoded = match codec.encode(&tree.value, options) {
        Ok(encoded) => encoded,
        Err(err) => {
            result.check(Stage::Encode, codec.name(), reference, Err(err));
            return result;
        }
    };
    result.encoded_len = Some(encoded.bytes.len());
    result.check(Stage::Encode, codec.name(), reference, Ok(encoded.digest));

    for reader in codecs.iter().filter(|r| r.format() == codec.format()) {
        let stage = if reader.name() == codec.name() { Stage::Decode } else { Stage::CrossDecode };
        result.check(stage, reader.name(), reference, reader.decode(&encoded.bytes, options));
    }

    if result.passed() {
        tracing::info!(codec = codec.name(), size = tree.size, digest = %reference, bytes = encoded.bytes.len(), "pair passed");
    }
    result
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::json::JsonStream;
    use crate::codec::{Encoded, Format};

    fn small() -> CheckConfig {
        CheckConfig { sizes: vec![1, 10, 200], ..Default::default() }
    }

    /// Decodes correctly, then flips a bit of the digest.
    struct Lossy;

    impl Codec for Lossy {
        fn name(&self) -> &'static str {
            "lossy"
        }

        fn format(&self) -> Format {
            Format::Json
        }

        fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
            JsonStream.encode(value, options)
        }

        fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
            JsonStream.decode(bytes, options).map(|d| Digest(d.0 ^ 1))
        }
    }

    #[test]
    fn every_registered_codec_passes() {
        let report = run(&small());
        assert!(report.passed(), "{:#?}", report.pairs().filter(|p| !p.passed()).collect::<Vec<_>>());
        assert_eq!(report.codecs.len(), codec::names().len());
        for results in report.codecs.values() {
            let sizes: Vec<_> = results.iter().map(|r| r.size).collect();
            assert_eq!(sizes, [1, 10, 200]);
        }
    }

    #[test]
    fn pairs_sharing_a_size_share_a_reference() {
        let report = run(&small());
        let digests: Vec<_> = report.pairs().filter(|p| p.size == 200).map(|p| p.reference).collect();
        assert!(digests.windows(2).all(|w| w[0] == w[1]));
        assert!(digests[0].is_some());
    }

    #[test]
    fn selection_filters_by_name() {
        let config = CheckConfig { codecs: vec!["msgpack".into(), "json-dom".into()], ..small() };
        let names: Vec<_> = selected_codecs(&config).iter().map(|c| c.name()).collect();
        assert_eq!(names, ["json-dom", "msgpack"]);
    }

    #[test]
    fn a_lossy_decoder_fails_without_stopping_the_rest() {
        let report = run_with(&small(), &[&JsonStream, &Lossy]);
        assert!(!report.passed());
        assert_eq!(report.failed_pairs(), 6);
        for pair in report.pairs() {
            assert!(pair.encoded_len.is_some());
            for failure in &pair.failures {
                assert_eq!(failure.codec, "lossy");
                assert!(matches!(failure.problem, Problem::Mismatch { .. }));
            }
        }
        let json_stream = &report.codecs["json-stream"][0];
        assert_eq!(json_stream.failures[0].stage, Stage::CrossDecode);
        let lossy = &report.codecs["lossy"][0];
        assert_eq!(lossy.failures[0].stage, Stage::Decode);
    }

    #[test]
    fn report_serializes_with_codecs_in_order() {
        let report = run_with(&small(), &[&JsonStream, &Lossy]);
        let json = serde_json::to_value(&report).unwrap();
        let keys: Vec<_> = json["codecs"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["json-stream", "lossy"]);
        assert!(json["started_at"].is_string());
        let failure = &json["codecs"]["lossy"][0]["failures"][0];
        assert_eq!(failure["stage"], "decode");
        assert_eq!(failure["kind"], "mismatch");
    }
}
