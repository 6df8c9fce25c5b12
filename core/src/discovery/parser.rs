//! Case declaration parsing: turns one on-disk `test_*` file into a
//! [`ParsedTest`] (docstring plus the `CaseSpec`(s) it declares).
//!
//! Per §9 "Hot reload without a package-manager" and the "Dynamic tool
//! signatures" note, this engine never embeds a scripting-language runtime.
//! [`CaseParser`] is the pluggable seam: a declarative TOML/YAML case format
//! ships by default (`DefaultCaseParser`), but any format (or an
//! out-of-process helper that shells out to the user's real language) can be
//! plugged in by implementing the trait.

use crate::domain::CaseSpec;
use crate::error::DiscoveryError;

/// One parsed `test_*` file: its docstring plus every case it declares.
///
/// The distilled spec models a test as emitting exactly one [`CaseSpec`] per
/// run; a file that declares more than one case is legal at this layer and
/// is left to the pipeline's "multiple cases not supported" handling (§9 Open
/// Question).
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedTest {
    pub docstring: Option<String>,
    pub cases: Vec<CaseSpec>,
}

/// Parses one case-declaration file's contents into a [`ParsedTest`].
pub trait CaseParser: Send + Sync {
    /// `file_name` is passed so implementations can dispatch on extension;
    /// `contents` is the full file text.
    fn parse(&self, file_name: &str, contents: &str) -> Result<ParsedTest, DiscoveryError>;

    /// Whether this parser recognizes files with this name (e.g. by extension).
    fn recognizes(&self, file_name: &str) -> bool;
}

/// One case as written in a TOML/YAML case-declaration file.
#[derive(Clone, Debug, serde::Deserialize)]
struct RawCase {
    prompt: String,
    #[serde(default)]
    expectations: Vec<String>,
    #[serde(default)]
    expected_tool_calls: Vec<String>,
}

/// Top-level shape of a case-declaration file: an optional docstring plus
/// either a single inline case or a `cases` list.
#[derive(Clone, Debug, serde::Deserialize)]
struct RawFile {
    #[serde(default)]
    doc: Option<String>,
    #[serde(flatten)]
    body: RawBody,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(untagged)]
enum RawBody {
    Multi { cases: Vec<RawCase> },
    Single(RawCase),
}

impl From<RawCase> for CaseSpec {
    fn from(c: RawCase) -> Self {
        CaseSpec {
            prompt: c.prompt,
            expectations: c.expectations,
            expected_tool_calls: c.expected_tool_calls,
        }
    }
}

/// Recognizes `.yaml`/`.yml`/`.toml` case files; YAML is parsed with
/// `serde_yaml`, TOML with the `toml` crate. Both map onto the same
/// [`RawFile`] shape.
#[derive(Default)]
pub struct DefaultCaseParser;

impl CaseParser for DefaultCaseParser {
    fn recognizes(&self, file_name: &str) -> bool {
        file_name.ends_with(".yaml") || file_name.ends_with(".yml") || file_name.ends_with(".toml")
    }

    fn parse(&self, file_name: &str, contents: &str) -> Result<ParsedTest, DiscoveryError> {
        let raw: RawFile = if file_name.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| DiscoveryError::CaseParse {
                file: file_name.to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(contents).map_err(|e| DiscoveryError::CaseParse {
                file: file_name.to_string(),
                message: e.to_string(),
            })?
        };
        let cases = match raw.body {
            RawBody::Multi { cases } => cases.into_iter().map(CaseSpec::from).collect(),
            RawBody::Single(case) => vec![CaseSpec::from(case)],
        };
        Ok(ParsedTest {
            docstring: raw.doc,
            cases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_case_yaml() {
        let parser = DefaultCaseParser;
        let yaml = r#"
doc: "pings the agent"
prompt: "ping"
expectations:
  - "agent replies with pong"
expected_tool_calls: []
"#;
        let parsed = parser.parse("test_ping.yaml", yaml).unwrap();
        assert_eq!(parsed.docstring.as_deref(), Some("pings the agent"));
        assert_eq!(parsed.cases.len(), 1);
        assert_eq!(parsed.cases[0].prompt, "ping");
        assert_eq!(parsed.cases[0].expectations, vec!["agent replies with pong"]);
    }

    #[test]
    fn parses_multi_case_yaml() {
        let parser = DefaultCaseParser;
        let yaml = r#"
cases:
  - prompt: "a"
    expectations: ["x"]
  - prompt: "b"
    expectations: ["y"]
"#;
        let parsed = parser.parse("test_multi.yaml", yaml).unwrap();
        assert_eq!(parsed.cases.len(), 2);
        assert_eq!(parsed.cases[1].prompt, "b");
    }

    #[test]
    fn parses_toml() {
        let parser = DefaultCaseParser;
        let toml_src = "prompt = \"ping\"\nexpectations = [\"pong\"]\n";
        let parsed = parser.parse("test_ping.toml", toml_src).unwrap();
        assert_eq!(parsed.cases[0].prompt, "ping");
    }

    #[test]
    fn recognizes_by_extension() {
        let parser = DefaultCaseParser;
        assert!(parser.recognizes("test_a.yaml"));
        assert!(parser.recognizes("test_a.toml"));
        assert!(!parser.recognizes("test_a.py"));
    }

    #[test]
    fn malformed_yaml_is_case_parse_error() {
        let parser = DefaultCaseParser;
        let err = parser.parse("test_bad.yaml", "not: [valid").unwrap_err();
        assert!(matches!(err, DiscoveryError::CaseParse { .. }));
    }
}
