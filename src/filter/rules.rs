// Rule file compiler
//
// Parses the plain-text rule file into an evaluable rule set. Three rule
// classes share the file, one rule per line:
//
//   # comment                     ignored, as are blank lines
//   | type: LNK                   exclude a raw entry type (CHR/BLK/FIFO/LNK/SOCK)
//   |extensionPriority: flac,mp3  later extensions dominate earlier ones
//   \.bak$                        anything else is a regular expression
//
// Individual pattern lines that fail to compile are logged and dropped so
// one malformed line cannot take down the rest of the ruleset. A file that
// yields no pattern, no type exclusion, and no extension rule is a load
// error rather than a no-op.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use thiserror::Error;

use crate::fs::operations::FileKind;

const EXT_PRIORITY_PREFIX: &str = "|extensionPriority:";

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Rule file {0} contains no usable rules")]
    EmptyRuleSet(String),

    #[error("Failed to compile combined pattern: {0}")]
    CombinedPattern(#[from] regex::Error),
}

/// The compiled ruleset. Built once at startup, immutable afterward.
#[derive(Debug)]
pub struct RuleSet {
    /// OR-combination of every pattern line, in file order. `None` when no
    /// pattern line survived validation.
    pattern: Option<Regex>,

    /// Raw entry types excluded by `| type:` directives.
    excluded_types: HashSet<FileKind>,

    /// Subordinate extension -> extensions that dominate it.
    ext_priority: HashMap<String, Vec<String>>,
}

impl RuleSet {
    /// Load and compile the rule file at `path`.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Compile rule text. `origin` names the source for diagnostics.
    pub fn parse(text: &str, origin: &str) -> Result<Self, RuleError> {
        // Internal parser regex; a compile failure here is a programming
        // error, not user input.
        let type_line = Regex::new(r"^\|\s*type:\s*(CHR|BLK|FIFO|LNK|SOCK)\s*$")
            .expect("type directive regex");

        let mut excluded_types = HashSet::new();
        let mut ext_priority: HashMap<String, Vec<String>> = HashMap::new();
        let mut pattern_lines: Vec<String> = Vec::new();

        for line in text.lines() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }

            if let Some(caps) = type_line.captures(line) {
                let kind = match &caps[1] {
                    "CHR" => FileKind::CharDevice,
                    "BLK" => FileKind::BlockDevice,
                    "FIFO" => FileKind::NamedPipe,
                    "LNK" => FileKind::Symlink,
                    "SOCK" => FileKind::Socket,
                    other => unreachable!("type directive matched unexpected kind {other}"),
                };
                tracing::debug!(%line, ?kind, "excluding raw type");
                excluded_types.insert(kind);
                continue;
            }

            if let Some(list) = line.strip_prefix(EXT_PRIORITY_PREFIX) {
                let extensions: Vec<&str> =
                    list.split(',').map(str::trim).filter(|e| !e.is_empty()).collect();
                // Later entries dominate all earlier ones.
                for (i, subordinate) in extensions.iter().enumerate() {
                    for dominant in &extensions[i + 1..] {
                        tracing::debug!(dominant, subordinate, "extension priority");
                        ext_priority
                            .entry((*subordinate).to_string())
                            .or_default()
                            .push((*dominant).to_string());
                    }
                }
                continue;
            }

            // Validate the line in isolation before folding it into the
            // combined pattern; a bad line is dropped, not fatal.
            match Regex::new(line) {
                Ok(_) => {
                    tracing::debug!(pattern = %line, "pattern rule");
                    pattern_lines.push(line.to_string());
                }
                Err(err) => {
                    tracing::warn!(pattern = %line, %err, "dropping malformed pattern line");
                }
            }
        }

        if pattern_lines.is_empty() && excluded_types.is_empty() && ext_priority.is_empty() {
            return Err(RuleError::EmptyRuleSet(origin.to_string()));
        }

        let pattern = if pattern_lines.is_empty() {
            None
        } else {
            let combined = pattern_lines
                .iter()
                .map(|p| format!("(?:{p})"))
                .collect::<Vec<_>>()
                .join("|");
            tracing::debug!(%combined, "combined pattern");
            // Every line compiled on its own, so this should not fail; if
            // it somehow does, the load is fatal.
            Some(Regex::new(&combined)?)
        };

        Ok(Self { pattern, excluded_types, ext_priority })
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    pub fn excludes_type(&self, kind: FileKind) -> bool {
        self.excluded_types.contains(&kind)
    }

    pub fn has_ext_priority(&self) -> bool {
        !self.ext_priority.is_empty()
    }

    /// Extensions that dominate `ext`, empty when `ext` is not subordinate
    /// to anything.
    pub fn dominant_extensions(&self, ext: &str) -> &[String] {
        self.ext_priority.get(ext).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_pattern() {
        let rules = RuleSet::parse(r"\.flac$", "test").unwrap();
        let pattern = rules.pattern().unwrap();
        assert!(pattern.is_match("/music/song.flac"));
        assert!(!pattern.is_match("/music/song.mp3"));
    }

    #[test]
    fn test_parse_combines_patterns_with_or() {
        let rules = RuleSet::parse("\\.flac$\n\\.wav$\n", "test").unwrap();
        let pattern = rules.pattern().unwrap();
        assert!(pattern.is_match("/a.flac"));
        assert!(pattern.is_match("/a.wav"));
        assert!(!pattern.is_match("/a.mp3"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let rules = RuleSet::parse("# a comment\n\n   \n\\.bak$\n", "test").unwrap();
        assert!(rules.pattern().unwrap().is_match("/f.bak"));
    }

    #[test]
    fn test_parse_type_directive() {
        let rules = RuleSet::parse("| type: LNK\n", "test").unwrap();
        assert!(rules.excludes_type(FileKind::Symlink));
        assert!(!rules.excludes_type(FileKind::RegularFile));
        assert!(rules.pattern().is_none());
    }

    #[test]
    fn test_parse_type_directive_whitespace() {
        let rules = RuleSet::parse("|type:CHR\n|  type:   SOCK  \n", "test").unwrap();
        assert!(rules.excludes_type(FileKind::CharDevice));
        assert!(rules.excludes_type(FileKind::Socket));
    }

    #[test]
    fn test_parse_type_directive_is_case_sensitive() {
        // "lnk" is not a directive, so it falls through to the pattern class
        let rules = RuleSet::parse("| type: lnk\n", "test").unwrap();
        assert!(!rules.excludes_type(FileKind::Symlink));
        assert!(rules.pattern().is_some());
    }

    #[test]
    fn test_parse_extension_priority_pairs() {
        let rules = RuleSet::parse("|extensionPriority: flac,mp3\n", "test").unwrap();
        assert!(rules.has_ext_priority());
        assert_eq!(rules.dominant_extensions("flac"), ["mp3"]);
        assert!(rules.dominant_extensions("mp3").is_empty());
    }

    #[test]
    fn test_parse_extension_priority_three_way() {
        // For a,b,c: c dominates b and a; b dominates a
        let rules = RuleSet::parse("|extensionPriority: wav,flac,mp3\n", "test").unwrap();
        assert_eq!(rules.dominant_extensions("wav"), ["flac", "mp3"]);
        assert_eq!(rules.dominant_extensions("flac"), ["mp3"]);
        assert!(rules.dominant_extensions("mp3").is_empty());
    }

    #[test]
    fn test_parse_extension_priority_accumulates() {
        let text = "|extensionPriority: flac,mp3\n|extensionPriority: ape,ogg\n";
        let rules = RuleSet::parse(text, "test").unwrap();
        assert_eq!(rules.dominant_extensions("flac"), ["mp3"]);
        assert_eq!(rules.dominant_extensions("ape"), ["ogg"]);
    }

    #[test]
    fn test_parse_extension_priority_empty_list_ignored() {
        let err = RuleSet::parse("|extensionPriority:\n", "test").unwrap_err();
        assert!(matches!(err, RuleError::EmptyRuleSet(_)));
    }

    #[test]
    fn test_parse_drops_malformed_pattern_line() {
        // The broken line is dropped, the good one still loads
        let rules = RuleSet::parse("[unclosed\n\\.bak$\n", "test").unwrap();
        let pattern = rules.pattern().unwrap();
        assert!(pattern.is_match("/f.bak"));
        assert!(!pattern.is_match("[unclosed"));
    }

    #[test]
    fn test_parse_empty_ruleset_is_error() {
        let err = RuleSet::parse("# only comments\n\n", "test").unwrap_err();
        assert!(matches!(err, RuleError::EmptyRuleSet(_)));
    }

    #[test]
    fn test_parse_only_malformed_lines_is_error() {
        let err = RuleSet::parse("[unclosed\n", "test").unwrap_err();
        assert!(matches!(err, RuleError::EmptyRuleSet(_)));
    }

    #[test]
    fn test_user_parentheses_keep_meaning() {
        let rules = RuleSet::parse("(foo|bar)\\.tmp$\n", "test").unwrap();
        let pattern = rules.pattern().unwrap();
        assert!(pattern.is_match("/foo.tmp"));
        assert!(pattern.is_match("/bar.tmp"));
        assert!(!pattern.is_match("/baz.tmp"));
    }

    #[test]
    fn test_pattern_is_containment_match() {
        // Unanchored unless the rule anchors itself
        let rules = RuleSet::parse("tmp\n", "test").unwrap();
        assert!(rules.pattern().unwrap().is_match("/some/tmp/file"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RuleSet::load(Path::new("/nonexistent/sievefs.rc")).unwrap_err();
        assert!(matches!(err, RuleError::Io { .. }));
    }
}
