//! File name matching and rename derivation.

use regex::Regex;

/// Placeholder replaced by successive capture groups
pub const MATCH_TOKEN: &str = "MATCH";
/// Placeholder replaced by capture group 1
pub const YEAR_TOKEN: &str = "YEAR";
/// Whole-template keyword meaning "lower-case the name"
pub const LOWERCASE_KEYWORD: &str = "LOWERCASE";

/// At most this many `MATCH` placeholders are substituted
const MAX_GROUP_SUBSTITUTIONS: usize = 10;

/// How a matched file name turns into the name used at the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameRule {
    /// Template with `MATCH` placeholders
    Groups(String),
    /// Template with `YEAR` placeholders
    Year(String),
    Lowercase,
    Keep,
}

impl RenameRule {
    /// Classifies a template, in precedence order MATCH, YEAR, LOWERCASE
    pub fn parse(template: Option<&str>) -> Self {
        match template {
            Some(t) if t.contains(MATCH_TOKEN) => RenameRule::Groups(t.to_string()),
            Some(t) if t.contains(YEAR_TOKEN) => RenameRule::Year(t.to_string()),
            Some(t) if t == LOWERCASE_KEYWORD => RenameRule::Lowercase,
            _ => RenameRule::Keep,
        }
    }
}

/// Outcome of testing one candidate name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    /// Capture groups 1.. in order; `None` for a group that did not participate
    pub groups: Vec<Option<String>>,
    /// Name to use at the destination
    pub target_name: String,
    /// Whether `target_name` came from the rename rule
    pub renamed: bool,
}

/// Compiled file pattern plus rename rule for one profile
#[derive(Debug, Clone)]
pub struct FileSelector {
    regex: Regex,
    rule: RenameRule,
}

impl FileSelector {
    /// Compiles `pattern` anchored at the start of the name
    ///
    /// # Errors
    /// Returns the regex error for an invalid pattern
    pub fn new(pattern: &str, template: Option<&str>) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(FileSelector {
            regex,
            rule: RenameRule::parse(template),
        })
    }

    pub fn rule(&self) -> &RenameRule {
        &self.rule
    }

    /// Number of capture groups in the pattern
    pub fn capture_groups(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Applies the pattern and, on a match, the rename rule
    pub fn select(&self, name: &str) -> MatchResult {
        let Some(caps) = self.regex.captures(name) else {
            return MatchResult {
                matched: false,
                groups: Vec::new(),
                target_name: name.to_string(),
                renamed: false,
            };
        };

        let groups: Vec<Option<String>> = caps
            .iter()
            .skip(1)
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        let (target_name, renamed) = self.target_name(&groups, name);

        MatchResult {
            matched: true,
            groups,
            target_name,
            renamed,
        }
    }

    /// Derives the destination name for `current_name`
    ///
    /// Template rules ignore `current_name`; LOWERCASE and Keep act on it, so
    /// callers pass the unpacked name when a file was decompressed.
    pub fn target_name(&self, groups: &[Option<String>], current_name: &str) -> (String, bool) {
        match &self.rule {
            RenameRule::Groups(template) => {
                let mut name = template.clone();
                for group in groups.iter().take(MAX_GROUP_SUBSTITUTIONS) {
                    match group {
                        Some(value) => name = name.replacen(MATCH_TOKEN, value, 1),
                        None => break,
                    }
                }
                (name, true)
            }
            RenameRule::Year(template) => match groups.first() {
                Some(Some(year)) => (template.replace(YEAR_TOKEN, year), true),
                _ => (current_name.to_string(), false),
            },
            RenameRule::Lowercase => {
                let lowered = current_name.to_lowercase();
                let renamed = lowered != current_name;
                (lowered, renamed)
            }
            RenameRule::Keep => (current_name.to_string(), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_anchored_at_start() {
        let selector = FileSelector::new(r"\d+\.xml", None).unwrap();
        assert!(selector.select("2024.xml").matched);
        assert!(!selector.select("x2024.xml").matched);
        // only the start is anchored
        assert!(selector.select("2024.xml.bak").matched);
    }

    #[test]
    fn test_match_placeholders_take_groups_in_order() {
        let selector = FileSelector::new(r"(\w+)_(\d{8})\.txt", Some("MATCH-MATCH.dat")).unwrap();
        let result = selector.select("invoice_20240131.txt");
        assert!(result.matched);
        assert_eq!(result.target_name, "invoice-20240131.dat");
        assert!(result.renamed);
    }

    #[test]
    fn test_match_stops_when_groups_run_out() {
        let selector = FileSelector::new(r"(\w+)\.txt", Some("MATCH_MATCH_MATCH")).unwrap();
        let result = selector.select("abc.txt");
        assert_eq!(result.target_name, "abc_MATCH_MATCH");
    }

    #[test]
    fn test_match_stops_at_non_participating_group() {
        let selector = FileSelector::new(r"(a)?(b)", Some("MATCH-MATCH")).unwrap();
        let result = selector.select("b");
        assert_eq!(result.groups, vec![None, Some("b".to_string())]);
        assert_eq!(result.target_name, "MATCH-MATCH");
    }

    #[test]
    fn test_match_caps_at_ten_substitutions() {
        let pattern = "(a)".repeat(11);
        let template = "MATCH".repeat(11);
        let selector = FileSelector::new(&pattern, Some(&template)).unwrap();
        let result = selector.select(&"a".repeat(11));
        assert_eq!(result.target_name, format!("{}MATCH", "a".repeat(10)));
    }

    #[test]
    fn test_year_placeholder_uses_first_group() {
        let selector = FileSelector::new(r"report_(\d{4})\.csv", Some("annual_YEAR.csv")).unwrap();
        let result = selector.select("report_2023.csv");
        assert_eq!(result.target_name, "annual_2023.csv");
    }

    #[test]
    fn test_lowercase_keyword() {
        let selector = FileSelector::new(r".*\.CSV", Some("LOWERCASE")).unwrap();
        let result = selector.select("Report.CSV");
        assert_eq!(result.target_name, "report.csv");
        assert!(result.renamed);

        let (after_unpack, _) = selector.target_name(&result.groups, "Report.CSV");
        assert_eq!(after_unpack, "report.csv");
    }

    #[test]
    fn test_match_wins_over_year_and_plain_text_keeps_name() {
        assert!(matches!(RenameRule::parse(Some("YEAR_MATCH")), RenameRule::Groups(_)));
        assert_eq!(RenameRule::parse(Some("lowercase")), RenameRule::Keep);
        assert_eq!(RenameRule::parse(None), RenameRule::Keep);

        let selector = FileSelector::new(r".*", Some("fixed.txt")).unwrap();
        let result = selector.select("Orig.TXT");
        assert_eq!(result.target_name, "Orig.TXT");
        assert!(!result.renamed);
    }

    #[test]
    fn test_unmatched_result() {
        let selector = FileSelector::new(r".*\.xml$", None).unwrap();
        let result = selector.select("notes.txt");
        assert!(!result.matched);
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(FileSelector::new("(invalid[", None).is_err());
    }

    #[test]
    fn test_capture_group_count() {
        let selector = FileSelector::new(r"(\d+)-(\w+)(?:\.txt)", None).unwrap();
        assert_eq!(selector.capture_groups(), 2);
    }
}
