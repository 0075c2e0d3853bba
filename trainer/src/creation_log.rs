//! Creation-log parser.
//!
//! The instantiation service returns its creation log as
//! `[{"status": "...", "message": "<url-encoded body>"}]`. Inside the body,
//! every line carrying `exec-result:` reports one per-instance answer:
//!
//! ```text
//! exec-result: ins<N>,<guest>,<num>,<var> <answer>
//! ```
//!
//! The grammar is a compatibility surface with the provisioning tool and is
//! applied in fixed steps. Any step failing fails the whole parse; the
//! lenient entry point `extract_meta_answers` turns that into an empty map so
//! the caller sees "no instances extracted".
use std::collections::{BTreeMap, HashMap};

use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::{debug, warn};

const PREFIX: &str = "[{\"";
const SUFFIX: &str = "\"}]";
const MARKER: &str = "exec-result:";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CreationLogError {
    #[error("log is not wrapped in [{{\"...\"}}]")]
    Envelope,

    #[error("log has no message field")]
    MissingMessage,

    #[error("line {line}: no answer after tag")]
    MissingAnswer { line: usize },

    #[error("line {line}: tag {tag:?} does not have four comma-separated parts")]
    MalformedTag { line: usize, tag: String },

    #[error("line {line}: instance tag {tag:?} is not ins<N>")]
    BadInstance { line: usize, tag: String },
}

/// One answer reported for an instance: `"guest,num,var" -> answer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaAnswer {
    pub key: String,
    pub answer: String,
}

impl MetaAnswer {
    pub fn new(key: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            answer: answer.into(),
        }
    }
}

/// Answers grouped by instance number, in log order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaAnswers {
    by_instance: BTreeMap<u32, Vec<MetaAnswer>>,
}

impl MetaAnswers {
    pub fn is_empty(&self) -> bool {
        self.by_instance.is_empty()
    }

    pub fn instance_count(&self) -> usize {
        self.by_instance.len()
    }

    pub fn entries(&self, instance: u32) -> &[MetaAnswer] {
        self.by_instance
            .get(&instance)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Substitution map for one instance. Later lines override earlier ones.
    pub fn for_instance(&self, instance: u32) -> HashMap<String, String> {
        self.entries(instance)
            .iter()
            .map(|a| (a.key.clone(), a.answer.clone()))
            .collect()
    }

    fn push(&mut self, instance: u32, answer: MetaAnswer) {
        self.by_instance.entry(instance).or_default().push(answer);
    }
}

pub fn parse(log: &str) -> Result<MetaAnswers, CreationLogError> {
    let log = log.trim();

    // 1. envelope
    let content = log
        .strip_prefix(PREFIX)
        .and_then(|s| s.strip_suffix(SUFFIX))
        .ok_or(CreationLogError::Envelope)?;

    // 2. status field, then message field, then body after the first colon
    let (_status, message) = content
        .split_once(',')
        .ok_or(CreationLogError::MissingMessage)?;
    let (_key, body) = message
        .split_once(':')
        .ok_or(CreationLogError::MissingMessage)?;
    let body = body.trim().trim_start_matches('"');

    // 3. decode and split
    let decoded = percent_decode_str(body).decode_utf8_lossy();

    let mut answers = MetaAnswers::default();
    for (idx, raw) in decoded.split('\n').enumerate() {
        let line = idx + 1;

        // 4. marker lines only
        let Some((_, rest)) = raw.split_once(MARKER) else {
            continue;
        };

        // 5. tag, one space, answer
        let (tag, answer) = rest
            .trim_start()
            .split_once(' ')
            .ok_or(CreationLogError::MissingAnswer { line })?;
        let answer = percent_decode_str(answer).decode_utf8_lossy().trim().to_string();

        // 6. insN,guest,num,var
        let parts: Vec<&str> = tag.split(',').collect();
        let [ins, guest, num, var] = parts.as_slice() else {
            return Err(CreationLogError::MalformedTag {
                line,
                tag: tag.to_string(),
            });
        };
        let instance = ins
            .strip_prefix("ins")
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| CreationLogError::BadInstance {
                line,
                tag: ins.to_string(),
            })?;

        // 7. accumulate
        answers.push(instance, MetaAnswer::new(format!("{guest},{num},{var}"), answer));
    }

    debug!(instances = answers.instance_count(), "creation log parsed");
    Ok(answers)
}

/// Parses the log, mapping any grammar violation to an empty result.
pub fn extract_meta_answers(log: &str) -> MetaAnswers {
    match parse(log) {
        Ok(answers) => answers,
        Err(e) => {
            warn!(error = %e, "creation log rejected");
            MetaAnswers::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_INSTANCES: &str = r#"[{"status": "SUCCESS", "message": "exec-result%3A%20ins1%2CguestA%2C0%2Cv1%20hello%0Aexec-result%3A%20ins2%2CguestB%2C0%2Cv1%20world"}]"#;

    #[test]
    fn parses_one_answer_per_instance() {
        let answers = parse(TWO_INSTANCES).unwrap();

        assert_eq!(answers.instance_count(), 2);
        assert_eq!(answers.entries(1), &[MetaAnswer::new("guestA,0,v1", "hello")]);
        assert_eq!(answers.entries(2), &[MetaAnswer::new("guestB,0,v1", "world")]);
        assert!(answers.entries(3).is_empty());
    }

    #[test]
    fn non_marker_lines_are_skipped() {
        let log = r#"[{"status": "SUCCESS", "message": "cloning%20guests%0Aexec-result%3A%20ins1%2Cdesktop%2C0%2Cflag%20%20FLAG%7Babc%7D%20%0Adone"}]"#;
        let answers = parse(log).unwrap();

        assert_eq!(answers.for_instance(1)["desktop,0,flag"], "FLAG{abc}");
    }

    #[test]
    fn later_answers_override_in_substitution_map() {
        let log = r#"[{"status": "SUCCESS", "message": "exec-result%3A%20ins1%2Cg%2C0%2Cv%20old%0Aexec-result%3A%20ins1%2Cg%2C0%2Cv%20new"}]"#;
        let answers = parse(log).unwrap();

        assert_eq!(answers.entries(1).len(), 2);
        assert_eq!(answers.for_instance(1)["g,0,v"], "new");
    }

    #[test]
    fn grammar_violations_are_typed() {
        assert_eq!(parse("garbage"), Err(CreationLogError::Envelope));
        assert_eq!(
            parse(r#"[{"status": "SUCCESS"}]"#),
            Err(CreationLogError::MissingMessage)
        );

        let three_parts = r#"[{"status": "SUCCESS", "message": "exec-result%3A%20ins1%2Cg%2C0%20x"}]"#;
        assert!(matches!(
            parse(three_parts),
            Err(CreationLogError::MalformedTag { line: 1, .. })
        ));

        let bad_instance = r#"[{"status": "SUCCESS", "message": "exec-result%3A%20host1%2Cg%2C0%2Cv%20x"}]"#;
        assert!(matches!(
            parse(bad_instance),
            Err(CreationLogError::BadInstance { .. })
        ));

        let no_answer = r#"[{"status": "SUCCESS", "message": "exec-result%3A%20ins1%2Cg%2C0%2Cv"}]"#;
        assert!(matches!(
            parse(no_answer),
            Err(CreationLogError::MissingAnswer { line: 1 })
        ));
    }

    #[test]
    fn lenient_entry_point_fails_closed() {
        let partly_bad = r#"[{"status": "SUCCESS", "message": "exec-result%3A%20ins1%2Cg%2C0%2Cv%20ok%0Aexec-result%3A%20insX%2Cg%2C0%2Cv%20no"}]"#;

        assert!(extract_meta_answers(partly_bad).is_empty());
        assert!(extract_meta_answers("").is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]
        #[test]
        fn never_panics_on_arbitrary_input(log in ".{0,200}") {
            let _ = extract_meta_answers(&log);
        }

        #[test]
        fn never_panics_inside_a_valid_envelope(body in "[a-z0-9%:, \n]{0,120}") {
            let log = format!(r#"[{{"status": "SUCCESS", "message": "{body}"}}]"#);
            let _ = extract_meta_answers(&log);
        }
    }
}
