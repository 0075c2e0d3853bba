//! Per-instance rewriting of a training content document.
//!
//! Two phases, always in this order:
//! 1. textual substitution of `$name` / `${name}` placeholders, where names
//!    may contain commas (`$guestA,0,v1`); `$$` is a literal `$` and unknown
//!    names are left verbatim
//! 2. structural rename of every question's `meta_answer` field to `answer`
//!
//! The first phase targets values inside the document, the second its shape.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z,][_a-zA-Z0-9,]*)|\{(?P<braced>[_a-zA-Z,][_a-zA-Z0-9,]*)\})")
        .expect("placeholder pattern is valid")
});

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patched content is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unexpected content layout: {0}")]
    Layout(&'static str),
}

/// Replaces known placeholders and never fails on unknown ones.
pub fn substitute(template: &str, answers: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            if caps.name("escaped").is_some() {
                return "$".to_string();
            }
            let name = caps
                .name("named")
                .or_else(|| caps.name("braced"))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match answers.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Renames `meta_answer` to `answer` in the questions of every training
/// section.
///
/// Expected layout: a list of mappings, each value a list whose first entry
/// may carry `questions`.
pub fn promote_meta_answers(doc: &mut Value) -> Result<usize, PatchError> {
    let items = doc
        .as_sequence_mut()
        .ok_or(PatchError::Layout("document is not a list"))?;

    let mut renamed = 0;
    for item in items {
        let sections = item
            .as_mapping_mut()
            .ok_or(PatchError::Layout("list entry is not a mapping"))?;

        for (_, section) in sections.iter_mut() {
            let head = section
                .as_sequence_mut()
                .and_then(|s| s.first_mut())
                .ok_or(PatchError::Layout("training section is not a non-empty list"))?;
            let head = head
                .as_mapping_mut()
                .ok_or(PatchError::Layout("training section head is not a mapping"))?;

            let Some(questions) = head.get_mut("questions") else {
                continue;
            };
            if questions.is_null() {
                continue;
            }
            let questions = questions
                .as_sequence_mut()
                .ok_or(PatchError::Layout("questions is not a list"))?;

            for question in questions.iter_mut().filter_map(Value::as_mapping_mut) {
                if rename_meta_answer(question) {
                    renamed += 1;
                }
            }
        }
    }

    Ok(renamed)
}

// The renamed field goes last, after every other key.
fn rename_meta_answer(question: &mut Mapping) -> bool {
    let meta_key = Value::from("meta_answer");
    if !question.contains_key(&meta_key) {
        return false;
    }

    let mut rebuilt = Mapping::with_capacity(question.len());
    let mut meta = Value::Null;
    for (k, v) in std::mem::take(question) {
        if k == meta_key {
            meta = v;
        } else {
            rebuilt.insert(k, v);
        }
    }
    rebuilt.insert(Value::from("answer"), meta);
    *question = rebuilt;
    true
}

/// Both phases: substitute, parse, rename, serialize.
pub fn patch(template: &str, answers: &HashMap<String, String>) -> Result<String, PatchError> {
    let text = substitute(template, answers);
    let mut doc: Value = serde_yaml::from_str(&text)?;
    promote_meta_answers(&mut doc)?;
    Ok(serde_yaml::to_string(&doc)?)
}
