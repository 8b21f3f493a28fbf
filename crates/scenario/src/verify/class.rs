use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use campus_client::ClassResponse;
use campus_core::failure::Failure;
use campus_core::hashing::sha256_hex;
use campus_core::model::Class;

use super::check_field;

pub fn verify_class(response: &ClassResponse, class: &Class) -> Vec<Failure> {
    [
        check_field("class", "id", &class.id, &response.id),
        check_field("class", "title", &class.title, &response.title),
        check_field("class", "description", &class.description, &response.description),
        check_field("class", "part", &class.part, &response.part),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}

/// Class count must match and the newest class must match in full.
pub fn verify_classes(response: &[ClassResponse], classes: &[Arc<Class>]) -> Vec<Failure> {
    if response.len() != classes.len() {
        return vec![Failure::application(format!(
            "expected {} classes, got {}",
            classes.len(),
            response.len()
        ))];
    }
    match (response.last(), classes.last()) {
        (Some(actual), Some(expected)) => verify_class(actual, expected),
        _ => Vec::new(),
    }
}

/// Check a submission archive against the uploads recorded for the class.
///
/// The set of `(file name, SHA-256)` pairs in the archive must equal
/// `expected`. Every missing, unexpected or altered file is reported.
pub fn verify_archive(data: &[u8], expected: &HashMap<String, String>) -> Vec<Failure> {
    let mut archive = match zip::ZipArchive::new(Cursor::new(data)) {
        Ok(archive) => archive,
        Err(e) => {
            return vec![Failure::application(format!(
                "submission archive is unreadable: {e}"
            ))]
        }
    };

    let mut failures = Vec::new();
    let mut downloaded = HashMap::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(Failure::application(format!(
                    "submission archive entry {index} is unreadable: {e}"
                )));
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        if let Err(e) = entry.read_to_end(&mut content) {
            failures.push(Failure::application(format!(
                "submission {} is unreadable: {e}",
                entry.name()
            )));
            continue;
        }
        downloaded.insert(entry.name().to_string(), sha256_hex(&content));
    }

    for (name, digest) in &downloaded {
        match expected.get(name) {
            None => failures.push(Failure::application(format!(
                "submission archive contains unexpected file {name}"
            ))),
            Some(submitted) if submitted != digest => failures.push(Failure::application(
                format!("submission {name} does not match the uploaded file"),
            )),
            Some(_) => {}
        }
    }
    let mut missing: Vec<&String> = expected
        .keys()
        .filter(|name| !downloaded.contains_key(*name))
        .collect();
    missing.sort();
    failures.extend(missing.into_iter().map(|name| {
        Failure::application(format!("submission archive is missing {name}"))
    }));
    failures
}
