//! Account file import.
//!
//! Two file conventions exist in the wild: structured session payloads
//! (JSON, in three historical shapes) and bare `username.extension` files
//! whose extension encodes the category. Each is exposed as a named
//! [`ImportMode`]; `Auto` tries the structured payload first.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::batch::{BatchOutcome, ImportError};
use crate::models::IMPORTED_CATEGORY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ImportMode {
    /// Structured payload if the content is JSON, file name otherwise.
    #[default]
    Auto,
    /// Session payloads in `.json` or `.txt` files.
    Session,
    /// `username.extension` file names; content is ignored.
    Filename,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Session => "session",
            Self::Filename => "filename",
        }
    }
}

/// A file whose content has already been read.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: String,
    pub checksum: String,
}

impl UploadedFile {
    /// Content is decoded lossily; the checksum covers the raw bytes.
    pub fn new(name: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        let bytes = data.as_ref();
        Self {
            name: name.into(),
            content: String::from_utf8_lossy(bytes).into_owned(),
            checksum: checksum(bytes),
        }
    }
}

fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Canonical `{device, session}` payload the bulk import endpoint expects.
/// Both halves are passed through as-is; only the session's `username`,
/// `proxy` and `category` are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub device: Map<String, Value>,
    pub session: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportCandidate {
    #[serde(skip)]
    pub source: String,
    pub username: String,
    pub category: String,
    pub proxy: String,
    #[serde(flatten)]
    pub payload: Option<SessionPayload>,
}

/// Extension → category table for the file name convention.
pub fn category_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "lolanna" => "Personal",
        "lolaaa" => "Business",
        "lol" => "Marketing",
        _ => IMPORTED_CATEGORY,
    }
}

/// Random `host:port:user:pass` proxy for accounts imported without one.
pub fn synthesize_proxy<R: Rng + ?Sized>(rng: &mut R, n: usize) -> String {
    format!(
        "192.168.{}.{}:{}:user{n}:pass{n}",
        rng.gen_range(0..255),
        rng.gen_range(0..255),
        rng.gen_range(8000..10000)
    )
}

/// Read every path up front; unreadable paths become errors for the batch.
pub fn read_files(paths: &[PathBuf]) -> (Vec<UploadedFile>, Vec<ImportError>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        match std::fs::read(path) {
            Ok(bytes) => files.push(UploadedFile::new(name, bytes)),
            Err(e) => errors.push(ImportError::new(
                name.clone(),
                format!("Error reading file {name}: {e}"),
            )),
        }
    }
    (files, errors)
}

struct Parsed {
    username: String,
    category: String,
    proxy: Option<String>,
    payload: Option<SessionPayload>,
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

/// Null, false and empty strings count as absent.
fn present<'a>(value: Option<&'a Value>) -> Option<&'a Value> {
    value.filter(|v| match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    present(obj.get(key))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn parse_session_value(name: &str, value: &Value) -> Result<Parsed, String> {
    let invalid = || format!("Invalid file format: {name}");
    let missing = || format!("Missing required data in file: {name}");
    let obj = value.as_object().ok_or_else(invalid)?;

    let split = |device: Option<&Value>, session: Option<&Value>| {
        match (
            present(device).and_then(Value::as_object),
            present(session).and_then(Value::as_object),
        ) {
            (Some(device), Some(session)) => Ok((device.clone(), session.clone())),
            _ => Err(missing()),
        }
    };

    let (device, session) = if present(obj.get("device")).is_some() {
        split(obj.get("device"), obj.get("session"))?
    } else if let Some(nested) = present(obj.get("sessionData")).and_then(Value::as_object) {
        split(nested.get("device"), nested.get("session"))?
    } else if let (Some(username), Some(model)) =
        (str_field(obj, "username"), str_field(obj, "deviceModel"))
    {
        let mut device = Map::new();
        device.insert("model".into(), model.into());
        device.insert(
            "manufacturer".into(),
            str_field(obj, "deviceManufacturer").unwrap_or_default().into(),
        );
        device.insert("language".into(), "en_US".into());
        let mut session = Map::new();
        session.insert("username".into(), username.into());
        session.insert("password".into(), str_field(obj, "password").unwrap_or_default().into());
        session.insert("t-otp-key".into(), str_field(obj, "totp").unwrap_or_default().into());
        session.insert("proxy".into(), str_field(obj, "proxy").unwrap_or_default().into());
        (device, session)
    } else {
        return Err(invalid());
    };

    let username = str_field(&session, "username")
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(missing)?;

    let category = str_field(obj, "category")
        .or_else(|| str_field(&session, "category"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| IMPORTED_CATEGORY.to_string());
    let proxy = str_field(&session, "proxy")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    Ok(Parsed {
        username,
        category,
        proxy,
        payload: Some(SessionPayload { device, session }),
    })
}

fn parse_session_file(file: &UploadedFile) -> Result<Parsed, String> {
    let name = &file.name;
    let value: Value = if has_extension(name, "json") {
        serde_json::from_str(&file.content)
            .map_err(|e| format!("Error processing file {name}: {e}"))?
    } else if has_extension(name, "txt") {
        serde_json::from_str(&file.content)
            .map_err(|_| format!("Error processing text file {name}: Not a valid JSON format"))?
    } else {
        return Err(format!("Unsupported file type: {name}"));
    };
    parse_session_value(name, &value)
}

fn parse_filename(name: &str) -> Result<Parsed, String> {
    let Some((username, ext)) = name.rsplit_once('.') else {
        return Err(format!("No extension in file name: {name}"));
    };
    let username = username.trim();
    if username.is_empty() {
        return Err(format!("Missing username in file name: {name}"));
    }
    Ok(Parsed {
        username: username.to_string(),
        category: category_for_extension(ext).to_string(),
        proxy: None,
        payload: None,
    })
}

fn parse_auto(file: &UploadedFile) -> Result<Parsed, String> {
    let name = &file.name;
    match serde_json::from_str::<Value>(&file.content) {
        Ok(value) if value.is_object() => parse_session_value(name, &value),
        Ok(_) if has_extension(name, "json") => Err(format!("Invalid file format: {name}")),
        Err(e) if has_extension(name, "json") => {
            Err(format!("Error processing file {name}: {e}"))
        }
        _ => parse_filename(name),
    }
}

pub fn parse_files<R: Rng + ?Sized>(
    files: &[UploadedFile],
    mode: ImportMode,
    rng: &mut R,
) -> BatchOutcome<ImportCandidate> {
    let mut outcome = BatchOutcome::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, file) in files.iter().enumerate() {
        let parsed = match mode {
            ImportMode::Auto => parse_auto(file),
            ImportMode::Session => parse_session_file(file),
            ImportMode::Filename => parse_filename(&file.name),
        };
        let parsed = match parsed {
            Ok(p) => p,
            Err(message) => {
                tracing::warn!(file = %file.name, %message, "skipping import file");
                outcome.reject(file.name.clone(), message);
                continue;
            }
        };

        if !seen.insert(parsed.username.clone()) {
            outcome.reject(
                file.name.clone(),
                format!("Duplicate username {} in file {}", parsed.username, file.name),
            );
            continue;
        }

        let proxy = parsed
            .proxy
            .unwrap_or_else(|| synthesize_proxy(rng, idx + 1));
        let payload = parsed.payload.map(|mut p| {
            p.session.insert("proxy".into(), Value::from(proxy.clone()));
            p
        });
        outcome.accept(ImportCandidate {
            source: file.name.clone(),
            username: parsed.username,
            category: parsed.category,
            proxy,
            payload,
        });
    }

    tracing::debug!(
        mode = mode.as_str(),
        accounts = outcome.items.len(),
        errors = outcome.errors.len(),
        "parsed account files"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn parse(files: &[UploadedFile], mode: ImportMode) -> BatchOutcome<ImportCandidate> {
        parse_files(files, mode, &mut rng())
    }

    const DIRECT: &str = r#"{
        "device": {"model": "Pixel 7", "manufacturer": "Google", "build-number": "TQ3A", "density": "420"},
        "session": {"username": "alice", "password": "pw", "proxy": "10.0.0.1:8080:u:p", "cookie": "abc"}
    }"#;

    #[test]
    fn test_extension_table() {
        assert_eq!(category_for_extension("lolanna"), "Personal");
        assert_eq!(category_for_extension("LOLAAA"), "Business");
        assert_eq!(category_for_extension("lol"), "Marketing");
        assert_eq!(category_for_extension("xyz"), "Imported");
    }

    #[test]
    fn test_filename_convention() {
        let files = vec![
            UploadedFile::new("alice.lolanna", ""),
            UploadedFile::new("bob.xyz", ""),
            UploadedFile::new("noext", ""),
        ];
        let outcome = parse(&files, ImportMode::Filename);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0].username, "alice");
        assert_eq!(outcome.items[0].category, "Personal");
        assert_eq!(outcome.items[1].username, "bob");
        assert_eq!(outcome.items[1].category, "Imported");
        assert_eq!(outcome.error_messages(), vec!["No extension in file name: noext"]);
        assert_eq!(outcome.errors[0].source, "noext");
    }

    #[test]
    fn test_filename_uses_last_dot_and_rejects_empty_username() {
        let files = vec![
            UploadedFile::new("first.last.lol", ""),
            UploadedFile::new(".lol", ""),
        ];
        let outcome = parse(&files, ImportMode::Filename);
        assert_eq!(outcome.items[0].username, "first.last");
        assert_eq!(outcome.items[0].category, "Marketing");
        assert_eq!(outcome.error_messages(), vec!["Missing username in file name: .lol"]);
    }

    #[test]
    fn test_synthesized_proxy_shape() {
        let outcome = parse(&[UploadedFile::new("carol.lol", "")], ImportMode::Filename);
        let proxy = &outcome.items[0].proxy;
        let parts: Vec<&str> = proxy.split(':').collect();
        assert_eq!(parts.len(), 4, "{proxy}");
        assert!(parts[0].starts_with("192.168."));
        let port: u32 = parts[1].parse().unwrap();
        assert!((8000..10000).contains(&port));
        assert_eq!(parts[2], "user1");
        assert_eq!(parts[3], "pass1");
    }

    #[test]
    fn test_session_direct_shape() {
        let outcome = parse(&[UploadedFile::new("alice.json", DIRECT)], ImportMode::Session);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let cand = &outcome.items[0];
        assert_eq!(cand.username, "alice");
        assert_eq!(cand.proxy, "10.0.0.1:8080:u:p");
        assert_eq!(cand.category, "Imported");
        let payload = cand.payload.as_ref().unwrap();
        assert_eq!(payload.device["model"], "Pixel 7");
        assert_eq!(payload.device["build-number"], "TQ3A");
        assert_eq!(payload.session["cookie"], "abc");
    }

    #[test]
    fn test_session_nested_shape_with_category() {
        let content = r#"{"category": "Business", "sessionData": {"device": {"model": "X"}, "session": {"username": "dave"}}}"#;
        let outcome = parse(&[UploadedFile::new("dave.txt", content)], ImportMode::Session);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert_eq!(outcome.items[0].username, "dave");
        assert_eq!(outcome.items[0].category, "Business");
        // No proxy in the payload: one is synthesized and written back into the session.
        let cand = &outcome.items[0];
        assert!(cand.proxy.starts_with("192.168."));
        assert_eq!(cand.payload.as_ref().unwrap().session["proxy"], cand.proxy.as_str());
    }

    #[test]
    fn test_session_keeps_numeric_device_fields() {
        let content = r#"{"device": {"model": "Pixel", "density": 420, "os-version": 34}, "session": {"username": "alice"}}"#;
        let outcome = parse(&[UploadedFile::new("alice.json", content)], ImportMode::Session);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let payload = outcome.items[0].payload.as_ref().unwrap();
        assert_eq!(payload.device["density"], 420);
        assert_eq!(payload.device["os-version"], 34);
    }

    #[test]
    fn test_session_null_fields_count_as_absent() {
        let content = r#"{"device": {"model": "Pixel"}, "session": {"username": "bob", "proxy": null, "password": null}}"#;
        let outcome = parse(&[UploadedFile::new("bob.json", content)], ImportMode::Session);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let cand = &outcome.items[0];
        assert_eq!(cand.username, "bob");
        assert!(cand.proxy.starts_with("192.168."));
        let session = &cand.payload.as_ref().unwrap().session;
        assert_eq!(session["proxy"], cand.proxy.as_str());
        assert!(session["password"].is_null());
    }

    #[test]
    fn test_session_flat_shape_is_reconstructed() {
        let content = r#"{"username": "erin", "deviceModel": "SM-G991B", "deviceManufacturer": "samsung", "password": "pw", "totp": "JBSW"}"#;
        let outcome = parse(&[UploadedFile::new("erin.json", content)], ImportMode::Session);
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        let payload = outcome.items[0].payload.as_ref().unwrap();
        assert_eq!(payload.device["model"], "SM-G991B");
        assert_eq!(payload.device["manufacturer"], "samsung");
        assert_eq!(payload.device["language"], "en_US");
        assert_eq!(payload.session["password"], "pw");
        assert_eq!(payload.session["t-otp-key"], "JBSW");
    }

    #[test]
    fn test_session_errors_do_not_abort_batch() {
        let files = vec![
            UploadedFile::new("broken.json", "{not json"),
            UploadedFile::new("notes.txt", "hello"),
            UploadedFile::new("photo.png", "\u{89}PNG"),
            UploadedFile::new("odd.json", r#"{"foo": 1}"#),
            UploadedFile::new("nouser.json", r#"{"device": {"model": "X"}, "session": {"password": "pw"}}"#),
            UploadedFile::new("nosession.json", r#"{"device": {"model": "X"}}"#),
            UploadedFile::new("alice.json", DIRECT),
        ];
        let outcome = parse(&files, ImportMode::Session);
        assert_eq!(outcome.processed(), files.len());
        assert_eq!(outcome.items.len(), 1);
        let messages = outcome.error_messages();
        assert!(messages[0].starts_with("Error processing file broken.json:"));
        assert_eq!(messages[1], "Error processing text file notes.txt: Not a valid JSON format");
        assert_eq!(messages[2], "Unsupported file type: photo.png");
        assert_eq!(messages[3], "Invalid file format: odd.json");
        assert_eq!(messages[4], "Missing required data in file: nouser.json");
        assert_eq!(messages[5], "Missing required data in file: nosession.json");
    }

    #[test]
    fn test_auto_tries_payload_then_filename() {
        let files = vec![
            UploadedFile::new("alice.json", DIRECT),
            UploadedFile::new("bob.lolaaa", "opaque session bytes"),
            UploadedFile::new("bad.json", "{"),
            UploadedFile::new("noext", ""),
        ];
        let outcome = parse(&files, ImportMode::Auto);
        assert_eq!(outcome.items.len(), 2);
        assert!(outcome.items[0].payload.is_some());
        assert_eq!(outcome.items[1].username, "bob");
        assert_eq!(outcome.items[1].category, "Business");
        assert!(outcome.items[1].payload.is_none());
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[0].source, "bad.json");
        assert_eq!(outcome.errors[1].source, "noext");
    }

    #[test]
    fn test_duplicate_username_in_batch() {
        let files = vec![
            UploadedFile::new("alice.lol", ""),
            UploadedFile::new("alice.lolanna", ""),
        ];
        let outcome = parse(&files, ImportMode::Filename);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].category, "Marketing");
        assert_eq!(
            outcome.error_messages(),
            vec!["Duplicate username alice in file alice.lolanna"]
        );
    }

    #[test]
    fn test_read_files_reports_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("zoe.lol");
        std::fs::write(&existing, b"\xff\xfe binary").unwrap();
        let missing = dir.path().join("ghost.lol");
        let (files, errors) = read_files(&[existing, missing]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "zoe.lol");
        assert_eq!(files[0].checksum.len(), 64);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Error reading file ghost.lol"));
    }

    #[test]
    fn test_candidate_serializes_payload_inline() {
        let outcome = parse(&[UploadedFile::new("alice.json", DIRECT)], ImportMode::Session);
        let json = serde_json::to_value(&outcome.items[0]).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["session"]["username"], "alice");
        assert_eq!(json["device"]["build-number"], "TQ3A");
        assert!(json.get("source").is_none());
    }
}
