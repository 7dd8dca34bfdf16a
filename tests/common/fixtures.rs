//! Catalog documents and mock endpoints

use catalog_harvest::Level;
use serde_json::{Value, json};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fake JPEG body served for every image
pub const IMAGE_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

/// Default endpoint code for a level
pub fn level_code(level: Level) -> &'static str {
    match level {
        Level::Person => "at_bkw0",
        Level::Letter => "at_bkw1",
        Level::Sheet => "at_bkw2",
        Level::Page => "at_bkw3",
    }
}

/// One API record in wire format
pub fn record(id: &str, parent: Option<&str>, image: Option<u64>) -> Value {
    json!({
        "id": id,
        "signature": format!("Sig {id}"),
        "attributes": {
            "parent": parent,
            "imagedigital": image,
        }
    })
}

/// A level document wrapping `records`
pub fn document(records: Vec<Value>) -> Value {
    json!({ "result": records })
}

/// Serve `doc` for one level endpoint
pub async fn mount_level(server: &MockServer, level: Level, doc: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/nodes/{}", level_code(level))))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc))
        .mount(server)
        .await;
}

/// Serve an error status for one level endpoint
pub async fn mount_level_status(server: &MockServer, level: Level, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/nodes/{}", level_code(level))))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Serve [`IMAGE_BYTES`] for one hex id, expecting exactly `times` requests
pub async fn mount_image(server: &MockServer, hex: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{hex}/working")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES.to_vec()))
        .expect(times)
        .mount(server)
        .await;
}

/// Serve an error status for one hex id
pub async fn mount_image_status(server: &MockServer, hex: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/{hex}/working")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// One Person, one Letter, one Sheet, two Pages (image 255 and none)
pub async fn mount_single_sheet(server: &MockServer) {
    mount_level(server, Level::Person, document(vec![record("P1", None, None)])).await;
    mount_level(
        server,
        Level::Letter,
        document(vec![record("L1", Some("P1"), None)]),
    )
    .await;
    mount_level(
        server,
        Level::Sheet,
        document(vec![record("S1", Some("L1"), None)]),
    )
    .await;
    mount_level(
        server,
        Level::Page,
        document(vec![
            record("A", Some("S1"), Some(255)),
            record("B", Some("S1"), None),
        ]),
    )
    .await;
}

/// Every file below `root`, relative and sorted
pub fn files_under(root: &Path) -> Vec<String> {
    if !root.exists() {
        return Vec::new();
    }
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// Parse a CSV file into its header and records
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("csv file should exist");
    let headers = reader
        .headers()
        .expect("csv header")
        .iter()
        .map(str::to_string)
        .collect();
    let records = reader
        .records()
        .map(|r| r.expect("csv record").iter().map(str::to_string).collect())
        .collect();
    (headers, records)
}
