use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread")]
async fn test_sample_writes_both_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sample/saxon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "xml": "<Invoice><ID>SAXON-1</ID></Invoice>",
            "xslt": "<xsl:stylesheet version=\"3.0\"/>",
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("sample");

    cargo_bin_cmd!("xstudio")
        .env("XSTUDIO_HOME", dir.path())
        .env_remove("RUST_LOG")
        .args(["--service-url", &server.uri()])
        .arg("sample")
        .arg("--dir")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let mut names: Vec<String> = fs::read_dir(&target)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    let xml = names.iter().find(|n| n.ends_with(".xml")).unwrap();
    assert!(fs::read_to_string(target.join(xml)).unwrap().contains("SAXON-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sample_missing_on_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sample/saxon"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "ok": false,
            "message": "Saxon sample files not found on server.",
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();

    cargo_bin_cmd!("xstudio")
        .env("XSTUDIO_HOME", dir.path())
        .env_remove("RUST_LOG")
        .args(["--service-url", &server.uri()])
        .arg("sample")
        .arg("--dir")
        .arg(dir.path().join("sample"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Saxon sample files not found on server."));
}

#[test]
fn test_export_copies_with_timestamped_name() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("draft.xslt");
    fs::write(&source, "<xsl:stylesheet/>").unwrap();
    let out = dir.path().join("exports");

    cargo_bin_cmd!("xstudio")
        .env("XSTUDIO_HOME", dir.path())
        .arg("export")
        .arg("--xslt")
        .arg(&source)
        .arg("--dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported XSLT to"));

    let entries: Vec<_> = fs::read_dir(&out).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(entries.len(), 1);
    let name = entries[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("stylesheet_"), "{name}");
    assert!(name.ends_with(".xslt"), "{name}");
    assert_eq!(fs::read_to_string(&entries[0]).unwrap(), "<xsl:stylesheet/>");
}

#[test]
fn test_export_requires_one_source() {
    cargo_bin_cmd!("xstudio")
        .args(["export", "--dir", "."])
        .assert()
        .failure();

    cargo_bin_cmd!("xstudio")
        .args(["export", "--xml", "a.xml", "--html", "b.html"])
        .assert()
        .failure();
}

const STYLESHEET: &str = "<xsl:stylesheet version=\"1.0\" xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">\n<xsl:template match=\"/\"><body/></xsl:template>\n</xsl:stylesheet>";

#[test]
fn test_insert_image_inlines_svg_at_line() {
    let dir = TempDir::new().unwrap();
    let xslt = dir.path().join("style.xslt");
    let svg = dir.path().join("logo.svg");
    fs::write(&xslt, STYLESHEET).unwrap();
    fs::write(&svg, "<svg width=\"8\"/>\n").unwrap();

    cargo_bin_cmd!("xstudio")
        .env("XSTUDIO_HOME", dir.path())
        .env_remove("RUST_LOG")
        .arg("insert-image")
        .arg("--xslt")
        .arg(&xslt)
        .arg("--image")
        .arg(&svg)
        .args(["--line", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Inserted inline SVG into XSLT."));

    let text = fs::read_to_string(&xslt).unwrap();
    assert!(text.contains(
        "Transform\">\n\n<!-- Inline SVG inserted -->\n<svg width=\"8\"/>\n<xsl:template match=\"/\">"
    ));
}

#[test]
fn test_insert_image_appends_base64_data_uri() {
    let dir = TempDir::new().unwrap();
    let xslt = dir.path().join("style.xslt");
    let png = dir.path().join("dot.png");
    fs::write(&xslt, STYLESHEET).unwrap();
    fs::write(&png, [0x89, b'P', b'N', b'G']).unwrap();

    cargo_bin_cmd!("xstudio")
        .env("XSTUDIO_HOME", dir.path())
        .env_remove("RUST_LOG")
        .arg("insert-image")
        .arg("--xslt")
        .arg(&xslt)
        .arg("--image")
        .arg(&png)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Inserted Base64 data URI image into XSLT.",
        ));

    let text = fs::read_to_string(&xslt).unwrap();
    assert!(text.ends_with(
        "</xsl:stylesheet>\n<!-- Image inserted via helper -->\n<img src=\"data:image/png;base64,iVBORw==\" alt=\"Embedded image\" />\n"
    ));
}

#[test]
fn test_insert_image_rejects_non_text_svg() {
    let dir = TempDir::new().unwrap();
    let xslt = dir.path().join("style.xslt");
    let svg = dir.path().join("bad.svg");
    fs::write(&xslt, STYLESHEET).unwrap();
    fs::write(&svg, [0xff, 0xfe, 0x00]).unwrap();

    cargo_bin_cmd!("xstudio")
        .env("XSTUDIO_HOME", dir.path())
        .env_remove("RUST_LOG")
        .arg("insert-image")
        .arg("--xslt")
        .arg(&xslt)
        .arg("--image")
        .arg(&svg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not insert image: bad.svg"));

    assert_eq!(fs::read_to_string(&xslt).unwrap(), STYLESHEET);
}
