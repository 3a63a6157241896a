use std::fs;
use std::path::{Path, PathBuf};

use mokuro_reader::{Config, run};
use serde_json::json;
use tempfile::{TempDir, tempdir};

struct Fixture {
    _root: TempDir,
    volume: PathBuf,
    base: PathBuf,
}

fn page(img_path: &str, blocks: usize) -> serde_json::Value {
    let blocks: Vec<serde_json::Value> = (0..blocks)
        .map(|idx| {
            let top = 100.0 + idx as f64 * 500.0;
            json!({
                "box": [100.0, top, 300.0, top + 400.0],
                "vertical": true,
                "font_size": 28.0,
                "lines_coords": [],
                "lines": ["ねこ", "です"]
            })
        })
        .collect();
    json!({
        "version": "0.2.1",
        "img_width": 1000,
        "img_height": 1500,
        "img_path": img_path,
        "blocks": blocks
    })
}

fn fixture() -> Fixture {
    let root = tempdir().expect("tempdir");
    let volume = root.path().join("Neko 01");
    let base = root.path().join("home");
    fs::create_dir_all(&volume).expect("create volume dir");

    // Object-keyed pages, stored out of order.
    let sidecar = json!({
        "version": "0.2.1",
        "title": "Neko",
        "title_uuid": "title-uuid",
        "volume": "Neko 01",
        "volume_uuid": "volume-uuid",
        "pages": {
            "b": page("003.jpg", 0),
            "a": page("002.jpg", 2),
            "c": page("001.jpg", 1)
        }
    });
    fs::write(
        volume.join("Neko 01.mokuro"),
        serde_json::to_vec_pretty(&sidecar).expect("serialize sidecar"),
    )
    .expect("write sidecar");
    for name in ["001.jpg", "002.jpg", "003.jpg"] {
        fs::write(volume.join(name), b"jpeg").expect("write page");
    }
    Fixture {
        _root: root,
        volume,
        base,
    }
}

fn config(fixture: &Fixture) -> Config {
    Config {
        folder: Some(fixture.volume.display().to_string()),
        base_dir: Some(fixture.base.clone()),
        ..Config::default()
    }
}

fn redact(output: &str, volume: &Path) -> String {
    output.replace(&volume.display().to_string(), "[volume]")
}

#[tokio::test]
async fn lists_pages_in_reading_order() {
    let fixture = fixture();
    let output = run(Config {
        list_pages: true,
        next: true,
        ..config(&fixture)
    })
    .await
    .unwrap();
    insta::assert_snapshot!(output, @r"
Neko / Neko 01
  001.jpg (1 blocks)
* 002.jpg (2 blocks)
  003.jpg (0 blocks)
");
}

#[tokio::test]
async fn resumes_where_the_last_run_stopped() {
    let fixture = fixture();
    run(Config {
        next: true,
        ..config(&fixture)
    })
    .await
    .unwrap();
    let output = run(Config {
        next: true,
        ..config(&fixture)
    })
    .await
    .unwrap();
    insta::assert_snapshot!(redact(&output, &fixture.volume), @"page 3/3: 003.jpg -> [volume]/003.jpg");

    let output = run(Config {
        next: true,
        ..config(&fixture)
    })
    .await
    .unwrap();
    insta::assert_snapshot!(redact(&output, &fixture.volume), @"page 3/3: 003.jpg -> [volume]/003.jpg");
}

#[tokio::test]
async fn tap_prints_block_text() {
    let fixture = fixture();
    let output = run(Config {
        page: Some("002".to_string()),
        tap: Some("100,350".to_string()),
        view: Some("500x750".to_string()),
        ..config(&fixture)
    })
    .await
    .unwrap();
    insta::assert_snapshot!(redact(&output, &fixture.volume), @r"
page 2/3: 002.jpg -> [volume]/002.jpg
ねこです
");

    let output = run(Config {
        tap: Some("450,20".to_string()),
        view: Some("500x750".to_string()),
        ..config(&fixture)
    })
    .await
    .unwrap();
    insta::assert_snapshot!(redact(&output, &fixture.volume), @r"
page 2/3: 002.jpg -> [volume]/002.jpg
no text at 450,20
");
}

#[tokio::test]
async fn missing_folder_is_reported() {
    let fixture = fixture();
    let err = run(Config {
        folder: Some(fixture.base.join("nowhere").display().to_string()),
        ..config(&fixture)
    })
    .await
    .unwrap_err();
    assert!(format!("{:#}", err).contains("failed to load volume"));
}
