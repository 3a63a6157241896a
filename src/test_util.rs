pub(crate) fn volume_json(img_paths: &[&str]) -> serde_json::Value {
    let pages: Vec<serde_json::Value> = img_paths
        .iter()
        .enumerate()
        .map(|(idx, img_path)| {
            let offset = idx as f64 * 10.0;
            serde_json::json!({
                "version": "0.2.1",
                "img_width": 1000,
                "img_height": 1500,
                "img_path": img_path,
                "blocks": [{
                    "box": [100.0 + offset, 100.0, 300.0 + offset, 500.0],
                    "vertical": true,
                    "font_size": 28.0,
                    "lines_coords": [],
                    "lines": ["ねこ", "です"]
                }]
            })
        })
        .collect();
    serde_json::json!({
        "version": "0.2.1",
        "title": "Neko",
        "title_uuid": "title-uuid",
        "volume": "Neko 01",
        "volume_uuid": "volume-uuid",
        "pages": pages
    })
}

/// Writes `volume.mokuro` plus a placeholder file per page into `dir`.
pub(crate) fn write_volume(dir: &std::path::Path, img_paths: &[&str]) {
    std::fs::create_dir_all(dir).expect("create volume dir");
    let json = volume_json(img_paths);
    std::fs::write(
        dir.join("volume.mokuro"),
        serde_json::to_vec_pretty(&json).expect("serialize volume"),
    )
    .expect("write sidecar");
    for img_path in img_paths {
        let path = dir.join(img_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create image dir");
        }
        std::fs::write(&path, b"not an image").expect("write image");
    }
}
