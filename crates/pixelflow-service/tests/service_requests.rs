//! Request handling against a directory-backed store.

use pixelflow_core::codec::{self, OutputFormat};
use pixelflow_core::{FsStore, ImageStore, RasterImage};
use pixelflow_service::{ImageService, Reply, ServiceConfig};
use rayon::prelude::*;
use serde_json::{json, Value};

fn checker(size: u32) -> RasterImage {
    let mut img = RasterImage::filled(size, size, [0, 0, 0]);
    for y in 0..size {
        for x in 0..size {
            if (x / 4 + y / 4) % 2 == 0 {
                img.put(x, y, [250, 250, 250]);
            }
        }
    }
    img
}

fn service(dir: &std::path::Path) -> ImageService<FsStore> {
    let config = ServiceConfig::from_toml_str(&format!(
        "[files]\nstorage_dir = {:?}\n",
        dir.display().to_string()
    ))
    .unwrap();
    let store = FsStore::open(&config.files.storage_dir).unwrap();
    ImageService::new(&config, store)
}

fn to_json(reply: &Reply) -> Value {
    serde_json::to_value(reply).unwrap()
}

#[test]
fn process_request_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let png = codec::encode(&checker(16), OutputFormat::Png).unwrap();

    let reply = svc.handle_json(json!({
        "command": "process",
        "image": codec::to_data_uri(&png, OutputFormat::Png),
        "operations": [
            {"type": "morphological", "params": {"operation": "dilate", "kernel_size": 3}},
            {"type": "color_transformation", "method": "gamma", "params": {"gamma": "0.5"}},
            {"params": {"threshold": 10}}
        ]
    }));
    let value = to_json(&reply);
    assert_eq!(value["status"], "success", "{value}");
    assert_eq!(value["steps"][0]["status"], "applied");
    assert_eq!(value["steps"][1]["status"], "applied");
    assert_eq!(value["steps"][2]["status"], "skipped");
    assert_eq!(value["steps"][2]["kind"], "invalid_parameter");

    let uri = value["image"].as_str().unwrap();
    let out = codec::decode_base64(uri).unwrap();
    assert_eq!(out.dimensions(), (16, 16));
}

#[test]
fn file_transforms_write_into_storage_dir() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let png = codec::encode(&checker(32), OutputFormat::Png).unwrap();
    svc.files().store().write("board.png", &png).unwrap();

    let reply = svc.handle_json(json!({
        "command": "resize", "key": "board.png",
        "mode": "percentage", "percentage": 25, "format": "png"
    }));
    let value = to_json(&reply);
    assert_eq!(value["filename"], "resize_board.png");
    assert_eq!((value["width"].as_u64(), value["height"].as_u64()), (Some(8), Some(8)));
    assert!(value["resized_size"].as_f64().unwrap() > 0.0);
    assert!(dir.path().join("resize_board.png").is_file());

    let reply = svc.handle_json(json!({"command": "convert", "key": "board.png"}));
    let value = to_json(&reply);
    let bytes = codec::decode_base64(value["image"].as_str().unwrap()).unwrap();
    assert_eq!(bytes.dimensions(), (32, 32));
    assert_eq!(value["filename"], "convert_board.jpg");
}

#[test]
fn escaping_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let reply = svc.handle_json(json!({"command": "compress", "key": "../board.png"}));
    assert_eq!(to_json(&reply)["kind"], "invalid_parameter");
}

#[test]
fn batch_requests_share_one_service() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let png = codec::encode(&checker(24), OutputFormat::Png).unwrap();
    svc.files().store().write("a.png", &png).unwrap();
    let image = codec::to_base64(&png);

    let requests: Vec<Value> = (0..12)
        .map(|i| match i % 4 {
            0 => json!({"command": "health"}),
            1 => json!({"command": "compress", "key": "a.png", "quality": 50}),
            2 => json!({"command": "process", "image": image, "operations": [{"type": "edge_detection"}]}),
            _ => json!({"command": "crop", "key": "a.png", "left": 0, "top": 0, "right": 12, "bottom": 12}),
        })
        .collect();

    let replies: Vec<Reply> = requests
        .into_par_iter()
        .map(|request| svc.handle_json(request))
        .collect();
    assert!(replies.iter().all(Reply::is_success));
    assert!(dir.path().join("crop_a.png").is_file());
}

#[test]
fn bad_requests_in_a_batch_fail_alone() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let png = codec::encode(&checker(8), OutputFormat::Png).unwrap();
    svc.files().store().write("a.png", &png).unwrap();

    let requests = vec![
        json!({"command": "resize", "key": "a.png", "mode": "percentage", "percentage": 1e12}),
        json!({"command": "process", "image": codec::to_base64(&png), "operations": [
            {"type": "geometric", "method": "resize", "params": {"width": 16384, "height": 16384}},
            {"type": "threshold", "params": null},
            {"type": "threshold", "params": {"method": "otsu"}}
        ]}),
        json!({"command": "health"}),
    ];
    let replies: Vec<Value> = requests
        .into_par_iter()
        .map(|request| to_json(&svc.handle_json(request)))
        .collect();

    assert_eq!(replies[0]["kind"], "invalid_parameter");
    assert!(!dir.path().join("resize_a.jpg").exists());

    let steps = &replies[1]["steps"];
    assert_eq!(replies[1]["status"], "success");
    assert_eq!(steps[0]["kind"], "invalid_parameter");
    assert_eq!(steps[1]["kind"], "invalid_parameter");
    assert_eq!(steps[2]["status"], "applied");
    assert_eq!(replies[1]["width"], 8);

    assert_eq!(replies[2]["status"], "success");
}
