use serde_json::json;
use studiomodel::{CurveStrategy, DecodeOptions, Model};

fn main() {
    env_logger::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut sequence: Option<String> = None;
    let mut options = DecodeOptions::default();

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--sequence" => {
                sequence = args.get(i + 1).cloned();
                i += 2;
            }
            "--span-walk" => {
                options.curve_strategy = CurveStrategy::SpanWalk;
                i += 1;
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let Some(path) = positional.first() else {
        eprintln!("usage: mdl_dump <model.mdl> [--sequence <label>] [--span-walk]");
        std::process::exit(2);
    };
    let bytes = std::fs::read(path).expect("read model");
    let model = Model::from_bytes_with_options(&bytes, &options).expect("decode model");

    let out = match sequence {
        Some(label) => {
            let (_, seq) = model
                .sequence(&label)
                .unwrap_or_else(|| panic!("missing sequence {label:?}"));
            serde_json::to_value(seq).expect("serialize sequence")
        }
        None => json!({
            "name": model.header.name,
            "bones": model
                .bones
                .iter()
                .map(|b| json!({ "name": b.name, "parent": b.parent }))
                .collect::<Vec<_>>(),
            "sequences": model
                .sequences
                .iter()
                .map(|s| json!({
                    "label": s.label,
                    "fps": s.fps,
                    "frames": s.frame_count(),
                    "duration": s.duration(),
                    "events": s.events.len(),
                }))
                .collect::<Vec<_>>(),
            "textures": model
                .textures
                .iter()
                .map(|t| json!({ "name": t.name, "width": t.width, "height": t.height }))
                .collect::<Vec<_>>(),
            "body_parts": model
                .body_parts
                .iter()
                .map(|p| json!({
                    "name": p.name,
                    "models": p
                        .models
                        .iter()
                        .map(|m| json!({
                            "name": m.name,
                            "vertices": m.vertices.len(),
                            "triangles": m.meshes.iter().map(|mesh| mesh.triangle_count).sum::<usize>(),
                        }))
                        .collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        }),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&out).expect("serialize summary")
    );
}
