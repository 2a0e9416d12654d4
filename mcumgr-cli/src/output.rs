//! Human readable rendering of responses

use data_encoding::HEXLOWER;
use mcumgr_proto::catalog::ImageState;
use mcumgr_proto::codec::{Map, Value};

pub fn image_state(state: &ImageState) -> String {
    let split = state
        .split_status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut out = format!("Images (split status): {split}:\n");
    for image in &state.images {
        if let Some(n) = image.image {
            out.push_str(&format!("  image: {n}\n"));
        }
        out.push_str(&format!("  slot: {}\n", image.slot));
        out.push_str(&format!("  hash: {}\n", HEXLOWER.encode(&image.hash)));
        out.push_str(&format!("  version: {}\n", image.version));
        out.push_str(&format!("  flags: {}\n", image.flags().join(", ")));
        out.push('\n');
    }
    out
}

/// One `key: value` line per entry, byte strings in hex.
pub fn map(map: &Map) -> String {
    if map.is_empty() {
        return "{}".to_string();
    }

    map.iter()
        .map(|(k, v)| format!("{k}: {}", value(v)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn value(v: &Value) -> String {
    match v {
        Value::Bytes(b) => HEXLOWER.encode(b),
        Value::Text(s) => format!("{s:?}"),
        Value::Integer(i) => i128::from(*i).to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Float(f) => f.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", value(k), value(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tag(tag, inner) => format!("{tag}({})", value(inner)),
        other => format!("{other:?}"),
    }
}
