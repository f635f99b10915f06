use serde_json::{json, Value};

const PALETTE_LIGHT: [&str; 6] = [
    "#2563eb", "#a855f7", "#14b8a6", "#f97316", "#facc15", "#ec4899",
];
const PALETTE_DARK: [&str; 6] = [
    "#93c5fd", "#c4b5fd", "#5eead4", "#fbbf24", "#fda4af", "#f87171",
];

/// Category count past which axis labels start overlapping and get rotated.
const WIDE_AXIS_THRESHOLD: usize = 8;

fn palette(dark_mode: bool) -> Value {
    let colors = if dark_mode { PALETTE_DARK } else { PALETTE_LIGHT };
    Value::Array(colors.iter().map(|color| json!(color)).collect())
}

fn category_count(option: &Value) -> usize {
    let axis = option.get("xAxis");
    let data = match axis {
        Some(Value::Array(axes)) => axes.first().and_then(|axis| axis.get("data")),
        Some(axis) => axis.get("data"),
        None => None,
    };
    data.and_then(Value::as_array).map(Vec::len).unwrap_or(0)
}

fn ensure_object<'a>(parent: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    parent
        .as_object_mut()
        .map(|object| object.entry(key.to_string()).or_insert_with(|| json!({})))
}

fn adjust_axis_labels(option: &mut Value) {
    let rotate = category_count(option) > WIDE_AXIS_THRESHOLD;
    let Some(axis) = option.get_mut("xAxis") else {
        return;
    };
    let axes: Vec<&mut Value> = match axis {
        Value::Array(axes) => axes.iter_mut().collect(),
        single => vec![single],
    };
    for axis in axes {
        if !axis.is_object() {
            continue;
        }
        if rotate {
            if let Some(label) = ensure_object(axis, "axisLabel").and_then(Value::as_object_mut) {
                label.entry("rotate".to_string()).or_insert(json!(30));
                label.entry("interval".to_string()).or_insert(json!(0));
            }
        }
    }
}

fn cap_bar_width(option: &mut Value) {
    let Some(series) = option.get_mut("series").and_then(Value::as_array_mut) else {
        return;
    };
    for entry in series {
        let is_bar = entry.get("type").and_then(Value::as_str) == Some("bar");
        if !is_bar {
            continue;
        }
        if let Some(entry) = entry.as_object_mut() {
            entry.entry("barMaxWidth".to_string()).or_insert(json!(48));
        }
    }
}

/// Prepares a chart option for handoff to the renderer: must be a JSON
/// object; only generic layout fields are touched (palette, grid padding,
/// label rotation, bar width), never the chart type itself.
pub fn prepare_chart_option(raw: &Value, dark_mode: bool) -> Option<Value> {
    if !raw.is_object() {
        return None;
    }
    let mut option = raw.clone();

    if option.get("color").is_none() {
        option["color"] = palette(dark_mode);
    }

    let wide = category_count(&option) > WIDE_AXIS_THRESHOLD;
    if let Some(grid) = ensure_object(&mut option, "grid").and_then(Value::as_object_mut) {
        grid.entry("containLabel".to_string()).or_insert(json!(true));
        if wide {
            grid.entry("bottom".to_string()).or_insert(json!("18%"));
        }
    }

    adjust_axis_labels(&mut option);
    cap_bar_width(&mut option);
    Some(option)
}
