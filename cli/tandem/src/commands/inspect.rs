//! `tandem inspect` — print a descriptor blob as text or JSON.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tandem_fdt::{Fdt, NodeId, PropValue};

/// Parse a flattened descriptor and print it.
pub fn run(input: &Path, export: Option<&str>) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let fdt =
        Fdt::from_bytes(&bytes).with_context(|| format!("parsing {}", input.display()))?;

    match export.unwrap_or("text") {
        "text" => print_tree(&fdt, input),
        "json" => {
            let doc = json!({
                "source": input.display().to_string(),
                "boot-cpu": fdt.boot_cpuid(),
                "nodes": fdt.node_count(),
                "root": node_json(&fdt, fdt.root()),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        other => bail!("unknown export format: '{other}'. Choose: text, json"),
    }
}

fn print_tree(fdt: &Fdt, input: &Path) -> Result<()> {
    println!(
        "=== Descriptor: {} ({} nodes) ===",
        input.display(),
        fdt.node_count()
    );
    print_node(fdt, fdt.root(), 0)
}

fn print_node(fdt: &Fdt, id: NodeId, depth: usize) -> Result<()> {
    let node = fdt.node(id)?;
    let indent = "  ".repeat(depth);
    let name = if node.name().is_empty() { "/" } else { node.name() };
    println!("{indent}{name} {{");
    for (prop, value) in node.properties() {
        match render(value) {
            Some(text) => println!("{indent}  {prop} = {text};"),
            None => println!("{indent}  {prop};"),
        }
    }
    for &child in fdt.children(id)? {
        print_node(fdt, child, depth + 1)?;
    }
    println!("{indent}}};");
    Ok(())
}

/// Render a value the way a source listing would. The wire format erases
/// types, so parsed values arrive as raw bytes and are decoded
/// heuristically: strings when they look like strings, cells when 4-byte
/// aligned, a byte list otherwise.
fn render(value: &PropValue) -> Option<String> {
    match value {
        PropValue::Empty => None,
        PropValue::Cell(v) => Some(format!("<{v:#x}>")),
        PropValue::Cells(vs) => Some(cells_text(vs)),
        PropValue::Str(s) => Some(format!("{s:?}")),
        PropValue::StrList(ss) => Some(quoted_list(ss)),
        PropValue::Bytes(b) => {
            if b.is_empty() {
                return None;
            }
            if let Some(strings) = decode_strings(b) {
                return Some(quoted_list(&strings));
            }
            match value.as_cells() {
                Some(vs) => Some(cells_text(&vs)),
                None => Some(format!(
                    "[{}]",
                    b.iter()
                        .map(|x| format!("{x:02x}"))
                        .collect::<Vec<_>>()
                        .join(" ")
                )),
            }
        }
    }
}

fn cells_text(cells: &[u32]) -> String {
    let body = cells
        .iter()
        .map(|c| format!("{c:#x}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<{body}>")
}

fn quoted_list(strings: &[String]) -> String {
    strings
        .iter()
        .map(|s| format!("{s:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bytes decode as strings when they are NUL-terminated, NUL-separated,
/// non-empty, and printable.
fn decode_strings(bytes: &[u8]) -> Option<Vec<String>> {
    if bytes.last() != Some(&0) {
        return None;
    }
    let mut out = Vec::new();
    for part in bytes[..bytes.len() - 1].split(|&b| b == 0) {
        let s = std::str::from_utf8(part).ok()?;
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            return None;
        }
        out.push(s.to_string());
    }
    Some(out)
}

fn node_json(fdt: &Fdt, id: NodeId) -> serde_json::Value {
    let Ok(node) = fdt.node(id) else {
        return serde_json::Value::Null;
    };
    let properties: serde_json::Map<String, serde_json::Value> = node
        .properties()
        .map(|(name, value)| (name.to_string(), value_json(value)))
        .collect();
    let children: Vec<serde_json::Value> = fdt
        .children(id)
        .map(|ids| ids.iter().map(|&c| node_json(fdt, c)).collect())
        .unwrap_or_default();
    json!({
        "name": if node.name().is_empty() { "/" } else { node.name() },
        "properties": properties,
        "children": children,
    })
}

fn value_json(value: &PropValue) -> serde_json::Value {
    match value {
        PropValue::Empty => json!(true),
        PropValue::Cell(v) => json!(v),
        PropValue::Cells(vs) => json!(vs),
        PropValue::Str(s) => json!(s),
        PropValue::StrList(ss) => json!(ss),
        PropValue::Bytes(b) => {
            if b.is_empty() {
                return json!(true);
            }
            if let Some(strings) = decode_strings(b) {
                if strings.len() == 1 {
                    return json!(strings[0]);
                }
                return json!(strings);
            }
            match value.as_cells() {
                Some(vs) => json!(vs),
                None => json!(b),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_typed_values() {
        assert_eq!(render(&PropValue::Empty), None);
        assert_eq!(render(&PropValue::Cell(2)), Some("<0x2>".into()));
        assert_eq!(
            render(&PropValue::Cells(vec![0, 0x9140_0000])),
            Some("<0x0 0x91400000>".into())
        );
        assert_eq!(
            render(&PropValue::Str("riscv".into())),
            Some("\"riscv\"".into())
        );
    }

    #[test]
    fn render_parsed_bytes() {
        // A NUL-terminated string round-trips as a string.
        assert_eq!(
            render(&PropValue::Bytes(b"uart0:115200n8\0".to_vec())),
            Some("\"uart0:115200n8\"".into())
        );
        // A string list stays a list.
        assert_eq!(
            render(&PropValue::Bytes(b"a\0bc\0".to_vec())),
            Some("\"a\", \"bc\"".into())
        );
        // Cell-shaped bytes render as cells, not as control characters.
        assert_eq!(
            render(&PropValue::Bytes(vec![0, 0, 0, 2])),
            Some("<0x2>".into())
        );
        // Unaligned non-text bytes fall back to a byte list.
        assert_eq!(
            render(&PropValue::Bytes(vec![0xde, 0xad, 0xbe])),
            Some("[de ad be]".into())
        );
    }

    #[test]
    fn decode_strings_rejects_non_text() {
        assert_eq!(decode_strings(&[0, 0, 0, 2]), None);
        assert_eq!(decode_strings(&[0, 0, 1, 0]), None);
        assert_eq!(decode_strings(b"no-terminator"), None);
        assert_eq!(
            decode_strings(b"ok\0").as_deref(),
            Some(&["ok".to_string()][..])
        );
    }

    #[test]
    fn json_view_decodes_values() {
        let mut fdt = Fdt::create_root();
        let chosen = fdt.add_node(fdt.root(), "chosen").unwrap();
        fdt.set_str(chosen, "bootargs", "quiet").unwrap();
        let doc = node_json(&fdt, fdt.root());
        assert_eq!(doc["name"], "/");
        assert_eq!(doc["properties"]["#address-cells"], 2);
        assert_eq!(doc["children"][0]["properties"]["bootargs"], "quiet");
    }
}
