//! Parser for `kubectl ... -o custom-columns=... --no-headers` output.

use crate::Inventory;

/// Address placeholder kubectl prints when no load-balancer IP is assigned.
pub const UNASSIGNED_ADDRESS: &str = "<none>";

/// Parse tabular inventory output into a name → address map.
///
/// One record per line, exactly two whitespace-separated fields. Lines with
/// any other shape, and records whose address is still `<none>`, are skipped.
pub fn parse_inventory(output: &str) -> Inventory {
    output.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    let address = fields.next()?;
    if fields.next().is_some() || address == UNASSIGNED_ADDRESS {
        return None;
    }
    Some((name.to_string(), address.to_string()))
}
