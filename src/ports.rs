use anyhow::{bail, Context, Result};
use std::collections::HashSet;

/// First port the helper binds when it is free.
pub const CANONICAL_PORT: u16 = 18731;

/// Number of sequential ports the helper falls back to.
pub const PORT_SPAN: u16 = 10;

/// Parse a port list into a deduplicated list of TCP ports (1..=65535).
///
/// Supported tokens, separated by commas, whitespace or newlines:
/// - single port number: `18731`
/// - inclusive range: `18731-18740`
/// - comments: everything after `#` on a line is ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        // `18731 - 18740` is one range, not three tokens
        let line = line.split('-').map(str::trim).collect::<Vec<_>>().join("-");

        for token in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if let Some((a, b)) = token.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port_str(token)
                .with_context(|| format!("line {line_no}: invalid port value: {token}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// The ports the helper may listen on, canonical port first.
pub fn default_ports() -> Vec<u16> {
    (CANONICAL_PORT..CANONICAL_PORT + PORT_SPAN).collect()
}

/// Drop repeated ports, keeping the first occurrence of each.
pub fn dedup_ports(ports: &[u16]) -> Vec<u16> {
    let mut seen = HashSet::with_capacity(ports.len());
    ports.iter().copied().filter(|p| seen.insert(*p)).collect()
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_separated() {
        let ports = parse_ports_str("18731, 18735,18733").unwrap();
        assert_eq!(ports, vec![18731, 18735, 18733]);
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let input = "18731-18733\n9000\n18732\n";
        let ports = parse_ports_str(input).unwrap();
        assert_eq!(ports, vec![18731, 18732, 18733, 9000]);
    }

    #[test]
    fn parse_with_comments() {
        let input = r#"
            # helper range
            18731  # canonical
            18740-18741
        "#;
        assert_eq!(parse_ports_str(input).unwrap(), vec![18731, 18740, 18741]);
    }

    #[test]
    fn spaces_around_range_dash() {
        assert_eq!(
            parse_ports_str("18731 - 18733, 9000").unwrap(),
            vec![18731, 18732, 18733, 9000]
        );
        assert_eq!(parse_ports_str("80 90 -91").unwrap(), vec![80, 90, 91]);
    }

    #[test]
    fn out_of_range_errors() {
        assert!(parse_ports_str("70000").is_err());
        assert!(parse_ports_str("0").is_err());
        assert!(parse_ports_str("18740-18731").is_err());
    }

    #[test]
    fn default_is_ten_sequential_ports() {
        let d = default_ports();
        assert_eq!(d.len(), 10);
        assert_eq!(d.first(), Some(&18731));
        assert_eq!(d.last(), Some(&18740));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        assert_eq!(dedup_ports(&[5, 3, 5, 1, 3]), vec![5, 3, 1]);
    }
}
