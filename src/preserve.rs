use bosun_api::constants::{BAREMETAL_KEY, BAREMETAL_MARKER};
use regex::Regex;

/// Extracts the manually maintained bare metal section from a previously
/// generated vars file.
///
/// The section is recognized structurally, not by keyword alone: the
/// `# Bare metal workers` comment, any further comment lines, the
/// `baremetal_workers:` key at column zero, then every following line that
/// is blank or indented. The scan stops at the next top-level key so the
/// trailing settings are never swallowed. The captured text is returned
/// verbatim apart from stripped trailing whitespace; `None` covers both a
/// missing section and a block introducer with no entries under it.
pub fn extract_baremetal_section(contents: &str) -> Option<String> {
    let lines: Vec<&str> = contents.lines().collect();

    (0..lines.len())
        .filter(|&start| lines[start].starts_with(BAREMETAL_MARKER))
        .find_map(|start| capture_section(&lines, start))
}

fn capture_section(lines: &[&str], start: usize) -> Option<String> {
    let mut index = start + 1;

    while index < lines.len() && lines[index].starts_with('#') {
        index += 1;
    }

    if lines.get(index).copied() != Some(BAREMETAL_KEY) {
        return None;
    }
    index += 1;

    let body = index;
    while index < lines.len() && (is_blank(lines[index]) || is_indented(lines[index])) {
        index += 1;
    }

    // A bare key with nothing under it is not a section worth preserving
    if !lines[body..index]
        .iter()
        .any(|line| is_indented(line) && !is_blank(line))
    {
        return None;
    }

    Some(lines[start..index].join("\n").trim_end().to_string())
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// Pulls the `ip:` scalar out of a preserved section. This and
/// `find_hostname` are the only fields ever parsed out of preserved text;
/// everything else stays opaque.
pub fn find_ip(section: &str) -> Option<String> {
    let re = Regex::new(r#"ip:\s*["']?(\d+\.\d+\.\d+\.\d+)"#).ok()?;
    Some(re.captures(section)?[1].to_string())
}

/// Pulls the `hostname:` scalar out of a preserved section.
pub fn find_hostname(section: &str) -> Option<String> {
    let re = Regex::new(r#"hostname:\s*["']?([^"'\s]+)"#).ok()?;
    Some(re.captures(section)?[1].to_string())
}
