use std::time::Duration;

use anyhow::{Context, Error};

use crate::{dependencies::Dependency, exe::RunWithDeadline};

/// Looks up `fqdn` with `dig +short`. `Ok(None)` means the lookup ran but
/// produced no usable address.
pub fn short(fqdn: &str, deadline: Duration) -> Result<Option<String>, Error> {
    let output = Dependency::Dig
        .cmd()
        .arg("+short")
        .arg(fqdn)
        .output_within(deadline)
        .with_context(|| format!("Failed to look up {fqdn}"))?;

    Ok(parse_short(&output))
}

// dig prefixes diagnostics with ';'. A CNAME chain prints intermediate
// names first and the address last, so take the last answer line.
fn parse_short(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'))
        .last()
        .map(str::to_string)
}
