use serde::Deserialize;
use tokio::process::Command;

use super::SubdomainEnumerator;
use crate::error::StageError;

/// Shells out to `subfinder` and parses its JSON-lines output.
pub struct SubfinderEnumerator;

#[derive(Deserialize)]
struct SubfinderRecord {
    host: String,
}

#[async_trait::async_trait]
impl SubdomainEnumerator for SubfinderEnumerator {
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>, StageError> {
        let output = Command::new("subfinder")
            .args(["-d", domain, "-oJ", "-silent"])
            .output()
            .await
            .map_err(|e| StageError::Enumeration(format!("failed to run subfinder: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StageError::Enumeration(format!(
                "subfinder exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_hosts(&stdout))
    }
}

/// One JSON object per line, e.g. `{"host":"api.example.com","source":"crtsh"}`.
/// Blank or malformed lines are skipped rather than failing the whole run.
fn parse_hosts(stdout: &str) -> Vec<String> {
    let mut hosts = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SubfinderRecord>(line) {
            Ok(rec) => hosts.push(rec.host),
            Err(e) => tracing::warn!("skipping unparseable subfinder line: {}", e),
        }
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_lines() {
        let out = "{\"host\":\"api.example.com\",\"source\":\"crtsh\"}\n{\"host\":\"www.example.com\"}\n";
        let hosts = parse_hosts(out);
        assert_eq!(hosts, vec!["api.example.com", "www.example.com"]);
    }

    #[test]
    fn skips_blank_and_malformed_lines() {
        let out = "\n{\"host\":\"a.example.com\"}\nnot json at all\n   \n";
        let hosts = parse_hosts(out);
        assert_eq!(hosts, vec!["a.example.com"]);
    }

    #[test]
    fn empty_output_is_empty_set() {
        assert!(parse_hosts("").is_empty());
    }
}
