use std::collections::HashMap;

/// Static name -> severity corrections for findings the scanner is known to
/// over- or under-rate. Built once at startup and shared by reference; names
/// not listed here keep the scanner-reported severity verbatim.
pub struct SeverityOverrides {
    map: HashMap<&'static str, &'static str>,
}

pub const UNKNOWN_SEVERITY: &str = "Unknown";

impl Default for SeverityOverrides {
    fn default() -> Self {
        let map = HashMap::from([
            ("Strict-Transport-Security Header Not Set", "Low"),
            ("X-Content-Type-Options Header Missing", "Low"),
            ("Content Security Policy (CSP) Header Not Set", "Medium"),
            ("Missing Anti-clickjacking Header", "Medium"),
            ("Cookie No HttpOnly Flag", "Low"),
            ("Cookie Without Secure Flag", "Low"),
            ("Cookie with SameSite Attribute None", "Low"),
            ("Cross-Domain JavaScript Source File Inclusion", "Low"),
            ("Secure Pages Include Mixed Content", "Medium"),
            ("Private IP Disclosure", "Low"),
            ("X-Powered-By Header Information Leak", "Low"),
            (
                "Server Leaks Version Information via \"Server\" HTTP Response Header Field",
                "Low",
            ),
            ("Permissions Policy Header Not Set", "Low"),
            ("Re-examine Cache-control Directives", "Informational"),
            ("Timestamp Disclosure - Unix", "Informational"),
        ]);
        Self { map }
    }
}

impl SeverityOverrides {
    /// Override severity when the finding name is known, otherwise keep the
    /// upstream value. Missing or empty upstream severity becomes "Unknown".
    pub fn normalize(&self, name: &str, upstream: Option<&str>) -> String {
        if let Some(sev) = self.map.get(name) {
            return (*sev).to_string();
        }
        match upstream {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => UNKNOWN_SEVERITY.to_string(),
        }
    }
}
