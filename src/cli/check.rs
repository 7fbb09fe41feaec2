use crate::config::load_config;
use crate::rule::load_rules;
use crate::source::resolve_paths;
use std::io::Write;
use std::path::Path;

/// Validate the config, compile every rule and list the files that would be
/// tailed. Returns `false` when any rule had to be dropped.
pub fn check(config_path: &Path, out: &mut impl Write) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    writeln!(out, "config: {}", config_path.display())?;

    if let Err(e) = config.input.filter_regex() {
        writeln!(out, "filter: ignored, does not compile: {}", e)?;
    }
    let filter = config.input.include_filter();

    let paths = resolve_paths(&config.input.files, &config.input.directories, filter.as_ref());
    writeln!(out, "files ({}):", paths.len())?;
    for path in &paths {
        let marker = if path.is_file() { "" } else { " (missing)" };
        writeln!(out, "  {}{}", path.display(), marker)?;
    }

    let loaded = load_rules(&config.events);
    writeln!(out, "rules ({}):", loaded.rules.len())?;
    for rule in &loaded.rules {
        writeln!(
            out,
            "  {}: /{}/ -> event_type={} channel={}",
            rule.name(),
            rule.pattern(),
            rule.event_type(),
            rule.channel()
        )?;
    }

    if !loaded.rejected.is_empty() {
        writeln!(out, "rejected ({}):", loaded.rejected.len())?;
        for (name, error) in &loaded.rejected {
            writeln!(out, "  {}: {}", name, error)?;
        }
    }

    Ok(loaded.rejected.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_check_reports_rules_and_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("app.log"), "").unwrap();
        fs::write(temp_dir.path().join("login.tpl"), "{{ groups.1 }} logged in").unwrap();
        let config_path = temp_dir.path().join("config.yml");
        fs::write(
            &config_path,
            r#"
input:
  files: [app.log]
events:
  login:
    src: 'LOGIN user=(\w+)'
    dest: login.tpl
    event_type: user_login
    channel_name: auth
  broken:
    src: '(oops'
    dest: login.tpl
"#,
        )
        .unwrap();

        let mut out = Vec::new();
        let ok = check(&config_path, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(!ok);
        assert!(out.contains("app.log"));
        assert!(out.contains("login: /LOGIN user=(\\w+)/ -> event_type=user_login channel=auth"));
        assert!(out.contains("rejected (1):"));
        assert!(out.contains("broken"));
    }
}
