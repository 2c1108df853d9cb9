//! # Config Renderer
//!
//! Renders the executor project file for one pass. Output depends only on the
//! resolved input and its fingerprint.

use crate::controller::fingerprint::Fingerprint;
use crate::controller::input::ResolvedInput;

/// Quote a value as an HCL string literal
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // template sequences are escaped by doubling the introducer
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render the executor configuration for `input`
#[must_use]
pub fn render(input: &ResolvedInput, fingerprint: &Fingerprint) -> String {
    let mut out = String::new();
    out.push_str(&format!("# fingerprint: {fingerprint}\n"));

    let remote = input.cloud.as_ref().and_then(|c| c.remote_dir.as_ref());

    if let Some(cloud) = &input.cloud {
        out.push_str("\natlas {\n  cloud {\n");
        out.push_str(&format!("    token = {}\n", quote(&cloud.token)));
        if !cloud.url.is_empty() {
            out.push_str(&format!("    url = {}\n", quote(&cloud.url)));
        }
        if !cloud.project.is_empty() {
            out.push_str(&format!("    project = {}\n", quote(&cloud.project)));
        }
        out.push_str("  }\n}\n");
    }

    if let Some(remote) = remote {
        out.push_str("\ndata \"remote_dir\" \"this\" {\n");
        out.push_str(&format!("  name = {}\n", quote(&remote.name)));
        if !remote.tag.is_empty() {
            out.push_str(&format!("  tag = {}\n", quote(&remote.tag)));
        }
        out.push_str("}\n");
    }

    out.push_str(&format!("\nenv {} {{\n", quote(&input.env_name)));
    out.push_str(&format!("  url = {}\n", quote(&input.url)));

    let dir = match (remote, input.migration_dir_url()) {
        (Some(_), _) => Some("data.remote_dir.this.url".to_string()),
        (None, Some(url)) => Some(quote(&url)),
        (None, None) => None,
    };
    if dir.is_some() || input.revisions_schema.is_some() {
        out.push_str("  migration {\n");
        if let Some(dir) = dir {
            out.push_str(&format!("    dir = {dir}\n"));
        }
        if let Some(schema) = &input.revisions_schema {
            out.push_str(&format!("    revisions_schema = {}\n", quote(schema)));
        }
        out.push_str("  }\n");
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::fingerprint::fingerprint;
    use crate::controller::input::CloudInput;
    use crate::crd::RemoteDir;

    #[test]
    fn test_render_url_only() {
        let input = ResolvedInput::with_url("kubernetes", "postgres://u:p@db:5432/app");
        let fp = fingerprint(&input).unwrap();
        let rendered = render(&input, &fp);

        assert_eq!(
            rendered,
            format!(
                "# fingerprint: {fp}\n\nenv \"kubernetes\" {{\n  url = \"postgres://u:p@db:5432/app\"\n}}\n"
            )
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let input = ResolvedInput::with_url("kubernetes", "mysql://root@db/app");
        let fp = fingerprint(&input).unwrap();
        assert_eq!(render(&input, &fp), render(&input, &fp));
    }

    #[test]
    fn test_render_remote_dir_with_cloud() {
        let mut input = ResolvedInput::with_url("prod", "postgres://db/app");
        input.revisions_schema = Some("atlas".to_string());
        input.cloud = Some(CloudInput {
            token: "tok".to_string(),
            url: "https://cloud.example".to_string(),
            project: "orders".to_string(),
            remote_dir: Some(RemoteDir {
                name: "orders".to_string(),
                tag: "v3".to_string(),
            }),
        });
        let fp = fingerprint(&input).unwrap();
        let rendered = render(&input, &fp);

        assert!(rendered.contains("    token = \"tok\"\n"));
        assert!(rendered.contains("data \"remote_dir\" \"this\" {\n  name = \"orders\"\n  tag = \"v3\"\n}"));
        assert!(rendered.contains("    dir = data.remote_dir.this.url\n"));
        assert!(rendered.contains("    revisions_schema = \"atlas\"\n"));
        assert!(rendered.contains("env \"prod\" {"));
    }

    #[test]
    fn test_render_full_document() {
        let mut input = ResolvedInput::with_url("prod", "postgres://db/app");
        input.revisions_schema = Some("atlas".to_string());
        input.cloud = Some(CloudInput {
            token: "tok".to_string(),
            url: "https://cloud.example".to_string(),
            project: "orders".to_string(),
            remote_dir: Some(RemoteDir {
                name: "orders".to_string(),
                tag: "v3".to_string(),
            }),
        });
        let fp = fingerprint(&input).unwrap();

        let expected = format!(
            "# fingerprint: {fp}\n\
             \n\
             atlas {{\n  cloud {{\n    token = \"tok\"\n    url = \"https://cloud.example\"\n    project = \"orders\"\n  }}\n}}\n\
             \n\
             data \"remote_dir\" \"this\" {{\n  name = \"orders\"\n  tag = \"v3\"\n}}\n\
             \n\
             env \"prod\" {{\n  url = \"postgres://db/app\"\n  migration {{\n    dir = data.remote_dir.this.url\n    revisions_schema = \"atlas\"\n  }}\n}}\n"
        );
        assert_eq!(render(&input, &fp), expected);
    }

    #[test]
    fn test_render_local_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut input = ResolvedInput::with_url("kubernetes", "sqlite://file.db");
        input.migration_dir = Some(
            crate::controller::resolver::MaterializedDir::create(
                root.path(),
                &std::collections::BTreeMap::from([("1.sql".to_string(), "x".to_string())]),
            )
            .unwrap(),
        );
        let fp = fingerprint(&input).unwrap();
        let rendered = render(&input, &fp);
        let expected_dir = input.migration_dir_url().unwrap();

        assert!(rendered.contains(&format!("    dir = \"{expected_dir}\"\n")));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(quote("${x} %{y} $z"), r#""$${x} %%{y} $z""#);
        assert_eq!(quote("line\nbreak"), r#""line\nbreak""#);
    }
}
