//! File postprocessors
//!
//! File-to-file transforms applied to every generated file after its jenny
//! ran, whichever jenny produced it.

use super::fs::File;

/// A transform over one generated file
pub type Postprocessor = Box<dyn Fn(File) -> anyhow::Result<File> + Send + Sync>;

/// Line comment prefix for a file extension; `None` when the format has no
/// comments (JSON) or is unknown
fn comment_prefix(extension: Option<&str>) -> Option<&'static str> {
    match extension? {
        "rs" | "ts" | "tsx" | "js" | "go" | "cue" | "proto" => Some("//"),
        "py" | "sh" | "toml" | "yaml" | "yml" => Some("#"),
        _ => None,
    }
}

/// Prepend `text` as a comment in the syntax of each file's language.
/// JSON and unknown formats pass through untouched.
pub fn header_comment(text: impl Into<String>) -> Postprocessor {
    let text = text.into();
    Box::new(move |mut file: File| -> anyhow::Result<File> {
        let Some(prefix) = comment_prefix(file.extension()) else {
            return Ok(file);
        };

        let mut header = String::new();
        for line in text.lines() {
            if line.is_empty() {
                header.push_str(prefix);
            } else {
                header.push_str(&format!("{} {}", prefix, line));
            }
            header.push('\n');
        }
        header.push('\n');

        let mut data = header.into_bytes();
        data.extend_from_slice(&file.data);
        file.data = data;
        Ok(file)
    })
}

/// End every non-empty file with exactly one newline
pub fn ensure_trailing_newline() -> Postprocessor {
    Box::new(|mut file: File| -> anyhow::Result<File> {
        if file.data.is_empty() {
            return Ok(file);
        }
        while file.data.last() == Some(&b'\n') {
            file.data.pop();
        }
        file.data.push(b'\n');
        Ok(file)
    })
}

/// Move every file under `prefix`
pub fn prefix_path(prefix: impl Into<String>) -> Postprocessor {
    let prefix = prefix.into().trim_end_matches('/').to_string();
    Box::new(move |mut file: File| -> anyhow::Result<File> {
        if !prefix.is_empty() {
            file.path = format!("{}/{}", prefix, file.path);
        }
        Ok(file)
    })
}

/// Remove `prefix` from the start of every path that has it
pub fn strip_prefix(prefix: impl Into<String>) -> Postprocessor {
    let prefix = format!("{}/", prefix.into().trim_end_matches('/'));
    Box::new(move |mut file: File| -> anyhow::Result<File> {
        if let Some(rest) = file.path.strip_prefix(&prefix) {
            file.path = rest.to_string();
        }
        Ok(file)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_by_language() {
        let header = header_comment("Code generated by kindgen. DO NOT EDIT.");

        let rs = header(File::new("rust/a.gen.rs", "pub struct A;\n", "j")).unwrap();
        assert_eq!(rs.text(), "// Code generated by kindgen. DO NOT EDIT.\n\npub struct A;\n");

        let yaml = header(File::new("a.yaml", "a: 1\n", "j")).unwrap();
        assert!(yaml.text().starts_with("# Code generated"));

        let json = header(File::new("a.json", "{}\n", "j")).unwrap();
        assert_eq!(json.text(), "{}\n");
    }

    #[test]
    fn test_trailing_newline() {
        let p = ensure_trailing_newline();
        assert_eq!(p(File::new("a", "x", "j")).unwrap().data, b"x\n");
        assert_eq!(p(File::new("a", "x\n\n\n", "j")).unwrap().data, b"x\n");
        assert_eq!(p(File::new("a", "", "j")).unwrap().data, b"");
    }

    #[test]
    fn test_path_prefixes() {
        let add = prefix_path("public/app/");
        let strip = strip_prefix("public/app");
        let file = add(File::new("ts/a.ts", "", "j")).unwrap();
        assert_eq!(file.path, "public/app/ts/a.ts");
        assert_eq!(strip(file).unwrap().path, "ts/a.ts");
        assert_eq!(strip_prefix("other")(File::new("ts/a.ts", "", "j")).unwrap().path, "ts/a.ts");
    }
}
