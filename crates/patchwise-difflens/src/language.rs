use std::path::Path;

/// Name used when the extension is not recognized.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

const EXTENSIONS: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("java", "java"),
    ("c", "c"),
    ("cpp", "c++"),
    ("cs", "c#"),
    ("go", "go"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("kt", "kotlin"),
    ("rs", "rust"),
    ("scala", "scala"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("html", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("sql", "sql"),
];

/// Detect a file's language from its extension, case-insensitively.
///
/// The returned names are the keys used under `language_specific_rules`
/// in the configuration file.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use patchwise_difflens::language::detect_language;
///
/// assert_eq!(detect_language(Path::new("src/app.TSX")), "typescript");
/// assert_eq!(detect_language(Path::new("Makefile")), "unknown");
/// ```
pub fn detect_language(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return UNKNOWN_LANGUAGE;
    };
    let ext = ext.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
        .unwrap_or(UNKNOWN_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_extensions() {
        assert_eq!(detect_language(Path::new("foo.py")), "python");
        assert_eq!(detect_language(Path::new("web/index.jsx")), "javascript");
        assert_eq!(detect_language(Path::new("a/b/c.rs")), "rust");
        assert_eq!(detect_language(Path::new("deploy.bash")), "shell");
        assert_eq!(detect_language(Path::new("Main.cpp")), "c++");
        assert_eq!(detect_language(Path::new("Program.cs")), "c#");
    }

    #[test]
    fn unknown_and_dotfiles() {
        assert_eq!(detect_language(Path::new("README.md")), UNKNOWN_LANGUAGE);
        assert_eq!(detect_language(Path::new(".bashrc")), UNKNOWN_LANGUAGE);
        assert_eq!(detect_language(Path::new("Dockerfile")), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn only_last_extension_counts() {
        assert_eq!(detect_language(Path::new("bundle.min.js")), "javascript");
        assert_eq!(detect_language(Path::new("query.sql.txt")), UNKNOWN_LANGUAGE);
    }
}
