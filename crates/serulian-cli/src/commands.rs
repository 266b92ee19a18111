//! Command implementations.

use std::process::ExitCode;

use serulian_compiler::compiler::{CompileConfig, Compiler};
use serulian_compiler::loader::Library;

/// Parses a `alias=path` or `alias=scm:url` library declaration.
fn parse_library(declaration: &str) -> Result<Library, String> {
    let (alias, target) = declaration
        .split_once('=')
        .ok_or_else(|| format!("invalid library declaration '{declaration}'; expected alias=path"))?;

    if alias.is_empty() {
        return Err(format!("invalid library declaration '{declaration}': empty alias"));
    }

    let (is_scm, path_or_url) = match target.strip_prefix("scm:") {
        Some(url) => (true, url),
        None => (false, target),
    };
    if path_or_url.is_empty() {
        return Err(format!("invalid library declaration '{declaration}': empty path"));
    }

    Ok(Library {
        alias: alias.to_owned(),
        path_or_url: path_or_url.to_owned(),
        is_scm,
        kind: String::new(),
    })
}

pub fn build(
    entrypoint: String,
    library_declarations: Vec<String>,
    dev_directories: Vec<String>,
) -> ExitCode {
    let mut libraries = Vec::new();
    for declaration in &library_declarations {
        match parse_library(declaration) {
            Ok(library) => libraries.push(library),
            Err(message) => {
                eprintln!("error: {message}");
                return ExitCode::from(2);
            }
        }
    }

    let mut config = CompileConfig::for_entrypoint(entrypoint);
    config.libraries = libraries;
    config.vcs_development_directories = dev_directories;

    let result = Compiler::new(config).compile();

    for diagnostic in result.diagnostics.iter() {
        eprintln!("{diagnostic}");
    }

    if result.status {
        println!(
            "compiled {} member implementation(s)",
            result.emission.member_count()
        );
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::parse_library;

    #[test]
    fn parses_local_library() {
        let library = parse_library("corelib=/libs/core").unwrap();
        assert_eq!(library.alias, "corelib");
        assert_eq!(library.path_or_url, "/libs/core");
        assert!(!library.is_scm);
    }

    #[test]
    fn parses_scm_library() {
        let library = parse_library("corelib=scm:github.com/some/core@v1").unwrap();
        assert!(library.is_scm);
        assert_eq!(library.path_or_url, "github.com/some/core@v1");
    }

    #[test]
    fn rejects_malformed_declarations() {
        assert!(parse_library("no-equals").is_err());
        assert!(parse_library("=path").is_err());
        assert!(parse_library("alias=").is_err());
    }
}
