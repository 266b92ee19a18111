use std::sync::Arc;

use indoc::indoc;

use crate::cancel::CancellationToken;
use crate::compiler::{CompileConfig, CompileResult, Compiler};
use crate::loader::vcs::NoRemoteVcsClient;
use crate::loader::{Entrypoint, Library, MapPathLoader};

fn compile(files: &[(&str, &str)]) -> CompileResult {
    let path_loader = Arc::new(MapPathLoader::new());
    for (path, contents) in files {
        path_loader.add_file(*path, *contents);
    }

    let config = CompileConfig {
        entrypoint: Entrypoint::new("/proj/entry.seru"),
        libraries: Vec::new(),
        vcs_development_directories: Vec::new(),
        path_loader,
        vcs_client: Arc::new(NoRemoteVcsClient),
        cancellation: CancellationToken::new(),
    };
    Compiler::new(config).compile()
}

#[test]
fn compiles_whole_program() {
    let result = compile(&[(
        "/proj/entry.seru",
        indoc! {"
            class Counter {
                var count int = 0

                function Add(amount int) int {
                    return this.count + amount
                }
            }

            function main() int {
                var counter Counter? = null
                if counter is not null {
                    return counter.Add(1)
                }
                return 0
            }
        "},
    )]);

    assert!(result.status, "diagnostics: {:?}", result.diagnostics);
    assert!(!result.diagnostics.has_errors());

    // Every implemented member appears in the emission tree.
    assert_eq!(result.emission.member_count(), 3);
}

#[test]
fn compiles_across_imports() {
    let result = compile(&[
        (
            "/proj/entry.seru",
            indoc! {"
                from helpers import Doubler

                function main(doubler Doubler) int {
                    return doubler.Double(21)
                }
            "},
        ),
        (
            "/proj/helpers/lib.seru",
            indoc! {"
                class Doubler {
                    function Double(value int) int {
                        return value * 2
                    }
                }
            "},
        ),
    ]);

    assert!(result.status, "diagnostics: {:?}", result.diagnostics);
}

#[test]
fn type_error_fails_compile_with_diagnostic() {
    let result = compile(&[(
        "/proj/entry.seru",
        indoc! {"
            function main() int {
                var message string = 42
                return 0
            }
        "},
    )]);

    assert!(!result.status);
    assert_eq!(result.emission.member_count(), 0);
    assert!(
        result
            .diagnostics
            .errors()
            .any(|d| d.message.contains("has declared type 'string'"))
    );
}

#[test]
fn legacy_modules_compile_through_fallback() {
    // A module in the old grammar parses through the compatibility driver.
    let result = compile(&[(
        "/proj/entry.seru",
        indoc! {"
            var<int> counter = 10

            function<int> addOne(value int) {
                return value + 1
            }
        "},
    )]);

    assert!(result.status, "diagnostics: {:?}", result.diagnostics);
}

#[test]
fn async_member_lowers_to_machine() {
    let result = compile(&[(
        "/proj/entry.seru",
        indoc! {"
            function fetch() int {
                return 42
            }

            function main() int {
                var x = <- fetch()
                return x
            }
        "},
    )]);

    assert!(result.status, "diagnostics: {:?}", result.diagnostics);

    let machines = result
        .emission
        .members()
        .filter(|(_, emission)| emission.is_machine())
        .count();
    assert_eq!(machines, 1);

    let (_, emission) = result
        .emission
        .members()
        .find(|(key, _)| key.member == "main")
        .unwrap();
    let crate::statemachine::MemberEmission::Machine(machine) = emission else {
        panic!("expected main to lower to a machine");
    };
    assert!(machine.state_count() >= 2);
}

#[test]
fn cancellation_produces_clean_failure() {
    let path_loader = Arc::new(MapPathLoader::new());
    path_loader.add_file("/proj/entry.seru", "var x int = 1\n");

    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let config = CompileConfig {
        entrypoint: Entrypoint::new("/proj/entry.seru"),
        libraries: Vec::new(),
        vcs_development_directories: Vec::new(),
        path_loader,
        vcs_client: Arc::new(NoRemoteVcsClient),
        cancellation,
    };
    let result = Compiler::new(config).compile();

    assert!(!result.status);
    assert_eq!(result.emission.member_count(), 0);
}

#[test]
fn remote_package_fails_without_vcs_client() {
    let result = compile(&[(
        "/proj/entry.seru",
        "import \"github.com/some/pkg\" as pkg\n",
    )]);

    assert!(!result.status);
    assert!(
        result
            .diagnostics
            .errors()
            .any(|d| d.message.contains("remote package loading is disabled"))
    );
}

#[test]
fn library_compiles_alongside_entrypoint() {
    let path_loader = Arc::new(MapPathLoader::new());
    path_loader.add_file("/proj/entry.seru", "import @mathlib\n\nvar x int = 1\n");
    path_loader.add_file(
        "/libs/math/ops.seru",
        "function Square(value int) int {\n\treturn value * value\n}\n",
    );

    let config = CompileConfig {
        entrypoint: Entrypoint::new("/proj/entry.seru"),
        libraries: vec![Library {
            alias: "mathlib".to_owned(),
            path_or_url: "/libs/math".to_owned(),
            is_scm: false,
            kind: String::new(),
        }],
        vcs_development_directories: Vec::new(),
        path_loader,
        vcs_client: Arc::new(NoRemoteVcsClient),
        cancellation: CancellationToken::new(),
    };
    let result = Compiler::new(config).compile();

    assert!(result.status, "diagnostics: {:?}", result.diagnostics);
    assert!(
        result
            .emission
            .members()
            .any(|(key, _)| key.member == "Square")
    );
}
