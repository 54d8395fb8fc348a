use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use streamlite_core::function_catalog::SCALAR_FUNCTIONS;
use streamlite_core::metadata::ExtensionMetadata;

/// Symbols the host loader resolves by name.
const LOADER_SYMBOLS: &[&str] = &["streamlite_version", "streamlite_init"];

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else {
        print_usage();
        return Err("missing command".to_string());
    };

    match cmd.as_str() {
        "precommit" => {
            let mut full = false;
            for arg in args {
                match arg.as_str() {
                    "--full" => full = true,
                    "--ci" => {}
                    _ => return Err(format!("unknown precommit flag: {arg}")),
                }
            }
            precommit(full)
        }
        "check-exports" => check_exports(),
        "package" => {
            let mut platform = None;
            let mut duckdb_version = None;
            while let Some(arg) = args.next() {
                let slot = match arg.as_str() {
                    "--platform" => &mut platform,
                    "--duckdb-version" => &mut duckdb_version,
                    _ => return Err(format!("unknown package flag: {arg}")),
                };
                *slot = Some(args.next().ok_or_else(|| format!("{arg} needs a value"))?);
            }
            package(platform, duckdb_version)
        }
        "functions" => {
            print_functions();
            Ok(())
        }
        "install-hooks" => install_hooks(),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            Err(format!("unknown command: {cmd}"))
        }
    }
}

fn print_usage() {
    eprintln!("xtask commands:");
    eprintln!("  precommit [--full] [--ci]");
    eprintln!("  check-exports");
    eprintln!("  package [--platform <name>] [--duckdb-version <vX.Y.Z>]");
    eprintln!("  functions");
    eprintln!("  install-hooks");
}

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("xtask must live inside workspace")
        .to_path_buf()
}

fn precommit(full: bool) -> Result<(), String> {
    let root = repo_root();
    let steps: Vec<Vec<&str>> = vec![
        vec!["cargo", "fmt", "--all", "--", "--check"],
        vec![
            "cargo",
            "clippy",
            "-p",
            "streamlite-core",
            "-p",
            "streamlite-duckdb",
            "-p",
            "streamlite-bridge",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
        vec!["cargo", "test", "--workspace"],
    ];

    for step in steps {
        run_step(&root, &step)?;
    }
    if full {
        check_exports()?;
    }
    Ok(())
}

fn run_step(cwd: &Path, args: &[&str]) -> Result<(), String> {
    let (bin, rest) = args
        .split_first()
        .ok_or_else(|| "empty command step".to_string())?;
    eprintln!("+ {}", args.join(" "));

    let status = Command::new(bin)
        .args(rest)
        .current_dir(cwd)
        .status()
        .map_err(io_err)?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("command failed: {}", args.join(" ")))
    }
}

fn release_artifact(root: &Path) -> Result<PathBuf, String> {
    run_step(
        root,
        &["cargo", "build", "--release", "-p", "streamlite-bridge"],
    )?;
    let artifact = root.join("target/release").join(artifact_name());
    if !artifact.exists() {
        return Err(format!("artifact not found: {}", artifact.display()));
    }
    Ok(artifact)
}

fn artifact_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "streamlite.dll"
    } else if cfg!(target_os = "macos") {
        "libstreamlite.dylib"
    } else {
        "libstreamlite.so"
    }
}

/// Build the release artifact and confirm the loader symbols are exported.
fn check_exports() -> Result<(), String> {
    let artifact = release_artifact(&repo_root())?;

    let nm_args: &[&str] = if cfg!(target_os = "macos") {
        &["-gU"]
    } else {
        &["-D", "--defined-only"]
    };
    eprintln!("+ nm {} {}", nm_args.join(" "), artifact.display());
    let output = Command::new("nm")
        .args(nm_args)
        .arg(&artifact)
        .output()
        .map_err(io_err)?;
    if !output.status.success() {
        return Err(format!(
            "nm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let missing = missing_symbols(&listing, LOADER_SYMBOLS);
    if !missing.is_empty() {
        return Err(format!("missing exports: {}", missing.join(", ")));
    }
    println!("{}: exports {}", artifact.display(), LOADER_SYMBOLS.join(", "));
    Ok(())
}

/// Symbols from `expected` that do not appear as a defined name in `nm` output.
/// Mach-O prefixes C symbols with `_`.
fn missing_symbols<'a>(nm_listing: &str, expected: &[&'a str]) -> Vec<&'a str> {
    let defined: Vec<&str> = nm_listing
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .collect();
    expected
        .iter()
        .copied()
        .filter(|sym| {
            !defined
                .iter()
                .any(|d| *d == *sym || d.strip_prefix('_') == Some(*sym))
        })
        .collect()
}

/// Build the release artifact and write `streamlite.duckdb_extension` next
/// to it, with the metadata footer DuckDB checks before loading.
fn package(platform: Option<String>, duckdb_version: Option<String>) -> Result<(), String> {
    let root = repo_root();
    let duckdb_version = match duckdb_version {
        Some(v) => v,
        None => {
            let lock = fs::read_to_string(root.join("Cargo.lock")).map_err(io_err)?;
            locked_duckdb_version(&lock)
                .ok_or("libduckdb-sys not in Cargo.lock; pass --duckdb-version")?
        }
    };
    let platform = match platform {
        Some(p) => p,
        None => host_platform().ok_or("unknown host platform; pass --platform")?,
    };

    let artifact = release_artifact(&root)?;
    let meta = ExtensionMetadata {
        platform,
        duckdb_version,
        extension_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let mut bytes = fs::read(&artifact).map_err(io_err)?;
    bytes.extend(meta.footer().map_err(|e| e.to_string())?);

    let out = artifact.with_file_name("streamlite.duckdb_extension");
    fs::write(&out, bytes).map_err(io_err)?;
    println!(
        "{}: {} {} {}",
        out.display(),
        meta.platform,
        meta.duckdb_version,
        meta.extension_version
    );
    Ok(())
}

/// `vX.Y.Z` of the locked `libduckdb-sys`, which tracks the engine release.
fn locked_duckdb_version(lock: &str) -> Option<String> {
    let mut lines = lock.lines();
    while let Some(line) = lines.next() {
        if line.trim() == r#"name = "libduckdb-sys""# {
            let version = lines.next()?.trim().strip_prefix("version = ")?;
            return Some(format!("v{}", version.trim_matches('"')));
        }
    }
    None
}

/// DuckDB platform name of the machine running xtask.
fn host_platform() -> Option<String> {
    let os = match env::consts::OS {
        "linux" => "linux",
        "macos" => "osx",
        "windows" => "windows",
        _ => return None,
    };
    let arch = match env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        _ => return None,
    };
    Some(format!("{os}_{arch}"))
}

fn print_functions() {
    println!("| function | params | returns |");
    println!("|---|---|---|");
    for spec in SCALAR_FUNCTIONS {
        let params: Vec<_> = spec.params.iter().map(|p| p.sql_name()).collect();
        println!(
            "| `{}` | {} | {} |",
            spec.name,
            params.join(", "),
            spec.returns.sql_name()
        );
    }
}

fn install_hooks() -> Result<(), String> {
    let root = repo_root();
    let hook_path = root.join(".git/hooks/pre-commit");
    let script = format!(
        "#!/usr/bin/env sh\nset -eu\ncd \"{}\"\ncargo run --quiet -p xtask -- precommit\n",
        root.display()
    );

    if let Some(parent) = hook_path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(&hook_path, script).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&hook_path).map_err(io_err)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&hook_path, perms).map_err(io_err)?;
    }

    println!("installed pre-commit hook at {}", hook_path.display());
    Ok(())
}

fn io_err(e: io::Error) -> String {
    e.to_string()
}
