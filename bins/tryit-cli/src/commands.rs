// CLI command implementations

use std::path::Path;

use anyhow::{bail, Context, Result};
use tryit_common::types::Language;
use tryit_engine::config::LanguageConfigManager;
use tryit_engine::resolver::InterpreterResolver;
use tryit_engine::workspace::WorkspaceManager;
use tryit_engine::Engine;

fn build_engine() -> Result<Engine> {
    let configs =
        LanguageConfigManager::load_default().context("Failed to load language configuration")?;
    Ok(Engine::new(WorkspaceManager::from_env(), configs))
}

fn detect_language(path: &Path, explicit: Option<&str>) -> Result<Language> {
    if let Some(name) = explicit {
        return Language::from_str(name)
            .with_context(|| format!("Unknown language '{}' (expected cpp or python)", name));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match extension {
        "cpp" | "cc" | "cxx" => Ok(Language::Cpp),
        "py" => Ok(Language::Python),
        other => bail!(
            "Cannot infer a language from extension '{}'; pass --language",
            other
        ),
    }
}

pub async fn run_file(path: &Path, language: Option<&str>) -> Result<()> {
    let language = detect_language(path, language)?;
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let engine = build_engine()?;

    println!("→ Running {} as {}", path.display(), language);
    let response = engine.run(language, &code).await?;

    if response.error {
        println!("  ✗ Execution failed");
        if let Some(kind) = response.kind {
            println!("    Kind: {:?}", kind);
        }
        println!();
        print!("{}", response.output);
        bail!("execution failed");
    }

    println!("  ✓ Execution succeeded");
    println!();
    print!("{}", response.output);
    Ok(())
}

pub async fn trace_file(path: &Path, json: bool) -> Result<()> {
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let engine = build_engine()?;
    let payload = engine.trace(&code).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("→ Traced {}", path.display());
    println!("  Success: {}", payload.success);
    println!("  Steps: {}", payload.events.len());
    if payload.truncated {
        println!("  ⚠ Trace truncated at the event cap");
    }
    println!();

    for (idx, event) in payload.events.iter().enumerate() {
        println!(
            "  {:>4}  {:<9} {}:{}",
            idx + 1,
            format!("{:?}", event.event).to_lowercase(),
            event.function,
            event.line
        );
        if let Some(value) = &event.return_value {
            println!("        returns {}", value);
        }
        if let Some(exc) = &event.exception {
            println!("        raises {}: {}", exc.kind, exc.message);
        }
    }

    if !payload.stdout.is_empty() {
        println!();
        println!("→ Program output");
        print!("{}", payload.stdout);
    }

    if let Some(error) = &payload.error {
        println!();
        println!("✗ {}", error.message);
        if let Some(traceback) = &error.traceback {
            print!("{}", traceback);
        }
        bail!("traced program failed");
    }

    Ok(())
}

pub async fn doctor() -> Result<()> {
    let configs =
        LanguageConfigManager::load_default().context("Failed to load language configuration")?;

    println!("→ Checking host toolchain");

    let mut missing = 0;

    for language in [Language::Cpp, Language::Python] {
        let Ok(spec) = configs.get_config(&language) else {
            println!("  - {} not configured, skipping", language);
            continue;
        };

        if spec.uses_interpreter() {
            let resolver = InterpreterResolver::new(spec.interpreter_candidates.clone());
            match resolver.resolve().await {
                Some(command) => {
                    println!("  ✓ {} interpreter: {}", language, command);
                }
                None => {
                    println!(
                        "  ✗ {} interpreter: none of {:?} responded",
                        language, spec.interpreter_candidates
                    );
                    missing += 1;
                }
            }
        }

        if let Some(compile) = &spec.compile {
            let available = tokio::process::Command::new(&compile.program)
                .arg("--version")
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);
            if available {
                println!("  ✓ {} compiler: {}", language, compile.program);
            } else {
                println!("  ✗ {} compiler: '{}' not available", language, compile.program);
                missing += 1;
            }
        }
    }

    println!();
    if missing > 0 {
        bail!("{} toolchain component(s) missing", missing);
    }
    println!("→ All toolchain components available");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language_from_extension() {
        assert_eq!(
            detect_language(Path::new("a.cpp"), None).unwrap(),
            Language::Cpp
        );
        assert_eq!(
            detect_language(Path::new("a.py"), None).unwrap(),
            Language::Python
        );
        assert!(detect_language(Path::new("a.txt"), None).is_err());
    }

    #[test]
    fn test_explicit_language_wins() {
        assert_eq!(
            detect_language(Path::new("whatever.txt"), Some("python")).unwrap(),
            Language::Python
        );
        assert!(detect_language(Path::new("a.py"), Some("java")).is_err());
    }
}
