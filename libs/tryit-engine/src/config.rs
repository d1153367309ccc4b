// Language configuration management for the tryit engine.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tryit_common::types::Language;

use crate::error::EngineError;

/// Placeholder expanded to the user's source file path.
pub const SRC_PLACEHOLDER: &str = "{src}";
/// Placeholder expanded to the compiled binary path.
pub const BIN_PLACEHOLDER: &str = "{bin}";
/// Placeholder expanded to the resolved interpreter command.
pub const INTERPRETER_PLACEHOLDER: &str = "{interpreter}";

const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Extra wall-clock slack granted to trace runs on top of the plain run
/// timeout - the hook pays a per-step instrumentation cost.
pub const TRACE_TIMEOUT_SLACK_MS: u64 = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    fn mentions(&self, placeholder: &str) -> bool {
        self.program.contains(placeholder) || self.args.iter().any(|a| a.contains(placeholder))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub name: String,
    pub file_extension: String,
    /// Compile step for compiled languages; `None` for interpreted ones.
    #[serde(default)]
    pub compile: Option<CommandSpec>,
    pub run: CommandSpec,
    /// Candidate interpreter commands, probed in order. Only meaningful for
    /// specs whose command templates use `{interpreter}`.
    #[serde(default)]
    pub interpreter_candidates: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}

impl LanguageSpec {
    /// Whether any command template needs a resolved interpreter.
    pub fn uses_interpreter(&self) -> bool {
        self.run.mentions(INTERPRETER_PLACEHOLDER)
            || self
                .compile
                .as_ref()
                .map(|c| c.mentions(INTERPRETER_PLACEHOLDER))
                .unwrap_or(false)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageSpec>,
}

/// Values substituted into a command template for one execution.
#[derive(Debug, Default, Clone)]
pub struct RenderContext {
    pub src: String,
    pub bin: String,
    pub interpreter: String,
}

impl RenderContext {
    fn apply(&self, template: &str) -> String {
        template
            .replace(SRC_PLACEHOLDER, &self.src)
            .replace(BIN_PLACEHOLDER, &self.bin)
            .replace(INTERPRETER_PLACEHOLDER, &self.interpreter)
    }

    /// Expand a command template into the concrete program and arguments.
    pub fn render(&self, command: &CommandSpec) -> (String, Vec<String>) {
        let program = self.apply(&command.program);
        let args = command.args.iter().map(|a| self.apply(a)).collect();
        (program, args)
    }
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<Language, LanguageSpec>,
}

impl LanguageConfigManager {
    /// Built-in cpp/python specs so the service runs without a config file.
    pub fn builtin() -> Self {
        let specs = vec![
            LanguageSpec {
                name: "cpp".to_string(),
                file_extension: "cpp".to_string(),
                compile: Some(CommandSpec {
                    program: "g++".to_string(),
                    args: vec![
                        SRC_PLACEHOLDER.to_string(),
                        "-o".to_string(),
                        BIN_PLACEHOLDER.to_string(),
                    ],
                }),
                run: CommandSpec {
                    program: BIN_PLACEHOLDER.to_string(),
                    args: Vec::new(),
                },
                interpreter_candidates: Vec::new(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
                max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            },
            LanguageSpec {
                name: "python".to_string(),
                file_extension: "py".to_string(),
                compile: None,
                run: CommandSpec {
                    program: INTERPRETER_PLACEHOLDER.to_string(),
                    args: vec![SRC_PLACEHOLDER.to_string()],
                },
                interpreter_candidates: vec!["python3".to_string(), "python".to_string()],
                timeout_ms: DEFAULT_TIMEOUT_MS,
                max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            },
        ];

        let mut configs = HashMap::new();
        for spec in specs {
            if let Some(language) = Language::from_str(&spec.name) {
                configs.insert(language, spec);
            }
        }
        Self { configs }
    }

    /// Load language configurations from a languages.json file.
    pub fn load(config_path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(config_path).map_err(|e| {
            EngineError::Config(format!(
                "failed to read {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let languages_json: LanguagesJson = serde_json::from_str(&content).map_err(|e| {
            EngineError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let mut configs = HashMap::new();
        for spec in languages_json.languages {
            let language = Language::from_str(&spec.name).ok_or_else(|| {
                EngineError::Config(format!("unknown language '{}' in config", spec.name))
            })?;
            if spec.uses_interpreter() && spec.interpreter_candidates.is_empty() {
                return Err(EngineError::Config(format!(
                    "language '{}' uses {} but lists no interpreter candidates",
                    spec.name, INTERPRETER_PLACEHOLDER
                )));
            }
            configs.insert(language, spec);
        }

        if configs.is_empty() {
            return Err(EngineError::Config(
                "no languages configured".to_string(),
            ));
        }

        Ok(Self { configs })
    }

    /// Load from `TRYIT_LANGUAGES_FILE`, then `config/languages.json`,
    /// falling back to the built-in defaults when neither exists.
    pub fn load_default() -> Result<Self, EngineError> {
        if let Ok(path) = std::env::var("TRYIT_LANGUAGES_FILE") {
            return Self::load(Path::new(&path));
        }
        let default_path = Path::new("config/languages.json");
        if default_path.exists() {
            return Self::load(default_path);
        }
        Ok(Self::builtin())
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &Language) -> Result<&LanguageSpec, EngineError> {
        self.configs
            .get(language)
            .ok_or_else(|| EngineError::UnknownLanguage(language.to_string()))
    }

    /// List all configured languages
    pub fn list_languages(&self) -> Vec<Language> {
        self.configs.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_both_languages() {
        let manager = LanguageConfigManager::builtin();
        let cpp = manager.get_config(&Language::Cpp).unwrap();
        assert!(cpp.compile.is_some());
        assert!(!cpp.uses_interpreter());

        let python = manager.get_config(&Language::Python).unwrap();
        assert!(python.compile.is_none());
        assert!(python.uses_interpreter());
        assert_eq!(python.interpreter_candidates, vec!["python3", "python"]);
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let manager = LanguageConfigManager::builtin();
        let cpp = manager.get_config(&Language::Cpp).unwrap();
        let ctx = RenderContext {
            src: "/tmp/a.cpp".to_string(),
            bin: "/tmp/a.out".to_string(),
            interpreter: String::new(),
        };

        let (program, args) = ctx.render(cpp.compile.as_ref().unwrap());
        assert_eq!(program, "g++");
        assert_eq!(args, vec!["/tmp/a.cpp", "-o", "/tmp/a.out"]);

        let (program, args) = ctx.render(&cpp.run);
        assert_eq!(program, "/tmp/a.out");
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_languages_json() {
        let raw = r#"{
            "languages": [
                {
                    "name": "python",
                    "file_extension": "py",
                    "run": {"program": "{interpreter}", "args": ["{src}"]},
                    "interpreter_candidates": ["python3"],
                    "timeout_ms": 7000
                }
            ]
        }"#;
        let parsed: LanguagesJson = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.languages.len(), 1);
        assert_eq!(parsed.languages[0].timeout_ms, 7000);
        // Omitted fields take defaults.
        assert_eq!(parsed.languages[0].max_output_bytes, 10 * 1024 * 1024);
        assert!(parsed.languages[0].compile.is_none());
    }
}
