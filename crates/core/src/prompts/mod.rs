use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::PromptConfig;

mod builder;

pub use builder::{PromptBuilder, PromptTask};

const BUILT_IN_PROMPTS: &str = include_str!("../../prompts/default.toml");

pub type PromptArguments = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptSource {
    BuiltIn,
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt `{0}` not found")]
    NotFound(String),
    #[error("missing argument `{argument}` when rendering prompt `{key}`")]
    MissingArgument { key: String, argument: String },
    #[error("prompt `{key}` declares required argument `{argument}` that never appears in its template")]
    InvalidRequired { key: String, argument: String },
    #[error("failed to read prompt file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse built-in prompt definitions: {0}")]
    ParseBuiltIn(toml::de::Error),
    #[error("failed to parse prompt file `{path}` as TOML: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse prompt file `{path}` as YAML: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Clone, Debug)]
enum Segment {
    Text(String),
    Slot(String),
}

/// A compiled template: literal text interleaved with `{name}` slots.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    key: String,
    segments: Vec<Segment>,
    required: BTreeSet<String>,
    source: PromptSource,
}

impl PromptTemplate {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &PromptSource {
        &self.source
    }

    pub fn render(&self, arguments: &PromptArguments) -> Result<String, PromptError> {
        if let Some(missing) = self.required.iter().find(|r| !arguments.contains_key(*r)) {
            return Err(PromptError::MissingArgument {
                key: self.key.clone(),
                argument: missing.clone(),
            });
        }

        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Slot(name) => {
                    if let Some(value) = arguments.get(name) {
                        output.push_str(value);
                    }
                }
            }
        }
        Ok(output)
    }

    fn compile(key: String, raw: RawPrompt, source: PromptSource) -> Result<Self, PromptError> {
        let (segments, slots) = split_slots(&raw.template);

        let required = if raw.required.is_empty() {
            slots
        } else {
            raw.required
                .into_iter()
                .map(|name| name.trim().to_string())
                .map(|name| {
                    if slots.contains(&name) {
                        Ok(name)
                    } else {
                        Err(PromptError::InvalidRequired {
                            key: key.clone(),
                            argument: name,
                        })
                    }
                })
                .collect::<Result<BTreeSet<_>, _>>()?
        };

        Ok(Self {
            key,
            segments,
            required,
            source,
        })
    }
}

/// Built-in prompt texts, optionally overridden by files from custom directories.
#[derive(Debug)]
pub struct PromptRegistry {
    templates: BTreeMap<String, PromptTemplate>,
    directories: Vec<PathBuf>,
}

impl PromptRegistry {
    pub fn new() -> Result<Self, PromptError> {
        Self::with_directories(Vec::new())
    }

    pub fn from_prompt_config(config: &PromptConfig) -> Result<Self, PromptError> {
        Self::with_directories(config.custom_directories.clone())
    }

    pub fn with_directories(directories: Vec<PathBuf>) -> Result<Self, PromptError> {
        let mut registry = Self {
            templates: BTreeMap::new(),
            directories,
        };
        registry.reload()?;
        Ok(registry)
    }

    pub fn reload(&mut self) -> Result<(), PromptError> {
        let mut templates = BTreeMap::new();
        for template in parse_toml(BUILT_IN_PROMPTS, PromptSource::BuiltIn)
            .map_err(PromptError::ParseBuiltIn)??
        {
            templates.insert(template.key.clone(), template);
        }
        for dir in &self.directories {
            load_overrides(dir, &mut templates)?;
        }
        self.templates = templates;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PromptTemplate> {
        self.templates.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn format(&self, key: &str, arguments: &PromptArguments) -> Result<String, PromptError> {
        self.get(key)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))?
            .render(arguments)
    }

    pub fn format_with<I, K, V>(&self, key: &str, arguments: I) -> Result<String, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let arguments: PromptArguments = arguments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.format(key, &arguments)
    }
}

fn load_overrides(
    dir: &Path,
    templates: &mut BTreeMap<String, PromptTemplate>,
) -> Result<(), PromptError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let io_error = |path: &Path, source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|source| io_error(dir, source))? {
        let path = entry.map_err(|source| io_error(dir, source))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    // Later files win, so keep the override order stable.
    files.sort();

    for path in files {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let parsed = match extension.as_deref() {
            Some("toml") => {
                let contents = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
                parse_toml(&contents, PromptSource::File(path.clone())).map_err(|source| {
                    PromptError::ParseToml {
                        path: path.clone(),
                        source,
                    }
                })??
            }
            Some("yaml") | Some("yml") => {
                let contents = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
                let document: PromptDocument =
                    serde_yaml::from_str(&contents).map_err(|source| PromptError::ParseYaml {
                        path: path.clone(),
                        source,
                    })?;
                compile_document(document, PromptSource::File(path.clone()))?
            }
            _ => continue,
        };

        for template in parsed {
            templates.insert(template.key.clone(), template);
        }
    }

    Ok(())
}

fn parse_toml(
    contents: &str,
    source: PromptSource,
) -> Result<Result<Vec<PromptTemplate>, PromptError>, toml::de::Error> {
    let document: PromptDocument = toml::from_str(contents)?;
    Ok(compile_document(document, source))
}

fn compile_document(
    document: PromptDocument,
    source: PromptSource,
) -> Result<Vec<PromptTemplate>, PromptError> {
    document
        .prompts
        .into_iter()
        .map(|(key, raw)| PromptTemplate::compile(key, raw, source.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct PromptDocument {
    #[serde(default)]
    prompts: BTreeMap<String, RawPrompt>,
}

#[derive(Debug, Deserialize)]
struct RawPrompt {
    #[serde(alias = "text")]
    template: String,
    #[serde(default)]
    required: Vec<String>,
}

/// Splits `{name}` slots out of a template; `{{` and `}}` are literal braces.
fn split_slots(template: &str) -> (Vec<Segment>, BTreeSet<String>) {
    let mut segments = Vec::new();
    let mut slots = BTreeSet::new();
    let mut text = String::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }

                let trimmed = name.trim();
                if !closed || trimmed.is_empty() {
                    text.push('{');
                    text.push_str(&name);
                    if closed {
                        text.push('}');
                    }
                    continue;
                }

                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                slots.insert(trimmed.to_string());
                segments.push(Segment::Slot(trimmed.to_string()));
            }
            _ => text.push(ch),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }

    (segments, slots)
}
