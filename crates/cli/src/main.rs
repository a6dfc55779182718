use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use curriculum_adapters::{
    create_grounded_model, create_image_model, create_knowledge_base, create_text_model,
    AdapterError,
};
use curriculum_core::{
    is_error_text, Config, ConfigError, LanguageModel, LanguageModelError, LogLevel, LogRecord,
    LogSink, Pipeline, PromptError, SamplingConfig, SharedLogSink, StderrLogSink,
    DATA_URI_PREFIX,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const COMPONENT: &str = "cli";

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let min_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let sink: SharedLogSink = Arc::new(StderrLogSink::with_min_level(min_level));
    install_log_bridge(sink.clone(), min_level);

    match cli.command {
        Command::Config(command) => handle_config(&cli.config, command, sink),
        Command::Generate(args) => run_generate(&cli.config, args, sink),
        Command::Summarize(args) => run_summarize(&cli.config, args, sink),
        Command::Image(args) => run_image(&cli.config, args, sink),
    }
}

fn handle_config(
    config_path: &Path,
    command: ConfigCommand,
    sink: SharedLogSink,
) -> Result<(), CliError> {
    match command {
        ConfigCommand::Init(args) => run_config_init(config_path, args, sink.as_ref()),
        ConfigCommand::Show => run_config_show(config_path),
        ConfigCommand::TestModel => run_test_model(config_path, sink.as_ref()),
    }
}

fn load_config(config_path: &Path) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(config_path)?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn run_config_init(
    config_path: &Path,
    args: InitArgs,
    sink: &dyn LogSink,
) -> Result<(), CliError> {
    if config_path.exists() && !args.force {
        return Err(CliError::ConfigExists(config_path.to_path_buf()));
    }
    let mut config = Config::default();
    if let Some(region) = args.region {
        config.backend.region = region;
    }
    config.to_path(config_path)?;
    sink.log(LogRecord::new(
        LogLevel::Info,
        COMPONENT,
        format!("configuración escrita en {}", config_path.display()),
    ));
    Ok(())
}

fn run_config_show(config_path: &Path) -> Result<(), CliError> {
    let mut config = Config::load_or_default(config_path)?;
    config.apply_env();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_test_model(config_path: &Path, sink: &dyn LogSink) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    sink.log(LogRecord::new(
        LogLevel::Info,
        COMPONENT,
        format!(
            "probando modelo `{}` en la región `{}`",
            config.backend.text_model_id, config.backend.region
        ),
    ));

    let model = create_text_model(&config)?;
    let sampling = SamplingConfig {
        max_tokens: 20,
        ..SamplingConfig::summary()
    };
    let response = model.invoke("Please reply 'OK'", &sampling)?;
    if response.trim().is_empty() {
        return Err(CliError::TestFailed(
            "el modelo no devolvió ninguna respuesta".to_string(),
        ));
    }

    sink.log(LogRecord::new(
        LogLevel::Info,
        COMPONENT,
        format!("respuesta del modelo: {}", response.trim()),
    ));
    Ok(())
}

fn run_generate(
    config_path: &Path,
    args: GenerateArgs,
    sink: SharedLogSink,
) -> Result<(), CliError> {
    let mut config = load_config(config_path)?;
    if let Some(passes) = args.passes {
        config.refinement.passes = passes;
    }

    let model = create_text_model(&config)?;
    let mut pipeline = Pipeline::new(config, model, sink.clone())?;
    if args.rag {
        let backend = create_knowledge_base(pipeline.config())?;
        let grounded = create_grounded_model(pipeline.config())?;
        pipeline = pipeline.with_grounded_model(grounded).with_retrieval(backend);
    }

    let contents = match (&args.contents, &args.contents_file) {
        (_, Some(path)) => read_text(path)?,
        (Some(text), None) => text.clone(),
        (None, None) => return Err(CliError::MissingInput("--contents o --contents-file")),
    };

    let document =
        pipeline.generate_curriculum(args.grade, &args.competency, &args.capabilities, &contents);
    emit(document, args.output.as_deref(), sink.as_ref())
}

fn run_summarize(
    config_path: &Path,
    args: SummarizeArgs,
    sink: SharedLogSink,
) -> Result<(), CliError> {
    let comments = match (args.text, args.file) {
        (_, Some(path)) => read_text(&path)?,
        (Some(text), None) => text,
        (None, None) => return Err(CliError::MissingInput("--text o --file")),
    };

    let config = load_config(config_path)?;
    let model = create_text_model(&config)?;
    let pipeline = Pipeline::new(config, model, sink.clone())?;
    emit(pipeline.summarize_comments(&comments), None, sink.as_ref())
}

fn run_image(config_path: &Path, args: ImageArgs, sink: SharedLogSink) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let text_model = create_text_model(&config)?;
    let image_model = create_image_model(&config)?;
    let pipeline = Pipeline::new(config, text_model, sink.clone())?.with_image_model(image_model);

    let uri = pipeline.generate_image(&args.description);
    if is_error_text(&uri) {
        return Err(CliError::Pipeline(uri));
    }

    match args.output {
        Some(path) => {
            let bytes = decode_data_uri(&uri)?;
            fs::write(&path, bytes).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            sink.log(LogRecord::new(
                LogLevel::Info,
                COMPONENT,
                format!("imagen guardada en {}", path.display()),
            ));
            Ok(())
        }
        None => {
            println!("{uri}");
            Ok(())
        }
    }
}

/// Prints or writes a pipeline result; error-marked text becomes a failure exit.
fn emit(text: String, output: Option<&Path>, sink: &dyn LogSink) -> Result<(), CliError> {
    if is_error_text(&text) {
        return Err(CliError::Pipeline(text));
    }
    match output {
        Some(path) => {
            fs::write(path, &text).map_err(|source| CliError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            sink.log(LogRecord::new(
                LogLevel::Info,
                COMPONENT,
                format!("documento guardado en {}", path.display()),
            ));
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, CliError> {
    let payload = uri
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or_else(|| CliError::InvalidImage("falta el prefijo data:image/png;base64,".into()))?;
    STANDARD
        .decode(payload.trim())
        .map_err(|err| CliError::InvalidImage(err.to_string()))
}

/// Routes `log` records from the adapters into the same sink as pipeline diagnostics.
struct SinkLogger {
    sink: SharedLogSink,
    max_level: log::LevelFilter,
}

impl log::Log for SinkLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.sink.log(LogRecord::new(
            LogLevel::from_facade(record.level()),
            record.target(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}

fn install_log_bridge(sink: SharedLogSink, min_level: LogLevel) {
    let max_level = min_level.as_facade().to_level_filter();
    let logger = SinkLogger { sink, max_level };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("error de configuración: {0}")]
    Config(#[from] ConfigError),
    #[error("el archivo de configuración `{0}` ya existe; use --force para sobrescribirlo")]
    ConfigExists(PathBuf),
    #[error("falta la entrada: indique {0}")]
    MissingInput(&'static str),
    #[error("no se pudo leer o escribir `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("fallo del adaptador: {0}")]
    Adapter(#[from] AdapterError),
    #[error("fallo del modelo: {0}")]
    Model(#[from] LanguageModelError),
    #[error("no se pudo serializar la configuración: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no se pudieron cargar las plantillas: {0}")]
    Prompt(#[from] PromptError),
    #[error("imagen inválida: {0}")]
    InvalidImage(String),
    #[error("{0}")]
    Pipeline(String),
    #[error("{0}")]
    TestFailed(String),
}

#[derive(Parser)]
#[command(
    name = "curriculoctl",
    version,
    about = "Genera programaciones curriculares de Ciencia y Tecnología"
)]
struct Cli {
    /// Ruta del archivo de configuración
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Muestra también los mensajes de depuración
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Operaciones sobre la configuración
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Genera una programación curricular
    Generate(GenerateArgs),
    /// Resume comentarios de estudiantes
    Summarize(SummarizeArgs),
    /// Genera una imagen educativa
    Image(ImageArgs),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Escribe una configuración con valores por defecto
    Init(InitArgs),
    /// Muestra la configuración efectiva
    Show,
    /// Envía una petición corta al modelo de texto
    TestModel,
}

#[derive(Args)]
struct InitArgs {
    #[arg(long)]
    region: Option<String>,
    /// Sobrescribe un archivo existente
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct GenerateArgs {
    /// Grado de secundaria (3, 4 o 5)
    #[arg(long)]
    grade: u8,
    #[arg(long)]
    competency: String,
    #[arg(long)]
    capabilities: String,
    #[arg(long, conflicts_with = "contents_file")]
    contents: Option<String>,
    #[arg(long)]
    contents_file: Option<PathBuf>,
    /// Fundamenta el borrador en la base de conocimiento configurada
    #[arg(long)]
    rag: bool,
    /// Número de pasadas de mejora
    #[arg(long)]
    passes: Option<usize>,
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct SummarizeArgs {
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct ImageArgs {
    /// Descripción de la imagen
    description: String,
    /// Guarda el PNG decodificado en lugar de imprimir el data URI
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_arguments_parse() {
        let cli = Cli::try_parse_from([
            "curriculoctl",
            "generate",
            "--grade",
            "4",
            "--competency",
            "Indaga",
            "--capabilities",
            "Problematiza",
            "--contents",
            "Energía",
            "--rag",
            "--passes",
            "5",
        ])
        .unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.grade, 4);
                assert!(args.rag);
                assert_eq!(args.passes, Some(5));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn data_uri_decodes_to_bytes() {
        let bytes = decode_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
        assert!(matches!(
            decode_data_uri("Error al generar la imagen"),
            Err(CliError::InvalidImage(_))
        ));
    }

    #[test]
    fn error_text_is_a_failed_emit() {
        let sink = StderrLogSink::new();
        let err = emit("Error al generar el resumen: boom".into(), None, &sink).unwrap_err();
        assert!(matches!(err, CliError::Pipeline(ref text) if text.contains("boom")));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let sink = StderrLogSink::new();
        let args = |force| InitArgs {
            region: Some("us-east-1".into()),
            force,
        };

        run_config_init(&path, args(false), &sink).unwrap();
        assert_eq!(Config::from_path(&path).unwrap().backend.region, "us-east-1");
        assert!(matches!(
            run_config_init(&path, args(false), &sink),
            Err(CliError::ConfigExists(_))
        ));
        run_config_init(&path, args(true), &sink).unwrap();
    }

    #[test]
    fn written_document_goes_to_output_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("programacion.txt");
        emit("COMPETENCIA".into(), Some(&path), &StderrLogSink::new()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "COMPETENCIA");
    }
}
