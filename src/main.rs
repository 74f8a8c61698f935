use std::path::PathBuf;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use face_attribute_pipeline::{error_document, AnalysisConfig, AnalysisError, FaceAnalysis, FacePipeline, ModelRegistry};

#[derive(Parser, Debug)]
#[command(name = "face-analysis")]
#[command(about = "Analyze a face photo and print a JSON attribute report")]
struct Cli {
    /// JPEG or PNG photo to analyze
    image: PathBuf,

    /// TOML configuration file
    #[arg(short, long, env = "FACE_ANALYSIS_CONFIG")]
    config: Option<PathBuf>,

    /// Haar cascade XML used to locate faces
    #[arg(long, env = "FACE_ANALYSIS_CASCADE")]
    cascade: Option<PathBuf>,

    #[arg(long, env = "FACE_ANALYSIS_FACE_SHAPE_MODEL")]
    face_shape_model: Option<PathBuf>,

    #[arg(long, env = "FACE_ANALYSIS_SKIN_TYPE_MODEL")]
    skin_type_model: Option<PathBuf>,

    #[arg(long, env = "FACE_ANALYSIS_ACNE_MODEL")]
    acne_model: Option<PathBuf>,

    #[arg(long, env = "FACE_ANALYSIS_WRINKLE_MODEL")]
    wrinkle_model: Option<PathBuf>,

    /// Write the cropped face region to this file
    #[arg(long)]
    save_face: Option<PathBuf>,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn load_config(&self) -> Result<AnalysisConfig, AnalysisError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::new(),
        };
        if let Some(path) = &self.cascade {
            config.face_locator.cascade_path = Some(path.clone());
        }
        if let Some(path) = &self.face_shape_model {
            config.face_shape.model_path = Some(path.clone());
        }
        if let Some(path) = &self.skin_type_model {
            config.skin_type.model_path = Some(path.clone());
        }
        if let Some(path) = &self.acne_model {
            config.acne.model_path = Some(path.clone());
        }
        if let Some(path) = &self.wrinkle_model {
            config.wrinkle.model_path = Some(path.clone());
        }
        Ok(config)
    }
}

fn usage_message(e: &clap::Error) -> String {
    if e.kind() == ErrorKind::MissingRequiredArgument {
        return "no image provided".to_string();
    }
    let rendered = e.to_string();
    let first_line = rendered.lines().next().unwrap_or_default();
    first_line.trim_start_matches("error: ").to_string()
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    } else {
        EnvFilter::new(default_level)
    };
    // stdout carries the report only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<FaceAnalysis, AnalysisError> {
    let config = cli.load_config()?;
    let models = ModelRegistry::load(&config);
    let pipeline = FacePipeline::new(&config, &models)?;

    let analysis = pipeline.analyze_path(&cli.image).await?;

    if let Some(path) = &cli.save_face {
        match analysis.save_face_region(path) {
            Ok(true) => info!("saved face region to {}", path.display()),
            Ok(false) => warn!("no face region to save"),
            Err(e) => warn!("could not save face region to {}: {}", path.display(), e),
        }
    }

    Ok(analysis)
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                e.exit()
            }
            _ => {
                let _ = e.print();
                println!("{}", error_document(&AnalysisError::Usage(usage_message(&e))));
                std::process::exit(e.exit_code());
            }
        },
    };
    init_logging(cli.verbose);

    let code = match run(&cli).await {
        Ok(mut analysis) => match analysis.emit(cli.pretty) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                error!("could not serialize report: {}", e);
                1
            }
        },
        Err(e) => {
            error!("{}", e);
            println!("{}", error_document(&e));
            1
        }
    };
    // a hung model thread must not keep the process alive past the report
    std::process::exit(code);
}
