use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;

use meek::config::{self, ConfigReader, OpenAiSettings};
use meek::kernel::Kernel;
use meek::llm::OpenAiClient;

const DEFAULT_SKILL: &str = "FunSkill";
const DEFAULT_FUNCTION: &str = "Joke";
const DEFAULT_INPUT: &str = "fart at a corporate meeting";

#[derive(Parser)]
#[command(name = "meek")]
#[command(about = "Meek CLI: run prompt skills against a chat model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Print the application root, skills directory, and app.ini path.
    Paths,

    /// Read one value from app.ini. Without a key, list the section's options; without a
    /// section, list the sections.
    Config {
        /// Section name (case-sensitive).
        section: Option<String>,

        /// Option name (case-insensitive).
        key: Option<String>,

        /// How to interpret the value.
        #[arg(long = "type", short = 't', value_enum, default_value_t = ValueType::String)]
        value_type: ValueType,
    },

    /// List skills and their functions under the skills directory.
    Skills,

    /// Run a skill function and print the completion. Needs OPENAI_API_KEY (env or .env).
    /// This is also what runs when no subcommand is given.
    Run {
        /// Skill (directory under skills/).
        #[arg(long, short, default_value = DEFAULT_SKILL)]
        skill: String,

        /// Function within the skill.
        #[arg(long, short, default_value = DEFAULT_FUNCTION)]
        function: String,

        /// Stream the completion as it is generated (default from app.ini [openai] stream).
        #[arg(long)]
        stream: bool,

        /// Input bound to {{$input}} in the template.
        #[arg(default_value = DEFAULT_INPUT)]
        input: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ValueType {
    String,
    Int,
    Bool,
    Float,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match dotenvy::dotenv() {
        Ok(path) => log::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("ignoring .env: {}", e),
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("meek {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Paths) => {
            run_paths();
            Ok(())
        }
        Some(Commands::Config {
            section,
            key,
            value_type,
        }) => run_config(section.as_deref(), key.as_deref(), value_type),
        Some(Commands::Skills) => run_skills(),
        Some(Commands::Run {
            skill,
            function,
            stream,
            input,
        }) => run_skill(&skill, &function, stream, &input).await,
        None => run_skill(DEFAULT_SKILL, DEFAULT_FUNCTION, false, DEFAULT_INPUT).await,
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_paths() {
    println!("root:   {}", meek::paths::application_root_path().display());
    println!("skills: {}", meek::paths::append_path("skills").display());
    println!("config: {}", config::config_path().display());
}

fn run_config(section: Option<&str>, key: Option<&str>, value_type: ValueType) -> anyhow::Result<()> {
    let reader = ConfigReader::new();
    let (section, key) = match (section, key) {
        (Some(section), Some(key)) => (section, key),
        (Some(section), None) => {
            let doc = reader.load()?;
            for name in doc.options(section)? {
                println!("{} = {}", name, doc.get_raw(section, name)?);
            }
            return Ok(());
        }
        (None, _) => {
            for name in reader.load()?.sections() {
                println!("{}", name);
            }
            return Ok(());
        }
    };
    match value_type {
        ValueType::String => println!("{}", reader.get_string(section, key)?),
        ValueType::Int => println!("{}", reader.get_int(section, key)?),
        ValueType::Bool => println!("{}", reader.get_bool(section, key)?),
        ValueType::Float => println!("{}", reader.get_float(section, key)?),
    }
    Ok(())
}

fn run_skills() -> anyhow::Result<()> {
    let skills_dir = meek::paths::append_path("skills");
    let skills = meek::skills::list_skills(&skills_dir)?;
    if skills.is_empty() {
        println!("no skills found in {}", skills_dir.display());
    }
    for s in skills {
        println!("{}: {}", s.name, s.functions.join(", "));
    }
    Ok(())
}

async fn run_skill(skill: &str, function: &str, stream: bool, input: &str) -> anyhow::Result<()> {
    let settings = OpenAiSettings::load(&ConfigReader::new())?;
    let api_key = config::resolve_openai_api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "{} is not set (environment or .env)",
            config::OPENAI_API_KEY_ENV
        )
    })?;
    let client = OpenAiClient::new(api_key, settings.base_url.clone())?;

    let mut kernel = Kernel::new();
    kernel.add_chat_service(settings.service_id.clone(), client, settings.model.clone());

    let skills_dir = meek::paths::append_path("skills");
    kernel.import_skill_from_directory(&skills_dir, skill)?;

    if stream || settings.stream {
        let mut stdout = std::io::stdout();
        let mut on_chunk = |s: &str| {
            let _ = write!(stdout, "{}", s);
            let _ = stdout.flush();
        };
        kernel
            .invoke_stream(skill, function, input, &mut on_chunk)
            .await?;
        println!();
    } else {
        let reply = kernel.invoke(skill, function, input).await?;
        println!("{}", reply);
    }
    Ok(())
}
