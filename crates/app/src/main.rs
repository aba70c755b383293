use std::fmt;
use std::sync::Arc;

use quiz_core::model::SessionKey;
use services::{
    AppServices, AuthSession, AuthState, BankSource, Clock, EmbeddedBank, FileBank, StorageConfig,
};

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidSessionKey { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSessionKey { raw } => write!(f, "invalid --resume value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    bank_path: Option<String>,
    storage: StorageConfig,
    user: Option<String>,
    shuffle: bool,
    resume: Option<SessionKey>,
    help: bool,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--bank <path>] [--db <sqlite_url>] [--user <id>]");
    eprintln!("                      [--shuffle] [--resume <key>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --bank  embedded worksheet");
    eprintln!("  --db    in-memory (attempts are lost on exit)");
    eprintln!("  --user  $USER");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_BANK_PATH, QUIZ_DB_URL, QUIZ_USER, RUST_LOG");
    eprintln!();
    eprintln!("Type a number for multiple choice, text otherwise.");
    eprintln!("An empty line skips a question; :quit stops and keeps the attempt.");
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut bank_path = env("QUIZ_BANK_PATH").filter(|v| !v.trim().is_empty());
        let mut storage = env("QUIZ_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .map_or(StorageConfig::InMemory, storage_from_url);
        let mut user = env("QUIZ_USER")
            .or_else(|| env("USER"))
            .filter(|v| !v.trim().is_empty());
        let mut shuffle = false;
        let mut resume = None;
        let mut help = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--bank" => bank_path = Some(require_value(args, "--bank")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    storage = storage_from_url(value);
                }
                "--user" => user = Some(require_value(args, "--user")?),
                "--shuffle" => shuffle = true,
                "--resume" => {
                    let value = require_value(args, "--resume")?;
                    let key = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSessionKey { raw: value.clone() })?;
                    resume = Some(key);
                }
                "--help" | "-h" => help = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            bank_path,
            storage,
            user,
            shuffle,
            resume,
            help,
        })
    }
}

fn storage_from_url(raw: String) -> StorageConfig {
    if raw == "sqlite::memory:" {
        return StorageConfig::InMemory;
    }
    StorageConfig::Sqlite(normalize_sqlite_url(raw))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if parsed.help {
        print_usage();
        return Ok(());
    }

    if let StorageConfig::Sqlite(url) = &parsed.storage {
        prepare_sqlite_file(url)?;
    }

    let auth = match parsed.user {
        Some(user) => AuthState::signed_in(AuthSession::new(user)),
        None => {
            log::warn!("no learner given; set --user or QUIZ_USER");
            AuthState::signed_out()
        }
    };

    let source: Box<dyn BankSource> = match parsed.bank_path {
        Some(path) => Box::new(FileBank::new(path)),
        None => Box::new(EmbeddedBank),
    };

    let services = AppServices::new(
        &parsed.storage,
        source.as_ref(),
        Arc::new(auth),
        Clock::default(),
        parsed.shuffle,
    )
    .await?;
    let quiz = services.quiz_loop();

    let mut attempt = match parsed.resume {
        Some(key) => match quiz.resume(key).await? {
            Some(attempt) => attempt,
            None => {
                eprintln!("no unfinished attempt stored under {key}; starting a new one");
                quiz.start_session().await?
            }
        },
        None => quiz.start_session().await?,
    };

    let mut input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let finished = terminal::run_attempt(&quiz, &mut attempt, &mut input, &mut output).await?;

    if !finished {
        if matches!(parsed.storage, StorageConfig::InMemory) {
            eprintln!("attempt discarded (in-memory storage)");
        } else {
            eprintln!("attempt saved; continue with --resume {}", attempt.key());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(argv: &[&str], env: &[(&str, &str)]) -> Result<Args, ArgsError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        let mut iter = argv.iter().map(|s| (*s).to_owned());
        Args::parse(&mut iter, |key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_embedded_bank_and_memory_storage() {
        let args = parse(&[], &[]).unwrap();
        assert_eq!(args.bank_path, None);
        assert_eq!(args.storage, StorageConfig::InMemory);
        assert_eq!(args.user, None);
        assert!(!args.shuffle);
        assert!(!args.help);
    }

    #[test]
    fn flags_override_environment() {
        let args = parse(
            &["--bank", "cli.json", "--user", "cli-user", "--shuffle"],
            &[("QUIZ_BANK_PATH", "env.json"), ("QUIZ_USER", "env-user")],
        )
        .unwrap();
        assert_eq!(args.bank_path.as_deref(), Some("cli.json"));
        assert_eq!(args.user.as_deref(), Some("cli-user"));
        assert!(args.shuffle);
    }

    #[test]
    fn user_falls_back_to_login_name() {
        let args = parse(&[], &[("USER", "maria")]).unwrap();
        assert_eq!(args.user.as_deref(), Some("maria"));

        let args = parse(&[], &[("USER", "maria"), ("QUIZ_USER", "jose")]).unwrap();
        assert_eq!(args.user.as_deref(), Some("jose"));
    }

    #[test]
    fn db_url_is_made_absolute() {
        let args = parse(&["--db", "/tmp/quiz.sqlite3"], &[]).unwrap();
        assert_eq!(
            args.storage,
            StorageConfig::Sqlite("sqlite:///tmp/quiz.sqlite3".into())
        );

        let args = parse(&[], &[("QUIZ_DB_URL", "sqlite::memory:")]).unwrap();
        assert_eq!(args.storage, StorageConfig::InMemory);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(matches!(
            parse(&["--db"], &[]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(
            parse(&["--db", " "], &[]),
            Err(ArgsError::InvalidDbUrl { .. })
        ));
        assert!(matches!(
            parse(&["--resume", "nope"], &[]),
            Err(ArgsError::InvalidSessionKey { .. })
        ));
        assert!(matches!(
            parse(&["--verbose"], &[]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn resume_takes_a_session_key() {
        let key = SessionKey::generate();
        let args = parse(&["--resume", &key.to_string()], &[]).unwrap();
        assert_eq!(args.resume, Some(key));
    }

    #[test]
    fn prepare_rejects_non_file_urls() {
        assert!(prepare_sqlite_file("postgres://x").is_err());
        assert!(prepare_sqlite_file("sqlite://").is_err());
    }
}
