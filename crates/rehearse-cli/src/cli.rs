use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rehearse_core::recording::QuestionType;

#[derive(Parser)]
#[command(name = "rehearse")]
#[command(about = "Practice interview answers on camera and review your progress")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional JSON config document (supabase.url, supabase.anonKey, openai.apiKey, siteUrl)
    #[arg(long, global = true, value_name = "PATH", env = "REHEARSE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login(Credentials),
    /// Create an account
    Signup {
        #[command(flatten)]
        credentials: Credentials,
        /// Name shown in the app
        #[arg(long, value_name = "NAME")]
        name: String,
    },
    /// Email a password reset link
    ForgotPassword {
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show who is signed in
    Whoami,
    /// Record an answer to an interview question
    Practice(PracticeArgs),
    /// Review past practice sessions
    History {
        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },
    /// Generate questions from a résumé and a job description
    Tailor(TailorArgs),
    /// Test the connection to the configured Supabase project
    Diagnostics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show setup guidance and required storage configuration
    Setup,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Clone)]
pub struct Credentials {
    #[arg(long, value_name = "EMAIL")]
    pub email: String,
    /// Read from stdin when omitted
    #[arg(long, value_name = "PASSWORD", env = "REHEARSE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct PracticeArgs {
    /// Pool to draw the question from
    #[arg(long, value_enum, default_value_t = QuestionKind::Both)]
    pub question_type: QuestionKind,
    /// Practice a specific question instead of a random one
    #[arg(long, value_name = "TEXT")]
    pub question: Option<String>,
    /// Use an existing recording instead of capturing one
    #[arg(long, value_name = "PATH", conflicts_with = "recorder_command")]
    pub video: Option<PathBuf>,
    /// Shell command that records until stopped; `{output}` is replaced with the target file
    #[arg(long, value_name = "COMMAND", env = "REHEARSE_RECORDER")]
    pub recorder_command: Option<String>,
    /// Self-assessed rating, 1 to 5 (prompted when omitted)
    #[arg(long, value_parser = clap::value_parser!(i16).range(1..=5))]
    pub rating: Option<i16>,
    /// Notes about the answer
    #[arg(long, value_name = "TEXT")]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List sessions, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one session in full
    Show { id: i64 },
    /// Delete a session and its recording
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct TailorArgs {
    /// Résumé as a PDF file
    #[arg(long, value_name = "PATH")]
    pub resume: PathBuf,
    /// Job description text
    #[arg(long, value_name = "TEXT", conflicts_with = "job_description_file")]
    pub job_description: Option<String>,
    /// Read the job description from a file
    #[arg(long, value_name = "PATH")]
    pub job_description_file: Option<PathBuf>,
    /// Save the questions at these positions (1-based) to your collection
    #[arg(long, value_name = "N", value_delimiter = ',')]
    pub save: Vec<usize>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum QuestionKind {
    Behavioral,
    Technical,
    Both,
}

impl From<QuestionKind> for QuestionType {
    fn from(value: QuestionKind) -> Self {
        match value {
            QuestionKind::Behavioral => Self::Behavioral,
            QuestionKind::Technical => Self::Technical,
            QuestionKind::Both => Self::Both,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
