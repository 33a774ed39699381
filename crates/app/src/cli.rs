use clap::{Parser, Subcommand, ValueEnum};

use lesson_core::model::{Role, SkillModule};

#[derive(Parser, Debug)]
#[command(name = "lingua")]
#[command(about = "English lessons from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backend base URL
    #[arg(long, env = "LINGUA_API_URL", global = true)]
    pub api_url: Option<String>,

    /// SQLite database holding session tokens
    #[arg(long = "db", env = "LINGUA_DB_URL", default_value = "sqlite://lingua.sqlite3", global = true)]
    pub db_url: String,

    /// Role to act as (admin, teacher, user)
    #[arg(long, env = "LINGUA_ROLE", default_value = "user", global = true)]
    pub role: Role,

    /// Use the built-in demo catalog instead of the backend
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and remember the token for the role
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LINGUA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the role's token
    Logout,
    /// Show the signed-in profile
    Whoami,
    /// List topics of a skill module
    Topics {
        #[arg(long, value_enum, default_value_t = ModuleArg::Grammar)]
        module: ModuleArg,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// List a topic's lessons with their access state
    Lessons {
        #[arg(long)]
        topic: u64,
    },
    /// Take a lesson interactively
    Play {
        #[arg(long)]
        lesson: u64,
        /// Topic the lesson belongs to; access is checked against it
        #[arg(long)]
        topic: u64,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleArg {
    Grammar,
    Reading,
    Listening,
}

impl From<ModuleArg> for SkillModule {
    fn from(value: ModuleArg) -> Self {
        match value {
            ModuleArg::Grammar => SkillModule::Grammar,
            ModuleArg::Reading => SkillModule::Reading,
            ModuleArg::Listening => SkillModule::Listening,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_with_global_flags() {
        let cli = Cli::try_parse_from([
            "lingua", "--offline", "--role", "teacher", "play", "--lesson", "4", "--topic", "2",
        ])
        .unwrap();
        assert!(cli.offline);
        assert_eq!(cli.role, Role::Teacher);
        match cli.command {
            Command::Play { lesson, topic } => {
                assert_eq!(lesson, 4);
                assert_eq!(topic, 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn play_requires_a_topic() {
        assert!(Cli::try_parse_from(["lingua", "play", "--lesson", "4"]).is_err());
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Cli::try_parse_from(["lingua", "--role", "guest", "logout"]).is_err());
    }
}
