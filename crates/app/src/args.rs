use clap::{Parser, Subcommand, ValueEnum};
use course_core::model::{ContentId, ContentKind, CourseId, SectionId};

/// Command-line client for the course platform.
#[derive(Debug, Parser)]
#[command(name = "coursectl", version, about)]
pub struct Cli {
    /// SQLite URL holding the persistent credentials.
    #[arg(long = "db", env = "COURSE_DB_URL", default_value = "sqlite://coursectl.sqlite3")]
    pub db_url: String,

    /// Backend base URL; overrides `COURSE_API_BASE_URL`.
    #[arg(long)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the returned token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "COURSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored credentials.
    Logout,
    /// Show the session id, user, role and token expiry.
    Status,
    /// Show completion for a course.
    Progress {
        #[arg(long)]
        course: CourseId,
    },
    /// Mark a content item as completed.
    Complete {
        #[arg(long)]
        course: CourseId,
        #[arg(long)]
        section: SectionId,
        #[arg(long)]
        content: ContentId,
        #[arg(long, value_enum, default_value_t = KindArg::Video)]
        kind: KindArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Video,
    Document,
}

impl From<KindArg> for ContentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Video => ContentKind::Video,
            KindArg::Document => ContentKind::Document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_complete_command() {
        let cli = Cli::try_parse_from([
            "coursectl",
            "--db",
            "sqlite::memory:",
            "complete",
            "--course",
            "1",
            "--section",
            "2",
            "--content",
            "3",
            "--kind",
            "document",
        ])
        .unwrap();
        assert_eq!(cli.db_url, "sqlite::memory:");
        match cli.command {
            Command::Complete {
                course,
                section,
                content,
                kind,
            } => {
                assert_eq!(course, CourseId::new(1));
                assert_eq!(section, SectionId::new(2));
                assert_eq!(content, ContentId::new(3));
                assert_eq!(ContentKind::from(kind), ContentKind::Document);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(Cli::try_parse_from(["coursectl", "progress", "--course", "abc"]).is_err());
    }
}
