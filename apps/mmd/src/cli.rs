use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::models::profile::{Career, EducationStatus, ProfileError, ProfileForm};

#[derive(Parser, Debug)]
#[command(name = "mmd")]
#[command(about = "MMD career counseling client - profile, chat and job-market statistics")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Backend base URL, including the /api prefix (overrides MMD_API_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a profile and start an interactive counseling chat
    Chat {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Show job-market statistics for a profile
    Stats {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Inspect or clear the backend session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Autocomplete lookups
    Search {
        #[command(subcommand)]
        target: SearchTarget,
    },

    /// Run the local stub backend
    StubServer {
        /// Port to listen on (overrides MMD_STUB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Show the current session and its remaining lifetime
    Info,
    /// Show backend-wide session statistics
    Stats,
    /// Delete the backend session
    Clear {
        /// Ask the backend to drop the session even if it is still active
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SearchTarget {
    /// Job titles
    Jobs { query: String },
    /// University names
    Universities { query: String },
}

/// Profile wizard answers. Flags override values loaded from `--profile`.
#[derive(Args, Debug, Default, Clone)]
pub struct ProfileArgs {
    /// Load the profile form from a JSON file
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Education status, Korean label or code (e.g. university_graduate)
    #[arg(long)]
    pub education: Option<String>,

    #[arg(long)]
    pub major: Option<String>,

    #[arg(long)]
    pub university: Option<String>,

    /// 신입 / 경력 (or newcomer / experienced)
    #[arg(long)]
    pub career: Option<String>,

    /// Most recent job, required for 경력
    #[arg(long)]
    pub recent_job: Option<String>,

    /// Desired job title
    #[arg(long)]
    pub job: Option<String>,

    /// Desired work location
    #[arg(long)]
    pub location: Option<String>,

    /// Desired salary band, e.g. 3000-3500만원
    #[arg(long)]
    pub salary: Option<String>,

    /// Comma-separated tech stack
    #[arg(long)]
    pub tech_stack: Option<String>,

    /// Opening question (25 to 500 characters)
    #[arg(short, long)]
    pub question: Option<String>,
}

impl ProfileArgs {
    pub fn load_form(&self) -> Result<ProfileForm> {
        let mut form = match &self.profile {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read profile {}", path.display()))?;
                serde_json::from_str::<ProfileForm>(&raw)
                    .with_context(|| format!("Invalid profile JSON in {}", path.display()))?
            }
            None => ProfileForm::default(),
        };

        if let Some(education) = &self.education {
            form.education_status = Some(education.parse::<EducationStatus>()?);
        }
        if let Some(career) = &self.career {
            form.career = Some(career.parse::<Career>()?);
        }
        override_with(&mut form.major, &self.major);
        override_with(&mut form.desired_job, &self.job);
        override_with(&mut form.desired_location, &self.location);
        override_with(&mut form.desired_salary, &self.salary);
        override_with(&mut form.tech_stack, &self.tech_stack);
        override_with(&mut form.question, &self.question);
        if self.university.is_some() {
            form.university = self.university.clone();
        }
        if self.recent_job.is_some() {
            form.recent_job = self.recent_job.clone();
        }

        Ok(form)
    }
}

fn override_with(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}

/// Joins every validation failure into one error, one per line.
pub fn form_errors(errors: Vec<ProfileError>) -> anyhow::Error {
    let lines: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
    anyhow::anyhow!("Profile is incomplete:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_chat_flags() {
        let cli = Cli::parse_from([
            "mmd",
            "-v",
            "chat",
            "--education",
            "university_graduate",
            "--career",
            "신입",
            "--job",
            "백엔드 개발자",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Chat { profile } = cli.command else {
            panic!("expected chat");
        };
        let form = profile.load_form().unwrap();
        assert_eq!(
            form.education_status,
            Some(EducationStatus::UniversityGraduate)
        );
        assert_eq!(form.career, Some(Career::Newcomer));
        assert_eq!(form.desired_job, "백엔드 개발자");
    }

    #[test]
    fn test_flags_override_profile_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"education_status":"대학교 졸업","major":"경영학","career":"경력","recent_job":"마케터","desired_job":"PM","desired_location":"부산","desired_salary":"4000-4500만원","tech_stack":"SQL","question":"{}"}}"#,
            "q".repeat(30)
        )
        .unwrap();

        let args = ProfileArgs {
            profile: Some(file.path().to_path_buf()),
            location: Some("서울".to_string()),
            ..ProfileArgs::default()
        };
        let form = args.load_form().unwrap();
        assert_eq!(form.major, "경영학");
        assert_eq!(form.desired_location, "서울");
        assert_eq!(form.recent_job.as_deref(), Some("마케터"));

        let info = form.submit().unwrap();
        assert_eq!(info.profile.candidate_career, "경력, 최근 직업: 마케터");
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let args = ProfileArgs {
            career: Some("인턴".to_string()),
            ..ProfileArgs::default()
        };
        assert!(args.load_form().is_err());
    }

    #[test]
    fn test_form_errors_lists_every_failure() {
        let err = form_errors(ProfileForm::default().validate());
        let text = err.to_string();
        assert!(text.contains("education_status is required"));
        assert!(text.contains("question is required"));
    }

    #[test]
    fn test_session_clear_force_flag() {
        let cli = Cli::parse_from(["mmd", "--base-url", "http://x/api", "session", "clear", "--force"]);
        assert_eq!(cli.base_url.as_deref(), Some("http://x/api"));
        assert!(matches!(
            cli.command,
            Commands::Session {
                action: SessionAction::Clear { force: true }
            }
        ));
    }
}
