use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum and maximum length (in characters) of the free-text question.
pub const QUESTION_MIN_CHARS: usize = 25;
pub const QUESTION_MAX_CHARS: usize = 500;

/// The job-seeker profile sent with every chat and statistics call.
/// Built once by [`ProfileForm::submit`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub candidate_major: String,
    pub candidate_career: String,
    pub candidate_interest: String,
    pub candidate_location: String,
    #[serde(default)]
    pub candidate_tech_stack: Vec<String>,
    pub candidate_salary: String,
}

/// A submitted profile plus the question that opens the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub candidate_question: String,
}

impl UserInfo {
    /// Same profile, different question. Used for every follow-up chat turn.
    pub fn with_question(&self, question: impl Into<String>) -> UserInfo {
        UserInfo {
            profile: self.profile.clone(),
            candidate_question: question.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EducationStatus {
    #[serde(rename = "대학교 재학")]
    UniversityStudent,
    #[serde(rename = "대학교 졸업")]
    UniversityGraduate,
    #[serde(rename = "대학원 재학")]
    GraduateStudent,
    #[serde(rename = "대학원 졸업")]
    GraduateGraduate,
    #[serde(rename = "고등학교 졸업")]
    HighSchoolGraduate,
}

impl EducationStatus {
    pub const ALL: [EducationStatus; 5] = [
        EducationStatus::UniversityStudent,
        EducationStatus::UniversityGraduate,
        EducationStatus::GraduateStudent,
        EducationStatus::GraduateGraduate,
        EducationStatus::HighSchoolGraduate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EducationStatus::UniversityStudent => "대학교 재학",
            EducationStatus::UniversityGraduate => "대학교 졸업",
            EducationStatus::GraduateStudent => "대학원 재학",
            EducationStatus::GraduateGraduate => "대학원 졸업",
            EducationStatus::HighSchoolGraduate => "고등학교 졸업",
        }
    }

    fn code(self) -> &'static str {
        match self {
            EducationStatus::UniversityStudent => "university_student",
            EducationStatus::UniversityGraduate => "university_graduate",
            EducationStatus::GraduateStudent => "graduate_student",
            EducationStatus::GraduateGraduate => "graduate_graduate",
            EducationStatus::HighSchoolGraduate => "high_school_graduate",
        }
    }
}

impl fmt::Display for EducationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EducationStatus {
    type Err = ProfileError;

    /// Accepts either the Korean label or the snake_case code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        EducationStatus::ALL
            .into_iter()
            .find(|status| status.label() == s || status.code() == s)
            .ok_or_else(|| ProfileError::UnknownOption {
                field: "education_status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Career {
    #[serde(rename = "신입")]
    Newcomer,
    #[serde(rename = "경력")]
    Experienced,
}

impl Career {
    pub fn label(self) -> &'static str {
        match self {
            Career::Newcomer => "신입",
            Career::Experienced => "경력",
        }
    }
}

impl fmt::Display for Career {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Career {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "신입" | "newcomer" => Ok(Career::Newcomer),
            "경력" | "experienced" => Ok(Career::Experienced),
            other => Err(ProfileError::UnknownOption {
                field: "career",
                value: other.to_string(),
            }),
        }
    }
}

/// Desired annual salary, in 만원 bands.
pub const SALARY_BANDS: [&str; 10] = [
    "2000만원 이하",
    "2000-2500만원",
    "2500-3000만원",
    "3000-3500만원",
    "3500-4000만원",
    "4000-4500만원",
    "4500-5000만원",
    "5000-6000만원",
    "6000-7000만원",
    "7000만원 이상",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Unknown {field} option: {value}")]
    UnknownOption { field: &'static str, value: String },

    #[error("Question must be between {min} and {max} characters (got {actual})")]
    QuestionLength {
        min: usize,
        max: usize,
        actual: usize,
    },
}

/// Raw answers collected by the profile wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileForm {
    pub education_status: Option<EducationStatus>,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub university: Option<String>,
    pub career: Option<Career>,
    #[serde(default)]
    pub recent_job: Option<String>,
    #[serde(default)]
    pub desired_job: String,
    #[serde(default)]
    pub desired_location: String,
    #[serde(default)]
    pub desired_salary: String,
    /// Comma-separated, e.g. `"Rust, Python, AWS"`.
    #[serde(default)]
    pub tech_stack: String,
    #[serde(default)]
    pub question: String,
}

impl ProfileForm {
    /// Runs every check and returns all failures, in field order.
    pub fn validate(&self) -> Vec<ProfileError> {
        let mut errors = Vec::new();

        if self.education_status.is_none() {
            errors.push(ProfileError::Missing("education_status"));
        }
        if self.major.trim().is_empty() {
            errors.push(ProfileError::Missing("major"));
        }
        match self.career {
            None => errors.push(ProfileError::Missing("career")),
            Some(Career::Experienced) if is_blank(self.recent_job.as_deref()) => {
                errors.push(ProfileError::Missing("recent_job"));
            }
            Some(_) => {}
        }
        if self.desired_job.trim().is_empty() {
            errors.push(ProfileError::Missing("desired_job"));
        }
        if self.desired_location.trim().is_empty() {
            errors.push(ProfileError::Missing("desired_location"));
        }
        let salary = self.desired_salary.trim();
        if salary.is_empty() {
            errors.push(ProfileError::Missing("desired_salary"));
        } else if !SALARY_BANDS.contains(&salary) {
            errors.push(ProfileError::UnknownOption {
                field: "desired_salary",
                value: salary.to_string(),
            });
        }

        let question = self.question.trim();
        let chars = question.chars().count();
        if chars == 0 {
            errors.push(ProfileError::Missing("question"));
        } else if !(QUESTION_MIN_CHARS..=QUESTION_MAX_CHARS).contains(&chars) {
            errors.push(ProfileError::QuestionLength {
                min: QUESTION_MIN_CHARS,
                max: QUESTION_MAX_CHARS,
                actual: chars,
            });
        }

        errors
    }

    /// Validates and flattens the wizard answers into the wire profile.
    pub fn submit(&self) -> Result<UserInfo, Vec<ProfileError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        // validate() guarantees both are present
        let (Some(status), Some(career)) = (self.education_status, self.career) else {
            return Err(vec![ProfileError::Missing("education_status")]);
        };

        let university = self
            .university
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or("미기재");

        let candidate_career = match self.recent_job.as_deref().map(str::trim) {
            Some(job) if !job.is_empty() && career == Career::Experienced => {
                format!("{career}, 최근 직업: {job}")
            }
            _ => career.to_string(),
        };

        Ok(UserInfo {
            profile: UserProfile {
                candidate_major: format!(
                    "대학교: {university}, 전공: {}, 상태: {status}",
                    self.major.trim()
                ),
                candidate_career,
                candidate_interest: self.desired_job.trim().to_string(),
                candidate_location: self.desired_location.trim().to_string(),
                candidate_tech_stack: split_tech_stack(&self.tech_stack),
                candidate_salary: self.desired_salary.trim().to_string(),
            },
            candidate_question: self.question.trim().to_string(),
        })
    }

    /// Validates everything except the question. Statistics lookups need only the profile.
    pub fn submit_profile(&self) -> Result<UserProfile, Vec<ProfileError>> {
        let mut form = self.clone();
        form.question = "?".repeat(QUESTION_MIN_CHARS);
        form.submit().map(|info| info.profile)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Splits a comma-separated stack, trimming entries and dropping empties.
pub fn split_tech_stack(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
