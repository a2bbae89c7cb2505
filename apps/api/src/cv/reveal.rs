//! Section-by-section reveal of a structured CV.
//!
//! The sequence is pure data. Pacing belongs to whoever consumes it (the SSE
//! handler sleeps between steps; tests just iterate).

use serde::Serialize;

use crate::cv::models::{
    Certification, Education, Experience, Language, ParsedCvData, PersonalInfo, Project,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "section", content = "data", rename_all = "camelCase")]
pub enum RevealStep {
    PersonalInfo(PersonalInfo),
    Education(Vec<Education>),
    Experience(Vec<Experience>),
    Projects(Vec<Project>),
    Skills(Vec<String>),
    Languages(Vec<Language>),
    Certifications(Vec<Certification>),
}

impl RevealStep {
    pub fn section(&self) -> &'static str {
        match self {
            RevealStep::PersonalInfo(_) => "personalInfo",
            RevealStep::Education(_) => "education",
            RevealStep::Experience(_) => "experience",
            RevealStep::Projects(_) => "projects",
            RevealStep::Skills(_) => "skills",
            RevealStep::Languages(_) => "languages",
            RevealStep::Certifications(_) => "certifications",
        }
    }
}

/// Steps in display order: personal info, education, experience, projects,
/// skills, languages, certifications.
pub fn reveal_steps(cv: &ParsedCvData) -> Vec<RevealStep> {
    vec![
        RevealStep::PersonalInfo(cv.personal_info.clone()),
        RevealStep::Education(cv.education.clone()),
        RevealStep::Experience(cv.experience.clone()),
        RevealStep::Projects(cv.projects.clone()),
        RevealStep::Skills(cv.skills.clone()),
        RevealStep::Languages(cv.languages.clone()),
        RevealStep::Certifications(cv.certifications.clone()),
    ]
}

/// The editable profile form, filled one section per step.
#[derive(Debug, Clone, Default)]
pub struct CvFormState {
    data: ParsedCvData,
    revealed: Vec<&'static str>,
}

impl CvFormState {
    pub fn apply(&mut self, step: RevealStep) {
        self.revealed.push(step.section());
        match step {
            RevealStep::PersonalInfo(info) => self.data.personal_info = info,
            RevealStep::Education(entries) => self.data.education = entries,
            RevealStep::Experience(entries) => self.data.experience = entries,
            RevealStep::Projects(entries) => self.data.projects = entries,
            RevealStep::Skills(skills) => self.data.skills = skills,
            RevealStep::Languages(entries) => self.data.languages = entries,
            RevealStep::Certifications(entries) => self.data.certifications = entries,
        }
    }

    pub fn revealed_sections(&self) -> &[&'static str] {
        &self.revealed
    }

    pub fn into_data(self) -> ParsedCvData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_cv() -> ParsedCvData {
        ParsedCvData {
            personal_info: PersonalInfo {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                ..PersonalInfo::default()
            },
            education: vec![Education {
                id: "edu-a".to_string(),
                institution: "MIT".to_string(),
                ..Education::default()
            }],
            skills: vec!["Rust".to_string(), "SQL".to_string()],
            languages: vec![Language {
                language: "English".to_string(),
                proficiency: "Native".to_string(),
            }],
            ..ParsedCvData::default()
        }
    }

    #[test]
    fn test_steps_follow_display_order() {
        let sections: Vec<_> = reveal_steps(&sample_cv())
            .iter()
            .map(RevealStep::section)
            .collect();
        assert_eq!(
            sections,
            vec![
                "personalInfo",
                "education",
                "experience",
                "projects",
                "skills",
                "languages",
                "certifications"
            ]
        );
    }

    #[test]
    fn test_applying_all_steps_reproduces_record() {
        let cv = sample_cv();
        let mut form = CvFormState::default();
        for step in reveal_steps(&cv) {
            form.apply(step);
        }
        assert_eq!(form.revealed_sections().len(), 7);
        assert_eq!(form.into_data(), cv);
    }

    #[test]
    fn test_each_step_fills_one_section() {
        let cv = sample_cv();
        let mut form = CvFormState::default();
        let mut steps = reveal_steps(&cv).into_iter();

        form.apply(steps.next().unwrap());
        let partial = form.clone().into_data();
        assert_eq!(partial.personal_info.first_name, "Jane");
        assert!(partial.education.is_empty());

        form.apply(steps.next().unwrap());
        let partial = form.into_data();
        assert_eq!(partial.education.len(), 1);
        assert!(partial.skills.is_empty());
    }

    #[test]
    fn test_step_serializes_as_section_and_data() {
        let step = RevealStep::Skills(vec!["Rust".to_string()]);
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            json!({"section": "skills", "data": ["Rust"]})
        );
        let step = RevealStep::PersonalInfo(PersonalInfo::default());
        assert_eq!(serde_json::to_value(&step).unwrap()["section"], "personalInfo");
    }
}
