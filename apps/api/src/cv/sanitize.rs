//! Re-shapes untrusted model JSON into a complete `ParsedCvData`.
//!
//! This is the only place model output is interpreted. Nothing here fails:
//! unknown keys are ignored, wrong types collapse to defaults, and every list
//! entry gets a fresh ID regardless of what the model sent.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::cv::models::{
    Certification, Education, Experience, Language, ParsedCvData, PersonalInfo, Project,
};

type Object = Map<String, Value>;

pub fn sanitize_cv(root: &Value) -> ParsedCvData {
    let Some(root) = root.as_object() else {
        return ParsedCvData::default();
    };

    ParsedCvData {
        personal_info: field(root, &["personalInfo", "personal_info", "personal", "contact"])
            .and_then(Value::as_object)
            .map(personal_info)
            .unwrap_or_default(),
        education: objects(root, &["education", "educations"])
            .map(education)
            .collect(),
        experience: objects(
            root,
            &["experience", "experiences", "workExperience", "work_experience", "employment"],
        )
        .map(experience)
        .collect(),
        projects: objects(root, &["projects"]).map(project).collect(),
        skills: skills(field(root, &["skills"])),
        languages: languages(field(root, &["languages"])),
        certifications: objects(root, &["certifications", "certificates"])
            .map(certification)
            .collect(),
    }
}

fn entry_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

// ────────────────────────────────────────────────────────────────────────────
// Sections
// ────────────────────────────────────────────────────────────────────────────

fn personal_info(obj: &Object) -> PersonalInfo {
    let mut info = PersonalInfo {
        first_name: text(obj, &["firstName", "first_name", "givenName"]),
        last_name: text(obj, &["lastName", "last_name", "surname", "familyName"]),
        email: text(obj, &["email", "emailAddress", "email_address"]),
        phone: text(obj, &["phone", "phoneNumber", "phone_number", "mobile"]),
        location: text(obj, &["location", "address", "city"]),
        summary: text(obj, &["summary", "profile", "objective", "about"]),
    };

    // Models sometimes return only a combined name
    if info.first_name.is_empty() && info.last_name.is_empty() {
        let full_name = text(obj, &["fullName", "full_name", "name"]);
        if let Some((first, last)) = full_name.split_once(char::is_whitespace) {
            info.first_name = first.to_string();
            info.last_name = last.trim().to_string();
        } else {
            info.first_name = full_name;
        }
    }
    info
}

fn education(obj: &Object) -> Education {
    Education {
        id: entry_id("edu"),
        institution: text(obj, &["institution", "school", "university", "college"]),
        degree: text(obj, &["degree", "qualification"]),
        field_of_study: text(obj, &["fieldOfStudy", "field_of_study", "field", "major"]),
        start_date: text(obj, &["startDate", "start_date", "from"]),
        end_date: text(obj, &["endDate", "end_date", "to"]),
        grade: text(obj, &["grade", "gpa", "score"]),
    }
}

fn experience(obj: &Object) -> Experience {
    Experience {
        id: entry_id("exp"),
        company: text(obj, &["company", "employer", "organization"]),
        position: text(obj, &["position", "title", "role", "jobTitle"]),
        start_date: text(obj, &["startDate", "start_date", "from"]),
        end_date: text(obj, &["endDate", "end_date", "to"]),
        description: text(obj, &["description", "responsibilities", "highlights", "summary"]),
        location: text(obj, &["location", "city"]),
    }
}

fn project(obj: &Object) -> Project {
    Project {
        id: entry_id("proj"),
        title: text(obj, &["title", "name"]),
        description: text(obj, &["description", "summary"]),
        technologies: string_list(field(
            obj,
            &["technologies", "techStack", "tech_stack", "tools", "stack"],
        )),
        link: text(obj, &["link", "url", "github", "repository"]),
        start_date: text(obj, &["startDate", "start_date", "from"]),
        end_date: text(obj, &["endDate", "end_date", "to"]),
    }
}

fn certification(obj: &Object) -> Certification {
    Certification {
        id: entry_id("cert"),
        name: text(obj, &["name", "title"]),
        issuer: text(obj, &["issuer", "issuedBy", "organization", "authority"]),
        date: text(obj, &["date", "issueDate", "issue_date", "year"]),
        credential_id: text(obj, &["credentialId", "credential_id", "credentialID"]),
    }
}

/// Accepts a flat list, a category → list object, or a comma-separated
/// string. Case-insensitive de-duplication keeps the first spelling.
fn skills(value: Option<&Value>) -> Vec<String> {
    let mut collected = Vec::new();
    match value {
        Some(Value::Object(categories)) => {
            for group in categories.values() {
                collected.extend(string_list(Some(group)));
            }
        }
        other => collected.extend(string_list(other)),
    }

    let mut seen = std::collections::HashSet::new();
    collected
        .into_iter()
        .filter(|skill| seen.insert(skill.to_lowercase()))
        .collect()
}

fn languages(value: Option<&Value>) -> Vec<Language> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) if !name.trim().is_empty() => Some(Language {
                language: name.trim().to_string(),
                proficiency: String::new(),
            }),
            Value::Object(obj) => Some(Language {
                language: text(obj, &["language", "name"]),
                proficiency: text(obj, &["proficiency", "level", "fluency"]),
            }),
            _ => None,
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Value helpers
// ────────────────────────────────────────────────────────────────────────────

/// First non-null value under any of the given keys.
fn field<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

/// Object entries of the first list found under `keys`; other entries are dropped.
fn objects<'a>(obj: &'a Object, keys: &[&str]) -> impl Iterator<Item = &'a Object> {
    field(obj, keys)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn text(obj: &Object, keys: &[&str]) -> String {
    field(obj, keys).map(value_text).unwrap_or_default()
}

/// Strings are trimmed, numbers and booleans stringified, string lists joined
/// one per line. Anything else becomes "".
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null | Value::Object(_) => String::new(),
    }
}

/// A list of scalars, or a comma-separated string. Objects with a `name`
/// field contribute that name.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(obj) => text(obj, &["name", "skill", "value"]),
                other => value_text(other),
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|part| part.trim().to_string()).collect(),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => vec![value_text(scalar)],
        _ => Vec::new(),
    };
    items.into_iter().filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_missing_sections_default() {
        let cv = sanitize_cv(&json!({"personalInfo": {"firstName": "Jane"}}));
        assert_eq!(cv.personal_info.first_name, "Jane");
        assert_eq!(cv.personal_info.email, "");
        assert!(cv.education.is_empty());
        assert!(cv.skills.is_empty());
        assert!(cv.certifications.is_empty());
    }

    #[test]
    fn test_non_object_root_is_default() {
        assert_eq!(sanitize_cv(&json!([1, 2, 3])), ParsedCvData::default());
        assert_eq!(sanitize_cv(&json!("text")), ParsedCvData::default());
    }

    #[test]
    fn test_nulls_and_scalars_are_stringified() {
        let cv = sanitize_cv(&json!({
            "personalInfo": {"firstName": null, "lastName": "Doe", "phone": 5550100},
            "education": [{"institution": "MIT", "grade": 3.9, "endDate": null}]
        }));
        assert_eq!(cv.personal_info.first_name, "");
        assert_eq!(cv.personal_info.phone, "5550100");
        assert_eq!(cv.education[0].grade, "3.9");
        assert_eq!(cv.education[0].end_date, "");
    }

    #[test]
    fn test_non_object_entries_are_dropped() {
        let cv = sanitize_cv(&json!({
            "experience": ["Acme", {"company": "Globex", "title": "Engineer"}, 42, null]
        }));
        assert_eq!(cv.experience.len(), 1);
        assert_eq!(cv.experience[0].company, "Globex");
        assert_eq!(cv.experience[0].position, "Engineer");
    }

    #[test]
    fn test_wrong_list_type_becomes_empty() {
        let cv = sanitize_cv(&json!({"education": "MIT", "projects": {"title": "x"}}));
        assert!(cv.education.is_empty());
        assert!(cv.projects.is_empty());
    }

    #[test]
    fn test_model_ids_are_replaced_and_unique() {
        let cv = sanitize_cv(&json!({
            "education": [{"id": "1"}, {"id": "1"}],
            "experience": [{"id": "1"}],
            "projects": [{"id": "1"}, {}],
            "certifications": [{"id": "1"}]
        }));
        let ids = cv.entry_ids();
        assert_eq!(ids.len(), 6);
        assert!(ids.iter().all(|id| *id != "1"));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        assert!(cv.education[0].id.starts_with("edu-"));
        assert!(cv.certifications[0].id.starts_with("cert-"));
    }

    #[test]
    fn test_languages_accept_bare_strings() {
        let cv = sanitize_cv(&json!({
            "languages": ["English", {"language": "German", "proficiency": "B2"}, "", 7]
        }));
        assert_eq!(
            cv.languages,
            vec![
                Language {
                    language: "English".to_string(),
                    proficiency: String::new()
                },
                Language {
                    language: "German".to_string(),
                    proficiency: "B2".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_skills_from_categories_are_deduplicated() {
        let cv = sanitize_cv(&json!({
            "skills": {
                "languages": ["Rust", "Python"],
                "tools": "Docker, rust , Git",
                "other": null
            }
        }));
        assert_eq!(cv.skills, vec!["Rust", "Python", "Docker", "Git"]);
    }

    #[test]
    fn test_skills_flat_list_with_objects() {
        let cv = sanitize_cv(&json!({"skills": ["SQL", {"name": "Kubernetes"}, "sql", ""]}));
        assert_eq!(cv.skills, vec!["SQL", "Kubernetes"]);
    }

    #[test]
    fn test_technologies_from_comma_string() {
        let cv = sanitize_cv(&json!({
            "projects": [{"name": "Chat app", "technologies": "React, Node.js ,, WebSockets"}]
        }));
        assert_eq!(cv.projects[0].title, "Chat app");
        assert_eq!(cv.projects[0].technologies, vec!["React", "Node.js", "WebSockets"]);
    }

    #[test]
    fn test_key_aliases() {
        let cv = sanitize_cv(&json!({
            "personal_info": {"name": "Jane van Doe", "emailAddress": "jane@x.com"},
            "workExperience": [{"employer": "Acme", "role": "Intern", "responsibilities": ["Built APIs", "Wrote tests"]}],
            "certificates": [{"title": "AWS SAA", "issuedBy": "Amazon", "credential_id": "ABC-1"}]
        }));
        assert_eq!(cv.personal_info.first_name, "Jane");
        assert_eq!(cv.personal_info.last_name, "van Doe");
        assert_eq!(cv.personal_info.email, "jane@x.com");
        assert_eq!(cv.experience[0].company, "Acme");
        assert_eq!(cv.experience[0].position, "Intern");
        assert_eq!(cv.experience[0].description, "Built APIs\nWrote tests");
        assert_eq!(cv.certifications[0].name, "AWS SAA");
        assert_eq!(cv.certifications[0].issuer, "Amazon");
        assert_eq!(cv.certifications[0].credential_id, "ABC-1");
    }
}
