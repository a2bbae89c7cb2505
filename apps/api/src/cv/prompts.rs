// CV structuring prompt templates.
// All prompts for the cv module are defined here.

pub const CV_EXTRACTION_SYSTEM: &str = "\
You are a precise resume data extractor for a campus recruiting platform. \
Convert resume text into structured JSON. \
You MUST respond with a single valid JSON object only, no markdown fences, no explanations. \
Copy values exactly as written in the resume; do not translate, summarize or embellish.";

pub const CV_EXTRACTION_PROMPT: &str = r#"Extract every piece of information from the resume below into a structured JSON object.

FILE NAME: {file_name}

RESUME TEXT:
{resume_text}

OUTPUT SCHEMA (return exactly this structure, with every key present):
{
  "personalInfo": {
    "firstName": "string",
    "lastName": "string",
    "email": "string",
    "phone": "string",
    "location": "string",
    "summary": "string"
  },
  "education": [
    {"id": "edu-1", "institution": "string", "degree": "string", "fieldOfStudy": "string",
     "startDate": "string", "endDate": "string", "grade": "string"}
  ],
  "experience": [
    {"id": "exp-1", "company": "string", "position": "string", "startDate": "string",
     "endDate": "string", "description": "string", "location": "string"}
  ],
  "projects": [
    {"id": "proj-1", "title": "string", "description": "string", "technologies": ["string"],
     "link": "string", "startDate": "string", "endDate": "string"}
  ],
  "skills": ["string"],
  "languages": [{"language": "string", "proficiency": "string"}],
  "certifications": [
    {"id": "cert-1", "name": "string", "issuer": "string", "date": "string", "credentialId": "string"}
  ]
}

RULES:
- Be exhaustive: include EVERY education entry, job, internship, project, skill, language and certification.
- Every string field must be a string. Use "" when the resume does not state a value. NEVER use null.
- Every list must be an array. Use [] when the resume has no such section.
- Give each list entry a synthetic id ("edu-1", "exp-1", "proj-1", "cert-1", ...).
- Dates: keep the resume's own format (e.g. "Sep 2021", "2021-09", "Present").
- "description" fields keep bullet points, one per line.
- "skills" is a flat list of individual skills, no categories.
- Do NOT wrap the JSON in markdown code fences."#;
