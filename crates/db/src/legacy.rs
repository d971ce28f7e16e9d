//! Line codec for the flat files the site used before it had a database.
//!
//! `login.txt` holds one user per line as `username,password,full name,location`
//! with the password in plain text. `projects.txt` holds one project per line
//! as `title, description, owner,images`, where the first three separators
//! carry a trailing space and `images` is empty, a bare filename, or a
//! bracketed list such as `['a.png', 'b.png']`.

use thiserror::Error;

pub const USERS_FILE: &str = "login.txt";
pub const PROJECTS_FILE: &str = "projects.txt";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegacyParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("empty {0} field")]
    EmptyField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyProject {
    pub title: String,
    pub description: String,
    pub owner: String,
    pub images: Vec<String>,
}

/// A successfully parsed file plus the lines that were rejected (1-based line numbers)
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub rejected: Vec<(usize, LegacyParseError)>,
}

impl LegacyUser {
    pub fn parse_line(line: &str) -> Result<Self, LegacyParseError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
        if fields.len() != 4 {
            return Err(LegacyParseError::FieldCount {
                expected: 4,
                found: fields.len(),
            });
        }

        let username = fields[0].trim();
        if username.is_empty() {
            return Err(LegacyParseError::EmptyField("username"));
        }

        Ok(Self {
            username: username.to_string(),
            password: fields[1].to_string(),
            full_name: fields[2].trim().to_string(),
            location: fields[3].trim().to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}\n",
            clean_field(&self.username),
            clean_field(&self.password),
            clean_field(&self.full_name),
            clean_field(&self.location)
        )
    }
}

impl LegacyProject {
    pub fn parse_line(line: &str) -> Result<Self, LegacyParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.splitn(4, ',');
        let title = fields.next().unwrap_or_default().trim();
        let description = fields.next();
        let owner = fields.next();
        let (Some(description), Some(owner)) = (description, owner) else {
            let found = line.split(',').count();
            return Err(LegacyParseError::FieldCount { expected: 3, found });
        };

        if title.is_empty() {
            return Err(LegacyParseError::EmptyField("title"));
        }
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(LegacyParseError::EmptyField("owner"));
        }

        Ok(Self {
            title: title.to_string(),
            description: description.trim().to_string(),
            owner: owner.to_string(),
            images: fields.next().map(images_field).map(parse_images).unwrap_or_default(),
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}, {}, {},{}\n",
            clean_field(&self.title),
            clean_field(&self.description),
            clean_field(&self.owner),
            format_images(&self.images)
        )
    }
}

/// Cut the images column out of the rest of the line. A bracketed list may
/// contain commas; anything after it, or after a bare filename, is ignored.
fn images_field(rest: &str) -> &str {
    let trimmed = rest.trim_start();
    if trimmed.starts_with('[') {
        match trimmed.find(']') {
            Some(end) => &trimmed[..=end],
            None => trimmed,
        }
    } else {
        rest.split(',').next().unwrap_or_default()
    }
}

/// Parse the images column: `[]`, `name.png`, or `['a.png', "b.png"]`
pub fn parse_images(field: &str) -> Vec<String> {
    let field = field.trim();
    let inner = field
        .strip_prefix('[')
        .and_then(|f| f.strip_suffix(']'))
        .unwrap_or(field);

    inner
        .split(',')
        .map(|name| name.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|name| !name.is_empty() && *name != "None")
        .map(str::to_string)
        .collect()
}

fn format_images(images: &[String]) -> String {
    match images {
        [] => "[]".to_string(),
        [single] => clean_field(single),
        many => {
            let quoted: Vec<String> = many
                .iter()
                .map(|name| format!("'{}'", clean_field(name)))
                .collect();
            format!("[{}]", quoted.join(", "))
        }
    }
}

/// Commas and line breaks would corrupt the row layout
fn clean_field(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, ',' | '\n' | '\r') { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_file<T>(
    contents: &str,
    parse: impl Fn(&str) -> Result<T, LegacyParseError>,
) -> Parsed<T> {
    let mut records = Vec::new();
    let mut rejected = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse(line) {
            Ok(record) => records.push(record),
            Err(e) => rejected.push((index + 1, e)),
        }
    }
    Parsed { records, rejected }
}

pub fn parse_users(contents: &str) -> Parsed<LegacyUser> {
    parse_file(contents, LegacyUser::parse_line)
}

pub fn parse_projects(contents: &str) -> Parsed<LegacyProject> {
    parse_file(contents, LegacyProject::parse_line)
}
