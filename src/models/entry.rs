#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub path: String,
    pub name: String,
    pub folder: String,
}

impl EntrySummary {
    pub fn from_path(path: &str) -> Self {
        let path = path.trim_matches('/');
        let (folder, name) = match path.rsplit_once('/') {
            Some((folder, name)) => (folder.to_string(), name.to_string()),
            None => (String::new(), path.to_string()),
        };
        Self {
            path: path.to_string(),
            name,
            folder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryDetail {
    pub path: String,
    pub password: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: String,
}

impl EntryDetail {
    /// Parses the usual `pass` layout: the password on the first line,
    /// then optional `key: value` lines, then free-form notes.
    pub fn parse(path: &str, raw: &str) -> Self {
        let mut lines = raw.lines();
        let password = lines.next().unwrap_or_default().to_string();
        let mut detail = Self {
            path: path.to_string(),
            password,
            ..Self::default()
        };

        let mut notes = Vec::new();
        for line in lines {
            match line.split_once(':') {
                Some((key, value)) if key.trim().eq_ignore_ascii_case("username")
                    || key.trim().eq_ignore_ascii_case("login")
                    || key.trim().eq_ignore_ascii_case("user") =>
                {
                    detail.username = Some(value.trim().to_string());
                }
                Some((key, value)) if key.trim().eq_ignore_ascii_case("url") => {
                    detail.url = Some(value.trim().to_string());
                }
                _ => notes.push(line),
            }
        }
        detail.notes = notes.join("\n");
        detail
    }
}
