//! Request metadata extracted from the session environment.

use std::collections::BTreeMap;

use url::{form_urlencoded, Url};

/// Everything the switch told us about an inbound session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgiRequest {
    path: String,
    args: Vec<String>,
    kwargs: BTreeMap<String, Vec<String>>,
    environment: BTreeMap<String, String>,
}

impl AgiRequest {
    /// Build a request from the `agi_*` environment sent at session start.
    pub fn from_environment(environment: BTreeMap<String, String>) -> Self {
        let raw = environment
            .get("agi_request")
            .map(String::as_str)
            .unwrap_or_default();
        let (path, query) = split_request(raw);

        let mut args = Vec::new();
        let mut kwargs: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if let Some(query) = query {
            for item in query.split('&').filter(|item| !item.is_empty()) {
                let Some((key, value)) = form_urlencoded::parse(item.as_bytes()).next() else {
                    continue;
                };
                if item.contains('=') {
                    kwargs
                        .entry(key.into_owned())
                        .or_default()
                        .push(value.into_owned());
                } else {
                    args.push(key.into_owned());
                }
            }
        }

        // Dialplan arguments follow the query-string positionals.
        for n in 1.. {
            match environment.get(&format!("agi_arg_{n}")) {
                Some(value) => args.push(value.clone()),
                None => break,
            }
        }

        Self {
            path,
            args,
            kwargs,
            environment,
        }
    }

    /// Build a request for a bare path. Mostly useful in tests.
    pub fn from_path(request: &str) -> Self {
        let mut environment = BTreeMap::new();
        environment.insert("agi_request".to_string(), request.to_string());
        Self::from_environment(environment)
    }

    /// Script path with the leading `/` removed, e.g. `demo`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Positional arguments, in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Keyword arguments; repeated keys keep every value in order.
    pub fn kwargs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.kwargs
    }

    /// First value of a keyword argument.
    pub fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Raw environment variable, e.g. `agi_channel`.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }

    /// The full `agi_request` value as sent by the switch.
    pub fn raw_request(&self) -> &str {
        self.env("agi_request").unwrap_or_default()
    }

    /// Caller ID number, if the switch knows it.
    pub fn caller_id(&self) -> Option<&str> {
        self.env("agi_callerid")
            .map(str::trim)
            .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("unknown"))
    }
}

/// Split `agi://host:port/path?query` (or a bare `path?query`) into path and query.
fn split_request(raw: &str) -> (String, Option<String>) {
    if let Ok(url) = Url::parse(raw) {
        if url.has_host() {
            let path = url.path().trim_start_matches('/').to_string();
            return (path, url.query().map(str::to_string));
        }
    }

    match raw.split_once('?') {
        Some((path, query)) => (path.trim_start_matches('/').to_string(), Some(query.to_string())),
        None => (raw.trim_start_matches('/').to_string(), None),
    }
}
