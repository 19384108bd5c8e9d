//! # UrlPath
//!
//! Decomposition of the path-like strings the drive is addressed with.
//!
//! Accepted shapes:
//!
//! | Input | scheme | host | path |
//! |-------|--------|------|------|
//! | `/GAMES/ELITE.PRG` | | | `/GAMES/ELITE.PRG` |
//! | `http://user:pw@host:8080/a.d64` | `http` | `host` | `/a.d64` |
//! | `cs:/c64/games` | `cs` | | `/c64/games` |
//!
//! Trailing separators are dropped from the path, so the storage root has an
//! empty path. The [`url`](UrlPath::url) string is always recomputed from the
//! parts; a `UrlPath` is never edited after parsing.

use std::fmt;

/// Immutable decomposition of a url or plain path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlPath {
    /// Scheme keyword without separator (`http`, `smb`, `cs`), empty for plain paths.
    pub scheme: String,
    /// User name from the authority part.
    pub user: String,
    /// Password from the authority part.
    pub password: String,
    /// Host name.
    pub host: String,
    /// Port, kept as text.
    pub port: String,
    /// Path below the authority, no trailing separator.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Text after the last `.` of `name`, empty if none.
    pub extension: String,
    hierarchical: bool,
    url: String,
}

impl UrlPath {
    /// Parse a path-like string.
    ///
    /// Parsing never fails: anything that is not recognisably a url is taken
    /// as a plain path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use iecdrive::UrlPath;
    ///
    /// let u = UrlPath::parse("smb://guest@nas:445/c64/games.d64");
    /// assert_eq!(u.scheme, "smb");
    /// assert_eq!(u.user, "guest");
    /// assert_eq!(u.port, "445");
    /// assert_eq!(u.name, "games.d64");
    /// assert_eq!(u.extension, "d64");
    /// assert_eq!(u.url(), "smb://guest@nas:445/c64/games.d64");
    /// ```
    pub fn parse(input: &str) -> Self {
        let mut parsed = UrlPath::default();

        let rest = if let Some((scheme, rest)) = split_scheme(input, "://") {
            parsed.scheme = scheme.to_string();
            parsed.hierarchical = true;
            let (authority, path) = match rest.find('/') {
                Some(idx) => rest.split_at(idx),
                None => (rest, ""),
            };
            parsed.parse_authority(authority);
            path
        } else if let Some((scheme, rest)) = split_scheme(input, ":") {
            parsed.scheme = scheme.to_string();
            rest
        } else {
            input
        };

        parsed.path = rest.trim_end_matches('/').to_string();
        parsed.name = parsed.path.rsplit('/').next().unwrap_or_default().to_string();
        parsed.extension = match parsed.name.rfind('.') {
            Some(idx) if idx > 0 => parsed.name[idx + 1..].to_string(),
            _ => String::new(),
        };
        parsed.url = parsed.assemble(&parsed.path);
        parsed
    }

    fn parse_authority(&mut self, authority: &str) {
        let host_port = match authority.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                match userinfo.split_once(':') {
                    Some((user, password)) => {
                        self.user = user.to_string();
                        self.password = password.to_string();
                    }
                    None => self.user = userinfo.to_string(),
                }
                host_port
            }
            None => authority,
        };
        match host_port.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                self.host = host.to_string();
                self.port = port.to_string();
            }
            _ => self.host = host_port.to_string(),
        }
    }

    fn assemble(&self, path: &str) -> String {
        if self.scheme.is_empty() {
            return path.to_string();
        }
        if !self.hierarchical {
            return format!("{}:{}", self.scheme, path);
        }
        let mut out = format!("{}://", self.scheme);
        if !self.user.is_empty() {
            out.push_str(&self.user);
            if !self.password.is_empty() {
                out.push(':');
                out.push_str(&self.password);
            }
            out.push('@');
        }
        out.push_str(&self.host);
        if !self.port.is_empty() {
            out.push(':');
            out.push_str(&self.port);
        }
        out.push_str(path);
        out
    }

    /// The reassembled url.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` when the path part is empty (the root of its backend).
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Url of the backend root: scheme and authority with an empty path.
    pub fn root(&self) -> String {
        self.assemble("")
    }

    /// Url with the last path segment removed. The root is its own parent.
    pub fn parent(&self) -> String {
        match self.path.rfind('/') {
            Some(idx) => self.assemble(&self.path[..idx]),
            None => self.assemble(""),
        }
    }

    /// Url of a child named `name`.
    pub fn join(&self, name: &str) -> String {
        if self.url.ends_with('/') {
            format!("{}{}", self.url, name)
        } else {
            format!("{}/{}", self.url, name)
        }
    }
}

impl fmt::Display for UrlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Split `input` at `sep` if what precedes it is a plausible scheme keyword.
fn split_scheme<'a>(input: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let idx = input.find(sep)?;
    let scheme = &input[..idx];
    let valid = !scheme.is_empty()
        && scheme.as_bytes()[0].is_ascii_alphabetic()
        && scheme
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
    valid.then(|| (scheme, &input[idx + sep.len()..]))
}
