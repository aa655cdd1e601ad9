//! Origin allow-list checked during the WebSocket upgrade.
//!
//! Browsers attach an `Origin` header to WebSocket upgrades. The server
//! only accepts upgrades whose origin matches the configured list. Entries
//! are either exact origins (`http://localhost:3000`) or a single leading
//! wildcard label in the host (`https://*.vercel.app`).

/// Which origins may open a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept every origin.
    #[default]
    Any,

    /// Accept only origins matching one of the listed patterns.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Builds an allow-list policy from any iterable of patterns.
    pub fn allow_list<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(patterns.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if an upgrade carrying this `Origin` header may
    /// proceed.
    ///
    /// A missing header means a non-browser client; those are accepted,
    /// since the policy only exists to stop third-party pages from
    /// opening channels on a visitor's behalf.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        match self {
            Self::Any => true,
            Self::AllowList(patterns) => {
                patterns.iter().any(|p| origin_matches(p, origin))
            }
        }
    }
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once("*.") {
        None => pattern.eq_ignore_ascii_case(origin),
        Some((scheme, suffix)) => {
            let Some(rest) = strip_prefix_ignore_case(origin, scheme) else {
                return false;
            };
            let Some(label) =
                strip_suffix_ignore_case(rest, &format!(".{suffix}"))
            else {
                return false;
            };
            !label.is_empty() && !label.contains(['/', ':'])
        }
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}
