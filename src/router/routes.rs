//! Static route table and location matching.
//!
//! DESIGN
//! ======
//! Records are declared once at startup and flattened into matchers, each
//! carrying the full ancestor chain so the guard can inspect every matched
//! record's metadata. The table is immutable after construction.
//!
//! Matching picks the most specific route: segments compare left to right
//! with static > `:param` > `*`, then the deeper chain wins, then
//! registration order.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::RouterError;

/// Per-route metadata consulted by the guard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteMeta {
    /// `None` means the route never declared it; treated as public.
    pub requires_auth: Option<bool>,
}

impl RouteMeta {
    #[must_use]
    pub fn protected() -> Self {
        Self { requires_auth: Some(true) }
    }

    #[must_use]
    pub fn public() -> Self {
        Self { requires_auth: Some(false) }
    }
}

/// A route as declared by the application.
#[derive(Clone, Debug)]
pub struct RouteRecord {
    /// Absolute for top-level records; relative to the parent for children
    /// unless it starts with `/`.
    pub path: String,
    pub name: Option<String>,
    /// Identifier of the view the host loads on first visit.
    pub view: Option<String>,
    pub meta: RouteMeta,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), name: None, view: None, meta: RouteMeta::default(), children: Vec::new() }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn requires_auth(self, requires_auth: bool) -> Self {
        self.meta(RouteMeta { requires_auth: Some(requires_auth) })
    }

    #[must_use]
    pub fn child(mut self, child: RouteRecord) -> Self {
        self.children.push(child);
        self
    }
}

/// One record of a matched chain, without its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedRoute {
    /// Full absolute path pattern, e.g. `/users/:id`.
    pub path: String,
    pub name: Option<String>,
    pub view: Option<String>,
    pub meta: RouteMeta,
}

/// Result of resolving a location against the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Normalized path without query or fragment.
    pub path: String,
    /// Location as requested, including query and fragment.
    pub full_path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub params: BTreeMap<String, String>,
    /// Ancestor chain, outermost first. Empty when nothing matched.
    pub matched: Vec<Arc<MatchedRoute>>,
}

impl ResolvedRoute {
    /// `true` if any record in the chain requires authentication.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.matched
            .iter()
            .any(|r| r.meta.requires_auth.unwrap_or(false))
    }

    /// Name of the innermost matched record.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.matched.last().and_then(|r| r.name.as_deref())
    }

    /// View of the innermost matched record.
    #[must_use]
    pub fn view(&self) -> Option<&str> {
        self.matched.last().and_then(|r| r.view.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix(':') {
            Self::Param(name.to_owned())
        } else if let Some(name) = raw.strip_prefix('*') {
            Self::CatchAll(if name.is_empty() { "pathMatch".to_owned() } else { name.to_owned() })
        } else {
            Self::Static(raw.to_owned())
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Static(_) => 3,
            Self::Param(_) => 2,
            Self::CatchAll(_) => 1,
        }
    }
}

/// Rank of "path ends here"; outranks a catch-all consuming nothing.
const END_RANK: u8 = 4;

struct Matcher {
    segments: Vec<Segment>,
    score: Vec<u8>,
    chain: Vec<Arc<MatchedRoute>>,
}

impl Matcher {
    /// Specificity first, then depth so an empty-path child beats its parent.
    fn sort_key(&self) -> (&[u8], usize) {
        (&self.score, self.chain.len())
    }

    fn matches(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    params.insert(name.clone(), parts.get(i..).map(|rest| rest.join("/")).unwrap_or_default());
                    return Some(params);
                }
                Segment::Static(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.insert(name.clone(), (*value).to_owned());
                }
            }
        }
        (parts.len() == self.segments.len()).then_some(params)
    }
}

/// Immutable, validated set of routes.
pub struct RouteTable {
    matchers: Vec<Matcher>,
}

impl RouteTable {
    /// Validate and flatten route records.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPath`] for empty or non-absolute top-level
    /// paths and [`RouterError::DuplicateName`] for reused names.
    pub fn new(records: Vec<RouteRecord>) -> Result<Self, RouterError> {
        let mut matchers = Vec::new();
        let mut names = HashSet::new();
        for record in &records {
            if !record.path.starts_with('/') {
                return Err(RouterError::InvalidPath(record.path.clone()));
            }
            flatten(record, "", &[], &mut names, &mut matchers)?;
        }
        Ok(Self { matchers })
    }

    /// Resolve a location like `/users/42?tab=posts#top`.
    #[must_use]
    pub fn resolve(&self, location: &str) -> ResolvedRoute {
        let (without_hash, _) = location.split_once('#').unwrap_or((location, ""));
        let (raw_path, query) = match without_hash.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (without_hash, None),
        };
        let path = normalize(raw_path);
        let parts = split_path(&path);

        let mut best: Option<(&Matcher, BTreeMap<String, String>)> = None;
        for matcher in &self.matchers {
            let Some(params) = matcher.matches(&parts) else {
                continue;
            };
            // Strictly greater keeps the earliest registration on ties.
            if best.as_ref().is_none_or(|(b, _)| matcher.sort_key() > b.sort_key()) {
                best = Some((matcher, params));
            }
        }

        let (matched, params) = match best {
            Some((matcher, params)) => (matcher.chain.clone(), params),
            None => (Vec::new(), BTreeMap::new()),
        };
        ResolvedRoute { path, full_path: location.to_owned(), query, params, matched }
    }

    /// Build a location for the route called `name`, filling `:param`
    /// segments from `params`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownName`] or [`RouterError::MissingParam`].
    pub fn path_for(&self, name: &str, params: &BTreeMap<String, String>) -> Result<String, RouterError> {
        let matcher = self
            .matchers
            .iter()
            .find(|m| m.chain.last().and_then(|r| r.name.as_deref()) == Some(name))
            .ok_or_else(|| RouterError::UnknownName(name.to_owned()))?;

        let mut out = Vec::with_capacity(matcher.segments.len());
        for segment in &matcher.segments {
            match segment {
                Segment::Static(s) => out.push(s.clone()),
                Segment::Param(p) => out.push(
                    params
                        .get(p)
                        .cloned()
                        .ok_or_else(|| RouterError::MissingParam { route: name.to_owned(), param: p.clone() })?,
                ),
                Segment::CatchAll(p) => {
                    if let Some(rest) = params.get(p).filter(|r| !r.is_empty()) {
                        out.push(rest.clone());
                    }
                }
            }
        }
        Ok(format!("/{}", out.join("/")))
    }
}

fn flatten(
    record: &RouteRecord,
    parent_path: &str,
    parent_chain: &[Arc<MatchedRoute>],
    names: &mut HashSet<String>,
    out: &mut Vec<Matcher>,
) -> Result<(), RouterError> {
    if let Some(name) = &record.name {
        if !names.insert(name.clone()) {
            return Err(RouterError::DuplicateName(name.clone()));
        }
    }

    let full_path = if record.path.starts_with('/') {
        normalize(&record.path)
    } else {
        normalize(&format!("{parent_path}/{}", record.path))
    };
    let segments: Vec<Segment> = split_path(&full_path).into_iter().map(Segment::parse).collect();
    if segments
        .iter()
        .rev()
        .skip(1)
        .any(|s| matches!(s, Segment::CatchAll(_)))
    {
        return Err(RouterError::InvalidPath(full_path));
    }

    let mut chain = parent_chain.to_vec();
    chain.push(Arc::new(MatchedRoute {
        path: full_path.clone(),
        name: record.name.clone(),
        view: record.view.clone(),
        meta: record.meta,
    }));

    let mut score: Vec<u8> = segments.iter().map(Segment::rank).collect();
    if !matches!(segments.last(), Some(Segment::CatchAll(_))) {
        score.push(END_RANK);
    }
    out.push(Matcher { segments, score, chain: chain.clone() });

    for child in &record.children {
        flatten(child, &full_path, &chain, names, out)?;
    }
    Ok(())
}

/// Collapse repeated slashes and drop the trailing one (root stays `/`).
pub(crate) fn normalize(path: &str) -> String {
    let parts = split_path(path);
    format!("/{}", parts.join("/"))
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
