// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Path templates for resource names and REST routes.
//!
//! A path template is a pattern over slash-separated paths, e.g.
//! `projects/*/locations/{location}/keys/{key=**}`. Templates support:
//!
//! - literal segments, compared byte for byte (no percent decoding),
//! - `*`, matching exactly one non-empty path component,
//! - `**`, matching one or more components (at most one per template),
//! - `{name}` or `{name=sub/template}` bindings, capturing the matched
//!   sub-path under `name`.
//!
//! Unnamed wildcards capture under positional keys `$0`, `$1`, ... in order
//! of appearance. A leading `/` marks the template as absolute: it only
//! matches paths with a leading `/` and anchors the whole path.
//!
//! A trailing `:verb` suffix after the last wildcard or binding is matched
//! literally and is never consumed by a `**`, so `{name=**}:cancel` matches
//! `a/b:cancel` with `name == "a/b"`.
//!
//! # Example
//! ```
//! # use rpc_gax::path_template::PathTemplate;
//! let template = PathTemplate::new("buckets/*/objects/*")?;
//! let bindings = template.match_path("buckets/foo/objects/bar")?;
//! assert_eq!(bindings.get("$0").map(String::as_str), Some("foo"));
//! assert_eq!(bindings.get("$1").map(String::as_str), Some("bar"));
//! assert_eq!(template.render(&bindings)?, "buckets/foo/objects/bar");
//! # Ok::<(), rpc_gax::path_template::Error>(())
//! ```

use std::collections::HashMap;

/// The error type for path template parsing, matching, and rendering.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the path template cannot be empty")]
    EmptyTemplate,
    #[error("the path template contains an empty segment: `{0}`")]
    EmptySegment(String),
    #[error("a path template may contain at most one `**` wildcard: `{0}`")]
    MultipleWildcards(String),
    #[error("bindings cannot nest inside other bindings: `{0}`")]
    NestedBinding(String),
    #[error("malformed segment `{segment}` in path template `{template}`")]
    MalformedSegment { template: String, segment: String },
    #[error("the path `{path}` does not match the template `{template}`")]
    MismatchedPath { template: String, path: String },
    #[error("no binding supplied for `{key}` while rendering `{template}`")]
    MissingBinding { template: String, key: String },
    #[error("the value `{value}` supplied for `{key}` does not match its sub-template")]
    InvalidBindingValue { key: String, value: String },
}

#[derive(Clone, Debug, PartialEq)]
enum SubSegment {
    Literal(String),
    Wildcard,
    PathWildcard,
}

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Literal(String),
    // Unnamed wildcards carry their positional capture index.
    Wildcard { index: usize },
    PathWildcard { index: usize },
    Binding { name: String, segments: Vec<SubSegment> },
}

/// A parsed path template.
#[derive(Clone, Debug, PartialEq)]
pub struct PathTemplate {
    absolute: bool,
    segments: Vec<Segment>,
    verb: Option<String>,
}

impl PathTemplate {
    /// Parses `template`, validating its grammar.
    pub fn new(template: &str) -> Result<Self, Error> {
        if template.is_empty() {
            return Err(Error::EmptyTemplate);
        }
        let (absolute, rest) = match template.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, template),
        };
        if rest.is_empty() {
            return Err(Error::EmptyTemplate);
        }
        let (rest, verb) = split_verb(rest);
        let mut segments = Vec::new();
        let mut positional = 0_usize;
        let mut path_wildcards = 0_usize;
        for chunk in split_segments(rest) {
            if chunk.is_empty() {
                return Err(Error::EmptySegment(template.into()));
            }
            segments.push(parse_segment(
                template,
                chunk,
                &mut positional,
                &mut path_wildcards,
            )?);
        }
        if path_wildcards > 1 {
            return Err(Error::MultipleWildcards(template.into()));
        }
        Ok(Self {
            absolute,
            segments,
            verb,
        })
    }

    /// Returns true if the template starts with `/`.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// The binding names this template captures, in order of appearance.
    ///
    /// Named bindings appear under their name, unnamed wildcards as `$0`,
    /// `$1`, ...
    pub fn variable_names(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Literal(_) => None,
                Segment::Wildcard { index } | Segment::PathWildcard { index } => {
                    Some(format!("${index}"))
                }
                Segment::Binding { name, .. } => Some(name.clone()),
            })
            .collect()
    }

    /// Returns true if `path` matches this template.
    pub fn matches(&self, path: &str) -> bool {
        self.match_path(path).is_ok()
    }

    /// Matches `path` against this template, capturing bindings.
    ///
    /// Named bindings capture under their name, unnamed wildcards under
    /// `$0`, `$1`, ... in order of appearance. Absolute templates anchor the
    /// full path; relative templates may match a trailing suffix of a longer
    /// path.
    pub fn match_path(&self, path: &str) -> Result<HashMap<String, String>, Error> {
        let mismatch = || Error::MismatchedPath {
            template: self.to_string(),
            path: path.to_string(),
        };
        let rest = if self.absolute {
            path.strip_prefix('/').ok_or_else(mismatch)?
        } else {
            if path.starts_with('/') {
                return Err(mismatch());
            }
            path
        };
        // The verb boundary wins over any wildcard greediness.
        let rest = match &self.verb {
            Some(verb) => {
                let suffix = format!(":{verb}");
                rest.strip_suffix(suffix.as_str()).ok_or_else(mismatch)?
            }
            None => rest,
        };
        if rest.is_empty() {
            return Err(mismatch());
        }
        let mut tokens: Vec<&str> = rest.split('/').collect();
        let (atoms, names) = self.atoms();
        let many_pos = atoms.iter().position(|a| matches!(a.kind, AtomKind::Many));
        match many_pos {
            None => {
                if tokens.len() < atoms.len() {
                    return Err(mismatch());
                }
                let excess = tokens.len() - atoms.len();
                if excess > 0 {
                    if self.absolute {
                        return Err(mismatch());
                    }
                    tokens.drain(..excess);
                }
            }
            Some(_) => {
                if tokens.len() < atoms.len() {
                    return Err(mismatch());
                }
            }
        }
        let mut captured: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        let front = many_pos.unwrap_or(atoms.len());
        let back = many_pos.map_or(0, |p| atoms.len() - p - 1);
        for (atom, token) in atoms[..front].iter().zip(tokens.iter()) {
            if !check_atom(atom, token, &mut captured) {
                return Err(mismatch());
            }
        }
        if let Some(p) = many_pos {
            // `**` takes whatever the anchored ends leave in the middle.
            let middle = &tokens[front..tokens.len() - back];
            if middle.is_empty() || middle.iter().any(|t| t.is_empty()) {
                return Err(mismatch());
            }
            if let Some(slot) = atoms[p].capture {
                captured[slot].push(middle.join("/"));
            }
            let tail = &tokens[tokens.len() - back..];
            for (atom, token) in atoms[p + 1..].iter().zip(tail.iter()) {
                if !check_atom(atom, token, &mut captured) {
                    return Err(mismatch());
                }
            }
        }
        Ok(names
            .into_iter()
            .zip(captured)
            .map(|(name, parts)| (name, parts.join("/")))
            .collect())
    }

    /// Renders `bindings` into a concrete path.
    ///
    /// Literal segments are emitted as-is. Every wildcard and binding
    /// requires a key in `bindings`; a binding value must match its
    /// sub-template.
    pub fn render(&self, bindings: &HashMap<String, String>) -> Result<String, Error> {
        let missing = |key: String| Error::MissingBinding {
            template: self.to_string(),
            key,
        };
        let mut parts = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => parts.push(s.clone()),
                Segment::Wildcard { index } => {
                    let key = format!("${index}");
                    let value = bindings.get(&key).ok_or_else(|| missing(key.clone()))?;
                    if value.is_empty() || value.contains('/') {
                        return Err(Error::InvalidBindingValue {
                            key,
                            value: value.clone(),
                        });
                    }
                    parts.push(value.clone());
                }
                Segment::PathWildcard { index } => {
                    let key = format!("${index}");
                    let value = bindings.get(&key).ok_or_else(|| missing(key.clone()))?;
                    if value.is_empty() {
                        return Err(Error::InvalidBindingValue {
                            key,
                            value: value.clone(),
                        });
                    }
                    parts.push(value.clone());
                }
                Segment::Binding { name, segments } => {
                    let value = bindings.get(name).ok_or_else(|| missing(name.clone()))?;
                    if !sub_template_matches(segments, value) {
                        return Err(Error::InvalidBindingValue {
                            key: name.clone(),
                            value: value.clone(),
                        });
                    }
                    parts.push(value.clone());
                }
            }
        }
        let mut path = parts.join("/");
        if let Some(verb) = &self.verb {
            path.push(':');
            path.push_str(verb);
        }
        if self.absolute {
            path.insert(0, '/');
        }
        Ok(path)
    }

    // Flattens the template into a linear matcher. Each wildcard or binding
    // owns one capture slot; a binding's sub-segments share its slot.
    fn atoms(&self) -> (Vec<Atom<'_>>, Vec<String>) {
        let mut atoms = Vec::new();
        let mut names = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => atoms.push(Atom {
                    kind: AtomKind::Literal(s),
                    capture: None,
                }),
                Segment::Wildcard { index } => {
                    names.push(format!("${index}"));
                    atoms.push(Atom {
                        kind: AtomKind::One,
                        capture: Some(names.len() - 1),
                    });
                }
                Segment::PathWildcard { index } => {
                    names.push(format!("${index}"));
                    atoms.push(Atom {
                        kind: AtomKind::Many,
                        capture: Some(names.len() - 1),
                    });
                }
                Segment::Binding { name, segments } => {
                    names.push(name.clone());
                    let slot = names.len() - 1;
                    for sub in segments {
                        let kind = match sub {
                            SubSegment::Literal(s) => AtomKind::Literal(s),
                            SubSegment::Wildcard => AtomKind::One,
                            SubSegment::PathWildcard => AtomKind::Many,
                        };
                        atoms.push(Atom {
                            kind,
                            capture: Some(slot),
                        });
                    }
                }
            }
        }
        (atoms, names)
    }
}

impl std::str::FromStr for PathTemplate {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.absolute {
            write!(f, "/")?;
        }
        let mut first = true;
        for segment in &self.segments {
            if !std::mem::take(&mut first) {
                write!(f, "/")?;
            }
            match segment {
                Segment::Literal(s) => write!(f, "{s}")?,
                Segment::Wildcard { index } => write!(f, "{{${index}=*}}")?,
                Segment::PathWildcard { index } => write!(f, "{{${index}=**}}")?,
                Segment::Binding { name, segments } => {
                    write!(f, "{{{name}=")?;
                    let mut sub_first = true;
                    for sub in segments {
                        if !std::mem::take(&mut sub_first) {
                            write!(f, "/")?;
                        }
                        match sub {
                            SubSegment::Literal(s) => write!(f, "{s}")?,
                            SubSegment::Wildcard => write!(f, "*")?,
                            SubSegment::PathWildcard => write!(f, "**")?,
                        }
                    }
                    write!(f, "}}")?;
                }
            }
        }
        if let Some(verb) = &self.verb {
            write!(f, ":{verb}")?;
        }
        Ok(())
    }
}

struct Atom<'t> {
    kind: AtomKind<'t>,
    capture: Option<usize>,
}

enum AtomKind<'t> {
    Literal(&'t str),
    One,
    Many,
}

fn check_atom(atom: &Atom<'_>, token: &str, captured: &mut [Vec<String>]) -> bool {
    let ok = match &atom.kind {
        // Raw comparison, percent-encoded characters are not decoded.
        AtomKind::Literal(literal) => token == *literal,
        AtomKind::One => !token.is_empty(),
        AtomKind::Many => false,
    };
    if ok {
        if let Some(slot) = atom.capture {
            captured[slot].push(token.to_string());
        }
    }
    ok
}

fn sub_template_matches(segments: &[SubSegment], value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    let tokens: Vec<&str> = value.split('/').collect();
    let many_pos = segments
        .iter()
        .position(|s| matches!(s, SubSegment::PathWildcard));
    let check = |segment: &SubSegment, token: &str| match segment {
        SubSegment::Literal(s) => token == s.as_str(),
        SubSegment::Wildcard => !token.is_empty(),
        SubSegment::PathWildcard => false,
    };
    match many_pos {
        None => {
            tokens.len() == segments.len()
                && segments.iter().zip(tokens.iter()).all(|(s, t)| check(s, t))
        }
        Some(p) => {
            if tokens.len() < segments.len() {
                return false;
            }
            let back = segments.len() - p - 1;
            let middle = &tokens[p..tokens.len() - back];
            segments[..p].iter().zip(tokens.iter()).all(|(s, t)| check(s, t))
                && !middle.is_empty()
                && middle.iter().all(|t| !t.is_empty())
                && segments[p + 1..]
                    .iter()
                    .zip(tokens[tokens.len() - back..].iter())
                    .all(|(s, t)| check(s, t))
        }
    }
}

// Splits a template on `/`, except inside `{...}` where a binding's
// sub-template may itself contain slashes.
fn split_segments(template: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, c) in template.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                chunks.push(&template[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    chunks.push(&template[start..]);
    chunks
}

fn split_verb(rest: &str) -> (&str, Option<String>) {
    let last_start = rest.rfind('/').map_or(0, |p| p + 1);
    let last = &rest[last_start..];
    if let Some(pos) = last.rfind(':') {
        let head = &last[..pos];
        let verb = &last[pos + 1..];
        if !verb.is_empty() && (head.ends_with('}') || head.ends_with('*')) {
            return (&rest[..last_start + pos], Some(verb.to_string()));
        }
    }
    (rest, None)
}

fn parse_segment(
    template: &str,
    chunk: &str,
    positional: &mut usize,
    path_wildcards: &mut usize,
) -> Result<Segment, Error> {
    let malformed = || Error::MalformedSegment {
        template: template.into(),
        segment: chunk.into(),
    };
    match chunk {
        "*" => {
            let segment = Segment::Wildcard { index: *positional };
            *positional += 1;
            Ok(segment)
        }
        "**" => {
            *path_wildcards += 1;
            let segment = Segment::PathWildcard { index: *positional };
            *positional += 1;
            Ok(segment)
        }
        _ if chunk.starts_with('{') => {
            let inner = chunk
                .strip_prefix('{')
                .and_then(|c| c.strip_suffix('}'))
                .ok_or_else(malformed)?;
            if inner.contains('{') || inner.contains('}') {
                return Err(Error::NestedBinding(template.into()));
            }
            let (name, sub) = inner.split_once('=').unwrap_or((inner, "*"));
            if name.is_empty() || sub.is_empty() {
                return Err(malformed());
            }
            let mut segments = Vec::new();
            for part in sub.split('/') {
                segments.push(match part {
                    "" => return Err(malformed()),
                    "*" => SubSegment::Wildcard,
                    "**" => {
                        *path_wildcards += 1;
                        SubSegment::PathWildcard
                    }
                    literal => SubSegment::Literal(literal.to_string()),
                });
            }
            Ok(Segment::Binding {
                name: name.to_string(),
                segments,
            })
        }
        _ if chunk.contains('{') || chunk.contains('}') => Err(malformed()),
        literal => Ok(Segment::Literal(literal.to_string())),
    }
}
