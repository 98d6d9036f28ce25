use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{FieldKind, SortKeyError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    fn sign(self) -> char {
        match self {
            SortDir::Asc => '+',
            SortDir::Desc => '-',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub dir: SortDir,
    pub kind: FieldKind,
}

impl SortField {
    pub fn new(field: impl Into<String>, dir: SortDir, kind: FieldKind) -> Self {
        Self {
            field: field.into(),
            dir,
            kind,
        }
    }
}

/// Ordered sort fields whose last entry is unique per row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey(Vec<SortField>);

impl SortKey {
    /// Validate a sort key. `unique` names the field that is guaranteed unique
    /// per row; it must be the terminal field.
    pub fn new(fields: Vec<SortField>, unique: &str) -> Result<Self, SortKeyError> {
        let last = fields.last().ok_or(SortKeyError::Empty)?;
        if !last.field.eq_ignore_ascii_case(unique) {
            return Err(SortKeyError::MissingTiebreaker(unique.to_string()));
        }
        let mut seen = HashSet::new();
        for f in &fields {
            if !seen.insert(f.field.to_lowercase()) {
                return Err(SortKeyError::DuplicateField(f.field.clone()));
            }
        }
        Ok(Self(fields))
    }

    pub fn fields(&self) -> &[SortField] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn tiebreaker(&self) -> &SortField {
        // non-empty by construction
        &self.0[self.0.len() - 1]
    }

    /// Same fields with every direction flipped; used for backward fetches.
    pub fn reversed(&self) -> SortKey {
        SortKey(
            self.0
                .iter()
                .map(|f| SortField {
                    field: f.field.clone(),
                    dir: f.dir.reverse(),
                    kind: f.kind,
                })
                .collect(),
        )
    }

    /// Signed-token form, e.g. `+start_time,+lesson_id`. Cursors carry it so a
    /// token minted under another ordering can be told apart.
    pub fn signature(&self) -> String {
        self.0
            .iter()
            .map(|f| format!("{}{}", f.dir.sign(), f.field))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn matches_signature(&self, s: &str) -> bool {
        match parse_signature(s) {
            Ok(tokens) => {
                tokens.len() == self.0.len()
                    && tokens
                        .iter()
                        .zip(&self.0)
                        .all(|((name, dir), f)| name.eq_ignore_ascii_case(&f.field) && *dir == f.dir)
            }
            Err(_) => false,
        }
    }
}

/// Parse `+a,-b` into `(field, dir)` pairs. Whitespace around tokens is ignored.
pub fn parse_signature(s: &str) -> Result<Vec<(String, SortDir)>, SortKeyError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(SortKeyError::Empty);
    }
    trimmed
        .split(',')
        .map(|token| {
            let token = token.trim();
            let (dir, name) = match token.chars().next() {
                Some('+') => (SortDir::Asc, &token[1..]),
                Some('-') => (SortDir::Desc, &token[1..]),
                // unsigned means ascending
                _ => (SortDir::Asc, token),
            };
            if name.is_empty() {
                return Err(SortKeyError::InvalidToken(token.to_string()));
            }
            Ok((name.to_string(), dir))
        })
        .collect()
}

/// Which side of "now" a listing looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[default]
    Upcoming,
    Past,
}

/// Produces the sort key for a listing.
///
/// Primary fields are declared in upcoming order; the unique tie-break always
/// follows the direction of the first primary field. Past listings flip every
/// direction so the seek predicate stays monotonic.
#[derive(Clone, Debug)]
pub struct SortKeyStrategy {
    upcoming: SortKey,
}

impl SortKeyStrategy {
    pub fn new(
        primary: Vec<(&str, SortDir, FieldKind)>,
        tiebreak: (&str, FieldKind),
    ) -> Result<Self, SortKeyError> {
        let tie_dir = primary.first().map(|p| p.1).unwrap_or(SortDir::Asc);
        let mut fields: Vec<SortField> = primary
            .into_iter()
            .map(|(name, dir, kind)| SortField::new(name, dir, kind))
            .collect();
        fields.push(SortField::new(tiebreak.0, tie_dir, tiebreak.1));
        let upcoming = SortKey::new(fields, tiebreak.0)?;
        Ok(Self { upcoming })
    }

    pub fn resolve(&self, window: TimeWindow) -> SortKey {
        match window {
            TimeWindow::Upcoming => self.upcoming.clone(),
            TimeWindow::Past => self.upcoming.reversed(),
        }
    }
}
