use crate::canonical::{AttrPath, CanonicalDefs, IterDef, PathExpr};
use crate::errors::ParseError;

/// A from clause such as `/portfolios p, p.positions pos`,
/// resolved into canonical definitions.
///
/// Aliases are optional and may be introduced with `AS`.
/// A path that does not start with an alias is read from the first iterator.
#[derive(Debug, Clone)]
pub struct FromClause {
    defs: CanonicalDefs,
    aliases: Vec<Option<Box<str>>>,
}

impl FromClause {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut defs = Vec::new();
        let mut aliases: Vec<Option<Box<str>>> = Vec::new();
        for item in input.split(',').map(str::trim) {
            let (source, alias) = match item.split_whitespace().collect::<Vec<_>>()[..] {
                [source] => (source, None),
                [source, alias] => (source, Some(alias)),
                [source, kw, alias] if kw.eq_ignore_ascii_case("as") => (source, Some(alias)),
                _ => return Err(ParseError::malformed_def(item)),
            };
            if let Some(alias) = alias {
                if !is_alias(alias) {
                    return Err(ParseError::malformed_def(item));
                }
                if aliases.iter().flatten().any(|a| &**a == alias) {
                    return Err(ParseError::DuplicateAlias(alias.to_owned()));
                }
            }
            let def = if source.starts_with('/') {
                source.parse()?
            } else {
                let PathExpr { iter, path } = resolve(&aliases, source)?;
                if path.is_empty() {
                    return Err(ParseError::malformed_def(source));
                }
                IterDef::nested(iter, path)
            };
            defs.push(def);
            aliases.push(alias.map(Into::into));
        }
        Ok(Self {
            defs: CanonicalDefs::new(defs)?,
            aliases,
        })
    }

    pub fn defs(&self) -> &CanonicalDefs {
        &self.defs
    }

    pub fn into_defs(self) -> CanonicalDefs {
        self.defs
    }

    /// Resolves an alias-qualified path such as `pos.secId`
    /// into its canonical form `index_iter2.secId`.
    pub fn resolve_path(&self, path: &str) -> Result<PathExpr, ParseError> {
        resolve(&self.aliases, path)
    }
}

fn is_alias(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn resolve(aliases: &[Option<Box<str>>], path: &str) -> Result<PathExpr, ParseError> {
    if aliases.is_empty() {
        return Err(ParseError::malformed_path(path));
    }
    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    let bound = aliases.iter().position(|a| a.as_deref() == Some(head));
    let (iter, attrs) = match bound {
        Some(pos) => (pos + 1, rest),
        None => (1, path),
    };
    let attrs = AttrPath::parse(attrs).map_err(|_| ParseError::malformed_path(path))?;
    Ok(PathExpr::new(iter, attrs))
}
