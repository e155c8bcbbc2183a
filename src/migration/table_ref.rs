// ABOUTME: Schema-qualified table references parsed from operator input
// ABOUTME: Resolves "schema.table" the way PostgreSQL reads it and renders quoted SQL names

use crate::error::{MigrateError, Result};
use crate::utils::quote_ident;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    /// Parse a `schema.table` identifier
    ///
    /// Each part is resolved the way PostgreSQL reads it: unquoted parts
    /// are folded to lower case, double-quoted parts are taken literally
    /// with `""` standing for one `"`. An unquoted table part runs to the
    /// end of the input, so `public.a.b` names the table `a.b` in schema
    /// `public`.
    ///
    /// ```
    /// # use supabase_migrator::migration::TableRef;
    /// let t = TableRef::parse("public.Users").unwrap();
    /// assert_eq!((t.schema.as_str(), t.table.as_str()), ("public", "users"));
    /// let t = TableRef::parse("public.\"Users\"").unwrap();
    /// assert_eq!(t.table, "Users");
    /// assert!(TableRef::parse("users").is_err());
    /// ```
    pub fn parse(qualified: &str) -> Result<Self> {
        let qualified = qualified.trim();
        let unqualified = || {
            MigrateError::InvalidInput(format!(
                "Table must be schema-qualified: {}",
                qualified
            ))
        };

        let (schema, rest) = take_identifier(qualified, qualified)?;
        let rest = rest.strip_prefix('.').ok_or_else(unqualified)?;
        let (table, trailing) = if rest.starts_with('"') {
            take_identifier(rest, qualified)?
        } else {
            (fold_unquoted(rest, qualified)?, "")
        };

        if !trailing.is_empty() {
            return Err(MigrateError::InvalidInput(format!(
                "Unexpected text after quoted identifier: {}",
                qualified
            )));
        }
        if schema.is_empty() || table.is_empty() {
            return Err(unqualified());
        }

        Ok(Self { schema, table })
    }

    /// Quoted `"schema"."table"` for use in SQL text
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// File name of this table's staging artifact; path separators and
    /// other unusual characters become `_`
    pub fn staging_file_name(&self) -> String {
        let safe = |s: &str| -> String {
            s.chars()
                .map(|c| {
                    if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        };
        format!("{}.{}.csv", safe(&self.schema), safe(&self.table))
    }
}

/// Resolve the identifier at the start of `input`, returning it and the
/// text that follows it. Unquoted identifiers end at the first `.`.
fn take_identifier<'a>(input: &'a str, qualified: &str) -> Result<(String, &'a str)> {
    let Some(quoted) = input.strip_prefix('"') else {
        let end = input.find('.').unwrap_or(input.len());
        return Ok((fold_unquoted(&input[..end], qualified)?, &input[end..]));
    };

    let mut name = String::new();
    let mut chars = quoted.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '"' {
            name.push(c);
        } else if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            name.push('"');
        } else {
            if name.is_empty() {
                return Err(MigrateError::InvalidInput(format!(
                    "Zero-length quoted identifier: {}",
                    qualified
                )));
            }
            return Ok((name, &quoted[idx + 1..]));
        }
    }

    Err(MigrateError::InvalidInput(format!(
        "Unterminated quoted identifier: {}",
        qualified
    )))
}

fn fold_unquoted(part: &str, qualified: &str) -> Result<String> {
    if part.contains('"') {
        return Err(MigrateError::InvalidInput(format!(
            "Misplaced quote in table identifier: {}",
            qualified
        )));
    }
    Ok(part.to_ascii_lowercase())
}

impl FromStr for TableRef {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        TableRef::parse(s)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
